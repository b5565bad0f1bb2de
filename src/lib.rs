//! Sumi-Frontier: the scheduling core of a polite web crawler
//!
//! This crate decides which discovered URI a crawl worker may fetch next. It
//! enforces per-host politeness, suppresses duplicate visits, drives retries
//! and prerequisites (DNS, robots.txt), and writes a replayable recovery log.

pub mod config;
pub mod frontier;
pub mod robots;
pub mod server;
pub mod state;
pub mod storage;
pub mod uri;
pub mod url;

use thiserror::Error;

/// Main error type for Sumi-Frontier operations
#[derive(Debug, Error)]
pub enum FrontierError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Marker does not belong to this frontier")]
    InvalidMarker,

    #[error("Frontier lock poisoned")]
    LockPoisoned,

    #[error("Recovery log error at line {line}: {message}")]
    Recovery { line: usize, message: String },
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid domain pattern: {0}")]
    InvalidPattern(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for Sumi-Frontier operations
pub type Result<T> = std::result::Result<T, FrontierError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use frontier::{Frontier, NextUri};
pub use state::{FetchStatus, StoreState};
pub use uri::{CandidateUri, CrawlUri, Priority};
pub use url::{class_key, normalize_url, Uuri};
