//! Configuration module for Sumi-Frontier
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use sumi_frontier::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("frontier.toml")).unwrap();
//! println!("Politeness delay factor: {}", config.politeness.delay_factor);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, DomainEntry, PolitenessConfig, QueueConfig, RetryConfig, SeedEntry, StorageConfig,
    UserAgentConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};
pub use validation::validate;
