use serde::Deserialize;
use std::path::PathBuf;

/// Main configuration structure for Sumi-Frontier
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub politeness: PolitenessConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub queues: QueueConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(rename = "user-agent", default)]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub seed: Vec<SeedEntry>,
    #[serde(default)]
    pub blacklist: Vec<DomainEntry>,
}

impl Config {
    /// Returns the path of the recovery log, defaulting to `<state-dir>/recover.log`
    pub fn recovery_log_path(&self) -> PathBuf {
        match &self.storage.recovery_log {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(&self.storage.state_dir).join("recover.log"),
        }
    }

    /// Total number of configured seed URLs
    pub fn seed_count(&self) -> usize {
        self.seed.iter().map(|s| s.urls.len()).sum()
    }
}

/// Per-host politeness configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PolitenessConfig {
    /// Multiplier applied to the duration of the last fetch
    #[serde(rename = "delay-factor", default = "default_delay_factor")]
    pub delay_factor: f64,

    /// Lower clamp for the computed delay (milliseconds)
    #[serde(rename = "min-delay-ms", default = "default_min_delay_ms")]
    pub min_delay_ms: u64,

    /// Upper clamp for the computed delay (milliseconds)
    #[serde(rename = "max-delay-ms", default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Minimum time between the starts of consecutive fetches to one host (milliseconds)
    #[serde(rename = "min-interval-ms", default = "default_min_interval_ms")]
    pub min_interval_ms: u64,

    /// Whether a robots.txt Crawl-delay raises the computed delay
    #[serde(rename = "respect-crawl-delay", default = "default_true")]
    pub respect_crawl_delay: bool,
}

impl Default for PolitenessConfig {
    fn default() -> Self {
        Self {
            delay_factor: default_delay_factor(),
            min_delay_ms: default_min_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            min_interval_ms: default_min_interval_ms(),
            respect_crawl_delay: true,
        }
    }
}

/// Retry behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Number of attempts after which a retryable failure becomes terminal
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// Default wait before a retryable failure is attempted again (seconds)
    #[serde(rename = "retry-delay-seconds", default = "default_retry_delay_seconds")]
    pub retry_delay_seconds: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_delay_seconds: default_retry_delay_seconds(),
        }
    }
}

/// In-memory capacities of the disk-backed structures
#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    #[serde(
        rename = "pending-queue-memory-capacity",
        default = "default_pending_capacity"
    )]
    pub pending_queue_memory_capacity: usize,

    #[serde(rename = "host-queue-memory-capacity", default = "default_host_capacity")]
    pub host_queue_memory_capacity: usize,

    #[serde(
        rename = "fingerprint-memory-capacity",
        default = "default_fingerprint_capacity"
    )]
    pub fingerprint_memory_capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            pending_queue_memory_capacity: default_pending_capacity(),
            host_queue_memory_capacity: default_host_capacity(),
            fingerprint_memory_capacity: default_fingerprint_capacity(),
        }
    }
}

/// On-disk locations
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Scratch directory for queue overflow files and the fingerprint database
    #[serde(rename = "state-dir", default = "default_state_dir")]
    pub state_dir: String,

    /// Recovery log path; `None` places it inside the state directory
    #[serde(rename = "recovery-log", default)]
    pub recovery_log: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            state_dir: default_state_dir(),
            recovery_log: None,
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name matched against robots.txt user-agent groups
    #[serde(rename = "crawler-name", default = "default_crawler_name")]
    pub crawler_name: String,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: default_crawler_name(),
        }
    }
}

/// Seed domain entry with its starting URLs
#[derive(Debug, Clone, Deserialize)]
pub struct SeedEntry {
    /// Domain pattern (e.g., "example.com" or "*.example.com")
    pub domain: String,

    /// Seed URLs scheduled at high priority
    #[serde(default)]
    pub urls: Vec<String>,
}

/// Simple domain entry for the blacklist
#[derive(Debug, Clone, Deserialize)]
pub struct DomainEntry {
    /// Domain pattern (e.g., "example.com" or "*.example.com")
    pub domain: String,
}

fn default_delay_factor() -> f64 {
    5.0
}

fn default_min_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    5_000
}

fn default_min_interval_ms() -> u64 {
    1_000
}

fn default_true() -> bool {
    true
}

fn default_max_retries() -> u32 {
    30
}

fn default_retry_delay_seconds() -> u64 {
    900
}

fn default_pending_capacity() -> usize {
    10_000
}

fn default_host_capacity() -> usize {
    200
}

fn default_fingerprint_capacity() -> usize {
    1_000_000
}

fn default_state_dir() -> String {
    "./frontier-state".to_string()
}

fn default_crawler_name() -> String {
    "SumiFrontier".to_string()
}
