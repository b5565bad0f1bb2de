//! Per-host delay after a completed fetch
//!
//! The delay scales with how long the server took to answer, so slow hosts are
//! visited less often. It is clamped to `[min_delay, max_delay]` and, when the
//! fetch was shorter than `min_interval`, raised so that consecutive request
//! starts for one host are at least `min_interval` apart.

use crate::config::PolitenessConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct PolitenessPolicy {
    pub delay_factor: f64,
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    pub min_interval_ms: u64,
    pub respect_crawl_delay: bool,
}

impl PolitenessPolicy {
    pub fn from_config(config: &PolitenessConfig) -> Self {
        Self {
            delay_factor: config.delay_factor,
            min_delay_ms: config.min_delay_ms,
            max_delay_ms: config.max_delay_ms,
            min_interval_ms: config.min_interval_ms,
            respect_crawl_delay: config.respect_crawl_delay,
        }
    }

    /// Milliseconds the host's queue must sleep after this fetch
    ///
    /// # Arguments
    ///
    /// * `began` - Fetch start, epoch milliseconds
    /// * `completed` - Fetch end, epoch milliseconds
    /// * `crawl_delay_ms` - Robots.txt Crawl-delay for the host, if any
    ///
    /// # Returns
    ///
    /// Zero when the attempt carries no timing (nothing was fetched).
    pub fn delay_ms(
        &self,
        began: Option<i64>,
        completed: Option<i64>,
        crawl_delay_ms: Option<u64>,
    ) -> u64 {
        let (Some(began), Some(completed)) = (began, completed) else {
            return 0;
        };
        let elapsed = completed.saturating_sub(began).max(0) as u64;

        let scaled = (elapsed as f64 * self.delay_factor).round();
        let mut delay = if scaled >= u64::MAX as f64 {
            u64::MAX
        } else {
            scaled as u64
        };
        delay = delay.max(self.min_delay_ms).min(self.max_delay_ms);

        if elapsed < self.min_interval_ms {
            delay = delay.max(self.min_interval_ms - elapsed);
        }

        if self.respect_crawl_delay {
            if let Some(crawl_delay) = crawl_delay_ms {
                delay = delay.max(crawl_delay);
            }
        }

        delay
    }
}

impl Default for PolitenessPolicy {
    fn default() -> Self {
        Self::from_config(&PolitenessConfig::default())
    }
}
