//! Robots.txt with its fetch time
//!
//! A cached policy expires after 24 hours, after which the host's robots.txt
//! must be fetched again before its URIs are emitted.

use crate::robots::RobotsPolicy;
use chrono::{DateTime, Duration, Utc};

#[derive(Debug, Clone)]
pub struct CachedRobots {
    pub policy: RobotsPolicy,
    pub fetched_at: DateTime<Utc>,
}

impl CachedRobots {
    /// Wraps a freshly fetched policy
    pub fn new(policy: RobotsPolicy) -> Self {
        Self {
            policy,
            fetched_at: Utc::now(),
        }
    }

    /// Maximum age before a refetch is required
    pub fn max_age() -> Duration {
        Duration::hours(24)
    }

    /// Checks if the cached robots.txt is older than [`CachedRobots::max_age`]
    pub fn is_stale(&self) -> bool {
        self.age() > Self::max_age()
    }

    pub fn age(&self) -> Duration {
        Utc::now() - self.fetched_at
    }
}
