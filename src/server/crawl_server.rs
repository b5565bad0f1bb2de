use crate::robots::{CachedRobots, RobotsPolicy};
use chrono::{DateTime, Utc};
use std::net::IpAddr;

/// Outcome of the most recent DNS lookup for a host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DnsState {
    Unresolved,
    Resolved,
    Failed,
}

/// Tracks what the crawl knows about one host
///
/// This structure holds the information the frontier needs before it lets a
/// URI for the host be fetched: whether the name resolves and which
/// robots.txt rules apply.
#[derive(Debug, Clone)]
pub struct CrawlServer {
    /// Lowercased host name
    pub host: String,

    /// Resolved address, when the lookup reported one
    pub ip: Option<IpAddr>,

    pub dns: DnsState,

    /// When the last lookup completed
    pub dns_checked_at: Option<DateTime<Utc>>,

    /// Cached robots.txt policy for this host
    pub robots: Option<CachedRobots>,
}

impl CrawlServer {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ip: None,
            dns: DnsState::Unresolved,
            dns_checked_at: None,
            robots: None,
        }
    }

    pub fn record_dns(&mut self, ip: Option<IpAddr>) {
        self.ip = ip;
        self.dns = DnsState::Resolved;
        self.dns_checked_at = Some(Utc::now());
    }

    pub fn record_dns_failure(&mut self) {
        self.ip = None;
        self.dns = DnsState::Failed;
        self.dns_checked_at = Some(Utc::now());
    }

    pub fn is_resolved(&self) -> bool {
        self.dns == DnsState::Resolved
    }

    /// Updates the robots.txt cache
    pub fn update_robots(&mut self, policy: RobotsPolicy) {
        self.robots = Some(CachedRobots::new(policy));
    }

    /// True when robots.txt has never been fetched or the cached copy expired
    pub fn is_robots_stale(&self) -> bool {
        self.robots.as_ref().map_or(true, |r| r.is_stale())
    }

    /// Checks `url` against the cached policy; unknown policy allows everything
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        self.robots
            .as_ref()
            .map_or(true, |r| r.policy.is_allowed(url, user_agent))
    }

    /// Robots.txt Crawl-delay in milliseconds, if one applies
    pub fn crawl_delay_ms(&self, user_agent: &str) -> Option<u64> {
        self.robots
            .as_ref()
            .and_then(|r| r.policy.crawl_delay(user_agent))
            .map(|secs| (secs * 1000.0).round() as u64)
    }
}
