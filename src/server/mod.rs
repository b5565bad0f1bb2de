//! Per-host metadata consulted before a URI is fetched
//!
//! The frontier reads DNS and robots.txt state from a `ServerCache` to decide
//! whether a URI needs a prerequisite. Workers record lookup results into the
//! same cache; the frontier fills in defaults when a prerequisite finishes
//! without a recorded result so dependents never wait on it forever.

mod crawl_server;

pub use crawl_server::{CrawlServer, DnsState};

use crate::robots::RobotsPolicy;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Resolves a host to its cached metadata
pub trait ServerCache: Send + Sync {
    /// Snapshot of the host's metadata, if any has been recorded
    fn server_for(&self, host: &str) -> Option<CrawlServer>;

    /// Records a successful lookup; `ip` is `None` when the address is unknown
    fn record_dns(&self, host: &str, ip: Option<IpAddr>);

    /// Records that the host could not be resolved
    fn record_dns_failure(&self, host: &str);

    /// Records the host's robots.txt policy as of now
    fn record_robots(&self, host: &str, policy: RobotsPolicy);

    /// Number of hosts known to the cache
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// `ServerCache` backed by a map behind a read-write lock
#[derive(Debug, Default)]
pub struct InMemoryServerCache {
    servers: RwLock<HashMap<String, CrawlServer>>,
}

impl InMemoryServerCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, CrawlServer>> {
        self.servers.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, CrawlServer>> {
        self.servers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn update(&self, host: &str, f: impl FnOnce(&mut CrawlServer)) {
        let key = host.to_lowercase();
        let mut servers = self.write();
        let server = servers
            .entry(key.clone())
            .or_insert_with(|| CrawlServer::new(key));
        f(server);
    }
}

impl ServerCache for InMemoryServerCache {
    fn server_for(&self, host: &str) -> Option<CrawlServer> {
        self.read().get(&host.to_lowercase()).cloned()
    }

    fn record_dns(&self, host: &str, ip: Option<IpAddr>) {
        self.update(host, |server| server.record_dns(ip));
    }

    fn record_dns_failure(&self, host: &str) {
        self.update(host, |server| server.record_dns_failure());
    }

    fn record_robots(&self, host: &str, policy: RobotsPolicy) {
        self.update(host, |server| server.update_robots(policy));
    }

    fn len(&self) -> usize {
        self.read().len()
    }
}
