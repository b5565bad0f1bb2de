//! Scope decisions for candidate URIs
//!
//! The frontier only needs a yes/no answer from its scope; how that answer is
//! computed is up to the implementation. `DomainScope` answers it from the
//! seed and blacklist domain patterns in the configuration.

use crate::config::Config;
use crate::uri::CandidateUri;

/// Decides whether a candidate URI belongs to the crawl
pub trait Scope: Send + Sync {
    fn accepts(&self, candidate: &CandidateUri) -> bool;
}

/// Scope that admits everything
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl Scope for AcceptAll {
    fn accepts(&self, _candidate: &CandidateUri) -> bool {
        true
    }
}

/// Scope built from domain wildcard patterns
///
/// Blacklisted domains are always rejected. When at least one seed domain is
/// configured, only hosts matching a seed domain are admitted; otherwise every
/// non-blacklisted host is admitted. `dns:` lookups are always admitted.
#[derive(Debug, Clone, Default)]
pub struct DomainScope {
    allowed: Vec<String>,
    blocked: Vec<String>,
}

impl DomainScope {
    pub fn new(allowed: Vec<String>, blocked: Vec<String>) -> Self {
        Self { allowed, blocked }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.seed.iter().map(|s| s.domain.to_lowercase()).collect(),
            config
                .blacklist
                .iter()
                .map(|b| b.domain.to_lowercase())
                .collect(),
        )
    }

    /// Applies the domain rules to a bare host name
    pub fn accepts_host(&self, host: &str) -> bool {
        let host = host.to_lowercase();
        if self.blocked.iter().any(|p| matches_wildcard(p, &host)) {
            return false;
        }
        self.allowed.is_empty() || self.allowed.iter().any(|p| matches_wildcard(p, &host))
    }
}

impl Scope for DomainScope {
    fn accepts(&self, candidate: &CandidateUri) -> bool {
        if candidate.uuri.is_dns() {
            return true;
        }
        match candidate.uuri.as_url().host_str() {
            Some(host) => self.accepts_host(host),
            None => false,
        }
    }
}

/// Checks if a domain matches a wildcard pattern
///
/// `"example.com"` matches only itself. `"*.example.com"` matches
/// `example.com` and any of its subdomains, at any depth.
///
/// # Examples
///
/// ```
/// use sumi_frontier::url::matches_wildcard;
///
/// assert!(matches_wildcard("*.example.com", "example.com"));
/// assert!(matches_wildcard("*.example.com", "api.v2.example.com"));
/// assert!(!matches_wildcard("*.example.com", "badexample.com"));
/// ```
pub fn matches_wildcard(pattern: &str, candidate: &str) -> bool {
    match pattern.strip_prefix("*.") {
        Some(base) => {
            candidate == base
                || candidate
                    .strip_suffix(base)
                    .is_some_and(|prefix| prefix.ends_with('.'))
        }
        None => candidate == pattern,
    }
}
