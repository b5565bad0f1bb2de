//! URIs parked until a dependency URI has been processed
//!
//! A URI that cannot be fetched yet (its host is unresolved, or robots.txt is
//! unknown) names a prerequisite and is parked here. Every disposition of the
//! prerequisite, successful or not, releases its waiters back into scheduling.

use crate::server::{CrawlServer, DnsState};
use crate::state::{FetchStatus, StoreState};
use crate::uri::CrawlUri;
use crate::url::Uuri;
use std::collections::HashMap;

/// Waiters keyed by the dependency they wait on
#[derive(Debug, Default)]
pub struct HeldPrerequisites {
    waiting: HashMap<Uuri, Vec<CrawlUri>>,
}

impl HeldPrerequisites {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parks `curi` behind `dependency`
    ///
    /// Returns true when `curi` is the first waiter, i.e. the dependency
    /// still has to be scheduled.
    pub fn park(&mut self, dependency: Uuri, mut curi: CrawlUri) -> bool {
        curi.store_state = StoreState::Held;
        let waiters = self.waiting.entry(dependency).or_default();
        waiters.push(curi);
        waiters.len() == 1
    }

    /// Removes and returns every URI waiting on `dependency`
    pub fn release(&mut self, dependency: &Uuri) -> Vec<CrawlUri> {
        self.waiting.remove(dependency).unwrap_or_default()
    }

    pub fn is_waited_on(&self, dependency: &Uuri) -> bool {
        self.waiting.contains_key(dependency)
    }

    /// Removes parked URIs matching `predicate`, dropping emptied entries
    pub fn remove_matching(&mut self, mut predicate: impl FnMut(&CrawlUri) -> bool) -> Vec<CrawlUri> {
        let mut removed = Vec::new();
        self.waiting.retain(|_, waiters| {
            let mut kept = Vec::with_capacity(waiters.len());
            for curi in waiters.drain(..) {
                if predicate(&curi) {
                    removed.push(curi);
                } else {
                    kept.push(curi);
                }
            }
            *waiters = kept;
            !waiters.is_empty()
        });
        removed
    }

    /// Number of parked URIs
    pub fn len(&self) -> usize {
        self.waiting.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.waiting.is_empty()
    }

    /// Number of distinct dependencies being waited on
    pub fn dependency_count(&self) -> usize {
        self.waiting.len()
    }
}

/// Result of checking a URI against what is known about its host
#[derive(Debug, Clone, PartialEq)]
pub enum Precondition {
    /// Nothing stands in the way of fetching
    Proceed,
    /// The named URI must be processed first
    Deferred(Uuri),
    /// The URI must not be fetched; finish it with this status
    Precluded(FetchStatus),
}

/// Decides whether `curi` can be fetched given its host's cached metadata
///
/// `dns:` URIs always proceed. Other URIs need a resolved host; HTTP(S) URIs
/// other than robots.txt itself additionally need a fresh robots.txt that
/// allows them.
pub fn evaluate(curi: &CrawlUri, server: Option<&CrawlServer>, user_agent: &str) -> Precondition {
    let uuri = curi.uuri();
    if uuri.is_dns() {
        return Precondition::Proceed;
    }
    let Some(host) = uuri.host() else {
        return Precondition::Precluded(FetchStatus::UNFETCHABLE_URI);
    };

    match server.map(|s| s.dns) {
        Some(DnsState::Resolved) => {}
        Some(DnsState::Failed) => return Precondition::Precluded(FetchStatus::DOMAIN_UNRESOLVABLE),
        Some(DnsState::Unresolved) | None => {
            return match Uuri::dns(&host) {
                Ok(dns) => Precondition::Deferred(dns),
                Err(_) => Precondition::Precluded(FetchStatus::DOMAIN_UNRESOLVABLE),
            };
        }
    }

    if uuri.is_robots_txt() || !uuri.is_http() {
        return Precondition::Proceed;
    }

    let Some(server) = server else {
        return Precondition::Proceed;
    };
    if server.is_robots_stale() {
        return match uuri.robots_txt() {
            Some(robots) => Precondition::Deferred(robots),
            None => Precondition::Proceed,
        };
    }
    if !server.is_allowed(uuri.as_str(), user_agent) {
        return Precondition::Precluded(FetchStatus::ROBOTS_PRECLUDED);
    }
    Precondition::Proceed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::robots::RobotsPolicy;
    use crate::uri::CandidateUri;

    fn curi(url: &str) -> CrawlUri {
        CrawlUri::from_candidate(CandidateUri::parse(url).unwrap(), 0)
    }

    fn resolved(host: &str) -> CrawlServer {
        let mut server = CrawlServer::new(host);
        server.record_dns(None);
        server
    }

    #[test]
    fn test_park_reports_first_waiter() {
        let mut held = HeldPrerequisites::new();
        let dep = Uuri::dns("a.example").unwrap();

        assert!(held.park(dep.clone(), curi("https://a.example/1")));
        assert!(!held.park(dep.clone(), curi("https://a.example/2")));
        assert_eq!(held.len(), 2);
        assert_eq!(held.dependency_count(), 1);
        assert!(held.is_waited_on(&dep));

        let released = held.release(&dep);
        assert_eq!(released.len(), 2);
        assert!(released.iter().all(|c| c.store_state == StoreState::Held));
        assert!(held.is_empty());
        assert!(held.release(&dep).is_empty());
    }

    #[test]
    fn test_remove_matching() {
        let mut held = HeldPrerequisites::new();
        let dep = Uuri::dns("a.example").unwrap();
        held.park(dep.clone(), curi("https://a.example/keep"));
        held.park(dep, curi("https://a.example/drop"));

        let removed = held.remove_matching(|c| c.uuri().as_str().ends_with("drop"));
        assert_eq!(removed.len(), 1);
        assert_eq!(held.len(), 1);
    }

    #[test]
    fn test_unknown_host_needs_dns() {
        let c = curi("https://a.example/page");
        assert_eq!(
            evaluate(&c, None, "TestBot"),
            Precondition::Deferred(Uuri::dns("a.example").unwrap())
        );
    }

    #[test]
    fn test_dns_uri_proceeds() {
        let c = curi("dns:a.example");
        assert_eq!(evaluate(&c, None, "TestBot"), Precondition::Proceed);
    }

    #[test]
    fn test_failed_dns_precludes() {
        let mut server = CrawlServer::new("a.example");
        server.record_dns_failure();
        let c = curi("https://a.example/page");
        assert_eq!(
            evaluate(&c, Some(&server), "TestBot"),
            Precondition::Precluded(FetchStatus::DOMAIN_UNRESOLVABLE)
        );
    }

    #[test]
    fn test_missing_robots_needs_robots() {
        let server = resolved("a.example");
        let c = curi("https://a.example/page");
        assert_eq!(
            evaluate(&c, Some(&server), "TestBot"),
            Precondition::Deferred(Uuri::parse("https://a.example/robots.txt").unwrap())
        );
    }

    #[test]
    fn test_robots_txt_itself_proceeds() {
        let server = resolved("a.example");
        let c = curi("https://a.example/robots.txt");
        assert_eq!(evaluate(&c, Some(&server), "TestBot"), Precondition::Proceed);
    }

    #[test]
    fn test_robots_disallow_precludes() {
        let mut server = resolved("a.example");
        server.update_robots(RobotsPolicy::from_content("User-agent: *\nDisallow: /private"));

        assert_eq!(
            evaluate(&curi("https://a.example/private/x"), Some(&server), "TestBot"),
            Precondition::Precluded(FetchStatus::ROBOTS_PRECLUDED)
        );
        assert_eq!(
            evaluate(&curi("https://a.example/public"), Some(&server), "TestBot"),
            Precondition::Proceed
        );
    }
}
