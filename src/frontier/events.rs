//! Notifications about finished URIs
//!
//! Listeners are invoked while the frontier lock is held, so they must not
//! call back into the frontier.

use crate::uri::CrawlUri;

pub trait CrawlListener: Send + Sync {
    fn on_success(&self, _curi: &CrawlUri) {}

    fn on_failure(&self, _curi: &CrawlUri) {}

    fn on_disregard(&self, _curi: &CrawlUri) {}

    fn on_retry(&self, _curi: &CrawlUri) {}
}
