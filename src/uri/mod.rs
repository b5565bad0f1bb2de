//! URI records that flow through the frontier
//!
//! A `CandidateUri` is what discovery hands to `schedule`. It is promoted to a
//! `CrawlUri`, which carries the mutable crawl-time state, the first time it
//! is dequeued from a global pending queue.

use crate::state::{FetchStatus, StoreState};
use crate::url::Uuri;
use serde::{Deserialize, Serialize};

/// Scheduling tier of a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Priority {
    High,
    #[default]
    Normal,
}

/// A discovered URI awaiting scheduling
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateUri {
    pub uuri: Uuri,
    pub priority: Priority,
    /// URI this one was discovered from
    pub via: Option<String>,
    /// Hop codes from the nearest seed ("" for seeds, 'L' link, 'P' prerequisite)
    pub path_from_seed: String,
    /// Bypass duplicate suppression
    pub force_fetch: bool,
    pub is_seed: bool,
}

impl CandidateUri {
    pub fn new(uuri: Uuri) -> Self {
        Self {
            uuri,
            priority: Priority::Normal,
            via: None,
            path_from_seed: String::new(),
            force_fetch: false,
            is_seed: false,
        }
    }

    /// Parses a URI string into a normal-priority candidate
    pub fn parse(input: &str) -> crate::UrlResult<Self> {
        Uuri::parse(input).map(Self::new)
    }

    pub fn seed(uuri: Uuri) -> Self {
        Self {
            is_seed: true,
            priority: Priority::High,
            ..Self::new(uuri)
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_via(mut self, via: impl Into<String>, hop: char) -> Self {
        self.via = Some(via.into());
        self.path_from_seed.push(hop);
        self
    }

    pub fn with_path_from_seed(mut self, path: impl Into<String>) -> Self {
        self.path_from_seed = path.into();
        self
    }

    pub fn forced(mut self) -> Self {
        self.force_fetch = true;
        self
    }

    pub fn class_key(&self) -> String {
        self.uuri.class_key()
    }
}

/// A URI inside the crawl, with the state workers and dispositions mutate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlUri {
    pub candidate: CandidateUri,
    class_key: String,
    /// Order of promotion; unique per frontier
    pub ordinal: u64,
    pub fetch_status: FetchStatus,
    pub fetch_attempts: u32,
    pub deferrals: u32,
    pub content_size: u64,
    /// Epoch milliseconds at which the fetch started
    pub fetch_began: Option<i64>,
    /// Epoch milliseconds at which the fetch completed
    pub fetch_completed: Option<i64>,
    /// URI that must complete before this one can be fetched
    pub prerequisite: Option<Uuri>,
    /// Overrides the configured retry delay (seconds)
    pub retry_delay: Option<u64>,
    pub store_state: StoreState,
    /// Epoch milliseconds before which the URI is not retried
    pub dont_retry_before: Option<i64>,
    /// Epoch milliseconds at which a snoozed URI wakes
    pub wake_time: Option<i64>,
    /// Free-form description of the last failure
    pub error: Option<String>,
}

impl CrawlUri {
    pub fn from_candidate(candidate: CandidateUri, ordinal: u64) -> Self {
        let class_key = candidate.class_key();
        Self {
            candidate,
            class_key,
            ordinal,
            fetch_status: FetchStatus::UNATTEMPTED,
            fetch_attempts: 0,
            deferrals: 0,
            content_size: 0,
            fetch_began: None,
            fetch_completed: None,
            prerequisite: None,
            retry_delay: None,
            store_state: StoreState::Pending,
            dont_retry_before: None,
            wake_time: None,
            error: None,
        }
    }

    pub fn uuri(&self) -> &Uuri {
        &self.candidate.uuri
    }

    pub fn class_key(&self) -> &str {
        &self.class_key
    }

    pub fn force_fetch(&self) -> bool {
        self.candidate.force_fetch
    }

    /// Records the outcome of a fetch attempt
    pub fn set_fetch_result(&mut self, status: FetchStatus, began: i64, completed: i64) {
        self.fetch_status = status;
        self.fetch_began = Some(began);
        self.fetch_completed = Some(completed);
    }

    /// Defers this URI until `prerequisite` has been processed
    pub fn defer_to(&mut self, prerequisite: Uuri) {
        self.prerequisite = Some(prerequisite);
        self.fetch_status = FetchStatus::DEFERRED;
        self.deferrals += 1;
    }

    /// Clears per-attempt results ahead of another attempt
    pub fn reset_for_retry(&mut self) {
        self.fetch_status = FetchStatus::UNATTEMPTED;
        self.prerequisite = None;
        self.fetch_began = None;
        self.fetch_completed = None;
        self.content_size = 0;
        self.error = None;
    }

    /// Marks the URI as never to be retried, keeping any earlier bound
    pub fn retire(&mut self) {
        if self.dont_retry_before.is_none() {
            self.dont_retry_before = Some(i64::MAX);
        }
    }
}

/// An entry of a global pending queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PendingUri {
    /// Newly scheduled, not yet promoted
    Candidate(CandidateUri),
    /// Already promoted; re-entering the queues for another attempt
    Crawl(Box<CrawlUri>),
}

impl PendingUri {
    pub fn uuri(&self) -> &Uuri {
        match self {
            Self::Candidate(c) => &c.uuri,
            Self::Crawl(c) => c.uuri(),
        }
    }

    pub fn force_fetch(&self) -> bool {
        match self {
            Self::Candidate(c) => c.force_fetch,
            Self::Crawl(c) => c.force_fetch(),
        }
    }

    pub fn is_promoted(&self) -> bool {
        matches!(self, Self::Crawl(_))
    }

    /// Promotes to a `CrawlUri`, assigning `ordinal` only to fresh candidates
    pub fn into_crawl(self, ordinal: u64) -> CrawlUri {
        match self {
            Self::Candidate(c) => CrawlUri::from_candidate(c, ordinal),
            Self::Crawl(c) => *c,
        }
    }
}

impl From<CandidateUri> for PendingUri {
    fn from(candidate: CandidateUri) -> Self {
        Self::Candidate(candidate)
    }
}

impl From<CrawlUri> for PendingUri {
    fn from(curi: CrawlUri) -> Self {
        Self::Crawl(Box::new(curi))
    }
}
