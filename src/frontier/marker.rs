//! Cursor for paging through queued URIs
//!
//! A marker is a snapshot of which queues existed when it was created plus a
//! position inside the current one. Queues that change underneath it are
//! tolerated: a host queue that has vanished is skipped, and items that moved
//! may be listed twice or not at all.

use crate::uri::PendingUri;
use regex::Regex;
use std::fmt;

/// Items copied out of a queue per lock acquisition
pub(crate) const PEEK_CHUNK: usize = 100;

/// A queue a marker walks through
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkerQueue {
    PendingHigh,
    PendingNormal,
    Host(String),
}

impl MarkerQueue {
    /// Resolves an operator-supplied queue name: `pending-high`, `pending`,
    /// or a host classKey
    pub fn named(name: &str) -> Self {
        match name {
            "pending-high" => Self::PendingHigh,
            "pending" => Self::PendingNormal,
            key => Self::Host(key.to_string()),
        }
    }
}

impl fmt::Display for MarkerQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PendingHigh => write!(f, "pending-high"),
            Self::PendingNormal => write!(f, "pending"),
            Self::Host(key) => write!(f, "{}", key),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FrontierMarker {
    pub(crate) frontier_id: u64,
    pattern: String,
    regex: Regex,
    pub(crate) in_memory_only: bool,
    pub(crate) queues: Vec<MarkerQueue>,
    pub(crate) queue_index: usize,
    pub(crate) position: usize,
    next_item_number: u64,
    has_next: bool,
}

impl FrontierMarker {
    pub(crate) fn new(
        frontier_id: u64,
        pattern: &str,
        in_memory_only: bool,
        host_keys: Vec<String>,
    ) -> Result<Self, regex::Error> {
        let regex = full_match(pattern)?;
        let mut queues = vec![MarkerQueue::PendingHigh, MarkerQueue::PendingNormal];
        queues.extend(host_keys.into_iter().map(MarkerQueue::Host));
        Ok(Self {
            frontier_id,
            pattern: pattern.to_string(),
            regex,
            in_memory_only,
            queues,
            queue_index: 0,
            position: 0,
            next_item_number: 1,
            has_next: true,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// False once every queue in the snapshot has been walked
    pub fn has_next(&self) -> bool {
        self.has_next
    }

    /// 1-based number the next listed item will get
    pub fn next_item_number(&self) -> u64 {
        self.next_item_number
    }

    pub(crate) fn current_queue(&self) -> Option<MarkerQueue> {
        self.queues.get(self.queue_index).cloned()
    }

    pub(crate) fn advance_queue(&mut self) {
        self.queue_index += 1;
        self.position = 0;
        self.has_next = self.queue_index < self.queues.len();
    }

    /// Consumes one item at the current position, returning its listing line
    /// if it matches the pattern
    pub(crate) fn take(&mut self, item: &PendingUri, verbose: bool) -> Option<String> {
        self.position += 1;
        if !self.regex.is_match(item.uuri().as_str()) {
            return None;
        }
        self.next_item_number += 1;
        Some(describe(item, verbose))
    }
}

/// Compiles `pattern` so that it must match a whole URI
pub(crate) fn full_match(pattern: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!("^(?:{})$", pattern))
}

fn describe(item: &PendingUri, verbose: bool) -> String {
    if !verbose {
        return item.uuri().to_string();
    }
    match item {
        PendingUri::Candidate(candidate) => format!(
            "{} [{:?}] path={} via={}",
            candidate.uuri,
            candidate.priority,
            candidate.path_from_seed,
            candidate.via.as_deref().unwrap_or("-")
        ),
        PendingUri::Crawl(curi) => format!(
            "{} [{}] attempts={} status={} path={} via={}",
            curi.uuri(),
            curi.store_state,
            curi.fetch_attempts,
            curi.fetch_status,
            curi.candidate.path_from_seed,
            curi.candidate.via.as_deref().unwrap_or("-")
        ),
    }
}
