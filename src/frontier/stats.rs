//! Frontier counters and the operator report

use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic and gauge counters, written under the frontier lock and read
/// without it
#[derive(Debug, Default)]
pub struct FrontierCounters {
    pub discovered: AtomicU64,
    pub queued: AtomicU64,
    pub emitted: AtomicU64,
    pub succeeded: AtomicU64,
    pub failed: AtomicU64,
    pub disregarded: AtomicU64,
    pub retried: AtomicU64,
    pub total_bytes: AtomicU64,
    pub duplicates: AtomicU64,
    pub promoted: AtomicU64,
    pub out_of_scope: AtomicU64,
    pub deleted: AtomicU64,
}

impl FrontierCounters {
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    /// Decrements without wrapping below zero
    pub fn decr(counter: &AtomicU64, n: u64) {
        let _ = counter.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
            Some(v.saturating_sub(n))
        });
    }

    pub fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }

    pub fn finished(&self) -> u64 {
        Self::get(&self.succeeded) + Self::get(&self.failed) + Self::get(&self.disregarded)
    }

    /// Estimated count of distinct URIs still waiting in the pending queues
    ///
    /// Pending entries have not passed the authoritative duplicate check yet,
    /// so the raw count is discounted by the duplicate ratio observed so far.
    pub fn pending_estimate(&self, pending_len: u64) -> u64 {
        let promoted = Self::get(&self.promoted);
        let duplicates = Self::get(&self.duplicates);
        let seen = promoted + duplicates;
        if seen == 0 {
            return pending_len;
        }
        let discount = duplicates as f64 / seen as f64;
        (pending_len as f64 * (1.0 - discount)).round() as u64
    }
}

/// Point-in-time snapshot of the frontier
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FrontierStats {
    pub discovered: u64,
    pub queued: u64,
    pub in_process: u64,
    pub finished: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub disregarded: u64,
    pub retried: u64,
    pub total_bytes: u64,
    pub duplicates: u64,
    pub out_of_scope: u64,
    pub deleted: u64,
    pub pending_estimate: u64,
    pub pending_high: u64,
    pub pending_normal: u64,
    pub ready_queues: u64,
    pub held_queues: u64,
    pub snoozed_queues: u64,
    pub snoozed_uris: u64,
    pub held_prerequisites: u64,
    pub fingerprints: u64,
    pub fingerprints_ever: u64,
    pub recovery_log_lines: u64,
}

impl fmt::Display for FrontierStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Frontier Report ===")?;
        writeln!(f)?;
        writeln!(f, "URIs:")?;
        writeln!(f, "  Discovered: {}", self.discovered)?;
        writeln!(f, "  Queued: {}", self.queued)?;
        writeln!(f, "  In process: {}", self.in_process)?;
        writeln!(f, "  Finished: {}", self.finished)?;
        writeln!(f, "    Succeeded: {}", self.succeeded)?;
        writeln!(f, "    Failed: {}", self.failed)?;
        writeln!(f, "    Disregarded: {}", self.disregarded)?;
        writeln!(f, "  Retries: {}", self.retried)?;
        writeln!(f, "  Duplicates dropped: {}", self.duplicates)?;
        writeln!(f, "  Out of scope: {}", self.out_of_scope)?;
        writeln!(f, "  Deleted: {}", self.deleted)?;
        writeln!(f, "  Bytes fetched: {}", self.total_bytes)?;
        writeln!(f)?;
        writeln!(f, "Queues:")?;
        writeln!(
            f,
            "  Pending: {} high, {} normal (~{} distinct)",
            self.pending_high, self.pending_normal, self.pending_estimate
        )?;
        writeln!(
            f,
            "  Host queues: {} ready, {} held, {} snoozed",
            self.ready_queues, self.held_queues, self.snoozed_queues
        )?;
        writeln!(f, "  Snoozed URIs: {}", self.snoozed_uris)?;
        writeln!(f, "  Waiting on prerequisites: {}", self.held_prerequisites)?;
        writeln!(f)?;
        writeln!(
            f,
            "Already included: {} ({} ever added)",
            self.fingerprints, self.fingerprints_ever
        )?;
        write!(f, "Recovery log lines: {}", self.recovery_log_lines)
    }
}
