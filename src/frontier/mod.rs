//! The frontier: which discovered URI a crawl worker may fetch next
//!
//! This module handles:
//! - Admitting candidates (scope, duplicate suppression, priority tiers)
//! - Per-host queues rotated through READY, HELD and SNOOZED
//! - Politeness delays between fetches to the same host
//! - Retries, prerequisites and dispositions of finished attempts
//! - The recovery log and its replay
//! - Marker paging and deletion of queued URIs
//!
//! Workers share one `Frontier` and loop over `next()` / `finished()`. All
//! scheduling state sits behind a single mutex; `next()` waits on a condition
//! variable that scheduling and `finished()` signal.

mod disposition;
mod events;
mod host_queue;
mod marker;
mod politeness;
mod prerequisite;
mod recovery;
mod router;
mod scheduler;
mod stats;

pub use disposition::Disposition;
pub use events::CrawlListener;
pub use host_queue::{HostQueue, HostQueueBacking};
pub use marker::{FrontierMarker, MarkerQueue};
pub use politeness::PolitenessPolicy;
pub use prerequisite::{evaluate as evaluate_preconditions, HeldPrerequisites, Precondition};
pub use recovery::{for_each_entry, parse_line, LogTag, RecoveryLog, ReplaySummary};
pub use router::QueueRouter;
pub use stats::{FrontierCounters, FrontierStats};

use crate::config::Config;
use crate::server::{InMemoryServerCache, ServerCache};
use crate::state::now_millis;
use crate::uri::{CandidateUri, CrawlUri, Priority};
use crate::url::{DomainScope, Scope, Uuri};
use crate::{FrontierError, Result};
use self::marker::{full_match, PEEK_CHUNK};
use self::scheduler::FrontierState;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

static NEXT_FRONTIER_ID: AtomicU64 = AtomicU64::new(1);

/// Candidates a thread has staged but not yet flushed
#[derive(Debug, Default)]
struct StagedBatch {
    high: Vec<CandidateUri>,
    normal: Vec<CandidateUri>,
}

thread_local! {
    /// Staging buffers of the current thread, keyed by frontier id
    static STAGED: RefCell<HashMap<u64, StagedBatch>> = RefCell::new(HashMap::new());
}

/// Outcome of a call to [`Frontier::next`]
#[derive(Debug, Clone, PartialEq)]
pub enum NextUri {
    /// A URI the worker now owns until it calls `finished`
    Uri(CrawlUri),
    /// Nothing became available before the timeout
    TimedOut,
    /// No URI is queued, snoozed or in process anywhere
    Exhausted,
    /// The frontier was terminated
    Terminated,
}

pub struct Frontier {
    id: u64,
    state: Mutex<FrontierState>,
    available: Condvar,
    counters: Arc<FrontierCounters>,
    servers: Arc<dyn ServerCache>,
    user_agent: String,
}

impl Frontier {
    /// Creates a frontier with fresh queues under the configured state
    /// directory
    ///
    /// The scope is built from the configured seed and blacklist domains, and
    /// host metadata is kept in an in-memory server cache. Any recovery log
    /// already at the configured path is truncated.
    pub fn new(config: &Config) -> Result<Self> {
        let counters = Arc::new(FrontierCounters::default());
        let servers: Arc<dyn ServerCache> = Arc::new(InMemoryServerCache::new());
        let scope: Arc<dyn Scope> = Arc::new(DomainScope::from_config(config));
        let state = FrontierState::open(config, scope, servers.clone(), counters.clone())?;

        tracing::debug!(
            "Frontier opened in {} (recovery log {})",
            config.storage.state_dir,
            config.recovery_log_path().display()
        );

        Ok(Self {
            id: NEXT_FRONTIER_ID.fetch_add(1, Ordering::Relaxed),
            state: Mutex::new(state),
            available: Condvar::new(),
            counters,
            servers,
            user_agent: config.user_agent.crawler_name.clone(),
        })
    }

    /// Replaces the scope consulted by `schedule`
    pub fn with_scope(mut self, scope: Arc<dyn Scope>) -> Self {
        self.state_mut().scope = scope;
        self
    }

    /// Replaces the host metadata cache
    pub fn with_server_cache(mut self, servers: Arc<dyn ServerCache>) -> Self {
        self.state_mut().servers = servers.clone();
        self.servers = servers;
        self
    }

    fn state_mut(&mut self) -> &mut FrontierState {
        self.state
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock(&self) -> Result<MutexGuard<'_, FrontierState>> {
        self.state.lock().map_err(|_| FrontierError::LockPoisoned)
    }

    pub fn add_listener(&self, listener: Arc<dyn CrawlListener>) -> Result<()> {
        self.lock()?.listeners.push(listener);
        Ok(())
    }

    pub fn server_cache(&self) -> Arc<dyn ServerCache> {
        self.servers.clone()
    }

    // ===== Scheduling =====

    /// Schedules a candidate at its own priority
    ///
    /// # Returns
    ///
    /// `true` if the candidate was queued, `false` if it was out of scope or
    /// already scheduled.
    pub fn schedule(&self, candidate: CandidateUri) -> Result<bool> {
        let queued = self.lock()?.schedule(candidate)?;
        if queued {
            self.available.notify_all();
        }
        Ok(queued)
    }

    /// Schedules a candidate at high priority
    pub fn schedule_high(&self, candidate: CandidateUri) -> Result<bool> {
        self.schedule(candidate.with_priority(Priority::High))
    }

    /// Stages a candidate in the calling thread's buffer without locking
    ///
    /// Staged candidates reach the frontier at the next `batch_flush` (or
    /// `finished`) on the same thread.
    pub fn batch_schedule(&self, candidate: CandidateUri) {
        let high = candidate.priority == Priority::High;
        self.stage(candidate, high);
    }

    /// Stages a candidate at high priority
    pub fn batch_schedule_high(&self, candidate: CandidateUri) {
        self.stage(candidate.with_priority(Priority::High), true);
    }

    fn stage(&self, candidate: CandidateUri, high: bool) {
        STAGED.with(|staged| {
            let mut staged = staged.borrow_mut();
            let batch = staged.entry(self.id).or_default();
            if high {
                batch.high.push(candidate);
            } else {
                batch.normal.push(candidate);
            }
        });
    }

    /// Schedules everything the calling thread has staged, high tier first
    ///
    /// Returns the number of candidates that were queued.
    pub fn batch_flush(&self) -> Result<usize> {
        let Some(batch) = STAGED.with(|staged| staged.borrow_mut().remove(&self.id)) else {
            return Ok(0);
        };
        if batch.high.is_empty() && batch.normal.is_empty() {
            return Ok(0);
        }

        let mut state = self.lock()?;
        let mut queued = 0;
        for candidate in batch.high.into_iter().chain(batch.normal) {
            if state.schedule(candidate)? {
                queued += 1;
            }
        }
        drop(state);

        if queued > 0 {
            self.available.notify_all();
        }
        Ok(queued)
    }

    /// Schedules every seed URL in `config` at high priority
    pub fn load_seeds(&self, config: &Config) -> Result<usize> {
        let mut queued = 0;
        for entry in &config.seed {
            for url in &entry.urls {
                match Uuri::parse(url) {
                    Ok(uuri) => {
                        if self.schedule(CandidateUri::seed(uuri))? {
                            queued += 1;
                        }
                    }
                    Err(e) => tracing::warn!("Skipping seed {}: {}", url, e),
                }
            }
        }
        tracing::info!("Loaded {} seed URIs", queued);
        Ok(queued)
    }

    // ===== Worker protocol =====

    /// Hands out the next URI a worker may fetch
    ///
    /// Blocks for at most `timeout_ms` while URIs exist but none may be
    /// fetched yet (their hosts are busy or snoozed). The timeout is advisory:
    /// the wait may end early when the frontier changes.
    pub fn next(&self, timeout_ms: u64) -> Result<NextUri> {
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        let mut state = self.lock()?;

        loop {
            if state.terminated {
                return Ok(NextUri::Terminated);
            }
            let now = now_millis();
            if let Some(curi) = state.next_ready(now)? {
                return Ok(NextUri::Uri(curi));
            }
            if state.is_empty() {
                return Ok(NextUri::Exhausted);
            }

            let current = Instant::now();
            if current >= deadline {
                return Ok(NextUri::TimedOut);
            }
            let mut wait = deadline - current;
            if let Some(wake) = state.earliest_wake() {
                let until_wake = u64::try_from(wake.saturating_sub(now)).unwrap_or(0).max(1);
                wait = wait.min(Duration::from_millis(until_wake));
            }

            state = self
                .available
                .wait_timeout(state, wait)
                .map_err(|_| FrontierError::LockPoisoned)?
                .0;
        }
    }

    /// Reports the end of an attempt on a URI obtained from `next`
    ///
    /// Flushes the calling thread's staged candidates first. Faults while
    /// disposing of the URI are recorded as a runtime-exception failure
    /// rather than returned.
    pub fn finished(&self, curi: CrawlUri) -> Result<()> {
        self.batch_flush()?;
        let result = self.lock()?.finished(curi, now_millis());
        self.available.notify_all();
        result
    }

    /// Checks `curi` against its host's DNS and robots.txt state
    ///
    /// A deferred URI gets its prerequisite recorded; a precluded one gets
    /// the precluding status. Either way the worker should pass it straight
    /// to `finished` without fetching.
    pub fn check_preconditions(&self, curi: &mut CrawlUri) -> Precondition {
        let server = curi
            .uuri()
            .host()
            .and_then(|host| self.servers.server_for(&host));
        let precondition = prerequisite::evaluate(curi, server.as_ref(), &self.user_agent);
        match &precondition {
            Precondition::Proceed => {}
            Precondition::Deferred(dependency) => {
                tracing::debug!("{} deferred until {}", curi.uuri(), dependency);
                curi.defer_to(dependency.clone());
            }
            Precondition::Precluded(status) => {
                tracing::debug!("{} precluded: {}", curi.uuri(), status);
                curi.fetch_status = *status;
            }
        }
        precondition
    }

    // ===== Lifecycle =====

    /// True when no URI is queued, snoozed, parked or in process
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.lock()?.is_empty())
    }

    /// Stops `next` from handing out further URIs
    ///
    /// URIs already in process may still be reported through `finished`.
    pub fn terminate(&self) -> Result<()> {
        self.lock()?.terminated = true;
        self.available.notify_all();
        tracing::info!("Frontier terminated");
        Ok(())
    }

    pub fn is_terminated(&self) -> Result<bool> {
        Ok(self.lock()?.terminated)
    }

    /// Waits until no URI is in process
    ///
    /// Returns `false` if URIs were still in process when `timeout` elapsed.
    pub fn await_quiescence(&self, timeout: Duration) -> Result<bool> {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock()?;
        loop {
            if state.in_process.is_empty() {
                return Ok(true);
            }
            let current = Instant::now();
            if current >= deadline {
                return Ok(false);
            }
            state = self
                .available
                .wait_timeout(state, deadline - current)
                .map_err(|_| FrontierError::LockPoisoned)?
                .0;
        }
    }

    // ===== Recovery =====

    /// Rebuilds scheduling state from a recovery log written by an earlier
    /// frontier
    ///
    /// Pass one records every successfully finished URI as already included
    /// (and writes it to this frontier's log). Pass two schedules every added
    /// URI that was not finished and that no earlier replay into this
    /// frontier already scheduled, so replaying a log twice adds nothing.
    pub fn import_recover_log(&self, path: &Path) -> Result<ReplaySummary> {
        let mut state = self.lock()?;
        let same_file = match (fs::canonicalize(path), fs::canonicalize(state.log.path())) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        };
        if same_file {
            return Err(FrontierError::Recovery {
                line: 0,
                message: format!("{} is the log being written", path.display()),
            });
        }

        let via = path.display().to_string();
        let mut summary = ReplaySummary::default();

        let malformed = for_each_entry(path, |tag, uri| -> Result<()> {
            if tag != LogTag::Succeeded {
                return Ok(());
            }
            let Ok(uuri) = Uuri::parse(uri) else {
                summary.skipped_lines += 1;
                return Ok(());
            };
            if state.fingerprints.add(uuri.fingerprint())? {
                state.log.append(LogTag::Succeeded, uuri.as_str())?;
                summary.completed += 1;
            }
            Ok(())
        })?;
        summary.skipped_lines += malformed.len() as u64;
        for line in &malformed {
            tracing::warn!("Skipping malformed line {} of {}", line, via);
        }

        for_each_entry(path, |tag, uri| -> Result<()> {
            if tag != LogTag::Added {
                return Ok(());
            }
            let Ok(uuri) = Uuri::parse(uri) else {
                summary.skipped_lines += 1;
                return Ok(());
            };
            let fp = uuri.fingerprint();
            if state.fingerprints.contains(fp)? || !state.replayed.add(fp)? {
                summary.already_included += 1;
                return Ok(());
            }
            let candidate = CandidateUri::new(uuri).with_via(via.as_str(), 'L');
            if state.schedule(candidate)? {
                summary.rescheduled += 1;
            } else {
                summary.already_included += 1;
            }
            Ok(())
        })?;
        drop(state);

        self.available.notify_all();
        tracing::info!(
            "Replayed {}: {} completed, {} rescheduled, {} already included, {} skipped",
            via,
            summary.completed,
            summary.rescheduled,
            summary.already_included,
            summary.skipped_lines
        );
        Ok(summary)
    }

    // ===== Paging and deletion =====

    /// Creates a cursor over every queued URI matching `pattern`
    ///
    /// The pattern must match a whole URI. With `in_memory_only`, spilled
    /// queue segments are not read.
    pub fn get_initial_marker(&self, pattern: &str, in_memory_only: bool) -> Result<FrontierMarker> {
        let keys = self.lock()?.router.sorted_keys();
        Ok(FrontierMarker::new(self.id, pattern, in_memory_only, keys)?)
    }

    /// Lists up to `count` matching URIs from `marker` onwards, advancing it
    pub fn get_uris_list(
        &self,
        marker: &mut FrontierMarker,
        count: usize,
        verbose: bool,
    ) -> Result<Vec<String>> {
        if marker.frontier_id != self.id {
            return Err(FrontierError::InvalidMarker);
        }
        let state = self.lock()?;
        let mut lines = Vec::new();

        while lines.len() < count {
            let Some(queue) = marker.current_queue() else {
                break;
            };
            let chunk = match state.peek_queue(
                &queue,
                marker.position,
                PEEK_CHUNK,
                marker.in_memory_only,
            )? {
                Some(chunk) if !chunk.is_empty() => chunk,
                _ => {
                    marker.advance_queue();
                    continue;
                }
            };
            for item in &chunk {
                if let Some(line) = marker.take(item, verbose) {
                    lines.push(line);
                    if lines.len() == count {
                        break;
                    }
                }
            }
        }
        Ok(lines)
    }

    /// Removes every queued URI matching `pattern` (whole-URI match)
    ///
    /// Returns the number of URIs removed.
    pub fn delete_uris(&self, pattern: &str) -> Result<u64> {
        let regex = full_match(pattern)?;
        let deleted = self.lock()?.delete_matching(&regex, None)?;
        self.available.notify_all();
        Ok(deleted)
    }

    /// Removes the URIs in one queue that match `pattern` (whole-URI match)
    ///
    /// Snoozed retries and parked dependents belong to no queue and are left
    /// alone. Returns the number of URIs removed.
    pub fn delete_uris_in_queue(&self, queue: &MarkerQueue, pattern: &str) -> Result<u64> {
        let regex = full_match(pattern)?;
        let deleted = self.lock()?.delete_matching(&regex, Some(queue))?;
        self.available.notify_all();
        Ok(deleted)
    }

    // ===== Counters =====

    pub fn discovered_uri_count(&self) -> u64 {
        FrontierCounters::get(&self.counters.discovered)
    }

    pub fn queued_uri_count(&self) -> u64 {
        FrontierCounters::get(&self.counters.queued)
    }

    pub fn successfully_fetched_count(&self) -> u64 {
        FrontierCounters::get(&self.counters.succeeded)
    }

    pub fn failed_fetch_count(&self) -> u64 {
        FrontierCounters::get(&self.counters.failed)
    }

    pub fn disregarded_fetch_count(&self) -> u64 {
        FrontierCounters::get(&self.counters.disregarded)
    }

    pub fn finished_uri_count(&self) -> u64 {
        self.counters.finished()
    }

    pub fn total_bytes_written(&self) -> u64 {
        FrontierCounters::get(&self.counters.total_bytes)
    }

    pub fn deleted_uri_count(&self) -> u64 {
        FrontierCounters::get(&self.counters.deleted)
    }

    /// Estimated distinct URIs waiting in the pending queues
    pub fn pending_uri_count(&self) -> Result<u64> {
        Ok(self.stats()?.pending_estimate)
    }

    pub fn stats(&self) -> Result<FrontierStats> {
        Ok(self.lock()?.stats())
    }

    /// Human-readable frontier report
    pub fn report(&self) -> Result<String> {
        Ok(self.stats()?.to_string())
    }
}

impl Drop for Frontier {
    fn drop(&mut self) {
        let id = self.id;
        // the thread-local may already be gone during thread teardown
        let _ = STAGED.try_with(|staged| {
            if let Ok(mut staged) = staged.try_borrow_mut() {
                staged.remove(&id);
            }
        });
    }
}

impl std::fmt::Debug for Frontier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frontier")
            .field("id", &self.id)
            .field("discovered", &self.discovered_uri_count())
            .field("queued", &self.queued_uri_count())
            .field("finished", &self.finished_uri_count())
            .finish()
    }
}
