//! Frontier state guarded by the frontier lock
//!
//! Everything that mutates scheduling state lives here and runs with the lock
//! held: routing pending URIs to emission or to host queues, re-homing queues
//! after a fetch, dispatching dispositions, and releasing prerequisite
//! waiters.

use crate::config::Config;
use crate::frontier::disposition::Disposition;
use crate::frontier::events::CrawlListener;
use crate::frontier::host_queue::HostQueue;
use crate::frontier::marker::MarkerQueue;
use crate::frontier::politeness::PolitenessPolicy;
use crate::frontier::prerequisite::HeldPrerequisites;
use crate::frontier::recovery::{LogTag, RecoveryLog};
use crate::frontier::router::QueueRouter;
use crate::frontier::stats::{FrontierCounters, FrontierStats};
use crate::robots::RobotsPolicy;
use crate::server::{DnsState, ServerCache};
use crate::state::{FetchStatus, StoreState};
use crate::storage::{DiskQueue, FifoQueue, FingerprintSet};
use crate::uri::{CandidateUri, CrawlUri, PendingUri, Priority};
use crate::url::{fingerprint, Scope, Uuri};
use crate::Result;
use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

/// Where a URI going back for another attempt waits
enum RetryPlacement {
    Parked(Uuri),
    Snoozed(i64, CrawlUri),
    Queued,
}

/// Returning URIs jump their host's queue; fresh high-priority and forced
/// URIs queue behind earlier ones of their kind
fn file_under(queue: &mut HostQueue, curi: CrawlUri, returning: bool) -> Result<()> {
    if returning {
        queue.enqueue_front(curi)?;
    } else if curi.force_fetch() || curi.candidate.priority == Priority::High {
        queue.enqueue_urgent(curi)?;
    } else {
        queue.enqueue(curi)?;
    }
    Ok(())
}

pub(crate) struct FrontierState {
    pub(crate) fingerprints: FingerprintSet,
    /// URIs already rescheduled from a recovery log by this frontier
    pub(crate) replayed: FingerprintSet,
    pub(crate) pending_high: DiskQueue<PendingUri>,
    pub(crate) pending_normal: DiskQueue<PendingUri>,
    pub(crate) router: QueueRouter,
    /// classKey -> the URI currently emitted for it
    pub(crate) in_process: HashMap<String, CrawlUri>,
    pub(crate) held: HeldPrerequisites,
    /// Individually snoozed retries, keyed by (wake time, ordinal)
    pub(crate) snoozed_uris: BTreeMap<(i64, u64), CrawlUri>,
    pub(crate) log: RecoveryLog,
    pub(crate) scope: Arc<dyn Scope>,
    pub(crate) servers: Arc<dyn ServerCache>,
    pub(crate) listeners: Vec<Arc<dyn CrawlListener>>,
    pub(crate) terminated: bool,
    politeness: PolitenessPolicy,
    max_retries: u32,
    retry_delay_seconds: u64,
    user_agent: String,
    queue_dir: PathBuf,
    host_queue_capacity: usize,
    counters: Arc<FrontierCounters>,
    next_ordinal: u64,
}

impl FrontierState {
    /// Opens fresh queue files, fingerprint store and recovery log under the
    /// configured state directory
    pub(crate) fn open(
        config: &Config,
        scope: Arc<dyn Scope>,
        servers: Arc<dyn ServerCache>,
        counters: Arc<FrontierCounters>,
    ) -> Result<Self> {
        let state_dir = PathBuf::from(&config.storage.state_dir);
        let queue_dir = state_dir.join("queues");
        fs::create_dir_all(&queue_dir)?;

        let queues = &config.queues;
        let fingerprints = FingerprintSet::open(
            &state_dir.join("fingerprints.db"),
            queues.fingerprint_memory_capacity,
        )?;
        let replayed = FingerprintSet::open(
            &state_dir.join("replayed.db"),
            queues.fingerprint_memory_capacity,
        )?;
        let pending_high = DiskQueue::new(
            state_dir.join("pending-high.jsonl"),
            queues.pending_queue_memory_capacity,
        )?;
        let pending_normal = DiskQueue::new(
            state_dir.join("pending.jsonl"),
            queues.pending_queue_memory_capacity,
        )?;
        let log = RecoveryLog::create(&config.recovery_log_path())?;

        Ok(Self {
            fingerprints,
            replayed,
            pending_high,
            pending_normal,
            router: QueueRouter::new(),
            in_process: HashMap::new(),
            held: HeldPrerequisites::new(),
            snoozed_uris: BTreeMap::new(),
            log,
            scope,
            servers,
            listeners: Vec::new(),
            terminated: false,
            politeness: PolitenessPolicy::from_config(&config.politeness),
            max_retries: config.retry.max_retries,
            retry_delay_seconds: config.retry.retry_delay_seconds,
            user_agent: config.user_agent.crawler_name.clone(),
            queue_dir,
            host_queue_capacity: queues.host_queue_memory_capacity,
            counters,
            next_ordinal: 0,
        })
    }

    // ===== Scheduling =====

    /// Admits a candidate into the matching pending queue
    ///
    /// Returns false when the candidate was rejected by scope or is already
    /// known to be scheduled.
    pub(crate) fn schedule(&mut self, candidate: CandidateUri) -> Result<bool> {
        if !self.scope.accepts(&candidate) {
            tracing::trace!("Out of scope: {}", candidate.uuri);
            FrontierCounters::incr(&self.counters.out_of_scope);
            return Ok(false);
        }
        if !candidate.force_fetch && self.fingerprints.quick_contains(candidate.uuri.fingerprint())
        {
            tracing::trace!("Already included: {}", candidate.uuri);
            return Ok(false);
        }
        self.enqueue_pending(candidate)?;
        Ok(true)
    }

    fn enqueue_pending(&mut self, candidate: CandidateUri) -> Result<()> {
        self.log.append(LogTag::Added, candidate.uuri.as_str())?;
        FrontierCounters::incr(&self.counters.discovered);
        FrontierCounters::incr(&self.counters.queued);

        match candidate.priority {
            Priority::High => self.pending_high.enqueue(candidate.into())?,
            Priority::Normal => self.pending_normal.enqueue(candidate.into())?,
        }
        Ok(())
    }

    // ===== Emission =====

    /// One scheduling pass; returns the URI to hand to a worker, if any
    ///
    /// Due snoozed queues and retries are woken first, then the high pending
    /// queue is drained, then the first READY host queue is served, then the
    /// normal pending queue is drained.
    pub(crate) fn next_ready(&mut self, now: i64) -> Result<Option<CrawlUri>> {
        self.wake_snoozed(now)?;

        while let Some(pending) = self.pending_high.dequeue()? {
            if let Some(curi) = self.route(pending)? {
                return Ok(Some(curi));
            }
        }

        while let Some(key) = self.router.first_ready() {
            let head = match self.router.get_mut(&key) {
                Some(queue) => queue.dequeue()?,
                None => None,
            };
            match head {
                Some(curi) => return self.emit(curi).map(Some),
                None => {
                    tracing::trace!("Discarding empty ready queue {}", key);
                    self.router.discard(&key);
                }
            }
        }

        while let Some(pending) = self.pending_normal.dequeue()? {
            if let Some(curi) = self.route(pending)? {
                return Ok(Some(curi));
            }
        }

        Ok(None)
    }

    fn wake_snoozed(&mut self, now: i64) -> Result<()> {
        for key in self.router.take_due(now) {
            let empty = self.router.get(&key).map_or(true, HostQueue::is_empty);
            if empty {
                self.router.discard(&key);
            } else {
                tracing::trace!("Queue {} woke", key);
                self.router.mark_ready(&key);
            }
        }

        while let Some(entry) = self.snoozed_uris.first_entry() {
            if entry.key().0 > now {
                break;
            }
            let mut curi = entry.remove();
            curi.wake_time = None;
            curi.store_state = StoreState::Pending;
            self.pending_high.enqueue(curi.into())?;
        }
        Ok(())
    }

    /// Promotes a pending entry and either emits it or files it under its host
    fn route(&mut self, pending: PendingUri) -> Result<Option<CrawlUri>> {
        let mut ordinal = 0;
        let returning = pending.is_promoted();
        if !returning {
            let fp = pending.uuri().fingerprint();
            if !pending.force_fetch() && self.fingerprints.contains(fp)? {
                tracing::trace!("Dropping duplicate {}", pending.uuri());
                FrontierCounters::incr(&self.counters.duplicates);
                FrontierCounters::decr(&self.counters.queued, 1);
                return Ok(None);
            }
            self.fingerprints.add(fp)?;
            FrontierCounters::incr(&self.counters.promoted);
            ordinal = self.next_ordinal;
            self.next_ordinal += 1;
        }
        let curi = pending.into_crawl(ordinal);
        self.enqueue_if_necessary(curi, returning)
    }

    /// Emits `curi` or files it under its host
    ///
    /// `returning` marks a URI coming back for another attempt; it goes ahead
    /// of everything its host has queued.
    fn enqueue_if_necessary(
        &mut self,
        curi: CrawlUri,
        returning: bool,
    ) -> Result<Option<CrawlUri>> {
        let key = curi.class_key().to_string();
        let host_busy = self.in_process.contains_key(&key);

        if let Some(queue) = self.router.get_mut(&key) {
            if curi.force_fetch() && queue.state() == StoreState::Ready && !host_busy {
                return self.emit(curi).map(Some);
            }
            file_under(queue, curi, returning)?;
            return Ok(None);
        }

        if host_busy {
            let mut queue = self.new_host_queue(&key)?;
            file_under(&mut queue, curi, returning)?;
            tracing::debug!("Created held queue {}", key);
            self.router.insert_held(queue);
            return Ok(None);
        }

        self.emit(curi).map(Some)
    }

    fn new_host_queue(&self, class_key: &str) -> Result<HostQueue> {
        let path = self
            .queue_dir
            .join(format!("{:016x}.jsonl", fingerprint(class_key)));
        let items = DiskQueue::new(path, self.host_queue_capacity)?;
        Ok(HostQueue::new(class_key, Box::new(items)))
    }

    fn emit(&mut self, mut curi: CrawlUri) -> Result<CrawlUri> {
        let key = curi.class_key().to_string();
        if self
            .router
            .get(&key)
            .is_some_and(|q| q.state() == StoreState::Ready)
        {
            self.router.mark_held(&key);
        }

        self.log.append(LogTag::Emitted, curi.uuri().as_str())?;
        curi.store_state = StoreState::InProcess;
        self.in_process.insert(key, curi.clone());
        FrontierCounters::incr(&self.counters.emitted);
        FrontierCounters::decr(&self.counters.queued, 1);

        tracing::trace!("Emitting {}", curi.uuri());
        Ok(curi)
    }

    // ===== Completion =====

    /// Records a completed attempt and dispatches its disposition
    pub(crate) fn finished(&mut self, mut curi: CrawlUri, now: i64) -> Result<()> {
        curi.fetch_attempts += 1;
        let key = curi.class_key().to_string();

        let current = self.in_process.get(&key).map(|c| c.uuri().clone());
        let was_in_process = match current {
            Some(current) if &current == curi.uuri() => {
                self.in_process.remove(&key);
                true
            }
            Some(current) => {
                tracing::warn!(
                    "Finished {} but {} is in process for {}",
                    curi.uuri(),
                    current,
                    key
                );
                false
            }
            None => {
                tracing::warn!("Finished {} which was not in process", curi.uuri());
                false
            }
        };

        let rehomed = if was_in_process {
            let delay = self.politeness_delay(&curi);
            let end = curi.fetch_completed.unwrap_or(now);
            self.rehome_queue(&key, delay, end)
        } else {
            Ok(())
        };

        let outcome = match rehomed {
            Ok(()) => self.dispose(&mut curi, now),
            Err(e) => Err(e),
        };

        if let Err(e) = outcome {
            tracing::error!("Error disposing of {}: {}", curi.uuri(), e);
            curi.fetch_status = FetchStatus::RUNTIME_EXCEPTION;
            curi.error = Some(e.to_string());
            self.on_unsuccessful(&mut curi, Disposition::Failure)?;
        }
        Ok(())
    }

    fn dispose(&mut self, curi: &mut CrawlUri, now: i64) -> Result<()> {
        let disposition = Disposition::classify(curi, self.max_retries);
        tracing::debug!(
            "{} finished with {} after {} attempt(s): {}",
            curi.uuri(),
            curi.fetch_status,
            curi.fetch_attempts,
            disposition
        );

        match disposition {
            Disposition::Success => self.on_success(curi),
            Disposition::Disregard | Disposition::Failure => {
                self.on_unsuccessful(curi, disposition)
            }
            Disposition::Retry => self.on_retry(curi, now),
        }
    }

    fn politeness_delay(&self, curi: &CrawlUri) -> u64 {
        if curi.fetch_status == FetchStatus::DELETED_BY_USER {
            return 0;
        }
        let crawl_delay = curi
            .uuri()
            .host()
            .and_then(|host| self.servers.server_for(&host))
            .and_then(|server| server.crawl_delay_ms(&self.user_agent));
        self.politeness
            .delay_ms(curi.fetch_began, curi.fetch_completed, crawl_delay)
    }

    /// Puts the host's queue back into rotation after its URI returned
    fn rehome_queue(&mut self, key: &str, delay_ms: u64, end: i64) -> Result<()> {
        if delay_ms > 0 {
            if !self.router.contains(key) {
                let queue = self.new_host_queue(key)?;
                self.router.insert_held(queue);
            }
            let wake = end.saturating_add(i64::try_from(delay_ms).unwrap_or(i64::MAX));
            tracing::trace!("Snoozing {} for {}ms", key, delay_ms);
            self.router.snooze(key, wake);
            return Ok(());
        }

        let empty = match self.router.get(key) {
            Some(queue) => queue.is_empty(),
            None => return Ok(()),
        };
        if empty {
            self.router.discard(key);
        } else {
            self.router.mark_ready(key);
        }
        Ok(())
    }

    fn on_success(&mut self, curi: &mut CrawlUri) -> Result<()> {
        self.log.append(LogTag::Succeeded, curi.uuri().as_str())?;
        FrontierCounters::incr(&self.counters.succeeded);
        FrontierCounters::add(&self.counters.total_bytes, curi.content_size);
        curi.store_state = StoreState::Finished;

        self.settle_prerequisite(curi);
        self.release_held(curi.uuri())?;

        for listener in &self.listeners {
            listener.on_success(curi);
        }
        Ok(())
    }

    /// Disregard and terminal failure share everything but the counter and
    /// the listener callback
    fn on_unsuccessful(&mut self, curi: &mut CrawlUri, disposition: Disposition) -> Result<()> {
        self.log.append(LogTag::Failed, curi.uuri().as_str())?;
        let disregarded = disposition == Disposition::Disregard;
        if disregarded {
            FrontierCounters::incr(&self.counters.disregarded);
        } else {
            FrontierCounters::incr(&self.counters.failed);
        }

        self.settle_prerequisite(curi);
        self.release_held(curi.uuri())?;

        if curi.fetch_status.is_forgettable() {
            self.fingerprints.remove(curi.uuri().fingerprint())?;
            curi.store_state = StoreState::Forgotten;
        } else {
            curi.retire();
            curi.store_state = StoreState::Finished;
        }

        for listener in &self.listeners {
            if disregarded {
                listener.on_disregard(curi);
            } else {
                listener.on_failure(curi);
            }
        }
        Ok(())
    }

    /// Requeues, snoozes or parks a URI for another attempt
    ///
    /// Queue writes happen before the `Fr` line and the retry notifications,
    /// so a write failure leaves the URI to the failure path alone.
    fn on_retry(&mut self, curi: &CrawlUri, now: i64) -> Result<()> {
        let placement = match curi.prerequisite.clone() {
            Some(dependency) => {
                if !self.held.is_waited_on(&dependency) {
                    let candidate = CandidateUri::new(dependency.clone())
                        .with_path_from_seed(curi.candidate.path_from_seed.clone())
                        .with_via(curi.uuri().as_str(), 'P')
                        .with_priority(Priority::High)
                        .forced();
                    self.enqueue_pending(candidate)?;
                }
                RetryPlacement::Parked(dependency)
            }
            None => {
                let mut again = curi.clone();
                again.reset_for_retry();
                let delay_seconds = again.retry_delay.unwrap_or(self.retry_delay_seconds);
                if delay_seconds > 0 {
                    let delay_ms =
                        i64::try_from(delay_seconds.saturating_mul(1000)).unwrap_or(i64::MAX);
                    let wake = now.saturating_add(delay_ms);
                    again.store_state = StoreState::Snoozed;
                    again.wake_time = Some(wake);
                    RetryPlacement::Snoozed(wake, again)
                } else {
                    again.store_state = StoreState::Pending;
                    self.pending_high.enqueue(again.into())?;
                    RetryPlacement::Queued
                }
            }
        };

        self.log.append(LogTag::Rescheduled, curi.uuri().as_str())?;
        FrontierCounters::incr(&self.counters.retried);
        for listener in &self.listeners {
            listener.on_retry(curi);
        }

        match placement {
            RetryPlacement::Parked(dependency) => {
                tracing::debug!("{} waits on {}", curi.uuri(), dependency);
                self.held.park(dependency, curi.clone());
            }
            RetryPlacement::Snoozed(wake, again) => {
                FrontierCounters::incr(&self.counters.queued);
                self.snoozed_uris.insert((wake, again.ordinal), again);
            }
            RetryPlacement::Queued => FrontierCounters::incr(&self.counters.queued),
        }
        Ok(())
    }

    /// Fills in host metadata a finished DNS or robots.txt URI left unrecorded
    fn settle_prerequisite(&self, curi: &CrawlUri) {
        let uuri = curi.uuri();
        let Some(host) = uuri.host() else {
            return;
        };
        let server = self.servers.server_for(&host);

        if uuri.is_dns() {
            let known = server.is_some_and(|s| s.dns != DnsState::Unresolved);
            if known {
                return;
            }
            if curi.fetch_status.is_success() {
                self.servers.record_dns(&host, None);
            } else {
                self.servers.record_dns_failure(&host);
            }
        } else if uuri.is_robots_txt() {
            let fresh = server.is_some_and(|s| !s.is_robots_stale());
            if !fresh {
                self.servers.record_robots(&host, RobotsPolicy::allow_all());
            }
        }
    }

    /// Returns every URI waiting on `dependency` to the high pending queue
    fn release_held(&mut self, dependency: &Uuri) -> Result<()> {
        for mut waiter in self.held.release(dependency) {
            tracing::trace!("Releasing {} after {}", waiter.uuri(), dependency);
            waiter.reset_for_retry();
            waiter.store_state = StoreState::Pending;
            FrontierCounters::incr(&self.counters.queued);
            self.pending_high.enqueue(waiter.into())?;
        }
        Ok(())
    }

    // ===== Inspection =====

    /// True when no queue, in-process slot or snooze holds a URI
    pub(crate) fn is_empty(&self) -> bool {
        self.pending_high.is_empty()
            && self.pending_normal.is_empty()
            && self.in_process.is_empty()
            && self.snoozed_uris.is_empty()
            && self.held.is_empty()
            && self.router.queued_uris() == 0
    }

    pub(crate) fn earliest_wake(&self) -> Option<i64> {
        let uri_wake = self.snoozed_uris.keys().next().map(|(wake, _)| *wake);
        match (self.router.earliest_wake(), uri_wake) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    pub(crate) fn stats(&self) -> FrontierStats {
        let c = &self.counters;
        let pending_high = self.pending_high.len() as u64;
        let pending_normal = self.pending_normal.len() as u64;
        FrontierStats {
            discovered: FrontierCounters::get(&c.discovered),
            queued: FrontierCounters::get(&c.queued),
            in_process: self.in_process.len() as u64,
            finished: c.finished(),
            succeeded: FrontierCounters::get(&c.succeeded),
            failed: FrontierCounters::get(&c.failed),
            disregarded: FrontierCounters::get(&c.disregarded),
            retried: FrontierCounters::get(&c.retried),
            total_bytes: FrontierCounters::get(&c.total_bytes),
            duplicates: FrontierCounters::get(&c.duplicates),
            out_of_scope: FrontierCounters::get(&c.out_of_scope),
            deleted: FrontierCounters::get(&c.deleted),
            pending_estimate: c.pending_estimate(pending_high + pending_normal),
            pending_high,
            pending_normal,
            ready_queues: self.router.ready_count() as u64,
            held_queues: self.router.held_count() as u64,
            snoozed_queues: self.router.snoozed_count() as u64,
            snoozed_uris: self.snoozed_uris.len() as u64,
            held_prerequisites: self.held.len() as u64,
            fingerprints: self.fingerprints.size() as u64,
            fingerprints_ever: self.fingerprints.count(),
            recovery_log_lines: self.log.lines_written(),
        }
    }

    /// Copies a slice of one queue for marker paging
    ///
    /// Returns `None` when a host queue named by the marker no longer exists.
    pub(crate) fn peek_queue(
        &self,
        queue: &MarkerQueue,
        start: usize,
        limit: usize,
        in_memory_only: bool,
    ) -> Result<Option<Vec<PendingUri>>> {
        let items = match queue {
            MarkerQueue::PendingHigh => {
                self.pending_high.peek_range(start, limit, in_memory_only)?
            }
            MarkerQueue::PendingNormal => {
                self.pending_normal.peek_range(start, limit, in_memory_only)?
            }
            MarkerQueue::Host(key) => match self.router.get(key) {
                Some(host) => host
                    .peek_range(start, limit, in_memory_only)?
                    .into_iter()
                    .map(PendingUri::from)
                    .collect(),
                None => return Ok(None),
            },
        };
        Ok(Some(items))
    }

    // ===== Deletion =====

    /// Removes every waiting URI whose string form matches `regex`
    ///
    /// With `only`, just that queue is searched; otherwise every host queue,
    /// both pending queues, snoozed retries and parked dependents are.
    /// URIs already in process are left alone. Dependents of a deleted URI
    /// are released, and host queues emptied by the deletion leave the
    /// router.
    pub(crate) fn delete_matching(
        &mut self,
        regex: &Regex,
        only: Option<&MarkerQueue>,
    ) -> Result<u64> {
        let matches = |uuri: &Uuri| regex.is_match(uuri.as_str());
        let mut deleted: Vec<Uuri> = Vec::new();
        let mut queued_removed = 0u64;

        let host_queues: Vec<&mut HostQueue> = match only {
            None => self.router.queues_mut().collect(),
            Some(MarkerQueue::Host(key)) => self.router.get_mut(key).into_iter().collect(),
            Some(_) => Vec::new(),
        };
        for queue in host_queues {
            let removed = queue.delete_matching(&mut |c: &CrawlUri| matches(c.uuri()))?;
            queued_removed += removed.len() as u64;
            deleted.extend(removed.into_iter().map(|c| c.candidate.uuri));
        }

        let pending = [
            (MarkerQueue::PendingHigh, &mut self.pending_high),
            (MarkerQueue::PendingNormal, &mut self.pending_normal),
        ];
        for (name, queue) in pending {
            if only.is_some_and(|q| *q != name) {
                continue;
            }
            let removed = queue.delete_matching(&mut |p: &PendingUri| matches(p.uuri()))?;
            queued_removed += removed.len() as u64;
            deleted.extend(removed.into_iter().map(|p| p.uuri().clone()));
        }

        if only.is_none() {
            let before = self.snoozed_uris.len();
            self.snoozed_uris.retain(|_, curi| {
                if matches(curi.uuri()) {
                    deleted.push(curi.uuri().clone());
                    false
                } else {
                    true
                }
            });
            queued_removed += (before - self.snoozed_uris.len()) as u64;

            let parked = self.held.remove_matching(|c| matches(c.uuri()));
            deleted.extend(parked.into_iter().map(|c| c.candidate.uuri));
        }

        FrontierCounters::decr(&self.counters.queued, queued_removed);
        FrontierCounters::add(&self.counters.deleted, deleted.len() as u64);

        for uuri in &deleted {
            self.release_held(uuri)?;
        }
        self.settle_queue_states();

        if !deleted.is_empty() {
            tracing::info!("Deleted {} URIs matching {}", deleted.len(), regex);
        }
        Ok(deleted.len() as u64)
    }

    /// Discards queues a deletion emptied and readies held queues whose host
    /// is idle
    fn settle_queue_states(&mut self) {
        for key in self.router.sorted_keys() {
            let Some(queue) = self.router.get(&key) else {
                continue;
            };
            let busy = self.in_process.contains_key(&key);
            match (queue.state(), queue.is_empty()) {
                (StoreState::Ready, true) => {
                    self.router.discard(&key);
                }
                (StoreState::Held, true) if !busy => {
                    self.router.discard(&key);
                }
                (StoreState::Held, false) if !busy => self.router.mark_ready(&key),
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::InMemoryServerCache;
    use crate::url::AcceptAll;
    use tempfile::TempDir;

    fn create_test_config(dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.storage.state_dir = dir.path().to_string_lossy().into_owned();
        config.politeness.min_delay_ms = 0;
        config.politeness.min_interval_ms = 0;
        config.politeness.delay_factor = 0.0;
        config.retry.retry_delay_seconds = 0;
        config
    }

    fn open_state(config: &Config) -> FrontierState {
        FrontierState::open(
            config,
            Arc::new(AcceptAll),
            Arc::new(InMemoryServerCache::new()),
            Arc::new(FrontierCounters::default()),
        )
        .unwrap()
    }

    fn candidate(url: &str) -> CandidateUri {
        CandidateUri::parse(url).unwrap()
    }

    #[test]
    fn test_schedule_then_emit() {
        let dir = TempDir::new().unwrap();
        let mut state = open_state(&create_test_config(&dir));

        assert!(state.schedule(candidate("https://a.example/1")).unwrap());
        let curi = state.next_ready(0).unwrap().unwrap();
        assert_eq!(curi.store_state, StoreState::InProcess);
        assert!(state.in_process.contains_key("a.example"));
        assert!(state.next_ready(0).unwrap().is_none());
    }

    #[test]
    fn test_second_uri_for_busy_host_is_held() {
        let dir = TempDir::new().unwrap();
        let mut state = open_state(&create_test_config(&dir));

        state.schedule(candidate("https://a.example/1")).unwrap();
        state.schedule(candidate("https://a.example/2")).unwrap();
        state.schedule(candidate("https://b.example/1")).unwrap();

        let first = state.next_ready(0).unwrap().unwrap();
        assert_eq!(first.uuri().as_str(), "https://a.example/1");
        let second = state.next_ready(0).unwrap().unwrap();
        assert_eq!(second.uuri().as_str(), "https://b.example/1");
        assert!(state.next_ready(0).unwrap().is_none());

        let queue = state.router.get("a.example").unwrap();
        assert_eq!(queue.state(), StoreState::Held);
        assert_eq!(queue.len(), 1);
        state.router.check_partition().unwrap();
    }

    #[test]
    fn test_duplicate_dropped_at_dequeue() {
        let dir = TempDir::new().unwrap();
        let mut state = open_state(&create_test_config(&dir));

        state.schedule(candidate("https://a.example/1")).unwrap();
        state.schedule(candidate("https://a.example/1")).unwrap();
        let curi = state.next_ready(0).unwrap().unwrap();
        assert!(state.next_ready(0).unwrap().is_none());
        assert_eq!(FrontierCounters::get(&state.counters.duplicates), 1);

        // once fingerprinted, the quick check refuses it outright
        assert!(!state.schedule(candidate("https://a.example/1")).unwrap());

        let mut done = curi;
        done.set_fetch_result(FetchStatus(200), 0, 10);
        state.finished(done, 10).unwrap();
        assert!(state.is_empty());
    }

    #[test]
    fn test_success_returns_queue_to_ready() {
        let dir = TempDir::new().unwrap();
        let mut state = open_state(&create_test_config(&dir));

        state.schedule(candidate("https://a.example/1")).unwrap();
        state.schedule(candidate("https://a.example/2")).unwrap();
        let mut first = state.next_ready(0).unwrap().unwrap();
        assert!(state.next_ready(0).unwrap().is_none());

        first.set_fetch_result(FetchStatus(200), 0, 10);
        state.finished(first, 10).unwrap();
        assert_eq!(state.router.get("a.example").unwrap().state(), StoreState::Ready);

        let second = state.next_ready(10).unwrap().unwrap();
        assert_eq!(second.uuri().as_str(), "https://a.example/2");
        assert_eq!(state.router.get("a.example").unwrap().state(), StoreState::Held);
        state.router.check_partition().unwrap();
    }

    #[test]
    fn test_politeness_snoozes_queue() {
        let dir = TempDir::new().unwrap();
        let mut config = create_test_config(&dir);
        config.politeness.min_delay_ms = 500;
        config.politeness.max_delay_ms = 5_000;
        let mut state = open_state(&config);

        state.schedule(candidate("https://a.example/1")).unwrap();
        state.schedule(candidate("https://a.example/2")).unwrap();
        let mut first = state.next_ready(1_000).unwrap().unwrap();
        assert!(state.next_ready(1_000).unwrap().is_none());

        first.set_fetch_result(FetchStatus(200), 1_000, 1_010);
        state.finished(first, 1_010).unwrap();
        assert_eq!(state.earliest_wake(), Some(1_510));
        assert!(state.next_ready(1_509).unwrap().is_none());

        let second = state.next_ready(1_510).unwrap().unwrap();
        assert_eq!(second.uuri().as_str(), "https://a.example/2");
    }

    #[test]
    fn test_robots_crawl_delay_raises_snooze() {
        let dir = TempDir::new().unwrap();
        let mut config = create_test_config(&dir);
        config.user_agent.crawler_name = "TestBot".to_string();
        let mut state = open_state(&config);
        state.servers.record_robots(
            "a.example",
            RobotsPolicy::from_content("User-agent: *\nCrawl-delay: 2"),
        );

        state.schedule(candidate("https://a.example/1")).unwrap();
        let mut curi = state.next_ready(0).unwrap().unwrap();
        curi.set_fetch_result(FetchStatus(200), 100, 150);
        state.finished(curi, 150).unwrap();

        assert_eq!(state.earliest_wake(), Some(2_150));
        assert_eq!(state.router.snoozed_count(), 1);
        // the empty queue is dropped once it wakes
        assert!(state.next_ready(2_150).unwrap().is_none());
        assert!(state.router.is_empty());
    }

    #[test]
    fn test_high_priority_goes_to_queue_front() {
        let dir = TempDir::new().unwrap();
        let mut state = open_state(&create_test_config(&dir));

        state.schedule(candidate("https://a.example/1")).unwrap();
        state.schedule(candidate("https://a.example/2")).unwrap();
        let mut first = state.next_ready(0).unwrap().unwrap();
        assert!(state.next_ready(0).unwrap().is_none());

        state
            .schedule(candidate("https://a.example/urgent").with_priority(Priority::High))
            .unwrap();
        assert!(state.next_ready(0).unwrap().is_none());

        first.set_fetch_result(FetchStatus(200), 0, 1);
        state.finished(first, 1).unwrap();
        let next = state.next_ready(1).unwrap().unwrap();
        assert_eq!(next.uuri().as_str(), "https://a.example/urgent");
    }

    #[test]
    fn test_high_priority_uris_for_busy_host_keep_their_order() {
        let dir = TempDir::new().unwrap();
        let mut state = open_state(&create_test_config(&dir));

        state.schedule(candidate("https://a.example/0")).unwrap();
        state.schedule(candidate("https://a.example/plain")).unwrap();
        let mut busy = state.next_ready(0).unwrap().unwrap();
        assert!(state.next_ready(0).unwrap().is_none());

        for path in ["h1", "h2", "h3"] {
            let url = format!("https://a.example/{}", path);
            state
                .schedule(candidate(&url).with_priority(Priority::High))
                .unwrap();
        }
        assert!(state.next_ready(0).unwrap().is_none());

        busy.set_fetch_result(FetchStatus(200), 0, 1);
        state.finished(busy, 1).unwrap();

        let mut order = Vec::new();
        while let Some(mut curi) = state.next_ready(1).unwrap() {
            order.push(curi.uuri().to_string());
            curi.set_fetch_result(FetchStatus(200), 1, 1);
            state.finished(curi, 1).unwrap();
        }
        assert_eq!(
            order,
            vec![
                "https://a.example/h1",
                "https://a.example/h2",
                "https://a.example/h3",
                "https://a.example/plain"
            ]
        );
    }

    #[test]
    fn test_first_high_priority_uri_for_busy_host_without_queue() {
        let dir = TempDir::new().unwrap();
        let mut state = open_state(&create_test_config(&dir));

        state.schedule(candidate("https://a.example/0")).unwrap();
        let mut busy = state.next_ready(0).unwrap().unwrap();
        for path in ["h1", "h2"] {
            let url = format!("https://a.example/{}", path);
            state
                .schedule(candidate(&url).with_priority(Priority::High))
                .unwrap();
        }
        // h1 creates the held queue, h2 joins it
        assert!(state.next_ready(0).unwrap().is_none());

        busy.set_fetch_result(FetchStatus(200), 0, 1);
        state.finished(busy, 1).unwrap();
        let next = state.next_ready(1).unwrap().unwrap();
        assert_eq!(next.uuri().as_str(), "https://a.example/h1");
    }

    #[test]
    fn test_rehome_fault_becomes_failure() {
        let dir = TempDir::new().unwrap();
        let mut config = create_test_config(&dir);
        config.politeness.min_delay_ms = 500;
        config.politeness.max_delay_ms = 5_000;
        let mut state = open_state(&config);

        state.schedule(candidate("https://a.example/1")).unwrap();
        let mut curi = state.next_ready(0).unwrap().unwrap();

        // snoozing needs a queue file, and the queue directory is now a file
        fs::remove_dir_all(&state.queue_dir).unwrap();
        fs::write(&state.queue_dir, b"").unwrap();

        curi.set_fetch_result(FetchStatus(200), 0, 10);
        state.finished(curi, 10).unwrap();

        assert!(state.in_process.is_empty());
        assert_eq!(FrontierCounters::get(&state.counters.succeeded), 0);
        assert_eq!(FrontierCounters::get(&state.counters.failed), 1);
        assert!(state.is_empty());
    }

    #[test]
    fn test_retry_fault_is_not_counted_as_retry() {
        let dir = TempDir::new().unwrap();
        let mut config = create_test_config(&dir);
        config.queues.pending_queue_memory_capacity = 1;
        let mut state = open_state(&config);

        state.schedule(candidate("https://a.example/1")).unwrap();
        let mut curi = state.next_ready(0).unwrap().unwrap();
        // fills the in-memory head so the retry has to spill
        state
            .schedule(candidate("https://b.example/1").with_priority(Priority::High))
            .unwrap();
        let spill = dir.path().join("pending-high.jsonl");
        fs::remove_file(&spill).unwrap();
        fs::create_dir(&spill).unwrap();

        curi.fetch_status = FetchStatus::CONNECT_FAILED;
        state.finished(curi, 0).unwrap();

        assert_eq!(FrontierCounters::get(&state.counters.retried), 0);
        assert_eq!(FrontierCounters::get(&state.counters.failed), 1);
        assert_eq!(state.pending_high.len(), 1);
        assert!(state.snoozed_uris.is_empty());
    }

    #[test]
    fn test_retry_with_delay_snoozes_uri() {
        let dir = TempDir::new().unwrap();
        let mut config = create_test_config(&dir);
        config.retry.retry_delay_seconds = 2;
        let mut state = open_state(&config);

        state.schedule(candidate("https://a.example/1")).unwrap();
        let mut curi = state.next_ready(0).unwrap().unwrap();
        curi.fetch_status = FetchStatus::CONNECT_FAILED;
        state.finished(curi, 100).unwrap();

        assert_eq!(state.snoozed_uris.len(), 1);
        assert!(!state.is_empty());
        assert_eq!(state.earliest_wake(), Some(2_100));
        assert!(state.next_ready(2_000).unwrap().is_none());

        let again = state.next_ready(2_100).unwrap().unwrap();
        assert_eq!(again.fetch_attempts, 1);
        assert_eq!(again.fetch_status, FetchStatus::UNATTEMPTED);
    }

    #[test]
    fn test_forgettable_failure_releases_fingerprint() {
        let dir = TempDir::new().unwrap();
        let mut state = open_state(&create_test_config(&dir));

        state.schedule(candidate("https://a.example/1")).unwrap();
        let mut curi = state.next_ready(0).unwrap().unwrap();
        curi.fetch_status = FetchStatus::OUT_OF_SCOPE;
        state.finished(curi, 0).unwrap();

        assert_eq!(state.fingerprints.size(), 0);
        assert_eq!(FrontierCounters::get(&state.counters.disregarded), 1);
        assert!(state.schedule(candidate("https://a.example/1")).unwrap());
    }

    #[test]
    fn test_failed_dns_prerequisite_records_failure() {
        let dir = TempDir::new().unwrap();
        let mut state = open_state(&create_test_config(&dir));

        state.schedule(candidate("dns:a.example")).unwrap();
        let mut dns = state.next_ready(0).unwrap().unwrap();
        dns.fetch_status = FetchStatus::DOMAIN_UNRESOLVABLE;
        state.finished(dns, 0).unwrap();

        let server = state.servers.server_for("a.example").unwrap();
        assert_eq!(server.dns, DnsState::Failed);
    }

    #[test]
    fn test_delete_matching_cleans_queues() {
        let dir = TempDir::new().unwrap();
        let mut state = open_state(&create_test_config(&dir));

        state.schedule(candidate("https://a.example/1")).unwrap();
        state.schedule(candidate("https://a.example/private/2")).unwrap();
        state.schedule(candidate("https://b.example/private/3")).unwrap();
        let first = state.next_ready(0).unwrap().unwrap();
        assert_eq!(first.uuri().as_str(), "https://a.example/1");
        // routes a.example/private/2 into a held queue, emits b.example
        state.next_ready(0).unwrap().unwrap();
        state
            .schedule(candidate("https://c.example/private/4"))
            .unwrap();

        let regex = Regex::new("^.*/private/.*$").unwrap();
        assert_eq!(state.delete_matching(&regex, None).unwrap(), 2);
        assert!(state.router.get("a.example").is_some());
        assert!(state.router.get("a.example").unwrap().is_empty());
        assert_eq!(FrontierCounters::get(&state.counters.queued), 0);
        assert!(state.pending_normal.is_empty());
        state.router.check_partition().unwrap();
    }
}
