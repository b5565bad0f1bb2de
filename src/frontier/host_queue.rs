//! The queue of not-yet-emitted URIs sharing one classKey
//!
//! A host queue has two segments. High-priority and forced URIs wait in a
//! small in-memory segment that is always served first; everything else
//! waits in the backing queue, which may spill to disk.

use crate::state::StoreState;
use crate::storage::{FifoQueue, MemQueue, StorageResult};
use crate::uri::CrawlUri;

/// Backing store of a host queue
pub type HostQueueBacking = Box<dyn FifoQueue<CrawlUri> + Send>;

pub struct HostQueue {
    class_key: String,
    urgent: MemQueue<CrawlUri>,
    items: HostQueueBacking,
    state: StoreState,
    /// Meaningful only while snoozed
    wake_time: Option<i64>,
}

impl HostQueue {
    /// Creates an empty queue in the HELD state
    pub fn new(class_key: impl Into<String>, items: HostQueueBacking) -> Self {
        Self {
            class_key: class_key.into(),
            urgent: MemQueue::new(),
            items,
            state: StoreState::Held,
            wake_time: None,
        }
    }

    pub fn class_key(&self) -> &str {
        &self.class_key
    }

    pub fn state(&self) -> StoreState {
        self.state
    }

    pub fn wake_time(&self) -> Option<i64> {
        self.wake_time
    }

    /// Only the router changes queue states
    pub(crate) fn set_state(&mut self, state: StoreState, wake_time: Option<i64>) {
        self.state = state;
        self.wake_time = wake_time;
    }

    /// Appends a URI at the tail
    pub fn enqueue(&mut self, mut curi: CrawlUri) -> StorageResult<()> {
        curi.store_state = self.state;
        self.items.enqueue(curi)
    }

    /// Queues a URI behind earlier urgent URIs but ahead of ordinary ones
    pub fn enqueue_urgent(&mut self, mut curi: CrawlUri) -> StorageResult<()> {
        curi.store_state = self.state;
        self.urgent.enqueue(curi)
    }

    /// Places a URI ahead of everything queued
    pub fn enqueue_front(&mut self, mut curi: CrawlUri) -> StorageResult<()> {
        curi.store_state = self.state;
        self.urgent.enqueue_front(curi)
    }

    pub fn dequeue(&mut self) -> StorageResult<Option<CrawlUri>> {
        match self.urgent.dequeue()? {
            Some(curi) => Ok(Some(curi)),
            None => self.items.dequeue(),
        }
    }

    pub fn len(&self) -> usize {
        self.urgent.len() + self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urgent.is_empty() && self.items.is_empty()
    }

    /// Copies queued URIs in emission order, urgent segment first
    pub fn peek_range(
        &self,
        start: usize,
        limit: usize,
        in_memory_only: bool,
    ) -> StorageResult<Vec<CrawlUri>> {
        let mut items = self.urgent.peek_range(start, limit, in_memory_only)?;
        if items.len() < limit {
            let rest_start = start.saturating_sub(self.urgent.len());
            let more = self
                .items
                .peek_range(rest_start, limit - items.len(), in_memory_only)?;
            items.extend(more);
        }
        Ok(items)
    }

    pub fn delete_matching(
        &mut self,
        predicate: &mut dyn FnMut(&CrawlUri) -> bool,
    ) -> StorageResult<Vec<CrawlUri>> {
        let mut removed = self.urgent.delete_matching(predicate)?;
        removed.extend(self.items.delete_matching(predicate)?);
        Ok(removed)
    }
}

impl std::fmt::Debug for HostQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostQueue")
            .field("class_key", &self.class_key)
            .field("state", &self.state)
            .field("wake_time", &self.wake_time)
            .field("urgent", &self.urgent.len())
            .field("len", &self.items.len())
            .finish()
    }
}
