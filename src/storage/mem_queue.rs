//! Purely in-memory FIFO
//!
//! Used for per-thread staging buffers and as a drop-in backing where no
//! spillover is wanted.

use crate::storage::traits::{FifoQueue, StorageResult};
use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct MemQueue<T> {
    items: VecDeque<T>,
}

impl<T> MemQueue<T> {
    pub fn new() -> Self {
        Self {
            items: VecDeque::new(),
        }
    }

    /// Empties the queue, returning its items in order
    pub fn drain(&mut self) -> impl Iterator<Item = T> + '_ {
        self.items.drain(..)
    }
}

impl<T> Default for MemQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> FifoQueue<T> for MemQueue<T> {
    fn enqueue(&mut self, item: T) -> StorageResult<()> {
        self.items.push_back(item);
        Ok(())
    }

    fn enqueue_front(&mut self, item: T) -> StorageResult<()> {
        self.items.push_front(item);
        Ok(())
    }

    fn dequeue(&mut self) -> StorageResult<Option<T>> {
        Ok(self.items.pop_front())
    }

    fn delete_matching(
        &mut self,
        predicate: &mut dyn FnMut(&T) -> bool,
    ) -> StorageResult<Vec<T>> {
        let mut removed = Vec::new();
        let mut kept = VecDeque::with_capacity(self.items.len());
        for item in self.items.drain(..) {
            if predicate(&item) {
                removed.push(item);
            } else {
                kept.push_back(item);
            }
        }
        self.items = kept;
        Ok(removed)
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    fn in_memory_len(&self) -> usize {
        self.items.len()
    }

    fn peek_range(
        &self,
        start: usize,
        limit: usize,
        _in_memory_only: bool,
    ) -> StorageResult<Vec<T>> {
        Ok(self.items.iter().skip(start).take(limit).cloned().collect())
    }
}
