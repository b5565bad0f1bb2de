//! Storage traits and error types
//!
//! This module defines the FIFO interface shared by the global pending queues
//! and per-host queues, and the errors raised by storage backends.

use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Corrupt queue file {path}: {message}")]
    Corrupt { path: String, message: String },
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// An ordered queue whose backing may live partly outside memory
///
/// Implementations keep FIFO order for `enqueue`/`dequeue`; `enqueue_front`
/// places an item ahead of everything already queued.
pub trait FifoQueue<T> {
    // ===== Mutation =====

    /// Appends an item at the tail
    fn enqueue(&mut self, item: T) -> StorageResult<()>;

    /// Inserts an item at the head
    fn enqueue_front(&mut self, item: T) -> StorageResult<()>;

    /// Removes and returns the head item
    fn dequeue(&mut self) -> StorageResult<Option<T>>;

    /// Removes every item for which `predicate` returns true, preserving the
    /// order of the rest, and returns the removed items in queue order
    fn delete_matching(&mut self, predicate: &mut dyn FnMut(&T) -> bool)
        -> StorageResult<Vec<T>>;

    // ===== Inspection =====

    /// Number of queued items
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of items held in memory
    fn in_memory_len(&self) -> usize;

    /// Copies up to `limit` items starting at position `start` without removing them
    ///
    /// With `in_memory_only`, positions beyond the in-memory head are treated
    /// as absent.
    fn peek_range(&self, start: usize, limit: usize, in_memory_only: bool)
        -> StorageResult<Vec<T>>;
}
