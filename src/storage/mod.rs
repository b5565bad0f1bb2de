//! Storage module for the frontier's disk-backed structures
//!
//! This module provides:
//! - The `FifoQueue` abstraction and its file-backed (`DiskQueue`) and
//!   in-memory (`MemQueue`) implementations
//! - The `FingerprintSet` of already-scheduled URI identities, spilling to
//!   SQLite past its memory capacity

mod disk_queue;
mod fingerprint;
mod mem_queue;
mod schema;
mod traits;

pub use disk_queue::DiskQueue;
pub use fingerprint::FingerprintSet;
pub use mem_queue::MemQueue;
pub use traits::{FifoQueue, StorageError, StorageResult};
