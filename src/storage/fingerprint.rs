//! Already-scheduled set with SQLite spillover
//!
//! Recent fingerprints live in a `HashSet`. When the set grows past its
//! memory capacity every in-memory entry is flushed to the `fingerprints`
//! table in one transaction, so memory stays bounded while the set grows to
//! tens of millions of identities.

use crate::storage::schema::{initialize_schema, reset};
use crate::storage::traits::StorageResult;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashSet;
use std::path::Path;

pub struct FingerprintSet {
    memory: HashSet<u64>,
    capacity: usize,
    conn: Connection,
    /// Entries currently stored in the table
    on_disk: usize,
    /// Distinct identities ever inserted
    inserted: u64,
}

impl FingerprintSet {
    /// Opens (and empties) a fingerprint database at `path`
    pub fn open(path: &Path, capacity: usize) -> StorageResult<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = OFF;
            PRAGMA temp_store = MEMORY;
        ",
        )?;
        Self::with_connection(conn, capacity)
    }

    /// Creates a set whose spillover table lives in memory
    pub fn in_memory(capacity: usize) -> StorageResult<Self> {
        Self::with_connection(Connection::open_in_memory()?, capacity)
    }

    fn with_connection(conn: Connection, capacity: usize) -> StorageResult<Self> {
        initialize_schema(&conn)?;
        reset(&conn)?;
        Ok(Self {
            memory: HashSet::new(),
            capacity: capacity.max(1),
            conn,
            on_disk: 0,
            inserted: 0,
        })
    }

    /// Memory-only membership test; may miss entries that were spilled
    pub fn quick_contains(&self, fp: u64) -> bool {
        self.memory.contains(&fp)
    }

    /// Authoritative membership test
    pub fn contains(&self, fp: u64) -> StorageResult<bool> {
        if self.memory.contains(&fp) {
            return Ok(true);
        }
        self.contains_on_disk(fp)
    }

    fn contains_on_disk(&self, fp: u64) -> StorageResult<bool> {
        if self.on_disk == 0 {
            return Ok(false);
        }
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT fp FROM fingerprints WHERE fp = ?1",
                params![fp as i64],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Inserts `fp`; returns false if it was already a member
    pub fn add(&mut self, fp: u64) -> StorageResult<bool> {
        if self.contains(fp)? {
            return Ok(false);
        }
        self.memory.insert(fp);
        self.inserted += 1;
        if self.memory.len() > self.capacity {
            self.spill()?;
        }
        Ok(true)
    }

    /// Removes `fp`; returns false if it was not a member
    pub fn remove(&mut self, fp: u64) -> StorageResult<bool> {
        if self.memory.remove(&fp) {
            return Ok(true);
        }
        if self.on_disk == 0 {
            return Ok(false);
        }
        let deleted = self
            .conn
            .execute("DELETE FROM fingerprints WHERE fp = ?1", params![fp as i64])?;
        self.on_disk -= deleted;
        Ok(deleted > 0)
    }

    /// Current number of members
    pub fn size(&self) -> usize {
        self.memory.len() + self.on_disk
    }

    /// Number of distinct identities ever inserted, including removed ones
    pub fn count(&self) -> u64 {
        self.inserted
    }

    /// Number of members held in memory
    pub fn in_memory_size(&self) -> usize {
        self.memory.len()
    }

    fn spill(&mut self) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        let mut written = 0;
        {
            let mut stmt = tx.prepare("INSERT OR IGNORE INTO fingerprints (fp) VALUES (?1)")?;
            for fp in &self.memory {
                written += stmt.execute(params![*fp as i64])?;
            }
        }
        tx.commit()?;

        tracing::debug!(
            "Spilled {} fingerprints to disk ({} on disk)",
            written,
            self.on_disk + written
        );
        self.on_disk += written;
        self.memory.clear();
        Ok(())
    }
}

impl std::fmt::Debug for FingerprintSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FingerprintSet")
            .field("in_memory", &self.memory.len())
            .field("on_disk", &self.on_disk)
            .field("inserted", &self.inserted)
            .finish()
    }
}
