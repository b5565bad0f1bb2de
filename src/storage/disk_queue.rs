//! File-backed FIFO with a bounded in-memory head
//!
//! Items beyond the in-memory capacity are appended to a segment file as JSON
//! lines. The head is refilled from the segment in capacity-sized batches. The
//! file is truncated once every line in it has been consumed, and compacted
//! once its consumed prefix grows past a threshold, so a queue that never
//! drains still keeps a bounded segment. The segment is scratch space: it is
//! emptied on open and removed on drop.

use crate::storage::traits::{FifoQueue, StorageError, StorageResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Consumed bytes at the start of a segment before it is compacted
pub const DEFAULT_COMPACT_THRESHOLD: u64 = 1 << 20;

#[derive(Debug)]
pub struct DiskQueue<T> {
    path: PathBuf,
    capacity: usize,
    head: VecDeque<T>,
    writer: Option<File>,
    /// Byte offset of the first unread line in the segment
    read_offset: u64,
    /// Unread lines in the segment
    disk_len: usize,
    compact_threshold: u64,
}

impl<T: Serialize + DeserializeOwned> DiskQueue<T> {
    /// Creates an empty queue whose overflow segment lives at `path`
    ///
    /// # Arguments
    ///
    /// * `path` - Segment file; created or truncated
    /// * `capacity` - Maximum number of items kept in memory (at least 1)
    pub fn new(path: impl Into<PathBuf>, capacity: usize) -> StorageResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        File::create(&path)?;

        Ok(Self {
            path,
            capacity: capacity.max(1),
            head: VecDeque::new(),
            writer: None,
            read_offset: 0,
            disk_len: 0,
            compact_threshold: DEFAULT_COMPACT_THRESHOLD,
        })
    }

    /// Sets how many consumed bytes may precede the unread lines before the
    /// segment is rewritten
    pub fn with_compact_threshold(mut self, bytes: u64) -> Self {
        self.compact_threshold = bytes.max(1);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of items currently spilled to the segment file
    pub fn on_disk_len(&self) -> usize {
        self.disk_len
    }

    fn append_to_disk(&mut self, item: &T) -> StorageResult<()> {
        let mut line =
            serde_json::to_string(item).map_err(|e| StorageError::Serialization(e.to_string()))?;
        line.push('\n');

        if self.writer.is_none() {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?;
            self.writer = Some(file);
        }
        if let Some(writer) = self.writer.as_mut() {
            writer.write_all(line.as_bytes())?;
        }
        self.disk_len += 1;
        Ok(())
    }

    fn corrupt(&self, message: impl Into<String>) -> StorageError {
        StorageError::Corrupt {
            path: self.path.display().to_string(),
            message: message.into(),
        }
    }

    /// Reads up to `limit` unread lines after skipping `skip` of them
    fn read_disk(&self, skip: usize, limit: usize) -> StorageResult<(Vec<T>, u64)> {
        let mut items = Vec::new();
        let mut consumed = 0u64;
        if self.disk_len == 0 || limit == 0 {
            return Ok((items, consumed));
        }

        let mut reader = BufReader::new(File::open(&self.path)?);
        reader.seek(SeekFrom::Start(self.read_offset))?;

        let mut line = String::new();
        let wanted = self.disk_len.min(skip.saturating_add(limit));
        for index in 0..wanted {
            line.clear();
            let read = reader.read_line(&mut line)?;
            if read == 0 {
                return Err(self.corrupt(format!(
                    "expected {} unread lines, found {}",
                    self.disk_len, index
                )));
            }
            consumed += read as u64;
            if index >= skip {
                let item = serde_json::from_str(line.trim_end())
                    .map_err(|e| self.corrupt(e.to_string()))?;
                items.push(item);
            }
        }
        Ok((items, consumed))
    }

    fn refill(&mut self) -> StorageResult<()> {
        if self.disk_len == 0 {
            return Ok(());
        }

        let room = self.capacity.saturating_sub(self.head.len()).max(1);
        let (items, consumed) = self.read_disk(0, room)?;
        self.read_offset += consumed;
        self.disk_len -= items.len();
        self.head.extend(items);

        if self.disk_len == 0 {
            self.truncate()?;
        } else if self.read_offset >= self.compact_threshold {
            self.compact()?;
        }
        Ok(())
    }

    /// Scratch file a rewritten segment is built in before replacing it
    fn rewrite_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".rewrite");
        PathBuf::from(name)
    }

    /// Drops the consumed prefix by copying the unread tail into a new file
    fn compact(&mut self) -> StorageResult<()> {
        self.writer = None;
        let rewrite = self.rewrite_path();
        {
            let mut reader = File::open(&self.path)?;
            reader.seek(SeekFrom::Start(self.read_offset))?;
            let mut out = BufWriter::new(File::create(&rewrite)?);
            io::copy(&mut reader, &mut out)?;
            out.flush()?;
        }
        fs::rename(&rewrite, &self.path)?;
        tracing::trace!(
            "Compacted {} ({} bytes dropped)",
            self.path.display(),
            self.read_offset
        );
        self.read_offset = 0;
        Ok(())
    }

    fn truncate(&mut self) -> StorageResult<()> {
        self.writer = None;
        File::create(&self.path)?;
        self.read_offset = 0;
        self.disk_len = 0;
        Ok(())
    }
}

impl<T: Serialize + DeserializeOwned + Clone> FifoQueue<T> for DiskQueue<T> {
    fn enqueue(&mut self, item: T) -> StorageResult<()> {
        if self.disk_len == 0 && self.head.len() < self.capacity {
            self.head.push_back(item);
            Ok(())
        } else {
            self.append_to_disk(&item)
        }
    }

    fn enqueue_front(&mut self, item: T) -> StorageResult<()> {
        self.head.push_front(item);
        Ok(())
    }

    fn dequeue(&mut self) -> StorageResult<Option<T>> {
        if self.head.is_empty() {
            self.refill()?;
        }
        Ok(self.head.pop_front())
    }

    fn delete_matching(
        &mut self,
        predicate: &mut dyn FnMut(&T) -> bool,
    ) -> StorageResult<Vec<T>> {
        let mut removed = Vec::new();

        let mut kept_head = VecDeque::with_capacity(self.head.len());
        for item in self.head.drain(..) {
            if predicate(&item) {
                removed.push(item);
            } else {
                kept_head.push_back(item);
            }
        }
        self.head = kept_head;

        if self.disk_len > 0 {
            self.writer = None;
            let rewrite = self.rewrite_path();
            let mut reader = BufReader::new(File::open(&self.path)?);
            reader.seek(SeekFrom::Start(self.read_offset))?;
            let mut out = BufWriter::new(File::create(&rewrite)?);

            let mut kept = 0;
            let mut line = String::new();
            for index in 0..self.disk_len {
                line.clear();
                if reader.read_line(&mut line)? == 0 {
                    return Err(self.corrupt(format!(
                        "expected {} unread lines, found {}",
                        self.disk_len, index
                    )));
                }
                let item: T = serde_json::from_str(line.trim_end())
                    .map_err(|e| self.corrupt(e.to_string()))?;
                if predicate(&item) {
                    removed.push(item);
                } else {
                    out.write_all(line.as_bytes())?;
                    kept += 1;
                }
            }
            out.flush()?;
            drop(out);
            drop(reader);

            fs::rename(&rewrite, &self.path)?;
            self.read_offset = 0;
            self.disk_len = kept;
        }

        Ok(removed)
    }

    fn len(&self) -> usize {
        self.head.len() + self.disk_len
    }

    fn in_memory_len(&self) -> usize {
        self.head.len()
    }

    fn peek_range(
        &self,
        start: usize,
        limit: usize,
        in_memory_only: bool,
    ) -> StorageResult<Vec<T>> {
        let mut items: Vec<T> = self.head.iter().skip(start).take(limit).cloned().collect();

        if !in_memory_only && items.len() < limit {
            let disk_skip = start.saturating_sub(self.head.len());
            let (more, _) = self.read_disk(disk_skip, limit - items.len())?;
            items.extend(more);
        }
        Ok(items)
    }
}

impl<T> Drop for DiskQueue<T> {
    fn drop(&mut self) {
        self.writer = None;
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::debug!("Could not remove queue segment {}: {}", self.path.display(), e);
        }
    }
}
