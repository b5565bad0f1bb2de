//! Append-only log of scheduling events
//!
//! One event per line: a two-character tag, a single space, then the URI.
//!
//! | tag  | event                              |
//! |------|------------------------------------|
//! | `F+` | scheduled                          |
//! | `Fe` | emitted to a worker                |
//! | `Fr` | rescheduled for another attempt    |
//! | `Fs` | finished successfully              |
//! | `Ff` | finished unsuccessfully            |
//!
//! Replaying a log rebuilds the frontier in two passes: every `Fs` URI is put
//! in the already-scheduled set, then every `F+` URI not in that set is
//! scheduled again.

use crate::storage::{StorageError, StorageResult};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTag {
    Added,
    Emitted,
    Rescheduled,
    Succeeded,
    Failed,
}

impl LogTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Added => "F+",
            Self::Emitted => "Fe",
            Self::Rescheduled => "Fr",
            Self::Succeeded => "Fs",
            Self::Failed => "Ff",
        }
    }

    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "F+" => Some(Self::Added),
            "Fe" => Some(Self::Emitted),
            "Fr" => Some(Self::Rescheduled),
            "Fs" => Some(Self::Succeeded),
            "Ff" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Splits a log line into its tag and URI
pub fn parse_line(line: &str) -> Option<(LogTag, &str)> {
    let line = line.trim_end_matches(['\r', '\n']);
    let (tag, uri) = line.split_once(' ')?;
    let tag = LogTag::parse(tag)?;
    if uri.is_empty() || uri.contains(' ') {
        return None;
    }
    Some((tag, uri))
}

/// Writer half of the recovery log
#[derive(Debug)]
pub struct RecoveryLog {
    path: PathBuf,
    writer: BufWriter<File>,
    lines: u64,
}

impl RecoveryLog {
    /// Creates (truncating) the log at `path`
    pub fn create(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            lines: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lines written since creation
    pub fn lines_written(&self) -> u64 {
        self.lines
    }

    /// Appends one event and flushes it to the file
    pub fn append(&mut self, tag: LogTag, uri: &str) -> StorageResult<()> {
        writeln!(self.writer, "{} {}", tag.as_str(), uri)?;
        self.writer.flush()?;
        self.lines += 1;
        Ok(())
    }
}

/// Streams the entries of a log, reporting unparseable lines by number
///
/// # Arguments
///
/// * `path` - Log to read
/// * `on_entry` - Called with each well-formed entry, in file order
///
/// # Returns
///
/// The 1-based numbers of lines that were not well-formed.
pub fn for_each_entry<E: From<StorageError>>(
    path: &Path,
    mut on_entry: impl FnMut(LogTag, &str) -> Result<(), E>,
) -> Result<Vec<usize>, E> {
    let file = File::open(path).map_err(StorageError::from)?;
    let reader = BufReader::new(file);
    let mut malformed = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(StorageError::from)?;
        if line.trim().is_empty() {
            continue;
        }
        match parse_line(&line) {
            Some((tag, uri)) => on_entry(tag, uri)?,
            None => malformed.push(index + 1),
        }
    }

    Ok(malformed)
}

/// Outcome of replaying a recovery log
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct ReplaySummary {
    /// Distinct URIs recorded as successfully finished
    pub completed: u64,
    /// `F+` URIs scheduled again
    pub rescheduled: u64,
    /// `F+` URIs not scheduled again: completed, repeated, or out of scope
    pub already_included: u64,
    /// Lines that could not be parsed or named an invalid URI
    pub skipped_lines: u64,
}
