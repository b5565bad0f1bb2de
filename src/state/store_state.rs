/// Store state definitions for URIs and per-host queues
///
/// A `CrawlUri` always carries exactly one of these; per-host queues use the
/// READY / HELD / SNOOZED subset to mirror which router set they live in.
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a URI (or per-host queue) currently lives inside the frontier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StoreState {
    // ===== Queued States =====
    /// Waiting in a global pending queue
    Pending,

    /// Queued in (or being) a per-host queue eligible for emission
    Ready,

    /// Queued in (or being) a per-host queue blocked by an in-process URI
    Held,

    // ===== Active States =====
    /// Emitted to a worker; exactly one per classKey
    InProcess,

    /// Sleeping until a wake time
    Snoozed,

    // ===== Terminal States =====
    /// Disposition recorded; never scheduled again
    Finished,

    /// Disposition recorded and fingerprint released
    Forgotten,
}

impl StoreState {
    /// Returns true if no further scheduling will happen for the URI
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Forgotten)
    }

    /// Returns true for the three states a per-host queue may be in
    pub fn is_queue_state(&self) -> bool {
        matches!(self, Self::Ready | Self::Held | Self::Snoozed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Ready => "ready",
            Self::Held => "held",
            Self::InProcess => "in_process",
            Self::Snoozed => "snoozed",
            Self::Finished => "finished",
            Self::Forgotten => "forgotten",
        }
    }

    /// Returns all possible store states
    pub fn all_states() -> Vec<Self> {
        vec![
            Self::Pending,
            Self::Ready,
            Self::Held,
            Self::InProcess,
            Self::Snoozed,
            Self::Finished,
            Self::Forgotten,
        ]
    }
}

impl Default for StoreState {
    fn default() -> Self {
        Self::Pending
    }
}

impl fmt::Display for StoreState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
