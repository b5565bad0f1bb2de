//! Classification of finished fetch attempts

use crate::uri::CrawlUri;
use std::fmt;

/// What the frontier does with a URI after an attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Fetched; retire and release dependents
    Success,
    /// Transient fault or unmet prerequisite; try again
    Retry,
    /// Excluded by policy; never retried
    Disregard,
    /// Unrecoverable; never retried
    Failure,
}

impl Disposition {
    /// Classifies an attempt, checking success, retry, disregard, then failure
    ///
    /// A retryable status only yields `Retry` while the URI has made fewer
    /// than `max_retries` attempts; the attempt that reaches the limit is a
    /// terminal failure.
    pub fn classify(curi: &CrawlUri, max_retries: u32) -> Self {
        let status = curi.fetch_status;
        if status.is_success() {
            Self::Success
        } else if status.is_retryable() && curi.fetch_attempts < max_retries {
            Self::Retry
        } else if status.is_disregarded() {
            Self::Disregard
        } else {
            Self::Failure
        }
    }
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Success => "success",
            Self::Retry => "retry",
            Self::Disregard => "disregard",
            Self::Failure => "failure",
        };
        f.write_str(name)
    }
}
