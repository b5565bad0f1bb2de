//! Fetch status codes
//!
//! Zero means unattempted, positive values are protocol status codes (HTTP
//! status, or 1 for a successful DNS lookup), and negative values are
//! frontier-internal dispositions.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FetchStatus(pub i32);

impl FetchStatus {
    pub const UNATTEMPTED: Self = Self(0);
    pub const DOMAIN_UNRESOLVABLE: Self = Self(-1);
    pub const CONNECT_FAILED: Self = Self(-2);
    pub const CONNECT_LOST: Self = Self(-3);
    pub const TIMEOUT: Self = Self(-4);
    pub const RUNTIME_EXCEPTION: Self = Self(-5);
    pub const UNFETCHABLE_URI: Self = Self(-7);
    pub const TOO_MANY_RETRIES: Self = Self(-8);
    pub const DEFERRED: Self = Self(-50);
    pub const TOO_MANY_EMBED_HOPS: Self = Self(-4000);
    pub const TOO_MANY_LINK_HOPS: Self = Self(-4001);
    pub const OUT_OF_SCOPE: Self = Self(-5000);
    pub const BLOCKED_BY_USER: Self = Self(-5001);
    pub const DELETED_BY_USER: Self = Self(-6000);
    pub const ROBOTS_PRECLUDED: Self = Self(-9998);

    pub fn code(&self) -> i32 {
        self.0
    }

    pub fn is_success(&self) -> bool {
        self.0 > 0
    }

    /// Transient faults worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(
            *self,
            Self::CONNECT_FAILED | Self::CONNECT_LOST | Self::DEFERRED | Self::TIMEOUT
        )
    }

    /// Policy exclusions: counted separately and never retried
    pub fn is_disregarded(&self) -> bool {
        matches!(
            *self,
            Self::ROBOTS_PRECLUDED
                | Self::OUT_OF_SCOPE
                | Self::BLOCKED_BY_USER
                | Self::TOO_MANY_EMBED_HOPS
                | Self::TOO_MANY_LINK_HOPS
                | Self::DELETED_BY_USER
        )
    }

    /// Exclusions whose fingerprint is released so the URI may be rediscovered
    pub fn is_forgettable(&self) -> bool {
        matches!(
            *self,
            Self::OUT_OF_SCOPE
                | Self::BLOCKED_BY_USER
                | Self::TOO_MANY_EMBED_HOPS
                | Self::TOO_MANY_LINK_HOPS
        )
    }

    pub fn name(&self) -> &'static str {
        match *self {
            Self::UNATTEMPTED => "unattempted",
            Self::DOMAIN_UNRESOLVABLE => "domain-unresolvable",
            Self::CONNECT_FAILED => "connect-failed",
            Self::CONNECT_LOST => "connect-lost",
            Self::TIMEOUT => "timeout",
            Self::RUNTIME_EXCEPTION => "runtime-exception",
            Self::UNFETCHABLE_URI => "unfetchable-uri",
            Self::TOO_MANY_RETRIES => "too-many-retries",
            Self::DEFERRED => "deferred",
            Self::TOO_MANY_EMBED_HOPS => "too-many-embed-hops",
            Self::TOO_MANY_LINK_HOPS => "too-many-link-hops",
            Self::OUT_OF_SCOPE => "out-of-scope",
            Self::BLOCKED_BY_USER => "blocked-by-user",
            Self::DELETED_BY_USER => "deleted-by-user",
            Self::ROBOTS_PRECLUDED => "robots-precluded",
            s if s.is_success() => "success",
            _ => "unknown",
        }
    }
}

impl From<i32> for FetchStatus {
    fn from(code: i32) -> Self {
        Self(code)
    }
}

impl fmt::Display for FetchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.0, self.name())
    }
}
