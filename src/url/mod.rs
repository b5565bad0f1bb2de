//! URL handling module for Sumi-Frontier
//!
//! This module provides URL normalization, the `Uuri` identity type, classKey
//! derivation, fingerprinting, and the scope contract used to admit
//! candidates.

mod normalize;
mod scope;

pub use normalize::normalize_url;
pub use scope::{matches_wildcard, AcceptAll, DomainScope, Scope};

use crate::UrlResult;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use url::Url;

/// A normalized URI; equality of two `Uuri`s is equality of crawl identity
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Uuri(Url);

impl Uuri {
    /// Parses and normalizes a URI string
    ///
    /// # Examples
    ///
    /// ```
    /// use sumi_frontier::url::Uuri;
    ///
    /// let uuri = Uuri::parse("https://Example.com/a#b").unwrap();
    /// assert_eq!(uuri.as_str(), "https://example.com/a");
    /// assert_eq!(uuri.class_key(), "example.com");
    /// ```
    pub fn parse(input: &str) -> UrlResult<Self> {
        normalize_url(input).map(Uuri)
    }

    /// The `dns:` lookup URI for a host
    pub fn dns(host: &str) -> UrlResult<Self> {
        Self::parse(&format!("dns:{}", host))
    }

    /// The robots.txt URI governing this URI, if it is an HTTP(S) URI
    pub fn robots_txt(&self) -> Option<Uuri> {
        if !self.is_http() {
            return None;
        }
        let mut robots = self.0.clone();
        robots.set_path("/robots.txt");
        robots.set_query(None);
        Some(Uuri(robots))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn as_url(&self) -> &Url {
        &self.0
    }

    pub fn scheme(&self) -> &str {
        self.0.scheme()
    }

    pub fn is_dns(&self) -> bool {
        self.0.scheme() == "dns"
    }

    pub fn is_http(&self) -> bool {
        matches!(self.0.scheme(), "http" | "https")
    }

    pub fn is_robots_txt(&self) -> bool {
        self.is_http() && self.0.path() == "/robots.txt"
    }

    /// Host name this URI targets; for `dns:` URIs, the name being looked up
    pub fn host(&self) -> Option<String> {
        if self.is_dns() {
            Some(self.0.path().to_string())
        } else {
            self.0.host_str().map(|h| h.to_lowercase())
        }
    }

    /// Path plus query, as matched against robots.txt rules
    pub fn path_and_query(&self) -> String {
        match self.0.query() {
            Some(q) => format!("{}?{}", self.0.path(), q),
            None => self.0.path().to_string(),
        }
    }

    /// Politeness key; see [`class_key`]
    pub fn class_key(&self) -> String {
        class_key(self)
    }

    /// Fingerprint used by the already-scheduled set
    pub fn fingerprint(&self) -> u64 {
        fingerprint(self.as_str())
    }
}

impl fmt::Display for Uuri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

/// Derives the per-host politeness key of a URI
///
/// HTTP(S) URIs key on the lowercased host, with `:port` appended when the
/// port is explicit and non-default. `dns:` URIs key on the name they look
/// up, so a host's DNS prerequisite shares the host's queue.
pub fn class_key(uuri: &Uuri) -> String {
    let host = uuri.host().unwrap_or_default();
    match uuri.as_url().port() {
        Some(port) if !uuri.is_dns() => format!("{}:{}", host, port),
        _ => host,
    }
}

/// First eight bytes of the SHA-256 of the normalized URI
pub fn fingerprint(uri: &str) -> u64 {
    let digest = Sha256::digest(uri.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}
