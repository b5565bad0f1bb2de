use crate::UrlError;
use url::Url;

/// Query parameters that never change the fetched resource
const TRACKING_PARAMS: &[&str] = &["fbclid", "gclid", "mc_eid"];

/// Schemes the frontier will schedule
const ALLOWED_SCHEMES: &[&str] = &["http", "https", "dns"];

/// Normalizes a URL string into the identity used for deduplication
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed
/// 2. Reject schemes other than http, https and dns
/// 3. Lowercase the host (or, for `dns:`, the looked-up name)
/// 4. Remove dot segments and repeated slashes from the path, keeping a
///    trailing slash if present
/// 5. Remove the fragment
/// 6. Remove tracking query parameters and empty query pieces, preserving
///    the order of the rest
///
/// The output of this function is a fixed point: normalizing it again
/// yields the same string. Recovery log replay relies on that.
///
/// # Examples
///
/// ```
/// use sumi_frontier::url::normalize_url;
///
/// let url = normalize_url("http://EXAMPLE.com/a/./b/../c?utm_source=x#top").unwrap();
/// assert_eq!(url.as_str(), "http://example.com/a/c");
/// ```
pub fn normalize_url(url_str: &str) -> Result<Url, UrlError> {
    let mut url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if !ALLOWED_SCHEMES.contains(&url.scheme()) {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP, HTTPS and DNS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    if url.scheme() == "dns" {
        return normalize_dns(url_str.trim());
    }

    match url.host_str() {
        Some(host) if !host.is_empty() => {
            let lowered = host.to_lowercase();
            if lowered != host {
                url.set_host(Some(&lowered))
                    .map_err(|e| UrlError::Malformed(format!("Failed to set host: {}", e)))?;
            }
        }
        _ => return Err(UrlError::MissingDomain),
    }

    let normalized_path = normalize_path(url.path());
    url.set_path(&normalized_path);

    url.set_fragment(None);

    if let Some(query) = url.query() {
        let kept = filter_query(query);
        if kept.is_empty() {
            url.set_query(None);
        } else {
            url.set_query(Some(&kept));
        }
    }

    Ok(url)
}

/// `dns:` URIs carry the host name as an opaque path
fn normalize_dns(url_str: &str) -> Result<Url, UrlError> {
    let name = url_str
        .split_once(':')
        .map(|(_, rest)| rest.trim_start_matches('/').trim().to_lowercase())
        .unwrap_or_default();

    if name.is_empty() {
        return Err(UrlError::MissingDomain);
    }
    if name.contains(['/', '?', '#', ' ']) {
        return Err(UrlError::Malformed(format!("Invalid DNS name: {}", name)));
    }

    Url::parse(&format!("dns:{}", name)).map_err(|e| UrlError::Parse(e.to_string()))
}

/// Resolves `.` and `..` segments and collapses repeated slashes
fn normalize_path(path: &str) -> String {
    if path.is_empty() {
        return "/".to_string();
    }

    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                segments.pop();
            }
            _ => segments.push(segment),
        }
    }

    if segments.is_empty() {
        return "/".to_string();
    }

    let mut result = format!("/{}", segments.join("/"));
    let last = path.rsplit('/').next().unwrap_or("");
    if path.ends_with('/') || last == "." || last == ".." {
        result.push('/');
    }
    result
}

/// Drops tracking parameters without decoding the remaining pieces
fn filter_query(query: &str) -> String {
    query
        .split('&')
        .filter(|piece| !piece.is_empty())
        .filter(|piece| {
            let key = piece.split_once('=').map(|(k, _)| k).unwrap_or(piece);
            !is_tracking_param(key)
        })
        .collect::<Vec<_>>()
        .join("&")
}

fn is_tracking_param(key: &str) -> bool {
    TRACKING_PARAMS.contains(&key) || key.starts_with("utm_")
}
