//! HTTP cache control module
//!
//! Provides `ETag` validators for blobs and conditional request handling.

/// Build the strong validator for a blob from its content id
///
/// # Returns
/// Quoted `ETag` string, e.g., `"3f2a..."`
pub fn blob_etag(blob_id: &str) -> String {
    format!("\"{blob_id}\"")
}

/// Check if client's `If-None-Match` header matches the server's `ETag`
///
/// Supports:
/// - Single `ETag`: `"abc123"`
/// - Multiple `ETags`: `"abc123", "def456"`
/// - Weak validators: `W/"abc123"` (If-None-Match uses weak comparison)
/// - Wildcard: `*`
///
/// # Returns
/// Returns true if matched (should return 304), false otherwise
pub fn check_etag_match(if_none_match: Option<&str>, etag: &str) -> bool {
    if_none_match.is_some_and(|client_etag| {
        client_etag.split(',').map(str::trim).any(|e| {
            let e = e.strip_prefix("W/").unwrap_or(e);
            e == etag || e == "*"
        })
    })
}

/// Cache control policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// Public cache with specified max-age (seconds)
    Public(u32),
    /// No cache
    NoCache,
}

impl CachePolicy {
    /// Policy for a configured max-age, where zero disables caching
    pub const fn from_max_age(max_age: u32) -> Self {
        if max_age == 0 {
            Self::NoCache
        } else {
            Self::Public(max_age)
        }
    }

    /// Convert to Cache-Control header value
    pub fn to_header_value(self) -> String {
        match self {
            Self::Public(max_age) => format!("public, max-age={max_age}"),
            Self::NoCache => "no-cache".to_string(),
        }
    }
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self::Public(86_400) // 1 day
    }
}
