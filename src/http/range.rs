//! HTTP Range request parsing module
//!
//! Single byte-range parsing (RFC 9110 §14). Multi-range requests and
//! non-`bytes` units are ignored, which lets the caller answer with the full
//! representation as the RFC permits.

use crate::error::ServeError;

/// A validated, inclusive byte range within a representation of known size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeSpec {
    /// First byte position
    pub start: u64,
    /// Last byte position (inclusive), clamped to `size - 1`
    pub end: u64,
    /// Number of bytes selected, always `end - start + 1`
    pub length: u64,
}

impl RangeSpec {
    fn new(start: u64, end: u64) -> Self {
        Self {
            start,
            end,
            length: end - start + 1,
        }
    }

    /// Value for the `Content-Range` header of a 206 response
    pub fn content_range(&self, total_size: u64) -> String {
        format!("bytes {}-{}/{total_size}", self.start, self.end)
    }
}

/// Range header parse result
#[derive(Debug, PartialEq, Eq)]
pub enum RangeOutcome {
    /// Valid single range
    Satisfiable(RangeSpec),
    /// Unit or form this server does not honor, serve the full content
    Ignored,
}

/// Parse a `Range` header against a representation of `size` bytes
///
/// Supported forms:
/// - `bytes=start-end` - specific range, `end` clamped to `size - 1`
/// - `bytes=start-` - from start to the last byte
/// - `bytes=-suffix` - the last `suffix` bytes
///
/// # Examples
/// ```
/// use blobserve::http::range::{parse_range_header, RangeOutcome};
///
/// let outcome = parse_range_header("bytes=100-199", 1000).unwrap();
/// match outcome {
///     RangeOutcome::Satisfiable(r) => assert_eq!((r.start, r.end, r.length), (100, 199, 100)),
///     RangeOutcome::Ignored => unreachable!(),
/// }
///
/// assert!(parse_range_header("bytes=500-100", 1000).is_err());
/// ```
pub fn parse_range_header(header: &str, size: u64) -> Result<RangeOutcome, ServeError> {
    let Some(spec) = header.trim().strip_prefix("bytes=") else {
        return Ok(RangeOutcome::Ignored);
    };

    // Multiple ranges would need multipart/byteranges
    if spec.contains(',') {
        return Ok(RangeOutcome::Ignored);
    }

    let malformed = || ServeError::MalformedRange {
        header: header.to_string(),
        size,
    };

    let (start_str, end_str) = spec.split_once('-').ok_or_else(malformed)?;
    let (start_str, end_str) = (start_str.trim(), end_str.trim());

    if start_str.is_empty() {
        return parse_suffix_range(end_str, size).ok_or_else(malformed);
    }

    parse_standard_range(start_str, end_str, size).ok_or_else(malformed)
}

/// Parse suffix range (e.g., "-500")
fn parse_suffix_range(suffix_str: &str, size: u64) -> Option<RangeOutcome> {
    let suffix = suffix_str.parse::<u64>().ok()?;
    if suffix == 0 || size == 0 {
        return None;
    }

    // Suffix larger than the content selects all of it
    let start = size.saturating_sub(suffix);
    Some(RangeOutcome::Satisfiable(RangeSpec::new(start, size - 1)))
}

/// Parse standard range (e.g., "0-99" or "100-")
fn parse_standard_range(start_str: &str, end_str: &str, size: u64) -> Option<RangeOutcome> {
    let start = start_str.parse::<u64>().ok()?;
    if start >= size {
        return None;
    }

    let end = if end_str.is_empty() {
        size - 1
    } else {
        end_str.parse::<u64>().ok()?.min(size - 1)
    };

    if end < start {
        return None;
    }

    Some(RangeOutcome::Satisfiable(RangeSpec::new(start, end)))
}
