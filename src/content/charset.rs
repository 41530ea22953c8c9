//! Charset detection for text responses
//!
//! Works on the sniff sample only, so a valid UTF-8 stream may be cut in the
//! middle of a multi-byte sequence; that tail is tolerated.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CharsetError {
    /// NUL bytes without a byte order mark, likely UTF-16/32 or binary
    #[error("cannot determine encoding of sample with NUL bytes and no BOM")]
    Undetectable,
}

/// Detect the character encoding of a sample
///
/// # Examples
/// ```
/// use blobserve::content::charset::detect_encoding;
///
/// assert_eq!(detect_encoding(b"plain ascii").unwrap(), "UTF-8");
/// assert_eq!(detect_encoding(b"caf\xE9 noir").unwrap(), "ISO-8859-1");
/// assert!(detect_encoding(b"a\0b\0").is_err());
/// ```
pub fn detect_encoding(sample: &[u8]) -> Result<&'static str, CharsetError> {
    if sample.starts_with(b"\xEF\xBB\xBF") {
        return Ok("UTF-8");
    }
    if sample.starts_with(b"\xFE\xFF") {
        return Ok("UTF-16BE");
    }
    if sample.starts_with(b"\xFF\xFE") {
        return Ok("UTF-16LE");
    }

    if sample.contains(&0) {
        return Err(CharsetError::Undetectable);
    }

    if is_utf8_allowing_truncation(sample) {
        Ok("UTF-8")
    } else {
        Ok("ISO-8859-1")
    }
}

fn is_utf8_allowing_truncation(sample: &[u8]) -> bool {
    match std::str::from_utf8(sample) {
        Ok(_) => true,
        // error_len() is None only when the input ends mid-sequence
        Err(e) => e.error_len().is_none(),
    }
}
