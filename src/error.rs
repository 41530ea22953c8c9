//! Error types for blob serving
//!
//! Every fatal failure of the serve pipeline ends up as a [`ServeError`].
//! Non-fatal conditions (source close failures, negative declared sizes)
//! are logged where they happen and never reach this type.

use hyper::StatusCode;
use std::io;
use thiserror::Error;

/// Fatal errors raised while serving a blob
#[derive(Debug, Error)]
pub enum ServeError {
    /// Range header could not be parsed or selects no bytes
    #[error("invalid range header: {header}")]
    MalformedRange { header: String, size: u64 },

    /// Reading the blob content failed
    #[error("failed to read blob content: {0}")]
    SourceRead(#[source] io::Error),

    /// Writing to the client failed (usually a disconnect)
    #[error("failed to write response: {0}")]
    Write(#[source] io::Error),

    /// No blob exists at the requested path
    #[error("blob not found: {0}")]
    NotFound(String),

    /// The blob store itself failed (metadata, hashing, open)
    #[error("blob store error: {0}")]
    Store(#[source] io::Error),
}

impl ServeError {
    /// HTTP status the transport should answer with, if headers are not yet sent
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::MalformedRange { .. } => StatusCode::RANGE_NOT_SATISFIABLE,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::SourceRead(_) | Self::Write(_) | Self::Store(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, ServeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let err = ServeError::MalformedRange {
            header: "bytes=5-1".to_string(),
            size: 10,
        };
        assert_eq!(err.status(), StatusCode::RANGE_NOT_SATISFIABLE);
        assert_eq!(
            ServeError::NotFound("a.txt".to_string()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServeError::SourceRead(io::Error::other("boom")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_display_includes_header() {
        let err = ServeError::MalformedRange {
            header: "bytes=x-y".to_string(),
            size: 10,
        };
        assert_eq!(err.to_string(), "invalid range header: bytes=x-y");
    }
}
