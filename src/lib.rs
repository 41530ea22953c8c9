//! Blob server
//!
//! Serves content-addressed blobs over HTTP. Each response carries a content
//! type decided from the leading bytes of the blob, a disposition that keeps
//! active content from rendering inline, strong `ETag`s and single byte-range
//! support.

pub mod blob;
pub mod config;
pub mod content;
pub mod error;
pub mod handler;
pub mod http;
pub mod logger;
pub mod server;

pub use error::{Result, ServeError};
