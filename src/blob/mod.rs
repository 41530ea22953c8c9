//! Blob module
//!
//! Content-addressed blob storage and the server that delivers blobs over
//! HTTP.

pub mod server;
pub mod store;

pub use server::{BlobRequest, BlobServer};
pub use store::{Blob, BlobStore, FsBlobStore};
