//! Request handler module
//!
//! Responsible for request routing dispatch. Blob requests are handed to the
//! blob server; everything else is answered with fixed responses.

pub mod router;

// Re-export main entry point
pub use router::handle_request;
