//! Content shaping module
//!
//! Decides how blob bytes are presented to a client (type, charset,
//! disposition, ranges) and streams them into a response sink.

pub mod charset;
pub mod policy;
pub mod responder;
pub mod sink;
pub mod sniff;
pub mod source;

// Re-export main entry points
pub use responder::{ContentRequest, ContentResponder, ResponderOptions, SNIFF_LEN};
pub use sink::{ChannelSink, PendingResponse, ResponseSink};
pub use source::{ByteSource, FileSource, StreamSource};
