//! HTTP protocol layer module
//!
//! Provides HTTP protocol-related base functionality, decoupled from blob and
//! content logic: validators, range parsing, MIME overrides and fixed
//! responses.

pub mod cache;
pub mod mime;
pub mod range;
pub mod response;

// Re-export commonly used types
pub use range::{parse_range_header, RangeOutcome, RangeSpec};
pub use response::{
    build_404_response, build_405_response, build_416_response, build_500_response,
    build_health_response, build_options_response, empty_body, full_body, ResponseBody,
};
