//! HTTP response building module
//!
//! Builders for the fixed-status responses the blob server answers with
//! outside of the content pipeline, plus the shared response body type.

use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Empty, Full};
use hyper::body::Bytes;
use hyper::{Response, StatusCode};
use std::io;

/// Body type of every response produced by this server
pub type ResponseBody = UnsyncBoxBody<Bytes, io::Error>;

/// Body holding a complete in-memory payload
pub fn full_body(data: impl Into<Bytes>) -> ResponseBody {
    Full::new(data.into())
        .map_err(|never| match never {})
        .boxed_unsync()
}

/// Body with no content
pub fn empty_body() -> ResponseBody {
    Empty::<Bytes>::new()
        .map_err(|never| match never {})
        .boxed_unsync()
}

/// Build 404 Not Found response
pub fn build_404_response() -> Response<ResponseBody> {
    build_text_response(StatusCode::NOT_FOUND, "404 Not Found")
}

/// Build 405 Method Not Allowed response
pub fn build_405_response() -> Response<ResponseBody> {
    Response::builder()
        .status(StatusCode::METHOD_NOT_ALLOWED)
        .header("Content-Type", "text/plain")
        .header("Allow", "GET, HEAD, OPTIONS")
        .body(full_body("405 Method Not Allowed"))
        .unwrap_or_else(|e| {
            log_build_error("405", &e);
            Response::new(full_body("405 Method Not Allowed"))
        })
}

/// Build OPTIONS response
pub fn build_options_response() -> Response<ResponseBody> {
    Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header("Allow", "GET, HEAD, OPTIONS")
        .body(empty_body())
        .unwrap_or_else(|e| {
            log_build_error("OPTIONS", &e);
            Response::new(empty_body())
        })
}

/// Build 416 Range Not Satisfiable response
pub fn build_416_response(total_size: u64) -> Response<ResponseBody> {
    Response::builder()
        .status(StatusCode::RANGE_NOT_SATISFIABLE)
        .header("Content-Type", "text/plain")
        .header("Content-Range", format!("bytes */{total_size}"))
        .body(full_body("Range Not Satisfiable"))
        .unwrap_or_else(|e| {
            log_build_error("416", &e);
            Response::new(full_body("Range Not Satisfiable"))
        })
}

/// Build 500 Internal Server Error response
pub fn build_500_response() -> Response<ResponseBody> {
    build_text_response(StatusCode::INTERNAL_SERVER_ERROR, "500 Internal Server Error")
}

/// Build health check response
pub fn build_health_response(status: &'static str) -> Response<ResponseBody> {
    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "text/plain")
        .header("Cache-Control", "no-cache")
        .body(full_body(status))
        .unwrap_or_else(|e| {
            log_build_error("health", &e);
            Response::new(full_body(status))
        })
}

fn build_text_response(status: StatusCode, message: &'static str) -> Response<ResponseBody> {
    Response::builder()
        .status(status)
        .header("Content-Type", "text/plain")
        .body(full_body(message))
        .unwrap_or_else(|e| {
            log_build_error(status.as_str(), &e);
            Response::new(full_body(message))
        })
}

/// Log response build error
fn log_build_error(status: &str, error: &hyper::http::Error) {
    crate::logger::log_error(&format!("Failed to build {status} response: {error}"));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_416_carries_total_size() {
        let resp = build_416_response(1000);
        assert_eq!(resp.status(), StatusCode::RANGE_NOT_SATISFIABLE);
        assert_eq!(resp.headers()["Content-Range"], "bytes */1000");
    }

    #[tokio::test]
    async fn test_404_body() {
        let body = build_404_response().into_body().collect().await.unwrap();
        assert_eq!(body.to_bytes(), Bytes::from("404 Not Found"));
    }
}
