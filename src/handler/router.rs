//! Request routing dispatch module
//!
//! Entry point for HTTP request processing: method validation, health checks
//! and dispatch of blob requests to the serving task.

use crate::blob::BlobRequest;
use crate::config::AppState;
use crate::content::{ChannelSink, ResponseSink};
use crate::error::ServeError;
use crate::http::{self, ResponseBody};
use crate::logger::{self, AccessLogEntry};
use hyper::header::{CONTENT_LENGTH, CONTENT_TYPE, IF_NONE_MATCH, RANGE, REFERER, USER_AGENT};
use hyper::{Method, Request, Response, Version};
use std::convert::Infallible;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;

/// Liveness probe path
pub const HEALTH_PATH: &str = "/healthz";

/// Main entry point for HTTP request handling
///
/// Must run inside a `LocalSet`: blob content is produced by a local task
/// that streams into the response body.
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    peer_addr: SocketAddr,
) -> Result<Response<ResponseBody>, Infallible> {
    let started = Instant::now();

    let response = match *req.method() {
        Method::GET | Method::HEAD if req.uri().path() == HEALTH_PATH => {
            http::build_health_response("ok")
        }
        Method::GET | Method::HEAD => serve_blob(&req, &state).await,
        Method::OPTIONS => http::build_options_response(),
        _ => {
            logger::log_warning(&format!("Method not allowed: {}", req.method()));
            http::build_405_response()
        }
    };

    if state.access_log_enabled() {
        let entry = access_entry(&req, &response, peer_addr, started);
        logger::log_access(&entry, &state.config.logging.access_log_format);
    }
    Ok(response)
}

/// Run the blob pipeline in a local task and wait for the response head
async fn serve_blob<B>(req: &Request<B>, state: &Arc<AppState>) -> Response<ResponseBody> {
    let Some(path) = decode_path(req.uri().path()) else {
        logger::log_warning(&format!("Undecodable request path: {}", req.uri().path()));
        return http::build_404_response();
    };
    let blob_req = BlobRequest {
        path,
        if_none_match: header_string(req, IF_NONE_MATCH),
        range_header: header_string(req, RANGE),
        render: req.uri().query().is_some_and(render_requested),
        head_only: req.method() == Method::HEAD,
    };

    let (mut sink, pending) = ChannelSink::new(blob_req.head_only);
    let write_timeout = state.config.performance.write_timeout;
    if write_timeout > 0 {
        sink = sink.with_write_timeout(Duration::from_secs(write_timeout));
    }

    // Errors raised before commit come back here so a status can still be chosen
    let (err_tx, err_rx) = oneshot::channel::<ServeError>();
    let task_state = Arc::clone(state);
    tokio::task::spawn_local(async move {
        let Err(err) = task_state.blobs.serve_path(&blob_req, &mut sink).await else {
            return;
        };
        if sink.is_committed() {
            logger::log_error(&format!("ServeBlob {} aborted: {err}", blob_req.path));
            sink.abort(io::Error::other(err.to_string())).await;
        } else {
            let _ = err_tx.send(err);
        }
    });

    if let Some(response) = pending.head().await {
        return response;
    }
    match err_rx.await {
        Ok(err) => error_response(&err),
        Err(_) => {
            logger::log_error("Blob task ended without a response");
            http::build_500_response()
        }
    }
}

fn error_response(err: &ServeError) -> Response<ResponseBody> {
    match err {
        ServeError::NotFound(_) => http::build_404_response(),
        ServeError::MalformedRange { size, .. } => {
            logger::log_warning(&format!("{}: {err}", err.status()));
            http::build_416_response(*size)
        }
        ServeError::SourceRead(_) | ServeError::Write(_) | ServeError::Store(_) => {
            logger::log_error(&format!("{}: {err}", err.status()));
            http::build_500_response()
        }
    }
}

fn header_string<B>(req: &Request<B>, name: hyper::header::HeaderName) -> Option<String> {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string)
}

/// Whether the query string carries a true `render` flag
fn render_requested(query: &str) -> bool {
    query.split('&').any(|pair| {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        key == "render" && matches!(value, "1" | "t" | "T" | "true" | "TRUE" | "True")
    })
}

/// Percent-decode a URL path; `None` on bad escapes or non-UTF-8 results
fn decode_path(path: &str) -> Option<String> {
    let bytes = path.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = std::str::from_utf8(bytes.get(i + 1..i + 3)?).ok()?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

fn access_entry<B>(
    req: &Request<B>,
    response: &Response<ResponseBody>,
    peer_addr: SocketAddr,
    started: Instant,
) -> AccessLogEntry {
    let mut entry = AccessLogEntry::new(
        peer_addr.ip().to_string(),
        req.method().to_string(),
        req.uri().path().to_string(),
    );
    entry.query = req.uri().query().map(ToString::to_string);
    entry.http_version = match req.version() {
        Version::HTTP_09 => "0.9",
        Version::HTTP_10 => "1.0",
        Version::HTTP_2 => "2",
        Version::HTTP_3 => "3",
        _ => "1.1",
    }
    .to_string();
    entry.status = response.status().as_u16();
    entry.body_bytes = response
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    entry.range = header_string(req, RANGE);
    entry.content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string);
    entry.referer = header_string(req, REFERER);
    entry.user_agent = header_string(req, USER_AGENT);
    entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
    entry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use http_body_util::BodyExt;
    use hyper::body::Bytes;
    use hyper::StatusCode;

    fn test_state(root: &std::path::Path) -> Arc<AppState> {
        let mut config = Config::load_from("does-not-exist/config").unwrap();
        config.storage.root = root.to_string_lossy().into_owned();
        config.logging.access_log = false;
        Arc::new(AppState::new(&config))
    }

    fn request(method: Method, uri: &str, headers: &[(&str, &str)]) -> Request<()> {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap()
    }

    async fn send(state: &Arc<AppState>, req: Request<()>) -> (Response<()>, Bytes) {
        let peer: SocketAddr = "127.0.0.1:40000".parse().unwrap();
        let resp = handle_request(req, Arc::clone(state), peer).await.unwrap();
        let (parts, body) = resp.into_parts();
        let body = body.collect().await.unwrap().to_bytes();
        (Response::from_parts(parts, ()), body)
    }

    /// Runs the test body on a `LocalSet` with a fixture tree
    async fn with_fixture<F, Fut>(test: F)
    where
        F: FnOnce(Arc<AppState>) -> Fut,
        Fut: std::future::Future<Output = ()>,
    {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("docs")).unwrap();
        std::fs::write(dir.path().join("docs/hello world.txt"), b"hello blob\n").unwrap();
        std::fs::write(dir.path().join("logo.svg"), b"<svg xmlns=\"http://www.w3.org/2000/svg\"></svg>").unwrap();
        let state = test_state(dir.path());
        tokio::task::LocalSet::new().run_until(test(state)).await;
    }

    #[tokio::test]
    async fn test_get_blob() {
        with_fixture(|state| async move {
            let (resp, body) = send(&state, request(Method::GET, "/docs/hello%20world.txt", &[])).await;
            assert_eq!(resp.status(), StatusCode::OK);
            assert_eq!(resp.headers()["content-type"], "text/plain; charset=utf-8");
            assert_eq!(resp.headers()["content-length"], "11");
            assert_eq!(resp.headers()["cache-control"], "public, max-age=86400");
            assert!(resp.headers().contains_key("etag"));
            assert_eq!(body, Bytes::from_static(b"hello blob\n"));
        })
        .await;
    }

    #[tokio::test]
    async fn test_head_has_headers_only() {
        with_fixture(|state| async move {
            let (resp, body) = send(&state, request(Method::HEAD, "/docs/hello%20world.txt", &[])).await;
            assert_eq!(resp.status(), StatusCode::OK);
            assert_eq!(resp.headers()["content-length"], "11");
            assert!(body.is_empty());
        })
        .await;
    }

    #[tokio::test]
    async fn test_conditional_and_range_requests() {
        with_fixture(|state| async move {
            let path = "/docs/hello%20world.txt";
            let (first, _) = send(&state, request(Method::GET, path, &[])).await;
            let etag = first.headers()["etag"].to_str().unwrap().to_string();

            let (resp, body) = send(&state, request(Method::GET, path, &[("if-none-match", etag.as_str())])).await;
            assert_eq!(resp.status(), StatusCode::NOT_MODIFIED);
            assert!(body.is_empty());

            let (resp, body) = send(&state, request(Method::GET, path, &[("range", "bytes=6-9")])).await;
            assert_eq!(resp.status(), StatusCode::PARTIAL_CONTENT);
            assert_eq!(resp.headers()["content-range"], "bytes 6-9/11");
            assert_eq!(body, Bytes::from_static(b"blob"));

            let (resp, _) = send(&state, request(Method::GET, path, &[("range", "bytes=50-60")])).await;
            assert_eq!(resp.status(), StatusCode::RANGE_NOT_SATISFIABLE);
            assert_eq!(resp.headers()["content-range"], "bytes */11");
        })
        .await;
    }

    #[tokio::test]
    async fn test_svg_headers_and_render_flag() {
        with_fixture(|state| async move {
            let (resp, _) = send(&state, request(Method::GET, "/logo.svg", &[])).await;
            assert_eq!(resp.headers()["content-type"], "image/svg+xml");
            assert!(resp.headers().contains_key("content-security-policy"));

            let (resp, _) = send(&state, request(Method::GET, "/logo.svg?render=1", &[])).await;
            assert_eq!(resp.headers()["content-type"], "text/plain; charset=utf-8");
        })
        .await;
    }

    #[tokio::test]
    async fn test_fixed_routes() {
        with_fixture(|state| async move {
            let (resp, _) = send(&state, request(Method::GET, "/missing.txt", &[])).await;
            assert_eq!(resp.status(), StatusCode::NOT_FOUND);

            let (resp, body) = send(&state, request(Method::GET, HEALTH_PATH, &[])).await;
            assert_eq!(resp.status(), StatusCode::OK);
            assert_eq!(body, Bytes::from_static(b"ok"));

            let (resp, _) = send(&state, request(Method::OPTIONS, "/logo.svg", &[])).await;
            assert_eq!(resp.status(), StatusCode::NO_CONTENT);

            let (resp, _) = send(&state, request(Method::POST, "/logo.svg", &[])).await;
            assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
        })
        .await;
    }

    #[test]
    fn test_render_requested() {
        assert!(render_requested("render=1"));
        assert!(render_requested("a=b&render=true"));
        assert!(!render_requested("render=0"));
        assert!(!render_requested("render"));
        assert!(!render_requested("rendering=1"));
    }

    #[test]
    fn test_decode_path() {
        assert_eq!(decode_path("/a%20b.txt").as_deref(), Some("/a b.txt"));
        assert_eq!(decode_path("/caf%C3%A9").as_deref(), Some("/café"));
        assert_eq!(decode_path("/bad%2"), None);
        assert_eq!(decode_path("/bad%zz"), None);
        assert_eq!(decode_path("/%FF"), None);
    }
}
