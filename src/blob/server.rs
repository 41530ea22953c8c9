//! Blob serving module
//!
//! Resolves a blob, answers conditional requests from its content id and
//! otherwise hands its content to the [`ContentResponder`].

use super::store::{Blob, BlobStore};
use crate::content::responder::{ContentRequest, ContentResponder};
use crate::content::sink::ResponseSink;
use crate::content::source::ByteSource;
use crate::error::{Result, ServeError};
use crate::http::cache::{blob_etag, check_etag_match};
use crate::logger;
use hyper::header::{HeaderValue, CACHE_CONTROL, ETAG};
use hyper::StatusCode;

/// Request-scoped inputs for serving one blob
#[derive(Debug, Clone, Default)]
pub struct BlobRequest {
    /// Tree path of the blob
    pub path: String,
    pub if_none_match: Option<String>,
    pub range_header: Option<String>,
    /// `?render=` flag: force text rendering
    pub render: bool,
    pub head_only: bool,
}

/// Serves blobs from a store
#[derive(Debug)]
pub struct BlobServer<S> {
    store: S,
    responder: ContentResponder,
}

impl<S: BlobStore> BlobServer<S> {
    pub const fn new(store: S, responder: ContentResponder) -> Self {
        Self { store, responder }
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Resolve `req.path` and serve the blob found there
    pub async fn serve_path<W: ResponseSink>(&self, req: &BlobRequest, sink: &mut W) -> Result<u64> {
        let blob = self
            .store
            .lookup(&req.path)
            .await
            .map_err(ServeError::Store)?
            .ok_or_else(|| ServeError::NotFound(req.path.clone()))?;
        self.serve(&blob, req, sink).await?;
        Ok(blob.size())
    }

    /// Serve a resolved blob
    ///
    /// A matching `If-None-Match` answers 304 without opening the content.
    /// The content reader is closed on every path once opened; close
    /// failures are logged only.
    pub async fn serve<W: ResponseSink>(&self, blob: &Blob, req: &BlobRequest, sink: &mut W) -> Result<()> {
        let etag = blob_etag(blob.id());
        let etag_value = HeaderValue::from_str(&etag).ok();

        if check_etag_match(req.if_none_match.as_deref(), &etag) {
            sink.set_status(StatusCode::NOT_MODIFIED);
            if let Some(value) = etag_value {
                sink.headers_mut().insert(ETAG, value);
            }
            if let Ok(cache) = HeaderValue::from_str(&self.responder.options().cache.to_header_value()) {
                sink.headers_mut().insert(CACHE_CONTROL, cache);
            }
            return sink.commit().await.map_err(ServeError::Write);
        }

        let mut reader = self.store.open(blob).await.map_err(ServeError::Store)?;

        if let Some(value) = etag_value {
            sink.headers_mut().insert(ETAG, value);
        }
        let content_req = ContentRequest {
            name: blob.path().to_string(),
            declared_size: i64::try_from(blob.size()).unwrap_or(-1),
            range_header: req.range_header.clone(),
            render: req.render,
            supports_seek: reader.supports_seek(),
            head_only: req.head_only,
        };
        let result = self.responder.respond(&content_req, &mut reader, sink).await;

        if let Err(e) = reader.close().await {
            logger::log_error(&format!("ServeBlob: Close {}: {e}", blob.path()));
        }
        result
    }
}
