//! Response sinks
//!
//! A sink collects status and headers until it is committed; the first body
//! write commits implicitly. After commit headers are frozen, mirroring how
//! an HTTP/1.1 response head is flushed before its body.

use crate::http::ResponseBody;
use http_body_util::BodyExt;
use hyper::body::{Body, Bytes, Frame};
use hyper::header::HeaderMap;
use hyper::{Response, StatusCode};
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// Chunks buffered between the serving task and the connection
const BODY_CHANNEL_CAPACITY: usize = 8;

/// Destination of a streamed response
pub trait ResponseSink {
    fn set_status(&mut self, status: StatusCode);

    /// Mutable response headers; changes after commit are ignored
    fn headers_mut(&mut self) -> &mut HeaderMap;

    fn is_committed(&self) -> bool;

    /// Freeze status and headers and hand them to the client side
    fn commit(&mut self) -> impl Future<Output = io::Result<()>>;

    /// Write a body chunk, committing first if needed
    fn write(&mut self, chunk: Bytes) -> impl Future<Output = io::Result<()>>;
}

/// Head of the response as delivered to the transport
type Head = Response<()>;

/// Sink feeding a hyper response through channels
///
/// The head travels over a oneshot channel at commit; body chunks follow over
/// a bounded channel drained by [`ChannelBody`].
pub struct ChannelSink {
    status: StatusCode,
    headers: HeaderMap,
    head_tx: Option<oneshot::Sender<Head>>,
    body_tx: mpsc::Sender<io::Result<Bytes>>,
    discard_body: bool,
    write_timeout: Option<Duration>,
}

/// Receiving half of a [`ChannelSink`]
pub struct PendingResponse {
    head_rx: oneshot::Receiver<Head>,
    body_rx: mpsc::Receiver<io::Result<Bytes>>,
}

impl ChannelSink {
    /// Create a sink and the matching pending response
    ///
    /// With `discard_body` (HEAD requests) writes succeed without sending data.
    pub fn new(discard_body: bool) -> (Self, PendingResponse) {
        let (head_tx, head_rx) = oneshot::channel();
        let (body_tx, body_rx) = mpsc::channel(BODY_CHANNEL_CAPACITY);
        (
            Self {
                status: StatusCode::OK,
                headers: HeaderMap::new(),
                head_tx: Some(head_tx),
                body_tx,
                discard_body,
                write_timeout: None,
            },
            PendingResponse { head_rx, body_rx },
        )
    }

    /// Fail writes that wait longer than `timeout` for the client to drain
    #[must_use]
    pub const fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = Some(timeout);
        self
    }

    /// Abort a committed response so the client sees a broken body, not a short one
    pub async fn abort(&mut self, error: io::Error) {
        // Receiver gone means the client already left
        let _ = self.body_tx.send(Err(error)).await;
    }
}

impl ResponseSink for ChannelSink {
    fn set_status(&mut self, status: StatusCode) {
        if !self.is_committed() {
            self.status = status;
        }
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn is_committed(&self) -> bool {
        self.head_tx.is_none()
    }

    async fn commit(&mut self) -> io::Result<()> {
        let Some(head_tx) = self.head_tx.take() else {
            return Ok(());
        };
        let mut head = Response::new(());
        *head.status_mut() = self.status;
        *head.headers_mut() = std::mem::take(&mut self.headers);
        head_tx
            .send(head)
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "response receiver dropped"))
    }

    async fn write(&mut self, chunk: Bytes) -> io::Result<()> {
        self.commit().await?;
        if self.discard_body || chunk.is_empty() {
            return Ok(());
        }
        let send = self.body_tx.send(Ok(chunk));
        let sent = match self.write_timeout {
            Some(limit) => tokio::time::timeout(limit, send).await.map_err(|_| {
                io::Error::new(io::ErrorKind::TimedOut, "client stopped reading")
            })?,
            None => send.await,
        };
        sent.map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "client disconnected"))
    }
}

impl PendingResponse {
    /// Wait for the head; `None` if the sink was dropped without committing
    pub async fn head(self) -> Option<Response<ResponseBody>> {
        let head = self.head_rx.await.ok()?;
        let body = ChannelBody { rx: self.body_rx }.boxed_unsync();
        let (parts, ()) = head.into_parts();
        Some(Response::from_parts(parts, body))
    }
}

/// Streaming body backed by the sink's chunk channel
pub struct ChannelBody {
    rx: mpsc::Receiver<io::Result<Bytes>>,
}

impl Body for ChannelBody {
    type Data = Bytes;
    type Error = io::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        self.get_mut()
            .rx
            .poll_recv(cx)
            .map(|chunk| chunk.map(|result| result.map(Frame::data)))
    }
}

/// In-memory sink used by tests
#[cfg(test)]
#[derive(Debug, Default)]
pub struct BufferedSink {
    pub status: Option<StatusCode>,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
    pub committed: bool,
    /// Fail writes once this many body bytes were accepted
    pub fail_after: Option<usize>,
}

#[cfg(test)]
impl BufferedSink {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::OK)
    }
}

#[cfg(test)]
impl ResponseSink for BufferedSink {
    fn set_status(&mut self, status: StatusCode) {
        if !self.committed {
            self.status = Some(status);
        }
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn is_committed(&self) -> bool {
        self.committed
    }

    async fn commit(&mut self) -> io::Result<()> {
        self.committed = true;
        Ok(())
    }

    async fn write(&mut self, chunk: Bytes) -> io::Result<()> {
        self.committed = true;
        if let Some(limit) = self.fail_after {
            if self.body.len() + chunk.len() > limit {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "sink closed"));
            }
        }
        self.body.extend_from_slice(&chunk);
        Ok(())
    }
}
