//! Byte sources for blob content
//!
//! A source is read sequentially. Sources backed by random-access storage
//! also support repositioning, which is what enables range responses.

use std::future::Future;
use std::io::{self, SeekFrom};
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncSeekExt};

/// Readable blob content
pub trait ByteSource: AsyncRead + Unpin {
    /// Whether [`ByteSource::seek_to`] is available
    fn supports_seek(&self) -> bool {
        false
    }

    /// Move the read position to `pos` bytes from the start
    fn seek_to(&mut self, pos: u64) -> impl Future<Output = io::Result<()>> {
        async move {
            Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("source cannot seek to {pos}"),
            ))
        }
    }

    /// Release the underlying resource
    fn close(&mut self) -> impl Future<Output = io::Result<()>> {
        async { Ok(()) }
    }
}

/// Seekable source over a file
#[derive(Debug)]
pub struct FileSource {
    file: Option<File>,
}

impl FileSource {
    pub const fn new(file: File) -> Self {
        Self { file: Some(file) }
    }

    fn file_mut(&mut self) -> io::Result<&mut File> {
        self.file
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "source already closed"))
    }
}

impl AsyncRead for FileSource {
    fn poll_read(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
        buf: &mut tokio::io::ReadBuf<'_>,
    ) -> std::task::Poll<io::Result<()>> {
        match self.get_mut().file.as_mut() {
            Some(file) => std::pin::Pin::new(file).poll_read(cx, buf),
            None => std::task::Poll::Ready(Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "source already closed",
            ))),
        }
    }
}

impl ByteSource for FileSource {
    fn supports_seek(&self) -> bool {
        self.file.is_some()
    }

    async fn seek_to(&mut self, pos: u64) -> io::Result<()> {
        self.file_mut()?.seek(SeekFrom::Start(pos)).await?;
        Ok(())
    }

    async fn close(&mut self) -> io::Result<()> {
        // Dropping the handle closes the descriptor; a second close is a caller bug
        self.file
            .take()
            .map(drop)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "source already closed"))
    }
}

/// Sequential source over any reader (pipes, decoders, in-memory data)
#[derive(Debug)]
pub struct StreamSource<R> {
    inner: R,
}

impl<R: AsyncRead + Unpin> StreamSource<R> {
    pub const fn new(inner: R) -> Self {
        Self { inner }
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for StreamSource<R> {
    fn poll_read(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
        buf: &mut tokio::io::ReadBuf<'_>,
    ) -> std::task::Poll<io::Result<()>> {
        std::pin::Pin::new(&mut self.get_mut().inner).poll_read(cx, buf)
    }
}

impl<R: AsyncRead + Unpin> ByteSource for StreamSource<R> {}
