//! Content responder
//!
//! Turns a byte source into an HTTP response: honors single byte ranges on
//! seekable sources, sniffs the leading bytes, picks the representation
//! headers and streams the content. All headers are final before the first
//! body byte is written.

use super::charset::detect_encoding;
use super::policy::{self, PolicyInput};
use super::sink::ResponseSink;
use super::sniff::sniff;
use super::source::ByteSource;
use crate::error::{Result, ServeError};
use crate::http::cache::CachePolicy;
use crate::http::mime::MimeTypeMap;
use crate::http::range::{parse_range_header, RangeOutcome, RangeSpec};
use crate::logger;
use hyper::body::Bytes;
use hyper::header::{
    HeaderName, HeaderValue, ACCEPT_RANGES, CACHE_CONTROL, CONTENT_LENGTH, CONTENT_RANGE,
};
use hyper::StatusCode;
use tokio::io::AsyncReadExt;

/// Number of leading bytes used for content sniffing
pub const SNIFF_LEN: usize = 1024;

/// Read buffer size while streaming the body
const COPY_BUF_LEN: usize = 32 * 1024;

/// Everything known about one response before touching the content
#[derive(Debug, Clone, Default)]
pub struct ContentRequest {
    /// Display name or tree path; only the last element is shown to clients
    pub name: String,
    /// Size in bytes, negative when unknown
    pub declared_size: i64,
    pub range_header: Option<String>,
    /// Client asked for the content to be rendered as text
    pub render: bool,
    /// Source supports random access
    pub supports_seek: bool,
    /// HEAD request: produce headers only
    pub head_only: bool,
}

/// Operator settings that shape responses
#[derive(Debug, Clone, Default)]
pub struct ResponderOptions {
    pub cache: CachePolicy,
    pub svg_enabled: bool,
    pub mime_map: MimeTypeMap,
}

/// Writes blob content to a response sink
#[derive(Debug, Clone, Default)]
pub struct ContentResponder {
    options: ResponderOptions,
}

impl ContentResponder {
    pub const fn new(options: ResponderOptions) -> Self {
        Self { options }
    }

    pub const fn options(&self) -> &ResponderOptions {
        &self.options
    }

    /// Serve `source` as described by `req`
    ///
    /// Errors before anything was committed leave the sink untouched so the
    /// caller can still choose a status. Errors after commit can only abort.
    pub async fn respond<S, W>(&self, req: &ContentRequest, source: &mut S, sink: &mut W) -> Result<()>
    where
        S: ByteSource,
        W: ResponseSink,
    {
        let range = check_range(req, sink)?;

        let sample = read_sample(source).await?;

        set_header(sink, CACHE_CONTROL, &self.options.cache.to_header_value());
        match range {
            Some(r) => set_header(sink, CONTENT_LENGTH, &r.length.to_string()),
            None if req.declared_size >= 0 => {
                set_header(sink, CONTENT_LENGTH, &req.declared_size.to_string());
            }
            None => logger::log_error(&format!(
                "Serving {} with unknown size {}, omitting Content-Length",
                req.name, req.declared_size
            )),
        }

        let name = policy::display_name(&req.name);
        let mapped_mime = self.options.mime_map.lookup(&name);
        let sniffed = sniff(&sample);
        let classification = sniffed.classification();

        let charset = if policy::is_served_as_text(classification, req.render) {
            match detect_encoding(&sample) {
                Ok(cs) => Some(cs),
                Err(e) => {
                    logger::log_error(&format!(
                        "Detect raw file {name} charset failed: {e}, using by default {}",
                        policy::DEFAULT_CHARSET
                    ));
                    None
                }
            }
        } else {
            None
        };

        let headers = policy::decide(&PolicyInput {
            classification,
            render: req.render,
            mapped_mime,
            svg_enabled: self.options.svg_enabled,
            charset,
        });
        for (header, value) in headers.to_pairs(&name) {
            set_header(sink, header, &value);
        }

        if let Some(r) = range {
            // Range is only honored with a known, non-negative size
            let total = u64::try_from(req.declared_size).unwrap_or_default();
            sink.set_status(StatusCode::PARTIAL_CONTENT);
            set_header(sink, CONTENT_RANGE, &r.content_range(total));
        }

        sink.commit().await.map_err(ServeError::Write)?;
        if req.head_only {
            return Ok(());
        }

        match range {
            Some(r) => write_range(source, sink, &sample, r).await,
            None => write_full(source, sink, sample).await,
        }
    }
}

/// Parse the Range header when the source can honor it
///
/// Returns the range to serve, or `None` for a full response. Seekable
/// sources of known size advertise `Accept-Ranges: bytes`.
fn check_range<W: ResponseSink>(req: &ContentRequest, sink: &mut W) -> Result<Option<RangeSpec>> {
    if !req.supports_seek {
        return Ok(None);
    }
    let Ok(size) = u64::try_from(req.declared_size) else {
        if req.range_header.is_some() {
            logger::log_warning(&format!(
                "Ignoring Range header for {}: size unknown",
                req.name
            ));
        }
        return Ok(None);
    };

    set_header(sink, ACCEPT_RANGES, "bytes");

    let Some(header) = req.range_header.as_deref() else {
        return Ok(None);
    };
    match parse_range_header(header, size)? {
        RangeOutcome::Satisfiable(r) => Ok(Some(r)),
        RangeOutcome::Ignored => Ok(None),
    }
}

/// Read up to [`SNIFF_LEN`] bytes, fewer only at end of stream
async fn read_sample<S: ByteSource>(source: &mut S) -> Result<Vec<u8>> {
    let mut sample = Vec::with_capacity(SNIFF_LEN);
    (&mut *source)
        .take(SNIFF_LEN as u64)
        .read_to_end(&mut sample)
        .await
        .map_err(ServeError::SourceRead)?;
    Ok(sample)
}

/// Write the already-consumed sample, then the rest of the source verbatim
async fn write_full<S, W>(source: &mut S, sink: &mut W, sample: Vec<u8>) -> Result<()>
where
    S: ByteSource,
    W: ResponseSink,
{
    sink.write(Bytes::from(sample)).await.map_err(ServeError::Write)?;
    copy_to_sink(source, sink, None).await
}

/// Write exactly the bytes selected by `range`
async fn write_range<S, W>(source: &mut S, sink: &mut W, sample: &[u8], range: RangeSpec) -> Result<()>
where
    S: ByteSource,
    W: ResponseSink,
{
    // A range within the sample needs no second read
    let start = usize::try_from(range.start).unwrap_or(usize::MAX);
    let end = usize::try_from(range.end).unwrap_or(usize::MAX);
    if end < sample.len() {
        let slice = Bytes::copy_from_slice(&sample[start..=end]);
        return sink.write(slice).await.map_err(ServeError::Write);
    }

    source
        .seek_to(range.start)
        .await
        .map_err(ServeError::SourceRead)?;
    copy_to_sink(source, sink, Some(range.length)).await
}

/// Stream the source to the sink until EOF, or exactly `limit` bytes
async fn copy_to_sink<S, W>(source: &mut S, sink: &mut W, limit: Option<u64>) -> Result<()>
where
    S: ByteSource,
    W: ResponseSink,
{
    let mut remaining = limit;
    let mut buf = vec![0u8; COPY_BUF_LEN];
    loop {
        let want = match remaining {
            Some(0) => return Ok(()),
            Some(n) => buf.len().min(usize::try_from(n).unwrap_or(usize::MAX)),
            None => buf.len(),
        };
        let n = source
            .read(&mut buf[..want])
            .await
            .map_err(ServeError::SourceRead)?;
        if n == 0 {
            return match remaining {
                Some(left) => Err(ServeError::SourceRead(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!("content ended {left} bytes before the requested range"),
                ))),
                None => Ok(()),
            };
        }
        sink.write(Bytes::copy_from_slice(&buf[..n]))
            .await
            .map_err(ServeError::Write)?;
        if let Some(left) = remaining.as_mut() {
            *left -= n as u64;
        }
    }
}

fn set_header<W: ResponseSink>(sink: &mut W, name: HeaderName, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(v) => {
            sink.headers_mut().insert(name, v);
        }
        Err(_) => logger::log_warning(&format!("Dropping invalid {name} header value: {value:?}")),
    }
}
