//! Byte-range streaming
//!
//! Serves a payload honoring a single `Range: bytes=` request. Bodies above
//! [`STREAM_THRESHOLD`] and every file-backed body go out in
//! [`CHUNK_SIZE`] pieces, so a response never buffers more than one chunk.

use std::fs::File;
use std::io;
use std::path::Path;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;
use bytes::Bytes;
use futures::stream::{self, Stream};

/// Size of each body chunk
pub const CHUNK_SIZE: usize = 64 * 1024;

/// In-memory bodies up to this size are sent as a single chunk
pub const STREAM_THRESHOLD: u64 = 4 * 1024 * 1024;

/// Where the bytes of a payload live
#[derive(Debug, Clone)]
pub enum ByteSource {
    /// Buffered content, sliced without copying
    Memory(Bytes),
    /// A span of an open file, read with positional reads
    File {
        file: Arc<File>,
        offset: u64,
        len: u64,
    },
}

impl ByteSource {
    pub fn len(&self) -> u64 {
        match self {
            ByteSource::Memory(bytes) => bytes.len() as u64,
            ByteSource::File { len, .. } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read `len` bytes at `start`, relative to the source.
    ///
    /// Blocks on file-backed sources.
    pub fn read_range(&self, start: u64, len: usize) -> io::Result<Bytes> {
        let end = start
            .checked_add(len as u64)
            .filter(|&end| end <= self.len())
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "range past end of source"))?;
        match self {
            ByteSource::Memory(bytes) => Ok(bytes.slice(start as usize..end as usize)),
            ByteSource::File { file, offset, .. } => read_exact_at(file, offset + start, len),
        }
    }
}

/// Positional read that leaves the file cursor alone
pub(crate) fn read_exact_at(file: &File, offset: u64, len: usize) -> io::Result<Bytes> {
    let mut buf = vec![0u8; len];
    fill_at(file, &mut buf, offset)?;
    Ok(Bytes::from(buf))
}

#[cfg(unix)]
fn fill_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.read_exact_at(buf, offset)
}

#[cfg(windows)]
fn fill_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<()> {
    use std::os::windows::fs::FileExt;
    let mut filled = 0;
    while filled < buf.len() {
        let read = file.seek_read(&mut buf[filled..], offset + filled as u64)?;
        if read == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "not enough data"));
        }
        filled += read;
    }
    Ok(())
}

#[cfg(not(any(unix, windows)))]
fn fill_at(_file: &File, _buf: &mut [u8], _offset: u64) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "positional reads are not available on this platform",
    ))
}

/// Content and type of a response body
#[derive(Debug, Clone)]
pub struct Payload {
    pub source: ByteSource,
    pub content_type: String,
}

impl Payload {
    pub fn new(source: ByteSource, content_type: impl Into<String>) -> Self {
        Self {
            source,
            content_type: content_type.into(),
        }
    }

    /// Whole file on disk
    pub async fn from_path(path: &Path, content_type: impl Into<String>) -> io::Result<Self> {
        let file = tokio::fs::File::open(path).await?.into_std().await;
        let len = file.metadata()?.len();
        Ok(Self::new(
            ByteSource::File {
                file: Arc::new(file),
                offset: 0,
                len,
            },
            content_type,
        ))
    }
}

/// Outcome of interpreting a `Range` header against a resource length
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeRequest {
    /// Serve everything with 200
    Full,
    /// Inclusive byte span, served with 206
    Partial { start: u64, end: u64 },
    /// Served with 416
    Unsatisfiable,
}

fn parse_position(text: &str) -> Option<u64> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

/// Interpret a `Range` header value.
///
/// Only a single `bytes` range is honored. Anything syntactically off,
/// multi-range lists included, falls back to [`RangeRequest::Full`].
pub fn parse_range(header: &str, total: u64) -> RangeRequest {
    let Some((unit, ranges)) = header.trim().split_once('=') else {
        return RangeRequest::Full;
    };
    if !unit.trim().eq_ignore_ascii_case("bytes") || ranges.contains(',') {
        return RangeRequest::Full;
    }
    let Some((first, last)) = ranges.trim().split_once('-') else {
        return RangeRequest::Full;
    };
    let (first, last) = (first.trim(), last.trim());

    if first.is_empty() {
        // suffix form: last N bytes
        let Some(suffix) = parse_position(last) else {
            return RangeRequest::Full;
        };
        if suffix == 0 || total == 0 {
            return RangeRequest::Unsatisfiable;
        }
        return RangeRequest::Partial {
            start: total - suffix.min(total),
            end: total - 1,
        };
    }

    let Some(start) = parse_position(first) else {
        return RangeRequest::Full;
    };
    let end = if last.is_empty() {
        None
    } else {
        match parse_position(last) {
            Some(end) if end >= start => Some(end),
            _ => return RangeRequest::Full,
        }
    };

    if start >= total {
        return RangeRequest::Unsatisfiable;
    }
    RangeRequest::Partial {
        start,
        end: end.map_or(total - 1, |end| end.min(total - 1)),
    }
}

/// Build the response for `payload`, honoring the request's `Range` header
pub fn respond(payload: Payload, range: Option<&HeaderValue>) -> Response {
    let total = payload.source.len();
    let request = range
        .and_then(|value| value.to_str().ok())
        .map_or(RangeRequest::Full, |value| parse_range(value, total));

    let content_type = HeaderValue::from_str(&payload.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));

    let (status, start, len, content_range) = match request {
        RangeRequest::Full => (StatusCode::OK, 0, total, None),
        RangeRequest::Partial { start, end } => (
            StatusCode::PARTIAL_CONTENT,
            start,
            end - start + 1,
            Some(format!("bytes {}-{}/{}", start, end, total)),
        ),
        RangeRequest::Unsatisfiable => {
            tracing::debug!(total, "unsatisfiable range request");
            let mut response = Response::new(Body::empty());
            *response.status_mut() = StatusCode::RANGE_NOT_SATISFIABLE;
            let headers = response.headers_mut();
            headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
            if let Ok(value) = HeaderValue::from_str(&format!("bytes */{}", total)) {
                headers.insert(header::CONTENT_RANGE, value);
            }
            return response;
        }
    };

    let mut response = Response::new(body(payload.source, start, len));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, content_type);
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
    headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    if let Some(value) = content_range.and_then(|v| HeaderValue::from_str(&v).ok()) {
        headers.insert(header::CONTENT_RANGE, value);
    }
    response
}

fn body(source: ByteSource, start: u64, len: u64) -> Body {
    match source {
        ByteSource::Memory(bytes) if len <= STREAM_THRESHOLD => {
            Body::from(bytes.slice(start as usize..(start + len) as usize))
        }
        source => Body::from_stream(chunks(source, start, len)),
    }
}

struct ChunkCursor {
    source: ByteSource,
    position: u64,
    remaining: u64,
    sent: u64,
}

impl Drop for ChunkCursor {
    fn drop(&mut self) {
        // Dropped with bytes left: the client went away or a read failed
        if self.remaining > 0 {
            tracing::debug!(
                sent = self.sent,
                remaining = self.remaining,
                "response stream ended early"
            );
        }
    }
}

/// Lazily read `len` bytes from `start` in [`CHUNK_SIZE`] pieces
pub fn chunks(
    source: ByteSource,
    start: u64,
    len: u64,
) -> impl Stream<Item = io::Result<Bytes>> + Send + 'static {
    let cursor = ChunkCursor {
        source,
        position: start,
        remaining: len,
        sent: 0,
    };

    stream::try_unfold(cursor, |mut cursor| async move {
        if cursor.remaining == 0 {
            return Ok(None);
        }
        let n = cursor.remaining.min(CHUNK_SIZE as u64) as usize;
        let chunk = match &cursor.source {
            ByteSource::Memory(_) => cursor.source.read_range(cursor.position, n)?,
            ByteSource::File { .. } => {
                let source = cursor.source.clone();
                let position = cursor.position;
                tokio::task::spawn_blocking(move || source.read_range(position, n))
                    .await
                    .map_err(io::Error::other)?
                    .inspect_err(|e| tracing::warn!("chunk read failed: {}", e))?
            }
        };
        cursor.position += n as u64;
        cursor.remaining -= n as u64;
        cursor.sent += n as u64;
        Ok(Some((chunk, cursor)))
    })
}
