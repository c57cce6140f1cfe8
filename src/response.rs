//! HTTP response assembly.
use bytes::Bytes;
use futures_core::Stream;
use std::fmt;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, ReadBuf};

use crate::headers::HeaderMap;
use crate::status::StatusCode;

pub mod write;

/// Content type written when a response never declared one.
pub const MIME_EMPTY: &str = "application/x-empty";
pub const MIME_TEXT: &str = "text/plain";
pub const MIME_JSON: &str = "application/json";

/// Response payload.
///
/// A [`Full`][Body::Full] body is written with an exact `Content-Length`.
/// A [`Reader`][Body::Reader] body is pumped through the bounded transfer
/// buffer with no `Content-Length`; closing the connection delimits it.
pub enum Body {
    Empty,
    Full(Bytes),
    Reader(Box<dyn AsyncRead + Send + Unpin>),
}

impl Body {
    /// Adapt a [`Stream`] of byte chunks into a readable body source.
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = io::Result<Bytes>> + Send + Unpin + 'static,
    {
        Self::Reader(Box::new(StreamReader { stream, chunk: Bytes::new() }))
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Empty => f.write_str("Body::Empty"),
            Body::Full(bytes) => write!(f, "Body::Full({} bytes)", bytes.len()),
            Body::Reader(_) => f.write_str("Body::Reader"),
        }
    }
}

/// An HTTP response a handler hands back to the connection.
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    mime: Option<Bytes>,
    body: Body,
}

impl Response {
    /// Response with the given status and no body.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            mime: None,
            body: Body::Empty,
        }
    }

    /// Plain-text response.
    pub fn text(status: StatusCode, text: impl Into<Bytes>) -> Self {
        Self::bytes(status, MIME_TEXT, text)
    }

    /// Response from raw bytes with an explicit content type.
    pub fn bytes(status: StatusCode, mime: &str, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            mime: Some(Bytes::copy_from_slice(mime.as_bytes())),
            body: Body::Full(body.into()),
        }
    }

    /// JSON response serialized from a [`serde_json::Value`].
    pub fn json(status: StatusCode, value: &serde_json::Value) -> Self {
        Self::bytes(status, MIME_JSON, value.to_string())
    }

    /// Streaming response read from `source` until EOF.
    pub fn stream(
        status: StatusCode,
        mime: &str,
        source: impl AsyncRead + Send + Unpin + 'static,
    ) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            mime: Some(Bytes::copy_from_slice(mime.as_bytes())),
            body: Body::Reader(Box::new(source)),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Declared content type, or [`MIME_EMPTY`] when none was set.
    pub fn mime(&self) -> &[u8] {
        self.mime.as_deref().unwrap_or(MIME_EMPTY.as_bytes())
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub(crate) fn into_parts(self) -> (StatusCode, HeaderMap, Bytes, Body) {
        let mime = self.mime.unwrap_or_else(|| Bytes::from_static(MIME_EMPTY.as_bytes()));
        (self.status, self.headers, mime, self.body)
    }
}

// ===== Stream adapter =====

/// Reader over a [`Stream`] of byte chunks, carrying the unread remainder
/// of the current chunk between polls.
struct StreamReader<S> {
    stream: S,
    chunk: Bytes,
}

impl<S> AsyncRead for StreamReader<S>
where
    S: Stream<Item = io::Result<Bytes>> + Send + Unpin,
{
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        loop {
            if !self.chunk.is_empty() {
                let take = self.chunk.len().min(buf.remaining());
                buf.put_slice(&self.chunk.split_to(take));
                return Poll::Ready(Ok(()));
            }
            match Pin::new(&mut self.stream).poll_next(cx) {
                Poll::Ready(Some(Ok(chunk))) => self.chunk = chunk,
                Poll::Ready(Some(Err(err))) => return Poll::Ready(Err(err)),
                Poll::Ready(None) => return Poll::Ready(Ok(())),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::status::StatusCode;
    use tokio::io::AsyncReadExt;

    #[test]
    fn default_mime_is_empty_marker() {
        let response = Response::new(StatusCode::NO_CONTENT);
        assert_eq!(response.mime(), MIME_EMPTY.as_bytes());
    }

    #[test]
    fn json_body() {
        let response =
            Response::json(StatusCode::OK, &serde_json::json!({ "authorized": true }));
        assert_eq!(response.mime(), MIME_JSON.as_bytes());
        let Body::Full(bytes) = response.body() else {
            panic!("expected buffered body");
        };
        assert_eq!(&bytes[..], br#"{"authorized":true}"#);
    }

    #[tokio::test]
    async fn stream_reader_concatenates_chunks() {
        let chunks: Vec<io::Result<Bytes>> =
            vec![Ok(Bytes::from_static(b"ab")), Ok(Bytes::from_static(b"cd"))];
        let body = Body::from_stream(chunk_stream(chunks));
        let Body::Reader(mut reader) = body else {
            panic!("expected reader body");
        };
        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"abcd");
    }

    // minimal iterator-backed stream, enough to exercise the adapter
    fn chunk_stream(
        items: Vec<io::Result<Bytes>>,
    ) -> impl Stream<Item = io::Result<Bytes>> + Send + Unpin {
        struct Iter(std::vec::IntoIter<io::Result<Bytes>>);
        impl Stream for Iter {
            type Item = io::Result<Bytes>;
            fn poll_next(
                mut self: Pin<&mut Self>,
                _: &mut Context<'_>,
            ) -> Poll<Option<Self::Item>> {
                Poll::Ready(self.0.next())
            }
        }
        Iter(items.into_iter())
    }
}
