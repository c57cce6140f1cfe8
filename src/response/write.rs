//! Response serialization and the bounded transfer engine.
use bytes::BytesMut;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::log::*;
use crate::response::{Body, Response, MIME_TEXT};
use crate::status::StatusCode;

/// Transfer buffer size for streaming bodies. At most one chunk of this
/// size is outstanding between a read and its flushed write.
const TRANSFER_CHUNK: usize = 512;

/// Serializes one [`Response`] onto a sink.
///
/// The head (status line and header fields) is accumulated in a buffer and
/// written in a single call when the body starts; afterwards header writes
/// are rejected.
#[derive(Debug)]
pub struct Responder<W> {
    io: W,
    head: BytesMut,
    body_started: bool,
}

impl<W: AsyncWrite + Unpin> Responder<W> {
    pub fn new(io: W) -> Self {
        Self {
            io,
            head: BytesMut::with_capacity(256),
            body_started: false,
        }
    }

    /// Append the status line, e.g. `HTTP/1.1 200 OK`.
    pub fn write_status_line(&mut self, status: StatusCode) {
        if self.body_started {
            warning!("status line after body start ignored");
            return;
        }
        self.head.extend_from_slice(b"HTTP/1.1 ");
        self.head.extend_from_slice(status.as_str().as_bytes());
        self.head.extend_from_slice(b"\r\n");
    }

    /// Append one header field.
    pub fn write_header(&mut self, name: &[u8], value: &[u8]) {
        if self.body_started {
            warning!("header after body start ignored");
            return;
        }
        self.head.extend_from_slice(name);
        self.head.extend_from_slice(b": ");
        self.head.extend_from_slice(value);
        self.head.extend_from_slice(b"\r\n");
    }

    fn write_content_length(&mut self, len: usize) {
        let mut buf = itoa::Buffer::new();
        self.write_header(b"Content-Length", buf.format(len).as_bytes());
    }

    /// Terminate the head and flush it to the sink.
    async fn start_body(&mut self) -> io::Result<()> {
        debug_assert!(!self.body_started);
        self.head.extend_from_slice(b"\r\n");
        self.io.write_all(&self.head).await?;
        self.head.clear();
        self.body_started = true;
        Ok(())
    }

    /// Serialize `response` and consume the responder.
    ///
    /// Buffered bodies carry an exact `Content-Length`; streaming bodies
    /// carry none and are delimited by the connection closing. A source
    /// that fails before its first byte is replaced by a plain 500.
    pub async fn send(mut self, response: Response) -> io::Result<()> {
        let (status, headers, mime, body) = response.into_parts();

        match body {
            Body::Empty => {
                self.write_head(status, &headers, &mime, Some(0));
                self.start_body().await?;
            }
            Body::Full(bytes) => {
                self.write_head(status, &headers, &mime, Some(bytes.len()));
                self.start_body().await?;
                self.io.write_all(&bytes).await?;
            }
            Body::Reader(mut reader) => {
                let mut transfer = ChunkedTransfer::new();
                // probe the source before committing to the head, a dead
                // source still gets a well-formed error response
                match transfer.fill(&mut reader).await {
                    Ok(_) => {
                        self.write_head(status, &headers, &mime, None);
                        self.start_body().await?;
                        transfer.pump(&mut reader, &mut self.io).await?;
                    }
                    Err(err) => {
                        error!("unreadable response body: {err}");
                        let detail = b"response body unavailable";
                        self.write_head(
                            StatusCode::INTERNAL_SERVER_ERROR,
                            &crate::headers::HeaderMap::new(),
                            MIME_TEXT.as_bytes(),
                            Some(detail.len()),
                        );
                        self.start_body().await?;
                        self.io.write_all(detail).await?;
                    }
                }
            }
        }
        self.io.flush().await
    }

    fn write_head(
        &mut self,
        status: StatusCode,
        headers: &crate::headers::HeaderMap,
        mime: &[u8],
        content_length: Option<usize>,
    ) {
        self.write_status_line(status);
        for (name, value) in headers.iter() {
            self.write_header(name, value);
        }
        self.write_header(b"Content-Type", mime);
        if let Some(len) = content_length {
            self.write_content_length(len);
        }
    }

    pub fn into_inner(self) -> W {
        self.io
    }
}

// ===== Transfer engine =====

/// Fixed-size pump between a body source and the sink.
///
/// Holds exactly one buffer; each filled chunk is written and flushed
/// before the next read, bounding memory regardless of body size.
struct ChunkedTransfer {
    buffer: [u8; TRANSFER_CHUNK],
    filled: usize,
}

impl ChunkedTransfer {
    fn new() -> Self {
        Self { buffer: [0; TRANSFER_CHUNK], filled: 0 }
    }

    /// Read one chunk from the source. Returns the number of bytes read,
    /// zero at EOF.
    async fn fill<R: AsyncRead + Unpin>(&mut self, reader: &mut R) -> io::Result<usize> {
        self.filled = reader.read(&mut self.buffer).await?;
        Ok(self.filled)
    }

    /// Drain the held chunk and alternate read/write until EOF.
    async fn pump<R, W>(&mut self, reader: &mut R, writer: &mut W) -> io::Result<u64>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut total = 0u64;
        while self.filled > 0 {
            writer.write_all(&self.buffer[..self.filled]).await?;
            writer.flush().await?;
            total += self.filled as u64;
            self.fill(reader).await?;
        }
        Ok(total)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::response::Response;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::ReadBuf;

    async fn render(response: Response) -> String {
        let mut out = Vec::new();
        Responder::new(&mut out).send(response).await.unwrap();
        String::from_utf8(out).unwrap()
    }

    #[tokio::test]
    async fn buffered_body_has_exact_content_length() {
        let wire = render(Response::text(StatusCode::OK, "hello")).await;
        assert!(wire.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(wire.contains("Content-Type: text/plain\r\n"));
        assert!(wire.contains("Content-Length: 5\r\n"));
        assert!(wire.ends_with("\r\n\r\nhello"));
    }

    #[tokio::test]
    async fn empty_body_defaults_mime() {
        let wire = render(Response::new(StatusCode::NO_CONTENT)).await;
        assert!(wire.starts_with("HTTP/1.1 204 No Content\r\n"));
        assert!(wire.contains("Content-Type: application/x-empty\r\n"));
        assert!(wire.contains("Content-Length: 0\r\n"));
    }

    #[tokio::test]
    async fn streaming_body_has_no_content_length() {
        let source: &[u8] = &[b'x'; TRANSFER_CHUNK * 2 + 17];
        let wire =
            render(Response::stream(StatusCode::OK, "application/octet-stream", source))
                .await;
        assert!(!wire.contains("Content-Length"));
        let body = wire.split_once("\r\n\r\n").unwrap().1;
        assert_eq!(body.len(), TRANSFER_CHUNK * 2 + 17);
    }

    #[tokio::test]
    async fn dead_source_becomes_internal_error() {
        struct Broken;
        impl AsyncRead for Broken {
            fn poll_read(
                self: Pin<&mut Self>,
                _: &mut Context<'_>,
                _: &mut ReadBuf<'_>,
            ) -> Poll<io::Result<()>> {
                Poll::Ready(Err(io::Error::other("backing device gone")))
            }
        }

        let wire = render(Response::stream(StatusCode::OK, "text/plain", Broken)).await;
        assert!(wire.starts_with("HTTP/1.1 500 Internal Server Error\r\n"));
        assert!(wire.ends_with("response body unavailable"));
    }

    #[tokio::test]
    async fn headers_rejected_after_body_start() {
        let mut out = Vec::new();
        let mut responder = Responder::new(&mut out);
        responder.write_status_line(StatusCode::OK);
        responder.write_content_length(0);
        responder.start_body().await.unwrap();
        responder.write_header(b"Late", b"nope");
        let wire = String::from_utf8(responder.into_inner().to_vec()).unwrap();
        assert!(!wire.contains("Late"));
    }
}
