//! Per-connection request/response cycle.
use bytes::BytesMut;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::log::*;
use crate::parser::{FeedState, RequestParser};
use crate::response::write::Responder;
use crate::response::Response;
use crate::router::Router;
use crate::server::ServerConfig;
use crate::status::StatusCode;

const READ_CHUNK: usize = 4 * 1024;

/// Drive one connection through its single request/response cycle.
///
/// Reads fragments into the parser until the message completes, dispatches
/// it, writes the response (404 when nothing matched), then closes. A peer
/// close, read timeout or parse error tears the connection down without a
/// response; any pipelined bytes past the first message are discarded with
/// the stream.
pub async fn serve_connection<IO>(
    mut io: IO,
    remote: Option<SocketAddr>,
    router: Arc<Router>,
    config: ServerConfig,
) where
    IO: AsyncRead + AsyncWrite + Send + Unpin,
{
    let mut parser = RequestParser::new(remote);
    let mut buf = BytesMut::with_capacity(READ_CHUNK);

    loop {
        buf.clear();
        let read = match config.read_timeout {
            Some(window) => {
                match tokio::time::timeout(window, io.read_buf(&mut buf)).await {
                    Ok(read) => read,
                    Err(_) => {
                        warning!("connection read timed out");
                        return;
                    }
                }
            }
            None => io.read_buf(&mut buf).await,
        };

        match read {
            Ok(0) => {
                debug!("peer closed before the message completed");
                return;
            }
            Ok(_) => {}
            Err(err) => {
                warning!("connection read failed: {err}");
                return;
            }
        }

        match parser.feed(&buf) {
            Ok(FeedState::Partial) => {}
            Ok(FeedState::Complete) => break,
            Err(err) => {
                warning!("malformed request: {err}");
                return;
            }
        }
    }

    let request = parser.into_request().into_shared();
    info!("{} {}", request.method(), request.url().path());

    let response = match router.dispatch(request).await {
        Some(response) => response,
        None => Response::new(StatusCode::NOT_FOUND),
    };

    if let Err(err) = Responder::new(&mut io).send(response).await {
        warning!("failed to write response: {err}");
        return;
    }
    if let Err(err) = io.shutdown().await {
        debug!("connection shutdown failed: {err}");
    }
}
