//! Accept loop over a transport-agnostic listener.
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;

#[cfg(unix)]
use tokio::net::UnixListener;

use crate::conn;
use crate::log::*;
use crate::router::Router;

// ===== Listener =====

/// Accept source the server runs on.
///
/// Keeps the engine transport-agnostic; TCP and unix domain sockets are
/// provided, anything else only has to yield a byte stream.
pub trait Listener {
    type Stream: AsyncRead + AsyncWrite + Send + Unpin + 'static;

    /// Wait for one inbound connection.
    ///
    /// The peer address is `None` for transports without one.
    fn accept(
        &self,
    ) -> impl Future<Output = io::Result<(Self::Stream, Option<SocketAddr>)>> + Send;
}

impl Listener for TcpListener {
    type Stream = tokio::net::TcpStream;

    async fn accept(&self) -> io::Result<(Self::Stream, Option<SocketAddr>)> {
        let (stream, addr) = TcpListener::accept(self).await?;
        Ok((stream, Some(addr)))
    }
}

#[cfg(unix)]
impl Listener for UnixListener {
    type Stream = tokio::net::UnixStream;

    async fn accept(&self) -> io::Result<(Self::Stream, Option<SocketAddr>)> {
        let (stream, _) = UnixListener::accept(self).await?;
        Ok((stream, None))
    }
}

// ===== Server =====

/// Connection handling knobs.
#[derive(Clone, Debug, Default)]
pub struct ServerConfig {
    /// Abandon a connection whose next fragment does not arrive within
    /// this window. Off by default, a silent peer is waited on forever.
    pub read_timeout: Option<Duration>,
}

/// The accept loop. One task is spawned per accepted connection; each
/// serves exactly one request and closes.
#[derive(Debug)]
pub struct Server {
    router: Arc<Router>,
    config: ServerConfig,
}

impl Server {
    pub fn new(router: Router) -> Self {
        Self::with_config(router, ServerConfig::default())
    }

    pub fn with_config(router: Router, config: ServerConfig) -> Self {
        Self { router: Arc::new(router), config }
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    /// Accept connections until the listener fails or the task is dropped.
    ///
    /// Accept errors are transient (the peer may already be gone); they
    /// are logged and the loop continues.
    pub async fn run<L: Listener>(&self, listener: L) {
        loop {
            match listener.accept().await {
                Ok((stream, remote)) => {
                    let router = Arc::clone(&self.router);
                    let config = self.config.clone();
                    tokio::spawn(conn::serve_connection(stream, remote, router, config));
                }
                Err(err) => {
                    warning!("failed to accept peer: {err}");
                }
            }
        }
    }
}
