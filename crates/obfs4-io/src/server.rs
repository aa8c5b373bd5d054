//! Server-role TCP carrier: accept a socket, drive the handshake to
//! [`ConnectionState::Open`](obfs4_core::ConnectionState::Open).

use obfs4_core::{Connection, ConnectionError, ServerKeys};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};

use crate::environment::TokioEnvironment;

/// A connected, open obfs4 server connection over a plain TCP socket.
pub type TcpConnection = Connection<TcpStream, TokioEnvironment>;

/// Bind a listener and accept obfs4 connections from it, one at a time.
pub struct Listener {
    inner: TcpListener,
    keys: ServerKeys,
}

impl Listener {
    /// Bind a TCP listener at `addr`, accepting connections with `keys`.
    pub async fn bind<A: ToSocketAddrs>(addr: A, keys: ServerKeys) -> Result<Self, ConnectionError> {
        let inner = TcpListener::bind(addr).await.map_err(ConnectionError::from)?;
        Ok(Self { inner, keys })
    }

    /// Accept one TCP connection and drive the server side of the
    /// handshake to completion.
    ///
    /// A peer that fails the handshake (bad MAC, replay, truncated
    /// carrier) only fails this one accept; the listener itself stays
    /// usable.
    pub async fn accept(&self) -> Result<TcpConnection, ConnectionError> {
        let (stream, peer) = self.inner.accept().await.map_err(ConnectionError::from)?;
        stream.set_nodelay(true).map_err(ConnectionError::from)?;
        tracing::debug!(%peer, "accepted carrier, starting handshake");
        Connection::accept(stream, self.keys.clone(), TokioEnvironment).await
    }

    /// The address this listener is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.inner.local_addr()
    }
}
