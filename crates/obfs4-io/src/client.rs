//! Client-role TCP carrier: open a socket, drive the handshake to
//! [`ConnectionState::Open`](obfs4_core::ConnectionState::Open).

use obfs4_core::{ClientKeys, Connection, ConnectionError};
use tokio::net::{TcpStream, ToSocketAddrs};

use crate::environment::TokioEnvironment;

/// A connected, open obfs4 client connection over a plain TCP socket.
pub type TcpConnection = Connection<TcpStream, TokioEnvironment>;

/// Open a TCP connection to `addr` and drive the client side of the
/// handshake to completion.
pub async fn dial<A: ToSocketAddrs>(addr: A, keys: ClientKeys) -> Result<TcpConnection, ConnectionError> {
    let stream = TcpStream::connect(addr).await.map_err(ConnectionError::from)?;
    stream.set_nodelay(true).map_err(ConnectionError::from)?;
    Connection::connect(stream, keys, TokioEnvironment).await
}
