//! The connection state machine for the obfs4 framed-packet transport.
//!
//! This crate owns everything that touches a carrier: driving the Ntor
//! handshake over it, sealing and opening frames, and applying the
//! packet layer on top. It holds no transport-specific I/O itself —
//! `obfs4-io` supplies the concrete TCP carrier this workspace ships.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod connection;
mod env;
mod error;

pub use connection::{ClientKeys, Connection, ConnectionState, ReadHalf, ServerKeys, WriteHalf};
pub use env::Environment;
pub use error::ConnectionError;

/// Convenience alias used throughout the connection layer.
pub type Result<T> = std::result::Result<T, ConnectionError>;
