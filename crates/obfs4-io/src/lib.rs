//! The TCP carrier for the obfs4 framed-packet transport.
//!
//! This crate is the one concrete collaborator the core state machine
//! needs: a socket that implements `AsyncRead + AsyncWrite + Unpin +
//! Send`, and an [`Environment`](obfs4_core::Environment) backed by the
//! OS clock and CSPRNG. Everything protocol-shaped lives in
//! `obfs4-core`; this crate only opens and accepts sockets.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod client;
mod environment;
mod server;

pub use client::{TcpConnection as ClientConnection, dial};
pub use environment::TokioEnvironment;
pub use server::{Listener, TcpConnection as ServerConnection};
