//! Cryptographic failure modes.
//!
//! Every variant here is fatal to the connection that produced it; there
//! is no recoverable cryptographic error in this transport.

use thiserror::Error;

/// Errors raised by AEAD framing and the Ntor-style handshake.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// AEAD authentication failed while opening a frame. Indicates
    /// tampering, a key mismatch, or a corrupted carrier.
    #[error("AEAD authentication failed")]
    AeadFailure,

    /// The handshake's MAC did not match the expected value.
    #[error("handshake MAC verification failed")]
    HandshakeMacMismatch,

    /// A `client_hello` was rejected because its MAC was already seen
    /// within the current replay window.
    #[error("client_hello replay detected")]
    HandshakeReplay,

    /// The peer's public key failed the X25519 low-order-point check.
    #[error("peer public key is invalid")]
    InvalidPublicKey,
}
