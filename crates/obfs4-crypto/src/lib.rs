//! Cryptographic building blocks for the obfs4 framed-packet transport.
//!
//! # Key Lifecycle
//!
//! ```text
//! Ntor handshake (X25519 DH, per connection)
//!        │
//!        ▼
//! HKDF-SHA256 → tx_key, tx_nonce_prefix, rx_key, rx_nonce_prefix, outbound_len_seed
//!        │                                              │
//!        ▼                                              ▼
//! FrameCodec (AEAD framing, per direction)      Drbg → LenDist (padding schedule)
//! ```
//!
//! A `PrngSeed` packet sent over an already-open connection replaces the
//! receiver's [`Drbg`] seed and therefore its [`LenDist`] table, without
//! touching the AEAD keys. Resetting never observes a half-built table:
//! [`LenDist::reset`] builds the new table before swapping it in.
//!
//! # Security
//!
//! - AEAD: `XChaCha20Poly1305`. Nonces are `nonce_prefix (16B) ‖
//!   counter_be64 (8B)`, never reused within a direction because the
//!   counter strictly increases and never wraps.
//! - Handshake: X25519 Diffie-Hellman, authenticated with an HMAC-SHA256
//!   MAC over the exchanged public keys and the server's long-lived
//!   identity key. A replay filter rejects a previously seen
//!   `client_hello` MAC within its epoch window.
//! - Forward secrecy: the DRBG's internal counter advances with every
//!   output; handshake key material is zeroized on drop.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod drbg;
mod error;
mod frame_codec;
mod handshake;
mod len_dist;

pub use drbg::Drbg;
pub use error::CryptoError;
pub use frame_codec::{Decoder, Encoder};
pub use handshake::{
    ClientHandshake, HandshakeKeys, IdentityKeypair, ReplayFilter, ServerHandshake, SessionKeypair,
};
pub use len_dist::LenDist;
/// The X25519 public key type used for both identity and session keys.
pub use x25519_dalek::PublicKey;

/// Convenience alias used throughout the crypto layer.
pub type Result<T> = std::result::Result<T, CryptoError>;
