//! Structural (non-cryptographic) parse errors for the wire format.

use thiserror::Error;

/// Errors raised while parsing wire-format values that carry no
/// cryptographic material themselves — key and seed sizing, and the
/// packet header inside an already-decrypted frame.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtoError {
    /// A fixed-size field (seed, node id, key) was constructed from the
    /// wrong number of bytes.
    #[error("invalid length for {field}: expected {expected}, got {actual}")]
    InvalidLength {
        /// Name of the field being parsed.
        field: &'static str,
        /// Expected length in bytes.
        expected: usize,
        /// Length actually supplied.
        actual: usize,
    },

    /// A packet's declared payload length exceeds what a frame can carry.
    #[error("packet payload length {length} exceeds maximum {max}")]
    InvalidPayloadLength {
        /// Declared payload length.
        length: usize,
        /// Maximum payload length a packet may declare.
        max: usize,
    },

    /// A packet header claimed more payload bytes than are present in
    /// the buffer being parsed.
    #[error("packet truncated: header claims {expected} bytes, buffer has {actual}")]
    PacketTruncated {
        /// Bytes the header claims follow it.
        expected: usize,
        /// Bytes actually available after the header.
        actual: usize,
    },
}
