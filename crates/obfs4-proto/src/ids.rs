//! Fixed-size identifiers and keys carried across the handshake boundary.
//!
//! None of these types perform cryptography; they are plain byte
//! containers with constructors that enforce their length. The crypto
//! crate is the only consumer that gives them meaning.

use std::fmt;

use zeroize::Zeroize;

use crate::{constants::{NODE_ID_LEN, SEED_LEN}, error::ProtoError};

/// A 24-byte seed used to initialize a DRBG.
///
/// Zeroized on drop since it determines the entire padding schedule for a
/// connection direction and is derived from handshake key material.
#[derive(Clone, PartialEq, Eq)]
pub struct DrbgSeed([u8; SEED_LEN]);

impl DrbgSeed {
    /// Wrap a raw 24-byte seed.
    pub fn new(bytes: [u8; SEED_LEN]) -> Self {
        Self(bytes)
    }

    /// Borrow the seed bytes.
    pub fn as_bytes(&self) -> &[u8; SEED_LEN] {
        &self.0
    }
}

impl TryFrom<&[u8]> for DrbgSeed {
    type Error = ProtoError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let array: [u8; SEED_LEN] = value.try_into().map_err(|_| ProtoError::InvalidLength {
            field: "DrbgSeed",
            expected: SEED_LEN,
            actual: value.len(),
        })?;
        Ok(Self(array))
    }
}

impl fmt::Debug for DrbgSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DrbgSeed").field(&"<redacted>").finish()
    }
}

impl Drop for DrbgSeed {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// A 20-byte bridge node identifier, used as the startup length
/// distribution's seed material during the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId([u8; NODE_ID_LEN]);

impl NodeId {
    /// Wrap a raw 20-byte node id.
    pub fn new(bytes: [u8; NODE_ID_LEN]) -> Self {
        Self(bytes)
    }

    /// Borrow the node id bytes.
    pub fn as_bytes(&self) -> &[u8; NODE_ID_LEN] {
        &self.0
    }
}

impl TryFrom<&[u8]> for NodeId {
    type Error = ProtoError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let array: [u8; NODE_ID_LEN] = value.try_into().map_err(|_| ProtoError::InvalidLength {
            field: "NodeId",
            expected: NODE_ID_LEN,
            actual: value.len(),
        })?;
        Ok(Self(array))
    }
}

/// A per-direction AEAD key plus the 16-byte nonce prefix it is always
/// used with. The full 24-byte `XChaCha20Poly1305` nonce for frame `n` is
/// `nonce_prefix ‖ n.to_be_bytes()`.
#[derive(Clone)]
pub struct FrameKey {
    key: [u8; 32],
    nonce_prefix: [u8; 16],
}

impl FrameKey {
    /// Build a frame key from its two components.
    pub fn new(key: [u8; 32], nonce_prefix: [u8; 16]) -> Self {
        Self { key, nonce_prefix }
    }

    /// The 32-byte AEAD key.
    pub fn key(&self) -> &[u8; 32] {
        &self.key
    }

    /// The 16-byte nonce prefix shared by every frame sent in this
    /// direction.
    pub fn nonce_prefix(&self) -> &[u8; 16] {
        &self.nonce_prefix
    }
}

impl fmt::Debug for FrameKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameKey").field("nonce_prefix", &self.nonce_prefix).finish_non_exhaustive()
    }
}

impl Drop for FrameKey {
    fn drop(&mut self) {
        self.key.zeroize();
        self.nonce_prefix.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drbg_seed_rejects_wrong_length() {
        let short = [0u8; 10];
        assert!(DrbgSeed::try_from(short.as_slice()).is_err());
    }

    #[test]
    fn node_id_round_trips() {
        let bytes = [7u8; NODE_ID_LEN];
        let id = NodeId::try_from(bytes.as_slice()).unwrap();
        assert_eq!(id.as_bytes(), &bytes);
    }

    #[test]
    fn frame_key_debug_does_not_leak_key_bytes() {
        let key = FrameKey::new([0x42; 32], [0x11; 16]);
        let rendered = format!("{key:?}");
        assert!(!rendered.contains("66")); // 0x42 would render as "66" in decimal debug output
    }
}
