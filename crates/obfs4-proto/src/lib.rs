//! Wire-format primitives shared by the obfs4 framed-packet transport.
//!
//! This crate holds no cryptography and no I/O. It defines the byte
//! layouts and size constants that the crypto and connection layers
//! agree on: the DRBG seed, the node identifier, the per-direction frame
//! key, and the packet header that lives inside a decrypted frame.

mod constants;
mod error;
mod ids;
mod packet;

pub use constants::{
    AEAD_TAG_LEN, FRAME_LEN_PREFIX, MAX_FRAME_PAYLOAD, MAX_FRAME_WIRE, MAX_PACKET_PAYLOAD,
    NODE_ID_LEN, PACKET_OVERHEAD, PRNG_SEED_LEN, SEED_LEN,
};
pub use error::ProtoError;
pub use ids::{DrbgSeed, FrameKey, NodeId};
pub use packet::{Packet, PacketType};

/// Convenience alias used throughout the wire-format layer.
pub type Result<T> = std::result::Result<T, ProtoError>;
