//! The packet layer: the structure carried inside one frame's plaintext.
//!
//! Layout: `[type: u8][length: u16 big-endian][payload][padding to fill
//! the frame]`. Padding bytes are always zero and are not part of
//! `payload`; the caller decides how much padding to attach when
//! encoding and simply discards trailing bytes when decoding.

use bytes::{BufMut, Bytes};

use crate::{constants::{MAX_PACKET_PAYLOAD, PACKET_OVERHEAD}, error::ProtoError, Result};

/// The type tag carried in a packet header.
///
/// Unknown values are not an error: [`Packet::decode`] returns `None`
/// from [`PacketType::from_u8`] and callers silently discard the packet,
/// matching the wire format's forward-compatibility contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    /// Carries application payload bytes.
    Payload,
    /// Carries a fresh 24-byte DRBG seed to rotate the peer's outbound
    /// length distribution.
    PrngSeed,
}

impl PacketType {
    /// Decode a wire type tag. Returns `None` for any value this version
    /// of the protocol does not recognize.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Payload),
            1 => Some(Self::PrngSeed),
            _ => None,
        }
    }

    /// Encode this type tag to its wire value.
    pub fn to_u8(self) -> u8 {
        match self {
            Self::Payload => 0,
            Self::PrngSeed => 1,
        }
    }
}

/// One packet-layer record: a typed, length-prefixed payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    packet_type: PacketType,
    payload: Bytes,
}

impl Packet {
    /// Build a packet from a known type and payload.
    ///
    /// # Errors
    ///
    /// Returns [`ProtoError::InvalidPayloadLength`] if `payload` would not
    /// fit in a single frame alongside its own header.
    pub fn new(packet_type: PacketType, payload: impl Into<Bytes>) -> Result<Self> {
        let payload = payload.into();
        if payload.len() > MAX_PACKET_PAYLOAD {
            return Err(ProtoError::InvalidPayloadLength {
                length: payload.len(),
                max: MAX_PACKET_PAYLOAD,
            });
        }
        Ok(Self { packet_type, payload })
    }

    /// This packet's type tag.
    pub fn packet_type(&self) -> PacketType {
        self.packet_type
    }

    /// This packet's payload bytes.
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Encode `[type][length][payload]` into `dst`. Does not write
    /// padding; the caller appends zero bytes to fill the frame.
    pub fn encode(&self, dst: &mut impl BufMut) {
        debug_assert!(self.payload.len() <= MAX_PACKET_PAYLOAD);
        dst.put_u8(self.packet_type.to_u8());
        dst.put_u16(self.payload.len() as u16);
        dst.put_slice(&self.payload);
    }

    /// Parse one packet out of a frame's decrypted plaintext.
    ///
    /// `bytes` is the whole frame plaintext, header through trailing
    /// padding; only the header-declared payload length is consumed,
    /// everything after it (padding, or a second packet in a future
    /// protocol revision) is left untouched by this function.
    ///
    /// Returns `Ok(None)` when the header names a type this version does
    /// not recognize — the wire format's unknown-type-is-silently-
    /// discarded contract. Returns `Err` only for structurally invalid
    /// input (too short, or a length claim the buffer cannot satisfy).
    pub fn decode(bytes: &[u8]) -> Result<Option<(Self, usize)>> {
        if bytes.len() < PACKET_OVERHEAD {
            return Err(ProtoError::PacketTruncated { expected: PACKET_OVERHEAD, actual: bytes.len() });
        }

        let type_byte = bytes[0];
        let length = u16::from_be_bytes([bytes[1], bytes[2]]) as usize;

        let consumed = PACKET_OVERHEAD
            .checked_add(length)
            .ok_or(ProtoError::InvalidPayloadLength { length, max: MAX_PACKET_PAYLOAD })?;

        if length > MAX_PACKET_PAYLOAD {
            return Err(ProtoError::InvalidPayloadLength { length, max: MAX_PACKET_PAYLOAD });
        }
        if bytes.len() < consumed {
            return Err(ProtoError::PacketTruncated {
                expected: consumed,
                actual: bytes.len(),
            });
        }

        let Some(packet_type) = PacketType::from_u8(type_byte) else {
            return Ok(None);
        };

        let payload = Bytes::copy_from_slice(&bytes[PACKET_OVERHEAD..consumed]);
        Ok(Some((Self { packet_type, payload }, consumed)))
    }
}
