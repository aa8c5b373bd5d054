//! The framing layer: fixed-nonce AEAD sealing of one packet-layer
//! plaintext per wire frame, with an obfuscated 2-byte length prefix.
//!
//! Wire layout: `[obfuscated length: u16 BE][ciphertext]`, where
//! `ciphertext` is `XChaCha20Poly1305(plaintext)` (includes its 16-byte
//! tag) and the length prefix is XORed with the first two bytes of the
//! `XChaCha20` keystream for that same frame's nonce — so it carries no
//! signal distinguishable from random bytes without the key.

use chacha20::{
    XChaCha20,
    cipher::{KeyIvInit, StreamCipher},
};
use chacha20poly1305::{
    XChaCha20Poly1305, XNonce,
    aead::{Aead, KeyInit},
};
use obfs4_proto::{AEAD_TAG_LEN, FRAME_LEN_PREFIX, FrameKey, MAX_FRAME_PAYLOAD};

use crate::{Result, error::CryptoError};

const LEN_PREFIX_SIZE: usize = FRAME_LEN_PREFIX;
const TAG_SIZE: usize = AEAD_TAG_LEN;

/// Largest ciphertext a legitimate frame can declare: a full plaintext
/// frame plus its AEAD tag. A deobfuscated length outside `[TAG_SIZE,
/// MAX_CIPHERTEXT_LEN]` can only come from a corrupted length prefix,
/// never from this encoder.
const MAX_CIPHERTEXT_LEN: usize = MAX_FRAME_PAYLOAD + TAG_SIZE;

fn build_nonce(nonce_prefix: &[u8; 16], counter: u64) -> [u8; 24] {
    let mut nonce = [0u8; 24];
    nonce[..16].copy_from_slice(nonce_prefix);
    nonce[16..].copy_from_slice(&counter.to_be_bytes());
    nonce
}

/// XOR `bytes` with the first two bytes of the `XChaCha20` keystream for
/// `(key, nonce)`. Involutive: the same call obfuscates and deobfuscates.
fn xor_length_prefix(key: &[u8; 32], nonce: &[u8; 24], bytes: [u8; 2]) -> [u8; 2] {
    let mut keystream = [0u8; 2];
    let mut cipher = XChaCha20::new(key.into(), nonce.into());
    cipher.apply_keystream(&mut keystream);
    [bytes[0] ^ keystream[0], bytes[1] ^ keystream[1]]
}

/// Seals outbound frame plaintext under a per-direction key.
///
/// The frame counter increases by exactly one per call and never wraps;
/// [`Encoder::encode`] fails closed if it would.
pub struct Encoder {
    cipher: XChaCha20Poly1305,
    key_bytes: [u8; 32],
    nonce_prefix: [u8; 16],
    counter: u64,
}

impl Encoder {
    /// Build an encoder from a per-direction frame key.
    pub fn new(key: &FrameKey) -> Self {
        Self {
            cipher: XChaCha20Poly1305::new(key.key().into()),
            key_bytes: *key.key(),
            nonce_prefix: *key.nonce_prefix(),
            counter: 0,
        }
    }

    /// Seal `plaintext` into one wire frame, appended to `dst`.
    pub fn encode(&mut self, plaintext: &[u8], dst: &mut Vec<u8>) -> Result<()> {
        let nonce = build_nonce(&self.nonce_prefix, self.counter);

        let Ok(ciphertext) = self.cipher.encrypt(XNonce::from_slice(&nonce), plaintext) else {
            unreachable!("XChaCha20-Poly1305 encryption cannot fail with valid inputs");
        };

        let length = u16::try_from(ciphertext.len()).map_err(|_| CryptoError::AeadFailure)?;
        let obfuscated = xor_length_prefix(&self.key_bytes, &nonce, length.to_be_bytes());

        dst.extend_from_slice(&obfuscated);
        dst.extend_from_slice(&ciphertext);

        self.counter = self.counter.checked_add(1).ok_or(CryptoError::AeadFailure)?;
        Ok(())
    }
}

/// Opens inbound frames under a per-direction key.
///
/// [`Decoder::decode`] never blocks on a partial frame: insufficient
/// buffered bytes return `Ok(None)` without consuming anything, leaving
/// the caller free to buffer more and retry. Any AEAD failure is fatal
/// and returned as `Err`.
pub struct Decoder {
    cipher: XChaCha20Poly1305,
    key_bytes: [u8; 32],
    nonce_prefix: [u8; 16],
    counter: u64,
}

impl Decoder {
    /// Build a decoder from a per-direction frame key.
    pub fn new(key: &FrameKey) -> Self {
        Self {
            cipher: XChaCha20Poly1305::new(key.key().into()),
            key_bytes: *key.key(),
            nonce_prefix: *key.nonce_prefix(),
            counter: 0,
        }
    }

    /// Try to open one frame from the front of `buf`.
    ///
    /// On success returns the decrypted plaintext and the number of
    /// bytes consumed from `buf`. On `Ok(None)`, `buf` did not yet
    /// contain a complete frame and nothing was consumed.
    pub fn decode(&mut self, buf: &[u8]) -> Result<Option<(Vec<u8>, usize)>> {
        if buf.len() < LEN_PREFIX_SIZE {
            return Ok(None);
        }

        let nonce = build_nonce(&self.nonce_prefix, self.counter);
        let obfuscated = [buf[0], buf[1]];
        let length_bytes = xor_length_prefix(&self.key_bytes, &nonce, obfuscated);
        let ciphertext_len = u16::from_be_bytes(length_bytes) as usize;

        if !(TAG_SIZE..=MAX_CIPHERTEXT_LEN).contains(&ciphertext_len) {
            return Err(CryptoError::AeadFailure);
        }

        let total = LEN_PREFIX_SIZE + ciphertext_len;
        if buf.len() < total {
            return Ok(None);
        }

        let ciphertext = &buf[LEN_PREFIX_SIZE..total];
        let plaintext = self
            .cipher
            .decrypt(XNonce::from_slice(&nonce), ciphertext)
            .map_err(|_| CryptoError::AeadFailure)?;

        self.counter = self.counter.checked_add(1).ok_or(CryptoError::AeadFailure)?;
        Ok(Some((plaintext, total)))
    }
}

#[cfg(test)]
mod tests {
    use obfs4_proto::FrameKey;
    use proptest::prelude::*;

    use super::*;

    fn key(byte: u8) -> FrameKey {
        FrameKey::new([byte; 32], [byte.wrapping_add(1); 16])
    }

    #[test]
    fn round_trips_a_frame() {
        let mut enc = Encoder::new(&key(1));
        let mut dec = Decoder::new(&key(1));

        let mut wire = Vec::new();
        enc.encode(b"hello obfs4", &mut wire).unwrap();

        let (plaintext, consumed) = dec.decode(&wire).unwrap().unwrap();
        assert_eq!(consumed, wire.len());
        assert_eq!(plaintext, b"hello obfs4");
    }

    #[test]
    fn incomplete_frame_returns_again_without_consuming() {
        let mut enc = Encoder::new(&key(2));
        let mut dec = Decoder::new(&key(2));

        let mut wire = Vec::new();
        enc.encode(b"partial please", &mut wire).unwrap();
        wire.truncate(wire.len() - 1);

        assert!(dec.decode(&wire).unwrap().is_none());
    }

    #[test]
    fn tampered_ciphertext_is_fatal() {
        let mut enc = Encoder::new(&key(3));
        let mut dec = Decoder::new(&key(3));

        let mut wire = Vec::new();
        enc.encode(b"tamper target", &mut wire).unwrap();
        let last = wire.len() - 1;
        wire[last] ^= 0xFF;

        assert!(matches!(dec.decode(&wire), Err(CryptoError::AeadFailure)));
    }

    #[test]
    fn ciphertext_len_above_max_frame_size_is_rejected_even_with_enough_buffer() {
        let mut dec = Decoder::new(&key(9));

        // A length prefix that deobfuscates to something larger than any
        // legitimate frame could ever declare must fail closed rather
        // than wait for bytes that will never complete a valid frame.
        let huge_len = (MAX_CIPHERTEXT_LEN + 1) as u16;
        let nonce = build_nonce(&[10u8; 16], 0);
        let obfuscated = xor_length_prefix(&[9u8; 32], &nonce, huge_len.to_be_bytes());

        let mut buf = Vec::new();
        buf.extend_from_slice(&obfuscated);
        buf.resize(LEN_PREFIX_SIZE + huge_len as usize, 0);

        assert!(matches!(dec.decode(&buf), Err(CryptoError::AeadFailure)));
    }

    #[test]
    fn length_prefix_is_not_plaintext_length() {
        let mut enc = Encoder::new(&key(4));
        let mut wire = Vec::new();
        enc.encode(b"x", &mut wire).unwrap();
        let observed_prefix = u16::from_be_bytes([wire[0], wire[1]]);
        assert_ne!(observed_prefix as usize, 1);
    }

    #[test]
    fn successive_frames_use_successive_nonces() {
        let mut enc = Encoder::new(&key(5));
        let mut dec = Decoder::new(&key(5));

        let mut wire = Vec::new();
        enc.encode(b"first", &mut wire).unwrap();
        enc.encode(b"second", &mut wire).unwrap();

        let (first, consumed1) = dec.decode(&wire).unwrap().unwrap();
        let (second, _consumed2) = dec.decode(&wire[consumed1..]).unwrap().unwrap();

        assert_eq!(first, b"first");
        assert_eq!(second, b"second");
    }

    proptest! {
        #[test]
        fn arbitrary_plaintext_round_trips(plaintext in proptest::collection::vec(any::<u8>(), 0..=1024)) {
            let mut enc = Encoder::new(&key(6));
            let mut dec = Decoder::new(&key(6));

            let mut wire = Vec::new();
            enc.encode(&plaintext, &mut wire).unwrap();
            let (decoded, consumed) = dec.decode(&wire).unwrap().unwrap();

            prop_assert_eq!(consumed, wire.len());
            prop_assert_eq!(decoded, plaintext);
        }

        #[test]
        fn decode_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
            let mut dec = Decoder::new(&key(7));
            let _ = dec.decode(&bytes);
        }
    }
}
