//! Fuzz target for `Packet::decode`.
//!
//! This is pure, unauthenticated parsing of already-decrypted frame
//! plaintext: no key material, no AEAD. It should never panic, and
//! every `Err` must correspond to genuinely malformed input rather than
//! an overflow or a buffer over-read.

#![no_main]

use libfuzzer_sys::fuzz_target;
use obfs4_proto::Packet;

fuzz_target!(|data: &[u8]| {
    let _ = Packet::decode(data);
});
