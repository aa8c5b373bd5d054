//! Fuzz target for `Decoder::decode`.
//!
//! The key is fixed; only the buffer is fuzzed. This exercises the
//! length-prefix deobfuscation and AEAD-open path against arbitrary
//! (almost always garbage) ciphertexts. It should never panic, and an
//! incomplete buffer must always come back as `Ok(None)` rather than
//! `Err`.

#![no_main]

use libfuzzer_sys::fuzz_target;
use obfs4_crypto::Decoder;
use obfs4_proto::FrameKey;

fuzz_target!(|data: &[u8]| {
    let key = FrameKey::new([0x5A; 32], [0x11; 16]);
    let mut decoder = Decoder::new(&key);
    let _ = decoder.decode(data);
});
