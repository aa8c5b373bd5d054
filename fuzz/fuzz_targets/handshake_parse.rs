//! Fuzz target for `ServerHandshake::verify_client_hello`.
//!
//! The server's identity and expected node id are fixed; only the
//! incoming `client_hello` bytes are fuzzed. The MAC check means almost
//! every input is rejected, but parsing must never panic or read past
//! the buffer on the way to that rejection.

#![no_main]

use libfuzzer_sys::fuzz_target;
use obfs4_crypto::{IdentityKeypair, ServerHandshake};
use obfs4_proto::NodeId;

fuzz_target!(|data: &[u8]| {
    let identity = IdentityKeypair::from_random_bytes([0x77; 32]);
    let node_id = NodeId::new([0x99; 20]);
    let server = ServerHandshake::new(node_id, &identity);
    let _ = server.verify_client_hello(data);
});
