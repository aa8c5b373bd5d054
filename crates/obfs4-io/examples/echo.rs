//! Self-contained echo: binds a listener, dials it, and bounces one
//! message through a real TCP socket and the full Ntor handshake.
//!
//! Run with `cargo run --example echo -p obfs4-io`.

#![allow(clippy::expect_used, clippy::print_stdout)]

use std::sync::{Arc, Mutex};

use obfs4_core::{ClientKeys, ServerKeys};
use obfs4_crypto::{IdentityKeypair, ReplayFilter};
use obfs4_io::{Listener, dial};
use obfs4_proto::NodeId;

#[tokio::main]
async fn main() {
    let node_id = NodeId::new([0x42; 20]);
    let identity = Arc::new(IdentityKeypair::from_random_bytes(rand::random()));
    let server_identity_public = identity.public();

    let server_keys = ServerKeys {
        node_id,
        identity,
        replay_filter: Arc::new(Mutex::new(ReplayFilter::default())),
    };
    let listener = Listener::bind("127.0.0.1:0", server_keys).await.expect("bind");
    let addr = listener.local_addr().expect("local_addr");

    let server = tokio::spawn(async move {
        let mut conn = listener.accept().await.expect("server handshake");
        let mut buf = [0u8; 64];
        let n = conn.read(&mut buf).await.expect("server read");
        conn.write(&buf[..n]).await.expect("server echo");
    });

    let client_keys = ClientKeys { node_id, server_identity_public };
    let mut conn = dial(addr, client_keys).await.expect("client handshake");
    conn.write(b"hello obfs4").await.expect("client write");

    let mut buf = [0u8; 64];
    let n = conn.read(&mut buf).await.expect("client read");
    println!("echoed: {}", String::from_utf8_lossy(&buf[..n]));

    server.await.expect("server task");
}
