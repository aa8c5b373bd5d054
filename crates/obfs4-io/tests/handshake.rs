//! Integration tests for the client/server handshake over TCP.

use std::sync::{Arc, Mutex};

use obfs4_core::{ClientKeys, ServerKeys};
use obfs4_crypto::{IdentityKeypair, ReplayFilter};
use obfs4_io::{Listener, dial};
use obfs4_proto::NodeId;

#[tokio::test]
async fn handshake_and_echo_over_real_tcp() {
    let node_id = NodeId::new([0x7a; 20]);
    let identity = Arc::new(IdentityKeypair::from_random_bytes([0x11; 32]));
    let server_identity_public = identity.public();

    let server_keys =
        ServerKeys { node_id, identity, replay_filter: Arc::new(Mutex::new(ReplayFilter::default())) };
    let listener = Listener::bind("127.0.0.1:0", server_keys).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let mut conn = listener.accept().await.unwrap();
        let mut buf = [0u8; 32];
        let n = conn.read(&mut buf).await.unwrap();
        conn.write(&buf[..n]).await.unwrap();
    });

    let client_keys = ClientKeys { node_id, server_identity_public };
    let mut conn = dial(addr, client_keys).await.unwrap();
    conn.write(b"round trip").await.unwrap();

    let mut buf = [0u8; 32];
    let n = conn.read(&mut buf).await.unwrap();
    assert_eq!(&buf[..n], b"round trip");

    server.await.unwrap();
}

#[tokio::test]
async fn client_rejects_a_server_with_the_wrong_identity_key() {
    // Ntor authenticates the server to the client, not the other way
    // around: the server's own accept() has no way to notice the
    // client is addressing the wrong identity, so only the client side
    // is expected to fail here.
    let node_id = NodeId::new([0x7b; 20]);
    let identity = Arc::new(IdentityKeypair::from_random_bytes([0x22; 32]));

    let server_keys =
        ServerKeys { node_id, identity, replay_filter: Arc::new(Mutex::new(ReplayFilter::default())) };
    let listener = Listener::bind("127.0.0.1:0", server_keys).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move { listener.accept().await });

    let wrong_identity = IdentityKeypair::from_random_bytes([0x33; 32]);
    let client_keys = ClientKeys { node_id, server_identity_public: wrong_identity.public() };
    assert!(dial(addr, client_keys).await.is_err());

    assert!(server.await.unwrap().is_ok());
}
