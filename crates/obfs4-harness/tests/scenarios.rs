//! End-to-end scenarios run over in-memory duplex carriers with a
//! deterministic environment, including the fault-injection carriers
//! that model a peer going silent mid-frame and bit-level corruption in
//! transit.

use std::sync::{Arc, Mutex};

use obfs4_core::{ClientKeys, Connection, ConnectionError, ConnectionState, ServerKeys};
use obfs4_crypto::{IdentityKeypair, ReplayFilter};
use obfs4_harness::{
    SimEnvironment,
    fault::{CutReadOnCommand, FlipByteOnNextWrite},
    tap::CountWrites,
};
use obfs4_proto::{DrbgSeed, MAX_FRAME_WIRE, MAX_PACKET_PAYLOAD, NodeId};

fn keys_pair(salt: u8) -> (ClientKeys, ServerKeys) {
    let node_id = NodeId::new([salt; 20]);
    let identity = Arc::new(IdentityKeypair::from_random_bytes([salt ^ 0xAA; 32]));
    let server_identity_public = identity.public();

    let client_keys = ClientKeys { node_id, server_identity_public };
    let server_keys =
        ServerKeys { node_id, identity, replay_filter: Arc::new(Mutex::new(ReplayFilter::default())) };
    (client_keys, server_keys)
}

#[tokio::test]
async fn echo_round_trip() {
    let (client_keys, server_keys) = keys_pair(0xF6);
    let (client_side, server_side) = tokio::io::duplex(4096);

    let (client_conn, server_conn) = tokio::join!(
        Connection::connect(client_side, client_keys, SimEnvironment::from_seed(11)),
        Connection::accept(server_side, server_keys, SimEnvironment::from_seed(12)),
    );
    let mut client_conn = client_conn.unwrap();
    let mut server_conn = server_conn.unwrap();

    let server_task = tokio::spawn(async move {
        let mut buf = [0u8; 64];
        let n = server_conn.read(&mut buf).await.unwrap();
        server_conn.write(&buf[..n]).await.unwrap();
    });

    client_conn.write(b"hello harness").await.unwrap();
    let mut buf = [0u8; 64];
    let n = client_conn.read(&mut buf).await.unwrap();
    assert_eq!(&buf[..n], b"hello harness");

    server_task.await.unwrap();
}

#[tokio::test]
async fn small_payload_is_padded_to_a_full_frame() {
    let (client_keys, server_keys) = keys_pair(0xE5);
    let (client_side, server_side) = tokio::io::duplex(4096);

    let (client_conn, server_conn) = tokio::join!(
        Connection::connect(client_side, client_keys, SimEnvironment::from_seed(9)),
        Connection::accept(server_side, server_keys, SimEnvironment::from_seed(10)),
    );
    let mut client_conn = client_conn.unwrap();
    let mut server_conn = server_conn.unwrap();

    let client_task = client_conn.write(b"a");
    let server_task = async {
        let mut buf = [0u8; 8];
        server_conn.read(&mut buf).await.unwrap();
        buf[0]
    };
    let (write_result, first_byte) = tokio::join!(client_task, server_task);

    assert_eq!(write_result.unwrap(), 1);
    assert_eq!(first_byte, b'a');
}

#[tokio::test]
async fn a_full_chunk_write_produces_an_exact_wire_sized_record() {
    let (client_keys, server_keys) = keys_pair(0xE6);
    let (client_side, server_side) = tokio::io::duplex(8192);
    let (tapped_client, tap) = CountWrites::new(client_side);

    let (client_conn, server_conn) = tokio::join!(
        Connection::connect(tapped_client, client_keys, SimEnvironment::from_seed(13)),
        Connection::accept(server_side, server_keys, SimEnvironment::from_seed(14)),
    );
    let mut client_conn = client_conn.unwrap();
    let mut server_conn = server_conn.unwrap();

    // A chunk that already fills MAX_PACKET_PAYLOAD forces the padded
    // frame to its maximum size regardless of what the length
    // distribution happens to sample, so the wire size is pinned
    // without needing to control the distribution directly.
    let payload = vec![0x7Eu8; MAX_PACKET_PAYLOAD];
    tap.reset();
    let client_task = client_conn.write(&payload);
    let server_task = async {
        let mut buf = vec![0u8; MAX_PACKET_PAYLOAD];
        let mut total = 0;
        while total < payload.len() {
            total += server_conn.read(&mut buf[total..]).await.unwrap();
        }
        buf
    };
    let (write_result, received) = tokio::join!(client_task, server_task);

    assert_eq!(write_result.unwrap(), payload.len());
    assert_eq!(received, payload);
    assert_eq!(tap.bytes_written(), MAX_FRAME_WIRE);
}

#[tokio::test]
async fn seed_rotation_is_silent_to_the_application() {
    let (client_keys, server_keys) = keys_pair(0xD4);
    let (client_side, server_side) = tokio::io::duplex(4096);

    let (client_conn, server_conn) = tokio::join!(
        Connection::connect(client_side, client_keys, SimEnvironment::from_seed(7)),
        Connection::accept(server_side, server_keys, SimEnvironment::from_seed(8)),
    );
    let mut client_conn = client_conn.unwrap();
    let mut server_conn = server_conn.unwrap();

    let client_task = async {
        client_conn.rotate_peer_seed(DrbgSeed::new([0x42; 24])).await.unwrap();
        client_conn.write(b"after rotation").await.unwrap();
    };
    let server_task = async {
        let mut buf = [0u8; 32];
        let n = server_conn.read(&mut buf).await.unwrap();
        buf[..n].to_vec()
    };
    let (_, received) = tokio::join!(client_task, server_task);

    assert_eq!(received, b"after rotation");
}

#[tokio::test]
async fn tampering_in_the_handshake_is_fatal_to_both_sides() {
    let (client_keys, server_keys) = keys_pair(0xA1);
    let (client_side, server_side) = tokio::io::duplex(4096);
    let (wrapped_client, flip) = FlipByteOnNextWrite::new(client_side);
    // Offset 2 lands just past the 2-byte length prefix, inside
    // client_hello's body rather than its padding.
    flip.arm(2);

    let (client_result, server_result) = tokio::join!(
        Connection::connect(wrapped_client, client_keys, SimEnvironment::from_seed(1)),
        Connection::accept(server_side, server_keys, SimEnvironment::from_seed(2)),
    );

    assert!(server_result.is_err());
    assert!(client_result.is_err());
}

#[tokio::test]
async fn tampering_in_a_payload_frame_is_fatal_and_poisons_the_connection() {
    let (client_keys, server_keys) = keys_pair(0xA2);
    let (client_side, server_side) = tokio::io::duplex(4096);
    let (wrapped_client, flip) = FlipByteOnNextWrite::new(client_side);

    let (client_conn, server_conn) = tokio::join!(
        Connection::connect(wrapped_client, client_keys, SimEnvironment::from_seed(15)),
        Connection::accept(server_side, server_keys, SimEnvironment::from_seed(16)),
    );
    let mut client_conn = client_conn.unwrap();
    let mut server_conn = server_conn.unwrap();

    // A few untampered records establish the connection is otherwise
    // healthy before the corrupted one arrives.
    for _ in 0..4 {
        client_conn.write(b"clean record").await.unwrap();
        let mut buf = [0u8; 32];
        server_conn.read(&mut buf).await.unwrap();
    }

    // Offset 10 lands inside the ciphertext body of the next frame, past
    // its 2-byte length prefix.
    flip.arm(10);
    client_conn.write(b"tampered record").await.unwrap();

    let mut buf = [0u8; 32];
    let err = server_conn.read(&mut buf).await.unwrap_err();
    assert!(matches!(err, ConnectionError::AeadFailure(_)));
    assert_eq!(server_conn.state(), ConnectionState::Broken);

    let err = server_conn.read(&mut buf).await.unwrap_err();
    assert!(matches!(err, ConnectionError::InvalidState { .. }));
}

#[tokio::test]
async fn carrier_eof_mid_frame_breaks_the_connection() {
    let (client_keys, server_keys) = keys_pair(0xB2);
    let (client_side, server_side) = tokio::io::duplex(4096);
    let (wrapped_server, eof) = CutReadOnCommand::new(server_side);

    let (client_conn, server_conn) = tokio::join!(
        Connection::connect(client_side, client_keys, SimEnvironment::from_seed(3)),
        Connection::accept(wrapped_server, server_keys, SimEnvironment::from_seed(4)),
    );
    let mut client_conn = client_conn.unwrap();
    let mut server_conn = server_conn.unwrap();

    // The connection is open and otherwise healthy; the carrier just
    // stops delivering bytes from this point on.
    eof.cut_now();
    client_conn.write(b"never arrives").await.unwrap();

    let mut buf = [0u8; 32];
    let err = server_conn.read(&mut buf).await.unwrap_err();
    assert!(matches!(err, ConnectionError::CarrierIo(_)));
    assert_eq!(server_conn.state(), ConnectionState::Broken);
}

#[tokio::test]
async fn frames_reassemble_across_many_small_carrier_reads() {
    let (client_keys, server_keys) = keys_pair(0xC3);
    // A duplex buffer far smaller than a single frame forces both the
    // handshake and the payload frame to cross many small read/write
    // calls before the packet layer sees a complete frame.
    let (client_side, server_side) = tokio::io::duplex(16);

    let (client_conn, server_conn) = tokio::join!(
        Connection::connect(client_side, client_keys, SimEnvironment::from_seed(5)),
        Connection::accept(server_side, server_keys, SimEnvironment::from_seed(6)),
    );
    let mut client_conn = client_conn.unwrap();
    let mut server_conn = server_conn.unwrap();

    let payload = vec![0x5Au8; 100];
    let client_task = client_conn.write(&payload);
    let server_task = async {
        let mut buf = [0u8; 200];
        let mut total = 0;
        while total < payload.len() {
            let n = server_conn.read(&mut buf[total..]).await.unwrap();
            total += n;
        }
        buf[..total].to_vec()
    };
    let (write_result, received) = tokio::join!(client_task, server_task);

    assert_eq!(write_result.unwrap(), payload.len());
    assert_eq!(received, payload);
}
