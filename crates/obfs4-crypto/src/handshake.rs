//! Ntor-style authenticated key exchange.
//!
//! All functions here are pure: the caller supplies random bytes for key
//! generation and drives the actual carrier I/O, which keeps the
//! handshake deterministically testable and lets production code supply
//! randomness from whatever source it wants.
//!
//! Two X25519 Diffie-Hellman operations combine into one shared secret:
//! `DH(client_session, server_session) ‖ DH(client_session,
//! server_identity)`. The second term is only computable by whoever
//! holds the server's long-lived identity secret, which authenticates
//! the server to the client without a separate signature. HKDF-SHA256
//! expands that secret, together with a transcript of both public keys
//! and the node id, into the handshake's keying material block.

use std::collections::HashMap;

use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use obfs4_proto::{DrbgSeed, FrameKey, NodeId};
use sha2::Sha256;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroize;

use crate::{Result, error::CryptoError};

const HANDSHAKE_LABEL: &[u8] = b"obfs4-ntor-handshake-v1";
const KEYING_MATERIAL_LEN: usize = 120; // tx_key(32) + tx_nonce(16) + rx_key(32) + rx_nonce(16) + len_seed(24)
const MAC_LEN: usize = 32;

type HmacSha256 = Hmac<Sha256>;

/// A long-lived X25519 identity keypair, held by the server side of a
/// listener across many connections.
pub struct IdentityKeypair {
    secret: StaticSecret,
    public: PublicKey,
}

impl IdentityKeypair {
    /// Build an identity keypair from 32 caller-supplied random bytes.
    pub fn from_random_bytes(bytes: [u8; 32]) -> Self {
        let secret = StaticSecret::from(bytes);
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    /// This identity's public key, as published out of band.
    pub fn public(&self) -> PublicKey {
        self.public
    }
}

/// A per-connection ephemeral X25519 keypair. Generated fresh for every
/// handshake attempt and never reused.
pub struct SessionKeypair {
    secret: StaticSecret,
    public: PublicKey,
}

impl SessionKeypair {
    /// Build a session keypair from 32 caller-supplied random bytes.
    pub fn from_random_bytes(bytes: [u8; 32]) -> Self {
        let secret = StaticSecret::from(bytes);
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    /// This session's public key, sent on the wire.
    pub fn public(&self) -> PublicKey {
        self.public
    }
}

/// The five values the handshake derives for an opened connection.
pub struct HandshakeKeys {
    /// Key and nonce prefix this side uses to seal outbound frames.
    pub tx: FrameKey,
    /// Key and nonce prefix this side uses to open inbound frames.
    pub rx: FrameKey,
    /// Seed for the outbound length distribution, rotated later by a
    /// `PrngSeed` packet.
    pub outbound_len_seed: DrbgSeed,
}

fn combined_shared_secret(
    session_secret: &StaticSecret,
    peer_session_public: &PublicKey,
    identity_term_secret: &StaticSecret,
    identity_term_public: &PublicKey,
) -> [u8; 64] {
    let session_dh = session_secret.diffie_hellman(peer_session_public);
    let identity_dh = identity_term_secret.diffie_hellman(identity_term_public);

    let mut combined = [0u8; 64];
    combined[..32].copy_from_slice(session_dh.as_bytes());
    combined[32..].copy_from_slice(identity_dh.as_bytes());
    combined
}

fn derive_keying_material(
    shared_secret: &[u8; 64],
    node_id: &NodeId,
    client_pub: &PublicKey,
    server_session_pub: &PublicKey,
    server_identity_pub: &PublicKey,
) -> [u8; KEYING_MATERIAL_LEN] {
    let mut ikm = Vec::with_capacity(64 + 20 + 32 * 3);
    ikm.extend_from_slice(shared_secret);
    ikm.extend_from_slice(node_id.as_bytes());
    ikm.extend_from_slice(client_pub.as_bytes());
    ikm.extend_from_slice(server_session_pub.as_bytes());
    ikm.extend_from_slice(server_identity_pub.as_bytes());

    let hk = Hkdf::<Sha256>::new(None, &ikm);
    let mut okm = [0u8; KEYING_MATERIAL_LEN];
    hk.expand(HANDSHAKE_LABEL, &mut okm)
        .unwrap_or_else(|_| unreachable!("120 is a valid SHA-256 HKDF output length"));
    ikm.zeroize();
    okm
}

/// Split a keying-material block into the client's view of the five
/// derived values: the client's `tx` is the server's `rx` and vice
/// versa.
fn split_keying_material(okm: &[u8; KEYING_MATERIAL_LEN], client_side: bool) -> HandshakeKeys {
    let a_key: [u8; 32] = okm[0..32].try_into().unwrap_or_else(|_| unreachable!());
    let a_nonce: [u8; 16] = okm[32..48].try_into().unwrap_or_else(|_| unreachable!());
    let b_key: [u8; 32] = okm[48..80].try_into().unwrap_or_else(|_| unreachable!());
    let b_nonce: [u8; 16] = okm[80..96].try_into().unwrap_or_else(|_| unreachable!());
    let seed: [u8; 24] = okm[96..120].try_into().unwrap_or_else(|_| unreachable!());

    let (tx_key, tx_nonce, rx_key, rx_nonce) =
        if client_side { (a_key, a_nonce, b_key, b_nonce) } else { (b_key, b_nonce, a_key, a_nonce) };

    HandshakeKeys {
        tx: FrameKey::new(tx_key, tx_nonce),
        rx: FrameKey::new(rx_key, rx_nonce),
        outbound_len_seed: DrbgSeed::new(seed),
    }
}

fn client_hello_mac(node_id: &NodeId, client_pub: &PublicKey) -> [u8; MAC_LEN] {
    let Ok(mut mac) = HmacSha256::new_from_slice(node_id.as_bytes()) else {
        unreachable!("HMAC-SHA256 accepts any key size");
    };
    mac.update(client_pub.as_bytes());
    let digest = mac.finalize().into_bytes();
    let mut out = [0u8; MAC_LEN];
    out.copy_from_slice(&digest);
    out
}

fn server_hello_mac(
    shared_secret: &[u8; 64],
    client_pub: &PublicKey,
    server_session_pub: &PublicKey,
    server_identity_pub: &PublicKey,
    node_id: &NodeId,
) -> [u8; MAC_LEN] {
    let Ok(mut mac) = HmacSha256::new_from_slice(shared_secret) else {
        unreachable!("HMAC-SHA256 accepts any key size");
    };
    mac.update(client_pub.as_bytes());
    mac.update(server_session_pub.as_bytes());
    mac.update(server_identity_pub.as_bytes());
    mac.update(node_id.as_bytes());
    let digest = mac.finalize().into_bytes();
    let mut out = [0u8; MAC_LEN];
    out.copy_from_slice(&digest);
    out
}

fn parse_public_key(bytes: &[u8]) -> Result<PublicKey> {
    let array: [u8; 32] = bytes.try_into().map_err(|_| CryptoError::InvalidPublicKey)?;
    Ok(PublicKey::from(array))
}

/// Client side of one handshake attempt.
pub struct ClientHandshake {
    node_id: NodeId,
    server_identity_pub: PublicKey,
    session: SessionKeypair,
}

impl ClientHandshake {
    /// Start a handshake addressed to `server_identity_pub`, advertised
    /// under `node_id`.
    pub fn new(node_id: NodeId, server_identity_pub: PublicKey, session: SessionKeypair) -> Self {
        Self { node_id, server_identity_pub, session }
    }

    /// Build the `client_hello` body: `node_id ‖ session_pub ‖ mac`.
    /// The caller is responsible for appending padding before writing it
    /// to the carrier.
    pub fn build_client_hello(&self) -> Vec<u8> {
        let mac = client_hello_mac(&self.node_id, &self.session.public);
        let mut out = Vec::with_capacity(20 + 32 + MAC_LEN);
        out.extend_from_slice(self.node_id.as_bytes());
        out.extend_from_slice(self.session.public.as_bytes());
        out.extend_from_slice(&mac);
        out
    }

    /// Parse a `server_hello` body (`session_pub ‖ mac`, padding
    /// already stripped by the caller's length framing) and derive this
    /// side's keys.
    pub fn complete(&self, server_hello: &[u8]) -> Result<HandshakeKeys> {
        if server_hello.len() < 32 + MAC_LEN {
            return Err(CryptoError::HandshakeMacMismatch);
        }
        let server_session_pub = parse_public_key(&server_hello[..32])?;
        let received_mac: [u8; MAC_LEN] =
            server_hello[32..32 + MAC_LEN].try_into().unwrap_or_else(|_| unreachable!());

        let shared_secret = combined_shared_secret(
            &self.session.secret,
            &server_session_pub,
            &self.session.secret,
            &self.server_identity_pub,
        );

        let expected_mac = server_hello_mac(
            &shared_secret,
            &self.session.public,
            &server_session_pub,
            &self.server_identity_pub,
            &self.node_id,
        );
        if expected_mac != received_mac {
            return Err(CryptoError::HandshakeMacMismatch);
        }

        let okm = derive_keying_material(
            &shared_secret,
            &self.node_id,
            &self.session.public,
            &server_session_pub,
            &self.server_identity_pub,
        );
        Ok(split_keying_material(&okm, true))
    }
}

/// Server side of one handshake attempt.
pub struct ServerHandshake<'a> {
    node_id: NodeId,
    identity: &'a IdentityKeypair,
}

impl<'a> ServerHandshake<'a> {
    /// Build a server-side handshake bound to `identity` and the node id
    /// it was reached under.
    pub fn new(node_id: NodeId, identity: &'a IdentityKeypair) -> Self {
        Self { node_id, identity }
    }

    /// Validate a `client_hello` body's structure and MAC, without yet
    /// checking for replay (the caller supplies a [`ReplayFilter`] and an
    /// epoch since those are connection-external state).
    pub fn verify_client_hello(&self, client_hello: &[u8]) -> Result<(NodeId, PublicKey, [u8; MAC_LEN])> {
        if client_hello.len() < 20 + 32 + MAC_LEN {
            return Err(CryptoError::HandshakeMacMismatch);
        }
        let node_id = NodeId::try_from(&client_hello[..20]).map_err(|_| CryptoError::HandshakeMacMismatch)?;
        let client_pub = parse_public_key(&client_hello[20..52])?;
        let received_mac: [u8; MAC_LEN] =
            client_hello[52..52 + MAC_LEN].try_into().unwrap_or_else(|_| unreachable!());

        let expected_mac = client_hello_mac(&node_id, &client_pub);
        if expected_mac != received_mac {
            return Err(CryptoError::HandshakeMacMismatch);
        }

        Ok((node_id, client_pub, received_mac))
    }

    /// Complete the handshake: derive keys and build the `server_hello`
    /// body to send back. `session` is this connection's freshly
    /// generated ephemeral server keypair.
    pub fn build_server_hello(
        &self,
        client_pub: &PublicKey,
        session: &SessionKeypair,
    ) -> (Vec<u8>, HandshakeKeys) {
        let shared_secret = combined_shared_secret(
            &session.secret,
            client_pub,
            &self.identity.secret,
            client_pub,
        );

        let mac = server_hello_mac(&shared_secret, client_pub, &session.public, &self.identity.public, &self.node_id);

        let mut body = Vec::with_capacity(32 + MAC_LEN);
        body.extend_from_slice(session.public.as_bytes());
        body.extend_from_slice(&mac);

        let okm = derive_keying_material(
            &shared_secret,
            &self.node_id,
            client_pub,
            &session.public,
            &self.identity.public,
        );
        (body, split_keying_material(&okm, false))
    }
}

/// Rejects a `client_hello` whose MAC has already been seen within the
/// current replay window.
///
/// Entries are keyed by a coarse epoch (caller-supplied, typically
/// "current time / window length") so old entries can be dropped in
/// bulk rather than tracked with individual expiries.
#[derive(Default)]
pub struct ReplayFilter {
    seen: HashMap<u64, Vec<[u8; MAC_LEN]>>,
}

impl ReplayFilter {
    /// How many trailing epochs are kept before being pruned.
    const WINDOW: u64 = 2;

    /// Record `mac` as seen in `epoch`. Returns `false` if this MAC was
    /// already recorded in `epoch` or the immediately preceding one
    /// (i.e. this is a replay), `true` if it is new.
    pub fn check_and_insert(&mut self, epoch: u64, mac: [u8; MAC_LEN]) -> bool {
        for window_epoch in epoch.saturating_sub(Self::WINDOW)..=epoch {
            if let Some(macs) = self.seen.get(&window_epoch) {
                if macs.contains(&mac) {
                    return false;
                }
            }
        }
        self.seen.entry(epoch).or_default().push(mac);
        self.seen.retain(|&e, _| e + Self::WINDOW >= epoch);
        true
    }
}
