//! The connection state machine: handshake orchestration, the packet
//! layer, and the public read/write/split/close surface.
//!
//! `Connection<C, E>` is a thin async driver wrapped around the pure
//! pieces in `obfs4-crypto` and `obfs4-proto`: the handshake types build
//! and parse wire messages without touching I/O, the frame codec seals
//! and opens records without touching I/O, and this module is the only
//! place that actually calls `AsyncRead`/`AsyncWrite` on the carrier.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use obfs4_crypto::{
    ClientHandshake, CryptoError, Decoder, Drbg, Encoder, HandshakeKeys, IdentityKeypair, LenDist,
    PublicKey, ReplayFilter, ServerHandshake, SessionKeypair,
};
use obfs4_proto::{
    DrbgSeed, MAX_FRAME_PAYLOAD, MAX_FRAME_WIRE, MAX_PACKET_PAYLOAD, NodeId, PRNG_SEED_LEN, Packet,
    PacketType,
};
use tokio::io::{
    AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf as CarrierReadHalf,
    WriteHalf as CarrierWriteHalf,
};

use crate::{env::Environment, error::ConnectionError};

/// Lifecycle state of a [`Connection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Constructed but the handshake has not started.
    New,
    /// Handshake in progress.
    Handshaking,
    /// Handshake complete; `read`/`write`/`write_to` are available.
    Open,
    /// A fatal error occurred, or `close()` was called. Permanently
    /// unusable.
    Broken,
}

/// Everything the client side of a handshake needs to know in advance.
pub struct ClientKeys {
    /// Identifier advertised to the bridge.
    pub node_id: NodeId,
    /// The bridge's long-lived public identity key, learned out of band.
    pub server_identity_public: PublicKey,
}

/// Everything the server side of a handshake needs to know in advance.
///
/// `replay_filter` is shared across every connection this listener
/// accepts — a fresh filter per connection could never catch a
/// `client_hello` replayed from an earlier attempt.
#[derive(Clone)]
pub struct ServerKeys {
    /// Identifier this bridge is reachable under.
    pub node_id: NodeId,
    /// This bridge's long-lived identity keypair.
    pub identity: Arc<IdentityKeypair>,
    /// Replay filter shared across all connections accepted by this
    /// listener.
    pub replay_filter: Arc<Mutex<ReplayFilter>>,
}

/// Fixed seed a server uses to pad its side of the handshake before it
/// has any peer-supplied material to draw a seed from. Arbitrary but
/// fixed across every connection: padding at this stage only needs to
/// vary message length, not resist an observer who already knows this
/// program's source.
const SERVER_HANDSHAKE_PAD_SEED: [u8; 24] = *b"obfs4-server-hello-pad-0";

const HANDSHAKE_LEN_PREFIX: usize = 2;
const REPLAY_WINDOW: std::time::Duration = std::time::Duration::from_secs(3600);

/// Upper bound on the reassembly buffer while waiting for one frame to
/// complete: one full frame plus one carrier read's worth of lookahead.
/// A legitimate peer never needs more than this; a corrupted or forged
/// length prefix that would otherwise stall `Ok(None)` forever is caught
/// here instead.
const MAX_RX_BUF: usize = MAX_FRAME_WIRE + 4096;

fn node_id_as_pad_seed(node_id: &NodeId) -> DrbgSeed {
    let mut bytes = [0u8; 24];
    bytes[..20].copy_from_slice(node_id.as_bytes());
    DrbgSeed::new(bytes)
}

/// The Drbg/LenDist pair governing how much padding this side attaches
/// to its own outgoing frames. Shared between the two halves of a split
/// connection: the write half samples from it, the read half replaces
/// it wholesale when a `PrngSeed` packet arrives.
struct TxPadState {
    drbg: Drbg,
    dist: LenDist,
}

impl TxPadState {
    fn from_seed(seed: &DrbgSeed) -> Self {
        let mut drbg = Drbg::new(seed);
        let dist = LenDist::from_drbg(&mut drbg);
        Self { drbg, dist }
    }

    fn sample_frame_len(&mut self) -> usize {
        self.dist.sample(&mut self.drbg)
    }
}

fn handshake_padding_len(seed: &DrbgSeed, body_len: usize) -> usize {
    let mut drbg = Drbg::new(seed);
    let dist = LenDist::from_drbg(&mut drbg);
    let target = dist.sample(&mut drbg);
    target.saturating_sub(body_len)
}

async fn write_handshake_message<C: AsyncWrite + Unpin>(
    carrier: &mut C,
    body: &[u8],
    pad_seed: &DrbgSeed,
) -> Result<(), ConnectionError> {
    let padding = handshake_padding_len(pad_seed, body.len());
    let total = body.len() + padding;
    let total_u16 = u16::try_from(total).unwrap_or(u16::MAX);

    let mut wire = Vec::with_capacity(HANDSHAKE_LEN_PREFIX + total_u16 as usize);
    wire.extend_from_slice(&total_u16.to_be_bytes());
    wire.extend_from_slice(body);
    wire.resize(HANDSHAKE_LEN_PREFIX + total_u16 as usize, 0);

    carrier.write_all(&wire).await?;
    Ok(())
}

async fn read_handshake_message<C: AsyncRead + Unpin>(
    carrier: &mut C,
) -> Result<Vec<u8>, ConnectionError> {
    let mut len_prefix = [0u8; HANDSHAKE_LEN_PREFIX];
    carrier.read_exact(&mut len_prefix).await?;
    let total = u16::from_be_bytes(len_prefix) as usize;

    let mut body = vec![0u8; total];
    carrier.read_exact(&mut body).await?;
    Ok(body)
}

/// An obfs4 connection: the handshake drive plus the open-state packet
/// layer, running directly over one async carrier.
pub struct Connection<C, E: Environment> {
    state: ConnectionState,
    carrier: C,
    #[allow(dead_code)]
    env: E,
    encoder: Encoder,
    decoder: Decoder,
    tx_pad: Arc<Mutex<TxPadState>>,
    rx_buf: Vec<u8>,
    decoded: VecDeque<u8>,
}

impl<C, E> Connection<C, E>
where
    C: AsyncRead + AsyncWrite + Unpin + Send,
    E: Environment,
{
    /// Client role: send `client_hello`, read `server_hello`, derive
    /// keys, and transition to [`ConnectionState::Open`].
    pub async fn connect(mut carrier: C, keys: ClientKeys, env: E) -> Result<Self, ConnectionError> {
        let mut session_bytes = [0u8; 32];
        env.random_bytes(&mut session_bytes);
        let session = SessionKeypair::from_random_bytes(session_bytes);

        let handshake = ClientHandshake::new(keys.node_id, keys.server_identity_public, session);
        let client_hello = handshake.build_client_hello();

        let pad_seed = node_id_as_pad_seed(&keys.node_id);
        write_handshake_message(&mut carrier, &client_hello, &pad_seed).await?;

        let server_hello = read_handshake_message(&mut carrier).await?;
        let handshake_keys = handshake.complete(&server_hello)?;

        tracing::debug!(role = "client", "handshake complete");
        Ok(Self::from_handshake_keys(carrier, env, handshake_keys))
    }

    /// Server role: read `client_hello`, verify it, send `server_hello`,
    /// derive keys, and transition to [`ConnectionState::Open`].
    pub async fn accept(mut carrier: C, keys: ServerKeys, env: E) -> Result<Self, ConnectionError> {
        let client_hello = read_handshake_message(&mut carrier).await?;

        let server = ServerHandshake::new(keys.node_id.clone(), &keys.identity);
        let (node_id, client_pub, mac) = server.verify_client_hello(&client_hello)?;
        if node_id != keys.node_id {
            return Err(ConnectionError::from(CryptoError::HandshakeMacMismatch));
        }

        let epoch = env.replay_epoch(REPLAY_WINDOW);
        let accepted = {
            #[allow(clippy::expect_used)]
            let mut filter = keys.replay_filter.lock().expect("replay filter mutex is never poisoned");
            filter.check_and_insert(epoch, mac)
        };
        if !accepted {
            return Err(ConnectionError::from(CryptoError::HandshakeReplay));
        }

        let mut session_bytes = [0u8; 32];
        env.random_bytes(&mut session_bytes);
        let session = SessionKeypair::from_random_bytes(session_bytes);

        let (server_hello, handshake_keys) = server.build_server_hello(&client_pub, &session);

        let pad_seed = DrbgSeed::new(SERVER_HANDSHAKE_PAD_SEED);
        write_handshake_message(&mut carrier, &server_hello, &pad_seed).await?;

        tracing::debug!(role = "server", "handshake complete");
        Ok(Self::from_handshake_keys(carrier, env, handshake_keys))
    }

    fn from_handshake_keys(carrier: C, env: E, keys: HandshakeKeys) -> Self {
        let tx_pad = TxPadState::from_seed(&keys.outbound_len_seed);
        Self {
            state: ConnectionState::Open,
            carrier,
            env,
            encoder: Encoder::new(&keys.tx),
            decoder: Decoder::new(&keys.rx),
            tx_pad: Arc::new(Mutex::new(tx_pad)),
            rx_buf: Vec::new(),
            decoded: VecDeque::new(),
        }
    }

    fn fail(&mut self, err: ConnectionError) -> ConnectionError {
        self.state = ConnectionState::Broken;
        tracing::warn!(error = %err, "connection broken");
        err
    }

    fn require_open(&self, operation: &'static str) -> Result<(), ConnectionError> {
        if self.state != ConnectionState::Open {
            return Err(ConnectionError::InvalidState { state: self.state, operation });
        }
        Ok(())
    }

    /// Write all of `buf`, split into one padded, encrypted frame per
    /// `MAX_PACKET_PAYLOAD`-byte chunk. Returns `buf.len()` on success;
    /// any failure mid-loop is fatal to the connection.
    pub async fn write(&mut self, buf: &[u8]) -> Result<usize, ConnectionError> {
        self.require_open("write")?;

        for chunk in buf.chunks(MAX_PACKET_PAYLOAD) {
            let packet = match Packet::new(PacketType::Payload, chunk.to_vec()) {
                Ok(packet) => packet,
                Err(e) => return Err(self.fail(ConnectionError::from(e))),
            };
            let wire = match self.produce_packet(&packet) {
                Ok(wire) => wire,
                Err(e) => return Err(self.fail(e)),
            };

            if let Err(e) = self.carrier.write_all(&wire).await {
                return Err(self.fail(ConnectionError::from(e)));
            }
        }
        Ok(buf.len())
    }

    /// Build one wire frame (padded packet, sealed) without touching the
    /// carrier.
    fn produce_packet(&mut self, packet: &Packet) -> Result<Vec<u8>, ConnectionError> {
        let target_len = {
            #[allow(clippy::expect_used)]
            let mut pad = self.tx_pad.lock().expect("tx_pad mutex is never poisoned");
            pad.sample_frame_len()
        };

        let mut plaintext = Vec::with_capacity(MAX_FRAME_PAYLOAD);
        packet.encode(&mut plaintext);

        let padded_len = target_len.max(plaintext.len()).min(MAX_FRAME_PAYLOAD);
        plaintext.resize(padded_len, 0);

        let mut wire = Vec::new();
        self.encoder.encode(&plaintext, &mut wire)?;
        Ok(wire)
    }

    /// Read decoded application bytes into `buf`, blocking on the
    /// carrier until at least one byte is available.
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize, ConnectionError> {
        self.require_open("read")?;

        while self.decoded.is_empty() {
            if let Err(e) = self.consume_one_frame().await {
                return Err(self.fail(e));
            }
        }

        let n = buf.len().min(self.decoded.len());
        for slot in buf.iter_mut().take(n) {
            #[allow(clippy::expect_used)]
            { *slot = self.decoded.pop_front().expect("loop bound is decoded.len()"); }
        }
        Ok(n)
    }

    /// Read one decoded packet's worth of application bytes and write
    /// them directly to `sink`, bypassing the internal decoded-byte
    /// queue.
    pub async fn write_to<S: AsyncWrite + Unpin>(&mut self, sink: &mut S) -> Result<usize, ConnectionError> {
        self.require_open("write_to")?;

        while self.decoded.is_empty() {
            if let Err(e) = self.consume_one_frame().await {
                return Err(self.fail(e));
            }
        }

        let chunk: Vec<u8> = self.decoded.drain(..).collect();
        if let Err(e) = sink.write_all(&chunk).await {
            return Err(self.fail(ConnectionError::from(e)));
        }
        Ok(chunk.len())
    }

    /// Read and decrypt exactly one frame from the carrier, then apply
    /// its packet to connection state: `Payload` bytes are appended to
    /// the decoded queue, a `PrngSeed` rotates this side's own outbound
    /// padding schedule, and any other (or unrecognized) type is
    /// silently dropped.
    async fn consume_one_frame(&mut self) -> Result<(), ConnectionError> {
        loop {
            if let Some((plaintext, consumed)) = self.decoder.decode(&self.rx_buf)? {
                self.rx_buf.drain(..consumed);
                self.apply_frame_plaintext(&plaintext)?;
                return Ok(());
            }

            if self.rx_buf.len() >= MAX_RX_BUF {
                return Err(CryptoError::AeadFailure.into());
            }

            let mut chunk = [0u8; 4096];
            let n = self.carrier.read(&mut chunk).await?;
            if n == 0 {
                return Err(ConnectionError::CarrierIo(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "carrier closed mid-frame",
                )));
            }
            self.rx_buf.extend_from_slice(&chunk[..n]);
        }
    }

    fn apply_frame_plaintext(&mut self, plaintext: &[u8]) -> Result<(), ConnectionError> {
        let Some((packet, _consumed)) = Packet::decode(plaintext)? else {
            return Ok(());
        };

        match packet.packet_type() {
            PacketType::Payload => {
                self.decoded.extend(packet.payload().iter().copied());
            },
            PacketType::PrngSeed => {
                if packet.payload().len() != PRNG_SEED_LEN {
                    return Err(ConnectionError::from(obfs4_proto::ProtoError::InvalidPayloadLength {
                        length: packet.payload().len(),
                        max: PRNG_SEED_LEN,
                    }));
                }
                let seed = DrbgSeed::try_from(packet.payload().as_ref())?;
                let fresh = TxPadState::from_seed(&seed);
                #[allow(clippy::expect_used)]
                let mut pad = self.tx_pad.lock().expect("tx_pad mutex is never poisoned");
                *pad = fresh;
            },
        }
        Ok(())
    }

    /// Send a `PrngSeed` packet instructing the peer to rotate the
    /// padding schedule it uses for frames it sends to us.
    pub async fn rotate_peer_seed(&mut self, seed: DrbgSeed) -> Result<(), ConnectionError> {
        self.require_open("rotate_peer_seed")?;
        let packet = match Packet::new(PacketType::PrngSeed, seed.as_bytes().to_vec()) {
            Ok(packet) => packet,
            Err(e) => return Err(self.fail(ConnectionError::from(e))),
        };
        let wire = match self.produce_packet(&packet) {
            Ok(wire) => wire,
            Err(e) => return Err(self.fail(e)),
        };
        if let Err(e) = self.carrier.write_all(&wire).await {
            return Err(self.fail(ConnectionError::from(e)));
        }
        Ok(())
    }

    /// Split into independent read and write halves, each usable from a
    /// different task. The outbound padding schedule stays shared so a
    /// `PrngSeed` observed on the read half still resets it.
    pub fn into_split(self) -> (ReadHalf<C>, WriteHalf<C>) {
        let (carrier_rx, carrier_tx) = tokio::io::split(self.carrier);
        let read = ReadHalf {
            carrier: carrier_rx,
            decoder: self.decoder,
            tx_pad: Arc::clone(&self.tx_pad),
            rx_buf: self.rx_buf,
            decoded: self.decoded,
        };
        let write = WriteHalf { carrier: carrier_tx, encoder: self.encoder, tx_pad: self.tx_pad };
        (read, write)
    }

    /// Transition to [`ConnectionState::Broken`] and best-effort shut
    /// down the carrier. There is no goodbye control packet in this
    /// transport; closing is unilateral.
    pub async fn close(&mut self) -> Result<(), ConnectionError> {
        self.state = ConnectionState::Broken;
        self.carrier.shutdown().await?;
        Ok(())
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }
}

/// The read half of a split [`Connection`]: decrypts inbound frames and
/// applies `PrngSeed` resets to the shared outbound padding state.
pub struct ReadHalf<C> {
    carrier: CarrierReadHalf<C>,
    decoder: Decoder,
    tx_pad: Arc<Mutex<TxPadState>>,
    rx_buf: Vec<u8>,
    decoded: VecDeque<u8>,
}

impl<C: AsyncRead + Unpin + Send> ReadHalf<C> {
    /// Read decoded application bytes into `buf`.
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize, ConnectionError> {
        while self.decoded.is_empty() {
            self.consume_one_frame().await?;
        }
        let n = buf.len().min(self.decoded.len());
        for slot in buf.iter_mut().take(n) {
            #[allow(clippy::expect_used)]
            { *slot = self.decoded.pop_front().expect("loop bound is decoded.len()"); }
        }
        Ok(n)
    }

    async fn consume_one_frame(&mut self) -> Result<(), ConnectionError> {
        loop {
            if let Some((plaintext, consumed)) = self.decoder.decode(&self.rx_buf)? {
                self.rx_buf.drain(..consumed);
                self.apply_frame_plaintext(&plaintext)?;
                return Ok(());
            }

            if self.rx_buf.len() >= MAX_RX_BUF {
                return Err(CryptoError::AeadFailure.into());
            }

            let mut chunk = [0u8; 4096];
            let n = self.carrier.read(&mut chunk).await?;
            if n == 0 {
                return Err(ConnectionError::CarrierIo(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "carrier closed mid-frame",
                )));
            }
            self.rx_buf.extend_from_slice(&chunk[..n]);
        }
    }

    fn apply_frame_plaintext(&mut self, plaintext: &[u8]) -> Result<(), ConnectionError> {
        let Some((packet, _consumed)) = Packet::decode(plaintext)? else {
            return Ok(());
        };

        match packet.packet_type() {
            PacketType::Payload => self.decoded.extend(packet.payload().iter().copied()),
            PacketType::PrngSeed => {
                if packet.payload().len() != PRNG_SEED_LEN {
                    return Err(ConnectionError::from(obfs4_proto::ProtoError::InvalidPayloadLength {
                        length: packet.payload().len(),
                        max: PRNG_SEED_LEN,
                    }));
                }
                let seed = DrbgSeed::try_from(packet.payload().as_ref())?;
                let fresh = TxPadState::from_seed(&seed);
                #[allow(clippy::expect_used)]
                let mut pad = self.tx_pad.lock().expect("tx_pad mutex is never poisoned");
                *pad = fresh;
            },
        }
        Ok(())
    }
}

/// The write half of a split [`Connection`]: encrypts and pads outbound
/// frames from the shared padding state.
pub struct WriteHalf<C> {
    carrier: CarrierWriteHalf<C>,
    encoder: Encoder,
    tx_pad: Arc<Mutex<TxPadState>>,
}

impl<C: AsyncWrite + Unpin + Send> WriteHalf<C> {
    /// Write all of `buf`, split into one padded, encrypted frame per
    /// `MAX_PACKET_PAYLOAD`-byte chunk. Returns `buf.len()` on success.
    pub async fn write(&mut self, buf: &[u8]) -> Result<usize, ConnectionError> {
        for chunk in buf.chunks(MAX_PACKET_PAYLOAD) {
            let packet = Packet::new(PacketType::Payload, chunk.to_vec())?;

            let target_len = {
                #[allow(clippy::expect_used)]
                let mut pad = self.tx_pad.lock().expect("tx_pad mutex is never poisoned");
                pad.sample_frame_len()
            };

            let mut plaintext = Vec::with_capacity(MAX_FRAME_PAYLOAD);
            packet.encode(&mut plaintext);
            let padded_len = target_len.max(plaintext.len()).min(MAX_FRAME_PAYLOAD);
            plaintext.resize(padded_len, 0);

            let mut wire = Vec::new();
            self.encoder.encode(&plaintext, &mut wire)?;
            self.carrier.write_all(&wire).await?;
        }
        Ok(buf.len())
    }
}
