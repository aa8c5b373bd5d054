//! Size constants for the obfs4 wire format.

/// Length of a DRBG seed, in bytes.
pub const SEED_LEN: usize = 24;

/// Length of a node identifier, in bytes.
pub const NODE_ID_LEN: usize = 20;

/// Length of a `PrngSeed` packet's payload: a fresh [`SEED_LEN`]-byte seed.
pub const PRNG_SEED_LEN: usize = SEED_LEN;

/// Maximum plaintext a single frame may carry (packet header + payload +
/// padding), after AEAD decryption.
pub const MAX_FRAME_PAYLOAD: usize = 1448;

/// Bytes consumed by a packet's own header (`type: u8` + `length: u16`).
pub const PACKET_OVERHEAD: usize = 3;

/// Maximum payload a single packet may carry once its header is
/// subtracted from [`MAX_FRAME_PAYLOAD`].
pub const MAX_PACKET_PAYLOAD: usize = MAX_FRAME_PAYLOAD - PACKET_OVERHEAD;

/// Bytes consumed by a frame's own obfuscated length prefix, ahead of
/// its ciphertext.
pub const FRAME_LEN_PREFIX: usize = 2;

/// Bytes the AEAD tag adds to a frame's plaintext length.
pub const AEAD_TAG_LEN: usize = 16;

/// Largest a single wire frame — length prefix, ciphertext and AEAD tag
/// together — can legitimately be. A deobfuscated length claim outside
/// this bound can only come from a corrupted or forged length prefix.
pub const MAX_FRAME_WIRE: usize = FRAME_LEN_PREFIX + MAX_FRAME_PAYLOAD + AEAD_TAG_LEN;
