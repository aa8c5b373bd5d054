//! Deterministic random byte generator seeded from a 24-byte secret.
//!
//! Two [`Drbg`] instances constructed from the same seed produce
//! bit-identical output forever; this is what lets a `PrngSeed` packet
//! carried in-band reproduce the same padding schedule on both peers
//! without exchanging the schedule itself.

use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use obfs4_proto::DrbgSeed;
use sha2::Sha256;
use zeroize::Zeroize;

type HmacSha256 = Hmac<Sha256>;

const PRF_KEY_LABEL: &[u8] = b"obfs4-drbg-prf-key-v1";

/// A keyed pseudorandom stream: `next_u64()` advances a counter and
/// returns `HMAC-SHA256(prf_key, counter_be64)[..8]`.
///
/// Unlike a forward-secure ratchet, the DRBG never rotates its own key —
/// reproducibility across independently constructed instances requires
/// only that the seed and the counter agree, not that past output be
/// unrecoverable from present state.
pub struct Drbg {
    prf_key: [u8; 32],
    counter: u64,
}

impl Drbg {
    /// Derive a DRBG from a 24-byte seed.
    pub fn new(seed: &DrbgSeed) -> Self {
        let hk = Hkdf::<Sha256>::new(None, seed.as_bytes());
        let mut prf_key = [0u8; 32];
        hk.expand(PRF_KEY_LABEL, &mut prf_key)
            .unwrap_or_else(|_| unreachable!("32 is a valid SHA-256 HKDF output length"));
        Self { prf_key, counter: 0 }
    }

    /// Draw the next pseudorandom 64-bit value from the stream.
    pub fn next_u64(&mut self) -> u64 {
        let Ok(mut mac) = HmacSha256::new_from_slice(&self.prf_key) else {
            unreachable!("HMAC-SHA256 accepts any key size");
        };
        mac.update(&self.counter.to_be_bytes());
        let digest = mac.finalize().into_bytes();

        self.counter = self.counter.wrapping_add(1);

        let mut out = [0u8; 8];
        out.copy_from_slice(&digest[..8]);
        u64::from_be_bytes(out)
    }

    /// Draw `n` as a value in `0..bound`, rejection-free via wide
    /// reduction (biased by at most `bound / 2^64`, negligible for every
    /// bound this crate uses).
    pub fn next_below(&mut self, bound: u64) -> u64 {
        if bound == 0 {
            return 0;
        }
        self.next_u64() % bound
    }
}

impl Drop for Drbg {
    fn drop(&mut self) {
        self.prf_key.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed(byte: u8) -> DrbgSeed {
        DrbgSeed::new([byte; 24])
    }

    #[test]
    fn same_seed_produces_identical_streams() {
        let mut a = Drbg::new(&seed(1));
        let mut b = Drbg::new(&seed(1));

        for _ in 0..50 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }

    #[test]
    fn different_seeds_diverge() {
        let mut a = Drbg::new(&seed(1));
        let mut b = Drbg::new(&seed(2));

        assert_ne!(a.next_u64(), b.next_u64());
    }

    #[test]
    fn successive_outputs_differ() {
        let mut drbg = Drbg::new(&seed(9));
        let x = drbg.next_u64();
        let y = drbg.next_u64();
        assert_ne!(x, y);
    }

    #[test]
    fn next_below_zero_bound_is_zero() {
        let mut drbg = Drbg::new(&seed(3));
        assert_eq!(drbg.next_below(0), 0);
    }

    #[test]
    fn next_below_respects_bound() {
        let mut drbg = Drbg::new(&seed(4));
        for _ in 0..200 {
            assert!(drbg.next_below(17) < 17);
        }
    }
}
