//! Weighted length distribution used to pick padding targets.
//!
//! `[0, MAX_FRAME_PAYLOAD]` is split into fixed-width buckets; a fresh
//! [`Drbg`] draw weights each bucket once at construction time. Sampling
//! then draws a bucket proportional to its weight and a concrete length
//! uniformly within that bucket's width, so two peers that reset from
//! the same seed draw the same sequence of lengths without ever
//! exchanging the table itself.

use obfs4_proto::MAX_FRAME_PAYLOAD;

use crate::drbg::Drbg;

const BUCKET_COUNT: usize = 128;
const BUCKET_WIDTH: u64 = (MAX_FRAME_PAYLOAD as u64 + 1).div_ceil(BUCKET_COUNT as u64);

/// A sampleable padding-length distribution, reproducible from a DRBG
/// seed.
pub struct LenDist {
    // cumulative_weights[i] is the total weight of buckets [0, i].
    cumulative_weights: Vec<u64>,
}

impl LenDist {
    /// Build a distribution by drawing one weight per bucket from
    /// `drbg`.
    pub fn from_drbg(drbg: &mut Drbg) -> Self {
        let mut cumulative_weights = Vec::with_capacity(BUCKET_COUNT);
        let mut total: u64 = 0;
        for _ in 0..BUCKET_COUNT {
            // +1 keeps every bucket reachable; an all-zero draw would
            // otherwise make the whole table unsamplable.
            total = total.saturating_add(drbg.next_u64() % 1024 + 1);
            cumulative_weights.push(total);
        }
        Self { cumulative_weights }
    }

    /// Draw the next padding length in `[0, MAX_FRAME_PAYLOAD]`.
    pub fn sample(&self, drbg: &mut Drbg) -> usize {
        let total_weight = *self.cumulative_weights.last().unwrap_or(&1);
        let target = drbg.next_below(total_weight.max(1));

        let bucket = self
            .cumulative_weights
            .partition_point(|&cumulative| cumulative <= target);
        let bucket = bucket.min(BUCKET_COUNT - 1);

        let bucket_start = bucket as u64 * BUCKET_WIDTH;
        let bucket_end = (bucket_start + BUCKET_WIDTH - 1).min(MAX_FRAME_PAYLOAD as u64);
        let span = bucket_end - bucket_start + 1;

        (bucket_start + drbg.next_below(span)) as usize
    }

    /// Rebuild this distribution's table from a freshly seeded DRBG,
    /// replacing the old table in one assignment so a concurrent reader
    /// never observes a half-built table.
    pub fn reset(&mut self, drbg: &mut Drbg) {
        let rebuilt = Self::from_drbg(drbg);
        self.cumulative_weights = rebuilt.cumulative_weights;
    }
}
