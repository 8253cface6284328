//! # Shared Random Stream
//!
//! The one random source synced code may draw from. Every peer seeds it
//! with the session seed and draws from it in the same order, so the
//! stream stays identical across machines. The last produced value feeds
//! the sync hash, which catches any peer that drew a different number of
//! samples.
//!
//! ChaCha is specified bit-for-bit and independent of platform word size
//! and endianness. Range helpers use integer arithmetic only.

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Deterministic random stream shared by all synced code.
#[derive(Clone, Debug)]
pub struct SharedRandom {
    /// Underlying generator.
    rng: ChaCha8Rng,
    /// Most recently produced sample.
    last: i32,
    /// Number of samples drawn so far.
    total_count: u64,
}

impl SharedRandom {
    /// Creates a stream from the session seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            last: 0,
            total_count: 0,
        }
    }

    /// Draws a non-negative sample in `0..=i32::MAX`.
    #[inline]
    pub fn next(&mut self) -> i32 {
        let sample = (self.rng.next_u32() >> 1) as i32;
        self.last = sample;
        self.total_count += 1;
        sample
    }

    /// Draws a sample in `low..high`. Returns `low` for an empty range.
    #[inline]
    pub fn next_range(&mut self, low: i32, high: i32) -> i32 {
        let sample = self.next();
        if high <= low {
            return low;
        }
        let span = i64::from(high) - i64::from(low);
        let offset = i64::from(sample) % span;
        // low + offset < high, so it fits back into i32.
        (i64::from(low) + offset) as i32
    }

    /// Returns `true` with probability `percent` / 100.
    #[inline]
    pub fn chance(&mut self, percent: i32) -> bool {
        self.next_range(0, 100) < percent
    }

    /// Most recently produced sample (`0` before the first draw).
    #[inline]
    #[must_use]
    pub const fn last(&self) -> i32 {
        self.last
    }

    /// Number of samples drawn so far.
    #[inline]
    #[must_use]
    pub const fn total_count(&self) -> u64 {
        self.total_count
    }
}
