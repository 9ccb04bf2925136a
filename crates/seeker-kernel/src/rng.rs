//! [`RunRng`] – the single seeded random stream of a run.
//!
//! Seeded once at run start and advanced monotonically. Every consumer (the
//! simulated verifier, the mock hypothesis generator) borrows it mutably, so
//! two runs with the same seed observe the same sequence of draws in the same
//! order and replay bit-for-bit. Tests construct their own instances, so
//! nothing is shared across test cases.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

#[derive(Debug, Clone)]
pub struct RunRng {
    seed: u64,
    inner: ChaCha20Rng,
    draws: u64,
}

impl RunRng {
    pub fn from_seed(seed: u64) -> Self {
        Self {
            seed,
            inner: ChaCha20Rng::seed_from_u64(seed),
            draws: 0,
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Number of draws taken so far.
    pub fn draws(&self) -> u64 {
        self.draws
    }

    /// Uniform sample in `[0.0, 1.0)`.
    pub fn roll(&mut self) -> f64 {
        self.draws += 1;
        self.inner.gen_range(0.0..1.0)
    }

    /// Uniform index in `0..len`. `len` must be non-zero.
    pub fn pick(&mut self, len: usize) -> usize {
        debug_assert!(len > 0, "pick from an empty pool");
        self.draws += 1;
        self.inner.gen_range(0..len.max(1))
    }
}
