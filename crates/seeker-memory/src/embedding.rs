//! Deterministic text embedding.
//!
//! A stand-in for a learned encoder. The only property retrieval relies on is
//! determinism: the vector is a pure function of the normalized text
//! (lowercased, trimmed). A SHA-256 digest of that text seeds a ChaCha stream
//! from which `dim` standard-normal samples are drawn; the result is scaled to
//! unit length.
//!
//! ```rust
//! use seeker_memory::embedding::DeterministicEmbedder;
//!
//! let embedder = DeterministicEmbedder::new(64);
//! assert_eq!(embedder.embed_text("Red Backpack"), embedder.embed_text("  red backpack"));
//! ```

use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use rand_distr::{Distribution, StandardNormal};
use sha2::{Digest, Sha256};

/// Default embedding dimensionality.
pub const DEFAULT_DIM: usize = 64;

/// Scale `v` to unit length. A zero vector is returned unmodified.
pub fn normalize(mut v: Vec<f32>) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 {
        return v;
    }
    for x in v.iter_mut() {
        *x /= norm;
    }
    v
}

/// Hash-seeded embedder.
#[derive(Debug, Clone, Copy)]
pub struct DeterministicEmbedder {
    dim: usize,
}

impl Default for DeterministicEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIM)
    }
}

impl DeterministicEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Embed `text` into a unit vector of length [`dim`][Self::dim].
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let normalized = text.trim().to_lowercase();
        let mut rng = ChaCha20Rng::seed_from_u64(seed_for(&normalized));
        let v: Vec<f32> = (0..self.dim).map(|_| StandardNormal.sample(&mut rng)).collect();
        normalize(v)
    }
}

/// First eight bytes of the SHA-256 digest, big-endian.
fn seed_for(normalized: &str) -> u64 {
    let digest = Sha256::digest(normalized.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_text_same_vector() {
        let e = DeterministicEmbedder::default();
        assert_eq!(e.embed_text("kitchen counter"), e.embed_text("kitchen counter"));
    }

    #[test]
    fn case_and_outer_whitespace_are_ignored() {
        let e = DeterministicEmbedder::default();
        assert_eq!(e.embed_text("Kitchen Counter\n"), e.embed_text("kitchen counter"));
    }

    #[test]
    fn different_text_different_vector() {
        let e = DeterministicEmbedder::default();
        assert_ne!(e.embed_text("kitchen"), e.embed_text("bedroom"));
    }

    #[test]
    fn output_is_unit_length_with_requested_dim() {
        let e = DeterministicEmbedder::new(32);
        let v = e.embed_text("hallway");
        assert_eq!(v.len(), 32);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn zero_vector_is_left_alone() {
        assert_eq!(normalize(vec![0.0, 0.0, 0.0]), vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn zero_dim_embedding_is_empty() {
        assert!(DeterministicEmbedder::new(0).embed_text("x").is_empty());
    }
}
