//! Deterministic stand-in embeddings for providers without an embedding model.
//!
//! The vector is derived only from the sha256 digest of the text: identical text
//! always maps to a bit-identical vector, but nearby meanings do NOT map to nearby
//! vectors. Cosine scores over these vectors carry no semantic signal; they only
//! keep the index usable (exact-text matches still score 1.0) when no real
//! embedding backend is reachable.

use sha2::{Digest, Sha256};

pub const HASHED_EMBEDDING_DIMS: usize = 768;

pub fn hashed_embedding(text: &str) -> Vec<f32> {
    let digest = hex::encode(Sha256::digest(text.as_bytes()));
    let nibbles: Vec<u32> = digest.chars().filter_map(|c| c.to_digit(16)).collect();

    (0..HASHED_EMBEDDING_DIMS)
        .map(|i| {
            let seed = f64::from(nibbles[i % nibbles.len()]) + i as f64;
            ((seed.sin() + 1.0) / 2.0) as f32
        })
        .collect()
}
