//! Deterministic hashed bag-of-words embeddings.
//!
//! Each lowercased word is hashed with XxHash64 into one of `dim` buckets and
//! adds a non-negative weight there. The vector is L2-normalized. The result
//! is a pure function of the text: no model, no network, no randomness.
//! Texts that share words point in similar directions; texts that share none
//! are near-orthogonal. Because all weights are non-negative, cosine
//! similarity between hash embeddings is never below zero.

use std::hash::Hasher;

use twox_hash::XxHash64;

use super::Embedder;
use crate::tokenize::words;
use crate::Result;

const DEFAULT_DIM: usize = 256;

/// Offline fallback embedder.
///
/// ```rust
/// use slabscore::embed::{cosine_similarity, HashEmbedder};
///
/// let e = HashEmbedder::default();
/// let v = e.embed_texts(&["neural networks learn", "neural networks learn", "castle walls"]);
/// assert!(cosine_similarity(&v[0], &v[1]) > 0.999);
/// assert!(cosine_similarity(&v[0], &v[2]) < 0.5);
/// ```
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dim: usize,
    id: String,
}

impl HashEmbedder {
    /// Create an embedder with `dim` buckets.
    ///
    /// # Panics
    ///
    /// Panics if `dim == 0`.
    #[must_use]
    pub fn new(dim: usize) -> Self {
        assert!(dim > 0, "embedding dimension must be > 0");
        Self {
            dim,
            id: format!("hash:d{dim}"),
        }
    }

    /// Embedding dimension.
    #[must_use]
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Embed a single text.
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        for word in words(text) {
            let mut hasher = XxHash64::with_seed(0);
            hasher.write(word.as_bytes());
            let h = hasher.finish();
            let idx = (h % self.dim as u64) as usize;
            let weight = 0.5 + 0.5 * (((h >> 32) as u32) as f32 / u32::MAX as f32);
            v[idx] += weight;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut v {
                *x /= norm;
            }
        }
        v
    }

    /// Embed a batch. Infallible counterpart of [`Embedder::embed`].
    pub fn embed_texts(&self, texts: &[&str]) -> Vec<Vec<f32>> {
        texts.iter().map(|t| self.embed_text(t)).collect()
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIM)
    }
}

impl Embedder for HashEmbedder {
    fn id(&self) -> &str {
        &self.id
    }

    fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Ok(self.embed_texts(texts))
    }
}
