//! Embedding providers.
//!
//! Everything that compares meaning goes through [`Embedder`]: sentence
//! similarity in the semantic chunker, chunk ranking in retrieval, and the
//! embedding-backed RAGAS metrics.
//!
//! ## Backends
//!
//! | Backend | Type | Feature |
//! |---------|------|---------|
//! | Hashed bag of words | [`HashEmbedder`] | always |
//! | Local ONNX encoder | `FastEmbedder` | `local` |
//! | OpenAI-compatible API | `openai::OpenAiEmbedder` | `openai` |
//!
//! The backend is picked once per run (see
//! [`Providers`](crate::pipeline::Providers)) and passed down explicitly.
//! Components never go looking for one on their own.
//!
//! ## Failure
//!
//! A provider call can fail (network, model load, malformed response). The
//! caller decides what that means: the semantic chunker and quality scorer
//! substitute hash embeddings, retrieval and the metric engine switch to
//! their lexical heuristics. [`FallbackEmbedder`] packages the first policy
//! for callers that want a provider that never fails.

mod hash;

#[cfg(feature = "local")]
mod local;

use std::sync::Arc;

use tracing::warn;

use crate::{Error, Result};

pub use hash::HashEmbedder;

#[cfg(feature = "local")]
pub use local::FastEmbedder;

/// Maps texts to fixed-dimension vectors.
///
/// Implementations must return one vector per input, all of the same
/// dimension within a single call.
pub trait Embedder: Send + Sync {
    /// Stable identifier for the backend and model (e.g. `hash:d256`).
    fn id(&self) -> &str;

    /// Embed a batch of texts.
    fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;
}

/// Compute cosine similarity between two embeddings.
///
/// Returns 0.0 when either vector has zero norm or the lengths differ.
/// The result is clamped to `[-1, 1]` against rounding.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a > 0.0 && norm_b > 0.0 {
        (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

/// Element-wise mean of a set of equal-length vectors.
pub fn mean_embedding<V: AsRef<[f32]>>(vectors: &[V]) -> Vec<f32> {
    let Some(first) = vectors.first() else {
        return Vec::new();
    };
    let mut sum = vec![0.0f32; first.as_ref().len()];
    for v in vectors {
        for (acc, x) in sum.iter_mut().zip(v.as_ref()) {
            *acc += x;
        }
    }
    let n = vectors.len() as f32;
    for x in &mut sum {
        *x /= n;
    }
    sum
}

/// Check that a provider honoured the batch contract.
pub(crate) fn check_batch(vectors: &[Vec<f32>], expected: usize) -> Result<()> {
    if vectors.len() != expected {
        return Err(Error::Embedding(format!(
            "expected {expected} vectors, got {}",
            vectors.len()
        )));
    }
    if let Some(first) = vectors.first() {
        if vectors.iter().any(|v| v.len() != first.len()) {
            return Err(Error::Embedding("inconsistent embedding dimensions".into()));
        }
    }
    Ok(())
}

/// Embed with `embedder`, or with a [`HashEmbedder`] when there is none or it fails.
///
/// Used where a vector is mandatory (chunk boundaries, coherence) and a
/// lexical shortcut does not exist.
pub fn embed_or_hash(embedder: Option<&dyn Embedder>, texts: &[&str]) -> Vec<Vec<f32>> {
    if let Some(embedder) = embedder {
        match embedder
            .embed(texts)
            .and_then(|v| check_batch(&v, texts.len()).map(|()| v))
        {
            Ok(vectors) => return vectors,
            Err(e) => warn!(provider = embedder.id(), error = %e, "embedding failed, using hash embeddings"),
        }
    }
    HashEmbedder::default().embed_texts(texts)
}

/// An embedder that degrades to hash embeddings instead of failing.
pub struct FallbackEmbedder {
    primary: Arc<dyn Embedder>,
    fallback: HashEmbedder,
    id: String,
}

impl FallbackEmbedder {
    /// Wrap `primary`.
    pub fn new(primary: Arc<dyn Embedder>) -> Self {
        let fallback = HashEmbedder::default();
        let id = format!("{}|{}", primary.id(), fallback.id());
        Self {
            primary,
            fallback,
            id,
        }
    }
}

impl Embedder for FallbackEmbedder {
    fn id(&self) -> &str {
        &self.id
    }

    fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Ok(embed_or_hash(Some(self.primary.as_ref()), texts))
    }
}

impl std::fmt::Debug for FallbackEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackEmbedder")
            .field("primary", &self.primary.id())
            .field("fallback", &self.fallback.id())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// An embedder that always fails.
    pub struct BrokenEmbedder;

    impl Embedder for BrokenEmbedder {
        fn id(&self) -> &str {
            "broken"
        }

        fn embed(&self, _texts: &[&str]) -> Result<Vec<Vec<f32>>> {
            Err(Error::Embedding("offline".into()))
        }
    }
}
