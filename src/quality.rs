//! Chunk-set statistics.
//!
//! | Field | Meaning |
//! |-------|---------|
//! | `chunk_count` | Number of chunks |
//! | `avg_length` | Mean tokens per chunk |
//! | `length_std` | Population std of tokens per chunk |
//! | `avg_coherence` | Mean of per-chunk coherence |
//! | `coherence_std` | Population std of per-chunk coherence |
//! | `coverage_ratio` | Fraction of document tokens inside some chunk |
//!
//! A chunk's coherence is the mean cosine similarity between consecutive
//! sentences inside it. Single-sentence chunks are fully coherent (1.0).

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::embed::{cosine_similarity, embed_or_hash, Embedder};
use crate::tokenize::{split_sentences, token_starts};
use crate::Slab;

/// Statistics describing one chunk set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkQuality {
    /// Number of chunks.
    pub chunk_count: usize,
    /// Mean chunk length in tokens.
    pub avg_length: f64,
    /// Population standard deviation of chunk length.
    pub length_std: f64,
    /// Mean intra-chunk coherence.
    pub avg_coherence: f64,
    /// Population standard deviation of intra-chunk coherence.
    pub coherence_std: f64,
    /// Fraction of document tokens covered by at least one chunk.
    pub coverage_ratio: f64,
}

fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}

fn coherence(chunks: &[Slab], embedder: Option<&dyn Embedder>) -> Vec<f64> {
    let per_chunk: Vec<Vec<String>> = chunks
        .iter()
        .map(|c| split_sentences(&c.text).into_iter().map(|s| s.text).collect())
        .collect();

    // One batch for every multi-sentence chunk.
    let texts: Vec<&str> = per_chunk
        .iter()
        .filter(|s| s.len() >= 2)
        .flatten()
        .map(String::as_str)
        .collect();
    let vectors = if texts.is_empty() {
        Vec::new()
    } else {
        embed_or_hash(embedder, &texts)
    };

    let mut cursor = 0;
    per_chunk
        .iter()
        .map(|sentences| {
            if sentences.len() < 2 {
                return 1.0;
            }
            let chunk_vectors = &vectors[cursor..cursor + sentences.len()];
            cursor += sentences.len();
            let sims: Vec<f64> = chunk_vectors
                .windows(2)
                .map(|w| f64::from(cosine_similarity(&w[0], &w[1])))
                .collect();
            sims.iter().sum::<f64>() / sims.len() as f64
        })
        .collect()
}

fn coverage(document: &str, chunks: &[Slab]) -> f64 {
    let starts = token_starts(document);
    if starts.is_empty() {
        return 0.0;
    }
    let covered = starts
        .iter()
        .filter(|&&t| chunks.iter().any(|c| c.start <= t && t < c.end))
        .count();
    covered as f64 / starts.len() as f64
}

impl ChunkQuality {
    /// Measure `chunks` produced from `document`.
    ///
    /// Sentence embeddings come from `embedder`, or from the hash embedder
    /// when it is absent or fails.
    pub fn measure(document: &str, chunks: &[Slab], embedder: Option<&dyn Embedder>) -> Self {
        if chunks.is_empty() {
            return Self::default();
        }

        let lengths: Vec<f64> = chunks.iter().map(|c| c.token_count as f64).collect();
        let (avg_length, length_std) = mean_std(&lengths);
        let (avg_coherence, coherence_std) = mean_std(&coherence(chunks, embedder));
        let coverage_ratio = coverage(document, chunks);

        debug!(
            chunks = chunks.len(),
            avg_length,
            avg_coherence,
            coverage_ratio,
            "chunk quality"
        );

        Self {
            chunk_count: chunks.len(),
            avg_length,
            length_std,
            avg_coherence,
            coherence_std,
            coverage_ratio,
        }
    }
}
