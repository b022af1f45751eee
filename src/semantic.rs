//! Semantic chunking using embedding similarity.
//!
//! Groups consecutive sentences while they stay on topic and within budget.
//!
//! ## The Idea
//!
//! Sentences about the same topic have similar embeddings. Instead of
//! comparing neighbours pairwise, each candidate sentence is compared with the
//! *centroid* of the chunk being built, so a chunk drifts only as far as its
//! whole content allows.
//!
//! ```text
//! Open chunk:   [S1, S2]          centroid C = mean(E1, E2)
//! Candidate:    S3                sim(C, E3) = 0.82 >= threshold
//!                                 tokens 90 + 40 <= max
//! Open chunk:   [S1, S2, S3]
//! Candidate:    S4                sim(C', E4) = 0.31 < threshold
//!                                 -> close [S1, S2, S3] (emit if >= min)
//! Open chunk:   [S4]
//! ```
//!
//! ## Threshold Selection
//!
//! | Threshold | Effect |
//! |-----------|--------|
//! | 0.0 | Only the token budget splits |
//! | 0.5 | Balanced |
//! | 0.7 | Default; splits on moderate topic shifts |
//! | 1.0 | Only near-identical sentences merge |
//!
//! ## Lossy Minimum
//!
//! A closed chunk below `min` tokens is discarded, not merged forward. Short
//! standalone sentences between topic shifts disappear from the output.
//!
//! ## Performance
//!
//! One batched embedding call for all sentences, then O(n × k × d) for the
//! centroid comparisons, where k is the running chunk length.

use std::sync::Arc;

use tracing::debug;

use crate::embed::{cosine_similarity, embed_or_hash, mean_embedding, Embedder};
use crate::tokenize::{count_tokens, split_sentences, Sentence};
use crate::{ChunkCapacity, Chunker, Error, Result, Slab};

/// Semantic chunker using embedding similarity.
///
/// Without an embedder it runs on deterministic hash embeddings, so it works
/// offline and in tests.
///
/// ## Example
///
/// ```rust
/// use slabscore::{ChunkCapacity, Chunker, SemanticChunker};
///
/// let chunker = SemanticChunker::new(0.3, ChunkCapacity::up_to(100));
/// let text = "Neural networks learn patterns. Neural networks learn features. \
///             Castle walls were built from stone.";
/// let slabs = chunker.chunk(text);
///
/// assert_eq!(slabs.len(), 2);
/// assert_eq!(slabs[0].sentence_count, 2);
/// ```
pub struct SemanticChunker {
    embedder: Option<Arc<dyn Embedder>>,
    threshold: f32,
    capacity: ChunkCapacity,
}

impl SemanticChunker {
    /// Create a new semantic chunker.
    ///
    /// # Arguments
    ///
    /// * `threshold` - Minimum centroid similarity to merge (0.0 to 1.0)
    /// * `capacity` - Token budget per chunk
    ///
    /// # Panics
    ///
    /// Panics if `threshold` is outside `[0, 1]`.
    #[must_use]
    pub fn new(threshold: f32, capacity: ChunkCapacity) -> Self {
        assert!(
            (0.0..=1.0).contains(&threshold),
            "threshold must be within [0, 1]"
        );
        Self {
            embedder: None,
            threshold,
            capacity,
        }
    }

    /// Fallible constructor for untrusted parameters.
    pub fn try_new(threshold: f32, capacity: ChunkCapacity) -> Result<Self> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(Error::InvalidThreshold(threshold));
        }
        Ok(Self::new(threshold, capacity))
    }

    /// Use `embedder` for sentence embeddings.
    #[must_use]
    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Similarity threshold.
    #[must_use]
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Token budget.
    #[must_use]
    pub fn capacity(&self) -> ChunkCapacity {
        self.capacity
    }

    fn emit(sentences: &[Sentence], index: usize) -> Slab {
        let text = sentences
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let start = sentences.first().map(|s| s.start).unwrap_or(0);
        let end = sentences.last().map(|s| s.end).unwrap_or(start);
        Slab::new(text, start, end, index).with_sentence_count(sentences.len())
    }
}

impl Chunker for SemanticChunker {
    fn chunk(&self, text: &str) -> Vec<Slab> {
        let sentences = split_sentences(text);
        if sentences.is_empty() {
            return vec![];
        }

        let texts: Vec<&str> = sentences.iter().map(|s| s.text.as_str()).collect();
        let embeddings = embed_or_hash(self.embedder.as_deref(), &texts);
        let tokens: Vec<usize> = texts.iter().map(|t| count_tokens(t)).collect();

        let mut slabs = Vec::new();
        let mut open = 0..1;
        let mut current_tokens = tokens[0];
        let mut dropped = 0usize;

        for i in 1..sentences.len() {
            let centroid = mean_embedding(&embeddings[open.clone()]);
            let similarity = cosine_similarity(&centroid, &embeddings[i]);

            if similarity >= self.threshold
                && !self.capacity.would_overflow(current_tokens, tokens[i])
            {
                open.end = i + 1;
                current_tokens += tokens[i];
                continue;
            }

            if self.capacity.meets_min(current_tokens) {
                slabs.push(Self::emit(&sentences[open.clone()], slabs.len()));
            } else {
                dropped += open.len();
            }
            open = i..i + 1;
            current_tokens = tokens[i];
        }

        if self.capacity.meets_min(current_tokens) {
            slabs.push(Self::emit(&sentences[open.clone()], slabs.len()));
        } else {
            dropped += open.len();
        }

        debug!(
            sentences = sentences.len(),
            chunks = slabs.len(),
            dropped_sentences = dropped,
            threshold = self.threshold,
            "semantic chunking"
        );
        slabs
    }

    fn estimate_chunks(&self, token_count: usize) -> usize {
        // Chunks tend to land halfway between the two bounds.
        let typical = (self.capacity.min() + self.capacity.max()) / 2;
        (token_count / typical.max(1)).max(1)
    }
}

impl std::fmt::Debug for SemanticChunker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SemanticChunker")
            .field("embedder", &self.embedder.as_ref().map(|e| e.id()))
            .field("threshold", &self.threshold)
            .field("capacity", &self.capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::testing::BrokenEmbedder;

    /// Embeds by topic keyword so similarities are exact.
    struct TopicEmbedder;

    impl Embedder for TopicEmbedder {
        fn id(&self) -> &str {
            "topic"
        }

        fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    if t.contains("cat") {
                        vec![1.0, 0.0]
                    } else {
                        vec![0.0, 1.0]
                    }
                })
                .collect())
        }
    }

    fn topic_chunker(threshold: f32, capacity: ChunkCapacity) -> SemanticChunker {
        SemanticChunker::new(threshold, capacity).with_embedder(Arc::new(TopicEmbedder))
    }

    #[test]
    fn test_splits_on_topic_change() {
        let text = "The cat sleeps. A cat purrs. Rain falls today. Rain is wet.";
        let slabs = topic_chunker(0.5, ChunkCapacity::up_to(100)).chunk(text);

        assert_eq!(slabs.len(), 2);
        assert_eq!(slabs[0].text, "The cat sleeps. A cat purrs.");
        assert_eq!(slabs[1].text, "Rain falls today. Rain is wet.");
        assert_eq!(slabs[1].index, 1);
        assert_eq!(slabs[0].sentence_count, 2);
    }

    #[test]
    fn test_max_tokens_forces_split() {
        // Each sentence is 4 tokens ("The cat sleeps ." style).
        let text = "One cat here. Two cat here. Three cat here.";
        let slabs = topic_chunker(0.0, ChunkCapacity::up_to(8)).chunk(text);
        assert_eq!(slabs.len(), 2);
        assert!(slabs.iter().all(|s| s.token_count <= 8));
    }

    #[test]
    fn test_undersized_chunks_dropped() {
        // "Rain." is 2 tokens, below min: it vanishes.
        let text = "The cat sleeps on the mat. Rain. The cat purrs on the mat.";
        let slabs = topic_chunker(0.5, ChunkCapacity::new(3, 100).unwrap()).chunk(text);
        assert_eq!(slabs.len(), 2);
        assert!(slabs.iter().all(|s| !s.text.contains("Rain")));
    }

    #[test]
    fn test_trailing_chunk_below_min_dropped() {
        let text = "The cat sleeps on the mat today. Rain.";
        let slabs = topic_chunker(0.5, ChunkCapacity::new(3, 100).unwrap()).chunk(text);
        assert_eq!(slabs.len(), 1);
        assert!(slabs[0].text.contains("cat"));
    }

    #[test]
    fn test_token_count_matches_text() {
        let text = "The cat sleeps. A cat purrs. Rain falls today.";
        for slab in topic_chunker(0.5, ChunkCapacity::up_to(100)).chunk(text) {
            assert_eq!(slab.token_count, count_tokens(&slab.text));
        }
    }

    #[test]
    fn test_threshold_one_isolates_distinct_sentences() {
        let text = "Quantum qubits entangle. Medieval castles had moats. \
                    Bread needs yeast. Rivers reach oceans.";
        let slabs = SemanticChunker::new(1.0, ChunkCapacity::up_to(100)).chunk(text);
        assert_eq!(slabs.len(), 4);
    }

    #[test]
    fn test_threshold_zero_merges_everything_within_budget() {
        let text = "Quantum qubits entangle. Medieval castles had moats. \
                    Bread needs yeast. Rivers reach oceans.";
        let slabs = SemanticChunker::new(0.0, ChunkCapacity::up_to(100)).chunk(text);
        assert_eq!(slabs.len(), 1);
        assert_eq!(slabs[0].sentence_count, 4);
    }

    #[test]
    fn test_broken_embedder_falls_back() {
        let text = "Quantum qubits entangle. Medieval castles had moats.";
        let with_broken = SemanticChunker::new(0.7, ChunkCapacity::up_to(100))
            .with_embedder(Arc::new(BrokenEmbedder))
            .chunk(text);
        let offline = SemanticChunker::new(0.7, ChunkCapacity::up_to(100)).chunk(text);
        assert_eq!(with_broken, offline);
    }

    #[test]
    fn test_empty_text() {
        let chunker = SemanticChunker::new(0.5, ChunkCapacity::default());
        assert!(chunker.chunk("").is_empty());
        assert!(chunker.chunk("   ").is_empty());
    }

    #[test]
    fn test_try_new_rejects_threshold() {
        assert!(matches!(
            SemanticChunker::try_new(1.5, ChunkCapacity::default()),
            Err(Error::InvalidThreshold(_))
        ));
    }
}
