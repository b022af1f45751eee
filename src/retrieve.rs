//! Top-k chunk retrieval for a question.
//!
//! With an embedder, chunks are ranked by cosine similarity to the question.
//! Without one (or when the call fails) they are ranked by how many distinct
//! question words they share. Ties always keep chunk order.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::embed::{check_batch, cosine_similarity, Embedder};

fn word_set(text: &str) -> HashSet<String> {
    text.split_whitespace().map(str::to_lowercase).collect()
}

fn top_k<S: AsRef<str>, K: PartialOrd + Copy>(chunks: &[S], scores: &[K], top_k: usize) -> Vec<String> {
    let mut order: Vec<usize> = (0..chunks.len()).collect();
    // Stable: equal scores keep chunk order.
    order.sort_by(|&a, &b| {
        scores[b]
            .partial_cmp(&scores[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    order
        .into_iter()
        .take(top_k)
        .map(|i| chunks[i].as_ref().to_string())
        .collect()
}

/// Count of distinct question words each chunk contains.
pub fn lexical_scores<S: AsRef<str>>(question: &str, chunks: &[S]) -> Vec<usize> {
    let query = word_set(question);
    chunks
        .iter()
        .map(|c| word_set(c.as_ref()).intersection(&query).count())
        .collect()
}

/// Chunks with their embeddings, computed once and shared across questions.
///
/// If the chunk batch cannot be embedded the index ranks by word overlap
/// for every question.
pub struct ChunkIndex<'a, S> {
    chunks: &'a [S],
    embedder: Option<&'a dyn Embedder>,
    vectors: Option<Vec<Vec<f32>>>,
}

impl<'a, S: AsRef<str>> ChunkIndex<'a, S> {
    /// Embed `chunks` with `embedder`, if any.
    pub fn build(chunks: &'a [S], embedder: Option<&'a dyn Embedder>) -> Self {
        let vectors = match embedder {
            Some(embedder) if !chunks.is_empty() => {
                let texts: Vec<&str> = chunks.iter().map(AsRef::as_ref).collect();
                let embedded = embedder
                    .embed(&texts)
                    .and_then(|vectors| check_batch(&vectors, texts.len()).map(|()| vectors));
                match embedded {
                    Ok(vectors) => Some(vectors),
                    Err(e) => {
                        warn!(provider = embedder.id(), error = %e, "chunk embedding failed, using word overlap");
                        None
                    }
                }
            }
            _ => None,
        };
        Self {
            chunks,
            embedder,
            vectors,
        }
    }

    /// Number of indexed chunks.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// True when there is nothing to retrieve.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Whether questions are ranked by embedding similarity.
    pub fn is_embedded(&self) -> bool {
        self.vectors.is_some()
    }

    /// Return the `top_k_count` chunks most relevant to `question`, best first.
    pub fn retrieve(&self, question: &str, top_k_count: usize) -> Vec<String> {
        if self.chunks.is_empty() || top_k_count == 0 {
            return Vec::new();
        }

        if let (Some(embedder), Some(vectors)) = (self.embedder, &self.vectors) {
            match question_scores(embedder, question, vectors) {
                Ok(scores) => {
                    debug!(chunks = self.chunks.len(), top_k = top_k_count, "embedding retrieval");
                    return top_k(self.chunks, &scores, top_k_count);
                }
                Err(e) => {
                    warn!(provider = embedder.id(), error = %e, "question embedding failed, using word overlap");
                }
            }
        }

        top_k(
            self.chunks,
            &lexical_scores(question, self.chunks),
            top_k_count,
        )
    }
}

fn question_scores(
    embedder: &dyn Embedder,
    question: &str,
    chunk_vectors: &[Vec<f32>],
) -> crate::Result<Vec<f32>> {
    let vectors = embedder.embed(&[question])?;
    check_batch(&vectors, 1)?;
    let query = &vectors[0];
    if chunk_vectors.first().is_some_and(|v| v.len() != query.len()) {
        return Err(crate::Error::Embedding(
            "question and chunk dimensions differ".into(),
        ));
    }
    Ok(chunk_vectors
        .iter()
        .map(|v| cosine_similarity(query, v))
        .collect())
}

/// Return the `top_k` chunks most relevant to `question`, best first.
///
/// Embeds every chunk on each call; build a [`ChunkIndex`] to rank many
/// questions against the same chunks.
///
/// ```rust
/// use slabscore::retrieve::retrieve;
///
/// let chunks = ["Bread needs yeast.", "Qubits can be entangled.", "Rivers flow."];
/// let hits = retrieve("how are qubits entangled", &chunks, 1, None);
/// assert_eq!(hits, vec!["Qubits can be entangled.".to_string()]);
/// ```
pub fn retrieve<S: AsRef<str>>(
    question: &str,
    chunks: &[S],
    top_k_count: usize,
    embedder: Option<&dyn Embedder>,
) -> Vec<String> {
    if chunks.is_empty() || top_k_count == 0 {
        return Vec::new();
    }
    ChunkIndex::build(chunks, embedder).retrieve(question, top_k_count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::embed::testing::BrokenEmbedder;
    use crate::embed::HashEmbedder;

    /// Hash embedder that counts how many texts it was asked to embed.
    struct Counting {
        inner: HashEmbedder,
        texts: AtomicUsize,
    }

    impl Counting {
        fn new() -> Self {
            Self {
                inner: HashEmbedder::default(),
                texts: AtomicUsize::new(0),
            }
        }
    }

    impl Embedder for Counting {
        fn id(&self) -> &str {
            "counting"
        }

        fn embed(&self, texts: &[&str]) -> crate::Result<Vec<Vec<f32>>> {
            self.texts.fetch_add(texts.len(), Ordering::SeqCst);
            self.inner.embed(texts)
        }
    }

    /// Embeds the chunks once, then refuses everything.
    struct ChunksOnly(AtomicUsize);

    impl Embedder for ChunksOnly {
        fn id(&self) -> &str {
            "chunks-only"
        }

        fn embed(&self, texts: &[&str]) -> crate::Result<Vec<Vec<f32>>> {
            if self.0.fetch_add(1, Ordering::SeqCst) == 0 {
                HashEmbedder::default().embed(texts)
            } else {
                Err(crate::Error::Embedding("quota exhausted".into()))
            }
        }
    }

    #[test]
    fn test_empty_chunks() {
        let chunks: [&str; 0] = [];
        assert!(retrieve("anything", &chunks, 2, None).is_empty());
    }

    #[test]
    fn test_lexical_ranking() {
        let chunks = [
            "rivers flow to the sea",
            "neural networks learn from data",
            "networks of rivers",
        ];
        let hits = retrieve("How do neural networks learn", &chunks, 2, None);
        assert_eq!(hits[0], "neural networks learn from data");
        assert_eq!(hits[1], "networks of rivers");
    }

    #[test]
    fn test_ties_keep_chunk_order() {
        let chunks = ["alpha one", "beta two", "gamma three"];
        let hits = retrieve("nothing shared", &chunks, 3, None);
        assert_eq!(hits, vec!["alpha one", "beta two", "gamma three"]);
    }

    #[test]
    fn test_case_insensitive_overlap() {
        assert_eq!(lexical_scores("Gradient DESCENT", &["gradient descent works"]), vec![2]);
    }

    #[test]
    fn test_top_k_larger_than_chunks() {
        let chunks = ["a", "b"];
        assert_eq!(retrieve("a", &chunks, 5, None).len(), 2);
    }

    #[test]
    fn test_embedding_ranking() {
        let embedder = HashEmbedder::default();
        let chunks = [
            "medieval castles had stone walls",
            "quantum computers use qubits",
        ];
        let hits = retrieve("quantum qubits", &chunks, 1, Some(&embedder as &dyn Embedder));
        assert_eq!(hits, vec!["quantum computers use qubits"]);
    }

    #[test]
    fn test_broken_embedder_uses_overlap() {
        let chunks = ["bread needs yeast", "qubits entangle"];
        let broken = retrieve("qubits", &chunks, 1, Some(&BrokenEmbedder as &dyn Embedder));
        assert_eq!(broken, retrieve("qubits", &chunks, 1, None));
    }

    #[test]
    fn test_index_embeds_chunks_once() {
        let chunks = [
            "medieval castles had stone walls",
            "quantum computers use qubits",
            "rivers carry sediment to the sea",
            "bread dough needs yeast to rise",
        ];
        let questions = ["quantum qubits", "stone castles", "what do rivers carry"];
        let counting = Counting::new();

        let index = ChunkIndex::build(&chunks, Some(&counting as &dyn Embedder));
        assert!(index.is_embedded());
        assert_eq!(counting.texts.load(Ordering::SeqCst), chunks.len());

        let reference = HashEmbedder::default();
        for question in questions {
            assert_eq!(
                index.retrieve(question, 2),
                retrieve(question, &chunks, 2, Some(&reference as &dyn Embedder))
            );
        }
        // One text per question on top of the single chunk batch.
        assert_eq!(
            counting.texts.load(Ordering::SeqCst),
            chunks.len() + questions.len()
        );
    }

    #[test]
    fn test_index_without_embedder_is_lexical() {
        let chunks = ["rivers flow to the sea", "neural networks learn from data"];
        let index = ChunkIndex::build(&chunks, None);
        assert!(!index.is_embedded());
        assert_eq!(index.len(), 2);
        assert_eq!(
            index.retrieve("neural networks", 1),
            vec!["neural networks learn from data"]
        );
        assert!(index.retrieve("neural networks", 0).is_empty());
    }

    #[test]
    fn test_index_broken_chunk_batch_uses_overlap() {
        let chunks = ["bread needs yeast", "qubits entangle"];
        let index = ChunkIndex::build(&chunks, Some(&BrokenEmbedder as &dyn Embedder));
        assert!(!index.is_embedded());
        assert_eq!(index.retrieve("qubits", 1), retrieve("qubits", &chunks, 1, None));
    }

    #[test]
    fn test_index_failed_question_uses_overlap() {
        let chunks = ["bread needs yeast", "qubits entangle"];
        let embedder = ChunksOnly(AtomicUsize::new(0));
        let index = ChunkIndex::build(&chunks, Some(&embedder as &dyn Embedder));
        assert!(index.is_embedded());
        assert_eq!(index.retrieve("qubits", 1), vec!["qubits entangle"]);
    }
}
