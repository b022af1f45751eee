//! # slabscore
//!
//! Does semantic chunking actually beat fixed windows for *your* document?
//!
//! ## The Problem
//!
//! Retrieval-augmented generation splits documents into chunks, embeds
//! them, and hands the best matches to a language model. How the document is
//! cut decides what the model gets to see. Two common answers:
//!
//! - **Naive**: fixed windows of N tokens with M tokens of overlap. Cheap,
//!   predictable, blind to sentence and topic boundaries.
//! - **Semantic**: group consecutive sentences while they stay on topic.
//!   Coherent, but lossy and sensitive to the similarity threshold.
//!
//! Which one retrieves better depends on the content. slabscore chunks a
//! document both ways, runs the same questions through retrieval and answer
//! synthesis for each, scores the results with RAGAS-style metrics, and
//! compares the two.
//!
//! ## Pipeline
//!
//! ```text
//! document ──┬── FixedChunker ──────┐
//!            └── SemanticChunker ───┤
//!                                   ├── ChunkQuality (length, coherence, coverage)
//!                                   └── retrieve → answer → RagasEngine
//!                                                              │
//!                                          compare ◄───────────┘
//!                                             │
//!                          improvements, t-tests, recommendation
//! ```
//!
//! ## Chunking Strategies
//!
//! ### Fixed Size (Baseline)
//!
//! ```text
//! Tokens: 10, Size: 4, Overlap: 1
//!
//! Chunk 0: tokens [0..4)
//! Chunk 1: tokens [3..7)    <- token 3 shared
//! Chunk 2: tokens [6..10)   <- reaches the end, stop
//! ```
//!
//! ### Semantic (Embedding-Based)
//!
//! Embed each sentence. Compare each sentence with the centroid of the chunk
//! being built; merge while similarity stays above the threshold and the
//! chunk stays under `max` tokens. Closed chunks under `min` tokens are
//! dropped.
//!
//! ## Metrics
//!
//! | Metric | Question it answers |
//! |--------|---------------------|
//! | faithfulness | Is the answer backed by the retrieved text? |
//! | answer_relevancy | Does the answer address the question? |
//! | context_precision | Are relevant chunks ranked first? |
//! | context_recall | Does the context contain the ground truth? |
//! | answer_correctness | Does the answer match the ground truth? |
//!
//! All five run without a judge model: lexical heuristics, optionally
//! sharpened by embeddings.
//!
//! ## Quick Start
//!
//! ```rust
//! use slabscore::{Chunker, ChunkCapacity, FixedChunker, SemanticChunker};
//!
//! let text = "The quick brown fox jumps over the lazy dog. \
//!             Pack my box with five dozen liquor jugs.";
//!
//! // Fixed size: 8-token windows, 2 tokens of overlap
//! let naive = FixedChunker::new(8, 2).chunk(text);
//!
//! // Semantic: threshold 0.5, at most 50 tokens per chunk
//! let semantic = SemanticChunker::new(0.5, ChunkCapacity::up_to(50)).chunk(text);
//!
//! assert!(naive.len() >= semantic.len());
//! ```
//!
//! ## Full Evaluation
//!
//! ```rust
//! use slabscore::config::EvalConfig;
//! use slabscore::document::Document;
//! use slabscore::pipeline::{EvaluationRequest, Evaluator, Providers};
//!
//! let evaluator = Evaluator::new(EvalConfig::default(), Providers::offline());
//! let report = evaluator.run(&EvaluationRequest::new(Document::sample()))?;
//! println!("{}", report.comparison.summary.recommendation);
//! # Ok::<(), slabscore::Error>(())
//! ```
//!
//! ## Providers
//!
//! Embedding and generation backends are chosen once per run and passed
//! down (see [`pipeline::Providers`]). With none configured everything runs
//! offline and deterministically.
//!
//! | Feature | Adds |
//! |---------|------|
//! | `local` | fastembed ONNX sentence encoder |
//! | `openai` | OpenAI-compatible embeddings and chat completions |
//!
//! ## Performance Considerations
//!
//! | Stage | Cost |
//! |-------|------|
//! | Fixed | O(n) |
//! | Semantic | O(s × k × d) after one embedding batch |
//! | Retrieval | one embedding batch per question, or O(c × w) lexical |
//! | Metrics | O(q × context length) |
//!
//! Where n = tokens, s = sentences, k = running chunk length,
//! d = embedding dimension, c = chunks, w = words per chunk, q = questions.

mod capacity;
mod error;
mod fixed;
mod semantic;
mod slab;

pub mod compare;
pub mod config;
pub mod document;
pub mod embed;
pub mod generate;
#[cfg(feature = "openai")]
pub mod openai;
pub mod pipeline;
pub mod quality;
pub mod ragas;
pub mod retrieve;
pub mod tokenize;

pub use capacity::ChunkCapacity;
pub use error::{Error, ErrorKind, ErrorResponse, Result};
pub use fixed::FixedChunker;
pub use semantic::SemanticChunker;
pub use slab::Slab;

/// A text chunking strategy.
///
/// Both strategies implement this trait, so the evaluation treats them
/// uniformly:
///
/// ```rust
/// use slabscore::{Chunker, ChunkCapacity, FixedChunker, SemanticChunker};
///
/// fn chunk_document(chunker: &dyn Chunker, text: &str) -> Vec<slabscore::Slab> {
///     chunker.chunk(text)
/// }
///
/// let fixed = FixedChunker::new(100, 20);
/// let semantic = SemanticChunker::new(0.7, ChunkCapacity::up_to(100));
///
/// let text = "Hello world. This is a test.";
/// let slabs1 = chunk_document(&fixed, text);
/// let slabs2 = chunk_document(&semantic, text);
/// ```
pub trait Chunker: Send + Sync {
    /// Split text into chunks.
    ///
    /// Each chunk is a [`Slab`] containing the text and its byte offsets
    /// in the original document.
    fn chunk(&self, text: &str) -> Vec<Slab>;

    /// Estimate the number of chunks for a document of `token_count` tokens.
    ///
    /// Useful for pre-allocation. May be approximate.
    fn estimate_chunks(&self, token_count: usize) -> usize {
        // Conservative default
        (token_count / 100).max(1)
    }
}
