#![allow(clippy::needless_range_loop)]
//! Coverage and overlap tests.
//!
//! Naive windows tile the whole document; semantic chunks are allowed to
//! lose sentences, and the quality report has to say so.

use std::sync::Arc;

use slabscore::embed::{Embedder, HashEmbedder};
use slabscore::quality::ChunkQuality;
use slabscore::tokenize::{count_tokens, token_spans};
use slabscore::{ChunkCapacity, Chunker, FixedChunker, Result, SemanticChunker, Slab};

// =============================================================================
// Coverage: naive chunks cover the entire input
// =============================================================================

/// Check that every byte of the text falls in some chunk.
fn covers_every_byte(slabs: &[Slab], text: &str) -> bool {
    if slabs.is_empty() {
        return text.trim().is_empty();
    }
    let mut covered = vec![false; text.len()];
    for slab in slabs {
        for i in slab.start..slab.end {
            covered[i] = true;
        }
    }
    covered.iter().all(|&c| c)
}

#[test]
fn fixed_chunker_full_coverage() {
    let long = "word ".repeat(300);
    let texts = [
        "Hello, world!",
        "The quick brown fox jumps over the lazy dog.",
        long.as_str(),
        "Short",
        " Leading and trailing spaces ",
        "Multiple\n\nParagraphs\n\nHere",
    ];

    for text in &texts {
        let slabs = FixedChunker::new(50, 10).chunk(text);
        assert!(
            covers_every_byte(&slabs, text),
            "fixed chunker failed coverage for: {:?}",
            &text[..text.len().min(50)]
        );

        let quality = ChunkQuality::measure(text, &slabs, None);
        assert!((quality.coverage_ratio - 1.0).abs() < 1e-9);
    }
}

// =============================================================================
// Overlap
// =============================================================================

#[test]
fn fixed_chunker_shares_exactly_overlap_tokens() {
    let text = "alpha beta gamma delta epsilon zeta eta theta iota kappa lambda mu nu xi";
    let spans = token_spans(text);

    for overlap in [0, 1, 2, 3] {
        let slabs = FixedChunker::new(5, overlap).chunk(text);
        for window in slabs.windows(2) {
            let (first, second) = (&window[0], &window[1]);
            let first_end = first.end_token.unwrap();
            let second_start = second.start_token.unwrap();
            assert_eq!(first_end - second_start, overlap, "overlap {overlap}");

            if overlap > 0 {
                // The shared tokens are literally the same text.
                let shared = &text[spans[second_start].start..spans[first_end - 1].end];
                assert!(first.text.ends_with(shared));
                assert!(second.text.starts_with(shared));
            }
        }
    }
}

#[test]
fn fixed_chunker_reconstructs_from_windows() {
    let text = "One two three. Four five six seven! Eight nine ten eleven twelve?";
    let chunker = FixedChunker::new(6, 2);
    let slabs = chunker.chunk(text);

    // Dropping each window's overlap prefix rebuilds the document.
    let mut rebuilt = String::new();
    let mut covered_to = 0;
    for slab in &slabs {
        let from = covered_to.max(slab.start);
        rebuilt.push_str(&text[from..slab.end]);
        covered_to = slab.end;
    }
    assert_eq!(rebuilt, text);
}

#[test]
fn twenty_sentence_paragraph_chunk_count() {
    let paragraph = (0..20)
        .map(|i| format!("Sentence number {i} talks about the evaluation of chunking."))
        .collect::<Vec<_>>()
        .join(" ");
    let n = count_tokens(&paragraph);
    assert!(n > 50);

    let slabs = FixedChunker::new(50, 10).chunk(&paragraph);
    assert_eq!(slabs.len(), (n - 50).div_ceil(40) + 1);
    assert!(slabs.iter().all(|s| s.token_count <= 50));
}

// =============================================================================
// Semantic chunking is lossy
// =============================================================================

/// Every sentence gets its own direction, so nothing ever merges.
struct Orthogonal;

impl Embedder for Orthogonal {
    fn id(&self) -> &str {
        "orthogonal"
    }

    fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Ok((0..texts.len())
            .map(|i| {
                let mut v = vec![0.0; texts.len()];
                v[i] = 1.0;
                v
            })
            .collect())
    }
}

#[test]
fn semantic_drops_short_isolated_sentences() {
    let text = "Tiny. This sentence is long enough to pass the floor on its own merit. Small.";
    let chunker = SemanticChunker::new(0.5, ChunkCapacity::new(5, 100).unwrap())
        .with_embedder(Arc::new(Orthogonal));
    let slabs = chunker.chunk(text);

    assert_eq!(slabs.len(), 1);
    assert!(slabs[0].text.starts_with("This sentence"));

    let quality = ChunkQuality::measure(text, &slabs, None);
    assert!(quality.coverage_ratio < 1.0);
    assert!(quality.coverage_ratio > 0.5);
}

#[test]
fn semantic_keeps_everything_without_floor() {
    let text = "Tiny. This sentence is long enough. Small.";
    let chunker =
        SemanticChunker::new(0.5, ChunkCapacity::up_to(100)).with_embedder(Arc::new(Orthogonal));
    let slabs = chunker.chunk(text);

    assert_eq!(slabs.len(), 3);
    let quality = ChunkQuality::measure(text, &slabs, None);
    assert!((quality.coverage_ratio - 1.0).abs() < 1e-9);
}

#[test]
fn semantic_merges_identical_topics() {
    let text = "Cats purr softly. Cats purr softly. Cats purr softly.";
    let chunker = SemanticChunker::new(0.9, ChunkCapacity::up_to(100))
        .with_embedder(Arc::new(HashEmbedder::new(128)));
    let slabs = chunker.chunk(text);

    assert_eq!(slabs.len(), 1);
    assert_eq!(slabs[0].sentence_count, 3);
    assert_eq!(slabs[0].token_count, count_tokens(text));
}
