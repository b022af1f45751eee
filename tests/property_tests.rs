//! Property-based tests for chunking and scoring.
//!
//! These tests verify the invariants the evaluation relies on:
//! - Ordered: chunks are in source order
//! - Bounds: chunk offsets are valid and text matches the source slice
//! - Windows: fixed windows step by `size - overlap` and reach the end
//! - Budgets: semantic chunks respect the token floor and ceiling
//! - Thresholds: a stricter semantic threshold never grows chunks
//! - Ranges: every metric lands in [0, 1]

use std::sync::Arc;

use proptest::prelude::*;
use slabscore::embed::HashEmbedder;
use slabscore::quality::ChunkQuality;
use slabscore::ragas::RagasEngine;
use slabscore::tokenize::count_tokens;
use slabscore::{ChunkCapacity, Chunker, FixedChunker, SemanticChunker, Slab};

// =============================================================================
// Test Generators
// =============================================================================

/// Generate a non-empty string for chunking
fn arbitrary_text() -> impl Strategy<Value = String> {
    prop::string::string_regex(".{10,500}")
        .unwrap()
        .prop_filter("non-empty", |s| !s.is_empty())
}

/// Generate text with sentence-like structure
fn sentence_like_text() -> impl Strategy<Value = String> {
    prop::collection::vec(prop::string::string_regex("[A-Za-z]{2,15}").unwrap(), 3..80).prop_map(
        |words| {
            let mut result = String::new();
            for (i, word) in words.iter().enumerate() {
                result.push_str(word);
                if i % 5 == 4 {
                    result.push_str(". ");
                } else {
                    result.push(' ');
                }
            }
            result
        },
    )
}

/// Sentences that each repeat one topic word ("ember ember ember.").
///
/// Every sentence hashes to a single bucket, so two sentences are either
/// identical or orthogonal under the hash embedder.
fn topic_runs_text() -> impl Strategy<Value = String> {
    const TOPICS: [&str; 5] = ["ember", "quartz", "falcon", "meadow", "violin"];
    prop::collection::vec((0..TOPICS.len(), 1usize..6), 2..40).prop_map(|sentences| {
        sentences
            .iter()
            .map(|&(topic, repeat)| format!("{}.", vec![TOPICS[topic]; repeat].join(" ")))
            .collect::<Vec<_>>()
            .join(" ")
    })
}

// =============================================================================
// Invariant Helpers
// =============================================================================

/// Check that chunks are in order
fn chunks_ordered(slabs: &[Slab]) -> bool {
    slabs.windows(2).all(|w| w[0].start <= w[1].start)
}

/// Check that chunk bounds are valid
fn chunk_bounds_valid(slabs: &[Slab], text: &str) -> bool {
    slabs
        .iter()
        .all(|s| s.start <= s.end && s.end <= text.len() && text.is_char_boundary(s.start))
}

/// Check that chunk text matches the source
fn chunk_text_matches(slabs: &[Slab], text: &str) -> bool {
    slabs.iter().all(|s| s.text == text[s.start..s.end])
}

fn avg_tokens(slabs: &[Slab]) -> f64 {
    if slabs.is_empty() {
        return 0.0;
    }
    slabs.iter().map(|s| s.token_count as f64).sum::<f64>() / slabs.len() as f64
}

fn in_unit_range(x: f64) -> bool {
    (0.0..=1.0).contains(&x)
}

// =============================================================================
// FixedChunker Tests
// =============================================================================

proptest! {
    #[test]
    fn fixed_chunks_ordered(text in arbitrary_text()) {
        let slabs = FixedChunker::new(50, 10).chunk(&text);
        prop_assert!(chunks_ordered(&slabs));
    }

    #[test]
    fn fixed_bounds_valid(text in arbitrary_text()) {
        let slabs = FixedChunker::new(50, 10).chunk(&text);
        prop_assert!(chunk_bounds_valid(&slabs, &text));
    }

    #[test]
    fn fixed_text_matches(text in arbitrary_text()) {
        let slabs = FixedChunker::new(50, 10).chunk(&text);
        prop_assert!(chunk_text_matches(&slabs, &text));
    }

    #[test]
    fn fixed_windows_step_and_reach_end(
        text in sentence_like_text(),
        size in 2usize..60,
        overlap in 0usize..20
    ) {
        let overlap = overlap.min(size - 1);
        let chunker = FixedChunker::new(size, overlap);
        let slabs = chunker.chunk(&text);
        let n = count_tokens(&text);

        prop_assert_eq!(slabs.len(), chunker.estimate_chunks(n));
        for (i, slab) in slabs.iter().enumerate() {
            prop_assert_eq!(slab.index, i);
            prop_assert_eq!(slab.start_token, Some(i * (size - overlap)));
            prop_assert!(slab.token_count <= size);
            prop_assert_eq!(slab.token_count, count_tokens(&slab.text));
        }
        prop_assert_eq!(slabs.last().and_then(|s| s.end_token), Some(n));
    }

    #[test]
    fn fixed_covers_whole_text(text in sentence_like_text()) {
        let slabs = FixedChunker::new(7, 2).chunk(&text);
        prop_assert_eq!(slabs.first().map(|s| s.start), Some(0));
        prop_assert_eq!(slabs.last().map(|s| s.end), Some(text.len()));
    }
}

// =============================================================================
// SemanticChunker Tests
// =============================================================================

proptest! {
    #[test]
    fn semantic_chunks_ordered(text in sentence_like_text(), threshold in 0.0f32..1.0) {
        let slabs = SemanticChunker::new(threshold, ChunkCapacity::up_to(40)).chunk(&text);
        prop_assert!(chunks_ordered(&slabs));
        prop_assert!(chunk_bounds_valid(&slabs, &text));
    }

    #[test]
    fn semantic_respects_token_budget(
        text in sentence_like_text(),
        threshold in 0.0f32..1.0,
        min in 0usize..10
    ) {
        let capacity = ChunkCapacity::new(min, 20).unwrap();
        let slabs = SemanticChunker::new(threshold, capacity).chunk(&text);
        for slab in &slabs {
            prop_assert!(slab.token_count >= min);
            // A lone sentence longer than the ceiling is kept whole.
            prop_assert!(slab.token_count <= 20 || slab.sentence_count == 1);
        }
    }

    #[test]
    fn semantic_never_adds_tokens(text in sentence_like_text()) {
        let embedder = Arc::new(HashEmbedder::new(64));
        let slabs = SemanticChunker::new(0.3, ChunkCapacity::new(5, 30).unwrap())
            .with_embedder(embedder)
            .chunk(&text);
        let total: usize = slabs.iter().map(|s| s.token_count).sum();
        prop_assert!(total <= count_tokens(&text));
    }
}

proptest! {
    #[test]
    fn semantic_higher_threshold_never_grows_chunks(
        text in topic_runs_text(),
        a in 0.0f32..=1.0,
        b in 0.0f32..=1.0
    ) {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        let capacity = ChunkCapacity::new(1, 20).unwrap();
        let chunk_at = |threshold: f32| {
            SemanticChunker::new(threshold, capacity)
                .with_embedder(Arc::new(HashEmbedder::new(64)))
                .chunk(&text)
        };

        let loose = chunk_at(low);
        let strict = chunk_at(high);
        prop_assert!(
            avg_tokens(&strict) <= avg_tokens(&loose) + 1e-9,
            "threshold {} -> {:.2}, threshold {} -> {:.2}",
            low,
            avg_tokens(&loose),
            high,
            avg_tokens(&strict)
        );
        // Nothing falls under the floor, so both sets hold every token.
        let total = |slabs: &[Slab]| slabs.iter().map(|s| s.token_count).sum::<usize>();
        prop_assert_eq!(total(&loose), count_tokens(&text));
        prop_assert_eq!(total(&strict), count_tokens(&text));
    }
}

// =============================================================================
// Metric Ranges
// =============================================================================

proptest! {
    #[test]
    fn quality_ratios_in_range(text in sentence_like_text()) {
        let slabs = FixedChunker::new(10, 3).chunk(&text);
        let quality = ChunkQuality::measure(&text, &slabs, None);
        prop_assert!(in_unit_range(quality.coverage_ratio));
        prop_assert!(quality.avg_coherence >= -1.0 && quality.avg_coherence <= 1.0);
        prop_assert!(quality.length_std >= 0.0);
    }

    #[test]
    fn ragas_metrics_in_range(
        question in "[a-z ]{0,60}",
        answer in "[A-Za-z .]{0,120}",
        context in "[A-Za-z .]{0,200}",
        ground_truth in "[A-Za-z .]{0,120}"
    ) {
        let engine = RagasEngine::new();
        let scores = engine.score_question(&question, &answer, &[context], &ground_truth);
        prop_assert!(in_unit_range(scores.faithfulness));
        prop_assert!(in_unit_range(scores.answer_relevancy));
        prop_assert!(in_unit_range(scores.context_precision));
        prop_assert!(in_unit_range(scores.context_recall));
        prop_assert!(in_unit_range(scores.answer_correctness));
        prop_assert!(in_unit_range(scores.ragas_score()));
    }
}

// =============================================================================
// Edge Cases
// =============================================================================

#[test]
fn empty_input_produces_empty_output() {
    assert!(FixedChunker::new(50, 10).chunk("").is_empty());
    assert!(FixedChunker::new(50, 10).chunk("   \n ").is_empty());
    assert!(SemanticChunker::new(0.7, ChunkCapacity::up_to(100)).chunk("").is_empty());
}

#[test]
fn single_word_input() {
    let text = "hello";

    let slabs = FixedChunker::new(50, 10).chunk(text);
    assert_eq!(slabs.len(), 1);
    assert_eq!(slabs[0].text, text);

    let slabs = SemanticChunker::new(0.7, ChunkCapacity::up_to(100)).chunk(text);
    assert_eq!(slabs.len(), 1);
}

#[test]
fn unicode_handling() {
    let text = "Hello 世界! Привет мир! مرحبا بالعالم";

    let slabs = FixedChunker::new(4, 1).chunk(text);
    assert!(slabs.len() > 1);
    for slab in &slabs {
        assert_eq!(&text[slab.start..slab.end], slab.text);
    }
}

// =============================================================================
// Consistency Tests
// =============================================================================

#[test]
fn chunking_is_deterministic() {
    let text = "The quick brown fox jumps over the lazy dog. Pack my box.";

    let fixed = FixedChunker::new(5, 2);
    assert_eq!(fixed.chunk(text), fixed.chunk(text));

    let semantic = SemanticChunker::new(0.2, ChunkCapacity::up_to(30));
    assert_eq!(semantic.chunk(text), semantic.chunk(text));
}
