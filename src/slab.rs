//! The Slab type: a chunk of text with position and size metadata.

use serde::{Deserialize, Serialize};

/// A chunk of text produced by a [`Chunker`](crate::Chunker).
///
/// The name "slab" evokes a physical slice of material. Each slab is a
/// self-contained piece that can be embedded, retrieved and scored
/// independently.
///
/// ## Offsets
///
/// `start` and `end` are byte offsets into the original document. For naive
/// chunks the text is exactly `&document[start..end]`. Semantic chunks join
/// their sentences with single spaces, so their text can differ from the
/// source slice in whitespace; the span still brackets the sentences used.
///
/// ```rust
/// use slabscore::Slab;
///
/// let text = "Hello, world!";
/// let slab = Slab::new("world", 7, 12, 0);
///
/// assert_eq!(&text[slab.start..slab.end], "world");
/// assert_eq!(slab.token_count, 1);
/// ```
///
/// ## Token windows
///
/// Naive chunks also carry `start_token`/`end_token`, the half-open window
/// of document tokens they were decoded from. Adjacent naive slabs overlap
/// by exactly the configured number of tokens:
///
/// ```text
/// size = 4, overlap = 1
/// Slab 0: tokens [0..4)
/// Slab 1: tokens [3..7)   <- token 3 is shared
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slab {
    /// The chunk text.
    pub text: String,
    /// Zero-based index of this chunk in the sequence.
    pub index: usize,
    /// Number of tokens in `text`.
    pub token_count: usize,
    /// Number of sentences the chunk was assembled from.
    pub sentence_count: usize,
    /// First document token in this chunk (naive chunks only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_token: Option<usize>,
    /// One past the last document token in this chunk (naive chunks only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_token: Option<usize>,
    /// Byte offset where this chunk starts in the original document.
    pub start: usize,
    /// Byte offset where this chunk ends (exclusive) in the original document.
    pub end: usize,
}

impl Slab {
    /// Create a new slab, measuring tokens and sentences from the text.
    #[must_use]
    pub fn new(text: impl Into<String>, start: usize, end: usize, index: usize) -> Self {
        let text = text.into();
        let token_count = crate::tokenize::count_tokens(&text);
        let sentence_count = crate::tokenize::split_sentences(&text).len();
        Self {
            text,
            index,
            token_count,
            sentence_count,
            start_token: None,
            end_token: None,
            start,
            end,
        }
    }

    /// Attach the token window this slab was decoded from.
    #[must_use]
    pub fn with_token_window(mut self, start_token: usize, end_token: usize) -> Self {
        self.start_token = Some(start_token);
        self.end_token = Some(end_token);
        self
    }

    /// Override the sentence count (the semantic chunker knows it exactly).
    #[must_use]
    pub fn with_sentence_count(mut self, sentence_count: usize) -> Self {
        self.sentence_count = sentence_count;
        self
    }

    /// The length of this chunk in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.text.len()
    }

    /// Whether this chunk is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// The byte span of this chunk in the original document.
    #[must_use]
    pub fn span(&self) -> std::ops::Range<usize> {
        self.start..self.end
    }
}

impl std::fmt::Display for Slab {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Slab {{ index: {}, span: {}..{}, tokens: {}, sentences: {} }}",
            self.index,
            self.start,
            self.end,
            self.token_count,
            self.sentence_count
        )
    }
}
