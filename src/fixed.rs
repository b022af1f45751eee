//! Fixed-size token chunking with overlap (the "naive" strategy).
//!
//! ## How It Works
//!
//! ```text
//! size = 5, overlap = 2, step = 3
//!
//! Tokens:  t0 t1 t2 t3 t4 t5 t6 t7 t8 t9 t10
//!
//! Chunk 0: t0 t1 t2 t3 t4        [0..5)
//! Chunk 1:          t3 t4 t5 t6 t7        [3..8)   <- starts at 5 - 2 = 3
//! Chunk 2:                   t6 t7 t8 t9 t10   [6..11)  <- reaches the end, stop
//! ```
//!
//! The final window is emitted even when it is shorter than `size`. A window
//! that would start after the previous one already reached the last token is
//! not emitted: it would hold nothing but overlap. For a document of `n`
//! tokens with `n > size` that gives `ceil((n - size) / step) + 1` chunks.
//!
//! ## Overlap and Retrieval
//!
//! A window boundary can land in the middle of the one sentence a question
//! needs. Overlap repeats the tail of each window at the head of the next,
//! so a fact cut at a boundary still appears whole in one of them:
//!
//! ```text
//! "The learning rate controls the step size"
//! overlap 0: [".. learning rate"] ["controls the step size .."]
//! overlap 3: [".. learning rate"] ["learning rate controls the step size .."]
//! ```
//!
//! The evaluation defaults to `size = 400, overlap = 50`.

use tracing::debug;

use crate::tokenize::{decode, token_spans};
use crate::{Chunker, Error, Result, Slab};

/// Fixed-size token chunker with configurable overlap.
///
/// ## Example
///
/// ```rust
/// use slabscore::{Chunker, FixedChunker};
///
/// let chunker = FixedChunker::new(4, 1);
/// let slabs = chunker.chunk("a b c d e f g h");
///
/// assert_eq!(slabs.len(), 3);
/// assert_eq!(slabs[0].text, "a b c d ");
/// assert_eq!(slabs[1].start_token, Some(3)); // 4 - 1 overlap
/// assert_eq!(slabs[2].text, "g h");
/// ```
#[derive(Debug, Clone)]
pub struct FixedChunker {
    size: usize,
    overlap: usize,
}

impl FixedChunker {
    /// Create a new fixed-size chunker.
    ///
    /// # Arguments
    ///
    /// * `size` - Maximum chunk size in tokens
    /// * `overlap` - Tokens shared between adjacent chunks
    ///
    /// # Panics
    ///
    /// Panics if `size == 0` or `overlap >= size`.
    #[must_use]
    pub fn new(size: usize, overlap: usize) -> Self {
        assert!(size > 0, "chunk size must be > 0");
        assert!(overlap < size, "overlap must be < size");
        Self { size, overlap }
    }

    /// Fallible constructor for untrusted parameters.
    pub fn try_new(size: usize, overlap: usize) -> Result<Self> {
        if size == 0 {
            return Err(Error::InvalidChunkSize(size));
        }
        if overlap >= size {
            return Err(Error::OverlapExceedsSize { size, overlap });
        }
        Ok(Self { size, overlap })
    }

    /// Create a chunker with no overlap.
    #[must_use]
    pub fn no_overlap(size: usize) -> Self {
        Self::new(size, 0)
    }

    /// Chunk size in tokens.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Overlap in tokens.
    #[must_use]
    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// The step size between chunk starts.
    #[must_use]
    fn step(&self) -> usize {
        self.size - self.overlap
    }
}

impl Chunker for FixedChunker {
    fn chunk(&self, text: &str) -> Vec<Slab> {
        let spans = token_spans(text);
        if spans.is_empty() {
            return vec![];
        }

        let n = spans.len();
        let mut slabs = Vec::with_capacity(self.estimate_chunks(n));
        let mut start = 0;

        while start < n {
            let end = (start + self.size).min(n);
            let window = decode(text, &spans, start..end);
            // token_count is measured on the slab text, like every other slab.
            slabs.push(
                Slab::new(window, spans[start].start, spans[end - 1].end, slabs.len())
                    .with_token_window(start, end),
            );

            if end == n {
                break;
            }
            start += self.step();
        }

        debug!(
            tokens = n,
            size = self.size,
            overlap = self.overlap,
            chunks = slabs.len(),
            "naive chunking"
        );
        slabs
    }

    fn estimate_chunks(&self, token_count: usize) -> usize {
        if token_count <= self.size {
            return usize::from(token_count > 0);
        }
        (token_count - self.size).div_ceil(self.step()) + 1
    }
}
