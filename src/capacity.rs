//! Token budget for semantic chunks.
//!
//! ## The Problem
//!
//! Similarity alone would happily grow a chunk forever on a single-topic
//! document, or emit one-sentence scraps on a jumpy one. A budget bounds both
//! ends:
//!
//! - `max`: a sentence is only merged if the chunk stays within `max` tokens.
//! - `min`: a closed chunk is only emitted if it reached `min` tokens.
//!
//! ```text
//! min = 5, max = 12
//!
//! [S1: 4 tok][S2: 4 tok]        similar, 8 <= 12  -> merge
//! [S1 S2: 8 tok] + [S3: 6 tok]  14 > 12           -> close (8 >= 5, emit)
//! [S3: 6 tok] + [S4: 2 tok]     dissimilar        -> close (6 >= 5, emit)
//! [S4: 2 tok]                   end of input      -> 2 < 5, dropped
//! ```
//!
//! Dropping undersized chunks is lossy on purpose: those sentences vanish
//! from the chunk set. The quality scorer's `coverage_ratio` makes the loss
//! visible.

use crate::{Error, Result};

/// Minimum and maximum tokens per semantic chunk.
///
/// # Examples
///
/// ```rust
/// use slabscore::ChunkCapacity;
///
/// let cap = ChunkCapacity::new(75, 400).unwrap();
/// assert_eq!(cap.min(), 75);
/// assert_eq!(cap.max(), 400);
///
/// // Range syntax
/// let cap = ChunkCapacity::from(50..=300);
/// assert_eq!(cap.min(), 50);
/// assert_eq!(cap.max(), 300);
///
/// assert!(ChunkCapacity::new(10, 5).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkCapacity {
    min: usize,
    max: usize,
}

impl ChunkCapacity {
    /// Create a budget.
    ///
    /// # Errors
    ///
    /// Returns an error if `max == 0` or `min > max`.
    pub fn new(min: usize, max: usize) -> Result<Self> {
        if max == 0 || min > max {
            return Err(Error::InvalidTokenBudget { min, max });
        }
        Ok(Self { min, max })
    }

    /// A budget with no minimum.
    #[must_use]
    pub const fn up_to(max: usize) -> Self {
        Self { min: 0, max }
    }

    /// Minimum tokens for a chunk to be emitted.
    #[must_use]
    pub const fn min(&self) -> usize {
        self.min
    }

    /// Maximum tokens a chunk may grow to by merging.
    #[must_use]
    pub const fn max(&self) -> usize {
        self.max
    }

    /// Check if adding `additional` tokens would exceed the maximum.
    #[must_use]
    pub fn would_overflow(&self, current: usize, additional: usize) -> bool {
        current.saturating_add(additional) > self.max
    }

    /// Check if a chunk of `size` tokens is large enough to emit.
    #[must_use]
    pub fn meets_min(&self, size: usize) -> bool {
        size >= self.min
    }
}

impl Default for ChunkCapacity {
    fn default() -> Self {
        Self { min: 75, max: 400 }
    }
}

impl From<std::ops::RangeInclusive<usize>> for ChunkCapacity {
    fn from(range: std::ops::RangeInclusive<usize>) -> Self {
        let (min, max) = range.into_inner();
        Self {
            min: min.min(max),
            max: max.max(1),
        }
    }
}
