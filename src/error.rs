//! Error types for slabscore.
//!
//! Only input problems ever reach a caller. Provider failures are recovered
//! at the call site (see [`crate::embed`] and [`crate::generate`]) and
//! degenerate metric math resolves to fixed constants, so the `Embedding` and
//! `Generation` variants exist for provider implementations to report through,
//! not for the pipeline to return.

use serde::{Deserialize, Serialize};

/// Errors that can occur while chunking or evaluating.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid chunk size (must be > 0).
    #[error("invalid chunk size: {0} (must be > 0)")]
    InvalidChunkSize(usize),

    /// Overlap exceeds chunk size.
    #[error("overlap {overlap} exceeds chunk size {size}")]
    OverlapExceedsSize {
        /// The chunk size.
        size: usize,
        /// The overlap that exceeded the size.
        overlap: usize,
    },

    /// Similarity threshold outside `[0, 1]`.
    #[error("similarity threshold {0} must be within [0, 1]")]
    InvalidThreshold(f32),

    /// Token budget where the minimum exceeds the maximum, or the maximum is zero.
    #[error("invalid token budget: min {min}, max {max}")]
    InvalidTokenBudget {
        /// Minimum tokens per chunk.
        min: usize,
        /// Maximum tokens per chunk.
        max: usize,
    },

    /// A tunable outside its valid range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The document has no usable content.
    #[error("document has no content")]
    EmptyDocument,

    /// Not enough test questions for the metrics to mean anything.
    #[error("test set has {found} questions, at least {required} required")]
    TooFewQuestions {
        /// Questions supplied.
        found: usize,
        /// Questions required.
        required: usize,
    },

    /// Configuration could not be extracted.
    #[error("configuration error: {0}")]
    Config(String),

    /// Embedding provider error.
    #[error("embedding error: {0}")]
    Embedding(String),

    /// Generation provider error.
    #[error("generation error: {0}")]
    Generation(String),
}

impl Error {
    /// Machine-readable category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Embedding(_) | Self::Generation(_) => ErrorKind::Provider,
            Self::Config(_) => ErrorKind::Config,
            _ => ErrorKind::Input,
        }
    }
}

impl From<figment::Error> for Error {
    fn from(e: figment::Error) -> Self {
        Self::Config(e.to_string())
    }
}

/// Error category, serialized snake_case on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad document, test set, or parameter. The caller must fix the request.
    Input,
    /// An embedding or generation backend failed.
    Provider,
    /// Configuration sources could not be read or merged.
    Config,
    /// I/O or serialization failed around an otherwise valid run.
    Internal,
}

/// Structured error object returned across the reporting boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error category.
    pub kind: ErrorKind,
    /// Human-readable message.
    pub message: String,
}

impl From<&Error> for ErrorResponse {
    fn from(e: &Error) -> Self {
        Self {
            kind: e.kind(),
            message: e.to_string(),
        }
    }
}

/// Result type for slabscore operations.
pub type Result<T> = std::result::Result<T, Error>;
