//! Evaluation configuration.
//!
//! Layered with figment, later layers winning:
//!
//! 1. Built-in defaults ([`EvalConfig::default`])
//! 2. An optional TOML file
//! 3. `SLABSCORE_*` environment variables, nested with `__`
//!    (`SLABSCORE_PROVIDERS__EMBEDDING=hash`)
//! 4. Per-request overrides ([`EvalConfig::merged`])
//!
//! ```toml
//! chunk_size = 300
//! overlap = 30
//! similarity_threshold = 0.6
//!
//! [providers]
//! embedding = "hash"
//! ```

use std::path::Path;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use strum::Display;
use tracing::debug;

use crate::compare::CompareOptions;
use crate::{ChunkCapacity, Error, FixedChunker, Result, SemanticChunker};

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "SLABSCORE_";

/// Where embeddings come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EmbeddingBackend {
    /// No provider: hash vectors where a vector is required, lexical
    /// heuristics elsewhere.
    #[default]
    None,
    /// Hashed bag-of-words vectors everywhere.
    Hash,
    /// Local ONNX encoder (feature `local`).
    Local,
    /// OpenAI-compatible API (feature `openai`).
    OpenAi,
}

/// Where answers come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum GenerationBackend {
    /// Extractive answers only.
    #[default]
    None,
    /// OpenAI-compatible chat API (feature `openai`).
    OpenAi,
}

/// Provider selection and credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Embedding backend.
    pub embedding: EmbeddingBackend,
    /// Generation backend.
    pub generation: GenerationBackend,
    /// Hosted embedding model.
    pub embedding_model: String,
    /// Hosted chat model.
    pub generation_model: String,
    /// API base URL; the public OpenAI endpoint when unset.
    pub base_url: Option<String>,
    /// API key; falls back to `OPENAI_API_KEY`.
    pub api_key: Option<String>,
    /// Timeout for each hosted call.
    pub timeout_secs: u64,
    /// Dimension of hash embeddings.
    pub hash_dim: usize,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            embedding: EmbeddingBackend::None,
            generation: GenerationBackend::None,
            embedding_model: "text-embedding-3-small".to_string(),
            generation_model: "gpt-3.5-turbo".to_string(),
            base_url: None,
            api_key: None,
            timeout_secs: 30,
            hash_dim: 256,
        }
    }
}

/// Every tunable of an evaluation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalConfig {
    /// Naive window size in tokens.
    pub chunk_size: usize,
    /// Naive window overlap in tokens.
    pub overlap: usize,
    /// Semantic merge threshold.
    pub similarity_threshold: f32,
    /// Semantic chunk ceiling in tokens.
    pub max_tokens: usize,
    /// Semantic chunk floor in tokens.
    pub min_tokens: usize,
    /// Chunks retrieved per question.
    pub top_k: usize,
    /// Questions generated when the request has no test set.
    pub num_questions: usize,
    /// Smallest acceptable test set.
    pub min_test_questions: usize,
    /// Pseudo-samples per significance test.
    pub significance_samples: usize,
    /// Seed for the pseudo-samples.
    pub significance_seed: u64,
    /// Providers.
    pub providers: ProviderConfig,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            chunk_size: 400,
            overlap: 50,
            similarity_threshold: 0.7,
            max_tokens: 400,
            min_tokens: 75,
            top_k: 2,
            num_questions: 8,
            min_test_questions: 4,
            significance_samples: 30,
            significance_seed: 42,
            providers: ProviderConfig::default(),
        }
    }
}

impl EvalConfig {
    /// Load defaults, then `path` (if given and present), then the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            debug!(path = %path.display(), "loading config file");
            figment = figment.merge(Toml::file(path));
        }
        let config: Self = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply partial overrides (any subset of the fields, nested tables
    /// merged key by key) and validate the result.
    pub fn merged<T: Serialize>(&self, overrides: &T) -> Result<Self> {
        // Overrides come with the request, so a mistyped value is the caller's.
        let config: Self = Figment::from(Serialized::defaults(self))
            .merge(Serialized::defaults(overrides))
            .extract()
            .map_err(|e| Error::InvalidParameter(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the chunkers or the comparison cannot work with.
    pub fn validate(&self) -> Result<()> {
        FixedChunker::try_new(self.chunk_size, self.overlap)?;
        SemanticChunker::try_new(self.similarity_threshold, self.capacity()?)?;
        if self.top_k == 0 {
            return Err(Error::InvalidParameter("top_k must be > 0".into()));
        }
        if self.significance_samples < 2 {
            return Err(Error::InvalidParameter(
                "significance_samples must be at least 2".into(),
            ));
        }
        if self.providers.hash_dim == 0 {
            return Err(Error::InvalidParameter("providers.hash_dim must be > 0".into()));
        }
        Ok(())
    }

    /// Semantic token budget.
    pub fn capacity(&self) -> Result<ChunkCapacity> {
        ChunkCapacity::new(self.min_tokens, self.max_tokens)
    }

    /// Options for the significance simulation.
    pub fn compare_options(&self) -> CompareOptions {
        CompareOptions {
            samples: self.significance_samples,
            seed: self.significance_seed,
        }
    }
}
