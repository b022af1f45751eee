//! Local sentence encoder backed by fastembed (ONNX Runtime).

use tracing::info;

use super::Embedder;
use crate::{Error, Result};

/// Embeds with a local fastembed model.
///
/// Uses fastembed's default model (BGE-small-en, 384 dimensions). The model
/// is downloaded on first use.
pub struct FastEmbedder {
    model: ::fastembed::TextEmbedding,
    id: String,
}

impl FastEmbedder {
    /// Load the default model.
    ///
    /// # Errors
    ///
    /// Returns an error if the embedding model fails to load.
    pub fn new() -> Result<Self> {
        let model = ::fastembed::TextEmbedding::try_new(Default::default())
            .map_err(|e| Error::Embedding(e.to_string()))?;
        info!("local embedding model loaded");
        Ok(Self {
            model,
            id: "fastembed:bge-small-en".to_string(),
        })
    }
}

impl Embedder for FastEmbedder {
    fn id(&self) -> &str {
        &self.id
    }

    fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.model
            .embed(texts.to_vec(), None)
            .map_err(|e| Error::Embedding(e.to_string()))
    }
}

impl std::fmt::Debug for FastEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedder").field("id", &self.id).finish()
    }
}
