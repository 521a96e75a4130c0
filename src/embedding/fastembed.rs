//! Local ONNX embeddings via `fastembed`.

use std::sync::{Mutex, PoisonError};

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

use super::Embedder;
use crate::error::EmbeddingError;

/// Output length of all-MiniLM-L6-v2.
const DIMENSIONS: usize = 384;

/// all-MiniLM-L6-v2 through `fastembed`.
pub struct FastEmbedder {
    model: Mutex<TextEmbedding>,
}

impl FastEmbedder {
    /// Loads the model, downloading it on first use.
    ///
    /// # Errors
    ///
    /// Returns [`EmbeddingError::Backend`] if the model cannot be loaded.
    pub fn new() -> Result<Self, EmbeddingError> {
        let model = TextEmbedding::try_new(InitOptions::new(EmbeddingModel::AllMiniLML6V2))
            .map_err(|e| EmbeddingError::Backend(e.to_string()))?;
        Ok(Self {
            model: Mutex::new(model),
        })
    }
}

impl std::fmt::Debug for FastEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedder")
            .field("model", &"all-MiniLM-L6-v2")
            .finish()
    }
}

impl Embedder for FastEmbedder {
    fn name(&self) -> &'static str {
        "fastembed"
    }

    fn dimensions(&self) -> usize {
        DIMENSIONS
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.embed_batch(&[text])?
            .pop()
            .ok_or_else(|| EmbeddingError::Backend("model returned no vector".to_string()))
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut model = self.model.lock().unwrap_or_else(PoisonError::into_inner);
        let vectors = model
            .embed(texts.to_vec(), None)
            .map_err(|e| EmbeddingError::Backend(e.to_string()))?;
        if let Some(v) = vectors.iter().find(|v| v.len() != DIMENSIONS) {
            return Err(EmbeddingError::DimensionMismatch {
                expected: DIMENSIONS,
                got: v.len(),
            });
        }
        Ok(vectors)
    }
}
