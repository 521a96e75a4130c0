//! Embedding backends for semantic symptom search.
//!
//! The [`Embedder`] trait is the seam between the index and a concrete
//! model. With the `fastembed-embeddings` feature enabled,
//! [`create_embedder`] returns a local all-MiniLM-L6-v2 model; otherwise
//! the index scores by keyword overlap.

#[cfg(feature = "fastembed-embeddings")]
mod fastembed;

use std::sync::Arc;

#[cfg(feature = "fastembed-embeddings")]
pub use self::fastembed::FastEmbedder;
use crate::error::EmbeddingError;

/// A text embedding backend.
pub trait Embedder: Send + Sync {
    /// Backend name for logs and status output.
    fn name(&self) -> &'static str;

    /// Length of every vector this backend produces.
    fn dimensions(&self) -> usize;

    /// Embeds one text.
    ///
    /// # Errors
    ///
    /// Returns [`EmbeddingError`] if the backend fails.
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Embeds several texts, preserving order.
    ///
    /// # Errors
    ///
    /// Returns [`EmbeddingError`] if the backend fails on any text.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}

/// Creates the compiled-in embedder, if any.
///
/// Returns `None` when no backend is compiled in or the model fails to
/// initialize; the failure is logged and the caller falls back to keyword
/// scoring.
#[must_use]
pub fn create_embedder() -> Option<Arc<dyn Embedder>> {
    #[cfg(feature = "fastembed-embeddings")]
    {
        match FastEmbedder::new() {
            Ok(e) => return Some(Arc::new(e)),
            Err(e) => {
                tracing::warn!(error = %e, "embedding model unavailable, using keyword scoring");
            }
        }
    }
    None
}

/// Cosine similarity of two vectors. Mismatched lengths and zero vectors
/// score 0.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_identical() {
        let v = [0.3, 0.4, 0.5];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_degenerate() {
        assert!(cosine_similarity(&[1.0, 2.0], &[1.0]).abs() < f32::EPSILON);
        assert!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]).abs() < f32::EPSILON);
        assert!(cosine_similarity(&[], &[]).abs() < f32::EPSILON);
    }

    struct Fixed;

    impl Embedder for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn dimensions(&self) -> usize {
            2
        }

        fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            if text.is_empty() {
                return Err(EmbeddingError::Backend("empty input".to_string()));
            }
            #[allow(clippy::cast_precision_loss)]
            Ok(vec![text.len() as f32, 1.0])
        }
    }

    #[test]
    fn test_default_embed_batch_preserves_order() {
        let out = Fixed.embed_batch(&["a", "abc"]).unwrap_or_default();
        assert_eq!(out, vec![vec![1.0, 1.0], vec![3.0, 1.0]]);
        assert!(Fixed.embed_batch(&["a", ""]).is_err());
    }
}
