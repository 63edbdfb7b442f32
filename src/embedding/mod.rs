//! Embeddings for fragment similarity search.
//!
//! Uses fastembed's multilingual model when the `fastembed-embeddings`
//! feature is enabled, otherwise a deterministic lexical hash embedder that
//! needs no model download.

mod fallback;

#[cfg(feature = "fastembed-embeddings")]
mod fastembed_impl;

pub use fallback::FallbackEmbedder;

#[cfg(feature = "fastembed-embeddings")]
pub use fastembed_impl::FastEmbedEmbedder;

use crate::Result;

/// Embedding width shared by every embedder and the stored vectors.
pub const DEFAULT_DIMENSIONS: usize = 384;

/// Turns text into a fixed-width vector.
///
/// Implementations are `Send + Sync`; the retriever calls them from the
/// blocking pool.
///
/// # Examples
///
/// ```
/// use medchat_rs::embedding::{Embedder, FallbackEmbedder, DEFAULT_DIMENSIONS};
///
/// let embedder = FallbackEmbedder::new(DEFAULT_DIMENSIONS);
/// let vector = embedder.embed("소아청소년과 진료 시간").unwrap();
/// assert_eq!(vector.len(), DEFAULT_DIMENSIONS);
/// ```
pub trait Embedder: Send + Sync {
    /// Vector width.
    fn dimensions(&self) -> usize;

    /// Short identifier stored alongside embeddings.
    fn model_name(&self) -> &'static str;

    /// Embeds one text.
    ///
    /// # Errors
    ///
    /// Returns an error if the model fails.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embeds several texts, in order.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding fails for any text.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}

/// Builds the embedder selected at compile time.
///
/// # Errors
///
/// Returns an error if the model cannot be initialized.
#[cfg(feature = "fastembed-embeddings")]
pub fn create_embedder() -> Result<Box<dyn Embedder>> {
    Ok(Box::new(FastEmbedEmbedder::new()))
}

/// Builds the embedder selected at compile time.
///
/// # Errors
///
/// Never fails for the hash embedder.
#[cfg(not(feature = "fastembed-embeddings"))]
pub fn create_embedder() -> Result<Box<dyn Embedder>> {
    Ok(Box::new(FallbackEmbedder::new(DEFAULT_DIMENSIONS)))
}

/// Cosine similarity in `[-1, 1]`.
///
/// Mismatched lengths or zero vectors give 0.0.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_identical_and_orthogonal() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_degenerate_inputs() {
        assert!(cosine_similarity(&[1.0], &[1.0, 0.0]).abs() < 1e-6);
        assert!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]).abs() < 1e-6);
    }

    #[cfg(not(feature = "fastembed-embeddings"))]
    #[test]
    fn test_create_embedder_batch() {
        let embedder = create_embedder().unwrap();
        assert_eq!(embedder.dimensions(), DEFAULT_DIMENSIONS);
        let vectors = embedder.embed_batch(&["내과", "외과"]).unwrap();
        assert_eq!(vectors.len(), 2);
        assert!(embedder.embed_batch(&[]).unwrap().is_empty());
    }
}
