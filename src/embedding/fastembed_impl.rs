//! Multilingual semantic embedder backed by fastembed.
//!
//! Only compiled with the `fastembed-embeddings` feature. The ONNX model is
//! loaded lazily on first use and shared process-wide.

use crate::Result;
use crate::embedding::{DEFAULT_DIMENSIONS, Embedder};
use crate::error::StorageError;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Mutex, OnceLock};

static MODEL: OnceLock<Mutex<fastembed::TextEmbedding>> = OnceLock::new();

/// Embedder using multilingual-e5-small (384 dimensions, handles Korean).
#[derive(Debug, Default, Clone, Copy)]
pub struct FastEmbedEmbedder;

impl FastEmbedEmbedder {
    /// Creates the embedder. The model downloads on first `embed`.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn model() -> Result<&'static Mutex<fastembed::TextEmbedding>> {
        if let Some(model) = MODEL.get() {
            return Ok(model);
        }

        let options = fastembed::InitOptions::new(fastembed::EmbeddingModel::MultilingualE5Small)
            .with_show_download_progress(false);
        let model = fastembed::TextEmbedding::try_new(options)
            .map_err(|e| StorageError::Embedding(format!("failed to load model: {e}")))?;

        // Another thread may have won the race; either instance is fine.
        let _ = MODEL.set(Mutex::new(model));
        MODEL
            .get()
            .ok_or_else(|| StorageError::Embedding("model not initialized".to_string()).into())
    }

    fn run(texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let model = Self::model()?;
        let mut model = model
            .lock()
            .map_err(|e| StorageError::Embedding(format!("model lock poisoned: {e}")))?;

        // ONNX runtime may panic on malformed input.
        catch_unwind(AssertUnwindSafe(|| model.embed(texts, None)))
            .map_err(|_| StorageError::Embedding("onnx runtime panicked".to_string()))?
            .map_err(|e| StorageError::Embedding(e.to_string()).into())
    }
}

impl Embedder for FastEmbedEmbedder {
    fn dimensions(&self) -> usize {
        DEFAULT_DIMENSIONS
    }

    fn model_name(&self) -> &'static str {
        "multilingual-e5-small"
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Ok(vec![0.0; DEFAULT_DIMENSIONS]);
        }
        Self::run(&[text])?
            .into_iter()
            .next()
            .ok_or_else(|| StorageError::Embedding("model returned no vector".to_string()).into())
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        Self::run(texts)
    }
}
