//! Lexical hash embedder.
//!
//! Hashes words and character bigrams into a fixed-width vector. Similar
//! wording lands close together, which is enough for tests and for running
//! without a model. Bigrams (rather than trigrams) because Korean words are
//! short in characters.

use crate::Result;
use crate::embedding::Embedder;
use sha2::{Digest, Sha256};

/// Deterministic embedder based on lexical overlap.
///
/// Stable across processes and platforms (SHA-256 based), so vectors stored
/// by one run stay comparable with queries from another.
///
/// ```
/// use medchat_rs::embedding::{Embedder, FallbackEmbedder};
///
/// let embedder = FallbackEmbedder::new(64);
/// assert_eq!(embedder.embed("두통").unwrap(), embedder.embed("두통").unwrap());
/// ```
#[derive(Debug, Clone, Copy)]
pub struct FallbackEmbedder {
    dimensions: usize,
}

impl FallbackEmbedder {
    /// Creates an embedder producing vectors of `dimensions` entries.
    #[must_use]
    pub const fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn bucket(&self, token: &str) -> (usize, f32) {
        let digest = Sha256::digest(token.as_bytes());
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest[..8]);
        let hash = u64::from_le_bytes(head);
        #[allow(clippy::cast_possible_truncation)]
        let idx = (hash % self.dimensions as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        (idx, sign)
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        if self.dimensions == 0 {
            return vector;
        }

        let normalized: String = text
            .chars()
            .map(|c| {
                if c.is_alphanumeric() {
                    c.to_lowercase().next().unwrap_or(c)
                } else {
                    ' '
                }
            })
            .collect();

        for word in normalized.split_whitespace() {
            let (idx, sign) = self.bucket(word);
            vector[idx] += sign;

            let chars: Vec<char> = word.chars().collect();
            for pair in chars.windows(2) {
                let bigram: String = pair.iter().collect();
                let (idx, sign) = self.bucket(&bigram);
                vector[idx] += 0.5 * sign;
            }
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        vector
    }
}

impl Embedder for FallbackEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &'static str {
        "lexical-hash"
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.vectorize(text))
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        use rayon::prelude::*;

        Ok(texts.par_iter().map(|text| self.vectorize(text)).collect())
    }
}
