//! Fragment search: vector similarity, BM25 and their fusion.
//!
//! Vector search is a brute-force cosine scan; the knowledge base of a
//! single hospital is small enough that an approximate index buys nothing.

mod rrf;

pub use rrf::{RrfConfig, reciprocal_rank_fusion};

use crate::embedding::{Embedder, cosine_similarity};
use crate::error::Result;
use crate::storage::SqliteStorage;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default minimum similarity for a fragment to count as relevant.
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.2;

/// Default number of fragments returned.
pub const DEFAULT_TOP_K: usize = 5;

/// How fragments are found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Embedding similarity only.
    #[default]
    Vector,
    /// Vector and BM25 rankings fused with RRF.
    Hybrid,
}

/// Ranks `candidates` by cosine similarity to `query`.
///
/// Returns at most `k` `(chunk_id, similarity)` pairs, similarity
/// descending; equal similarities keep chunk-id (insertion) order.
#[must_use]
pub fn rank_by_similarity(query: &[f32], candidates: &[(i64, Vec<f32>)], k: usize) -> Vec<(i64, f32)> {
    let mut scored: Vec<(i64, f32)> = candidates
        .iter()
        .map(|(id, vector)| (*id, cosine_similarity(query, vector)))
        .collect();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    scored.truncate(k);
    scored
}

/// Fuses vector and BM25 hits.
///
/// Each chunk is scored by RRF, so a strong text-only hit can outrank the
/// weaker vector hits. Apply similarity thresholds to `vector` beforehand.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn fuse_hybrid(
    vector: &[(i64, f32)],
    text: &[(i64, f64)],
    k: usize,
    config: &RrfConfig,
) -> Vec<(i64, f32)> {
    let vector_ids: Vec<i64> = vector.iter().map(|(id, _)| *id).collect();
    let text_ids: Vec<i64> = text.iter().map(|(id, _)| *id).collect();

    reciprocal_rank_fusion(&[&vector_ids, &text_ids], config)
        .into_iter()
        .take(k)
        .map(|(id, score)| (id, score as f32))
        .collect()
}

/// A fragment hit shown by the `search` command.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    /// Chunk id.
    pub chunk_id: i64,
    /// Owning document.
    pub document_id: i64,
    /// Document name, when known.
    pub document_name: Option<String>,
    /// Cosine similarity; the fused RRF score in hybrid mode.
    pub score: f32,
    /// Fragment text.
    pub content: String,
}

/// Searches the knowledge base directly, outside the response pipeline.
///
/// # Errors
///
/// Returns an error if embedding or a storage query fails.
pub fn search_fragments(
    storage: &SqliteStorage,
    embedder: &dyn Embedder,
    query: &str,
    top_k: usize,
    threshold: f32,
    mode: SearchMode,
) -> Result<Vec<SearchHit>> {
    let embedding = embedder.embed(query)?;
    let mut ranked = storage.search_similar(&embedding, top_k * 2)?;
    ranked.retain(|(_, score)| *score >= threshold);

    if mode == SearchMode::Hybrid {
        let text = storage.search_fts(query, top_k * 2)?;
        ranked = fuse_hybrid(&ranked, &text, top_k, &RrfConfig::default());
    }
    ranked.truncate(top_k);

    let scores: HashMap<i64, f32> = ranked.iter().copied().collect();
    let ids: Vec<i64> = ranked.iter().map(|(id, _)| *id).collect();
    Ok(storage
        .fragments(&ids)?
        .into_iter()
        .map(|fragment| SearchHit {
            score: scores.get(&fragment.chunk_id).copied().unwrap_or(0.0),
            chunk_id: fragment.chunk_id,
            document_id: fragment.document_id,
            document_name: fragment.document_name,
            content: fragment.content,
        })
        .collect())
}
