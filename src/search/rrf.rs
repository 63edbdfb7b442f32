//! Reciprocal Rank Fusion.
//!
//! Merges the vector and BM25 rankings of hybrid retrieval. Each list
//! contributes `1 / (k + rank)` (1-based rank) to every chunk it contains.
//! See Cormack, Clarke and Buettcher (2009).

use std::collections::HashMap;

/// Fusion parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RrfConfig {
    /// Rank damping constant; larger values flatten the rank curve.
    pub k: u32,
}

impl Default for RrfConfig {
    fn default() -> Self {
        Self { k: 60 }
    }
}

impl RrfConfig {
    /// Config with damping constant `k`.
    #[must_use]
    pub const fn new(k: u32) -> Self {
        Self { k }
    }
}

/// Fuses ranked chunk-id lists into `(chunk_id, score)`, best first.
///
/// Equal scores are ordered by chunk id so the fused ranking is
/// reproducible.
///
/// ```
/// use medchat_rs::search::{reciprocal_rank_fusion, RrfConfig};
///
/// let vector = vec![4, 2, 9];
/// let bm25 = vec![2, 7];
/// let fused = reciprocal_rank_fusion(&[&vector, &bm25], &RrfConfig::default());
/// assert_eq!(fused[0].0, 2);
/// ```
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn reciprocal_rank_fusion(ranked_lists: &[&[i64]], config: &RrfConfig) -> Vec<(i64, f64)> {
    let mut scores: HashMap<i64, f64> = HashMap::new();

    for list in ranked_lists {
        for (rank, &chunk_id) in list.iter().enumerate() {
            let contribution = 1.0 / f64::from(config.k + rank as u32 + 1);
            *scores.entry(chunk_id).or_insert(0.0) += contribution;
        }
    }

    let mut fused: Vec<(i64, f64)> = scores.into_iter().collect();
    fused.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    fused
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_list_keeps_order() {
        let list = vec![5, 3, 8];
        let fused = reciprocal_rank_fusion(&[&list], &RrfConfig::default());
        let ids: Vec<i64> = fused.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, [5, 3, 8]);
    }

    #[test]
    fn test_shared_items_rise() {
        let (a, b) = (vec![1, 2, 3], vec![3, 9]);
        let fused = reciprocal_rank_fusion(&[&a, &b], &RrfConfig::default());
        assert_eq!(fused[0].0, 3);
    }

    #[test]
    fn test_ties_break_by_id() {
        let (a, b) = (vec![7, 1], vec![2, 4]);
        let fused = reciprocal_rank_fusion(&[&a, &b], &RrfConfig::default());
        let ids: Vec<i64> = fused.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, [2, 7, 1, 4]);
    }

    #[test]
    fn test_score_formula() {
        let list = vec![1];
        let fused = reciprocal_rank_fusion(&[&list, &list], &RrfConfig::new(60));
        assert!((fused[0].1 - 2.0 / 61.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty() {
        let list: Vec<i64> = Vec::new();
        assert!(reciprocal_rank_fusion(&[&list], &RrfConfig::default()).is_empty());
    }
}
