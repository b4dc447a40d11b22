// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Result fusion: combine a dense and a sparse ranked list into one.
//!
//! Sparse BM25 scores are min-max normalized per query before fusion so
//! both inputs lie in [0, 1]. Output order is fully deterministic: ties
//! break by presence in both lists, then better dense rank, then lower
//! `doc_id`.

use std::collections::{HashMap, HashSet};

use crate::classifier::{QueryInfo, QueryKind};

/// The closed set of fusion strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FusionStrategy {
    /// Reciprocal rank fusion with a fixed `rrf_k`.
    Rrf,
    /// RRF with `rrf_k` chosen from query length, plus a diversity bonus.
    HybridRrf,
    /// `dense_weight * dense + sparse_weight * sparse`.
    Weighted,
    /// `lambda * dense + (1 - lambda) * sparse`, both min-max normalized.
    Convex,
    /// Positional interleave at `interleave_ratio`.
    Interleave,
    /// Weighted reciprocal ranks with a both-lists bonus.
    RankFusion,
    /// Weighted Borda count.
    ScoreFusion,
    /// Sparse candidate set re-ranked by dense similarity.
    Cascade,
    /// Strategy picked per query by the classifier.
    Adaptive,
}

impl FusionStrategy {
    /// Parse a configuration name. Returns `None` for unknown names.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "rrf" => Some(FusionStrategy::Rrf),
            "hybrid_rrf" => Some(FusionStrategy::HybridRrf),
            "weighted" => Some(FusionStrategy::Weighted),
            "convex" => Some(FusionStrategy::Convex),
            "interleave" => Some(FusionStrategy::Interleave),
            "rank_fusion" => Some(FusionStrategy::RankFusion),
            "score_fusion" => Some(FusionStrategy::ScoreFusion),
            "cascade" => Some(FusionStrategy::Cascade),
            "adaptive" => Some(FusionStrategy::Adaptive),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FusionStrategy::Rrf => "rrf",
            FusionStrategy::HybridRrf => "hybrid_rrf",
            FusionStrategy::Weighted => "weighted",
            FusionStrategy::Convex => "convex",
            FusionStrategy::Interleave => "interleave",
            FusionStrategy::RankFusion => "rank_fusion",
            FusionStrategy::ScoreFusion => "score_fusion",
            FusionStrategy::Cascade => "cascade",
            FusionStrategy::Adaptive => "adaptive",
        }
    }
}

/// Tunable fusion parameters. Field names match the configuration keys.
#[derive(Debug, Clone)]
pub struct FusionParams {
    pub rrf_k: f64,
    pub dense_weight: f64,
    pub sparse_weight: f64,
    pub convex_lambda: f64,
    pub interleave_ratio: f64,
    pub rank_bias_factor: f64,
    pub diversity_bonus: f64,
}

impl Default for FusionParams {
    fn default() -> Self {
        Self {
            rrf_k: 60.0,
            dense_weight: 0.7,
            sparse_weight: 0.3,
            convex_lambda: 0.5,
            interleave_ratio: 0.5,
            rank_bias_factor: 0.1,
            diversity_bonus: 0.1,
        }
    }
}

/// One fused result with its component scores.
#[derive(Debug, Clone)]
pub struct FusedHit {
    pub doc_id: i64,
    /// Dense similarity in [0, 1], if dense search saw this doc.
    pub dense_score: Option<f64>,
    /// Min-max normalized sparse score, if sparse search saw this doc.
    pub sparse_score: Option<f64>,
    pub final_score: f64,
}

/// Fuses two ranked lists according to a configured strategy.
pub struct ResultFusion {
    strategy: FusionStrategy,
    params: FusionParams,
}

/// Per-query view of both input lists with ranks and scores resolved.
struct Lists {
    dense: Vec<(i64, f64)>,
    /// Sparse list with scores min-max normalized to [0, 1].
    sparse: Vec<(i64, f64)>,
    dense_rank: HashMap<i64, usize>,
    sparse_rank: HashMap<i64, usize>,
}

impl Lists {
    fn build(dense: &[(i64, f64)], sparse: &[(i64, f64)]) -> Self {
        let normalized = min_max_normalize(sparse);
        let dense_rank = dense
            .iter()
            .enumerate()
            .map(|(i, (id, _))| (*id, i + 1))
            .collect();
        let sparse_rank = normalized
            .iter()
            .enumerate()
            .map(|(i, (id, _))| (*id, i + 1))
            .collect();
        Self {
            dense: dense.to_vec(),
            sparse: normalized,
            dense_rank,
            sparse_rank,
        }
    }

    fn dense_score(&self, doc_id: i64) -> Option<f64> {
        self.dense_rank
            .get(&doc_id)
            .map(|rank| self.dense[rank - 1].1)
    }

    fn sparse_score(&self, doc_id: i64) -> Option<f64> {
        self.sparse_rank
            .get(&doc_id)
            .map(|rank| self.sparse[rank - 1].1)
    }

    fn union_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self
            .dense
            .iter()
            .chain(self.sparse.iter())
            .map(|(id, _)| *id)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        ids.sort_unstable();
        ids
    }

    fn hit(&self, doc_id: i64, final_score: f64) -> FusedHit {
        FusedHit {
            doc_id,
            dense_score: self.dense_score(doc_id),
            sparse_score: self.sparse_score(doc_id),
            final_score,
        }
    }
}

impl ResultFusion {
    pub fn new(strategy: FusionStrategy, params: FusionParams) -> Self {
        Self { strategy, params }
    }

    pub fn strategy(&self) -> FusionStrategy {
        self.strategy
    }

    /// Fuse `dense` and `sparse` into at most `k` unique hits.
    pub fn fuse(
        &self,
        dense: &[(i64, f64)],
        sparse: &[(i64, f64)],
        k: usize,
        query: &QueryInfo,
    ) -> Vec<FusedHit> {
        if k == 0 || (dense.is_empty() && sparse.is_empty()) {
            return vec![];
        }
        let lists = Lists::build(dense, sparse);
        match self.strategy {
            FusionStrategy::Rrf => self.rrf(&lists, k, self.params.rrf_k, 0.0),
            FusionStrategy::HybridRrf => {
                let rrf_k = dynamic_rrf_k(self.params.rrf_k, query);
                self.rrf(&lists, k, rrf_k, self.params.diversity_bonus)
            }
            FusionStrategy::Weighted => self.weighted(
                &lists,
                k,
                self.params.dense_weight,
                self.params.sparse_weight,
            ),
            FusionStrategy::Convex => self.convex(&lists, k),
            FusionStrategy::Interleave => self.interleave(&lists, k),
            FusionStrategy::RankFusion => self.rank_fusion(&lists, k),
            FusionStrategy::ScoreFusion => self.score_fusion(&lists, k),
            FusionStrategy::Cascade => self.cascade(&lists, k),
            FusionStrategy::Adaptive => match query.kind {
                QueryKind::Keyword => self.weighted(&lists, k, 0.3, 0.7),
                QueryKind::Semantic => self.weighted(&lists, k, 0.8, 0.2),
                QueryKind::Mixed => {
                    let rrf_k = dynamic_rrf_k(self.params.rrf_k, query);
                    self.rrf(&lists, k, rrf_k, self.params.diversity_bonus)
                }
            },
        }
    }

    /// RRF: `score(id) = sum over lists of 1 / (rrf_k + rank)`, rank
    /// 1-based. Items in one list only get `diversity_bonus` on top.
    fn rrf(&self, lists: &Lists, k: usize, rrf_k: f64, diversity_bonus: f64) -> Vec<FusedHit> {
        let mut scores: HashMap<i64, f64> = HashMap::new();
        for (&id, &rank) in &lists.dense_rank {
            *scores.entry(id).or_default() += 1.0 / (rrf_k + rank as f64);
        }
        for (&id, &rank) in &lists.sparse_rank {
            *scores.entry(id).or_default() += 1.0 / (rrf_k + rank as f64);
        }
        if diversity_bonus > 0.0 {
            for (&id, score) in scores.iter_mut() {
                let in_both =
                    lists.dense_rank.contains_key(&id) && lists.sparse_rank.contains_key(&id);
                if !in_both {
                    *score += diversity_bonus;
                }
            }
        }
        let mut hits: Vec<FusedHit> = scores
            .into_iter()
            .map(|(id, score)| lists.hit(id, score))
            .collect();
        self.finish(&mut hits, lists, k);
        hits
    }

    /// Linear blend of the (already normalized) component scores.
    /// Missing contributions are zero.
    fn weighted(&self, lists: &Lists, k: usize, dense_w: f64, sparse_w: f64) -> Vec<FusedHit> {
        let mut hits: Vec<FusedHit> = lists
            .union_ids()
            .into_iter()
            .map(|id| {
                let score = dense_w * lists.dense_score(id).unwrap_or(0.0)
                    + sparse_w * lists.sparse_score(id).unwrap_or(0.0);
                lists.hit(id, score)
            })
            .collect();
        self.finish(&mut hits, lists, k);
        hits
    }

    /// Convex combination over min-max normalized inputs.
    fn convex(&self, lists: &Lists, k: usize) -> Vec<FusedHit> {
        let dense_norm: HashMap<i64, f64> =
            min_max_normalize(&lists.dense).into_iter().collect();
        let lambda = self.params.convex_lambda;
        let mut hits: Vec<FusedHit> = lists
            .union_ids()
            .into_iter()
            .map(|id| {
                let dn = dense_norm.get(&id).copied().unwrap_or(0.0);
                let sn = lists.sparse_score(id).unwrap_or(0.0);
                lists.hit(id, lambda * dn + (1.0 - lambda) * sn)
            })
            .collect();
        self.finish(&mut hits, lists, k);
        hits
    }

    /// Positional interleave: roughly `ceil(ratio * k)` dense slots, the
    /// rest sparse, skipping ids already taken. Output keeps interleave
    /// order; when one list runs dry the other fills the remainder.
    fn interleave(&self, lists: &Lists, k: usize) -> Vec<FusedHit> {
        let dense_quota = (self.params.interleave_ratio * k as f64).ceil() as usize;
        let mut hits: Vec<FusedHit> = Vec::with_capacity(k);
        let mut seen: HashSet<i64> = HashSet::new();
        let mut dense_taken = 0_usize;
        let (mut di, mut si) = (0_usize, 0_usize);

        while hits.len() < k && (di < lists.dense.len() || si < lists.sparse.len()) {
            if dense_taken < dense_quota && di < lists.dense.len() {
                let (id, score) = lists.dense[di];
                di += 1;
                if seen.insert(id) {
                    hits.push(lists.hit(id, score));
                    dense_taken += 1;
                }
            } else if si < lists.sparse.len() {
                let (id, score) = lists.sparse[si];
                si += 1;
                if seen.insert(id) {
                    hits.push(lists.hit(id, score));
                }
            } else if di < lists.dense.len() {
                let (id, score) = lists.dense[di];
                di += 1;
                if seen.insert(id) {
                    hits.push(lists.hit(id, score));
                }
            }
        }
        hits
    }

    /// `dense_weight / rank_d + sparse_weight / rank_s`, missing rank
    /// contributing nothing, plus `rank_bias_factor` for both-list items.
    fn rank_fusion(&self, lists: &Lists, k: usize) -> Vec<FusedHit> {
        let mut hits: Vec<FusedHit> = lists
            .union_ids()
            .into_iter()
            .map(|id| {
                let mut score = 0.0;
                let dense_rank = lists.dense_rank.get(&id);
                let sparse_rank = lists.sparse_rank.get(&id);
                if let Some(&rank) = dense_rank {
                    score += self.params.dense_weight / rank as f64;
                }
                if let Some(&rank) = sparse_rank {
                    score += self.params.sparse_weight / rank as f64;
                }
                if dense_rank.is_some() && sparse_rank.is_some() {
                    score += self.params.rank_bias_factor;
                }
                lists.hit(id, score)
            })
            .collect();
        self.finish(&mut hits, lists, k);
        hits
    }

    /// Weighted Borda count:
    /// `w_d * (n_d - rank_d + 1) + w_s * (n_s - rank_s + 1)`.
    fn score_fusion(&self, lists: &Lists, k: usize) -> Vec<FusedHit> {
        let n_d = lists.dense.len() as f64;
        let n_s = lists.sparse.len() as f64;
        let mut hits: Vec<FusedHit> = lists
            .union_ids()
            .into_iter()
            .map(|id| {
                let mut score = 0.0;
                if let Some(&rank) = lists.dense_rank.get(&id) {
                    score += self.params.dense_weight * (n_d - rank as f64 + 1.0);
                }
                if let Some(&rank) = lists.sparse_rank.get(&id) {
                    score += self.params.sparse_weight * (n_s - rank as f64 + 1.0);
                }
                lists.hit(id, score)
            })
            .collect();
        self.finish(&mut hits, lists, k);
        hits
    }

    /// Take the top `4k` sparse hits as a candidate set and re-rank them by
    /// dense similarity; sparse order fills any shortfall.
    fn cascade(&self, lists: &Lists, k: usize) -> Vec<FusedHit> {
        if lists.sparse.is_empty() {
            let mut hits: Vec<FusedHit> = lists
                .dense
                .iter()
                .map(|&(id, score)| lists.hit(id, score))
                .collect();
            hits.truncate(k);
            return hits;
        }

        let m = 4 * k;
        let candidates: HashSet<i64> = lists.sparse.iter().take(m).map(|(id, _)| *id).collect();

        let mut hits: Vec<FusedHit> = lists
            .dense
            .iter()
            .filter(|(id, _)| candidates.contains(id))
            .map(|&(id, score)| lists.hit(id, score))
            .collect();

        if hits.len() >= k {
            hits.truncate(k);
            return hits;
        }

        let taken: HashSet<i64> = hits.iter().map(|h| h.doc_id).collect();
        for &(id, score) in lists.sparse.iter() {
            if hits.len() >= k {
                break;
            }
            if !taken.contains(&id) {
                hits.push(lists.hit(id, score));
            }
        }
        self.finish(&mut hits, lists, k);
        hits
    }

    /// Deterministic ordering and truncation shared by score-based
    /// strategies.
    fn finish(&self, hits: &mut Vec<FusedHit>, lists: &Lists, k: usize) {
        hits.sort_by(|a, b| {
            b.final_score
                .partial_cmp(&a.final_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    let a_both = a.dense_score.is_some() && a.sparse_score.is_some();
                    let b_both = b.dense_score.is_some() && b.sparse_score.is_some();
                    b_both.cmp(&a_both)
                })
                .then_with(|| {
                    let ar = lists.dense_rank.get(&a.doc_id).copied().unwrap_or(usize::MAX);
                    let br = lists.dense_rank.get(&b.doc_id).copied().unwrap_or(usize::MAX);
                    ar.cmp(&br)
                })
                .then_with(|| a.doc_id.cmp(&b.doc_id))
        });
        hits.truncate(k);
    }
}

/// Choose `rrf_k` from the query: short queries dampen less (favoring the
/// sparse top ranks), long queries smooth more (favoring dense).
fn dynamic_rrf_k(base: f64, query: &QueryInfo) -> f64 {
    if query.token_count <= 3 {
        30.0
    } else if query.token_count >= 12 {
        100.0
    } else {
        base
    }
}

/// Min-max normalize scores to [0, 1], preserving order.
///
/// A constant list maps to all-ones so a single hit keeps full weight.
fn min_max_normalize(scores: &[(i64, f64)]) -> Vec<(i64, f64)> {
    if scores.is_empty() {
        return vec![];
    }
    let min = scores.iter().map(|(_, s)| *s).fold(f64::INFINITY, f64::min);
    let max = scores.iter().map(|(_, s)| *s).fold(f64::NEG_INFINITY, f64::max);
    if (max - min).abs() < f64::EPSILON {
        return scores.iter().map(|&(id, _)| (id, 1.0)).collect();
    }
    scores
        .iter()
        .map(|&(id, s)| (id, (s - min) / (max - min)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::analyze_query;

    fn fusion(strategy: FusionStrategy) -> ResultFusion {
        ResultFusion::new(strategy, FusionParams::default())
    }

    fn mixed_query() -> QueryInfo {
        analyze_query("what does the user drink")
    }

    #[test]
    fn empty_inputs_return_empty() {
        let f = fusion(FusionStrategy::Rrf);
        assert!(f.fuse(&[], &[], 10, &mixed_query()).is_empty());
    }

    #[test]
    fn one_empty_input_returns_other_truncated() {
        let f = fusion(FusionStrategy::Rrf);
        let dense = vec![(1, 0.9), (2, 0.8), (3, 0.7)];
        let hits = f.fuse(&dense, &[], 2, &mixed_query());
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].doc_id, 1);
        assert_eq!(hits[1].doc_id, 2);

        let sparse = vec![(4, 5.0), (5, 3.0)];
        let hits = f.fuse(&[], &sparse, 10, &mixed_query());
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].doc_id, 4);
    }

    #[test]
    fn rrf_exact_order_and_scores() {
        let f = fusion(FusionStrategy::Rrf);
        let dense = vec![(1, 0.9), (2, 0.8), (3, 0.7)];
        let sparse = vec![(2, 5.0), (3, 4.0), (4, 1.0)];
        let hits = f.fuse(&dense, &sparse, 10, &mixed_query());

        let order: Vec<i64> = hits.iter().map(|h| h.doc_id).collect();
        assert_eq!(order, vec![2, 3, 1, 4]);

        let expected = [
            1.0 / 62.0 + 1.0 / 61.0, // doc 2: dense rank 2, sparse rank 1
            1.0 / 63.0 + 1.0 / 62.0, // doc 3: dense rank 3, sparse rank 2
            1.0 / 61.0,              // doc 1: dense rank 1 only
            1.0 / 63.0,              // doc 4: sparse rank 3 only
        ];
        for (hit, want) in hits.iter().zip(expected) {
            assert!(
                (hit.final_score - want).abs() < 1e-9,
                "doc {} score {} != {want}",
                hit.doc_id,
                hit.final_score
            );
        }
    }

    #[test]
    fn rrf_is_deterministic_under_ties() {
        let f = fusion(FusionStrategy::Rrf);
        // Docs 10 and 20 get identical RRF mass from symmetric ranks.
        let dense = vec![(10, 0.9), (20, 0.8)];
        let sparse = vec![(20, 5.0), (10, 4.0)];
        let first = f.fuse(&dense, &sparse, 10, &mixed_query());
        for _ in 0..10 {
            let again = f.fuse(&dense, &sparse, 10, &mixed_query());
            let a: Vec<i64> = first.iter().map(|h| h.doc_id).collect();
            let b: Vec<i64> = again.iter().map(|h| h.doc_id).collect();
            assert_eq!(a, b);
        }
        // Tie broken by better dense rank.
        assert_eq!(first[0].doc_id, 10);
    }

    #[test]
    fn weighted_missing_contributions_are_zero() {
        let f = fusion(FusionStrategy::Weighted);
        let dense = vec![(1, 1.0)];
        let sparse = vec![(2, 8.0), (3, 2.0)];
        let hits = f.fuse(&dense, &sparse, 10, &mixed_query());

        let d1 = hits.iter().find(|h| h.doc_id == 1).unwrap();
        assert!((d1.final_score - 0.7).abs() < 1e-9);
        // Sparse min-max: 8.0 -> 1.0, 2.0 -> 0.0.
        let d2 = hits.iter().find(|h| h.doc_id == 2).unwrap();
        assert!((d2.final_score - 0.3).abs() < 1e-9);
        let d3 = hits.iter().find(|h| h.doc_id == 3).unwrap();
        assert!(d3.final_score.abs() < 1e-9);
    }

    #[test]
    fn convex_normalizes_both_lists() {
        let mut params = FusionParams::default();
        params.convex_lambda = 0.5;
        let f = ResultFusion::new(FusionStrategy::Convex, params);
        let dense = vec![(1, 0.9), (2, 0.6)];
        let sparse = vec![(2, 10.0), (1, 5.0)];
        let hits = f.fuse(&dense, &sparse, 10, &mixed_query());

        // doc 1: dense_norm 1.0, sparse_norm 0.0 -> 0.5
        // doc 2: dense_norm 0.0, sparse_norm 1.0 -> 0.5
        // Tied; doc 1 wins on better dense rank.
        assert_eq!(hits[0].doc_id, 1);
        assert!((hits[0].final_score - 0.5).abs() < 1e-9);
        assert!((hits[1].final_score - 0.5).abs() < 1e-9);
    }

    #[test]
    fn interleave_respects_ratio_and_dedups() {
        let f = fusion(FusionStrategy::Interleave);
        let dense = vec![(1, 0.9), (2, 0.8), (3, 0.7)];
        let sparse = vec![(1, 9.0), (4, 5.0), (5, 2.0)];
        let hits = f.fuse(&dense, &sparse, 4, &mixed_query());

        let ids: Vec<i64> = hits.iter().map(|h| h.doc_id).collect();
        // ratio 0.5 over k=4 -> 2 dense slots first, then sparse, doc 1
        // already taken by dense.
        assert_eq!(ids, vec![1, 2, 4, 5]);
        assert_eq!(ids.len(), 4);
    }

    #[test]
    fn interleave_falls_back_when_sparse_exhausted() {
        let f = fusion(FusionStrategy::Interleave);
        let dense = vec![(1, 0.9), (2, 0.8), (3, 0.7), (4, 0.6)];
        let sparse = vec![(5, 1.0)];
        let hits = f.fuse(&dense, &sparse, 4, &mixed_query());
        assert_eq!(hits.len(), 4);
    }

    #[test]
    fn rank_fusion_rewards_presence_in_both() {
        let f = fusion(FusionStrategy::RankFusion);
        let dense = vec![(1, 0.9), (2, 0.8)];
        let sparse = vec![(2, 5.0), (3, 4.0)];
        let hits = f.fuse(&dense, &sparse, 10, &mixed_query());

        let d2 = hits.iter().find(|h| h.doc_id == 2).unwrap();
        // dense rank 2, sparse rank 1, both-lists bias.
        let want = 0.7 / 2.0 + 0.3 / 1.0 + 0.1;
        assert!((d2.final_score - want).abs() < 1e-9);
        assert_eq!(hits[0].doc_id, 2);
    }

    #[test]
    fn score_fusion_borda_counts() {
        let f = fusion(FusionStrategy::ScoreFusion);
        let dense = vec![(1, 0.9), (2, 0.8), (3, 0.7)];
        let sparse = vec![(3, 5.0), (1, 4.0)];
        let hits = f.fuse(&dense, &sparse, 10, &mixed_query());

        let d1 = hits.iter().find(|h| h.doc_id == 1).unwrap();
        // dense: (3 - 1 + 1) * 0.7; sparse: (2 - 2 + 1) * 0.3
        let want = 3.0 * 0.7 + 1.0 * 0.3;
        assert!((d1.final_score - want).abs() < 1e-9);
        assert_eq!(hits[0].doc_id, 1);
    }

    #[test]
    fn cascade_reranks_sparse_candidates_by_dense() {
        let f = fusion(FusionStrategy::Cascade);
        // Sparse surfaces 3 candidates; dense knows 2 of them plus one
        // outsider which must not appear.
        let dense = vec![(9, 0.95), (2, 0.9), (3, 0.4)];
        let sparse = vec![(3, 5.0), (2, 4.0), (4, 3.0)];
        let hits = f.fuse(&dense, &sparse, 2, &mixed_query());

        let ids: Vec<i64> = hits.iter().map(|h| h.doc_id).collect();
        assert_eq!(ids, vec![2, 3], "dense order within the candidate set");
    }

    #[test]
    fn cascade_fills_from_sparse_when_dense_short() {
        let f = fusion(FusionStrategy::Cascade);
        let dense = vec![(2, 0.9)];
        let sparse = vec![(2, 5.0), (3, 4.0), (4, 3.0)];
        let hits = f.fuse(&dense, &sparse, 3, &mixed_query());
        assert_eq!(hits.len(), 3);
        assert!(hits.iter().any(|h| h.doc_id == 3));
        assert!(hits.iter().any(|h| h.doc_id == 4));
    }

    #[test]
    fn hybrid_rrf_uses_short_query_constant() {
        let f = fusion(FusionStrategy::HybridRrf);
        let dense = vec![(1, 0.9)];
        let sparse = vec![(2, 5.0)];
        let short = analyze_query("jazz");
        let hits = f.fuse(&dense, &sparse, 10, &short);

        // rrf_k = 30 for a 1-token query, plus the single-list diversity
        // bonus on both docs.
        let want = 1.0 / 31.0 + 0.1;
        assert!((hits[0].final_score - want).abs() < 1e-9);
    }

    #[test]
    fn hybrid_rrf_bonus_skips_both_list_items() {
        let f = fusion(FusionStrategy::HybridRrf);
        let dense = vec![(1, 0.9), (2, 0.8)];
        let sparse = vec![(1, 5.0)];
        let short = analyze_query("jazz");
        let hits = f.fuse(&dense, &sparse, 10, &short);

        let d1 = hits.iter().find(|h| h.doc_id == 1).unwrap();
        let d2 = hits.iter().find(|h| h.doc_id == 2).unwrap();
        assert!((d1.final_score - (1.0 / 31.0 + 1.0 / 31.0)).abs() < 1e-9);
        assert!((d2.final_score - (1.0 / 32.0 + 0.1)).abs() < 1e-9);
    }

    #[test]
    fn adaptive_dispatches_on_query_kind() {
        let f = fusion(FusionStrategy::Adaptive);
        let dense = vec![(1, 1.0)];
        let sparse = vec![(2, 5.0)];

        // Keyword query favors sparse: doc 2 should win.
        let keyword = analyze_query("jazz");
        let hits = f.fuse(&dense, &sparse, 2, &keyword);
        assert_eq!(hits[0].doc_id, 2);

        // Semantic query favors dense: doc 1 should win.
        let semantic =
            analyze_query("what did the user say they wanted to achieve with their saving plan");
        let hits = f.fuse(&dense, &sparse, 2, &semantic);
        assert_eq!(hits[0].doc_id, 1);
    }

    #[test]
    fn no_duplicate_ids_in_output() {
        for strategy in [
            FusionStrategy::Rrf,
            FusionStrategy::HybridRrf,
            FusionStrategy::Weighted,
            FusionStrategy::Convex,
            FusionStrategy::Interleave,
            FusionStrategy::RankFusion,
            FusionStrategy::ScoreFusion,
            FusionStrategy::Cascade,
            FusionStrategy::Adaptive,
        ] {
            let f = fusion(strategy);
            let dense = vec![(1, 0.9), (2, 0.8), (3, 0.7)];
            let sparse = vec![(2, 5.0), (3, 4.0), (4, 1.0)];
            let hits = f.fuse(&dense, &sparse, 10, &mixed_query());
            let mut ids: Vec<i64> = hits.iter().map(|h| h.doc_id).collect();
            ids.sort_unstable();
            ids.dedup();
            assert_eq!(ids.len(), hits.len(), "{strategy:?} produced duplicates");
        }
    }

    #[test]
    fn strategy_names_round_trip() {
        for name in [
            "rrf",
            "hybrid_rrf",
            "weighted",
            "convex",
            "interleave",
            "rank_fusion",
            "score_fusion",
            "cascade",
            "adaptive",
        ] {
            let strategy = FusionStrategy::from_name(name).unwrap();
            assert_eq!(strategy.name(), name);
        }
        assert!(FusionStrategy::from_name("bogus").is_none());
    }

    #[test]
    fn single_sparse_hit_keeps_full_weight() {
        // A single-element sparse list min-max normalizes to 1.0, not 0.0.
        let normalized = min_max_normalize(&[(7, 3.2)]);
        assert_eq!(normalized, vec![(7, 1.0)]);
    }
}
