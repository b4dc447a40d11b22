// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recall engine: dense + sparse retrieval, fusion, weighted re-scoring.
//!
//! Recall degrades instead of failing: a dense-side error falls back to
//! sparse-only and a sparse-side error to dense-only, either way with the
//! `degraded` flag set; only when both sides fail does the call return an
//! error. The post-recall `touch` runs as a detached task so recall
//! latency never includes it.

use std::sync::Arc;
use std::time::Duration;

use mnemo_config::{FusionConfig, RecallEngineConfig};
use mnemo_core::{
    ComponentScores, EmbeddingProvider, MemoryStatus, MnemoError, RecallHit, Result,
};
use mnemo_retrieval::{
    analyze_query, DenseRetriever, FusionParams, FusionStrategy, ResultFusion, SparseSearch,
};
use mnemo_storage::{MemoryStore, ScanFilter};
use tracing::{debug, error, warn};

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Final scoring strategy for recall.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecallStrategy {
    Similarity,
    Weighted,
}

/// Which retrievers participate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RetrievalMode {
    Hybrid,
    Dense,
    Sparse,
}

/// Result of one recall call.
#[derive(Debug)]
pub struct RecallOutcome {
    pub hits: Vec<RecallHit>,
    /// True when one retrieval side failed and only the other's results
    /// are present.
    pub degraded: bool,
}

impl RecallOutcome {
    fn empty() -> Self {
        Self {
            hits: vec![],
            degraded: false,
        }
    }
}

/// Orchestrates dense + sparse search, fusion, and final scoring.
pub struct RecallEngine {
    config: RecallEngineConfig,
    strategy: RecallStrategy,
    mode: RetrievalMode,
    storage: MemoryStore,
    dense: DenseRetriever,
    sparse: Arc<dyn SparseSearch>,
    fusion: ResultFusion,
}

impl RecallEngine {
    pub fn new(
        config: RecallEngineConfig,
        fusion_config: &FusionConfig,
        storage: MemoryStore,
        embedder: Arc<dyn EmbeddingProvider>,
        sparse: Arc<dyn SparseSearch>,
    ) -> Result<Self> {
        let strategy = match config.recall_strategy.as_str() {
            "similarity" => RecallStrategy::Similarity,
            "weighted" => RecallStrategy::Weighted,
            other => {
                return Err(MnemoError::Config(format!(
                    "unknown recall strategy `{other}`"
                )))
            }
        };
        let mode = match config.retrieval_mode.as_str() {
            "hybrid" => RetrievalMode::Hybrid,
            "dense" => RetrievalMode::Dense,
            "sparse" => RetrievalMode::Sparse,
            other => {
                return Err(MnemoError::Config(format!(
                    "unknown retrieval mode `{other}`"
                )))
            }
        };
        let fusion_strategy = FusionStrategy::from_name(&fusion_config.strategy)
            .ok_or_else(|| {
                MnemoError::Config(format!(
                    "unknown fusion strategy `{}`",
                    fusion_config.strategy
                ))
            })?;

        if strategy == RecallStrategy::Weighted {
            let sum = config.similarity_weight + config.importance_weight + config.recency_weight;
            if (sum - 1.0).abs() > 0.01 {
                warn!(
                    sum,
                    "recall weights do not sum to 1; scores will not be renormalized"
                );
            }
        }

        let params = FusionParams {
            rrf_k: fusion_config.rrf_k,
            dense_weight: fusion_config.dense_weight,
            sparse_weight: fusion_config.sparse_weight,
            convex_lambda: fusion_config.convex_lambda,
            interleave_ratio: fusion_config.interleave_ratio,
            rank_bias_factor: fusion_config.rank_bias_factor,
            diversity_bonus: fusion_config.diversity_bonus,
        };

        let dense = DenseRetriever::new(storage.clone(), embedder);
        Ok(Self {
            config,
            strategy,
            mode,
            storage,
            dense,
            sparse,
            fusion: ResultFusion::new(fusion_strategy, params),
        })
    }

    /// Recall up to `k` memories relevant to `query` under `filter`.
    ///
    /// `now` is unix seconds, used for recency scoring and the access
    /// touch.
    pub async fn recall(
        &self,
        query: &str,
        k: Option<usize>,
        filter: &ScanFilter,
        now: i64,
    ) -> Result<RecallOutcome> {
        let k = k.unwrap_or(self.config.top_k);
        if k == 0 || query.trim().is_empty() {
            return Ok(RecallOutcome::empty());
        }
        let over_k = (k * 4).max(20);
        let query_info = analyze_query(query);

        let mut degraded = false;
        let (dense_results, sparse_results) = match self.mode {
            RetrievalMode::Hybrid => {
                let (dense_res, sparse_res) = tokio::join!(
                    self.dense_with_deadline(query, over_k, filter),
                    self.sparse_search(query, over_k, filter),
                );
                match (dense_res, sparse_res) {
                    (Ok(dense_hits), Ok(sparse_hits)) => (dense_hits, sparse_hits),
                    (Ok(dense_hits), Err(e)) => {
                        warn!(error = %e, "sparse search failed, degrading to dense-only");
                        degraded = true;
                        (dense_hits, vec![])
                    }
                    (Err(e), Ok(sparse_hits)) if self.sparse.enabled() => {
                        warn!(error = %e, "dense search failed, degrading to sparse-only");
                        degraded = true;
                        (vec![], sparse_hits)
                    }
                    (Err(e), Ok(_)) => return Err(e),
                    (Err(dense_err), Err(sparse_err)) => {
                        warn!(error = %sparse_err, "sparse search failed alongside dense");
                        return Err(dense_err);
                    }
                }
            }
            RetrievalMode::Dense => (
                self.dense_with_deadline(query, over_k, filter).await?,
                vec![],
            ),
            RetrievalMode::Sparse => (vec![], self.sparse_search(query, over_k, filter).await?),
        };

        if dense_results.is_empty() && sparse_results.is_empty() {
            return Ok(RecallOutcome { hits: vec![], degraded });
        }

        let fused = self
            .fusion
            .fuse(&dense_results, &sparse_results, k * 2, &query_info);

        let ids: Vec<i64> = fused.iter().map(|h| h.doc_id).collect();
        let records = self.storage.get_many(&ids).await?;
        let by_id: std::collections::HashMap<i64, _> =
            records.into_iter().map(|r| (r.doc_id, r)).collect();

        let mut hits: Vec<RecallHit> = Vec::with_capacity(fused.len());
        for fh in fused {
            // Rows deleted between fusion and fetch are simply dropped.
            let Some(record) = by_id.get(&fh.doc_id) else {
                continue;
            };
            if record.status != MemoryStatus::Active || !filter.matches(record) {
                continue;
            }

            let (final_score, recency) = match self.strategy {
                RecallStrategy::Similarity => (fh.final_score, None),
                RecallStrategy::Weighted => {
                    let age_days =
                        (now - record.last_access_time).max(0) as f64 / SECONDS_PER_DAY;
                    let recency = (-age_days / self.config.recency_tau_days).exp();
                    let score = self.config.similarity_weight * fh.final_score
                        + self.config.importance_weight * record.importance
                        + self.config.recency_weight * recency;
                    (score, Some(recency))
                }
            };

            hits.push(RecallHit {
                doc_id: record.doc_id,
                content: record.content.clone(),
                event_type: record.event_type,
                importance: record.importance,
                last_access_time: record.last_access_time,
                final_score,
                component_scores: ComponentScores {
                    dense: fh.dense_score,
                    sparse: fh.sparse_score,
                    recency,
                },
            });
        }

        hits.sort_by(|a, b| {
            b.final_score
                .partial_cmp(&a.final_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.doc_id.cmp(&b.doc_id))
        });
        hits.truncate(k);

        // Best-effort access bookkeeping off the recall path.
        let touched: Vec<i64> = hits.iter().map(|h| h.doc_id).collect();
        if !touched.is_empty() {
            let storage = self.storage.clone();
            tokio::spawn(async move {
                if let Err(e) = storage.touch(&touched, now).await {
                    error!(error = %e, "recall touch failed");
                }
            });
        }

        debug!(hits = hits.len(), degraded, "recall complete");
        Ok(RecallOutcome { hits, degraded })
    }

    /// Dense search under the configured per-call deadline. A timeout is
    /// treated like any other dense failure: hybrid recall degrades.
    async fn dense_with_deadline(
        &self,
        query: &str,
        over_k: usize,
        filter: &ScanFilter,
    ) -> Result<Vec<(i64, f64)>> {
        let deadline = Duration::from_secs(self.config.request_timeout_secs);
        match tokio::time::timeout(deadline, self.dense.search(query, over_k, filter)).await {
            Ok(result) => result,
            Err(_) => Err(MnemoError::Timeout { duration: deadline }),
        }
    }

    /// Sparse search plus the metadata filter the BM25 index cannot apply
    /// itself.
    async fn sparse_search(
        &self,
        query: &str,
        over_k: usize,
        filter: &ScanFilter,
    ) -> Result<Vec<(i64, f64)>> {
        let raw = self.sparse.search(query, over_k)?;
        if raw.is_empty() {
            return Ok(vec![]);
        }
        let ids: Vec<i64> = raw.iter().map(|(id, _)| *id).collect();
        let records = self.storage.get_many(&ids).await?;
        let allowed: std::collections::HashSet<i64> = records
            .iter()
            .filter(|r| r.status == MemoryStatus::Active && filter.matches(r))
            .map(|r| r.doc_id)
            .collect();
        Ok(raw.into_iter().filter(|(id, _)| allowed.contains(id)).collect())
    }
}
