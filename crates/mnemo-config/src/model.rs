// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the mnemo memory engine.
//!
//! Unlike strict schemas, unknown keys are tolerated during deserialization
//! and reported as warnings by [`crate::validation::warn_unknown_keys`], so
//! a config written for a newer engine still loads.

use serde::{Deserialize, Serialize};

/// Top-level mnemo configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with environment
/// variable overrides. All sections are optional and default to sensible
/// values.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MnemoConfig {
    /// Timezone used when formatting timestamps for prompt injection
    /// (`"UTC"` or `"local"`).
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Session buffer settings.
    #[serde(default)]
    pub session_manager: SessionManagerConfig,

    /// Recall pipeline settings.
    #[serde(default)]
    pub recall_engine: RecallEngineConfig,

    /// Reflection pipeline settings.
    #[serde(default)]
    pub reflection_engine: ReflectionEngineConfig,

    /// Background forgetting settings.
    #[serde(default)]
    pub forgetting_agent: ForgettingAgentConfig,

    /// Result fusion settings.
    #[serde(default)]
    pub fusion: FusionConfig,

    /// BM25 sparse retriever settings.
    #[serde(default)]
    pub sparse_retriever: SparseRetrieverConfig,

    /// Persona / session isolation settings.
    #[serde(default)]
    pub filtering_settings: FilteringConfig,
}

impl Default for MnemoConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            storage: StorageConfig::default(),
            session_manager: SessionManagerConfig::default(),
            recall_engine: RecallEngineConfig::default(),
            reflection_engine: ReflectionEngineConfig::default(),
            forgetting_agent: ForgettingAgentConfig::default(),
            fusion: FusionConfig::default(),
            sparse_retriever: SparseRetrieverConfig::default(),
            filtering_settings: FilteringConfig::default(),
        }
    }
}

fn default_timezone() -> String {
    "UTC".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

fn default_database_path() -> String {
    "mnemo.db".to_string()
}

/// Session buffer configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionManagerConfig {
    /// LRU capacity: maximum number of concurrently tracked sessions.
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    /// Seconds of inactivity after which a session buffer expires.
    #[serde(default = "default_session_ttl")]
    pub session_ttl: u64,

    /// Upper bound on buffered messages per session. Prevents unbounded
    /// growth when reflection is disabled.
    #[serde(default = "default_max_history_messages")]
    pub max_history_messages: usize,
}

impl Default for SessionManagerConfig {
    fn default() -> Self {
        Self {
            max_sessions: default_max_sessions(),
            session_ttl: default_session_ttl(),
            max_history_messages: default_max_history_messages(),
        }
    }
}

fn default_max_sessions() -> usize {
    1000
}

fn default_session_ttl() -> u64 {
    3600
}

fn default_max_history_messages() -> usize {
    40
}

/// Recall pipeline configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RecallEngineConfig {
    /// Default number of memories returned by recall.
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Final scoring strategy: `"similarity"` or `"weighted"`.
    #[serde(default = "default_recall_strategy")]
    pub recall_strategy: String,

    /// Retrieval mode: `"hybrid"`, `"dense"`, or `"sparse"`.
    #[serde(default = "default_retrieval_mode")]
    pub retrieval_mode: String,

    /// Weight of the fused similarity score under the weighted strategy.
    #[serde(default = "default_similarity_weight")]
    pub similarity_weight: f64,

    /// Weight of stored importance under the weighted strategy.
    #[serde(default = "default_importance_weight")]
    pub importance_weight: f64,

    /// Weight of recency under the weighted strategy.
    #[serde(default = "default_recency_weight")]
    pub recency_weight: f64,

    /// Recency decay time constant in days: `recency = exp(-age / tau)`.
    #[serde(default = "default_recency_tau_days")]
    pub recency_tau_days: f64,

    /// Per-call deadline for embedding the query, in seconds.
    #[serde(default = "default_recall_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for RecallEngineConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            recall_strategy: default_recall_strategy(),
            retrieval_mode: default_retrieval_mode(),
            similarity_weight: default_similarity_weight(),
            importance_weight: default_importance_weight(),
            recency_weight: default_recency_weight(),
            recency_tau_days: default_recency_tau_days(),
            request_timeout_secs: default_recall_timeout(),
        }
    }
}

fn default_top_k() -> usize {
    5
}

fn default_recall_strategy() -> String {
    "weighted".to_string()
}

fn default_retrieval_mode() -> String {
    "hybrid".to_string()
}

fn default_similarity_weight() -> f64 {
    0.6
}

fn default_importance_weight() -> f64 {
    0.2
}

fn default_recency_weight() -> f64 {
    0.2
}

fn default_recency_tau_days() -> f64 {
    30.0
}

fn default_recall_timeout() -> u64 {
    10
}

/// Reflection pipeline configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReflectionEngineConfig {
    /// Completed rounds (user turn + assistant turn) that trigger reflection.
    #[serde(default = "default_summary_trigger_rounds")]
    pub summary_trigger_rounds: u32,

    /// Minimum importance score required to persist an extracted event.
    #[serde(default = "default_reflection_threshold")]
    pub importance_threshold: f64,

    /// Override for the event extraction system prompt.
    #[serde(default)]
    pub event_extraction_prompt: Option<String>,

    /// Override for the importance evaluation system prompt.
    #[serde(default)]
    pub evaluation_prompt: Option<String>,

    /// Retry attempts for each language model phase.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Per-call deadline for language model requests, in seconds.
    #[serde(default = "default_reflection_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ReflectionEngineConfig {
    fn default() -> Self {
        Self {
            summary_trigger_rounds: default_summary_trigger_rounds(),
            importance_threshold: default_reflection_threshold(),
            event_extraction_prompt: None,
            evaluation_prompt: None,
            max_retries: default_max_retries(),
            request_timeout_secs: default_reflection_timeout(),
        }
    }
}

fn default_summary_trigger_rounds() -> u32 {
    10
}

fn default_reflection_threshold() -> f64 {
    0.5
}

fn default_max_retries() -> u32 {
    3
}

fn default_reflection_timeout() -> u64 {
    60
}

/// Background forgetting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ForgettingAgentConfig {
    /// Whether the periodic pass runs at all.
    #[serde(default = "default_forgetting_enabled")]
    pub enabled: bool,

    /// Hours between periodic passes.
    #[serde(default = "default_check_interval_hours")]
    pub check_interval_hours: u64,

    /// Minimum age in days before a memory is eligible for forgetting.
    #[serde(default = "default_retention_days")]
    pub retention_days: f64,

    /// Per-day multiplicative importance decay rate.
    #[serde(default = "default_decay_rate")]
    pub importance_decay_rate: f64,

    /// Decayed-importance floor below which an eligible memory is deleted.
    #[serde(default = "default_forgetting_threshold")]
    pub importance_threshold: f64,

    /// Page size for the storage scan.
    #[serde(default = "default_forgetting_batch_size")]
    pub forgetting_batch_size: usize,

    /// Seconds between nuke request and fire.
    #[serde(default = "default_nuke_delay_secs")]
    pub nuke_delay_secs: u64,
}

impl Default for ForgettingAgentConfig {
    fn default() -> Self {
        Self {
            enabled: default_forgetting_enabled(),
            check_interval_hours: default_check_interval_hours(),
            retention_days: default_retention_days(),
            importance_decay_rate: default_decay_rate(),
            importance_threshold: default_forgetting_threshold(),
            forgetting_batch_size: default_forgetting_batch_size(),
            nuke_delay_secs: default_nuke_delay_secs(),
        }
    }
}

fn default_forgetting_enabled() -> bool {
    true
}

fn default_check_interval_hours() -> u64 {
    24
}

fn default_retention_days() -> f64 {
    90.0
}

fn default_decay_rate() -> f64 {
    0.005
}

fn default_forgetting_threshold() -> f64 {
    0.1
}

fn default_forgetting_batch_size() -> usize {
    200
}

fn default_nuke_delay_secs() -> u64 {
    30
}

/// Result fusion configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FusionConfig {
    /// Fusion strategy name. One of: `rrf`, `hybrid_rrf`, `weighted`,
    /// `convex`, `interleave`, `rank_fusion`, `score_fusion`, `cascade`,
    /// `adaptive`.
    #[serde(default = "default_fusion_strategy")]
    pub strategy: String,

    /// RRF rank dampening constant.
    #[serde(default = "default_rrf_k")]
    pub rrf_k: f64,

    /// Dense list weight for weighted / rank / score fusion.
    #[serde(default = "default_dense_weight")]
    pub dense_weight: f64,

    /// Sparse list weight for weighted / rank / score fusion.
    #[serde(default = "default_sparse_weight")]
    pub sparse_weight: f64,

    /// Lambda for convex combination: `l*dense + (1-l)*sparse`.
    #[serde(default = "default_convex_lambda")]
    pub convex_lambda: f64,

    /// Fraction of k taken from the dense list when interleaving.
    #[serde(default = "default_interleave_ratio")]
    pub interleave_ratio: f64,

    /// Additive bonus for items present in both lists (rank fusion).
    #[serde(default = "default_rank_bias_factor")]
    pub rank_bias_factor: f64,

    /// Additive bonus for items present in only one list (hybrid RRF).
    #[serde(default = "default_diversity_bonus")]
    pub diversity_bonus: f64,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            strategy: default_fusion_strategy(),
            rrf_k: default_rrf_k(),
            dense_weight: default_dense_weight(),
            sparse_weight: default_sparse_weight(),
            convex_lambda: default_convex_lambda(),
            interleave_ratio: default_interleave_ratio(),
            rank_bias_factor: default_rank_bias_factor(),
            diversity_bonus: default_diversity_bonus(),
        }
    }
}

fn default_fusion_strategy() -> String {
    "rrf".to_string()
}

fn default_rrf_k() -> f64 {
    60.0
}

fn default_dense_weight() -> f64 {
    0.7
}

fn default_sparse_weight() -> f64 {
    0.3
}

fn default_convex_lambda() -> f64 {
    0.5
}

fn default_interleave_ratio() -> f64 {
    0.5
}

fn default_rank_bias_factor() -> f64 {
    0.1
}

fn default_diversity_bonus() -> f64 {
    0.1
}

/// BM25 sparse retriever configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SparseRetrieverConfig {
    /// Whether sparse retrieval participates in recall.
    #[serde(default = "default_sparse_enabled")]
    pub enabled: bool,

    /// BM25 term-frequency saturation parameter.
    #[serde(default = "default_bm25_k1")]
    pub bm25_k1: f64,

    /// BM25 length normalization parameter.
    #[serde(default = "default_bm25_b")]
    pub bm25_b: f64,

    /// Run CJK text through a word segmenter before indexing.
    #[serde(default)]
    pub use_word_segmentation: bool,
}

impl Default for SparseRetrieverConfig {
    fn default() -> Self {
        Self {
            enabled: default_sparse_enabled(),
            bm25_k1: default_bm25_k1(),
            bm25_b: default_bm25_b(),
            use_word_segmentation: false,
        }
    }
}

fn default_sparse_enabled() -> bool {
    true
}

fn default_bm25_k1() -> f64 {
    1.2
}

fn default_bm25_b() -> f64 {
    0.75
}

/// Persona / session isolation configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FilteringConfig {
    /// Restrict recall and reflection to the matching `persona_id`.
    #[serde(default = "default_true")]
    pub use_persona_filtering: bool,

    /// Restrict recall and reflection to the matching `session_id`.
    #[serde(default = "default_true")]
    pub use_session_filtering: bool,
}

impl Default for FilteringConfig {
    fn default() -> Self {
        Self {
            use_persona_filtering: default_true(),
            use_session_filtering: default_true(),
        }
    }
}

fn default_true() -> bool {
    true
}
