// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes, and reports unknown keys as warnings with fuzzy suggestions.

use tracing::warn;

use crate::diagnostic::{suggest_key, ConfigError};
use crate::model::MnemoConfig;

/// Strategy names accepted by `fusion.strategy`.
pub const FUSION_STRATEGIES: &[&str] = &[
    "rrf",
    "hybrid_rrf",
    "weighted",
    "convex",
    "interleave",
    "rank_fusion",
    "score_fusion",
    "cascade",
    "adaptive",
];

/// Strategy names accepted by `recall_engine.recall_strategy`.
pub const RECALL_STRATEGIES: &[&str] = &["similarity", "weighted"];

/// Mode names accepted by `recall_engine.retrieval_mode`.
pub const RETRIEVAL_MODES: &[&str] = &["hybrid", "dense", "sparse"];

const TOP_LEVEL_KEYS: &[&str] = &[
    "timezone",
    "storage",
    "session_manager",
    "recall_engine",
    "reflection_engine",
    "forgetting_agent",
    "fusion",
    "sparse_retriever",
    "filtering_settings",
];

fn section_keys(section: &str) -> Option<&'static [&'static str]> {
    match section {
        "storage" => Some(&["database_path"]),
        "session_manager" => Some(&["max_sessions", "session_ttl", "max_history_messages"]),
        "recall_engine" => Some(&[
            "top_k",
            "recall_strategy",
            "retrieval_mode",
            "similarity_weight",
            "importance_weight",
            "recency_weight",
            "recency_tau_days",
            "request_timeout_secs",
        ]),
        "reflection_engine" => Some(&[
            "summary_trigger_rounds",
            "importance_threshold",
            "event_extraction_prompt",
            "evaluation_prompt",
            "max_retries",
            "request_timeout_secs",
        ]),
        "forgetting_agent" => Some(&[
            "enabled",
            "check_interval_hours",
            "retention_days",
            "importance_decay_rate",
            "importance_threshold",
            "forgetting_batch_size",
            "nuke_delay_secs",
        ]),
        "fusion" => Some(&[
            "strategy",
            "rrf_k",
            "dense_weight",
            "sparse_weight",
            "convex_lambda",
            "interleave_ratio",
            "rank_bias_factor",
            "diversity_bonus",
        ]),
        "sparse_retriever" => Some(&["enabled", "bm25_k1", "bm25_b", "use_word_segmentation"]),
        "filtering_settings" => Some(&["use_persona_filtering", "use_session_filtering"]),
        _ => None,
    }
}

/// Walk a raw TOML document and warn about every key the engine does not
/// recognize. Unknown keys are ignored, not fatal.
///
/// Returns the list of warnings for callers that want to surface them.
pub fn warn_unknown_keys(raw: &toml::Value) -> Vec<ConfigError> {
    let mut warnings = Vec::new();
    let Some(table) = raw.as_table() else {
        return warnings;
    };

    for (key, value) in table {
        if !TOP_LEVEL_KEYS.contains(&key.as_str()) {
            warnings.push(ConfigError::UnknownKey {
                key: key.clone(),
                suggestion: suggest_key(key, TOP_LEVEL_KEYS),
            });
            continue;
        }
        let Some(valid) = section_keys(key) else {
            continue;
        };
        let Some(section) = value.as_table() else {
            continue;
        };
        for inner in section.keys() {
            if !valid.contains(&inner.as_str()) {
                warnings.push(ConfigError::UnknownKey {
                    key: format!("{key}.{inner}"),
                    suggestion: suggest_key(inner, valid),
                });
            }
        }
    }

    for w in &warnings {
        warn!("{w}");
    }
    warnings
}

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns all collected validation errors rather than failing fast.
pub fn validate_config(config: &MnemoConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let mut push = |message: String| {
        errors.push(ConfigError::Validation { message });
    };

    let tz = config.timezone.trim();
    if !tz.eq_ignore_ascii_case("utc") && !tz.eq_ignore_ascii_case("local") {
        push(format!("timezone must be `UTC` or `local`, got `{tz}`"));
    }

    if config.storage.database_path.trim().is_empty() {
        push("storage.database_path must not be empty".to_string());
    }

    if config.session_manager.max_sessions == 0 {
        push("session_manager.max_sessions must be at least 1".to_string());
    }

    if config.recall_engine.top_k == 0 {
        push("recall_engine.top_k must be at least 1".to_string());
    }
    if !RECALL_STRATEGIES.contains(&config.recall_engine.recall_strategy.as_str()) {
        push(format!(
            "recall_engine.recall_strategy must be one of {RECALL_STRATEGIES:?}, got `{}`",
            config.recall_engine.recall_strategy
        ));
    }
    if !RETRIEVAL_MODES.contains(&config.recall_engine.retrieval_mode.as_str()) {
        push(format!(
            "recall_engine.retrieval_mode must be one of {RETRIEVAL_MODES:?}, got `{}`",
            config.recall_engine.retrieval_mode
        ));
    }
    for (name, value) in [
        ("similarity_weight", config.recall_engine.similarity_weight),
        ("importance_weight", config.recall_engine.importance_weight),
        ("recency_weight", config.recall_engine.recency_weight),
    ] {
        if !(0.0..=1.0).contains(&value) {
            push(format!("recall_engine.{name} must be in [0, 1], got {value}"));
        }
    }
    if config.recall_engine.recency_tau_days <= 0.0 {
        push(format!(
            "recall_engine.recency_tau_days must be positive, got {}",
            config.recall_engine.recency_tau_days
        ));
    }

    if config.reflection_engine.summary_trigger_rounds == 0 {
        push("reflection_engine.summary_trigger_rounds must be at least 1".to_string());
    }
    if !(0.0..=1.0).contains(&config.reflection_engine.importance_threshold) {
        push(format!(
            "reflection_engine.importance_threshold must be in [0, 1], got {}",
            config.reflection_engine.importance_threshold
        ));
    }

    if config.forgetting_agent.check_interval_hours == 0 {
        push("forgetting_agent.check_interval_hours must be at least 1".to_string());
    }
    if config.forgetting_agent.retention_days < 0.0 {
        push(format!(
            "forgetting_agent.retention_days must be non-negative, got {}",
            config.forgetting_agent.retention_days
        ));
    }
    if !(0.0..1.0).contains(&config.forgetting_agent.importance_decay_rate) {
        push(format!(
            "forgetting_agent.importance_decay_rate must be in [0, 1), got {}",
            config.forgetting_agent.importance_decay_rate
        ));
    }
    if !(0.0..=1.0).contains(&config.forgetting_agent.importance_threshold) {
        push(format!(
            "forgetting_agent.importance_threshold must be in [0, 1], got {}",
            config.forgetting_agent.importance_threshold
        ));
    }
    if config.forgetting_agent.forgetting_batch_size == 0 {
        push("forgetting_agent.forgetting_batch_size must be at least 1".to_string());
    }

    if !FUSION_STRATEGIES.contains(&config.fusion.strategy.as_str()) {
        push(format!(
            "fusion.strategy must be one of {FUSION_STRATEGIES:?}, got `{}`",
            config.fusion.strategy
        ));
    }
    if config.fusion.rrf_k <= 0.0 {
        push(format!("fusion.rrf_k must be positive, got {}", config.fusion.rrf_k));
    }
    for (name, value) in [
        ("convex_lambda", config.fusion.convex_lambda),
        ("interleave_ratio", config.fusion.interleave_ratio),
    ] {
        if !(0.0..=1.0).contains(&value) {
            push(format!("fusion.{name} must be in [0, 1], got {value}"));
        }
    }
    for (name, value) in [
        ("dense_weight", config.fusion.dense_weight),
        ("sparse_weight", config.fusion.sparse_weight),
        ("rank_bias_factor", config.fusion.rank_bias_factor),
        ("diversity_bonus", config.fusion.diversity_bonus),
    ] {
        if value < 0.0 {
            push(format!("fusion.{name} must be non-negative, got {value}"));
        }
    }

    if config.sparse_retriever.bm25_k1 <= 0.0 {
        push(format!(
            "sparse_retriever.bm25_k1 must be positive, got {}",
            config.sparse_retriever.bm25_k1
        ));
    }
    if !(0.0..=1.0).contains(&config.sparse_retriever.bm25_b) {
        push(format!(
            "sparse_retriever.bm25_b must be in [0, 1], got {}",
            config.sparse_retriever.bm25_b
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        let config = MnemoConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn bad_fusion_strategy_fails() {
        let mut config = MnemoConfig::default();
        config.fusion.strategy = "telepathy".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains("fusion.strategy"))));
    }

    #[test]
    fn bad_recall_strategy_fails() {
        let mut config = MnemoConfig::default();
        config.recall_engine.recall_strategy = "vibes".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn out_of_range_decay_rate_fails() {
        let mut config = MnemoConfig::default();
        config.forgetting_agent.importance_decay_rate = 1.0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn collects_multiple_errors() {
        let mut config = MnemoConfig::default();
        config.recall_engine.top_k = 0;
        config.storage.database_path = String::new();
        config.sparse_retriever.bm25_b = 2.0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn unknown_top_level_key_warns() {
        let raw: toml::Value = r#"
memoryy = 3

[recall_engine]
top_k = 5
"#
        .parse()
        .unwrap();
        let warnings = warn_unknown_keys(&raw);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].to_string().contains("memoryy"));
    }

    #[test]
    fn unknown_section_key_warns_with_suggestion() {
        let raw: toml::Value = r#"
[recall_engine]
topk = 5
"#
        .parse()
        .unwrap();
        let warnings = warn_unknown_keys(&raw);
        assert_eq!(warnings.len(), 1);
        let rendered = warnings[0].to_string();
        assert!(rendered.contains("recall_engine.topk"));
        assert!(rendered.contains("top_k"));
    }

    #[test]
    fn known_keys_produce_no_warnings() {
        let raw: toml::Value = r#"
timezone = "UTC"

[fusion]
strategy = "adaptive"
rrf_k = 60.0

[sparse_retriever]
use_word_segmentation = true
"#
        .parse()
        .unwrap();
        assert!(warn_unknown_keys(&raw).is_empty());
    }
}
