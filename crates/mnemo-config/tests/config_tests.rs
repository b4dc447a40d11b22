// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for configuration loading and validation.

use mnemo_config::{load_config_from_str, validate_config, MnemoConfig};

#[test]
fn empty_config_yields_defaults() {
    let config = load_config_from_str("").unwrap();
    assert_eq!(config.timezone, "UTC");
    assert_eq!(config.recall_engine.top_k, 5);
    assert_eq!(config.recall_engine.recall_strategy, "weighted");
    assert_eq!(config.recall_engine.retrieval_mode, "hybrid");
    assert_eq!(config.reflection_engine.summary_trigger_rounds, 10);
    assert!((config.reflection_engine.importance_threshold - 0.5).abs() < f64::EPSILON);
    assert!(config.forgetting_agent.enabled);
    assert_eq!(config.forgetting_agent.check_interval_hours, 24);
    assert!((config.forgetting_agent.retention_days - 90.0).abs() < f64::EPSILON);
    assert!((config.forgetting_agent.importance_decay_rate - 0.005).abs() < f64::EPSILON);
    assert_eq!(config.fusion.strategy, "rrf");
    assert!((config.fusion.rrf_k - 60.0).abs() < f64::EPSILON);
    assert!((config.sparse_retriever.bm25_k1 - 1.2).abs() < f64::EPSILON);
    assert!((config.sparse_retriever.bm25_b - 0.75).abs() < f64::EPSILON);
    assert_eq!(config.session_manager.max_sessions, 1000);
    assert!(config.filtering_settings.use_persona_filtering);
    assert!(config.filtering_settings.use_session_filtering);
}

#[test]
fn partial_section_keeps_other_defaults() {
    let config = load_config_from_str(
        r#"
[recall_engine]
top_k = 8
recall_strategy = "similarity"

[fusion]
strategy = "hybrid_rrf"
diversity_bonus = 0.25
"#,
    )
    .unwrap();
    assert_eq!(config.recall_engine.top_k, 8);
    assert_eq!(config.recall_engine.recall_strategy, "similarity");
    // Untouched keys fall back to defaults.
    assert!((config.recall_engine.similarity_weight - 0.6).abs() < f64::EPSILON);
    assert_eq!(config.fusion.strategy, "hybrid_rrf");
    assert!((config.fusion.diversity_bonus - 0.25).abs() < f64::EPSILON);
    assert!((config.fusion.rrf_k - 60.0).abs() < f64::EPSILON);
}

#[test]
fn unknown_keys_do_not_fail_loading() {
    let config = load_config_from_str(
        r#"
some_future_section = { x = 1 }

[recall_engine]
top_k = 3
not_a_real_key = true
"#,
    )
    .unwrap();
    assert_eq!(config.recall_engine.top_k, 3);
}

#[test]
fn loaded_config_passes_validation() {
    let config = load_config_from_str(
        r#"
timezone = "local"

[forgetting_agent]
retention_days = 30.0
importance_decay_rate = 0.01
importance_threshold = 0.1

[sparse_retriever]
use_word_segmentation = true
"#,
    )
    .unwrap();
    assert!(validate_config(&config).is_ok());
    assert!((config.forgetting_agent.retention_days - 30.0).abs() < f64::EPSILON);
    assert!(config.sparse_retriever.use_word_segmentation);
}

#[test]
fn invalid_strategy_caught_by_validation_not_loading() {
    let config = load_config_from_str(
        r#"
[fusion]
strategy = "majority_vote"
"#,
    )
    .unwrap();
    let errors = validate_config(&config).unwrap_err();
    assert!(!errors.is_empty());
}

#[test]
fn prompt_overrides_are_optional_strings() {
    let config = MnemoConfig::default();
    assert!(config.reflection_engine.event_extraction_prompt.is_none());

    let config = load_config_from_str(
        r#"
[reflection_engine]
event_extraction_prompt = "Extract the key events."
evaluation_prompt = "Score each memory."
"#,
    )
    .unwrap();
    assert_eq!(
        config.reflection_engine.event_extraction_prompt.as_deref(),
        Some("Extract the key events.")
    );
    assert_eq!(
        config.reflection_engine.evaluation_prompt.as_deref(),
        Some("Score each memory.")
    );
}

#[test]
fn type_mismatch_fails_loading() {
    let result = load_config_from_str(
        r#"
[recall_engine]
top_k = "five"
"#,
    );
    assert!(result.is_err());
}
