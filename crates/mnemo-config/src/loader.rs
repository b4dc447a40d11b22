// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports the XDG hierarchy: `./mnemo.toml` > `~/.config/mnemo/mnemo.toml`
//! > `/etc/mnemo/mnemo.toml`, with environment variable overrides via the
//! `MNEMO_` prefix.

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::diagnostic::ConfigError;
use crate::model::MnemoConfig;
use crate::validation::warn_unknown_keys;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/mnemo/mnemo.toml` (system-wide)
/// 3. `~/.config/mnemo/mnemo.toml` (user XDG config)
/// 4. `./mnemo.toml` (local directory)
/// 5. `MNEMO_*` environment variables
pub fn load_config() -> Result<MnemoConfig, ConfigError> {
    extract(
        Figment::new()
            .merge(Serialized::defaults(MnemoConfig::default()))
            .merge(Toml::file("/etc/mnemo/mnemo.toml"))
            .merge(Toml::file(
                dirs::config_dir()
                    .map(|d| d.join("mnemo/mnemo.toml"))
                    .unwrap_or_default(),
            ))
            .merge(Toml::file("mnemo.toml"))
            .merge(env_provider()),
    )
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing and explicit config specification. Unknown keys in the
/// string are reported as warnings before extraction.
pub fn load_config_from_str(toml_content: &str) -> Result<MnemoConfig, ConfigError> {
    if let Ok(raw) = toml_content.parse::<toml::Value>() {
        warn_unknown_keys(&raw);
    }
    extract(
        Figment::new()
            .merge(Serialized::defaults(MnemoConfig::default()))
            .merge(Toml::string(toml_content)),
    )
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<MnemoConfig, ConfigError> {
    if let Ok(content) = std::fs::read_to_string(path)
        && let Ok(raw) = content.parse::<toml::Value>()
    {
        warn_unknown_keys(&raw);
    }
    extract(
        Figment::new()
            .merge(Serialized::defaults(MnemoConfig::default()))
            .merge(Toml::file(path))
            .merge(env_provider()),
    )
}

fn extract(figment: Figment) -> Result<MnemoConfig, ConfigError> {
    figment.extract().map_err(|e| ConfigError::Load {
        message: e.to_string(),
    })
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names: `MNEMO_RECALL_ENGINE_TOP_K` must map to
/// `recall_engine.top_k`, not `recall.engine.top.k`.
fn env_provider() -> Env {
    Env::prefixed("MNEMO_").map(|key| {
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("storage_", "storage.", 1)
            .replacen("session_manager_", "session_manager.", 1)
            .replacen("recall_engine_", "recall_engine.", 1)
            .replacen("reflection_engine_", "reflection_engine.", 1)
            .replacen("forgetting_agent_", "forgetting_agent.", 1)
            .replacen("fusion_", "fusion.", 1)
            .replacen("sparse_retriever_", "sparse_retriever.", 1)
            .replacen("filtering_settings_", "filtering_settings.", 1);
        mapped.into()
    })
}
