// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration diagnostics with fuzzy match suggestions.
//!
//! Unknown keys produce "did you mean?" hints using Jaro-Winkler string
//! similarity, so typos like `max_sesions` point at `max_sessions`.

use thiserror::Error;

/// Minimum Jaro-Winkler similarity score to suggest a correction.
/// 0.75 catches common typos while filtering noise.
const SUGGESTION_THRESHOLD: f64 = 0.75;

/// A configuration problem found during loading or validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An unknown key was found in the configuration. Non-fatal: the key is
    /// ignored after a warning.
    #[error("unknown configuration key `{key}`{}", format_suggestion(suggestion.as_deref()))]
    UnknownKey {
        /// The unrecognized key name, dotted with its section.
        key: String,
        /// Suggested correction via fuzzy matching, if any.
        suggestion: Option<String>,
    },

    /// A deserialization failure from the underlying loader.
    #[error("failed to load configuration: {message}")]
    Load { message: String },

    /// A semantic constraint on a config value was violated.
    #[error("validation error: {message}")]
    Validation { message: String },
}

fn format_suggestion(suggestion: Option<&str>) -> String {
    match suggestion {
        Some(s) => format!(" (did you mean `{s}`?)"),
        None => String::new(),
    }
}

/// Find the closest valid key to an unknown one, if any is close enough.
pub fn suggest_key(unknown: &str, valid_keys: &[&str]) -> Option<String> {
    valid_keys
        .iter()
        .map(|key| (*key, strsim::jaro_winkler(unknown, key)))
        .filter(|(_, score)| *score >= SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(key, _)| key.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suggests_close_typo() {
        let valid = ["max_sessions", "session_ttl", "max_history_messages"];
        assert_eq!(
            suggest_key("max_sesions", &valid),
            Some("max_sessions".to_string())
        );
    }

    #[test]
    fn no_suggestion_for_distant_key() {
        let valid = ["max_sessions", "session_ttl"];
        assert_eq!(suggest_key("zzzzzz", &valid), None);
    }

    #[test]
    fn unknown_key_display_includes_hint() {
        let err = ConfigError::UnknownKey {
            key: "recall_engine.topk".to_string(),
            suggestion: Some("top_k".to_string()),
        };
        let rendered = err.to_string();
        assert!(rendered.contains("recall_engine.topk"));
        assert!(rendered.contains("did you mean `top_k`"));
    }
}
