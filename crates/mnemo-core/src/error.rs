// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the mnemo memory engine.

use thiserror::Error;

/// Convenience alias used across all mnemo crates.
pub type Result<T> = std::result::Result<T, MnemoError>;

/// The primary error type used across the memory engine.
#[derive(Debug, Error)]
pub enum MnemoError {
    /// Configuration errors (invalid TOML, bad values, missing required fields).
    /// Surfaced at startup and aborts initialization.
    #[error("configuration error: {0}")]
    Config(String),

    /// LLM or embedding provider errors (API failure, connection loss).
    /// Transient; retried by reflection, degraded around by recall.
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Provider returned output that could not be parsed into the expected
    /// structure. Retried; a final failure discards the batch.
    #[error("malformed provider output: {0}")]
    MalformedOutput(String),

    /// Storage backend errors (database connection, query failure).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A write failed due to a concurrent conflicting change.
    #[error("storage conflict: {0}")]
    Conflict(String),

    /// Storage invariants were violated on load. The store refuses to open.
    #[error("storage corrupted: {0}")]
    Corrupted(String),

    /// An operation targeted a document id that does not exist.
    /// Treated as a soft skip by callers, never fatal.
    #[error("document {doc_id} not found")]
    NotFound { doc_id: i64 },

    /// Operation exceeded its deadline.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Operation was cancelled before completion.
    #[error("operation cancelled")]
    Cancelled,

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl MnemoError {
    /// Wrap an arbitrary error as a storage error.
    pub fn storage<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        MnemoError::Storage {
            source: Box::new(source),
        }
    }

    /// Build a provider error from a message alone.
    pub fn provider(message: impl Into<String>) -> Self {
        MnemoError::Provider {
            message: message.into(),
            source: None,
        }
    }

    /// Whether a retry may succeed for this error.
    ///
    /// Provider failures, malformed output and timeouts are transient;
    /// storage conflicts may resolve once the competing write commits.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            MnemoError::Provider { .. }
                | MnemoError::MalformedOutput(_)
                | MnemoError::Conflict(_)
                | MnemoError::Timeout { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(MnemoError::provider("down").is_retryable());
        assert!(MnemoError::MalformedOutput("not json".into()).is_retryable());
        assert!(MnemoError::Conflict("busy".into()).is_retryable());
        assert!(!MnemoError::Config("bad key".into()).is_retryable());
        assert!(!MnemoError::NotFound { doc_id: 7 }.is_retryable());
        assert!(!MnemoError::Cancelled.is_retryable());
    }

    #[test]
    fn display_includes_context() {
        let err = MnemoError::NotFound { doc_id: 42 };
        assert_eq!(err.to_string(), "document 42 not found");

        let err = MnemoError::Corrupted("vector missing for doc 3".into());
        assert!(err.to_string().contains("vector missing"));
    }
}
