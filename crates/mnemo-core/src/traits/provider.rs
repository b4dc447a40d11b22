// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Language model provider trait.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

/// A single completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// User-turn prompt text.
    pub prompt: String,
    /// Optional system prompt prepended by the provider.
    pub system_prompt: Option<String>,
    /// Upper bound on generated tokens.
    pub max_tokens: u32,
    /// Per-call deadline. `None` leaves it to the provider default.
    pub timeout: Option<Duration>,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system_prompt: None,
            max_tokens: 2048,
            timeout: None,
        }
    }

    pub fn with_system_prompt(mut self, system: impl Into<String>) -> Self {
        self.system_prompt = Some(system.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Blocking (non-streaming) language model interface.
///
/// Structured-output parsing is the caller's responsibility; the engine
/// validates and retries on malformed output.
#[async_trait]
pub trait LanguageModelProvider: Send + Sync {
    /// Send a completion request and return the full response text.
    async fn complete(&self, request: CompletionRequest) -> Result<String>;
}
