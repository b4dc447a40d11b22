// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock language model provider for deterministic testing.
//!
//! Responses are popped from a FIFO queue; entries can also be canned
//! failures to exercise retry paths. Every request is logged for
//! assertion.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use mnemo_core::{CompletionRequest, LanguageModelProvider, MnemoError, Result};

/// One queued reply.
#[derive(Debug, Clone)]
pub enum CannedResponse {
    /// Returned as a successful completion.
    Text(String),
    /// Returned as a transient provider error.
    ProviderError(String),
}

/// A mock language model returning pre-configured responses in order.
///
/// When the queue is empty, a default `"mock response"` text is returned.
pub struct MockLanguageModel {
    responses: Mutex<VecDeque<CannedResponse>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl MockLanguageModel {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Pre-load successful text responses.
    pub fn with_responses<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let model = Self::new();
        for r in responses {
            model.push_text(r);
        }
        model
    }

    /// Queue a successful response.
    pub fn push_text(&self, text: impl Into<String>) {
        self.responses
            .lock()
            .expect("mock lock poisoned")
            .push_back(CannedResponse::Text(text.into()));
    }

    /// Queue a transient provider failure.
    pub fn push_error(&self, message: impl Into<String>) {
        self.responses
            .lock()
            .expect("mock lock poisoned")
            .push_back(CannedResponse::ProviderError(message.into()));
    }

    /// All requests received so far, in order.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().expect("mock lock poisoned").clone()
    }

    /// Number of completion calls received.
    pub fn call_count(&self) -> usize {
        self.requests.lock().expect("mock lock poisoned").len()
    }
}

impl Default for MockLanguageModel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LanguageModelProvider for MockLanguageModel {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        self.requests
            .lock()
            .expect("mock lock poisoned")
            .push(request);
        let next = self
            .responses
            .lock()
            .expect("mock lock poisoned")
            .pop_front();
        match next {
            Some(CannedResponse::Text(text)) => Ok(text),
            Some(CannedResponse::ProviderError(message)) => Err(MnemoError::provider(message)),
            None => Ok("mock response".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn responses_come_back_in_order() {
        let model = MockLanguageModel::with_responses(["first", "second"]);
        let req = || CompletionRequest::new("hi");
        assert_eq!(model.complete(req()).await.unwrap(), "first");
        assert_eq!(model.complete(req()).await.unwrap(), "second");
        assert_eq!(model.complete(req()).await.unwrap(), "mock response");
        assert_eq!(model.call_count(), 3);
    }

    #[tokio::test]
    async fn canned_error_is_retryable_provider_failure() {
        let model = MockLanguageModel::new();
        model.push_error("rate limited");
        model.push_text("ok");

        let err = model.complete(CompletionRequest::new("hi")).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(
            model.complete(CompletionRequest::new("hi")).await.unwrap(),
            "ok"
        );
    }

    #[tokio::test]
    async fn requests_are_logged_with_prompts() {
        let model = MockLanguageModel::with_responses(["ok"]);
        let request = CompletionRequest::new("the prompt").with_system_prompt("the system");
        model.complete(request).await.unwrap();

        let logged = model.requests();
        assert_eq!(logged.len(), 1);
        assert_eq!(logged[0].prompt, "the prompt");
        assert_eq!(logged[0].system_prompt.as_deref(), Some("the system"));
    }
}
