// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness assembling a complete engine over mock providers and an
//! in-memory store.

use std::sync::Arc;

use mnemo_config::MnemoConfig;
use mnemo_core::Result;
use mnemo_engine::MemoryEngine;
use mnemo_storage::MemoryStore;

use crate::mock_embedder::{MockEmbedder, MOCK_EMBEDDING_DIM};
use crate::mock_provider::MockLanguageModel;

/// Builder for engine test environments.
pub struct EngineHarnessBuilder {
    config: MnemoConfig,
    llm_responses: Vec<String>,
}

impl EngineHarnessBuilder {
    fn new() -> Self {
        Self {
            config: MnemoConfig::default(),
            llm_responses: Vec::new(),
        }
    }

    /// Replace the default configuration.
    pub fn with_config(mut self, config: MnemoConfig) -> Self {
        self.config = config;
        self
    }

    /// Mutate the default configuration in place.
    pub fn configure(mut self, f: impl FnOnce(&mut MnemoConfig)) -> Self {
        f(&mut self.config);
        self
    }

    /// Pre-load language model responses.
    pub fn with_llm_responses<I, S>(mut self, responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.llm_responses = responses.into_iter().map(Into::into).collect();
        self
    }

    /// Build and start the engine.
    pub async fn build(self) -> Result<EngineHarness> {
        let storage = MemoryStore::open_in_memory(MOCK_EMBEDDING_DIM).await?;
        let llm = Arc::new(MockLanguageModel::with_responses(self.llm_responses));
        let embedder = Arc::new(MockEmbedder::default());
        let engine = MemoryEngine::new(
            self.config,
            storage.clone(),
            embedder.clone(),
            llm.clone(),
        )?;
        engine.start().await?;
        Ok(EngineHarness {
            engine,
            storage,
            llm,
            embedder,
        })
    }
}

/// A started engine plus handles to its mocks and store.
pub struct EngineHarness {
    pub engine: MemoryEngine,
    pub storage: MemoryStore,
    pub llm: Arc<MockLanguageModel>,
    pub embedder: Arc<MockEmbedder>,
}

impl EngineHarness {
    pub fn builder() -> EngineHarnessBuilder {
        EngineHarnessBuilder::new()
    }
}
