// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for the mnemo memory engine: deterministic mock
//! providers and a full-engine harness.

pub mod harness;
pub mod mock_embedder;
pub mod mock_provider;

pub use harness::{EngineHarness, EngineHarnessBuilder};
pub use mock_embedder::{MockEmbedder, MOCK_EMBEDDING_DIM};
pub use mock_provider::{CannedResponse, MockLanguageModel};
