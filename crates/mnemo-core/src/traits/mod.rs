// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider traits consumed by the engine.
//!
//! Concrete providers (API clients, local models) live outside this
//! workspace; the engine only sees these interfaces.

pub mod embedding;
pub mod provider;

pub use embedding::EmbeddingProvider;
pub use provider::{CompletionRequest, LanguageModelProvider};
