// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core types for the mnemo long-term memory engine.
//!
//! This crate defines the error type, the memory domain model, and the
//! provider traits (embedding + language model) that the engine consumes.
//! Everything here is backend-agnostic; persistence and retrieval live in
//! the sibling crates.

pub mod error;
pub mod traits;
pub mod types;

pub use error::{MnemoError, Result};
pub use traits::{CompletionRequest, EmbeddingProvider, LanguageModelProvider};
pub use types::*;
