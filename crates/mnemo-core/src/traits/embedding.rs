// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding provider trait.

use async_trait::async_trait;

use crate::error::Result;

/// Generates vector embeddings from text, batched.
///
/// The reported dimension is fixed for the lifetime of the provider and is
/// validated against the storage vector dimension at engine startup.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a batch of texts. Returns one vector per input text, in order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Dimension of every vector this provider produces.
    fn dimension(&self) -> usize;
}
