// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deterministic embedding provider for tests.
//!
//! Embeds text as an L2-normalized bag-of-words histogram: each token is
//! hashed into one dimension. Texts sharing tokens get positive cosine
//! similarity, so retrieval behavior is meaningful without a real model.

use async_trait::async_trait;
use mnemo_core::{EmbeddingProvider, Result};
use sha2::{Digest, Sha256};

/// Default dimension used by the test harness.
pub const MOCK_EMBEDDING_DIM: usize = 64;

/// Hash-based bag-of-words embedder.
pub struct MockEmbedder {
    dimension: usize,
}

impl MockEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self::new(MOCK_EMBEDDING_DIM)
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| embed_text(t, self.dimension)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

fn embed_text(text: &str, dimension: usize) -> Vec<f32> {
    let mut vector = vec![0.0_f32; dimension];
    for token in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
    {
        let slot = token_slot(&token.to_lowercase(), dimension);
        vector[slot] += 1.0;
    }
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in &mut vector {
            *value /= norm;
        }
    }
    vector
}

fn token_slot(token: &str, dimension: usize) -> usize {
    let digest = Sha256::digest(token.as_bytes());
    let mut bytes = [0_u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    (u64::from_le_bytes(bytes) % dimension as u64) as usize
}
