// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dense retriever: embed the query, then k-NN through storage.

use std::sync::Arc;

use mnemo_core::{EmbeddingProvider, MnemoError, Result};
use mnemo_storage::{MemoryStore, ScanFilter};
use tracing::debug;

/// Thin wrapper over the store's vector search.
pub struct DenseRetriever {
    store: MemoryStore,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl DenseRetriever {
    pub fn new(store: MemoryStore, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { store, embedder }
    }

    /// Embed `query` and return up to `k` `(doc_id, similarity)` pairs for
    /// documents matching `filter`. Similarity is cosine mapped to [0, 1].
    pub async fn search(
        &self,
        query: &str,
        k: usize,
        filter: &ScanFilter,
    ) -> Result<Vec<(i64, f64)>> {
        let vectors = self.embedder.embed(&[query.to_string()]).await?;
        let query_embedding = vectors
            .into_iter()
            .next()
            .ok_or_else(|| MnemoError::provider("embedding returned no vectors"))?;

        let hits = self.store.dense_search(&query_embedding, k, filter).await?;
        debug!(hits = hits.len(), k, "dense search");
        Ok(hits)
    }
}
