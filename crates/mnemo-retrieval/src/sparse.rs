// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory BM25 inverted index over active memory content.
//!
//! Single-writer / multi-reader: mutations take the write lock, searches
//! the read lock. Scores are raw Okapi BM25 reals, unbounded above and not
//! comparable across queries; the fusion layer normalizes per query.

use std::collections::HashMap;
use std::sync::RwLock;

use mnemo_core::Result;
use tracing::{debug, info};

use crate::tokenizer::Tokenizer;

/// The search capability recall needs from a sparse retriever.
///
/// The in-memory [`SparseRetriever`] never fails; implementations backed
/// by external indexes may.
pub trait SparseSearch: Send + Sync {
    /// Whether sparse retrieval participates in recall.
    fn enabled(&self) -> bool;

    /// BM25 search returning raw scores, best first.
    fn search(&self, query: &str, k: usize) -> Result<Vec<(i64, f64)>>;
}

#[derive(Default)]
struct IndexInner {
    /// term -> (doc_id -> term frequency)
    postings: HashMap<String, HashMap<i64, u32>>,
    /// doc_id -> unique terms, for O(terms) removal
    doc_terms: HashMap<i64, Vec<String>>,
    /// doc_id -> token count
    doc_len: HashMap<i64, u32>,
    total_len: u64,
}

/// BM25 index with incremental maintenance.
pub struct Bm25Index {
    inner: RwLock<IndexInner>,
    k1: f64,
    b: f64,
}

impl Bm25Index {
    pub fn new(k1: f64, b: f64) -> Self {
        Self {
            inner: RwLock::new(IndexInner::default()),
            k1,
            b,
        }
    }

    /// Index a document's tokens. Re-adding an id replaces its postings.
    pub fn add(&self, doc_id: i64, tokens: &[String]) {
        let mut inner = self.inner.write().expect("bm25 lock poisoned");
        remove_locked(&mut inner, doc_id);

        let mut counts: HashMap<&str, u32> = HashMap::new();
        for token in tokens {
            *counts.entry(token.as_str()).or_default() += 1;
        }
        let mut terms = Vec::with_capacity(counts.len());
        for (term, tf) in counts {
            inner
                .postings
                .entry(term.to_string())
                .or_default()
                .insert(doc_id, tf);
            terms.push(term.to_string());
        }
        inner.doc_terms.insert(doc_id, terms);
        inner.doc_len.insert(doc_id, tokens.len() as u32);
        inner.total_len += tokens.len() as u64;
    }

    /// Drop a document from the index. Unknown ids are a no-op.
    pub fn remove(&self, doc_id: i64) {
        let mut inner = self.inner.write().expect("bm25 lock poisoned");
        remove_locked(&mut inner, doc_id);
    }

    /// Drop every posting.
    pub fn clear(&self) {
        let mut inner = self.inner.write().expect("bm25 lock poisoned");
        *inner = IndexInner::default();
    }

    /// Number of indexed documents.
    pub fn len(&self) -> usize {
        self.inner.read().expect("bm25 lock poisoned").doc_len.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Score documents against query tokens with Okapi BM25.
    ///
    /// Returns up to `k` `(doc_id, score)` pairs, best first; ties break
    /// toward the lower `doc_id`.
    pub fn search(&self, query_tokens: &[String], k: usize) -> Vec<(i64, f64)> {
        let inner = self.inner.read().expect("bm25 lock poisoned");
        let n_docs = inner.doc_len.len();
        if n_docs == 0 || query_tokens.is_empty() {
            return vec![];
        }
        let avg_len = inner.total_len as f64 / n_docs as f64;

        let mut scores: HashMap<i64, f64> = HashMap::new();
        for term in query_tokens {
            let Some(postings) = inner.postings.get(term) else {
                continue;
            };
            let n_t = postings.len() as f64;
            let idf = (1.0 + (n_docs as f64 - n_t + 0.5) / (n_t + 0.5)).ln();
            for (&doc_id, &tf) in postings {
                let tf = f64::from(tf);
                let dl = f64::from(inner.doc_len[&doc_id]);
                let norm = tf * (self.k1 + 1.0)
                    / (tf + self.k1 * (1.0 - self.b + self.b * dl / avg_len));
                *scores.entry(doc_id).or_default() += idf * norm;
            }
        }

        let mut results: Vec<(i64, f64)> = scores.into_iter().collect();
        results.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        results.truncate(k);
        results
    }
}

fn remove_locked(inner: &mut IndexInner, doc_id: i64) {
    let Some(terms) = inner.doc_terms.remove(&doc_id) else {
        return;
    };
    for term in terms {
        if let Some(postings) = inner.postings.get_mut(&term) {
            postings.remove(&doc_id);
            if postings.is_empty() {
                inner.postings.remove(&term);
            }
        }
    }
    if let Some(len) = inner.doc_len.remove(&doc_id) {
        inner.total_len -= u64::from(len);
    }
}

/// Sparse retriever: tokenizer + BM25 index, rebuildable from storage.
pub struct SparseRetriever {
    tokenizer: Tokenizer,
    index: Bm25Index,
    enabled: bool,
}

impl SparseRetriever {
    pub fn new(k1: f64, b: f64, segment_cjk: bool, enabled: bool) -> Self {
        Self {
            tokenizer: Tokenizer::new(segment_cjk),
            index: Bm25Index::new(k1, b),
            enabled,
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Index one memory's content.
    pub fn add(&self, doc_id: i64, content: &str) {
        if !self.enabled {
            return;
        }
        let tokens = self.tokenizer.tokenize(content);
        self.index.add(doc_id, &tokens);
    }

    /// Drop one memory from the index.
    pub fn remove(&self, doc_id: i64) {
        self.index.remove(doc_id);
    }

    /// Drop everything. Used after a nuke fires.
    pub fn clear(&self) {
        self.index.clear();
        info!("sparse index cleared");
    }

    /// Full rebuild from a document iterator (startup or on demand).
    pub fn rebuild_from<I>(&self, docs: I)
    where
        I: IntoIterator<Item = (i64, String)>,
    {
        if !self.enabled {
            return;
        }
        self.index.clear();
        let mut count = 0_usize;
        for (doc_id, content) in docs {
            let tokens = self.tokenizer.tokenize(&content);
            self.index.add(doc_id, &tokens);
            count += 1;
        }
        info!(documents = count, "sparse index rebuilt");
    }

    /// BM25 search. Returns raw scores, best first. Empty when disabled.
    pub fn search(&self, query: &str, k: usize) -> Vec<(i64, f64)> {
        if !self.enabled {
            return vec![];
        }
        let tokens = self.tokenizer.tokenize(query);
        let results = self.index.search(&tokens, k);
        debug!(query_terms = tokens.len(), hits = results.len(), "sparse search");
        results
    }

    /// Number of indexed documents.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

impl SparseSearch for SparseRetriever {
    fn enabled(&self) -> bool {
        SparseRetriever::enabled(self)
    }

    fn search(&self, query: &str, k: usize) -> Result<Vec<(i64, f64)>> {
        Ok(SparseRetriever::search(self, query, k))
    }
}
