// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Retrieval layer for the mnemo memory engine.
//!
//! - **Tokenizer**: lowercase word split with optional CJK segmentation
//! - **SparseRetriever**: in-memory BM25 inverted index, rebuildable from storage
//! - **DenseRetriever**: embed query, k-NN through the store
//! - **ResultFusion**: nine strategies for combining the two ranked lists
//! - **Classifier**: query features driving the adaptive strategies

pub mod classifier;
pub mod dense;
pub mod fusion;
pub mod sparse;
pub mod tokenizer;

pub use classifier::{analyze_query, QueryInfo, QueryKind};
pub use dense::DenseRetriever;
pub use fusion::{FusedHit, FusionParams, FusionStrategy, ResultFusion};
pub use sparse::{Bm25Index, SparseRetriever, SparseSearch};
pub use tokenizer::Tokenizer;
