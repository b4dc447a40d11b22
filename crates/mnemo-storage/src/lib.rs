// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence for the mnemo memory engine.
//!
//! One store holds both the document index and the vector index: the
//! embedding BLOB lives in the memory row, so every public write is a
//! single transaction and readers see either pre- or post-state, never a
//! document without its vector.

pub mod filter;
pub mod migrations;
pub mod store;

pub use filter::ScanFilter;
pub use store::{MemoryPatch, MemoryStore};
