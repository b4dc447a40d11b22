// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Orchestration layer of the mnemo memory engine.
//!
//! - **SessionManager**: bounded rolling dialogue buffers that trigger reflection
//! - **RecallEngine**: hybrid retrieval, fusion, weighted re-scoring
//! - **ReflectionEngine**: dialogue window -> typed, scored, persisted memories
//! - **ForgettingAgent**: periodic decay-based pruning and the cancellable nuke
//! - **MemoryEngine**: the façade a host embeds, with explicit start/stop

pub mod controller;
pub mod forgetting;
pub mod recall;
pub mod reflection;
pub mod session;

pub use controller::MemoryEngine;
pub use forgetting::{
    decayed_importance, ForgettingAgent, NukeOperation, NukeState, PassSummary,
};
pub use recall::{RecallEngine, RecallOutcome};
pub use reflection::{content_fingerprint, ReflectionEngine, ReflectionOutcome};
pub use session::SessionManager;
