// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loading and validation for the mnemo memory engine.
//!
//! Follows a layered merge: compiled defaults, then system / XDG / local
//! TOML files, then `MNEMO_*` environment variables. The resulting
//! [`MnemoConfig`] is validated once at startup; unknown keys warn rather
//! than abort.

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

pub use diagnostic::ConfigError;
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::*;
pub use validation::{validate_config, warn_unknown_keys};
