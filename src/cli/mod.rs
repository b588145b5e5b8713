// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! CLI module for sign classification.
//!
//! This module contains the command-line interface logic, including argument parsing,
//! logging macros and the `classify` and `normalize` commands.

// Modules
/// CLI arguments.
pub mod args;

/// Classification command.
pub mod classify;

/// Console logging macros.
pub mod logging;

/// Normalization command.
pub mod normalize;
