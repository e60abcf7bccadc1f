//! Markov chain text generation for chat bots.
//!
//! This crate provides:
//! - A word-level, order-N Markov chain trained incrementally from chat text
//! - Weighted generation with a soft length target and sentence heuristics
//! - Versioned persistence (JSON, or a compact binary snapshot)
//! - TOML configuration for the order, model path and generation tuning
//!
//! Training and generation never fail. Persistence reports failures as
//! `false`/`None` after logging them through the `log` facade.

#![warn(missing_docs)]

/// Markov chain model, preprocessing and sampling.
pub mod model;

/// Save/load of a `ChainModel` to a versioned file.
pub mod store;

/// TOML configuration.
pub mod config;

/// Crate error type.
pub mod error;

/// File helpers (line reading, directory creation, atomic writes).
///
/// Not exposed
pub(crate) mod io;

pub use config::{ChainConfig, EndHeuristic, GenerationConfig};
pub use error::ChainError;
pub use model::{ChainModel, ChainStats, Transitions};
pub use store::{ModelStore, StoreFormat, StoreStats};
