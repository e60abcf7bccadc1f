//! Word-level Markov chain: training, sampling and generation.
//!
//! This module provides:
//! - Text cleanup and sentence splitting (`preprocess`)
//! - Per-context candidate tables with weighted sampling (`Transitions`)
//! - The trainable, generating model itself (`ChainModel`)

/// Order-N word chain with training, merging and generation.
///
/// Owns every statistics table; `train`/`merge` need `&mut`,
/// generation only needs `&`.
pub mod chain_model;

/// Sentence splitting, character filtering and tokenization.
pub mod preprocess;

/// Candidate next words for one context key, with occurrence counts
/// and cumulative-weight sampling.
pub mod transitions;

pub use chain_model::{ChainModel, ChainStats};
pub use transitions::Transitions;
