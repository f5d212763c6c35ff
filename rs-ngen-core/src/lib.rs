//! N-gram language-modeling and text-generation library.
//!
//! This crate provides a modular n-gram system including:
//! - Letter-level and word-level text codecs with stable integer ids
//! - Flat and trie-backed n-gram models with conditional probabilities
//! - A multi-order dynamic trie model with incremental updates
//! - Four deterministic generation strategies (greedy, beam search,
//!   back-off, dynamic back-off)
//! - JSON persistence of the dynamic model plus a binary fast-load cache
//!
//! Everything is synchronous and single-threaded; models are exclusively
//! owned by their callers and never shared during a build or a
//! generation run.

/// Error taxonomy shared across the codec, the models and the generators.
pub mod error;

/// I/O utilities (file loading, path helpers).
pub mod io;

/// Core models, codecs and generation logic.
pub mod model;

/// Whole-document save/load of the dynamic trie model.
pub mod persistence;
