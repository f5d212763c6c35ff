//! Top-level module for the n-gram modeling and generation system.
//!
//! This crate provides a word- and letter-level text codec, frequency and
//! trie-backed n-gram models, a multi-order dynamic model, and four
//! deterministic generation strategies built on top of them.

/// Integer identifier assigned to an interned text unit. Id 0 is reserved
/// for the boundary token.
pub type TokenId = u32;

/// Text codecs: interning vocabulary, letter-level and word-level
/// processors, and the `TextProcessor` seam the generators consume.
pub mod processor;

/// Flat n-gram model and the `LanguageModel` interface.
///
/// Stores n-grams as tuples of ids mapped directly to conditional
/// probabilities.
pub mod ngram_model;

/// Arena-backed prefix tree over token ids.
///
/// Nodes live in contiguous storage addressed by index; merging and
/// persistence operate on plain indexed lookups.
pub mod trie;

/// Trie-backed n-gram model with sentence-bounded windows and
/// incremental corpus updates.
pub mod ngram_trie;

/// Multi-order model merging several per-order tries into one tree, with
/// a mutable active order and order-decrementing lookups.
pub mod dynamic_trie;

/// Generation strategies: greedy, beam search, back-off and dynamic
/// back-off.
pub mod generator;

/// Loader priming flat models from external JSON frequency assets.
pub mod reader;
