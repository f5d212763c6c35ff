use std::collections::{BTreeMap, HashMap};

use crate::error::LmError;
use crate::model::TokenId;
use crate::model::ngram_model::LanguageModel;
use crate::model::ngram_trie::NGramTrieModel;
use crate::model::trie::{NodeId, Trie};

/// Multi-order n-gram model holding one trie per order plus their union.
///
/// # Responsibilities
/// - Build an independent `NGramTrieModel` for every order from 2 up to
///   the configured maximum
/// - Merge all per-order tries into one tree, ascending order first
/// - Answer continuation queries at the active order, decrementing through
///   lower orders when a context path is absent
/// - Grow the corpus incrementally without rebuilding unrelated state
///
/// # Invariants
/// - `2 <= current_ngram_size <= max_ngram_size` (the setter enforces it)
/// - The merged trie is a derived, disposable projection: it is rebuilt
///   from scratch on every build/update/merge and never edited node by
///   node from outside
#[derive(Debug, Clone)]
pub struct DynamicTrieModel {
	encoded_corpus: Vec<Vec<TokenId>>,
	max_ngram_size: usize,
	current_ngram_size: usize,
	models: BTreeMap<usize, NGramTrieModel>,
	merged: Trie,
}

impl DynamicTrieModel {
	pub fn new(encoded_corpus: Vec<Vec<TokenId>>, max_ngram_size: usize) -> Self {
		Self {
			encoded_corpus,
			max_ngram_size,
			current_ngram_size: max_ngram_size,
			models: BTreeMap::new(),
			merged: Trie::new(),
		}
	}

	/// Restores a model from persisted parts: the merged tree round-trips
	/// as-is, the per-order models stay empty until the next build/update.
	pub(crate) fn from_parts(
		encoded_corpus: Vec<Vec<TokenId>>,
		max_ngram_size: usize,
		merged: Trie,
	) -> Self {
		Self {
			encoded_corpus,
			max_ngram_size,
			current_ngram_size: max_ngram_size,
			models: BTreeMap::new(),
			merged,
		}
	}

	/// Builds every per-order model over the full corpus and merges them.
	///
	/// # Errors
	/// - `IncorrectNgram` when the maximum order is below 2.
	/// - `IncorrectCorpus` when the corpus is empty.
	/// - Any per-order build failure propagates unchanged.
	pub fn build(&mut self) -> Result<(), LmError> {
		if self.max_ngram_size < 2 {
			return Err(LmError::IncorrectNgram(self.max_ngram_size));
		}
		if self.encoded_corpus.is_empty() {
			return Err(LmError::IncorrectCorpus);
		}

		self.models.clear();
		for n_gram_size in 2..=self.max_ngram_size {
			let mut model = NGramTrieModel::new(self.encoded_corpus.clone(), n_gram_size);
			model.build()?;
			self.models.insert(n_gram_size, model);
		}

		self.merge()?;
		self.current_ngram_size = self.max_ngram_size;
		log::info!(
			"built {} per-order models up to order {}",
			self.models.len(),
			self.max_ngram_size
		);
		Ok(())
	}

	/// Rebuilds the merged trie from the per-order models, walking them in
	/// ascending order. A destination node's frequency is overwritten only
	/// when the source node carries a meaningful (non-zero) value, so a
	/// higher order's residual prefix nodes never erase a lower order's
	/// leaf values.
	fn merge(&mut self) -> Result<(), LmError> {
		if self.models.is_empty() {
			return Err(LmError::MergeTrees);
		}

		let mut merged = Trie::new();
		for model in self.models.values() {
			Self::merge_level(model.trie(), Trie::ROOT, &mut merged, Trie::ROOT);
		}
		self.merged = merged;
		Ok(())
	}

	fn merge_level(source: &Trie, from: NodeId, destination: &mut Trie, to: NodeId) {
		let children: Vec<(NodeId, Option<TokenId>, f64)> = source
			.children(from)
			.map(|(id, node)| (id, node.name(), node.freq()))
			.collect();

		for (child_id, name, freq) in children {
			let Some(name) = name else { continue };
			let assigned = destination.assign_child(to, name, (freq != 0.0).then_some(freq));
			Self::merge_level(source, child_id, destination, assigned);
		}
	}

	/// Sets the order used for generation.
	///
	/// # Errors
	/// `IncorrectNgram` when the value falls outside `2..=max`; the active
	/// order is left untouched in that case, never silently clamped.
	pub fn set_current_ngram_size(&mut self, n_gram_size: usize) -> Result<(), LmError> {
		if n_gram_size < 2 || n_gram_size > self.max_ngram_size {
			return Err(LmError::IncorrectNgram(n_gram_size));
		}
		self.current_ngram_size = n_gram_size;
		Ok(())
	}

	/// Appends new sentences and refreshes every per-order model, then
	/// re-merges. A model that was never built (e.g. one restored from a
	/// persisted document) falls back to a full build.
	pub fn update(&mut self, new_corpus: &[Vec<TokenId>]) -> Result<(), LmError> {
		self.encoded_corpus.extend(new_corpus.iter().cloned());
		if self.models.is_empty() {
			return self.build();
		}

		for model in self.models.values_mut() {
			model.update(new_corpus)?;
		}
		self.merge()
	}

	pub fn get_max_ngram_size(&self) -> usize {
		self.max_ngram_size
	}

	pub fn get_encoded_corpus(&self) -> &[Vec<TokenId>] {
		&self.encoded_corpus
	}

	/// The merged trie holding the union of all per-order tries.
	pub fn merged(&self) -> &Trie {
		&self.merged
	}

	/// Auto-completion listing: every stored sequence in the merged trie
	/// starting with `prefix`.
	pub fn suggest(&self, prefix: &[TokenId]) -> Vec<Vec<TokenId>> {
		self.merged.suggest(prefix)
	}
}

impl LanguageModel for DynamicTrieModel {
	/// Looks the context up in the merged trie at the active order and
	/// decrements through lower orders while the context path is absent
	/// (or the sequence is too short for it). Lower-order context paths
	/// are reachable as prefixes of higher-order ones, which is what makes
	/// the fallback work on a single tree.
	///
	/// Returns `None` only when every order down to 2 fails; an observed
	/// context with no children yields the empty distribution instead,
	/// meaning generation should stop.
	fn generate_next_token(&self, sequence: &[TokenId]) -> Option<HashMap<TokenId, f64>> {
		if sequence.is_empty() {
			return None;
		}

		let mut n_gram_size = self.current_ngram_size;
		while n_gram_size >= 2 {
			let context_len = n_gram_size - 1;
			if sequence.len() >= context_len {
				let context = &sequence[sequence.len() - context_len..];
				if let Ok(node) = self.merged.find_prefix(context) {
					return Some(self.merged.continuations(node));
				}
			}
			n_gram_size -= 1;
		}
		None
	}

	fn get_n_gram_size(&self) -> usize {
		self.current_ngram_size
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn corpus() -> Vec<Vec<TokenId>> {
		vec![
			vec![1, 2],
			vec![1, 2, 0, 3, 4, 5],
			vec![3, 4, 5, 0, 6, 7, 8],
			vec![7, 6, 8, 0, 5, 4, 8],
			vec![5, 4, 8, 2],
			vec![1, 2, 0, 5, 4, 2],
		]
	}

	#[test]
	fn build_creates_one_model_per_order() {
		let mut model = DynamicTrieModel::new(corpus(), 3);
		model.build().unwrap();

		let orders: Vec<usize> = model.models.keys().copied().collect();
		assert_eq!(orders, vec![2, 3]);
		assert!(!model.merged().is_empty());
	}

	#[test]
	fn build_rejects_bad_inputs() {
		let mut empty = DynamicTrieModel::new(Vec::new(), 3);
		assert!(matches!(empty.build(), Err(LmError::IncorrectCorpus)));

		for bad_size in [0, 1] {
			let mut model = DynamicTrieModel::new(corpus(), bad_size);
			assert!(matches!(model.build(), Err(LmError::IncorrectNgram(_))));
		}
	}

	#[test]
	fn merge_without_models_is_an_error() {
		let mut model = DynamicTrieModel::new(corpus(), 3);
		assert!(matches!(model.merge(), Err(LmError::MergeTrees)));
	}

	#[test]
	fn merge_unions_tries_and_keeps_leaf_values() {
		let mut model = DynamicTrieModel::new(corpus(), 3);
		model.build().unwrap();

		// The path (1,2) is an order-2 leaf and an order-3 interior node;
		// its leaf value must survive the later merge.
		let node = model.merged().find_prefix(&[1, 2]).unwrap();
		let expected = model.models[&2]
			.get_next_tokens(&[1])
			.unwrap()[&2];
		assert!((model.merged().node(node).freq() - expected).abs() < 1e-9);

		// Children contributed by the order-3 trie hang below it.
		let tokens = model.merged().continuations(node);
		assert!(tokens.contains_key(&0));
	}

	#[test]
	fn rebuilding_is_deterministic() {
		let mut first = DynamicTrieModel::new(corpus(), 4);
		first.build().unwrap();
		let mut second = DynamicTrieModel::new(corpus(), 4);
		second.build().unwrap();

		for prefix in [vec![1], vec![1, 2], vec![5, 4], vec![1, 2, 0]] {
			let left = first.merged().find_prefix(&prefix).unwrap();
			let right = second.merged().find_prefix(&prefix).unwrap();
			assert_eq!(
				first.merged().continuations(left),
				second.merged().continuations(right)
			);
		}
	}

	#[test]
	fn set_current_ngram_size_validates_bounds() {
		let mut model = DynamicTrieModel::new(corpus(), 3);
		model.build().unwrap();

		model.set_current_ngram_size(2).unwrap();
		assert_eq!(model.get_n_gram_size(), 2);

		for bad_size in [0, 1, 4, 42] {
			assert!(matches!(
				model.set_current_ngram_size(bad_size),
				Err(LmError::IncorrectNgram(_))
			));
		}
		assert_eq!(model.get_n_gram_size(), 2);
	}

	#[test]
	fn generate_next_token_matches_the_active_order() {
		let mut model = DynamicTrieModel::new(corpus(), 3);
		model.build().unwrap();
		model.set_current_ngram_size(3).unwrap();

		let tokens = model.generate_next_token(&[1, 2]).unwrap();
		let reference = model.models[&3].generate_next_token(&[1, 2]).unwrap();
		assert_eq!(tokens, reference);
	}

	#[test]
	fn generate_next_token_falls_back_to_lower_orders() {
		let mut model = DynamicTrieModel::new(corpus(), 3);
		model.build().unwrap();
		model.set_current_ngram_size(3).unwrap();

		// A single-token sequence cannot satisfy the order-3 context, but
		// order 2 can.
		let tokens = model.generate_next_token(&[1]).unwrap();
		let reference = model.models[&2].generate_next_token(&[1]).unwrap();
		assert_eq!(tokens, reference);

		// (9,9,2) is unseen at order 3; the order-2 context (2) is not.
		let fallback = model.generate_next_token(&[9, 9, 2]).unwrap();
		assert_eq!(fallback, model.models[&2].generate_next_token(&[2]).unwrap());
	}

	#[test]
	fn generate_next_token_gives_up_after_order_two() {
		let mut model = DynamicTrieModel::new(corpus(), 3);
		model.build().unwrap();
		assert!(model.generate_next_token(&[99]).is_none());
		assert!(model.generate_next_token(&[]).is_none());
	}

	#[test]
	fn update_extends_the_corpus_in_place() {
		let mut model = DynamicTrieModel::new(corpus(), 3);
		model.build().unwrap();
		assert!(model.merged().find_prefix(&[40, 41]).is_err());

		model.update(&[vec![40, 41, 42]]).unwrap();
		assert!(model.merged().find_prefix(&[40, 41]).is_ok());
		// Previously learned paths are still reachable.
		assert!(model.merged().find_prefix(&[1, 2]).is_ok());
	}

	#[test]
	fn update_on_restored_model_rebuilds_everything() {
		let built = {
			let mut model = DynamicTrieModel::new(corpus(), 3);
			model.build().unwrap();
			model
		};
		let mut restored = DynamicTrieModel::from_parts(
			built.get_encoded_corpus().to_vec(),
			built.get_max_ngram_size(),
			built.merged().clone(),
		);
		assert!(restored.models.is_empty());

		restored.update(&[vec![40, 41, 42]]).unwrap();
		assert_eq!(restored.models.len(), 2);
		assert!(restored.merged().find_prefix(&[40, 41]).is_ok());
	}
}
