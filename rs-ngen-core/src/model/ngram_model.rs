use std::collections::HashMap;

use crate::error::LmError;
use crate::model::TokenId;

/// Interface shared by every n-gram model the generators consume.
///
/// A model answers one question: given a sequence, which tokens can follow
/// it and with what probability. "No continuation" is an expected answer,
/// not an error.
pub trait LanguageModel {
	/// Retrieves tokens that can continue the given sequence along with
	/// their probabilities.
	///
	/// Returns `None` for an empty sequence, a sequence shorter than the
	/// required context, or an unseen context.
	fn generate_next_token(&self, sequence: &[TokenId]) -> Option<HashMap<TokenId, f64>>;

	/// The n-gram order this model currently answers with.
	fn get_n_gram_size(&self) -> usize;
}

/// Flat n-gram model over a single encoded sequence.
///
/// N-grams are stored as tuples of ids in a direct mapping to their
/// conditional probability (continuation count / context count).
///
/// # Invariants
/// - For any observed context, the probabilities of all recorded
///   continuations sum to 1.0 (up to floating-point tolerance).
/// - Context matching is exact-length, exact-value: no partial matches.
#[derive(Debug, Clone)]
pub struct NGramModel {
	encoded_corpus: Vec<TokenId>,
	n_gram_size: usize,
	frequencies: HashMap<Vec<TokenId>, f64>,
}

impl NGramModel {
	pub fn new(encoded_corpus: Vec<TokenId>, n_gram_size: usize) -> Self {
		Self { encoded_corpus, n_gram_size, frequencies: HashMap::new() }
	}

	/// Fills the frequency table from the encoded corpus.
	///
	/// Slides a window of the configured order across the corpus, counts
	/// every n-gram and every context, and stores
	/// probability = count(n-gram) / count(context).
	///
	/// # Errors
	/// - `IncorrectNgram` when the order is below 2.
	/// - `IncorrectCorpus` when no full window fits into the corpus.
	pub fn build(&mut self) -> Result<(), LmError> {
		if self.n_gram_size < 2 {
			return Err(LmError::IncorrectNgram(self.n_gram_size));
		}
		if self.encoded_corpus.len() < self.n_gram_size {
			return Err(LmError::IncorrectCorpus);
		}

		let mut absolute: HashMap<Vec<TokenId>, usize> = HashMap::new();
		let mut contexts: HashMap<Vec<TokenId>, usize> = HashMap::new();
		let context_len = self.n_gram_size - 1;

		for window in self.encoded_corpus.windows(self.n_gram_size) {
			*absolute.entry(window.to_vec()).or_insert(0) += 1;
			*contexts.entry(window[..context_len].to_vec()).or_insert(0) += 1;
		}

		self.frequencies.clear();
		for (n_gram, count) in absolute {
			if let Some(&context_count) = contexts.get(&n_gram[..context_len]) {
				self.frequencies
					.insert(n_gram, count as f64 / context_count as f64);
			}
		}

		log::debug!(
			"built {} distinct {}-grams from {} tokens",
			self.frequencies.len(),
			self.n_gram_size,
			self.encoded_corpus.len()
		);
		Ok(())
	}

	/// Replaces the frequency table with probabilities computed elsewhere
	/// (used when priming a model from an external asset).
	pub fn set_n_grams(&mut self, frequencies: HashMap<Vec<TokenId>, f64>) {
		self.frequencies = frequencies;
	}

	pub fn get_n_gram_size(&self) -> usize {
		self.n_gram_size
	}
}

impl LanguageModel for NGramModel {
	fn generate_next_token(&self, sequence: &[TokenId]) -> Option<HashMap<TokenId, f64>> {
		if self.n_gram_size < 2 {
			return None;
		}
		let context_len = self.n_gram_size - 1;
		if sequence.is_empty() || sequence.len() < context_len {
			return None;
		}
		let context = &sequence[sequence.len() - context_len..];

		let mut tokens = HashMap::new();
		for (n_gram, &frequency) in &self.frequencies {
			if &n_gram[..context_len] == context {
				tokens.insert(n_gram[context_len], frequency);
			}
		}

		if tokens.is_empty() { None } else { Some(tokens) }
	}

	fn get_n_gram_size(&self) -> usize {
		self.n_gram_size
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	// (1,2,3,4), (1,2,5,6) and (2,3,4,7) laid out back to back.
	fn corpus() -> Vec<TokenId> {
		vec![1, 2, 3, 4, 1, 2, 5, 6, 2, 3, 4, 7]
	}

	#[test]
	fn build_fills_frequencies() {
		let mut model = NGramModel::new(corpus(), 3);
		model.build().unwrap();

		let tokens = model.generate_next_token(&[1, 2]).unwrap();
		assert!(!tokens.is_empty());
		assert!(tokens.contains_key(&3));
		assert!(tokens.contains_key(&5));
	}

	#[test]
	fn build_rejects_short_corpus() {
		let mut model = NGramModel::new(vec![1, 2], 3);
		assert!(matches!(model.build(), Err(LmError::IncorrectCorpus)));

		let mut empty = NGramModel::new(Vec::new(), 3);
		assert!(matches!(empty.build(), Err(LmError::IncorrectCorpus)));
	}

	#[test]
	fn build_rejects_degenerate_order() {
		let mut model = NGramModel::new(corpus(), 1);
		assert!(matches!(model.build(), Err(LmError::IncorrectNgram(1))));
	}

	#[test]
	fn probabilities_per_context_sum_to_one() {
		let mut model = NGramModel::new(corpus(), 3);
		model.build().unwrap();

		for context in [[1, 2], [2, 3], [3, 4]] {
			let total: f64 = model.generate_next_token(&context).unwrap().values().sum();
			assert!((total - 1.0).abs() < 1e-9, "context {context:?} sums to {total}");
		}
	}

	#[test]
	fn unseen_context_yields_nothing() {
		let mut model = NGramModel::new(corpus(), 3);
		model.build().unwrap();
		assert!(model.generate_next_token(&[9, 9]).is_none());
	}

	#[test]
	fn short_or_empty_sequence_yields_nothing() {
		let mut model = NGramModel::new(corpus(), 3);
		model.build().unwrap();
		assert!(model.generate_next_token(&[]).is_none());
		assert!(model.generate_next_token(&[1]).is_none());
	}

	#[test]
	fn context_match_is_exact() {
		let mut model = NGramModel::new(corpus(), 3);
		model.build().unwrap();

		// (2,5) only ever continues with 6, with certainty.
		let tokens = model.generate_next_token(&[1, 2, 5]).unwrap();
		assert_eq!(tokens.len(), 1);
		assert!((tokens[&6] - 1.0).abs() < 1e-9);
	}
}
