use std::collections::HashMap;

use crate::error::LmError;
use crate::model::TokenId;
use crate::model::ngram_model::LanguageModel;
use crate::model::trie::Trie;

/// N-gram model backed by a prefix tree instead of a flat table.
///
/// The corpus is sentence-bounded: every sentence is encoded separately
/// and an n-gram never spans two sentences. Probability semantics match
/// the flat model: each leaf stores count(n-gram) / count(context).
///
/// The model *has* a trie and delegates storage to it; the trie owns all
/// of its nodes exclusively.
#[derive(Debug, Clone)]
pub struct NGramTrieModel {
	encoded_corpus: Vec<Vec<TokenId>>,
	n_gram_size: usize,
	trie: Trie,
}

impl NGramTrieModel {
	pub fn new(encoded_corpus: Vec<Vec<TokenId>>, n_gram_size: usize) -> Self {
		Self { encoded_corpus, n_gram_size, trie: Trie::new() }
	}

	/// Rebuilds the trie from the stored corpus.
	///
	/// First pass inserts every sliding-window n-gram as a root-to-leaf
	/// path; second pass stores each leaf's conditional probability.
	///
	/// # Errors
	/// - `IncorrectNgram` when the order is below 2.
	/// - `IncorrectCorpus` when the corpus is empty or no sentence fits a
	///   single full window.
	pub fn build(&mut self) -> Result<(), LmError> {
		if self.n_gram_size < 2 {
			return Err(LmError::IncorrectNgram(self.n_gram_size));
		}
		if self.encoded_corpus.is_empty() {
			return Err(LmError::IncorrectCorpus);
		}

		let context_len = self.n_gram_size - 1;
		let mut absolute: HashMap<Vec<TokenId>, usize> = HashMap::new();
		let mut contexts: HashMap<Vec<TokenId>, usize> = HashMap::new();

		for sentence in &self.encoded_corpus {
			for window in sentence.windows(self.n_gram_size) {
				*absolute.entry(window.to_vec()).or_insert(0) += 1;
				*contexts.entry(window[..context_len].to_vec()).or_insert(0) += 1;
			}
		}
		if absolute.is_empty() {
			return Err(LmError::IncorrectCorpus);
		}

		self.trie.clear();
		for (n_gram, count) in &absolute {
			let leaf = self.trie.insert(n_gram);
			if let Some(&context_count) = contexts.get(&n_gram[..context_len]) {
				self.trie.set_freq(leaf, *count as f64 / context_count as f64);
			}
		}

		log::debug!(
			"trie holds {} distinct {}-grams across {} nodes",
			absolute.len(),
			self.n_gram_size,
			self.trie.len()
		);
		Ok(())
	}

	/// Continuation distribution for an exact context path.
	///
	/// # Errors
	/// `TriePrefixNotFound` when the context was never observed. An
	/// observed context with no recorded continuation returns an empty
	/// mapping instead; callers rely on telling the two apart.
	pub fn get_next_tokens(&self, context: &[TokenId]) -> Result<HashMap<TokenId, f64>, LmError> {
		let node = self.trie.find_prefix(context)?;
		Ok(self.trie.continuations(node))
	}

	/// Appends new sentences to the stored corpus (or adopts them when the
	/// model had none) and rebuilds the trie from scratch.
	pub fn update(&mut self, new_corpus: &[Vec<TokenId>]) -> Result<(), LmError> {
		self.encoded_corpus.extend(new_corpus.iter().cloned());
		self.build()
	}

	pub fn get_n_gram_size(&self) -> usize {
		self.n_gram_size
	}

	pub fn trie(&self) -> &Trie {
		&self.trie
	}
}

impl LanguageModel for NGramTrieModel {
	/// Same contract as the flat model, with one refinement: a context
	/// path absent from the trie is converted into an empty distribution
	/// here and never leaks as an error.
	fn generate_next_token(&self, sequence: &[TokenId]) -> Option<HashMap<TokenId, f64>> {
		if self.n_gram_size < 2 {
			return None;
		}
		let context_len = self.n_gram_size - 1;
		if sequence.is_empty() || sequence.len() < context_len {
			return None;
		}
		let context = &sequence[sequence.len() - context_len..];

		match self.get_next_tokens(context) {
			Ok(tokens) => Some(tokens),
			Err(LmError::TriePrefixNotFound) => Some(HashMap::new()),
			Err(_) => None,
		}
	}

	fn get_n_gram_size(&self) -> usize {
		self.n_gram_size
	}
}
