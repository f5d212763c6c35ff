use std::collections::{BTreeMap, HashMap};

use crate::error::LmError;
use crate::model::TokenId;
use crate::model::dynamic_trie::DynamicTrieModel;
use crate::model::ngram_model::LanguageModel;
use crate::model::processor::{BOUNDARY_ID, TextProcessor};

/// Picks the continuation with the numerically greatest probability,
/// breaking ties in favor of the smaller token id.
fn best_token(tokens: &HashMap<TokenId, f64>) -> Option<TokenId> {
	tokens
		.iter()
		.max_by(|a, b| a.1.total_cmp(b.1).then_with(|| b.0.cmp(a.0)))
		.map(|(&token, _)| token)
}

/// Greedy text generation: always extend with the single best
/// continuation, stop early when the model has nothing to offer.
pub struct GreedyTextGenerator<'a, M: LanguageModel, P: TextProcessor> {
	model: &'a M,
	processor: &'a mut P,
}

impl<'a, M: LanguageModel, P: TextProcessor> GreedyTextGenerator<'a, M, P> {
	pub fn new(model: &'a M, processor: &'a mut P) -> Self {
		Self { model, processor }
	}

	/// Generates up to `seq_len` tokens after the encoded prompt and
	/// decodes the result.
	///
	/// # Errors
	/// - `InvalidArgument` when `seq_len` is zero.
	/// - `Encoding`/`Decoding` failures from the processor propagate.
	///
	/// Running out of continuations is not an error: the sequence built so
	/// far is decoded and returned.
	pub fn run(&mut self, seq_len: usize, prompt: &str) -> Result<String, LmError> {
		if seq_len == 0 {
			return Err(LmError::InvalidArgument("seq_len must be positive".to_owned()));
		}

		let mut sequence = self.processor.encode(prompt)?;
		for _ in 0..seq_len {
			let Some(tokens) = self.model.generate_next_token(&sequence) else {
				break;
			};
			let Some(token) = best_token(&tokens) else {
				break;
			};
			sequence.push(token);
		}

		self.processor.decode(&sequence)
	}
}

/// Candidate pool operations for beam search.
///
/// A candidate is a (sequence, score) pair where the score is the
/// cumulative negative log-probability of the path; lower means more
/// probable. A sequence never coexists with its direct extensions in the
/// pool: continuing a candidate removes it.
pub struct BeamSearcher<'a, M: LanguageModel> {
	beam_width: usize,
	model: &'a M,
}

impl<'a, M: LanguageModel> BeamSearcher<'a, M> {
	pub fn new(beam_width: usize, model: &'a M) -> Self {
		Self { beam_width, model }
	}

	/// Retrieves at most `beam_width` candidate continuations for a
	/// sequence, sorted by descending probability (ascending token id on
	/// ties).
	///
	/// Returns `Some(empty)` when the model offers nothing, so the caller
	/// treats such a candidate as terminated. `None` marks an unusable
	/// input sequence.
	pub fn get_next_token(&self, sequence: &[TokenId]) -> Option<Vec<(TokenId, f64)>> {
		if sequence.is_empty() {
			return None;
		}
		let Some(tokens) = self.model.generate_next_token(sequence) else {
			return Some(Vec::new());
		};

		let mut ranked: Vec<(TokenId, f64)> = tokens.into_iter().collect();
		ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
		ranked.truncate(self.beam_width);
		Some(ranked)
	}

	/// Replaces a candidate with its one-token extensions.
	///
	/// Each child scores parent − ln(probability). Returns `None` when the
	/// base sequence is not part of the pool.
	pub fn continue_sequence(
		&self,
		sequence: &[TokenId],
		next_tokens: &[(TokenId, f64)],
		candidates: &mut HashMap<Vec<TokenId>, f64>,
	) -> Option<()> {
		if sequence.is_empty() || next_tokens.is_empty() {
			return None;
		}
		let base_score = candidates.remove(sequence)?;

		for &(token, probability) in next_tokens {
			let mut extended = sequence.to_vec();
			extended.push(token);
			candidates.insert(extended, base_score - probability.ln());
		}
		Some(())
	}

	/// Shrinks the pool to the `beam_width` lowest-scoring candidates.
	/// Ties are broken on the sequence itself to keep pruning
	/// deterministic.
	pub fn prune_sequence_candidates(&self, candidates: &mut HashMap<Vec<TokenId>, f64>) {
		let mut ranked: Vec<(Vec<TokenId>, f64)> = candidates.drain().collect();
		ranked.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
		ranked.truncate(self.beam_width);
		candidates.extend(ranked);
	}
}

/// Beam-search text generation over a candidate pool of bounded width.
pub struct BeamSearchTextGenerator<'a, M: LanguageModel, P: TextProcessor> {
	beam_searcher: BeamSearcher<'a, M>,
	processor: &'a mut P,
	beam_width: usize,
}

impl<'a, M: LanguageModel, P: TextProcessor> BeamSearchTextGenerator<'a, M, P> {
	pub fn new(model: &'a M, processor: &'a mut P, beam_width: usize) -> Self {
		Self {
			beam_searcher: BeamSearcher::new(beam_width, model),
			processor,
			beam_width,
		}
	}

	/// Generates `seq_len` steps of beam search from the prompt and
	/// decodes the lowest-scoring candidate.
	///
	/// # Errors
	/// - `InvalidArgument` when `seq_len` or the beam width is zero.
	/// - `Encoding`/`Decoding` failures from the processor propagate.
	pub fn run(&mut self, prompt: &str, seq_len: usize) -> Result<String, LmError> {
		if seq_len == 0 {
			return Err(LmError::InvalidArgument("seq_len must be positive".to_owned()));
		}
		if self.beam_width == 0 {
			return Err(LmError::InvalidArgument("beam width must be positive".to_owned()));
		}

		let encoded = self.processor.encode(prompt)?;
		let mut candidates: HashMap<Vec<TokenId>, f64> = HashMap::from([(encoded, 0.0)]);

		for _ in 0..seq_len {
			let snapshot: Vec<Vec<TokenId>> = candidates.keys().cloned().collect();
			for sequence in snapshot {
				let Some(next_tokens) = self.beam_searcher.get_next_token(&sequence) else {
					continue;
				};
				if next_tokens.is_empty() {
					// Terminated candidate: retained unchanged.
					continue;
				}
				self.beam_searcher
					.continue_sequence(&sequence, &next_tokens, &mut candidates);
			}
			self.beam_searcher.prune_sequence_candidates(&mut candidates);
		}

		let best = candidates
			.iter()
			.min_by(|a, b| a.1.total_cmp(b.1).then_with(|| a.0.cmp(b.0)))
			.map(|(sequence, _)| sequence.clone());
		match best {
			Some(sequence) => self.processor.decode(&sequence),
			None => Err(LmError::Decoding("candidate pool is empty".to_owned())),
		}
	}
}

/// Back-off text generation over a family of models at different orders.
///
/// Each step asks the highest order first and walks down until some model
/// yields a continuation; greedy arg-max selection picks the token.
pub struct BackOffGenerator<'a, M: LanguageModel, P: TextProcessor> {
	language_models: BTreeMap<usize, M>,
	processor: &'a mut P,
}

impl<'a, M: LanguageModel, P: TextProcessor> BackOffGenerator<'a, M, P> {
	pub fn new(language_models: Vec<M>, processor: &'a mut P) -> Self {
		let language_models = language_models
			.into_iter()
			.map(|model| (model.get_n_gram_size(), model))
			.collect();
		Self { language_models, processor }
	}

	/// The first non-empty continuation distribution, highest order first.
	fn get_next_token(&self, sequence: &[TokenId]) -> Option<HashMap<TokenId, f64>> {
		if sequence.is_empty() {
			return None;
		}
		for model in self.language_models.values().rev() {
			if let Some(tokens) = model.generate_next_token(sequence) {
				if !tokens.is_empty() {
					return Some(tokens);
				}
			}
		}
		None
	}

	/// # Errors
	/// `InvalidArgument` on a zero `seq_len`; processor failures propagate.
	/// Exhausting every order mid-generation is normal early termination.
	pub fn run(&mut self, seq_len: usize, prompt: &str) -> Result<String, LmError> {
		if seq_len == 0 {
			return Err(LmError::InvalidArgument("seq_len must be positive".to_owned()));
		}

		let mut sequence = self.processor.encode(prompt)?;
		for _ in 0..seq_len {
			let Some(tokens) = self.get_next_token(&sequence) else {
				break;
			};
			let Some(token) = best_token(&tokens) else {
				break;
			};
			sequence.push(token);
		}

		self.processor.decode(&sequence)
	}
}

/// Back-off generation driven by a single `DynamicTrieModel`: the order
/// fallback happens inside the model instead of across distinct model
/// objects.
pub struct DynamicBackOffGenerator<'a, P: TextProcessor> {
	dynamic_trie: &'a DynamicTrieModel,
	processor: &'a mut P,
}

impl<'a, P: TextProcessor> DynamicBackOffGenerator<'a, P> {
	pub fn new(dynamic_trie: &'a DynamicTrieModel, processor: &'a mut P) -> Self {
		Self { dynamic_trie, processor }
	}

	/// Next tokens for sequence continuation, `None` when even the lowest
	/// order has nothing.
	pub fn get_next_token(&self, sequence: &[TokenId]) -> Option<HashMap<TokenId, f64>> {
		if sequence.is_empty() {
			return None;
		}
		self.dynamic_trie
			.generate_next_token(sequence)
			.filter(|tokens| !tokens.is_empty())
	}

	/// # Errors
	/// `InvalidArgument` on a zero `seq_len`; encoding failures propagate.
	/// Decoding failures do not: the raw stored tokens are joined with
	/// spaces as a degraded but non-failing output.
	pub fn run(&mut self, seq_len: usize, prompt: &str) -> Result<String, LmError> {
		if seq_len == 0 {
			return Err(LmError::InvalidArgument("seq_len must be positive".to_owned()));
		}

		let mut sequence = self.processor.encode(prompt)?;
		// The prompt's trailing boundary would hide the actual context.
		if sequence.last() == Some(&BOUNDARY_ID) {
			sequence.pop();
		}

		for _ in 0..seq_len {
			let Some(tokens) = self.get_next_token(&sequence) else {
				break;
			};
			let Some(token) = best_token(&tokens) else {
				break;
			};
			sequence.push(token);
		}

		match self.processor.decode(&sequence) {
			Ok(text) => Ok(text),
			Err(_) => Ok(self.join_raw(&sequence)),
		}
	}

	fn join_raw(&self, sequence: &[TokenId]) -> String {
		sequence
			.iter()
			.filter_map(|&id| self.processor.token_of(id))
			.collect::<Vec<_>>()
			.join(" ")
	}
}
