use std::collections::HashMap;

use crate::error::LmError;
use crate::model::TokenId;

/// Identifier reserved for the boundary token (end of word or end of
/// sentence, depending on the processor).
pub const BOUNDARY_ID: TokenId = 0;

/// Interning storage mapping text units to stable integer identifiers.
///
/// The first occurrence of a unit receives the next free id; re-occurrences
/// reuse it. The boundary token is interned at construction time and always
/// holds id 0. Ids are never reassigned or removed for the lifetime of the
/// storage.
#[derive(Debug, Clone)]
pub struct Vocabulary {
	ids: HashMap<String, TokenId>,
	tokens: Vec<String>,
}

impl Vocabulary {
	pub(crate) fn new(boundary_token: &str) -> Self {
		let mut vocabulary = Self { ids: HashMap::new(), tokens: Vec::new() };
		vocabulary.intern(boundary_token);
		vocabulary
	}

	/// Rebuilds a vocabulary from its token list, preserving id order.
	/// The boundary token is expected at index 0.
	pub(crate) fn from_tokens(tokens: Vec<String>) -> Self {
		let ids = tokens
			.iter()
			.enumerate()
			.map(|(id, token)| (token.clone(), id as TokenId))
			.collect();
		Self { ids, tokens }
	}

	/// Inserts a unit if absent and returns its id.
	pub(crate) fn intern(&mut self, unit: &str) -> TokenId {
		if let Some(&id) = self.ids.get(unit) {
			return id;
		}
		let id = self.tokens.len() as TokenId;
		self.ids.insert(unit.to_owned(), id);
		self.tokens.push(unit.to_owned());
		id
	}

	/// Returns the id of a known unit.
	pub fn id_of(&self, unit: &str) -> Option<TokenId> {
		self.ids.get(unit).copied()
	}

	/// Returns the unit behind a known id.
	pub fn token_of(&self, id: TokenId) -> Option<&str> {
		self.tokens.get(id as usize).map(String::as_str)
	}

	pub fn len(&self) -> usize {
		self.tokens.len()
	}

	pub fn is_empty(&self) -> bool {
		self.tokens.is_empty()
	}

	pub(crate) fn tokens(&self) -> &[String] {
		&self.tokens
	}
}

/// Text codec consumed by the generators.
///
/// Implementations intern every unit they meet, so `encode` takes `&mut
/// self`; decoding never allocates new ids.
pub trait TextProcessor {
	/// Encodes text into a sequence of token ids.
	///
	/// # Errors
	/// Returns `LmError::Encoding` when the input is empty or tokenization
	/// yields no unit.
	fn encode(&mut self, text: &str) -> Result<Vec<TokenId>, LmError>;

	/// Decodes a sequence of token ids back into normalized text.
	///
	/// # Errors
	/// Returns `LmError::Decoding` on an empty sequence, an unknown id, or
	/// when nothing remains after boundary collapsing.
	fn decode(&self, encoded: &[TokenId]) -> Result<String, LmError>;

	fn id_of(&self, unit: &str) -> Option<TokenId>;

	fn token_of(&self, id: TokenId) -> Option<&str>;

	/// The boundary token this processor inserts between words or sentences.
	fn boundary_token(&self) -> &str;
}

/// Letter-level codec.
///
/// Tokenizes text into single lower-cased letters, inserting the
/// end-of-word token wherever a run of letters ends. Digits and punctuation
/// are dropped.
///
/// # Invariants
/// - The end-of-word token always holds id 0.
/// - Storage grows monotonically; ids are never reused.
#[derive(Debug, Clone)]
pub struct LetterProcessor {
	end_of_word_token: String,
	vocabulary: Vocabulary,
}

impl LetterProcessor {
	pub fn new(end_of_word_token: &str) -> Self {
		Self {
			end_of_word_token: end_of_word_token.to_owned(),
			vocabulary: Vocabulary::new(end_of_word_token),
		}
	}

	/// Splits text into single-letter units separated by the end-of-word
	/// token. The token is appended after the last letter of every word,
	/// including a word that ends the input.
	fn tokenize(&self, text: &str) -> Result<Vec<String>, LmError> {
		if text.is_empty() {
			return Err(LmError::Encoding("input text is empty".to_owned()));
		}

		let mut tokens = Vec::new();
		let mut in_word = false;

		for character in text.chars() {
			if character.is_alphabetic() {
				for lowered in character.to_lowercase() {
					tokens.push(lowered.to_string());
				}
				in_word = true;
			} else if in_word {
				tokens.push(self.end_of_word_token.clone());
				in_word = false;
			}
		}
		if in_word {
			tokens.push(self.end_of_word_token.clone());
		}

		if !tokens.iter().any(|token| token != &self.end_of_word_token) {
			return Err(LmError::Encoding("tokenization yielded no letters".to_owned()));
		}

		Ok(tokens)
	}

	fn postprocess(&self, units: &[&str]) -> Result<String, LmError> {
		let mut phrase = String::new();
		let mut previous_was_space = false;

		for unit in units {
			if *unit == self.end_of_word_token {
				if !previous_was_space {
					phrase.push(' ');
					previous_was_space = true;
				}
			} else {
				phrase.push_str(unit);
				previous_was_space = false;
			}
		}

		let trimmed = phrase.trim();
		if trimmed.is_empty() {
			return Err(LmError::Decoding(
				"nothing left after boundary collapsing".to_owned(),
			));
		}

		let mut result = capitalize_first(trimmed);
		if !result.ends_with('.') {
			result.push('.');
		}
		Ok(result)
	}

	pub(crate) fn vocabulary_mut(&mut self) -> &mut Vocabulary {
		&mut self.vocabulary
	}
}

impl TextProcessor for LetterProcessor {
	fn encode(&mut self, text: &str) -> Result<Vec<TokenId>, LmError> {
		let tokens = self.tokenize(text)?;
		Ok(tokens.iter().map(|token| self.vocabulary.intern(token)).collect())
	}

	fn decode(&self, encoded: &[TokenId]) -> Result<String, LmError> {
		if encoded.is_empty() {
			return Err(LmError::Decoding("encoded sequence is empty".to_owned()));
		}
		let units = lookup_all(&self.vocabulary, encoded)?;
		self.postprocess(&units)
	}

	fn id_of(&self, unit: &str) -> Option<TokenId> {
		self.vocabulary.id_of(unit)
	}

	fn token_of(&self, id: TokenId) -> Option<&str> {
		self.vocabulary.token_of(id)
	}

	fn boundary_token(&self) -> &str {
		&self.end_of_word_token
	}
}

/// Word-level, sentence-aware codec.
///
/// Units are whole lower-cased words (interior hyphens kept, punctuation
/// and digits stripped). The end-of-sentence token is inserted after every
/// word terminated by `.`, `!` or `?`, and after the final word of the
/// input, so every encoded text is a sequence of fully terminated
/// sentences.
#[derive(Debug, Clone)]
pub struct WordProcessor {
	end_of_sentence_token: String,
	vocabulary: Vocabulary,
}

impl WordProcessor {
	pub fn new(end_of_sentence_token: &str) -> Self {
		Self {
			end_of_sentence_token: end_of_sentence_token.to_owned(),
			vocabulary: Vocabulary::new(end_of_sentence_token),
		}
	}

	/// Rebuilds a processor from a persisted token list. The boundary token
	/// sits at index 0 by construction.
	pub(crate) fn from_tokens(tokens: Vec<String>) -> Result<Self, LmError> {
		let Some(end_of_sentence_token) = tokens.first().cloned() else {
			return Err(LmError::MalformedDocument("empty vocabulary".to_owned()));
		};
		Ok(Self {
			end_of_sentence_token,
			vocabulary: Vocabulary::from_tokens(tokens),
		})
	}

	fn tokenize(&self, text: &str) -> Result<Vec<String>, LmError> {
		if text.is_empty() {
			return Err(LmError::Encoding("input text is empty".to_owned()));
		}

		let mut tokens: Vec<String> = Vec::new();

		for raw_word in text.split_whitespace() {
			let ends_sentence = raw_word.ends_with(['.', '!', '?']);

			let cleaned: String = raw_word
				.chars()
				.filter(|character| character.is_alphabetic() || *character == '-')
				.flat_map(char::to_lowercase)
				.collect();
			let word = cleaned.trim_matches('-');
			if !word.is_empty() {
				tokens.push(word.to_owned());
			}

			// A bare punctuation word must not produce a leading or doubled
			// boundary token.
			let last_is_word = tokens
				.last()
				.is_some_and(|token| token != &self.end_of_sentence_token);
			if ends_sentence && last_is_word {
				tokens.push(self.end_of_sentence_token.clone());
			}
		}

		if tokens.is_empty() {
			return Err(LmError::Encoding("tokenization yielded no words".to_owned()));
		}
		if tokens.last().is_some_and(|token| token != &self.end_of_sentence_token) {
			tokens.push(self.end_of_sentence_token.clone());
		}

		Ok(tokens)
	}

	/// Encodes text and splits the result into sentences, each terminated
	/// by the boundary id.
	pub fn encode_sentences(&mut self, text: &str) -> Result<Vec<Vec<TokenId>>, LmError> {
		let encoded = self.encode(text)?;

		let mut sentences = Vec::new();
		let mut current = Vec::new();
		for id in encoded {
			current.push(id);
			if id == BOUNDARY_ID {
				sentences.push(std::mem::take(&mut current));
			}
		}
		if !current.is_empty() {
			current.push(BOUNDARY_ID);
			sentences.push(current);
		}

		Ok(sentences)
	}

	fn postprocess(&self, units: &[&str]) -> Result<String, LmError> {
		let mut sentences: Vec<Vec<&str>> = vec![Vec::new()];

		for unit in units {
			if *unit == self.end_of_sentence_token {
				if !sentences.last().is_some_and(Vec::is_empty) {
					sentences.push(Vec::new());
				}
			} else if let Some(current) = sentences.last_mut() {
				current.push(unit);
			}
		}

		let rendered: Vec<String> = sentences
			.iter()
			.filter(|sentence| !sentence.is_empty())
			.map(|sentence| {
				let mut text = capitalize_first(&sentence.join(" "));
				if !text.ends_with('.') {
					text.push('.');
				}
				text
			})
			.collect();

		if rendered.is_empty() {
			return Err(LmError::Decoding(
				"nothing left after boundary collapsing".to_owned(),
			));
		}
		Ok(rendered.join(" "))
	}

	pub(crate) fn vocabulary(&self) -> &Vocabulary {
		&self.vocabulary
	}
}

impl TextProcessor for WordProcessor {
	fn encode(&mut self, text: &str) -> Result<Vec<TokenId>, LmError> {
		let tokens = self.tokenize(text)?;
		Ok(tokens.iter().map(|token| self.vocabulary.intern(token)).collect())
	}

	fn decode(&self, encoded: &[TokenId]) -> Result<String, LmError> {
		if encoded.is_empty() {
			return Err(LmError::Decoding("encoded sequence is empty".to_owned()));
		}
		let units = lookup_all(&self.vocabulary, encoded)?;
		self.postprocess(&units)
	}

	fn id_of(&self, unit: &str) -> Option<TokenId> {
		self.vocabulary.id_of(unit)
	}

	fn token_of(&self, id: TokenId) -> Option<&str> {
		self.vocabulary.token_of(id)
	}

	fn boundary_token(&self) -> &str {
		&self.end_of_sentence_token
	}
}

fn lookup_all<'a>(
	vocabulary: &'a Vocabulary,
	encoded: &[TokenId],
) -> Result<Vec<&'a str>, LmError> {
	encoded
		.iter()
		.map(|&id| {
			vocabulary
				.token_of(id)
				.ok_or_else(|| LmError::Decoding(format!("unknown token id {id}")))
		})
		.collect()
}

fn capitalize_first(text: &str) -> String {
	let mut characters = text.chars();
	match characters.next() {
		Some(first) => first.to_uppercase().chain(characters).collect(),
		None => String::new(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn letter_encode_assigns_sequential_ids() {
		let mut processor = LetterProcessor::new("_");
		let encoded = processor.encode("aba").unwrap();
		// a=1, b=2, trailing end-of-word = 0
		assert_eq!(encoded, vec![1, 2, 1, 0]);
		assert_eq!(processor.id_of("_"), Some(0));
	}

	#[test]
	fn letter_tokenize_drops_digits_and_punctuation() {
		let mut processor = LetterProcessor::new("_");
		let encoded = processor.encode("ab, cd 12").unwrap();
		let with_digits = processor.encode("ab cd").unwrap();
		assert_eq!(encoded, with_digits);
	}

	#[test]
	fn letter_encode_rejects_unusable_input() {
		let mut processor = LetterProcessor::new("_");
		for bad in ["", "!!!", "123456789"] {
			assert!(matches!(processor.encode(bad), Err(LmError::Encoding(_))));
		}
	}

	#[test]
	fn letter_decode_normalizes() {
		let mut processor = LetterProcessor::new("_");
		let encoded = processor.encode("hello  world").unwrap();
		let decoded = processor.decode(&encoded).unwrap();
		assert_eq!(decoded, "Hello world.");
	}

	#[test]
	fn letter_decode_is_stable_once_normalized() {
		let mut processor = LetterProcessor::new("_");
		let once = {
			let encoded = processor.encode("Mixed CASE, input!").unwrap();
			processor.decode(&encoded).unwrap()
		};
		let twice = {
			let encoded = processor.encode(&once).unwrap();
			processor.decode(&encoded).unwrap()
		};
		assert_eq!(once, twice);
	}

	#[test]
	fn letter_decode_rejects_boundary_only_sequence() {
		let mut processor = LetterProcessor::new("_");
		processor.encode("a").unwrap();
		assert!(matches!(processor.decode(&[0, 0]), Err(LmError::Decoding(_))));
		assert!(matches!(processor.decode(&[]), Err(LmError::Decoding(_))));
	}

	#[test]
	fn letter_decode_rejects_unknown_id() {
		let mut processor = LetterProcessor::new("_");
		processor.encode("ab").unwrap();
		assert!(matches!(processor.decode(&[1, 99]), Err(LmError::Decoding(_))));
	}

	#[test]
	fn word_encode_sentences_splits_on_boundary() {
		let mut processor = WordProcessor::new("<EOS>");
		let sentences = processor.encode_sentences("Hello World! How are you?").unwrap();
		assert_eq!(sentences, vec![vec![1, 2, 0], vec![3, 4, 5, 0]]);
	}

	#[test]
	fn word_decode_capitalizes_each_sentence() {
		let mut processor = WordProcessor::new("<EOS>");
		processor.encode("Hello World! How are you?").unwrap();
		let decoded = processor.decode(&[1, 2, 0, 3, 4, 5]).unwrap();
		assert_eq!(decoded, "Hello world. How are you.");
	}

	#[test]
	fn word_tokenize_keeps_interior_hyphens() {
		let mut processor = WordProcessor::new("<EOS>");
		let encoded = processor.encode("well-known fact.").unwrap();
		assert_eq!(processor.token_of(encoded[0]), Some("well-known"));
	}

	#[test]
	fn word_tokenize_ignores_bare_punctuation() {
		let mut processor = WordProcessor::new("<EOS>");
		let encoded = processor.encode("hello ... world.").unwrap();
		// The floating ellipsis terminates the first sentence, nothing more.
		assert_eq!(encoded, vec![1, 0, 2, 0]);
	}

	#[test]
	fn word_encode_rejects_unusable_input() {
		let mut processor = WordProcessor::new("<EOS>");
		for bad in ["", "?!", "2024"] {
			assert!(matches!(processor.encode(bad), Err(LmError::Encoding(_))));
		}
	}

	#[test]
	fn word_decode_collapses_repeated_boundaries() {
		let mut processor = WordProcessor::new("<EOS>");
		processor.encode("hello world.").unwrap();
		let decoded = processor.decode(&[1, 0, 0, 2]).unwrap();
		assert_eq!(decoded, "Hello. World.");
	}

	#[test]
	fn vocabulary_round_trips_through_token_list() {
		let mut processor = WordProcessor::new("<EOS>");
		processor.encode("one two three.").unwrap();
		let tokens = processor.vocabulary().tokens().to_vec();
		let restored = WordProcessor::from_tokens(tokens).unwrap();
		assert_eq!(restored.boundary_token(), "<EOS>");
		assert_eq!(restored.id_of("two"), processor.id_of("two"));
	}
}
