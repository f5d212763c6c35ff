use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::LmError;
use crate::io;
use crate::model::TokenId;
use crate::model::ngram_model::NGramModel;
use crate::model::processor::{BOUNDARY_ID, LetterProcessor};

/// On-disk corpus asset: a `freq` map from literal n-gram strings (raw
/// characters, spaces and punctuation included) to floating counts.
#[derive(Debug, Deserialize)]
struct CorpusAsset {
	freq: HashMap<String, f64>,
}

/// Factory loading letter-level language models from an external JSON
/// asset.
///
/// One reader owns one `LetterProcessor`, so every order loaded from the
/// same file shares a single vocabulary. The asset's raw n-gram strings
/// are filtered on the way in: letters are lower-cased and interned,
/// interior spaces map to the boundary id, punctuation and digits are
/// dropped, and only tuples of exactly the requested order are kept.
pub struct NGramModelReader {
	json_path: PathBuf,
	processor: LetterProcessor,
}

impl NGramModelReader {
	pub fn new<P: AsRef<Path>>(json_path: P, end_of_word_token: &str) -> Self {
		Self {
			json_path: json_path.as_ref().to_owned(),
			processor: LetterProcessor::new(end_of_word_token),
		}
	}

	/// Builds a model of the given order from the asset.
	///
	/// Counts of n-gram strings that collapse to the same id tuple are
	/// summed before converting to conditional probabilities.
	///
	/// # Errors
	/// - `IncorrectNgram` when the order is below 2.
	/// - `Io`/`MalformedDocument` when the asset cannot be read or parsed.
	/// - `IncorrectCorpus` when no usable n-gram of the order remains.
	pub fn load(&mut self, n_gram_size: usize) -> Result<NGramModel, LmError> {
		if n_gram_size < 2 {
			return Err(LmError::IncorrectNgram(n_gram_size));
		}

		let raw = io::read_text(&self.json_path)?;
		let asset: CorpusAsset = serde_json::from_str(&raw)?;
		let frequencies = self.convert(&asset.freq, n_gram_size)?;

		let mut model = NGramModel::new(Vec::new(), n_gram_size);
		model.set_n_grams(frequencies);
		log::debug!(
			"loaded an order-{} model from {}",
			n_gram_size,
			self.json_path.display()
		);
		Ok(model)
	}

	fn convert(
		&mut self,
		freq: &HashMap<String, f64>,
		n_gram_size: usize,
	) -> Result<HashMap<Vec<TokenId>, f64>, LmError> {
		let mut absolute: HashMap<Vec<TokenId>, f64> = HashMap::new();
		for (n_gram, count) in freq {
			let ids = self.encode_raw(n_gram);
			if ids.len() == n_gram_size {
				*absolute.entry(ids).or_insert(0.0) += count;
			}
		}
		if absolute.is_empty() {
			return Err(LmError::IncorrectCorpus);
		}

		let context_len = n_gram_size - 1;
		let mut contexts: HashMap<Vec<TokenId>, f64> = HashMap::new();
		for (ids, count) in &absolute {
			*contexts.entry(ids[..context_len].to_vec()).or_insert(0.0) += count;
		}

		let mut frequencies = HashMap::new();
		for (ids, count) in absolute {
			if let Some(&context_count) = contexts.get(&ids[..context_len]) {
				if context_count > 0.0 {
					frequencies.insert(ids, count / context_count);
				}
			}
		}
		Ok(frequencies)
	}

	/// Maps one raw n-gram string to ids: letters intern, a space becomes
	/// the boundary id, anything else disappears.
	fn encode_raw(&mut self, n_gram: &str) -> Vec<TokenId> {
		let mut ids = Vec::new();
		for character in n_gram.chars() {
			if character == ' ' {
				ids.push(BOUNDARY_ID);
			} else if character.is_alphabetic() {
				for lowered in character.to_lowercase() {
					ids.push(self.processor.vocabulary_mut().intern(&lowered.to_string()));
				}
			}
		}
		ids
	}

	/// The processor created for the current asset file.
	pub fn get_text_processor(&self) -> &LetterProcessor {
		&self.processor
	}

	/// Consumes the reader, releasing the processor for generation.
	pub fn into_text_processor(self) -> LetterProcessor {
		self.processor
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::model::ngram_model::LanguageModel;
	use crate::model::processor::TextProcessor;

	fn write_asset(name: &str, contents: &str) -> PathBuf {
		let path = std::env::temp_dir().join(format!(
			"rs-ngen-reader-{}-{name}.json",
			std::process::id()
		));
		std::fs::write(&path, contents).unwrap();
		path
	}

	#[test]
	fn load_filters_and_normalizes_ngrams() {
		let path = write_asset(
			"filters",
			r#"{"freq": {"ab": 3.0, "a9b": 1.0, "a ": 2.0, "abc": 5.0, "x!": 4.0}}"#,
		);
		let mut reader = NGramModelReader::new(&path, "_");
		let model = reader.load(2).unwrap();

		let a = reader.get_text_processor().id_of("a").unwrap();
		let b = reader.get_text_processor().id_of("b").unwrap();

		// "ab" and "a9b" collapse to the same tuple (4.0 total), "a " maps
		// its space to the boundary id (2.0), "abc" is the wrong length
		// and "x!" shrinks to a single letter.
		let tokens = model.generate_next_token(&[a]).unwrap();
		assert!((tokens[&b] - 4.0 / 6.0).abs() < 1e-9);
		assert!((tokens[&BOUNDARY_ID] - 2.0 / 6.0).abs() < 1e-9);

		std::fs::remove_file(&path).ok();
	}

	#[test]
	fn load_rejects_degenerate_order() {
		let path = write_asset("degenerate", r#"{"freq": {"ab": 1.0}}"#);
		let mut reader = NGramModelReader::new(&path, "_");
		assert!(matches!(reader.load(1), Err(LmError::IncorrectNgram(1))));
		std::fs::remove_file(&path).ok();
	}

	#[test]
	fn load_rejects_asset_without_usable_ngrams() {
		let path = write_asset("unusable", r#"{"freq": {"abc": 1.0, "1!": 2.0}}"#);
		let mut reader = NGramModelReader::new(&path, "_");
		assert!(matches!(reader.load(2), Err(LmError::IncorrectCorpus)));
		std::fs::remove_file(&path).ok();
	}

	#[test]
	fn load_rejects_malformed_document() {
		let path = write_asset("malformed", r#"{"not-freq": []}"#);
		let mut reader = NGramModelReader::new(&path, "_");
		assert!(matches!(reader.load(2), Err(LmError::MalformedDocument(_))));
		std::fs::remove_file(&path).ok();
	}

	#[test]
	fn orders_loaded_from_one_reader_share_a_vocabulary() {
		let path = write_asset("shared-vocab", r#"{"freq": {"ab": 1.0, "abc": 1.0}}"#);
		let mut reader = NGramModelReader::new(&path, "_");
		reader.load(2).unwrap();
		reader.load(3).unwrap();

		let processor = reader.into_text_processor();
		assert_eq!(processor.id_of("_"), Some(0));
		assert!(processor.id_of("a").is_some());
		assert!(processor.id_of("c").is_some());
		std::fs::remove_file(&path).ok();
	}
}
