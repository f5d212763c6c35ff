use thiserror::Error;

/// Errors reported by the codec, the models and the generators.
///
/// # Notes
/// - `TriePrefixNotFound` is recoverable: it marks a context path that was
///   never observed, which drives back-off to a lower n-gram order. It is
///   caught inside the model layer and never surfaces from a generator.
/// - Encoding/decoding failures are fatal for the call that raised them.
#[derive(Debug, Error)]
pub enum LmError {
	/// Tokenization or encoding could not produce a usable sequence.
	#[error("encoding failed: {0}")]
	Encoding(String),

	/// Id-to-text reconstruction yielded nothing meaningful.
	#[error("decoding failed: {0}")]
	Decoding(String),

	/// A requested context path does not exist in a trie.
	#[error("prefix not found in trie")]
	TriePrefixNotFound,

	/// A requested n-gram order lies outside the configured bounds.
	#[error("n-gram size {0} is outside the configured bounds")]
	IncorrectNgram(usize),

	/// No per-order models are available to merge.
	#[error("no n-gram models available to merge")]
	MergeTrees,

	/// The corpus is empty or no full n-gram window fits into it.
	#[error("corpus is empty or too short for the requested n-gram size")]
	IncorrectCorpus,

	/// A caller-supplied parameter is unusable (e.g. a zero length).
	#[error("invalid argument: {0}")]
	InvalidArgument(String),

	#[error(transparent)]
	Io(#[from] std::io::Error),

	/// A persisted model document could not be parsed or is inconsistent.
	#[error("malformed model document: {0}")]
	MalformedDocument(String),
}

impl From<serde_json::Error> for LmError {
	fn from(error: serde_json::Error) -> Self {
		Self::MalformedDocument(error.to_string())
	}
}

impl From<postcard::Error> for LmError {
	fn from(error: postcard::Error) -> Self {
		Self::MalformedDocument(error.to_string())
	}
}
