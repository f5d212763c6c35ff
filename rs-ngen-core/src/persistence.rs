//! Saving and loading of the dynamic trie model.
//!
//! The canonical format is a JSON document: recursive node objects of the
//! form `{"value": <id-or-null>, "freq": <float>, "children": [...]}`,
//! with the encoded corpus and the maximum order as sibling fields on the
//! root so a full model can be reconstructed. Next to it lives a compact
//! postcard cache that additionally bundles the word-level vocabulary for
//! fast reloads without re-encoding.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::LmError;
use crate::io;
use crate::model::TokenId;
use crate::model::dynamic_trie::DynamicTrieModel;
use crate::model::processor::WordProcessor;
use crate::model::trie::{NodeId, Trie};

/// One serialized trie node. `value` holds the node's token id (`null`
/// only on the root), `freq` its stored frequency.
#[derive(Debug, Serialize, Deserialize)]
pub struct NodeDocument {
	pub value: Option<TokenId>,
	pub freq: f64,
	pub children: Vec<NodeDocument>,
}

/// Root document: the merged tree plus the fields needed to rebuild the
/// rest of the model.
#[derive(Debug, Serialize, Deserialize)]
pub struct TrieDocument {
	pub value: Option<TokenId>,
	pub freq: f64,
	pub children: Vec<NodeDocument>,
	pub corpus: Vec<Vec<TokenId>>,
	pub max_ngram_size: usize,
}

/// Binary cache payload: the document plus the vocabulary that produced
/// the corpus, token index = token id.
#[derive(Debug, Serialize, Deserialize)]
struct CachedModel {
	tokens: Vec<String>,
	document: TrieDocument,
}

/// Renders a model into its document form via a full pre-order traversal
/// of the merged trie.
pub fn to_document(model: &DynamicTrieModel) -> TrieDocument {
	let merged = model.merged();
	TrieDocument {
		value: None,
		freq: merged.node(Trie::ROOT).freq(),
		children: child_documents(merged, Trie::ROOT),
		corpus: model.get_encoded_corpus().to_vec(),
		max_ngram_size: model.get_max_ngram_size(),
	}
}

fn child_documents(trie: &Trie, node: NodeId) -> Vec<NodeDocument> {
	trie.children(node)
		.map(|(child_id, child)| NodeDocument {
			value: child.name(),
			freq: child.freq(),
			children: child_documents(trie, child_id),
		})
		.collect()
}

/// Rebuilds a model from its document form, restoring nodes in the same
/// pre-order the traversal wrote them.
///
/// # Errors
/// `MalformedDocument` when the maximum order is degenerate or a non-root
/// node carries no token id.
pub fn from_document(document: &TrieDocument) -> Result<DynamicTrieModel, LmError> {
	if document.max_ngram_size < 2 {
		return Err(LmError::MalformedDocument(format!(
			"max n-gram size {} is degenerate",
			document.max_ngram_size
		)));
	}

	let mut merged = Trie::new();
	for child in &document.children {
		restore_node(&mut merged, Trie::ROOT, child)?;
	}

	Ok(DynamicTrieModel::from_parts(
		document.corpus.clone(),
		document.max_ngram_size,
		merged,
	))
}

fn restore_node(trie: &mut Trie, parent: NodeId, document: &NodeDocument) -> Result<(), LmError> {
	let Some(name) = document.value else {
		return Err(LmError::MalformedDocument(
			"non-root node without a token id".to_owned(),
		));
	};
	let node = trie.assign_child(parent, name, Some(document.freq));
	for child in &document.children {
		restore_node(trie, node, child)?;
	}
	Ok(())
}

/// Writes the model's JSON document to `path`, replacing any previous
/// content in one whole-document write.
pub fn save<P: AsRef<Path>>(model: &DynamicTrieModel, path: P) -> Result<(), LmError> {
	let rendered = serde_json::to_string_pretty(&to_document(model))?;
	fs::write(&path, rendered)?;
	log::debug!("saved model document to {}", path.as_ref().display());
	Ok(())
}

/// Reads a model back from its JSON document.
///
/// # Errors
/// A malformed document is unrecoverable for this call; nothing is
/// partially loaded.
pub fn load<P: AsRef<Path>>(path: P) -> Result<DynamicTrieModel, LmError> {
	let raw = io::read_text(&path)?;
	let document: TrieDocument = serde_json::from_str(&raw)?;
	log::debug!("loaded model document from {}", path.as_ref().display());
	from_document(&document)
}

/// Writes the compact binary cache: the same document plus the processor
/// vocabulary, so a later `load_cache` can decode without re-encoding.
pub fn save_cache<P: AsRef<Path>>(
	processor: &WordProcessor,
	model: &DynamicTrieModel,
	path: P,
) -> Result<(), LmError> {
	let cached = CachedModel {
		tokens: processor.vocabulary().tokens().to_vec(),
		document: to_document(model),
	};
	let bytes = postcard::to_stdvec(&cached)?;
	fs::write(&path, bytes)?;
	log::debug!("saved binary cache to {}", path.as_ref().display());
	Ok(())
}

/// Restores a processor/model pair from the binary cache.
pub fn load_cache<P: AsRef<Path>>(path: P) -> Result<(WordProcessor, DynamicTrieModel), LmError> {
	let bytes = fs::read(&path)?;
	let cached: CachedModel = postcard::from_bytes(&bytes)?;
	let processor = WordProcessor::from_tokens(cached.tokens)?;
	let model = from_document(&cached.document)?;
	log::debug!("loaded binary cache from {}", path.as_ref().display());
	Ok((processor, model))
}
