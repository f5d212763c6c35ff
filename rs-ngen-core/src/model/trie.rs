use std::collections::HashMap;

use crate::error::LmError;
use crate::model::TokenId;

/// Index of a node inside the trie arena.
pub type NodeId = usize;

/// A single trie node: a name (absent only for the root), a frequency and
/// the arena indices of its children.
///
/// The frequency is meaningful only on nodes that terminate an n-gram path
/// of the owning model; shorter paths carry a 0.0 residual used purely for
/// traversal.
#[derive(Debug, Clone)]
pub struct TrieNode {
	name: Option<TokenId>,
	freq: f64,
	children: Vec<NodeId>,
}

impl TrieNode {
	fn new(name: Option<TokenId>) -> Self {
		Self { name, freq: 0.0, children: Vec::new() }
	}

	pub fn name(&self) -> Option<TokenId> {
		self.name
	}

	pub fn freq(&self) -> f64 {
		self.freq
	}

	pub fn has_children(&self) -> bool {
		!self.children.is_empty()
	}
}

/// Prefix tree over token ids, arena-backed.
///
/// All nodes live in one contiguous `Vec`; child links are indices into
/// it. The root sits at index 0 and has no name. Children of a common
/// parent have pairwise-distinct names and keep their insertion order.
#[derive(Debug, Clone)]
pub struct Trie {
	nodes: Vec<TrieNode>,
}

impl Default for Trie {
	fn default() -> Self {
		Self::new()
	}
}

impl Trie {
	pub const ROOT: NodeId = 0;

	pub fn new() -> Self {
		Self { nodes: vec![TrieNode::new(None)] }
	}

	/// Drops every node except a fresh root.
	pub fn clear(&mut self) {
		self.nodes.clear();
		self.nodes.push(TrieNode::new(None));
	}

	pub fn node(&self, id: NodeId) -> &TrieNode {
		&self.nodes[id]
	}

	/// Number of nodes in the arena, root included.
	pub fn len(&self) -> usize {
		self.nodes.len()
	}

	pub fn is_empty(&self) -> bool {
		self.nodes[Self::ROOT].children.is_empty()
	}

	/// Finds the child of `parent` carrying `name`.
	pub fn child_named(&self, parent: NodeId, name: TokenId) -> Option<NodeId> {
		self.nodes[parent]
			.children
			.iter()
			.copied()
			.find(|&child| self.nodes[child].name == Some(name))
	}

	/// Finds or creates the child of `parent` carrying `name`, optionally
	/// overwriting its frequency. This is the merge primitive: an indexed
	/// insert-or-find with no pointer chasing.
	pub fn assign_child(&mut self, parent: NodeId, name: TokenId, freq: Option<f64>) -> NodeId {
		let child = match self.child_named(parent, name) {
			Some(existing) => existing,
			None => {
				let created = self.nodes.len();
				self.nodes.push(TrieNode::new(Some(name)));
				self.nodes[parent].children.push(created);
				created
			}
		};
		if let Some(freq) = freq {
			self.nodes[child].freq = freq;
		}
		child
	}

	/// Inserts a sequence as a root-to-leaf path and returns the final
	/// node. Shared prefixes are reused.
	pub fn insert(&mut self, sequence: &[TokenId]) -> NodeId {
		let mut node = Self::ROOT;
		for &name in sequence {
			node = self.assign_child(node, name, None);
		}
		node
	}

	pub fn set_freq(&mut self, id: NodeId, freq: f64) {
		self.nodes[id].freq = freq;
	}

	/// Descends the tree along `prefix`.
	///
	/// # Errors
	/// `TriePrefixNotFound` when the path does not exist. An existing path
	/// with no children is *not* an error: the two conditions are
	/// distinguished on purpose, since only the former triggers back-off.
	pub fn find_prefix(&self, prefix: &[TokenId]) -> Result<NodeId, LmError> {
		let mut node = Self::ROOT;
		for &name in prefix {
			node = self
				.child_named(node, name)
				.ok_or(LmError::TriePrefixNotFound)?;
		}
		Ok(node)
	}

	/// The (name, frequency) pairs of a node's immediate children: the
	/// continuation distribution of the context ending at `id`.
	pub fn continuations(&self, id: NodeId) -> HashMap<TokenId, f64> {
		self.nodes[id]
			.children
			.iter()
			.filter_map(|&child| {
				let node = &self.nodes[child];
				node.name.map(|name| (name, node.freq))
			})
			.collect()
	}

	/// Iterates a node's children as (arena id, node) pairs in insertion
	/// order.
	pub fn children(&self, id: NodeId) -> impl Iterator<Item = (NodeId, &TrieNode)> {
		self.nodes[id]
			.children
			.iter()
			.map(|&child| (child, &self.nodes[child]))
	}

	/// Returns every stored sequence that starts with `prefix`, the prefix
	/// included. An unknown prefix yields an empty listing.
	pub fn suggest(&self, prefix: &[TokenId]) -> Vec<Vec<TokenId>> {
		let Ok(start) = self.find_prefix(prefix) else {
			return Vec::new();
		};

		let mut sequences = Vec::new();
		let mut path = prefix.to_vec();
		self.collect_suggestions(start, &mut path, &mut sequences);
		sequences
	}

	fn collect_suggestions(
		&self,
		node: NodeId,
		path: &mut Vec<TokenId>,
		sequences: &mut Vec<Vec<TokenId>>,
	) {
		if !self.nodes[node].has_children() {
			sequences.push(path.clone());
			return;
		}
		for &child in &self.nodes[node].children {
			if let Some(name) = self.nodes[child].name {
				path.push(name);
				self.collect_suggestions(child, path, sequences);
				path.pop();
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn insert_shares_prefixes() {
		let mut trie = Trie::new();
		trie.insert(&[1, 2, 3]);
		trie.insert(&[1, 2, 4]);
		// root + shared (1,2) + two leaves
		assert_eq!(trie.len(), 5);
	}

	#[test]
	fn find_prefix_distinguishes_missing_from_leaf() {
		let mut trie = Trie::new();
		let leaf = trie.insert(&[1, 2, 3]);

		assert!(matches!(trie.find_prefix(&[9, 9]), Err(LmError::TriePrefixNotFound)));

		let found = trie.find_prefix(&[1, 2, 3]).unwrap();
		assert_eq!(found, leaf);
		assert!(trie.continuations(found).is_empty());
	}

	#[test]
	fn assign_child_reuses_existing_node() {
		let mut trie = Trie::new();
		let first = trie.assign_child(Trie::ROOT, 13, None);
		let grandchild = trie.assign_child(first, 42, None);
		let again = trie.assign_child(Trie::ROOT, 13, Some(0.0911));

		assert_eq!(first, again);
		assert!((trie.node(again).freq() - 0.0911).abs() < 1e-12);
		assert_eq!(trie.child_named(again, 42), Some(grandchild));
	}

	#[test]
	fn assign_child_without_freq_keeps_value() {
		let mut trie = Trie::new();
		let child = trie.assign_child(Trie::ROOT, 7, Some(0.5));
		trie.assign_child(Trie::ROOT, 7, None);
		assert!((trie.node(child).freq() - 0.5).abs() < 1e-12);
	}

	#[test]
	fn continuations_lists_immediate_children_only() {
		let mut trie = Trie::new();
		trie.insert(&[1, 2, 3]);
		trie.insert(&[1, 4]);

		let node = trie.find_prefix(&[1]).unwrap();
		let tokens = trie.continuations(node);
		assert_eq!(tokens.len(), 2);
		assert!(tokens.contains_key(&2) && tokens.contains_key(&4));
	}

	#[test]
	fn suggest_returns_full_sequences_under_prefix() {
		let mut trie = Trie::new();
		trie.insert(&[2, 3, 4]);
		trie.insert(&[2, 3, 5]);
		trie.insert(&[7, 8]);

		let mut suggestions = trie.suggest(&[2]);
		suggestions.sort();
		assert_eq!(suggestions, vec![vec![2, 3, 4], vec![2, 3, 5]]);
		assert!(trie.suggest(&[9]).is_empty());
	}

	#[test]
	fn clear_resets_to_lone_root() {
		let mut trie = Trie::new();
		trie.insert(&[1, 2]);
		trie.clear();
		assert!(trie.is_empty());
		assert_eq!(trie.len(), 1);
	}
}
