// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 Opal Contributors

use std::collections::HashMap;

use crate::node::NodeId;

/// Ordered, name-addressable view over the graph's current outputs.
///
/// The sequence defines the output column order and may contain several
/// entries with the same name; the map always points at the last one
/// inserted. Removing a name only prunes the map entry, so the node stays
/// latent in the graph until the next unused-action sweep.
#[derive(Clone, Debug, Default)]
pub struct Index {
	sequence: Vec<NodeId>,
	// name -> position in `sequence`
	map: HashMap<String, usize>,
}

impl Index {
	/// Append an entry. An existing entry with the same name is kept in
	/// the sequence; only future lookups are redirected.
	pub fn insert(&mut self, name: impl Into<String>, id: NodeId) {
		self.sequence.push(id);
		self.map.insert(name.into(), self.sequence.len() - 1);
	}

	/// Rebind the name's position to `id` in place if present, keeping
	/// the sequence order. Otherwise insert.
	pub fn replace(&mut self, name: impl Into<String>, id: NodeId) {
		let name = name.into();
		match self.map.get(&name) {
			Some(&position) => self.sequence[position] = id,
			None => self.insert(name, id),
		}
	}

	/// Drop the name from the lookup. The sequence entry stays.
	pub fn remove(&mut self, name: &str) {
		self.map.remove(name);
	}

	pub fn get(&self, name: &str) -> Option<NodeId> {
		self.map.get(name).map(|&position| self.sequence[position])
	}

	pub fn contains(&self, name: &str) -> bool {
		self.map.contains_key(name)
	}

	pub fn len(&self) -> usize {
		self.sequence.len()
	}

	pub fn is_empty(&self) -> bool {
		self.sequence.is_empty()
	}

	/// Iterate sequence entries in output order.
	pub fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
		self.sequence.iter().copied()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_shadowing_insert_keeps_sequence_entry() {
		let mut index = Index::default();
		index.insert("a", NodeId(0));
		index.insert("a", NodeId(1));

		// Both entries remain positionally, lookup sees the last.
		assert_eq!(index.len(), 2);
		assert_eq!(index.get("a"), Some(NodeId(1)));
		let order: Vec<_> = index.iter().collect();
		assert_eq!(order, vec![NodeId(0), NodeId(1)]);
	}

	#[test]
	fn test_replace_rebinds_in_place() {
		let mut index = Index::default();
		index.insert("a", NodeId(0));
		index.insert("b", NodeId(1));
		index.replace("a", NodeId(2));

		assert_eq!(index.len(), 2);
		assert_eq!(index.get("a"), Some(NodeId(2)));
		let order: Vec<_> = index.iter().collect();
		assert_eq!(order, vec![NodeId(2), NodeId(1)]);
	}

	#[test]
	fn test_replace_missing_appends() {
		let mut index = Index::default();
		index.replace("a", NodeId(0));
		assert_eq!(index.get("a"), Some(NodeId(0)));
		assert_eq!(index.len(), 1);
	}

	#[test]
	fn test_remove_prunes_lookup_only() {
		let mut index = Index::default();
		index.insert("a", NodeId(0));
		index.remove("a");

		assert_eq!(index.get("a"), None);
		assert!(!index.contains("a"));
		// Sequence entry stays for positional iteration.
		assert_eq!(index.len(), 1);
	}

	#[test]
	fn test_missing_name_is_distinct_from_empty() {
		let index = Index::default();
		assert_eq!(index.get("never"), None);
	}
}
