// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 Opal Contributors

use std::{
	fmt,
	fmt::{Display, Formatter},
	sync::Arc,
};

use opal_column::{DataType, Value};

use crate::function::{FunctionDescriptor, ResolvedFunction};

/// Stable handle to a node in a [`NodeArena`].
///
/// Ids are arena offsets. The arena is append-only, so a handle stays
/// valid for the lifetime of the owning graph; only an unused-action sweep
/// rebuilds the arena, and it remaps every surviving handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
	pub fn index(self) -> usize {
		self.0
	}
}

/// One expression computation.
#[derive(Clone, Debug)]
pub enum NodeKind {
	/// Column which must be present in the input block.
	Input,
	/// Constant column with known value.
	///
	/// Some functions always return a constant but still need a real
	/// materialized column; those set `allow_constant_folding` to false.
	Column {
		value: Value,
		allow_constant_folding: bool,
	},
	/// Another name for an existing column.
	Alias {
		source: NodeId,
	},
	/// Expands an array column into multiple rows. The only node kind
	/// that changes the row count.
	ArrayExpand {
		source: NodeId,
	},
	Function {
		children: Vec<NodeId>,
		descriptor: Arc<dyn FunctionDescriptor>,
		resolved: ResolvedFunction,
		compiled: bool,
	},
}

#[derive(Clone, Debug)]
pub struct Node {
	pub kind: NodeKind,
	pub result_name: String,
	pub result_type: DataType,
}

impl Node {
	/// Operand handles, in argument order. Empty for leaves.
	pub fn children(&self) -> &[NodeId] {
		match &self.kind {
			NodeKind::Input | NodeKind::Column { .. } => &[],
			NodeKind::Alias { source } | NodeKind::ArrayExpand { source } => {
				std::slice::from_ref(source)
			}
			NodeKind::Function { children, .. } => children,
		}
	}

	fn kind_name(&self) -> &'static str {
		match &self.kind {
			NodeKind::Input => "INPUT",
			NodeKind::Column { .. } => "COLUMN",
			NodeKind::Alias { .. } => "ALIAS",
			NodeKind::ArrayExpand { .. } => "ARRAY EXPAND",
			NodeKind::Function { .. } => "FUNCTION",
		}
	}
}

impl Display for Node {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		write!(f, "{} {} : {}", self.kind_name(), self.result_name, self.result_type)?;
		if let NodeKind::Function { resolved, compiled, .. } = &self.kind {
			write!(f, " = {}(...)", resolved.name)?;
			if *compiled {
				f.write_str(" [compiled]")?;
			}
		}
		Ok(())
	}
}

/// Append-only node store with stable offsets.
#[derive(Clone, Debug, Default)]
pub struct NodeArena {
	nodes: Vec<Node>,
}

impl NodeArena {
	pub fn push(&mut self, node: Node) -> NodeId {
		let id = NodeId(self.nodes.len());
		self.nodes.push(node);
		id
	}

	pub fn get(&self, id: NodeId) -> &Node {
		&self.nodes[id.0]
	}

	pub fn get_mut(&mut self, id: NodeId) -> &mut Node {
		&mut self.nodes[id.0]
	}

	pub fn len(&self) -> usize {
		self.nodes.len()
	}

	pub fn is_empty(&self) -> bool {
		self.nodes.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
		self.nodes.iter().enumerate().map(|(i, node)| (NodeId(i), node))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn input(name: &str) -> Node {
		Node {
			kind: NodeKind::Input,
			result_name: name.to_string(),
			result_type: DataType::Int64,
		}
	}

	#[test]
	fn test_arena_push_returns_stable_ids() {
		let mut arena = NodeArena::default();
		let a = arena.push(input("a"));
		let b = arena.push(input("b"));
		assert_eq!(a.index(), 0);
		assert_eq!(b.index(), 1);
		assert_eq!(arena.get(a).result_name, "a");
		assert_eq!(arena.get(b).result_name, "b");
	}

	#[test]
	fn test_leaf_has_no_children() {
		let mut arena = NodeArena::default();
		let a = arena.push(input("a"));
		assert!(arena.get(a).children().is_empty());
	}
}
