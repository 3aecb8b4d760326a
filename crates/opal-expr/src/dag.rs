// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 Opal Contributors

//! Directed acyclic graph of expression computations.
//!
//! The DAG is an intermediate representation built from analyzed
//! expression lists. It keeps explicit dependencies between computations,
//! which makes it possible to prune unused expressions, fuse
//! sub-expressions, and split the graph around row-multiplying
//! operations. A built DAG is turned into an executable program by
//! [`crate::actions::ExpressionActions`].

use std::{
	collections::HashSet,
	fmt::Write,
	sync::Arc,
};

use opal_column::{ColumnData, DataType, Value};
use tracing::debug;

use crate::{
	compile::{CompiledExpressionCache, FusionNode, fingerprint, fuse},
	error::ExprError,
	function::{FunctionDescriptor, ResolvedFunction},
	index::Index,
	node::{Node, NodeArena, NodeId, NodeKind},
};

/// Build-time settings carried by a graph.
#[derive(Clone, Debug)]
pub struct DagSettings {
	/// Require every declared input to appear in the program even when
	/// no output depends on it, and normalize input order before the
	/// graph runs.
	pub project_input: bool,
	/// Outputs already form a minimal projection; chain finalize skips
	/// shrinking such a graph.
	pub projected_output: bool,
	pub compile_expressions: bool,
	/// Minimum number of chained function nodes worth fusing.
	pub min_count_to_compile: usize,
}

impl Default for DagSettings {
	fn default() -> Self {
		Self {
			project_input: false,
			projected_output: false,
			compile_expressions: false,
			min_count_to_compile: 2,
		}
	}
}

/// Expression DAG: append-only node store plus the ordered index of
/// current outputs.
#[derive(Clone, Debug, Default)]
pub struct ExpressionDag {
	nodes: NodeArena,
	index: Index,
	settings: DagSettings,
}

impl ExpressionDag {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_inputs<'a>(
		inputs: impl IntoIterator<Item = (&'a str, DataType)>,
	) -> Result<Self, ExprError> {
		let mut dag = Self::new();
		for (name, data_type) in inputs {
			dag.add_input(name, data_type)?;
		}
		Ok(dag)
	}

	pub(crate) fn nodes(&self) -> &NodeArena {
		&self.nodes
	}

	pub(crate) fn index(&self) -> &Index {
		&self.index
	}

	pub fn node(&self, id: NodeId) -> &Node {
		self.nodes.get(id)
	}

	pub fn settings(&self) -> &DagSettings {
		&self.settings
	}

	pub fn settings_mut(&mut self) -> &mut DagSettings {
		&mut self.settings
	}

	/// Request input projection: the program will reorder and prune the
	/// incoming block to the required inputs before running.
	pub fn project_input(&mut self) {
		self.settings.project_input = true;
	}

	fn node_id(&self, name: &str) -> Result<NodeId, ExprError> {
		self.index.get(name).ok_or_else(|| ExprError::UnknownIdentifier {
			name: name.to_string(),
		})
	}

	fn add_node(&mut self, node: Node, can_replace: bool) -> Result<NodeId, ExprError> {
		if !can_replace && self.index.contains(&node.result_name) {
			return Err(ExprError::DuplicateIdentifier {
				name: node.result_name,
			});
		}
		let name = node.result_name.clone();
		let id = self.nodes.push(node);
		self.index.replace(name, id);
		Ok(id)
	}

	pub fn add_input(
		&mut self,
		name: impl Into<String>,
		data_type: DataType,
	) -> Result<NodeId, ExprError> {
		self.add_node(
			Node {
				kind: NodeKind::Input,
				result_name: name.into(),
				result_type: data_type,
			},
			false,
		)
	}

	pub fn add_column(
		&mut self,
		name: impl Into<String>,
		value: Value,
		allow_constant_folding: bool,
	) -> Result<NodeId, ExprError> {
		let result_type = value.data_type();
		self.add_node(
			Node {
				kind: NodeKind::Column {
					value,
					allow_constant_folding,
				},
				result_name: name.into(),
				result_type,
			},
			false,
		)
	}

	pub fn add_alias(
		&mut self,
		name: &str,
		alias: impl Into<String>,
		can_replace: bool,
	) -> Result<NodeId, ExprError> {
		let source = self.node_id(name)?;
		let result_type = self.nodes.get(source).result_type.clone();
		self.add_node(
			Node {
				kind: NodeKind::Alias {
					source,
				},
				result_name: alias.into(),
				result_type,
			},
			can_replace,
		)
	}

	pub fn add_aliases<'a>(
		&mut self,
		aliases: impl IntoIterator<Item = (&'a str, &'a str)>,
	) -> Result<(), ExprError> {
		for (name, alias) in aliases {
			self.add_alias(name, alias, true)?;
		}
		Ok(())
	}

	pub fn add_array_expand(
		&mut self,
		source_name: &str,
		result_name: impl Into<String>,
	) -> Result<NodeId, ExprError> {
		let source = self.node_id(source_name)?;
		let source_type = self.nodes.get(source).result_type.clone();
		let Some(element) = source_type.element_type() else {
			return Err(ExprError::NotAnArray {
				name: source_name.to_string(),
				found: source_type,
			});
		};
		let result_type = element.clone();
		// Usually expands in place under the source's own name, so an
		// existing binding is rebound rather than rejected.
		self.add_node(
			Node {
				kind: NodeKind::ArrayExpand {
					source,
				},
				result_name: result_name.into(),
				result_type,
			},
			true,
		)
	}

	pub fn add_function(
		&mut self,
		descriptor: Arc<dyn FunctionDescriptor>,
		argument_names: &[&str],
		result_name: impl Into<String>,
	) -> Result<NodeId, ExprError> {
		let result_name = result_name.into();
		let mut children = Vec::with_capacity(argument_names.len());
		let mut argument_types = Vec::with_capacity(argument_names.len());
		for name in argument_names {
			let id = self.node_id(name)?;
			argument_types.push(self.nodes.get(id).result_type.clone());
			children.push(id);
		}

		let resolved = descriptor.resolve(&argument_types)?;

		if let Some(value) = self.try_fold_constant(&children, &resolved) {
			return self.add_node(
				Node {
					kind: NodeKind::Column {
						value,
						allow_constant_folding: !descriptor
							.suppresses_constant_folding(),
					},
					result_name,
					result_type: resolved.result_type,
				},
				false,
			);
		}

		let result_type = resolved.result_type.clone();
		self.add_node(
			Node {
				kind: NodeKind::Function {
					children,
					descriptor,
					resolved,
					compiled: false,
				},
				result_name,
				result_type,
			},
			false,
		)
	}

	/// Evaluate a function over all-constant arguments at build time.
	/// Returns `None` when any argument is non-constant, fold-prohibited,
	/// or when evaluation fails (the node then executes normally).
	fn try_fold_constant(
		&self,
		children: &[NodeId],
		resolved: &ResolvedFunction,
	) -> Option<Value> {
		let mut constants = Vec::with_capacity(children.len());
		for &child in children {
			match &self.nodes.get(child).kind {
				NodeKind::Column {
					value,
					allow_constant_folding: true,
				} => constants.push(ColumnData::constant(value, 1)),
				_ => return None,
			}
		}
		let arguments: Vec<&ColumnData> = constants.iter().collect();
		match (resolved.callable)(&arguments, 1) {
			Ok(data) if data.len() == 1 => Some(data.get(0)),
			_ => None,
		}
	}

	/// Rename and reorder outputs to exactly this projection list.
	///
	/// Identity pairs reuse the source node; every other pair gets an
	/// alias node. This is the only operation that shrinks the output
	/// set to a specific list.
	pub fn project<'a>(
		&mut self,
		projection: impl IntoIterator<Item = (&'a str, &'a str)>,
	) -> Result<(), ExprError> {
		let mut entries = Vec::new();
		for (name, alias) in projection {
			let source = self.node_id(name)?;
			if alias.is_empty() || alias == name {
				entries.push((name.to_string(), source));
			} else {
				let result_type = self.nodes.get(source).result_type.clone();
				let id = self.nodes.push(Node {
					kind: NodeKind::Alias {
						source,
					},
					result_name: alias.to_string(),
					result_type,
				});
				entries.push((alias.to_string(), id));
			}
		}

		let mut index = Index::default();
		for (name, id) in entries {
			index.insert(name, id);
		}
		self.index = index;
		self.settings.projected_output = true;
		Ok(())
	}

	/// Drop the name from the output lookup. The sequence entry and the
	/// node stay latent until the next unused-action sweep.
	pub fn remove_column(&mut self, name: &str) {
		self.index.remove(name);
	}

	/// If the name is no longer an output but its node is still stored,
	/// bring it back into the outputs. Returns false when no node with
	/// that name exists.
	pub fn try_restore_column(&mut self, name: &str) -> bool {
		if self.index.contains(name) {
			return true;
		}
		let mut found = None;
		for (id, node) in self.nodes.iter() {
			if node.result_name == name {
				found = Some(id);
			}
		}
		match found {
			Some(id) => {
				self.index.insert(name, id);
				true
			}
			None => false,
		}
	}

	/// Keep only the nodes reachable from `required` and rebuild the
	/// outputs to exactly `required`, in order.
	pub fn remove_unused_actions<'a>(
		&mut self,
		required: impl IntoIterator<Item = &'a str>,
	) -> Result<(), ExprError> {
		let required: Vec<&str> = required.into_iter().collect();
		let mut required_ids = Vec::with_capacity(required.len());
		for name in &required {
			required_ids.push(self.node_id(name)?);
		}

		let mut reachable = vec![false; self.nodes.len()];
		let mut stack = required_ids.clone();
		while let Some(id) = stack.pop() {
			if reachable[id.index()] {
				continue;
			}
			reachable[id.index()] = true;
			stack.extend_from_slice(self.nodes.get(id).children());
		}

		let mut arena = NodeArena::default();
		let mut remap: Vec<Option<NodeId>> = vec![None; self.nodes.len()];
		for (id, node) in self.nodes.iter() {
			if !reachable[id.index()] {
				continue;
			}
			let mut node = node.clone();
			remap_children(&mut node, |old| {
				remap[old.index()].expect("operands precede dependents")
			});
			remap[id.index()] = Some(arena.push(node));
		}

		debug!(
			kept = arena.len(),
			dropped = self.nodes.len() - arena.len(),
			"removed unused actions"
		);

		let mut index = Index::default();
		for (name, old_id) in required.iter().zip(required_ids) {
			let id = remap[old_id.index()].expect("required node survives the sweep");
			index.insert(*name, id);
		}
		self.nodes = arena;
		self.index = index;
		Ok(())
	}

	/// Move every computation independent of the expanded columns into a
	/// returned prefix graph; this graph is rewritten to consume the
	/// prefix graph's outputs as its inputs. Returns `None` when nothing
	/// can move.
	pub fn split_before_array_expand(
		&mut self,
		expanded_columns: &HashSet<String>,
	) -> Option<ExpressionDag> {
		let total = self.nodes.len();

		// Transitive dependency on any expanded column. Children always
		// precede parents, so one forward pass settles it.
		let mut depends = vec![false; total];
		for (id, node) in self.nodes.iter() {
			depends[id.index()] = match &node.kind {
				NodeKind::Input => expanded_columns.contains(&node.result_name),
				_ => node.children().iter().any(|child| depends[child.index()]),
			};
		}

		// Moved set: every node independent of the expanded columns,
		// inputs included. An input consumed only by the remainder still
		// passes through the prefix graph as one of its outputs, so no
		// column is lost when the prefix reduces the block.
		let can_move = self.nodes.iter().any(|(id, node)| {
			!depends[id.index()] && !matches!(node.kind, NodeKind::Input)
		});
		if !can_move {
			return None;
		}
		let moved: Vec<bool> = depends.iter().map(|d| !d).collect();

		// Moved nodes consumed by the remainder become the seam: outputs
		// of the prefix graph, inputs of this one.
		let mut used_by_remainder = vec![false; total];
		for (id, node) in self.nodes.iter() {
			if moved[id.index()] {
				continue;
			}
			for child in node.children() {
				if moved[child.index()] {
					used_by_remainder[child.index()] = true;
				}
			}
		}
		let mut in_index = vec![false; total];
		for id in self.index.iter() {
			in_index[id.index()] = true;
		}

		let mut before = ExpressionDag::new();
		before.settings = self.settings.clone();
		before.settings.projected_output = false;
		let mut before_remap: Vec<Option<NodeId>> = vec![None; total];
		for (id, node) in self.nodes.iter() {
			if !moved[id.index()] {
				continue;
			}
			let mut node = node.clone();
			remap_children(&mut node, |old| {
				before_remap[old.index()].expect("operands precede dependents")
			});
			let name = node.result_name.clone();
			let new_id = before.nodes.push(node);
			before_remap[id.index()] = Some(new_id);
			if used_by_remainder[id.index()] || in_index[id.index()] {
				before.index.insert(name, new_id);
			}
		}

		// Rewrite this graph: moved nodes referenced here turn into
		// inputs, everything else is kept with remapped operands.
		let mut arena = NodeArena::default();
		let mut remap: Vec<Option<NodeId>> = vec![None; total];
		for (id, node) in self.nodes.iter() {
			if moved[id.index()] {
				if used_by_remainder[id.index()] || in_index[id.index()] {
					remap[id.index()] = Some(arena.push(Node {
						kind: NodeKind::Input,
						result_name: node.result_name.clone(),
						result_type: node.result_type.clone(),
					}));
				}
				continue;
			}
			let mut node = node.clone();
			remap_children(&mut node, |old| {
				remap[old.index()].expect("operands precede dependents")
			});
			remap[id.index()] = Some(arena.push(node));
		}

		let mut index = Index::default();
		for old_id in self.index.iter() {
			let name = self.nodes.get(old_id).result_name.clone();
			let id = remap[old_id.index()].expect("output survives the split");
			index.insert(name, id);
		}

		debug!(moved = before.nodes.len(), kept = arena.len(), "split before array expand");

		self.nodes = arena;
		self.index = index;
		Some(before)
	}

	/// Fuse qualifying function chains through the compilation cache.
	///
	/// A chain member qualifies when it is a function node used by
	/// exactly one other function node and is not itself an output.
	/// Fusion swaps the head's callable for the fused one; results are
	/// unchanged, only the execution strategy. The uncompiled path stays
	/// valid when compilation is disabled or a group is too small.
	pub fn compile_expressions(&mut self, cache: &CompiledExpressionCache) {
		if !self.settings.compile_expressions {
			return;
		}

		let total = self.nodes.len();
		let mut parents = vec![0usize; total];
		for (_, node) in self.nodes.iter() {
			for child in node.children() {
				parents[child.index()] += 1;
			}
		}
		let mut in_index = vec![false; total];
		for id in self.index.iter() {
			in_index[id.index()] = true;
		}

		let is_function = |nodes: &NodeArena, id: NodeId| {
			matches!(nodes.get(id).kind, NodeKind::Function { .. })
		};
		// Inner chain members are absorbed into their single parent.
		let absorbed = |nodes: &NodeArena, id: NodeId| {
			is_function(nodes, id) && parents[id.index()] == 1 && !in_index[id.index()]
		};

		let heads: Vec<NodeId> = self
			.nodes
			.iter()
			.filter(|&(id, _)| is_function(&self.nodes, id) && !absorbed(&self.nodes, id))
			.map(|(id, _)| id)
			.collect();

		for head in heads {
			let mut group = Vec::new();
			let mut arguments = Vec::new();
			let mut structure = Vec::new();
			let tree = build_fusion_tree(
				&self.nodes,
				head,
				true,
				&|id| absorbed(&self.nodes, id),
				&mut group,
				&mut arguments,
				&mut structure,
			);
			if group.len() < self.settings.min_count_to_compile {
				continue;
			}

			let key = fingerprint(&structure);
			let head_node = self.nodes.get(head);
			let result_type = head_node.result_type.clone();
			let fused_name = format!(
				"fused({})",
				group.iter()
					.map(|&id| match &self.nodes.get(id).kind {
						NodeKind::Function { resolved, .. } =>
							resolved.name.as_str(),
						_ => "",
					})
					.collect::<Vec<_>>()
					.join(", ")
			);
			let compiled = cache.get_or_compile(key, || {
				ResolvedFunction::new(fused_name, result_type, fuse(tree))
			});

			debug!(group = group.len(), head = %self.nodes.get(head).result_name, "fused expression group");

			for &member in &group {
				if let NodeKind::Function { compiled, .. } =
					&mut self.nodes.get_mut(member).kind
				{
					*compiled = true;
				}
			}
			if let NodeKind::Function { children, resolved, .. } =
				&mut self.nodes.get_mut(head).kind
			{
				*children = arguments;
				*resolved = compiled;
			}
		}
	}

	/// Input columns the graph expects, in node order.
	pub fn required_columns(&self) -> Vec<(String, DataType)> {
		self.nodes
			.iter()
			.filter(|(_, node)| matches!(node.kind, NodeKind::Input))
			.map(|(_, node)| (node.result_name.clone(), node.result_type.clone()))
			.collect()
	}

	/// Output columns, in index order.
	pub fn result_columns(&self) -> Vec<(String, DataType)> {
		self.index
			.iter()
			.map(|id| {
				let node = self.nodes.get(id);
				(node.result_name.clone(), node.result_type.clone())
			})
			.collect()
	}

	pub fn names(&self) -> Vec<String> {
		self.index.iter().map(|id| self.nodes.get(id).result_name.clone()).collect()
	}

	pub fn has_array_expand(&self) -> bool {
		self.nodes.iter().any(|(_, node)| matches!(node.kind, NodeKind::ArrayExpand { .. }))
	}

	/// True when the graph only forwards its inputs.
	pub fn is_empty(&self) -> bool {
		self.nodes.iter().all(|(_, node)| matches!(node.kind, NodeKind::Input))
	}

	/// Output names, one per line. For explain output.
	pub fn dump_names(&self) -> String {
		let mut out = String::new();
		for (i, name) in self.names().iter().enumerate() {
			if i > 0 {
				out.push('\n');
			}
			out.push_str(name);
		}
		out
	}

	/// Full graph structure rendering. For explain output.
	pub fn dump_dag(&self) -> String {
		let mut out = String::new();
		for (id, node) in self.nodes.iter() {
			let _ = write!(out, "{} : {}", id.index(), node);
			if !node.children().is_empty() {
				let children: Vec<String> = node
					.children()
					.iter()
					.map(|child| child.index().to_string())
					.collect();
				let _ = write!(out, " <- [{}]", children.join(", "));
			}
			out.push('\n');
		}
		let outputs: Vec<String> =
			self.index.iter().map(|id| id.index().to_string()).collect();
		let _ = write!(out, "index: [{}]", outputs.join(", "));
		out
	}
}

fn remap_children(node: &mut Node, remap: impl Fn(NodeId) -> NodeId) {
	match &mut node.kind {
		NodeKind::Input | NodeKind::Column { .. } => {}
		NodeKind::Alias { source } | NodeKind::ArrayExpand { source } => {
			*source = remap(*source);
		}
		NodeKind::Function { children, .. } => {
			for child in children {
				*child = remap(*child);
			}
		}
	}
}

/// Walk a fusable group, collecting its members, external arguments, and
/// structural fingerprint bytes.
fn build_fusion_tree(
	nodes: &NodeArena,
	id: NodeId,
	is_head: bool,
	absorbed: &dyn Fn(NodeId) -> bool,
	group: &mut Vec<NodeId>,
	arguments: &mut Vec<NodeId>,
	structure: &mut Vec<u8>,
) -> FusionNode {
	let node = nodes.get(id);
	if let NodeKind::Function { children, resolved, .. } = &node.kind {
		if is_head || absorbed(id) {
			group.push(id);
			structure.push(b'F');
			structure.extend_from_slice(resolved.name.as_bytes());
			structure.extend_from_slice(node.result_type.to_string().as_bytes());
			structure.extend_from_slice(&(children.len() as u32).to_le_bytes());
			let sub = children
				.iter()
				.map(|&child| {
					build_fusion_tree(
						nodes, child, false, absorbed, group, arguments,
						structure,
					)
				})
				.collect();
			return FusionNode::Call {
				callable: Arc::clone(&resolved.callable),
				children: sub,
			};
		}
	}

	// External argument: deduplicated, position order is the discovery
	// order of the walk, which is deterministic for a given structure.
	let position = arguments.iter().position(|&arg| arg == id).unwrap_or_else(|| {
		arguments.push(id);
		arguments.len() - 1
	});
	structure.push(b'A');
	structure.extend_from_slice(&(position as u32).to_le_bytes());
	structure.extend_from_slice(node.result_type.to_string().as_bytes());
	FusionNode::Argument(position)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::function::Functions;

	fn dag_ab() -> ExpressionDag {
		ExpressionDag::with_inputs([("a", DataType::Int64), ("b", DataType::Int64)]).unwrap()
	}

	fn add_plus(dag: &mut ExpressionDag, left: &str, right: &str, result: &str) -> NodeId {
		let functions = Functions::builtin();
		dag.add_function(functions.get("plus").unwrap(), &[left, right], result).unwrap()
	}

	#[test]
	fn test_add_alias_unknown_source() {
		let mut dag = dag_ab();
		let result = dag.add_alias("missing", "x", false);
		assert!(matches!(result, Err(ExprError::UnknownIdentifier { .. })));
	}

	#[test]
	fn test_add_alias_duplicate_without_replace() {
		let mut dag = dag_ab();
		let result = dag.add_alias("a", "b", false);
		assert!(matches!(result, Err(ExprError::DuplicateIdentifier { .. })));

		let id = dag.add_alias("a", "b", true).unwrap();
		assert_eq!(dag.index().get("b"), Some(id));
	}

	#[test]
	fn test_add_array_expand_requires_array() {
		let mut dag = dag_ab();
		let result = dag.add_array_expand("a", "a_value");
		assert!(matches!(result, Err(ExprError::NotAnArray { .. })));
	}

	#[test]
	fn test_add_function_unknown_argument() {
		let mut dag = dag_ab();
		let functions = Functions::builtin();
		let result = dag.add_function(functions.get("plus").unwrap(), &["a", "zz"], "c");
		assert!(matches!(result, Err(ExprError::UnknownIdentifier { .. })));
	}

	#[test]
	fn test_add_function_resolution_error() {
		let mut dag = dag_ab();
		dag.add_input("s", DataType::Utf8).unwrap();
		let functions = Functions::builtin();
		let result = dag.add_function(functions.get("plus").unwrap(), &["a", "s"], "c");
		assert!(matches!(result, Err(ExprError::FunctionResolution { .. })));
	}

	#[test]
	fn test_constant_folding() {
		let mut dag = ExpressionDag::new();
		dag.add_column("one", Value::Int64(1), true).unwrap();
		dag.add_column("two", Value::Int64(2), true).unwrap();
		let id = add_plus(&mut dag, "one", "two", "three");

		match &dag.node(id).kind {
			NodeKind::Column { value, allow_constant_folding } => {
				assert_eq!(value, &Value::Int64(3));
				assert!(allow_constant_folding);
			}
			other => panic!("expected folded constant, got {:?}", other),
		}
	}

	#[test]
	fn test_ignore_fold_keeps_materialized_column() {
		let mut dag = ExpressionDag::new();
		dag.add_column("one", Value::Int64(1), true).unwrap();
		let functions = Functions::builtin();
		let id = dag.add_function(functions.get("ignore").unwrap(), &["one"], "ig").unwrap();

		match &dag.node(id).kind {
			NodeKind::Column { allow_constant_folding, .. } => {
				assert!(!allow_constant_folding);
			}
			other => panic!("expected folded constant, got {:?}", other),
		}
	}

	#[test]
	fn test_project_renames_and_reorders() {
		let mut dag = dag_ab();
		dag.add_input("c", DataType::Int64).unwrap();
		dag.project([("b", "y"), ("a", "x")]).unwrap();

		let outputs = dag.result_columns();
		let names: Vec<&str> = outputs.iter().map(|(name, _)| name.as_str()).collect();
		assert_eq!(names, vec!["y", "x"]);
		assert!(!dag.index().contains("c"));
		assert!(dag.settings().projected_output);
		// c's node is still stored, just not addressable.
		assert!(dag.nodes().iter().any(|(_, node)| node.result_name == "c"));
	}

	#[test]
	fn test_remove_unused_actions() {
		let mut dag = dag_ab();
		add_plus(&mut dag, "a", "b", "c");
		add_plus(&mut dag, "a", "a", "unused");
		dag.remove_unused_actions(["c"]).unwrap();

		let names: Vec<String> = dag.names();
		assert_eq!(names, vec!["c"]);
		// a, b, c survive; `unused` is culled.
		assert_eq!(dag.nodes().len(), 3);
		assert!(dag.nodes().iter().all(|(_, node)| node.result_name != "unused"));
	}

	#[test]
	fn test_remove_unused_actions_unknown_name() {
		let mut dag = dag_ab();
		let result = dag.remove_unused_actions(["zz"]);
		assert!(matches!(result, Err(ExprError::UnknownIdentifier { .. })));
	}

	#[test]
	fn test_remove_column_leaves_node_latent() {
		let mut dag = dag_ab();
		dag.remove_column("b");
		assert!(!dag.index().contains("b"));
		assert!(dag.try_restore_column("b"));
		assert!(dag.index().contains("b"));
		assert!(!dag.try_restore_column("never"));
	}

	#[test]
	fn test_clone_is_independent() {
		let mut dag = dag_ab();
		add_plus(&mut dag, "a", "b", "c");
		let mut copy = dag.clone();
		copy.add_alias("c", "d", false).unwrap();

		assert!(copy.index().contains("d"));
		assert!(!dag.index().contains("d"));
		assert_eq!(dag.nodes().len() + 1, copy.nodes().len());
	}

	#[test]
	fn test_split_before_array_expand() {
		let mut dag = ExpressionDag::with_inputs([
			("arr_value", DataType::Int64),
			("x", DataType::Int64),
		])
		.unwrap();
		// Independent of the expanded column: can be hoisted.
		add_plus(&mut dag, "x", "x", "xx");
		// Depends on the expanded column: must stay.
		add_plus(&mut dag, "arr_value", "xx", "sum");

		let expanded: HashSet<String> = ["arr_value".to_string()].into();
		let before = dag.split_before_array_expand(&expanded).expect("split must happen");

		// The before-graph computes xx from x and never touches arr_value.
		assert!(before.index().contains("xx"));
		assert!(
			before.nodes().iter().all(|(_, node)| node.result_name != "arr_value"),
			"dependent node leaked into the before graph"
		);

		// The remainder consumes xx as a plain input.
		let required: Vec<String> =
			dag.required_columns().into_iter().map(|(name, _)| name).collect();
		assert!(required.contains(&"xx".to_string()));
		assert!(dag.index().contains("sum"));
	}

	#[test]
	fn test_split_moves_pass_through_inputs() {
		let mut dag = ExpressionDag::with_inputs([
			("arr_value", DataType::Int64),
			("tag", DataType::Int64),
			("x", DataType::Int64),
		])
		.unwrap();
		add_plus(&mut dag, "x", "x", "xx");
		add_plus(&mut dag, "arr_value", "tag", "s");
		dag.remove_unused_actions(["s", "xx"]).unwrap();

		let expanded: HashSet<String> = ["arr_value".to_string()].into();
		let before = dag.split_before_array_expand(&expanded).expect("split must happen");

		// tag feeds only the remainder, so it flows through the prefix
		// graph as one of its outputs.
		assert!(before.index().contains("tag"));
		assert!(before.index().contains("xx"));

		let required: Vec<String> =
			dag.required_columns().into_iter().map(|(name, _)| name).collect();
		assert_eq!(required, vec!["arr_value", "tag", "xx"]);
	}

	#[test]
	fn test_split_with_nothing_to_move() {
		let mut dag =
			ExpressionDag::with_inputs([("arr_value", DataType::Int64)]).unwrap();
		add_plus(&mut dag, "arr_value", "arr_value", "s");

		let expanded: HashSet<String> = ["arr_value".to_string()].into();
		assert!(dag.split_before_array_expand(&expanded).is_none());
	}

	#[test]
	fn test_compile_expressions_fuses_chain() {
		let mut dag = dag_ab();
		add_plus(&mut dag, "a", "b", "t");
		add_plus(&mut dag, "t", "a", "r");
		dag.remove_unused_actions(["r"]).unwrap();
		dag.settings_mut().compile_expressions = true;

		let cache = CompiledExpressionCache::new();
		dag.compile_expressions(&cache);

		assert_eq!(cache.len(), 1);
		let head = dag.index().get("r").unwrap();
		match &dag.node(head).kind {
			NodeKind::Function { children, compiled, .. } => {
				assert!(*compiled);
				// Arguments collapse to the external inputs a, b.
				assert_eq!(children.len(), 2);
			}
			other => panic!("expected function head, got {:?}", other),
		}
	}

	#[test]
	fn test_compile_disabled_leaves_nodes_untouched() {
		let mut dag = dag_ab();
		add_plus(&mut dag, "a", "b", "t");
		add_plus(&mut dag, "t", "a", "r");

		let cache = CompiledExpressionCache::new();
		dag.compile_expressions(&cache);

		assert!(cache.is_empty());
		let head = dag.index().get("r").unwrap();
		match &dag.node(head).kind {
			NodeKind::Function { compiled, .. } => assert!(!compiled),
			other => panic!("expected function head, got {:?}", other),
		}
	}

	#[test]
	fn test_fingerprint_distinguishes_wide_argument_lists() {
		let functions = Functions::builtin();
		let descriptor = functions.get("ignore").unwrap();
		let resolved = descriptor.resolve(&[]).unwrap();

		// 257 children; the last one either repeats argument 0 or is a
		// fresh argument at position 256. Byte-sized position encoding
		// would alias the two.
		let structure_for = |repeat_first: bool| {
			let mut arena = NodeArena::default();
			let inputs: Vec<NodeId> = (0..257)
				.map(|i| {
					arena.push(Node {
						kind: NodeKind::Input,
						result_name: format!("a{}", i),
						result_type: DataType::Int64,
					})
				})
				.collect();
			let mut children = inputs[..256].to_vec();
			children.push(if repeat_first { inputs[0] } else { inputs[256] });
			let head = arena.push(Node {
				kind: NodeKind::Function {
					children,
					descriptor: Arc::clone(&descriptor),
					resolved: resolved.clone(),
					compiled: false,
				},
				result_name: "wide".to_string(),
				result_type: DataType::Int64,
			});

			let mut group = Vec::new();
			let mut arguments = Vec::new();
			let mut structure = Vec::new();
			build_fusion_tree(
				&arena,
				head,
				true,
				&|_| false,
				&mut group,
				&mut arguments,
				&mut structure,
			);
			structure
		};

		assert_ne!(
			fingerprint(&structure_for(true)),
			fingerprint(&structure_for(false))
		);
	}

	#[test]
	fn test_dump_dag_renders_structure() {
		let mut dag = dag_ab();
		add_plus(&mut dag, "a", "b", "c");
		let dump = dag.dump_dag();
		assert!(dump.contains("INPUT a"));
		assert!(dump.contains("FUNCTION c"));
		assert!(dump.contains("index:"));
		assert_eq!(dag.dump_names(), "a\nb\nc");
	}
}
