// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 Opal Contributors

//! Linear, slot-based program compiled from an expression DAG.
//!
//! Linearization orders the reachable sub-graph so every operand
//! precedes its dependents and assigns each emitted node a slot in a
//! runtime column array. Arguments record whether their slot is consumed
//! again by a later action; if not, the executor frees the slot right
//! after use, bounding peak memory to the live working set.

use std::{collections::HashMap, fmt::Write, sync::Arc};

use opal_column::{Block, Column, ColumnData, DataType};
use tracing::trace;

use crate::{
	dag::ExpressionDag,
	error::ExprError,
	node::{NodeId, NodeKind},
};

/// One argument of an action: a slot position plus whether a later
/// action still consumes that slot.
#[derive(Clone, Copy, Debug)]
pub struct Argument {
	pub pos: usize,
	pub needed_later: bool,
}

/// One executable step: the graph node it came from, its argument slots,
/// and the slot receiving the result.
#[derive(Clone, Debug)]
pub struct Action {
	pub node: NodeId,
	pub arguments: Vec<Argument>,
	pub result_position: usize,
}

/// Executable form of an expression DAG.
///
/// Immutable after construction and safe to share across execution
/// contexts; every call owns its own slot array.
#[derive(Clone, Debug)]
pub struct ExpressionActions {
	dag: Arc<ExpressionDag>,
	actions: Vec<Action>,
	num_columns: usize,
	required_columns: Vec<(String, DataType)>,
	input_positions: Vec<usize>,
	result_positions: Vec<usize>,
	sample: Vec<(String, DataType)>,
}

impl ExpressionActions {
	pub fn new(dag: Arc<ExpressionDag>) -> Self {
		let nodes = dag.nodes();
		let total = nodes.len();

		// The arena is append-only with pre-existing operands, so arena
		// order is already topological; scheduling is a reachability
		// filter over it.
		let mut reachable = vec![false; total];
		let mut stack: Vec<NodeId> = dag.index().iter().collect();
		while let Some(id) = stack.pop() {
			if reachable[id.index()] {
				continue;
			}
			reachable[id.index()] = true;
			stack.extend_from_slice(nodes.get(id).children());
		}
		if dag.settings().project_input {
			for (id, node) in nodes.iter() {
				if matches!(node.kind, NodeKind::Input) {
					reachable[id.index()] = true;
				}
			}
		}

		let mut position = vec![usize::MAX; total];
		let mut num_columns = 0;
		let mut required_columns = Vec::new();
		let mut input_positions = Vec::new();
		let mut actions = Vec::new();

		// Remaining-use counts: child occurrences among scheduled
		// actions plus output occurrences, which are never consumed.
		let mut uses = vec![0usize; total];
		for (id, node) in nodes.iter() {
			if !reachable[id.index()] {
				continue;
			}
			for child in node.children() {
				uses[child.index()] += 1;
			}
		}
		for id in dag.index().iter() {
			uses[id.index()] += 1;
		}

		for (id, node) in nodes.iter() {
			if !reachable[id.index()] {
				continue;
			}
			position[id.index()] = num_columns;
			num_columns += 1;

			match &node.kind {
				NodeKind::Input => {
					required_columns
						.push((node.result_name.clone(), node.result_type.clone()));
					input_positions.push(position[id.index()]);
				}
				_ => {
					let arguments = node
						.children()
						.iter()
						.map(|child| {
							uses[child.index()] -= 1;
							Argument {
								pos: position[child.index()],
								needed_later: uses[child.index()] > 0,
							}
						})
						.collect();
					actions.push(Action {
						node: id,
						arguments,
						result_position: position[id.index()],
					});
				}
			}
		}

		let mut result_positions = Vec::new();
		let mut sample = Vec::new();
		for id in dag.index().iter() {
			let node = nodes.get(id);
			result_positions.push(position[id.index()]);
			sample.push((node.result_name.clone(), node.result_type.clone()));
		}

		Self {
			dag,
			actions,
			num_columns,
			required_columns,
			input_positions,
			result_positions,
			sample,
		}
	}

	pub fn dag(&self) -> &ExpressionDag {
		&self.dag
	}

	pub fn actions(&self) -> &[Action] {
		&self.actions
	}

	/// Input columns the program expects, with types.
	pub fn required_columns(&self) -> &[(String, DataType)] {
		&self.required_columns
	}

	/// Names and types of the result columns, in output order.
	pub fn sample_block(&self) -> Block {
		Block::new(
			self.sample
				.iter()
				.map(|(name, data_type)| {
					Column::new(name.clone(), ColumnData::with_capacity(data_type, 0))
				})
				.collect(),
		)
	}

	pub fn has_array_expand(&self) -> bool {
		self.dag.has_array_expand()
	}

	/// Execute the program on a block. The block must contain every
	/// required column with a matching type; on return it holds exactly
	/// the result columns in output order, and `rows` reflects any array
	/// expansion.
	pub fn execute(&self, block: &mut Block, rows: &mut usize) -> Result<(), ExprError> {
		self.run(block, rows, false)
	}

	/// Compute the result layout without per-row work. Produces the same
	/// slot layout and types as a real run; the block is expected to
	/// carry shape-only (zero-row) columns.
	pub fn execute_dry_run(&self, block: &mut Block, rows: &mut usize) -> Result<(), ExprError> {
		self.run(block, rows, true)
	}

	fn run(&self, block: &mut Block, rows: &mut usize, dry_run: bool) -> Result<(), ExprError> {
		let mut slots: Vec<Option<Column>> = vec![None; self.num_columns];

		if self.dag.settings().project_input {
			let names: Vec<&str> =
				self.required_columns.iter().map(|(name, _)| name.as_str()).collect();
			block.retain_in_order(&names);
		}

		for ((name, expected), &pos) in self.required_columns.iter().zip(&self.input_positions)
		{
			let column = block.column(name).ok_or_else(|| ExprError::MissingColumn {
				name: name.clone(),
			})?;
			let found = column.data_type();
			if found != *expected {
				return Err(ExprError::TypeMismatch {
					name: name.clone(),
					expected: expected.clone(),
					found,
				});
			}
			slots[pos] = Some(column.clone());
		}

		let mut current = *rows;
		for action in &self.actions {
			trace!(action = %self.render_action(action), "executing action");
			self.run_action(action, &mut slots, &mut current, dry_run)?;
		}

		let mut remaining: HashMap<usize, usize> = HashMap::new();
		for &pos in &self.result_positions {
			*remaining.entry(pos).or_insert(0) += 1;
		}
		let mut columns = Vec::with_capacity(self.result_positions.len());
		for &pos in &self.result_positions {
			let uses = remaining.get_mut(&pos).expect("counted above");
			*uses -= 1;
			let column = if *uses == 0 {
				slots[pos].take()
			} else {
				slots[pos].clone()
			};
			columns.push(column.expect("result slot stays populated"));
		}
		if columns.is_empty() {
			// Keep the row count observable for the caller.
			let data = if dry_run {
				ColumnData::with_capacity(&DataType::Bool, 0)
			} else {
				ColumnData::Bool(vec![false; current])
			};
			columns.push(Column::new("_dummy", data));
		}

		*rows = current;
		*block = Block::new(columns);
		Ok(())
	}

	fn run_action(
		&self,
		action: &Action,
		slots: &mut Vec<Option<Column>>,
		current: &mut usize,
		dry_run: bool,
	) -> Result<(), ExprError> {
		let node = self.dag.node(action.node);
		match &node.kind {
			NodeKind::Input => unreachable!("inputs are not scheduled as actions"),
			NodeKind::Column { value, .. } => {
				// Fold-prohibited constants arrive here like any other
				// constant: they always occupy a real slot.
				let data = if dry_run {
					ColumnData::with_capacity(&node.result_type, 0)
				} else {
					ColumnData::constant(value, *current)
				};
				slots[action.result_position] =
					Some(Column::new(node.result_name.clone(), data));
			}
			NodeKind::Alias { .. } => {
				// Pure slot rename; data moves unless still needed.
				let column = take_argument(slots, &action.arguments[0]);
				slots[action.result_position] =
					Some(Column::new(node.result_name.clone(), column.data));
			}
			NodeKind::ArrayExpand { .. } => {
				let source = take_argument(slots, &action.arguments[0]);
				let ColumnData::Array(element, array_rows) = source.data else {
					unreachable!("array expand source is array-typed")
				};
				let data = if dry_run {
					ColumnData::with_capacity(&node.result_type, 0)
				} else {
					let repeats: Vec<usize> =
						array_rows.iter().map(|row| row.len()).collect();
					// Every live column is replicated in lockstep
					// before any later action sees the block.
					for (pos, slot) in slots.iter_mut().enumerate() {
						if pos == action.result_position {
							continue;
						}
						if let Some(column) = slot {
							column.data = column.data.replicate(&repeats);
						}
					}
					*current = repeats.iter().sum();
					let mut data =
						ColumnData::with_capacity(&element, *current);
					for row in array_rows {
						for value in row {
							data.push(value);
						}
					}
					data
				};
				slots[action.result_position] =
					Some(Column::new(node.result_name.clone(), data));
			}
			NodeKind::Function { resolved, .. } => {
				let data = if dry_run {
					ColumnData::with_capacity(&node.result_type, 0)
				} else {
					let arguments: Vec<&ColumnData> = action
						.arguments
						.iter()
						.map(|argument| {
							&slots[argument.pos]
								.as_ref()
								.expect("operand slot populated")
								.data
						})
						.collect();
					(resolved.callable)(&arguments, *current)?
				};
				for argument in &action.arguments {
					if !argument.needed_later {
						slots[argument.pos] = None;
					}
				}
				slots[action.result_position] =
					Some(Column::new(node.result_name.clone(), data));
			}
		}
		Ok(())
	}

	fn render_action(&self, action: &Action) -> String {
		let node = self.dag.node(action.node);
		let arguments: Vec<String> = action
			.arguments
			.iter()
			.map(|argument| {
				if argument.needed_later {
					format!("@{}", argument.pos)
				} else {
					format!("@{} (freed)", argument.pos)
				}
			})
			.collect();
		format!("{} [{}] -> @{}", node, arguments.join(", "), action.result_position)
	}

	/// Human-readable program listing. For explain output.
	pub fn dump_actions(&self) -> String {
		let mut out = String::new();
		for (name, data_type) in &self.required_columns {
			let _ = writeln!(out, "input: {} {}", name, data_type);
		}
		for action in &self.actions {
			let _ = writeln!(out, "{}", self.render_action(action));
		}
		for (name, data_type) in &self.sample {
			let _ = writeln!(out, "output: {} {}", name, data_type);
		}
		out
	}
}

/// Take an argument's column out of its slot, cloning when a later
/// action still consumes it.
fn take_argument(slots: &mut [Option<Column>], argument: &Argument) -> Column {
	if argument.needed_later {
		slots[argument.pos].clone().expect("operand slot populated")
	} else {
		slots[argument.pos].take().expect("operand slot populated")
	}
}
