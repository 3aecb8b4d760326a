// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 Opal Contributors

//! Ordered sequence of expression stages with backward output pruning.
//!
//! A query plan typically runs several expression graphs in a row, for
//! example a filter stage, then a projection, then a join. The chain
//! records these stages in order and `finalize` walks them backwards so
//! every stage keeps only what later stages actually consume plus its
//! own declared outputs. A declared output nothing downstream needs is
//! flagged removable, which lets a filter drop its predicate column
//! right after row selection.

use std::{collections::HashSet, fmt::Write, sync::Arc};

use opal_column::DataType;
use tracing::debug;

use crate::{actions::ExpressionActions, dag::ExpressionDag, error::ExprError};

/// Columns a join stage appends to the stream. The join implementation
/// itself lives outside this crate; the chain only needs its column
/// contract.
#[derive(Clone, Debug)]
pub struct JoinSpec {
	pub added_columns: Vec<(String, DataType)>,
}

/// The fixed set of stage shapes. The set is closed, so pruning is
/// exhaustive matching rather than dispatch through a trait object.
#[derive(Clone, Debug)]
pub enum ChainStepKind {
	Dag(ExpressionDag),
	ArrayExpand {
		columns: HashSet<String>,
		input: Vec<(String, DataType)>,
	},
	Join {
		input: Vec<(String, DataType)>,
		spec: JoinSpec,
	},
}

/// One stage of the chain.
///
/// `required_output` names columns this stage must still expose after it
/// runs regardless of downstream use, typically because the stage driver
/// consumes them itself (a filter's predicate column).
/// `can_remove_required_output` is filled by [`ExpressionChain::finalize`]:
/// true means no later stage reads the column, so the driver may drop it
/// as soon as the stage is done.
#[derive(Clone, Debug)]
pub struct ChainStep {
	pub kind: ChainStepKind,
	pub required_output: Vec<String>,
	pub can_remove_required_output: Vec<bool>,
}

impl ChainStep {
	pub fn dag(dag: ExpressionDag) -> Self {
		Self {
			kind: ChainStepKind::Dag(dag),
			required_output: Vec::new(),
			can_remove_required_output: Vec::new(),
		}
	}

	pub fn array_expand(columns: HashSet<String>, input: Vec<(String, DataType)>) -> Self {
		Self {
			kind: ChainStepKind::ArrayExpand {
				columns,
				input,
			},
			required_output: Vec::new(),
			can_remove_required_output: Vec::new(),
		}
	}

	pub fn join(spec: JoinSpec, input: Vec<(String, DataType)>) -> Self {
		Self {
			kind: ChainStepKind::Join {
				input,
				spec,
			},
			required_output: Vec::new(),
			can_remove_required_output: Vec::new(),
		}
	}

	pub fn add_required_output(&mut self, name: impl Into<String>) {
		self.required_output.push(name.into());
	}

	/// Columns this stage needs from the previous one.
	pub fn required_columns(&self) -> Vec<(String, DataType)> {
		match &self.kind {
			ChainStepKind::Dag(dag) => dag.required_columns(),
			ChainStepKind::ArrayExpand { input, .. } => input.clone(),
			ChainStepKind::Join { input, .. } => input.clone(),
		}
	}

	/// Columns this stage hands to the next one.
	pub fn result_columns(&self) -> Vec<(String, DataType)> {
		match &self.kind {
			ChainStepKind::Dag(dag) => dag.result_columns(),
			ChainStepKind::ArrayExpand { columns, input } => input
				.iter()
				.map(|(name, data_type)| {
					let data_type = if columns.contains(name) {
						data_type
							.element_type()
							.cloned()
							.unwrap_or_else(|| data_type.clone())
					} else {
						data_type.clone()
					};
					(name.clone(), data_type)
				})
				.collect(),
			ChainStepKind::Join { input, spec } => {
				let mut columns = input.clone();
				columns.extend(spec.added_columns.iter().cloned());
				columns
			}
		}
	}

	/// Request input projection at the start of this stage, normalizing
	/// column order before the stage's own graph runs.
	pub fn prepend_project_input(&mut self) {
		if let ChainStepKind::Dag(dag) = &mut self.kind {
			dag.project_input();
		}
	}

	fn finalize(&mut self, required: &[String]) -> Result<(), ExprError> {
		match &mut self.kind {
			ChainStepKind::Dag(dag) => {
				// An already-projected graph is minimal by
				// construction.
				if dag.settings().projected_output {
					return Ok(());
				}
				let mut kept = Vec::with_capacity(required.len());
				for name in required {
					// A name dropped earlier may still be stored.
					if !dag.try_restore_column(name) {
						continue;
					}
					kept.push(name.as_str());
				}
				if kept.is_empty() {
					return Ok(());
				}
				dag.remove_unused_actions(kept)
			}
			// Expansion and joins forward their full input; pruning
			// happens in the surrounding graph stages.
			ChainStepKind::ArrayExpand { .. } | ChainStepKind::Join { .. } => Ok(()),
		}
	}
}

/// Ordered stage sequence for one query-compilation cycle.
#[derive(Clone, Debug, Default)]
pub struct ExpressionChain {
	steps: Vec<ChainStep>,
}

impl ExpressionChain {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn steps(&self) -> &[ChainStep] {
		&self.steps
	}

	pub fn add_step(&mut self, step: ChainStep) {
		self.steps.push(step);
	}

	pub fn last_step(&mut self) -> Result<&mut ChainStep, ExprError> {
		self.steps.last_mut().ok_or(ExprError::EmptyChain)
	}

	/// Graph of the last stage, for adding further computations.
	///
	/// An empty chain is seeded with a graph over `columns`. When the
	/// last stage is not a graph stage, a fresh graph over that stage's
	/// result columns is appended so callers can always keep building.
	pub fn last_dag<'a>(
		&mut self,
		columns: impl IntoIterator<Item = (&'a str, DataType)>,
	) -> Result<&mut ExpressionDag, ExprError> {
		if self.steps.is_empty() {
			self.steps.push(ChainStep::dag(ExpressionDag::with_inputs(columns)?));
		} else if !matches!(self.steps.last(), Some(ChainStep { kind: ChainStepKind::Dag(_), .. }))
		{
			let input = self.steps.last().map(|step| step.result_columns()).unwrap_or_default();
			let mut dag = ExpressionDag::new();
			for (name, data_type) in input {
				dag.add_input(name, data_type)?;
			}
			self.steps.push(ChainStep::dag(dag));
		}
		match &mut self.steps.last_mut().ok_or(ExprError::EmptyChain)?.kind {
			ChainStepKind::Dag(dag) => Ok(dag),
			_ => unreachable!("a graph step was just ensured"),
		}
	}

	/// Executable program for the last stage's graph.
	pub fn last_actions(&self) -> Result<ExpressionActions, ExprError> {
		for step in self.steps.iter().rev() {
			if let ChainStepKind::Dag(dag) = &step.kind {
				return Ok(ExpressionActions::new(Arc::new(dag.clone())));
			}
		}
		Err(ExprError::EmptyChain)
	}

	/// One backward pass: shrink every stage to what downstream needs
	/// plus its own declared outputs, and mark per-output removability.
	pub fn finalize(&mut self) -> Result<(), ExprError> {
		if self.steps.is_empty() {
			return Err(ExprError::EmptyChain);
		}

		// Names the step after the current one requires; None while
		// processing the final step.
		let mut downstream: Option<Vec<String>> = None;
		for step in self.steps.iter_mut().rev() {
			let mut required: Vec<String>;
			match &downstream {
				None => {
					required = step.required_output.clone();
					if required.is_empty() {
						required = step
							.result_columns()
							.into_iter()
							.map(|(name, _)| name)
							.collect();
					}
					step.can_remove_required_output =
						vec![false; step.required_output.len()];
				}
				Some(needed) => {
					required = needed.clone();
					step.can_remove_required_output = step
						.required_output
						.iter()
						.map(|name| !needed.contains(name))
						.collect();
					for name in &step.required_output {
						if !required.contains(name) {
							required.push(name.clone());
						}
					}
				}
			}
			step.finalize(&required)?;
			downstream = Some(
				step.required_columns().into_iter().map(|(name, _)| name).collect(),
			);
		}

		debug!(steps = self.steps.len(), "finalized expression chain");
		Ok(())
	}

	/// Stage-by-stage rendering. For explain output.
	pub fn dump_chain(&self) -> String {
		let mut out = String::new();
		for (i, step) in self.steps.iter().enumerate() {
			let kind = match &step.kind {
				ChainStepKind::Dag(_) => "dag",
				ChainStepKind::ArrayExpand { .. } => "array expand",
				ChainStepKind::Join { .. } => "join",
			};
			let render = |columns: Vec<(String, DataType)>| {
				columns.iter()
					.map(|(name, data_type)| format!("{} {}", name, data_type))
					.collect::<Vec<_>>()
					.join(", ")
			};
			let _ = writeln!(
				out,
				"step {} ({}): [{}] -> [{}]",
				i,
				kind,
				render(step.required_columns()),
				render(step.result_columns()),
			);
		}
		out
	}
}
