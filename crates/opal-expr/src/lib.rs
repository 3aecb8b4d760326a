// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 Opal Contributors

//! Expression compilation and execution over columnar batches.
//!
//! Expressions are built into a directed acyclic graph
//! ([`ExpressionDag`]), reshaped by optimizer passes (unused-node
//! pruning, projection, splitting around array expansion, sub-expression
//! fusion through a process-wide cache), then linearized into a
//! slot-based program ([`ExpressionActions`]) that runs against
//! successive [`opal_column::Block`] batches. Multi-stage pipelines are
//! sequenced by [`ExpressionChain`], which prunes every stage's outputs
//! backwards to what later stages consume.

pub mod actions;
pub mod chain;
pub mod compile;
pub mod dag;
pub mod error;
pub mod function;
pub mod index;
pub mod node;

pub use actions::{Action, Argument, ExpressionActions};
pub use chain::{ChainStep, ChainStepKind, ExpressionChain, JoinSpec};
pub use compile::CompiledExpressionCache;
pub use dag::{DagSettings, ExpressionDag};
pub use error::ExprError;
pub use function::{ColumnCallable, FunctionDescriptor, Functions, ResolvedFunction};
pub use index::Index;
pub use node::{Node, NodeArena, NodeId, NodeKind};
