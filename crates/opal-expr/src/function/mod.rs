// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 Opal Contributors

//! Function descriptors, resolution, and the builtin registry.

mod builtin;

use std::{fmt, fmt::Formatter, sync::Arc};

use opal_column::{ColumnData, DataType};

pub use builtin::Functions;

use crate::error::ExprError;

/// Concrete column-at-a-time callable.
///
/// Arguments arrive as borrowed column storage; `rows` is the batch row
/// count. The callable returns a freshly materialized result column.
pub type ColumnCallable =
	Arc<dyn Fn(&[&ColumnData], usize) -> Result<ColumnData, ExprError> + Send + Sync>;

/// A function resolved against concrete argument types.
#[derive(Clone)]
pub struct ResolvedFunction {
	pub name: String,
	pub result_type: DataType,
	pub callable: ColumnCallable,
}

impl ResolvedFunction {
	pub fn new(
		name: impl Into<String>,
		result_type: DataType,
		callable: ColumnCallable,
	) -> Self {
		Self {
			name: name.into(),
			result_type,
			callable,
		}
	}
}

impl fmt::Debug for ResolvedFunction {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("ResolvedFunction")
			.field("name", &self.name)
			.field("result_type", &self.result_type)
			.finish_non_exhaustive()
	}
}

/// Resolves a concrete callable for given argument types.
///
/// Descriptors are supplied by the surrounding query context; failure to
/// resolve is a recoverable query-compilation error, not a fault.
pub trait FunctionDescriptor: fmt::Debug + Send + Sync {
	fn name(&self) -> &str;

	fn resolve(&self, argument_types: &[DataType]) -> Result<ResolvedFunction, ExprError>;

	/// True for functions whose constant result must stay materialized
	/// as a visible column instead of being folded away.
	fn suppresses_constant_folding(&self) -> bool {
		false
	}
}
