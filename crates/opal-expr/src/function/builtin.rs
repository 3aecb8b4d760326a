// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 Opal Contributors

use std::{collections::HashMap, sync::Arc};

use opal_column::{ColumnData, DataType};

use crate::{
	error::ExprError,
	function::{ColumnCallable, FunctionDescriptor, ResolvedFunction},
};

/// Registry of function descriptors, looked up by name.
pub struct Functions {
	descriptors: HashMap<String, Arc<dyn FunctionDescriptor>>,
}

impl Functions {
	pub fn new() -> Self {
		Self {
			descriptors: HashMap::new(),
		}
	}

	/// Registry preloaded with the builtin scalar functions.
	pub fn builtin() -> Self {
		let mut functions = Self::new();
		functions.register(Arc::new(Arithmetic::new("plus", i64::checked_add, |l, r| l + r)));
		functions.register(Arc::new(Arithmetic::new("minus", i64::checked_sub, |l, r| l - r)));
		functions.register(Arc::new(Arithmetic::new(
			"multiply",
			i64::checked_mul,
			|l, r| l * r,
		)));
		functions.register(Arc::new(Arithmetic::new("divide", i64::checked_div, |l, r| l / r)));
		functions.register(Arc::new(Comparison::new("equals")));
		functions.register(Arc::new(Comparison::new("greater")));
		functions.register(Arc::new(Logical::new("and")));
		functions.register(Arc::new(Logical::new("or")));
		functions.register(Arc::new(Ignore));
		functions
	}

	pub fn register(&mut self, descriptor: Arc<dyn FunctionDescriptor>) {
		self.descriptors.insert(descriptor.name().to_string(), descriptor);
	}

	pub fn get(&self, name: &str) -> Result<Arc<dyn FunctionDescriptor>, ExprError> {
		self.descriptors.get(name).cloned().ok_or_else(|| ExprError::UnknownFunction {
			name: name.to_string(),
		})
	}
}

impl Default for Functions {
	fn default() -> Self {
		Self::builtin()
	}
}

fn execution_error(function: &str, reason: impl Into<String>) -> ExprError {
	ExprError::Execution {
		function: function.to_string(),
		reason: reason.into(),
	}
}

fn resolution_error(function: &str, argument_types: &[DataType]) -> ExprError {
	let rendered: Vec<String> = argument_types.iter().map(|ty| ty.to_string()).collect();
	ExprError::FunctionResolution {
		function: function.to_string(),
		reason: format!("no overload for argument types ({})", rendered.join(", ")),
	}
}

/// Binary arithmetic over int64 (checked) and float64.
#[derive(Debug)]
struct Arithmetic {
	name: &'static str,
	int_op: fn(i64, i64) -> Option<i64>,
	float_op: fn(f64, f64) -> f64,
}

impl Arithmetic {
	fn new(
		name: &'static str,
		int_op: fn(i64, i64) -> Option<i64>,
		float_op: fn(f64, f64) -> f64,
	) -> Self {
		Self {
			name,
			int_op,
			float_op,
		}
	}
}

impl FunctionDescriptor for Arithmetic {
	fn name(&self) -> &str {
		self.name
	}

	fn resolve(&self, argument_types: &[DataType]) -> Result<ResolvedFunction, ExprError> {
		let name = self.name;
		match argument_types {
			[DataType::Int64, DataType::Int64] => {
				let op = self.int_op;
				let callable: ColumnCallable = Arc::new(move |args, _rows| {
					let (ColumnData::Int64(left), ColumnData::Int64(right)) =
						(args[0], args[1])
					else {
						return Err(execution_error(name, "argument type drift"));
					};
					let mut out = Vec::with_capacity(left.len());
					for (l, r) in left.iter().zip(right) {
						let value = op(*l, *r).ok_or_else(|| {
							execution_error(
								name,
								format!("failed on {} and {}", l, r),
							)
						})?;
						out.push(value);
					}
					Ok(ColumnData::Int64(out))
				});
				Ok(ResolvedFunction::new(name, DataType::Int64, callable))
			}
			[DataType::Float64, DataType::Float64] => {
				let op = self.float_op;
				let callable: ColumnCallable = Arc::new(move |args, _rows| {
					let (ColumnData::Float64(left), ColumnData::Float64(right)) =
						(args[0], args[1])
					else {
						return Err(execution_error(name, "argument type drift"));
					};
					let out =
						left.iter().zip(right).map(|(l, r)| op(*l, *r)).collect();
					Ok(ColumnData::Float64(out))
				});
				Ok(ResolvedFunction::new(name, DataType::Float64, callable))
			}
			_ => Err(resolution_error(name, argument_types)),
		}
	}
}

/// Binary comparison producing a bool column.
#[derive(Debug)]
struct Comparison {
	name: &'static str,
}

impl Comparison {
	fn new(name: &'static str) -> Self {
		Self {
			name,
		}
	}
}

impl FunctionDescriptor for Comparison {
	fn name(&self) -> &str {
		self.name
	}

	fn resolve(&self, argument_types: &[DataType]) -> Result<ResolvedFunction, ExprError> {
		let name = self.name;
		let equals = name == "equals";
		let callable: ColumnCallable = match argument_types {
			[DataType::Int64, DataType::Int64] => Arc::new(move |args, _rows| {
				let (ColumnData::Int64(left), ColumnData::Int64(right)) =
					(args[0], args[1])
				else {
					return Err(execution_error(name, "argument type drift"));
				};
				let out = left
					.iter()
					.zip(right)
					.map(|(l, r)| if equals { l == r } else { l > r })
					.collect();
				Ok(ColumnData::Bool(out))
			}),
			[DataType::Float64, DataType::Float64] => Arc::new(move |args, _rows| {
				let (ColumnData::Float64(left), ColumnData::Float64(right)) =
					(args[0], args[1])
				else {
					return Err(execution_error(name, "argument type drift"));
				};
				let out = left
					.iter()
					.zip(right)
					.map(|(l, r)| if equals { l == r } else { l > r })
					.collect();
				Ok(ColumnData::Bool(out))
			}),
			[DataType::Utf8, DataType::Utf8] => Arc::new(move |args, _rows| {
				let (ColumnData::Utf8(left), ColumnData::Utf8(right)) =
					(args[0], args[1])
				else {
					return Err(execution_error(name, "argument type drift"));
				};
				let out = left
					.iter()
					.zip(right)
					.map(|(l, r)| if equals { l == r } else { l > r })
					.collect();
				Ok(ColumnData::Bool(out))
			}),
			_ => return Err(resolution_error(name, argument_types)),
		};
		Ok(ResolvedFunction::new(name, DataType::Bool, callable))
	}
}

/// Binary boolean combinator.
#[derive(Debug)]
struct Logical {
	name: &'static str,
}

impl Logical {
	fn new(name: &'static str) -> Self {
		Self {
			name,
		}
	}
}

impl FunctionDescriptor for Logical {
	fn name(&self) -> &str {
		self.name
	}

	fn resolve(&self, argument_types: &[DataType]) -> Result<ResolvedFunction, ExprError> {
		let name = self.name;
		let conjunction = name == "and";
		match argument_types {
			[DataType::Bool, DataType::Bool] => {
				let callable: ColumnCallable = Arc::new(move |args, _rows| {
					let (ColumnData::Bool(left), ColumnData::Bool(right)) =
						(args[0], args[1])
					else {
						return Err(execution_error(name, "argument type drift"));
					};
					let out = left
						.iter()
						.zip(right)
						.map(|(l, r)| if conjunction { *l && *r } else { *l || *r })
						.collect();
					Ok(ColumnData::Bool(out))
				});
				Ok(ResolvedFunction::new(name, DataType::Bool, callable))
			}
			_ => Err(resolution_error(name, argument_types)),
		}
	}
}

/// Discards its arguments and returns the constant 0.
///
/// The result is always constant but must stay a visible, allocated
/// column, so folding is suppressed.
#[derive(Debug)]
struct Ignore;

impl FunctionDescriptor for Ignore {
	fn name(&self) -> &str {
		"ignore"
	}

	fn resolve(&self, _argument_types: &[DataType]) -> Result<ResolvedFunction, ExprError> {
		let callable: ColumnCallable =
			Arc::new(|_args, rows| Ok(ColumnData::Int64(vec![0; rows])));
		Ok(ResolvedFunction::new("ignore", DataType::Int64, callable))
	}

	fn suppresses_constant_folding(&self) -> bool {
		true
	}
}
