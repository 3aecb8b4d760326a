// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 Opal Contributors

use std::fmt::{Display, Formatter};

use crate::{DataType, Value};

/// Typed vector storage for one column.
///
/// Array columns keep their element type next to the rows so an empty
/// column still reports a full type.
#[derive(Clone, Debug, PartialEq)]
pub enum ColumnData {
	Bool(Vec<bool>),
	Int64(Vec<i64>),
	Float64(Vec<f64>),
	Utf8(Vec<String>),
	Array(DataType, Vec<Vec<Value>>),
}

impl ColumnData {
	pub fn bool(values: impl IntoIterator<Item = bool>) -> Self {
		ColumnData::Bool(values.into_iter().collect())
	}

	pub fn int64(values: impl IntoIterator<Item = i64>) -> Self {
		ColumnData::Int64(values.into_iter().collect())
	}

	pub fn float64(values: impl IntoIterator<Item = f64>) -> Self {
		ColumnData::Float64(values.into_iter().collect())
	}

	pub fn utf8(values: impl IntoIterator<Item = impl Into<String>>) -> Self {
		ColumnData::Utf8(values.into_iter().map(Into::into).collect())
	}

	pub fn array(element: DataType, rows: Vec<Vec<Value>>) -> Self {
		ColumnData::Array(element, rows)
	}

	pub fn with_capacity(data_type: &DataType, capacity: usize) -> Self {
		match data_type {
			DataType::Bool => ColumnData::Bool(Vec::with_capacity(capacity)),
			DataType::Int64 => ColumnData::Int64(Vec::with_capacity(capacity)),
			DataType::Float64 => ColumnData::Float64(Vec::with_capacity(capacity)),
			DataType::Utf8 => ColumnData::Utf8(Vec::with_capacity(capacity)),
			DataType::Array(element) => {
				ColumnData::Array((**element).clone(), Vec::with_capacity(capacity))
			}
		}
	}

	/// Materialize a constant by repeating `value` for `rows` rows.
	pub fn constant(value: &Value, rows: usize) -> Self {
		match value {
			Value::Bool(v) => ColumnData::Bool(vec![*v; rows]),
			Value::Int64(v) => ColumnData::Int64(vec![*v; rows]),
			Value::Float64(v) => ColumnData::Float64(vec![*v; rows]),
			Value::Utf8(v) => ColumnData::Utf8(vec![v.clone(); rows]),
			Value::Array(element, values) => {
				ColumnData::Array(element.clone(), vec![values.clone(); rows])
			}
		}
	}

	pub fn len(&self) -> usize {
		match self {
			ColumnData::Bool(values) => values.len(),
			ColumnData::Int64(values) => values.len(),
			ColumnData::Float64(values) => values.len(),
			ColumnData::Utf8(values) => values.len(),
			ColumnData::Array(_, rows) => rows.len(),
		}
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn data_type(&self) -> DataType {
		match self {
			ColumnData::Bool(_) => DataType::Bool,
			ColumnData::Int64(_) => DataType::Int64,
			ColumnData::Float64(_) => DataType::Float64,
			ColumnData::Utf8(_) => DataType::Utf8,
			ColumnData::Array(element, _) => DataType::array(element.clone()),
		}
	}

	pub fn get(&self, row: usize) -> Value {
		match self {
			ColumnData::Bool(values) => Value::Bool(values[row]),
			ColumnData::Int64(values) => Value::Int64(values[row]),
			ColumnData::Float64(values) => Value::Float64(values[row]),
			ColumnData::Utf8(values) => Value::Utf8(values[row].clone()),
			ColumnData::Array(element, rows) => {
				Value::Array(element.clone(), rows[row].clone())
			}
		}
	}

	/// Append a value. The value's type must match the column type.
	pub fn push(&mut self, value: Value) {
		match (self, value) {
			(ColumnData::Bool(values), Value::Bool(v)) => values.push(v),
			(ColumnData::Int64(values), Value::Int64(v)) => values.push(v),
			(ColumnData::Float64(values), Value::Float64(v)) => values.push(v),
			(ColumnData::Utf8(values), Value::Utf8(v)) => values.push(v),
			(ColumnData::Array(_, rows), Value::Array(_, v)) => rows.push(v),
			(data, value) => {
				panic!("push of {} into {} column", value.data_type(), data.data_type())
			}
		}
	}

	/// Repeat row `i` exactly `repeats[i]` times, in order.
	///
	/// This is the broadcast primitive for array expansion: co-resident
	/// columns are replicated in lockstep with the flattened array.
	pub fn replicate(&self, repeats: &[usize]) -> ColumnData {
		assert_eq!(repeats.len(), self.len(), "repeats length must match column length");
		fn repeat_rows<T: Clone>(values: &[T], repeats: &[usize]) -> Vec<T> {
			let total: usize = repeats.iter().sum();
			let mut out = Vec::with_capacity(total);
			for (value, &count) in values.iter().zip(repeats) {
				for _ in 0..count {
					out.push(value.clone());
				}
			}
			out
		}
		match self {
			ColumnData::Bool(values) => ColumnData::Bool(repeat_rows(values, repeats)),
			ColumnData::Int64(values) => ColumnData::Int64(repeat_rows(values, repeats)),
			ColumnData::Float64(values) => {
				ColumnData::Float64(repeat_rows(values, repeats))
			}
			ColumnData::Utf8(values) => ColumnData::Utf8(repeat_rows(values, repeats)),
			ColumnData::Array(element, rows) => {
				ColumnData::Array(element.clone(), repeat_rows(rows, repeats))
			}
		}
	}
}

impl Display for ColumnData {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.write_str("[")?;
		for row in 0..self.len() {
			if row > 0 {
				f.write_str(", ")?;
			}
			write!(f, "{}", self.get(row))?;
		}
		f.write_str("]")
	}
}
