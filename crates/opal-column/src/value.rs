// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 Opal Contributors

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::DataType;

/// A scalar runtime value, represented as a native Rust type.
///
/// Array values carry their element type explicitly so that empty arrays
/// stay typed without inspecting row contents.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
	/// A boolean: true or false.
	Bool(bool),
	/// An 8-byte signed integer.
	Int64(i64),
	/// An 8-byte floating point.
	Float64(f64),
	/// A UTF-8 encoded text.
	Utf8(String),
	/// An array of values sharing one element type.
	Array(DataType, Vec<Value>),
}

impl Value {
	pub fn int64(v: impl Into<i64>) -> Self {
		Value::Int64(v.into())
	}

	pub fn utf8(v: impl Into<String>) -> Self {
		Value::Utf8(v.into())
	}

	pub fn array(element: DataType, values: Vec<Value>) -> Self {
		Value::Array(element, values)
	}

	pub fn data_type(&self) -> DataType {
		match self {
			Value::Bool(_) => DataType::Bool,
			Value::Int64(_) => DataType::Int64,
			Value::Float64(_) => DataType::Float64,
			Value::Utf8(_) => DataType::Utf8,
			Value::Array(element, _) => DataType::array(element.clone()),
		}
	}
}

impl Display for Value {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		match self {
			Value::Bool(v) => write!(f, "{}", v),
			Value::Int64(v) => write!(f, "{}", v),
			Value::Float64(v) => write!(f, "{}", v),
			Value::Utf8(v) => write!(f, "{}", v),
			Value::Array(_, values) => {
				f.write_str("[")?;
				for (i, value) in values.iter().enumerate() {
					if i > 0 {
						f.write_str(", ")?;
					}
					write!(f, "{}", value)?;
				}
				f.write_str("]")
			}
		}
	}
}
