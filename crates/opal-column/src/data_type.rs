// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 Opal Contributors

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// The type of a column or scalar value.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
	/// A boolean: true or false.
	Bool,
	/// An 8-byte signed integer.
	Int64,
	/// An 8-byte floating point.
	Float64,
	/// A UTF-8 encoded text.
	Utf8,
	/// An array of elements sharing one element type.
	Array(Box<DataType>),
}

impl DataType {
	pub fn array(element: DataType) -> Self {
		DataType::Array(Box::new(element))
	}

	pub fn is_array(&self) -> bool {
		matches!(self, DataType::Array(_))
	}

	/// The element type of an array type. Returns `None` for scalars.
	pub fn element_type(&self) -> Option<&DataType> {
		match self {
			DataType::Array(element) => Some(element),
			_ => None,
		}
	}
}

impl Display for DataType {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		match self {
			DataType::Bool => f.write_str("bool"),
			DataType::Int64 => f.write_str("int64"),
			DataType::Float64 => f.write_str("float64"),
			DataType::Utf8 => f.write_str("utf8"),
			DataType::Array(element) => write!(f, "array({})", element),
		}
	}
}
