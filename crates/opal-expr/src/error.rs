// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 Opal Contributors

use opal_column::DataType;

/// Errors raised while building, resolving, or executing expression graphs.
///
/// Structural variants indicate the builder or chain was driven
/// incorrectly and abort the current compilation unit. Resolution variants
/// are recoverable by the expression-analysis layer and surface as
/// query-compilation failures. `Execution` aborts the current batch only.
#[derive(Debug, thiserror::Error)]
pub enum ExprError {
	#[error("unknown identifier `{name}`")]
	UnknownIdentifier {
		name: String,
	},

	#[error("column `{name}` already exists")]
	DuplicateIdentifier {
		name: String,
	},

	#[error("column `{name}` has type {found}, expected {expected}")]
	TypeMismatch {
		name: String,
		expected: DataType,
		found: DataType,
	},

	#[error("array expansion source `{name}` has non-array type {found}")]
	NotAnArray {
		name: String,
		found: DataType,
	},

	#[error("required column `{name}` is missing from the block")]
	MissingColumn {
		name: String,
	},

	#[error("expression chain is empty")]
	EmptyChain,

	#[error("unknown function `{name}`")]
	UnknownFunction {
		name: String,
	},

	#[error("cannot resolve function `{function}`: {reason}")]
	FunctionResolution {
		function: String,
		reason: String,
	},

	#[error("execution of `{function}` failed: {reason}")]
	Execution {
		function: String,
		reason: String,
	},
}
