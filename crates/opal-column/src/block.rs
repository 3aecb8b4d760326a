// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 Opal Contributors

use std::{
	fmt::{Display, Formatter},
	ops::{Deref, Index},
};

use crate::{ColumnData, DataType};

/// A named column.
#[derive(Clone, Debug, PartialEq)]
pub struct Column {
	pub name: String,
	pub data: ColumnData,
}

impl Column {
	pub fn new(name: impl Into<String>, data: ColumnData) -> Self {
		Self {
			name: name.into(),
			data,
		}
	}

	pub fn data_type(&self) -> DataType {
		self.data.data_type()
	}
}

/// A batch of named columns sharing one row count.
///
/// The row count is carried by the caller: a block of constants may be
/// logically taller than any materialized column, so it is not derived
/// from column lengths here.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Block {
	columns: Vec<Column>,
}

impl Deref for Block {
	type Target = [Column];

	fn deref(&self) -> &Self::Target {
		&self.columns
	}
}

impl Index<usize> for Block {
	type Output = Column;

	fn index(&self, index: usize) -> &Self::Output {
		&self.columns[index]
	}
}

impl Block {
	pub fn new(columns: Vec<Column>) -> Self {
		let n = columns.first().map_or(0, |c| c.data.len());
		assert!(columns.iter().all(|c| c.data.len() == n), "column lengths must agree");
		Self {
			columns,
		}
	}

	pub fn column(&self, name: &str) -> Option<&Column> {
		self.columns.iter().find(|column| column.name == name)
	}

	pub fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
		self.columns.iter_mut().find(|column| column.name == name)
	}

	pub fn insert(&mut self, column: Column) {
		self.columns.push(column);
	}

	pub fn remove(&mut self, name: &str) -> Option<Column> {
		let position = self.columns.iter().position(|column| column.name == name)?;
		Some(self.columns.remove(position))
	}

	/// Replace the block content with exactly `names`, in order, taking
	/// each column from the current content. Missing names are skipped.
	pub fn retain_in_order(&mut self, names: &[&str]) {
		let mut columns = Vec::with_capacity(names.len());
		for name in names {
			if let Some(column) = self.remove(name) {
				columns.push(column);
			}
		}
		self.columns = columns;
	}

	pub fn into_columns(self) -> Vec<Column> {
		self.columns
	}
}

impl Display for Block {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		for (i, column) in self.columns.iter().enumerate() {
			if i > 0 {
				f.write_str(", ")?;
			}
			write!(f, "{} {}: {}", column.name, column.data_type(), column.data)?;
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::Value;

	fn block() -> Block {
		Block::new(vec![
			Column::new("a", ColumnData::int64([1, 2])),
			Column::new("b", ColumnData::utf8(["x", "y"])),
		])
	}

	#[test]
	fn test_column_lookup() {
		let block = block();
		assert_eq!(block.column("b").map(|c| c.data.get(0)), Some(Value::utf8("x")));
		assert!(block.column("missing").is_none());
	}

	#[test]
	fn test_retain_in_order() {
		let mut block = block();
		block.retain_in_order(&["b", "a"]);
		assert_eq!(block[0].name, "b");
		assert_eq!(block[1].name, "a");
		assert_eq!(block.len(), 2);
	}

	#[test]
	fn test_retain_drops_unlisted() {
		let mut block = block();
		block.retain_in_order(&["a"]);
		assert_eq!(block.len(), 1);
		assert!(block.column("b").is_none());
	}
}
