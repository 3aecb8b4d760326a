// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 Opal Contributors

//! Columnar value and batch model.
//!
//! This crate provides:
//! - Scalar types and values via [`DataType`] and [`Value`]
//! - Typed column storage via [`ColumnData`]
//! - Named columns and batches via [`Column`] and [`Block`]

mod block;
mod data;
mod data_type;
mod value;

pub use block::{Block, Column};
pub use data::ColumnData;
pub use data_type::DataType;
pub use value::Value;
