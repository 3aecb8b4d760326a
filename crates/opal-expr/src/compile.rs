// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 Opal Contributors

//! Process-wide cache of fused expression callables.
//!
//! A qualifying group of function nodes is keyed by a structural
//! fingerprint (node kinds, result types, function identities, child
//! topology) and compiled at most once per fingerprint process-wide.
//! Constant values never enter the fingerprint, so structurally equal
//! groups from different graphs share one compiled callable.

use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::{Lazy, OnceCell};
use opal_column::ColumnData;
use tracing::debug;
use xxhash_rust::xxh3::xxh3_128;

use crate::{
	error::ExprError,
	function::{ColumnCallable, ResolvedFunction},
};

/// Structural key of a fusable node group.
pub fn fingerprint(structure: &[u8]) -> u128 {
	xxh3_128(structure)
}

/// Evaluation tree of a fused group.
///
/// `Argument(i)` reads the i-th external input of the group; `Call`
/// applies an already resolved callable to its evaluated children.
pub(crate) enum FusionNode {
	Argument(usize),
	Call {
		callable: ColumnCallable,
		children: Vec<FusionNode>,
	},
}

fn evaluate(node: &FusionNode, args: &[&ColumnData], rows: usize) -> Result<ColumnData, ExprError> {
	match node {
		FusionNode::Argument(position) => Ok(args[*position].clone()),
		FusionNode::Call { callable, children } => {
			let mut evaluated = Vec::with_capacity(children.len());
			for child in children {
				evaluated.push(evaluate(child, args, rows)?);
			}
			let borrowed: Vec<&ColumnData> = evaluated.iter().collect();
			callable(&borrowed, rows)
		}
	}
}

/// Collapse a fusion tree into a single callable evaluating the whole
/// group in one pass.
pub(crate) fn fuse(root: FusionNode) -> ColumnCallable {
	Arc::new(move |args, rows| evaluate(&root, args, rows))
}

/// Concurrency-safe cache mapping fingerprints to compiled callables.
///
/// Per-fingerprint compilation is serialized through the entry's cell;
/// unrelated fingerprints never wait on each other.
pub struct CompiledExpressionCache {
	entries: DashMap<u128, Arc<OnceCell<ResolvedFunction>>>,
}

static GLOBAL: Lazy<CompiledExpressionCache> = Lazy::new(CompiledExpressionCache::new);

impl CompiledExpressionCache {
	pub fn new() -> Self {
		Self {
			entries: DashMap::new(),
		}
	}

	/// The process-wide cache instance.
	pub fn global() -> &'static CompiledExpressionCache {
		&GLOBAL
	}

	/// Return the compiled callable for `key`, compiling it with
	/// `compile` if this is the first request. Concurrent requesters for
	/// the same key block on the in-progress compilation and reuse its
	/// result.
	pub fn get_or_compile(
		&self,
		key: u128,
		compile: impl FnOnce() -> ResolvedFunction,
	) -> ResolvedFunction {
		let cell = {
			self.entries
				.entry(key)
				.or_insert_with(|| Arc::new(OnceCell::new()))
				.value()
				.clone()
		};
		cell.get_or_init(|| {
			debug!(fingerprint = format_args!("{:032x}", key), "compiling expression group");
			compile()
		})
		.clone()
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}

impl Default for CompiledExpressionCache {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use std::sync::atomic::{AtomicUsize, Ordering};

	use opal_column::DataType;

	use super::*;

	fn constant_function(value: i64) -> ResolvedFunction {
		ResolvedFunction::new(
			"constant",
			DataType::Int64,
			Arc::new(move |_args, rows| Ok(ColumnData::Int64(vec![value; rows]))),
		)
	}

	#[test]
	fn test_compiles_once_per_fingerprint() {
		let cache = CompiledExpressionCache::new();
		let compiles = AtomicUsize::new(0);

		for _ in 0..3 {
			cache.get_or_compile(42, || {
				compiles.fetch_add(1, Ordering::SeqCst);
				constant_function(7)
			});
		}

		assert_eq!(compiles.load(Ordering::SeqCst), 1);
		assert_eq!(cache.len(), 1);
	}

	#[test]
	fn test_distinct_fingerprints_compile_separately() {
		let cache = CompiledExpressionCache::new();
		cache.get_or_compile(1, || constant_function(1));
		cache.get_or_compile(2, || constant_function(2));
		assert_eq!(cache.len(), 2);
	}

	#[test]
	fn test_concurrent_requesters_share_one_compile() {
		let cache = Arc::new(CompiledExpressionCache::new());
		let compiles = Arc::new(AtomicUsize::new(0));

		let handles: Vec<_> = (0..8)
			.map(|_| {
				let cache = Arc::clone(&cache);
				let compiles = Arc::clone(&compiles);
				std::thread::spawn(move || {
					let resolved = cache.get_or_compile(99, || {
						compiles.fetch_add(1, Ordering::SeqCst);
						constant_function(3)
					});
					let out = (resolved.callable)(&[], 2).unwrap();
					assert_eq!(out, ColumnData::int64([3, 3]));
				})
			})
			.collect();
		for handle in handles {
			handle.join().unwrap();
		}

		assert_eq!(compiles.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn test_fuse_evaluates_tree() {
		let plus: ColumnCallable = Arc::new(|args, _rows| {
			let (ColumnData::Int64(left), ColumnData::Int64(right)) = (args[0], args[1])
			else {
				unreachable!()
			};
			Ok(ColumnData::Int64(left.iter().zip(right).map(|(l, r)| l + r).collect()))
		});

		// plus(plus(arg0, arg1), arg0)
		let tree = FusionNode::Call {
			callable: Arc::clone(&plus),
			children: vec![
				FusionNode::Call {
					callable: plus,
					children: vec![FusionNode::Argument(0), FusionNode::Argument(1)],
				},
				FusionNode::Argument(0),
			],
		};
		let fused = fuse(tree);

		let a = ColumnData::int64([1, 2]);
		let b = ColumnData::int64([10, 20]);
		let out = fused(&[&a, &b], 2).unwrap();
		assert_eq!(out, ColumnData::int64([12, 24]));
	}
}
