//------------------------------------------------------------------------------
//
// Copyright 2025 Jiri Bobek. All rights reserved.
// License: GPL 3.0 or later. See LICENSE.txt for details.
//
//------------------------------------------------------------------------------

use std::collections::BTreeSet;

use super::error::{Divergence, DivergenceKind};
use crate::value::{Atom, IndexPath, Mapping, Scalar, Tensor, Value};

//--------------------------------------------------------------------------------------------------

pub enum LeafPair<'a> {
	Tensors(&'a Tensor, &'a Tensor),
	Scalars(Scalar, Scalar),
	Sets(&'a BTreeSet<Atom>, &'a BTreeSet<Atom>),
	Strs(&'a str, &'a str),
	Bytes(&'a [u8], &'a [u8]),
}

pub struct Leaf<'a> {
	pub path: IndexPath,
	pub pair: LeafPair<'a>,
}

/// Walks both values in lockstep and returns the pairs of leaves to compare.
///
/// Fails on the first structural difference, before any leaf is compared.
pub fn collect_leaves<'a>(
	actual: &'a Value,
	expected: &'a Value,
) -> Result<Vec<Leaf<'a>>, Divergence> {
	let mut leaves = Vec::new();
	let mut path = IndexPath::new();
	collect(actual, expected, &mut path, &mut leaves)?;
	Ok(leaves)
}

fn collect<'a>(
	actual: &'a Value,
	expected: &'a Value,
	path: &mut IndexPath,
	leaves: &mut Vec<Leaf<'a>>,
) -> Result<(), Divergence> {
	let pair = match (actual, expected) {
		(Value::Opaque(what), _) | (_, Value::Opaque(what)) => {
			return Err(Divergence::structural(
				DivergenceKind::UnsupportedValueKind,
				path,
				format!("cannot compare {what}"),
			));
		},
		(Value::Tensor(a), Value::Tensor(b)) => {
			if a.shape() != b.shape() {
				return Err(Divergence::structural(
					DivergenceKind::ShapeMismatch,
					path,
					format!("shape {:?} vs {:?}", a.shape(), b.shape()),
				));
			}
			if a.dtype().is_bool() != b.dtype().is_bool() {
				return Err(Divergence::structural(
					DivergenceKind::TypeMismatch,
					path,
					format!("expected both tensors to be bool, got {} vs {}", a.dtype(), b.dtype()),
				));
			}
			LeafPair::Tensors(a, b)
		},
		(Value::Tensor(t), Value::Scalar(s)) => LeafPair::Scalars(tensor_item(t, *s, path)?, *s),
		(Value::Scalar(s), Value::Tensor(t)) => LeafPair::Scalars(*s, tensor_item(t, *s, path)?),
		(Value::Scalar(a), Value::Scalar(b)) => {
			check_bool_kinds(*a, *b, path)?;
			LeafPair::Scalars(*a, *b)
		},
		(Value::Seq(a), Value::Seq(b)) => {
			if a.len() != b.len() {
				return Err(Divergence::structural(
					DivergenceKind::ShapeMismatch,
					path,
					format!("sequence length {} vs {}", a.len(), b.len()),
				));
			}
			for (i, (a, b)) in a.iter().zip(b).enumerate() {
				path.push(i);
				collect(a, b, path, leaves)?;
				path.pop();
			}
			return Ok(());
		},
		(Value::Map(a), Value::Map(b)) => {
			for (i, (a, b)) in paired_values(a, b, path)?.into_iter().enumerate() {
				path.push(i);
				collect(a, b, path, leaves)?;
				path.pop();
			}
			return Ok(());
		},
		(Value::Set(a), Value::Set(b)) => LeafPair::Sets(a, b),
		(Value::Str(a), Value::Str(b)) => LeafPair::Strs(a, b),
		(Value::Bytes(a), Value::Bytes(b)) => LeafPair::Bytes(a, b),
		_ => {
			return Err(Divergence::structural(
				DivergenceKind::TypeMismatch,
				path,
				format!("cannot compare {} with {}", actual.kind_name(), expected.kind_name()),
			));
		},
	};
	leaves.push(Leaf { path: path.clone(), pair });
	Ok(())
}

/// A one-element tensor stands in for a scalar.
fn tensor_item(t: &Tensor, other: Scalar, path: &IndexPath) -> Result<Scalar, Divergence> {
	let Some(item) = t.item() else {
		return Err(Divergence::structural(
			DivergenceKind::ShapeMismatch,
			path,
			format!("tensor of shape {:?} compared with a scalar", t.shape()),
		));
	};
	check_bool_kinds(item, other, path)?;
	Ok(item)
}

fn check_bool_kinds(a: Scalar, b: Scalar, path: &IndexPath) -> Result<(), Divergence> {
	if a.is_bool() != b.is_bool() {
		return Err(Divergence::structural(
			DivergenceKind::TypeMismatch,
			path,
			format!("cannot compare {a} with {b}: only one of them is a bool"),
		));
	}
	Ok(())
}

/// Pairs up mapping values in comparison order.
///
/// Two ordered mappings are compared entry by entry in insertion order. Otherwise the
/// key sets must be equal and values are compared in sorted key order.
fn paired_values<'a>(
	a: &'a Mapping,
	b: &'a Mapping,
	path: &IndexPath,
) -> Result<Vec<(&'a Value, &'a Value)>, Divergence> {
	if a.len() != b.len() {
		return Err(Divergence::structural(
			DivergenceKind::ShapeMismatch,
			path,
			format!("mapping size {} vs {}", a.len(), b.len()),
		));
	}
	if a.is_ordered() && b.is_ordered() {
		let mut pairs = Vec::with_capacity(a.len());
		for (i, ((ka, va), (kb, vb))) in a.iter().zip(b.iter()).enumerate() {
			if ka != kb {
				return Err(Divergence::structural(
					DivergenceKind::KeyMismatch,
					path,
					format!("key {i} is {ka} vs {kb}"),
				));
			}
			pairs.push((va, vb));
		}
		return Ok(pairs);
	}

	let a_keys: BTreeSet<&Atom> = a.keys().collect();
	let b_keys: BTreeSet<&Atom> = b.keys().collect();
	if a_keys != b_keys {
		let only_a: Vec<String> = a_keys.difference(&b_keys).map(ToString::to_string).collect();
		let only_b: Vec<String> = b_keys.difference(&a_keys).map(ToString::to_string).collect();
		return Err(Divergence::structural(
			DivergenceKind::KeyMismatch,
			path,
			format!(
				"keys only in actual: [{}], only in expected: [{}]",
				only_a.join(", "),
				only_b.join(", ")
			),
		));
	}
	let pairs = a.sorted_entries().into_iter().zip(b.sorted_entries());
	Ok(pairs.map(|((_, va), (_, vb))| (va, vb)).collect())
}

//--------------------------------------------------------------------------------------------------
