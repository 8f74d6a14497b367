//------------------------------------------------------------------------------
//
// Copyright 2025 Jiri Bobek. All rights reserved.
// License: GPL 3.0 or later. See LICENSE.txt for details.
//
//------------------------------------------------------------------------------

use std::borrow::Cow;

use log::debug;
use smallvec::smallvec;

use crate::compare::{Divergence, DivergenceKind, ToleranceConfig, compare_rel_at, emit};
use crate::dtype::DType;
use crate::value::{Atom, IndexPath, Mapping, Tensor, Value};

//--------------------------------------------------------------------------------------------------

/// Boolean tensors are compared as `u8`, so they can go through the numeric bound.
pub fn make_comparable(t: &Tensor) -> Cow<'_, Tensor> {
	if t.dtype().is_bool() { Cow::Owned(t.cast(DType::U8)) } else { Cow::Borrowed(t) }
}

/// Runs the same computation through a reference and a candidate implementation and
/// checks every candidate output against the reference output with the relative bound.
///
/// The output position is the first component of the reported location.
pub fn check_parity<R, C>(
	inputs: &[Tensor],
	reference: R,
	candidate: C,
	config: &ToleranceConfig,
) -> Result<(), Divergence>
where
	R: FnOnce(&[Tensor]) -> Vec<Tensor>,
	C: FnOnce(&[Tensor]) -> Vec<Tensor>,
{
	let expected = reference(inputs);
	let actual = candidate(inputs);
	debug!("parity: {} inputs, {} outputs", inputs.len(), expected.len());
	if actual.len() != expected.len() {
		let err = Divergence::structural(
			DivergenceKind::ShapeMismatch,
			&IndexPath::new(),
			format!("{} outputs vs {} expected", actual.len(), expected.len()),
		);
		emit(&err);
		return Err(err);
	}
	for (i, (a, e)) in actual.iter().zip(&expected).enumerate() {
		let prefix: IndexPath = smallvec![i];
		let a = make_comparable(a);
		let e = make_comparable(e);
		compare_rel_at(&prefix, &a, &e, config).inspect_err(emit)?;
	}
	Ok(())
}

/// Relative-bound check of two collections of named tensors, e.g. two checkpoint files.
///
/// Key sets must match. Tensors are compared in sorted name order and the position in
/// that order is the first component of the reported location.
pub fn check_named_parity(
	actual: &Mapping,
	expected: &Mapping,
	config: &ToleranceConfig,
) -> Result<(), Divergence> {
	check_named(actual, expected, config).inspect_err(emit)
}

fn check_named(
	actual: &Mapping,
	expected: &Mapping,
	config: &ToleranceConfig,
) -> Result<(), Divergence> {
	let missing: Vec<String> =
		expected.keys().filter(|k| !actual.contains_key(k)).map(ToString::to_string).collect();
	let extra: Vec<String> =
		actual.keys().filter(|k| !expected.contains_key(k)).map(ToString::to_string).collect();
	if !missing.is_empty() || !extra.is_empty() {
		return Err(Divergence::structural(
			DivergenceKind::KeyMismatch,
			&IndexPath::new(),
			format!("missing: [{}], unexpected: [{}]", missing.join(", "), extra.join(", ")),
		));
	}
	// equal key sets, so both sorted orders line up
	let pairs = actual.sorted_entries().into_iter().zip(expected.sorted_entries());
	for (i, ((name, a), (_, e))) in pairs.enumerate() {
		let prefix: IndexPath = smallvec![i];
		let (a, e) = named_tensors(name, a, e, &prefix)?;
		debug!("parity: {name}");
		compare_rel_at(&prefix, &make_comparable(a), &make_comparable(e), config)?;
	}
	Ok(())
}

fn named_tensors<'a>(
	name: &Atom,
	actual: &'a Value,
	expected: &'a Value,
	prefix: &IndexPath,
) -> Result<(&'a Tensor, &'a Tensor), Divergence> {
	match (actual, expected) {
		(Value::Tensor(a), Value::Tensor(e)) => Ok((a, e)),
		(Value::Opaque(what), _) | (_, Value::Opaque(what)) => Err(Divergence::structural(
			DivergenceKind::UnsupportedValueKind,
			prefix,
			format!("{name}: cannot compare {what}"),
		)),
		_ => Err(Divergence::structural(
			DivergenceKind::TypeMismatch,
			prefix,
			format!("{name}: {} vs {}", actual.kind_name(), expected.kind_name()),
		)),
	}
}

//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
	use super::*;

	fn relu(inputs: &[Tensor]) -> Vec<Tensor> {
		inputs.iter().map(|t| Tensor::new(t.map_to(|x| x.to_f64().max(0.0) as f32))).collect()
	}

	fn positive(inputs: &[Tensor]) -> Vec<Tensor> {
		inputs.iter().map(|t| Tensor::new(t.map_to(|x| x.to_f64() > 0.0))).collect()
	}

	#[test]
	fn test_matching_outputs() {
		let inputs = [Tensor::from_slice(&[-1.0f32, 0.5, 2.0]), Tensor::from_slice(&[3.0f32])];
		let candidate = |inputs: &[Tensor]| -> Vec<Tensor> {
			relu(inputs).into_iter().map(|t| Tensor::new(t.map_to(|x| x.to_f64() * 1.001))).collect()
		};
		assert_eq!(check_parity(&inputs, relu, candidate, &ToleranceConfig::relative()), Ok(()));
		assert_eq!(check_parity(&inputs, positive, positive, &ToleranceConfig::relative()), Ok(()));
	}

	#[test]
	fn test_output_count_mismatch() {
		let inputs = [Tensor::from_slice(&[1.0f32])];
		let err = check_parity(&inputs, relu, |_| Vec::new(), &ToleranceConfig::relative()).unwrap_err();
		assert_eq!(err.kind, DivergenceKind::ShapeMismatch);
	}

	#[test]
	fn test_failing_output_position_prefixes_location() {
		let inputs = [Tensor::from_slice(&[1.0f32]), Tensor::from_slice(&[1.0f32, 2.0])];
		let candidate = |inputs: &[Tensor]| -> Vec<Tensor> {
			let mut out = relu(inputs);
			out[1] = Tensor::from_slice(&[1.0f32, 2.5]);
			out
		};
		let err = check_parity(&inputs, relu, candidate, &ToleranceConfig::relative()).unwrap_err();
		assert_eq!(err.kind, DivergenceKind::ToleranceExceeded);
		assert_eq!(err.path.as_slice(), &[1, 1]);
		assert_eq!(err.report.max_diff_location.as_deref(), Some(&[1usize, 1][..]));
	}

	#[test]
	fn test_bool_outputs_compare_as_bytes() {
		let t = Tensor::from_slice(&[true, false]);
		assert_eq!(make_comparable(&t).dtype(), DType::U8);
		let f = Tensor::from_slice(&[1.0f32]);
		assert!(matches!(make_comparable(&f), Cow::Borrowed(_)));

		let inputs = [Tensor::from_slice(&[1.0f32, -1.0])];
		let flipped = |inputs: &[Tensor]| -> Vec<Tensor> {
			inputs.iter().map(|t| Tensor::new(t.map_to(|x| x.to_f64() < 0.0))).collect()
		};
		let err = check_parity(&inputs, positive, flipped, &ToleranceConfig::relative()).unwrap_err();
		assert_eq!(err.report.mismatch_count, 2);
	}

	#[test]
	fn test_named_parity() {
		let config = ToleranceConfig::relative();
		let expected = Mapping::new()
			.with("b.weight", Tensor::from_slice(&[1.0f32, 2.0]))
			.with("a.bias", Tensor::from_slice(&[0.5f64]));
		let close = Mapping::new()
			.with("a.bias", Tensor::from_slice(&[0.502f64]))
			.with("b.weight", Tensor::from_slice(&[1.005f32, 2.0]));
		assert_eq!(check_named_parity(&close, &expected, &config), Ok(()));

		let far = Mapping::new()
			.with("a.bias", Tensor::from_slice(&[0.5f64]))
			.with("b.weight", Tensor::from_slice(&[1.0f32, 3.0]));
		let err = check_named_parity(&far, &expected, &config).unwrap_err();
		assert_eq!(err.path.as_slice(), &[1, 1]);

		let renamed = Mapping::new()
			.with("a.bias", Tensor::from_slice(&[0.5f64]))
			.with("c.weight", Tensor::from_slice(&[1.0f32, 2.0]));
		let err = check_named_parity(&renamed, &expected, &config).unwrap_err();
		assert_eq!(err.kind, DivergenceKind::KeyMismatch);
		assert!(err.message.contains("b.weight"));

		let extended = close.clone().with("c.weight", Tensor::from_slice(&[0.0f32]));
		let err = check_named_parity(&extended, &expected, &config).unwrap_err();
		assert_eq!(err.kind, DivergenceKind::KeyMismatch);
		assert_eq!(err.message, "missing: [], unexpected: [\"c.weight\"]");

		let opaque = Mapping::new()
			.with("a.bias", Value::Opaque("U64 tensor".into()))
			.with("b.weight", Tensor::from_slice(&[1.0f32, 2.0]));
		let err = check_named_parity(&opaque, &expected, &config).unwrap_err();
		assert_eq!(err.kind, DivergenceKind::UnsupportedValueKind);
	}
}

//--------------------------------------------------------------------------------------------------
