//------------------------------------------------------------------------------
//
// Copyright 2025 Jiri Bobek. All rights reserved.
// License: GPL 3.0 or later. See LICENSE.txt for details.
//
//------------------------------------------------------------------------------

use std::borrow::Cow;

use crate::dtype::DType;
use crate::value::{Mapping, Tensor, Value};

//--------------------------------------------------------------------------------------------------

/// Widens every reduced-precision tensor in `value` to the working precision.
///
/// Returns the input unchanged (borrowed) when there is nothing to widen.
pub fn widen(value: &Value) -> Cow<'_, Value> {
	match value {
		Value::Tensor(t) => match t.widened() {
			Cow::Borrowed(_) => Cow::Borrowed(value),
			Cow::Owned(t) => Cow::Owned(Value::Tensor(t)),
		},
		Value::Seq(items) => {
			let items: Vec<Cow<Value>> = items.iter().map(widen).collect();
			if all_borrowed(&items) {
				Cow::Borrowed(value)
			} else {
				Cow::Owned(Value::Seq(items.into_iter().map(Cow::into_owned).collect()))
			}
		},
		Value::Map(map) => {
			let values: Vec<Cow<Value>> = map.iter().map(|(_, v)| widen(v)).collect();
			if all_borrowed(&values) {
				Cow::Borrowed(value)
			} else {
				let entries = map.keys().cloned().zip(values.into_iter().map(Cow::into_owned));
				Cow::Owned(Value::Map(Mapping::from_entries(entries.collect(), map.is_ordered())))
			}
		},
		Value::Scalar(_)
		| Value::Set(_)
		| Value::Str(_)
		| Value::Bytes(_)
		| Value::Opaque(_) => Cow::Borrowed(value),
	}
}

fn all_borrowed(items: &[Cow<Value>]) -> bool {
	items.iter().all(|item| matches!(item, Cow::Borrowed(_)))
}

/// Brings two tensors to a common dtype.
///
/// Both are widened first. If the dtypes are still of the same kind, `b` is cast to the
/// dtype of `a`. Mixed kinds are compared as `f64` when either side is a float, as `i64`
/// otherwise.
pub fn align_dtypes<'a>(a: &'a Tensor, b: &'a Tensor) -> (Cow<'a, Tensor>, Cow<'a, Tensor>) {
	let a = a.widened();
	let b = b.widened();
	let (da, db) = (a.dtype(), b.dtype());
	if da == db {
		return (a, b);
	}
	if da.kind() == db.kind() {
		let b = b.cast(da);
		return (a, Cow::Owned(b));
	}
	let common = if da.is_float() || db.is_float() { DType::F64 } else { DType::I64 };
	(cast_to(a, common), cast_to(b, common))
}

fn cast_to(t: Cow<'_, Tensor>, dtype: DType) -> Cow<'_, Tensor> {
	if t.dtype() == dtype { t } else { Cow::Owned(t.cast(dtype)) }
}

//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
	use super::*;
	use crate::value::Scalar;
	use half::{bf16, f16};

	#[test]
	fn test_widen_leaves_wide_values_borrowed() {
		let value = Value::seq([
			Value::from(Tensor::from_slice(&[1.0f32, 2.0])),
			Value::from(Mapping::new().with("k", 1.5)),
		]);
		assert!(matches!(widen(&value), Cow::Borrowed(_)));
	}

	#[test]
	fn test_widen_nested_half_tensors() {
		let half = Tensor::from_slice(&[f16::from_f32(0.5), f16::from_f32(-2.0)]);
		let brain = Tensor::scalar(bf16::from_f32(3.0));
		let value = Value::seq([
			Value::from(half),
			Value::from(Mapping::new_ordered().with("b", brain).with("s", "text")),
		]);
		let widened = widen(&value);
		let Value::Seq(items) = widened.as_ref() else { panic!("expected a sequence") };
		let Value::Tensor(t) = &items[0] else { panic!("expected a tensor") };
		assert_eq!(t.dtype(), DType::F32);
		let Value::Map(map) = &items[1] else { panic!("expected a mapping") };
		assert!(map.is_ordered());
		let Some(Value::Tensor(b)) = map.get(&"b".into()) else { panic!("expected a tensor") };
		assert_eq!(b.dtype(), DType::F32);
		assert_eq!(b.item(), Some(Scalar::Float(3.0)));
		assert_eq!(map.get(&"s".into()), Some(&Value::from("text")));
	}

	#[test]
	fn test_align_casts_second_to_first() {
		let a = Tensor::from_slice(&[1.0f32]);
		let b = Tensor::from_slice(&[1.0f64 + 1e-12]);
		let (a2, b2) = align_dtypes(&a, &b);
		assert_eq!(a2.dtype(), DType::F32);
		assert_eq!(b2.dtype(), DType::F32);
		assert_eq!(b2.item(), Some(Scalar::Float(1.0)));

		let h = Tensor::from_slice(&[f16::from_f32(1.0)]);
		let (h2, b3) = align_dtypes(&h, &b);
		assert_eq!(h2.dtype(), DType::F32);
		assert_eq!(b3.dtype(), DType::F32);
	}

	#[test]
	fn test_align_mixed_kinds() {
		let ints = Tensor::from_slice(&[1i64, 0]);
		let floats = Tensor::from_slice(&[1.5f32, f32::NAN]);
		for (x, y) in [align_dtypes(&ints, &floats), align_dtypes(&floats, &ints)] {
			assert_eq!(x.dtype(), DType::F64);
			assert_eq!(y.dtype(), DType::F64);
		}
		let (_, f) = align_dtypes(&ints, &floats);
		let values: Vec<Scalar> = f.scalars().collect();
		assert_eq!(values[0], Scalar::Float(1.5));
		assert!(values[1].is_nan());

		let bytes = Tensor::from_slice(&[200u8]);
		let wide = Tensor::from_slice(&[-1i32]);
		let (x, y) = align_dtypes(&wide, &bytes);
		assert_eq!((x.dtype(), y.dtype()), (DType::I64, DType::I64));
		assert_eq!(x.item(), Some(Scalar::Int(-1)));
		assert_eq!(y.item(), Some(Scalar::Int(200)));
	}
}

//--------------------------------------------------------------------------------------------------
