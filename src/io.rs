//------------------------------------------------------------------------------
//
// Copyright 2025 Jiri Bobek. All rights reserved.
// License: GPL 3.0 or later. See LICENSE.txt for details.
//
//------------------------------------------------------------------------------

use std::borrow::Cow;
use std::path::Path;

use half::{bf16, f16};
use log::debug;
use ndarray::ShapeError;
use safetensors::tensor::{Dtype, SafeTensorError, SafeTensors, TensorView};

use crate::dtype::DType;
use crate::value::{Atom, Element, Mapping, Tensor, Value};
use crate::{ErrExtra, ErrPack};

//--------------------------------------------------------------------------------------------------

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum LoadError {
	IOError,
	InvalidFile,
	InvalidShape,
	InvalidKey,
	NotATensor,
}

impl From<std::io::Error> for ErrPack<LoadError> {
	fn from(err: std::io::Error) -> Self {
		Self {
			code: LoadError::IOError,
			extra: Some(Box::new(ErrExtra {
				message: Cow::from("IO error occurred"),
				nested: Some(Box::new(err)),
			})),
		}
	}
}

impl From<SafeTensorError> for ErrPack<LoadError> {
	fn from(err: SafeTensorError) -> Self {
		Self::with_nested(LoadError::InvalidFile, "invalid safetensors data", err)
	}
}

impl From<ShapeError> for ErrPack<LoadError> {
	fn from(err: ShapeError) -> Self {
		Self::with_nested(LoadError::InvalidShape, "data size does not match shape", err)
	}
}

//--------------------------------------------------------------------------------------------------

pub fn load_safetensors(path: impl AsRef<Path>) -> Result<Value, ErrPack<LoadError>> {
	let path = path.as_ref();
	debug!("loading {}", path.display());
	let bytes = std::fs::read(path)?;
	parse_safetensors(&bytes)
}

/// Every tensor in the file becomes an entry of an unordered mapping keyed by name.
///
/// Element types without a lossless `DType` counterpart are kept as `Value::Opaque`.
pub fn parse_safetensors(bytes: &[u8]) -> Result<Value, ErrPack<LoadError>> {
	let file = SafeTensors::deserialize(bytes)?;
	let mut map = Mapping::new();
	for (name, view) in file.tensors() {
		let value = decode_view(&view)?;
		if let Value::Opaque(what) = &value {
			debug!("{name}: {what}");
		}
		map.insert(name, value);
	}
	Ok(Value::Map(map))
}

fn decode_view(view: &TensorView) -> Result<Value, ErrPack<LoadError>> {
	let shape = view.shape();
	let data = view.data();
	let tensor = match view.dtype() {
		Dtype::BOOL => decode(shape, data, |b: [u8; 1]| b[0] != 0)?,
		Dtype::U8 => decode(shape, data, u8::from_le_bytes)?,
		Dtype::I8 => decode(shape, data, |b: [u8; 1]| i32::from(i8::from_le_bytes(b)))?,
		Dtype::I16 => decode(shape, data, |b: [u8; 2]| i32::from(i16::from_le_bytes(b)))?,
		Dtype::U16 => decode(shape, data, |b: [u8; 2]| i32::from(u16::from_le_bytes(b)))?,
		Dtype::I32 => decode(shape, data, i32::from_le_bytes)?,
		Dtype::U32 => decode(shape, data, |b: [u8; 4]| i64::from(u32::from_le_bytes(b)))?,
		Dtype::I64 => decode(shape, data, i64::from_le_bytes)?,
		Dtype::F16 => decode(shape, data, f16::from_le_bytes)?,
		Dtype::BF16 => decode(shape, data, bf16::from_le_bytes)?,
		Dtype::F32 => decode(shape, data, f32::from_le_bytes)?,
		Dtype::F64 => decode(shape, data, f64::from_le_bytes)?,
		other => {
			return Ok(Value::Opaque(format!("{other:?} tensor of shape {shape:?}")));
		},
	};
	Ok(Value::Tensor(tensor))
}

fn decode<T: Element, const N: usize>(
	shape: &[usize],
	data: &[u8],
	from_le: impl Fn([u8; N]) -> T,
) -> Result<Tensor, ErrPack<LoadError>> {
	let values = data
		.chunks_exact(N)
		.map(|chunk| {
			let mut bytes = [0u8; N];
			bytes.copy_from_slice(chunk);
			from_le(bytes)
		})
		.collect();
	Ok(Tensor::from_shape_vec(shape, values)?)
}

//--------------------------------------------------------------------------------------------------

fn to_safetensors_dtype(dtype: DType) -> Dtype {
	match dtype {
		DType::Bool => Dtype::BOOL,
		DType::U8 => Dtype::U8,
		DType::I32 => Dtype::I32,
		DType::I64 => Dtype::I64,
		DType::F16 => Dtype::F16,
		DType::BF16 => Dtype::BF16,
		DType::F32 => Dtype::F32,
		DType::F64 => Dtype::F64,
	}
}

/// All keys must be strings and all values tensors.
pub fn serialize_safetensors(map: &Mapping) -> Result<Vec<u8>, ErrPack<LoadError>> {
	let mut tensors = Vec::with_capacity(map.len());
	for (key, value) in map {
		let Atom::Str(name) = key else {
			return Err(ErrPack::with_message(LoadError::InvalidKey, format!("key {key}")));
		};
		let Value::Tensor(t) = value else {
			return Err(ErrPack::with_message(
				LoadError::NotATensor,
				format!("{name} is a {}", value.kind_name()),
			));
		};
		tensors.push((name.as_str(), to_safetensors_dtype(t.dtype()), t.shape().to_vec(), t.to_le_bytes()));
	}
	let mut views = Vec::with_capacity(tensors.len());
	for (name, dtype, shape, bytes) in &tensors {
		views.push((*name, TensorView::new(*dtype, shape.clone(), bytes)?));
	}
	Ok(safetensors::serialize(views, &None)?)
}

pub fn save_safetensors(path: impl AsRef<Path>, map: &Mapping) -> Result<(), ErrPack<LoadError>> {
	let path = path.as_ref();
	let bytes = serialize_safetensors(map)?;
	debug!("writing {} tensors to {}", map.len(), path.display());
	std::fs::write(path, bytes)?;
	Ok(())
}

//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
	use super::*;
	use crate::compare::{DivergenceKind, ToleranceConfig, compare_quiet};
	use crate::value::Scalar;

	fn sample() -> Mapping {
		Mapping::new()
			.with("weight", Tensor::from_shape_vec(&[2, 2], vec![0.5f32, -1.0, 2.0, 3.5]).unwrap())
			.with("steps", Tensor::scalar(42i64))
			.with("mask", Tensor::from_slice(&[true, false, true]))
			.with("half", Tensor::from_slice(&[f16::from_f32(1.5), f16::from_f32(-0.25)]))
	}

	#[test]
	fn test_serialize_then_parse() {
		let map = sample();
		let bytes = serialize_safetensors(&map).unwrap();
		let loaded = parse_safetensors(&bytes).unwrap();
		let Value::Map(loaded_map) = &loaded else { panic!("expected a mapping") };
		assert_eq!(loaded_map.len(), 4);
		let Some(Value::Tensor(half)) = loaded_map.get(&"half".into()) else {
			panic!("missing tensor")
		};
		assert_eq!(half.dtype(), DType::F16);
		assert_eq!(
			compare_quiet(&loaded, &Value::Map(map), &ToleranceConfig::precision(0.0)),
			Ok(())
		);
	}

	#[test]
	fn test_narrow_ints_are_widened() {
		let data: Vec<u8> = [-3i16, 7].iter().flat_map(|x| x.to_le_bytes()).collect();
		let view = TensorView::new(Dtype::I16, vec![2], &data).unwrap();
		let bytes = safetensors::serialize([("small", view)], &None).unwrap();
		let Value::Map(map) = parse_safetensors(&bytes).unwrap() else { panic!("expected a mapping") };
		let Some(Value::Tensor(t)) = map.get(&"small".into()) else { panic!("missing tensor") };
		assert_eq!(t.dtype(), DType::I32);
		let values: Vec<Scalar> = t.scalars().collect();
		assert_eq!(values, [Scalar::Int(-3), Scalar::Int(7)]);
	}

	#[test]
	fn test_unsupported_dtype_is_opaque() {
		let data = 5u64.to_le_bytes();
		let view = TensorView::new(Dtype::U64, vec![1], &data).unwrap();
		let bytes = safetensors::serialize([("big", view)], &None).unwrap();
		let loaded = parse_safetensors(&bytes).unwrap();
		let Value::Map(map) = &loaded else { panic!("expected a mapping") };
		assert!(matches!(map.get(&"big".into()), Some(Value::Opaque(_))));

		let err = compare_quiet(&loaded, &loaded, &ToleranceConfig::default()).unwrap_err();
		assert_eq!(err.kind, DivergenceKind::UnsupportedValueKind);
	}

	#[test]
	fn test_invalid_input() {
		let err = parse_safetensors(b"definitely not safetensors").unwrap_err();
		assert_eq!(err.code, LoadError::InvalidFile);

		let map = Mapping::new().with("x", 1.0);
		assert_eq!(serialize_safetensors(&map).unwrap_err().code, LoadError::NotATensor);
		let map = Mapping::new().with(3, Tensor::scalar(1.0f32));
		assert_eq!(serialize_safetensors(&map).unwrap_err().code, LoadError::InvalidKey);

		let err = load_safetensors("/nonexistent/dir/file.safetensors").unwrap_err();
		assert_eq!(err.code, LoadError::IOError);
	}

	#[test]
	fn test_save_and_load_file() {
		let path = std::env::temp_dir().join(format!("tensorcmp-io-{}.safetensors", std::process::id()));
		let map = sample();
		save_safetensors(&path, &map).unwrap();
		let loaded = load_safetensors(&path);
		std::fs::remove_file(&path).unwrap();
		assert_eq!(compare_quiet(&loaded.unwrap(), &Value::Map(map), &ToleranceConfig::default()), Ok(()));
	}
}

//--------------------------------------------------------------------------------------------------
