//------------------------------------------------------------------------------
//
// Copyright 2025 Jiri Bobek. All rights reserved.
// License: GPL 3.0 or later. See LICENSE.txt for details.
//
//------------------------------------------------------------------------------

use std::borrow::Cow;

use half::{bf16, f16};
use ndarray::{ArrayD, IxDyn, ShapeError};

use super::{IndexPath, Scalar};
use crate::dtype::{DType, HasDType};

//--------------------------------------------------------------------------------------------------

pub trait Element: HasDType + Copy + 'static {
	fn wrap(array: ArrayD<Self>) -> TensorData;
	fn from_scalar(s: Scalar) -> Self;
	fn to_scalar(self) -> Scalar;
	fn extend_le_bytes(self, out: &mut Vec<u8>);
}

impl Element for bool {
	fn wrap(array: ArrayD<Self>) -> TensorData {
		TensorData::Bool(array)
	}

	fn from_scalar(s: Scalar) -> Self {
		s.to_bool()
	}

	fn to_scalar(self) -> Scalar {
		Scalar::Bool(self)
	}

	fn extend_le_bytes(self, out: &mut Vec<u8>) {
		out.push(u8::from(self));
	}
}

macro_rules! impl_int_element {
	($t:ty, $variant:ident) => {
		impl Element for $t {
			fn wrap(array: ArrayD<Self>) -> TensorData {
				TensorData::$variant(array)
			}

			fn from_scalar(s: Scalar) -> Self {
				match s {
					Scalar::Float(x) => x as $t,
					_ => s.to_i64() as $t,
				}
			}

			fn to_scalar(self) -> Scalar {
				Scalar::Int(i64::from(self))
			}

			fn extend_le_bytes(self, out: &mut Vec<u8>) {
				out.extend_from_slice(&self.to_le_bytes());
			}
		}
	};
}

impl_int_element!(u8, U8);
impl_int_element!(i32, I32);
impl_int_element!(i64, I64);

macro_rules! impl_half_element {
	($t:ty, $variant:ident) => {
		impl Element for $t {
			fn wrap(array: ArrayD<Self>) -> TensorData {
				TensorData::$variant(array)
			}

			fn from_scalar(s: Scalar) -> Self {
				<$t>::from_f64(s.to_f64())
			}

			fn to_scalar(self) -> Scalar {
				Scalar::Float(self.to_f64())
			}

			fn extend_le_bytes(self, out: &mut Vec<u8>) {
				out.extend_from_slice(&self.to_le_bytes());
			}
		}
	};
}

impl_half_element!(f16, F16);
impl_half_element!(bf16, BF16);

impl Element for f32 {
	fn wrap(array: ArrayD<Self>) -> TensorData {
		TensorData::F32(array)
	}

	fn from_scalar(s: Scalar) -> Self {
		s.to_f64() as Self
	}

	fn to_scalar(self) -> Scalar {
		Scalar::Float(f64::from(self))
	}

	fn extend_le_bytes(self, out: &mut Vec<u8>) {
		out.extend_from_slice(&self.to_le_bytes());
	}
}

impl Element for f64 {
	fn wrap(array: ArrayD<Self>) -> TensorData {
		TensorData::F64(array)
	}

	fn from_scalar(s: Scalar) -> Self {
		s.to_f64()
	}

	fn to_scalar(self) -> Scalar {
		Scalar::Float(self)
	}

	fn extend_le_bytes(self, out: &mut Vec<u8>) {
		out.extend_from_slice(&self.to_le_bytes());
	}
}

//--------------------------------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
pub enum TensorData {
	Bool(ArrayD<bool>),
	U8(ArrayD<u8>),
	I32(ArrayD<i32>),
	I64(ArrayD<i64>),
	F16(ArrayD<f16>),
	BF16(ArrayD<bf16>),
	F32(ArrayD<f32>),
	F64(ArrayD<f64>),
}

macro_rules! with_array {
	($data:expr, $a:ident => $body:expr) => {
		match $data {
			TensorData::Bool($a) => $body,
			TensorData::U8($a) => $body,
			TensorData::I32($a) => $body,
			TensorData::I64($a) => $body,
			TensorData::F16($a) => $body,
			TensorData::BF16($a) => $body,
			TensorData::F32($a) => $body,
			TensorData::F64($a) => $body,
		}
	};
}

//--------------------------------------------------------------------------------------------------

/// Homogeneous n-dimensional array.
///
/// Elements are always visited in row-major order of the logical shape,
/// independent of the memory layout of the underlying array.
#[derive(Clone, Debug, PartialEq)]
pub struct Tensor {
	data: TensorData,
}

impl Tensor {
	pub fn new<T: Element>(array: ArrayD<T>) -> Self {
		Self { data: T::wrap(array) }
	}

	pub fn from_shape_vec<T: Element>(shape: &[usize], data: Vec<T>) -> Result<Self, ShapeError> {
		let array = ArrayD::from_shape_vec(IxDyn(shape), data)?;
		Ok(Self::new(array))
	}

	/// 1-D tensor.
	pub fn from_slice<T: Element>(data: &[T]) -> Self {
		Self::new(ndarray::Array1::from(data.to_vec()).into_dyn())
	}

	/// 0-D tensor.
	pub fn scalar<T: Element>(value: T) -> Self {
		Self::new(ndarray::arr0(value).into_dyn())
	}

	pub fn data(&self) -> &TensorData {
		&self.data
	}

	pub fn dtype(&self) -> DType {
		match &self.data {
			TensorData::Bool(_) => DType::Bool,
			TensorData::U8(_) => DType::U8,
			TensorData::I32(_) => DType::I32,
			TensorData::I64(_) => DType::I64,
			TensorData::F16(_) => DType::F16,
			TensorData::BF16(_) => DType::BF16,
			TensorData::F32(_) => DType::F32,
			TensorData::F64(_) => DType::F64,
		}
	}

	pub fn shape(&self) -> &[usize] {
		with_array!(&self.data, a => a.shape())
	}

	pub fn ndim(&self) -> usize {
		self.shape().len()
	}

	pub fn numel(&self) -> usize {
		with_array!(&self.data, a => a.len())
	}

	pub fn scalars(&self) -> Box<dyn Iterator<Item = Scalar> + '_> {
		with_array!(&self.data, a => Box::new(a.iter().map(|x| x.to_scalar())))
	}

	/// The only element of a one-element tensor.
	pub fn item(&self) -> Option<Scalar> {
		if self.numel() == 1 { self.scalars().next() } else { None }
	}

	pub fn map_to<T>(&self, f: impl Fn(Scalar) -> T) -> ArrayD<T> {
		with_array!(&self.data, a => a.mapv(|x| f(x.to_scalar())))
	}

	pub fn cast(&self, dtype: DType) -> Self {
		if dtype == self.dtype() {
			return self.clone();
		}
		match dtype {
			DType::Bool => Self::new(self.map_to(bool::from_scalar)),
			DType::U8 => Self::new(self.map_to(u8::from_scalar)),
			DType::I32 => Self::new(self.map_to(i32::from_scalar)),
			DType::I64 => Self::new(self.map_to(i64::from_scalar)),
			DType::F16 => Self::new(self.map_to(f16::from_scalar)),
			DType::BF16 => Self::new(self.map_to(bf16::from_scalar)),
			DType::F32 => Self::new(self.map_to(f32::from_scalar)),
			DType::F64 => Self::new(self.map_to(f64::from_scalar)),
		}
	}

	/// Reduced-precision floats are converted to the working precision.
	pub fn widened(&self) -> Cow<'_, Self> {
		let dtype = self.dtype();
		if dtype.is_reduced_float() {
			Cow::Owned(self.cast(dtype.widened()))
		} else {
			Cow::Borrowed(self)
		}
	}

	/// Converts a position in row-major element order to a multi-index.
	pub fn unravel_index(&self, mut flat: usize) -> IndexPath {
		let shape = self.shape();
		let mut index: IndexPath = smallvec::smallvec![0; shape.len()];
		for (slot, &size) in index.iter_mut().zip(shape).rev() {
			if size > 0 {
				*slot = flat % size;
				flat /= size;
			}
		}
		index
	}

	/// Element bytes in row-major order, little-endian.
	pub fn to_le_bytes(&self) -> Vec<u8> {
		let mut out = Vec::with_capacity(self.numel() * self.dtype().bits() / 8);
		with_array!(&self.data, a => {
			for x in a.iter() {
				x.extend_le_bytes(&mut out);
			}
		});
		out
	}
}

impl<T: Element> From<ArrayD<T>> for Tensor {
	fn from(array: ArrayD<T>) -> Self {
		Self::new(array)
	}
}

//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
	use super::*;
	use assert_approx_eq::assert_approx_eq;

	#[test]
	fn test_row_major_order_of_transposed_array() {
		let array = ArrayD::from_shape_vec(IxDyn(&[2, 3]), vec![1i64, 2, 3, 4, 5, 6]).unwrap();
		let t = Tensor::new(array.reversed_axes());
		assert_eq!(t.shape(), &[3, 2]);
		let order: Vec<i64> = t.scalars().map(Scalar::to_i64).collect();
		assert_eq!(order, [1, 4, 2, 5, 3, 6]);
	}

	#[test]
	fn test_unravel_index() {
		let t = Tensor::from_shape_vec(&[2, 3, 4], vec![0.0f32; 24]).unwrap();
		assert_eq!(t.unravel_index(0).as_slice(), &[0, 0, 0]);
		assert_eq!(t.unravel_index(5).as_slice(), &[0, 1, 1]);
		assert_eq!(t.unravel_index(23).as_slice(), &[1, 2, 3]);

		let t = Tensor::scalar(1.0f64);
		assert!(t.unravel_index(0).is_empty());
	}

	#[test]
	fn test_cast() {
		let t = Tensor::from_slice(&[1.75f64, -2.5, 0.0]);
		let i = t.cast(DType::I32);
		assert_eq!(i.dtype(), DType::I32);
		let vals: Vec<i64> = i.scalars().map(Scalar::to_i64).collect();
		assert_eq!(vals, [1, -2, 0]);

		let b = t.cast(DType::Bool);
		let vals: Vec<bool> = b.scalars().map(Scalar::to_bool).collect();
		assert_eq!(vals, [true, true, false]);

		let h = Tensor::from_slice(&[f16::from_f32(0.1)]);
		let w = h.widened();
		assert_eq!(w.dtype(), DType::F32);
		assert_approx_eq!(w.item().unwrap().to_f64(), 0.1, 1e-4);
	}

	#[test]
	fn test_item() {
		assert_eq!(Tensor::scalar(7u8).item(), Some(Scalar::Int(7)));
		assert_eq!(Tensor::from_slice(&[true]).item(), Some(Scalar::Bool(true)));
		assert_eq!(Tensor::from_slice(&[1i32, 2]).item(), None);
	}

	#[test]
	fn test_to_le_bytes() {
		let t = Tensor::from_slice(&[1i32, -1]);
		assert_eq!(t.to_le_bytes(), [1, 0, 0, 0, 0xff, 0xff, 0xff, 0xff]);
		let t = Tensor::from_slice(&[true, false]);
		assert_eq!(t.to_le_bytes(), [1, 0]);
	}
}

//--------------------------------------------------------------------------------------------------
