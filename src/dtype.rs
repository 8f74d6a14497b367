//------------------------------------------------------------------------------
//
// Copyright 2025 Jiri Bobek. All rights reserved.
// License: GPL 3.0 or later. See LICENSE.txt for details.
//
//------------------------------------------------------------------------------

use half::{bf16, f16};

//--------------------------------------------------------------------------------------------------

pub trait HasDType {
	const dtype: DType;
}

impl HasDType for bool {
	const dtype: DType = DType::Bool;
}

impl HasDType for u8 {
	const dtype: DType = DType::U8;
}

impl HasDType for i32 {
	const dtype: DType = DType::I32;
}

impl HasDType for i64 {
	const dtype: DType = DType::I64;
}

impl HasDType for f16 {
	const dtype: DType = DType::F16;
}

impl HasDType for bf16 {
	const dtype: DType = DType::BF16;
}

impl HasDType for f32 {
	const dtype: DType = DType::F32;
}

impl HasDType for f64 {
	const dtype: DType = DType::F64;
}

#[repr(u8)]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum DTypeKind {
	Bool,
	Uint,
	Int,
	Float,
}

#[repr(u8)]
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum DType {
	Bool = 1,
	U8 = 2,
	I32 = 3,
	I64 = 4,
	F16 = 5,
	BF16 = 6,
	F32 = 7,
	F64 = 8,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct UnknownDTypeError;

impl std::str::FromStr for DType {
	type Err = UnknownDTypeError;

	fn from_str(s: &str) -> Result<Self, UnknownDTypeError> {
		match s {
			"bool" => Ok(Self::Bool),
			"u8" => Ok(Self::U8),
			"i32" => Ok(Self::I32),
			"i64" => Ok(Self::I64),
			"f16" => Ok(Self::F16),
			"bf16" => Ok(Self::BF16),
			"f32" => Ok(Self::F32),
			"f64" => Ok(Self::F64),
			_ => Err(UnknownDTypeError),
		}
	}
}

impl DType {
	pub fn kind(self) -> DTypeKind {
		match self {
			Self::Bool => DTypeKind::Bool,
			Self::U8 => DTypeKind::Uint,
			Self::I32 | Self::I64 => DTypeKind::Int,
			Self::F16 | Self::BF16 | Self::F32 | Self::F64 => DTypeKind::Float,
		}
	}

	pub fn is_float(self) -> bool {
		self.kind() == DTypeKind::Float
	}

	pub fn is_bool(self) -> bool {
		self == Self::Bool
	}

	pub fn bits(self) -> usize {
		match self {
			Self::Bool | Self::U8 => 8,
			Self::F16 | Self::BF16 => 16,
			Self::I32 | Self::F32 => 32,
			Self::I64 | Self::F64 => 64,
		}
	}

	/// Reduced-precision floats that have to be widened before diffing.
	pub fn is_reduced_float(self) -> bool {
		matches!(self, Self::F16 | Self::BF16)
	}

	/// The working precision used for comparisons.
	pub fn widened(self) -> Self {
		if self.is_reduced_float() { Self::F32 } else { self }
	}
}

impl std::fmt::Display for DType {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		match self {
			Self::Bool => write!(f, "bool"),
			Self::U8 => write!(f, "u8"),
			Self::I32 => write!(f, "i32"),
			Self::I64 => write!(f, "i64"),
			Self::F16 => write!(f, "f16"),
			Self::BF16 => write!(f, "bf16"),
			Self::F32 => write!(f, "f32"),
			Self::F64 => write!(f, "f64"),
		}
	}
}

//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_parse_and_display() {
		for name in ["bool", "u8", "i32", "i64", "f16", "bf16", "f32", "f64"] {
			let dtype: DType = name.parse().unwrap();
			assert_eq!(dtype.to_string(), name);
		}
		assert_eq!("f8".parse::<DType>(), Err(UnknownDTypeError));
	}

	#[test]
	fn test_widened() {
		assert_eq!(f16::dtype.widened(), DType::F32);
		assert_eq!(bf16::dtype.widened(), DType::F32);
		assert_eq!(f64::dtype.widened(), DType::F64);
		assert_eq!(u8::dtype.widened(), DType::U8);
		assert_eq!(DType::BF16.bits(), 16);
		assert!(!DType::Bool.is_float());
		assert_eq!(DType::U8.kind(), DTypeKind::Uint);
	}
}

//--------------------------------------------------------------------------------------------------
