//------------------------------------------------------------------------------
//
// Copyright 2025 Jiri Bobek. All rights reserved.
// License: GPL 3.0 or later. See LICENSE.txt for details.
//
//------------------------------------------------------------------------------

use std::borrow::Cow;
use std::io::Write;

use super::report::DivergenceReport;
use crate::value::IndexPath;

//--------------------------------------------------------------------------------------------------

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DivergenceKind {
	/// Array shapes, sequence lengths or mapping sizes differ.
	ShapeMismatch,

	/// The two values are of kinds that cannot be compared.
	TypeMismatch,

	/// Mapping key sets differ, or the key order of two ordered mappings differs.
	KeyMismatch,

	/// A leaf compared by exact equality differs (booleans, text, bytes, sets).
	ValueMismatch,

	ToleranceExceeded,

	/// NaN at different positions, or an infinity where none is allowed.
	NonFiniteMismatch,

	UnsupportedValueKind,
}

impl DivergenceKind {
	pub fn is_structural(self) -> bool {
		matches!(
			self,
			Self::ShapeMismatch | Self::TypeMismatch | Self::KeyMismatch | Self::UnsupportedValueKind
		)
	}
}

/// A failed comparison.
///
/// `path` is the location of the first failure in traversal order. For structural
/// failures the report is empty because no numeric comparison was made.
#[derive(Debug, Clone, PartialEq)]
pub struct Divergence {
	pub kind: DivergenceKind,
	pub path: IndexPath,
	pub message: Cow<'static, str>,
	pub report: DivergenceReport,
}

impl Divergence {
	#[cold]
	#[inline(never)]
	pub(crate) fn structural(
		kind: DivergenceKind,
		path: &IndexPath,
		message: impl Into<Cow<'static, str>>,
	) -> Self {
		Self {
			kind,
			path: path.clone(),
			message: message.into(),
			report: DivergenceReport::default(),
		}
	}

	pub fn dump(&self, out: &mut dyn Write) -> std::io::Result<()> {
		self.report.dump(out)
	}
}

impl std::error::Error for Divergence {}

impl std::fmt::Display for Divergence {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		write!(f, "{:?} at {:?}: {}", self.kind, self.path.as_slice(), self.message)?;
		if !self.kind.is_structural() {
			write!(f, " ({})", self.report)?;
		}
		Ok(())
	}
}

//--------------------------------------------------------------------------------------------------
