//------------------------------------------------------------------------------
//
// Copyright 2025 Jiri Bobek. All rights reserved.
// License: GPL 3.0 or later. See LICENSE.txt for details.
//
//------------------------------------------------------------------------------

use crate::ErrPack;

//--------------------------------------------------------------------------------------------------

/// Absolute precision of the plain equality check.
pub const DEFAULT_PRECISION: f64 = 1e-5;

pub const PARITY_RELATIVE_TOLERANCE: f64 = 1e-2;
pub const PARITY_ABSOLUTE_TOLERANCE: f64 = 1e-5;

/// Thresholds used when dumping every element that differs at all.
pub const DEBUG_TOLERANCE: f64 = 1e-8;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
	NegativeTolerance,
	NanTolerance,
}

/// Numeric tolerance for one comparison.
///
/// Two numbers `a`, `b` are close when
/// `|a - b| <= max(absolute_tolerance, relative_tolerance * max(|a|, |b|))`.
///
/// `max_reported_mismatches == 0` means every mismatch is reported.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToleranceConfig {
	pub relative_tolerance: f64,
	pub absolute_tolerance: f64,
	pub allow_infinite: bool,
	pub max_reported_mismatches: usize,
}

impl Default for ToleranceConfig {
	fn default() -> Self {
		Self::precision(DEFAULT_PRECISION)
	}
}

impl ToleranceConfig {
	pub const fn precision(prec: f64) -> Self {
		Self {
			relative_tolerance: 0.0,
			absolute_tolerance: prec,
			allow_infinite: false,
			max_reported_mismatches: 0,
		}
	}

	/// Loose bound for reference vs accelerated results.
	pub const fn relative() -> Self {
		Self {
			relative_tolerance: PARITY_RELATIVE_TOLERANCE,
			absolute_tolerance: PARITY_ABSOLUTE_TOLERANCE,
			allow_infinite: false,
			max_reported_mismatches: 0,
		}
	}

	pub const fn debug() -> Self {
		Self {
			relative_tolerance: DEBUG_TOLERANCE,
			absolute_tolerance: DEBUG_TOLERANCE,
			allow_infinite: false,
			max_reported_mismatches: 0,
		}
	}

	/// Same policy and cap, debug thresholds.
	pub fn debug_thresholds(&self) -> Self {
		Self {
			relative_tolerance: DEBUG_TOLERANCE,
			absolute_tolerance: DEBUG_TOLERANCE,
			..*self
		}
	}

	pub fn with_relative_tolerance(mut self, tolerance: f64) -> Self {
		self.relative_tolerance = tolerance;
		self
	}

	pub fn with_absolute_tolerance(mut self, tolerance: f64) -> Self {
		self.absolute_tolerance = tolerance;
		self
	}

	pub fn with_allow_infinite(mut self, allow: bool) -> Self {
		self.allow_infinite = allow;
		self
	}

	pub fn with_max_reported_mismatches(mut self, max: usize) -> Self {
		self.max_reported_mismatches = max;
		self
	}

	pub fn validate(&self) -> Result<(), ErrPack<ConfigError>> {
		for (name, tol) in [
			("relative_tolerance", self.relative_tolerance),
			("absolute_tolerance", self.absolute_tolerance),
		] {
			if tol.is_nan() {
				return Err(ErrPack::with_message(ConfigError::NanTolerance, name));
			}
			if tol < 0.0 {
				return Err(ErrPack::with_message(
					ConfigError::NegativeTolerance,
					format!("{name} = {tol}"),
				));
			}
		}
		Ok(())
	}

	pub fn report_cap(&self) -> Option<usize> {
		if self.max_reported_mismatches == 0 { None } else { Some(self.max_reported_mismatches) }
	}

	/// Largest difference still accepted between `a` and `b`.
	pub fn bound(&self, a: f64, b: f64) -> f64 {
		let magnitude = a.abs().max(b.abs());
		self.absolute_tolerance.max(self.relative_tolerance * magnitude)
	}

	pub fn is_within(&self, diff: f64, a: f64, b: f64) -> bool {
		diff <= self.bound(a, b)
	}
}

//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_bound() {
		let cfg = ToleranceConfig::relative();
		assert!((cfg.bound(1000.0, 999.0) - 10.0).abs() < 1e-12);
		assert!((cfg.bound(0.0, 0.0) - PARITY_ABSOLUTE_TOLERANCE).abs() < 1e-20);
		assert!(cfg.is_within(9.0, 1000.0, 991.0));
		assert!(!cfg.is_within(f64::NAN, 1.0, 1.0));
	}

	#[test]
	fn test_validate() {
		assert!(ToleranceConfig::default().validate().is_ok());
		let err = ToleranceConfig::default().with_absolute_tolerance(-1.0).validate().unwrap_err();
		assert_eq!(err.code, ConfigError::NegativeTolerance);
		let err = ToleranceConfig::default().with_relative_tolerance(f64::NAN).validate().unwrap_err();
		assert_eq!(err.code, ConfigError::NanTolerance);
	}

	#[test]
	fn test_debug_thresholds_keep_policy() {
		let cfg = ToleranceConfig::relative().with_allow_infinite(true).with_max_reported_mismatches(3);
		let dbg = cfg.debug_thresholds();
		assert!(dbg.allow_infinite);
		assert_eq!(dbg.report_cap(), Some(3));
		assert_eq!(dbg.absolute_tolerance, DEBUG_TOLERANCE);
		assert_eq!(ToleranceConfig::default().report_cap(), None);
	}
}

//--------------------------------------------------------------------------------------------------
