//------------------------------------------------------------------------------
//
// Copyright 2025 Jiri Bobek. All rights reserved.
// License: GPL 3.0 or later. See LICENSE.txt for details.
//
//------------------------------------------------------------------------------

use bit_set::BitSet;

use super::config::ToleranceConfig;
use super::error::{Divergence, DivergenceKind};
use super::report::{DivergenceReport, InexactMismatch, Mismatch};
use super::structure::{Leaf, LeafPair};
use super::widen::align_dtypes;
use crate::value::{IndexPath, Scalar, Tensor};

//--------------------------------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rule {
	/// NaN positions must match and are excluded from the diff. Infinities follow
	/// `allow_infinite`.
	Strict,

	/// Plain bound check. Any NaN or infinity fails the bound.
	Relative,
}

enum Check {
	Pass,
	Fail { kind: DivergenceKind, diff: f64 },
}

struct Failure {
	kind: DivergenceKind,
	path: IndexPath,
	detail: String,
}

/// Accumulates a `DivergenceReport` over a sequence of leaves.
///
/// Always scans every leaf. The cap only limits how many mismatches are kept.
pub struct Scan<'c> {
	config: &'c ToleranceConfig,
	rule: Rule,
	report: DivergenceReport,
	first_failure: Option<Failure>,
}

impl<'c> Scan<'c> {
	pub fn new(config: &'c ToleranceConfig, rule: Rule) -> Self {
		Self {
			config,
			rule,
			report: DivergenceReport::default(),
			first_failure: None,
		}
	}

	pub fn leaf(&mut self, leaf: &Leaf) {
		let path = &leaf.path;
		match &leaf.pair {
			LeafPair::Tensors(a, b) => self.tensors(path, a, b),
			LeafPair::Scalars(a, b) => {
				self.report.compared_count += 1;
				self.scalars(path, *a, *b);
			},
			LeafPair::Sets(a, b) => {
				let detail = || {
					let only_a: Vec<String> = a.difference(b).map(ToString::to_string).collect();
					let only_b: Vec<String> = b.difference(a).map(ToString::to_string).collect();
					format!(
						"set elements only in actual: [{}], only in expected: [{}]",
						only_a.join(", "),
						only_b.join(", ")
					)
				};
				self.exact(path, a == b, detail);
			},
			LeafPair::Strs(a, b) => self.exact(path, a == b, || format!("{a:?} != {b:?}")),
			LeafPair::Bytes(a, b) => {
				self.exact(path, a == b, || {
					format!("{:?} != {:?}", String::from_utf8_lossy(a), String::from_utf8_lossy(b))
				});
			},
		}
	}

	pub fn tensors(&mut self, prefix: &IndexPath, a: &Tensor, b: &Tensor) {
		let (a, b) = align_dtypes(a, b);
		let (skip, misplaced) = match self.rule {
			Rule::Strict if a.dtype().is_float() => {
				let nan_a = nan_mask(&a);
				let nan_b = nan_mask(&b);
				let misplaced: BitSet = nan_a.symmetric_difference(&nan_b).collect();
				let both: BitSet = nan_a.intersection(&nan_b).collect();
				(both, misplaced)
			},
			_ => (BitSet::new(), BitSet::new()),
		};
		for (i, (x, y)) in a.scalars().zip(b.scalars()).enumerate() {
			self.report.compared_count += 1;
			if skip.contains(i) {
				continue;
			}
			let check = if misplaced.contains(i) {
				Check::Fail {
					kind: DivergenceKind::NonFiniteMismatch,
					diff: f64::NAN,
				}
			} else {
				self.check(x, y)
			};
			if let Check::Fail { kind, diff } = check {
				let mut path = prefix.clone();
				path.extend(a.unravel_index(i));
				self.fail(path, x, y, kind, diff);
			}
		}
	}

	fn scalars(&mut self, path: &IndexPath, a: Scalar, b: Scalar) {
		if let Check::Fail { kind, diff } = self.check(a, b) {
			self.fail(path.clone(), a, b, kind, diff);
		}
	}

	fn check(&self, a: Scalar, b: Scalar) -> Check {
		match self.rule {
			Rule::Strict => check_strict(self.config, a, b),
			Rule::Relative => check_relative(self.config, a, b),
		}
	}

	fn exact(&mut self, path: &IndexPath, equal: bool, detail: impl FnOnce() -> String) {
		self.report.compared_count += 1;
		if equal {
			return;
		}
		let detail = detail();
		if self.first_failure.is_none() {
			self.first_failure = Some(Failure {
				kind: DivergenceKind::ValueMismatch,
				path: path.clone(),
				detail: detail.clone(),
			});
		}
		let mismatch = InexactMismatch { detail, location: path.clone() };
		self.report.record_inexact(mismatch, self.config.report_cap());
	}

	fn fail(&mut self, path: IndexPath, a: Scalar, b: Scalar, kind: DivergenceKind, diff: f64) {
		if self.first_failure.is_none() {
			self.first_failure = Some(Failure {
				kind,
				path: path.clone(),
				detail: format!("a={a} b={b} diff={diff}"),
			});
		}
		let mismatch = Mismatch {
			actual: a,
			expected: b,
			diff,
			location: path,
		};
		self.report.record_mismatch(mismatch, self.config.report_cap());
	}

	pub fn report(self) -> DivergenceReport {
		self.report
	}

	pub fn finish(self) -> Result<(), Divergence> {
		let Some(failure) = self.first_failure else {
			return Ok(());
		};
		let message = format!("first failure: {}", failure.detail);
		Err(Divergence {
			kind: failure.kind,
			path: failure.path,
			message: message.into(),
			report: self.report,
		})
	}
}

fn nan_mask(t: &Tensor) -> BitSet {
	t.scalars().enumerate().filter(|(_, x)| x.is_nan()).map(|(i, _)| i).collect()
}

fn check_strict(config: &ToleranceConfig, a: Scalar, b: Scalar) -> Check {
	match (a, b) {
		(Scalar::Bool(x), Scalar::Bool(y)) => {
			if x == y {
				Check::Pass
			} else {
				Check::Fail { kind: DivergenceKind::ValueMismatch, diff: 1.0 }
			}
		},
		(Scalar::Int(x), Scalar::Int(y)) => {
			let diff = (i128::from(x) - i128::from(y)).unsigned_abs() as f64;
			if config.is_within(diff, x as f64, y as f64) {
				Check::Pass
			} else {
				Check::Fail { kind: DivergenceKind::ToleranceExceeded, diff }
			}
		},
		_ => {
			let (x, y) = (a.to_f64(), b.to_f64());
			if x.is_nan() || y.is_nan() {
				if x.is_nan() && y.is_nan() {
					return Check::Pass;
				}
				return Check::Fail { kind: DivergenceKind::NonFiniteMismatch, diff: f64::NAN };
			}
			let diff = (x - y).abs();
			if x.is_infinite() || y.is_infinite() {
				if config.allow_infinite && x == y {
					return Check::Pass;
				}
				return Check::Fail { kind: DivergenceKind::NonFiniteMismatch, diff };
			}
			if config.is_within(diff, x, y) {
				Check::Pass
			} else {
				Check::Fail { kind: DivergenceKind::ToleranceExceeded, diff }
			}
		},
	}
}

fn check_relative(config: &ToleranceConfig, a: Scalar, b: Scalar) -> Check {
	let (x, y) = (a.to_f64(), b.to_f64());
	let diff = (x - y).abs();
	if config.is_within(diff, x, y) {
		Check::Pass
	} else if x.is_finite() && y.is_finite() {
		Check::Fail { kind: DivergenceKind::ToleranceExceeded, diff }
	} else {
		Check::Fail { kind: DivergenceKind::NonFiniteMismatch, diff }
	}
}

//--------------------------------------------------------------------------------------------------
