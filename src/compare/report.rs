//------------------------------------------------------------------------------
//
// Copyright 2025 Jiri Bobek. All rights reserved.
// License: GPL 3.0 or later. See LICENSE.txt for details.
//
//------------------------------------------------------------------------------

use std::io::Write;

use crate::value::{IndexPath, Scalar};

//--------------------------------------------------------------------------------------------------

/// One failing numeric leaf.
#[derive(Clone, Debug, PartialEq)]
pub struct Mismatch {
	pub actual: Scalar,
	pub expected: Scalar,
	pub diff: f64,
	pub location: IndexPath,
}

/// One failing leaf compared by exact equality (text, bytes, sets).
#[derive(Clone, Debug, PartialEq)]
pub struct InexactMismatch {
	pub detail: String,
	pub location: IndexPath,
}

/// Statistics of one comparison.
///
/// Every failing leaf is counted, but only the first `max_reported_mismatches`
/// of them are kept, in `mismatches` or `inexact`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DivergenceReport {
	pub max_absolute_diff: f64,
	pub max_relative_diff: f64,
	pub max_diff_location: Option<IndexPath>,
	pub mismatch_count: usize,
	pub compared_count: usize,
	pub mismatches: Vec<Mismatch>,
	pub inexact: Vec<InexactMismatch>,
}

impl DivergenceReport {
	pub fn is_clean(&self) -> bool {
		self.mismatch_count == 0
	}

	pub(crate) fn record_mismatch(&mut self, mismatch: Mismatch, cap: Option<usize>) {
		self.mismatch_count += 1;
		let diff = mismatch.diff;
		if diff > self.max_absolute_diff {
			let a = mismatch.actual.to_f64().abs();
			let b = mismatch.expected.to_f64().abs();
			self.max_absolute_diff = diff;
			self.max_relative_diff = diff / a.max(b);
			self.max_diff_location = Some(mismatch.location.clone());
		}
		if self.has_room(cap) {
			self.mismatches.push(mismatch);
		}
	}

	pub(crate) fn record_inexact(&mut self, mismatch: InexactMismatch, cap: Option<usize>) {
		self.mismatch_count += 1;
		if self.has_room(cap) {
			self.inexact.push(mismatch);
		}
	}

	fn has_room(&self, cap: Option<usize>) -> bool {
		cap.is_none_or(|cap| self.mismatches.len() + self.inexact.len() < cap)
	}

	/// Writes one line per kept mismatch, then a summary with the largest difference.
	pub fn dump(&self, out: &mut dyn Write) -> std::io::Result<()> {
		for m in &self.mismatches {
			writeln!(
				out,
				"a={}\tb={}\tdiff={}\tindex={:?}",
				m.actual,
				m.expected,
				m.diff,
				m.location.as_slice()
			)?;
		}
		for m in &self.inexact {
			writeln!(out, "{}\tindex={:?}", m.detail, m.location.as_slice())?;
		}
		if let Some(location) = &self.max_diff_location {
			writeln!(out)?;
			writeln!(
				out,
				"max_diff={}\tmax_rel={}\tindex={:?}",
				self.max_absolute_diff,
				self.max_relative_diff,
				location.as_slice()
			)?;
		}
		Ok(())
	}
}

impl std::fmt::Display for DivergenceReport {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		write!(f, "{} of {} leaves differ", self.mismatch_count, self.compared_count)?;
		if let Some(location) = &self.max_diff_location {
			write!(
				f,
				", max_diff={} max_rel={} at {:?}",
				self.max_absolute_diff,
				self.max_relative_diff,
				location.as_slice()
			)?;
		}
		Ok(())
	}
}

//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
	use super::*;
	use smallvec::smallvec;

	fn mismatch(a: f64, b: f64, at: usize) -> Mismatch {
		Mismatch {
			actual: Scalar::Float(a),
			expected: Scalar::Float(b),
			diff: (a - b).abs(),
			location: smallvec![at],
		}
	}

	#[test]
	fn test_record_tracks_max_and_cap() {
		let mut report = DivergenceReport::default();
		report.record_mismatch(mismatch(1.0, 2.0, 0), Some(2));
		report.record_mismatch(mismatch(4.0, 1.0, 1), Some(2));
		report.record_mismatch(mismatch(1.0, 1.5, 2), Some(2));
		assert_eq!(report.mismatch_count, 3);
		assert_eq!(report.mismatches.len(), 2);
		assert_eq!(report.max_absolute_diff, 3.0);
		assert_eq!(report.max_relative_diff, 0.75);
		assert_eq!(report.max_diff_location.as_deref(), Some(&[1usize][..]));
	}

	#[test]
	fn test_dump_format() {
		let mut report = DivergenceReport::default();
		report.record_mismatch(mismatch(1.0, 3.0, 4), None);
		let mut out = Vec::new();
		report.dump(&mut out).unwrap();
		let text = String::from_utf8(out).unwrap();
		assert_eq!(text, "a=1\tb=3\tdiff=2\tindex=[4]\n\nmax_diff=2\tmax_rel=0.6666666666666666\tindex=[4]\n");
	}

	#[test]
	fn test_inexact_lines_share_the_cap() {
		let mut report = DivergenceReport::default();
		report.record_mismatch(mismatch(1.0, 3.0, 0), Some(2));
		report.record_inexact(InexactMismatch { detail: "\"a\" != \"b\"".into(), location: smallvec![1] }, Some(2));
		report.record_inexact(InexactMismatch { detail: "\"c\" != \"d\"".into(), location: smallvec![2] }, Some(2));
		assert_eq!(report.mismatch_count, 3);
		assert_eq!(report.inexact.len(), 1);

		let mut out = Vec::new();
		report.dump(&mut out).unwrap();
		let text = String::from_utf8(out).unwrap();
		let lines: Vec<&str> = text.lines().collect();
		assert_eq!(lines[1], "\"a\" != \"b\"\tindex=[1]");
		assert_eq!(lines[3], "max_diff=2\tmax_rel=0.6666666666666666\tindex=[0]");
	}

	#[test]
	fn test_clean_report_dumps_nothing() {
		let report = DivergenceReport::default();
		let mut out = Vec::new();
		report.dump(&mut out).unwrap();
		assert!(out.is_empty());
		assert!(report.is_clean());
	}
}

//--------------------------------------------------------------------------------------------------
