//------------------------------------------------------------------------------
//
// Copyright 2025 Jiri Bobek. All rights reserved.
// License: GPL 3.0 or later. See LICENSE.txt for details.
//
//------------------------------------------------------------------------------

use log::{debug, warn};

use crate::value::{IndexPath, Tensor, Value};

pub mod config;
pub mod error;
pub mod report;
mod scan;
mod structure;
pub mod widen;


pub use config::ToleranceConfig;
pub use error::{Divergence, DivergenceKind};
pub use report::{DivergenceReport, InexactMismatch, Mismatch};
pub use widen::widen;

use scan::{Rule, Scan};
use structure::collect_leaves;

//--------------------------------------------------------------------------------------------------

/// Compares `actual` against `expected`.
///
/// On failure the kept mismatches and a summary line are written to stdout.
pub fn compare(
	actual: &Value,
	expected: &Value,
	config: &ToleranceConfig,
) -> Result<(), Divergence> {
	compare_quiet(actual, expected, config).inspect_err(emit)
}

/// Same as `compare`, without writing anything.
pub fn compare_quiet(
	actual: &Value,
	expected: &Value,
	config: &ToleranceConfig,
) -> Result<(), Divergence> {
	scan_values(actual, expected, config)?.finish()
}

/// Strict comparison. On failure the dump lists every element that differs by more
/// than the debug thresholds, not only those outside `config`.
pub fn compare_dbg(
	actual: &Value,
	expected: &Value,
	config: &ToleranceConfig,
) -> Result<(), Divergence> {
	let err = match compare_quiet(actual, expected, config) {
		Ok(()) => return Ok(()),
		Err(err) => err,
	};
	if !err.kind.is_structural() {
		match divergence_report(actual, expected, &config.debug_thresholds()) {
			Ok(report) => emit_report(&report),
			Err(_) => emit(&err),
		}
	}
	Err(err)
}

/// Full scan statistics, without a pass/fail verdict on the leaves.
///
/// Structural mismatches are still errors.
pub fn divergence_report(
	actual: &Value,
	expected: &Value,
	config: &ToleranceConfig,
) -> Result<DivergenceReport, Divergence> {
	Ok(scan_values(actual, expected, config)?.report())
}

/// Loose elementwise check: `|a - b| <= max(max(|a|, |b|) * relative, absolute)`.
///
/// No NaN position matching. On failure the divergence is written to stdout.
pub fn compare_rel(
	actual: &Tensor,
	expected: &Tensor,
	config: &ToleranceConfig,
) -> Result<(), Divergence> {
	compare_rel_at(&IndexPath::new(), actual, expected, config).inspect_err(emit)
}

pub(crate) fn compare_rel_at(
	prefix: &IndexPath,
	actual: &Tensor,
	expected: &Tensor,
	config: &ToleranceConfig,
) -> Result<(), Divergence> {
	debug_assert!(config.validate().is_ok());
	if actual.shape() != expected.shape() {
		return Err(Divergence::structural(
			DivergenceKind::ShapeMismatch,
			prefix,
			format!("shape {:?} vs {:?}", actual.shape(), expected.shape()),
		));
	}
	let mut scan = Scan::new(config, Rule::Relative);
	scan.tensors(prefix, actual, expected);
	scan.finish()
}

fn scan_values<'c>(
	actual: &Value,
	expected: &Value,
	config: &'c ToleranceConfig,
) -> Result<Scan<'c>, Divergence> {
	debug_assert!(config.validate().is_ok());
	let actual = widen(actual);
	let expected = widen(expected);
	let leaves = collect_leaves(&actual, &expected)?;
	debug!("comparing {} leaf pairs", leaves.len());
	let mut scan = Scan::new(config, Rule::Strict);
	for leaf in &leaves {
		scan.leaf(leaf);
	}
	Ok(scan)
}

pub(crate) fn emit(err: &Divergence) {
	debug!("comparison failed: {err}");
	emit_report(&err.report);
}

fn emit_report(report: &DivergenceReport) {
	let stdout = std::io::stdout();
	let mut out = stdout.lock();
	if let Err(e) = report.dump(&mut out) {
		warn!("cannot write divergence report: {e}");
	}
}

//--------------------------------------------------------------------------------------------------
