//------------------------------------------------------------------------------
//
// Copyright 2025 Jiri Bobek. All rights reserved.
// License: GPL 3.0 or later. See LICENSE.txt for details.
//
//------------------------------------------------------------------------------

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use log::{error, info};

use tensorcmp::io::load_safetensors;
use tensorcmp::parity::check_named_parity;
use tensorcmp::{ToleranceConfig, Value, compare, compare_dbg};

//--------------------------------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Mode {
	/// Structural comparison with NaN position matching
	Strict,

	/// Per-tensor relative bound, default rtol 1e-2 / atol 1e-5
	Rel,

	/// Strict comparison, failures dumped at 1e-8 thresholds
	Debug,
}

#[derive(Parser)]
#[command(name = "tensorcmp")]
#[command(about = "Compare two safetensors files within a numeric tolerance")]
#[command(version)]
struct Cli {
	/// Tensors produced by the implementation under test
	actual: PathBuf,

	/// Reference tensors
	expected: PathBuf,

	#[arg(short, long, value_enum, default_value_t = Mode::Strict)]
	mode: Mode,

	/// Relative tolerance (overrides the mode's default)
	#[arg(long)]
	rtol: Option<f64>,

	/// Absolute tolerance (overrides the mode's default)
	#[arg(long)]
	atol: Option<f64>,

	/// Accept infinities of matching sign
	#[arg(long)]
	allow_inf: bool,

	/// Print at most this many mismatching elements, 0 prints all
	#[arg(long, default_value_t = 0)]
	max_diff_count: usize,

	/// More log output, may be repeated
	#[arg(short, long, action = clap::ArgAction::Count)]
	verbose: u8,

	/// No log output
	#[arg(short, long)]
	quiet: bool,
}

impl Cli {
	fn tolerance(&self) -> ToleranceConfig {
		let mut config = match self.mode {
			Mode::Strict | Mode::Debug => ToleranceConfig::default(),
			Mode::Rel => ToleranceConfig::relative(),
		};
		if let Some(rtol) = self.rtol {
			config = config.with_relative_tolerance(rtol);
		}
		if let Some(atol) = self.atol {
			config = config.with_absolute_tolerance(atol);
		}
		config.with_allow_infinite(self.allow_inf).with_max_reported_mismatches(self.max_diff_count)
	}
}

fn load(path: &Path) -> Option<Value> {
	match load_safetensors(path) {
		Ok(value) => Some(value),
		Err(err) => {
			error!("cannot load {}: {err}", path.display());
			None
		},
	}
}

fn main() -> ExitCode {
	let cli = Cli::parse();
	if let Err(e) = stderrlog::new()
		.module(module_path!())
		.quiet(cli.quiet)
		.verbosity(usize::from(cli.verbose) + 1)
		.init()
	{
		eprintln!("cannot initialize logging: {e}");
	}

	let config = cli.tolerance();
	if let Err(err) = config.validate() {
		error!("invalid tolerance: {err}");
		return ExitCode::from(2);
	}

	let (Some(actual), Some(expected)) = (load(&cli.actual), load(&cli.expected)) else {
		return ExitCode::from(2);
	};

	let result = match (cli.mode, &actual, &expected) {
		(Mode::Strict, _, _) => compare(&actual, &expected, &config),
		(Mode::Debug, _, _) => compare_dbg(&actual, &expected, &config),
		(Mode::Rel, Value::Map(a), Value::Map(e)) => check_named_parity(a, e, &config),
		(Mode::Rel, _, _) => {
			error!("safetensors files must load as mappings");
			return ExitCode::from(2);
		},
	};

	match result {
		Ok(()) => {
			info!("{} matches {}", cli.actual.display(), cli.expected.display());
			println!("OK");
			ExitCode::SUCCESS
		},
		Err(err) => {
			error!("{err}");
			ExitCode::from(1)
		},
	}
}

//--------------------------------------------------------------------------------------------------
