//! Acre globe baker.
//!
//! Builds a globe, optionally streams every acre to a JSON-lines file, then
//! prints the build summary and validation report. Exits non-zero when
//! validation finds errors.
//!
//! Logging follows `RUST_LOG` (default `info`).

mod config;
mod sink;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use acre_globe::{Acre, AcreConsumer, DiscardAcres, GlobeBuild, GlobeBuilder, GlobeConfig};
use config::{BakeConfig, Preset};
use sink::JsonLinesSink;

/// Acre globe baker.
#[derive(Parser, Debug)]
#[command(name = "bake_globe")]
#[command(about = "Builds, validates and exports an icosahedral acre globe")]
struct Args {
	/// Path to configuration TOML file.
	#[arg(short, long)]
	config: Option<PathBuf>,

	/// Globe size used when the config file names none.
	#[arg(short, long, value_enum, default_value_t = Preset::Small)]
	preset: Preset,

	/// Worker threads (0 builds on the main thread).
	#[arg(short, long)]
	threads: Option<usize>,

	/// JSON-lines file receiving one record per acre.
	#[arg(short, long)]
	output: Option<PathBuf>,

	/// Skip vertex counting and graph checks.
	#[arg(long)]
	no_assertions: bool,
}

fn main() -> Result<()> {
	let args = Args::parse();
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
		.init();

	let bake = match &args.config {
		Some(path) => {
			info!(path = %path.display(), "loading config");
			BakeConfig::load(path)?
		}
		None => BakeConfig::default(),
	};

	let mut globe_config = bake.globe_config(args.preset);
	if let Some(threads) = args.threads {
		globe_config.worker_threads = threads;
	}
	if args.no_assertions {
		globe_config.assertions = false;
	}
	globe_config.validate().context("Invalid globe configuration")?;
	print_spec(&globe_config);

	let output = args.output.or(bake.output);
	let build = match output {
		Some(path) => {
			let sink = Arc::new(JsonLinesSink::create(&path)?);
			let writer = Arc::clone(&sink);
			let build = GlobeBuilder::new(globe_config)
				.build(move |acre: &Acre| writer.consume(acre))
				.context("Globe build failed")?;
			let written = sink.finish()?;
			println!("wrote {written} acres to {}", path.display());
			build
		}
		None => GlobeBuilder::new(globe_config)
			.build(DiscardAcres)
			.context("Globe build failed")?,
	};

	report(&build)
}

fn print_spec(config: &GlobeConfig) {
	let spec = config.spec();
	println!(
		"globe {}x{}: {} sectors, {} acres ({} inner, {} dual-sector, {} multi-sector)",
		spec.global_divisions(),
		spec.sector_divisions(),
		spec.sectors(),
		spec.acres(),
		spec.inner_acres(),
		spec.dual_sector_acres(),
		spec.multi_sector_acres()
	);
	println!(
		"radius {:.1} m, zone divisions {}, {} threads, assertions {}",
		config.working_radius(),
		config.zone_divisions,
		config.worker_threads,
		if config.assertions { "on" } else { "off" }
	);
}

fn report(build: &GlobeBuild) -> Result<()> {
	print!("{}", build.metrics);
	print!("{}", build.report);
	if !build.report.is_ok() {
		warn!(errors = build.report.error_count, "validation failed");
		anyhow::bail!("validation found {} errors", build.report.error_count);
	}
	Ok(())
}
