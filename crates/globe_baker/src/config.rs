//! Bake configuration: a preset, an optional TOML file and CLI overrides.

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use acre_globe::GlobeConfig;

/// Named globe sizes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
	#[default]
	Small,
	Medium,
	Large,
}

impl Preset {
	pub fn config(self) -> GlobeConfig {
		let preset = match self {
			Preset::Small => GlobeConfig::SMALL,
			Preset::Medium => GlobeConfig::MEDIUM,
			Preset::Large => GlobeConfig::LARGE,
		};
		GlobeConfig {
			worker_threads: default_threads(),
			..preset
		}
	}
}

/// Root of the TOML file. Every field is optional and overrides the preset.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BakeConfig {
	/// Starting point for the fields below.
	pub preset: Option<Preset>,
	#[serde(default)]
	pub globe: GlobeSection,
	/// JSON-lines output, relative to the config file.
	pub output: Option<PathBuf>,
}

/// `[globe]` table.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GlobeSection {
	pub global_sector_divisions: Option<u32>,
	pub sector_divisions: Option<u32>,
	/// Radius in meters.
	pub radius: Option<f64>,
	pub zone_divisions: Option<u32>,
	pub assertions: Option<bool>,
	pub worker_threads: Option<usize>,
}

impl BakeConfig {
	/// Load configuration from a TOML file.
	pub fn load(path: &Path) -> Result<Self> {
		let content = std::fs::read_to_string(path)
			.with_context(|| format!("Failed to read config file: {}", path.display()))?;
		let mut config = Self::parse(&content)
			.with_context(|| format!("Failed to parse config TOML: {}", path.display()))?;

		// Output paths are relative to the config file.
		if let (Some(output), Some(dir)) = (config.output.as_mut(), path.parent()) {
			if output.is_relative() {
				*output = dir.join(&*output);
			}
		}
		Ok(config)
	}

	pub fn parse(content: &str) -> Result<Self> {
		Ok(toml::from_str(content)?)
	}

	/// Globe configuration: the preset (`fallback` unless the file names one)
	/// with the `[globe]` fields applied on top.
	pub fn globe_config(&self, fallback: Preset) -> GlobeConfig {
		let mut config = self.preset.unwrap_or(fallback).config();
		let globe = &self.globe;
		if let Some(g) = globe.global_sector_divisions {
			config.global_sector_divisions = g;
		}
		if let Some(n) = globe.sector_divisions {
			config.sector_divisions = n;
		}
		if let Some(radius) = globe.radius {
			config.radius = Some(radius);
		}
		if let Some(r) = globe.zone_divisions {
			config.zone_divisions = r;
		}
		if let Some(assertions) = globe.assertions {
			config.assertions = assertions;
		}
		if let Some(threads) = globe.worker_threads {
			config.worker_threads = threads;
		}
		config
	}
}

fn default_threads() -> usize {
	std::thread::available_parallelism()
		.map(|n| n.get())
		.unwrap_or(4)
}
