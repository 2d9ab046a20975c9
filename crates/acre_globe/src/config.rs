//! GlobeConfig - subdivision levels, topography resolution and build
//! options.

use crate::constants::{MAX_ZONE_DIVISIONS, MIN_LATTICE_SPACING, MIN_ZONE_DIVISIONS};
use crate::error::{BuildError, BuildResult};
use crate::geo_spec::GeoSpec;
use crate::vertex_ids::VertexIdLayout;

/// Configuration of one globe build.
#[derive(Clone, Debug, PartialEq)]
pub struct GlobeConfig {
  /// Sectors along each icosahedron face edge.
  pub global_sector_divisions: u32,

  /// Lattice steps along each sector edge. Multiple of 3.
  pub sector_divisions: u32,

  /// Working radius in meters. `None` derives it from the acre area.
  pub radius: Option<f64>,

  /// Vertex steps along each zone seam (`R`).
  pub zone_divisions: u32,

  /// Count and verify vertex ids, sequence sizes and graph structure.
  pub assertions: bool,

  /// Worker threads. 0 runs every unit on the calling thread.
  pub worker_threads: usize,
}

impl GlobeConfig {
  pub const SMALL: GlobeConfig = GlobeConfig::preset(4, 9, true);
  pub const MEDIUM: GlobeConfig = GlobeConfig::preset(9, 15, true);
  /// Ships with assertions off: counting its ~1.4e11 vertex ids at full
  /// zone resolution takes about 65 GiB of counter blocks.
  pub const LARGE: GlobeConfig = GlobeConfig::preset(30, 30, false);

  const fn preset(global_sector_divisions: u32, sector_divisions: u32, assertions: bool) -> Self {
    Self {
      global_sector_divisions,
      sector_divisions,
      radius: None,
      zone_divisions: MAX_ZONE_DIVISIONS,
      assertions,
      worker_threads: 4,
    }
  }

  /// Configuration with the given subdivision levels and default options.
  pub fn new(global_sector_divisions: u32, sector_divisions: u32) -> Self {
    Self {
      worker_threads: rayon::current_num_threads(),
      ..Self::preset(global_sector_divisions, sector_divisions, true)
    }
  }

  pub fn with_zone_divisions(mut self, zone_divisions: u32) -> Self {
    self.zone_divisions = zone_divisions;
    self
  }

  pub fn with_worker_threads(mut self, worker_threads: usize) -> Self {
    self.worker_threads = worker_threads;
    self
  }

  pub fn with_radius(mut self, radius: f64) -> Self {
    self.radius = Some(radius);
    self
  }

  pub fn with_assertions(mut self, assertions: bool) -> Self {
    self.assertions = assertions;
    self
  }

  /// Reject configurations the build cannot carry out: bad subdivision or
  /// zone levels, acre counts past a `u32` pack id, vertex ids past the
  /// counter limit and lattices too fine to deduplicate.
  pub fn validate(&self) -> BuildResult<()> {
    if self.global_sector_divisions == 0 {
      return Err(BuildError::Config("global sector divisions must be at least 1".into()));
    }
    if self.sector_divisions == 0 || self.sector_divisions % 3 != 0 {
      return Err(BuildError::Config(format!(
        "sector divisions must be a positive multiple of 3, got {}",
        self.sector_divisions
      )));
    }
    // Lattice coordinates are i32.
    if self.global_sector_divisions > 4096 || self.sector_divisions > 4095 {
      return Err(BuildError::Config(format!(
        "subdivision {}x{} is too fine",
        self.global_sector_divisions, self.sector_divisions
      )));
    }
    if !(MIN_ZONE_DIVISIONS..=MAX_ZONE_DIVISIONS).contains(&self.zone_divisions) {
      return Err(BuildError::Config(format!(
        "zone divisions must be in {}..={}, got {}",
        MIN_ZONE_DIVISIONS, MAX_ZONE_DIVISIONS, self.zone_divisions
      )));
    }
    if let Some(radius) = self.radius {
      if !(radius.is_finite() && radius > 0.0) {
        return Err(BuildError::Config(format!("radius must be positive, got {radius}")));
      }
    }

    let spec = self.spec();
    if spec.acres() > u32::MAX as u64 {
      return Err(BuildError::Config(format!("{} acres do not fit a pack id", spec.acres())));
    }
    VertexIdLayout::new(&spec, self.zone_divisions)?;
    // Neighboring lattice points must never merge in the spatial maps.
    let spacing = spec.lattice_spacing();
    if spacing < MIN_LATTICE_SPACING {
      return Err(BuildError::Config(format!(
        "lattice spacing {spacing:.2e} of {}x{} is below {MIN_LATTICE_SPACING:.0e}",
        self.global_sector_divisions, self.sector_divisions
      )));
    }
    Ok(())
  }

  pub fn spec(&self) -> GeoSpec {
    GeoSpec::new(self.global_sector_divisions, self.sector_divisions)
  }

  /// Radius in meters: the configured one or the acre-area default.
  pub fn working_radius(&self) -> f64 {
    self.radius.unwrap_or_else(|| self.spec().approximate_radius())
  }
}

impl Default for GlobeConfig {
  fn default() -> Self {
    Self::new(Self::SMALL.global_sector_divisions, Self::SMALL.sector_divisions)
  }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;
