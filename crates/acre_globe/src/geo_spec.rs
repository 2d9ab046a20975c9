//! Closed-form counts of a globe, derived from its two subdivision levels.
//!
//! With `g` global sector divisions and `n` sector divisions the globe is a
//! geodesic subdivision of frequency `T = g·n`, so every count follows from
//! Euler's formula on the acre graph (`V − E + F = 2` with `F` acres, every
//! corner shared by three acres).

use std::fmt;

use crate::constants::{
  ACRE_AREA_M2, GLOBAL_SECTORS, ICOSAHEDRON_EDGE_ANGLE, ICOSAHEDRON_VERTICES, ZONES_PER_SIDE, ZONE_SEAMS_PER_SIDE,
};
use crate::lattice;

/// Derived sizes of one globe configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeoSpec {
  global_divisions: u32,
  sector_divisions: u32,
}

impl GeoSpec {
  pub const fn new(global_divisions: u32, sector_divisions: u32) -> Self {
    Self {
      global_divisions,
      sector_divisions,
    }
  }

  pub fn global_divisions(&self) -> u32 {
    self.global_divisions
  }

  pub fn sector_divisions(&self) -> u32 {
    self.sector_divisions
  }

  /// Subdivision frequency of the whole icosahedron face.
  pub fn frequency(&self) -> u64 {
    self.global_divisions as u64 * self.sector_divisions as u64
  }

  pub fn sectors_per_global(&self) -> u64 {
    let g = self.global_divisions as u64;
    g * g
  }

  pub fn sectors(&self) -> u64 {
    GLOBAL_SECTORS as u64 * self.sectors_per_global()
  }

  pub fn triangles_per_sector(&self) -> u64 {
    lattice::triangle_count(self.sector_divisions as i32) as u64
  }

  pub fn triangles(&self) -> u64 {
    self.sectors() * self.triangles_per_sector()
  }

  /// Distinct lattice points over the whole sphere.
  pub fn lattice_points(&self) -> u64 {
    (self.triangles() + 4) / 2
  }

  /// All acres: `10·T²/3 + 2`.
  pub fn acres(&self) -> u64 {
    (self.triangles() + 12) / 6
  }

  /// Acres fully inside one sector.
  pub fn inner_acres(&self) -> u64 {
    self.sectors() * lattice::interior_acre_count(self.sector_divisions as i32) as u64
  }

  /// Acres centered on a sector edge, away from sector corners.
  pub fn dual_sector_acres(&self) -> u64 {
    (self.sector_divisions as u64 - 3) * self.sectors() / 2
  }

  /// Acres centered on sector corners (pentagons at the icosahedron vertices).
  pub fn multi_sector_acres(&self) -> u64 {
    let g = self.global_divisions as u64;
    10 * g * g + 2
  }

  pub fn pentagons(&self) -> u64 {
    ICOSAHEDRON_VERTICES as u64
  }

  /// Distinct acre seams (graph edges).
  pub fn acre_seams(&self) -> u64 {
    3 * self.acres() - 6
  }

  /// Distinct acre corners.
  pub fn acre_corners(&self) -> u64 {
    2 * self.acres() - 4
  }

  /// Sum of acre side counts; each seam is seen from both acres.
  pub fn acre_sides(&self) -> u64 {
    2 * self.acre_seams()
  }

  pub fn zones(&self) -> u64 {
    ZONES_PER_SIDE as u64 * self.acre_sides()
  }

  pub fn zone_seams(&self) -> u64 {
    ZONE_SEAMS_PER_SIDE as u64 * self.acre_sides()
  }

  /// Nominal angle between neighboring lattice points on the unit sphere.
  pub fn lattice_spacing(&self) -> f64 {
    ICOSAHEDRON_EDGE_ANGLE / self.frequency() as f64
  }

  /// Radius in meters at which an average acre covers [`ACRE_AREA_M2`].
  pub fn approximate_radius(&self) -> f64 {
    (self.acres() as f64 * ACRE_AREA_M2 / (4.0 * std::f64::consts::PI)).sqrt()
  }
}

impl fmt::Display for GeoSpec {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(
      f,
      "globe g={} n={} (frequency {})",
      self.global_divisions,
      self.sector_divisions,
      self.frequency()
    )?;
    writeln!(f, "  sectors:        {:>14}", self.sectors())?;
    writeln!(f, "  triangles:      {:>14}", self.triangles())?;
    writeln!(f, "  lattice points: {:>14}", self.lattice_points())?;
    writeln!(
      f,
      "  acres:          {:>14} (inner {}, dual {}, multi {})",
      self.acres(),
      self.inner_acres(),
      self.dual_sector_acres(),
      self.multi_sector_acres()
    )?;
    writeln!(f, "  acre seams:     {:>14}", self.acre_seams())?;
    writeln!(f, "  acre corners:   {:>14}", self.acre_corners())?;
    writeln!(f, "  zones:          {:>14}", self.zones())?;
    writeln!(f, "  zone seams:     {:>14}", self.zone_seams())?;
    write!(f, "  radius (m):     {:>14.1}", self.approximate_radius())
  }
}

#[cfg(test)]
#[path = "geo_spec_test.rs"]
mod geo_spec_test;
