//! Quantized directions on the unit sphere.
//!
//! A [`GeoPoint`] is the canonical identity of a location on the globe. Both
//! angles are stored as `i32` fixed point (π / 2³¹ rad resolution, under a
//! centimeter on an Earth-sized sphere), which makes points `Eq + Hash + Ord`
//! and keeps the encoding of one location unique:
//!
//! - longitude is forced to 0 at both poles
//! - longitude −π is folded onto +π
//!
//! Axis convention: `x = sin(lon)·cos(lat)`, `y = cos(lon)·cos(lat)`,
//! `z = sin(lat)`.

use std::f64::consts::{FRAC_PI_2, PI, TAU};
use std::fmt;

use glam::DVec3;

/// Fixed-point units per radian (2³¹ units per half turn).
const ANGLE_SCALE: f64 = (1u64 << 31) as f64 / PI;

/// Horizontal distance below which a direction is treated as a pole.
const POLE_EPSILON: f64 = 1e-12;

/// Quantized latitude of the north pole.
const POLE_LAT: i32 = 1 << 30;

/// A quantized direction on the unit sphere.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GeoPoint {
  lat: i32,
  lon: i32,
}

impl GeoPoint {
  pub const NORTH_POLE: GeoPoint = GeoPoint { lat: POLE_LAT, lon: 0 };
  pub const SOUTH_POLE: GeoPoint = GeoPoint { lat: -POLE_LAT, lon: 0 };

  /// Create from latitude and longitude in radians.
  pub fn from_radians(latitude: f64, longitude: f64) -> Self {
    let lat = (latitude.clamp(-FRAC_PI_2, FRAC_PI_2) * ANGLE_SCALE).round() as i32;
    if lat >= POLE_LAT {
      return Self::NORTH_POLE;
    }
    if lat <= -POLE_LAT {
      return Self::SOUTH_POLE;
    }
    let wrapped = (longitude + PI).rem_euclid(TAU) - PI;
    let mut lon = (wrapped * ANGLE_SCALE).round() as i32;
    if lon == i32::MIN {
      lon = i32::MAX;
    }
    Self { lat, lon }
  }

  /// Create from latitude and longitude in degrees.
  pub fn from_degrees(latitude: f64, longitude: f64) -> Self {
    Self::from_radians(latitude.to_radians(), longitude.to_radians())
  }

  /// Direction of a non-zero vector.
  pub fn from_vector(v: DVec3) -> Self {
    let v = v.normalize();
    let horizontal = (v.x * v.x + v.y * v.y).sqrt();
    if horizontal < POLE_EPSILON {
      return if v.z > 0.0 {
        Self::NORTH_POLE
      } else {
        Self::SOUTH_POLE
      };
    }
    Self::from_radians(v.z.atan2(horizontal), v.x.atan2(v.y))
  }

  /// Latitude in radians.
  #[inline]
  pub fn latitude(&self) -> f64 {
    self.lat as f64 / ANGLE_SCALE
  }

  /// Longitude in radians.
  #[inline]
  pub fn longitude(&self) -> f64 {
    self.lon as f64 / ANGLE_SCALE
  }

  /// Raw fixed-point angles `(lat, lon)`.
  #[inline]
  pub fn raw(&self) -> (i32, i32) {
    (self.lat, self.lon)
  }

  pub fn is_pole(&self) -> bool {
    self.lat.abs() == POLE_LAT
  }

  /// Unit vector for this direction.
  pub fn to_unit(&self) -> DVec3 {
    let (sin_lat, cos_lat) = self.latitude().sin_cos();
    let (sin_lon, cos_lon) = self.longitude().sin_cos();
    DVec3::new(sin_lon * cos_lat, cos_lon * cos_lat, sin_lat)
  }

  /// Position on a sphere of the given radius.
  #[inline]
  pub fn to_point(&self, radius: f64) -> DVec3 {
    self.to_unit() * radius
  }

  /// Great-circle midpoint of two non-antipodal points.
  pub fn midpoint(a: GeoPoint, b: GeoPoint) -> GeoPoint {
    let sum = a.to_unit() + b.to_unit();
    if sum.length_squared() < POLE_EPSILON {
      return a;
    }
    Self::from_vector(sum)
  }
}

impl fmt::Debug for GeoPoint {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "GeoPoint({:.6}°, {:.6}°)",
      self.latitude().to_degrees(),
      self.longitude().to_degrees()
    )
  }
}

impl fmt::Display for GeoPoint {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "({:.6}, {:.6})",
      self.latitude().to_degrees(),
      self.longitude().to_degrees()
    )
  }
}

#[cfg(test)]
#[path = "geo_point_test.rs"]
mod geo_point_test;
