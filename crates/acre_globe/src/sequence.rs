//! Sequence services: acre ids and frozen point numbering.
//!
//! Both are created per build and handed to the stages that need them, so
//! two builds in one process never share numbering.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{OnceLock, PoisonError, RwLock};

use crate::acre::AcreId;
use crate::constants::DEDUP_TOLERANCE;
use crate::error::{BuildError, BuildResult};
use crate::geo_point::GeoPoint;
use crate::spatial_map::{DAabb3, SpatialMap};

/// Source of acre ids. Ids start at 1 so 0 can mean "no acre".
#[derive(Debug)]
pub struct AcreSequence {
  next: AtomicU64,
}

impl Default for AcreSequence {
  fn default() -> Self {
    Self::starting_at(1)
  }
}

impl AcreSequence {
  pub fn new() -> Self {
    Self::default()
  }

  /// Sequence whose first id is `first` (at least 1).
  pub fn starting_at(first: u64) -> Self {
    Self {
      next: AtomicU64::new(first.max(1)),
    }
  }

  pub fn next_id(&self) -> AcreId {
    AcreId(self.next.fetch_add(1, Ordering::Relaxed))
  }

  /// Ids handed out so far, counted from `first`.
  pub fn peek(&self) -> u64 {
    self.next.load(Ordering::Relaxed)
  }
}

/// Numbering of a set of points that is only readable once complete.
///
/// ```text
///   touch(p) ... touch(q)   (concurrent, first use registers)
///          │
///   freeze(start)           (sort, number start, start+1, ...)
///          │
///   get(p) ... get(q)       (read-only lookups)
/// ```
///
/// Numbers follow point order, so they do not depend on which thread
/// touched first.
pub struct PointSequence {
  name: &'static str,
  points: SpatialMap<GeoPoint>,
  /// Held shared by `touch` and exclusively by `freeze`, so no touch can
  /// slip in while the numbering is built.
  gate: RwLock<()>,
  frozen: OnceLock<Frozen>,
}

struct Frozen {
  start: u64,
  numbers: HashMap<GeoPoint, u64>,
}

impl PointSequence {
  pub fn new(name: &'static str) -> Self {
    Self {
      name,
      points: SpatialMap::new(DAabb3::enclosing_sphere(1.0)),
      gate: RwLock::new(()),
      frozen: OnceLock::new(),
    }
  }

  pub fn name(&self) -> &'static str {
    self.name
  }

  /// Distinct points touched.
  pub fn len(&self) -> usize {
    self.points.len()
  }

  pub fn is_empty(&self) -> bool {
    self.points.is_empty()
  }

  pub fn is_frozen(&self) -> bool {
    self.frozen.get().is_some()
  }

  /// Register `point`. Returns `true` on its first use.
  pub fn touch(&self, point: GeoPoint) -> BuildResult<bool> {
    let _gate = self.gate.read().unwrap_or_else(PoisonError::into_inner);
    if self.is_frozen() {
      return Err(BuildError::FrozenWrite(self.name));
    }
    let (_, inserted) = self
      .points
      .get_or_insert_with(point.to_unit(), DEDUP_TOLERANCE, || point)?;
    Ok(inserted)
  }

  /// Number every touched point from `start` in point order. Returns the
  /// count. Freezing twice is an error.
  pub fn freeze(&self, start: u64) -> BuildResult<u64> {
    let _gate = self.gate.write().unwrap_or_else(PoisonError::into_inner);
    if self.is_frozen() {
      return Err(BuildError::FrozenWrite(self.name));
    }
    let mut points: Vec<GeoPoint> = self.points.entries().into_iter().map(|(_, p)| p).collect();
    points.sort_unstable();
    let numbers = points
      .iter()
      .enumerate()
      .map(|(i, &p)| (p, start + i as u64))
      .collect();
    let count = points.len() as u64;
    self
      .frozen
      .set(Frozen { start, numbers })
      .map_err(|_| BuildError::FrozenWrite(self.name))?;
    tracing::debug!(sequence = self.name, count, "sequence frozen");
    Ok(count)
  }

  /// Number of `point`, which must have been touched.
  pub fn get(&self, point: GeoPoint) -> BuildResult<u64> {
    let frozen = self.frozen.get().ok_or(BuildError::NotFrozen(self.name))?;
    if let Some(&n) = frozen.numbers.get(&point) {
      return Ok(n);
    }
    self
      .points
      .find_near(point.to_unit(), DEDUP_TOLERANCE)
      .and_then(|canonical| frozen.numbers.get(&canonical).copied())
      .ok_or_else(|| BuildError::geometry(format!("{} was never touched in `{}`", point, self.name)))
  }

  /// First number handed out by `freeze`.
  pub fn start(&self) -> BuildResult<u64> {
    self
      .frozen
      .get()
      .map(|f| f.start)
      .ok_or(BuildError::NotFrozen(self.name))
  }
}

#[cfg(test)]
#[path = "sequence_test.rs"]
mod sequence_test;
