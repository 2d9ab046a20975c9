//! Spatial deduplication map.
//!
//! An octree of `(position, value)` entries used to give every location one
//! canonical entry even when several sector builders compute it
//! independently:
//!
//! ```text
//!   builder A ── p ≈ (0.31, 0.52, 0.79) ─┐
//!                                        ├─► get_or_insert_with(p, tol) ─► one entry
//!   builder B ── p'≈ (0.31, 0.52, 0.79) ─┘
//! ```
//!
//! # Concurrency
//!
//! The tree sits behind a single `RwLock`. Lookups and `intersect` share the
//! read lock. [`SpatialMap::get_or_insert_with`] looks up under the read lock
//! and, on a miss, re-checks under the write lock before inserting, so a race
//! between two builders registering the same point yields exactly one entry.

mod bounds;
mod node;

pub use bounds::DAabb3;
pub use node::MAX_DEPTH;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

use glam::DVec3;

use crate::error::{BuildError, BuildResult};
use node::{Entry, Node};

/// Entries a leaf holds before it splits.
pub const DEFAULT_SPLIT_THRESHOLD: usize = 16;

/// Octree map from positions to values.
pub struct SpatialMap<T> {
  bounds: DAabb3,
  split_threshold: usize,
  root: RwLock<Node<T>>,
  len: AtomicUsize,
}

impl<T: Clone> SpatialMap<T> {
  pub fn new(bounds: DAabb3) -> Self {
    Self::with_split_threshold(bounds, DEFAULT_SPLIT_THRESHOLD)
  }

  /// Create a map whose leaves split past `split_threshold` entries
  /// (clamped to at least 2).
  pub fn with_split_threshold(bounds: DAabb3, split_threshold: usize) -> Self {
    Self {
      bounds,
      split_threshold: split_threshold.max(2),
      root: RwLock::new(Node::empty()),
      len: AtomicUsize::new(0),
    }
  }

  pub fn bounds(&self) -> &DAabb3 {
    &self.bounds
  }

  pub fn len(&self) -> usize {
    self.len.load(Ordering::Acquire)
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Invoke `consumer` for every entry inside `region`.
  ///
  /// Returns the number of entries visited.
  pub fn intersect<F: FnMut(DVec3, &T)>(&self, region: &DAabb3, mut consumer: F) -> usize {
    let root = self.root.read().unwrap_or_else(PoisonError::into_inner);
    root.visit(&self.bounds, region, &mut |e: &Entry<T>| consumer(e.position, &e.value))
  }

  /// Insert a new entry, without checking for nearby duplicates.
  pub fn add(&self, value: T, position: DVec3) -> BuildResult<()> {
    self.check_bounds(position)?;
    let mut root = self.root.write().unwrap_or_else(PoisonError::into_inner);
    root.insert(&self.bounds, 0, self.split_threshold, Entry { position, value });
    self.len.fetch_add(1, Ordering::AcqRel);
    Ok(())
  }

  /// Value of the entry nearest to `position` within the tolerance cube.
  pub fn find_near(&self, position: DVec3, tolerance: f64) -> Option<T> {
    let root = self.root.read().unwrap_or_else(PoisonError::into_inner);
    Self::nearest(&root, &self.bounds, position, tolerance)
  }

  /// Return the canonical value near `position`, registering `make()` there
  /// if none exists. The flag is `true` when this call inserted.
  pub fn get_or_insert_with<F: FnOnce() -> T>(
    &self,
    position: DVec3,
    tolerance: f64,
    make: F,
  ) -> BuildResult<(T, bool)> {
    if let Some(found) = self.find_near(position, tolerance) {
      return Ok((found, false));
    }
    self.check_bounds(position)?;

    let mut root = self.root.write().unwrap_or_else(PoisonError::into_inner);
    // Another builder may have registered it between the two locks.
    if let Some(found) = Self::nearest(&root, &self.bounds, position, tolerance) {
      return Ok((found, false));
    }
    let value = make();
    root.insert(
      &self.bounds,
      0,
      self.split_threshold,
      Entry {
        position,
        value: value.clone(),
      },
    );
    self.len.fetch_add(1, Ordering::AcqRel);
    Ok((value, true))
  }

  /// Snapshot of every entry.
  pub fn entries(&self) -> Vec<(DVec3, T)> {
    let root = self.root.read().unwrap_or_else(PoisonError::into_inner);
    let mut out = Vec::with_capacity(self.len());
    root.for_each(&mut |e: &Entry<T>| out.push((e.position, e.value.clone())));
    out
  }

  /// Depth of the octree, for diagnostics.
  pub fn depth(&self) -> u32 {
    self.root.read().unwrap_or_else(PoisonError::into_inner).depth()
  }

  fn nearest(root: &Node<T>, bounds: &DAabb3, position: DVec3, tolerance: f64) -> Option<T> {
    let mut best: Option<(f64, T)> = None;
    let region = DAabb3::around(position, tolerance);
    root.visit(bounds, &region, &mut |e: &Entry<T>| {
      let d = e.position.distance_squared(position);
      if best.as_ref().map_or(true, |(bd, _)| d < *bd) {
        best = Some((d, e.value.clone()));
      }
    });
    best.map(|(_, v)| v)
  }

  fn check_bounds(&self, position: DVec3) -> BuildResult<()> {
    if self.bounds.contains_point(position) {
      Ok(())
    } else {
      Err(BuildError::OutOfBounds(format!("{:?}", position)))
    }
  }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod mod_test;
