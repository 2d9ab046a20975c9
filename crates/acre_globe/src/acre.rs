//! Acres: the hexagonal (pentagonal at the 12 icosahedron vertices) cells of
//! the globe.
//!
//! An acre is built once from the ring of lattice triangles around its
//! center and then only gains write-once attributes: neighbor ids (one per
//! boundary seam), a pack id, pack neighbors and a topography. All of them
//! are set through `&self`, so an `Arc<Acre>` can be shared by every sector
//! it touches.
//!
//! ```text
//!          p2 ───── p1
//!         /  \  1  /  \          seam k runs points[k] → points[k+1]
//!        / 2  \   /  0 \         and neighbors[k] is the acre across it
//!      p3 ──── c ───── p0
//!        \ 3  /   \  5 /         points run counter-clockwise seen from
//!         \  /  4  \  /          outside the sphere
//!          p4 ───── p5
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

use smallvec::{smallvec, SmallVec};

use crate::constants::MAX_ACRE_SIDES;
use crate::error::{BuildError, BuildResult};
use crate::geo_point::GeoPoint;
use crate::vertex_ids::Topography;

/// Process-wide acre identity. `AcreId::NONE` (0) marks an unset neighbor.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct AcreId(pub u64);

impl AcreId {
  pub const NONE: AcreId = AcreId(0);

  #[inline]
  pub fn get(self) -> u64 {
    self.0
  }

  #[inline]
  pub fn is_none(self) -> bool {
    self.0 == 0
  }
}

impl fmt::Debug for AcreId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "AcreId({})", self.0)
  }
}

impl fmt::Display for AcreId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "#{}", self.0)
  }
}

/// How an acre relates to the sectors it covers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AcreFlavor {
  /// Entirely inside one sector.
  Inner,
  /// Centered on an edge shared by two sectors.
  DualSector,
  /// Centered on a sector corner shared by 5 or 6 sectors.
  MultiSector,
}

impl AcreFlavor {
  pub fn as_str(self) -> &'static str {
    match self {
      AcreFlavor::Inner => "inner",
      AcreFlavor::DualSector => "dual_sector",
      AcreFlavor::MultiSector => "multi_sector",
    }
  }
}

/// Flat description of a finished acre, for persistence sinks.
#[derive(Clone, Debug, PartialEq)]
pub struct AcreRecord {
  pub pack_id: u32,
  pub id: AcreId,
  pub flavor: AcreFlavor,
  pub center: GeoPoint,
  pub points: Vec<GeoPoint>,
  /// Pack ids across each seam, aligned with `points`.
  pub neighbors: Vec<u32>,
}

pub struct Acre {
  id: AcreId,
  flavor: AcreFlavor,
  center: GeoPoint,
  points: SmallVec<[GeoPoint; MAX_ACRE_SIDES]>,
  neighbors: [AtomicU64; MAX_ACRE_SIDES],
  pack_id: OnceLock<u32>,
  pack_neighbors: OnceLock<SmallVec<[u32; MAX_ACRE_SIDES]>>,
  topography: OnceLock<Topography>,
}

impl Acre {
  /// Build an acre from the outer edges of its triangle fan, in any order
  /// and orientation. The edges must close into one 5- or 6-cycle.
  pub fn from_fan(
    id: AcreId,
    flavor: AcreFlavor,
    center: GeoPoint,
    edges: &[(GeoPoint, GeoPoint)],
  ) -> BuildResult<Self> {
    let points = chain_ring(center, edges)?;
    Ok(Self {
      id,
      flavor,
      center,
      points,
      neighbors: Default::default(),
      pack_id: OnceLock::new(),
      pack_neighbors: OnceLock::new(),
      topography: OnceLock::new(),
    })
  }

  #[inline]
  pub fn id(&self) -> AcreId {
    self.id
  }

  #[inline]
  pub fn flavor(&self) -> AcreFlavor {
    self.flavor
  }

  #[inline]
  pub fn center(&self) -> GeoPoint {
    self.center
  }

  /// Boundary points, counter-clockwise from outside, starting at the
  /// smallest point.
  #[inline]
  pub fn points(&self) -> &[GeoPoint] {
    &self.points
  }

  #[inline]
  pub fn sides(&self) -> usize {
    self.points.len()
  }

  pub fn is_pentagon(&self) -> bool {
    self.sides() == 5
  }

  /// Endpoints of seam `k`.
  pub fn seam(&self, k: usize) -> (GeoPoint, GeoPoint) {
    (self.points[k], self.points[(k + 1) % self.sides()])
  }

  /// Seam joining `a` and `b`, in either direction.
  pub fn seam_index(&self, a: GeoPoint, b: GeoPoint) -> Option<usize> {
    (0..self.sides()).find(|&k| {
      let (p, q) = self.seam(k);
      (p == a && q == b) || (p == b && q == a)
    })
  }

  #[inline]
  pub fn neighbor(&self, k: usize) -> AcreId {
    AcreId(self.neighbors[k].load(Ordering::Acquire))
  }

  pub fn neighbor_ids(&self) -> SmallVec<[AcreId; MAX_ACRE_SIDES]> {
    (0..self.sides()).map(|k| self.neighbor(k)).collect()
  }

  /// Every seam has a neighbor.
  pub fn is_linked(&self) -> bool {
    (0..self.sides()).all(|k| !self.neighbor(k).is_none())
  }

  /// Set the neighbor across seam `k`. Returns `false` when the slot
  /// already held `neighbor`; a different id is a duplicate registration.
  pub fn set_neighbor(&self, k: usize, neighbor: AcreId) -> BuildResult<bool> {
    match self.neighbors[k].compare_exchange(0, neighbor.0, Ordering::AcqRel, Ordering::Acquire) {
      Ok(_) => Ok(true),
      Err(existing) if existing == neighbor.0 => Ok(false),
      Err(existing) => Err(BuildError::DuplicateRegistration(format!(
        "acre {} seam {k} links {} and {}",
        self.id, AcreId(existing), neighbor
      ))),
    }
  }

  pub fn pack_id(&self) -> Option<u32> {
    self.pack_id.get().copied()
  }

  pub fn set_pack_id(&self, pack_id: u32) -> BuildResult<()> {
    self
      .pack_id
      .set(pack_id)
      .map_err(|_| BuildError::DuplicateRegistration(format!("pack id of acre {}", self.id)))
  }

  /// Pack ids across each seam; empty until the graph is packed.
  pub fn pack_neighbors(&self) -> &[u32] {
    self.pack_neighbors.get().map(|n| n.as_slice()).unwrap_or(&[])
  }

  pub fn set_pack_neighbors(&self, neighbors: SmallVec<[u32; MAX_ACRE_SIDES]>) -> BuildResult<()> {
    self
      .pack_neighbors
      .set(neighbors)
      .map_err(|_| BuildError::DuplicateRegistration(format!("pack neighbors of acre {}", self.id)))
  }

  pub fn topography(&self) -> Option<&Topography> {
    self.topography.get()
  }

  pub fn set_topography(&self, topography: Topography) -> BuildResult<()> {
    self
      .topography
      .set(topography)
      .map_err(|_| BuildError::DuplicateRegistration(format!("topography of acre {}", self.id)))
  }

  pub fn record(&self) -> AcreRecord {
    AcreRecord {
      pack_id: self.pack_id().unwrap_or(u32::MAX),
      id: self.id,
      flavor: self.flavor,
      center: self.center,
      points: self.points.to_vec(),
      neighbors: self.pack_neighbors().to_vec(),
    }
  }
}

impl fmt::Debug for Acre {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Acre")
      .field("id", &self.id)
      .field("flavor", &self.flavor)
      .field("center", &self.center)
      .field("sides", &self.sides())
      .field("pack_id", &self.pack_id())
      .finish()
  }
}

/// Link `a` and `b` across their common seam `p`–`q`, on both sides.
pub fn link_acres(a: &Acre, b: &Acre, p: GeoPoint, q: GeoPoint) -> BuildResult<()> {
  let ka = a
    .seam_index(p, q)
    .ok_or_else(|| BuildError::geometry(format!("acre {} has no seam {p}–{q}", a.id)))?;
  let kb = b
    .seam_index(p, q)
    .ok_or_else(|| BuildError::geometry(format!("acre {} has no seam {p}–{q}", b.id)))?;
  a.set_neighbor(ka, b.id)?;
  b.set_neighbor(kb, a.id)?;
  Ok(())
}

/// Chain undirected edges into a counter-clockwise ring.
fn chain_ring(center: GeoPoint, edges: &[(GeoPoint, GeoPoint)]) -> BuildResult<SmallVec<[GeoPoint; MAX_ACRE_SIDES]>> {
  let sides = edges.len();
  if !(5..=MAX_ACRE_SIDES).contains(&sides) {
    return Err(BuildError::geometry(format!(
      "acre at {center} has a fan of {sides} triangles"
    )));
  }

  let (first, second) = edges[0];
  let mut ring: SmallVec<[GeoPoint; MAX_ACRE_SIDES]> = smallvec![first, second];
  let mut used = 1u32;
  while ring.len() < sides {
    let last = ring[ring.len() - 1];
    let (i, next) = edges
      .iter()
      .enumerate()
      .filter(|(i, _)| used & (1 << i) == 0)
      .find_map(|(i, &(a, b))| match (a == last, b == last) {
        (true, _) => Some((i, b)),
        (_, true) => Some((i, a)),
        _ => None,
      })
      .ok_or_else(|| BuildError::geometry(format!("fan around {center} is open at {last}")))?;
    if ring.contains(&next) {
      return Err(BuildError::geometry(format!("fan around {center} closes early at {next}")));
    }
    used |= 1 << i;
    ring.push(next);
  }

  let last = ring[sides - 1];
  let closes = edges.iter().enumerate().any(|(i, &(a, b))| {
    used & (1 << i) == 0 && ((a == last && b == first) || (a == first && b == last))
  });
  if !closes {
    return Err(BuildError::geometry(format!("fan around {center} does not close")));
  }

  let c = center.to_unit();
  let (p0, p1) = (ring[0].to_unit(), ring[1].to_unit());
  if c.dot((p0 - c).cross(p1 - c)) < 0.0 {
    ring.reverse();
  }
  let start = ring
    .iter()
    .enumerate()
    .min_by_key(|(_, p)| **p)
    .map_or(0, |(i, _)| i);
  ring.rotate_left(start);
  Ok(ring)
}

#[cfg(test)]
#[path = "acre_test.rs"]
mod acre_test;
