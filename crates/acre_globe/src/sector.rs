//! Global sectors (icosahedron faces) and the sectors they split into.
//!
//! # Lock order
//!
//! A sector's shared-acre slots sit behind one `RwLock`. Whenever a task
//! needs the slots of several sectors at once it takes them through
//! [`lock_shared_in_order`] or [`read_shared_in_order`], which acquire in
//! ascending sector id. No other code holds two slot locks at a time.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, OnceLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use glam::DVec3;

use crate::acre::Acre;
use crate::constants::{DEDUP_TOLERANCE, GLOBAL_SECTORS, ICOSAHEDRON_VERTICES};
use crate::error::{BuildError, BuildResult};
use crate::geo_point::GeoPoint;
use crate::lattice::{self, AcreLayout, AcreSlot, Corner, Edge, LatticePoint};
use crate::spatial_map::SpatialMap;

/// Index of a sector: `global · g² + triangle index`.
pub type SectorId = usize;

// =============================================================================
// Global sectors
// =============================================================================

/// One face of the base icosahedron.
#[derive(Clone, Debug, PartialEq)]
pub struct GlobalSector {
  pub index: usize,
  /// Counter-clockwise seen from outside.
  pub corners: [GeoPoint; 3],
  /// Face across edge AB, BC, CA.
  pub neighbors: [usize; 3],
  /// First child sector id; children are `first_sector..first_sector + g²`.
  pub first_sector: SectorId,
  pub sector_count: usize,
}

impl GlobalSector {
  pub fn sector_ids(&self) -> std::ops::Range<SectorId> {
    self.first_sector..self.first_sector + self.sector_count
  }

  /// Corners of child sector `local` (a triangle of the `g`-lattice).
  pub fn child_corners(&self, local: usize, g: u32) -> [GeoPoint; 3] {
    let face = self.corners.map(|c| c.to_unit());
    lattice::triangle_corners(local).map(|p| GeoPoint::from_vector(lattice_position(&face, p, g as i32)))
  }
}

/// The 12 icosahedron vertices: poles plus two rings at ±atan(1/2), the
/// lower ring turned by 36°.
pub fn icosahedron_vertices() -> [GeoPoint; ICOSAHEDRON_VERTICES] {
  let ring_lat = 0.5f64.atan();
  let step = std::f64::consts::TAU / 5.0;
  let mut vertices = [GeoPoint::NORTH_POLE; ICOSAHEDRON_VERTICES];
  for i in 0..5 {
    vertices[1 + i] = GeoPoint::from_radians(ring_lat, i as f64 * step);
    vertices[6 + i] = GeoPoint::from_radians(-ring_lat, (i as f64 + 0.5) * step);
  }
  vertices[11] = GeoPoint::SOUTH_POLE;
  vertices
}

/// Build the 20 faces, oriented counter-clockwise, with their neighbors
/// found through shared edges.
pub fn global_sectors(g: u32) -> BuildResult<Vec<GlobalSector>> {
  let v = icosahedron_vertices();
  let mut faces: Vec<[usize; 3]> = Vec::with_capacity(GLOBAL_SECTORS);
  for i in 0..5 {
    let (u0, u1) = (1 + i, 1 + (i + 1) % 5);
    let (l0, l1) = (6 + i, 6 + (i + 1) % 5);
    faces.push([0, u0, u1]);
    faces.push([u0, l0, u1]);
    faces.push([l0, l1, u1]);
    faces.push([11, l1, l0]);
  }

  for face in &mut faces {
    let [a, b, c] = face.map(|i| v[i].to_unit());
    if a.dot((b - a).cross(c - a)) < 0.0 {
      face.swap(1, 2);
    }
  }

  let mut sectors = Vec::with_capacity(faces.len());
  let per_global = (g * g) as usize;
  for (index, face) in faces.iter().enumerate() {
    let mut neighbors = [0; 3];
    for (e, edge) in Edge::ALL.iter().enumerate() {
      let (from, to) = edge.corners();
      let (a, b) = (face[from.index()], face[to.index()]);
      let across: Vec<usize> = faces
        .iter()
        .enumerate()
        .filter(|&(j, other)| j != index && other.contains(&a) && other.contains(&b))
        .map(|(j, _)| j)
        .collect();
      match across.as_slice() {
        &[j] => neighbors[e] = j,
        _ => {
          return Err(BuildError::geometry(format!(
            "icosahedron face {index} edge {edge:?} has {} neighbors",
            across.len()
          )))
        }
      }
    }
    sectors.push(GlobalSector {
      index,
      corners: face.map(|i| v[i]),
      neighbors,
      first_sector: index * per_global,
      sector_count: per_global,
    });
  }
  Ok(sectors)
}

/// Unnormalized-then-normalized lattice position of `p` on a triangle.
#[inline]
pub fn lattice_position(corners: &[DVec3; 3], p: LatticePoint, n: i32) -> DVec3 {
  let [wa, wb, wc] = lattice::weights(p, n);
  (corners[0] * wa + corners[1] * wb + corners[2] * wc).normalize()
}

// =============================================================================
// Sectors
// =============================================================================

/// Sectors touching each corner and the sector across each edge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SectorNeighbors {
  /// Sorted ids of every sector touching corner A, B, C, this one included.
  pub corner_sectors: [Vec<SectorId>; 3],
  /// Sector across edge AB, BC, CA.
  pub edge_neighbors: [SectorId; 3],
}

pub type SharedSlots = Vec<Option<Arc<Acre>>>;

/// A triangular piece of one icosahedron face and the acres it holds.
pub struct Sector {
  id: SectorId,
  global: usize,
  n: i32,
  points: Vec<GeoPoint>,
  lookup: HashMap<GeoPoint, usize>,
  layout: Arc<AcreLayout>,
  inner_acres: OnceLock<Vec<Arc<Acre>>>,
  shared_acres: RwLock<SharedSlots>,
  neighbors: OnceLock<SectorNeighbors>,
}

impl Sector {
  /// `points` are the canonical lattice points in [`lattice::point_index`]
  /// order.
  pub fn new(id: SectorId, global: usize, layout: Arc<AcreLayout>, points: Vec<GeoPoint>) -> BuildResult<Self> {
    let n = layout.divisions();
    if points.len() != lattice::point_count(n) {
      return Err(BuildError::geometry(format!(
        "sector {id} has {} lattice points, expected {}",
        points.len(),
        lattice::point_count(n)
      )));
    }
    let mut lookup = HashMap::with_capacity(points.len());
    for (i, &p) in points.iter().enumerate() {
      if lookup.insert(p, i).is_some() {
        return Err(BuildError::geometry(format!("sector {id} repeats lattice point {p}")));
      }
    }
    Ok(Self {
      id,
      global,
      n,
      points,
      lookup,
      shared_acres: RwLock::new(vec![None; lattice::shared_acre_count(n)]),
      layout,
      inner_acres: OnceLock::new(),
      neighbors: OnceLock::new(),
    })
  }

  #[inline]
  pub fn id(&self) -> SectorId {
    self.id
  }

  pub fn global_sector(&self) -> usize {
    self.global
  }

  pub fn divisions(&self) -> i32 {
    self.n
  }

  pub fn layout(&self) -> &AcreLayout {
    &self.layout
  }

  pub fn points(&self) -> &[GeoPoint] {
    &self.points
  }

  pub fn corner(&self, corner: Corner) -> GeoPoint {
    self.point(corner.point(self.n))
  }

  pub fn corners(&self) -> [GeoPoint; 3] {
    Corner::ALL.map(|c| self.corner(c))
  }

  /// Geo point of an in-range lattice point.
  #[inline]
  pub fn point(&self, p: LatticePoint) -> GeoPoint {
    self.points[lattice::point_index(p)]
  }

  /// Lattice coordinate of a canonical point, if it belongs to this sector.
  pub fn lattice_point(&self, p: GeoPoint) -> Option<LatticePoint> {
    self.lookup.get(&p).map(|&i| lattice::point_at(i))
  }

  pub fn contains(&self, p: GeoPoint) -> bool {
    self.lookup.contains_key(&p)
  }

  pub fn triangle_points(&self, index: usize) -> [GeoPoint; 3] {
    lattice::triangle_corners(index).map(|p| self.point(p))
  }

  /// Outer edges of the in-sector fan around `center`: for each triangle,
  /// the two corners other than the center.
  pub fn fan_edges(&self, center: LatticePoint) -> Vec<(GeoPoint, GeoPoint)> {
    lattice::fan(center, self.n)
      .into_iter()
      .map(|t| {
        let others: Vec<LatticePoint> = lattice::triangle_corners(t).into_iter().filter(|&p| p != center).collect();
        (self.point(others[0]), self.point(others[1]))
      })
      .collect()
  }

  pub fn set_inner_acres(&self, acres: Vec<Arc<Acre>>) -> BuildResult<()> {
    self
      .inner_acres
      .set(acres)
      .map_err(|_| BuildError::DuplicateRegistration(format!("inner acres of sector {}", self.id)))
  }

  /// Interior acres; empty until phase 1 ran.
  pub fn inner_acres(&self) -> &[Arc<Acre>] {
    self.inner_acres.get().map(Vec::as_slice).unwrap_or(&[])
  }

  pub fn set_neighbors(&self, neighbors: SectorNeighbors) -> BuildResult<()> {
    self
      .neighbors
      .set(neighbors)
      .map_err(|_| BuildError::DuplicateRegistration(format!("neighbors of sector {}", self.id)))
  }

  pub fn neighbors(&self) -> BuildResult<&SectorNeighbors> {
    self
      .neighbors
      .get()
      .ok_or_else(|| BuildError::geometry(format!("sector {} neighbors not discovered", self.id)))
  }

  pub fn read_shared(&self) -> RwLockReadGuard<'_, SharedSlots> {
    self.shared_acres.read().unwrap_or_else(PoisonError::into_inner)
  }

  fn write_shared(&self) -> RwLockWriteGuard<'_, SharedSlots> {
    self.shared_acres.write().unwrap_or_else(PoisonError::into_inner)
  }

  /// Snapshot of the filled shared slots.
  pub fn shared_acres(&self) -> Vec<Arc<Acre>> {
    self.read_shared().iter().flatten().cloned().collect()
  }

  /// Acre centered on lattice point `p` from the interior list or the
  /// given shared slots.
  pub fn acre_in(&self, shared: &SharedSlots, p: LatticePoint) -> Option<Arc<Acre>> {
    match self.layout.slot(p)? {
      AcreSlot::Interior(i) => self.inner_acres().get(i).cloned(),
      AcreSlot::Shared(slot) => shared.get(slot).cloned().flatten(),
    }
  }

  /// Acre centered on lattice point `p`, taking the slot lock briefly.
  pub fn acre_at(&self, p: LatticePoint) -> Option<Arc<Acre>> {
    let shared = self.read_shared();
    self.acre_in(&shared, p)
  }

  /// Every acre this sector holds: interior first, then shared by slot.
  pub fn acres(&self) -> Vec<Arc<Acre>> {
    let mut all = self.inner_acres().to_vec();
    all.extend(self.shared_acres());
    all
  }

  /// The sector edge that both points lie on, if any.
  pub fn common_edge(&self, p: LatticePoint, q: LatticePoint) -> Option<Edge> {
    let n = self.n;
    Edge::ALL.into_iter().find(|edge| {
      let on = |x: LatticePoint| match edge {
        Edge::AB => x.col == 0,
        Edge::BC => x.row == n,
        Edge::CA => x.row == x.col,
      };
      on(p) && on(q)
    })
  }
}

impl std::fmt::Debug for Sector {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Sector")
      .field("id", &self.id)
      .field("global", &self.global)
      .field("n", &self.n)
      .finish()
  }
}

/// Write guards over the shared slots of several sectors.
pub struct SharedSlotsGuard<'a> {
  guards: Vec<(SectorId, RwLockWriteGuard<'a, SharedSlots>)>,
}

impl SharedSlotsGuard<'_> {
  /// Store `acre` in `slot` of sector `id`. Occupied slots are an error.
  pub fn register(&mut self, id: SectorId, slot: usize, acre: &Arc<Acre>) -> BuildResult<()> {
    let (_, guard) = self
      .guards
      .iter_mut()
      .find(|(sid, _)| *sid == id)
      .ok_or_else(|| BuildError::geometry(format!("sector {id} is not locked")))?;
    let entry = guard
      .get_mut(slot)
      .ok_or_else(|| BuildError::geometry(format!("sector {id} has no shared slot {slot}")))?;
    if let Some(existing) = entry {
      return Err(BuildError::DuplicateRegistration(format!(
        "sector {id} slot {slot} already holds acre {}",
        existing.id()
      )));
    }
    *entry = Some(Arc::clone(acre));
    Ok(())
  }
}

/// Lock the shared slots of `sectors` for writing, in ascending id order.
pub fn lock_shared_in_order<'a>(sectors: &[&'a Sector]) -> SharedSlotsGuard<'a> {
  let mut ordered: Vec<&'a Sector> = sectors.to_vec();
  ordered.sort_by_key(|s| s.id);
  ordered.dedup_by_key(|s| s.id);
  SharedSlotsGuard {
    guards: ordered.into_iter().map(|s| (s.id, s.write_shared())).collect(),
  }
}

/// Read guards over several sectors' shared slots, in ascending id order.
pub fn read_shared_in_order<'a>(sectors: &[&'a Sector]) -> Vec<(SectorId, RwLockReadGuard<'a, SharedSlots>)> {
  let mut ordered: Vec<&'a Sector> = sectors.to_vec();
  ordered.sort_by_key(|s| s.id);
  ordered.dedup_by_key(|s| s.id);
  ordered.into_iter().map(|s| (s.id, s.read_shared())).collect()
}

// =============================================================================
// Sector set
// =============================================================================

/// Every sector of a globe with the corner map used to find neighbors.
pub struct SectorSet {
  sectors: Vec<Arc<Sector>>,
  corner_sectors: HashMap<GeoPoint, Vec<SectorId>>,
  icosahedron_vertices: HashSet<GeoPoint>,
  points: SpatialMap<GeoPoint>,
}

impl SectorSet {
  /// `sectors` must be ordered by id; `points` is the map their lattice
  /// points were deduplicated through.
  pub fn new(sectors: Vec<Arc<Sector>>, points: SpatialMap<GeoPoint>) -> BuildResult<Self> {
    if let Some((i, s)) = sectors.iter().enumerate().find(|(i, s)| s.id() != *i) {
      return Err(BuildError::geometry(format!("sector {} stored at index {i}", s.id())));
    }

    let mut corner_sectors: HashMap<GeoPoint, Vec<SectorId>> = HashMap::new();
    for sector in &sectors {
      for corner in sector.corners() {
        corner_sectors.entry(corner).or_default().push(sector.id());
      }
    }
    for ids in corner_sectors.values_mut() {
      ids.sort_unstable();
    }

    let icosahedron_vertices = icosahedron_vertices()
      .iter()
      .map(|v| {
        points
          .find_near(v.to_unit(), DEDUP_TOLERANCE)
          .ok_or_else(|| BuildError::geometry(format!("icosahedron vertex {v} is not a lattice point")))
      })
      .collect::<BuildResult<HashSet<_>>>()?;

    Ok(Self {
      sectors,
      corner_sectors,
      icosahedron_vertices,
      points,
    })
  }

  pub fn len(&self) -> usize {
    self.sectors.len()
  }

  pub fn is_empty(&self) -> bool {
    self.sectors.is_empty()
  }

  #[inline]
  pub fn sector(&self, id: SectorId) -> &Arc<Sector> {
    &self.sectors[id]
  }

  pub fn sectors(&self) -> &[Arc<Sector>] {
    &self.sectors
  }

  /// Sorted ids of the sectors with a corner at `corner`.
  pub fn sectors_at(&self, corner: GeoPoint) -> &[SectorId] {
    self.corner_sectors.get(&corner).map(Vec::as_slice).unwrap_or(&[])
  }

  /// Distinct sector corners.
  pub fn corner_count(&self) -> usize {
    self.corner_sectors.len()
  }

  pub fn is_icosahedron_vertex(&self, p: GeoPoint) -> bool {
    self.icosahedron_vertices.contains(&p)
  }

  /// Distinct lattice points over the whole globe.
  pub fn point_count(&self) -> usize {
    self.points.len()
  }

  /// Canonical point near `p`.
  pub fn canonical(&self, p: GeoPoint) -> Option<GeoPoint> {
    self.points.find_near(p.to_unit(), DEDUP_TOLERANCE)
  }
}

#[cfg(test)]
#[path = "sector_test.rs"]
mod sector_test;
