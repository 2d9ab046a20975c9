//! Turning sectors into linked acres.
//!
//! Per sector the work runs in four phases, each a work unit chained after
//! the previous one:
//!
//! 1. inner acres, built from in-sector fans and linked to each other
//! 2. neighbor discovery through the corner map
//! 3. dual-sector acres along edges, built by the lower-id sector
//! 4. multi-sector acres on corners, built by the lowest-id sector there
//!
//! Once every sector finished phase 4, [`link_sector`] fills the remaining
//! neighbor slots and [`pack_acres`] numbers the acres densely.

use std::collections::HashMap;
use std::sync::Arc;

use rayon::prelude::*;
use smallvec::SmallVec;
use tracing::trace;

use crate::acre::{link_acres, Acre, AcreFlavor, AcreId};
use crate::constants::MAX_ACRE_SIDES;
use crate::error::{BuildError, BuildResult};
use crate::geo_point::GeoPoint;
use crate::lattice::{self, AcreSlot, Corner, Edge, LatticePoint};
use crate::sector::{lock_shared_in_order, read_shared_in_order, Sector, SectorId, SectorNeighbors, SectorSet};
use crate::sequence::AcreSequence;

/// Pack id written for a seam that never got a neighbor.
pub const UNLINKED: u32 = u32::MAX;

/// Phase 1: build the acres fully inside `sector` and link the pairs whose
/// common seam is inside too.
pub fn build_inner_acres(sector: &Sector, ids: &AcreSequence) -> BuildResult<usize> {
  let layout = sector.layout();
  let acres = layout
    .interior_centers()
    .iter()
    .map(|&c| {
      Acre::from_fan(ids.next_id(), AcreFlavor::Inner, sector.point(c), &sector.fan_edges(c)).map(Arc::new)
    })
    .collect::<BuildResult<Vec<_>>>()?;

  let n = sector.divisions();
  for (i, &c) in layout.interior_centers().iter().enumerate() {
    for t in lattice::fan(c, n) {
      let [p, q] = fan_rim(t, c);
      let apex = LatticePoint::new(p.row + q.row - c.row, p.col + q.col - c.col);
      if let Some(AcreSlot::Interior(j)) = layout.slot(apex) {
        if j > i {
          link_acres(&acres[i], &acres[j], sector.point(p), sector.point(q))?;
        }
      }
    }
  }

  let count = acres.len();
  sector.set_inner_acres(acres)?;
  Ok(count)
}

/// Phase 2: find the sectors around each corner and across each edge.
pub fn discover_neighbors(set: &SectorSet, sector: &Sector) -> BuildResult<()> {
  let corner_sectors = Corner::ALL.map(|c| set.sectors_at(sector.corner(c)).to_vec());

  for corner in Corner::ALL {
    let at = sector.corner(corner);
    let touching = corner_sectors[corner.index()].len();
    let expected = if set.is_icosahedron_vertex(at) { 5 } else { 6 };
    if touching != expected {
      return Err(BuildError::geometry(format!(
        "sector {} corner {corner:?} at {at} touches {touching} sectors, expected {expected}",
        sector.id()
      )));
    }
  }

  let mut edge_neighbors = [0; 3];
  for edge in Edge::ALL {
    let (from, to) = edge.corners();
    let across: SmallVec<[SectorId; 2]> = corner_sectors[from.index()]
      .iter()
      .filter(|&&id| id != sector.id() && corner_sectors[to.index()].contains(&id))
      .copied()
      .collect();
    match across.as_slice() {
      &[id] => edge_neighbors[edge.index()] = id,
      _ => {
        return Err(BuildError::geometry(format!(
          "sector {} edge {edge:?} has {} neighbors",
          sector.id(),
          across.len()
        )))
      }
    }
  }

  sector.set_neighbors(SectorNeighbors {
    corner_sectors,
    edge_neighbors,
  })
}

/// Phase 3: build the acres centered on the edges this sector owns, which
/// are the edges whose neighbor has a higher id.
pub fn build_edge_acres(set: &SectorSet, sector: &Sector, ids: &AcreSequence) -> BuildResult<usize> {
  let neighbors = sector.neighbors()?;
  let n = sector.divisions();
  let mut built = 0;

  for edge in Edge::ALL {
    let other_id = neighbors.edge_neighbors[edge.index()];
    if other_id < sector.id() {
      continue;
    }
    let other = set.sector(other_id);

    let mut pending = Vec::with_capacity((n / 3 - 1).max(0) as usize);
    for t in (3..n).step_by(3) {
      let p = lattice::edge_point(edge, t, n);
      let center = sector.point(p);
      let p_other = locate(other, center)?;
      let other_slot = match other.layout().slot(p_other) {
        Some(AcreSlot::Shared(slot)) if slot >= 3 => slot,
        slot => {
          return Err(BuildError::geometry(format!(
            "edge acre at {center} sits in slot {slot:?} of sector {other_id}"
          )))
        }
      };

      let mut edges = sector.fan_edges(p);
      edges.extend(other.fan_edges(p_other));
      let acre = Arc::new(Acre::from_fan(ids.next_id(), AcreFlavor::DualSector, center, &edges)?);
      pending.push((lattice::edge_slot(edge, t, n), other_slot, acre));
    }
    if pending.is_empty() {
      continue;
    }

    let mut guard = lock_shared_in_order(&[sector, other]);
    for (slot, other_slot, acre) in &pending {
      guard.register(sector.id(), *slot, acre)?;
      guard.register(other_id, *other_slot, acre)?;
    }
    built += pending.len();
  }
  Ok(built)
}

/// Phase 4: build the acres centered on the corners this sector owns, which
/// are the corners where it has the lowest id.
pub fn build_corner_acres(set: &SectorSet, sector: &Sector, ids: &AcreSequence) -> BuildResult<usize> {
  let neighbors = sector.neighbors()?;
  let mut built = 0;

  for corner in Corner::ALL {
    let touching = &neighbors.corner_sectors[corner.index()];
    if touching.first() != Some(&sector.id()) {
      continue;
    }
    let center = sector.corner(corner);

    let mut edges = Vec::with_capacity(touching.len());
    let mut slots = Vec::with_capacity(touching.len());
    for &id in touching {
      let s = set.sector(id);
      let p = locate(s, center)?;
      match s.layout().slot(p) {
        Some(AcreSlot::Shared(slot)) if slot < 3 => slots.push((id, slot)),
        slot => {
          return Err(BuildError::geometry(format!(
            "corner acre at {center} sits in slot {slot:?} of sector {id}"
          )))
        }
      }
      edges.extend(s.fan_edges(p));
    }
    let acre = Arc::new(Acre::from_fan(ids.next_id(), AcreFlavor::MultiSector, center, &edges)?);

    let sectors: Vec<&Sector> = touching.iter().map(|&id| set.sector(id).as_ref()).collect();
    let mut guard = lock_shared_in_order(&sectors);
    for (id, slot) in slots {
      guard.register(id, slot, &acre)?;
    }
    built += 1;
  }
  Ok(built)
}

/// Link every still-open seam whose fan triangle lies in `sector`.
///
/// The acre across seam `p–q` of the triangle `(c, p, q)` is centered on
/// `p + q − c`. When that falls outside the sector the seam lies on a
/// sector edge and the apex is looked up in the neighbor.
pub fn link_sector(set: &SectorSet, sector: &Sector) -> BuildResult<usize> {
  let neighbors = sector.neighbors()?;
  let n = sector.divisions();
  let mut linked = 0;

  for acre in sector.acres() {
    let c = locate(sector, acre.center())?;
    for k in 0..acre.sides() {
      if !acre.neighbor(k).is_none() {
        continue;
      }
      let (pg, qg) = acre.seam(k);
      let (Some(p), Some(q)) = (sector.lattice_point(pg), sector.lattice_point(qg)) else {
        continue;
      };
      if lattice::triangle_index([c, p, q]).is_none() {
        continue;
      }

      let apex = LatticePoint::new(p.row + q.row - c.row, p.col + q.col - c.col);
      let across = if lattice::in_range(apex, n) {
        sector.acre_at(apex)
      } else {
        let edge = sector.common_edge(p, q).ok_or_else(|| {
          BuildError::geometry(format!("seam {pg}–{qg} of acre {} leaves sector {}", acre.id(), sector.id()))
        })?;
        acre_across_edge(set.sector(neighbors.edge_neighbors[edge.index()]), sector, pg, qg)?
      };
      let across = across.ok_or_else(|| {
        BuildError::geometry(format!("no acre across seam {pg}–{qg} of acre {}", acre.id()))
      })?;

      link_acres(&acre, &across, pg, qg)?;
      linked += 1;
    }
  }
  trace!(sector = sector.id(), linked, "linked seams");
  Ok(linked)
}

/// Every acre of a globe in pack order, with the id → pack id map.
#[derive(Debug, Default)]
pub struct AcreGraph {
  pub acres: Vec<Arc<Acre>>,
  pub by_id: HashMap<AcreId, u32>,
}

impl AcreGraph {
  pub fn len(&self) -> usize {
    self.acres.len()
  }

  pub fn is_empty(&self) -> bool {
    self.acres.is_empty()
  }

  pub fn get(&self, pack_id: u32) -> Option<&Arc<Acre>> {
    self.acres.get(pack_id as usize)
  }

  pub fn pack_id_of(&self, id: AcreId) -> Option<u32> {
    self.by_id.get(&id).copied()
  }
}

/// Collect every acre once, sort by id and assign pack ids and pack
/// neighbors. Unlinked seams get [`UNLINKED`] and are left to validation.
#[tracing::instrument(skip_all)]
pub fn pack_acres(set: &SectorSet) -> BuildResult<AcreGraph> {
  let mut acres: Vec<Arc<Acre>> = set.sectors().iter().flat_map(|s| s.acres()).collect();
  acres.sort_unstable_by_key(|a| a.id());
  acres.dedup_by_key(|a| a.id());

  let mut by_id = HashMap::with_capacity(acres.len());
  for (pack_id, acre) in acres.iter().enumerate() {
    let pack_id = u32::try_from(pack_id)
      .map_err(|_| BuildError::geometry(format!("{} acres do not fit a pack id", acres.len())))?;
    acre.set_pack_id(pack_id)?;
    by_id.insert(acre.id(), pack_id);
  }

  acres.par_iter().try_for_each(|acre| {
    let packed: SmallVec<[u32; MAX_ACRE_SIDES]> = acre
      .neighbor_ids()
      .iter()
      .map(|id| by_id.get(id).copied().unwrap_or(UNLINKED))
      .collect();
    acre.set_pack_neighbors(packed)
  })?;

  Ok(AcreGraph { acres, by_id })
}

/// The two corners of fan triangle `t` other than its center `c`.
fn fan_rim(t: usize, c: LatticePoint) -> [LatticePoint; 2] {
  let [a, b, d] = lattice::triangle_corners(t);
  if a == c {
    [b, d]
  } else if b == c {
    [a, d]
  } else {
    [a, b]
  }
}

fn locate(sector: &Sector, p: GeoPoint) -> BuildResult<LatticePoint> {
  sector
    .lattice_point(p)
    .ok_or_else(|| BuildError::geometry(format!("point {p} is not in sector {}", sector.id())))
}

/// Acre on the far side of edge seam `p–q`, centered on the apex that is
/// in range in `other`. Both sectors' slots are read in id order.
fn acre_across_edge(other: &Sector, sector: &Sector, p: GeoPoint, q: GeoPoint) -> BuildResult<Option<Arc<Acre>>> {
  let (p2, q2) = (locate(other, p)?, locate(other, q)?);
  let apex = lattice::apexes(p2, q2)
    .and_then(|apexes| apexes.into_iter().find(|&a| lattice::in_range(a, other.divisions())))
    .ok_or_else(|| BuildError::geometry(format!("seam {p}–{q} has no apex in sector {}", other.id())))?;

  let reads = read_shared_in_order(&[sector, other]);
  let shared = reads
    .iter()
    .find(|(id, _)| *id == other.id())
    .map(|(_, guard)| &**guard)
    .ok_or_else(|| BuildError::geometry(format!("sector {} slots not readable", other.id())))?;
  Ok(other.acre_in(shared, apex))
}

#[cfg(test)]
#[path = "acre_builder_test.rs"]
mod acre_builder_test;
