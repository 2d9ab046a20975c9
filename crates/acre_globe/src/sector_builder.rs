//! Sector generation: subdividing the icosahedron faces and merging the
//! lattice points every sector computed on its own into one canonical set.

use std::sync::Arc;

use glam::DVec3;
use rayon::prelude::*;

use crate::constants::DEDUP_TOLERANCE;
use crate::error::{BuildError, BuildResult};
use crate::geo_point::GeoPoint;
use crate::lattice::{self, AcreLayout};
use crate::sector::{lattice_position, GlobalSector, Sector, SectorId, SectorSet};
use crate::spatial_map::{DAabb3, SpatialMap};

/// Lattice points of one sector before deduplication, in
/// [`lattice::point_index`] order.
#[derive(Clone, Debug)]
pub struct RawSector {
  pub id: SectorId,
  pub global: usize,
  pub points: Vec<DVec3>,
}

/// Compute the lattice of child `local` of `global`.
pub fn raw_sector(global: &GlobalSector, local: usize, g: u32, n: i32) -> RawSector {
  let corners = global.child_corners(local, g).map(|c| c.to_unit());
  let points = (0..lattice::point_count(n))
    .map(|i| lattice_position(&corners, lattice::point_at(i), n))
    .collect();
  RawSector {
    id: global.first_sector + local,
    global: global.index,
    points,
  }
}

/// Merge raw lattices, ordered by sector id, into canonical sectors: points
/// closer than [`DEDUP_TOLERANCE`] become one [`GeoPoint`], whichever sector
/// registered it first.
#[tracing::instrument(skip_all, fields(sectors = raw.len()))]
pub fn combine_points(raw: &[RawSector], n: i32) -> BuildResult<SectorSet> {
  let map = SpatialMap::new(DAabb3::enclosing_sphere(1.0));
  let layout = Arc::new(AcreLayout::new(n));

  let sectors = raw
    .par_iter()
    .map(|r| {
      let points = r
        .points
        .iter()
        .map(|&v| {
          map
            .get_or_insert_with(v, DEDUP_TOLERANCE, || GeoPoint::from_vector(v))
            .map(|(p, _)| p)
        })
        .collect::<BuildResult<Vec<_>>>()?;
      Sector::new(r.id, r.global, Arc::clone(&layout), points).map(Arc::new)
    })
    .collect::<BuildResult<Vec<_>>>()?;

  SectorSet::new(sectors, map)
}

/// Generate and combine every sector of a globe in one go.
pub fn build_sector_set(globals: &[GlobalSector], g: u32, n: u32) -> BuildResult<SectorSet> {
  let n = i32::try_from(n).map_err(|_| BuildError::Config(format!("sector divisions {n} out of range")))?;
  let raw: Vec<RawSector> = globals
    .par_iter()
    .flat_map_iter(|global| (0..global.sector_count).map(move |local| raw_sector(global, local, g, n)))
    .collect();
  combine_points(&raw, n)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::geo_spec::GeoSpec;
  use crate::sector::global_sectors;

  #[test]
  fn test_combined_points_match_lattice_count() {
    for (g, n) in [(1u32, 3u32), (2, 3), (1, 6)] {
      let globals = global_sectors(g).unwrap();
      let set = build_sector_set(&globals, g, n).unwrap();
      let spec = GeoSpec::new(g, n);
      assert_eq!(set.len() as u64, spec.sectors());
      assert_eq!(set.point_count() as u64, spec.lattice_points(), "g={g} n={n}");
      // Sector corners: vertices of the g-subdivided icosahedron.
      assert_eq!(set.corner_count() as u64, 10 * (g * g) as u64 + 2);
    }
  }

  #[test]
  fn test_shared_edges_use_the_same_points() {
    let globals = global_sectors(2).unwrap();
    let set = build_sector_set(&globals, 2, 6).unwrap();
    for sector in set.sectors() {
      for corner in sector.corners() {
        let touching = set.sectors_at(corner);
        assert!(touching.len() == 5 || touching.len() == 6);
        assert_eq!(touching.len() == 5, set.is_icosahedron_vertex(corner));
        assert!(touching.iter().all(|&id| set.sector(id).contains(corner)));
      }
    }
  }

  #[test]
  fn test_raw_sector_ids() {
    let globals = global_sectors(3).unwrap();
    let raw = raw_sector(&globals[4], 7, 3, 6);
    assert_eq!(raw.id, 4 * 9 + 7);
    assert_eq!(raw.global, 4);
    assert_eq!(raw.points.len(), lattice::point_count(6));
    assert!(raw.points.iter().all(|p| (p.length() - 1.0).abs() < 1e-12));
  }
}
