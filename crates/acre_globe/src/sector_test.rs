use std::collections::HashSet;

use super::*;
use crate::acre::{AcreFlavor, AcreId};

fn test_sector(id: SectorId, n: i32) -> Sector {
  let face = &global_sectors(1).unwrap()[0];
  let corners = face.corners.map(|c| c.to_unit());
  let points = (0..lattice::point_count(n))
    .map(|i| GeoPoint::from_vector(lattice_position(&corners, lattice::point_at(i), n)))
    .collect();
  Sector::new(id, 0, Arc::new(AcreLayout::new(n)), points).unwrap()
}

#[test]
fn test_icosahedron_vertices_are_equidistant() {
  let v = icosahedron_vertices();
  let distinct: HashSet<_> = v.iter().copied().collect();
  assert_eq!(distinct.len(), 12);

  // Every vertex has exactly five nearest neighbors at the edge length.
  let edge = v[0].to_unit().distance(v[1].to_unit());
  for a in &v {
    let near = v
      .iter()
      .filter(|b| ((a.to_unit().distance(b.to_unit())) - edge).abs() < 1e-6)
      .count();
    assert_eq!(near, 5, "{a:?}");
  }
}

#[test]
fn test_global_sectors_are_ccw_with_reciprocal_neighbors() {
  let sectors = global_sectors(1).unwrap();
  assert_eq!(sectors.len(), GLOBAL_SECTORS);

  for s in &sectors {
    let [a, b, c] = s.corners.map(|p| p.to_unit());
    assert!(a.dot((b - a).cross(c - a)) > 0.0, "face {} is clockwise", s.index);

    for (e, &j) in s.neighbors.iter().enumerate() {
      assert_ne!(j, s.index);
      assert!(sectors[j].neighbors.contains(&s.index), "{} -> {j} not reciprocal", s.index);
      // The shared edge runs the other way in the neighbor.
      let (from, to) = Edge::ALL[e].corners();
      let (p, q) = (s.corners[from.index()], s.corners[to.index()]);
      assert!(sectors[j].corners.contains(&p) && sectors[j].corners.contains(&q));
    }
  }
}

#[test]
fn test_global_sector_children() {
  let g = 3;
  let sectors = global_sectors(g).unwrap();
  assert_eq!(sectors[2].sector_ids(), 18..27);

  let face = &sectors[5];
  let children: Vec<_> = (0..9).map(|i| face.child_corners(i, g)).collect();
  // The corner children share the face's corners exactly.
  assert!(children[lattice::corner_triangle(Corner::A, g as i32)].contains(&face.corners[0]));
  assert!(children[lattice::corner_triangle(Corner::C, g as i32)].contains(&face.corners[2]));
  for child in &children {
    let [a, b, c] = child.map(|p| p.to_unit());
    assert!(a.dot((b - a).cross(c - a)) > 0.0);
  }
}

#[test]
fn test_sector_lookup_and_fans() {
  let n = 6;
  let sector = test_sector(0, n);
  assert_eq!(sector.points().len(), lattice::point_count(n));

  for i in 0..lattice::point_count(n) {
    let p = lattice::point_at(i);
    assert_eq!(sector.lattice_point(sector.point(p)), Some(p));
  }
  assert_eq!(sector.lattice_point(GeoPoint::SOUTH_POLE), None);

  let center = LatticePoint::new(2, 1);
  let edges = sector.fan_edges(center);
  assert_eq!(edges.len(), 6);
  let acre = Acre::from_fan(AcreId(1), AcreFlavor::Inner, sector.point(center), &edges).unwrap();
  assert_eq!(acre.sides(), 6);

  assert_eq!(sector.fan_edges(Corner::A.point(n)).len(), 1);
  assert_eq!(sector.fan_edges(LatticePoint::new(3, 0)).len(), 3);
}

#[test]
fn test_common_edge() {
  let sector = test_sector(0, 6);
  let p = LatticePoint::new;
  assert_eq!(sector.common_edge(p(1, 0), p(2, 0)), Some(Edge::AB));
  assert_eq!(sector.common_edge(p(6, 1), p(6, 2)), Some(Edge::BC));
  assert_eq!(sector.common_edge(p(4, 4), p(5, 5)), Some(Edge::CA));
  assert_eq!(sector.common_edge(p(2, 1), p(3, 1)), None);
}

#[test]
fn test_shared_slots_register_once_in_id_order() {
  let low = test_sector(3, 3);
  let high = test_sector(8, 3);
  let corner = low.point(Corner::A.point(3));
  let edges = low.fan_edges(LatticePoint::new(2, 1));
  let acre = Arc::new(Acre::from_fan(AcreId(5), AcreFlavor::Inner, low.point(LatticePoint::new(2, 1)), &edges).unwrap());

  {
    let mut guard = lock_shared_in_order(&[&high, &low, &high]);
    guard.register(3, 0, &acre).unwrap();
    guard.register(8, 2, &acre).unwrap();
    assert!(matches!(
      guard.register(3, 0, &acre),
      Err(BuildError::DuplicateRegistration(_))
    ));
    assert!(guard.register(4, 0, &acre).is_err());
  }

  assert_eq!(low.acre_at(LatticePoint::new(0, 0)).map(|a| a.id()), Some(AcreId(5)));
  assert_eq!(high.acre_at(LatticePoint::new(3, 3)).map(|a| a.id()), Some(AcreId(5)));
  assert!(high.acre_at(LatticePoint::new(3, 0)).is_none());
  assert_eq!(low.shared_acres().len(), 1);
  assert!(low.contains(corner));

  let reads = read_shared_in_order(&[&high, &low]);
  let ids: Vec<_> = reads.iter().map(|(id, _)| *id).collect();
  assert_eq!(ids, vec![3, 8]);
}

#[test]
fn test_inner_acres_set_once() {
  let sector = test_sector(0, 3);
  assert!(sector.inner_acres().is_empty());
  sector.set_inner_acres(Vec::new()).unwrap();
  assert!(sector.set_inner_acres(Vec::new()).is_err());
  assert!(sector.neighbors().is_err());
}
