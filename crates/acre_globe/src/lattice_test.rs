use proptest::prelude::*;

use super::*;

fn divisions() -> impl Strategy<Value = i32> {
  (1..=12i32).prop_map(|k| 3 * k)
}

#[test]
fn test_small_sector_counts() {
  assert_eq!(point_count(3), 10);
  assert_eq!(triangle_count(3), 9);
  assert_eq!(interior_acre_count(3), 1);
  assert_eq!(interior_acre_count(6), 4);
  assert_eq!(interior_acre_count(9), 10);
  assert_eq!(shared_acre_count(9), 9);
}

#[test]
fn test_strips_tile_triangle_range() {
  let n = 9;
  let mut next = 0;
  for r in 1..=n {
    assert_eq!(strip_start(r), next);
    next += strip_len(r);
  }
  assert_eq!(next, triangle_count(n));
}

#[test]
fn test_first_triangles() {
  let p = LatticePoint::new;
  assert_eq!(triangle_corners(0), [p(1, 0), p(1, 1), p(0, 0)]);
  assert_eq!(triangle_corners(1), [p(2, 0), p(2, 1), p(1, 0)]);
  assert_eq!(triangle_corners(2), [p(1, 0), p(2, 1), p(1, 1)]);
  assert_eq!(triangle_corners(3), [p(2, 1), p(2, 2), p(1, 1)]);
}

#[test]
fn test_corner_triangles_touch_corners() {
  for n in [3, 6, 9] {
    for corner in Corner::ALL {
      let corners = triangle_corners(corner_triangle(corner, n));
      assert!(corners.contains(&corner.point(n)), "{corner:?} n={n}");
      assert_eq!(fan(corner.point(n), n).as_slice(), &[corner_triangle(corner, n)]);
    }
  }
}

#[test]
fn test_edge_points_and_membership() {
  let n = 6;
  assert_eq!(edge_point(Edge::AB, 0, n), Corner::A.point(n));
  assert_eq!(edge_point(Edge::AB, n, n), Corner::B.point(n));
  assert_eq!(edge_point(Edge::BC, n, n), Corner::C.point(n));
  assert_eq!(edge_point(Edge::CA, n, n), Corner::A.point(n));
  assert_eq!(edge_of(LatticePoint::new(3, 0), n), Some((Edge::AB, 3)));
  assert_eq!(edge_of(LatticePoint::new(6, 2), n), Some((Edge::BC, 2)));
  assert_eq!(edge_of(LatticePoint::new(4, 4), n), Some((Edge::CA, 2)));
  assert_eq!(edge_of(LatticePoint::new(4, 2), n), None);
}

#[test]
fn test_apexes_of_an_edge() {
  let p = LatticePoint::new(2, 1);
  let q = LatticePoint::new(3, 1);
  let [left, right] = apexes(p, q).unwrap();
  assert_eq!(left, LatticePoint::new(3, 2));
  assert_eq!(right, LatticePoint::new(2, 0));
  assert!(triangle_index([p, q, left]).is_some());
  assert!(triangle_index([p, q, right]).is_some());
  assert_eq!(apexes(p, LatticePoint::new(4, 1)), None);
}

#[test]
fn test_layout_shared_slots() {
  let n = 9;
  let layout = AcreLayout::new(n);
  assert_eq!(layout.interior_centers().len(), interior_acre_count(n));
  assert_eq!(layout.shared_centers().len(), shared_acre_count(n));

  assert_eq!(layout.slot(Corner::B.point(n)), Some(AcreSlot::Shared(1)));
  assert_eq!(layout.slot(LatticePoint::new(3, 0)), Some(AcreSlot::Shared(3)));
  assert_eq!(layout.slot(LatticePoint::new(6, 0)), Some(AcreSlot::Shared(4)));
  assert_eq!(layout.slot(LatticePoint::new(9, 3)), Some(AcreSlot::Shared(5)));
  assert_eq!(layout.slot(LatticePoint::new(6, 6)), Some(AcreSlot::Shared(7)));
  assert_eq!(layout.slot(LatticePoint::new(2, 1)), Some(AcreSlot::Interior(0)));
  assert_eq!(layout.slot(LatticePoint::new(2, 0)), None);

  assert_eq!(layout.shared_slot(2), SharedSlot::Corner(Corner::C));
  assert_eq!(layout.shared_slot(6), SharedSlot::Edge(Edge::BC, 6));
  assert_eq!(layout.shared_slot(8), SharedSlot::Edge(Edge::CA, 6));
}

proptest! {
  #[test]
  fn prop_point_index_roundtrip(n in divisions(), seed in any::<u32>()) {
    let index = seed as usize % point_count(n);
    let p = point_at(index);
    prop_assert!(in_range(p, n));
    prop_assert_eq!(point_index(p), index);
  }

  #[test]
  fn prop_triangle_index_roundtrip(n in divisions(), seed in any::<u32>(), rotate in 0usize..3) {
    let index = seed as usize % triangle_count(n);
    let mut corners = triangle_corners(index);
    corners.rotate_left(rotate);
    prop_assert!(corners.iter().all(|p| in_range(*p, n)));
    prop_assert_eq!(triangle_index(corners), Some(index));
  }

  /// Every triangle has exactly one acre-center corner.
  #[test]
  fn prop_one_center_per_triangle(n in divisions(), seed in any::<u32>()) {
    let index = seed as usize % triangle_count(n);
    let centers = triangle_corners(index).iter().filter(|p| is_center(**p)).count();
    prop_assert_eq!(centers, 1);
    prop_assert!(fan(triangle_center(index), n).contains(&index));
  }

  /// Fans partition the triangles: six around interior centers, three on
  /// edges, one at corners.
  #[test]
  fn prop_fans_partition_triangles(n in divisions()) {
    let layout = AcreLayout::new(n);
    let mut owner = vec![0u8; triangle_count(n)];
    for index in 0..point_count(n) {
      let p = point_at(index);
      if !is_center(p) {
        continue;
      }
      let fan = fan(p, n);
      let expected = match (layout.slot(p), edge_of(p, n)) {
        (Some(AcreSlot::Interior(_)), _) => 6,
        (_, Some((_, 0))) => 1,
        _ => 3,
      };
      prop_assert_eq!(fan.len(), expected, "center {:?}", p);
      for t in fan {
        owner[t] += 1;
      }
    }
    prop_assert!(owner.iter().all(|&c| c == 1));
  }

  #[test]
  fn prop_edge_triangles_touch_edge(n in divisions()) {
    for edge in Edge::ALL {
      let triangles = edge_triangles(edge, n);
      prop_assert_eq!(triangles.len(), n as usize);
      for (i, t) in triangles.into_iter().enumerate() {
        let on_edge: Vec<_> = triangle_corners(t)
          .into_iter()
          .filter_map(|p| edge_of(p, n).filter(|(e, _)| *e == edge).map(|(_, s)| s))
          .collect();
        // Corner points report only one edge; count the far end by position.
        let far_end = triangle_corners(t).contains(&edge_point(edge, n, n));
        prop_assert_eq!(on_edge.len() + far_end as usize, 2, "edge {:?} triangle {}", edge, t);
        prop_assert!(on_edge.contains(&(i as i32)));
      }
    }
  }

  #[test]
  fn prop_layout_counts(n in divisions()) {
    let layout = AcreLayout::new(n);
    prop_assert_eq!(layout.interior_centers().len(), interior_acre_count(n));
    prop_assert_eq!(layout.shared_centers().len(), shared_acre_count(n));
    for (slot, p) in layout.shared_centers().iter().enumerate() {
      prop_assert_eq!(layout.slot(*p), Some(AcreSlot::Shared(slot)));
      let expected = match layout.shared_slot(slot) {
        SharedSlot::Corner(c) => c.point(n),
        SharedSlot::Edge(e, t) => edge_point(e, t, n),
      };
      prop_assert_eq!(*p, expected);
    }
  }

  /// Both apexes of any interior lattice edge close a real triangle.
  #[test]
  fn prop_apexes_close_triangles(n in divisions(), seed in any::<u32>(), k in 0usize..6) {
    let p = point_at(seed as usize % point_count(n));
    let q = p.offset(DIRECTIONS[k]);
    let [left, right] = apexes(p, q).unwrap();
    for apex in [left, right] {
      if in_range(q, n) && in_range(apex, n) {
        prop_assert!(triangle_index([p, q, apex]).is_some());
      }
    }
  }
}
