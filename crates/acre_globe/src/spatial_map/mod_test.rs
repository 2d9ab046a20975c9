use std::sync::atomic::{AtomicUsize, Ordering};

use glam::DVec3;

use super::*;

fn unit_map<T: Clone>() -> SpatialMap<T> {
  SpatialMap::new(DAabb3::enclosing_sphere(1.0))
}

#[test]
fn test_lookup_is_idempotent_before_and_after_insert() {
  let map = unit_map::<u32>();
  let p = DVec3::new(0.6, 0.0, 0.8);

  assert_eq!(map.find_near(p, 1e-4), None);
  assert_eq!(map.find_near(p, 1e-4), None);
  assert!(map.is_empty());

  let (value, inserted) = map.get_or_insert_with(p, 1e-4, || 7).unwrap();
  assert!(inserted);
  assert_eq!(value, 7);

  assert_eq!(map.find_near(p, 1e-4), Some(7));
  assert_eq!(map.find_near(p, 1e-4), Some(7));
  assert_eq!(map.len(), 1);
}

#[test]
fn test_get_or_insert_returns_existing_within_tolerance() {
  let map = unit_map::<u32>();
  let p = DVec3::new(0.0, 0.6, 0.8);
  map.get_or_insert_with(p, 1e-4, || 1).unwrap();

  let nudged = p + DVec3::splat(3e-5);
  let (value, inserted) = map.get_or_insert_with(nudged, 1e-4, || 2).unwrap();
  assert!(!inserted);
  assert_eq!(value, 1);

  let far = p + DVec3::new(5e-4, 0.0, 0.0);
  let (value, inserted) = map.get_or_insert_with(far, 1e-4, || 3).unwrap();
  assert!(inserted);
  assert_eq!(value, 3);
  assert_eq!(map.len(), 2);
}

#[test]
fn test_find_near_prefers_nearest() {
  let map = unit_map::<&'static str>();
  let p = DVec3::new(0.1, 0.2, 0.3);
  map.add("far", p + DVec3::new(8e-5, 0.0, 0.0)).unwrap();
  map.add("near", p + DVec3::new(1e-5, 0.0, 0.0)).unwrap();
  assert_eq!(map.find_near(p, 1e-4), Some("near"));
}

#[test]
fn test_intersect_visits_region_only() {
  let map = SpatialMap::with_split_threshold(DAabb3::enclosing_sphere(1.0), 4);
  for i in 0..100 {
    let t = i as f64 / 100.0;
    map.add(i, DVec3::new(t - 0.5, 0.0, 0.0)).unwrap();
  }
  assert!(map.depth() > 0, "map should have split");

  let region = DAabb3::new(DVec3::new(-0.005, -0.1, -0.1), DVec3::new(0.095, 0.1, 0.1));
  let mut seen = Vec::new();
  let hits = map.intersect(&region, |_, v| seen.push(*v));
  seen.sort_unstable();
  assert_eq!(hits, 10);
  assert_eq!(seen, (50..60).collect::<Vec<_>>());
}

#[test]
fn test_add_out_of_bounds_fails() {
  let map = unit_map::<u8>();
  let err = map.add(1, DVec3::new(2.0, 0.0, 0.0)).unwrap_err();
  assert!(matches!(err, BuildError::OutOfBounds(_)));
  assert!(map.is_empty());
}

#[test]
fn test_coincident_points_stop_at_max_depth() {
  let map = SpatialMap::with_split_threshold(DAabb3::enclosing_sphere(1.0), 2);
  for i in 0..10 {
    map.add(i, DVec3::new(0.25, 0.25, 0.25)).unwrap();
  }
  assert_eq!(map.len(), 10);
  assert!(map.depth() <= MAX_DEPTH);
  assert_eq!(map.entries().len(), 10);
}

#[test]
fn test_concurrent_registration_yields_single_entry() {
  let map = unit_map::<usize>();
  let makes = AtomicUsize::new(0);
  let points: Vec<DVec3> = (0..64)
    .map(|i| {
      let a = i as f64 * 0.09;
      DVec3::new(a.cos(), a.sin(), 0.0) * 0.9
    })
    .collect();

  std::thread::scope(|scope| {
    for thread in 0..8 {
      let map = &map;
      let makes = &makes;
      let points = &points;
      scope.spawn(move || {
        for (i, p) in points.iter().enumerate() {
          // Each thread sees a slightly different rounding of the same point.
          let jitter = DVec3::splat(thread as f64 * 1e-7);
          map
            .get_or_insert_with(*p + jitter, 1e-4, || {
              makes.fetch_add(1, Ordering::Relaxed);
              i
            })
            .unwrap();
        }
      });
    }
  });

  assert_eq!(map.len(), points.len());
  assert_eq!(makes.load(Ordering::Relaxed), points.len());
  for (i, p) in points.iter().enumerate() {
    assert_eq!(map.find_near(*p, 1e-4), Some(i));
  }
}
