use std::collections::HashSet;

use super::*;
use crate::acre::{AcreFlavor, AcreId};
use crate::constants::{VERTEX_COUNTER_LIMIT, VERTEX_INDEX_MASK};

fn hexagon() -> Acre {
  let center = GeoPoint::from_degrees(5.0, 5.0);
  let ring: Vec<_> = (0..6)
    .map(|i| {
      let a = i as f64 * std::f64::consts::TAU / 6.0;
      GeoPoint::from_degrees(5.0 + a.sin(), 5.0 + a.cos())
    })
    .collect();
  let edges: Vec<_> = (0..6).map(|i| (ring[i], ring[(i + 1) % 6])).collect();
  Acre::from_fan(AcreId(1), AcreFlavor::Inner, center, &edges).unwrap()
}

fn frozen_sequences(acre: &Acre) -> (PointSequence, PointSequence) {
  let seams = PointSequence::new("seams");
  let corners = PointSequence::new("corners");
  for k in 0..acre.sides() {
    seams.touch(seam_midpoint(acre, k)).unwrap();
    corners.touch(acre.points()[k]).unwrap();
  }
  seams.freeze(0).unwrap();
  corners.freeze(0).unwrap();
  (seams, corners)
}

#[test]
fn test_ranges_are_block_aligned_and_disjoint() {
  let layout = VertexIdLayout::new(&GeoSpec::new(2, 6), 64).unwrap();
  let ranges = [
    VertexRange::Corners,
    VertexRange::AcreSeams,
    VertexRange::ZoneSeams,
    VertexRange::Zones,
  ]
  .map(|r| layout.range(r));

  assert_eq!(ranges[0].start, VERTEX_BLOCK_SIZE, "block 0 is reserved");
  for r in &ranges {
    assert_eq!(r.start & VERTEX_INDEX_MASK, 0);
  }
  for pair in ranges.windows(2) {
    assert!(pair[0].end <= pair[1].start);
  }
  assert_eq!(ranges[3].end, layout.end());
  assert_eq!(layout.classify(0), None);
  assert_eq!(layout.classify(VERTEX_BLOCK_SIZE), Some(VertexRange::Corners));
  assert_eq!(layout.classify(layout.end()), None);
}

#[test]
fn test_range_sizes() {
  let spec = GeoSpec::new(1, 3);
  let layout = VertexIdLayout::new(&spec, 4).unwrap();
  assert_eq!(layout.seam_len(), 3);
  assert_eq!(layout.zone_len(), 3);
  let len = |r: VertexRange| layout.range(r).end - layout.range(r).start;
  assert_eq!(len(VertexRange::Corners), 60);
  assert_eq!(len(VertexRange::AcreSeams), 90 * 2 * 4);
  assert_eq!(len(VertexRange::ZoneSeams), 32 * 31 * 4);
  assert_eq!(len(VertexRange::Zones), 32 * 24 * 4);
}

#[test]
fn test_oversized_globes_are_rejected() {
  // Zone range arithmetic alone passes u64.
  let err = VertexIdLayout::new(&GeoSpec::new(4096, 4095), 64).unwrap_err();
  assert!(matches!(err, BuildError::Config(_)), "{err}");

  // Fits u64 but ends past the counter limit.
  let err = VertexIdLayout::new(&GeoSpec::new(600, 900), 64).unwrap_err();
  assert!(matches!(err, BuildError::Config(_)), "{err}");
  let layout = VertexIdLayout::new(&GeoSpec::new(600, 900), 2).unwrap();
  assert!(layout.end() - 1 <= VERTEX_COUNTER_LIMIT);

  assert!(VertexIdLayout::new(&GeoSpec::new(1, 3), 1).is_err());
}

#[test]
fn test_steps_never_straddle_blocks() {
  let layout = VertexIdLayout::new(&GeoSpec::new(1, 9), 64).unwrap();
  for pack_id in [0u32, 1, 7, 241] {
    for step in 0..31 {
      let first = layout.zone_seam_step(pack_id, step);
      let last = first + layout.seam_len();
      assert_eq!(first / VERTEX_BLOCK_SIZE, last / VERTEX_BLOCK_SIZE);
    }
    for zone in 0..24 {
      let first = layout.zone_start(pack_id, zone);
      let last = first + layout.zone_len() - 1;
      assert_eq!(first / VERTEX_BLOCK_SIZE, last / VERTEX_BLOCK_SIZE);
    }
  }
}

#[test]
fn test_topography_shape_and_ranges() {
  let acre = hexagon();
  acre.set_pack_id(3).unwrap();
  let (seams, corners) = frozen_sequences(&acre);
  let layout = VertexIdLayout::new(&GeoSpec::new(1, 3), 8).unwrap();

  let topo = build_topography(&acre, &layout, &seams, &corners).unwrap();
  assert_eq!(topo.sides(), 6);
  assert_eq!(topo.definition.len(), 19);
  assert_eq!(topo.definition_ids.len(), 19);
  assert_eq!(topo.seam_starts.len(), 42);
  assert_eq!(topo.zone_starts.len(), 24);
  assert_eq!(topo.definition[0], acre.center());

  let ids = &topo.definition_ids;
  assert_eq!(layout.classify(ids[0]), Some(VertexRange::ZoneSeams));
  assert!(ids[1..7].iter().all(|&id| layout.classify(id) == Some(VertexRange::AcreSeams)));
  assert!(ids[7..13].iter().all(|&id| layout.classify(id) == Some(VertexRange::Corners)));
  assert!(ids[13..19].iter().all(|&id| layout.classify(id) == Some(VertexRange::ZoneSeams)));
  for (k, chunk) in topo.seam_starts.chunks(7).enumerate() {
    assert!(chunk[..5].iter().all(|&id| layout.classify(id) == Some(VertexRange::ZoneSeams)), "side {k}");
    assert!(chunk[5..].iter().all(|&id| layout.classify(id) == Some(VertexRange::AcreSeams)), "side {k}");
  }

  // No id is used twice within one acre.
  let mut seen = HashSet::new();
  for (start, len) in topo.runs() {
    for id in start..start + len {
      assert!(seen.insert(id), "id {id} repeated");
    }
  }
  assert_eq!(seen.len() as u64, topo.vertex_count());
  assert_eq!(topo.vertex_count(), 19 + 42 * 7 + 24 * 21);
}

#[test]
fn test_topography_needs_pack_id_and_frozen_sequences() {
  let acre = hexagon();
  let layout = VertexIdLayout::new(&GeoSpec::new(1, 3), 4).unwrap();
  let (seams, corners) = frozen_sequences(&acre);
  assert!(build_topography(&acre, &layout, &seams, &corners).is_err());

  acre.set_pack_id(0).unwrap();
  let open = PointSequence::new("open");
  assert_eq!(
    build_topography(&acre, &layout, &open, &corners),
    Err(BuildError::NotFrozen("open"))
  );
}

#[test]
fn test_zone_divisions_two_has_empty_zones() {
  let acre = hexagon();
  acre.set_pack_id(0).unwrap();
  let (seams, corners) = frozen_sequences(&acre);
  let layout = VertexIdLayout::new(&GeoSpec::new(1, 3), 2).unwrap();
  let topo = build_topography(&acre, &layout, &seams, &corners).unwrap();
  assert_eq!(topo.zone_len, 0);
  assert_eq!(topo.vertex_count(), 19 + 42);
}
