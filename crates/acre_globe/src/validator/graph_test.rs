use super::*;
use crate::acre_builder::{
  build_corner_acres, build_edge_acres, build_inner_acres, discover_neighbors, link_sector, pack_acres,
};
use crate::sector::global_sectors;
use crate::sector_builder::build_sector_set;
use crate::sequence::{AcreSequence, PointSequence};
use crate::vertex_ids::{build_topography, seam_midpoint};

/// Build a stitched graph, linking only the sectors `link` accepts.
fn stitched(g: u32, n: u32, link: impl Fn(SectorId) -> bool) -> (SectorSet, AcreGraph) {
  let globals = global_sectors(g).unwrap();
  let set = build_sector_set(&globals, g, n).unwrap();
  let ids = AcreSequence::new();
  for s in set.sectors() {
    build_inner_acres(s, &ids).unwrap();
  }
  for s in set.sectors() {
    discover_neighbors(&set, s).unwrap();
  }
  for s in set.sectors() {
    build_edge_acres(&set, s, &ids).unwrap();
    build_corner_acres(&set, s, &ids).unwrap();
  }
  for s in set.sectors().iter().filter(|s| link(s.id())) {
    link_sector(&set, s).unwrap();
  }
  let graph = pack_acres(&set).unwrap();
  (set, graph)
}

#[test]
fn test_clean_graph_has_no_findings() {
  let (set, graph) = stitched(1, 6, |_| true);
  let spec = GeoSpec::new(1, 6);
  assert_eq!(check_reciprocity(&graph), Vec::<String>::new());
  assert_eq!(check_shared_references(&graph, &set), Vec::<String>::new());
  assert_eq!(check_shared_identity(&set), Vec::<String>::new());
  assert_eq!(check_acre_counts(&graph, &spec), Vec::<String>::new());
  assert_eq!(check_pack_ids(&graph), Vec::<String>::new());
}

#[test]
fn test_missing_links_are_found() {
  let (_, graph) = stitched(1, 6, |id| id != 7);
  let unlinked = check_reciprocity(&graph);
  assert!(!unlinked.is_empty());
  assert!(unlinked.iter().all(|f| f.contains("has no neighbor")), "{unlinked:?}");
  assert!(!check_pack_ids(&graph).is_empty());
}

#[test]
fn test_wrong_closed_forms_are_reported() {
  let (_, graph) = stitched(1, 3, |_| true);
  let findings = check_acre_counts(&graph, &GeoSpec::new(1, 6));
  assert!(findings.iter().any(|f| f.starts_with("32 acres, expected")), "{findings:?}");
  assert!(!findings.iter().any(|f| f.contains("pentagons")));
}

#[test]
fn test_topography_check() {
  let (_, graph) = stitched(1, 3, |_| true);
  let spec = GeoSpec::new(1, 3);
  let layout = VertexIdLayout::new(&spec, 4).unwrap();
  assert_eq!(check_topography(&graph, &layout).len(), graph.len(), "nothing assigned yet");

  let seams = PointSequence::new("seams");
  let corners = PointSequence::new("corners");
  for acre in &graph.acres {
    for k in 0..acre.sides() {
      seams.touch(seam_midpoint(acre, k)).unwrap();
      corners.touch(acre.points()[k]).unwrap();
    }
  }
  assert_eq!(seams.freeze(0).unwrap(), spec.acre_seams());
  assert_eq!(corners.freeze(0).unwrap(), spec.acre_corners());
  for acre in &graph.acres {
    acre.set_topography(build_topography(acre, &layout, &seams, &corners).unwrap()).unwrap();
  }
  assert_eq!(check_topography(&graph, &layout), Vec::<String>::new());

  // A layout for a smaller globe puts the tail of the ids out of range.
  let small = VertexIdLayout::new(&GeoSpec::new(1, 3), 2).unwrap();
  assert!(!check_topography(&graph, &small).is_empty());
}
