//! Structural checks over the finished acre graph.
//!
//! Each check returns its findings as messages; none of them abort.

use std::collections::HashMap;
use std::sync::Arc;

use rayon::prelude::*;

use crate::acre::{Acre, AcreFlavor, AcreId};
use crate::acre_builder::AcreGraph;
use crate::geo_spec::GeoSpec;
use crate::lattice::{AcreSlot, SharedSlot};
use crate::sector::{SectorId, SectorSet};
use crate::vertex_ids::{VertexIdLayout, VertexRange};

/// Every neighbor slot is set, points back, and both acres share the seam.
pub fn check_reciprocity(graph: &AcreGraph) -> Vec<String> {
  graph
    .acres
    .par_iter()
    .flat_map_iter(|acre| {
      let mut findings = Vec::new();
      for k in 0..acre.sides() {
        let id = acre.neighbor(k);
        if id.is_none() {
          findings.push(format!("acre {} seam {k} has no neighbor", acre.id()));
          continue;
        }
        let Some(other) = graph.pack_id_of(id).and_then(|p| graph.get(p)) else {
          findings.push(format!("acre {} seam {k} names unknown acre {id}", acre.id()));
          continue;
        };
        let (p, q) = acre.seam(k);
        match other.seam_index(p, q) {
          Some(j) if other.neighbor(j) == acre.id() => {}
          Some(j) => findings.push(format!(
            "acre {} seam {k} -> {id}, but {id} seam {j} -> {}",
            acre.id(),
            other.neighbor(j)
          )),
          None => findings.push(format!("acres {} and {id} are linked without a common seam", acre.id())),
        }
      }
      findings
    })
    .collect()
}

/// Shared acres are held by 2 sectors along edges, 6 at corners and 5 at
/// icosahedron vertices; inner acres by exactly one.
pub fn check_shared_references(graph: &AcreGraph, sectors: &SectorSet) -> Vec<String> {
  let mut held: HashMap<AcreId, usize> = HashMap::with_capacity(graph.len());
  for sector in sectors.sectors() {
    for acre in sector.acres() {
      *held.entry(acre.id()).or_default() += 1;
    }
  }

  graph
    .acres
    .iter()
    .filter_map(|acre| {
      let holders = held.get(&acre.id()).copied().unwrap_or(0);
      let expected = match acre.flavor() {
        AcreFlavor::Inner => 1,
        AcreFlavor::DualSector => 2,
        AcreFlavor::MultiSector if sectors.is_icosahedron_vertex(acre.center()) => 5,
        AcreFlavor::MultiSector => 6,
      };
      (holders != expected).then(|| {
        format!(
          "{} acre {} is held by {holders} sectors, expected {expected}",
          acre.flavor().as_str(),
          acre.id()
        )
      })
    })
    .collect()
}

/// Every sector touching a shared acre's center holds the same instance.
pub fn check_shared_identity(sectors: &SectorSet) -> Vec<String> {
  sectors
    .sectors()
    .par_iter()
    .flat_map_iter(|sector| {
      let neighbors = match sector.neighbors() {
        Ok(neighbors) => neighbors,
        Err(err) => return vec![err.to_string()],
      };
      let mut findings = Vec::new();
      for (slot, &p) in sector.layout().shared_centers().iter().enumerate() {
        let Some(acre) = sector.acre_at(p) else {
          findings.push(format!("sector {} shared slot {slot} is empty", sector.id()));
          continue;
        };
        let center = sector.point(p);
        let others: &[SectorId] = match sector.layout().shared_slot(slot) {
          SharedSlot::Corner(corner) => &neighbors.corner_sectors[corner.index()],
          SharedSlot::Edge(edge, _) => std::slice::from_ref(&neighbors.edge_neighbors[edge.index()]),
        };
        for &other_id in others.iter().filter(|&&id| id != sector.id()) {
          let other = sectors.sector(other_id);
          let same = other
            .lattice_point(center)
            .filter(|&q| matches!(other.layout().slot(q), Some(AcreSlot::Shared(_))))
            .and_then(|q| other.acre_at(q))
            .is_some_and(|o| Arc::ptr_eq(&o, &acre));
          if !same {
            findings.push(format!(
              "sectors {} and {other_id} disagree on the acre at {center}",
              sector.id()
            ));
          }
        }
      }
      findings
    })
    .collect()
}

/// Topography lengths match the side count and every run stays inside its
/// id range.
pub fn check_topography(graph: &AcreGraph, layout: &VertexIdLayout) -> Vec<String> {
  graph
    .acres
    .par_iter()
    .flat_map_iter(|acre| topography_findings(acre, layout))
    .collect()
}

fn topography_findings(acre: &Acre, layout: &VertexIdLayout) -> Vec<String> {
  let Some(topo) = acre.topography() else {
    return vec![format!("acre {} has no topography", acre.id())];
  };
  let l = acre.sides();
  let mut findings = Vec::new();
  for (what, len, want) in [
    ("definition", topo.definition.len(), 3 * l + 1),
    ("definition ids", topo.definition_ids.len(), 3 * l + 1),
    ("seam starts", topo.seam_starts.len(), 7 * l),
    ("zone starts", topo.zone_starts.len(), 4 * l),
  ] {
    if len != want {
      findings.push(format!("acre {} {what}: {len} entries, expected {want}", acre.id()));
    }
  }
  if !findings.is_empty() {
    return findings;
  }

  let in_range = |start: u64, len: u64, range: VertexRange| {
    layout.classify(start) == Some(range) && (len == 0 || layout.classify(start + len - 1) == Some(range))
  };
  let mut expect = |ok: bool, what: &str| {
    if !ok {
      findings.push(format!("acre {} {what} leaves its id range", acre.id()));
    }
  };

  let ids = &topo.definition_ids;
  expect(in_range(ids[0], 1, VertexRange::ZoneSeams), "center");
  expect(ids[1..=l].iter().all(|&id| in_range(id, 1, VertexRange::AcreSeams)), "edge midpoints");
  expect(ids[l + 1..=2 * l].iter().all(|&id| in_range(id, 1, VertexRange::Corners)), "corners");
  expect(ids[2 * l + 1..].iter().all(|&id| in_range(id, 1, VertexRange::ZoneSeams)), "spoke midpoints");
  expect(
    topo.seam_starts.chunks(7).all(|side| {
      side[..5].iter().all(|&s| in_range(s, topo.seam_len, VertexRange::ZoneSeams))
        && side[5..].iter().all(|&s| in_range(s, topo.seam_len, VertexRange::AcreSeams))
    }),
    "seam runs",
  );
  expect(
    topo.zone_starts.iter().all(|&z| in_range(z, topo.zone_len, VertexRange::Zones)),
    "zones",
  );
  findings
}

/// Acre totals per flavor match the closed forms.
pub fn check_acre_counts(graph: &AcreGraph, spec: &GeoSpec) -> Vec<String> {
  let count = |flavor| graph.acres.iter().filter(|a| a.flavor() == flavor).count() as u64;
  [
    ("acres", graph.len() as u64, spec.acres()),
    ("inner acres", count(AcreFlavor::Inner), spec.inner_acres()),
    ("dual-sector acres", count(AcreFlavor::DualSector), spec.dual_sector_acres()),
    ("multi-sector acres", count(AcreFlavor::MultiSector), spec.multi_sector_acres()),
    (
      "pentagons",
      graph.acres.iter().filter(|a| a.is_pentagon()).count() as u64,
      spec.pentagons(),
    ),
  ]
  .into_iter()
  .filter(|(_, actual, expected)| actual != expected)
  .map(|(what, actual, expected)| format!("{actual} {what}, expected {expected}"))
  .collect()
}

/// Pack ids run `0..len` and pack neighbors mirror the neighbor ids.
pub fn check_pack_ids(graph: &AcreGraph) -> Vec<String> {
  graph
    .acres
    .par_iter()
    .enumerate()
    .flat_map_iter(|(i, acre)| {
      let mut findings = Vec::new();
      if acre.pack_id() != Some(i as u32) {
        findings.push(format!("acre {} at position {i} has pack id {:?}", acre.id(), acre.pack_id()));
      }
      let mirrored = acre.pack_neighbors().len() == acre.sides()
        && acre
          .neighbor_ids()
          .iter()
          .zip(acre.pack_neighbors())
          .all(|(&id, &pack)| graph.pack_id_of(id) == Some(pack));
      if !mirrored {
        findings.push(format!("acre {} pack neighbors do not match its neighbors", acre.id()));
      }
      findings
    })
    .collect()
}

#[cfg(test)]
#[path = "graph_test.rs"]
mod graph_test;
