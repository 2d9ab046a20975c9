//! Global vertex ids for the fine topography of every acre.
//!
//! Each acre side `k` (center `o`, corners `c_k`, `c_{k+1}`) is split into
//! four zones by the spoke midpoints `m_k`, `m_{k+1}` and the edge midpoint
//! `e_k`:
//!
//! ```text
//!                  c_k ──── e_k ──── c_k+1        acre seam: c_k–e_k, e_k–c_k+1
//!                    \  z0  / \  z2  /            (shared with the neighbor)
//!                     \    / z1\    /
//!                     m_k ──────m_k+1             zone seams: o–m_k, m_k–c_k,
//!                        \  z3  /                 m_k–m_k+1, m_k–e_k, e_k–m_k+1
//!                         \    /
//!                           o
//! ```
//!
//! Every seam run holds `R − 1` vertices and every zone `(R−1)(R−2)/2`.
//! Ids come from four block-aligned ranges (see [`crate::constants`]):
//! corners and acre-seam runs are numbered through frozen
//! [`PointSequence`]s so both acres sharing them agree, everything else is
//! pure arithmetic on the acre's pack id.

use std::fmt;
use std::ops::Range;

use crate::acre::Acre;
use crate::constants::{
  align_to_block, ACRE_SEAMS_PER_SIDE, MAX_ACRE_SIDES, VERTEX_BLOCK_SIZE, VERTEX_COUNTER_LIMIT, VERTEX_INDEX_MASK,
  ZONES_PER_SIDE, ZONE_SEAMS_PER_SIDE,
};
use crate::error::{BuildError, BuildResult};
use crate::geo_point::GeoPoint;
use crate::geo_spec::GeoSpec;
use crate::sequence::PointSequence;

/// Zone-seam steps per acre: the center plus five per side.
const ZONE_SEAM_STEPS: u64 = 1 + (ZONE_SEAMS_PER_SIDE * MAX_ACRE_SIDES) as u64;

/// Zone steps per acre.
const ZONE_STEPS: u64 = (ZONES_PER_SIDE * MAX_ACRE_SIDES) as u64;

/// [`align_to_block`] that fails instead of wrapping.
fn checked_align(value: u64) -> Option<u64> {
  value.checked_add(VERTEX_INDEX_MASK).map(|_| align_to_block(value))
}

/// Which of the four id ranges an id belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VertexRange {
  Corners,
  AcreSeams,
  ZoneSeams,
  Zones,
}

/// Block-aligned id ranges for one globe, fixed before any sector work.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VertexIdLayout {
  zone_divisions: u32,
  acres: u64,
  acre_seams: u64,
  acre_corners: u64,
  seam_step: u64,
  zone_seam_step: u64,
  zone_step: u64,
  corners_start: u64,
  acre_seams_start: u64,
  zone_seams_start: u64,
  zones_start: u64,
  end: u64,
}

impl VertexIdLayout {
  /// Lay out the ranges for `spec`. A globe whose ids would overflow or pass
  /// [`VERTEX_COUNTER_LIMIT`] is a configuration error.
  pub fn new(spec: &GeoSpec, zone_divisions: u32) -> BuildResult<Self> {
    let r = zone_divisions as u64;
    if r < 2 {
      return Err(BuildError::Config(format!("zone divisions {r} leave no seam vertices")));
    }
    let seam_step = r.next_power_of_two();
    let zone_len = (r - 1) * (r - 2) / 2;
    let zone_step = zone_len.max(1).next_power_of_two();
    if seam_step > VERTEX_BLOCK_SIZE || zone_step > VERTEX_BLOCK_SIZE {
      return Err(BuildError::Config(format!("zone divisions {r} overflow a vertex block")));
    }

    let acres = spec.acres();
    let acre_seams = spec.acre_seams();
    let acre_corners = spec.acre_corners();

    let too_many = || BuildError::Config(format!("{acres} acres at zone divisions {r} exceed the vertex id space"));
    let span = |count: u64, steps: u64, step: u64| count.checked_mul(steps)?.checked_mul(step);
    let after = |start: u64, len: Option<u64>| len.and_then(|len| start.checked_add(len));

    let corners_start = VERTEX_BLOCK_SIZE;
    let acre_seams_start = after(corners_start, Some(acre_corners))
      .and_then(checked_align)
      .ok_or_else(too_many)?;
    let zone_seams_start = after(acre_seams_start, span(acre_seams, ACRE_SEAMS_PER_SIDE as u64, seam_step))
      .and_then(checked_align)
      .ok_or_else(too_many)?;
    let zones_start = after(zone_seams_start, span(acres, ZONE_SEAM_STEPS, seam_step))
      .and_then(checked_align)
      .ok_or_else(too_many)?;
    let end = after(zones_start, span(acres, ZONE_STEPS, zone_step)).ok_or_else(too_many)?;
    if end - 1 > VERTEX_COUNTER_LIMIT {
      return Err(too_many());
    }

    Ok(Self {
      zone_divisions,
      acres,
      acre_seams,
      acre_corners,
      seam_step,
      zone_seam_step: seam_step,
      zone_step,
      corners_start,
      acre_seams_start,
      zone_seams_start,
      zones_start,
      end,
    })
  }

  pub fn zone_divisions(&self) -> u32 {
    self.zone_divisions
  }

  /// Vertices strictly inside one seam run.
  pub fn seam_len(&self) -> u64 {
    self.zone_divisions as u64 - 1
  }

  /// Vertices strictly inside one zone.
  pub fn zone_len(&self) -> u64 {
    let r = self.zone_divisions as u64;
    (r - 1) * (r - 2) / 2
  }

  /// One past the largest id.
  pub fn end(&self) -> u64 {
    self.end
  }

  pub fn range(&self, which: VertexRange) -> Range<u64> {
    match which {
      VertexRange::Corners => self.corners_start..self.corners_start + self.acre_corners,
      VertexRange::AcreSeams => {
        self.acre_seams_start..self.acre_seams_start + self.acre_seams * ACRE_SEAMS_PER_SIDE as u64 * self.seam_step
      }
      VertexRange::ZoneSeams => {
        self.zone_seams_start..self.zone_seams_start + self.acres * ZONE_SEAM_STEPS * self.zone_seam_step
      }
      VertexRange::Zones => self.zones_start..self.end,
    }
  }

  /// Range holding `id`, if any.
  pub fn classify(&self, id: u64) -> Option<VertexRange> {
    [
      VertexRange::Corners,
      VertexRange::AcreSeams,
      VertexRange::ZoneSeams,
      VertexRange::Zones,
    ]
    .into_iter()
    .find(|&r| self.range(r).contains(&id))
  }

  #[inline]
  pub fn corner_id(&self, corner_seq: u64) -> u64 {
    self.corners_start + corner_seq
  }

  /// First id of acre seam `seam_seq`: its midpoint, followed by half 0.
  #[inline]
  pub fn acre_seam_base(&self, seam_seq: u64) -> u64 {
    self.acre_seams_start + seam_seq * ACRE_SEAMS_PER_SIDE as u64 * self.seam_step
  }

  /// Step `step` of an acre's zone-seam block.
  #[inline]
  pub fn zone_seam_step(&self, pack_id: u32, step: u64) -> u64 {
    self.zone_seams_start + (pack_id as u64 * ZONE_SEAM_STEPS + step) * self.zone_seam_step
  }

  /// First id of zone `zone` (`4k + z`) of an acre.
  #[inline]
  pub fn zone_start(&self, pack_id: u32, zone: u64) -> u64 {
    self.zones_start + (pack_id as u64 * ZONE_STEPS + zone) * self.zone_step
  }
}

impl fmt::Display for VertexIdLayout {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(f, "vertex ids (R = {}):", self.zone_divisions)?;
    for (name, range) in [
      ("corners", VertexRange::Corners),
      ("acre seams", VertexRange::AcreSeams),
      ("zone seams", VertexRange::ZoneSeams),
      ("zones", VertexRange::Zones),
    ] {
      let r = self.range(range);
      writeln!(f, "  {:<11} {:>16} .. {:<16}", name, r.start, r.end)?;
    }
    Ok(())
  }
}

/// Fine-vertex ids of one acre.
///
/// `definition` is `[center, e_0.., c_0.., m_0..]` (`3l + 1` points) with the
/// id of each in `definition_ids`. `seam_starts` holds per side the five
/// zone-seam runs (inner spoke half, outer spoke half, `m_k–m_{k+1}`,
/// `m_k–e_k`, `e_k–m_{k+1}`) then the two acre-seam halves (`c_k` side,
/// `c_{k+1}` side). `zone_starts` holds four zones per side.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Topography {
  pub definition: Vec<GeoPoint>,
  pub definition_ids: Vec<u64>,
  pub seam_starts: Vec<u64>,
  pub zone_starts: Vec<u64>,
  pub seam_len: u64,
  pub zone_len: u64,
}

impl Topography {
  /// Sides of the acre this belongs to.
  pub fn sides(&self) -> usize {
    self.zone_starts.len() / ZONES_PER_SIDE
  }

  /// Every id this acre uses, as `(start, len)` runs.
  pub fn runs(&self) -> impl Iterator<Item = (u64, u64)> + '_ {
    let single = self.definition_ids.iter().map(|&id| (id, 1));
    let seams = self.seam_starts.iter().map(move |&s| (s, self.seam_len));
    let zones = self.zone_starts.iter().map(move |&z| (z, self.zone_len));
    single.chain(seams).chain(zones).filter(|&(_, len)| len > 0)
  }

  /// Total ids across all runs.
  pub fn vertex_count(&self) -> u64 {
    self.runs().map(|(_, len)| len).sum()
  }
}

/// Midpoint of acre seam `k`; both acres on the seam compute the same one.
pub fn seam_midpoint(acre: &Acre, k: usize) -> GeoPoint {
  let (a, b) = acre.seam(k);
  GeoPoint::midpoint(a, b)
}

/// Assign the fine-vertex ids of a packed acre from the frozen seam and
/// corner sequences.
pub fn build_topography(
  acre: &Acre,
  layout: &VertexIdLayout,
  seams: &PointSequence,
  corners: &PointSequence,
) -> BuildResult<Topography> {
  let pack_id = acre
    .pack_id()
    .ok_or_else(|| BuildError::geometry(format!("acre {} has no pack id", acre.id())))?;
  let l = acre.sides();
  let center = acre.center();

  let corner_seqs: Vec<u64> = acre.points().iter().map(|&c| corners.get(c)).collect::<BuildResult<_>>()?;
  let edge_mids: Vec<GeoPoint> = (0..l).map(|k| seam_midpoint(acre, k)).collect();
  let seam_seqs: Vec<u64> = edge_mids.iter().map(|&e| seams.get(e)).collect::<BuildResult<_>>()?;
  let spoke_mids: Vec<GeoPoint> = acre.points().iter().map(|&c| GeoPoint::midpoint(center, c)).collect();

  let mut definition = Vec::with_capacity(3 * l + 1);
  definition.push(center);
  definition.extend_from_slice(&edge_mids);
  definition.extend_from_slice(acre.points());
  definition.extend_from_slice(&spoke_mids);

  let mut definition_ids = Vec::with_capacity(3 * l + 1);
  definition_ids.push(layout.zone_seam_step(pack_id, 0));
  definition_ids.extend(seam_seqs.iter().map(|&s| layout.acre_seam_base(s)));
  definition_ids.extend(corner_seqs.iter().map(|&c| layout.corner_id(c)));
  definition_ids.extend((0..l as u64).map(|k| layout.zone_seam_step(pack_id, 1 + 5 * k)));

  let mut seam_starts = Vec::with_capacity(7 * l);
  for k in 0..l {
    let step = |i: u64| layout.zone_seam_step(pack_id, i + 5 * k as u64);
    // Inner spoke half follows m_k in its step.
    seam_starts.push(step(1) + 1);
    seam_starts.extend((2..=5).map(step));

    let base = layout.acre_seam_base(seam_seqs[k]);
    let half0 = base + 1;
    let half1 = base + layout.seam_step;
    let (c_k, c_next) = (corner_seqs[k], corner_seqs[(k + 1) % l]);
    if c_k < c_next {
      seam_starts.extend([half0, half1]);
    } else {
      seam_starts.extend([half1, half0]);
    }
  }

  let zone_starts = (0..(ZONES_PER_SIDE * l) as u64)
    .map(|zone| layout.zone_start(pack_id, zone))
    .collect();

  Ok(Topography {
    definition,
    definition_ids,
    seam_starts,
    zone_starts,
    seam_len: layout.seam_len(),
    zone_len: layout.zone_len(),
  })
}

#[cfg(test)]
#[path = "vertex_ids_test.rs"]
mod vertex_ids_test;
