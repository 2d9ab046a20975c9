//! Comparing a vertex-id tally against the closed-form expectation.
//!
//! Every fine vertex is touched once by each acre that uses it: private
//! vertices by one acre, acre-seam vertices by two and acre corners by
//! three. Anything else means two ids collided or a run was skipped.

use std::fmt;

use crate::geo_spec::GeoSpec;
use crate::validator::vertex_counter::VertexCounter;
use crate::vertex_ids::VertexIdLayout;

/// Expected histogram; `None` buckets are not checked.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExpectedCounts {
  pub counts: [Option<u64>; 16],
}

impl ExpectedCounts {
  /// Nothing checked.
  pub fn unchecked() -> Self {
    Self { counts: [None; 16] }
  }

  /// Expectation for a whole globe: bucket 0 is skipped, buckets 1 to 3
  /// come from the acre, seam and corner counts, the rest must be empty.
  pub fn for_globe(spec: &GeoSpec, layout: &VertexIdLayout) -> Self {
    let acres = spec.acres();
    let sides = spec.acre_sides();
    let seam_len = layout.seam_len();
    let zone_len = layout.zone_len();

    let mut counts = [Some(0); 16];
    counts[0] = None;
    // Center, spoke midpoints, zone-seam runs and zone interiors.
    counts[1] = Some(acres + sides + 5 * sides * seam_len + 4 * sides * zone_len);
    // Edge midpoint plus both halves of every acre seam.
    counts[2] = Some(spec.acre_seams() * (1 + 2 * seam_len));
    counts[3] = Some(spec.acre_corners());
    Self { counts }
  }

  /// Total touches these counts imply, if every bucket is checked past 0.
  pub fn total_touches(&self) -> Option<u64> {
    self.counts[1..]
      .iter()
      .enumerate()
      .map(|(i, c)| c.map(|c| (i as u64 + 1) * c))
      .sum()
  }
}

/// One histogram bucket.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HistogramRow {
  pub count: usize,
  pub expected: Option<u64>,
  pub actual: u64,
}

impl HistogramRow {
  pub fn is_ok(&self) -> bool {
    self.expected.map_or(true, |e| e == self.actual)
  }

  /// `actual − expected`, for checked buckets.
  pub fn difference(&self) -> Option<i128> {
    self.expected.map(|e| self.actual as i128 - e as i128)
  }
}

/// Result of comparing a tally against an expectation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HistogramReport {
  pub rows: Vec<HistogramRow>,
  pub total_touches: u64,
  /// `Σ count × ids` over buckets 1 to 14 of the tally.
  pub weighted_touches: u64,
  /// Bucket 15 hides how far past 15 its ids went, so the round trip can
  /// only be checked when it is empty.
  pub round_trip_checked: bool,
}

impl HistogramReport {
  pub fn round_trip_ok(&self) -> bool {
    !self.round_trip_checked || self.weighted_touches == self.total_touches
  }

  pub fn is_ok(&self) -> bool {
    self.round_trip_ok() && self.rows.iter().all(HistogramRow::is_ok)
  }

  /// Rows whose actual count differs from the expected one.
  pub fn mismatches(&self) -> impl Iterator<Item = &HistogramRow> {
    self.rows.iter().filter(|r| !r.is_ok())
  }
}

impl fmt::Display for HistogramReport {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(f, "{:>5} {:>16} {:>16} {:>12}", "count", "expected", "actual", "difference")?;
    for row in &self.rows {
      if row.actual == 0 && row.expected.map_or(true, |e| e == 0) {
        continue;
      }
      let expected = row.expected.map_or_else(|| "-".to_owned(), |e| e.to_string());
      let difference = row.difference().map_or_else(|| "-".to_owned(), |d| format!("{d:+}"));
      writeln!(f, "{:>5} {:>16} {:>16} {:>12}", row.count, expected, row.actual, difference)?;
    }
    write!(
      f,
      "touches {} (weighted {}){}",
      self.total_touches,
      self.weighted_touches,
      if self.round_trip_ok() { "" } else { " MISMATCH" }
    )
  }
}

/// Histogram comparator.
pub struct VertexValidator;

impl VertexValidator {
  pub fn validate(counter: &VertexCounter, expected: &ExpectedCounts) -> HistogramReport {
    let tally = counter.tally_counts();
    Self::compare(&tally, counter.total_touches(), expected)
  }

  pub fn compare(tally: &[u64; 16], total_touches: u64, expected: &ExpectedCounts) -> HistogramReport {
    let rows = tally
      .iter()
      .zip(expected.counts.iter())
      .enumerate()
      .map(|(count, (&actual, &expected))| HistogramRow {
        count,
        expected,
        actual,
      })
      .collect();
    let weighted_touches = tally[1..15].iter().enumerate().map(|(i, &n)| (i as u64 + 1) * n).sum();

    HistogramReport {
      rows,
      total_touches,
      weighted_touches,
      round_trip_checked: tally[15] == 0,
    }
  }
}

#[cfg(test)]
#[path = "vertex_validator_test.rs"]
mod vertex_validator_test;
