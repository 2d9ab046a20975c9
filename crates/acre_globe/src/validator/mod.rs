//! Post-build validation.
//!
//! ```text
//!   topography runs ──► VertexCounter ──► tally ──► VertexValidator ─┐
//!                                                                    ├─► ValidationReport
//!   acre graph + sectors ──► graph checks ───────────────────────────┘
//! ```
//!
//! Validation never fails a build. Findings are collected into a
//! [`ValidationReport`] and the globe stays available for inspection.

pub mod graph;
pub mod vertex_counter;
pub mod vertex_validator;

pub use vertex_counter::VertexCounter;
pub use vertex_validator::{ExpectedCounts, HistogramReport, HistogramRow, VertexValidator};

use std::fmt;

use crate::acre_builder::AcreGraph;
use crate::geo_spec::GeoSpec;
use crate::sector::SectorSet;
use crate::vertex_ids::VertexIdLayout;

/// Messages kept per report; the rest are only counted.
pub const MAX_REPORTED_ERRORS: usize = 32;

/// Outcome of validating one build.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ValidationReport {
  pub acre_count: usize,
  pub expected_acre_count: u64,
  /// Checks that ran, in order.
  pub checks: Vec<&'static str>,
  /// The first [`MAX_REPORTED_ERRORS`] findings.
  pub errors: Vec<String>,
  pub error_count: usize,
  /// Vertex histogram; `None` when assertions are off.
  pub histogram: Option<HistogramReport>,
}

impl ValidationReport {
  pub fn new(acre_count: usize, expected_acre_count: u64) -> Self {
    Self {
      acre_count,
      expected_acre_count,
      ..Self::default()
    }
  }

  /// Record the findings of check `name`.
  pub fn record(&mut self, name: &'static str, findings: Vec<String>) {
    self.checks.push(name);
    self.error_count += findings.len();
    let room = MAX_REPORTED_ERRORS.saturating_sub(self.errors.len());
    self
      .errors
      .extend(findings.into_iter().take(room).map(|f| format!("{name}: {f}")));
  }

  pub fn set_histogram(&mut self, histogram: HistogramReport) {
    self.checks.push("vertex histogram");
    if !histogram.is_ok() {
      let findings = histogram
        .mismatches()
        .map(|row| {
          format!(
            "{} ids touched {} times, expected {}",
            row.actual,
            row.count,
            row.expected.unwrap_or_default()
          )
        })
        .chain((!histogram.round_trip_ok()).then(|| {
          format!(
            "weighted touches {} differ from total touches {}",
            histogram.weighted_touches, histogram.total_touches
          )
        }))
        .collect::<Vec<_>>();
      self.error_count += findings.len();
      let room = MAX_REPORTED_ERRORS.saturating_sub(self.errors.len());
      self.errors.extend(findings.into_iter().take(room));
    }
    self.histogram = Some(histogram);
  }

  pub fn is_ok(&self) -> bool {
    self.error_count == 0
  }
}

impl fmt::Display for ValidationReport {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(
      f,
      "validation {}: {} acres (expected {}), {} checks, {} errors",
      if self.is_ok() { "passed" } else { "FAILED" },
      self.acre_count,
      self.expected_acre_count,
      self.checks.len(),
      self.error_count
    )?;
    for error in &self.errors {
      writeln!(f, "  {error}")?;
    }
    if self.error_count > self.errors.len() {
      writeln!(f, "  ... {} more", self.error_count - self.errors.len())?;
    }
    if let Some(histogram) = &self.histogram {
      writeln!(f, "{histogram}")?;
    }
    Ok(())
  }
}

/// Run every graph check into `report`.
pub fn check_graph(
  report: &mut ValidationReport,
  acres: &AcreGraph,
  sectors: &SectorSet,
  layout: &VertexIdLayout,
  spec: &GeoSpec,
) {
  report.record("acre counts", graph::check_acre_counts(acres, spec));
  report.record("pack ids", graph::check_pack_ids(acres));
  report.record("reciprocity", graph::check_reciprocity(acres));
  report.record("shared references", graph::check_shared_references(acres, sectors));
  report.record("shared identity", graph::check_shared_identity(sectors));
  report.record("topography", graph::check_topography(acres, layout));
}
