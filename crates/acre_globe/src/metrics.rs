//! Build statistics: per-stage wall-clock timings and totals.

use std::fmt;

/// Wall-clock time one work source spent between start and result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageTiming {
  pub name: &'static str,
  pub duration_us: u64,
}

impl StageTiming {
  pub fn millis(&self) -> f64 {
    self.duration_us as f64 / 1000.0
  }
}

/// Statistics of one finished build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildMetrics {
  /// Stage timings in completion order.
  pub stages: Vec<StageTiming>,
  /// Work units executed across all stages.
  pub units_run: u64,
  pub acre_count: usize,
  /// Vertex-id touches recorded by the counter (0 when assertions are off).
  pub vertex_touches: u64,
  /// Wall-clock time of the whole build.
  pub total_us: u64,
}

impl BuildMetrics {
  /// Timing of the stage named `name`, if it completed.
  pub fn stage(&self, name: &str) -> Option<&StageTiming> {
    self.stages.iter().find(|s| s.name == name)
  }

  /// Acres built per second of total wall-clock time.
  pub fn acres_per_second(&self) -> f64 {
    if self.total_us == 0 {
      0.0
    } else {
      self.acre_count as f64 * 1_000_000.0 / self.total_us as f64
    }
  }
}

impl fmt::Display for BuildMetrics {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(
      f,
      "built {} acres in {:.1} ms ({} units, {:.0} acres/s)",
      self.acre_count,
      self.total_us as f64 / 1000.0,
      self.units_run,
      self.acres_per_second()
    )?;
    for stage in &self.stages {
      writeln!(f, "  {:<24} {:>10.2} ms", stage.name, stage.millis())?;
    }
    if self.vertex_touches > 0 {
      writeln!(f, "  vertex touches: {}", self.vertex_touches)?;
    }
    Ok(())
  }
}
