//! Running a build and holding its result.

use std::sync::Arc;

use glam::DVec3;
use tracing::info;
use web_time::Instant;

use crate::acre::{Acre, AcreId, AcreRecord};
use crate::acre_builder::AcreGraph;
use crate::config::GlobeConfig;
use crate::consumer::AcreConsumer;
use crate::error::BuildResult;
use crate::geo_point::GeoPoint;
use crate::geo_spec::GeoSpec;
use crate::metrics::BuildMetrics;
use crate::pipeline::{self, keys, BuildContext};
use crate::scheduler::WorkManager;
use crate::sector::{GlobalSector, Sector, SectorSet};
use crate::sequence::AcreSequence;
use crate::validator::ValidationReport;
use crate::vertex_ids::VertexIdLayout;

/// A finished globe: every acre in pack order plus the sectors they were
/// stitched from.
pub struct Globe {
  config: GlobeConfig,
  spec: GeoSpec,
  layout: VertexIdLayout,
  radius: f64,
  global_sectors: Arc<Vec<GlobalSector>>,
  sectors: Arc<SectorSet>,
  acres: Arc<AcreGraph>,
}

impl Globe {
  pub fn config(&self) -> &GlobeConfig {
    &self.config
  }

  pub fn spec(&self) -> &GeoSpec {
    &self.spec
  }

  pub fn vertex_layout(&self) -> &VertexIdLayout {
    &self.layout
  }

  /// Working radius in meters.
  pub fn radius(&self) -> f64 {
    self.radius
  }

  pub fn acre_count(&self) -> usize {
    self.acres.len()
  }

  /// Acres indexed by pack id.
  pub fn acres(&self) -> &[Arc<Acre>] {
    &self.acres.acres
  }

  pub fn acre(&self, pack_id: u32) -> Option<&Arc<Acre>> {
    self.acres.get(pack_id)
  }

  pub fn acre_by_id(&self, id: AcreId) -> Option<&Arc<Acre>> {
    self.acres.pack_id_of(id).and_then(|pack_id| self.acres.get(pack_id))
  }

  /// Pack ids of the acres across each seam of `pack_id`.
  pub fn neighbors(&self, pack_id: u32) -> &[u32] {
    self.acre(pack_id).map(|a| a.pack_neighbors()).unwrap_or(&[])
  }

  pub fn global_sectors(&self) -> &[GlobalSector] {
    &self.global_sectors
  }

  pub fn sectors(&self) -> &[Arc<Sector>] {
    self.sectors.sectors()
  }

  pub fn sector_set(&self) -> &SectorSet {
    &self.sectors
  }

  pub fn graph(&self) -> &AcreGraph {
    &self.acres
  }

  /// Position of `p` on the working sphere.
  pub fn position(&self, p: GeoPoint) -> DVec3 {
    p.to_point(self.radius)
  }

  pub fn records(&self) -> impl Iterator<Item = AcreRecord> + '_ {
    self.acres().iter().map(|a| a.record())
  }
}

impl std::fmt::Debug for Globe {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Globe")
      .field("spec", &self.spec)
      .field("radius", &self.radius)
      .field("acres", &self.acres.len())
      .finish()
  }
}

/// Everything a build returns.
#[derive(Debug)]
pub struct GlobeBuild {
  pub globe: Globe,
  pub report: ValidationReport,
  pub metrics: BuildMetrics,
}

/// Configures and runs one build.
pub struct GlobeBuilder {
  config: GlobeConfig,
  acre_ids: Arc<AcreSequence>,
}

impl GlobeBuilder {
  pub fn new(config: GlobeConfig) -> Self {
    Self {
      config,
      acre_ids: Arc::new(AcreSequence::new()),
    }
  }

  /// Draw acre ids from `acre_ids` instead of a fresh sequence.
  pub fn with_acre_sequence(mut self, acre_ids: Arc<AcreSequence>) -> Self {
    self.acre_ids = acre_ids;
    self
  }

  pub fn config(&self) -> &GlobeConfig {
    &self.config
  }

  /// Build the globe, handing every finished acre to `consumer`.
  ///
  /// Structural failures abort with the first error. Validation findings
  /// do not; they are in the returned report.
  #[tracing::instrument(skip_all, name = "globe::build")]
  pub fn build<C: AcreConsumer + 'static>(self, consumer: C) -> BuildResult<GlobeBuild> {
    self.config.validate()?;
    let started = Instant::now();

    let ctx = Arc::new(BuildContext::new(self.config, self.acre_ids, Arc::new(consumer))?);
    info!(
      g = ctx.config.global_sector_divisions,
      n = ctx.config.sector_divisions,
      zone_divisions = ctx.config.zone_divisions,
      acres = ctx.spec.acres(),
      threads = ctx.config.worker_threads,
      "building globe"
    );

    let mut manager = WorkManager::new(ctx.config.worker_threads);
    pipeline::register(&mut manager, &ctx)?;
    let running = manager.start()?;

    let report = running.get_result(&keys::VALIDATE)?;
    let global_sectors = running.get_result(&keys::GLOBAL_SECTORS)?;
    let sectors = running.get_result(&keys::COMBINE_POINTS)?;
    let acres = running.get_result(&keys::ACRE_GRAPH)?;
    let counter = running.get_result(&keys::GLOBAL_VERTICES)?;
    let progress = running.progress();
    let stages = running.timings();
    drop(running);

    let metrics = BuildMetrics {
      stages,
      units_run: progress.units_run,
      acre_count: acres.len(),
      vertex_touches: counter.as_deref().map_or(0, |c| c.total_touches()),
      total_us: started.elapsed().as_micros() as u64,
    };
    info!(
      acres = metrics.acre_count,
      elapsed_ms = metrics.total_us / 1000,
      valid = report.is_ok(),
      "globe built"
    );

    let globe = Globe {
      config: ctx.config.clone(),
      spec: ctx.spec,
      layout: ctx.layout.clone(),
      radius: ctx.config.working_radius(),
      global_sectors,
      sectors,
      acres,
    };
    Ok(GlobeBuild {
      globe,
      report: (*report).clone(),
      metrics,
    })
  }
}

#[cfg(test)]
#[path = "globe_test.rs"]
mod globe_test;
