//! The work sources of a globe build.
//!
//! ```text
//! ┌────────────────┐   ┌─────────┐   ┌────────────────┐   ┌─────────────┐   ┌────────────┐
//! │ global sectors ├──►│ sectors ├──►│ combine points ├──►│ build acres ├──►│ acre graph │
//! └────────────────┘   └─────────┘   └────────────────┘   └─────────────┘   └─────┬──────┘
//!                                                                                 │
//!        ┌────────────────────────────────────────────────────────────────────────┘
//!        ▼
//! ┌────────────────────┐   ┌────────────┐   ┌───────────────┐
//! │ acre seam sequence ├──►│ topography ├─┬►│ publish acres ├─────────────┐
//! └────────────────────┘   └────────────┘ │ └───────────────┘             ▼
//!                                         │ ┌─────────────────────────┐ ┌──────────┐
//!                                         └►│ collect global vertices ├►│ validate │
//!                                           └─────────────────────────┘ └──────────┘
//! ```
//!
//! Per-sector and per-acre work is queued as units; `build acres` chains the
//! four phases of each sector as successive units so sectors progress
//! independently.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info, warn};

use crate::acre::Acre;
use crate::acre_builder::{
  build_corner_acres, build_edge_acres, build_inner_acres, discover_neighbors, link_sector, pack_acres, AcreGraph,
};
use crate::config::GlobeConfig;
use crate::consumer::AcreConsumer;
use crate::error::{BuildError, BuildResult};
use crate::geo_spec::GeoSpec;
use crate::scheduler::{FnWorkSource, WorkManager, WorkQueue, WorkResults, WorkSource};
use crate::sector::{global_sectors, SectorId, SectorSet};
use crate::sector_builder::{combine_points, raw_sector, RawSector};
use crate::sequence::{AcreSequence, PointSequence};
use crate::validator::{self, ExpectedCounts, ValidationReport, VertexCounter, VertexValidator};
use crate::vertex_ids::{build_topography, seam_midpoint, VertexIdLayout};

/// Acres handled by one per-acre unit.
pub const ACRES_PER_UNIT: usize = 2048;

/// Result keys, one per stage.
pub mod keys {
  use std::sync::Arc;

  use super::{AcreTotals, SeamSequences};
  use crate::acre_builder::AcreGraph;
  use crate::scheduler::WorkSourceKey;
  use crate::sector::{GlobalSector, SectorSet};
  use crate::sector_builder::RawSector;
  use crate::validator::{ValidationReport, VertexCounter};

  pub const GLOBAL_SECTORS: WorkSourceKey<Vec<GlobalSector>> = WorkSourceKey::new("global sectors");
  pub const SECTORS: WorkSourceKey<Vec<RawSector>> = WorkSourceKey::new("sectors");
  pub const COMBINE_POINTS: WorkSourceKey<SectorSet> = WorkSourceKey::new("combine points");
  pub const BUILD_ACRES: WorkSourceKey<AcreTotals> = WorkSourceKey::new("build acres");
  pub const ACRE_GRAPH: WorkSourceKey<AcreGraph> = WorkSourceKey::new("acre graph");
  pub const ACRE_SEAM_SEQUENCE: WorkSourceKey<SeamSequences> = WorkSourceKey::new("acre seam sequence");
  /// Fine vertices over all acres, counting shared ones once per acre.
  pub const TOPOGRAPHY: WorkSourceKey<u64> = WorkSourceKey::new("topography");
  /// Acres handed to the consumer.
  pub const PUBLISH_ACRES: WorkSourceKey<u64> = WorkSourceKey::new("publish acres");
  /// `None` when assertions are off.
  pub const GLOBAL_VERTICES: WorkSourceKey<Option<Arc<VertexCounter>>> =
    WorkSourceKey::new("collect global vertices");
  pub const VALIDATE: WorkSourceKey<ValidationReport> = WorkSourceKey::new("validate");
}

/// Everything the stages of one build share.
pub struct BuildContext {
  pub config: GlobeConfig,
  pub spec: GeoSpec,
  pub layout: VertexIdLayout,
  pub acre_ids: Arc<AcreSequence>,
  pub consumer: Arc<dyn AcreConsumer>,
}

impl BuildContext {
  pub fn new(config: GlobeConfig, acre_ids: Arc<AcreSequence>, consumer: Arc<dyn AcreConsumer>) -> BuildResult<Self> {
    let spec = config.spec();
    let layout = VertexIdLayout::new(&spec, config.zone_divisions)?;
    Ok(Self {
      config,
      spec,
      layout,
      acre_ids,
      consumer,
    })
  }
}

/// Acres built per flavor.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AcreTotals {
  pub inner: u64,
  pub dual_sector: u64,
  pub multi_sector: u64,
}

impl AcreTotals {
  pub fn total(&self) -> u64 {
    self.inner + self.dual_sector + self.multi_sector
  }
}

/// Frozen numbering of acre seams (by midpoint) and acre corners.
pub struct SeamSequences {
  pub seams: PointSequence,
  pub corners: PointSequence,
}

/// Register every stage of a build on `manager`.
pub fn register(manager: &mut WorkManager, ctx: &Arc<BuildContext>) -> BuildResult<()> {
  let g = ctx.config.global_sector_divisions;
  manager.add_work_source(
    &keys::GLOBAL_SECTORS,
    &[],
    FnWorkSource::new(move |_: &WorkResults| -> BuildResult<_> {
      let sectors = global_sectors(g)?;
      info!(count = sectors.len(), "global sectors ready");
      Ok(sectors)
    }),
  )?;
  manager.add_work_source(&keys::SECTORS, &[keys::GLOBAL_SECTORS.name()], SectorsSource::new(ctx))?;

  let n = ctx.config.sector_divisions as i32;
  manager.add_work_source(
    &keys::COMBINE_POINTS,
    &[keys::SECTORS.name()],
    FnWorkSource::new(move |deps: &WorkResults| -> BuildResult<_> {
      let raw = deps.get_result(&keys::SECTORS)?;
      let set = combine_points(&raw, n)?;
      info!(sectors = set.len(), points = set.point_count(), "points combined");
      Ok(set)
    }),
  )?;

  manager.add_work_source(
    &keys::BUILD_ACRES,
    &[keys::COMBINE_POINTS.name()],
    BuildAcresSource::new(ctx),
  )?;
  manager.add_work_source(&keys::ACRE_GRAPH, &[keys::BUILD_ACRES.name()], AcreGraphSource)?;
  manager.add_work_source(
    &keys::ACRE_SEAM_SEQUENCE,
    &[keys::ACRE_GRAPH.name()],
    SeamSequenceSource::new(ctx),
  )?;
  manager.add_work_source(
    &keys::TOPOGRAPHY,
    &[keys::ACRE_SEAM_SEQUENCE.name()],
    TopographySource::new(ctx),
  )?;
  manager.add_work_source(&keys::PUBLISH_ACRES, &[keys::TOPOGRAPHY.name()], PublishSource::new(ctx))?;
  manager.add_work_source(
    &keys::GLOBAL_VERTICES,
    &[keys::TOPOGRAPHY.name()],
    GlobalVerticesSource::new(ctx),
  )?;

  let validate_ctx = Arc::clone(ctx);
  manager.add_work_source(
    &keys::VALIDATE,
    &[keys::GLOBAL_VERTICES.name(), keys::PUBLISH_ACRES.name()],
    FnWorkSource::new(move |deps: &WorkResults| validate(&validate_ctx, deps)),
  )?;
  Ok(())
}

/// Queue `per_acre` over the packed graph in chunks of [`ACRES_PER_UNIT`].
fn queue_acre_chunks<F>(queue: &WorkQueue, graph: Arc<AcreGraph>, per_acre: F)
where
  F: Fn(&Acre) -> BuildResult<()> + Send + Sync + 'static,
{
  let per_acre = Arc::new(per_acre);
  for start in (0..graph.len()).step_by(ACRES_PER_UNIT) {
    let graph = Arc::clone(&graph);
    let per_acre = Arc::clone(&per_acre);
    queue.add_unit(move |_| {
      let end = (start + ACRES_PER_UNIT).min(graph.len());
      graph.acres[start..end].iter().try_for_each(|acre| per_acre(acre))
    });
  }
}

// =============================================================================
// Sectors
// =============================================================================

struct SectorsSource {
  g: u32,
  n: i32,
  raw: Arc<Mutex<Vec<RawSector>>>,
}

impl SectorsSource {
  fn new(ctx: &BuildContext) -> Self {
    Self {
      g: ctx.config.global_sector_divisions,
      n: ctx.config.sector_divisions as i32,
      raw: Arc::default(),
    }
  }
}

impl WorkSource for SectorsSource {
  type Output = Vec<RawSector>;

  fn add_work(&mut self, queue: &WorkQueue, deps: &WorkResults) -> BuildResult<()> {
    let globals = deps.get_result(&keys::GLOBAL_SECTORS)?;
    for index in 0..globals.len() {
      let (globals, raw, g, n) = (Arc::clone(&globals), Arc::clone(&self.raw), self.g, self.n);
      queue.add_unit(move |_| {
        let global = &globals[index];
        let sectors: Vec<RawSector> = (0..global.sector_count)
          .map(|local| raw_sector(global, local, g, n))
          .collect();
        raw.lock().unwrap_or_else(PoisonError::into_inner).extend(sectors);
        Ok(())
      });
    }
    Ok(())
  }

  fn finish(self: Box<Self>, _deps: &WorkResults) -> BuildResult<Vec<RawSector>> {
    let mut raw = std::mem::take(&mut *self.raw.lock().unwrap_or_else(PoisonError::into_inner));
    raw.sort_unstable_by_key(|r| r.id);
    info!(sectors = raw.len(), "sectors subdivided");
    Ok(raw)
  }
}

// =============================================================================
// Build acres
// =============================================================================

#[derive(Default)]
struct AcreCounters {
  inner: AtomicU64,
  dual_sector: AtomicU64,
  multi_sector: AtomicU64,
}

/// The four per-sector phases, in order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
  InnerAcres,
  Neighbors,
  EdgeAcres,
  CornerAcres,
}

impl Phase {
  fn next(self) -> Option<Phase> {
    match self {
      Phase::InnerAcres => Some(Phase::Neighbors),
      Phase::Neighbors => Some(Phase::EdgeAcres),
      Phase::EdgeAcres => Some(Phase::CornerAcres),
      Phase::CornerAcres => None,
    }
  }
}

/// One sector's progress through the phases.
struct SectorJob {
  id: SectorId,
  set: Arc<SectorSet>,
  ids: Arc<AcreSequence>,
  counters: Arc<AcreCounters>,
}

impl SectorJob {
  /// Run `phase` and queue the next one as a fresh unit.
  fn run(self, queue: &WorkQueue, phase: Phase) -> BuildResult<()> {
    let sector = self.set.sector(self.id);
    match phase {
      Phase::InnerAcres => {
        let built = build_inner_acres(sector, &self.ids)?;
        self.counters.inner.fetch_add(built as u64, Ordering::Relaxed);
        debug!(sector = self.id, built, "inner acres");
      }
      Phase::Neighbors => {
        discover_neighbors(&self.set, sector)?;
      }
      Phase::EdgeAcres => {
        let built = build_edge_acres(&self.set, sector, &self.ids)?;
        self.counters.dual_sector.fetch_add(built as u64, Ordering::Relaxed);
        debug!(sector = self.id, built, "edge acres");
      }
      Phase::CornerAcres => {
        let built = build_corner_acres(&self.set, sector, &self.ids)?;
        self.counters.multi_sector.fetch_add(built as u64, Ordering::Relaxed);
        debug!(sector = self.id, built, "corner acres");
      }
    }
    if let Some(next) = phase.next() {
      queue.add_unit(move |queue| self.run(queue, next));
    }
    Ok(())
  }
}

struct BuildAcresSource {
  ids: Arc<AcreSequence>,
  counters: Arc<AcreCounters>,
}

impl BuildAcresSource {
  fn new(ctx: &BuildContext) -> Self {
    Self {
      ids: Arc::clone(&ctx.acre_ids),
      counters: Arc::default(),
    }
  }
}

impl WorkSource for BuildAcresSource {
  type Output = AcreTotals;

  fn add_work(&mut self, queue: &WorkQueue, deps: &WorkResults) -> BuildResult<()> {
    let set = deps.get_result(&keys::COMBINE_POINTS)?;
    for id in 0..set.len() {
      let job = SectorJob {
        id,
        set: Arc::clone(&set),
        ids: Arc::clone(&self.ids),
        counters: Arc::clone(&self.counters),
      };
      queue.add_unit(move |queue| job.run(queue, Phase::InnerAcres));
    }
    Ok(())
  }

  fn finish(self: Box<Self>, _deps: &WorkResults) -> BuildResult<AcreTotals> {
    let totals = AcreTotals {
      inner: self.counters.inner.load(Ordering::Relaxed),
      dual_sector: self.counters.dual_sector.load(Ordering::Relaxed),
      multi_sector: self.counters.multi_sector.load(Ordering::Relaxed),
    };
    info!(
      acres = totals.total(),
      inner = totals.inner,
      dual_sector = totals.dual_sector,
      multi_sector = totals.multi_sector,
      "acres built"
    );
    Ok(totals)
  }
}

// =============================================================================
// Acre graph
// =============================================================================

struct AcreGraphSource;

impl WorkSource for AcreGraphSource {
  type Output = AcreGraph;

  fn add_work(&mut self, queue: &WorkQueue, deps: &WorkResults) -> BuildResult<()> {
    let set = deps.get_result(&keys::COMBINE_POINTS)?;
    for id in 0..set.len() {
      let set = Arc::clone(&set);
      queue.add_unit(move |_| link_sector(&set, set.sector(id)).map(|_| ()));
    }
    Ok(())
  }

  fn finish(self: Box<Self>, deps: &WorkResults) -> BuildResult<AcreGraph> {
    let set = deps.get_result(&keys::COMBINE_POINTS)?;
    let graph = pack_acres(&set)?;
    info!(acres = graph.len(), "acre graph packed");
    Ok(graph)
  }
}

// =============================================================================
// Acre seam sequence
// =============================================================================

struct SeamSequenceSource {
  spec: GeoSpec,
  assertions: bool,
  sequences: Arc<SeamSequences>,
}

impl SeamSequenceSource {
  fn new(ctx: &BuildContext) -> Self {
    Self {
      spec: ctx.spec,
      assertions: ctx.config.assertions,
      sequences: Arc::new(SeamSequences {
        seams: PointSequence::new("acre seams"),
        corners: PointSequence::new("acre corners"),
      }),
    }
  }
}

impl WorkSource for SeamSequenceSource {
  type Output = SeamSequences;

  fn add_work(&mut self, queue: &WorkQueue, deps: &WorkResults) -> BuildResult<()> {
    let graph = deps.get_result(&keys::ACRE_GRAPH)?;
    let sequences = Arc::clone(&self.sequences);
    queue_acre_chunks(queue, graph, move |acre| {
      for k in 0..acre.sides() {
        sequences.seams.touch(seam_midpoint(acre, k))?;
        sequences.corners.touch(acre.points()[k])?;
      }
      Ok(())
    });
    Ok(())
  }

  fn finish(self: Box<Self>, _deps: &WorkResults) -> BuildResult<SeamSequences> {
    let seams = self.sequences.seams.freeze(0)?;
    let corners = self.sequences.corners.freeze(0)?;
    info!(seams, corners, "seam sequences frozen");

    if self.assertions {
      for (what, actual, expected) in [
        ("acre seams", seams, self.spec.acre_seams()),
        ("acre corners", corners, self.spec.acre_corners()),
      ] {
        if actual != expected {
          return Err(BuildError::geometry(format!("{actual} {what} numbered, expected {expected}")));
        }
      }
    }

    Arc::try_unwrap(self.sequences)
      .map_err(|_| BuildError::geometry("seam sequences still shared after their units finished"))
  }
}

// =============================================================================
// Topography
// =============================================================================

struct TopographySource {
  layout: VertexIdLayout,
  vertices: Arc<AtomicU64>,
}

impl TopographySource {
  fn new(ctx: &BuildContext) -> Self {
    Self {
      layout: ctx.layout.clone(),
      vertices: Arc::default(),
    }
  }
}

impl WorkSource for TopographySource {
  type Output = u64;

  fn add_work(&mut self, queue: &WorkQueue, deps: &WorkResults) -> BuildResult<()> {
    let graph = deps.get_result(&keys::ACRE_GRAPH)?;
    let sequences = deps.get_result(&keys::ACRE_SEAM_SEQUENCE)?;
    let (layout, vertices) = (self.layout.clone(), Arc::clone(&self.vertices));
    queue_acre_chunks(queue, graph, move |acre| {
      let topography = build_topography(acre, &layout, &sequences.seams, &sequences.corners)?;
      vertices.fetch_add(topography.vertex_count(), Ordering::Relaxed);
      acre.set_topography(topography)
    });
    Ok(())
  }

  fn finish(self: Box<Self>, _deps: &WorkResults) -> BuildResult<u64> {
    let vertices = self.vertices.load(Ordering::Relaxed);
    info!(vertices, "topography assigned");
    Ok(vertices)
  }
}

// =============================================================================
// Publish / collect
// =============================================================================

struct PublishSource {
  consumer: Arc<dyn AcreConsumer>,
  published: Arc<AtomicU64>,
}

impl PublishSource {
  fn new(ctx: &BuildContext) -> Self {
    Self {
      consumer: Arc::clone(&ctx.consumer),
      published: Arc::default(),
    }
  }
}

impl WorkSource for PublishSource {
  type Output = u64;

  fn add_work(&mut self, queue: &WorkQueue, deps: &WorkResults) -> BuildResult<()> {
    let graph = deps.get_result(&keys::ACRE_GRAPH)?;
    let (consumer, published) = (Arc::clone(&self.consumer), Arc::clone(&self.published));
    queue_acre_chunks(queue, graph, move |acre| {
      consumer.consume(acre)?;
      published.fetch_add(1, Ordering::Relaxed);
      Ok(())
    });
    Ok(())
  }

  fn finish(self: Box<Self>, _deps: &WorkResults) -> BuildResult<u64> {
    let published = self.published.load(Ordering::Relaxed);
    info!(published, "acres published");
    Ok(published)
  }
}

struct GlobalVerticesSource {
  assertions: bool,
  counter: Arc<VertexCounter>,
}

impl GlobalVerticesSource {
  fn new(ctx: &BuildContext) -> Self {
    Self {
      assertions: ctx.config.assertions,
      counter: Arc::default(),
    }
  }
}

impl WorkSource for GlobalVerticesSource {
  type Output = Option<Arc<VertexCounter>>;

  fn add_work(&mut self, queue: &WorkQueue, deps: &WorkResults) -> BuildResult<()> {
    if !self.assertions {
      return Ok(());
    }
    VertexCounter::self_test()?;
    let graph = deps.get_result(&keys::ACRE_GRAPH)?;
    let counter = Arc::clone(&self.counter);
    queue_acre_chunks(queue, graph, move |acre| {
      let topography = acre
        .topography()
        .ok_or_else(|| BuildError::geometry(format!("acre {} has no topography", acre.id())))?;
      topography
        .runs()
        .try_for_each(|(start, len)| counter.touch_range(start, len))
    });
    Ok(())
  }

  fn finish(self: Box<Self>, _deps: &WorkResults) -> BuildResult<Option<Arc<VertexCounter>>> {
    if !self.assertions {
      return Ok(None);
    }
    info!(
      touches = self.counter.total_touches(),
      blocks = self.counter.block_count(),
      "global vertices collected"
    );
    Ok(Some(self.counter))
  }
}

// =============================================================================
// Validate
// =============================================================================

#[tracing::instrument(skip_all)]
fn validate(ctx: &BuildContext, deps: &WorkResults) -> BuildResult<ValidationReport> {
  let set = deps.get_result(&keys::COMBINE_POINTS)?;
  let graph = deps.get_result(&keys::ACRE_GRAPH)?;
  let published = deps.get_result(&keys::PUBLISH_ACRES)?;
  let counter = deps.get_result(&keys::GLOBAL_VERTICES)?;

  let mut report = ValidationReport::new(graph.len(), ctx.spec.acres());
  let unpublished = (*published != graph.len() as u64).then(|| {
    format!("{} of {} acres reached the consumer", published, graph.len())
  });
  report.record("publish", unpublished.into_iter().collect());

  if ctx.config.assertions {
    validator::check_graph(&mut report, &graph, &set, &ctx.layout, &ctx.spec);
  } else {
    report.record("acre counts", validator::graph::check_acre_counts(&graph, &ctx.spec));
  }
  if let Some(counter) = counter.as_deref() {
    let expected = ExpectedCounts::for_globe(&ctx.spec, &ctx.layout);
    report.set_histogram(VertexValidator::validate(counter, &expected));
  }

  if report.is_ok() {
    info!(checks = report.checks.len(), "validation passed");
  } else {
    warn!(errors = report.error_count, "validation failed");
  }
  Ok(report)
}
