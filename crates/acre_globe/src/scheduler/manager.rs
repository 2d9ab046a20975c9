//! Work manager: registration, dependency tracking and the shared queue.

use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use web_time::Instant;

use super::{WorkSource, WorkSourceKey};
use crate::error::{BuildError, BuildResult};
use crate::metrics::StageTiming;

/// How long an idle worker blocks on the queue before re-checking shutdown.
const IDLE_POLL: Duration = Duration::from_millis(20);

/// How long a blocked `get_result` sleeps before looking for queued units.
const WAIT_SLICE: Duration = Duration::from_millis(2);

const STATE_WAITING: u8 = 0;
const STATE_STARTED: u8 = 1;
const STATE_COMPLETE: u8 = 2;
const STATE_FAILED: u8 = 3;

type Unit = Box<dyn FnOnce(&WorkQueue) -> BuildResult<()> + Send>;
type ResultValue = Arc<dyn Any + Send + Sync>;

struct Job {
  source: usize,
  unit: Unit,
}

// =============================================================================
// Type erasure
// =============================================================================

trait ErasedSource: Send {
  fn add_work(&mut self, queue: &WorkQueue, deps: &WorkResults) -> BuildResult<()>;
  fn finish(self: Box<Self>, deps: &WorkResults) -> BuildResult<ResultValue>;
}

impl<S: WorkSource> ErasedSource for S {
  fn add_work(&mut self, queue: &WorkQueue, deps: &WorkResults) -> BuildResult<()> {
    WorkSource::add_work(self, queue, deps)
  }

  fn finish(self: Box<Self>, deps: &WorkResults) -> BuildResult<ResultValue> {
    let value = WorkSource::finish(self, deps)?;
    Ok(Arc::new(value))
  }
}

// =============================================================================
// Shared state
// =============================================================================

struct SourceSlot {
  name: &'static str,
  dependents: Vec<usize>,
  /// Dependencies without a result yet.
  unmet: AtomicUsize,
  /// Queued or running units, including the `add_work` call itself.
  pending: AtomicUsize,
  state: AtomicU8,
  started_at: Mutex<Option<Instant>>,
  source: Mutex<Option<Box<dyn ErasedSource>>>,
}

struct Shared {
  slots: Vec<SourceSlot>,
  index: HashMap<&'static str, usize>,
  sender: Sender<Job>,
  receiver: Receiver<Job>,
  results: Mutex<HashMap<usize, ResultValue>>,
  changed: Condvar,
  failure: Mutex<Option<BuildError>>,
  failed: AtomicBool,
  shutdown: AtomicBool,
  units_run: AtomicU64,
  timings: Mutex<Vec<StageTiming>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
  mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
  fn first_failure(&self) -> Option<BuildError> {
    if self.failed.load(Ordering::Acquire) {
      lock(&self.failure).clone()
    } else {
      None
    }
  }

  fn enqueue(&self, source: usize, unit: Unit) {
    self.slots[source].pending.fetch_add(1, Ordering::AcqRel);
    // The receiver lives in `self`, so the channel is never disconnected.
    let _ = self.sender.send(Job { source, unit });
  }
}

fn start_source(shared: &Arc<Shared>, index: usize) {
  let slot = &shared.slots[index];
  slot.state.store(STATE_STARTED, Ordering::Release);
  *lock(&slot.started_at) = Some(Instant::now());
  tracing::debug!(source = slot.name, "work source started");

  shared.enqueue(
    index,
    Box::new(move |queue: &WorkQueue| {
      let shared = &queue.shared;
      let deps = WorkResults {
        shared: Arc::clone(shared),
      };
      let mut guard = lock(&shared.slots[index].source);
      match guard.as_mut() {
        Some(source) => source.add_work(queue, &deps),
        None => Err(BuildError::DuplicateRegistration(format!(
          "work source `{}` started twice",
          shared.slots[index].name
        ))),
      }
    }),
  );
}

fn run_job(shared: &Arc<Shared>, job: Job) {
  if shared.failed.load(Ordering::Acquire) {
    return;
  }
  let Job { source, unit } = job;
  let queue = WorkQueue {
    shared: Arc::clone(shared),
    source,
  };
  let outcome = panic::catch_unwind(AssertUnwindSafe(|| unit(&queue)));
  shared.units_run.fetch_add(1, Ordering::Relaxed);

  match outcome {
    Ok(Ok(())) => {
      if shared.slots[source].pending.fetch_sub(1, Ordering::AcqRel) == 1 {
        finish_source(shared, source);
      }
    }
    Ok(Err(err)) => fail(shared, source, err),
    Err(payload) => fail(shared, source, panicked(shared.slots[source].name, payload)),
  }
}

fn finish_source(shared: &Arc<Shared>, index: usize) {
  let slot = &shared.slots[index];
  let Some(source) = lock(&slot.source).take() else {
    return fail(
      shared,
      index,
      BuildError::DuplicateRegistration(format!("work source `{}` finished twice", slot.name)),
    );
  };
  let deps = WorkResults {
    shared: Arc::clone(shared),
  };

  let value = match panic::catch_unwind(AssertUnwindSafe(|| source.finish(&deps))) {
    Ok(Ok(value)) => value,
    Ok(Err(err)) => return fail(shared, index, err),
    Err(payload) => return fail(shared, index, panicked(slot.name, payload)),
  };

  let started = *lock(&slot.started_at);
  let elapsed = started.map(|t| t.elapsed()).unwrap_or_default();
  lock(&shared.timings).push(StageTiming {
    name: slot.name,
    duration_us: elapsed.as_micros() as u64,
  });
  tracing::debug!(source = slot.name, elapsed_ms = elapsed.as_millis() as u64, "work source complete");

  {
    let mut results = lock(&shared.results);
    results.insert(index, value);
    slot.state.store(STATE_COMPLETE, Ordering::Release);
    shared.changed.notify_all();
  }

  for &dependent in &slot.dependents {
    if shared.slots[dependent].unmet.fetch_sub(1, Ordering::AcqRel) == 1 {
      start_source(shared, dependent);
    }
  }
}

fn fail(shared: &Shared, index: usize, err: BuildError) {
  let slot = &shared.slots[index];
  slot.state.store(STATE_FAILED, Ordering::Release);
  {
    let mut failure = lock(&shared.failure);
    if failure.is_none() {
      tracing::error!(source = slot.name, error = %err, "work source failed");
      *failure = Some(err);
    }
  }
  shared.failed.store(true, Ordering::Release);
  let _results = lock(&shared.results);
  shared.changed.notify_all();
}

fn panicked(name: &'static str, payload: Box<dyn Any + Send>) -> BuildError {
  let message = if let Some(s) = payload.downcast_ref::<&str>() {
    (*s).to_string()
  } else if let Some(s) = payload.downcast_ref::<String>() {
    s.clone()
  } else {
    "unknown panic payload".to_string()
  };
  BuildError::WorkUnitPanicked {
    source_name: name.to_string(),
    message,
  }
}

fn worker_loop(shared: Arc<Shared>) {
  while !shared.shutdown.load(Ordering::Acquire) {
    match shared.receiver.recv_timeout(IDLE_POLL) {
      Ok(job) => run_job(&shared, job),
      Err(RecvTimeoutError::Timeout) => continue,
      Err(RecvTimeoutError::Disconnected) => break,
    }
  }
}

// =============================================================================
// Public handles
// =============================================================================

/// Handle for queuing units on behalf of one work source.
#[derive(Clone)]
pub struct WorkQueue {
  shared: Arc<Shared>,
  source: usize,
}

impl WorkQueue {
  /// Queue a unit attributed to this queue's source.
  pub fn add_unit<F>(&self, unit: F)
  where
    F: FnOnce(&WorkQueue) -> BuildResult<()> + Send + 'static,
  {
    self.shared.enqueue(self.source, Box::new(unit));
  }

  /// Name of the source this queue feeds.
  pub fn source_name(&self) -> &'static str {
    self.shared.slots[self.source].name
  }

  /// Result access from inside a unit.
  pub fn results(&self) -> WorkResults {
    WorkResults {
      shared: Arc::clone(&self.shared),
    }
  }
}

/// Blocking access to named results.
#[derive(Clone)]
pub struct WorkResults {
  shared: Arc<Shared>,
}

impl WorkResults {
  /// Block until `key` has a result, running queued units meanwhile.
  pub fn get_result<T: Send + Sync + 'static>(&self, key: &WorkSourceKey<T>) -> BuildResult<Arc<T>> {
    let shared = &self.shared;
    let index = *shared
      .index
      .get(key.name())
      .ok_or_else(|| BuildError::UnknownWorkSource(key.name().to_string()))?;

    loop {
      if let Some(err) = shared.first_failure() {
        return Err(err);
      }
      if let Some(value) = lock(&shared.results).get(&index) {
        return Arc::clone(value)
          .downcast::<T>()
          .map_err(|_| BuildError::ResultType {
            source_name: key.name().to_string(),
          });
      }
      match shared.receiver.try_recv() {
        Ok(job) => run_job(shared, job),
        Err(_) => {
          let results = lock(&shared.results);
          if !results.contains_key(&index) && !shared.failed.load(Ordering::Acquire) {
            let _ = shared.changed.wait_timeout(results, WAIT_SLICE);
          }
        }
      }
    }
  }

  /// Whether `key` already has a result (non-blocking).
  pub fn is_ready<T>(&self, key: &WorkSourceKey<T>) -> bool {
    match self.shared.index.get(key.name()) {
      Some(index) => lock(&self.shared.results).contains_key(index),
      None => false,
    }
  }
}

/// Snapshot of scheduler progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkProgress {
  pub sources_complete: usize,
  pub sources_failed: usize,
  pub sources_total: usize,
  pub units_run: u64,
}

// =============================================================================
// WorkManager
// =============================================================================

struct Registration {
  name: &'static str,
  dependencies: Vec<&'static str>,
  source: Box<dyn ErasedSource>,
}

/// Collects work sources, then starts the worker pool.
pub struct WorkManager {
  threads: usize,
  registrations: Vec<Registration>,
}

impl Default for WorkManager {
  fn default() -> Self {
    Self::new(rayon::current_num_threads())
  }
}

impl WorkManager {
  /// `threads` workers pull from the queue; with 0 only callers blocked in
  /// `get_result` run units.
  pub fn new(threads: usize) -> Self {
    Self {
      threads,
      registrations: Vec::new(),
    }
  }

  /// Register `source` under `key`, to start once every named dependency
  /// has a result.
  pub fn add_work_source<S: WorkSource>(
    &mut self,
    key: &WorkSourceKey<S::Output>,
    dependencies: &[&'static str],
    source: S,
  ) -> BuildResult<()> {
    if self.registrations.iter().any(|r| r.name == key.name()) {
      return Err(BuildError::DuplicateWorkSource(key.name().to_string()));
    }
    self.registrations.push(Registration {
      name: key.name(),
      dependencies: dependencies.to_vec(),
      source: Box::new(source),
    });
    Ok(())
  }

  /// Validate the dependency graph, spawn workers and queue every source
  /// without dependencies.
  pub fn start(self) -> BuildResult<RunningWork> {
    let index: HashMap<&'static str, usize> = self
      .registrations
      .iter()
      .enumerate()
      .map(|(i, r)| (r.name, i))
      .collect();

    let mut edges: Vec<Vec<usize>> = Vec::with_capacity(self.registrations.len());
    for registration in &self.registrations {
      let mut deps = Vec::with_capacity(registration.dependencies.len());
      for name in &registration.dependencies {
        let dep = index
          .get(name)
          .ok_or_else(|| BuildError::UnknownWorkSource(name.to_string()))?;
        deps.push(*dep);
      }
      edges.push(deps);
    }
    if let Some(looped) = find_cycle(&edges) {
      return Err(BuildError::CircularDependency(
        self.registrations[looped].name.to_string(),
      ));
    }

    let mut dependents = vec![Vec::new(); edges.len()];
    for (i, deps) in edges.iter().enumerate() {
      for &dep in deps {
        dependents[dep].push(i);
      }
    }

    let slots: Vec<SourceSlot> = self
      .registrations
      .into_iter()
      .zip(dependents)
      .zip(&edges)
      .map(|((registration, dependents), deps)| SourceSlot {
        name: registration.name,
        dependents,
        unmet: AtomicUsize::new(deps.len()),
        pending: AtomicUsize::new(0),
        state: AtomicU8::new(STATE_WAITING),
        started_at: Mutex::new(None),
        source: Mutex::new(Some(registration.source)),
      })
      .collect();

    let (sender, receiver) = crossbeam_channel::unbounded();
    let shared = Arc::new(Shared {
      slots,
      index,
      sender,
      receiver,
      results: Mutex::new(HashMap::new()),
      changed: Condvar::new(),
      failure: Mutex::new(None),
      failed: AtomicBool::new(false),
      shutdown: AtomicBool::new(false),
      units_run: AtomicU64::new(0),
      timings: Mutex::new(Vec::new()),
    });

    let mut running = RunningWork {
      shared: Arc::clone(&shared),
      workers: Vec::with_capacity(self.threads),
    };
    for i in 0..self.threads {
      let worker_shared = Arc::clone(&shared);
      let handle = std::thread::Builder::new()
        .name(format!("globe-worker-{i}"))
        .spawn(move || worker_loop(worker_shared))
        .map_err(|e| BuildError::Config(format!("failed to spawn worker thread: {e}")))?;
      running.workers.push(handle);
    }
    tracing::debug!(threads = self.threads, sources = edges.len(), "work manager started");

    for (i, deps) in edges.iter().enumerate() {
      if deps.is_empty() {
        start_source(&shared, i);
      }
    }
    Ok(running)
  }
}

/// Index of a source on a dependency cycle, if any.
fn find_cycle(edges: &[Vec<usize>]) -> Option<usize> {
  // 0 = unvisited, 1 = on the current path, 2 = done
  fn visit(node: usize, edges: &[Vec<usize>], marks: &mut [u8]) -> Option<usize> {
    match marks[node] {
      1 => return Some(node),
      2 => return None,
      _ => {}
    }
    marks[node] = 1;
    for &dep in &edges[node] {
      if let Some(found) = visit(dep, edges, marks) {
        return Some(found);
      }
    }
    marks[node] = 2;
    None
  }

  let mut marks = vec![0u8; edges.len()];
  (0..edges.len()).find_map(|node| visit(node, edges, &mut marks))
}

/// A started scheduler. Dropping it stops and joins the workers.
pub struct RunningWork {
  shared: Arc<Shared>,
  workers: Vec<JoinHandle<()>>,
}

impl RunningWork {
  pub fn results(&self) -> WorkResults {
    WorkResults {
      shared: Arc::clone(&self.shared),
    }
  }

  /// Shorthand for `results().get_result(key)`.
  pub fn get_result<T: Send + Sync + 'static>(&self, key: &WorkSourceKey<T>) -> BuildResult<Arc<T>> {
    self.results().get_result(key)
  }

  pub fn worker_count(&self) -> usize {
    self.workers.len()
  }

  pub fn progress(&self) -> WorkProgress {
    let states = self.shared.slots.iter().map(|s| s.state.load(Ordering::Acquire));
    let (complete, failed) = states.fold((0, 0), |(c, f), s| match s {
      STATE_COMPLETE => (c + 1, f),
      STATE_FAILED => (c, f + 1),
      _ => (c, f),
    });
    WorkProgress {
      sources_complete: complete,
      sources_failed: failed,
      sources_total: self.shared.slots.len(),
      units_run: self.shared.units_run.load(Ordering::Relaxed),
    }
  }

  /// Wall-clock time of each completed source, in completion order.
  pub fn timings(&self) -> Vec<StageTiming> {
    lock(&self.shared.timings).clone()
  }
}

impl Drop for RunningWork {
  fn drop(&mut self) {
    self.shared.shutdown.store(true, Ordering::Release);
    for handle in self.workers.drain(..) {
      let _ = handle.join();
    }
  }
}
