use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::*;
use crate::error::BuildError;

const NUMBERS: WorkSourceKey<Vec<u32>> = WorkSourceKey::new("numbers");
const SUM: WorkSourceKey<u32> = WorkSourceKey::new("sum");
const FANOUT: WorkSourceKey<usize> = WorkSourceKey::new("fanout");

/// Queues `width` units, each of which queues `width` more, and reports how
/// many ran.
struct FanOut {
  width: usize,
  ran: Arc<AtomicUsize>,
}

impl WorkSource for FanOut {
  type Output = usize;

  fn add_work(&mut self, queue: &WorkQueue, _deps: &WorkResults) -> BuildResult<()> {
    for _ in 0..self.width {
      let ran = Arc::clone(&self.ran);
      let width = self.width;
      queue.add_unit(move |queue| {
        ran.fetch_add(1, Ordering::Relaxed);
        for _ in 0..width {
          let ran = Arc::clone(&ran);
          queue.add_unit(move |_| {
            ran.fetch_add(1, Ordering::Relaxed);
            Ok(())
          });
        }
        Ok(())
      });
    }
    Ok(())
  }

  fn finish(self: Box<Self>, _deps: &WorkResults) -> BuildResult<usize> {
    Ok(self.ran.load(Ordering::Relaxed))
  }
}

/// Source whose single unit runs `unit`.
struct OneUnit<F> {
  unit: Option<F>,
}

impl<F> WorkSource for OneUnit<F>
where
  F: FnOnce() -> BuildResult<()> + Send + 'static,
{
  type Output = ();

  fn add_work(&mut self, queue: &WorkQueue, _deps: &WorkResults) -> BuildResult<()> {
    if let Some(unit) = self.unit.take() {
      queue.add_unit(move |_| unit());
    }
    Ok(())
  }

  fn finish(self: Box<Self>, _deps: &WorkResults) -> BuildResult<()> {
    Ok(())
  }
}

fn numbers_then_sum(threads: usize) -> WorkManager {
  let mut manager = WorkManager::new(threads);
  // Registered out of order on purpose.
  manager
    .add_work_source(
      &SUM,
      &["numbers"],
      FnWorkSource::new(|deps: &WorkResults| Ok(deps.get_result(&NUMBERS)?.iter().sum::<u32>())),
    )
    .unwrap();
  manager
    .add_work_source(&NUMBERS, &[], FnWorkSource::new(|_: &WorkResults| Ok(vec![1, 2, 3, 4])))
    .unwrap();
  manager
}

#[test]
fn test_dependent_source_sees_prerequisite_result() {
  let running = numbers_then_sum(2).start().unwrap();
  assert_eq!(*running.get_result(&SUM).unwrap(), 10);
  assert_eq!(*running.get_result(&NUMBERS).unwrap(), vec![1, 2, 3, 4]);
}

#[test]
fn test_zero_threads_runs_on_caller() {
  let running = numbers_then_sum(0).start().unwrap();
  assert_eq!(running.worker_count(), 0);
  assert_eq!(*running.get_result(&SUM).unwrap(), 10);
}

#[test]
fn test_units_queued_by_units_count_toward_source() {
  for threads in [0, 1, 4] {
    let mut manager = WorkManager::new(threads);
    let fanout = FanOut {
      width: 10,
      ran: Arc::new(AtomicUsize::new(0)),
    };
    manager.add_work_source(&FANOUT, &[], fanout).unwrap();
    let running = manager.start().unwrap();
    assert_eq!(*running.get_result(&FANOUT).unwrap(), 110, "threads = {threads}");
  }
}

#[test]
fn test_source_waits_for_every_dependency() {
  let mut manager = WorkManager::new(3);
  let ran = Arc::new(AtomicUsize::new(0));
  manager
    .add_work_source(
      &FANOUT,
      &[],
      FanOut {
        width: 8,
        ran: Arc::clone(&ran),
      },
    )
    .unwrap();
  manager
    .add_work_source(&NUMBERS, &[], FnWorkSource::new(|_: &WorkResults| Ok(vec![5])))
    .unwrap();
  let seen = Arc::clone(&ran);
  manager
    .add_work_source(
      &SUM,
      &["fanout", "numbers"],
      FnWorkSource::new(move |deps: &WorkResults| {
        // Both prerequisites must already be final.
        assert_eq!(seen.load(Ordering::Relaxed), 72);
        assert!(deps.is_ready(&FANOUT));
        Ok(deps.get_result(&NUMBERS)?[0])
      }),
    )
    .unwrap();

  let running = manager.start().unwrap();
  assert_eq!(*running.get_result(&SUM).unwrap(), 5);
}

#[test]
fn test_unit_error_reaches_every_waiter() {
  let mut manager = WorkManager::new(2);
  manager
    .add_work_source(
      &WorkSourceKey::<()>::new("broken"),
      &[],
      OneUnit {
        unit: Some(|| -> BuildResult<()> { Err(BuildError::geometry("fan is not closed")) }),
      },
    )
    .unwrap();
  manager
    .add_work_source(&SUM, &["broken"], FnWorkSource::new(|_: &WorkResults| Ok(1)))
    .unwrap();

  let running = manager.start().unwrap();
  let expected = BuildError::geometry("fan is not closed");
  assert_eq!(running.get_result(&SUM).unwrap_err(), expected);
  assert_eq!(
    running.get_result(&WorkSourceKey::<()>::new("broken")).unwrap_err(),
    expected
  );
  assert_eq!(running.progress().sources_failed, 1);
}

#[test]
fn test_unit_panic_becomes_error() {
  let mut manager = WorkManager::new(1);
  let key = WorkSourceKey::<()>::new("panics");
  manager
    .add_work_source(
      &key,
      &[],
      OneUnit {
        unit: Some(|| -> BuildResult<()> { panic!("lattice exploded") }),
      },
    )
    .unwrap();

  let running = manager.start().unwrap();
  match running.get_result(&key) {
    Err(BuildError::WorkUnitPanicked { source_name, message }) => {
      assert_eq!(source_name, "panics");
      assert!(message.contains("lattice exploded"));
    }
    other => panic!("expected a panic error, got {other:?}"),
  }
}

#[test]
fn test_registration_errors() {
  let mut manager = WorkManager::new(0);
  manager
    .add_work_source(&SUM, &["missing"], FnWorkSource::new(|_: &WorkResults| Ok(0)))
    .unwrap();
  assert!(matches!(
    manager.start(),
    Err(BuildError::UnknownWorkSource(name)) if name == "missing"
  ));

  let mut manager = WorkManager::new(0);
  manager
    .add_work_source(&SUM, &[], FnWorkSource::new(|_: &WorkResults| Ok(0)))
    .unwrap();
  let again = manager.add_work_source(&SUM, &[], FnWorkSource::new(|_: &WorkResults| Ok(1)));
  assert_eq!(again, Err(BuildError::DuplicateWorkSource("sum".into())));
}

#[test]
fn test_cycle_is_rejected() {
  let mut manager = WorkManager::new(0);
  manager
    .add_work_source(&SUM, &["numbers"], FnWorkSource::new(|_: &WorkResults| Ok(0)))
    .unwrap();
  manager
    .add_work_source(&NUMBERS, &["sum"], FnWorkSource::new(|_: &WorkResults| Ok(vec![])))
    .unwrap();
  assert!(matches!(manager.start(), Err(BuildError::CircularDependency(_))));
}

#[test]
fn test_wrong_result_type_and_unknown_key() {
  let running = numbers_then_sum(1).start().unwrap();
  let wrong = WorkSourceKey::<String>::new("sum");
  assert_eq!(
    running.get_result(&wrong).unwrap_err(),
    BuildError::ResultType {
      source_name: "sum".into()
    }
  );
  let unknown = WorkSourceKey::<u32>::new("nope");
  assert_eq!(
    running.get_result(&unknown).unwrap_err(),
    BuildError::UnknownWorkSource("nope".into())
  );
}

#[test]
fn test_progress_and_timings() {
  let running = numbers_then_sum(2).start().unwrap();
  running.get_result(&SUM).unwrap();

  let progress = running.progress();
  assert_eq!(progress.sources_total, 2);
  assert_eq!(progress.sources_complete, 2);
  assert_eq!(progress.sources_failed, 0);
  // One add_work unit per source.
  assert_eq!(progress.units_run, 2);

  let names: Vec<_> = running.timings().iter().map(|t| t.name).collect();
  assert_eq!(names, vec!["numbers", "sum"]);
}
