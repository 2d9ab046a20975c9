//! Dependency-ordered work scheduler.
//!
//! Every stage of a globe build is a *work source*: a named producer of one
//! result that may depend on the results of other sources.
//!
//! ```text
//!   register ──► start ──► deps done? ──► add_work (queues units) ──► units run
//!                              ▲                                          │
//!                              │            all units finished ◄──────────┘
//!                              │                    │
//!                              └── dependents ◄── finish ──► named result
//! ```
//!
//! # Execution
//!
//! - Units from every source share one queue, drained by a fixed pool of
//!   worker threads.
//! - A unit may queue more units; they count toward the same source.
//! - [`WorkResults::get_result`] blocks until a result exists and runs queued
//!   units on the calling thread while it waits.
//! - The first failing unit (error or panic) is fatal: remaining units are
//!   skipped and every waiter receives that error.
//!
//! No ordering is implied between independent sources.

mod manager;

pub use manager::{RunningWork, WorkManager, WorkProgress, WorkQueue, WorkResults};

use std::fmt;
use std::marker::PhantomData;

use crate::error::BuildResult;

/// Typed name of a work source's result.
pub struct WorkSourceKey<T> {
  name: &'static str,
  _marker: PhantomData<fn() -> T>,
}

impl<T> WorkSourceKey<T> {
  pub const fn new(name: &'static str) -> Self {
    Self {
      name,
      _marker: PhantomData,
    }
  }

  #[inline]
  pub fn name(&self) -> &'static str {
    self.name
  }
}

impl<T> Clone for WorkSourceKey<T> {
  fn clone(&self) -> Self {
    *self
  }
}

impl<T> Copy for WorkSourceKey<T> {}

impl<T> fmt::Debug for WorkSourceKey<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "WorkSourceKey({})", self.name)
  }
}

/// A producer of one named result.
pub trait WorkSource: Send + 'static {
  type Output: Send + Sync + 'static;

  /// Runs once, after every dependency has a result. May queue units.
  fn add_work(&mut self, queue: &WorkQueue, deps: &WorkResults) -> BuildResult<()>;

  /// Runs once, after every unit this source queued has finished.
  fn finish(self: Box<Self>, deps: &WorkResults) -> BuildResult<Self::Output>;
}

/// Source computing its result in a single step, without queuing units.
pub struct FnWorkSource<F> {
  compute: F,
}

impl<F> FnWorkSource<F> {
  pub fn new<T>(compute: F) -> Self
  where
    F: FnOnce(&WorkResults) -> BuildResult<T> + Send + 'static,
    T: Send + Sync + 'static,
  {
    Self { compute }
  }
}

impl<F, T> WorkSource for FnWorkSource<F>
where
  F: FnOnce(&WorkResults) -> BuildResult<T> + Send + 'static,
  T: Send + Sync + 'static,
{
  type Output = T;

  fn add_work(&mut self, _queue: &WorkQueue, _deps: &WorkResults) -> BuildResult<()> {
    Ok(())
  }

  fn finish(self: Box<Self>, deps: &WorkResults) -> BuildResult<T> {
    (self.compute)(deps)
  }
}

#[cfg(test)]
#[path = "manager_test.rs"]
mod manager_test;
