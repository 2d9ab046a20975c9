//! Error taxonomy for globe builds.
//!
//! Structural errors (impossible topology, duplicate registration, frozen
//! writes) abort the scheduler and surface through every blocked
//! `get_result` caller. Count and reciprocity mismatches are not errors: they
//! are collected into a [`ValidationReport`](crate::validator::ValidationReport).

use thiserror::Error;

/// Fatal build error.
///
/// `Clone` because the scheduler hands the first recorded failure to every
/// thread waiting on a result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
  #[error("invalid configuration: {0}")]
  Config(String),

  /// Malformed topology: wrong neighbor counts, broken triangle fans.
  #[error("geometry error: {0}")]
  Geometry(String),

  #[error("duplicate registration: {0}")]
  DuplicateRegistration(String),

  #[error("sequence `{0}` is frozen and no longer accepts writes")]
  FrozenWrite(&'static str),

  #[error("sequence `{0}` has not been frozen yet")]
  NotFrozen(&'static str),

  #[error("position {0} lies outside the spatial map bounds")]
  OutOfBounds(String),

  #[error("unknown work source `{0}`")]
  UnknownWorkSource(String),

  #[error("work source `{0}` registered twice")]
  DuplicateWorkSource(String),

  #[error("circular dependency through work source `{0}`")]
  CircularDependency(String),

  #[error("work source `{source_name}` produced a result of an unexpected type")]
  ResultType { source_name: String },

  #[error("work unit of `{source_name}` panicked: {message}")]
  WorkUnitPanicked { source_name: String, message: String },

  #[error("vertex id {0} exceeds the counter limit")]
  VertexIdOutOfRange(u64),

  #[error("acre sink failed: {0}")]
  Sink(String),
}

/// Result alias used throughout the crate.
pub type BuildResult<T> = Result<T, BuildError>;

impl BuildError {
  /// Shorthand for [`BuildError::Geometry`].
  pub fn geometry(message: impl Into<String>) -> Self {
    BuildError::Geometry(message.into())
  }
}
