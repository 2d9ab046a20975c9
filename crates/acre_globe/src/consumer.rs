//! Receivers for finished acres.

use std::sync::{Mutex, PoisonError};

use crate::acre::{Acre, AcreRecord};
use crate::error::BuildResult;

/// Called once per finished acre, from worker threads, after its pack id,
/// pack neighbors and topography are assigned. An error aborts the build.
pub trait AcreConsumer: Send + Sync {
  fn consume(&self, acre: &Acre) -> BuildResult<()>;
}

impl<F> AcreConsumer for F
where
  F: Fn(&Acre) -> BuildResult<()> + Send + Sync,
{
  fn consume(&self, acre: &Acre) -> BuildResult<()> {
    self(acre)
  }
}

/// Consumer that drops every acre.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardAcres;

impl AcreConsumer for DiscardAcres {
  fn consume(&self, _acre: &Acre) -> BuildResult<()> {
    Ok(())
  }
}

/// Consumer keeping the record of every acre it sees.
#[derive(Debug, Default)]
pub struct RecordCollector {
  records: Mutex<Vec<AcreRecord>>,
}

impl RecordCollector {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn len(&self) -> usize {
    self.records.lock().unwrap_or_else(PoisonError::into_inner).len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Copy of the records, sorted by pack id.
  pub fn records(&self) -> Vec<AcreRecord> {
    let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner).clone();
    records.sort_unstable_by_key(|r| r.pack_id);
    records
  }
}

impl AcreConsumer for RecordCollector {
  fn consume(&self, acre: &Acre) -> BuildResult<()> {
    let record = acre.record();
    self.records.lock().unwrap_or_else(PoisonError::into_inner).push(record);
    Ok(())
  }
}
