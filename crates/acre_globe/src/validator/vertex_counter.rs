//! Sparse saturating touch counter over vertex ids.
//!
//! Sixteen 4-bit counters share one `AtomicU64`; 256 words form a block
//! covering one [`VERTEX_BLOCK_SIZE`] range of 4096 ids. Blocks are allocated
//! on first touch and found through a key map, so a counter over a sparse id
//! space only pays for the blocks actually used.
//!
//! ```text
//!   id ──► block = id >> 12 ──► word = (id & 0xFFF) >> 4 ──► nibble = id & 15
//! ```
//!
//! A counter saturates at 15 and stays there.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

pub use crate::constants::VERTEX_COUNTER_LIMIT;
use crate::constants::{VERTEX_BLOCK_SIZE, VERTEX_INDEX_MASK};
use crate::error::{BuildError, BuildResult};

/// Value a nibble sticks at.
pub const SATURATED: u8 = 15;

const IDS_PER_WORD: u64 = 16;
const WORDS_PER_BLOCK: usize = (VERTEX_BLOCK_SIZE / IDS_PER_WORD) as usize;
/// Lowest bit of every nibble.
const NIBBLE_ONES: u64 = 0x1111_1111_1111_1111;

/// Patterns run by [`VertexCounter::self_test`] with their expected
/// histograms as `(count, ids)` pairs.
pub const SELF_TEST_PATTERNS: [(&str, &[(usize, u64)]); 2] = [
  ("[1..5];[2..6];[3..7];[4..8];[5..9]", &[(1, 2), (2, 2), (3, 2), (4, 2), (5, 1)]),
  ("[1..999];[500..599]", &[(1, 899), (2, 100)]),
];

struct Block {
  words: Box<[AtomicU64]>,
}

impl Block {
  fn new() -> Self {
    Self {
      words: (0..WORDS_PER_BLOCK).map(|_| AtomicU64::new(0)).collect(),
    }
  }

  /// Add one to every nibble set in `increment` that is not saturated.
  fn add(&self, word: usize, increment: u64) {
    let cell = &self.words[word];
    let mut current = cell.load(Ordering::Relaxed);
    loop {
      let saturated = current & (current >> 1) & (current >> 2) & (current >> 3) & NIBBLE_ONES;
      // Fast path adds the whole mask; otherwise only the ids below 15.
      let step = if saturated & increment == 0 {
        increment
      } else {
        increment & !saturated
      };
      if step == 0 {
        return;
      }
      match cell.compare_exchange_weak(current, current + step, Ordering::AcqRel, Ordering::Relaxed) {
        Ok(_) => return,
        Err(actual) => current = actual,
      }
    }
  }
}

/// Concurrent per-id touch counter.
#[derive(Default)]
pub struct VertexCounter {
  blocks: RwLock<BTreeMap<u64, Arc<Block>>>,
  touches: AtomicU64,
}

impl VertexCounter {
  pub fn new() -> Self {
    Self::default()
  }

  #[inline]
  pub fn touch(&self, id: u64) -> BuildResult<()> {
    self.touch_range(id, 1)
  }

  /// Count one touch of every id in `start..start + len`.
  pub fn touch_range(&self, start: u64, len: u64) -> BuildResult<()> {
    if len == 0 {
      return Ok(());
    }
    let last = start
      .checked_add(len - 1)
      .filter(|&last| last <= VERTEX_COUNTER_LIMIT)
      .ok_or_else(|| BuildError::VertexIdOutOfRange(start.saturating_add(len - 1)))?;
    let end = last + 1;

    let mut id = start;
    while id < end {
      let key = id / VERTEX_BLOCK_SIZE;
      let block = self.block(key);
      let block_end = ((key + 1) * VERTEX_BLOCK_SIZE).min(end);
      while id < block_end {
        let word = ((id & VERTEX_INDEX_MASK) / IDS_PER_WORD) as usize;
        let first = id % IDS_PER_WORD;
        let stop = (first + (block_end - id)).min(IDS_PER_WORD);
        block.add(word, nibble_mask(first, stop));
        id += stop - first;
      }
    }
    self.touches.fetch_add(len, Ordering::Relaxed);
    Ok(())
  }

  /// Touches recorded, counting every id of every range.
  pub fn total_touches(&self) -> u64 {
    self.touches.load(Ordering::Relaxed)
  }

  /// Current count of one id.
  pub fn count(&self, id: u64) -> u8 {
    let blocks = self.blocks.read().unwrap_or_else(PoisonError::into_inner);
    blocks.get(&(id / VERTEX_BLOCK_SIZE)).map_or(0, |block| {
      let word = block.words[((id & VERTEX_INDEX_MASK) / IDS_PER_WORD) as usize].load(Ordering::Acquire);
      ((word >> (4 * (id % IDS_PER_WORD))) & 0xF) as u8
    })
  }

  /// Blocks allocated so far.
  pub fn block_count(&self) -> usize {
    self.blocks.read().unwrap_or_else(PoisonError::into_inner).len()
  }

  /// Histogram of counts: `counts[c]` ids were touched `c` times. Bucket 0
  /// only covers ids inside allocated blocks; bucket 15 means "15 or more".
  pub fn tally_counts(&self) -> [u64; 16] {
    let blocks: Vec<Arc<Block>> = self
      .blocks
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .values()
      .cloned()
      .collect();

    let mut counts = [0u64; 16];
    for block in &blocks {
      for cell in block.words.iter() {
        let mut word = cell.load(Ordering::Acquire);
        if word == 0 {
          counts[0] += IDS_PER_WORD;
          continue;
        }
        for _ in 0..IDS_PER_WORD {
          counts[(word & 0xF) as usize] += 1;
          word >>= 4;
        }
      }
    }
    counts
  }

  /// Run the built-in range patterns on fresh counters and compare their
  /// histograms.
  pub fn self_test() -> BuildResult<()> {
    for (pattern, expected) in SELF_TEST_PATTERNS {
      let counter = VertexCounter::new();
      for (start, len) in parse_pattern(pattern)? {
        counter.touch_range(start, len)?;
      }
      let counts = counter.tally_counts();
      for c in 1..counts.len() {
        let want = expected.iter().find(|(count, _)| *count == c).map_or(0, |(_, ids)| *ids);
        if counts[c] != want {
          return Err(BuildError::geometry(format!(
            "vertex counter self test `{pattern}`: {} ids at count {c}, expected {want}",
            counts[c]
          )));
        }
      }
    }
    Ok(())
  }

  fn block(&self, key: u64) -> Arc<Block> {
    if let Some(block) = self.blocks.read().unwrap_or_else(PoisonError::into_inner).get(&key) {
      return Arc::clone(block);
    }
    let mut blocks = self.blocks.write().unwrap_or_else(PoisonError::into_inner);
    Arc::clone(blocks.entry(key).or_insert_with(|| Arc::new(Block::new())))
  }
}

/// Parse `"[a..b];[c..d]"` (inclusive bounds) into `(start, len)` ranges.
pub fn parse_pattern(pattern: &str) -> BuildResult<Vec<(u64, u64)>> {
  let bad = || BuildError::Config(format!("bad vertex range pattern `{pattern}`"));
  pattern
    .split(';')
    .map(str::trim)
    .filter(|part| !part.is_empty())
    .map(|part| {
      let inner = part.strip_prefix('[').and_then(|p| p.strip_suffix(']')).ok_or_else(bad)?;
      let (a, b) = inner.split_once("..").ok_or_else(bad)?;
      let a: u64 = a.trim().parse().map_err(|_| bad())?;
      let b: u64 = b.trim().parse().map_err(|_| bad())?;
      if b < a {
        return Err(bad());
      }
      Ok((a, b - a + 1))
    })
    .collect()
}

/// Nibbles `first..stop` of a word, one bit each.
#[inline]
fn nibble_mask(first: u64, stop: u64) -> u64 {
  let width = 4 * (stop - first);
  let span = if width >= 64 { u64::MAX } else { (1u64 << width) - 1 };
  (span << (4 * first)) & NIBBLE_ONES
}

#[cfg(test)]
#[path = "vertex_counter_test.rs"]
mod vertex_counter_test;
