use std::sync::Arc;
use std::thread;

use super::*;

#[test]
fn test_self_test_patterns() {
  VertexCounter::self_test().unwrap();
}

#[test]
fn test_overlapping_ranges() {
  let counter = VertexCounter::new();
  for (start, len) in parse_pattern("[1..5];[2..6];[3..7];[4..8];[5..9]").unwrap() {
    counter.touch_range(start, len).unwrap();
  }
  let counts = counter.tally_counts();
  assert_eq!(&counts[1..6], &[2, 2, 2, 2, 1]);
  assert_eq!(counter.count(5), 5);
  assert_eq!(counter.count(9), 1);
  assert_eq!(counter.count(10), 0);
  assert_eq!(counter.total_touches(), 25);
}

#[test]
fn test_ranges_cross_words_and_blocks() {
  let counter = VertexCounter::new();
  let start = VERTEX_BLOCK_SIZE - 7;
  counter.touch_range(start, 40).unwrap();
  assert_eq!(counter.block_count(), 2);
  assert_eq!(counter.count(start - 1), 0);
  assert!((start..start + 40).all(|id| counter.count(id) == 1));
  assert_eq!(counter.count(start + 40), 0);

  let counts = counter.tally_counts();
  assert_eq!(counts[1], 40);
  assert_eq!(counts[0], 2 * VERTEX_BLOCK_SIZE - 40);
}

#[test]
fn test_blocks_hold_4096_ids() {
  let counter = VertexCounter::new();
  counter.touch(0).unwrap();
  counter.touch(4095).unwrap();
  assert_eq!(counter.block_count(), 1);
  counter.touch(4096).unwrap();
  counter.touch(1 << 16).unwrap();
  assert_eq!(counter.block_count(), 3);
  assert_eq!(counter.tally_counts()[0], 3 * 4096 - 4);
}

#[test]
fn test_counters_saturate() {
  let counter = VertexCounter::new();
  for _ in 0..20 {
    counter.touch_range(30, 4).unwrap();
  }
  counter.touch(31).unwrap();
  counter.touch(34).unwrap();
  assert_eq!(counter.count(31), SATURATED);
  assert_eq!(counter.count(34), 1);
  assert_eq!(counter.tally_counts()[15], 4);
  assert_eq!(counter.total_touches(), 82);
}

#[test]
fn test_limit() {
  let counter = VertexCounter::new();
  counter.touch(VERTEX_COUNTER_LIMIT).unwrap();
  assert_eq!(
    counter.touch(VERTEX_COUNTER_LIMIT + 1),
    Err(BuildError::VertexIdOutOfRange(VERTEX_COUNTER_LIMIT + 1))
  );
  assert!(counter.touch_range(VERTEX_COUNTER_LIMIT, 2).is_err());
  assert!(counter.touch_range(u64::MAX, 3).is_err());
  counter.touch_range(u64::MAX, 0).unwrap();
}

#[test]
fn test_concurrent_touches() {
  let counter = Arc::new(VertexCounter::new());
  let handles: Vec<_> = (0..8)
    .map(|t| {
      let counter = Arc::clone(&counter);
      thread::spawn(move || {
        for i in 0..1000u64 {
          counter.touch(i * 3 + (t % 2)).unwrap();
        }
      })
    })
    .collect();
  for h in handles {
    h.join().unwrap();
  }
  let counts = counter.tally_counts();
  assert_eq!(counts[4], 2000);
  assert_eq!(counter.total_touches(), 8000);
}

#[test]
fn test_parse_pattern() {
  assert_eq!(parse_pattern("[1..999];[500..599]").unwrap(), vec![(1, 999), (500, 100)]);
  assert_eq!(parse_pattern(" [7..7] ").unwrap(), vec![(7, 1)]);
  assert!(parse_pattern("[5..1]").is_err());
  assert!(parse_pattern("1..5").is_err());
  assert!(parse_pattern("[a..b]").is_err());
}

#[test]
fn test_nibble_mask() {
  assert_eq!(nibble_mask(0, 16), NIBBLE_ONES);
  assert_eq!(nibble_mask(0, 1), 1);
  assert_eq!(nibble_mask(15, 16), 1 << 60);
  assert_eq!(nibble_mask(2, 4), 0x1100);
}
