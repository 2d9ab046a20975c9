use super::*;

#[test]
fn test_block_size_is_power_of_two() {
  assert!(VERTEX_BLOCK_SIZE.is_power_of_two());
  assert_eq!(VERTEX_BLOCK_SIZE, 4096);
  assert_eq!(VERTEX_INDEX_MASK, 4095);
}

#[test]
fn test_align_to_block() {
  assert_eq!(align_to_block(0), 0);
  assert_eq!(align_to_block(1), 4096);
  assert_eq!(align_to_block(4096), 4096);
  assert_eq!(align_to_block(4097), 8192);
}

#[test]
fn test_largest_zone_fits_half_block() {
  let r = MAX_ZONE_DIVISIONS as u64;
  let zone_interior = (r - 1) * (r - 2) / 2;
  assert_eq!(zone_interior, 1953);
  assert!(zone_interior <= VERTEX_BLOCK_SIZE / 2);
}
