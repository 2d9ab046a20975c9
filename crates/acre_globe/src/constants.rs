//! Globe-wide constants: icosahedron shape, tolerances and vertex-id block
//! geometry.
//!
//! # Vertex Id Space
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                          VERTEX ID SPACE                             │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │ block 0      reserved, id 0 never names a vertex                     │
//! │ corners      one id per distinct acre corner (shared by 3 acres)     │
//! │ acre seams   2 steps per seam (midpoint + 2 halves, shared by 2)     │
//! │ zone seams   31 steps per acre (center, spokes, inner seams)         │
//! │ zones        24 steps per acre (4 zones per side, 6 sides max)       │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every range starts on a block boundary and every step is a power of two
//! no larger than a block, so no element's ids straddle two storage blocks.

/// Faces of the base icosahedron.
pub const GLOBAL_SECTORS: usize = 20;

/// Vertices of the base icosahedron (the pentagonal acres).
pub const ICOSAHEDRON_VERTICES: usize = 12;

/// Central angle of one icosahedron edge, `atan(2)`.
pub const ICOSAHEDRON_EDGE_ANGLE: f64 = 1.107_148_717_794_090_4;

/// Maximum sides of an acre.
pub const MAX_ACRE_SIDES: usize = 6;

/// Zones per acre side (1 -> 4 split by spoke and edge midpoints).
pub const ZONES_PER_SIDE: usize = 4;

/// Zone seams per acre side: two spoke halves plus three inner edges.
pub const ZONE_SEAMS_PER_SIDE: usize = 5;

/// Acre-seam halves per acre side.
pub const ACRE_SEAMS_PER_SIDE: usize = 2;

/// Area of one acre in square meters, used to derive a default radius.
pub const ACRE_AREA_M2: f64 = 4046.856;

/// Deduplication tolerance on the unit sphere.
///
/// Far below the lattice spacing of the finest preset (~1.2e-3).
pub const DEDUP_TOLERANCE: f64 = 1e-4;

/// Smallest nominal lattice spacing a globe may have. Slerped lattices
/// shrink toward face corners, so the margin over [`DEDUP_TOLERANCE`] is wide.
pub const MIN_LATTICE_SPACING: f64 = 4.0 * DEDUP_TOLERANCE;

/// Bits addressing a vertex inside one storage block.
pub const VERTEX_BLOCK_BITS: u32 = 12;

/// Vertex ids per storage block (4096).
pub const VERTEX_BLOCK_SIZE: u64 = 1 << VERTEX_BLOCK_BITS;

/// Mask selecting the in-block part of a vertex id (4095).
pub const VERTEX_INDEX_MASK: u64 = VERTEX_BLOCK_SIZE - 1;

/// Largest vertex id the touch counter accepts.
pub const VERTEX_COUNTER_LIMIT: u64 = 0x7F_FFFF_FFFF_FFFF;

/// Smallest supported zone resolution.
pub const MIN_ZONE_DIVISIONS: u32 = 2;

/// Largest supported zone resolution: a zone's interior (1953 ids) still
/// fits half a block.
pub const MAX_ZONE_DIVISIONS: u32 = 64;

/// Round `value` up to the next multiple of [`VERTEX_BLOCK_SIZE`].
#[inline]
pub const fn align_to_block(value: u64) -> u64 {
  (value + VERTEX_INDEX_MASK) & !VERTEX_INDEX_MASK
}

#[cfg(test)]
#[path = "constants_test.rs"]
mod constants_test;
