//! Triangle lattice arithmetic for one sector.
//!
//! A sector with corners `A`, `B`, `C` and `n` divisions has lattice points
//! `(row, col)` with `0 ≤ col ≤ row ≤ n`:
//!
//! ```text
//!                A (0,0)
//!                  /\
//!                 /  \            strip r holds 2r-1 triangles, the first
//!              (1,0)─(1,1)        at index (r-1)²; even offsets point up,
//!               / \  / \          odd offsets point down
//!              /   \/   \
//!           (2,0)─(2,1)─(2,2)
//!            ...          ...
//!        B (n,0) ───────── C (n,n)
//! ```
//!
//! Point `(row, col)` sits at `normalize(A·(n−row) + B·(row−col) + C·col)`.
//! Every third point (`(row + col) % 3 == 0`) is an acre center. Each
//! triangle has exactly one center corner and belongs to that acre.
//!
//! Everything here is pure integer arithmetic on coordinates and indices.

use smallvec::SmallVec;

/// Neighbor offsets around a lattice point, counter-clockwise.
///
/// Consecutive pairs `(D[k], D[k+1])` span the six triangles of a fan.
pub const DIRECTIONS: [LatticePoint; 6] = [
  LatticePoint::new(1, 0),
  LatticePoint::new(1, 1),
  LatticePoint::new(0, 1),
  LatticePoint::new(-1, 0),
  LatticePoint::new(-1, -1),
  LatticePoint::new(0, -1),
];

/// A `(row, col)` lattice coordinate. Signed so offsets may step outside
/// the sector; [`in_range`] says whether it is a real point.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LatticePoint {
  pub row: i32,
  pub col: i32,
}

impl LatticePoint {
  pub const fn new(row: i32, col: i32) -> Self {
    Self { row, col }
  }

  #[inline]
  pub const fn offset(self, d: LatticePoint) -> Self {
    Self::new(self.row + d.row, self.col + d.col)
  }

  #[inline]
  pub const fn delta(self, to: LatticePoint) -> Self {
    Self::new(to.row - self.row, to.col - self.col)
  }
}

/// A sector corner.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Corner {
  A,
  B,
  C,
}

impl Corner {
  pub const ALL: [Corner; 3] = [Corner::A, Corner::B, Corner::C];

  pub fn index(self) -> usize {
    self as usize
  }

  pub fn point(self, n: i32) -> LatticePoint {
    match self {
      Corner::A => LatticePoint::new(0, 0),
      Corner::B => LatticePoint::new(n, 0),
      Corner::C => LatticePoint::new(n, n),
    }
  }
}

/// A sector edge, walked `A→B`, `B→C`, `C→A`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Edge {
  AB,
  BC,
  CA,
}

impl Edge {
  pub const ALL: [Edge; 3] = [Edge::AB, Edge::BC, Edge::CA];

  pub fn index(self) -> usize {
    self as usize
  }

  /// Start and end corners.
  pub fn corners(self) -> (Corner, Corner) {
    match self {
      Edge::AB => (Corner::A, Corner::B),
      Edge::BC => (Corner::B, Corner::C),
      Edge::CA => (Corner::C, Corner::A),
    }
  }
}

// =============================================================================
// Points
// =============================================================================

/// Lattice points in a sector: `(n+1)(n+2)/2`.
#[inline]
pub const fn point_count(n: i32) -> usize {
  ((n + 1) * (n + 2) / 2) as usize
}

#[inline]
pub fn in_range(p: LatticePoint, n: i32) -> bool {
  0 <= p.col && p.col <= p.row && p.row <= n
}

/// Row-major index of an in-range point.
#[inline]
pub const fn point_index(p: LatticePoint) -> usize {
  (p.row * (p.row + 1) / 2 + p.col) as usize
}

/// Inverse of [`point_index`].
pub fn point_at(index: usize) -> LatticePoint {
  let mut row = (((8 * index + 1) as f64).sqrt() as usize).saturating_sub(1) / 2;
  // Float rounding can land one row off either way.
  while row * (row + 1) / 2 > index {
    row -= 1;
  }
  while (row + 1) * (row + 2) / 2 <= index {
    row += 1;
  }
  let col = index - row * (row + 1) / 2;
  LatticePoint::new(row as i32, col as i32)
}

/// Barycentric weights `(a, b, c)` of a point; the position is
/// `normalize(A·a + B·b + C·c)`.
#[inline]
pub fn weights(p: LatticePoint, n: i32) -> [f64; 3] {
  [(n - p.row) as f64, (p.row - p.col) as f64, p.col as f64]
}

/// Point `t` steps along `edge` (`0 ≤ t ≤ n`).
pub fn edge_point(edge: Edge, t: i32, n: i32) -> LatticePoint {
  match edge {
    Edge::AB => LatticePoint::new(t, 0),
    Edge::BC => LatticePoint::new(n, t),
    Edge::CA => LatticePoint::new(n - t, n - t),
  }
}

/// Which edge (if any) an in-range point lies on, with its step along it.
/// Corners report the edge they start.
pub fn edge_of(p: LatticePoint, n: i32) -> Option<(Edge, i32)> {
  if p.col == 0 && p.row < n {
    Some((Edge::AB, p.row))
  } else if p.row == n && p.col < n {
    Some((Edge::BC, p.col))
  } else if p.row == p.col {
    Some((Edge::CA, n - p.row))
  } else {
    None
  }
}

#[inline]
pub fn is_center(p: LatticePoint) -> bool {
  (p.row + p.col).rem_euclid(3) == 0
}

// =============================================================================
// Triangles
// =============================================================================

/// Triangles in a sector: `n²`.
#[inline]
pub const fn triangle_count(n: i32) -> usize {
  (n * n) as usize
}

/// First triangle of strip `r` (`1 ≤ r ≤ n`).
#[inline]
pub const fn strip_start(r: i32) -> usize {
  ((r - 1) * (r - 1)) as usize
}

/// Triangles in strip `r`.
#[inline]
pub const fn strip_len(r: i32) -> usize {
  (2 * r - 1) as usize
}

/// Corners of triangle `index`, counter-clockwise.
pub fn triangle_corners(index: usize) -> [LatticePoint; 3] {
  let mut r = (index as f64).sqrt() as i32 + 1;
  while strip_start(r) > index {
    r -= 1;
  }
  while strip_start(r + 1) <= index {
    r += 1;
  }
  let offset = (index - strip_start(r)) as i32;
  let k = offset / 2;
  if offset % 2 == 0 {
    [
      LatticePoint::new(r, k),
      LatticePoint::new(r, k + 1),
      LatticePoint::new(r - 1, k),
    ]
  } else {
    [
      LatticePoint::new(r - 1, k),
      LatticePoint::new(r, k + 1),
      LatticePoint::new(r - 1, k + 1),
    ]
  }
}

/// Index of the triangle with these corners, in any order.
pub fn triangle_index(corners: [LatticePoint; 3]) -> Option<usize> {
  if corners.iter().any(|p| p.col < 0 || p.col > p.row) {
    return None;
  }
  let top = corners.iter().map(|p| p.row).min()?;
  let bottom = corners.iter().map(|p| p.row).max()?;
  if bottom != top + 1 {
    return None;
  }
  let lower: SmallVec<[i32; 3]> = corners.iter().filter(|p| p.row == bottom).map(|p| p.col).collect();

  let index = match lower.as_slice() {
    &[a, b] => strip_start(bottom) + 2 * a.min(b) as usize,
    &[c] if c > 0 => strip_start(bottom) + 2 * (c - 1) as usize + 1,
    _ => return None,
  };
  let mut expected = triangle_corners(index);
  expected.sort_unstable();
  let mut given = corners;
  given.sort_unstable();
  (expected == given).then_some(index)
}

/// The acre center among a triangle's corners.
pub fn triangle_center(index: usize) -> LatticePoint {
  let corners = triangle_corners(index);
  corners
    .into_iter()
    .find(|p| is_center(*p))
    .unwrap_or(corners[0])
}

/// Triangles along `edge`, walking from its start corner.
pub fn edge_triangles(edge: Edge, n: i32) -> Vec<usize> {
  match edge {
    Edge::AB => (1..=n).map(strip_start).collect(),
    Edge::BC => (0..n).map(|k| strip_start(n) + 2 * k as usize).collect(),
    Edge::CA => (1..=n).rev().map(|r| strip_start(r + 1) - 1).collect(),
  }
}

/// The single triangle touching `corner`.
pub const fn corner_triangle(corner: Corner, n: i32) -> usize {
  match corner {
    Corner::A => 0,
    Corner::B => strip_start(n),
    Corner::C => triangle_count(n) - 1,
  }
}

/// In-sector triangles around `p`, counter-clockwise. Six in the interior,
/// three along an edge, one at a corner.
pub fn fan(p: LatticePoint, n: i32) -> SmallVec<[usize; 6]> {
  let mut out = SmallVec::new();
  for k in 0..6 {
    let a = p.offset(DIRECTIONS[k]);
    let b = p.offset(DIRECTIONS[(k + 1) % 6]);
    if in_range(a, n) && in_range(b, n) {
      if let Some(index) = triangle_index([p, a, b]) {
        out.push(index);
      }
    }
  }
  out
}

/// The two points completing a triangle on lattice edge `p→q`: left of the
/// edge first, then right. `None` when `p` and `q` are not adjacent. The
/// apexes may lie outside the sector.
pub fn apexes(p: LatticePoint, q: LatticePoint) -> Option<[LatticePoint; 2]> {
  let d = p.delta(q);
  let k = DIRECTIONS.iter().position(|&dir| dir == d)?;
  Some([p.offset(DIRECTIONS[(k + 1) % 6]), p.offset(DIRECTIONS[(k + 5) % 6])])
}

// =============================================================================
// Acre layout
// =============================================================================

/// Acres fully inside a sector: `n(n−3)/6 + 1`.
#[inline]
pub const fn interior_acre_count(n: i32) -> usize {
  (n * (n - 3) / 6 + 1) as usize
}

/// Shared-acre slots per sector: 3 corners plus `n/3 − 1` per edge.
#[inline]
pub const fn shared_acre_count(n: i32) -> usize {
  n as usize
}

/// Where a center's acre is stored within a sector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AcreSlot {
  Interior(usize),
  Shared(usize),
}

/// What a shared slot stands for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SharedSlot {
  /// Multi-sector acre on a sector corner.
  Corner(Corner),
  /// Dual-sector acre `t` steps along an edge.
  Edge(Edge, i32),
}

/// Shared slot index of the edge acre `t` steps along `edge`.
#[inline]
pub const fn edge_slot(edge: Edge, t: i32, n: i32) -> usize {
  3 + edge as usize * (n / 3 - 1) as usize + (t / 3 - 1) as usize
}

/// Assignment of every acre center in a sector to an interior or shared
/// slot.
#[derive(Clone, Debug)]
pub struct AcreLayout {
  n: i32,
  by_point: Vec<Option<AcreSlot>>,
  interior: Vec<LatticePoint>,
  shared: Vec<LatticePoint>,
}

impl AcreLayout {
  /// `n` must be a positive multiple of 3.
  pub fn new(n: i32) -> Self {
    let mut by_point = vec![None; point_count(n)];
    let mut interior = Vec::with_capacity(interior_acre_count(n));
    let mut shared = vec![LatticePoint::new(0, 0); shared_acre_count(n)];

    for corner in Corner::ALL {
      let p = corner.point(n);
      by_point[point_index(p)] = Some(AcreSlot::Shared(corner.index()));
      shared[corner.index()] = p;
    }
    for edge in Edge::ALL {
      for t in (3..n).step_by(3) {
        let p = edge_point(edge, t, n);
        let slot = edge_slot(edge, t, n);
        by_point[point_index(p)] = Some(AcreSlot::Shared(slot));
        shared[slot] = p;
      }
    }
    for index in 0..point_count(n) {
      let p = point_at(index);
      if is_center(p) && by_point[index].is_none() {
        by_point[index] = Some(AcreSlot::Interior(interior.len()));
        interior.push(p);
      }
    }

    Self {
      n,
      by_point,
      interior,
      shared,
    }
  }

  pub fn divisions(&self) -> i32 {
    self.n
  }

  /// Slot of the acre centered at `p`; `None` for non-centers.
  pub fn slot(&self, p: LatticePoint) -> Option<AcreSlot> {
    if in_range(p, self.n) {
      self.by_point[point_index(p)]
    } else {
      None
    }
  }

  /// Interior centers in interior-index order.
  pub fn interior_centers(&self) -> &[LatticePoint] {
    &self.interior
  }

  /// Shared centers in slot order.
  pub fn shared_centers(&self) -> &[LatticePoint] {
    &self.shared
  }

  pub fn shared_slot(&self, slot: usize) -> SharedSlot {
    match slot {
      0 => SharedSlot::Corner(Corner::A),
      1 => SharedSlot::Corner(Corner::B),
      2 => SharedSlot::Corner(Corner::C),
      _ => {
        let per_edge = (self.n / 3 - 1) as usize;
        let edge = Edge::ALL[(slot - 3) / per_edge];
        let t = 3 * (((slot - 3) % per_edge) as i32 + 1);
        SharedSlot::Edge(edge, t)
      }
    }
  }
}

#[cfg(test)]
#[path = "lattice_test.rs"]
mod lattice_test;
