//! Double-precision AABB used to partition the spatial map.

use glam::DVec3;

/// Double-precision axis-aligned bounding box.
///
/// Both corners are inclusive. Octree cells are derived by halving along
/// every axis; the octant bit layout is `x | y << 1 | z << 2`, set when the
/// coordinate is at or above the center.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DAabb3 {
	pub min: DVec3,
	pub max: DVec3,
}

impl DAabb3 {
	/// # Panics
	/// Debug-asserts that min <= max on all axes.
	pub fn new(min: DVec3, max: DVec3) -> Self {
		debug_assert!(
			min.x <= max.x && min.y <= max.y && min.z <= max.z,
			"AABB min must be <= max on all axes"
		);
		Self { min, max }
	}

	pub fn from_center_half_extents(center: DVec3, half_extents: DVec3) -> Self {
		Self {
			min: center - half_extents,
			max: center + half_extents,
		}
	}

	/// Cube of half-size `tolerance` around a point; the query region for
	/// tolerance lookups.
	#[inline]
	pub fn around(point: DVec3, tolerance: f64) -> Self {
		Self::from_center_half_extents(point, DVec3::splat(tolerance))
	}

	/// Bounds enclosing a sphere of `radius` centered at the origin, padded
	/// so points on the surface never sit on the outer faces.
	pub fn enclosing_sphere(radius: f64) -> Self {
		Self::from_center_half_extents(DVec3::ZERO, DVec3::splat(radius * 1.01))
	}

	/// Two AABBs overlap if they share any interior or boundary points.
	#[inline]
	pub fn overlaps(&self, other: &DAabb3) -> bool {
		self.min.x <= other.max.x
			&& self.max.x >= other.min.x
			&& self.min.y <= other.max.y
			&& self.max.y >= other.min.y
			&& self.min.z <= other.max.z
			&& self.max.z >= other.min.z
	}

	#[inline]
	pub fn contains_point(&self, point: DVec3) -> bool {
		point.cmpge(self.min).all() && point.cmple(self.max).all()
	}

	#[inline]
	pub fn center(&self) -> DVec3 {
		(self.min + self.max) * 0.5
	}

	/// Octant of `point` relative to the center.
	#[inline]
	pub fn octant(&self, point: DVec3) -> usize {
		let c = self.center();
		(point.x >= c.x) as usize | ((point.y >= c.y) as usize) << 1 | ((point.z >= c.z) as usize) << 2
	}

	/// Bounds of one octant.
	pub fn child(&self, octant: usize) -> DAabb3 {
		let c = self.center();
		let pick = |bit: usize, lo: f64, mid: f64, hi: f64| {
			if octant & bit != 0 {
				(mid, hi)
			} else {
				(lo, mid)
			}
		};
		let (x0, x1) = pick(1, self.min.x, c.x, self.max.x);
		let (y0, y1) = pick(2, self.min.y, c.y, self.max.y);
		let (z0, z1) = pick(4, self.min.z, c.z, self.max.z);
		DAabb3::new(DVec3::new(x0, y0, z0), DVec3::new(x1, y1, z1))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_overlaps_touching() {
		// Touching at boundary counts as overlapping
		let a = DAabb3::new(DVec3::ZERO, DVec3::splat(10.0));
		let b = DAabb3::new(DVec3::splat(10.0), DVec3::splat(20.0));
		assert!(a.overlaps(&b));
		assert!(b.overlaps(&a));
	}

	#[test]
	fn test_overlaps_false() {
		let a = DAabb3::new(DVec3::ZERO, DVec3::splat(10.0));
		let b = DAabb3::new(DVec3::splat(11.0), DVec3::splat(20.0));
		assert!(!a.overlaps(&b));
	}

	#[test]
	fn test_contains_point_inclusive() {
		let aabb = DAabb3::new(DVec3::ZERO, DVec3::splat(10.0));
		assert!(aabb.contains_point(DVec3::splat(5.0)));
		assert!(aabb.contains_point(DVec3::ZERO));
		assert!(aabb.contains_point(DVec3::splat(10.0)));
		assert!(!aabb.contains_point(DVec3::new(5.0, 5.0, 10.5)));
	}

	#[test]
	fn test_octant_child_contains_point() {
		let aabb = DAabb3::enclosing_sphere(1.0);
		let points = [
			DVec3::new(0.5, 0.5, 0.5),
			DVec3::new(-0.5, 0.5, -0.5),
			DVec3::new(0.1, -0.9, 0.2),
			DVec3::new(-0.3, -0.3, 0.9),
		];
		for p in points {
			let octant = aabb.octant(p);
			assert!(aabb.child(octant).contains_point(p), "{:?} not in octant {}", p, octant);
		}
	}

	#[test]
	fn test_children_tile_parent() {
		let aabb = DAabb3::new(DVec3::ZERO, DVec3::splat(8.0));
		for octant in 0..8 {
			let child = aabb.child(octant);
			assert_eq!(child.max - child.min, DVec3::splat(4.0));
			assert_eq!(aabb.octant(child.center()), octant);
		}
	}
}
