//! Axis-aligned square on the ground plane, double precision for huge worlds.

use glam::DVec2;

/// Double-precision 2D bounds in (x, z).
///
/// Containment is half-open, `[min, max)`, so sibling nodes tile their
/// parent exactly and every point belongs to exactly one of them.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds2 {
  /// Minimum corner (inclusive).
  pub min: DVec2,
  /// Maximum corner (exclusive).
  pub max: DVec2,
}

impl Bounds2 {
  /// Square bounds around `center` with side `size`.
  pub fn from_center_size(center: DVec2, size: f64) -> Self {
    let half = DVec2::splat(size * 0.5);
    Self {
      min: center - half,
      max: center + half,
    }
  }

  /// Half-open containment.
  #[inline]
  pub fn contains(&self, x: f64, z: f64) -> bool {
    x >= self.min.x && x < self.max.x && z >= self.min.y && z < self.max.y
  }

  /// True if the two bounds share interior area.
  #[inline]
  pub fn overlaps(&self, other: &Bounds2) -> bool {
    self.min.x < other.max.x && self.max.x > other.min.x && self.min.y < other.max.y && self.max.y > other.min.y
  }

  #[inline]
  pub fn size(&self) -> DVec2 {
    self.max - self.min
  }

  #[inline]
  pub fn center(&self) -> DVec2 {
    (self.min + self.max) * 0.5
  }

  #[inline]
  pub fn area(&self) -> f64 {
    let size = self.size();
    size.x * size.y
  }
}
