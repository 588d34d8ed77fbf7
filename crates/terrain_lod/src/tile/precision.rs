//! Precision: how much noise detail a tile gets.
//!
//! Precision is normalized depth, 0 at the root and 1 at max depth. Deep
//! nodes are small and close to the viewpoint, so they get more octaves.

/// Maps precision to an octave count.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PrecisionFormula {
  /// Always `max_iterations`.
  Max,
  /// `floor((max - 1) * p) + 1`: one octave at the root, linear to max.
  Min,
  /// `round((max * p + max) / 2)`: half detail at the root, linear to max.
  Mix,
  /// `round((max * (1 - (1 - p)²) + max) / 2)`: like `Mix`, but saturates
  /// early so mid-depth tiles are close to full detail.
  #[default]
  PowerMix,
}

impl PrecisionFormula {
  /// Octave count for `precision` in [0, 1]. Always within `1..=max_iterations`.
  pub fn iterations(self, precision: f64, max_iterations: u32) -> u32 {
    let max = max_iterations.max(1);
    let p = if precision.is_nan() { 0.0 } else { precision.clamp(0.0, 1.0) };
    let m = max as f64;

    let raw = match self {
      PrecisionFormula::Max => m,
      PrecisionFormula::Min => ((m - 1.0) * p).floor() + 1.0,
      PrecisionFormula::Mix => ((m * p + m) / 2.0).round(),
      PrecisionFormula::PowerMix => {
        let eased = 1.0 - (1.0 - p) * (1.0 - p);
        ((m * eased + m) / 2.0).round()
      }
    };

    (raw as u32).clamp(1, max)
  }
}

/// Normalized depth of a node. A single-level forest is always at full
/// precision.
#[inline]
pub fn precision_for_depth(depth: u8, max_depth: u8) -> f64 {
  if max_depth == 0 {
    return 1.0;
  }
  (depth.min(max_depth) as f64) / (max_depth as f64)
}
