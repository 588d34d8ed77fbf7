//! Tile - one generated height field owned by one quadtree node.

use std::fmt;

use crate::heightfield::{Footprint, TileBuffers};

/// Tile identity. Allocated monotonically and never reused, so a late result
/// for a released id can never land on a different tile.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct TileId(pub u64);

impl fmt::Display for TileId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "tile#{}", self.0)
  }
}

/// Generation state.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TileState {
  /// Job posted, no buffers yet.
  Pending,
  /// Buffers populated.
  Ready,
}

/// A registered tile.
#[derive(Clone, Debug)]
pub struct Tile {
  pub(crate) id: TileId,
  pub(crate) footprint: Footprint,
  pub(crate) precision: f64,
  pub(crate) iterations: u32,
  pub(crate) state: TileState,
  pub(crate) buffers: Option<TileBuffers>,
  /// Bumped on every (re)dispatch; only the matching result is applied.
  pub(crate) generation: u64,
}

impl Tile {
  pub(crate) fn pending(id: TileId, footprint: Footprint, precision: f64, iterations: u32) -> Self {
    Self {
      id,
      footprint,
      precision,
      iterations,
      state: TileState::Pending,
      buffers: None,
      generation: 0,
    }
  }

  #[inline]
  pub fn id(&self) -> TileId {
    self.id
  }

  #[inline]
  pub fn footprint(&self) -> &Footprint {
    &self.footprint
  }

  /// Normalized depth the tile was requested at.
  #[inline]
  pub fn precision(&self) -> f64 {
    self.precision
  }

  /// Octaves used by the most recent job.
  #[inline]
  pub fn iterations(&self) -> u32 {
    self.iterations
  }

  #[inline]
  pub fn state(&self) -> TileState {
    self.state
  }

  #[inline]
  pub fn is_ready(&self) -> bool {
    self.state == TileState::Ready
  }

  /// Generated buffers. `None` while pending.
  #[inline]
  pub fn buffers(&self) -> Option<&TileBuffers> {
    match self.state {
      TileState::Ready => self.buffers.as_ref(),
      TileState::Pending => None,
    }
  }

  /// Interpolated height at a world position. `None` while pending or when
  /// the point is outside the footprint.
  pub fn elevation_at(&self, x: f64, z: f64) -> Option<f32> {
    self.buffers()?.elevation_at(&self.footprint, x, z)
  }

  pub(crate) fn complete(&mut self, buffers: TileBuffers) {
    self.buffers = Some(buffers);
    self.state = TileState::Ready;
  }
}

#[cfg(test)]
#[path = "record_test.rs"]
mod record_test;
