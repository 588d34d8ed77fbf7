//! Per-tick counters returned by [`Forest::update`](crate::Forest::update).

/// Statistics from one forest tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UpdateStats {
  /// Leaves that started splitting.
  pub splits: usize,
  /// Split nodes that started unsplitting.
  pub unsplits: usize,
  /// Unsplits cancelled by a new split.
  pub resplits: usize,
  /// Roots entering the window.
  pub roots_created: usize,
  /// Roots leaving the window.
  pub roots_destroyed: usize,
  /// Nodes created at any depth, roots included.
  pub nodes_created: usize,
  /// Nodes destroyed at any depth, roots included.
  pub nodes_destroyed: usize,
  /// Generation jobs posted.
  pub tiles_requested: usize,
  /// Tiles released.
  pub tiles_released: usize,
  /// Completed jobs applied to a live tile.
  pub tiles_completed: usize,
  /// Completed jobs dropped (tile released or superseded).
  pub stale_results: usize,
  /// Nodes alive after the tick.
  pub live_nodes: usize,
  /// Tiles alive after the tick.
  pub live_tiles: usize,
  /// Tiles still waiting for their first result.
  pub pending_tiles: usize,
  /// Wall time of the tick in microseconds.
  pub update_us: u64,
}

impl UpdateStats {
  /// Split, unsplit and resplit transitions started this tick.
  #[inline]
  pub fn total_transitions(&self) -> usize {
    self.splits + self.unsplits + self.resplits
  }

  /// True if the tick changed nothing: no structure, no jobs, no results.
  #[inline]
  pub fn is_idle(&self) -> bool {
    self.total_transitions() == 0
      && self.nodes_created == 0
      && self.nodes_destroyed == 0
      && self.tiles_requested == 0
      && self.tiles_completed == 0
      && self.stale_results == 0
  }
}
