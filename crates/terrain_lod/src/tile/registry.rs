//! TileRegistry - owns live tiles and dispatches their generation.
//!
//! Enqueue → worker → channel → poll. Requests return immediately with a
//! [`TileId`]; workers send a [`GenerationResult`] back over a channel the
//! registry drains in [`TileRegistry::poll`]. Results are matched by
//! `(TileId, generation)`, never by arrival order, and anything that no
//! longer matches a live tile is dropped.

use std::collections::HashMap;

use crossbeam_channel::{self as channel, Receiver, Sender};

use super::record::{Tile, TileId, TileState};
use crate::config::GenerationSettings;
use crate::heightfield::{generate, Footprint, HeightFieldParams, TileBuffers};
use crate::threading::Executor;

/// Completed generation job.
#[derive(Debug)]
pub struct GenerationResult {
  pub tile_id: TileId,
  /// Generation the job was dispatched for.
  pub generation: u64,
  pub buffers: TileBuffers,
}

/// Outcome of one [`TileRegistry::poll`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PollStats {
  /// Results applied to a live tile.
  pub applied: usize,
  /// Results dropped: tile released or job superseded.
  pub stale: usize,
}

/// Live tiles plus the generation channel.
pub struct TileRegistry {
  tiles: HashMap<TileId, Tile>,
  next_id: u64,
  settings: GenerationSettings,
  params: HeightFieldParams,
  executor: Executor,
  sender: Sender<GenerationResult>,
  receiver: Receiver<GenerationResult>,
  /// Tiles that became ready since the last `drain_ready`.
  ready: Vec<TileId>,
}

impl TileRegistry {
  /// Create a registry generating with `params` on `executor`.
  pub fn new(settings: GenerationSettings, params: HeightFieldParams, executor: Executor) -> Self {
    let (sender, receiver) = channel::unbounded();
    Self {
      tiles: HashMap::new(),
      next_id: 0,
      settings,
      params,
      executor,
      sender,
      receiver,
      ready: Vec::new(),
    }
  }

  /// Register a pending tile and post its generation job.
  pub fn request_tile(&mut self, footprint: Footprint, precision: f64) -> TileId {
    let id = TileId(self.next_id);
    self.next_id += 1;

    let iterations = self.iterations_for(precision);
    let tile = Tile::pending(id, footprint, precision, iterations);
    tracing::trace!(%id, size = footprint.size, iterations, "tile requested");

    self.dispatch(&tile);
    self.tiles.insert(id, tile);
    id
  }

  /// Apply a finished job. Returns `false` (and changes nothing) when the
  /// tile was released or the job was superseded by a later dispatch.
  pub fn on_generation_complete(&mut self, id: TileId, generation: u64, buffers: TileBuffers) -> bool {
    let Some(tile) = self.tiles.get_mut(&id) else {
      tracing::trace!(%id, "dropping result for released tile");
      return false;
    };
    if tile.generation != generation {
      tracing::trace!(%id, generation, current = tile.generation, "dropping superseded result");
      return false;
    }

    tile.complete(buffers);
    self.ready.push(id);
    true
  }

  /// Remove a tile. In-flight results for it are dropped when they arrive.
  pub fn release_tile(&mut self, id: TileId) -> Option<Tile> {
    let removed = self.tiles.remove(&id);
    if removed.is_some() {
      self.ready.retain(|ready| *ready != id);
      tracing::trace!(%id, "tile released");
    }
    removed
  }

  /// Re-post every live tile with new global settings.
  ///
  /// Each tile keeps its own precision and its current buffers; the new
  /// buffers replace them when they arrive. Returns the number of jobs posted.
  pub fn regenerate_all(&mut self, settings: GenerationSettings) -> usize {
    self.params = HeightFieldParams::from_hashed_seed(self.params.seed, &settings);
    self.settings = settings;

    let mut ids: Vec<TileId> = self.tiles.keys().copied().collect();
    ids.sort_unstable();

    let formula = self.settings.precision_formula;
    let max_iterations = self.settings.max_iterations;
    for id in &ids {
      if let Some(tile) = self.tiles.get_mut(id) {
        tile.generation += 1;
        tile.iterations = formula.iterations(tile.precision, max_iterations);
      }
      if let Some(tile) = self.tiles.get(id) {
        self.dispatch(tile);
      }
    }

    tracing::debug!(tiles = ids.len(), "regenerating all tiles");
    ids.len()
  }

  /// Drain completed jobs without blocking.
  pub fn poll(&mut self) -> PollStats {
    let mut stats = PollStats::default();
    while let Ok(result) = self.receiver.try_recv() {
      if self.on_generation_complete(result.tile_id, result.generation, result.buffers) {
        stats.applied += 1;
      } else {
        stats.stale += 1;
      }
    }
    stats
  }

  /// Tiles that became ready since the last call, in completion order.
  pub fn drain_ready(&mut self) -> Vec<TileId> {
    std::mem::take(&mut self.ready)
  }

  #[inline]
  pub fn tile(&self, id: TileId) -> Option<&Tile> {
    self.tiles.get(&id)
  }

  /// True if the tile is registered and has buffers.
  #[inline]
  pub fn is_ready(&self, id: TileId) -> bool {
    self.tiles.get(&id).is_some_and(Tile::is_ready)
  }

  #[inline]
  pub fn len(&self) -> usize {
    self.tiles.len()
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.tiles.is_empty()
  }

  /// Tiles still waiting for their first result.
  pub fn pending_count(&self) -> usize {
    self
      .tiles
      .values()
      .filter(|tile| tile.state == TileState::Pending)
      .count()
  }

  #[inline]
  pub fn settings(&self) -> &GenerationSettings {
    &self.settings
  }

  #[inline]
  pub fn params(&self) -> &HeightFieldParams {
    &self.params
  }

  #[inline]
  pub fn executor(&self) -> &Executor {
    &self.executor
  }

  fn iterations_for(&self, precision: f64) -> u32 {
    self
      .settings
      .precision_formula
      .iterations(precision, self.settings.max_iterations)
  }

  fn dispatch(&self, tile: &Tile) {
    let tile_id = tile.id;
    let generation = tile.generation;
    let footprint = tile.footprint;
    let iterations = tile.iterations;
    let params = self.params.clone();
    let sender = self.sender.clone();

    self.executor.spawn(move || {
      let buffers = generate(&footprint, iterations, &params);
      // Registry dropped = nobody wants the result
      let _ = sender.send(GenerationResult {
        tile_id,
        generation,
        buffers,
      });
    });
  }
}

impl std::fmt::Debug for TileRegistry {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("TileRegistry")
      .field("tiles", &self.tiles.len())
      .field("next_id", &self.next_id)
      .field("executor", &self.executor)
      .finish()
  }
}

#[cfg(test)]
#[path = "registry_test.rs"]
mod registry_test;
