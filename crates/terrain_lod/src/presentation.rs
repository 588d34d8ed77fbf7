//! TerrainPresentation - callback interface for renderers.
//!
//! The forest never touches GPU state. It queues [`TerrainEvent`]s during
//! [`Forest::update`](crate::Forest::update); a renderer either drains them
//! with [`Forest::drain_events`](crate::Forest::drain_events) or lets
//! [`Forest::present`](crate::Forest::present) dispatch them to an
//! implementation of [`TerrainPresentation`].

use crate::quadtree::NodeId;
use crate::tile::{Tile, TileId};

/// Something a renderer needs to react to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TerrainEvent {
  /// A tile's buffers were (re)generated.
  TileReady { node: NodeId, tile: TileId },
  /// A tile is gone; dispose its mesh.
  TileReleased { node: NodeId, tile: TileId },
  /// A node left the forest.
  NodeDestroyed { node: NodeId },
}

/// Callback interface for renderers.
///
/// Events arrive in the order they happened within a tick, so a tile that
/// was superseded is released after its replacement is ready.
///
/// # Example
///
/// ```ignore
/// struct MeshCache {
///     meshes: HashMap<TileId, GpuMesh>,
/// }
///
/// impl TerrainPresentation for MeshCache {
///     fn on_tile_ready(&mut self, _node: NodeId, tile: &Tile) {
///         if let Some(buffers) = tile.buffers() {
///             self.meshes.insert(tile.id(), GpuMesh::upload(buffers));
///         }
///     }
///     fn on_tile_released(&mut self, _node: NodeId, tile: TileId) {
///         self.meshes.remove(&tile);
///     }
///     fn on_node_destroyed(&mut self, _node: NodeId) {}
/// }
/// ```
pub trait TerrainPresentation {
  /// A tile is ready to display (or was regenerated in place).
  fn on_tile_ready(&mut self, node: NodeId, tile: &Tile);

  /// A tile should be removed from display.
  fn on_tile_released(&mut self, node: NodeId, tile: TileId);

  /// A node was destroyed. Its tile, if any, was released just before.
  fn on_node_destroyed(&mut self, node: NodeId);
}

/// No-op implementation for testing and headless operation.
pub struct NullPresentation;

impl TerrainPresentation for NullPresentation {
  fn on_tile_ready(&mut self, _node: NodeId, _tile: &Tile) {
    // No-op
  }

  fn on_tile_released(&mut self, _node: NodeId, _tile: TileId) {
    // No-op
  }

  fn on_node_destroyed(&mut self, _node: NodeId) {
    // No-op
  }
}
