//! terrain_lod - Engine independent adaptive terrain LOD
//!
//! This crate decides which terrain tiles should exist around a moving
//! viewpoint, at what resolution, and generates their height fields off the
//! main thread. Rendering is left to the caller: completed tiles are handed
//! out as plain buffers through [`TerrainEvent`]s.
//!
//! # Features
//!
//! - **Quadtree forest**: a window of root nodes around the viewpoint, each
//!   splitting and merging by distance with a two-phase handoff so the
//!   rendered terrain never shows a gap
//! - **Tile registry**: id-keyed generation requests with late-result drop
//! - **Height field generator**: deterministic fractal value noise, world-space
//!   meshes that agree exactly along shared tile edges
//! - **Elevation queries**: barycentric lookups on the tile the renderer shows
//!
//! # Example
//!
//! ```ignore
//! use terrain_lod::{Forest, TerrainConfig};
//!
//! let mut forest = Forest::new(TerrainConfig::default())?;
//!
//! // Each frame
//! let stats = forest.update(camera_position);
//! for event in forest.drain_events() {
//!     // Create or dispose GPU meshes
//! }
//!
//! let ground = forest.elevation_at(camera_position.x, camera_position.z);
//! ```

pub mod config;
pub use config::{ConfigError, GenerationSettings, SplitDistances, TerrainConfig};

// Cross-platform threading abstraction
pub mod threading;
pub use threading::Executor;

// Height field generation (pure, runs on workers)
pub mod heightfield;
pub use heightfield::{generate, Footprint, HeightFieldParams, TileBuffers};

// Tile storage and generation dispatch
pub mod tile;
pub use tile::{PollStats, PrecisionFormula, Tile, TileId, TileRegistry, TileState};

// Quadtree nodes and the forest that drives them
pub mod quadtree;
pub use quadtree::{Bounds2, Direction, Forest, NeighborLink, NodeId, NodeState, QuadNode, Quadrant, UpdateStats};

// Renderer-facing events
pub mod presentation;
pub use presentation::{NullPresentation, TerrainEvent, TerrainPresentation};
