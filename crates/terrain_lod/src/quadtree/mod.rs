//! Quadtree forest for distance-based terrain LOD.
//!
//! Nodes live in a single arena keyed by [`NodeId`]; parent, child and
//! neighbour links are ids, never references.
//!
//! # Conventions
//!
//! Depth 0 = root (coarsest), depth `max_depth` = finest.
//!
//! ```text
//!        -z (north)
//!      ┌─────┬─────┐
//!      │ nw  │ ne  │
//! -x   ├─────┼─────┤   +x (east)
//!      │ sw  │ se  │
//!      └─────┴─────┘
//!        +z (south)
//! ```
//!
//! # Module Structure
//!
//! - [`bounds`]: `Bounds2` - half-open ground-plane squares
//! - [`node`]: `NodeId`, `QuadNode` and the split/merge state machine
//! - [`stats`]: `UpdateStats` - per-tick counters
//! - [`forest`]: `Forest` - root window, tick driver, point queries

pub mod bounds;
pub mod forest;
pub mod node;
pub mod stats;

/// Deepest supported node depth. Node paths pack 2 bits per level into a u64
/// and grid coordinates must fit an i64.
pub const MAX_DEPTH_LIMIT: u8 = 28;

// Re-exports
pub use bounds::Bounds2;
pub use forest::Forest;
pub use node::{Direction, NeighborLink, NodeId, NodeState, QuadNode, Quadrant};
pub use stats::UpdateStats;
