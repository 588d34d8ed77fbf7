//! Tiles, their registry and the precision mapping.

pub mod precision;
pub mod registry;
mod record;

pub use precision::{precision_for_depth, PrecisionFormula};
pub use registry::{GenerationResult, PollStats, TileRegistry};
pub use record::{Tile, TileId, TileState};
