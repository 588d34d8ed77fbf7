//! Height field generation.
//!
//! A tile is a pure function of its footprint, its octave count and the
//! shared [`HeightFieldParams`]. Jobs carry a clone of the params (the octave
//! offsets live behind an `Arc`) so workers never touch forest state.
//!
//! # Module Structure
//!
//! - `noise`: seeded value noise and the fractal sum
//! - `generate`: grid sampling, normals, texels and indices

mod generate;
pub mod noise;

pub use generate::{generate, Footprint, HeightFieldParams, TileBuffers};
