//! Tile mesh generation.
//!
//! ```text
//!   min_x                          max_x
//!     a ──── b        (i, j)   ── (i+1, j)
//!     │ ╲    │           │  ╲        │
//!     │   ╲  │           │    ╲      │
//!     c ──── d       (i, j+1) ── (i+1, j+1)
//!   max_z
//!
//!   triangles (a, c, d) and (a, d, b): counter-clockwise seen from +Y
//! ```
//!
//! Heights are sampled on an apron one vertex wider than the tile so normals
//! at the border use the same neighbours the adjacent tile sees.

use std::sync::Arc;

use ::noise::Value;
use glam::DVec3;
use web_time::Instant;

use super::noise::{fractal_elevation, hash_seed, octave_offsets, sampler, FractalShape};
use crate::config::GenerationSettings;

/// World-space square covered by a tile.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Footprint {
  pub center_x: f64,
  pub center_z: f64,
  pub size: f64,
}

impl Footprint {
  pub fn new(center_x: f64, center_z: f64, size: f64) -> Self {
    Self {
      center_x,
      center_z,
      size,
    }
  }

  #[inline]
  pub fn min_x(&self) -> f64 {
    self.center_x - self.size * 0.5
  }

  #[inline]
  pub fn min_z(&self) -> f64 {
    self.center_z - self.size * 0.5
  }

  #[inline]
  pub fn max_x(&self) -> f64 {
    self.center_x + self.size * 0.5
  }

  #[inline]
  pub fn max_z(&self) -> f64 {
    self.center_z + self.size * 0.5
  }

  /// Inclusive containment.
  #[inline]
  pub fn contains(&self, x: f64, z: f64) -> bool {
    x >= self.min_x() && x <= self.max_x() && z >= self.min_z() && z <= self.max_z()
  }
}

/// Everything a worker needs to generate any tile. Cheap to clone.
#[derive(Clone, Debug)]
pub struct HeightFieldParams {
  pub seed: u64,
  /// Base sampler, built once from `seed`.
  pub noise: Value,
  pub subdivisions: u32,
  pub shape: FractalShape,
  pub octave_offsets: Arc<[[f64; 2]]>,
}

impl HeightFieldParams {
  /// Derive parameters from a textual seed.
  pub fn new(seed: &str, settings: &GenerationSettings) -> Self {
    Self::from_hashed_seed(hash_seed(seed), settings)
  }

  pub fn from_hashed_seed(seed: u64, settings: &GenerationSettings) -> Self {
    Self {
      seed,
      noise: sampler(seed),
      subdivisions: settings.subdivisions,
      shape: FractalShape {
        lacunarity: settings.lacunarity,
        persistence: settings.persistence,
        base_frequency: settings.base_frequency,
        base_amplitude: settings.base_amplitude,
        power: settings.power,
        elevation_offset: settings.elevation_offset,
      },
      octave_offsets: octave_offsets(seed, settings.max_iterations).into(),
    }
  }

  /// Elevation of the raw field at a world position.
  #[inline]
  pub fn elevation(&self, x: f64, z: f64, iterations: u32) -> f64 {
    fractal_elevation(&self.noise, x, z, iterations, &self.shape, &self.octave_offsets)
  }
}

/// Generated tile buffers.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TileBuffers {
  /// World-space xyz triples, row-major with x fastest.
  pub positions: Vec<f32>,
  /// Unit normals, one triple per vertex.
  pub normals: Vec<f32>,
  /// Triangle list.
  pub indices: Vec<u32>,
  /// RGBA8 per vertex: RGB = normal * 0.5 + 0.5, A = normalized elevation.
  pub texels: Vec<u8>,
  /// uv pairs in [0, 1] over the tile.
  pub uvs: Vec<f32>,
  /// Grid cells per side.
  pub subdivisions: u32,
  /// Wall time spent generating, in microseconds.
  pub generation_us: u64,
}

impl TileBuffers {
  /// Vertices per side.
  #[inline]
  pub fn segments(&self) -> usize {
    self.subdivisions as usize + 1
  }

  pub fn vertex_count(&self) -> usize {
    self.positions.len() / 3
  }

  pub fn triangle_count(&self) -> usize {
    self.indices.len() / 3
  }

  /// Height of grid vertex (i, j).
  #[inline]
  pub fn height(&self, i: usize, j: usize) -> f32 {
    self.positions[(j * self.segments() + i) * 3 + 1]
  }

  /// Interpolated height at a world position inside `footprint`.
  ///
  /// Picks the cell triangle on the fx/fz side of the (i, j)-(i+1, j+1)
  /// diagonal and blends its three heights barycentrically. Grid points
  /// return the stored vertex height exactly.
  pub fn elevation_at(&self, footprint: &Footprint, x: f64, z: f64) -> Option<f32> {
    if self.subdivisions == 0 || !footprint.contains(x, z) {
      return None;
    }

    let n = self.subdivisions as usize;
    let cell = footprint.size / n as f64;
    let rx = snap_to_grid((x - footprint.min_x()) / cell);
    let rz = snap_to_grid((z - footprint.min_z()) / cell);

    let ix = (rx.floor().max(0.0) as usize).min(n - 1);
    let iz = (rz.floor().max(0.0) as usize).min(n - 1);
    let fx = (rx - ix as f64).clamp(0.0, 1.0) as f32;
    let fz = (rz - iz as f64).clamp(0.0, 1.0) as f32;

    let a = self.height(ix, iz);
    let d = self.height(ix + 1, iz + 1);

    let elevation = if fx < fz {
      let c = self.height(ix, iz + 1);
      a * (1.0 - fz) + c * (fz - fx) + d * fx
    } else {
      let b = self.height(ix + 1, iz);
      a * (1.0 - fx) + b * (fx - fz) + d * fz
    };

    Some(elevation)
  }
}

/// Generate a tile.
///
/// Pure: identical inputs give bit-identical buffers (apart from
/// `generation_us`).
#[cfg_attr(feature = "trace_spans", tracing::instrument(skip_all, name = "heightfield::generate"))]
pub fn generate(footprint: &Footprint, iterations: u32, params: &HeightFieldParams) -> TileBuffers {
  let start = Instant::now();

  let n = params.subdivisions.max(1) as usize;
  let segments = n + 1;
  let apron = n + 3;
  let step = footprint.size / n as f64;
  let min_x = footprint.min_x();
  let min_z = footprint.min_z();

  // k in -1..=n+1 mapped to world; k / n keeps k == n landing exactly on max.
  let world = |min: f64, k: isize| min + footprint.size * (k as f64 / n as f64);

  let mut heights = vec![0.0f64; apron * apron];
  for jj in 0..apron {
    let z = world(min_z, jj as isize - 1);
    for ii in 0..apron {
      let x = world(min_x, ii as isize - 1);
      heights[jj * apron + ii] = params.elevation(x, z, iterations);
    }
  }
  let h = |i: usize, j: usize| heights[(j + 1) * apron + (i + 1)];

  let vertex_count = segments * segments;
  let mut positions = Vec::with_capacity(vertex_count * 3);
  let mut normals = Vec::with_capacity(vertex_count * 3);
  let mut texels = Vec::with_capacity(vertex_count * 4);
  let mut uvs = Vec::with_capacity(vertex_count * 2);

  let amplitude = params.shape.base_amplitude;
  let offset = params.shape.elevation_offset;

  for j in 0..segments {
    let z = world(min_z, j as isize);
    for i in 0..segments {
      let x = world(min_x, i as isize);
      let y = h(i, j);

      positions.extend_from_slice(&[x as f32, y as f32, z as f32]);

      // Central differences over the apron
      let left = heights[(j + 1) * apron + i];
      let right = heights[(j + 1) * apron + i + 2];
      let up = heights[j * apron + i + 1];
      let down = heights[(j + 2) * apron + i + 1];
      let normal = DVec3::new(left - right, 2.0 * step, up - down).normalize_or(DVec3::Y);
      normals.extend_from_slice(&[normal.x as f32, normal.y as f32, normal.z as f32]);

      let height01 = if amplitude > 0.0 {
        ((y + offset) / amplitude * 0.5 + 0.5).clamp(0.0, 1.0)
      } else {
        0.5
      };
      texels.extend_from_slice(&[
        pack_unit(normal.x * 0.5 + 0.5),
        pack_unit(normal.y * 0.5 + 0.5),
        pack_unit(normal.z * 0.5 + 0.5),
        pack_unit(height01),
      ]);

      uvs.extend_from_slice(&[(i as f64 / n as f64) as f32, (j as f64 / n as f64) as f32]);
    }
  }

  let mut indices = Vec::with_capacity(n * n * 6);
  for j in 0..n {
    for i in 0..n {
      let a = (j * segments + i) as u32;
      let b = a + 1;
      let c = a + segments as u32;
      let d = c + 1;
      indices.extend_from_slice(&[a, c, d, a, d, b]);
    }
  }

  TileBuffers {
    positions,
    normals,
    indices,
    texels,
    uvs,
    subdivisions: n as u32,
    generation_us: start.elapsed().as_micros() as u64,
  }
}

/// Round grid coordinates that are within rounding noise of a grid line.
#[inline]
fn snap_to_grid(r: f64) -> f64 {
  let nearest = r.round();
  if (r - nearest).abs() < GRID_SNAP_EPSILON {
    nearest
  } else {
    r
  }
}

const GRID_SNAP_EPSILON: f64 = 1e-9;

#[inline]
fn pack_unit(value: f64) -> u8 {
  (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

#[cfg(test)]
#[path = "generate_test.rs"]
mod generate_test;
