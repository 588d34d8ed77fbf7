//! Seeded 2D value noise and its fractal sum.
//!
//! The base sampler is `noise::Value`; this module only adds the seed
//! derivation and the octave loop. Arithmetic runs in a fixed order, so a
//! given (seed, position, parameters) always yields the same bits on every
//! thread.

use ::noise::{NoiseFn, Value};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Spread of the per-octave offsets in noise space.
const OFFSET_SPREAD: f64 = 200_000.0;

/// Hash a textual seed to 64 bits (first half of its MD5 digest).
pub fn hash_seed(seed: &str) -> u64 {
  let digest = md5::compute(seed.as_bytes());
  let mut bytes = [0u8; 8];
  bytes.copy_from_slice(&digest.0[..8]);
  u64::from_le_bytes(bytes)
}

/// Value noise sampler for a hashed seed.
pub fn sampler(seed: u64) -> Value {
  Value::new((seed ^ (seed >> 32)) as u32)
}

/// Smooth value noise in [-1, 1].
#[inline]
pub fn value_noise(sampler: &Value, x: f64, z: f64) -> f64 {
  sampler.get([x, z]).clamp(-1.0, 1.0)
}

/// Per-octave coordinate offsets, derived once from the seed.
///
/// The stream is sequential, so the first `n` offsets do not depend on
/// `count` as long as `count >= n`.
pub fn octave_offsets(seed: u64, count: u32) -> Vec<[f64; 2]> {
  let mut rng = ChaCha8Rng::seed_from_u64(seed);
  (0..count)
    .map(|_| {
      let x = (rng.random::<f64>() - 0.5) * OFFSET_SPREAD;
      let z = (rng.random::<f64>() - 0.5) * OFFSET_SPREAD;
      [x, z]
    })
    .collect()
}

/// Shape parameters of the fractal sum.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FractalShape {
  pub lacunarity: f64,
  pub persistence: f64,
  pub base_frequency: f64,
  pub base_amplitude: f64,
  pub power: f64,
  pub elevation_offset: f64,
}

/// Fractal elevation at a world position.
///
/// Octave `i` has amplitude `persistence^i` and frequency
/// `base_frequency * lacunarity^i`. The sum is normalized to [-1, 1], shaped
/// by `sign(e) * |e|^power`, scaled and offset.
pub fn fractal_elevation(
  sampler: &Value,
  x: f64,
  z: f64,
  iterations: u32,
  shape: &FractalShape,
  offsets: &[[f64; 2]],
) -> f64 {
  let mut sum = 0.0;
  let mut normalisation = 0.0;
  let mut amplitude = 1.0;
  let mut frequency = shape.base_frequency;

  for [offset_x, offset_z] in offsets.iter().take(iterations as usize) {
    sum += value_noise(sampler, x * frequency + offset_x, z * frequency + offset_z) * amplitude;
    normalisation += amplitude;
    amplitude *= shape.persistence;
    frequency *= shape.lacunarity;
  }

  let normalized = if normalisation > 0.0 { sum / normalisation } else { 0.0 };
  let shaped = normalized.abs().powf(shape.power).copysign(normalized);
  shaped * shape.base_amplitude - shape.elevation_offset
}
