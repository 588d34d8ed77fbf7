//! TerrainConfig - everything the forest consumes at construction.
//!
//! Plain data: there is no file format. Validation happens once, in
//! [`TerrainConfig::validate`], so malformed values fail before any geometry
//! is produced.

use thiserror::Error;

use crate::quadtree::MAX_DEPTH_LIMIT;
use crate::tile::PrecisionFormula;

/// Upper bound on noise octaves.
pub const MAX_ITERATIONS_LIMIT: u32 = 32;

/// Upper bound on grid cells per tile side. `(n + 1)²` vertex indices must
/// fit a u32.
pub const MAX_SUBDIVISIONS: u32 = 65_535;

/// Upper bound on the root window radius, a window of 2049² roots.
pub const MAX_ROOT_RADIUS: u32 = 1024;

/// Configuration errors. All of them are fatal at construction time.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
  #[error("root size must be positive and finite, got {0}")]
  InvalidRootSize(f64),

  #[error("max depth {max_depth} exceeds the supported limit of {limit}")]
  MaxDepthTooDeep { max_depth: u8, limit: u8 },

  #[error("max depth {max_depth} shrinks tiles to zero size (root size {root_size})")]
  DegenerateTileSize { root_size: f64, max_depth: u8 },

  #[error("subdivisions must be at least 1")]
  ZeroSubdivisions,

  #[error("subdivisions {value} exceed the supported limit of {limit}")]
  SubdivisionsTooLarge { value: u32, limit: u32 },

  #[error("root radius {value} exceeds the supported limit of {limit}")]
  RootRadiusTooLarge { value: u32, limit: u32 },

  #[error("max iterations must be within 1..={limit}, got {value}")]
  InvalidIterations { value: u32, limit: u32 },

  #[error("split distance table needs {expected} entries, got {found}")]
  SplitTableTooShort { expected: usize, found: usize },

  #[error("split distance for depth {depth} must be positive and finite, got {value}")]
  InvalidSplitDistance { depth: usize, value: f64 },

  #[error("split ratio must be positive and finite, got {0}")]
  InvalidSplitRatio(f64),

  #[error("noise parameter `{name}` is out of range: {value}")]
  InvalidNoise { name: &'static str, value: f64 },
}

/// How far a node at a given depth may be from the viewpoint before it
/// splits.
#[derive(Clone, Debug, PartialEq)]
pub enum SplitDistances {
  /// threshold = node size * ratio
  Ratio(f64),
  /// Explicit threshold per depth, index 0 = root.
  Table(Vec<f64>),
}

impl SplitDistances {
  /// Resolve to one threshold per splittable depth (`0..max_depth`).
  pub fn resolve(&self, root_size: f64, max_depth: u8) -> Vec<f64> {
    match self {
      SplitDistances::Ratio(ratio) => (0..max_depth)
        .map(|depth| root_size / (1u64 << depth) as f64 * ratio)
        .collect(),
      SplitDistances::Table(table) => table.iter().take(max_depth as usize).copied().collect(),
    }
  }

  fn validate(&self, max_depth: u8) -> Result<(), ConfigError> {
    match self {
      SplitDistances::Ratio(ratio) => {
        if !ratio.is_finite() || *ratio <= 0.0 {
          return Err(ConfigError::InvalidSplitRatio(*ratio));
        }
      }
      SplitDistances::Table(table) => {
        if table.len() < max_depth as usize {
          return Err(ConfigError::SplitTableTooShort {
            expected: max_depth as usize,
            found: table.len(),
          });
        }
        for (depth, value) in table.iter().take(max_depth as usize).enumerate() {
          if !value.is_finite() || *value <= 0.0 {
            return Err(ConfigError::InvalidSplitDistance {
              depth,
              value: *value,
            });
          }
        }
      }
    }
    Ok(())
  }
}

impl Default for SplitDistances {
  fn default() -> Self {
    SplitDistances::Ratio(1.3)
  }
}

/// Global height field parameters.
///
/// Changing these at runtime goes through
/// [`Forest::set_generation`](crate::Forest::set_generation), which
/// regenerates every live tile.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GenerationSettings {
  /// Grid cells per tile side. Tiles carry `(subdivisions + 1)²` vertices.
  pub subdivisions: u32,
  /// Frequency multiplier between octaves.
  pub lacunarity: f64,
  /// Amplitude multiplier between octaves.
  pub persistence: f64,
  /// Octave count at full precision.
  pub max_iterations: u32,
  /// Frequency of the first octave, in cycles per world unit.
  pub base_frequency: f64,
  /// Height of a fully shaped +1 sample.
  pub base_amplitude: f64,
  /// Exponent of the shaping curve applied to the normalized sum.
  pub power: f64,
  /// Subtracted from every elevation.
  pub elevation_offset: f64,
  /// Maps node precision to octave count.
  pub precision_formula: PrecisionFormula,
}

impl GenerationSettings {
  pub const DEFAULT: Self = Self {
    subdivisions: 120,
    lacunarity: 2.2,
    persistence: 0.4,
    max_iterations: 8,
    base_frequency: 0.002,
    base_amplitude: 220.0,
    power: 2.2,
    elevation_offset: 1.0,
    precision_formula: PrecisionFormula::PowerMix,
  };

  /// Set grid resolution.
  pub fn with_subdivisions(mut self, subdivisions: u32) -> Self {
    self.subdivisions = subdivisions;
    self
  }

  /// Set the precision-to-octaves formula.
  pub fn with_precision_formula(mut self, formula: PrecisionFormula) -> Self {
    self.precision_formula = formula;
    self
  }

  /// Set octave shaping.
  pub fn with_fractal(mut self, lacunarity: f64, persistence: f64) -> Self {
    self.lacunarity = lacunarity;
    self.persistence = persistence;
    self
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.subdivisions == 0 {
      return Err(ConfigError::ZeroSubdivisions);
    }
    if self.subdivisions > MAX_SUBDIVISIONS {
      return Err(ConfigError::SubdivisionsTooLarge {
        value: self.subdivisions,
        limit: MAX_SUBDIVISIONS,
      });
    }
    if self.max_iterations == 0 || self.max_iterations > MAX_ITERATIONS_LIMIT {
      return Err(ConfigError::InvalidIterations {
        value: self.max_iterations,
        limit: MAX_ITERATIONS_LIMIT,
      });
    }

    let positive = [("lacunarity", self.lacunarity), ("power", self.power)];
    for (name, value) in positive {
      if !value.is_finite() || value <= 0.0 {
        return Err(ConfigError::InvalidNoise { name, value });
      }
    }

    let non_negative = [
      ("persistence", self.persistence),
      ("base_frequency", self.base_frequency),
      ("base_amplitude", self.base_amplitude),
    ];
    for (name, value) in non_negative {
      if !value.is_finite() || value < 0.0 {
        return Err(ConfigError::InvalidNoise { name, value });
      }
    }

    if !self.elevation_offset.is_finite() {
      return Err(ConfigError::InvalidNoise {
        name: "elevation_offset",
        value: self.elevation_offset,
      });
    }

    Ok(())
  }
}

impl Default for GenerationSettings {
  fn default() -> Self {
    Self::DEFAULT
  }
}

/// Forest configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct TerrainConfig {
  /// World seed. Hashed once; every octave offset derives from it.
  pub seed: String,
  /// Side length of a root node in world units.
  pub root_size: f64,
  /// Deepest allowed node depth (root = 0).
  pub max_depth: u8,
  /// Roots kept on each side of the viewpoint's root cell.
  /// 1 keeps a 3x3 window.
  pub root_radius: u32,
  /// Split thresholds per depth.
  pub split_distances: SplitDistances,
  /// Height field parameters.
  pub generation: GenerationSettings,
}

impl TerrainConfig {
  /// Create a config with default generation settings.
  pub fn new(seed: impl Into<String>, root_size: f64, max_depth: u8) -> Self {
    Self {
      seed: seed.into(),
      root_size,
      max_depth,
      ..Default::default()
    }
  }

  /// Set the root window radius.
  pub fn with_root_radius(mut self, radius: u32) -> Self {
    self.root_radius = radius;
    self
  }

  /// Set split thresholds.
  pub fn with_split_distances(mut self, split_distances: SplitDistances) -> Self {
    self.split_distances = split_distances;
    self
  }

  /// Set height field parameters.
  pub fn with_generation(mut self, generation: GenerationSettings) -> Self {
    self.generation = generation;
    self
  }

  /// Side length of a node at `depth`.
  #[inline]
  pub fn node_size(&self, depth: u8) -> f64 {
    self.root_size / (1u64 << depth) as f64
  }

  /// Side length of the smallest node.
  #[inline]
  pub fn min_node_size(&self) -> f64 {
    self.node_size(self.max_depth.min(MAX_DEPTH_LIMIT))
  }

  /// Check every field. Called by [`Forest::new`](crate::Forest::new).
  pub fn validate(&self) -> Result<(), ConfigError> {
    if !self.root_size.is_finite() || self.root_size <= 0.0 {
      return Err(ConfigError::InvalidRootSize(self.root_size));
    }
    if self.max_depth > MAX_DEPTH_LIMIT {
      return Err(ConfigError::MaxDepthTooDeep {
        max_depth: self.max_depth,
        limit: MAX_DEPTH_LIMIT,
      });
    }
    if self.root_radius > MAX_ROOT_RADIUS {
      return Err(ConfigError::RootRadiusTooLarge {
        value: self.root_radius,
        limit: MAX_ROOT_RADIUS,
      });
    }

    // Quarter size of the deepest node, divided into grid cells, must stay
    // representable.
    let cell = self.min_node_size() / 4.0 / self.generation.subdivisions.max(1) as f64;
    if !cell.is_normal() {
      return Err(ConfigError::DegenerateTileSize {
        root_size: self.root_size,
        max_depth: self.max_depth,
      });
    }

    self.split_distances.validate(self.max_depth)?;
    self.generation.validate()
  }
}

impl Default for TerrainConfig {
  fn default() -> Self {
    Self {
      seed: String::from("p"),
      root_size: 1024.0,
      max_depth: 4,
      root_radius: 1,
      split_distances: SplitDistances::default(),
      generation: GenerationSettings::default(),
    }
  }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;
