//! Headless terrain fly-over.
//!
//! Drives a [`Forest`] along a straight line for a fixed number of ticks and
//! logs what the LOD core does: splits, merges, tile traffic and the ground
//! height under the viewpoint. A stand-in renderer keeps a set of "uploaded"
//! tiles in sync with the event stream.
//!
//! ```text
//! RUST_LOG=terrain_flyover=info,terrain_lod=debug terrain_flyover --ticks 600
//! ```

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use glam::DVec3;
use terrain_lod::{
  Executor, Forest, GenerationSettings, NodeId, SplitDistances, TerrainConfig,
  TerrainPresentation, Tile, TileId, UpdateStats,
};
use tracing_subscriber::EnvFilter;

/// Fly a viewpoint over procedurally generated terrain.
#[derive(Parser, Debug)]
#[command(name = "terrain_flyover")]
#[command(about = "Headless fly-over driver for terrain_lod")]
struct Args {
  /// World seed.
  #[arg(long, default_value = "p")]
  seed: String,

  /// Side length of a root node.
  #[arg(long, default_value_t = 1024.0)]
  root_size: f64,

  /// Deepest node depth.
  #[arg(long, default_value_t = 5)]
  max_depth: u8,

  /// Roots kept on each side of the viewpoint.
  #[arg(long, default_value_t = 1)]
  radius: u32,

  /// Split threshold as a multiple of node size.
  #[arg(long, default_value_t = 1.3)]
  split_ratio: f64,

  /// Grid cells per tile side.
  #[arg(long, default_value_t = 64)]
  subdivisions: u32,

  /// Ticks to run.
  #[arg(short, long, default_value_t = 300)]
  ticks: u32,

  /// World units travelled per tick.
  #[arg(long, default_value_t = 12.0)]
  speed: f64,

  /// Heading in degrees, 0 = +X, 90 = +Z.
  #[arg(long, default_value_t = 30.0)]
  heading: f64,

  /// Height kept above the ground.
  #[arg(long, default_value_t = 40.0)]
  altitude: f64,

  /// Worker threads; 0 uses the global rayon pool.
  #[arg(long, default_value_t = 0)]
  threads: usize,

  /// Sleep between ticks in milliseconds.
  #[arg(long, default_value_t = 16)]
  frame_ms: u64,

  /// Log a summary every N ticks.
  #[arg(long, default_value_t = 30)]
  report_every: u32,
}

/// Mirrors what a renderer would keep on the GPU.
#[derive(Default)]
struct MeshMirror {
  uploaded: HashMap<TileId, usize>,
  uploads: usize,
  disposals: usize,
}

impl TerrainPresentation for MeshMirror {
  fn on_tile_ready(&mut self, node: NodeId, tile: &Tile) {
    if let Some(buffers) = tile.buffers() {
      tracing::trace!(%node, tile = %tile.id(), triangles = buffers.triangle_count(), "upload");
      self.uploaded.insert(tile.id(), buffers.triangle_count());
      self.uploads += 1;
    }
  }

  fn on_tile_released(&mut self, node: NodeId, tile: TileId) {
    tracing::trace!(%node, %tile, "dispose");
    if self.uploaded.remove(&tile).is_some() {
      self.disposals += 1;
    }
  }

  fn on_node_destroyed(&mut self, _node: NodeId) {}
}

impl MeshMirror {
  fn triangles(&self) -> usize {
    self.uploaded.values().sum()
  }
}

/// Running totals across ticks.
#[derive(Default)]
struct Totals {
  splits: usize,
  unsplits: usize,
  resplits: usize,
  tiles_requested: usize,
  stale_results: usize,
  slowest_tick_us: u64,
}

impl Totals {
  fn add(&mut self, stats: &UpdateStats) {
    self.splits += stats.splits;
    self.unsplits += stats.unsplits;
    self.resplits += stats.resplits;
    self.tiles_requested += stats.tiles_requested;
    self.stale_results += stats.stale_results;
    self.slowest_tick_us = self.slowest_tick_us.max(stats.update_us);
  }
}

fn init_logging() {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("terrain_flyover=info"));
  tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn build_forest(args: &Args) -> Result<Forest> {
  let config = TerrainConfig::new(args.seed.clone(), args.root_size, args.max_depth)
    .with_root_radius(args.radius)
    .with_split_distances(SplitDistances::Ratio(args.split_ratio))
    .with_generation(GenerationSettings::DEFAULT.with_subdivisions(args.subdivisions));

  let executor = if args.threads == 0 {
    Executor::default()
  } else {
    Executor::with_threads(args.threads).context("failed to build worker pool")?
  };

  Forest::with_executor(config, executor).context("invalid terrain configuration")
}

fn main() -> Result<()> {
  let args = Args::parse();
  init_logging();

  let mut forest = build_forest(&args)?;
  let mut mirror = MeshMirror::default();
  let mut totals = Totals::default();

  let heading = args.heading.to_radians();
  let step = DVec3::new(heading.cos(), 0.0, heading.sin()) * args.speed;
  let mut eye = DVec3::new(0.0, args.altitude, 0.0);

  tracing::info!(
    seed = %args.seed,
    root_size = args.root_size,
    max_depth = args.max_depth,
    ticks = args.ticks,
    executor = ?forest.registry().executor(),
    "starting fly-over"
  );

  for tick in 1..=args.ticks {
    let stats = forest.update(eye);
    forest.present(&mut mirror);
    totals.add(&stats);

    // Follow the ground once it is known
    if let Some(ground) = forest.elevation_at(eye.x, eye.z) {
      eye.y = ground as f64 + args.altitude;
    }

    if args.report_every > 0 && tick % args.report_every == 0 {
      tracing::info!(
        tick,
        x = eye.x,
        z = eye.z,
        ground = ?forest.elevation_at(eye.x, eye.z),
        nodes = stats.live_nodes,
        tiles = stats.live_tiles,
        pending = stats.pending_tiles,
        triangles = mirror.triangles(),
        update_us = stats.update_us,
        "tick"
      );
    }

    eye += step;
    if args.frame_ms > 0 {
      std::thread::sleep(Duration::from_millis(args.frame_ms));
    }
  }

  tracing::info!(
    splits = totals.splits,
    unsplits = totals.unsplits,
    resplits = totals.resplits,
    tiles_requested = totals.tiles_requested,
    stale_results = totals.stale_results,
    uploads = mirror.uploads,
    disposals = mirror.disposals,
    slowest_tick_us = totals.slowest_tick_us,
    "fly-over finished"
  );

  Ok(())
}
