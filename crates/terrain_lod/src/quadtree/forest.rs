//! Forest - the root window around the viewpoint and the per-tick driver.
//!
//! # Tick
//!
//! ```text
//! update(viewpoint)
//!   1. apply completions    registry.poll → TileReady events → test_ready
//!   2. root window          (2r+1)² roots around the viewpoint's root cell
//!   3. check                split / unsplit, top-down from every root
//!   4. neighbours           same depth, else deepest coarser, else Boundary
//!   5. dispatch             tile requests, closest first
//!   6. propagate            ready signals child → parent
//! ```
//!
//! Readiness flows bottom-up through queued one-shot signals. A signal is
//! only delivered if its target still exists and still lists the source as a
//! child, and signals touching a destroyed node are purged with it.

use std::collections::{HashMap, VecDeque};

use glam::{DVec2, DVec3};
use smallvec::SmallVec;
use web_time::Instant;

use super::node::{NeighborLink, NodeId, NodeState, QuadNode, Quadrant, SplitTransition};
use super::stats::UpdateStats;
use super::Direction;
use crate::config::{ConfigError, GenerationSettings, TerrainConfig};
use crate::heightfield::HeightFieldParams;
use crate::presentation::{TerrainEvent, TerrainPresentation};
use crate::threading::Executor;
use crate::tile::{precision_for_depth, Tile, TileId, TileRegistry};

/// "I am ready", from a child to its subscriber.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct ReadySignal {
  target: NodeId,
  source: NodeId,
}

/// The quadtree forest.
pub struct Forest {
  config: TerrainConfig,
  /// Split threshold per depth, `0..max_depth`.
  split_distances: Vec<f64>,
  registry: TileRegistry,
  nodes: HashMap<NodeId, QuadNode>,
  /// Current root window, sorted.
  roots: Vec<NodeId>,
  tile_owners: HashMap<TileId, NodeId>,
  signals: VecDeque<ReadySignal>,
  events: Vec<TerrainEvent>,
  viewpoint: DVec3,
  stats: UpdateStats,
}

impl Forest {
  /// Create a forest generating on rayon's global pool.
  pub fn new(config: TerrainConfig) -> Result<Self, ConfigError> {
    Self::with_executor(config, Executor::default())
  }

  /// Create a forest generating on `executor`.
  pub fn with_executor(config: TerrainConfig, executor: Executor) -> Result<Self, ConfigError> {
    config.validate()?;

    let split_distances = config.split_distances.resolve(config.root_size, config.max_depth);
    let params = HeightFieldParams::new(&config.seed, &config.generation);
    let registry = TileRegistry::new(config.generation, params, executor);

    tracing::debug!(
      seed = %config.seed,
      root_size = config.root_size,
      max_depth = config.max_depth,
      root_radius = config.root_radius,
      executor = ?registry.executor(),
      "terrain forest created"
    );

    Ok(Self {
      config,
      split_distances,
      registry,
      nodes: HashMap::new(),
      roots: Vec::new(),
      tile_owners: HashMap::new(),
      signals: VecDeque::new(),
      events: Vec::new(),
      viewpoint: DVec3::ZERO,
      stats: UpdateStats::default(),
    })
  }

  // ===========================================================================
  // Tick
  // ===========================================================================

  /// Advance one tick. Never blocks on generation.
  #[cfg_attr(feature = "trace_spans", tracing::instrument(skip_all, name = "forest::update"))]
  pub fn update(&mut self, viewpoint: DVec3) -> UpdateStats {
    let start = Instant::now();
    self.stats = UpdateStats::default();
    self.viewpoint = viewpoint;

    {
      #[cfg(feature = "trace_spans")]
      let _span = tracing::info_span!("apply_completions").entered();
      self.apply_completions();
      self.propagate_signals();
    }

    {
      #[cfg(feature = "trace_spans")]
      let _span = tracing::info_span!("update_roots").entered();
      self.update_roots();
    }

    {
      #[cfg(feature = "trace_spans")]
      let _span = tracing::info_span!("check_nodes").entered();
      let roots = self.roots.clone();
      for root in roots {
        self.check_node(root);
      }
    }

    {
      #[cfg(feature = "trace_spans")]
      let _span = tracing::info_span!("assign_neighbors").entered();
      self.assign_neighbors();
    }

    {
      #[cfg(feature = "trace_spans")]
      let _span = tracing::info_span!("dispatch_tiles").entered();
      self.dispatch_tiles();
    }

    self.propagate_signals();

    self.stats.live_nodes = self.nodes.len();
    self.stats.live_tiles = self.registry.len();
    self.stats.pending_tiles = self.registry.pending_count();
    self.stats.update_us = start.elapsed().as_micros() as u64;

    if !self.stats.is_idle() {
      tracing::trace!(stats = ?self.stats, "forest tick");
    }
    self.stats
  }

  /// Replace the height field parameters and regenerate every live tile.
  ///
  /// Tiles stay displayable with their old buffers until the new ones
  /// arrive. Returns the number of jobs posted.
  pub fn set_generation(&mut self, generation: GenerationSettings) -> Result<usize, ConfigError> {
    let candidate = self.config.clone().with_generation(generation);
    candidate.validate()?;
    self.config = candidate;
    Ok(self.registry.regenerate_all(generation))
  }

  // ===========================================================================
  // Queries
  // ===========================================================================

  /// Deepest node covering `(x, z)`. `None` outside the root window.
  pub fn leaf_node_at(&self, x: f64, z: f64) -> Option<&QuadNode> {
    let mut node = self.root_at(x, z)?;
    while let Some(child) = node.child_for_position(x, z) {
      node = self.nodes.get(&child)?;
    }
    Some(node)
  }

  /// Terrain height at `(x, z)`, from the tile currently authoritative
  /// there. `None` outside the window or before that tile is generated.
  pub fn elevation_at(&self, x: f64, z: f64) -> Option<f32> {
    let mut node = self.root_at(x, z)?;
    loop {
      let own = self.ready_tile_of(node);
      let descend = match node.state() {
        NodeState::SplitReady => true,
        NodeState::Splitting | NodeState::Unsplitting => own.is_none(),
        NodeState::LeafReady | NodeState::LeafUnready => false,
      };
      if !descend {
        return own?.elevation_at(x, z);
      }
      let child = node.child_for_position(x, z)?;
      node = self.nodes.get(&child)?;
    }
  }

  /// Tiles that together make up the rendered terrain right now.
  ///
  /// Walks the same authority rule as [`elevation_at`](Self::elevation_at),
  /// so the footprints never overlap.
  pub fn visible_tiles(&self) -> Vec<TileId> {
    let mut visible = Vec::new();
    let mut stack: SmallVec<[NodeId; 32]> = self.roots.iter().rev().copied().collect();

    while let Some(id) = stack.pop() {
      let Some(node) = self.nodes.get(&id) else {
        continue;
      };
      let own = self.ready_tile_of(node);
      let descend = match node.state() {
        NodeState::SplitReady => true,
        NodeState::Splitting | NodeState::Unsplitting => own.is_none(),
        NodeState::LeafReady | NodeState::LeafUnready => false,
      };
      if descend {
        if let Some(children) = node.children() {
          stack.extend(children.iter().rev().copied());
        }
      } else if let Some(tile) = own {
        visible.push(tile.id());
      }
    }

    visible
  }

  // ===========================================================================
  // Events
  // ===========================================================================

  /// Take the events queued since the last drain.
  pub fn drain_events(&mut self) -> Vec<TerrainEvent> {
    std::mem::take(&mut self.events)
  }

  /// Dispatch queued events to `presentation`. Returns the number of events.
  pub fn present<P: TerrainPresentation + ?Sized>(&mut self, presentation: &mut P) -> usize {
    let events = std::mem::take(&mut self.events);
    for event in &events {
      match *event {
        TerrainEvent::TileReady { node, tile } => {
          // Released later in the same tick: nothing to show
          if let Some(tile) = self.registry.tile(tile).filter(|tile| tile.is_ready()) {
            presentation.on_tile_ready(node, tile);
          }
        }
        TerrainEvent::TileReleased { node, tile } => presentation.on_tile_released(node, tile),
        TerrainEvent::NodeDestroyed { node } => presentation.on_node_destroyed(node),
      }
    }
    events.len()
  }

  // ===========================================================================
  // Accessors
  // ===========================================================================

  #[inline]
  pub fn config(&self) -> &TerrainConfig {
    &self.config
  }

  #[inline]
  pub fn node(&self, id: NodeId) -> Option<&QuadNode> {
    self.nodes.get(&id)
  }

  /// All live nodes, in no particular order.
  pub fn nodes(&self) -> impl Iterator<Item = &QuadNode> {
    self.nodes.values()
  }

  /// Live nodes without children.
  pub fn leaves(&self) -> impl Iterator<Item = &QuadNode> {
    self.nodes.values().filter(|node| node.children().is_none())
  }

  #[inline]
  pub fn node_count(&self) -> usize {
    self.nodes.len()
  }

  /// Current root window, sorted.
  #[inline]
  pub fn roots(&self) -> &[NodeId] {
    &self.roots
  }

  #[inline]
  pub fn tile(&self, id: TileId) -> Option<&Tile> {
    self.registry.tile(id)
  }

  #[inline]
  pub fn registry(&self) -> &TileRegistry {
    &self.registry
  }

  /// Stats of the most recent tick.
  #[inline]
  pub fn stats(&self) -> UpdateStats {
    self.stats
  }

  #[inline]
  pub fn viewpoint(&self) -> DVec3 {
    self.viewpoint
  }

  // ===========================================================================
  // Internals
  // ===========================================================================

  fn root_at(&self, x: f64, z: f64) -> Option<&QuadNode> {
    self
      .roots
      .iter()
      .filter_map(|id| self.nodes.get(id))
      .find(|node| node.is_inside(x, z))
  }

  fn ready_tile_of(&self, node: &QuadNode) -> Option<&Tile> {
    node
      .tile()
      .and_then(|id| self.registry.tile(id))
      .filter(|tile| tile.is_ready())
  }

  fn under_split_distance(&self, depth: u8, center: DVec2) -> bool {
    let Some(&threshold) = self.split_distances.get(depth as usize) else {
      return false;
    };
    let eye = DVec2::new(self.viewpoint.x, self.viewpoint.z);
    eye.distance(center) < threshold
  }

  fn apply_completions(&mut self) {
    let poll = self.registry.poll();
    self.stats.tiles_completed += poll.applied;
    self.stats.stale_results += poll.stale;

    for tile in self.registry.drain_ready() {
      let Some(&node) = self.tile_owners.get(&tile) else {
        continue;
      };
      self.events.push(TerrainEvent::TileReady { node, tile });
      self.test_ready(node);
    }
  }

  fn update_roots(&mut self) {
    let root_size = self.config.root_size;
    let cell_x = ((self.viewpoint.x + root_size * 0.5) / root_size).floor() as i64;
    let cell_z = ((self.viewpoint.z + root_size * 0.5) / root_size).floor() as i64;
    let radius = self.config.root_radius as i64;

    let mut wanted = Vec::with_capacity(((2 * radius + 1) * (2 * radius + 1)) as usize);
    for dz in -radius..=radius {
      for dx in -radius..=radius {
        let ix = cell_x.checked_add(dx).and_then(|v| i32::try_from(v).ok());
        let iz = cell_z.checked_add(dz).and_then(|v| i32::try_from(v).ok());
        if let (Some(ix), Some(iz)) = (ix, iz) {
          wanted.push(NodeId::root(ix, iz));
        }
      }
    }
    wanted.sort_unstable();

    let reclaimed: Vec<NodeId> = self
      .roots
      .iter()
      .filter(|id| wanted.binary_search(id).is_err())
      .copied()
      .collect();
    for id in reclaimed {
      tracing::debug!(root = %id, "root reclaimed");
      self.destroy_node(id);
      self.stats.roots_destroyed += 1;
    }

    self.roots = wanted.clone();
    for id in wanted {
      if self.nodes.contains_key(&id) {
        continue;
      }
      let center = DVec2::new(id.root_x as f64 * root_size, id.root_z as f64 * root_size);
      tracing::debug!(root = %id, "root created");
      self.create_node(None, id, center);
      self.stats.roots_created += 1;
    }
  }

  /// Insert a node, let it split right away if it is close enough, and
  /// otherwise give it a tile slot.
  fn create_node(&mut self, parent: Option<NodeId>, id: NodeId, center: DVec2) {
    let size = self.config.node_size(id.depth);
    self.nodes.insert(id, QuadNode::new(id, parent, center, size));
    self.stats.nodes_created += 1;

    self.check_node(id);
    if let Some(node) = self.nodes.get_mut(&id) {
      if !node.is_splitted() {
        node.create_final();
      }
    }
    self.test_ready(id);
  }

  fn check_node(&mut self, id: NodeId) {
    let Some(node) = self.nodes.get(&id) else {
      return;
    };
    let depth = node.depth();
    let splitted = node.is_splitted();
    let under = self.under_split_distance(depth, node.center());

    if under && depth < self.config.max_depth {
      let own_tile_ready = self.ready_tile_of(node).is_some();
      let Some(node) = self.nodes.get_mut(&id) else {
        return;
      };

      match node.begin_split(own_tile_ready) {
        SplitTransition::Unchanged => {}
        SplitTransition::Created(children) => {
          let centers = Quadrant::ALL.map(|quadrant| node.child_center(quadrant));
          tracing::trace!(node = %id, "split");
          self.stats.splits += 1;
          for (child, center) in children.into_iter().zip(centers) {
            self.create_node(Some(id), child, center);
          }
          // Children were checked on creation
          return;
        }
        SplitTransition::Resumed { released } => {
          tracing::trace!(node = %id, "unsplit cancelled");
          self.stats.resplits += 1;
          if let Some(tile) = released {
            self.release_tile(id, tile);
          }
          self.test_ready(id);
        }
      }
    } else if !under && splitted {
      let Some(node) = self.nodes.get_mut(&id) else {
        return;
      };
      if node.begin_unsplit() {
        tracing::trace!(node = %id, "unsplit");
        self.stats.unsplits += 1;
        self.test_ready(id);
      }
    }

    let Some(node) = self.nodes.get(&id) else {
      return;
    };
    // Children of an unsplitting node are on their way out
    if node.state() == NodeState::Unsplitting {
      return;
    }
    if let Some(children) = node.children().copied() {
      for child in children {
        self.check_node(child);
      }
    }
  }

  /// Re-evaluate readiness and complete any transition it finishes.
  fn test_ready(&mut self, id: NodeId) {
    let Some(node) = self.nodes.get(&id) else {
      return;
    };
    if node.is_ready() {
      return;
    }

    let ready_now = match node.state() {
      NodeState::Splitting | NodeState::SplitReady => node.children().is_some_and(|children| {
        children
          .iter()
          .all(|child| self.nodes.get(child).is_some_and(QuadNode::is_ready))
      }),
      NodeState::Unsplitting | NodeState::LeafUnready | NodeState::LeafReady => {
        node.neighbors_complete() && self.ready_tile_of(node).is_some()
      }
    };
    if !ready_now {
      return;
    }

    let Some(node) = self.nodes.get_mut(&id) else {
      return;
    };
    let transition = node.set_ready();
    tracing::trace!(node = %id, "ready");

    if let Some(tile) = transition.released {
      self.release_tile(id, tile);
    }
    if let Some(children) = transition.retired_children {
      for child in children {
        self.destroy_node(child);
      }
    }
    if let Some(target) = transition.notify {
      self.signals.push_back(ReadySignal { target, source: id });
    }
  }

  fn propagate_signals(&mut self) {
    while let Some(signal) = self.signals.pop_front() {
      let subscribed = self
        .nodes
        .get(&signal.target)
        .and_then(QuadNode::children)
        .is_some_and(|children| children.contains(&signal.source));
      if subscribed {
        self.test_ready(signal.target);
      }
    }
  }

  /// Remove a node and everything below it, releasing their tiles.
  fn destroy_node(&mut self, id: NodeId) {
    let Some(node) = self.nodes.remove(&id) else {
      return;
    };
    if let Some(children) = node.children() {
      for child in *children {
        self.destroy_node(child);
      }
    }
    if let Some(tile) = node.tile() {
      self.release_tile(id, tile);
    }

    self
      .signals
      .retain(|signal| signal.target != id && signal.source != id);
    self.events.push(TerrainEvent::NodeDestroyed { node: id });
    self.stats.nodes_destroyed += 1;
  }

  fn release_tile(&mut self, owner: NodeId, tile: TileId) {
    self.registry.release_tile(tile);
    self.tile_owners.remove(&tile);
    self.events.push(TerrainEvent::TileReleased { node: owner, tile });
    self.stats.tiles_released += 1;
  }

  fn assign_neighbors(&mut self) {
    let ids: Vec<NodeId> = self.nodes.keys().copied().collect();
    for id in ids {
      let links = Direction::ALL.map(|direction| self.find_neighbor(&id, direction));
      if let Some(node) = self.nodes.get_mut(&id) {
        node.set_neighbors(links);
      }
    }
  }

  /// Same depth first, then progressively coarser, then the window edge.
  fn find_neighbor(&self, id: &NodeId, direction: Direction) -> NeighborLink {
    let Some(mut candidate) = id.neighbor_id(direction) else {
      return NeighborLink::Boundary;
    };
    loop {
      if self.nodes.contains_key(&candidate) {
        return NeighborLink::Node(candidate);
      }
      match candidate.parent() {
        Some(parent) => candidate = parent,
        None => return NeighborLink::Boundary,
      }
    }
  }

  /// Request tiles for every node that wants one and knows its neighbours,
  /// closest to the viewpoint first.
  fn dispatch_tiles(&mut self) {
    let eye = DVec2::new(self.viewpoint.x, self.viewpoint.z);
    let mut wanted: SmallVec<[(f64, NodeId); 32]> = self
      .nodes
      .values()
      .filter(|node| node.needs_tile() && node.neighbors_complete())
      .map(|node| (eye.distance_squared(node.center()), node.id()))
      .collect();
    wanted.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

    for (_, id) in wanted {
      let Some(node) = self.nodes.get(&id) else {
        continue;
      };
      let footprint = node.footprint();
      let precision = precision_for_depth(node.depth(), self.config.max_depth);
      let tile = self.registry.request_tile(footprint, precision);

      self.tile_owners.insert(tile, id);
      if let Some(node) = self.nodes.get_mut(&id) {
        node.assign_tile(tile);
      }
      self.stats.tiles_requested += 1;
    }
  }
}

impl std::fmt::Debug for Forest {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Forest")
      .field("roots", &self.roots.len())
      .field("nodes", &self.nodes.len())
      .field("registry", &self.registry)
      .field("viewpoint", &self.viewpoint)
      .finish()
  }
}

#[cfg(test)]
#[path = "forest_test.rs"]
mod forest_test;
