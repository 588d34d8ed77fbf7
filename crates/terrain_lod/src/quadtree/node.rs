//! QuadNode - one cell of the forest and its split/merge state machine.
//!
//! Node identity is a value type ([`NodeId`]) derived from the root's grid
//! cell and the quadrant path below it. The node itself only flips its own
//! flags; everything that touches other nodes or the tile registry is
//! returned as a transition for the forest to apply.

use std::fmt;

use glam::DVec2;

use super::bounds::Bounds2;
use crate::heightfield::Footprint;
use crate::tile::TileId;

// =============================================================================
// Quadrant / Direction
// =============================================================================

/// Child position within a parent. z grows to the south.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Quadrant {
  Ne,
  Nw,
  Sw,
  Se,
}

impl Quadrant {
  pub const ALL: [Quadrant; 4] = [Quadrant::Ne, Quadrant::Nw, Quadrant::Sw, Quadrant::Se];

  #[inline]
  pub fn index(self) -> usize {
    match self {
      Quadrant::Ne => 0,
      Quadrant::Nw => 1,
      Quadrant::Sw => 2,
      Quadrant::Se => 3,
    }
  }

  #[inline]
  fn from_index(index: u64) -> Quadrant {
    match index & 3 {
      0 => Quadrant::Ne,
      1 => Quadrant::Nw,
      2 => Quadrant::Sw,
      _ => Quadrant::Se,
    }
  }

  /// Cell offset (dx, dz) within the parent, at the child's depth.
  #[inline]
  pub fn cell_offset(self) -> (i64, i64) {
    match self {
      Quadrant::Ne => (1, 0),
      Quadrant::Nw => (0, 0),
      Quadrant::Sw => (0, 1),
      Quadrant::Se => (1, 1),
    }
  }

  #[inline]
  fn from_cell_offset(dx: i64, dz: i64) -> Quadrant {
    match (dx & 1, dz & 1) {
      (1, 0) => Quadrant::Ne,
      (0, 0) => Quadrant::Nw,
      (0, _) => Quadrant::Sw,
      _ => Quadrant::Se,
    }
  }

  /// Unit direction from the parent center to the child center.
  #[inline]
  pub fn sign(self) -> DVec2 {
    match self {
      Quadrant::Ne => DVec2::new(1.0, -1.0),
      Quadrant::Nw => DVec2::new(-1.0, -1.0),
      Quadrant::Sw => DVec2::new(-1.0, 1.0),
      Quadrant::Se => DVec2::new(1.0, 1.0),
    }
  }

  /// Quadrant of `(x, z)` relative to `center`. Points on the center lines
  /// go east / south, matching half-open bounds.
  #[inline]
  pub fn of_point(center: DVec2, x: f64, z: f64) -> Quadrant {
    match (x >= center.x, z >= center.y) {
      (true, false) => Quadrant::Ne,
      (false, false) => Quadrant::Nw,
      (false, true) => Quadrant::Sw,
      (true, true) => Quadrant::Se,
    }
  }

  pub fn label(self) -> &'static str {
    match self {
      Quadrant::Ne => "ne",
      Quadrant::Nw => "nw",
      Quadrant::Sw => "sw",
      Quadrant::Se => "se",
    }
  }
}

/// Cardinal direction of a neighbour slot.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Direction {
  N,
  E,
  S,
  W,
}

impl Direction {
  pub const ALL: [Direction; 4] = [Direction::N, Direction::E, Direction::S, Direction::W];

  #[inline]
  pub fn index(self) -> usize {
    match self {
      Direction::N => 0,
      Direction::E => 1,
      Direction::S => 2,
      Direction::W => 3,
    }
  }

  /// Grid step (dx, dz).
  #[inline]
  pub fn offset(self) -> (i64, i64) {
    match self {
      Direction::N => (0, -1),
      Direction::E => (1, 0),
      Direction::S => (0, 1),
      Direction::W => (-1, 0),
    }
  }
}

// =============================================================================
// NodeId
// =============================================================================

/// Path-derived node identity.
///
/// `path` holds one 2-bit quadrant index per level below the root, most
/// significant level first.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
  pub root_x: i32,
  pub root_z: i32,
  pub depth: u8,
  pub path: u64,
}

impl NodeId {
  /// Root at grid cell (ix, iz).
  pub const fn root(root_x: i32, root_z: i32) -> Self {
    Self {
      root_x,
      root_z,
      depth: 0,
      path: 0,
    }
  }

  #[inline]
  pub fn is_root(&self) -> bool {
    self.depth == 0
  }

  /// Child in `quadrant`.
  #[inline]
  pub fn child(&self, quadrant: Quadrant) -> Self {
    Self {
      depth: self.depth + 1,
      path: (self.path << 2) | quadrant.index() as u64,
      ..*self
    }
  }

  /// Parent, `None` for roots.
  #[inline]
  pub fn parent(&self) -> Option<Self> {
    if self.is_root() {
      return None;
    }
    Some(Self {
      depth: self.depth - 1,
      path: self.path >> 2,
      ..*self
    })
  }

  /// Quadrant within the parent, `None` for roots.
  #[inline]
  pub fn quadrant(&self) -> Option<Quadrant> {
    if self.is_root() {
      return None;
    }
    Some(Quadrant::from_index(self.path))
  }

  /// Quadrant taken at `level` below the root (0 = first split).
  #[inline]
  fn quadrant_at_level(&self, level: u8) -> Quadrant {
    let shift = 2 * (self.depth - 1 - level) as u32;
    Quadrant::from_index(self.path >> shift)
  }

  /// Global grid cell at this node's depth. Root (ix, iz) covers cells
  /// `ix * 2^depth ..` on each axis.
  pub fn grid_coords(&self) -> (i64, i64) {
    let mut x = self.root_x as i64;
    let mut z = self.root_z as i64;
    for level in 0..self.depth {
      let (dx, dz) = self.quadrant_at_level(level).cell_offset();
      x = x * 2 + dx;
      z = z * 2 + dz;
    }
    (x, z)
  }

  /// Inverse of [`grid_coords`](Self::grid_coords). `None` if the root cell
  /// does not fit an i32.
  pub fn from_grid(depth: u8, x: i64, z: i64) -> Option<Self> {
    let scale = 1i64 << depth;
    let root_x = i32::try_from(x.div_euclid(scale)).ok()?;
    let root_z = i32::try_from(z.div_euclid(scale)).ok()?;
    let local_x = x.rem_euclid(scale);
    let local_z = z.rem_euclid(scale);

    let mut path = 0u64;
    for level in 0..depth {
      let shift = depth - 1 - level;
      let quadrant = Quadrant::from_cell_offset((local_x >> shift) & 1, (local_z >> shift) & 1);
      path = (path << 2) | quadrant.index() as u64;
    }

    Some(Self {
      root_x,
      root_z,
      depth,
      path,
    })
  }

  /// Same-depth neighbour id in `direction` (it may not exist in the forest).
  pub fn neighbor_id(&self, direction: Direction) -> Option<Self> {
    let (x, z) = self.grid_coords();
    let (dx, dz) = direction.offset();
    Self::from_grid(self.depth, x + dx, z + dz)
  }

  /// Ancestor at `depth` (self if `depth >= self.depth`).
  pub fn ancestor_at(&self, depth: u8) -> Self {
    if depth >= self.depth {
      return *self;
    }
    Self {
      depth,
      path: self.path >> (2 * (self.depth - depth) as u32),
      ..*self
    }
  }
}

impl fmt::Display for NodeId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "r({},{})", self.root_x, self.root_z)?;
    for level in 0..self.depth {
      write!(f, "/{}", self.quadrant_at_level(level).label())?;
    }
    Ok(())
  }
}

impl fmt::Debug for NodeId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "NodeId({})", self)
  }
}

// =============================================================================
// QuadNode
// =============================================================================

/// Neighbour slot content.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum NeighborLink {
  /// Same-depth node, or the deepest coarser node on that side.
  Node(NodeId),
  /// Edge of the root window.
  Boundary,
}

/// Observable state, derived from the node's flags.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum NodeState {
  /// Leaf without a ready tile.
  LeafUnready,
  /// Leaf showing its own tile.
  LeafReady,
  /// Children exist but are not all ready; own tile (if any) still shown.
  Splitting,
  /// Children are authoritative.
  SplitReady,
  /// Own tile is being regenerated; children still shown.
  Unsplitting,
}

/// Result of [`QuadNode::begin_split`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum SplitTransition {
  /// Already split.
  Unchanged,
  /// Four new child ids to create.
  Created([NodeId; 4]),
  /// An unsplit was cancelled; existing children are kept. `released` is the
  /// unfinished own tile, if it was dropped.
  Resumed { released: Option<TileId> },
}

/// Result of [`QuadNode::set_ready`].
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub(crate) struct ReadyTransition {
  /// Own tile superseded by the children.
  pub released: Option<TileId>,
  /// Children superseded by the own tile.
  pub retired_children: Option<[NodeId; 4]>,
  /// Subscriber to notify.
  pub notify: Option<NodeId>,
}

/// One quadtree cell.
#[derive(Clone, Debug)]
pub struct QuadNode {
  pub(crate) id: NodeId,
  pub(crate) parent: Option<NodeId>,
  pub(crate) center: DVec2,
  pub(crate) size: f64,
  pub(crate) children: Option<[NodeId; 4]>,
  pub(crate) neighbors: [Option<NeighborLink>; 4],
  pub(crate) splitted: bool,
  pub(crate) splitting: bool,
  pub(crate) unsplitting: bool,
  pub(crate) ready: bool,
  /// Owns (or wants) a tile of its own.
  pub(crate) is_final: bool,
  pub(crate) tile: Option<TileId>,
  /// Receives this node's ready signal.
  pub(crate) subscriber: Option<NodeId>,
}

impl QuadNode {
  pub(crate) fn new(id: NodeId, parent: Option<NodeId>, center: DVec2, size: f64) -> Self {
    Self {
      id,
      parent,
      center,
      size,
      children: None,
      neighbors: [None; 4],
      splitted: false,
      splitting: false,
      unsplitting: false,
      ready: false,
      is_final: false,
      tile: None,
      subscriber: parent,
    }
  }

  #[inline]
  pub fn id(&self) -> NodeId {
    self.id
  }

  #[inline]
  pub fn parent(&self) -> Option<NodeId> {
    self.parent
  }

  #[inline]
  pub fn depth(&self) -> u8 {
    self.id.depth
  }

  /// Center (x, z).
  #[inline]
  pub fn center(&self) -> DVec2 {
    self.center
  }

  #[inline]
  pub fn size(&self) -> f64 {
    self.size
  }

  #[inline]
  pub fn half_size(&self) -> f64 {
    self.size * 0.5
  }

  #[inline]
  pub fn quarter_size(&self) -> f64 {
    self.size * 0.25
  }

  #[inline]
  pub fn bounds(&self) -> Bounds2 {
    Bounds2::from_center_size(self.center, self.size)
  }

  /// Tile footprint covering this node.
  #[inline]
  pub fn footprint(&self) -> Footprint {
    Footprint::new(self.center.x, self.center.y, self.size)
  }

  /// Center of the child in `quadrant`: parent center ± quarter size.
  #[inline]
  pub fn child_center(&self, quadrant: Quadrant) -> DVec2 {
    self.center + quadrant.sign() * self.quarter_size()
  }

  #[inline]
  pub fn children(&self) -> Option<&[NodeId; 4]> {
    self.children.as_ref()
  }

  #[inline]
  pub fn child(&self, quadrant: Quadrant) -> Option<NodeId> {
    self.children.map(|children| children[quadrant.index()])
  }

  #[inline]
  pub fn neighbor(&self, direction: Direction) -> Option<NeighborLink> {
    self.neighbors[direction.index()]
  }

  /// All four neighbour slots are populated.
  #[inline]
  pub fn neighbors_complete(&self) -> bool {
    self.neighbors.iter().all(Option::is_some)
  }

  #[inline]
  pub fn tile(&self) -> Option<TileId> {
    self.tile
  }

  #[inline]
  pub fn is_ready(&self) -> bool {
    self.ready
  }

  #[inline]
  pub fn is_splitted(&self) -> bool {
    self.splitted
  }

  #[inline]
  pub fn is_final(&self) -> bool {
    self.is_final
  }

  pub fn state(&self) -> NodeState {
    if !self.splitted {
      if self.ready {
        NodeState::LeafReady
      } else {
        NodeState::LeafUnready
      }
    } else if self.unsplitting {
      NodeState::Unsplitting
    } else if self.splitting {
      NodeState::Splitting
    } else {
      NodeState::SplitReady
    }
  }

  /// Half-open point containment.
  #[inline]
  pub fn is_inside(&self, x: f64, z: f64) -> bool {
    self.bounds().contains(x, z)
  }

  /// Quadrant of a point relative to this node's center.
  #[inline]
  pub fn quadrant_for(&self, x: f64, z: f64) -> Quadrant {
    Quadrant::of_point(self.center, x, z)
  }

  /// Child covering `(x, z)`. `None` for leaves and points outside.
  pub fn child_for_position(&self, x: f64, z: f64) -> Option<NodeId> {
    if !self.splitted || !self.is_inside(x, z) {
      return None;
    }
    self.child(self.quadrant_for(x, z))
  }

  /// Owns a tile slot but no tile has been requested yet.
  #[inline]
  pub(crate) fn needs_tile(&self) -> bool {
    self.is_final && self.tile.is_none()
  }

  // ---------------------------------------------------------------------------
  // Transitions
  // ---------------------------------------------------------------------------

  /// Leaf → splitting. The current tile stays until the children are ready.
  ///
  /// On a node that is unsplitting, the existing children are resumed. A
  /// ready own tile is kept on screen meanwhile; one still generating is
  /// released.
  pub(crate) fn begin_split(&mut self, own_tile_ready: bool) -> SplitTransition {
    if self.splitted {
      if !self.unsplitting {
        return SplitTransition::Unchanged;
      }
      // Back to waiting on the children we never dropped
      self.unsplitting = false;
      self.splitting = true;
      self.ready = false;
      let released = if own_tile_ready { None } else { self.destroy_final() };
      return SplitTransition::Resumed { released };
    }

    let children = Quadrant::ALL.map(|quadrant| self.id.child(quadrant));
    self.children = Some(children);
    self.splitted = true;
    self.splitting = true;
    self.ready = false;
    if self.tile.is_none() {
      // Nothing to keep on screen
      self.is_final = false;
    }
    SplitTransition::Created(children)
  }

  /// Split → unsplitting. Children stay until the own tile is ready.
  /// Returns false if there was nothing to do.
  pub(crate) fn begin_unsplit(&mut self) -> bool {
    if !self.splitted || self.unsplitting {
      return false;
    }
    self.splitting = false;
    self.unsplitting = true;
    self.ready = false;
    // A retained tile from an interrupted split is reused
    self.is_final = true;
    true
  }

  /// Mark this leaf as wanting its own tile.
  #[inline]
  pub(crate) fn create_final(&mut self) {
    self.is_final = true;
  }

  /// Drop the own tile slot, returning the tile to release.
  #[inline]
  pub(crate) fn destroy_final(&mut self) -> Option<TileId> {
    self.is_final = false;
    self.tile.take()
  }

  #[inline]
  pub(crate) fn assign_tile(&mut self, tile: TileId) {
    debug_assert!(self.tile.is_none(), "node {} already owns a tile", self.id);
    self.tile = Some(tile);
  }

  #[inline]
  pub(crate) fn set_neighbors(&mut self, neighbors: [NeighborLink; 4]) {
    self.neighbors = neighbors.map(Some);
  }

  /// Flip to ready and complete whichever transition was in flight.
  pub(crate) fn set_ready(&mut self) -> ReadyTransition {
    let mut transition = ReadyTransition {
      notify: self.subscriber,
      ..Default::default()
    };

    if self.splitting {
      self.splitting = false;
      transition.released = self.destroy_final();
    }
    if self.unsplitting {
      self.unsplitting = false;
      self.splitted = false;
      transition.retired_children = self.children.take();
    }

    self.ready = true;
    transition
  }
}

#[cfg(test)]
#[path = "node_test.rs"]
mod node_test;
