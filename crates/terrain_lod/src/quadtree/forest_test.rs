use super::*;
use crate::config::SplitDistances;

fn config(root_size: f64, max_depth: u8) -> TerrainConfig {
  TerrainConfig::new("p", root_size, max_depth)
    .with_generation(GenerationSettings::DEFAULT.with_subdivisions(4))
}

fn forest(config: TerrainConfig) -> Forest {
  Forest::with_executor(config, Executor::Inline).expect("valid config")
}

fn eye(x: f64, z: f64) -> DVec3 {
  DVec3::new(x, 0.0, z)
}

/// Tick until nothing changes.
fn settle(forest: &mut Forest, viewpoint: DVec3) {
  for _ in 0..32 {
    if forest.update(viewpoint).is_idle() {
      return;
    }
  }
  panic!("forest did not settle");
}

/// Single root of size 100, one level of children, split under 60.
fn single_level() -> Forest {
  forest(
    config(100.0, 1)
      .with_root_radius(0)
      .with_split_distances(SplitDistances::Table(vec![60.0])),
  )
}

fn visible_area(forest: &Forest) -> f64 {
  forest
    .visible_tiles()
    .iter()
    .filter_map(|id| forest.tile(*id))
    .map(|tile| tile.footprint().size * tile.footprint().size)
    .sum()
}

// =========================================================================
// Construction and root window
// =========================================================================

#[test]
fn test_new_rejects_invalid_config() {
  let result = Forest::new(TerrainConfig::new("p", -1.0, 3));
  assert!(matches!(result, Err(ConfigError::InvalidRootSize(_))));

  let result = Forest::new(TerrainConfig::new("p", 100.0, 40));
  assert!(matches!(result, Err(ConfigError::MaxDepthTooDeep { .. })));
}

/// An oversized root window fails at construction, before any tick.
#[test]
fn test_new_rejects_unbounded_root_window() {
  let result = Forest::with_executor(config(100.0, 2).with_root_radius(u32::MAX), Executor::Inline);
  assert!(matches!(result, Err(ConfigError::RootRadiusTooLarge { .. })));

  let result = Forest::with_executor(
    config(100.0, 2).with_generation(GenerationSettings::DEFAULT.with_subdivisions(u32::MAX)),
    Executor::Inline,
  );
  assert!(matches!(result, Err(ConfigError::SubdivisionsTooLarge { .. })));
}

#[test]
fn test_first_update_creates_root_window() {
  let mut forest = forest(config(100.0, 3));
  let stats = forest.update(eye(0.0, 0.0));

  assert_eq!(stats.roots_created, 9);
  assert_eq!(forest.roots().len(), 9);
  for ix in -1..=1 {
    for iz in -1..=1 {
      assert!(forest.roots().contains(&NodeId::root(ix, iz)));
    }
  }
  assert_eq!(stats.tiles_requested, forest.leaves().count());
}

/// Nothing is available before tiles are generated.
#[test]
fn test_queries_before_generation() {
  let mut forest = forest(config(100.0, 3));
  assert!(forest.elevation_at(0.0, 0.0).is_none());
  assert!(forest.leaf_node_at(0.0, 0.0).is_none());

  forest.update(eye(0.0, 0.0));
  assert!(forest.leaf_node_at(0.0, 0.0).is_some());
  assert!(forest.elevation_at(0.0, 0.0).is_none(), "tiles still pending");

  forest.update(eye(0.0, 0.0));
  assert!(forest.elevation_at(0.0, 0.0).is_some());
}

#[test]
fn test_root_reclaim() {
  let mut forest = forest(config(100.0, 2));
  settle(&mut forest, eye(0.0, 0.0));
  forest.drain_events();

  let stats = forest.update(eye(1000.0, 0.0));
  assert_eq!(stats.roots_destroyed, 9);
  assert_eq!(stats.roots_created, 9);
  assert!(forest.node(NodeId::root(0, 0)).is_none());
  assert!(forest.roots().iter().all(|id| (9..=11).contains(&id.root_x)));
  assert!(forest.nodes().all(|node| (9..=11).contains(&node.id().root_x)));

  let events = forest.drain_events();
  assert!(events.contains(&TerrainEvent::NodeDestroyed {
    node: NodeId::root(0, 0)
  }));

  // Only tiles of live nodes survive
  let owned = forest.nodes().filter(|node| node.tile().is_some()).count();
  assert_eq!(forest.registry().len(), owned);
}

// =========================================================================
// Split / merge
// =========================================================================

#[test]
fn test_split_geometry() {
  let mut forest = forest(config(100.0, 3));
  settle(&mut forest, eye(0.0, 0.0));

  let root = forest.node(NodeId::root(0, 0)).expect("root");
  assert_eq!(root.state(), NodeState::SplitReady);
  let children = root.children().expect("split");

  for quadrant in Quadrant::ALL {
    let child = forest.node(children[quadrant.index()]).expect("child");
    assert_eq!(child.size(), 50.0);
    assert_eq!(child.center(), root.center() + quadrant.sign() * 25.0);
    assert_eq!(child.parent(), Some(root.id()));
  }

  let leaf = forest.leaf_node_at(1.0, 1.0).expect("leaf");
  assert_eq!(leaf.depth(), 3);
  assert_eq!(leaf.size(), 12.5);
  assert_eq!(leaf.center(), DVec2::new(6.25, 6.25));
}

#[test]
fn test_depth_is_capped() {
  let mut forest = forest(config(100.0, 2));
  settle(&mut forest, eye(0.0, 0.0));

  for node in forest.nodes() {
    assert!(node.depth() <= 2);
    if node.depth() == 2 {
      assert!(!node.is_splitted());
    }
  }
}

/// Altitude does not affect the split decision.
#[test]
fn test_split_distance_is_horizontal() {
  let mut low = forest(config(100.0, 3));
  let mut high = forest(config(100.0, 3));
  low.update(DVec3::new(10.0, 0.0, -5.0));
  high.update(DVec3::new(10.0, 10_000.0, -5.0));

  let mut low_ids: Vec<NodeId> = low.nodes().map(QuadNode::id).collect();
  let mut high_ids: Vec<NodeId> = high.nodes().map(QuadNode::id).collect();
  low_ids.sort_unstable();
  high_ids.sort_unstable();
  assert_eq!(low_ids, high_ids);
}

/// leaf-ready → splitting → split-ready, old tile kept until the end.
#[test]
fn test_split_keeps_old_tile_until_children_ready() {
  let mut forest = single_level();
  let root_id = NodeId::root(0, 0);
  let far = eye(49.0, 49.0);

  settle(&mut forest, far);
  let root = forest.node(root_id).expect("root");
  assert_eq!(root.state(), NodeState::LeafReady);
  let old_tile = root.tile().expect("tile");
  forest.drain_events();

  let stats = forest.update(eye(0.0, 0.0));
  assert_eq!(stats.splits, 1);
  let root = forest.node(root_id).expect("root");
  assert_eq!(root.state(), NodeState::Splitting);
  assert_eq!(root.tile(), Some(old_tile));
  for child in root.children().expect("children") {
    assert_eq!(forest.node(*child).map(QuadNode::state), Some(NodeState::LeafUnready));
  }

  // Still answered by the old tile
  let expected = forest.tile(old_tile).and_then(|tile| tile.elevation_at(10.0, 10.0));
  assert!(expected.is_some());
  assert_eq!(forest.elevation_at(10.0, 10.0), expected);
  assert_eq!(forest.visible_tiles(), vec![old_tile]);

  forest.update(eye(0.0, 0.0));
  let root = forest.node(root_id).expect("root");
  assert_eq!(root.state(), NodeState::SplitReady);
  assert_eq!(root.tile(), None);
  assert!(forest.tile(old_tile).is_none());
  assert_eq!(forest.visible_tiles().len(), 4);

  let events = forest.drain_events();
  let released = TerrainEvent::TileReleased {
    node: root_id,
    tile: old_tile,
  };
  let released_at = events.iter().position(|e| *e == released).expect("released");
  let ready_count = events[..released_at]
    .iter()
    .filter(|e| matches!(e, TerrainEvent::TileReady { .. }))
    .count();
  assert_eq!(ready_count, 4, "children ready before the parent tile goes");
}

/// split-ready → unsplitting → leaf-ready, children kept until the end.
#[test]
fn test_unsplit_keeps_children_until_own_tile_ready() {
  let mut forest = single_level();
  let root_id = NodeId::root(0, 0);
  settle(&mut forest, eye(0.0, 0.0));
  let children = *forest
    .node(root_id)
    .and_then(QuadNode::children)
    .expect("split");
  forest.drain_events();

  let stats = forest.update(eye(49.0, 49.0));
  assert_eq!(stats.unsplits, 1);
  assert_eq!(stats.tiles_requested, 1);
  let root = forest.node(root_id).expect("root");
  assert_eq!(root.state(), NodeState::Unsplitting);
  assert!(root.tile().is_some());
  assert!(children.iter().all(|child| forest.node(*child).is_some()));
  assert_eq!(forest.visible_tiles().len(), 4);

  let stats = forest.update(eye(49.0, 49.0));
  assert_eq!(stats.nodes_destroyed, 4);
  let root = forest.node(root_id).expect("root");
  assert_eq!(root.state(), NodeState::LeafReady);
  assert!(children.iter().all(|child| forest.node(*child).is_none()));
  assert_eq!(forest.visible_tiles(), vec![root.tile().expect("tile")]);

  let events = forest.drain_events();
  for child in children {
    assert!(events.contains(&TerrainEvent::NodeDestroyed { node: child }));
  }
}

/// The rendered terrain covers the root at every tick, however the
/// viewpoint jumps.
#[test]
fn test_no_visible_gap_while_moving() {
  let mut forest = forest(config(100.0, 3).with_root_radius(0));
  settle(&mut forest, eye(0.0, 0.0));

  let path = [
    eye(30.0, 0.0),
    eye(-40.0, -40.0),
    eye(45.0, 45.0),
    eye(0.0, 0.0),
    eye(20.0, -35.0),
    eye(-49.0, 10.0),
    eye(-49.0, 10.0),
    eye(0.0, 49.0),
  ];

  for viewpoint in path {
    forest.update(viewpoint);
    assert_eq!(visible_area(&forest), 10_000.0, "gap at {:?}", viewpoint);

    for i in 0..20 {
      for j in 0..20 {
        let x = -50.0 + 5.0 * i as f64 + 2.5;
        let z = -50.0 + 5.0 * j as f64 + 2.5;
        assert!(
          forest.elevation_at(x, z).is_some(),
          "no elevation at ({}, {}) with viewpoint {:?}",
          x,
          z,
          viewpoint
        );
      }
    }
  }
}

// =========================================================================
// Neighbours and point queries
// =========================================================================

#[test]
fn test_neighbors_assigned() {
  let mut forest = forest(config(100.0, 3));
  settle(&mut forest, eye(0.0, 0.0));

  assert!(forest.nodes().all(QuadNode::neighbors_complete));

  let center = forest.node(NodeId::root(0, 0)).expect("root");
  assert_eq!(
    center.neighbor(Direction::E),
    Some(NeighborLink::Node(NodeId::root(1, 0)))
  );

  let east = forest.node(NodeId::root(1, 0)).expect("root");
  assert_eq!(east.neighbor(Direction::E), Some(NeighborLink::Boundary));

  // Same depth when it exists
  let leaf = forest.leaf_node_at(1.0, 1.0).expect("leaf");
  let Some(NeighborLink::Node(east_leaf)) = leaf.neighbor(Direction::E) else {
    panic!("expected a node east of {}", leaf.id());
  };
  let east_leaf = forest.node(east_leaf).expect("neighbor");
  assert_eq!(east_leaf.depth(), 3);
  assert_eq!(east_leaf.center(), DVec2::new(18.75, 6.25));

  // Coarser across the root edge
  let edge = NodeId::root(0, 0).child(Quadrant::Se).child(Quadrant::Ne);
  let edge = forest.node(edge).expect("depth-2 node");
  assert_eq!(
    edge.neighbor(Direction::E),
    Some(NeighborLink::Node(NodeId::root(1, 0).child(Quadrant::Sw)))
  );
}

#[test]
fn test_point_query_containment() {
  let mut forest = forest(config(100.0, 3));
  settle(&mut forest, eye(0.0, 0.0));

  for i in 0..30 {
    for j in 0..30 {
      let x = -150.0 + 10.0 * i as f64 + 3.3;
      let z = -150.0 + 10.0 * j as f64 + 7.1;
      let leaf = forest.leaf_node_at(x, z).expect("inside window");
      assert!(leaf.is_inside(x, z));
      assert!(leaf.children().is_none());

      // Every ancestor also contains the point
      let mut id = leaf.id();
      while let Some(parent) = id.parent() {
        assert!(forest.node(parent).is_some_and(|node| node.is_inside(x, z)));
        id = parent;
      }
    }
  }

  assert!(forest.leaf_node_at(150.0, 0.0).is_none(), "max edge is outside");
  assert!(forest.leaf_node_at(0.0, -151.0).is_none());
  assert!(forest.elevation_at(1000.0, 1000.0).is_none());
}

#[test]
fn test_elevation_matches_leaf_tile() {
  let mut forest = forest(config(100.0, 3));
  settle(&mut forest, eye(0.0, 0.0));

  for (x, z) in [(1.0, 1.0), (-33.3, 12.0), (120.0, -80.0)] {
    let leaf = forest.leaf_node_at(x, z).expect("leaf");
    let tile = leaf.tile().and_then(|id| forest.tile(id)).expect("tile");
    assert_eq!(forest.elevation_at(x, z), tile.elevation_at(x, z));
  }
}

// =========================================================================
// Regeneration and events
// =========================================================================

#[test]
fn test_set_generation_keeps_old_tiles_until_replaced() {
  let mut forest = forest(config(100.0, 2).with_root_radius(0));
  settle(&mut forest, eye(0.0, 0.0));
  let before = forest.elevation_at(5.0, 5.0).expect("ready");
  forest.drain_events();

  let mut louder = forest.config().generation;
  louder.base_amplitude *= 2.0;
  let posted = forest.set_generation(louder).expect("valid");
  assert_eq!(posted, forest.registry().len());

  // Old buffers until the new ones land
  assert_eq!(forest.elevation_at(5.0, 5.0), Some(before));

  let stats = forest.update(eye(0.0, 0.0));
  assert_eq!(stats.tiles_completed, posted);
  assert_eq!(stats.stale_results, 0);
  assert_ne!(forest.elevation_at(5.0, 5.0), Some(before));

  let ready = forest
    .drain_events()
    .iter()
    .filter(|e| matches!(e, TerrainEvent::TileReady { .. }))
    .count();
  assert_eq!(ready, posted);
}

#[test]
fn test_superseded_results_are_dropped() {
  let mut forest = forest(config(100.0, 2).with_root_radius(0));
  settle(&mut forest, eye(0.0, 0.0));

  let mut settings = forest.config().generation;
  settings.base_amplitude = 10.0;
  let posted = forest.set_generation(settings).expect("valid");
  settings.base_amplitude = 20.0;
  forest.set_generation(settings).expect("valid");

  let stats = forest.update(eye(0.0, 0.0));
  assert_eq!(stats.stale_results, posted);
  assert_eq!(stats.tiles_completed, posted);
  assert_eq!(forest.config().generation.base_amplitude, 20.0);
}

#[test]
fn test_set_generation_rejects_invalid_settings() {
  let mut forest = forest(config(100.0, 2));
  let before = forest.config().clone();

  let result = forest.set_generation(GenerationSettings::DEFAULT.with_subdivisions(0));
  assert_eq!(result, Err(ConfigError::ZeroSubdivisions));
  assert_eq!(forest.config(), &before);
}

#[derive(Default)]
struct Recorder {
  ready: Vec<TileId>,
  released: Vec<TileId>,
  destroyed: Vec<NodeId>,
}

impl TerrainPresentation for Recorder {
  fn on_tile_ready(&mut self, _node: NodeId, tile: &Tile) {
    assert!(tile.buffers().is_some());
    self.ready.push(tile.id());
  }

  fn on_tile_released(&mut self, _node: NodeId, tile: TileId) {
    self.released.push(tile);
  }

  fn on_node_destroyed(&mut self, node: NodeId) {
    self.destroyed.push(node);
  }
}

#[test]
fn test_present_dispatches_events() {
  let mut forest = forest(config(100.0, 3).with_root_radius(0));
  let mut recorder = Recorder::default();

  forest.update(eye(0.0, 0.0));
  assert_eq!(forest.present(&mut recorder), 0);

  forest.update(eye(0.0, 0.0));
  let count = forest.present(&mut recorder);
  assert_eq!(count, recorder.ready.len());
  assert_eq!(recorder.ready.len(), forest.leaves().count());
  assert!(recorder.released.is_empty());
  assert!(forest.drain_events().is_empty());

  forest.update(eye(5000.0, 0.0));
  forest.present(&mut recorder);
  assert!(recorder.destroyed.contains(&NodeId::root(0, 0)));
  assert_eq!(recorder.released.len(), recorder.ready.len());

  forest.update(eye(5000.0, 0.0));
  assert!(forest.present(&mut crate::presentation::NullPresentation) > 0);
}
