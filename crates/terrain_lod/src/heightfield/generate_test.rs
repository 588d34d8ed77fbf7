use super::*;
use crate::config::GenerationSettings;

const N: u32 = 16;

fn params() -> HeightFieldParams {
  HeightFieldParams::new("p", &GenerationSettings::DEFAULT.with_subdivisions(N))
}

fn flat_params() -> HeightFieldParams {
  let mut settings = GenerationSettings::DEFAULT.with_subdivisions(N);
  settings.base_amplitude = 0.0;
  HeightFieldParams::new("p", &settings)
}

fn vertex(buffers: &TileBuffers, i: usize, j: usize) -> [f32; 3] {
  let base = (j * buffers.segments() + i) * 3;
  [
    buffers.positions[base],
    buffers.positions[base + 1],
    buffers.positions[base + 2],
  ]
}

// =========================================================================
// Determinism and layout
// =========================================================================

/// Same footprint, params and iterations: byte-identical buffers.
#[test]
fn test_generate_is_deterministic() {
  let footprint = Footprint::new(37.5, -112.5, 25.0);
  let a = generate(&footprint, 6, &params());
  let b = generate(&footprint, 6, &params());

  assert_eq!(a.positions, b.positions);
  assert_eq!(a.normals, b.normals);
  assert_eq!(a.indices, b.indices);
  assert_eq!(a.texels, b.texels);
  assert_eq!(a.uvs, b.uvs);
}

#[test]
fn test_different_seeds_differ() {
  let footprint = Footprint::new(0.0, 0.0, 400.0);
  let settings = GenerationSettings::DEFAULT.with_subdivisions(N);
  let a = generate(&footprint, 8, &HeightFieldParams::new("p", &settings));
  let b = generate(&footprint, 8, &HeightFieldParams::new("q", &settings));
  assert_ne!(a.positions, b.positions);
}

#[test]
fn test_buffer_sizes() {
  let buffers = generate(&Footprint::new(0.0, 0.0, 10.0), 3, &params());
  let segments = (N + 1) as usize;

  assert_eq!(buffers.subdivisions, N);
  assert_eq!(buffers.vertex_count(), segments * segments);
  assert_eq!(buffers.normals.len(), segments * segments * 3);
  assert_eq!(buffers.texels.len(), segments * segments * 4);
  assert_eq!(buffers.uvs.len(), segments * segments * 2);
  assert_eq!(buffers.triangle_count(), (N * N * 2) as usize);
  assert!(buffers
    .indices
    .iter()
    .all(|&index| (index as usize) < buffers.vertex_count()));
}

/// Positions are world space: corners sit on the footprint corners.
#[test]
fn test_positions_are_world_space() {
  let footprint = Footprint::new(100.0, -50.0, 20.0);
  let buffers = generate(&footprint, 2, &params());
  let n = N as usize;

  let first = vertex(&buffers, 0, 0);
  assert_eq!(first[0], 90.0);
  assert_eq!(first[2], -60.0);

  let last = vertex(&buffers, n, n);
  assert_eq!(last[0], 110.0);
  assert_eq!(last[2], -40.0);

  // x varies fastest
  let second = vertex(&buffers, 1, 0);
  assert!(second[0] > first[0]);
  assert_eq!(second[2], first[2]);
}

#[test]
fn test_uvs_span_unit_square() {
  let buffers = generate(&Footprint::new(0.0, 0.0, 10.0), 2, &params());
  let last = buffers.uvs.len() - 2;
  assert_eq!(&buffers.uvs[..2], &[0.0, 0.0]);
  assert_eq!(&buffers.uvs[last..], &[1.0, 1.0]);
  assert!(buffers.uvs.iter().all(|uv| (0.0..=1.0).contains(uv)));
}

/// Both triangles of every cell face +Y.
#[test]
fn test_triangles_wind_counter_clockwise_from_above() {
  let buffers = generate(&Footprint::new(0.0, 0.0, 50.0), 8, &params());
  let position = |index: u32| -> glam::Vec3 {
    let base = index as usize * 3;
    glam::Vec3::new(
      buffers.positions[base],
      buffers.positions[base + 1],
      buffers.positions[base + 2],
    )
  };

  for triangle in buffers.indices.chunks_exact(3) {
    let a = position(triangle[0]);
    let b = position(triangle[1]);
    let c = position(triangle[2]);
    let normal = (b - a).cross(c - a);
    assert!(normal.y > 0.0, "triangle {:?} faces down", triangle);
  }
}

/// First cell is split along the (0,0)-(1,1) diagonal.
#[test]
fn test_cell_diagonal() {
  let buffers = generate(&Footprint::new(0.0, 0.0, 10.0), 1, &params());
  let segments = buffers.segments() as u32;
  assert_eq!(
    &buffers.indices[..6],
    &[0, segments, segments + 1, 0, segments + 1, 1]
  );
}

// =========================================================================
// Normals and texels
// =========================================================================

#[test]
fn test_normals_are_unit_length() {
  let buffers = generate(&Footprint::new(-300.0, 80.0, 200.0), 8, &params());
  for normal in buffers.normals.chunks_exact(3) {
    let length = glam::Vec3::new(normal[0], normal[1], normal[2]).length();
    assert!((length - 1.0).abs() < 1e-4, "normal length {}", length);
    assert!(normal[1] > 0.0);
  }
}

#[test]
fn test_flat_field_points_up() {
  let buffers = generate(&Footprint::new(0.0, 0.0, 10.0), 8, &flat_params());

  for normal in buffers.normals.chunks_exact(3) {
    assert_eq!(normal, &[0.0, 1.0, 0.0]);
  }
  // Flat field sits at -elevation_offset
  assert!(buffers.positions.chunks_exact(3).all(|p| p[1] == -1.0));
  // Packed normal (0, 1, 0) and mid elevation
  for texel in buffers.texels.chunks_exact(4) {
    assert_eq!(texel, &[128, 255, 128, 128]);
  }
}

// =========================================================================
// Seams
// =========================================================================

/// Adjacent same-size tiles share bit-identical border vertices.
#[test]
fn test_edge_agreement_east_west() {
  let p = params();
  let west = generate(&Footprint::new(0.0, 0.0, 25.0), 6, &p);
  let east = generate(&Footprint::new(25.0, 0.0, 25.0), 6, &p);
  let n = N as usize;

  for j in 0..=n {
    assert_eq!(vertex(&west, n, j), vertex(&east, 0, j), "row {}", j);

    let wi = (j * west.segments() + n) * 3;
    let ei = (j * east.segments()) * 3;
    for k in 0..3 {
      assert!((west.normals[wi + k] - east.normals[ei + k]).abs() < 1e-5);
    }
  }
}

#[test]
fn test_edge_agreement_north_south() {
  let p = params();
  let north = generate(&Footprint::new(-12.5, -12.5, 25.0), 6, &p);
  let south = generate(&Footprint::new(-12.5, 12.5, 25.0), 6, &p);
  let n = N as usize;

  for i in 0..=n {
    assert_eq!(vertex(&north, i, n), vertex(&south, i, 0), "column {}", i);
  }
}

/// A coarse tile edge passes through every other vertex of a fine neighbour.
#[test]
fn test_coarse_edge_matches_fine_vertices() {
  let p = params();
  let coarse = generate(&Footprint::new(0.0, 0.0, 50.0), 6, &p);
  let fine = generate(&Footprint::new(37.5, -12.5, 25.0), 6, &p);
  let n = N as usize;

  // Fine tile covers the north half of the coarse east edge: row j -> j / 2
  for j in (0..=n).step_by(2) {
    assert_eq!(vertex(&fine, 0, j), vertex(&coarse, n, j / 2));
  }
}

// =========================================================================
// Elevation lookup
// =========================================================================

/// Grid points return the stored vertex height with no interpolation error.
#[test]
fn test_elevation_at_grid_points_is_exact() {
  let footprint = Footprint::new(12.5, -37.5, 25.0);
  let buffers = generate(&footprint, 5, &params());
  let n = N as usize;
  let cell = footprint.size / n as f64;

  for j in 0..=n {
    for i in 0..=n {
      let x = footprint.min_x() + cell * i as f64;
      let z = footprint.min_z() + cell * j as f64;
      assert_eq!(
        buffers.elevation_at(&footprint, x, z),
        Some(buffers.height(i, j)),
        "vertex ({}, {})",
        i,
        j
      );
    }
  }
}

#[test]
fn test_elevation_at_corners() {
  let footprint = Footprint::new(0.0, 0.0, 12.5);
  let buffers = generate(&footprint, 4, &params());
  let n = N as usize;

  let corners = [
    (footprint.min_x(), footprint.min_z(), buffers.height(0, 0)),
    (footprint.max_x(), footprint.min_z(), buffers.height(n, 0)),
    (footprint.min_x(), footprint.max_z(), buffers.height(0, n)),
    (footprint.max_x(), footprint.max_z(), buffers.height(n, n)),
  ];
  for (x, z, expected) in corners {
    assert_eq!(buffers.elevation_at(&footprint, x, z), Some(expected));
  }
}

/// Inside a cell the result stays within the triangle's height range.
#[test]
fn test_elevation_at_interpolates_within_triangle() {
  let footprint = Footprint::new(0.0, 0.0, 16.0);
  let buffers = generate(&footprint, 8, &params());

  // Cell (3, 5), point above the diagonal (fx < fz) -> triangle a, c, d
  let (x, z) = (-8.0 + 3.25, -8.0 + 5.75);
  let a = buffers.height(3, 5);
  let c = buffers.height(3, 6);
  let d = buffers.height(4, 6);
  let expected = a * 0.25 + c * 0.5 + d * 0.25;
  let actual = buffers.elevation_at(&footprint, x, z).unwrap_or(f32::NAN);
  assert!((actual - expected).abs() < 1e-4, "{} vs {}", actual, expected);

  // Below the diagonal (fx >= fz) -> triangle a, d, b
  let (x, z) = (-8.0 + 3.75, -8.0 + 5.25);
  let b = buffers.height(4, 5);
  let expected = a * 0.25 + b * 0.5 + d * 0.25;
  let actual = buffers.elevation_at(&footprint, x, z).unwrap_or(f32::NAN);
  assert!((actual - expected).abs() < 1e-4, "{} vs {}", actual, expected);
}

#[test]
fn test_elevation_at_outside_footprint() {
  let footprint = Footprint::new(0.0, 0.0, 10.0);
  let buffers = generate(&footprint, 2, &params());
  assert_eq!(buffers.elevation_at(&footprint, 5.01, 0.0), None);
  assert_eq!(buffers.elevation_at(&footprint, 0.0, -5.5), None);
}

#[test]
fn test_fewer_iterations_change_detail() {
  let footprint = Footprint::new(500.0, 500.0, 100.0);
  let coarse = generate(&footprint, 1, &params());
  let fine = generate(&footprint, 8, &params());
  assert_ne!(coarse.positions, fine.positions);
}
