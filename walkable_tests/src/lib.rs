// Shared scenes and helpers for end-to-end pipeline tests.
//
// Each scene is a small analytic `TriangleMesh` whose walkable layout is
// known by construction, so tests can assert exact node counts and step
// classifications. `init_tracing` installs an env-filtered subscriber once
// per test binary (`RUST_LOG=walkable_graph=debug` shows generator rounds).
//
// See also: `tests/full_pipeline.rs` for the scenarios.

use std::sync::Once;

use walkable_graph::config::GeneratorConfig;
use walkable_graph::mesh::{MeshBuilder, TriangleMesh};
use walkable_graph::types::Point3;

/// Mesh id of the floor in every scene.
pub const FLOOR: u32 = 0;
/// Mesh id of raised platforms.
pub const PLATFORM: u32 = 1;
/// Mesh id of walls and other obstacles.
pub const WALL: u32 = 2;

static TRACING: Once = Once::new();

pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Square floor from -`half` to `half` on both axes at z = 0.
pub fn floor(half: f32) -> MeshBuilder {
    MeshBuilder::new().plane(FLOOR, (-half, -half), (half, half), 0.0)
}

/// 21x21 grid of walkable points (x, y in -10..=10).
pub fn flat_plane() -> TriangleMesh {
    floor(10.5).build()
}

/// Floor with a 0.15-high platform covering x >= 0.5 and a 2-high wall
/// segment along x = -2.5 for y in [-4.7, 1.7].
pub fn courtyard() -> TriangleMesh {
    floor(5.5)
        .cuboid(PLATFORM, Point3::new(0.5, -5.5, 0.0), Point3::new(5.5, 5.5, 0.15))
        .cuboid(WALL, Point3::new(-2.6, -4.7, 0.0), Point3::new(-2.4, 1.7, 2.0))
        .build()
}

/// Two floors joined by nothing: the start floor and an island 3 units away.
pub fn islands() -> TriangleMesh {
    MeshBuilder::new()
        .plane(FLOOR, (-1.5, -1.5), (1.5, 1.5), 0.0)
        .plane(FLOOR, (4.5, -1.5), (7.5, 1.5), 0.0)
        .build()
}

/// Serial config seeded above the origin.
pub fn serial_config() -> GeneratorConfig {
    GeneratorConfig {
        start_point: Point3::new(0.0, 0.0, 1.0),
        cores: 0,
        ..GeneratorConfig::default()
    }
}

pub fn with_cores(cores: i32) -> GeneratorConfig {
    GeneratorConfig {
        cores,
        ..serial_config()
    }
}
