// Ray-intersection seam between the graph pipeline and scene geometry.
//
// The generator and classifier never own geometry. They borrow anything
// implementing `RayOracle`, which answers nearest-hit and occlusion queries.
// `mesh.rs` provides a BVH-backed reference implementation; callers with
// their own acceleration structure implement the trait directly.
//
// Oracles must be `Sync`: the generator classifies a whole frontier batch
// across rayon workers against the same oracle.

use crate::types::Point3;
use serde::{Deserialize, Serialize};

/// Nearest intersection of a ray with the scene.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RayHit {
    /// Distance from the ray origin along the (unit) direction.
    pub distance: f32,
    pub point: Point3,
    /// Identifier of the mesh that was hit.
    pub mesh_id: u32,
}

pub trait RayOracle: Sync {
    /// Nearest hit along `direction` from `origin`. `direction` need not be
    /// normalized; distances are reported in world units.
    fn cast(&self, origin: Point3, direction: Point3) -> Option<RayHit>;

    /// True if anything lies along the ray within `max_distance`.
    fn occluded(&self, origin: Point3, direction: Point3, max_distance: f32) -> bool {
        self.cast(origin, direction)
            .is_some_and(|hit| hit.distance <= max_distance)
    }
}

impl<T: RayOracle + ?Sized> RayOracle for &T {
    fn cast(&self, origin: Point3, direction: Point3) -> Option<RayHit> {
        (**self).cast(origin, direction)
    }

    fn occluded(&self, origin: Point3, direction: Point3, max_distance: f32) -> bool {
        (**self).occluded(origin, direction, max_distance)
    }
}

/// Which meshes may carry nodes.
///
/// - No ids at all: every surface is walkable.
/// - Obstacle ids: floors on those meshes are never walkable.
/// - Walkable ids: only floors on those meshes are walkable.
///
/// Line-of-sight and clearance rays are not filtered; obstacles still block.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurfaceFilter {
    pub obstacle_ids: Vec<u32>,
    pub walkable_ids: Vec<u32>,
}

impl SurfaceFilter {
    pub fn new(obstacle_ids: Vec<u32>, walkable_ids: Vec<u32>) -> Self {
        Self {
            obstacle_ids,
            walkable_ids,
        }
    }

    pub fn is_walkable(&self, mesh_id: u32) -> bool {
        if self.obstacle_ids.contains(&mesh_id) {
            return false;
        }
        self.walkable_ids.is_empty() || self.walkable_ids.contains(&mesh_id)
    }
}
