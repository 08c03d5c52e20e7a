// Parent→candidate connectivity test.
//
// Given a parent node position and an unprojected candidate, decides
// whether an agent can move between them and how:
//
// 1. Floor test: cast straight down from just above the candidate. A miss,
//    or a hit on a surface the `SurfaceFilter` excludes, rejects. The
//    candidate drops onto the hit height.
// 2. Step gate: the height change must fit within `up_step`/`down_step`.
// 3. Line of sight between the two positions, both lifted by
//    `GROUND_OFFSET`. If clear, the connection is level (|dz| below
//    `FLAT_TOLERANCE`) or a slope that must lie within
//    `[-down_slope, up_slope]`.
// 4. If blocked, raise the lower end by its step allowance and test again.
//    Success is a step up, step down or step over by relative height.
// 5. Optional clearance ring: 12 horizontal rays at step height around the
//    candidate; any hit nearer than `min_passage_width` rejects.
//
// A rejection is `None`, never an error. The classifier keeps no state and
// borrows its oracle, so one instance is shared by every rayon worker.
//
// See also: `generator.rs` which drives this over the BFS frontier,
// `types.rs` for the rounding policy and `slope_weight`.

use crate::config::ClassifierLimits;
use crate::oracle::{RayOracle, SurfaceFilter};
use crate::types::{FLAT_TOLERANCE, Point3, StepType, slope_weight};

/// Lift applied to both ends of a line-of-sight ray so it does not graze
/// the surface it starts on.
pub const GROUND_OFFSET: f32 = 1.0e-3;

/// Number of horizontal rays in the clearance ring (one every 30°).
pub const CLEARANCE_RAYS: usize = 12;

/// An accepted candidate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Classified {
    /// Floor position of the candidate, snapped to the rounding grid.
    pub position: Point3,
    pub step: StepType,
    /// Signed slope in degrees, positive uphill. Zero for level ground.
    pub slope: f32,
    pub planar_distance: f32,
    /// 3D distance from the parent.
    pub distance: f32,
    /// Planar distance with the slope penalty applied.
    pub weight: f32,
}

pub struct Classifier<'a, O: RayOracle + ?Sized> {
    oracle: &'a O,
    limits: ClassifierLimits,
    filter: SurfaceFilter,
}

impl<'a, O: RayOracle + ?Sized> Classifier<'a, O> {
    pub fn new(oracle: &'a O, limits: ClassifierLimits, filter: SurfaceFilter) -> Self {
        Self {
            oracle,
            limits,
            filter,
        }
    }

    pub fn limits(&self) -> &ClassifierLimits {
        &self.limits
    }

    /// Drop `point` onto the walkable floor below it.
    pub fn project_to_floor(&self, point: Point3) -> Option<Point3> {
        let origin = point.raised(GROUND_OFFSET);
        let hit = self.oracle.cast(origin, Point3::DOWN)?;
        if !self.filter.is_walkable(hit.mesh_id) {
            return None;
        }
        Some(Point3::new(point.x, point.y, hit.point.z).rounded())
    }

    /// Decide whether `parent` connects to `candidate`.
    pub fn classify(&self, parent: Point3, candidate: Point3) -> Option<Classified> {
        let child = self.project_to_floor(candidate)?;
        let limits = &self.limits;

        let dz = child.z - parent.z;
        if -dz > limits.down_step || dz > limits.up_step {
            return None;
        }

        let planar_distance = parent.planar_distance(child);
        let slope = if dz.abs() < FLAT_TOLERANCE {
            0.0
        } else {
            dz.atan2(planar_distance).to_degrees()
        };
        // The slope gate only applies to unobstructed connections; steps
        // are bounded by the height gate above.
        let step = if self.line_of_sight(parent, child) {
            if slope > limits.up_slope || slope < -limits.down_slope {
                return None;
            }
            StepType::Flat
        } else {
            self.stepped(parent, child, dz)?
        };

        if !self.has_clearance(child) {
            return None;
        }

        Some(Classified {
            position: child,
            step,
            slope,
            planar_distance,
            distance: parent.distance(child),
            weight: slope_weight(planar_distance, slope),
        })
    }

    /// Retry a blocked connection with the lower end raised.
    fn stepped(&self, parent: Point3, child: Point3, dz: f32) -> Option<StepType> {
        let (from, to, step) = if dz >= FLAT_TOLERANCE {
            (parent.raised(self.limits.up_step), child, StepType::StepUp)
        } else if dz <= -FLAT_TOLERANCE {
            (parent, child.raised(self.limits.down_step), StepType::StepDown)
        } else {
            (parent.raised(self.limits.up_step), child, StepType::StepOver)
        };
        self.line_of_sight(from, to).then_some(step)
    }

    fn line_of_sight(&self, from: Point3, to: Point3) -> bool {
        let origin = from.raised(GROUND_OFFSET);
        let target = to.raised(GROUND_OFFSET);
        let delta = target - origin;
        match delta.normalized() {
            Some(dir) => !self.oracle.occluded(origin, dir, delta.length()),
            None => true,
        }
    }

    fn has_clearance(&self, position: Point3) -> bool {
        let width = self.limits.min_passage_width;
        if width <= 0.0 {
            return true;
        }
        let origin = position.raised(self.limits.up_step);
        (0..CLEARANCE_RAYS).all(|i| {
            let angle = (i as f32 * 30.0).to_radians();
            let dir = Point3::new(angle.cos(), angle.sin(), 0.0);
            !self.oracle.occluded(origin, dir, width)
        })
    }
}
