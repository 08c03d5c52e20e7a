// Core value types shared across the graph pipeline.
//
// Defines the spatial point type (`Point3`), dense node identifiers
// (`NodeId`), the step classification of an edge (`StepType`), the node
// record stored in the graph (`Node`), and the per-edge metadata that the
// cost engine reads (`EdgeMeta`). All types derive `Serialize` and
// `Deserialize` so graphs and configs round-trip through JSON.
//
// Rounding policy: every generated coordinate is snapped to a fixed grid of
// `ROUNDING_PRECISION` and node identity is decided by the integer
// `PositionKey` of that grid. No other module rounds on its own.
//
// See also: `graph.rs` for the store that owns `Node`/`EdgeMeta`,
// `classifier.rs` which produces the values that populate `EdgeMeta`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Mul, Sub};

/// Grid size every generated coordinate is snapped to.
pub const ROUNDING_PRECISION: f64 = 1.0e-4;

/// Height differences below this are treated as level ground.
pub const FLAT_TOLERANCE: f32 = 1.0e-3;

/// Snap a coordinate to the `ROUNDING_PRECISION` grid.
pub fn round_to_precision(value: f32) -> f32 {
    ((value as f64 / ROUNDING_PRECISION).round() * ROUNDING_PRECISION) as f32
}

// ---------------------------------------------------------------------------
// Spatial types
// ---------------------------------------------------------------------------

/// A position or direction in world space. Z is up.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Point3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub const DOWN: Self = Self::new(0.0, 0.0, -1.0);

    pub fn length(self) -> f32 {
        self.dot(self).sqrt()
    }

    pub fn dot(self, other: Self) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// Unit vector in the same direction, or `None` for a zero vector.
    pub fn normalized(self) -> Option<Self> {
        let len = self.length();
        if len > 0.0 && len.is_finite() {
            Some(self * (1.0 / len))
        } else {
            None
        }
    }

    /// 3D Euclidean distance.
    pub fn distance(self, other: Self) -> f32 {
        (other - self).length()
    }

    /// Distance ignoring the vertical axis.
    pub fn planar_distance(self, other: Self) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Copy with the z component shifted by `dz`.
    pub fn raised(self, dz: f32) -> Self {
        Self::new(self.x, self.y, self.z + dz)
    }

    /// Copy with every component snapped to the rounding grid.
    pub fn rounded(self) -> Self {
        Self::new(
            round_to_precision(self.x),
            round_to_precision(self.y),
            round_to_precision(self.z),
        )
    }

    /// Integer grid key used for node identity.
    pub fn key(self) -> PositionKey {
        let q = |v: f32| (v as f64 / ROUNDING_PRECISION).round() as i64;
        PositionKey([q(self.x), q(self.y), q(self.z)])
    }
}

impl Add for Point3 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Point3 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f32> for Point3 {
    type Output = Self;
    fn mul(self, rhs: f32) -> Self {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl From<[f32; 3]> for Point3 {
    fn from([x, y, z]: [f32; 3]) -> Self {
        Self::new(x, y, z)
    }
}

impl fmt::Display for Point3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Position quantized to the rounding grid. Two points with the same key
/// are the same node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PositionKey(pub [i64; 3]);

// ---------------------------------------------------------------------------
// Graph identifiers and records
// ---------------------------------------------------------------------------

/// Dense node identifier. IDs are `0..N` in creation order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How an edge (or the node it discovered) is traversed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StepType {
    /// Walkable without a step: level ground or a slope within limits.
    #[default]
    Flat,
    /// Step up onto a higher surface.
    StepUp,
    /// Step down onto a lower surface.
    StepDown,
    /// Step over a low obstruction onto a surface at the same height.
    StepOver,
}

impl StepType {
    /// Numeric code used when the step type is promoted to a cost layer.
    /// Zero is reserved for "not connected".
    pub const fn code(self) -> u8 {
        match self {
            StepType::Flat => 1,
            StepType::StepUp => 2,
            StepType::StepDown => 3,
            StepType::StepOver => 4,
        }
    }
}

/// A node in the accessibility graph.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub position: Point3,
    /// Step type of the edge that first discovered this node.
    pub step: StepType,
}

/// Geometry recorded alongside every default-set edge so alternate cost
/// layers can be derived without casting rays again.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EdgeMeta {
    pub planar_distance: f32,
    /// Signed slope in degrees, positive uphill.
    pub slope: f32,
    pub step: StepType,
    /// Planar distance with the slope penalty applied.
    pub weight: f32,
}

impl EdgeMeta {
    /// Metadata inferred from the endpoint positions alone, used for edges
    /// added by hand rather than by the generator.
    pub fn between(parent: Point3, child: Point3) -> Self {
        let planar = parent.planar_distance(child);
        let dz = child.z - parent.z;
        let slope = if dz.abs() < FLAT_TOLERANCE {
            0.0
        } else {
            dz.atan2(planar).to_degrees()
        };
        Self {
            planar_distance: planar,
            slope,
            step: StepType::Flat,
            weight: slope_weight(planar, slope),
        }
    }
}

/// Penalty multiplier per unit of `tan(|slope|)` when walking uphill.
pub const UPHILL_PENALTY: f32 = 1.0;
/// Penalty multiplier per unit of `tan(|slope|)` when walking downhill.
pub const DOWNHILL_PENALTY: f32 = 0.5;

/// Planar distance scaled by an asymmetric slope penalty. The penalty grows
/// without bound as the slope approaches ±90°.
pub fn slope_weight(planar_distance: f32, slope_degrees: f32) -> f32 {
    let k = if slope_degrees >= 0.0 {
        UPHILL_PENALTY
    } else {
        DOWNHILL_PENALTY
    };
    let steepness = slope_degrees.abs().to_radians().tan();
    planar_distance * (1.0 + k * steepness)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounding_snaps_to_grid() {
        assert_eq!(round_to_precision(1.23456), 1.2346);
        assert_eq!(round_to_precision(-0.00004), 0.0);
        let a = Point3::new(0.10001, 2.0, -3.0);
        let b = Point3::new(0.09999, 2.00002, -3.00004);
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn distinct_grid_cells_have_distinct_keys() {
        let a = Point3::new(1.0, 0.0, 0.0);
        let b = Point3::new(1.0002, 0.0, 0.0);
        assert_ne!(a.key(), b.key());
    }

    #[test]
    fn planar_distance_ignores_height() {
        let a = Point3::new(0.0, 0.0, 0.0);
        let b = Point3::new(3.0, 4.0, 12.0);
        assert_eq!(a.planar_distance(b), 5.0);
        assert_eq!(a.distance(b), 13.0);
    }

    #[test]
    fn zero_vector_has_no_direction() {
        assert!(Point3::default().normalized().is_none());
        let d = Point3::new(0.0, 0.0, -2.0).normalized().unwrap();
        assert_eq!(d, Point3::DOWN);
    }

    #[test]
    fn step_codes_skip_zero() {
        assert_eq!(StepType::Flat.code(), 1);
        assert_eq!(StepType::StepUp.code(), 2);
        assert_eq!(StepType::StepDown.code(), 3);
        assert_eq!(StepType::StepOver.code(), 4);
    }

    #[test]
    fn slope_weight_is_asymmetric() {
        assert_eq!(slope_weight(2.0, 0.0), 2.0);
        let up = slope_weight(1.0, 30.0);
        let down = slope_weight(1.0, -30.0);
        assert!(up > down);
        assert!(down > 1.0);
        assert!(slope_weight(1.0, 89.9) > 500.0);
    }

    #[test]
    fn meta_between_level_points_is_flat() {
        let meta = EdgeMeta::between(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 0.0));
        assert_eq!(meta.slope, 0.0);
        assert_eq!(meta.step, StepType::Flat);
        assert!((meta.planar_distance - 2f32.sqrt()).abs() < 1e-6);
    }
}
