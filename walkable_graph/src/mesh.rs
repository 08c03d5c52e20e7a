// Reference `RayOracle` over an in-memory triangle soup.
//
// `TriangleMesh` stores triangles tagged with a mesh id and accelerates ray
// queries with a median-split AABB bounding volume hierarchy. Intersection
// uses Möller–Trumbore and runs in f64 so that rays grazing a shared edge
// (floor casts at grid points on a quad's diagonal) still hit one of the
// two triangles.
//
// `MeshBuilder` assembles scenes from planes, quads, boxes and height
// fields. It is the geometry source for tests and benches; real scenes come
// from whatever loader the caller uses, converted to triangles.
//
// See also: `oracle.rs` for the trait this implements.

use crate::oracle::{RayHit, RayOracle};
use crate::types::Point3;

/// Slack on barycentric bounds so edge-aligned rays are not lost between
/// adjacent triangles.
const EDGE_TOLERANCE: f64 = 1.0e-9;
/// Determinant below which a ray counts as parallel to a triangle.
const PARALLEL_EPSILON: f64 = 1.0e-12;
/// Minimum hit distance; also the AABB padding.
const HIT_EPSILON: f64 = 1.0e-7;

// ---------------------------------------------------------------------------
// f64 vector math
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq)]
struct Vec3d {
    x: f64,
    y: f64,
    z: f64,
}

impl Vec3d {
    const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    fn from_point(p: Point3) -> Self {
        Self::new(p.x as f64, p.y as f64, p.z as f64)
    }

    fn sub(self, o: Self) -> Self {
        Self::new(self.x - o.x, self.y - o.y, self.z - o.z)
    }

    fn dot(self, o: Self) -> f64 {
        self.x * o.x + self.y * o.y + self.z * o.z
    }

    fn cross(self, o: Self) -> Self {
        Self::new(
            self.y * o.z - self.z * o.y,
            self.z * o.x - self.x * o.z,
            self.x * o.y - self.y * o.x,
        )
    }

    fn axis(self, axis: usize) -> f64 {
        match axis {
            0 => self.x,
            1 => self.y,
            _ => self.z,
        }
    }

    fn min(self, o: Self) -> Self {
        Self::new(self.x.min(o.x), self.y.min(o.y), self.z.min(o.z))
    }

    fn max(self, o: Self) -> Self {
        Self::new(self.x.max(o.x), self.y.max(o.y), self.z.max(o.z))
    }
}

#[derive(Clone, Copy, Debug)]
struct Triangle {
    v0: Vec3d,
    v1: Vec3d,
    v2: Vec3d,
    mesh_id: u32,
}

impl Triangle {
    fn centroid(&self, axis: usize) -> f64 {
        (self.v0.axis(axis) + self.v1.axis(axis) + self.v2.axis(axis)) / 3.0
    }

    /// Möller–Trumbore. Returns the hit distance along `dir`.
    #[allow(clippy::many_single_char_names)]
    fn intersect(&self, origin: Vec3d, dir: Vec3d) -> Option<f64> {
        let edge1 = self.v1.sub(self.v0);
        let edge2 = self.v2.sub(self.v0);
        let h = dir.cross(edge2);
        let a = edge1.dot(h);
        if a.abs() < PARALLEL_EPSILON {
            return None;
        }
        let f = 1.0 / a;
        let s = origin.sub(self.v0);
        let u = f * s.dot(h);
        if !(-EDGE_TOLERANCE..=1.0 + EDGE_TOLERANCE).contains(&u) {
            return None;
        }
        let q = s.cross(edge1);
        let v = f * dir.dot(q);
        if v < -EDGE_TOLERANCE || u + v > 1.0 + EDGE_TOLERANCE {
            return None;
        }
        let t = f * edge2.dot(q);
        (t > HIT_EPSILON).then_some(t)
    }
}

// ---------------------------------------------------------------------------
// BVH
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug)]
struct Aabb {
    min: Vec3d,
    max: Vec3d,
}

impl Aabb {
    fn of(tri: &Triangle) -> Self {
        Self {
            min: tri.v0.min(tri.v1).min(tri.v2),
            max: tri.v0.max(tri.v1).max(tri.v2),
        }
    }

    fn union(self, other: Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    fn padded(self) -> Self {
        let pad = Vec3d::new(HIT_EPSILON, HIT_EPSILON, HIT_EPSILON);
        Self {
            min: self.min.sub(pad),
            max: Vec3d::new(
                self.max.x + HIT_EPSILON,
                self.max.y + HIT_EPSILON,
                self.max.z + HIT_EPSILON,
            ),
        }
    }

    /// Slab test. Returns the entry distance if the ray touches the box.
    fn entry(&self, origin: Vec3d, inv_dir: Vec3d) -> Option<f64> {
        let mut t_min = f64::NEG_INFINITY;
        let mut t_max = f64::INFINITY;
        for axis in 0..3 {
            let o = origin.axis(axis);
            let inv = inv_dir.axis(axis);
            let (lo, hi) = (self.min.axis(axis), self.max.axis(axis));
            if inv.is_infinite() {
                // Ray parallel to this slab.
                if o < lo || o > hi {
                    return None;
                }
                continue;
            }
            let t1 = (lo - o) * inv;
            let t2 = (hi - o) * inv;
            t_min = t_min.max(t1.min(t2));
            t_max = t_max.min(t1.max(t2));
        }
        (t_max >= t_min && t_max >= 0.0).then_some(t_min.max(0.0))
    }
}

#[derive(Debug)]
enum BvhNode {
    Leaf {
        aabb: Aabb,
        triangle: usize,
    },
    Internal {
        aabb: Aabb,
        left: Box<BvhNode>,
        right: Box<BvhNode>,
    },
}

impl BvhNode {
    fn build(triangles: &[Triangle], indices: &mut [usize]) -> Option<Self> {
        if indices.is_empty() {
            return None;
        }
        if indices.len() == 1 {
            let idx = indices[0];
            return Some(Self::Leaf {
                aabb: Aabb::of(&triangles[idx]).padded(),
                triangle: idx,
            });
        }

        let aabb = indices
            .iter()
            .map(|&i| Aabb::of(&triangles[i]))
            .reduce(Aabb::union)?
            .padded();

        // Split on the longest axis at the median centroid.
        let extent = aabb.max.sub(aabb.min);
        let axis = if extent.x >= extent.y && extent.x >= extent.z {
            0
        } else if extent.y >= extent.z {
            1
        } else {
            2
        };
        indices.sort_by(|&a, &b| {
            triangles[a]
                .centroid(axis)
                .total_cmp(&triangles[b].centroid(axis))
        });
        let mid = indices.len() / 2;
        let (left, right) = indices.split_at_mut(mid);
        match (Self::build(triangles, left), Self::build(triangles, right)) {
            (Some(l), Some(r)) => Some(Self::Internal {
                aabb,
                left: Box::new(l),
                right: Box::new(r),
            }),
            (Some(only), None) | (None, Some(only)) => Some(only),
            (None, None) => None,
        }
    }

    fn aabb(&self) -> &Aabb {
        match self {
            Self::Leaf { aabb, .. } | Self::Internal { aabb, .. } => aabb,
        }
    }

    /// Closest hit no farther than `max_dist`, as `(distance, triangle)`.
    fn trace(
        &self,
        triangles: &[Triangle],
        origin: Vec3d,
        dir: Vec3d,
        inv_dir: Vec3d,
        max_dist: f64,
    ) -> Option<(f64, usize)> {
        let t_near = self.aabb().entry(origin, inv_dir)?;
        if t_near > max_dist {
            return None;
        }
        match self {
            Self::Leaf { triangle, .. } => triangles[*triangle]
                .intersect(origin, dir)
                .filter(|&t| t <= max_dist)
                .map(|t| (t, *triangle)),
            Self::Internal { left, right, .. } => {
                let hit_left = left.trace(triangles, origin, dir, inv_dir, max_dist);
                let bound = hit_left.map_or(max_dist, |(t, _)| t);
                let hit_right = right.trace(triangles, origin, dir, inv_dir, bound);
                match (hit_left, hit_right) {
                    (Some(l), Some(r)) => Some(if r.0 < l.0 { r } else { l }),
                    (Some(h), None) | (None, Some(h)) => Some(h),
                    (None, None) => None,
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Public mesh + builder
// ---------------------------------------------------------------------------

/// Triangle soup with a BVH, usable as a `RayOracle`.
#[derive(Debug)]
pub struct TriangleMesh {
    triangles: Vec<Triangle>,
    root: Option<BvhNode>,
}

impl TriangleMesh {
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    fn trace(&self, origin: Point3, direction: Point3, max_dist: f64) -> Option<RayHit> {
        let root = self.root.as_ref()?;
        let dir = direction.normalized()?;
        let o = Vec3d::from_point(origin);
        let d = Vec3d::from_point(dir);
        let d = {
            let len = d.dot(d).sqrt();
            Vec3d::new(d.x / len, d.y / len, d.z / len)
        };
        let inv = Vec3d::new(1.0 / d.x, 1.0 / d.y, 1.0 / d.z);
        let (t, idx) = root.trace(&self.triangles, o, d, inv, max_dist)?;
        let point = Point3::new(
            (o.x + d.x * t) as f32,
            (o.y + d.y * t) as f32,
            (o.z + d.z * t) as f32,
        );
        Some(RayHit {
            distance: t as f32,
            point,
            mesh_id: self.triangles[idx].mesh_id,
        })
    }
}

impl RayOracle for TriangleMesh {
    fn cast(&self, origin: Point3, direction: Point3) -> Option<RayHit> {
        self.trace(origin, direction, f64::INFINITY)
    }

    fn occluded(&self, origin: Point3, direction: Point3, max_distance: f32) -> bool {
        self.trace(origin, direction, max_distance as f64).is_some()
    }
}

/// Incrementally assembles a `TriangleMesh`.
#[derive(Clone, Debug, Default)]
pub struct MeshBuilder {
    triangles: Vec<Triangle>,
}

impl MeshBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn triangle(mut self, mesh_id: u32, a: Point3, b: Point3, c: Point3) -> Self {
        self.triangles.push(Triangle {
            v0: Vec3d::from_point(a),
            v1: Vec3d::from_point(b),
            v2: Vec3d::from_point(c),
            mesh_id,
        });
        self
    }

    /// Quad from four corners in winding order, split along `a`–`c`.
    pub fn quad(self, mesh_id: u32, a: Point3, b: Point3, c: Point3, d: Point3) -> Self {
        self.triangle(mesh_id, a, b, c).triangle(mesh_id, a, c, d)
    }

    /// Horizontal rectangle at height `z`.
    pub fn plane(self, mesh_id: u32, min: (f32, f32), max: (f32, f32), z: f32) -> Self {
        self.quad(
            mesh_id,
            Point3::new(min.0, min.1, z),
            Point3::new(max.0, min.1, z),
            Point3::new(max.0, max.1, z),
            Point3::new(min.0, max.1, z),
        )
    }

    /// Closed axis-aligned box.
    pub fn cuboid(self, mesh_id: u32, min: Point3, max: Point3) -> Self {
        let p = |x: f32, y: f32, z: f32| Point3::new(x, y, z);
        let (x0, y0, z0) = (min.x, min.y, min.z);
        let (x1, y1, z1) = (max.x, max.y, max.z);
        self.quad(mesh_id, p(x0, y0, z0), p(x1, y0, z0), p(x1, y1, z0), p(x0, y1, z0))
            .quad(mesh_id, p(x0, y0, z1), p(x1, y0, z1), p(x1, y1, z1), p(x0, y1, z1))
            .quad(mesh_id, p(x0, y0, z0), p(x1, y0, z0), p(x1, y0, z1), p(x0, y0, z1))
            .quad(mesh_id, p(x0, y1, z0), p(x1, y1, z0), p(x1, y1, z1), p(x0, y1, z1))
            .quad(mesh_id, p(x0, y0, z0), p(x0, y1, z0), p(x0, y1, z1), p(x0, y0, z1))
            .quad(mesh_id, p(x1, y0, z0), p(x1, y1, z0), p(x1, y1, z1), p(x1, y0, z1))
    }

    /// Regular grid of samples `heights[row][col]`, spaced `cell` apart and
    /// anchored at `origin` (x, y).
    pub fn height_field(
        mut self,
        mesh_id: u32,
        origin: (f32, f32),
        cell: f32,
        heights: &[Vec<f32>],
    ) -> Self {
        for row in 0..heights.len().saturating_sub(1) {
            let cols = heights[row].len().min(heights[row + 1].len());
            for col in 0..cols.saturating_sub(1) {
                let at = |r: usize, c: usize| {
                    Point3::new(
                        origin.0 + c as f32 * cell,
                        origin.1 + r as f32 * cell,
                        heights[r][c],
                    )
                };
                self = self.quad(
                    mesh_id,
                    at(row, col),
                    at(row, col + 1),
                    at(row + 1, col + 1),
                    at(row + 1, col),
                );
            }
        }
        self
    }

    pub fn build(self) -> TriangleMesh {
        let triangles = self.triangles;
        let mut indices: Vec<usize> = (0..triangles.len()).collect();
        let root = BvhNode::build(&triangles, &mut indices);
        TriangleMesh { triangles, root }
    }
}
