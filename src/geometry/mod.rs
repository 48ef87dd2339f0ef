use crate::{Float, Point3f, Vec3f, INFINITY};
use cgmath::InnerSpace;

pub mod bounds;
pub mod transform;

pub use bounds::*;
pub use transform::*;

/// Distance a spawned ray origin is pushed off its surface along the geometric normal.
pub const RAY_EPSILON: Float = 1.0e-4;

#[derive(Clone, Copy, Debug)]
pub struct Ray {
    pub origin: Point3f,
    pub dir: Vec3f,
    pub t_max: Float,
}

impl Ray {
    pub fn new(origin: Point3f, dir: Vec3f) -> Self {
        Self { origin, dir, t_max: INFINITY }
    }

    pub fn at(&self, t: Float) -> Point3f {
        self.origin + (self.dir * t)
    }

    /// Component-wise reciprocal of the direction, used by the slab test.
    pub fn inv_dir(&self) -> Vec3f {
        vec3f!(1.0 / self.dir.x, 1.0 / self.dir.y, 1.0 / self.dir.z)
    }
}

/// Offset `p` along the geometric normal `n` towards the side `dir` leaves through, so the
/// spawned ray does not re-intersect the surface it starts on.
pub fn offset_ray_origin(p: Point3f, n: Vec3f, dir: Vec3f) -> Point3f {
    let scale = RAY_EPSILON * Float::max(1.0, p.x.abs().max(p.y.abs()).max(p.z.abs()));
    let offset = n * scale;
    if dir.dot(n) < 0.0 {
        p - offset
    } else {
        p + offset
    }
}
