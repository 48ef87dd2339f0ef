use crate::{Float, Point3f, Vec3f, gamma};
use crate::geometry::Transform;

/// Axis-aligned bounding box
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Bounds3f {
    pub min: Point3f,
    pub max: Point3f,
}

impl Bounds3f {
    pub fn with_bounds(min: Point3f, max: Point3f) -> Self {
        Self { min, max }
    }

    pub fn empty() -> Self {
        Self::with_bounds(
            Point3f::new(Float::INFINITY, Float::INFINITY, Float::INFINITY),
            Point3f::new(Float::NEG_INFINITY, Float::NEG_INFINITY, Float::NEG_INFINITY),
        )
    }

    pub fn from_point(p: Point3f) -> Self {
        Self::with_bounds(p, p)
    }

    pub fn from_arrays(min: [Float; 3], max: [Float; 3]) -> Self {
        Self::with_bounds(min.into(), max.into())
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    pub fn join(&self, other: &Bounds3f) -> Self {
        Self::with_bounds(
            Point3f::new(
                self.min.x.min(other.min.x),
                self.min.y.min(other.min.y),
                self.min.z.min(other.min.z),
            ),
            Point3f::new(
                self.max.x.max(other.max.x),
                self.max.y.max(other.max.y),
                self.max.z.max(other.max.z),
            ),
        )
    }

    pub fn join_point(&self, p: &Point3f) -> Self {
        self.join(&Self::from_point(*p))
    }

    pub fn diagonal(&self) -> Vec3f {
        self.max - self.min
    }

    pub fn centroid(&self) -> Point3f {
        self.min + (self.diagonal() / 2.0)
    }

    /// Index of the axis along which the box is widest.
    pub fn maximum_extent(&self) -> usize {
        let d = self.diagonal();
        if d.x > d.y && d.x > d.z {
            0
        } else if d.y > d.z {
            1
        } else {
            2
        }
    }

    pub fn contains(&self, other: &Bounds3f) -> bool {
        (0..3).all(|i| self.min[i] <= other.min[i] && other.max[i] <= self.max[i])
    }

    /// Slab test. Returns the parametric distance at which the ray enters the box, clamped
    /// to zero when the origin is inside, or `None` if the box is missed within `[0, t_max]`.
    #[inline]
    pub fn intersect_p(&self, origin: Point3f, inv_dir: Vec3f, t_max: Float) -> Option<Float> {
        let mut t0 = 0.0;
        let mut t1 = t_max;
        for i in 0..3 {
            let mut t_near = (self.min[i] - origin[i]) * inv_dir[i];
            let mut t_far = (self.max[i] - origin[i]) * inv_dir[i];
            if t_near > t_far {
                std::mem::swap(&mut t_near, &mut t_far);
            }
            t_far *= 1.0 + 2.0 * gamma(3);

            t0 = if t_near > t0 { t_near } else { t0 };
            t1 = if t_far < t1 { t_far } else { t1 };
            if t0 > t1 {
                return None;
            }
        }
        Some(t0)
    }

    /// Bounds of this box after transformation, computed from its eight corners.
    pub fn transform(&self, tf: &Transform) -> Self {
        let mut out = Self::empty();
        for corner in 0..8 {
            let p = Point3f::new(
                if corner & 1 == 0 { self.min.x } else { self.max.x },
                if corner & 2 == 0 { self.min.y } else { self.max.y },
                if corner & 4 == 0 { self.min.z } else { self.max.z },
            );
            out = out.join_point(&tf.transform_point(p));
        }
        out
    }

    pub fn to_arrays(&self) -> ([Float; 3], [Float; 3]) {
        (self.min.into(), self.max.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_intersect_p() {
        let b = Bounds3f::with_bounds(point3f!(-1, -1, -1), point3f!(1, 1, 1));
        let origin = point3f!(0, 0, -5);
        let inv_dir = vec3f!(Float::INFINITY, Float::INFINITY, 1.0);
        let t = b.intersect_p(origin, inv_dir, Float::INFINITY).unwrap();
        assert_abs_diff_eq!(t, 4.0, epsilon = 1e-5);

        // box lies behind t_max
        assert!(b.intersect_p(origin, inv_dir, 3.0).is_none());

        // pointing away
        let away = vec3f!(Float::INFINITY, Float::INFINITY, -1.0);
        assert!(b.intersect_p(origin, away, Float::INFINITY).is_none());

        // origin inside
        assert_eq!(b.intersect_p(point3f!(0, 0, 0), inv_dir, Float::INFINITY), Some(0.0));
    }

    #[test]
    fn test_join_and_extent() {
        let b = Bounds3f::from_point(point3f!(0, 0, 0))
            .join_point(&point3f!(1, 5, 2));
        assert_eq!(b.maximum_extent(), 1);
        assert_eq!(b.centroid(), point3f!(0.5, 2.5, 1.0));
        assert!(Bounds3f::empty().is_empty());
    }
}
