use crate::{Float, Point3f, Vec3f, Ray};
use cgmath::{Matrix4, SquareMatrix, Transform as cgTransform, Rad};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub t: Matrix4<Float>,
    pub invt: Matrix4<Float>,
}

const IDENTITY_MAT4: Matrix4<Float> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 1.0, 0.0,
    0.0, 0.0, 0.0, 1.0
);

impl Transform {

    pub const IDENTITY: Self = Transform::new(IDENTITY_MAT4, IDENTITY_MAT4);

    /// Build a transform from a matrix, or `None` if the matrix is singular.
    pub fn from_mat(mat: Matrix4<Float>) -> Option<Self> {
        let m_inv = mat.invert()?;
        Some(Self::new(mat, m_inv))
    }

    pub const fn new(mat: Matrix4<Float>, mat_inv: Matrix4<Float>) -> Self {
        Self { t: mat, invt: mat_inv }
    }

    /// Column-major matrix as stored in the packed instance table.
    pub fn from_cols_array(cols: [[Float; 4]; 4]) -> Option<Self> {
        Self::from_mat(Matrix4::from(cols))
    }

    pub fn to_cols_array(&self) -> [[Float; 4]; 4] {
        self.t.into()
    }

    pub fn translate(delta: Vec3f) -> Self {
        let m = Matrix4::from_translation(delta);
        let m_inv = Matrix4::from_translation(-delta);
        Self::new(m, m_inv)
    }

    pub fn scale(sx: Float, sy: Float, sz: Float) -> Self {
        let m = Matrix4::from_nonuniform_scale(sx, sy, sz);
        let m_inv = Matrix4::from_nonuniform_scale(1.0 / sx, 1.0 / sy, 1.0 / sz);
        Self::new(m, m_inv)
    }

    pub fn rotate_y(theta: impl Into<Rad<Float>>) -> Self {
        let m = Matrix4::from_angle_y(theta);
        // rotations are orthonormal
        Self::new(m, cgmath::Matrix::transpose(&m))
    }

    pub fn rotate_z(theta: impl Into<Rad<Float>>) -> Self {
        let m = Matrix4::from_angle_z(theta);
        Self::new(m, cgmath::Matrix::transpose(&m))
    }

    pub fn inverse(&self) -> Self {
        Self::new(self.invt, self.t)
    }

    /// Apply `self` first, then `next`.
    pub fn then(self, next: Self) -> Self {
        next * self
    }

    pub fn transform_point(&self, p: Point3f) -> Point3f {
        self.t.transform_point(p)
    }

    pub fn transform_vector(&self, v: Vec3f) -> Vec3f {
        self.t.transform_vector(v)
    }

    pub fn transform_normal(&self, n: Vec3f) -> Vec3f {
        // transform by the transpose of the inverse
        let x = self.invt[0][0]*n.x + self.invt[0][1]*n.y + self.invt[0][2]*n.z;
        let y = self.invt[1][0]*n.x + self.invt[1][1]*n.y + self.invt[1][2]*n.z;
        let z = self.invt[2][0]*n.x + self.invt[2][1]*n.y + self.invt[2][2]*n.z;
        vec3f!(x, y, z)
    }

    /// Transform a ray without renormalizing its direction, so parametric distances along
    /// the transformed ray match the original.
    pub fn transform_ray(&self, ray: &Ray) -> Ray {
        Ray {
            origin: self.transform_point(ray.origin),
            dir: self.transform_vector(ray.dir),
            t_max: ray.t_max,
        }
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl std::ops::Mul for Transform {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        Self::new(self.t * rhs.t, rhs.invt * self.invt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use cgmath::{Deg, InnerSpace};

    #[test]
    fn test_normal_transform_stays_perpendicular() {
        let tf = Transform::scale(1.0, 4.0, 1.0).then(Transform::rotate_z(Deg(30.0)));
        let tangent = vec3f!(1, 1, 0);
        let normal = vec3f!(1, -1, 0);
        let t = tf.transform_vector(tangent);
        let n = tf.transform_normal(normal);
        assert_abs_diff_eq!(t.dot(n), 0.0, epsilon = 1e-5);
    }

    #[test]
    fn test_ray_distance_preserved() {
        let tf = Transform::translate(vec3f!(0, 0, -3)).then(Transform::scale(2.0, 2.0, 2.0));
        let ray = Ray::new(point3f!(1, 2, 3), vec3f!(0, 0, 1));
        let local = tf.inverse().transform_ray(&ray);
        let p_world = ray.at(2.5);
        let p_back = tf.transform_point(local.at(2.5));
        assert_abs_diff_eq!(p_world.z, p_back.z, epsilon = 1e-5);
        assert_abs_diff_eq!(p_world.y, p_back.y, epsilon = 1e-5);
    }

    #[test]
    fn test_cols_array_round_trip() {
        let tf = Transform::translate(vec3f!(1, 2, 3));
        let cols = tf.to_cols_array();
        assert_eq!(cols[3], [1.0, 2.0, 3.0, 1.0]);
        assert!(Transform::from_cols_array([[0.0; 4]; 4]).is_none());
    }
}
