use crate::{Float, Point2f, Point3f, Ray, Vec3f};
use cgmath::{InnerSpace, Deg, Rad};

/// Pinhole camera looking from `eye` towards a target point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    eye: Point3f,
    forward: Vec3f,
    right: Vec3f,
    up: Vec3f,
    tan_half_fov: Float,
}

impl Camera {
    /// `fov` is the vertical field of view. The horizontal extent follows from the aspect
    /// ratio of the image being rendered.
    pub fn look_at(eye: Point3f, target: Point3f, up: Vec3f, fov: Deg<Float>) -> Self {
        let forward = (target - eye).normalize();
        let mut right = forward.cross(up);
        if right.magnitude2() == 0.0 {
            // up parallel to the view direction, pick any perpendicular
            right = crate::sampling::tangent_frame(forward).0;
        }
        let right = right.normalize();
        let up = right.cross(forward);
        let half: Rad<Float> = (fov / 2.0).into();

        Self { eye, forward, right, up, tan_half_fov: half.0.tan() }
    }

    pub fn eye(&self) -> Point3f {
        self.eye
    }

    pub fn forward(&self) -> Vec3f {
        self.forward
    }

    /// Ray through the continuous raster position `p_film`, where `(0, 0)` is the top left
    /// corner of the image and `(width, height)` the bottom right.
    pub fn generate_ray(&self, p_film: Point2f, width: u32, height: u32) -> Ray {
        let aspect = width as Float / height as Float;
        let sx = (2.0 * p_film.x / width as Float - 1.0) * aspect * self.tan_half_fov;
        let sy = (1.0 - 2.0 * p_film.y / height as Float) * self.tan_half_fov;
        let dir = (self.forward + self.right * sx + self.up * sy).normalize();
        Ray::new(self.eye, dir)
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::look_at(point3f!(0, 0, 0), point3f!(0, 0, -1), vec3f!(0, 1, 0), Deg(45.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_center_ray_is_forward() {
        let cam = Camera::look_at(point3f!(0, 1, 5), point3f!(0, 1, 0), vec3f!(0, 1, 0), Deg(60.0));
        let ray = cam.generate_ray(point2f!(50, 25), 100, 50);
        assert_abs_diff_eq!(ray.dir.z, -1.0, epsilon = 1e-6);
        assert_eq!(ray.origin, point3f!(0, 1, 5));
    }

    #[test]
    fn test_corners() {
        let cam = Camera::look_at(point3f!(0, 0, 0), point3f!(0, 0, -1), vec3f!(0, 1, 0), Deg(90.0));
        // top left of a square image with a 90 degree fov lies at (-1, 1, -1)
        let ray = cam.generate_ray(point2f!(0, 0), 10, 10);
        let expected = vec3f!(-1, 1, -1).normalize();
        assert_abs_diff_eq!(ray.dir.x, expected.x, epsilon = 1e-5);
        assert_abs_diff_eq!(ray.dir.y, expected.y, epsilon = 1e-5);
        assert_abs_diff_eq!(ray.dir.z, expected.z, epsilon = 1e-5);
    }
}
