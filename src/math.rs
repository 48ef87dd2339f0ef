use crate::{Float, Vec3f};
use cgmath::InnerSpace;

pub mod consts {
    use crate::Float;

    pub const PI: Float = std::f32::consts::PI;
    pub const INV_PI: Float = std::f32::consts::FRAC_1_PI;
}

pub const INFINITY: Float = std::f32::INFINITY;

pub const MACHINE_EPSILON: Float = std::f32::EPSILON * 0.5;

/// Conservative bound on the relative rounding error of `n` chained float operations.
#[inline]
pub fn gamma(n: i32) -> Float {
    let n = n as Float;
    (n * MACHINE_EPSILON) / (1.0 - n * MACHINE_EPSILON)
}

pub fn lerp(t: Float, v1: Float, v2: Float) -> Float {
    (1.0 - t) * v1 + t * v2
}

/// Flip `n` so it lies in the same hemisphere as `v`.
pub fn faceforward(n: Vec3f, v: Vec3f) -> Vec3f {
    if n.dot(v) < 0.0 { -n } else { n }
}

/// Mirror `wo` (pointing away from the surface) about `n`.
pub fn reflect(wo: Vec3f, n: Vec3f) -> Vec3f {
    -wo + 2.0 * wo.dot(n) * n
}

/// Refract `wi` (pointing away from the surface, on the same side as `n`) through the
/// interface with relative index `eta = eta_i / eta_t`. Returns `None` on total internal
/// reflection.
pub fn refract(wi: Vec3f, n: Vec3f, eta: Float) -> Option<Vec3f> {
    let cos_theta_i = n.dot(wi);
    let sin2_theta_i = Float::max(0.0, 1.0 - cos_theta_i * cos_theta_i);
    let sin2_theta_t = eta * eta * sin2_theta_i;
    if sin2_theta_t >= 1.0 { return None }
    let cos_theta_t = Float::sqrt(1.0 - sin2_theta_t);
    let wt = eta * -wi + (eta * cos_theta_i - cos_theta_t) * n;
    Some(wt)
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_reflect() {
        let n = vec3f!(0, 0, 1);
        let wo = vec3f!(1, 0, 1).normalize();
        let r = reflect(wo, n);
        assert_abs_diff_eq!(r.x, -wo.x, epsilon = 1e-6);
        assert_abs_diff_eq!(r.z, wo.z, epsilon = 1e-6);
    }

    #[test]
    fn test_refract_total_internal_reflection() {
        let n = vec3f!(0, 0, 1);
        let grazing = vec3f!(1, 0, 0.1).normalize();
        // leaving glass into air at a grazing angle
        assert!(refract(grazing, n, 1.5).is_none());

        let straight = refract(n, n, 1.0 / 1.5).unwrap();
        assert_abs_diff_eq!(straight.z, -1.0, epsilon = 1e-6);
    }
}
