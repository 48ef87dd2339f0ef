//! Stateless direction and point samplers. Every function here is a pure mapping from
//! uniform draws to a sample, so they can be called from any number of tracing tasks.

use crate::{Float, Point2f, Vec3f};
use crate::math::consts::{INV_PI, PI};
use cgmath::InnerSpace;

/// Orthonormal tangent and bitangent for a unit `normal`.
///
/// The helper axis crossed with the normal is world up when the normal has a significant
/// x component and world right otherwise, so the cross product never degenerates.
pub fn tangent_frame(normal: Vec3f) -> (Vec3f, Vec3f) {
    let helper = if normal.x.abs() > 0.1 {
        vec3f!(0, 1, 0)
    } else {
        vec3f!(1, 0, 0)
    };
    let tangent = helper.cross(normal).normalize();
    let bitangent = normal.cross(tangent);
    (tangent, bitangent)
}

/// Express a direction given in the `(tangent, bitangent, normal)` frame in world space.
#[inline]
pub fn from_local(normal: Vec3f, local: Vec3f) -> Vec3f {
    let (t, b) = tangent_frame(normal);
    t * local.x + b * local.y + normal * local.z
}

/// Cosine weighted direction in the hemisphere around `normal`. The density is
/// [`cos_weighted_hemisphere_pdf`].
pub fn cos_weighted_hemisphere_sample(normal: Vec3f, u: Point2f) -> Vec3f {
    let r = u.x.sqrt();
    let phi = 2.0 * PI * u.y;
    let z = Float::max(0.0, 1.0 - u.x).sqrt();
    let local = vec3f!(r * phi.cos(), r * phi.sin(), z);
    from_local(normal, local).normalize()
}

pub fn cos_weighted_hemisphere_pdf(cos_theta: Float) -> Float {
    Float::max(0.0, cos_theta) * INV_PI
}

/// Half vector distributed proportionally to `D(h) * cos(theta_h)` of the GGX distribution
/// with roughness `alpha`. Reflecting the view direction about it and converting the density
/// to the outgoing direction is left to the caller, see [`ggx_reflection_pdf`].
pub fn ggx_sample(normal: Vec3f, alpha: Float, u: Point2f) -> Vec3f {
    let alpha2 = alpha * alpha;
    let phi = 2.0 * PI * u.x;
    let cos_theta = Float::sqrt((1.0 - u.y) / (1.0 + (alpha2 - 1.0) * u.y));
    let sin_theta = Float::sqrt(Float::max(0.0, 1.0 - cos_theta * cos_theta));
    let local = vec3f!(sin_theta * phi.cos(), sin_theta * phi.sin(), cos_theta);
    from_local(normal, local).normalize()
}

/// GGX normal distribution function.
pub fn ggx_d(cos_theta_h: Float, alpha: Float) -> Float {
    if cos_theta_h <= 0.0 {
        return 0.0;
    }
    let alpha2 = alpha * alpha;
    let denom = sq!(cos_theta_h) * (alpha2 - 1.0) + 1.0;
    alpha2 / (PI * denom * denom)
}

/// Smith masking term for a single direction.
pub fn ggx_g1(cos_theta: Float, alpha: Float) -> Float {
    if cos_theta <= 0.0 {
        return 0.0;
    }
    let alpha2 = alpha * alpha;
    2.0 * cos_theta / (cos_theta + Float::sqrt(alpha2 + (1.0 - alpha2) * sq!(cos_theta)))
}

/// Density of the half vector returned by [`ggx_sample`], measured over half vectors.
pub fn ggx_pdf(cos_theta_h: Float, alpha: Float) -> Float {
    ggx_d(cos_theta_h, alpha) * Float::max(0.0, cos_theta_h)
}

/// Density of the reflected direction `wi = reflect(wo, h)`, including the Jacobian of
/// the reflection mapping.
pub fn ggx_reflection_pdf(normal: Vec3f, wo: Vec3f, h: Vec3f, alpha: Float) -> Float {
    let wo_dot_h = wo.dot(h).abs();
    if wo_dot_h == 0.0 {
        return 0.0;
    }
    ggx_pdf(normal.dot(h), alpha) / (4.0 * wo_dot_h)
}

/// Uniform barycentric coordinates `(b0, b1)` over a triangle.
pub fn uniform_sample_triangle(u: Point2f) -> (Float, Float) {
    let su0 = u.x.sqrt();
    (1.0 - su0, u.y * su0)
}
