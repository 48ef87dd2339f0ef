//! Chi-squared goodness of fit of the direction samplers against their own densities.

use cgmath::InnerSpace;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256Plus;

use pathtrace::math::consts::PI;
use pathtrace::sampling::{cos_weighted_hemisphere_sample, ggx_pdf, ggx_sample, uniform_sample_triangle};
use pathtrace::{point2f, vec3f, Float, Point2f, Vec3f};

const THETA_BINS: usize = 10;
const PHI_BINS: usize = 8;
const N: usize = 100_000;

/// Histogram over `(cos theta, phi)` around +z.
fn histogram(mut sample: impl FnMut(Point2f) -> Vec3f) -> Vec<f64> {
    let mut rng = Xoshiro256Plus::seed_from_u64(1234);
    let mut counts = vec![0.0; THETA_BINS * PHI_BINS];
    for _ in 0..N {
        let u = point2f!(rng.gen::<Float>(), rng.gen::<Float>());
        let w = sample(u);
        assert!((w.magnitude() - 1.0).abs() < 1e-4);
        let cos_theta = w.z.clamp(0.0, 1.0);
        let phi = w.y.atan2(w.x) + PI;
        let i = ((cos_theta * THETA_BINS as Float) as usize).min(THETA_BINS - 1);
        let j = ((phi / (2.0 * PI) * PHI_BINS as Float) as usize).min(PHI_BINS - 1);
        counts[i * PHI_BINS + j] += 1.0;
    }
    counts
}

/// Expected counts from a density over `cos theta` (per unit solid angle), integrated with
/// Simpson's rule over each bin.
fn expected(pdf: impl Fn(f64) -> f64) -> Vec<f64> {
    let steps = 64;
    let d_phi = 2.0 * std::f64::consts::PI / PHI_BINS as f64;
    let mut out = Vec::with_capacity(THETA_BINS * PHI_BINS);
    for i in 0..THETA_BINS {
        let (c0, c1) = (i as f64 / THETA_BINS as f64, (i + 1) as f64 / THETA_BINS as f64);
        let h = (c1 - c0) / steps as f64;
        let integral: f64 = (0..=steps)
            .map(|k| {
                let w = if k == 0 || k == steps { 1.0 } else if k % 2 == 1 { 4.0 } else { 2.0 };
                w * pdf(c0 + k as f64 * h)
            })
            .sum::<f64>() * h / 3.0;
        out.extend(std::iter::repeat(integral * d_phi * N as f64).take(PHI_BINS));
    }
    out
}

/// Pearson statistic, pooling bins with fewer than five expected samples. Returns the
/// statistic and the degrees of freedom.
fn chi_squared(observed: &[f64], expected: &[f64]) -> (f64, usize) {
    let (mut stat, mut dof) = (0.0, 0usize);
    let (mut pooled_obs, mut pooled_exp) = (0.0, 0.0);
    for (&o, &e) in observed.iter().zip(expected) {
        if e < 5.0 {
            pooled_obs += o;
            pooled_exp += e;
        } else {
            stat += (o - e) * (o - e) / e;
            dof += 1;
        }
    }
    if pooled_exp >= 5.0 {
        stat += (pooled_obs - pooled_exp) * (pooled_obs - pooled_exp) / pooled_exp;
        dof += 1;
    }
    (stat, dof.saturating_sub(1))
}

fn assert_fits(observed: &[f64], expected: &[f64]) {
    let total: f64 = expected.iter().sum();
    assert!((total - N as f64).abs() < 0.01 * N as f64, "density integrates to {}", total / N as f64);
    let (stat, dof) = chi_squared(observed, expected);
    // roughly five standard deviations above the mean of the chi-squared distribution
    let limit = dof as f64 + 5.0 * (2.0 * dof as f64).sqrt();
    assert!(stat < limit, "chi-squared {} exceeds {} with {} dof", stat, limit, dof);
}

#[test]
fn cosine_hemisphere_fits() {
    let n = vec3f!(0, 0, 1);
    let observed = histogram(|u| cos_weighted_hemisphere_sample(n, u));
    assert_fits(&observed, &expected(|c| c / std::f64::consts::PI));
}

#[test]
fn ggx_half_vectors_fit() {
    for alpha in [0.2, 0.5, 0.9] {
        let n = vec3f!(0, 0, 1);
        let observed = histogram(|u| ggx_sample(n, alpha, u));
        assert_fits(&observed, &expected(|c| ggx_pdf(c as Float, alpha) as f64));
    }
}

#[test]
fn triangle_samples_are_uniform() {
    // split the unit triangle into four congruent triangles by its edge midpoints
    let mut rng = Xoshiro256Plus::seed_from_u64(99);
    let mut counts = [0.0; 4];
    for _ in 0..N {
        let (b0, b1) = uniform_sample_triangle(point2f!(rng.gen::<Float>(), rng.gen::<Float>()));
        let b2 = 1.0 - b0 - b1;
        let cell = if b0 > 0.5 {
            0
        } else if b1 > 0.5 {
            1
        } else if b2 > 0.5 {
            2
        } else {
            3
        };
        counts[cell] += 1.0;
    }
    let expected = [N as f64 / 4.0; 4];
    let (stat, dof) = chi_squared(&counts, &expected);
    assert_eq!(dof, 3);
    assert!(stat < 30.0, "chi-squared {}", stat);
}
