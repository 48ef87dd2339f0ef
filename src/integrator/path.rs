use cgmath::InnerSpace;

use crate::Float;
use crate::material::{ResolvedLeaf, SampleFlags, ShadingContext};
use crate::sampler::Sampler;
use crate::sampling::uniform_sample_triangle;
use crate::scene::{Scene, SurfaceInteraction};
use crate::spectrum::Spectrum;
use crate::Ray;

/// Fraction of the light distance a shadow ray stops short of, so it can't hit the light.
const SHADOW_EPSILON: Float = 1.0e-3;

/// Unidirectional path tracer with next-event estimation towards emissive triangles.
pub struct PathIntegrator {
    pub max_depth: u32,
    pub rr_threshold: Float,
    pub rr_min_bounces: u32,
}

impl PathIntegrator {
    pub fn new(max_depth: u32, rr_threshold: Float, rr_min_bounces: u32) -> Self {
        PathIntegrator { max_depth, rr_threshold, rr_min_bounces }
    }

    /// Radiance arriving at the origin of `ray` from its direction.
    pub fn incident_radiance(&self, ray: Ray, scene: &Scene, sampler: &mut dyn Sampler) -> Spectrum {
        let materials = scene.materials();
        let mut path_radiance = Spectrum::default();
        let mut throughput = Spectrum::uniform(1.0);
        let mut bounces = 0;
        let mut ray = ray;

        // was the last outgoing direction sampled from a delta distribution?
        let mut specular_bounce = false;

        loop {
            let hit = match scene.intersect(&ray) {
                Some(hit) => hit,
                None => {
                    path_radiance += throughput * scene.background();
                    break;
                }
            };

            let si = scene.interaction(&ray, &hit);
            let ctx = si.shading_context();
            let selection = materials.select_leaf(si.material, &ctx, sampler.get_1d());
            let leaf = match materials.resolve_leaf(selection.leaf, &ctx) {
                Some(leaf) => leaf,
                None => break,
            };

            if leaf.is_emissive() {
                // emitters in the light table were already accounted for by light sampling
                // at the previous vertex, unless that vertex could not sample lights
                if bounces == 0 || specular_bounce || !scene.is_light_material(si.material) {
                    path_radiance += throughput * leaf.emitted(si.wo) * selection.weight;
                }
                break;
            }

            if bounces >= self.max_depth {
                break;
            }

            if !leaf.is_delta() {
                path_radiance += throughput * selection.weight * sample_one_light(scene, &si, &leaf, sampler);
            }

            let bsdf_sample = match leaf.sample(si.wo, sampler.get_2d()) {
                Some(s) if !s.weight.is_black() => s,
                _ => break,
            };
            throughput *= bsdf_sample.weight * selection.weight;
            specular_bounce = bsdf_sample.flags.contains(SampleFlags::SPECULAR);
            ray = si.spawn_ray(bsdf_sample.wi);

            // Possibly terminate the path with Russian roulette
            if bounces >= self.rr_min_bounces && throughput.max_component_value() < self.rr_threshold {
                let q = Float::max(0.05, 1.0 - throughput.max_component_value());
                if sampler.get_1d() < q {
                    break;
                }
                throughput /= 1.0 - q;
            }
            bounces += 1;
        }
        path_radiance
    }
}

/// Direct lighting at `si` from one emissive triangle chosen uniformly, sampled uniformly
/// by area.
pub fn sample_one_light(scene: &Scene, si: &SurfaceInteraction, leaf: &ResolvedLeaf, sampler: &mut dyn Sampler) -> Spectrum {
    let emitters = scene.emitters();
    if emitters.is_empty() {
        return Spectrum::default();
    }
    let n_emitters = emitters.len();
    let pick = ((sampler.get_1d() * n_emitters as Float) as usize).min(n_emitters - 1);
    let emitter = emitters[pick];

    let (b0, b1) = uniform_sample_triangle(sampler.get_2d());
    let light = scene.surface_at(emitter.instance, emitter.primitive, b1, 1.0 - b0 - b1);
    let area = scene.triangle_area(emitter.instance, emitter.primitive);
    if area <= 0.0 {
        return Spectrum::default();
    }

    let (shadow_ray, dist) = si.spawn_ray_to(light.p);
    if !(dist > 0.0) {
        return Spectrum::default();
    }
    let wi = shadow_ray.dir;

    let f = leaf.evaluate(si.wo, wi).contribution;
    if f.is_black() {
        return Spectrum::default();
    }

    let light_ctx = ShadingContext { n: light.n_shading, uv: light.uv, wo: -wi };
    let emitted = match scene.materials().resolve_leaf(light.material, &light_ctx) {
        Some(light_leaf) => light_leaf.emitted(-wi),
        None => return Spectrum::default(),
    };
    if emitted.is_black() {
        return Spectrum::default();
    }

    if scene.occluded(&shadow_ray, dist * (1.0 - SHADOW_EPSILON)) {
        return Spectrum::default();
    }

    // convert the area density 1 / (n * area) to solid angle
    let cos_light = light.n_geom.dot(wi).abs();
    f * emitted * (cos_light * area * n_emitters as Float / (dist * dist))
}
