//! Stochastic material evaluation.
//!
//! Blend nodes are resolved by walking the tree with a single uniform draw, remapped at each
//! node so it stays uniform for the next decision. Both blend functions pick a branch with
//! probability equal to that branch's weight, so the selected leaf can be evaluated on its
//! own and the result is an unbiased estimate of the blended material.

use bitflags::bitflags;
use cgmath::InnerSpace;

use crate::{faceforward, reflect, refract, Float, Point2f, Vec3f};
use crate::fresnel::fresnel_dielectric;
use crate::material::{BlendFunc, BrdfType, Material, MaterialLeaf};
use crate::math::consts::INV_PI;
use crate::sampling::{
    cos_weighted_hemisphere_pdf, cos_weighted_hemisphere_sample, ggx_d, ggx_g1, ggx_reflection_pdf, ggx_sample,
    tangent_frame,
};
use crate::spectrum::Spectrum;
use crate::texture::TextureStore;

/// IOR assumed by refractive leaves that don't specify one.
pub const DEFAULT_IOR: Float = 1.5;

/// Smallest GGX alpha, below which the distribution is numerically a mirror.
const MIN_ALPHA: Float = 1.0e-3;

const ONE_MINUS_EPSILON: Float = 1.0 - Float::EPSILON / 2.0;

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct SampleFlags: u8 {
        const REFLECTION = 1 << 0;
        const TRANSMISSION = 1 << 1;
        const DIFFUSE = 1 << 2;
        const GLOSSY = 1 << 3;
        /// Delta distribution. Next-event estimation is skipped for this bounce.
        const SPECULAR = 1 << 4;
    }
}

/// Everything the material evaluator needs to know about the shading point.
#[derive(Clone, Copy, Debug)]
pub struct ShadingContext {
    /// Interpolated shading normal, not flipped towards `wo`.
    pub n: Vec3f,
    pub uv: Point2f,
    /// Direction towards the viewer.
    pub wo: Vec3f,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LeafSelection {
    pub leaf: u32,
    /// Branch weight divided by branch probability along the chosen path.
    pub weight: Float,
    /// What is left of the selection draw, uniform in `[0, 1)`.
    pub u: Float,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Evaluation {
    /// BRDF times `|cos theta_i|`.
    pub contribution: Spectrum,
    pub pdf: Float,
}

impl Evaluation {
    pub fn zero() -> Self {
        Self { contribution: Spectrum::default(), pdf: 0.0 }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct BsdfSample {
    pub wi: Vec3f,
    /// `f * |cos theta_i| / pdf`, what the path throughput gets multiplied by.
    pub weight: Spectrum,
    /// Solid angle density of `wi`. Set to one for delta distributions.
    pub pdf: Float,
    pub flags: SampleFlags,
}

/// A leaf with its texture overrides applied at one shading point.
#[derive(Clone, Copy, Debug)]
pub struct ResolvedLeaf {
    pub brdf: BrdfType,
    pub kval: Spectrum,
    pub nval: Float,
    /// Shading normal after normal mapping.
    pub n: Vec3f,
}

impl ResolvedLeaf {
    pub fn is_emissive(&self) -> bool {
        self.brdf == BrdfType::Emissive
    }

    /// Whether the scattering distribution is a delta, making light sampling useless.
    pub fn is_delta(&self) -> bool {
        match self.brdf {
            BrdfType::Specular => self.nval <= 0.0,
            BrdfType::Refractive => true,
            _ => false,
        }
    }

    fn alpha(&self) -> Float {
        Float::max(MIN_ALPHA, self.nval * self.nval)
    }

    fn ior(&self) -> Float {
        if self.nval > 0.0 { self.nval } else { DEFAULT_IOR }
    }

    /// Radiance leaving an emissive leaf towards `wo`. Emitters are one-sided and fall off
    /// with the cosine to their normal.
    pub fn emitted(&self, wo: Vec3f) -> Spectrum {
        match self.brdf {
            BrdfType::Emissive => self.kval * Float::max(0.0, self.n.dot(wo)),
            _ => Spectrum::default(),
        }
    }

    pub fn evaluate(&self, wo: Vec3f, wi: Vec3f) -> Evaluation {
        if self.is_delta() {
            return Evaluation::zero();
        }
        let n = faceforward(self.n, wo);
        let cos_o = n.dot(wo);
        let cos_i = n.dot(wi);
        if cos_o <= 0.0 || cos_i <= 0.0 {
            return Evaluation::zero();
        }

        match self.brdf {
            BrdfType::Diffuse => Evaluation {
                contribution: self.kval * (INV_PI * cos_i),
                pdf: cos_weighted_hemisphere_pdf(cos_i),
            },
            BrdfType::Specular => {
                let alpha = self.alpha();
                let h = (wo + wi).normalize();
                let d = ggx_d(n.dot(h), alpha);
                let g = ggx_g1(cos_o, alpha) * ggx_g1(cos_i, alpha);
                Evaluation {
                    contribution: self.kval * (d * g / (4.0 * cos_o)),
                    pdf: ggx_reflection_pdf(n, wo, h, alpha),
                }
            }
            _ => Evaluation::zero(),
        }
    }

    /// Sample an incident direction. `None` when the leaf does not scatter towards `wo`
    /// or the sampled direction ended up below the surface.
    pub fn sample(&self, wo: Vec3f, u: Point2f) -> Option<BsdfSample> {
        match self.brdf {
            BrdfType::Diffuse => {
                let n = faceforward(self.n, wo);
                if n.dot(wo) <= 0.0 {
                    return None;
                }
                let wi = cos_weighted_hemisphere_sample(n, u);
                let pdf = cos_weighted_hemisphere_pdf(n.dot(wi));
                if pdf <= 0.0 {
                    return None;
                }
                Some(BsdfSample { wi, weight: self.kval, pdf, flags: SampleFlags::REFLECTION | SampleFlags::DIFFUSE })
            }
            BrdfType::Specular if self.is_delta() => {
                let n = faceforward(self.n, wo);
                let wi = reflect(wo, n);
                Some(BsdfSample { wi, weight: self.kval, pdf: 1.0, flags: SampleFlags::REFLECTION | SampleFlags::SPECULAR })
            }
            BrdfType::Specular => {
                let n = faceforward(self.n, wo);
                let alpha = self.alpha();
                let h = ggx_sample(n, alpha, u);
                let wi = reflect(wo, h);
                let eval = self.evaluate(wo, wi);
                if eval.pdf <= 0.0 || eval.contribution.is_black() {
                    return None;
                }
                Some(BsdfSample {
                    wi,
                    weight: eval.contribution / eval.pdf,
                    pdf: eval.pdf,
                    flags: SampleFlags::REFLECTION | SampleFlags::GLOSSY,
                })
            }
            BrdfType::Refractive => {
                let entering = self.n.dot(wo) > 0.0;
                let (n, eta) = if entering {
                    (self.n, 1.0 / self.ior())
                } else {
                    (-self.n, self.ior())
                };
                match refract(wo, n, eta) {
                    Some(wt) => Some(BsdfSample {
                        wi: wt.normalize(),
                        weight: self.kval,
                        pdf: 1.0,
                        flags: SampleFlags::TRANSMISSION | SampleFlags::SPECULAR,
                    }),
                    // total internal reflection
                    None => Some(BsdfSample {
                        wi: reflect(wo, n),
                        weight: self.kval,
                        pdf: 1.0,
                        flags: SampleFlags::REFLECTION | SampleFlags::SPECULAR,
                    }),
                }
            }
            BrdfType::Emissive => None,
        }
    }
}

/// Read-only view of the decoded material array plus the textures it refers to.
#[derive(Clone, Copy)]
pub struct MaterialTree<'a> {
    pub materials: &'a [Material],
    pub textures: &'a TextureStore,
}

impl<'a> MaterialTree<'a> {
    pub fn new(materials: &'a [Material], textures: &'a TextureStore) -> Self {
        Self { materials, textures }
    }

    fn scalar(&self, value: Float, tex: Option<u32>, ctx: &ShadingContext) -> Float {
        match tex {
            // scalar textures are read from the red channel
            Some(t) => self.textures.sample(t, ctx.uv)[0],
            None => value,
        }
    }

    /// Probability of descending into the left child of a blend node. It is also the weight
    /// of the left child in the blend.
    pub fn branch_probability(&self, func: BlendFunc, nval: Float, nval_tex: Option<u32>, ctx: &ShadingContext) -> Float {
        let nval = self.scalar(nval, nval_tex, ctx);
        let p = match func {
            BlendFunc::Mix => nval,
            BlendFunc::Fresnel => {
                let ior = if nval > 0.0 { nval } else { DEFAULT_IOR };
                fresnel_dielectric(ctx.n.dot(ctx.wo).abs(), 1.0, ior)
            }
        };
        if p.is_nan() { 0.0 } else { p.clamp(0.0, 1.0) }
    }

    /// Walk from `root` to a leaf using the single draw `u`.
    pub fn select_leaf(&self, root: u32, ctx: &ShadingContext, u: Float) -> LeafSelection {
        let mut node = root;
        let mut u = u.clamp(0.0, ONE_MINUS_EPSILON);
        loop {
            match self.materials[node as usize] {
                // branch weight and branch probability are equal for both blend functions,
                // so the accumulated ratio is always one
                Material::Leaf(_) => return LeafSelection { leaf: node, weight: 1.0, u },
                Material::Blend { func, nval, nval_tex, left, right } => {
                    let p = self.branch_probability(func, nval, nval_tex, ctx);
                    if u < p {
                        u = (u / p).min(ONE_MINUS_EPSILON);
                        node = left;
                    } else {
                        u = ((u - p) / (1.0 - p)).min(ONE_MINUS_EPSILON);
                        node = right;
                    }
                }
            }
        }
    }

    /// Apply the texture overrides of leaf `index` at the shading point.
    pub fn resolve_leaf(&self, index: u32, ctx: &ShadingContext) -> Option<ResolvedLeaf> {
        let leaf: MaterialLeaf = match self.materials.get(index as usize)? {
            Material::Leaf(leaf) => *leaf,
            Material::Blend { .. } => return None,
        };

        let kval = match leaf.kval_tex {
            Some(t) => self.textures.sample(t, ctx.uv),
            None => leaf.kval,
        };
        let nval = self.scalar(leaf.nval, leaf.nval_tex, ctx);
        let n = match leaf.normal_tex {
            Some(t) => self.perturb_normal(t, ctx),
            None => ctx.n,
        };

        Some(ResolvedLeaf { brdf: leaf.brdf, kval, nval, n })
    }

    fn perturb_normal(&self, tex: u32, ctx: &ShadingContext) -> Vec3f {
        let c = self.textures.sample(tex, ctx.uv);
        let (t, b) = tangent_frame(ctx.n);
        let local = vec3f!(2.0 * c[0] - 1.0, 2.0 * c[1] - 1.0, 2.0 * c[2] - 1.0);
        let n = t * local.x + b * local.y + ctx.n * local.z;
        let len = n.magnitude();
        if len > 0.0 && len.is_finite() { n / len } else { ctx.n }
    }

    /// Stochastic evaluation: pick one leaf with `u` and evaluate it alone.
    pub fn evaluate(&self, root: u32, ctx: &ShadingContext, wi: Vec3f, u: Float) -> Evaluation {
        let sel = self.select_leaf(root, ctx, u);
        match self.resolve_leaf(sel.leaf, ctx) {
            Some(leaf) => {
                let e = leaf.evaluate(ctx.wo, wi);
                Evaluation { contribution: e.contribution * sel.weight, pdf: e.pdf }
            }
            None => Evaluation::zero(),
        }
    }

    /// Deterministic evaluation: the weighted sum over both branches of every blend node.
    /// This is the expected value of [`MaterialTree::evaluate`] over `u`.
    pub fn evaluate_expected(&self, root: u32, ctx: &ShadingContext, wi: Vec3f) -> Evaluation {
        match self.materials[root as usize] {
            Material::Leaf(_) => match self.resolve_leaf(root, ctx) {
                Some(leaf) => leaf.evaluate(ctx.wo, wi),
                None => Evaluation::zero(),
            },
            Material::Blend { func, nval, nval_tex, left, right } => {
                let p = self.branch_probability(func, nval, nval_tex, ctx);
                let l = self.evaluate_expected(left, ctx, wi);
                let r = self.evaluate_expected(right, ctx, wi);
                Evaluation {
                    contribution: Spectrum::lerp(p, r.contribution, l.contribution),
                    pdf: crate::lerp(p, r.pdf, l.pdf),
                }
            }
        }
    }

    /// Pick a leaf with `u_select` and sample a direction from it with `u_dir`.
    pub fn sample(&self, root: u32, ctx: &ShadingContext, u_select: Float, u_dir: Point2f) -> Option<BsdfSample> {
        let sel = self.select_leaf(root, ctx, u_select);
        let leaf = self.resolve_leaf(sel.leaf, ctx)?;
        let mut s = leaf.sample(ctx.wo, u_dir)?;
        s.weight *= sel.weight;
        Some(s)
    }
}
