//! Material trees.
//!
//! A material is a binary tree stored in one flat array. Interior nodes blend two subtrees,
//! leaves carry a single BRDF. The packed [`MaterialNode`] record is what gets uploaded;
//! [`Material`] is its decoded form, which the evaluator in [`eval`] works on.

use bytemuck::{Pod, Zeroable};

use crate::{Float, SceneError};
use crate::spectrum::Spectrum;

pub mod eval;

pub use eval::*;

/// Texture override value meaning "use the scalar field".
pub const NO_TEXTURE: i32 = -1;

/// Deepest material tree accepted when a scene is built. Also catches cycles.
pub const MAX_MATERIAL_DEPTH: usize = 16;

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct MaterialNode {
    pub kval: [f32; 4],
    pub nval: f32,
    pub reserved: [f32; 2],
    pub is_node: u32,
    /// Interior: `[left, right, nval_tex, blend_func]`.
    /// Leaf: `[kval_tex, normal_tex, nval_tex, brdf_type]`.
    pub union_data: [i32; 4],
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlendFunc {
    Mix = 0,
    Fresnel = 1,
}

impl TryFrom<i32> for BlendFunc {
    type Error = SceneError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(BlendFunc::Mix),
            1 => Ok(BlendFunc::Fresnel),
            _ => Err(SceneError::UnknownBlendFunc(value)),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BrdfType {
    Diffuse = 0,
    Specular = 1,
    Refractive = 2,
    Emissive = 3,
}

impl TryFrom<i32> for BrdfType {
    type Error = SceneError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(BrdfType::Diffuse),
            1 => Ok(BrdfType::Specular),
            2 => Ok(BrdfType::Refractive),
            3 => Ok(BrdfType::Emissive),
            _ => Err(SceneError::UnknownBrdfType(value)),
        }
    }
}

/// A single BRDF with its parameters. Texture overrides take precedence over the scalar
/// fields when present.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MaterialLeaf {
    pub brdf: BrdfType,
    /// Base colour, or emitted radiance for emissive leaves.
    pub kval: Spectrum,
    /// Roughness for specular leaves, index of refraction for refractive ones.
    pub nval: Float,
    pub kval_tex: Option<u32>,
    pub normal_tex: Option<u32>,
    pub nval_tex: Option<u32>,
}

impl MaterialLeaf {
    pub fn new(brdf: BrdfType, kval: Spectrum, nval: Float) -> Self {
        Self { brdf, kval, nval, kval_tex: None, normal_tex: None, nval_tex: None }
    }
}

/// Decoded [`MaterialNode`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Material {
    Blend {
        func: BlendFunc,
        /// Mix probability of the left branch, or the IOR used for the Fresnel weight.
        nval: Float,
        nval_tex: Option<u32>,
        left: u32,
        right: u32,
    },
    Leaf(MaterialLeaf),
}

fn decode_texture(v: i32) -> Option<u32> {
    if v < 0 { None } else { Some(v as u32) }
}

fn encode_texture(tex: Option<u32>) -> Result<i32, SceneError> {
    match tex {
        None => Ok(NO_TEXTURE),
        Some(t) => i32::try_from(t).map_err(|_| SceneError::UnrepresentableIndex(t as u64)),
    }
}

fn encode_index(i: u32) -> Result<i32, SceneError> {
    i32::try_from(i).map_err(|_| SceneError::UnrepresentableIndex(i as u64))
}

impl MaterialNode {
    pub fn decode(&self) -> Result<Material, SceneError> {
        let [a, b, c, d] = self.union_data;
        if self.is_node != 0 {
            let left = u32::try_from(a).map_err(|_| SceneError::IndexOutOfRange { what: "material child", index: a as u64, len: 0 })?;
            let right = u32::try_from(b).map_err(|_| SceneError::IndexOutOfRange { what: "material child", index: b as u64, len: 0 })?;
            Ok(Material::Blend {
                func: BlendFunc::try_from(d)?,
                nval: self.nval,
                nval_tex: decode_texture(c),
                left,
                right,
            })
        } else {
            Ok(Material::Leaf(MaterialLeaf {
                brdf: BrdfType::try_from(d)?,
                kval: Spectrum::from_rgba(self.kval),
                nval: self.nval,
                kval_tex: decode_texture(a),
                normal_tex: decode_texture(b),
                nval_tex: decode_texture(c),
            }))
        }
    }

    pub fn encode(material: &Material) -> Result<Self, SceneError> {
        let mut node = Self::zeroed();
        match *material {
            Material::Blend { func, nval, nval_tex, left, right } => {
                node.is_node = 1;
                node.nval = nval;
                node.union_data = [encode_index(left)?, encode_index(right)?, encode_texture(nval_tex)?, func as i32];
            }
            Material::Leaf(leaf) => {
                let [r, g, b] = leaf.kval.to_rgb();
                node.kval = [r, g, b, 1.0];
                node.nval = leaf.nval;
                node.union_data = [
                    encode_texture(leaf.kval_tex)?,
                    encode_texture(leaf.normal_tex)?,
                    encode_texture(leaf.nval_tex)?,
                    leaf.brdf as i32,
                ];
            }
        }
        Ok(node)
    }
}

/// Check that the tree under `root` stays inside `materials`, references existing
/// textures, and is no deeper than [`MAX_MATERIAL_DEPTH`].
pub fn validate_tree(materials: &[Material], root: u32, n_textures: usize) -> Result<(), SceneError> {
    let check_tex = |tex: Option<u32>| match tex {
        Some(t) => crate::error::check_index("texture", t as u64, n_textures),
        None => Ok(()),
    };

    let mut stack = vec![(root, 1usize)];
    while let Some((idx, depth)) = stack.pop() {
        if depth > MAX_MATERIAL_DEPTH {
            return Err(SceneError::MaterialTreeTooDeep { root, max: MAX_MATERIAL_DEPTH });
        }
        crate::error::check_index("material node", idx as u64, materials.len())?;
        match materials[idx as usize] {
            Material::Blend { nval_tex, left, right, .. } => {
                check_tex(nval_tex)?;
                stack.push((left, depth + 1));
                stack.push((right, depth + 1));
            }
            Material::Leaf(leaf) => {
                check_tex(leaf.kval_tex)?;
                check_tex(leaf.normal_tex)?;
                check_tex(leaf.nval_tex)?;
            }
        }
    }
    Ok(())
}

/// Builder-side description of a material tree.
#[derive(Clone, Debug, PartialEq)]
pub enum MaterialDesc {
    Leaf(MaterialLeaf),
    Blend {
        func: BlendFunc,
        nval: Float,
        nval_tex: Option<u32>,
        left: Box<MaterialDesc>,
        right: Box<MaterialDesc>,
    },
}

impl MaterialDesc {
    pub fn diffuse(color: Spectrum) -> Self {
        Self::Leaf(MaterialLeaf::new(BrdfType::Diffuse, color, 0.0))
    }

    pub fn emissive(radiance: Spectrum) -> Self {
        Self::Leaf(MaterialLeaf::new(BrdfType::Emissive, radiance, 0.0))
    }

    pub fn mirror(color: Spectrum) -> Self {
        Self::Leaf(MaterialLeaf::new(BrdfType::Specular, color, 0.0))
    }

    /// GGX reflection. `roughness` is squared to get the distribution's alpha.
    pub fn glossy(color: Spectrum, roughness: Float) -> Self {
        Self::Leaf(MaterialLeaf::new(BrdfType::Specular, color, roughness))
    }

    pub fn glass(color: Spectrum, ior: Float) -> Self {
        Self::Leaf(MaterialLeaf::new(BrdfType::Refractive, color, ior))
    }

    /// Pick `a` with probability `p`, `b` otherwise.
    pub fn mix(p: Float, a: MaterialDesc, b: MaterialDesc) -> Self {
        Self::Blend { func: BlendFunc::Mix, nval: p, nval_tex: None, left: Box::new(a), right: Box::new(b) }
    }

    /// Pick `reflect` with the Fresnel reflectance of a dielectric of the given IOR,
    /// `base` otherwise.
    pub fn fresnel(ior: Float, reflect: MaterialDesc, base: MaterialDesc) -> Self {
        Self::Blend { func: BlendFunc::Fresnel, nval: ior, nval_tex: None, left: Box::new(reflect), right: Box::new(base) }
    }

    pub fn with_kval_texture(self, tex: u32) -> Self {
        self.map_leaf(|leaf| leaf.kval_tex = Some(tex))
    }

    pub fn with_normal_map(self, tex: u32) -> Self {
        self.map_leaf(|leaf| leaf.normal_tex = Some(tex))
    }

    pub fn with_nval_texture(self, tex: u32) -> Self {
        match self {
            Self::Blend { func, nval, left, right, .. } => Self::Blend { func, nval, nval_tex: Some(tex), left, right },
            leaf => leaf.map_leaf(|leaf| leaf.nval_tex = Some(tex)),
        }
    }

    fn map_leaf(self, f: impl FnOnce(&mut MaterialLeaf)) -> Self {
        match self {
            Self::Leaf(mut leaf) => {
                f(&mut leaf);
                Self::Leaf(leaf)
            }
            blend => blend,
        }
    }

    /// Append this tree to `out` in decoded form and return the index of its root. The
    /// root is pushed before its children.
    pub fn encode_into(&self, out: &mut Vec<Material>) -> Result<u32, SceneError> {
        let idx = u32::try_from(out.len()).map_err(|_| SceneError::UnrepresentableIndex(out.len() as u64))?;
        match self {
            MaterialDesc::Leaf(leaf) => out.push(Material::Leaf(*leaf)),
            MaterialDesc::Blend { func, nval, nval_tex, left, right } => {
                // placeholder children, patched once both subtrees are placed
                out.push(Material::Blend { func: *func, nval: *nval, nval_tex: *nval_tex, left: 0, right: 0 });
                let l = left.encode_into(out)?;
                let r = right.encode_into(out)?;
                if let Material::Blend { left, right, .. } = &mut out[idx as usize] {
                    *left = l;
                    *right = r;
                }
            }
        }
        Ok(idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_layout() {
        assert_eq!(std::mem::size_of::<MaterialNode>(), 48);
        assert_eq!(std::mem::align_of::<MaterialNode>(), 4);
    }

    #[test]
    fn test_leaf_round_trip() {
        let mut leaf = MaterialLeaf::new(BrdfType::Specular, Spectrum::rgb(0.1, 0.2, 0.3), 0.4);
        leaf.normal_tex = Some(2);
        let node = MaterialNode::encode(&Material::Leaf(leaf)).unwrap();
        assert_eq!(node.is_node, 0);
        assert_eq!(node.union_data, [-1, 2, -1, 1]);
        assert_eq!(node.decode(), Ok(Material::Leaf(leaf)));
    }

    #[test]
    fn test_unknown_tags() {
        let mut node = MaterialNode::zeroed();
        node.union_data[3] = 7;
        assert_eq!(node.decode(), Err(SceneError::UnknownBrdfType(7)));
        node.is_node = 1;
        node.union_data = [1, 2, -1, 4];
        assert_eq!(node.decode(), Err(SceneError::UnknownBlendFunc(4)));
    }

    #[test]
    fn test_encode_tree_preorder() {
        let desc = MaterialDesc::mix(
            0.25,
            MaterialDesc::diffuse(Spectrum::uniform(0.5)),
            MaterialDesc::fresnel(1.5, MaterialDesc::mirror(Spectrum::uniform(1.0)), MaterialDesc::diffuse(Spectrum::uniform(0.2))),
        );
        let mut out = vec![Material::Leaf(MaterialLeaf::new(BrdfType::Diffuse, Spectrum::uniform(1.0), 0.0))];
        let root = desc.encode_into(&mut out).unwrap();
        assert_eq!(root, 1);
        assert_eq!(out.len(), 6);
        match out[1] {
            Material::Blend { func, left, right, .. } => {
                assert_eq!(func, BlendFunc::Mix);
                assert_eq!((left, right), (2, 3));
            }
            _ => panic!("root should be a blend node"),
        }
        assert!(matches!(out[3], Material::Blend { func: BlendFunc::Fresnel, left: 4, right: 5, .. }));
        validate_tree(&out, root, 0).unwrap();
    }

    #[test]
    fn test_validate_rejects_cycles_and_bad_textures() {
        let cyclic = vec![Material::Blend { func: BlendFunc::Mix, nval: 0.5, nval_tex: None, left: 0, right: 0 }];
        assert_eq!(
            validate_tree(&cyclic, 0, 0),
            Err(SceneError::MaterialTreeTooDeep { root: 0, max: MAX_MATERIAL_DEPTH })
        );

        let textured = vec![Material::Leaf(MaterialLeaf { kval_tex: Some(3), ..MaterialLeaf::new(BrdfType::Diffuse, Spectrum::uniform(1.0), 0.0) })];
        assert!(matches!(validate_tree(&textured, 0, 2), Err(SceneError::IndexOutOfRange { what: "texture", .. })));
    }
}
