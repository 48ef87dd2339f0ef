//! The scene aggregate: every packed table the tracer reads, built once and then shared
//! read-only by all rendering tasks.

use std::collections::{HashMap, HashSet};

use bytemuck::{Pod, Zeroable};
use tracing::debug;

use crate::{Point2f, SceneError, Transform};
use crate::bvh::{self, BvhLevel, BvhNode, BvhNodeKind};
use crate::camera::Camera;
use crate::error::check_index;
use crate::material::{validate_tree, BrdfType, Material, MaterialNode, MaterialTree};
use crate::spectrum::Spectrum;
use crate::texture::{TextureMetadata, TextureStore};

pub mod builder;
pub mod demo;
pub mod instance;
pub mod intersect;
pub mod packed;

pub use builder::*;
pub use instance::*;
pub use intersect::*;
pub use packed::*;

/// A triangle whose material root is an emissive leaf, used for light sampling.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
pub struct Emitter {
    pub instance: u32,
    pub primitive: u32,
}

/// Raw tables a scene is assembled from. Per-vertex arrays hold three consecutive entries
/// per triangle. `normals` and `uvs` may be left empty.
#[derive(Clone, Debug, Default)]
pub struct SceneParts {
    pub bvh_nodes: Vec<BvhNode>,
    pub mesh_instances: Vec<MeshInstance>,
    pub material_nodes: Vec<MaterialNode>,
    pub material_roots: Vec<u32>,
    pub texture_data: Vec<u8>,
    pub texture_metadata: Vec<TextureMetadata>,
    pub vertices: Vec<[f32; 4]>,
    pub normals: Vec<[f32; 4]>,
    pub uvs: Vec<[f32; 2]>,
    /// Material root of each triangle.
    pub material_index: Vec<u32>,
    pub camera: Camera,
    pub background: Spectrum,
}

pub struct Scene {
    bvh_nodes: Vec<BvhNode>,
    instances: Vec<MeshInstance>,
    /// Decoded from `instances`, with inverses.
    transforms: Vec<Transform>,
    material_nodes: Vec<MaterialNode>,
    materials: Vec<Material>,
    material_roots: Vec<u32>,
    textures: TextureStore,
    vertices: Vec<[f32; 4]>,
    normals: Vec<[f32; 4]>,
    uvs: Vec<[f32; 2]>,
    material_index: Vec<u32>,
    emitters: Vec<Emitter>,
    camera: Camera,
    background: Spectrum,
}

impl Scene {
    /// Validate the packed tables and assemble a scene. Every index is checked here so the
    /// tracing loop can rely on them.
    pub fn from_parts(parts: SceneParts) -> Result<Self, SceneError> {
        let SceneParts {
            bvh_nodes,
            mesh_instances,
            material_nodes,
            material_roots,
            texture_data,
            texture_metadata,
            vertices,
            normals,
            uvs,
            material_index,
            camera,
            background,
        } = parts;

        let textures = TextureStore::from_parts(texture_data, texture_metadata)?;

        let materials = material_nodes.iter()
            .map(MaterialNode::decode)
            .collect::<Result<Vec<_>, _>>()?;
        let roots: HashSet<u32> = material_roots.iter().chain(material_index.iter()).copied().collect();
        for &root in &roots {
            validate_tree(&materials, root, textures.len())?;
        }

        let n_prims = material_index.len();
        if vertices.len() != 3 * n_prims {
            return Err(SceneError::InvalidGeometry("vertex count must be three per triangle"));
        }
        if !normals.is_empty() && normals.len() != vertices.len() {
            return Err(SceneError::InvalidGeometry("normal count must match vertex count"));
        }
        if !uvs.is_empty() && uvs.len() != vertices.len() {
            return Err(SceneError::InvalidGeometry("uv count must match vertex count"));
        }

        if !mesh_instances.is_empty() {
            let top_nodes = bvh::validate(&bvh_nodes, 0, BvhLevel::Top, |kind| match kind {
                BvhNodeKind::Instance(i) => check_index("mesh instance", i as u64, mesh_instances.len()),
                _ => Ok(()),
            })?;
            debug!(nodes = top_nodes, instances = mesh_instances.len(), "validated top-level BVH");
        }

        let transforms = mesh_instances.iter()
            .enumerate()
            .map(|(i, inst)| inst.transform().ok_or(SceneError::SingularTransform(i as u32)))
            .collect::<Result<Vec<_>, _>>()?;

        // primitives reachable from each distinct bottom-level root
        let mut mesh_prims: HashMap<u32, Vec<u32>> = HashMap::new();
        for inst in &mesh_instances {
            if mesh_prims.contains_key(&inst.bvh_root) {
                continue;
            }
            if inst.bvh_root == 0 {
                return Err(SceneError::InvalidChildIndex(0));
            }
            let mut prims = Vec::new();
            bvh::validate(&bvh_nodes, inst.bvh_root, BvhLevel::Bottom, |kind| {
                if let BvhNodeKind::Primitives { first, count } = kind {
                    let end = first as u64 + count as u64;
                    if end > n_prims as u64 {
                        return Err(SceneError::IndexOutOfRange { what: "primitive", index: end - 1, len: n_prims });
                    }
                    prims.extend(first..first + count);
                }
                Ok(())
            })?;
            mesh_prims.insert(inst.bvh_root, prims);
        }

        let is_light = |root: u32| matches!(
            materials[root as usize],
            Material::Leaf(leaf) if leaf.brdf == BrdfType::Emissive
        );
        let mut emitters = Vec::new();
        for (i, inst) in mesh_instances.iter().enumerate() {
            for &prim in &mesh_prims[&inst.bvh_root] {
                if is_light(material_index[prim as usize]) {
                    emitters.push(Emitter { instance: i as u32, primitive: prim });
                }
            }
        }

        debug!(
            bvh_nodes = bvh_nodes.len(),
            triangles = n_prims,
            materials = materials.len(),
            textures = textures.len(),
            emitters = emitters.len(),
            "assembled scene"
        );

        Ok(Self {
            bvh_nodes,
            instances: mesh_instances,
            transforms,
            material_nodes,
            materials,
            material_roots,
            textures,
            vertices,
            normals,
            uvs,
            material_index,
            emitters,
            camera,
            background,
        })
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn background(&self) -> Spectrum {
        self.background
    }

    pub fn bvh_nodes(&self) -> &[BvhNode] {
        &self.bvh_nodes
    }

    pub fn mesh_instances(&self) -> &[MeshInstance] {
        &self.instances
    }

    pub fn instance_transform(&self, instance: u32) -> &Transform {
        &self.transforms[instance as usize]
    }

    pub fn material_nodes(&self) -> &[MaterialNode] {
        &self.material_nodes
    }

    pub fn material_roots(&self) -> &[u32] {
        &self.material_roots
    }

    pub fn textures(&self) -> &TextureStore {
        &self.textures
    }

    pub fn materials(&self) -> MaterialTree<'_> {
        MaterialTree::new(&self.materials, &self.textures)
    }

    pub fn primitive_count(&self) -> usize {
        self.material_index.len()
    }

    pub fn primitive_material(&self, prim: u32) -> u32 {
        self.material_index[prim as usize]
    }

    pub fn emitters(&self) -> &[Emitter] {
        &self.emitters
    }

    /// Whether surfaces with this material root are in the emitter table, meaning their
    /// emission is picked up by light sampling.
    pub fn is_light_material(&self, root: u32) -> bool {
        matches!(self.materials.get(root as usize), Some(Material::Leaf(leaf)) if leaf.brdf == BrdfType::Emissive)
    }

    pub fn sample_texture(&self, index: u32, uv: Point2f) -> Spectrum {
        self.textures.sample(index, uv)
    }

    pub(crate) fn vertex_arrays(&self) -> (&[[f32; 4]], &[[f32; 4]], &[[f32; 2]], &[u32]) {
        (&self.vertices, &self.normals, &self.uvs, &self.material_index)
    }
}
