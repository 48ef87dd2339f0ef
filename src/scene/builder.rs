use tracing::debug;

use crate::{Bounds3f, Point2f, Point3f, SceneError, Transform, Vec3f};
use crate::bvh::{build_bottom_level, build_top_level, splice, BvhNode};
use crate::camera::Camera;
use crate::error::check_index;
use crate::material::{Material, MaterialDesc, MaterialNode};
use crate::scene::{MeshInstance, Scene, SceneParts};
use crate::spectrum::Spectrum;
use crate::texture::{TextureFormat, TextureStore};

/// Input triangle for [`SceneBuilder::add_mesh`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Triangle {
    pub vertices: [Point3f; 3],
    /// Per-vertex shading normals. The geometric normal is used when absent.
    pub normals: Option<[Vec3f; 3]>,
    /// Per-vertex texture coordinates. Defaults to `(0, 0), (1, 0), (0, 1)`.
    pub uvs: Option<[Point2f; 3]>,
    /// Root index returned by [`SceneBuilder::add_material`].
    pub material: u32,
}

impl Triangle {
    pub fn new(p0: Point3f, p1: Point3f, p2: Point3f, material: u32) -> Self {
        Self { vertices: [p0, p1, p2], normals: None, uvs: None, material }
    }

    /// Two triangles covering the planar quad `p0 p1 p2 p3`, wound so the normal follows
    /// `(p1 - p0) x (p3 - p0)`. UVs span the unit square.
    pub fn quad(p0: Point3f, p1: Point3f, p2: Point3f, p3: Point3f, material: u32) -> [Self; 2] {
        let uv = [point2f!(0, 0), point2f!(1, 0), point2f!(1, 1), point2f!(0, 1)];
        [
            Self { vertices: [p0, p1, p2], normals: None, uvs: Some([uv[0], uv[1], uv[2]]), material },
            Self { vertices: [p0, p2, p3], normals: None, uvs: Some([uv[0], uv[2], uv[3]]), material },
        ]
    }

    fn bounds(&self) -> Bounds3f {
        self.vertices.iter().fold(Bounds3f::empty(), |b, p| b.join_point(p))
    }
}

struct MeshData {
    nodes: Vec<BvhNode>,
    bounds: Bounds3f,
}

/// Encodes a scene into the packed tables.
///
/// Each mesh gets its bottom-level BVH as soon as it is added, with its triangles stored in
/// leaf order. [`SceneBuilder::build`] then builds the top-level BVH over the instances and
/// splices every mesh's nodes behind it.
pub struct SceneBuilder {
    textures: TextureStore,
    materials: Vec<Material>,
    material_roots: Vec<u32>,
    meshes: Vec<MeshData>,
    vertices: Vec<[f32; 4]>,
    normals: Vec<[f32; 4]>,
    uvs: Vec<[f32; 2]>,
    material_index: Vec<u32>,
    instances: Vec<(u32, Transform)>,
    camera: Camera,
    background: Spectrum,
}

impl Default for SceneBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneBuilder {
    pub fn new() -> Self {
        Self {
            textures: TextureStore::new(),
            materials: Vec::new(),
            material_roots: Vec::new(),
            meshes: Vec::new(),
            vertices: Vec::new(),
            normals: Vec::new(),
            uvs: Vec::new(),
            material_index: Vec::new(),
            instances: Vec::new(),
            camera: Camera::default(),
            background: Spectrum::default(),
        }
    }

    pub fn add_texture(&mut self, format: TextureFormat, width: u32, height: u32, bytes: &[u8]) -> Result<u32, SceneError> {
        self.textures.add(format, width, height, bytes)
    }

    /// Encode a material tree and return its root index.
    pub fn add_material(&mut self, desc: &MaterialDesc) -> Result<u32, SceneError> {
        let root = desc.encode_into(&mut self.materials)?;
        self.material_roots.push(root);
        Ok(root)
    }

    /// Add a mesh and return its index. The mesh is not visible until instanced.
    pub fn add_mesh(&mut self, triangles: &[Triangle]) -> Result<u32, SceneError> {
        for tri in triangles {
            check_index("material root", tri.material as u64, self.materials.len())?;
        }

        let bounds: Vec<Bounds3f> = triangles.iter().map(Triangle::bounds).collect();
        let prim_base = self.material_index.len() as u32;
        let bvh = build_bottom_level(&bounds, prim_base)?;

        for &i in &bvh.prim_ordering {
            let tri = &triangles[i];
            let normals = tri.normals.unwrap_or([vec3f!(0, 0, 0); 3]);
            let uvs = tri.uvs.unwrap_or([point2f!(0, 0), point2f!(1, 0), point2f!(0, 1)]);
            for k in 0..3 {
                let p = tri.vertices[k];
                self.vertices.push([p.x, p.y, p.z, 1.0]);
                self.normals.push([normals[k].x, normals[k].y, normals[k].z, 0.0]);
                self.uvs.push([uvs[k].x, uvs[k].y]);
            }
            self.material_index.push(tri.material);
        }

        let mesh = self.meshes.len() as u32;
        self.meshes.push(MeshData {
            nodes: bvh.nodes,
            bounds: bounds.iter().fold(Bounds3f::empty(), |acc, b| acc.join(b)),
        });
        Ok(mesh)
    }

    /// Place mesh `mesh` in the world with the instance-to-world `transform`.
    pub fn add_instance(&mut self, mesh: u32, transform: Transform) -> Result<u32, SceneError> {
        check_index("mesh", mesh as u64, self.meshes.len())?;
        self.instances.push((mesh, transform));
        Ok(self.instances.len() as u32 - 1)
    }

    pub fn set_camera(&mut self, camera: Camera) {
        self.camera = camera;
    }

    pub fn set_background(&mut self, background: Spectrum) {
        self.background = background;
    }

    pub fn build(self) -> Result<Scene, SceneError> {
        let instance_bounds: Vec<Bounds3f> = self.instances.iter()
            .map(|(mesh, tf)| self.meshes[*mesh as usize].bounds.transform(tf))
            .collect();
        let mut bvh_nodes = build_top_level(&instance_bounds)?;
        let top_len = bvh_nodes.len();

        let mesh_roots = self.meshes.iter()
            .map(|mesh| splice(&mut bvh_nodes, &mesh.nodes))
            .collect::<Result<Vec<_>, _>>()?;

        let mesh_instances = self.instances.iter()
            .map(|(mesh, tf)| MeshInstance::new(*mesh, mesh_roots[*mesh as usize], tf))
            .collect();

        let material_nodes = self.materials.iter()
            .map(MaterialNode::encode)
            .collect::<Result<Vec<_>, _>>()?;

        debug!(
            top_nodes = top_len,
            bottom_nodes = bvh_nodes.len() - top_len,
            meshes = self.meshes.len(),
            instances = self.instances.len(),
            "encoded scene"
        );

        Scene::from_parts(SceneParts {
            bvh_nodes,
            mesh_instances,
            material_nodes,
            material_roots: self.material_roots,
            texture_data: self.textures.data().to_vec(),
            texture_metadata: self.textures.metadata().to_vec(),
            vertices: self.vertices,
            normals: self.normals,
            uvs: self.uvs,
            material_index: self.material_index,
            camera: self.camera,
            background: self.background,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Ray;
    use crate::bvh::BvhNodeKind;
    use crate::bvh::BvhLevel;
    use approx::assert_abs_diff_eq;

    fn grid_mesh(n: usize, material: u32) -> Vec<Triangle> {
        (0..n).flat_map(|i| {
            let x = i as f32;
            Triangle::quad(point3f!(x, 0, 0), point3f!(x + 1.0, 0, 0), point3f!(x + 1.0, 1, 0), point3f!(x, 1, 0), material)
        }).collect()
    }

    #[test]
    fn test_build_layout() {
        let mut b = SceneBuilder::new();
        let m = b.add_material(&MaterialDesc::diffuse(Spectrum::uniform(0.5))).unwrap();
        let mesh_a = b.add_mesh(&grid_mesh(8, m)).unwrap();
        let mesh_b = b.add_mesh(&grid_mesh(3, m)).unwrap();
        b.add_instance(mesh_a, Transform::IDENTITY).unwrap();
        b.add_instance(mesh_b, Transform::translate(vec3f!(0, 0, -5))).unwrap();
        b.add_instance(mesh_a, Transform::translate(vec3f!(0, 3, 0))).unwrap();
        let scene = b.build().unwrap();

        let insts = scene.mesh_instances();
        assert_eq!(insts.len(), 3);
        // instances of the same mesh share the bottom-level root
        assert_eq!(insts[0].bvh_root, insts[2].bvh_root);
        assert_ne!(insts[0].bvh_root, insts[1].bvh_root);
        assert!(insts.iter().all(|i| i.bvh_root > 0));
        // top level occupies the front of the array
        assert!(matches!(scene.bvh_nodes()[0].kind(BvhLevel::Top), BvhNodeKind::Interior { .. }));
        assert_eq!(scene.primitive_count(), 22);
    }

    #[test]
    fn test_instances_are_hit() {
        let mut b = SceneBuilder::new();
        let m = b.add_material(&MaterialDesc::diffuse(Spectrum::uniform(0.5))).unwrap();
        let mesh = b.add_mesh(&grid_mesh(4, m)).unwrap();
        b.add_instance(mesh, Transform::IDENTITY).unwrap();
        b.add_instance(mesh, Transform::translate(vec3f!(0, 0, -2)).then(Transform::scale(2.0, 2.0, 2.0))).unwrap();
        let scene = b.build().unwrap();

        let ray = Ray::new(point3f!(2.5, 0.5, 10), vec3f!(0, 0, -1));
        let hit = scene.intersect(&ray).unwrap();
        assert_eq!(hit.instance, 0);
        assert_abs_diff_eq!(hit.t, 10.0, epsilon = 1e-4);

        // only the scaled copy covers y = 1.5
        let ray = Ray::new(point3f!(2.5, 1.5, 10), vec3f!(0, 0, -1));
        let hit = scene.intersect(&ray).unwrap();
        assert_eq!(hit.instance, 1);
        assert_abs_diff_eq!(hit.t, 14.0, epsilon = 1e-4);
        let si = scene.interaction(&ray, &hit);
        assert_abs_diff_eq!(si.p.z, -4.0, epsilon = 1e-4);
        assert_abs_diff_eq!(si.n_geom.z, 1.0, epsilon = 1e-5);

        assert!(scene.occluded(&ray, 20.0));
        assert!(!scene.occluded(&ray, 13.0));
        let miss = Ray::new(point3f!(2.5, 10.0, 10), vec3f!(0, 0, -1));
        assert!(scene.intersect(&miss).is_none());
    }

    #[test]
    fn test_empty_scene_misses() {
        let scene = SceneBuilder::new().build().unwrap();
        assert!(scene.intersect(&Ray::new(point3f!(0, 0, 0), vec3f!(0, 0, 1))).is_none());
    }

    #[test]
    fn test_rejects_bad_references() {
        let mut b = SceneBuilder::new();
        assert!(b.add_mesh(&[Triangle::new(point3f!(0, 0, 0), point3f!(1, 0, 0), point3f!(0, 1, 0), 0)]).is_err());
        assert!(b.add_instance(0, Transform::IDENTITY).is_err());
        let m = b.add_material(&MaterialDesc::diffuse(Spectrum::uniform(0.5))).unwrap();
        assert!(matches!(b.add_mesh(&[]), Err(SceneError::InvalidGeometry(_))));
        let mesh = b.add_mesh(&grid_mesh(1, m)).unwrap();
        b.add_instance(mesh, Transform::scale(0.0, 1.0, 1.0)).unwrap();
        assert!(matches!(b.build(), Err(SceneError::SingularTransform(0))));
    }
}
