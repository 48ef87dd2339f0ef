//! Byte views of the scene tables, ready to hand to a device upload.

use crate::SceneError;
use crate::scene::Scene;

/// Upper bound on a single device buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UploadLimits {
    pub max_buffer_bytes: usize,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self { max_buffer_bytes: 128 << 20 }
    }
}

/// Every scene table as raw little-endian bytes in its packed record layout.
#[derive(Clone, Copy, Debug)]
pub struct PackedScene<'a> {
    pub bvh_nodes: &'a [u8],
    pub mesh_instances: &'a [u8],
    pub material_nodes: &'a [u8],
    pub material_roots: &'a [u8],
    pub texture_data: &'a [u8],
    pub texture_metadata: &'a [u8],
    pub vertices: &'a [u8],
    pub normals: &'a [u8],
    pub uvs: &'a [u8],
    pub material_index: &'a [u8],
    pub emitters: &'a [u8],
}

impl<'a> PackedScene<'a> {
    pub fn buffers(&self) -> [(&'static str, &'a [u8]); 11] {
        [
            ("bvh_nodes", self.bvh_nodes),
            ("mesh_instances", self.mesh_instances),
            ("material_nodes", self.material_nodes),
            ("material_roots", self.material_roots),
            ("texture_data", self.texture_data),
            ("texture_metadata", self.texture_metadata),
            ("vertices", self.vertices),
            ("normals", self.normals),
            ("uvs", self.uvs),
            ("material_index", self.material_index),
            ("emitters", self.emitters),
        ]
    }

    pub fn total_bytes(&self) -> usize {
        self.buffers().iter().map(|(_, b)| b.len()).sum()
    }
}

impl Scene {
    /// Byte views of every table. Fails if any of them is larger than the device allows, so
    /// the problem is reported before rendering starts.
    pub fn pack(&self, limits: &UploadLimits) -> Result<PackedScene<'_>, SceneError> {
        let (vertices, normals, uvs, material_index) = self.vertex_arrays();
        let packed = PackedScene {
            bvh_nodes: bytemuck::cast_slice(self.bvh_nodes()),
            mesh_instances: bytemuck::cast_slice(self.mesh_instances()),
            material_nodes: bytemuck::cast_slice(self.material_nodes()),
            material_roots: bytemuck::cast_slice(self.material_roots()),
            texture_data: self.textures().data(),
            texture_metadata: bytemuck::cast_slice(self.textures().metadata()),
            vertices: bytemuck::cast_slice(vertices),
            normals: bytemuck::cast_slice(normals),
            uvs: bytemuck::cast_slice(uvs),
            material_index: bytemuck::cast_slice(material_index),
            emitters: bytemuck::cast_slice(self.emitters()),
        };

        for (buffer, bytes) in packed.buffers() {
            if bytes.len() > limits.max_buffer_bytes {
                return Err(SceneError::BufferTooLarge { buffer, size: bytes.len(), limit: limits.max_buffer_bytes });
            }
        }
        Ok(packed)
    }
}
