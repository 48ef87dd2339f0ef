use bytemuck::{Pod, Zeroable};

use crate::Transform;

/// One placement of a mesh. Every instance of the same mesh points at the same bottom-level
/// BVH root; only the transform differs.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct MeshInstance {
    pub mesh_index: u32,
    pub bvh_root: u32,
    pub padding: [u32; 2],
    /// Instance to world, column-major.
    pub transform: [[f32; 4]; 4],
}

impl MeshInstance {
    pub fn new(mesh_index: u32, bvh_root: u32, transform: &Transform) -> Self {
        Self {
            mesh_index,
            bvh_root,
            padding: [0; 2],
            transform: transform.to_cols_array(),
        }
    }

    /// The stored matrix with its inverse, or `None` if it is singular.
    pub fn transform(&self) -> Option<Transform> {
        Transform::from_cols_array(self.transform)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        assert_eq!(std::mem::size_of::<MeshInstance>(), 80);
        let inst = MeshInstance::new(3, 17, &Transform::translate(vec3f!(1, 2, 3)));
        let bytes = bytemuck::bytes_of(&inst);
        assert_eq!(&bytes[0..4], &3u32.to_le_bytes());
        assert_eq!(&bytes[4..8], &17u32.to_le_bytes());
        // translation is the last column
        assert_eq!(&bytes[64..68], &1.0f32.to_le_bytes());
        assert!(inst.transform().is_some());
    }
}
