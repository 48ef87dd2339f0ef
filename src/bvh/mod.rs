//! Packed two-level BVH.
//!
//! Nodes of both levels share the same 32 byte record. The sign of `l_data` separates
//! interior nodes (`l_data > 0`, both fields are child indices) from leaves
//! (`l_data <= 0`). What a leaf refers to depends on the level it lives in: a top-level
//! leaf names a mesh instance, a bottom-level leaf names a run of primitives.
//!
//! Since the root of every array sits at its index 0, zero is never a valid child index,
//! and a leaf payload of zero is still unambiguous.

use bytemuck::{Pod, Zeroable};

use crate::{Bounds3f, SceneError};

pub mod build;

pub use build::*;

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct BvhNode {
    pub min: [f32; 3],
    pub l_data: i32,
    pub max: [f32; 3],
    pub r_data: i32,
}

/// Which half of the two-level hierarchy a node belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BvhLevel {
    Top,
    Bottom,
}

/// Decoded form of a [`BvhNode`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BvhNodeKind {
    Interior { left: u32, right: u32 },
    Instance(u32),
    Primitives { first: u32, count: u32 },
}

/// Largest value that can be stored in either half of a node.
pub const MAX_NODE_INDEX: u32 = i32::MAX as u32;

pub(crate) fn to_node_index(i: u64) -> Result<i32, SceneError> {
    if i <= MAX_NODE_INDEX as u64 {
        Ok(i as i32)
    } else {
        Err(SceneError::UnrepresentableIndex(i))
    }
}

impl BvhNode {
    pub fn new(bounds: Bounds3f) -> Self {
        let mut node = Self::zeroed();
        node.set_bbox(bounds);
        node
    }

    pub fn is_leaf(&self) -> bool {
        self.l_data <= 0
    }

    fn kind_name(&self) -> &'static str {
        if self.is_leaf() { "a leaf" } else { "an interior" }
    }

    pub fn bbox(&self) -> Bounds3f {
        Bounds3f::from_arrays(self.min, self.max)
    }

    pub fn set_bbox(&mut self, bounds: Bounds3f) {
        let (min, max) = bounds.to_arrays();
        self.min = min;
        self.max = max;
    }

    /// Turn this node into an interior node pointing at `left` and `right`.
    pub fn set_child_nodes(&mut self, left: u32, right: u32) -> Result<(), SceneError> {
        for child in [left, right] {
            if child == 0 {
                return Err(SceneError::InvalidChildIndex(child));
            }
            to_node_index(child as u64)?;
        }
        self.l_data = left as i32;
        self.r_data = right as i32;
        Ok(())
    }

    pub fn child_nodes(&self) -> Result<(u32, u32), SceneError> {
        if self.is_leaf() {
            return Err(SceneError::NodeKindMismatch { op: "child_nodes", found: self.kind_name() });
        }
        Ok((self.l_data as u32, self.r_data as u32))
    }

    /// Turn this node into a top-level leaf referencing mesh instance `index`.
    /// The unused right half is cleared.
    pub fn set_mesh_index(&mut self, index: u32) -> Result<(), SceneError> {
        let i = to_node_index(index as u64)?;
        self.l_data = -i;
        self.r_data = 0;
        Ok(())
    }

    pub fn mesh_index(&self) -> Result<u32, SceneError> {
        if !self.is_leaf() {
            return Err(SceneError::NodeKindMismatch { op: "mesh_index", found: self.kind_name() });
        }
        Ok(self.l_data.unsigned_abs())
    }

    /// Turn this node into a bottom-level leaf covering `count` primitives from `first`.
    pub fn set_primitives(&mut self, first: u32, count: u32) -> Result<(), SceneError> {
        let first = to_node_index(first as u64)?;
        let count = to_node_index(count as u64)?;
        self.l_data = -first;
        self.r_data = count;
        Ok(())
    }

    pub fn primitives(&self) -> Result<(u32, u32), SceneError> {
        if !self.is_leaf() {
            return Err(SceneError::NodeKindMismatch { op: "primitives", found: self.kind_name() });
        }
        Ok((self.l_data.unsigned_abs(), self.r_data as u32))
    }

    /// Shift both child indices of an interior node. Leaves are left untouched.
    pub fn offset_child_nodes(&mut self, delta: i32) {
        if self.is_leaf() {
            return;
        }
        self.l_data += delta;
        self.r_data += delta;
    }

    #[inline]
    pub fn kind(&self, level: BvhLevel) -> BvhNodeKind {
        if self.l_data > 0 {
            BvhNodeKind::Interior { left: self.l_data as u32, right: self.r_data as u32 }
        } else {
            match level {
                BvhLevel::Top => BvhNodeKind::Instance(self.l_data.unsigned_abs()),
                BvhLevel::Bottom => BvhNodeKind::Primitives {
                    first: self.l_data.unsigned_abs(),
                    count: self.r_data.max(0) as u32,
                },
            }
        }
    }
}

/// Append a bottom-level array to `dst`, rebasing its interior pointers, and return the
/// index its root landed at.
pub fn splice(dst: &mut Vec<BvhNode>, src: &[BvhNode]) -> Result<u32, SceneError> {
    let base = dst.len();
    let end = base as u64 + src.len() as u64;
    // every rebased pointer is below `end`, so checking it once covers them all
    if end > MAX_NODE_INDEX as u64 + 1 {
        return Err(SceneError::UnrepresentableIndex(end - 1));
    }
    let delta = base as i32;
    dst.extend(src.iter().map(|node| {
        let mut node = *node;
        node.offset_child_nodes(delta);
        node
    }));
    Ok(base as u32)
}

/// Check that every node reachable from `root` decodes cleanly and points inside `nodes`.
/// Returns the number of nodes visited.
pub fn validate(
    nodes: &[BvhNode],
    root: u32,
    level: BvhLevel,
    mut check_leaf: impl FnMut(BvhNodeKind) -> Result<(), SceneError>,
) -> Result<usize, SceneError> {
    crate::error::check_index("BVH node", root as u64, nodes.len())?;
    let mut stack = vec![root];
    let mut visited = 0;
    while let Some(idx) = stack.pop() {
        visited += 1;
        // a well formed tree has fewer edges than nodes
        if visited > nodes.len() {
            return Err(SceneError::IndexOutOfRange { what: "BVH node (cycle)", index: idx as u64, len: nodes.len() });
        }
        let node = &nodes[idx as usize];
        match node.kind(level) {
            BvhNodeKind::Interior { left, right } => {
                for child in [left, right] {
                    crate::error::check_index("BVH child", child as u64, nodes.len())?;
                    stack.push(child);
                }
            }
            leaf => check_leaf(leaf)?,
        }
    }
    Ok(visited)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_layout() {
        assert_eq!(std::mem::size_of::<BvhNode>(), 32);
        let mut node = BvhNode::zeroed();
        node.set_child_nodes(3, 9).unwrap();
        let bytes: &[u8] = bytemuck::bytes_of(&node);
        assert_eq!(&bytes[12..16], &3i32.to_le_bytes());
        assert_eq!(&bytes[28..32], &9i32.to_le_bytes());
    }

    #[test]
    fn test_child_nodes() {
        let mut node = BvhNode::zeroed();
        node.set_child_nodes(1, 2).unwrap();
        assert_eq!(node.child_nodes(), Ok((1, 2)));
        assert!(matches!(node.mesh_index(), Err(SceneError::NodeKindMismatch { .. })));
        assert!(matches!(node.primitives(), Err(SceneError::NodeKindMismatch { .. })));

        assert_eq!(node.set_child_nodes(0, 2), Err(SceneError::InvalidChildIndex(0)));
        assert_eq!(node.set_child_nodes(1, 1 << 31), Err(SceneError::UnrepresentableIndex(1 << 31)));
    }

    #[test]
    fn test_mesh_index() {
        let mut node = BvhNode::zeroed();
        for i in [0, 1, 17, MAX_NODE_INDEX] {
            node.set_mesh_index(i).unwrap();
            assert_eq!(node.mesh_index(), Ok(i));
            assert_eq!(node.kind(BvhLevel::Top), BvhNodeKind::Instance(i));
            assert!(node.child_nodes().is_err());
        }
        assert!(node.set_mesh_index(MAX_NODE_INDEX + 1).is_err());
    }

    #[test]
    fn test_primitives() {
        let mut node = BvhNode::zeroed();
        node.set_primitives(0, 4).unwrap();
        assert_eq!(node.primitives(), Ok((0, 4)));
        node.set_primitives(123_456, 1).unwrap();
        assert_eq!(node.primitives(), Ok((123_456, 1)));
        assert_eq!(node.kind(BvhLevel::Bottom), BvhNodeKind::Primitives { first: 123_456, count: 1 });
    }

    #[test]
    fn test_offset_child_nodes() {
        let mut interior = BvhNode::zeroed();
        interior.set_child_nodes(1, 4).unwrap();
        interior.offset_child_nodes(10);
        assert_eq!(interior.child_nodes(), Ok((11, 14)));

        let mut leaf = BvhNode::zeroed();
        leaf.set_primitives(5, 2).unwrap();
        let before = leaf;
        leaf.offset_child_nodes(10);
        assert_eq!(leaf, before);
    }

    #[test]
    fn test_splice_returns_base() {
        let mut dst = vec![BvhNode::zeroed(); 3];
        let mut root = BvhNode::zeroed();
        root.set_child_nodes(1, 2).unwrap();
        let mut a = BvhNode::zeroed();
        a.set_primitives(0, 1).unwrap();
        let mut b = BvhNode::zeroed();
        b.set_primitives(1, 1).unwrap();

        let base = splice(&mut dst, &[root, a, b]).unwrap();
        assert_eq!(base, 3);
        assert_eq!(dst[3].child_nodes(), Ok((4, 5)));
        assert_eq!(dst[4].primitives(), Ok((0, 1)));
    }

    #[test]
    fn test_validate_rejects_dangling_child() {
        let mut root = BvhNode::zeroed();
        root.set_child_nodes(1, 7).unwrap();
        let leaf = BvhNode::zeroed();
        let res = validate(&[root, leaf], 0, BvhLevel::Top, |_| Ok(()));
        assert!(matches!(res, Err(SceneError::IndexOutOfRange { .. })));
    }
}
