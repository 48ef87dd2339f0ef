use partition::partition;
use tracing::debug;

use crate::{Bounds3f, Point3f, SceneError};
use crate::bvh::{to_node_index, BvhNode};

/// Upper bound on the number of triangles referenced by one bottom-level leaf.
pub const MAX_PRIMS_IN_NODE: usize = 4;

#[derive(Clone, Copy, Debug)]
struct BvhPrimInfo {
    prim_id: usize,
    bounds: Bounds3f,
    centroid: Point3f,
}

impl BvhPrimInfo {
    fn new(prim_id: usize, bounds: Bounds3f) -> Self {
        Self { prim_id, bounds, centroid: bounds.centroid() }
    }
}

#[derive(Clone, Copy)]
enum LeafPayload {
    /// One mesh instance per leaf, referenced by its original index.
    Instance,
    /// Runs of reordered primitives, offset by the position of the mesh in the global
    /// primitive arrays.
    Primitives { base: u32 },
}

struct BuildState {
    nodes: Vec<BvhNode>,
    prim_ordering: Vec<usize>,
    payload: LeafPayload,
    max_in_leaf: usize,
}

/// A freshly built bottom-level hierarchy.
pub struct BottomLevelBvh {
    pub nodes: Vec<BvhNode>,
    /// Original primitive index for each slot in leaf order. Primitive arrays must be
    /// rewritten in this order for the leaf ranges to be correct.
    pub prim_ordering: Vec<usize>,
}

/// Build a bottom-level BVH over primitives with the given bounds. Leaf ranges are global:
/// they start at `prim_base`, the index of this mesh's first primitive in the scene arrays.
pub fn build_bottom_level(prim_bounds: &[Bounds3f], prim_base: u32) -> Result<BottomLevelBvh, SceneError> {
    if prim_bounds.is_empty() {
        return Err(SceneError::InvalidGeometry("a mesh needs at least one triangle"));
    }
    to_node_index(prim_base as u64 + prim_bounds.len() as u64)?;

    let state = build(prim_bounds, LeafPayload::Primitives { base: prim_base }, MAX_PRIMS_IN_NODE)?;
    debug!(
        prims = prim_bounds.len(),
        nodes = state.nodes.len(),
        "built bottom-level BVH"
    );
    Ok(BottomLevelBvh { nodes: state.nodes, prim_ordering: state.prim_ordering })
}

/// Build the top-level BVH over the world-space bounds of every mesh instance. Each leaf
/// holds exactly one instance.
pub fn build_top_level(instance_bounds: &[Bounds3f]) -> Result<Vec<BvhNode>, SceneError> {
    if instance_bounds.is_empty() {
        return Ok(Vec::new());
    }
    let state = build(instance_bounds, LeafPayload::Instance, 1)?;
    debug!(instances = instance_bounds.len(), nodes = state.nodes.len(), "built top-level BVH");
    Ok(state.nodes)
}

fn build(bounds: &[Bounds3f], payload: LeafPayload, max_in_leaf: usize) -> Result<BuildState, SceneError> {
    let mut prim_info: Vec<BvhPrimInfo> = bounds.iter()
        .enumerate()
        .map(|(i, b)| BvhPrimInfo::new(i, *b))
        .collect();

    let mut state = BuildState {
        nodes: Vec::with_capacity(2 * bounds.len()),
        prim_ordering: Vec::with_capacity(bounds.len()),
        payload,
        max_in_leaf,
    };
    recursive_build(&mut state, &mut prim_info)?;
    Ok(state)
}

/// Emit the node for `prim_info` and all its descendants, returning its index. The parent
/// slot is pushed before recursing, so the root lands at 0 and every child index is
/// strictly positive.
fn recursive_build(state: &mut BuildState, prim_info: &mut [BvhPrimInfo]) -> Result<u32, SceneError> {
    // Find the union of the bounding boxes of all primitives in this node,
    // and the bounding box of all centroids
    let (node_bounds, centroid_bounds) = prim_info.iter()
        .fold((Bounds3f::empty(), Bounds3f::empty()), |(node_bb, centr_bb), prim| {
            (node_bb.join(&prim.bounds), centr_bb.join_point(&prim.centroid))
        });

    let node_idx = state.nodes.len();
    to_node_index(node_idx as u64)?;
    state.nodes.push(BvhNode::new(node_bounds));

    let n_prims = prim_info.len();
    if n_prims <= state.max_in_leaf {
        let node = &mut state.nodes[node_idx];
        match state.payload {
            LeafPayload::Instance => node.set_mesh_index(prim_info[0].prim_id as u32)?,
            LeafPayload::Primitives { base } => {
                let first = base + state.prim_ordering.len() as u32;
                node.set_primitives(first, n_prims as u32)?;
            }
        }
        state.prim_ordering.extend(prim_info.iter().map(|p| p.prim_id));
        return Ok(node_idx as u32);
    }

    let ax = centroid_bounds.maximum_extent();
    let midpoint = (centroid_bounds.min[ax] + centroid_bounds.max[ax]) / 2.0;
    let n_left = {
        let (left, _) = partition(prim_info, |prim| prim.centroid[ax] < midpoint);
        left.len()
    };

    // All centroids on one side of the midpoint (they coincide, or are NaN). Fall back to
    // splitting into two equally sized halves along the same axis.
    let mid = if n_left == 0 || n_left == n_prims {
        let mid = n_prims / 2;
        prim_info.select_nth_unstable_by(mid, |a, b| {
            a.centroid[ax].partial_cmp(&b.centroid[ax]).unwrap_or(std::cmp::Ordering::Equal)
        });
        mid
    } else {
        n_left
    };

    let (part1, part2) = prim_info.split_at_mut(mid);
    let left = recursive_build(state, part1)?;
    let right = recursive_build(state, part2)?;
    state.nodes[node_idx].set_child_nodes(left, right)?;

    Ok(node_idx as u32)
}
