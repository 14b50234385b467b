use crate::bounding_volume::{Aabb, BoundingVolume};
use crate::partitioning::{NodeRole, NodeVisit, TraversalAction};

/// Traversal policy reporting the leaves whose box intersects a query box.
///
/// This is the culling counterpart of [`RayLeafQuery`](crate::partitioning::RayLeafQuery).
#[derive(Copy, Clone, Debug)]
pub struct AabbLeafQuery<'a> {
    aabb: &'a Aabb,
}

impl<'a> AabbLeafQuery<'a> {
    /// A query for the leaves intersecting `aabb`.
    pub fn new(aabb: &'a Aabb) -> Self {
        Self { aabb }
    }

    /// Decides how the traversal proceeds after reaching `node`, calling `on_leaf` with the
    /// payload of the intersecting leaves.
    #[inline]
    pub fn visit(&self, node: &NodeVisit, on_leaf: &mut impl FnMut(u32)) -> TraversalAction {
        if !node.aabb.intersects(self.aabb) {
            return TraversalAction::Prune;
        }

        match node.role {
            NodeRole::Internal => TraversalAction::Continue,
            NodeRole::Leaf(data) => {
                on_leaf(data);
                TraversalAction::Prune
            }
        }
    }
}
