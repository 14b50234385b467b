use crate::partitioning::{NodeRole, NodeVisit, TraversalAction};
use crate::query::Ray;

/// Traversal policy reporting the leaves whose box is touched by a ray.
///
/// Subtrees whose box misses the ray are pruned. Leaves hit by the ray are reported to the
/// callback, and never descended into.
#[derive(Copy, Clone, Debug)]
pub struct RayLeafQuery<'a> {
    ray: &'a Ray,
}

impl<'a> RayLeafQuery<'a> {
    /// A query for the leaves touched by `ray`.
    pub fn new(ray: &'a Ray) -> Self {
        Self { ray }
    }

    /// Decides how the traversal proceeds after reaching `node`, calling `on_leaf_hit` with
    /// the payload of the leaves hit by the ray.
    #[inline]
    pub fn visit(&self, node: &NodeVisit, on_leaf_hit: &mut impl FnMut(u32)) -> TraversalAction {
        if !node.aabb.intersects_ray(self.ray) {
            return TraversalAction::Prune;
        }

        match node.role {
            NodeRole::Internal => TraversalAction::Continue,
            NodeRole::Leaf(data) => {
                on_leaf_hit(data);
                TraversalAction::Prune
            }
        }
    }
}
