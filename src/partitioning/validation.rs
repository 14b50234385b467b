//! Consistency checks of static trees, mostly for tests and debugging.

use crate::bounding_volume::{Aabb, BoundingVolume};
use crate::partitioning::{
    Bvh, BvhError, PackedBvh, PointerBvh, StaticBvh, TraversalAction,
};
use alloc::collections::BTreeSet;

/// Panics if `tree` isn't well-formed.
///
/// The tree is well-formed if every node is reached at most once from the root, every leaf is
/// reached, every internal box is exactly the union of the boxes of its present children, and
/// the tree bounds are the root box. The tree must have been refit.
pub fn assert_well_formed<T: StaticBvh + ?Sized>(tree: &T) {
    let root_aabb = tree.root_aabb().expect("the tree must be refit before validation");
    let root = tree.node(0).expect("the root must exist");
    assert_eq!(root.aabb, root_aabb);

    let mut loop_detection = BTreeSet::new();
    let leaf_count = assert_well_formed_recurse(tree, 0, &mut loop_detection);
    assert_eq!(leaf_count, tree.leaf_count());
}

fn assert_well_formed_recurse<T: StaticBvh + ?Sized>(
    tree: &T,
    id: usize,
    loop_detection: &mut BTreeSet<usize>,
) -> usize {
    assert!(loop_detection.insert(id), "node {} reached twice", id);

    let node = tree.node(id).expect("child identifiers must be valid");
    assert!(node.aabb.is_valid());

    if node.is_leaf() {
        return 1;
    }

    let children = tree
        .node_children(id)
        .expect("child identifiers must be valid");
    assert!(children[0].is_some(), "internal node {} has no left child", id);

    let mut union = Aabb::new_invalid();
    let mut leaf_count = 0;

    for child in children.into_iter().flatten() {
        let child_aabb = tree.node(child).expect("child identifiers must be valid").aabb;
        assert!(node.aabb.contains(&child_aabb));
        union.merge(&child_aabb);
        leaf_count += assert_well_formed_recurse(tree, child, loop_detection);
    }

    assert_eq!(node.aabb, union, "node {} is not the union of its children", id);
    leaf_count
}

/// Counts the leaves reachable from the node `id`.
///
/// Fails like [`StaticBvh::traverse_from`] if the tree is stale or `id` isn't one of its nodes.
/// This is mostly a utility for debugging.
pub fn reachable_leaf_count<T: StaticBvh + ?Sized>(
    tree: &T,
    id: usize,
) -> Result<usize, BvhError> {
    let mut count = 0;
    tree.traverse_from(id, |node| {
        count += node.is_leaf() as usize;
        TraversalAction::Continue
    })?;
    Ok(count)
}

impl PackedBvh {
    /// Panics if the tree isn’t well-formed.
    ///
    /// See [`assert_well_formed`].
    pub fn assert_well_formed(&self) {
        assert_well_formed(self)
    }
}

impl PointerBvh {
    /// Panics if the tree isn’t well-formed.
    ///
    /// See [`assert_well_formed`].
    pub fn assert_well_formed(&self) {
        assert_well_formed(self)
    }
}

impl Bvh {
    /// Panics if the tree isn’t well-formed.
    ///
    /// See [`assert_well_formed`].
    pub fn assert_well_formed(&self) {
        assert_well_formed(self)
    }
}
