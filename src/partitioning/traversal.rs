use crate::bounding_volume::Aabb;
use core::ops::ControlFlow;
use smallvec::SmallVec;

/// Number of node identifiers stored inline by the explicit traversal stack before spilling to
/// the heap. This covers trees with up to 2^32 leaves.
pub const TRAVERSAL_STACK_SIZE: usize = 32;

/// Controls the execution flow of a tree traversal.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TraversalAction {
    /// The traversal will continue on the children of the tested node.
    Continue,
    /// The traversal will skip all descendants of the tested node.
    Prune,
    /// The traversal will exit immediately.
    EarlyExit,
}

/// The role of a tree node.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum NodeRole {
    /// A node with one or two children.
    Internal,
    /// A node without children, carrying the index of the bounding volume it was built from.
    Leaf(u32),
}

/// A snapshot of a tree node handed to traversal visitors.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct NodeVisit {
    /// Identifier of the node within its tree.
    ///
    /// This is the node index for a [`PackedBvh`](crate::partitioning::PackedBvh) and the record
    /// byte offset for a [`PointerBvh`](crate::partitioning::PointerBvh). In both cases the root
    /// is identified by `0`.
    pub id: usize,
    /// Whether this node is internal or a leaf.
    pub role: NodeRole,
    /// The bounding box of the node.
    pub aabb: Aabb,
}

impl NodeVisit {
    /// Is this node a leaf?
    #[inline]
    pub fn is_leaf(&self) -> bool {
        matches!(self.role, NodeRole::Leaf(_))
    }

    /// If this node is a leaf, returns the index of the bounding volume it represents.
    #[inline]
    pub fn leaf_data(&self) -> Option<u32> {
        match self.role {
            NodeRole::Leaf(data) => Some(data),
            NodeRole::Internal => None,
        }
    }
}

/// Node addressing shared by both tree encodings.
///
/// Implementors only have to resolve identifiers; the traversal orders are implemented once by
/// [`traverse_recursive`] and [`traverse_with_stack`].
pub(crate) trait NodeAddressing {
    /// The snapshot of the node `id`.
    fn node(&self, id: usize) -> NodeVisit;

    /// Is the node `id` a leaf?
    fn is_leaf(&self, id: usize) -> bool;

    /// The children of the internal node `id`, absent ones being `None`.
    fn children(&self, id: usize) -> [Option<usize>; 2];
}

/// Depth-first pre-order traversal starting at `id`, recursing on the call stack.
pub(crate) fn traverse_recursive<T, F>(tree: &T, id: usize, visitor: &mut F) -> ControlFlow<()>
where
    T: NodeAddressing + ?Sized,
    F: FnMut(&NodeVisit) -> TraversalAction,
{
    let node = tree.node(id);

    match visitor(&node) {
        TraversalAction::EarlyExit => return ControlFlow::Break(()),
        TraversalAction::Prune => return ControlFlow::Continue(()),
        TraversalAction::Continue => {}
    }

    if !node.is_leaf() {
        for child in tree.children(id).into_iter().flatten() {
            traverse_recursive(tree, child, visitor)?;
        }
    }

    ControlFlow::Continue(())
}

/// Depth-first pre-order traversal starting at `id`, with an explicit stack.
///
/// Internal children are pushed right first so the left one is popped first. Leaf children are
/// handed to the visitor right away instead of being pushed. The visit order is the same as
/// [`traverse_recursive`].
pub(crate) fn traverse_with_stack<T, F>(tree: &T, id: usize, visitor: &mut F) -> ControlFlow<()>
where
    T: NodeAddressing + ?Sized,
    F: FnMut(&NodeVisit) -> TraversalAction,
{
    let mut stack: SmallVec<[usize; TRAVERSAL_STACK_SIZE]> = SmallVec::new();
    stack.push(id);

    while let Some(id) = stack.pop() {
        let node = tree.node(id);

        match visitor(&node) {
            TraversalAction::EarlyExit => return ControlFlow::Break(()),
            TraversalAction::Prune => continue,
            TraversalAction::Continue => {}
        }

        if node.is_leaf() {
            continue;
        }

        let children = tree.children(id);

        // All the leaves are on the same level so siblings are either both leaves or both
        // internal.
        if children.iter().flatten().all(|child| tree.is_leaf(*child)) {
            for child in children.into_iter().flatten() {
                if visitor(&tree.node(child)) == TraversalAction::EarlyExit {
                    return ControlFlow::Break(());
                }
            }
        } else {
            for child in children.into_iter().rev().flatten() {
                stack.push(child);
            }
        }
    }

    ControlFlow::Continue(())
}
