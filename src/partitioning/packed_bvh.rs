use crate::bounding_volume::{Aabb, BoundingVolume};
use crate::math::{Real, TWO_DIM};
use crate::partitioning::traversal::{self, NodeAddressing};
use crate::partitioning::{
    BvhError, BvhFlags, ImplicitTree, NodeRole, NodeVisit, StaticBvh, TraversalAction,
};
use alloc::vec;
use alloc::vec::Vec;

/// Number of scalars of one node record of a [`PackedBvh`].
pub const PACKED_RECORD_LEN: usize = TWO_DIM;

/// A static BVH stored as one flat array of scalars.
///
/// Every node record is an AABB laid out as `[x0, y0, z0, x1, y1, z1]`. The internal nodes of
/// the complete binary tree padded to the next power of two come first in level order, followed
/// by the real leaves, so the `leaf_id`-th leaf is the node `internal_count + leaf_id`. Children
/// are derived by index arithmetic (see [`ImplicitTree`]) and never stored.
///
/// Padding nodes, i.e., internal nodes without any real leaf below them, are refit to a copy of
/// a neighboring box so they never enlarge their ancestors, and are skipped by traversals.
///
/// # Example
///
/// ```rust
/// # #[cfg(feature = "f32")] {
/// use flatbvh3d::bounding_volume::Aabb;
/// use flatbvh3d::partitioning::{PackedBvh, StaticBvh};
/// use nalgebra::{Point3, Vector3};
///
/// let mut bvh = PackedBvh::new(3).unwrap();
/// bvh.populate_leaves(|i| {
///     Aabb::from_half_extents(Point3::new(i as f32 * 3.0, 0.0, 0.0), Vector3::repeat(1.0))
/// })
/// .unwrap();
/// bvh.refit();
///
/// let root = bvh.root_aabb().unwrap();
/// assert_eq!(root.mins, Point3::new(-1.0, -1.0, -1.0));
/// assert_eq!(root.maxs, Point3::new(7.0, 1.0, 1.0));
/// # }
/// ```
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PackedBvh {
    layout: ImplicitTree,
    data: Vec<Real>,
    bounds: Aabb,
    flags: BvhFlags,
}

impl PackedBvh {
    /// Allocates a tree with `leaf_count` leaves.
    ///
    /// Every box is zeroed and the tree is stale until the first refit.
    pub fn new(leaf_count: usize) -> Result<Self, BvhError> {
        let layout = ImplicitTree::new(leaf_count)?;

        if u32::try_from(leaf_count).is_err() {
            return Err(BvhError::TooManyLeaves { leaf_count });
        }

        log::debug!(
            "Allocating packed BVH: {} leaves, {} internal slots.",
            leaf_count,
            layout.internal_count()
        );

        Ok(Self {
            layout,
            data: vec![0.0; layout.capacity() * PACKED_RECORD_LEN],
            bounds: Aabb::new_invalid(),
            flags: BvhFlags::STALE,
        })
    }

    /// Builds and refits a tree with one leaf per element of `leaves`.
    ///
    /// The `i`-th leaf is associated to the index `i`.
    pub fn from_leaves(leaves: &[Aabb]) -> Result<Self, BvhError> {
        let mut result = Self::new(leaves.len())?;
        result.populate_leaves(|i| leaves[i])?;
        result.refit();
        Ok(result)
    }

    /// The index arithmetic of this tree.
    #[inline]
    pub fn layout(&self) -> &ImplicitTree {
        &self.layout
    }

    /// The number of levels below the root.
    #[inline]
    pub fn depth(&self) -> usize {
        self.layout.depth()
    }

    /// The packed buffer: [`PACKED_RECORD_LEN`] scalars per node, internal nodes first.
    #[inline]
    pub fn as_scalars(&self) -> &[Real] {
        &self.data
    }

    /// The packed buffer seen as raw bytes in native endianness, e.g., for a GPU upload.
    #[cfg(feature = "bytemuck")]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.data)
    }

    #[inline]
    fn read_aabb(&self, node: usize) -> Aabb {
        let offset = ImplicitTree::record_offset(node, PACKED_RECORD_LEN);
        let mut scalars = [0.0; TWO_DIM];
        scalars.copy_from_slice(&self.data[offset..offset + PACKED_RECORD_LEN]);
        Aabb::from_scalars(&scalars)
    }

    #[inline]
    fn write_aabb(&mut self, node: usize, aabb: &Aabb) {
        let offset = ImplicitTree::record_offset(node, PACKED_RECORD_LEN);
        self.data[offset..offset + PACKED_RECORD_LEN].copy_from_slice(&aabb.to_scalars());
    }

    fn check_node(&self, id: usize) -> Result<(), BvhError> {
        if id < self.layout.capacity() && self.layout.is_occupied(id) {
            Ok(())
        } else {
            Err(BvhError::InvalidNode(id))
        }
    }

    fn check_leaf(&self, leaf_id: usize) -> Result<(), BvhError> {
        if leaf_id < self.layout.leaf_count() {
            Ok(())
        } else {
            Err(BvhError::LeafOutOfBounds {
                index: leaf_id,
                leaf_count: self.layout.leaf_count(),
            })
        }
    }

    fn check_queryable(&self) -> Result<(), BvhError> {
        if self.flags.contains(BvhFlags::STALE) {
            Err(BvhError::NotRefitted)
        } else {
            Ok(())
        }
    }
}

impl NodeAddressing for PackedBvh {
    #[inline]
    fn node(&self, id: usize) -> NodeVisit {
        let role = match self.layout.leaf_id(id) {
            Some(leaf_id) => NodeRole::Leaf(leaf_id as u32),
            None => NodeRole::Internal,
        };

        NodeVisit {
            id,
            role,
            aabb: self.read_aabb(id),
        }
    }

    #[inline]
    fn is_leaf(&self, id: usize) -> bool {
        !self.layout.is_internal(id)
    }

    #[inline]
    fn children(&self, id: usize) -> [Option<usize>; 2] {
        let present = |child: usize| {
            (child < self.layout.capacity() && self.layout.is_occupied(child)).then_some(child)
        };
        [ImplicitTree::left_child(id), ImplicitTree::right_child(id)].map(present)
    }
}

impl StaticBvh for PackedBvh {
    #[inline]
    fn leaf_count(&self) -> usize {
        self.layout.leaf_count()
    }

    #[inline]
    fn internal_count(&self) -> usize {
        self.layout.internal_count()
    }

    #[inline]
    fn flags(&self) -> BvhFlags {
        self.flags
    }

    fn set_leaf(&mut self, leaf_id: usize, aabb: &Aabb) -> Result<(), BvhError> {
        if self.flags.contains(BvhFlags::FROZEN) {
            return Err(BvhError::Frozen);
        }

        self.check_leaf(leaf_id)?;

        if !aabb.is_valid() {
            return Err(BvhError::InvalidAabb(leaf_id));
        }

        self.write_aabb(self.layout.leaf_node(leaf_id), aabb);
        self.flags.insert(BvhFlags::STALE);
        Ok(())
    }

    fn leaf_aabb(&self, leaf_id: usize) -> Result<Aabb, BvhError> {
        self.check_leaf(leaf_id)?;
        Ok(self.read_aabb(self.layout.leaf_node(leaf_id)))
    }

    /// Recomputes every internal box, bottom-up.
    ///
    /// On the internal level right above the leaves, a node with two leaves gets their union,
    /// a node with only its left leaf gets a copy of it, and a padding node gets a copy of its
    /// previous sibling. Every level above gets the union of both children. The root box is
    /// then recorded as the tree bounds.
    fn refit(&mut self) {
        let layout = self.layout;

        if let Some(bottom) = layout.bottom_internal_level() {
            for i in bottom.clone() {
                let left = ImplicitTree::left_child(i);
                let right = ImplicitTree::right_child(i);

                let aabb = match (layout.leaf_id(left), layout.leaf_id(right)) {
                    (Some(_), Some(_)) => self.read_aabb(left).merged(&self.read_aabb(right)),
                    (Some(_), None) => self.read_aabb(left),
                    // The first node of the level always has a leaf so `i - 1` exists.
                    _ => self.read_aabb(i - 1),
                };
                self.write_aabb(i, &aabb);
            }

            for i in (0..bottom.start).rev() {
                let left = self.read_aabb(ImplicitTree::left_child(i));
                let right = self.read_aabb(ImplicitTree::right_child(i));
                self.write_aabb(i, &left.merged(&right));
            }
        }

        self.bounds = self.read_aabb(0);
        self.flags.remove(BvhFlags::STALE);
        log::trace!("Refit packed BVH with {} leaves.", layout.leaf_count());
    }

    fn freeze(&mut self) -> Result<(), BvhError> {
        self.check_queryable()?;
        self.flags.insert(BvhFlags::FROZEN);
        Ok(())
    }

    fn root_aabb(&self) -> Result<Aabb, BvhError> {
        self.check_queryable()?;
        Ok(self.bounds)
    }

    fn node(&self, id: usize) -> Result<NodeVisit, BvhError> {
        self.check_node(id)?;
        Ok(NodeAddressing::node(self, id))
    }

    fn node_children(&self, id: usize) -> Result<[Option<usize>; 2], BvhError> {
        self.check_node(id)?;

        if NodeAddressing::is_leaf(self, id) {
            Ok([None, None])
        } else {
            Ok(NodeAddressing::children(self, id))
        }
    }

    fn traverse_from<F>(&self, id: usize, mut visitor: F) -> Result<(), BvhError>
    where
        F: FnMut(&NodeVisit) -> TraversalAction,
    {
        self.check_queryable()?;
        self.check_node(id)?;
        let _ = traversal::traverse_recursive(self, id, &mut visitor);
        Ok(())
    }

    fn traverse_iterative_from<F>(&self, id: usize, mut visitor: F) -> Result<(), BvhError>
    where
        F: FnMut(&NodeVisit) -> TraversalAction,
    {
        self.check_queryable()?;
        self.check_node(id)?;
        let _ = traversal::traverse_with_stack(self, id, &mut visitor);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::{PackedBvh, PACKED_RECORD_LEN};
    use crate::bounding_volume::{Aabb, BoundingVolume};
    use crate::math::{Point, Real, Vector};
    use crate::partitioning::{BvhError, NodeRole, StaticBvh, TraversalAction};

    fn leaf(i: usize) -> Aabb {
        Aabb::from_half_extents(Point::new(i as Real * 4.0, 0.0, 0.0), Vector::repeat(1.0))
    }

    #[test]
    fn buffer_layout() {
        let bvh = PackedBvh::from_leaves(&(0..5).map(leaf).collect::<Vec<_>>()).unwrap();
        assert_eq!(bvh.internal_count(), 7);
        assert_eq!(bvh.capacity(), 12);
        assert_eq!(bvh.as_scalars().len(), 12 * PACKED_RECORD_LEN);

        // Leaves are stored after every internal slot.
        let offset = 7 * PACKED_RECORD_LEN;
        assert_eq!(&bvh.as_scalars()[offset..offset + PACKED_RECORD_LEN], &leaf(0).to_scalars());
    }

    #[test]
    fn refit_bottom_level_cases() {
        // Nodes 3 and 4 have two leaves, 5 only has its left one and 6 is padding.
        let leaves: Vec<_> = (0..5).map(leaf).collect();
        let bvh = PackedBvh::from_leaves(&leaves).unwrap();
        let aabb = |i| StaticBvh::node(&bvh, i).map(|n| n.aabb);

        assert_eq!(aabb(3), Ok(leaves[0].merged(&leaves[1])));
        assert_eq!(aabb(4), Ok(leaves[2].merged(&leaves[3])));
        assert_eq!(aabb(5), Ok(leaves[4]));
        // Padding nodes are not addressable.
        assert_eq!(aabb(6), Err(BvhError::InvalidNode(6)));
        assert_eq!(aabb(2), Ok(leaves[4]));
        assert_eq!(bvh.root_aabb(), Ok(leaves[0].merged(&leaves[4])));
        bvh.assert_well_formed();
    }

    #[test]
    fn single_leaf_root_is_the_leaf() {
        let bvh = PackedBvh::from_leaves(&[leaf(3)]).unwrap();
        assert_eq!(bvh.internal_count(), 0);
        assert_eq!(bvh.root_aabb(), Ok(leaf(3)));

        let mut visited = Vec::new();
        bvh.traverse(|node| {
            visited.push(node.role);
            TraversalAction::Continue
        })
        .unwrap();
        assert_eq!(visited, [NodeRole::Leaf(0)]);
    }

    #[test]
    fn children_skip_padding() {
        let bvh = PackedBvh::from_leaves(&(0..3).map(leaf).collect::<Vec<_>>()).unwrap();
        assert_eq!(bvh.node_children(0), Ok([Some(1), Some(2)]));
        assert_eq!(bvh.node_children(2), Ok([Some(5), None]));
        assert_eq!(bvh.node_children(5), Ok([None, None]));
    }
}
