use crate::bounding_volume::Aabb;
use crate::partitioning::{
    AabbLeafQuery, BvhError, NodeVisit, PackedBvh, PointerBvh, RayLeafQuery, TraversalAction,
};
use crate::query::Ray;
use alloc::vec::Vec;

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
/// Lifecycle state of a tree.
pub struct BvhFlags(u8);

bitflags::bitflags! {
    impl BvhFlags: u8 {
        /// A leaf was written since the last refit: internal boxes can't be trusted.
        const STALE = 1;
        /// The tree is read-only: leaves can no longer be written.
        const FROZEN = 1 << 1;
    }
}

/// The node encoding of a [`Bvh`].
#[derive(Default, Clone, Debug, Copy, PartialEq, Eq)]
pub enum BvhEncoding {
    /// Flat scalar array with implicit child addressing, see [`PackedBvh`].
    #[default]
    Packed,
    /// Byte records with explicit child offsets, see [`PointerBvh`].
    Pointer,
}

/// The contract shared by every static bounding volume hierarchy of this crate.
///
/// A tree is created for a fixed number of leaves, its leaf boxes are written, then
/// [`StaticBvh::refit`] computes every internal box bottom-up. Queries are rejected with
/// [`BvhError::NotRefitted`] while a leaf was written since the last refit.
///
/// Node identifiers given to visitors are only meaningful for the tree that produced them.
pub trait StaticBvh {
    /// The number of leaves of this tree.
    fn leaf_count(&self) -> usize;

    /// The number of internal nodes stored by this tree.
    fn internal_count(&self) -> usize;

    /// The total number of nodes stored by this tree.
    fn capacity(&self) -> usize {
        self.internal_count() + self.leaf_count()
    }

    /// The lifecycle flags of this tree.
    fn flags(&self) -> BvhFlags;

    /// Writes the box of the `leaf_id`-th leaf.
    ///
    /// This marks the tree as stale until the next [`StaticBvh::refit`].
    fn set_leaf(&mut self, leaf_id: usize, aabb: &Aabb) -> Result<(), BvhError>;

    /// The box currently stored for the `leaf_id`-th leaf.
    fn leaf_aabb(&self, leaf_id: usize) -> Result<Aabb, BvhError>;

    /// Recomputes every internal box from the leaf boxes.
    fn refit(&mut self);

    /// Marks this tree as read-only.
    ///
    /// Fails with [`BvhError::NotRefitted`] if the tree is stale, since a frozen stale tree
    /// could never be queried.
    fn freeze(&mut self) -> Result<(), BvhError>;

    /// The box bounding every leaf of this tree.
    fn root_aabb(&self) -> Result<Aabb, BvhError>;

    /// The snapshot of the node identified by `id`.
    fn node(&self, id: usize) -> Result<NodeVisit, BvhError>;

    /// The children of the node identified by `id`, absent ones (and those of leaves) being
    /// `None`.
    fn node_children(&self, id: usize) -> Result<[Option<usize>; 2], BvhError>;

    /// Depth-first pre-order traversal of the subtree rooted at `id`, recursing on the call
    /// stack.
    ///
    /// Left subtrees are visited before right subtrees. Returning
    /// [`TraversalAction::Prune`] skips the descendants of the visited node, and
    /// [`TraversalAction::EarlyExit`] stops the whole traversal.
    fn traverse_from<F>(&self, id: usize, visitor: F) -> Result<(), BvhError>
    where
        F: FnMut(&NodeVisit) -> TraversalAction;

    /// Same as [`StaticBvh::traverse_from`] but using an explicit stack, bounding the call-stack
    /// depth regardless of the tree size.
    fn traverse_iterative_from<F>(&self, id: usize, visitor: F) -> Result<(), BvhError>
    where
        F: FnMut(&NodeVisit) -> TraversalAction;

    /// Is a leaf written since the last refit?
    fn is_stale(&self) -> bool {
        self.flags().contains(BvhFlags::STALE)
    }

    /// Is this tree read-only?
    fn is_frozen(&self) -> bool {
        self.flags().contains(BvhFlags::FROZEN)
    }

    /// Writes every leaf box, calling `generator` once per leaf index in increasing order.
    fn populate_leaves<G>(&mut self, mut generator: G) -> Result<(), BvhError>
    where
        G: FnMut(usize) -> Aabb,
    {
        for leaf_id in 0..self.leaf_count() {
            self.set_leaf(leaf_id, &generator(leaf_id))?;
        }

        Ok(())
    }

    /// Depth-first pre-order traversal of the whole tree.
    ///
    /// See [`StaticBvh::traverse_from`].
    fn traverse<F>(&self, visitor: F) -> Result<(), BvhError>
    where
        F: FnMut(&NodeVisit) -> TraversalAction,
    {
        self.traverse_from(0, visitor)
    }

    /// Depth-first pre-order traversal of the whole tree with an explicit stack.
    ///
    /// See [`StaticBvh::traverse_iterative_from`].
    fn traverse_iterative<F>(&self, visitor: F) -> Result<(), BvhError>
    where
        F: FnMut(&NodeVisit) -> TraversalAction,
    {
        self.traverse_iterative_from(0, visitor)
    }

    /// Reports the index of every leaf whose box is touched by `ray`.
    ///
    /// Leaves are reported in depth-first order, left subtrees first. This is not sorted by
    /// distance along the ray: callers looking for the closest hit must compare every reported
    /// leaf themselves.
    fn cast_ray_leaves<F>(&self, ray: &Ray, mut on_leaf_hit: F) -> Result<(), BvhError>
    where
        F: FnMut(u32),
    {
        let query = RayLeafQuery::new(ray);
        self.traverse_iterative(|node| query.visit(node, &mut on_leaf_hit))
    }

    /// Collects the index of every leaf whose box is touched by `ray`.
    ///
    /// See [`StaticBvh::cast_ray_leaves`].
    fn leaves_hit_by_ray(&self, ray: &Ray) -> Result<Vec<u32>, BvhError> {
        let mut hits = Vec::new();
        self.cast_ray_leaves(ray, |leaf| hits.push(leaf))?;
        Ok(hits)
    }

    /// Reports the index of every leaf whose box intersects `aabb`.
    fn intersect_aabb<F>(&self, aabb: &Aabb, mut on_leaf: F) -> Result<(), BvhError>
    where
        F: FnMut(u32),
    {
        let query = AabbLeafQuery::new(aabb);
        self.traverse_iterative(|node| query.visit(node, &mut on_leaf))
    }
}

/// A static bounding volume hierarchy with its encoding chosen at construction time.
///
/// # Example
///
/// ```rust
/// # #[cfg(feature = "f32")] {
/// use flatbvh3d::bounding_volume::Aabb;
/// use flatbvh3d::partitioning::{Bvh, BvhEncoding, StaticBvh};
/// use flatbvh3d::query::Ray;
/// use nalgebra::{Point3, Vector3};
///
/// let leaves = [
///     Aabb::new(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0)),
///     Aabb::new(Point3::new(5.0, 5.0, 5.0), Point3::new(6.0, 6.0, 6.0)),
/// ];
///
/// for encoding in [BvhEncoding::Packed, BvhEncoding::Pointer] {
///     let bvh = Bvh::from_leaves(encoding, &leaves).unwrap();
///     assert_eq!(bvh.root_aabb().unwrap().maxs, Point3::new(6.0, 6.0, 6.0));
///
///     let ray = Ray::new(Point3::new(5.5, 5.5, -10.0), Vector3::z());
///     assert_eq!(bvh.leaves_hit_by_ray(&ray).unwrap(), [1]);
/// }
/// # }
/// ```
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Bvh {
    /// A tree stored with the packed encoding.
    Packed(PackedBvh),
    /// A tree stored with the pointer encoding.
    Pointer(PointerBvh),
}

impl Bvh {
    /// Allocates a tree with `leaf_count` leaves using the given encoding.
    ///
    /// Every leaf box is zeroed and the tree is stale until the first refit.
    pub fn new(encoding: BvhEncoding, leaf_count: usize) -> Result<Self, BvhError> {
        match encoding {
            BvhEncoding::Packed => PackedBvh::new(leaf_count).map(Self::Packed),
            BvhEncoding::Pointer => PointerBvh::new(leaf_count).map(Self::Pointer),
        }
    }

    /// Builds and refits a tree with one leaf per element of `leaves`.
    ///
    /// The `i`-th leaf is associated to the index `i`.
    pub fn from_leaves(encoding: BvhEncoding, leaves: &[Aabb]) -> Result<Self, BvhError> {
        match encoding {
            BvhEncoding::Packed => PackedBvh::from_leaves(leaves).map(Self::Packed),
            BvhEncoding::Pointer => PointerBvh::from_leaves(leaves).map(Self::Pointer),
        }
    }

    /// The encoding of this tree.
    pub fn encoding(&self) -> BvhEncoding {
        match self {
            Self::Packed(_) => BvhEncoding::Packed,
            Self::Pointer(_) => BvhEncoding::Pointer,
        }
    }
}

impl StaticBvh for Bvh {
    fn leaf_count(&self) -> usize {
        match self {
            Self::Packed(bvh) => bvh.leaf_count(),
            Self::Pointer(bvh) => bvh.leaf_count(),
        }
    }

    fn internal_count(&self) -> usize {
        match self {
            Self::Packed(bvh) => bvh.internal_count(),
            Self::Pointer(bvh) => bvh.internal_count(),
        }
    }

    fn flags(&self) -> BvhFlags {
        match self {
            Self::Packed(bvh) => bvh.flags(),
            Self::Pointer(bvh) => bvh.flags(),
        }
    }

    fn set_leaf(&mut self, leaf_id: usize, aabb: &Aabb) -> Result<(), BvhError> {
        match self {
            Self::Packed(bvh) => bvh.set_leaf(leaf_id, aabb),
            Self::Pointer(bvh) => bvh.set_leaf(leaf_id, aabb),
        }
    }

    fn leaf_aabb(&self, leaf_id: usize) -> Result<Aabb, BvhError> {
        match self {
            Self::Packed(bvh) => bvh.leaf_aabb(leaf_id),
            Self::Pointer(bvh) => bvh.leaf_aabb(leaf_id),
        }
    }

    fn refit(&mut self) {
        match self {
            Self::Packed(bvh) => bvh.refit(),
            Self::Pointer(bvh) => bvh.refit(),
        }
    }

    fn freeze(&mut self) -> Result<(), BvhError> {
        match self {
            Self::Packed(bvh) => bvh.freeze(),
            Self::Pointer(bvh) => bvh.freeze(),
        }
    }

    fn root_aabb(&self) -> Result<Aabb, BvhError> {
        match self {
            Self::Packed(bvh) => bvh.root_aabb(),
            Self::Pointer(bvh) => bvh.root_aabb(),
        }
    }

    fn node(&self, id: usize) -> Result<NodeVisit, BvhError> {
        match self {
            Self::Packed(bvh) => bvh.node(id),
            Self::Pointer(bvh) => bvh.node(id),
        }
    }

    fn node_children(&self, id: usize) -> Result<[Option<usize>; 2], BvhError> {
        match self {
            Self::Packed(bvh) => bvh.node_children(id),
            Self::Pointer(bvh) => bvh.node_children(id),
        }
    }

    fn traverse_from<F>(&self, id: usize, visitor: F) -> Result<(), BvhError>
    where
        F: FnMut(&NodeVisit) -> TraversalAction,
    {
        match self {
            Self::Packed(bvh) => bvh.traverse_from(id, visitor),
            Self::Pointer(bvh) => bvh.traverse_from(id, visitor),
        }
    }

    fn traverse_iterative_from<F>(&self, id: usize, visitor: F) -> Result<(), BvhError>
    where
        F: FnMut(&NodeVisit) -> TraversalAction,
    {
        match self {
            Self::Packed(bvh) => bvh.traverse_iterative_from(id, visitor),
            Self::Pointer(bvh) => bvh.traverse_iterative_from(id, visitor),
        }
    }
}
