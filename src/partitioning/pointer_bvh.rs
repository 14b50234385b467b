use crate::bounding_volume::{Aabb, BoundingVolume};
use crate::partitioning::pointer_bvh_records::{
    self as records, ABSENT_CHILD, INTERNAL_RECORD_SIZE, LEAF_RECORD_SIZE, ROLE_INTERNAL,
    ROLE_LEAF, SCALAR_BYTES,
};
use crate::partitioning::traversal::{self, NodeAddressing};
use crate::partitioning::{
    BvhError, BvhFlags, ImplicitTree, NodeRole, NodeVisit, StaticBvh, TraversalAction,
};
use alloc::vec;
use alloc::vec::Vec;

/// A static BVH stored as byte records with explicit child offsets.
///
/// Only the occupied internal nodes of the implicit complete tree are stored, in level order,
/// followed by one record per leaf. Every internal record stores the byte offsets of its
/// children (leaf children included) and the right child may be absent. The record formats are
/// described in [`pointer_bvh_records`](crate::partitioning::pointer_bvh_records).
///
/// Node identifiers of this tree are record byte offsets, the root being at offset `0`.
///
/// # Example
///
/// ```rust
/// # #[cfg(feature = "f32")] {
/// use flatbvh3d::bounding_volume::Aabb;
/// use flatbvh3d::partitioning::{PointerBvh, StaticBvh};
/// use nalgebra::Point3;
///
/// let leaves = [
///     Aabb::new(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0)),
///     Aabb::new(Point3::new(5.0, 5.0, 5.0), Point3::new(6.0, 6.0, 6.0)),
/// ];
/// let bvh = PointerBvh::from_leaves(&leaves).unwrap();
///
/// // One internal record followed by two leaf records.
/// assert_eq!(bvh.as_bytes().len(), 33 + 2 * 29);
///
/// let loaded = PointerBvh::from_bytes(2, &bvh.to_bytes().unwrap()).unwrap();
/// assert_eq!(loaded.root_aabb(), bvh.root_aabb());
/// # }
/// ```
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PointerBvh {
    leaf_count: usize,
    internal_count: usize,
    bytes: Vec<u8>,
    bounds: Aabb,
    flags: BvhFlags,
}

/// Number of internal records and total byte size of a tree with the given layout.
fn record_counts(layout: &ImplicitTree) -> Result<(usize, usize), BvhError> {
    let leaf_count = layout.leaf_count();
    let internal_count: usize = (0..layout.depth())
        .map(|level| layout.occupied_in_level(level))
        .sum();

    let too_many = BvhError::TooManyLeaves { leaf_count };
    let total = internal_count
        .checked_mul(INTERNAL_RECORD_SIZE)
        .and_then(|internal| {
            leaf_count
                .checked_mul(LEAF_RECORD_SIZE)
                .and_then(|leaves| internal.checked_add(leaves))
        })
        .ok_or(too_many)?;

    // Every offset must fit in 32 bits without ever colliding with the absent sentinel.
    if total > ABSENT_CHILD as usize {
        return Err(too_many);
    }

    Ok((internal_count, total))
}

impl PointerBvh {
    /// Allocates a tree with `leaf_count` leaves and writes its topology.
    ///
    /// Every box is zeroed and the tree is stale until the first refit. The `i`-th leaf record
    /// carries the payload `i`.
    pub fn new(leaf_count: usize) -> Result<Self, BvhError> {
        let layout = ImplicitTree::new(leaf_count)?;
        let (internal_count, total) = record_counts(&layout)?;
        let leaf_start = internal_count * INTERNAL_RECORD_SIZE;
        let depth = layout.depth();

        log::debug!(
            "Allocating pointer BVH: {} leaves, {} internal records, {} bytes.",
            leaf_count,
            internal_count,
            total
        );

        let mut bytes = vec![0; total];
        let mut level_start = 0;

        for level in 0..depth {
            let occupied = layout.occupied_in_level(level);
            let next_start = level_start + occupied;
            let next_occupied = layout.occupied_in_level(level + 1);

            let child_offset = |rank: usize| {
                if level + 1 == depth {
                    leaf_start + rank * LEAF_RECORD_SIZE
                } else {
                    (next_start + rank) * INTERNAL_RECORD_SIZE
                }
            };

            for rank in 0..occupied {
                // Offsets were checked to fit in 32 bits by `record_counts`.
                let left = child_offset(2 * rank) as u32;
                let right = if 2 * rank + 1 < next_occupied {
                    child_offset(2 * rank + 1) as u32
                } else {
                    ABSENT_CHILD
                };

                records::write_internal(
                    &mut bytes,
                    (level_start + rank) * INTERNAL_RECORD_SIZE,
                    left,
                    right,
                );
            }

            level_start = next_start;
        }

        for leaf_id in 0..leaf_count {
            records::write_leaf(
                &mut bytes,
                leaf_start + leaf_id * LEAF_RECORD_SIZE,
                leaf_id as u32,
            );
        }

        Ok(Self {
            leaf_count,
            internal_count,
            bytes,
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

    /// Loads a tree from its serialized form, as produced by [`PointerBvh::to_bytes`].
    ///
    /// The records are validated and the loaded tree is refit, so it can be queried right away.
    /// The buffer must hold as many internal records as a tree built with `leaf_count` leaves,
    /// but its topology may differ as long as every child is stored after its parent.
    pub fn from_bytes(leaf_count: usize, bytes: &[u8]) -> Result<Self, BvhError> {
        if SCALAR_BYTES != 4 {
            return Err(BvhError::UnsupportedEncoding {
                scalar_bytes: SCALAR_BYTES,
            });
        }

        let layout = ImplicitTree::new(leaf_count)?;
        let (internal_count, total) = record_counts(&layout)?;

        if bytes.len() != total {
            return Err(BvhError::ByteLengthMismatch {
                expected: total,
                found: bytes.len(),
            });
        }

        let mut result = Self {
            leaf_count,
            internal_count,
            bytes: bytes.to_vec(),
            bounds: Aabb::new_invalid(),
            flags: BvhFlags::STALE,
        };
        result.validate_records()?;
        result.refit();

        log::debug!(
            "Loaded pointer BVH: {} leaves, {} internal records.",
            leaf_count,
            internal_count
        );

        Ok(result)
    }

    /// The serialized form of this tree: the record buffer, little endian.
    ///
    /// Only trees with `f32` scalars can be serialized.
    pub fn to_bytes(&self) -> Result<Vec<u8>, BvhError> {
        if SCALAR_BYTES != 4 {
            return Err(BvhError::UnsupportedEncoding {
                scalar_bytes: SCALAR_BYTES,
            });
        }

        if self.is_stale() {
            return Err(BvhError::NotRefitted);
        }

        Ok(self.bytes.clone())
    }

    /// The record buffer of this tree.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The identifier (byte offset) of the record of the `leaf_id`-th leaf.
    ///
    /// Leaves are numbered in storage order. For trees built by this crate, this is also the
    /// payload of the leaf.
    pub fn leaf_node_id(&self, leaf_id: usize) -> Result<usize, BvhError> {
        self.check_leaf(leaf_id)?;
        Ok(self.leaf_start() + leaf_id * LEAF_RECORD_SIZE)
    }

    #[inline]
    fn leaf_start(&self) -> usize {
        self.internal_count * INTERNAL_RECORD_SIZE
    }

    #[inline]
    fn is_record_start(&self, offset: usize) -> bool {
        let leaf_start = self.leaf_start();

        if offset < leaf_start {
            offset % INTERNAL_RECORD_SIZE == 0
        } else {
            offset < self.bytes.len() && (offset - leaf_start) % LEAF_RECORD_SIZE == 0
        }
    }

    fn check_node(&self, id: usize) -> Result<(), BvhError> {
        if self.is_record_start(id) {
            Ok(())
        } else {
            Err(BvhError::InvalidNode(id))
        }
    }

    fn check_leaf(&self, leaf_id: usize) -> Result<(), BvhError> {
        if leaf_id < self.leaf_count {
            Ok(())
        } else {
            Err(BvhError::LeafOutOfBounds {
                index: leaf_id,
                leaf_count: self.leaf_count,
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

    /// Checks every record of a buffer that was not written by [`PointerBvh::new`].
    fn validate_records(&self) -> Result<(), BvhError> {
        let leaf_start = self.leaf_start();
        let mut referenced = vec![false; self.internal_count + self.leaf_count];
        let mut payload_seen = vec![false; self.leaf_count];
        let record_index = |offset: usize| {
            if offset < leaf_start {
                offset / INTERNAL_RECORD_SIZE
            } else {
                self.internal_count + (offset - leaf_start) / LEAF_RECORD_SIZE
            }
        };

        for offset in (0..leaf_start).step_by(INTERNAL_RECORD_SIZE) {
            let malformed = |reason| BvhError::MalformedRecord { offset, reason };

            if records::read_role(&self.bytes, offset) != ROLE_INTERNAL {
                return Err(malformed("expected an internal node role"));
            }

            let [left, right] = records::read_children(&self.bytes, offset);

            if left == ABSENT_CHILD {
                return Err(malformed("internal node without left child"));
            }

            for child in [left, right] {
                if child == ABSENT_CHILD {
                    continue;
                }

                let child = child as usize;

                if child <= offset {
                    return Err(malformed("child offset does not point forward"));
                }

                if !self.is_record_start(child) {
                    return Err(malformed("child offset is not the start of a record"));
                }

                let seen = &mut referenced[record_index(child)];

                if *seen {
                    return Err(malformed("record referenced by several parents"));
                }

                *seen = true;
            }
        }

        for offset in (leaf_start..self.bytes.len()).step_by(LEAF_RECORD_SIZE) {
            let malformed = |reason| BvhError::MalformedRecord { offset, reason };

            if records::read_role(&self.bytes, offset) != ROLE_LEAF {
                return Err(malformed("expected a leaf node role"));
            }

            let payload = records::read_payload(&self.bytes, offset) as usize;

            match payload_seen.get_mut(payload) {
                None => return Err(malformed("leaf payload out of bounds")),
                Some(true) => return Err(malformed("leaf payload used by several leaves")),
                Some(seen) => *seen = true,
            }

            if !records::read_aabb(&self.bytes, offset).is_valid() {
                return Err(malformed("leaf box is inverted or contains NaN"));
            }
        }

        // The root is the only record without parent.
        if let Some(orphan) = referenced.iter().skip(1).position(|seen| !seen) {
            let index = orphan + 1;
            let offset = if index < self.internal_count {
                index * INTERNAL_RECORD_SIZE
            } else {
                leaf_start + (index - self.internal_count) * LEAF_RECORD_SIZE
            };

            return Err(BvhError::MalformedRecord {
                offset,
                reason: "record unreachable from the root",
            });
        }

        Ok(())
    }
}

impl NodeAddressing for PointerBvh {
    #[inline]
    fn node(&self, id: usize) -> NodeVisit {
        let role = if records::read_role(&self.bytes, id) == ROLE_LEAF {
            NodeRole::Leaf(records::read_payload(&self.bytes, id))
        } else {
            NodeRole::Internal
        };

        NodeVisit {
            id,
            role,
            aabb: records::read_aabb(&self.bytes, id),
        }
    }

    #[inline]
    fn is_leaf(&self, id: usize) -> bool {
        id >= self.leaf_start()
    }

    #[inline]
    fn children(&self, id: usize) -> [Option<usize>; 2] {
        records::read_children(&self.bytes, id)
            .map(|child| (child != ABSENT_CHILD).then_some(child as usize))
    }
}

impl StaticBvh for PointerBvh {
    #[inline]
    fn leaf_count(&self) -> usize {
        self.leaf_count
    }

    #[inline]
    fn internal_count(&self) -> usize {
        self.internal_count
    }

    #[inline]
    fn flags(&self) -> BvhFlags {
        self.flags
    }

    fn set_leaf(&mut self, leaf_id: usize, aabb: &Aabb) -> Result<(), BvhError> {
        if self.flags.contains(BvhFlags::FROZEN) {
            return Err(BvhError::Frozen);
        }

        let record = self.leaf_node_id(leaf_id)?;

        if !aabb.is_valid() {
            return Err(BvhError::InvalidAabb(leaf_id));
        }

        records::write_aabb(&mut self.bytes, record, aabb);
        self.flags.insert(BvhFlags::STALE);
        Ok(())
    }

    fn leaf_aabb(&self, leaf_id: usize) -> Result<Aabb, BvhError> {
        let record = self.leaf_node_id(leaf_id)?;
        Ok(records::read_aabb(&self.bytes, record))
    }

    /// Recomputes every internal box, walking internal records in reverse storage order.
    ///
    /// Children are always stored after their parent so they are up to date when their parent
    /// is reached. A node without right child gets a copy of its left child box.
    fn refit(&mut self) {
        for record in (0..self.internal_count).rev() {
            let offset = record * INTERNAL_RECORD_SIZE;
            let [left, right] = NodeAddressing::children(self, offset);
            let mut aabb = left
                .map(|left| records::read_aabb(&self.bytes, left))
                .unwrap_or_else(Aabb::new_invalid);

            if let Some(right) = right {
                aabb.merge(&records::read_aabb(&self.bytes, right));
            }

            records::write_aabb(&mut self.bytes, offset, &aabb);
        }

        self.bounds = records::read_aabb(&self.bytes, 0);
        self.flags.remove(BvhFlags::STALE);
        log::trace!("Refit pointer BVH with {} leaves.", self.leaf_count);
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
