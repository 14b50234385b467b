use crate::partitioning::BvhError;
use core::ops::Range;

/// Index arithmetic of a complete binary tree with a given number of leaves.
///
/// The tree is padded to `level_leaf_count = leaf_count.next_power_of_two()` leaf slots so it
/// has `internal_count = level_leaf_count - 1` internal nodes. Nodes are numbered in level order
/// starting with the root at `0`, so the children of `i` are `2i + 1` and `2i + 2`. The real
/// leaves occupy the first `leaf_count` slots of the bottom level, i.e., node indices
/// `internal_count..internal_count + leaf_count`.
///
/// A node is *occupied* if its subtree contains at least one real leaf. The occupied nodes of
/// any level always form a prefix of that level.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ImplicitTree {
    leaf_count: usize,
    level_leaf_count: usize,
}

impl ImplicitTree {
    /// Computes the layout of a tree with `leaf_count` leaves.
    pub fn new(leaf_count: usize) -> Result<Self, BvhError> {
        if leaf_count == 0 {
            return Err(BvhError::EmptyTree);
        }

        let level_leaf_count = leaf_count
            .checked_next_power_of_two()
            .ok_or(BvhError::TooManyLeaves { leaf_count })?;

        Ok(Self {
            leaf_count,
            level_leaf_count,
        })
    }

    /// The number of real leaves.
    #[inline]
    pub fn leaf_count(&self) -> usize {
        self.leaf_count
    }

    /// The number of leaf slots of the bottom level, padding included.
    #[inline]
    pub fn level_leaf_count(&self) -> usize {
        self.level_leaf_count
    }

    /// The number of internal nodes, padding included.
    #[inline]
    pub fn internal_count(&self) -> usize {
        self.level_leaf_count - 1
    }

    /// The number of stored nodes: all internal slots followed by the real leaves.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.internal_count() + self.leaf_count
    }

    /// The level of the leaves. The root is at level 0.
    #[inline]
    pub fn depth(&self) -> usize {
        self.level_leaf_count.trailing_zeros() as usize
    }

    /// Index of the left child of the node `i`.
    #[inline]
    pub fn left_child(i: usize) -> usize {
        2 * i + 1
    }

    /// Index of the right child of the node `i`.
    #[inline]
    pub fn right_child(i: usize) -> usize {
        2 * i + 2
    }

    /// Index of the parent of the node `i`, or `None` for the root.
    #[inline]
    pub fn parent(i: usize) -> Option<usize> {
        (i > 0).then(|| (i - 1) / 2)
    }

    /// Storage offset of the node `i` in a buffer of records of `record_len` elements.
    #[inline]
    pub fn record_offset(i: usize, record_len: usize) -> usize {
        i * record_len
    }

    /// The level of the node `i`.
    #[inline]
    pub fn level_of(i: usize) -> usize {
        (usize::BITS - 1 - (i + 1).leading_zeros()) as usize
    }

    /// The node indices of the given level.
    #[inline]
    pub fn level_range(level: usize) -> Range<usize> {
        (1 << level) - 1..(2 << level) - 1
    }

    /// The node indices of the internal level right above the leaves.
    ///
    /// Returns `None` for a single-leaf tree, where the root is the leaf.
    pub fn bottom_internal_level(&self) -> Option<Range<usize>> {
        let depth = self.depth();
        (depth > 0).then(|| Self::level_range(depth - 1))
    }

    /// Is the node `i` one of the internal nodes (padding included)?
    #[inline]
    pub fn is_internal(&self, i: usize) -> bool {
        i < self.internal_count()
    }

    /// The node index of the `leaf_id`-th leaf.
    #[inline]
    pub fn leaf_node(&self, leaf_id: usize) -> usize {
        self.internal_count() + leaf_id
    }

    /// The leaf index of the node `i`, if it is a real leaf.
    #[inline]
    pub fn leaf_id(&self, i: usize) -> Option<usize> {
        (i >= self.internal_count() && i < self.capacity()).then(|| i - self.internal_count())
    }

    /// The number of leaf slots covered by a single node of the given level.
    #[inline]
    pub fn span(&self, level: usize) -> usize {
        self.level_leaf_count >> level
    }

    /// The number of occupied nodes of the given level.
    pub fn occupied_in_level(&self, level: usize) -> usize {
        if level > self.depth() {
            0
        } else {
            self.leaf_count.div_ceil(self.span(level))
        }
    }

    /// Does the subtree rooted at the node `i` contain at least one real leaf?
    pub fn is_occupied(&self, i: usize) -> bool {
        let level = Self::level_of(i);
        let rank = i - Self::level_range(level).start;
        rank < self.occupied_in_level(level)
    }
}

#[cfg(test)]
mod test {
    use super::ImplicitTree;
    use crate::partitioning::BvhError;

    #[test]
    fn layout_sizes() {
        assert_eq!(ImplicitTree::new(0), Err(BvhError::EmptyTree));

        let expected = [(1, 1, 0, 0), (2, 2, 1, 1), (3, 4, 3, 2), (5, 8, 7, 3), (8, 8, 7, 3)];
        for (leaf_count, level_leaf_count, internal_count, depth) in expected {
            let tree = ImplicitTree::new(leaf_count).unwrap();
            assert_eq!(tree.level_leaf_count(), level_leaf_count);
            assert_eq!(tree.internal_count(), internal_count);
            assert_eq!(tree.capacity(), internal_count + leaf_count);
            assert_eq!(tree.depth(), depth);
        }
    }

    #[test]
    fn addressing() {
        assert_eq!(ImplicitTree::left_child(0), 1);
        assert_eq!(ImplicitTree::right_child(0), 2);
        assert_eq!(ImplicitTree::left_child(3), 7);
        assert_eq!(ImplicitTree::parent(0), None);
        assert_eq!(ImplicitTree::parent(7), Some(3));
        assert_eq!(ImplicitTree::parent(8), Some(3));
        assert_eq!(ImplicitTree::record_offset(3, 6), 18);

        assert_eq!(ImplicitTree::level_of(0), 0);
        assert_eq!(ImplicitTree::level_of(2), 1);
        assert_eq!(ImplicitTree::level_of(3), 2);
        assert_eq!(ImplicitTree::level_of(6), 2);
        assert_eq!(ImplicitTree::level_of(7), 3);
        assert_eq!(ImplicitTree::level_range(2), 3..7);
    }

    #[test]
    fn leaves_and_levels() {
        let tree = ImplicitTree::new(5).unwrap();
        assert_eq!(tree.bottom_internal_level(), Some(3..7));
        assert_eq!(tree.leaf_node(0), 7);
        assert_eq!(tree.leaf_id(11), Some(4));
        assert_eq!(tree.leaf_id(12), None);
        assert_eq!(tree.leaf_id(6), None);
        assert!(ImplicitTree::new(1).unwrap().bottom_internal_level().is_none());
    }

    #[test]
    fn occupancy() {
        let tree = ImplicitTree::new(5).unwrap();
        assert_eq!(tree.occupied_in_level(0), 1);
        assert_eq!(tree.occupied_in_level(1), 2);
        assert_eq!(tree.occupied_in_level(2), 3);
        assert_eq!(tree.occupied_in_level(3), 5);
        assert_eq!(tree.occupied_in_level(4), 0);

        let occupied: Vec<_> = (0..15).filter(|i| tree.is_occupied(*i)).collect();
        assert_eq!(occupied, [0, 1, 2, 3, 4, 5, 7, 8, 9, 10, 11]);
    }
}
