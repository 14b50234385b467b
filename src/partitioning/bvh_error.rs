/// Broad category of a [`BvhError`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BvhErrorKind {
    /// An argument was out of its valid range, or a byte buffer did not describe a valid tree.
    InvalidArgument,
    /// The tree was not in a state allowing the operation (stale boxes, frozen tree).
    PreconditionViolation,
    /// The tree cannot be serialized with its current scalar type.
    UnsupportedEncoding,
}

/// Errors reported by the trees of this crate.
///
/// Every error is local and synchronous: the failing operation has no effect on the tree.
#[derive(thiserror::Error, Copy, Clone, Debug, PartialEq, Eq)]
pub enum BvhError {
    /// A tree needs at least one leaf.
    #[error("a BVH must contain at least one leaf")]
    EmptyTree,
    /// The leaf index is not smaller than the tree leaf count.
    #[error("leaf index {index} is out of bounds for a tree with {leaf_count} leaves")]
    LeafOutOfBounds {
        /// The rejected leaf index.
        index: usize,
        /// The number of leaves of the tree.
        leaf_count: usize,
    },
    /// The box given for a leaf has a `mins` coordinate greater than its `maxs` counterpart, or
    /// a NaN coordinate.
    #[error("the box given for leaf {0} is inverted or contains NaN")]
    InvalidAabb(usize),
    /// The node identifier does not address any node of the tree.
    #[error("{0} does not identify a node of this tree")]
    InvalidNode(usize),
    /// Leaf payloads or node byte offsets would not fit in 32 bits.
    #[error("{leaf_count} leaves exceed the addressable size of the tree")]
    TooManyLeaves {
        /// The rejected leaf count.
        leaf_count: usize,
    },
    /// A serialized tree does not have the size implied by its leaf count.
    #[error("expected {expected} bytes for the serialized tree, found {found}")]
    ByteLengthMismatch {
        /// The number of bytes implied by the leaf count.
        expected: usize,
        /// The number of bytes provided.
        found: usize,
    },
    /// A record of a serialized tree is inconsistent.
    #[error("malformed node record at byte offset {offset}: {reason}")]
    MalformedRecord {
        /// Byte offset of the faulty record.
        offset: usize,
        /// What is wrong with the record.
        reason: &'static str,
    },
    /// A leaf was written since the last refit, so internal boxes are stale.
    #[error("the tree must be refit before being queried")]
    NotRefitted,
    /// The tree was frozen and its leaves can no longer be written.
    #[error("the tree is frozen and cannot be modified")]
    Frozen,
    /// Only trees with 4-bytes scalars have a serialized form.
    #[error("trees with {scalar_bytes}-bytes scalars have no serialized form")]
    UnsupportedEncoding {
        /// Size of the scalar type of the tree.
        scalar_bytes: usize,
    },
}

impl BvhError {
    /// The broad category of this error.
    pub fn kind(&self) -> BvhErrorKind {
        match self {
            Self::EmptyTree
            | Self::LeafOutOfBounds { .. }
            | Self::InvalidAabb(_)
            | Self::InvalidNode(_)
            | Self::TooManyLeaves { .. }
            | Self::ByteLengthMismatch { .. }
            | Self::MalformedRecord { .. } => BvhErrorKind::InvalidArgument,
            Self::NotRefitted | Self::Frozen => BvhErrorKind::PreconditionViolation,
            Self::UnsupportedEncoding { .. } => BvhErrorKind::UnsupportedEncoding,
        }
    }
}
