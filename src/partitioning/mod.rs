//! Spatial partitioning tools.

pub use self::aabb_leaves::AabbLeafQuery;
pub use self::bvh_error::{BvhError, BvhErrorKind};
pub use self::implicit_tree::ImplicitTree;
pub use self::packed_bvh::{PackedBvh, PACKED_RECORD_LEN};
pub use self::pointer_bvh::PointerBvh;
pub use self::ray_leaves::RayLeafQuery;
pub use self::static_bvh::{Bvh, BvhEncoding, BvhFlags, StaticBvh};
pub use self::traversal::{NodeRole, NodeVisit, TraversalAction, TRAVERSAL_STACK_SIZE};

mod aabb_leaves;
mod bvh_error;
mod implicit_tree;
mod packed_bvh;
mod pointer_bvh;
pub mod pointer_bvh_records;
mod ray_leaves;
mod static_bvh;
mod traversal;
pub mod validation;
