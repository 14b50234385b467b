//! Little-endian byte records of a [`PointerBvh`](crate::partitioning::PointerBvh).
//!
//! An internal record is the node box (six scalars), the role byte [`ROLE_INTERNAL`], then the
//! byte offsets of the left and right children as `u32`. A leaf record is the node box, the role
//! byte [`ROLE_LEAF`], then the leaf payload as `u32`.

use crate::bounding_volume::Aabb;
use crate::math::{Real, TWO_DIM};
use core::mem::size_of;

/// Size of one scalar, in bytes.
pub const SCALAR_BYTES: usize = size_of::<Real>();
/// Size of the box stored at the start of every record, in bytes.
pub const AABB_BYTES: usize = TWO_DIM * SCALAR_BYTES;
/// Size of an internal node record, in bytes.
pub const INTERNAL_RECORD_SIZE: usize = AABB_BYTES + 1 + 2 * 4;
/// Size of a leaf node record, in bytes.
pub const LEAF_RECORD_SIZE: usize = AABB_BYTES + 1 + 4;

/// Role byte of an internal record.
pub const ROLE_INTERNAL: u8 = 0;
/// Role byte of a leaf record.
pub const ROLE_LEAF: u8 = 1;
/// Child offset marking a missing right child.
pub const ABSENT_CHILD: u32 = u32::MAX;

#[cfg(feature = "f32")]
static_assertions::const_assert_eq!(INTERNAL_RECORD_SIZE, 33);
#[cfg(feature = "f32")]
static_assertions::const_assert_eq!(LEAF_RECORD_SIZE, 29);

const ROLE_OFFSET: usize = AABB_BYTES;
const PAYLOAD_OFFSET: usize = AABB_BYTES + 1;

#[inline]
fn read_array<const N: usize>(bytes: &[u8], offset: usize) -> [u8; N] {
    let mut result = [0; N];
    result.copy_from_slice(&bytes[offset..offset + N]);
    result
}

#[inline]
fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(read_array(bytes, offset))
}

#[inline]
fn write_u32(bytes: &mut [u8], offset: usize, value: u32) {
    bytes[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

/// Reads the box of the record starting at `record`.
pub fn read_aabb(bytes: &[u8], record: usize) -> Aabb {
    let mut scalars = [0.0; TWO_DIM];

    for (i, scalar) in scalars.iter_mut().enumerate() {
        *scalar = Real::from_le_bytes(read_array(bytes, record + i * SCALAR_BYTES));
    }

    Aabb::from_scalars(&scalars)
}

/// Writes the box of the record starting at `record`.
pub fn write_aabb(bytes: &mut [u8], record: usize, aabb: &Aabb) {
    for (i, scalar) in aabb.to_scalars().iter().enumerate() {
        let start = record + i * SCALAR_BYTES;
        bytes[start..start + SCALAR_BYTES].copy_from_slice(&scalar.to_le_bytes());
    }
}

/// The role byte of the record starting at `record`.
#[inline]
pub fn read_role(bytes: &[u8], record: usize) -> u8 {
    bytes[record + ROLE_OFFSET]
}

/// Writes the fields following the box of an internal record.
pub fn write_internal(bytes: &mut [u8], record: usize, left: u32, right: u32) {
    bytes[record + ROLE_OFFSET] = ROLE_INTERNAL;
    write_u32(bytes, record + PAYLOAD_OFFSET, left);
    write_u32(bytes, record + PAYLOAD_OFFSET + 4, right);
}

/// Writes the fields following the box of a leaf record.
pub fn write_leaf(bytes: &mut [u8], record: usize, payload: u32) {
    bytes[record + ROLE_OFFSET] = ROLE_LEAF;
    write_u32(bytes, record + PAYLOAD_OFFSET, payload);
}

/// The raw child offsets of the internal record starting at `record`.
#[inline]
pub fn read_children(bytes: &[u8], record: usize) -> [u32; 2] {
    [
        read_u32(bytes, record + PAYLOAD_OFFSET),
        read_u32(bytes, record + PAYLOAD_OFFSET + 4),
    ]
}

/// The payload of the leaf record starting at `record`.
#[inline]
pub fn read_payload(bytes: &[u8], record: usize) -> u32 {
    read_u32(bytes, record + PAYLOAD_OFFSET)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::math::Point;

    #[test]
    fn record_fields() {
        let aabb = Aabb::new(Point::new(-1.0, -2.0, -3.0), Point::new(1.0, 2.0, 3.0));
        let mut bytes = [0xAB; INTERNAL_RECORD_SIZE + LEAF_RECORD_SIZE];

        write_aabb(&mut bytes, 0, &aabb);
        write_internal(&mut bytes, 0, INTERNAL_RECORD_SIZE as u32, ABSENT_CHILD);
        write_aabb(&mut bytes, INTERNAL_RECORD_SIZE, &aabb);
        write_leaf(&mut bytes, INTERNAL_RECORD_SIZE, 42);

        assert_eq!(read_aabb(&bytes, 0), aabb);
        assert_eq!(read_role(&bytes, 0), ROLE_INTERNAL);
        assert_eq!(read_children(&bytes, 0), [INTERNAL_RECORD_SIZE as u32, ABSENT_CHILD]);
        assert_eq!(read_aabb(&bytes, INTERNAL_RECORD_SIZE), aabb);
        assert_eq!(read_role(&bytes, INTERNAL_RECORD_SIZE), ROLE_LEAF);
        assert_eq!(read_payload(&bytes, INTERNAL_RECORD_SIZE), 42);
    }

    #[cfg(feature = "f32")]
    #[test]
    fn little_endian_layout() {
        let aabb = Aabb::new(Point::new(1.0, 0.0, 0.0), Point::new(2.0, 0.0, 0.0));
        let mut bytes = [0; LEAF_RECORD_SIZE];
        write_aabb(&mut bytes, 0, &aabb);
        write_leaf(&mut bytes, 0, 0x0102_0304);

        assert_eq!(&bytes[0..4], &1.0f32.to_le_bytes());
        assert_eq!(&bytes[12..16], &2.0f32.to_le_bytes());
        assert_eq!(bytes[24], ROLE_LEAF);
        assert_eq!(&bytes[25..29], &[4, 3, 2, 1]);
    }
}
