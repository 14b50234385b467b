use flatbvh3d::bounding_volume::Aabb;
use flatbvh3d::partitioning::pointer_bvh_records::{INTERNAL_RECORD_SIZE, LEAF_RECORD_SIZE};
use flatbvh3d::partitioning::{BvhError, BvhErrorKind, PointerBvh, StaticBvh};
use flatbvh3d::query::Ray;
use nalgebra::{Point3, Vector3};

fn leaves(n: usize) -> Vec<Aabb> {
    let mut rng = oorandom::Rand32::new(n as u64);
    (0..n)
        .map(|_| {
            let center = Point3::new(
                rng.rand_float() * 20.0,
                rng.rand_float() * 20.0,
                rng.rand_float() * 20.0,
            );
            Aabb::from_half_extents(center, Vector3::new(0.5, 1.0, 0.25))
        })
        .collect()
}

#[test]
fn record_strides() {
    assert_eq!(INTERNAL_RECORD_SIZE, 33);
    assert_eq!(LEAF_RECORD_SIZE, 29);

    // Occupied internal nodes for 5 leaves: 1 + 2 + 3.
    let bvh = PointerBvh::new(5).unwrap();
    assert_eq!(bvh.as_bytes().len(), 6 * 33 + 5 * 29);
}

#[test]
fn saved_tree_answers_the_same_queries() {
    for n in [1, 2, 3, 8, 13, 40] {
        let leaves = leaves(n);
        let original = PointerBvh::from_leaves(&leaves).unwrap();
        let loaded = PointerBvh::from_bytes(n, &original.to_bytes().unwrap()).unwrap();

        loaded.assert_well_formed();
        assert_eq!(loaded.as_bytes(), original.as_bytes());

        for i in 0..n {
            assert_eq!(loaded.leaf_aabb(i), Ok(leaves[i]));
        }

        let ray = Ray::new(Point3::new(-5.0, 10.0, 10.0), Vector3::new(1.0, 0.01, -0.02));
        assert_eq!(
            loaded.leaves_hit_by_ray(&ray),
            original.leaves_hit_by_ray(&ray)
        );
    }
}

#[test]
fn corrupted_buffers_are_rejected() {
    let bytes = PointerBvh::from_leaves(&leaves(6)).unwrap().to_bytes().unwrap();

    let err = PointerBvh::from_bytes(7, &bytes).unwrap_err();
    assert!(matches!(err, BvhError::ByteLengthMismatch { .. }));
    assert_eq!(err.kind(), BvhErrorKind::InvalidArgument);

    // Flip the role byte of the first leaf record.
    let mut corrupted = bytes.clone();
    let first_leaf = bytes.len() - 6 * LEAF_RECORD_SIZE;
    corrupted[first_leaf + 24] = 0;
    assert_eq!(
        PointerBvh::from_bytes(6, &corrupted).unwrap_err(),
        BvhError::MalformedRecord {
            offset: first_leaf,
            reason: "expected a leaf node role"
        }
    );

    // Inverted leaf box.
    let mut corrupted = bytes;
    corrupted[first_leaf..first_leaf + 4].copy_from_slice(&100.0f32.to_le_bytes());
    assert!(matches!(
        PointerBvh::from_bytes(6, &corrupted),
        Err(BvhError::MalformedRecord { offset, .. }) if offset == first_leaf
    ));
}

#[test]
fn loaded_tree_can_be_updated() {
    let leaves = leaves(4);
    let bytes = PointerBvh::from_leaves(&leaves).unwrap().to_bytes().unwrap();
    let mut bvh = PointerBvh::from_bytes(4, &bytes).unwrap();

    let far = Aabb::new(Point3::new(100.0, 100.0, 100.0), Point3::new(101.0, 101.0, 101.0));
    bvh.set_leaf(2, &far).unwrap();
    assert_eq!(bvh.to_bytes(), Err(BvhError::NotRefitted));

    bvh.refit();
    bvh.freeze().unwrap();
    assert_eq!(bvh.root_aabb().unwrap().maxs, far.maxs);
    assert_eq!(bvh.set_leaf(0, &far), Err(BvhError::Frozen));
}
