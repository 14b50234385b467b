use approx::assert_relative_eq;
use flatbvh3d::bounding_volume::{Aabb, BoundingVolume};
use flatbvh3d::partitioning::{Bvh, BvhEncoding, PackedBvh, PointerBvh, StaticBvh};
use flatbvh3d::query::Ray;
use nalgebra::{Point3, Vector3};

/// A 4x4x4 grid of unit cubes spaced by 2 along each axis.
fn grid_leaves() -> Vec<Aabb> {
    let mut leaves = Vec::new();

    for i in 0..4 {
        for j in 0..4 {
            for k in 0..4 {
                let center = Point3::new(i as f32 * 2.0, j as f32 * 2.0, k as f32 * 2.0);
                leaves.push(Aabb::from_half_extents(center, Vector3::repeat(0.5)));
            }
        }
    }

    leaves
}

fn closest_hit(leaves: &[Aabb], bvh: &impl StaticBvh, ray: &Ray) -> Option<u32> {
    let mut best: Option<(f32, u32)> = None;

    bvh.cast_ray_leaves(ray, |leaf| {
        let center = leaves[leaf as usize].center();
        let dist = (center - ray.origin).dot(&ray.dir);

        if best.map(|(best_dist, _)| dist < best_dist).unwrap_or(true) {
            best = Some((dist, leaf));
        }
    })
    .unwrap();

    best.map(|(_, leaf)| leaf)
}

#[test]
fn picking_along_grid_rows() {
    let leaves = grid_leaves();
    let packed = PackedBvh::from_leaves(&leaves).unwrap();
    let pointer = PointerBvh::from_leaves(&leaves).unwrap();

    for j in 0..4 {
        for k in 0..4 {
            let ray = Ray::new(
                Point3::new(-10.0, j as f32 * 2.0, k as f32 * 2.0),
                Vector3::x(),
            );

            let mut hits = packed.leaves_hit_by_ray(&ray).unwrap();
            assert_eq!(pointer.leaves_hit_by_ray(&ray).unwrap(), hits);

            hits.sort_unstable();
            let expected: Vec<u32> = (0..4).map(|i| (i * 16 + j * 4 + k) as u32).collect();
            assert_eq!(hits, expected);

            // Hits come in traversal order, so the closest one must be searched for.
            assert_eq!(closest_hit(&leaves, &packed, &ray), Some((j * 4 + k) as u32));
            assert_eq!(closest_hit(&leaves, &pointer, &ray), Some((j * 4 + k) as u32));
        }
    }
}

#[test]
fn rays_between_grid_cells_miss() {
    let leaves = grid_leaves();

    for encoding in [BvhEncoding::Packed, BvhEncoding::Pointer] {
        let bvh = Bvh::from_leaves(encoding, &leaves).unwrap();
        let ray = Ray::new(Point3::new(-10.0, 1.0, 1.0), Vector3::x());
        assert!(bvh.root_aabb().unwrap().intersects_ray(&ray));
        assert!(bvh.leaves_hit_by_ray(&ray).unwrap().is_empty());

        let ray = Ray::new(Point3::new(-10.0, 0.0, 0.0), -Vector3::x());
        assert!(bvh.leaves_hit_by_ray(&ray).unwrap().is_empty());
    }
}

#[test]
fn culling_box_selects_a_corner() {
    let leaves = grid_leaves();
    let bvh = Bvh::from_leaves(BvhEncoding::default(), &leaves).unwrap();
    let frustum_bounds = Aabb::new(Point3::new(-1.0, -1.0, -1.0), Point3::new(2.2, 2.2, 2.2));

    let mut visible = Vec::new();
    bvh.intersect_aabb(&frustum_bounds, |leaf| visible.push(leaf))
        .unwrap();
    visible.sort_unstable();

    assert_eq!(visible, [0, 1, 4, 5, 16, 17, 20, 21]);
    assert!(visible
        .iter()
        .all(|leaf| leaves[*leaf as usize].intersects(&frustum_bounds)));
}

#[test]
fn root_bounds_the_grid() {
    let leaves = grid_leaves();
    let bvh = Bvh::from_leaves(BvhEncoding::Pointer, &leaves).unwrap();
    let root = bvh.root_aabb().unwrap();

    assert_relative_eq!(root.mins, Point3::new(-0.5, -0.5, -0.5));
    assert_relative_eq!(root.maxs, Point3::new(6.5, 6.5, 6.5));
    assert_relative_eq!(root.volume(), 7.0 * 7.0 * 7.0);
}
