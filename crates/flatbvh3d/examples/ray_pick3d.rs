extern crate nalgebra as na;

use flatbvh3d::bounding_volume::Aabb;
use flatbvh3d::partitioning::{Bvh, BvhEncoding, StaticBvh, TraversalAction};
use flatbvh3d::query::Ray;
use na::{Point3, Vector3};

fn main() {
    /*
     * Build a row of crates along the x axis, every other one raised.
     */
    let leaves: Vec<_> = (0..10)
        .map(|i| {
            let center = Point3::new(i as f32 * 3.0, (i % 2) as f32 * 2.0, 0.0);
            Aabb::from_half_extents(center, Vector3::new(1.0, 1.0, 1.0))
        })
        .collect();

    for encoding in [BvhEncoding::Packed, BvhEncoding::Pointer] {
        let mut bvh = Bvh::new(encoding, leaves.len()).unwrap();
        bvh.populate_leaves(|i| leaves[i]).unwrap();
        bvh.refit();
        bvh.freeze().unwrap();

        println!("{:?} encoding, root: {:?}", encoding, bvh.root_aabb().unwrap());

        /*
         * Pick with a ray going along the row at ground level.
         */
        let ray = Ray::new(Point3::new(-5.0, 0.0, 0.0), Vector3::x());
        let hits = bvh.leaves_hit_by_ray(&ray).unwrap();
        println!("\tground-level hits: {:?}", hits);

        /*
         * Find the closest hit by hand: hits are reported in traversal order.
         */
        let closest = hits.iter().copied().min_by(|a, b| {
            let da = leaves[*a as usize].mins.x - ray.origin.x;
            let db = leaves[*b as usize].mins.x - ray.origin.x;
            da.total_cmp(&db)
        });
        println!("\tclosest hit: {:?}", closest);

        /*
         * Count internal nodes with a custom visitor.
         */
        let mut internal_count = 0;
        bvh.traverse_iterative(|node| {
            if !node.is_leaf() {
                internal_count += 1;
            }
            TraversalAction::Continue
        })
        .unwrap();
        println!("\tvisited internal nodes: {}", internal_count);
    }
}
