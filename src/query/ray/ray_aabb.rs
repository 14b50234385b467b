use crate::bounding_volume::Aabb;
use crate::math::{Point, Real, Vector, DIM};
use crate::query::Ray;

impl Aabb {
    /// Tests whether `ray` touches this AABB.
    ///
    /// This is a pure existence test: no time of impact is computed. The direction does not need
    /// to be normalized and may have zero components since no reciprocal is ever taken.
    ///
    /// # Example
    ///
    /// ```rust
    /// # #[cfg(feature = "f32")] {
    /// use flatbvh3d::bounding_volume::Aabb;
    /// use flatbvh3d::query::Ray;
    /// use nalgebra::{Point3, Vector3};
    ///
    /// let aabb = Aabb::new(Point3::new(5.0, 5.0, 5.0), Point3::new(6.0, 6.0, 6.0));
    ///
    /// assert!(aabb.intersects_ray(&Ray::new(Point3::new(5.5, 5.5, -10.0), Vector3::z())));
    /// assert!(!aabb.intersects_ray(&Ray::new(Point3::new(5.5, 5.5, -10.0), -Vector3::z())));
    /// assert!(!aabb.intersects_ray(&Ray::new(Point3::new(-10.0, -10.0, -10.0), Vector3::x())));
    /// # }
    /// ```
    #[inline]
    pub fn intersects_ray(&self, ray: &Ray) -> bool {
        self.intersects_ray_parts(&ray.origin, &ray.dir)
    }

    /// Tests whether the ray starting at `origin` with direction `dir` touches this AABB.
    ///
    /// See [`Aabb::intersects_ray`].
    pub fn intersects_ray_parts(&self, origin: &Point<Real>, dir: &Vector<Real>) -> bool {
        let half_extents = self.half_extents();
        let diff = *origin - self.center();

        // Origin outside of the slab and moving away from it.
        for i in 0..DIM {
            if diff[i].abs() > half_extents[i] && diff[i] * dir[i] >= 0.0 {
                return false;
            }
        }

        // Separating axes given by the cross products of the ray direction with the box axes.
        for (i, j) in [(0usize, 1usize), (1, 2), (2, 0)] {
            let f = dir[i] * diff[j] - dir[j] * diff[i];
            if f.abs() > half_extents[j] * dir[i].abs() + half_extents[i] * dir[j].abs() {
                return false;
            }
        }

        true
    }
}

#[cfg(test)]
mod test {
    use crate::bounding_volume::Aabb;
    use crate::math::{Point, Real, Vector};
    use crate::query::Ray;

    fn unit_cube() -> Aabb {
        Aabb::new(Point::origin(), Point::new(1.0, 1.0, 1.0))
    }

    #[test]
    fn axis_aligned_rays() {
        let aabb = unit_cube();

        assert!(aabb.intersects_ray(&Ray::new(Point::new(0.5, 0.5, -10.0), Vector::z())));
        assert!(aabb.intersects_ray(&Ray::new(Point::new(0.5, 0.5, 10.0), -Vector::z())));
        // Pointing away.
        assert!(!aabb.intersects_ray(&Ray::new(Point::new(0.5, 0.5, 10.0), Vector::z())));
        // Parallel to the box but outside of its slab.
        assert!(!aabb.intersects_ray(&Ray::new(Point::new(2.0, 0.5, -10.0), Vector::z())));
    }

    #[test]
    fn origin_inside_always_hits() {
        let aabb = unit_cube();
        let origin = Point::new(0.25, 0.5, 0.75);

        for dir in [Vector::x(), -Vector::y(), Vector::new(1.0, -2.0, 3.0), Vector::zeros()] {
            assert!(aabb.intersects_ray(&Ray::new(origin, dir)));
        }
    }

    #[test]
    fn zero_direction_outside_misses() {
        let aabb = unit_cube();
        assert!(!aabb.intersects_ray(&Ray::new(Point::new(3.0, 0.5, 0.5), Vector::zeros())));
    }

    #[test]
    fn unnormalized_direction() {
        let aabb = unit_cube();
        let ray = Ray::new(Point::new(-4.0, -4.0, 0.5), Vector::new(100.0, 100.0, 0.0));
        assert!(aabb.intersects_ray(&ray));
    }

    #[test]
    fn diagonal_rays_use_cross_axes() {
        let aabb = unit_cube();
        // Passes every per-axis slab check but misses the corner of the box.
        let ray = Ray::new(Point::new(-1.0, 2.5, 0.5), Vector::new(1.0, -0.5, 0.0));
        assert!(!aabb.intersects_ray(&ray));

        let ray = Ray::new(Point::new(-1.0, 0.5, 0.5), Vector::new(1.0, 0.1, 0.0));
        assert!(aabb.intersects_ray(&ray));
    }

    #[test]
    fn degenerate_box() {
        let p = Point::new(2.0, 2.0, 2.0);
        let aabb = Aabb::new(p, p);
        let dir: Vector<Real> = Vector::new(1.0, 1.0, 1.0);

        assert!(aabb.intersects_ray(&Ray::new(Point::origin(), dir)));
        assert!(!aabb.intersects_ray(&Ray::new(Point::origin(), Vector::x())));
    }
}
