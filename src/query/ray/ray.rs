//! Traits and structure needed to cast rays.

use crate::math::{Point, Real, Vector};

/// A ray for ray-casting queries.
///
/// A ray is a half-infinite line starting at an origin point and extending
/// infinitely in a direction.
///
/// # Direction Vector
///
/// The direction does **not** need to be normalized, and it may have zero components: the
/// box tests of this crate never divide by it. A zero direction degenerates into a point
/// containment test at `origin`.
///
/// # Example
///
/// ```rust
/// # #[cfg(feature = "f32")] {
/// use flatbvh3d::bounding_volume::Aabb;
/// use flatbvh3d::query::Ray;
/// use nalgebra::{Point3, Vector3};
///
/// let ray = Ray::new(Point3::new(0.5, 0.5, -10.0), Vector3::z());
/// let aabb = Aabb::new(Point3::origin(), Point3::new(1.0, 1.0, 1.0));
///
/// assert!(aabb.intersects_ray(&ray));
/// assert_eq!(ray.point_at(10.0), Point3::new(0.5, 0.5, 0.0));
/// # }
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(C)]
pub struct Ray {
    /// Starting point of the ray.
    ///
    /// Points along the ray are computed as `origin + dir * t` for `t ≥ 0`.
    pub origin: Point<Real>,

    /// Direction vector of the ray.
    pub dir: Vector<Real>,
}

impl Ray {
    /// Creates a new ray from an origin point and direction vector.
    pub fn new(origin: Point<Real>, dir: Vector<Real>) -> Ray {
        Ray { origin, dir }
    }

    /// Computes a point along the ray at parameter `t`.
    ///
    /// Returns `origin + dir * t`. For `t ≥ 0`, this gives points along the ray.
    #[inline]
    pub fn point_at(&self, t: Real) -> Point<Real> {
        self.origin + self.dir * t
    }
}
