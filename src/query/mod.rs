//! Non-persistent geometric queries.
//!
//! Only existence tests are provided here: they answer *whether* a ray touches a bounding box,
//! never *where*. Callers needing exact hit points re-test the leaf payloads reported by the
//! trees of [`crate::partitioning`] with their own primitive-level routines.

pub use self::ray::Ray;

mod ray;
