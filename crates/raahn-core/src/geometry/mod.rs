//! Planar geometry shared by the index, sensors and collision code

mod aabb;
mod segment;

pub use aabb::Aabb;
pub use segment::{LineSegment, nearest_point};
