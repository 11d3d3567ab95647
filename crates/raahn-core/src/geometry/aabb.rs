//! Axis-aligned bounding boxes

use glam::DVec2;
use serde::{Deserialize, Serialize};

use super::LineSegment;

/// Axis-aligned box anchored at its lower-left corner. Size components are never negative.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Aabb {
    position: DVec2,
    size: DVec2,
}

impl Aabb {
    /// Box of the given size at the origin
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            position: DVec2::ZERO,
            size: DVec2::new(width.max(0.0), height.max(0.0)),
        }
    }

    pub fn from_position_size(position: DVec2, size: DVec2) -> Self {
        Self {
            position,
            size: size.max(DVec2::ZERO),
        }
    }

    /// Smallest box containing both corners, in any order
    pub fn from_min_max(a: DVec2, b: DVec2) -> Self {
        let min = a.min(b);
        Self {
            position: min,
            size: a.max(b) - min,
        }
    }

    pub fn around(center: DVec2, half_extents: DVec2) -> Self {
        let half = half_extents.abs();
        Self {
            position: center - half,
            size: half * 2.0,
        }
    }

    pub fn position(&self) -> DVec2 {
        self.position
    }

    pub fn size(&self) -> DVec2 {
        self.size
    }

    pub fn width(&self) -> f64 {
        self.size.x
    }

    pub fn height(&self) -> f64 {
        self.size.y
    }

    pub fn min(&self) -> DVec2 {
        self.position
    }

    pub fn max(&self) -> DVec2 {
        self.position + self.size
    }

    pub fn center(&self) -> DVec2 {
        self.position + self.size * 0.5
    }

    pub fn translate(&mut self, dx: f64, dy: f64) {
        self.position += DVec2::new(dx, dy);
    }

    pub fn set_position(&mut self, position: DVec2) {
        self.position = position;
    }

    /// Change the size keeping the lower-left corner fixed
    pub fn resize(&mut self, width: f64, height: f64) {
        self.size = DVec2::new(width.max(0.0), height.max(0.0));
    }

    /// Overlap test on closed intervals: boxes that only touch still intersect.
    pub fn intersects(&self, other: &Aabb) -> bool {
        let (a_min, a_max) = (self.min(), self.max());
        let (b_min, b_max) = (other.min(), other.max());
        a_min.x <= b_max.x && a_max.x >= b_min.x && a_min.y <= b_max.y && a_max.y >= b_min.y
    }

    pub fn contains_point(&self, point: DVec2) -> bool {
        let (min, max) = (self.min(), self.max());
        point.x >= min.x && point.x <= max.x && point.y >= min.y && point.y <= max.y
    }

    /// Lower-left, lower-right, upper-left, upper-right
    pub fn quadrants(&self) -> [Aabb; 4] {
        let half = self.size * 0.5;
        let p = self.position;
        [
            Aabb::from_position_size(p, half),
            Aabb::from_position_size(p + DVec2::new(half.x, 0.0), half),
            Aabb::from_position_size(p + DVec2::new(0.0, half.y), half),
            Aabb::from_position_size(p + half, half),
        ]
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        let min = self.min().min(other.min());
        let max = self.max().max(other.max());
        Aabb {
            position: min,
            size: max - min,
        }
    }

    /// Grow every side by `margin`
    pub fn expanded(&self, margin: f64) -> Aabb {
        Aabb::from_position_size(
            self.position - DVec2::splat(margin),
            self.size + DVec2::splat(margin * 2.0),
        )
    }

    /// Bottom, right, top and left edges
    pub fn edges(&self) -> [LineSegment; 4] {
        let (min, max) = (self.min(), self.max());
        let lower_right = DVec2::new(max.x, min.y);
        let upper_left = DVec2::new(min.x, max.y);
        [
            LineSegment::new(min, lower_right),
            LineSegment::new(lower_right, max),
            LineSegment::new(max, upper_left),
            LineSegment::new(upper_left, min),
        ]
    }
}
