use glam::DVec2;
use serde::{Deserialize, Serialize};

use super::Aabb;

/// Cross products smaller than this are treated as parallel
const PARALLEL_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LineSegment {
    pub start: DVec2,
    pub end: DVec2,
}

impl LineSegment {
    pub fn new(start: DVec2, end: DVec2) -> Self {
        Self { start, end }
    }

    /// Segment of `length` leaving `origin` at `angle_degrees` (0 = +x, counter-clockwise)
    pub fn from_angle(origin: DVec2, angle_degrees: f64, length: f64) -> Self {
        let direction = DVec2::from_angle(angle_degrees.to_radians());
        Self::new(origin, origin + direction * length)
    }

    pub fn length(&self) -> f64 {
        self.start.distance(self.end)
    }

    pub fn delta(&self) -> DVec2 {
        self.end - self.start
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::from_min_max(self.start, self.end)
    }

    /// Intersection point of two closed segments.
    ///
    /// Parallel and collinear pairs yield `None`, as does any zero-length segment.
    pub fn intersection(&self, other: &LineSegment) -> Option<DVec2> {
        let r = self.delta();
        let s = other.delta();
        let denom = r.perp_dot(s);
        if denom.abs() < PARALLEL_EPSILON {
            return None;
        }

        let qp = other.start - self.start;
        let t = qp.perp_dot(s) / denom;
        let u = qp.perp_dot(r) / denom;
        if (0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u) {
            Some(self.start + r * t)
        } else {
            None
        }
    }

    pub fn intersects(&self, other: &LineSegment) -> bool {
        self.intersection(other).is_some()
    }

    pub fn closest_point(&self, point: DVec2) -> DVec2 {
        let d = self.delta();
        let len_sq = d.length_squared();
        if len_sq == 0.0 {
            return self.start;
        }
        let t = ((point - self.start).dot(d) / len_sq).clamp(0.0, 1.0);
        self.start + d * t
    }

    pub fn distance_to_point(&self, point: DVec2) -> f64 {
        self.closest_point(point).distance(point)
    }
}

/// Point nearest to `origin`; ties keep the earliest candidate
pub fn nearest_point(origin: DVec2, points: impl IntoIterator<Item = DVec2>) -> Option<DVec2> {
    let mut best: Option<(DVec2, f64)> = None;
    for point in points {
        let distance = origin.distance_squared(point);
        match best {
            Some((_, best_distance)) if distance >= best_distance => {}
            _ => best = Some((point, distance)),
        }
    }
    best.map(|(point, _)| point)
}
