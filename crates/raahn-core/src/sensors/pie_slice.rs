use glam::DVec2;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::entity::{Entity, EntityFilter, EntityId, EntityType, Pose, Spatial};
use crate::geometry::{Aabb, LineSegment};
use crate::quadtree::QuadTree;

use super::candidates;

/// Arc resolution of the wedge outline
const ARC_SEGMENTS: usize = 16;

/// Annular sector in world space. Angles are degrees, counter-clockwise from +x.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Wedge {
    pub center: DVec2,
    pub start: f64,
    pub span: f64,
    pub inner_radius: f64,
    pub outer_radius: f64,
}

impl Wedge {
    /// A negative span is flipped so the wedge always sweeps counter-clockwise
    pub fn new(center: DVec2, start: f64, span: f64, inner_radius: f64, outer_radius: f64) -> Self {
        let (start, span) = if span < 0.0 {
            (start + span, -span)
        } else {
            (start, span)
        };
        let inner_radius = inner_radius.max(0.0);
        Self {
            center,
            start,
            span,
            inner_radius,
            outer_radius: outer_radius.max(inner_radius),
        }
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::around(self.center, DVec2::splat(self.outer_radius))
    }

    pub fn contains_point(&self, point: DVec2) -> bool {
        let radius = point.distance(self.center);
        if radius < self.inner_radius || radius > self.outer_radius {
            return false;
        }
        radius == 0.0 || self.within_span(point)
    }

    fn within_span(&self, point: DVec2) -> bool {
        if self.span >= 360.0 {
            return true;
        }
        let offset = point - self.center;
        let angle = offset.y.atan2(offset.x).to_degrees();
        (angle - self.start).rem_euclid(360.0) <= self.span
    }

    /// Radial edges from the inner to the outer radius at both ends of the span
    fn radial_edges(&self) -> SmallVec<[LineSegment; 2]> {
        if self.span >= 360.0 {
            return SmallVec::new();
        }
        [self.start, self.start + self.span]
            .into_iter()
            .map(|angle| {
                let direction = DVec2::from_angle(angle.to_radians());
                LineSegment::new(
                    self.center + direction * self.inner_radius,
                    self.center + direction * self.outer_radius,
                )
            })
            .collect()
    }

    fn crosses_arc(&self, segment: &LineSegment, radius: f64) -> bool {
        circle_crossings(segment, self.center, radius)
            .into_iter()
            .any(|point| self.within_span(point))
    }

    /// Closed polygon approximating the wedge for drawing: outer arc, then inner arc back
    pub fn outline(&self) -> Vec<DVec2> {
        let arc = |radius: f64, step: usize| {
            let angle = self.start + self.span * step as f64 / ARC_SEGMENTS as f64;
            self.center + DVec2::from_angle(angle.to_radians()) * radius
        };

        let mut points: Vec<DVec2> = (0..=ARC_SEGMENTS).map(|i| arc(self.outer_radius, i)).collect();
        if self.inner_radius > 0.0 {
            points.extend((0..=ARC_SEGMENTS).rev().map(|i| arc(self.inner_radius, i)));
        } else {
            points.push(self.center);
        }
        points
    }

    /// Exact test: an endpoint inside, or a crossing of either arc or either radial edge
    pub fn intersects_segment(&self, segment: &LineSegment) -> bool {
        if self.contains_point(segment.start) || self.contains_point(segment.end) {
            return true;
        }
        if self.crosses_arc(segment, self.outer_radius) {
            return true;
        }
        if self.inner_radius > 0.0 && self.crosses_arc(segment, self.inner_radius) {
            return true;
        }
        self.radial_edges().iter().any(|edge| edge.intersects(segment))
    }

    /// Boundary test, plus box containment so a wedge lying wholly inside a road still counts
    pub fn intersects_entity(&self, entity: &Entity) -> bool {
        if entity.boundary().iter().any(|edge| self.intersects_segment(edge)) {
            return true;
        }
        entity.segment().is_none() && self.outline().iter().any(|&p| entity.aabb().contains_point(p))
    }
}

/// Points where `segment` meets the circle around `center`
fn circle_crossings(segment: &LineSegment, center: DVec2, radius: f64) -> SmallVec<[DVec2; 2]> {
    let d = segment.delta();
    let f = segment.start - center;
    let a = d.length_squared();
    if a == 0.0 {
        return SmallVec::new();
    }
    let b = 2.0 * f.dot(d);
    let c = f.length_squared() - radius * radius;
    let discriminant = b * b - 4.0 * a * c;
    if discriminant < 0.0 {
        return SmallVec::new();
    }

    let root = discriminant.sqrt();
    [(-b - root) / (2.0 * a), (-b + root) / (2.0 * a)]
        .into_iter()
        .filter(|t| (0.0..=1.0).contains(t))
        .map(|t| segment.start + d * t)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PieSliceSensor {
    /// Degrees relative to heading
    pub angle_start: f64,
    pub angle_span: f64,
    pub inner_radius: f64,
    pub outer_radius: f64,
    pub max_detection: usize,
    pub detected: usize,
    /// World-space wedge from the last update
    pub wedge: Wedge,
}

impl PieSliceSensor {
    fn unconfigured() -> Self {
        Self {
            angle_start: 0.0,
            angle_span: 0.0,
            inner_radius: 0.0,
            outer_radius: 0.0,
            max_detection: 0,
            detected: 0,
            wedge: Wedge::default(),
        }
    }

    /// `detected / max_detection`, or 0 when nothing can be detected
    pub fn reading(&self) -> f64 {
        if self.max_detection == 0 {
            0.0
        } else {
            self.detected as f64 / self.max_detection as f64
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PieSliceSensorGroup {
    sensors: Vec<PieSliceSensor>,
    filter: EntityFilter,
}

impl PieSliceSensorGroup {
    pub fn new(count: usize) -> Self {
        let mut group = Self::default();
        group.add_sensors(count);
        group
    }

    pub fn add_sensors(&mut self, count: usize) {
        self.sensors
            .extend(std::iter::repeat_n(PieSliceSensor::unconfigured(), count));
    }

    /// Slice `i` covers `[angle_offset + i * angle_between, + angle_between)` between the radii
    pub fn configure_sensors(
        &mut self,
        max_detection: usize,
        angle_offset: f64,
        angle_between: f64,
        outer_radius: f64,
        inner_radius: f64,
    ) {
        for (i, sensor) in self.sensors.iter_mut().enumerate() {
            *sensor = PieSliceSensor {
                angle_start: angle_offset + i as f64 * angle_between,
                angle_span: angle_between,
                inner_radius,
                outer_radius,
                max_detection,
                detected: 0,
                wedge: Wedge::default(),
            };
        }
    }

    pub fn add_entity_to_detect(&mut self, kind: EntityType) {
        self.filter.add(kind);
    }

    pub fn filter(&self) -> &EntityFilter {
        &self.filter
    }

    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }

    pub fn sensors(&self) -> &[PieSliceSensor] {
        &self.sensors
    }

    pub fn reading(&self, index: usize) -> Option<f64> {
        self.sensors.get(index).map(PieSliceSensor::reading)
    }

    pub fn readings(&self) -> impl Iterator<Item = f64> + '_ {
        self.sensors.iter().map(PieSliceSensor::reading)
    }

    /// Outline of slice `index` from the last update, for drawing
    pub fn wedge_outline(&self, index: usize) -> Option<Vec<DVec2>> {
        self.sensors.get(index).map(|sensor| sensor.wedge.outline())
    }

    pub fn update(&mut self, pose: Pose, index: &QuadTree<Entity>, exclude: Option<EntityId>) {
        for sensor in &mut self.sensors {
            let wedge = Wedge::new(
                pose.center,
                pose.heading + sensor.angle_start,
                sensor.angle_span,
                sensor.inner_radius,
                sensor.outer_radius,
            );
            sensor.wedge = wedge;

            let count = candidates(index, &wedge.bounds(), &self.filter, exclude)
                .into_iter()
                .filter(|entity| wedge.intersects_entity(entity))
                .count();
            sensor.detected = count.min(sensor.max_detection);
        }
    }

    /// Release every slice
    pub fn clear(&mut self) {
        self.sensors.clear();
        self.filter.clear();
    }
}
