use serde::{Deserialize, Serialize};

use crate::entity::{Entity, EntityFilter, EntityId, EntityType, Pose};
use crate::geometry::{LineSegment, nearest_point};
use crate::quadtree::QuadTree;

use super::candidates;

/// One ray at a fixed angle relative to the car's heading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeFinder {
    /// Degrees relative to heading
    pub angle_offset: f64,
    pub length: f64,
    /// Distance to the nearest hit, or `length` when nothing is in range
    pub reading: f64,
    /// World-space ray from the last update
    pub ray: LineSegment,
}

impl RangeFinder {
    fn new(angle_offset: f64, length: f64) -> Self {
        Self {
            angle_offset,
            length,
            reading: length,
            ray: LineSegment::default(),
        }
    }

    /// Reading scaled into [0, 1]
    pub fn normalized(&self) -> f64 {
        if self.length > 0.0 {
            (self.reading / self.length).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RangeFinderGroup {
    finders: Vec<RangeFinder>,
    filter: EntityFilter,
}

impl RangeFinderGroup {
    pub fn new(count: usize) -> Self {
        Self {
            finders: vec![RangeFinder::new(0.0, 0.0); count],
            filter: EntityFilter::new(),
        }
    }

    /// Ray `i` points at `angle_offset + i * angle_between` degrees from the heading
    pub fn configure(&mut self, length: f64, angle_offset: f64, angle_between: f64) {
        let length = length.max(0.0);
        for (i, finder) in self.finders.iter_mut().enumerate() {
            *finder = RangeFinder::new(angle_offset + i as f64 * angle_between, length);
        }
    }

    pub fn add_entity_to_detect(&mut self, kind: EntityType) {
        self.filter.add(kind);
    }

    pub fn filter(&self) -> &EntityFilter {
        &self.filter
    }

    pub fn len(&self) -> usize {
        self.finders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.finders.is_empty()
    }

    pub fn reading(&self, index: usize) -> Option<f64> {
        self.finders.get(index).map(|finder| finder.reading)
    }

    pub fn readings(&self) -> impl Iterator<Item = f64> + '_ {
        self.finders.iter().map(|finder| finder.reading)
    }

    pub fn finders(&self) -> &[RangeFinder] {
        &self.finders
    }

    /// Rays from the last update, for drawing
    pub fn rays(&self) -> impl Iterator<Item = &LineSegment> + '_ {
        self.finders.iter().map(|finder| &finder.ray)
    }

    /// Re-cast every ray from `pose`. `exclude` is the sensing entity's own id.
    pub fn update(&mut self, pose: Pose, index: &QuadTree<Entity>, exclude: Option<EntityId>) {
        for finder in &mut self.finders {
            let ray =
                LineSegment::from_angle(pose.center, pose.heading + finder.angle_offset, finder.length);
            finder.ray = ray;

            let hits = candidates(index, &ray.bounds(), &self.filter, exclude)
                .into_iter()
                .flat_map(|entity| entity.boundary())
                .filter_map(|edge| ray.intersection(&edge));

            finder.reading = match nearest_point(pose.center, hits) {
                Some(point) => pose.center.distance(point).min(finder.length),
                None => finder.length,
            };
        }
    }

    /// Release every ray
    pub fn clear(&mut self) {
        self.finders.clear();
        self.filter.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Spatial;
    use crate::geometry::Aabb;
    use glam::DVec2;

    fn world(entities: impl IntoIterator<Item = Entity>) -> QuadTree<Entity> {
        let mut tree = QuadTree::new(Aabb::from_position_size(
            DVec2::splat(-500.0),
            DVec2::splat(1000.0),
        ));
        for entity in entities {
            tree.insert(entity);
        }
        tree
    }

    fn wall(id: u64, x1: f64, y1: f64, x2: f64, y2: f64) -> Entity {
        Entity::wall(
            EntityId::from_raw(id),
            LineSegment::new(DVec2::new(x1, y1), DVec2::new(x2, y2)),
        )
    }

    #[test]
    fn test_configure_spaces_rays() {
        let mut group = RangeFinderGroup::new(3);
        group.configure(50.0, -30.0, 30.0);

        let offsets: Vec<f64> = group.finders().iter().map(|f| f.angle_offset).collect();
        assert_eq!(offsets, vec![-30.0, 0.0, 30.0]);
        assert!(group.readings().all(|r| r == 50.0));
    }

    #[test]
    fn test_reading_is_distance_to_nearest_wall() {
        let tree = world([wall(1, 30.0, -10.0, 30.0, 10.0), wall(2, 20.0, -10.0, 20.0, 10.0)]);
        let mut group = RangeFinderGroup::new(1);
        group.configure(100.0, 0.0, 0.0);

        group.update(Pose::new(DVec2::ZERO, 0.0), &tree, None);

        assert!((group.reading(0).unwrap() - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_reading_caps_at_length_without_hit() {
        let tree = world([wall(1, 150.0, -10.0, 150.0, 10.0)]);
        let mut group = RangeFinderGroup::new(1);
        group.configure(100.0, 0.0, 0.0);

        group.update(Pose::new(DVec2::ZERO, 0.0), &tree, None);

        assert_eq!(group.reading(0), Some(100.0));
        assert_eq!(group.finders()[0].normalized(), 1.0);
    }

    #[test]
    fn test_heading_rotates_rays() {
        let tree = world([wall(1, -10.0, 40.0, 10.0, 40.0)]);
        let mut group = RangeFinderGroup::new(1);
        group.configure(100.0, 0.0, 0.0);

        group.update(Pose::new(DVec2::ZERO, 0.0), &tree, None);
        assert_eq!(group.reading(0), Some(100.0));

        group.update(Pose::new(DVec2::ZERO, 90.0), &tree, None);
        assert!((group.reading(0).unwrap() - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_filter_and_self_exclusion() {
        let car_box = Aabb::around(DVec2::ZERO, DVec2::splat(5.0));
        let road = Entity::road(
            EntityId::from_raw(2),
            Aabb::from_position_size(DVec2::new(15.0, -5.0), DVec2::splat(10.0)),
        );
        let tree = world([
            Entity::car(EntityId::from_raw(1), car_box),
            road,
            wall(3, 60.0, -10.0, 60.0, 10.0),
        ]);

        let mut group = RangeFinderGroup::new(1);
        group.configure(100.0, 0.0, 0.0);
        group.update(Pose::new(DVec2::ZERO, 0.0), &tree, Some(EntityId::from_raw(1)));
        assert!((group.reading(0).unwrap() - 15.0).abs() < 1e-9, "road box edge");

        group.add_entity_to_detect(EntityType::Wall);
        group.update(Pose::new(DVec2::ZERO, 0.0), &tree, Some(EntityId::from_raw(1)));
        assert!((group.reading(0).unwrap() - 60.0).abs() < 1e-9);
        assert_eq!(road.entity_type(), EntityType::Road);
    }

    #[test]
    fn test_clear_releases_rays() {
        let mut group = RangeFinderGroup::new(4);
        group.add_entity_to_detect(EntityType::Wall);
        group.clear();

        assert!(group.is_empty());
        assert!(group.filter().is_empty());
        assert_eq!(group.reading(0), None);
    }
}
