//! World entities and the interface the spatial index needs from them

use std::fmt;

use glam::DVec2;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::geometry::{Aabb, LineSegment};

/// Half extent of the box given to point entities
pub const POINT_HALF_EXTENT: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EntityType {
    Car,
    Wall,
    Road,
    Point,
    #[default]
    None,
}

impl EntityType {
    /// Parse a type name case-insensitively. Unknown names map to `None`.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "car" => Self::Car,
            "wall" => Self::Wall,
            "road" => Self::Road,
            "point" => Self::Point,
            _ => Self::None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Car => "Car",
            Self::Wall => "Wall",
            Self::Road => "Road",
            Self::Point => "Point",
            Self::None => "None",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Stable identity of an entity for its whole lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(u64);

impl EntityId {
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Anything that can live in the spatial index
pub trait Spatial {
    fn id(&self) -> EntityId;
    fn aabb(&self) -> Aabb;
    fn entity_type(&self) -> EntityType;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Entity {
    id: EntityId,
    kind: EntityType,
    aabb: Aabb,
    segment: Option<LineSegment>,
}

impl Entity {
    pub fn new(id: EntityId, kind: EntityType, aabb: Aabb) -> Self {
        Self {
            id,
            kind,
            aabb,
            segment: None,
        }
    }

    pub fn wall(id: EntityId, segment: LineSegment) -> Self {
        Self {
            id,
            kind: EntityType::Wall,
            aabb: segment.bounds(),
            segment: Some(segment),
        }
    }

    pub fn road(id: EntityId, aabb: Aabb) -> Self {
        Self::new(id, EntityType::Road, aabb)
    }

    pub fn point(id: EntityId, position: DVec2) -> Self {
        Self::new(
            id,
            EntityType::Point,
            Aabb::around(position, DVec2::splat(POINT_HALF_EXTENT)),
        )
    }

    pub fn car(id: EntityId, aabb: Aabb) -> Self {
        Self::new(id, EntityType::Car, aabb)
    }

    pub fn kind(&self) -> EntityType {
        self.kind
    }

    pub fn segment(&self) -> Option<&LineSegment> {
        self.segment.as_ref()
    }

    /// Segments sensors and the collision resolver test against
    pub fn boundary(&self) -> SmallVec<[LineSegment; 4]> {
        match self.segment {
            Some(segment) => SmallVec::from_slice(&[segment]),
            None => SmallVec::from_slice(&self.aabb.edges()),
        }
    }
}

impl Spatial for Entity {
    fn id(&self) -> EntityId {
        self.id
    }

    fn aabb(&self) -> Aabb {
        self.aabb
    }

    fn entity_type(&self) -> EntityType {
        self.kind
    }
}

/// Set of entity types a sensor reacts to. Empty means every type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityFilter {
    kinds: SmallVec<[EntityType; 4]>,
}

impl EntityFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// `EntityType::None` and duplicates are ignored
    pub fn add(&mut self, kind: EntityType) {
        if kind != EntityType::None && !self.kinds.contains(&kind) {
            self.kinds.push(kind);
        }
    }

    pub fn accepts(&self, kind: EntityType) -> bool {
        self.kinds.is_empty() || self.kinds.contains(&kind)
    }

    pub fn kinds(&self) -> &[EntityType] {
        &self.kinds
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    pub fn clear(&mut self) {
        self.kinds.clear();
    }
}

/// Position and heading of a sensing agent. Heading is in degrees, counter-clockwise from +x.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    pub center: DVec2,
    pub heading: f64,
}

impl Pose {
    pub fn new(center: DVec2, heading: f64) -> Self {
        Self { center, heading }
    }

    pub fn direction(&self) -> DVec2 {
        DVec2::from_angle(self.heading.to_radians())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_type_from_name() {
        assert_eq!(EntityType::from_name("Wall"), EntityType::Wall);
        assert_eq!(EntityType::from_name(" road "), EntityType::Road);
        assert_eq!(EntityType::from_name("POINT"), EntityType::Point);
        assert_eq!(EntityType::from_name("tree"), EntityType::None);
    }

    #[test]
    fn test_wall_boundary_is_its_segment() {
        let segment = LineSegment::new(DVec2::new(0.0, 0.0), DVec2::new(10.0, 5.0));
        let wall = Entity::wall(EntityId::from_raw(1), segment);

        assert_eq!(wall.boundary().as_slice(), &[segment]);
        assert_eq!(wall.aabb().size(), DVec2::new(10.0, 5.0));
    }

    #[test]
    fn test_road_boundary_is_its_box() {
        let road = Entity::road(EntityId::from_raw(2), Aabb::new(4.0, 4.0));
        assert_eq!(road.boundary().len(), 4);
        assert!(road.segment().is_none());
    }

    #[test]
    fn test_filter_ignores_none_and_duplicates() {
        let mut filter = EntityFilter::new();
        assert!(filter.accepts(EntityType::Road), "empty filter accepts all");

        filter.add(EntityType::Wall);
        filter.add(EntityType::Wall);
        filter.add(EntityType::None);

        assert_eq!(filter.kinds(), &[EntityType::Wall]);
        assert!(filter.accepts(EntityType::Wall));
        assert!(!filter.accepts(EntityType::Road));
    }
}
