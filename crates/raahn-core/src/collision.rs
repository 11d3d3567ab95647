//! All-or-nothing movement veto against walls

use glam::DVec2;

use crate::entity::{Entity, EntityId, EntityType, Spatial};
use crate::geometry::{Aabb, LineSegment};
use crate::quadtree::QuadTree;

pub const DEFAULT_HALF_QUERY_WIDTH: f64 = 400.0;
pub const DEFAULT_HALF_QUERY_HEIGHT: f64 = 300.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    Moved,
    /// The motion segment crossed this wall; the position was not changed
    Blocked { wall: EntityId },
}

impl MoveOutcome {
    pub fn is_blocked(&self) -> bool {
        matches!(self, MoveOutcome::Blocked { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionResolver {
    half_extents: DVec2,
}

impl Default for CollisionResolver {
    fn default() -> Self {
        Self::new(DVec2::new(DEFAULT_HALF_QUERY_WIDTH, DEFAULT_HALF_QUERY_HEIGHT))
    }
}

impl CollisionResolver {
    pub fn new(half_extents: DVec2) -> Self {
        Self {
            half_extents: half_extents.abs(),
        }
    }

    pub fn half_extents(&self) -> DVec2 {
        self.half_extents
    }

    /// Window around `center` used for collision and modulation queries
    pub fn window(&self, center: DVec2) -> Aabb {
        Aabb::around(center, self.half_extents)
    }

    /// Distinct entities inside the window around `center`
    pub fn nearby<'a>(&self, center: DVec2, index: &'a QuadTree<Entity>) -> Vec<&'a Entity> {
        index.query_unique(&self.window(center))
    }

    /// Decide whether moving from `from` to `to` is allowed.
    ///
    /// The first wall crossed by the motion segment, in query order, vetoes the move.
    pub fn resolve(&self, from: DVec2, to: DVec2, index: &QuadTree<Entity>) -> MoveOutcome {
        let motion = LineSegment::new(from, to);
        let region = self.window(from).union(&motion.bounds());

        let blocker = index
            .query(&region)
            .into_iter()
            .filter(|entity| entity.entity_type() == EntityType::Wall)
            .find(|wall| wall.boundary().iter().any(|edge| motion.intersects(edge)));

        match blocker {
            Some(wall) => MoveOutcome::Blocked { wall: wall.id() },
            None => MoveOutcome::Moved,
        }
    }
}
