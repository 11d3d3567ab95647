//! Synthetic sensors for the car
//!
//! Implements ray range finders and angular pie-slice occupancy sensors. Both
//! families query the quadtree every tick and can be restricted to a set of
//! entity types.

mod pie_slice;
mod range_finder;

pub use pie_slice::{PieSliceSensor, PieSliceSensorGroup, Wedge};
pub use range_finder::{RangeFinder, RangeFinderGroup};

use crate::entity::{Entity, EntityFilter, EntityId, Spatial};
use crate::geometry::Aabb;
use crate::quadtree::QuadTree;

/// Distinct entities in `region` that pass `filter`, skipping the sensing entity itself
pub(crate) fn candidates<'a>(
    index: &'a QuadTree<Entity>,
    region: &Aabb,
    filter: &EntityFilter,
    exclude: Option<EntityId>,
) -> Vec<&'a Entity> {
    index
        .query_unique(region)
        .into_iter()
        .filter(|entity| Some(entity.id()) != exclude && filter.accepts(entity.entity_type()))
        .collect()
}
