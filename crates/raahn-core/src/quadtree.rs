//! Quadtree over entity bounding boxes
//!
//! The tree keeps its own copy of every registered entry and a node tree of
//! indices into that registry. Entries spanning a split line are stored in
//! every child they overlap, so a query can return the same entry more than
//! once; use [`QuadTree::query_unique`] when that matters.

use ahash::{AHashMap, AHashSet};

use crate::entity::{EntityId, Spatial};
use crate::geometry::Aabb;

pub const DEFAULT_MAX_ENTRIES: usize = 8;
pub const DEFAULT_MAX_DEPTH: usize = 8;
pub const DEFAULT_MIN_NODE_SIZE: f64 = 8.0;

#[derive(Debug, Clone, Copy)]
struct Limits {
    max_entries: usize,
    max_depth: usize,
    min_node_size: f64,
}

impl Limits {
    fn can_split(&self, region: &Aabb, depth: usize) -> bool {
        depth < self.max_depth
            && region.width() * 0.5 >= self.min_node_size
            && region.height() * 0.5 >= self.min_node_size
    }
}

#[derive(Debug, Clone)]
enum QuadNode {
    Leaf { entries: Vec<usize> },
    Internal { children: Box<[QuadNode; 4]> },
}

impl QuadNode {
    fn empty() -> Self {
        QuadNode::Leaf {
            entries: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct QuadTree<T> {
    bounds: Aabb,
    root: QuadNode,
    entries: Vec<T>,
    slots: AHashMap<EntityId, usize>,
    limits: Limits,
}

impl<T: Spatial> QuadTree<T> {
    pub fn new(bounds: Aabb) -> Self {
        Self::with_limits(
            bounds,
            DEFAULT_MAX_ENTRIES,
            DEFAULT_MAX_DEPTH,
            DEFAULT_MIN_NODE_SIZE,
        )
    }

    pub fn with_limits(
        bounds: Aabb,
        max_entries: usize,
        max_depth: usize,
        min_node_size: f64,
    ) -> Self {
        Self {
            bounds,
            root: QuadNode::empty(),
            entries: Vec::new(),
            slots: AHashMap::new(),
            limits: Limits {
                max_entries: max_entries.max(1),
                max_depth,
                min_node_size: min_node_size.max(0.0),
            },
        }
    }

    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    /// Number of registered entries, indexed or not
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: EntityId) -> Option<&T> {
        self.slots.get(&id).map(|&slot| &self.entries[slot])
    }

    pub fn entries(&self) -> &[T] {
        &self.entries
    }

    /// Register an entry. An entry whose id is already known replaces the old one.
    pub fn insert(&mut self, entry: T) {
        if self.slots.contains_key(&entry.id()) {
            self.update_entry(entry);
            return;
        }

        let slot = self.entries.len();
        self.slots.insert(entry.id(), slot);
        self.entries.push(entry);
        self.index_slot(slot);
    }

    /// Replace a registered entry after it moved. Returns false for unknown ids.
    pub fn update_entry(&mut self, entry: T) -> bool {
        let Some(&slot) = self.slots.get(&entry.id()) else {
            return false;
        };

        let old = self.entries[slot].aabb();
        if self.bounds.intersects(&old) {
            Self::detach(&mut self.root, self.bounds, &old, slot);
        }
        self.entries[slot] = entry;
        self.index_slot(slot);
        true
    }

    /// Drop an entry from the registry and the tree
    pub fn remove(&mut self, id: EntityId) -> Option<T> {
        let slot = self.slots.remove(&id)?;
        let removed = self.entries.swap_remove(slot);
        if let Some(moved) = self.entries.get(slot) {
            self.slots.insert(moved.id(), slot);
        }
        // Slot indices shifted, so the tree has to be rebuilt
        self.update();
        Some(removed)
    }

    /// Re-partition the tree from the registry
    pub fn update(&mut self) {
        self.root = QuadNode::empty();
        for slot in 0..self.entries.len() {
            self.index_slot(slot);
        }
    }

    pub fn clear(&mut self) {
        self.root = QuadNode::empty();
        self.entries.clear();
        self.slots.clear();
    }

    fn index_slot(&mut self, slot: usize) {
        let aabb = self.entries[slot].aabb();
        if !self.bounds.intersects(&aabb) {
            log::trace!("Entry {} lies outside the index bounds", self.entries[slot].id());
            return;
        }
        Self::insert_recursive(
            &mut self.root,
            self.bounds,
            0,
            slot,
            &self.entries,
            self.limits,
        );
    }

    fn insert_recursive(
        node: &mut QuadNode,
        region: Aabb,
        depth: usize,
        slot: usize,
        entries: &[T],
        limits: Limits,
    ) {
        match node {
            QuadNode::Leaf { entries: occupants } => {
                occupants.push(slot);
                if occupants.len() <= limits.max_entries || !limits.can_split(&region, depth) {
                    return;
                }

                let quadrants = region.quadrants();
                let mut children: [QuadNode; 4] = std::array::from_fn(|_| QuadNode::empty());
                for occupant in std::mem::take(occupants) {
                    let aabb = entries[occupant].aabb();
                    for (child, quadrant) in children.iter_mut().zip(&quadrants) {
                        if quadrant.intersects(&aabb) {
                            Self::insert_recursive(
                                child,
                                *quadrant,
                                depth + 1,
                                occupant,
                                entries,
                                limits,
                            );
                        }
                    }
                }
                *node = QuadNode::Internal {
                    children: Box::new(children),
                };
            }
            QuadNode::Internal { children } => {
                let aabb = entries[slot].aabb();
                for (child, quadrant) in children.iter_mut().zip(region.quadrants()) {
                    if quadrant.intersects(&aabb) {
                        Self::insert_recursive(child, quadrant, depth + 1, slot, entries, limits);
                    }
                }
            }
        }
    }

    fn detach(node: &mut QuadNode, region: Aabb, old: &Aabb, slot: usize) {
        match node {
            QuadNode::Leaf { entries } => entries.retain(|&s| s != slot),
            QuadNode::Internal { children } => {
                for (child, quadrant) in children.iter_mut().zip(region.quadrants()) {
                    if quadrant.intersects(old) {
                        Self::detach(child, quadrant, old, slot);
                    }
                }
            }
        }
    }

    /// Entries whose box overlaps `region`. May contain duplicates.
    pub fn query(&self, region: &Aabb) -> Vec<&T> {
        let mut slots = Vec::new();
        if self.bounds.intersects(region) {
            Self::query_recursive(&self.root, self.bounds, region, &self.entries, &mut slots);
        }
        slots.into_iter().map(|slot| &self.entries[slot]).collect()
    }

    fn query_recursive(
        node: &QuadNode,
        node_region: Aabb,
        region: &Aabb,
        entries: &[T],
        out: &mut Vec<usize>,
    ) {
        match node {
            QuadNode::Leaf { entries: occupants } => {
                out.extend(
                    occupants
                        .iter()
                        .copied()
                        .filter(|&slot| entries[slot].aabb().intersects(region)),
                );
            }
            QuadNode::Internal { children } => {
                for (child, quadrant) in children.iter().zip(node_region.quadrants()) {
                    if quadrant.intersects(region) {
                        Self::query_recursive(child, quadrant, region, entries, out);
                    }
                }
            }
        }
    }

    /// Like [`QuadTree::query`] but each entry appears once, in first-seen order
    pub fn query_unique(&self, region: &Aabb) -> Vec<&T> {
        let mut seen = AHashSet::new();
        self.query(region)
            .into_iter()
            .filter(|entry| seen.insert(entry.id()))
            .collect()
    }

    /// Bounds of every leaf, for debug drawing
    pub fn leaf_regions(&self) -> Vec<Aabb> {
        let mut regions = Vec::new();
        Self::collect_leaves(&self.root, self.bounds, &mut regions);
        regions
    }

    fn collect_leaves(node: &QuadNode, region: Aabb, out: &mut Vec<Aabb>) {
        match node {
            QuadNode::Leaf { .. } => out.push(region),
            QuadNode::Internal { children } => {
                for (child, quadrant) in children.iter().zip(region.quadrants()) {
                    Self::collect_leaves(child, quadrant, out);
                }
            }
        }
    }
}
