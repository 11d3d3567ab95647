//! Per-tick orchestration of the world and the car

use std::path::Path;

use glam::DVec2;
use raahn_brain::SignalId;

use crate::car::Car;
use crate::collision::{CollisionResolver, MoveOutcome};
use crate::config::{ConfigError, NetworkConfig, NetworkStatus, SensorConfig};
use crate::entity::{Entity, EntityId, EntityType, Pose, Spatial};
use crate::geometry::{Aabb, LineSegment};
use crate::map::MapConfig;
use crate::quadtree::QuadTree;

/// Extra room around the map so a car on the border stays indexed
const INDEX_MARGIN: f64 = 100.0;

const CAR_ID: EntityId = EntityId::from_raw(0);

pub struct Simulation {
    index: QuadTree<Entity>,
    car: Car,
    next_id: u64,
    ticks: u64,
}

impl Simulation {
    /// Empty world covering `bounds` with the car at `center`
    pub fn new(bounds: Aabb, center: DVec2, heading: f64) -> Self {
        Self::with_car(bounds, Car::new(CAR_ID, center, heading))
    }

    fn with_car(bounds: Aabb, car: Car) -> Self {
        let mut index = QuadTree::new(bounds.expanded(INDEX_MARGIN));
        index.insert(car.entity());
        Self {
            index,
            car,
            next_id: CAR_ID.raw() + 1,
            ticks: 0,
        }
    }

    /// World sized to hold every piece of map geometry
    pub fn from_map(map: &MapConfig) -> Self {
        let (center, heading) = map.start();
        let mut car = Car::new(CAR_ID, center, heading);
        if let Some((half_width, half_height)) = map.collision_window {
            car = car.with_resolver(CollisionResolver::new(DVec2::new(half_width, half_height)));
        }

        let mut simulation = Self::with_car(map.extent(), car);
        for segment in map.wall_segments() {
            simulation.add_wall(segment);
        }
        for aabb in map.road_boxes() {
            simulation.add_road(aabb);
        }
        for position in map.point_positions() {
            simulation.add_point(position);
        }

        log::info!(
            "Map loaded: {} walls, {} roads, {} points",
            map.walls.len(),
            map.roads.len(),
            map.points.len()
        );
        simulation
    }

    fn allocate_id(&mut self) -> EntityId {
        let id = EntityId::from_raw(self.next_id);
        self.next_id += 1;
        id
    }

    fn register(&mut self, entity: Entity) -> EntityId {
        if !self.index.bounds().intersects(&entity.aabb()) {
            log::warn!(
                "{} {} lies outside the world and will not be sensed or collided with",
                entity.kind(),
                entity.id()
            );
        }
        let id = entity.id();
        self.index.insert(entity);
        id
    }

    pub fn add_wall(&mut self, segment: LineSegment) -> EntityId {
        let id = self.allocate_id();
        self.register(Entity::wall(id, segment))
    }

    pub fn add_road(&mut self, aabb: Aabb) -> EntityId {
        let id = self.allocate_id();
        self.register(Entity::road(id, aabb))
    }

    pub fn add_point(&mut self, position: DVec2) -> EntityId {
        let id = self.allocate_id();
        self.register(Entity::point(id, position))
    }

    pub fn remove_entity(&mut self, id: EntityId) -> Option<Entity> {
        if id == self.car.id() {
            return None;
        }
        self.index.remove(id)
    }

    pub fn load_config(
        &mut self,
        sensor_path: Option<&Path>,
        network_path: Option<&Path>,
    ) -> Result<NetworkStatus, ConfigError> {
        let status = self.car.load_config(sensor_path, network_path)?;
        self.car.update_minimal(&self.index);
        Ok(status)
    }

    /// Rebuild the car from already parsed configs and take a first sensor reading
    pub fn apply_config(
        &mut self,
        sensors: Option<&SensorConfig>,
        network: Option<&NetworkConfig>,
    ) -> NetworkStatus {
        let status = self.car.apply_config(sensors, network);
        self.car.update_minimal(&self.index);
        status
    }

    /// Advance one frame: drive, refresh the index, sense, learn
    pub fn tick(&mut self) -> MoveOutcome {
        let outcome = self.car.update(&mut self.index);
        self.ticks += 1;
        outcome
    }

    pub fn run(&mut self, ticks: u64) {
        for _ in 0..ticks {
            self.tick();
        }
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn car(&self) -> &Car {
        &self.car
    }

    pub fn car_mut(&mut self) -> &mut Car {
        &mut self.car
    }

    pub fn index(&self) -> &QuadTree<Entity> {
        &self.index
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> + '_ {
        self.index.entries().iter()
    }

    pub fn count(&self, kind: EntityType) -> usize {
        self.entities().filter(|e| e.entity_type() == kind).count()
    }

    pub fn pose(&self) -> Pose {
        self.car.pose()
    }

    /// Move the car without collision checks, e.g. to start a new episode
    pub fn teleport_car(&mut self, center: DVec2, heading: f64) {
        self.car.set_pose(center, heading);
        self.index.insert(self.car.entity());
        self.car.update_minimal(&self.index);
    }

    pub fn range_finder_reading(&self, group: usize, index: usize) -> Option<f64> {
        self.car.range_finder_reading(group, index)
    }

    pub fn pie_slice_reading(&self, group: usize, index: usize) -> Option<f64> {
        self.car.pie_slice_reading(group, index)
    }

    pub fn entities_hovering(&self) -> &[Entity] {
        self.car.entities_hovering()
    }

    pub fn signal_value(&self, signal: SignalId) -> Option<f64> {
        self.car.signal_value(signal)
    }

    pub fn reset_brain(&mut self) {
        self.car.reset_brain();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map() -> MapConfig {
        MapConfig::from_ron(
            r#"(
                width: 400.0,
                height: 400.0,
                robot: (x: 50.0, y: 50.0, angle: 0.0),
                walls: [((0.0, 0.0), (400.0, 0.0)), ((0.0, 400.0), (400.0, 400.0))],
                roads: [(0.0, 30.0, 400.0, 40.0)],
                points: [(200.0, 50.0)],
            )"#,
        )
        .unwrap()
    }

    #[test]
    fn test_from_map_registers_everything() {
        let simulation = Simulation::from_map(&map());

        assert_eq!(simulation.count(EntityType::Wall), 2);
        assert_eq!(simulation.count(EntityType::Road), 1);
        assert_eq!(simulation.count(EntityType::Point), 1);
        assert_eq!(simulation.count(EntityType::Car), 1);
        assert_eq!(simulation.pose(), Pose::new(DVec2::new(50.0, 50.0), 0.0));
    }

    #[test]
    fn test_ids_are_unique() {
        let simulation = Simulation::from_map(&map());
        let mut ids: Vec<_> = simulation.entities().map(|e| e.id()).collect();
        ids.sort();
        ids.dedup();

        assert_eq!(ids.len(), simulation.index().len());
    }

    #[test]
    fn test_tick_without_config_is_stationary() {
        let mut simulation = Simulation::from_map(&map());
        simulation.run(10);

        assert_eq!(simulation.ticks(), 10);
        assert_eq!(simulation.pose().center, DVec2::new(50.0, 50.0));
        assert!(
            simulation
                .entities_hovering()
                .iter()
                .any(|e| e.entity_type() == EntityType::Road)
        );
    }

    #[test]
    fn test_car_cannot_be_removed() {
        let mut simulation = Simulation::from_map(&map());
        let car_id = simulation.car().id();

        assert!(simulation.remove_entity(car_id).is_none());
        let wall = simulation
            .entities()
            .find(|e| e.entity_type() == EntityType::Wall)
            .map(|e| e.id())
            .unwrap();
        assert!(simulation.remove_entity(wall).is_some());
        assert_eq!(simulation.count(EntityType::Wall), 1);
    }

    #[test]
    fn test_map_walls_at_negative_coordinates_block() {
        let map = MapConfig::from_ron(
            r#"(
                width: 400.0,
                height: 400.0,
                robot: (x: -140.0, y: 50.0),
                walls: [((-150.0, -500.0), (-150.0, 500.0))],
            )"#,
        )
        .unwrap();
        let simulation = Simulation::from_map(&map);

        let outcome = simulation.car().resolver().resolve(
            DVec2::new(-140.0, 50.0),
            DVec2::new(-170.0, 50.0),
            simulation.index(),
        );
        assert!(outcome.is_blocked());
        assert!(simulation.index().bounds().contains_point(DVec2::new(-150.0, -500.0)));
    }

    #[test]
    fn test_map_collision_window_reaches_the_car() {
        let mut windowed = map();
        windowed.collision_window = Some((50.0, 25.0));
        let simulation = Simulation::from_map(&windowed);

        assert_eq!(
            simulation.car().resolver().half_extents(),
            DVec2::new(50.0, 25.0)
        );
        assert_eq!(
            Simulation::from_map(&map()).car().resolver().half_extents(),
            CollisionResolver::default().half_extents()
        );
    }

    #[test]
    fn test_teleport_updates_index_and_hovering() {
        let mut simulation = Simulation::from_map(&map());
        simulation.teleport_car(DVec2::new(300.0, 300.0), 90.0);

        assert!(simulation.entities_hovering().is_empty());
        let entry = simulation.index().get(simulation.car().id()).unwrap();
        assert!(entry.aabb().center().distance(DVec2::new(300.0, 300.0)) < 1e-9);
    }
}
