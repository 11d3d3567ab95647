//! The car agent: sensors, brain, control and modulation
//!
//! A car owns its sensor groups and its neural network. Each tick it steers
//! from the current sensor snapshot, moves unless a wall vetoes the motion,
//! re-senses from the new pose and trains its brain under the modulation
//! signals computed from its surroundings.

use std::path::Path;

use glam::DVec2;
use raahn_brain::{NeuralNetwork, NeuronGroupId, NeuronGroupType, SignalId, TrainingMethod};

use crate::collision::{CollisionResolver, MoveOutcome};
use crate::config::{ConfigError, NetworkConfig, NetworkStatus, SensorConfig};
use crate::control::{ControlParameters, ControlScheme, MotorCommand};
use crate::entity::{Entity, EntityId, EntityType, Pose, Spatial};
use crate::geometry::Aabb;
use crate::modulation::{ModulationBinding, ModulationContext, ModulationParameters, ModulationScheme};
use crate::quadtree::QuadTree;
use crate::sensors::{PieSliceSensorGroup, RangeFinderGroup};

pub const CAR_WIDTH: f64 = 40.0;
pub const CAR_HEIGHT: f64 = 20.0;

#[derive(Debug, Clone)]
pub struct Car {
    id: EntityId,
    center: DVec2,
    /// Degrees, kept in [0, 360)
    heading: f64,
    velocity: DVec2,
    size: DVec2,
    brain: NeuralNetwork,
    range_finder_groups: Vec<RangeFinderGroup>,
    pie_slice_sensor_groups: Vec<PieSliceSensorGroup>,
    control_scheme: Option<ControlScheme>,
    control_params: ControlParameters,
    modulation: Vec<ModulationBinding>,
    entities_hovering: Vec<Entity>,
    resolver: CollisionResolver,
    last_move: MoveOutcome,
    status: NetworkStatus,
}

impl Car {
    pub fn new(id: EntityId, center: DVec2, heading: f64) -> Self {
        Self {
            id,
            center,
            heading: heading.rem_euclid(360.0),
            velocity: DVec2::ZERO,
            size: DVec2::new(CAR_WIDTH, CAR_HEIGHT),
            brain: NeuralNetwork::default(),
            range_finder_groups: Vec::new(),
            pie_slice_sensor_groups: Vec::new(),
            control_scheme: None,
            control_params: ControlParameters::default(),
            modulation: Vec::new(),
            entities_hovering: Vec::new(),
            resolver: CollisionResolver::default(),
            last_move: MoveOutcome::Moved,
            status: NetworkStatus::NoNetwork,
        }
    }

    pub fn with_resolver(mut self, resolver: CollisionResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn resolver(&self) -> &CollisionResolver {
        &self.resolver
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn center(&self) -> DVec2 {
        self.center
    }

    pub fn heading(&self) -> f64 {
        self.heading
    }

    pub fn velocity(&self) -> DVec2 {
        self.velocity
    }

    pub fn pose(&self) -> Pose {
        Pose::new(self.center, self.heading)
    }

    pub fn set_pose(&mut self, center: DVec2, heading: f64) {
        self.center = center;
        self.heading = heading.rem_euclid(360.0);
    }

    pub fn aabb(&self) -> Aabb {
        Aabb::around(self.center, self.size * 0.5)
    }

    /// Index entry for the car's current position
    pub fn entity(&self) -> Entity {
        Entity::car(self.id, self.aabb())
    }

    pub fn brain(&self) -> &NeuralNetwork {
        &self.brain
    }

    pub fn brain_mut(&mut self) -> &mut NeuralNetwork {
        &mut self.brain
    }

    pub fn control_scheme(&self) -> Option<ControlScheme> {
        self.control_scheme
    }

    pub fn control_parameters(&self) -> &ControlParameters {
        &self.control_params
    }

    pub fn network_status(&self) -> NetworkStatus {
        self.status
    }

    pub fn modulation_bindings(&self) -> &[ModulationBinding] {
        &self.modulation
    }

    pub fn signal_value(&self, signal: SignalId) -> Option<f64> {
        self.brain.signals().get(signal)
    }

    pub fn range_finder_groups(&self) -> &[RangeFinderGroup] {
        &self.range_finder_groups
    }

    pub fn pie_slice_sensor_groups(&self) -> &[PieSliceSensorGroup] {
        &self.pie_slice_sensor_groups
    }

    pub fn range_finder_count(&self) -> usize {
        self.range_finder_groups.iter().map(RangeFinderGroup::len).sum()
    }

    pub fn pie_slice_sensor_count(&self) -> usize {
        self.pie_slice_sensor_groups
            .iter()
            .map(PieSliceSensorGroup::len)
            .sum()
    }

    pub fn range_finder_reading(&self, group: usize, index: usize) -> Option<f64> {
        self.range_finder_groups.get(group)?.reading(index)
    }

    pub fn pie_slice_reading(&self, group: usize, index: usize) -> Option<f64> {
        self.pie_slice_sensor_groups.get(group)?.reading(index)
    }

    pub fn entities_hovering(&self) -> &[Entity] {
        &self.entities_hovering
    }

    pub fn is_hovering(&self, kind: EntityType) -> bool {
        self.entities_hovering
            .iter()
            .any(|entity| entity.entity_type() == kind)
    }

    pub fn last_move(&self) -> MoveOutcome {
        self.last_move
    }

    /// Range finders scaled to [0, 1], then pie-slice readings, in group order
    pub fn sensor_vector(&self) -> Vec<f64> {
        let ranges = self
            .range_finder_groups
            .iter()
            .flat_map(|group| group.finders().iter().map(|finder| finder.normalized()));
        let slices = self
            .pie_slice_sensor_groups
            .iter()
            .flat_map(|group| group.readings());
        ranges.chain(slices).collect()
    }

    /// Steer from the current sensor snapshot and move unless a wall is in the way
    pub fn drive(&mut self, index: &QuadTree<Entity>) -> MoveOutcome {
        let command = match self.control_scheme {
            Some(scheme) => {
                let input = self.sensor_vector();
                scheme.apply(&self.control_params, &input, &mut self.brain)
            }
            None => MotorCommand::neutral(),
        };

        self.velocity = command.displacement(self.heading);
        self.heading = (self.heading + command.heading_delta).rem_euclid(360.0);

        let projected = self.center + self.velocity;
        let outcome = self.resolver.resolve(self.center, projected, index);
        match outcome {
            MoveOutcome::Moved => self.center = projected,
            MoveOutcome::Blocked { wall } => {
                log::debug!("Car {} blocked by wall {}", self.id, wall);
            }
        }
        self.last_move = outcome;
        outcome
    }

    /// Re-query every sensor group from the current pose
    pub fn sense(&mut self, index: &QuadTree<Entity>) {
        let pose = self.pose();
        for group in &mut self.range_finder_groups {
            group.update(pose, index, Some(self.id));
        }
        for group in &mut self.pie_slice_sensor_groups {
            group.update(pose, index, Some(self.id));
        }
    }

    pub fn update_hovering(&mut self, index: &QuadTree<Entity>) {
        let bounds = self.aabb();
        self.entities_hovering = index
            .query_unique(&bounds)
            .into_iter()
            .filter(|entity| entity.id() != self.id)
            .copied()
            .collect();
    }

    /// Compute modulation signals from the surroundings and train the brain
    pub fn learn(&mut self, index: &QuadTree<Entity>) {
        let nearby = self.resolver.nearby(self.center, index);
        let sensors = self.sensor_vector();
        let context = ModulationContext {
            center: self.center,
            nearby: &nearby,
            hovering: &self.entities_hovering,
            sensors: &sensors,
        };

        for binding in &mut self.modulation {
            binding.apply(&context, self.brain.signals_mut());
        }
        self.brain.train();
    }

    /// One full tick: drive, refresh the car's index entry, sense, then learn
    pub fn update(&mut self, index: &mut QuadTree<Entity>) -> MoveOutcome {
        let outcome = self.drive(index);
        index.insert(self.entity());
        self.sense(index);
        self.update_hovering(index);
        self.learn(index);
        outcome
    }

    /// Refresh sensors and hovering without steering or learning
    pub fn update_minimal(&mut self, index: &QuadTree<Entity>) {
        self.sense(index);
        self.update_hovering(index);
    }

    /// Restore initial weights and clear activations, history and signals.
    /// Topology and modulation bindings are kept.
    pub fn reset_brain(&mut self) {
        self.brain.reset();
        for binding in &mut self.modulation {
            binding.reset();
        }
    }

    /// Release every sensor group
    pub fn clean(&mut self) {
        for group in &mut self.range_finder_groups {
            group.clear();
        }
        for group in &mut self.pie_slice_sensor_groups {
            group.clear();
        }
        self.range_finder_groups.clear();
        self.pie_slice_sensor_groups.clear();
    }

    /// Load sensor and network configs, rebuilding sensors and brain.
    ///
    /// Every given file is parsed before anything changes, so a failed load
    /// keeps the previous configuration.
    pub fn load_config(
        &mut self,
        sensor_path: Option<&Path>,
        network_path: Option<&Path>,
    ) -> Result<NetworkStatus, ConfigError> {
        let sensors = sensor_path.map(SensorConfig::from_file).transpose()?;
        let network = network_path.map(NetworkConfig::from_file).transpose()?;
        Ok(self.apply_config(sensors.as_ref(), network.as_ref()))
    }

    /// Rebuild from already parsed configs
    pub fn apply_config(
        &mut self,
        sensors: Option<&SensorConfig>,
        network: Option<&NetworkConfig>,
    ) -> NetworkStatus {
        self.clean();
        if let Some(config) = sensors {
            self.init_sensors(config);
        }

        self.control_scheme = None;
        self.control_params = ControlParameters::default();
        self.modulation.clear();
        self.status = match network {
            Some(config) => self.init_brain(config),
            None => {
                self.brain = NeuralNetwork::default();
                NetworkStatus::NoNetwork
            }
        };

        log::info!(
            "Car {} configured: {} range finders, {} pie slices, network {:?}",
            self.id,
            self.range_finder_count(),
            self.pie_slice_sensor_count(),
            self.status
        );
        self.status
    }

    fn init_sensors(&mut self, config: &SensorConfig) {
        for group_config in config.range_finder_groups.iter().flatten() {
            let mut group = RangeFinderGroup::new(group_config.count);
            group.configure(
                group_config.length,
                group_config.angle_offset,
                group_config.angle_between,
            );
            for name in &group_config.entities_to_detect {
                add_detect(name, |kind| group.add_entity_to_detect(kind));
            }
            self.range_finder_groups.push(group);
        }

        for group_config in config.pie_slice_sensor_groups.iter().flatten() {
            let mut group = PieSliceSensorGroup::new(group_config.count);
            group.configure_sensors(
                group_config.max_detection,
                group_config.angle_offset,
                group_config.angle_between,
                group_config.outer_radius,
                group_config.inner_radius,
            );
            for name in &group_config.entities_to_detect {
                add_detect(name, |kind| group.add_entity_to_detect(kind));
            }
            self.pie_slice_sensor_groups.push(group);
        }
    }

    fn init_brain(&mut self, config: &NetworkConfig) -> NetworkStatus {
        // Even a config that stops early leaves a fresh, trainable brain
        self.brain = NeuralNetwork::new(config.network_parameters());

        let Some(neuron_groups) = &config.neuron_groups else {
            log::info!("Network config has no neuron groups, continuing without them");
            return NetworkStatus::NoNeuronGroups;
        };
        let Some(connection_groups) = &config.connection_groups else {
            log::info!("Network config has no connection groups, continuing without them");
            return NetworkStatus::NoConnectionGroups;
        };
        let Some(control_scheme) = config.control_scheme.as_deref().and_then(|name| {
            let scheme = ControlScheme::from_name(name);
            if scheme.is_none() {
                log::info!("Unknown control scheme '{}'", name);
            }
            scheme
        }) else {
            log::info!("Network config has no usable control scheme, the car will not move");
            return NetworkStatus::NoControlScheme;
        };

        let group_ids: Vec<NeuronGroupId> = neuron_groups
            .iter()
            .map(|group| {
                let kind = NeuronGroupType::from_name(&group.kind).unwrap_or_else(|| {
                    log::warn!("Unknown neuron group type '{}', using Hidden", group.kind);
                    NeuronGroupType::Hidden
                });
                self.brain.add_neuron_group(group.count, kind)
            })
            .collect();

        for connection in connection_groups {
            let (Some(&input), Some(&output)) = (
                group_ids.get(config.group_index(connection.input_group)),
                group_ids.get(config.group_index(connection.output_group)),
            ) else {
                log::warn!("Connection has no neuron group to attach to, skipping");
                continue;
            };

            let method = TrainingMethod::from_name(&connection.training_method).unwrap_or_else(|| {
                log::warn!(
                    "Unknown training method '{}', using Hebbian",
                    connection.training_method
                );
                TrainingMethod::Hebbian
            });

            let scheme = match connection.modulation_scheme.as_deref() {
                Some(name) if !name.trim().is_empty() => {
                    let scheme = ModulationScheme::from_name(name);
                    if scheme.is_none() {
                        log::warn!("Unknown modulation scheme '{}', connection is unmodulated", name);
                    }
                    scheme
                }
                _ if config.use_novelty => Some(ModulationScheme::Novelty),
                _ => None,
            };

            let signal = scheme.map(|scheme| self.subscribe(scheme, config.parameters()));
            self.brain.connect_groups(
                input,
                output,
                method,
                signal,
                connection.learning_rate,
                connection.use_bias,
            );
        }

        self.control_scheme = Some(control_scheme);
        self.control_params.interpret(config.parameters());
        NetworkStatus::Complete
    }

    /// New signal for `scheme`, sharing one binding per scheme
    fn subscribe(&mut self, scheme: ModulationScheme, parameters: &[String]) -> SignalId {
        let signal = self.brain.signals_mut().add_signal();
        let index = match self.modulation.iter().position(|b| b.scheme() == scheme) {
            Some(index) => index,
            None => {
                let mut params = ModulationParameters::default();
                params.interpret(scheme, parameters);
                self.modulation.push(ModulationBinding::new(scheme, params));
                self.modulation.len() - 1
            }
        };
        self.modulation[index].subscribe(signal);
        signal
    }
}

fn add_detect(name: &str, mut add: impl FnMut(EntityType)) {
    match EntityType::from_name(name) {
        EntityType::None => log::debug!("Ignoring unknown entity type '{}'", name),
        kind => add(kind),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConnectionConfig, NeuronGroupConfig, RangeFinderGroupConfig};
    use crate::geometry::LineSegment;

    fn world() -> QuadTree<Entity> {
        QuadTree::new(Aabb::from_position_size(
            DVec2::splat(-1000.0),
            DVec2::splat(2000.0),
        ))
    }

    fn sensors() -> SensorConfig {
        SensorConfig {
            range_finder_groups: Some(vec![RangeFinderGroupConfig {
                count: 3,
                length: 100.0,
                angle_offset: -45.0,
                angle_between: 45.0,
                entities_to_detect: vec!["Wall".into(), "Spaceship".into()],
            }]),
            pie_slice_sensor_groups: None,
        }
    }

    fn network(scheme: Option<&str>) -> NetworkConfig {
        NetworkConfig {
            seed: 5,
            control_scheme: Some("Steering".into()),
            parameters: Some(vec!["RoadReward=2".into()]),
            neuron_groups: Some(vec![
                NeuronGroupConfig {
                    id: 10,
                    count: 3,
                    kind: "Input".into(),
                },
                NeuronGroupConfig {
                    id: 20,
                    count: 1,
                    kind: "Output".into(),
                },
            ]),
            connection_groups: Some(vec![ConnectionConfig {
                input_group: 10,
                output_group: 20,
                use_bias: true,
                learning_rate: 0.1,
                training_method: "Hebbian".into(),
                modulation_scheme: scheme.map(String::from),
            }]),
            ..NetworkConfig::default()
        }
    }

    #[test]
    fn test_apply_config_builds_sensors_and_brain() {
        let mut car = Car::new(EntityId::from_raw(1), DVec2::ZERO, 0.0);
        let status = car.apply_config(Some(&sensors()), Some(&network(Some("Road"))));

        assert_eq!(status, NetworkStatus::Complete);
        assert_eq!(car.range_finder_count(), 3);
        assert_eq!(
            car.range_finder_groups()[0].filter().kinds(),
            &[EntityType::Wall]
        );
        assert_eq!(car.brain().neuron_groups().len(), 2);
        assert_eq!(car.brain().connection_groups().len(), 1);
        assert_eq!(car.control_scheme(), Some(ControlScheme::Steering));

        let binding = &car.modulation_bindings()[0];
        assert_eq!(binding.scheme(), ModulationScheme::Road);
        assert_eq!(binding.params().road_reward, 2.0);
    }

    #[test]
    fn test_use_novelty_binds_unmodulated_connections() {
        let mut car = Car::new(EntityId::from_raw(1), DVec2::ZERO, 0.0);
        let config = NetworkConfig {
            use_novelty: true,
            ..network(None)
        };
        car.apply_config(None, Some(&config));

        assert_eq!(car.modulation_bindings()[0].scheme(), ModulationScheme::Novelty);
        assert!(car.brain().connection_groups()[0].modulation().is_some());
    }

    #[test]
    fn test_unknown_control_scheme_degrades() {
        let mut car = Car::new(EntityId::from_raw(1), DVec2::ZERO, 0.0);
        let config = NetworkConfig {
            control_scheme: Some("Autopilot".into()),
            ..network(None)
        };

        assert_eq!(car.apply_config(None, Some(&config)), NetworkStatus::NoControlScheme);
        assert!(car.control_scheme().is_none());
    }

    #[test]
    fn test_missing_connection_groups_degrades_to_stationary_car() {
        let mut index = world();
        let mut car = Car::new(EntityId::from_raw(1), DVec2::new(5.0, 5.0), 0.0);
        index.insert(car.entity());
        let config = NetworkConfig {
            connection_groups: None,
            ..network(Some("Road"))
        };

        assert_eq!(
            car.apply_config(Some(&sensors()), Some(&config)),
            NetworkStatus::NoConnectionGroups
        );
        assert!(car.control_scheme().is_none());
        assert!(car.modulation_bindings().is_empty());

        for _ in 0..10 {
            assert_eq!(car.update(&mut index), MoveOutcome::Moved);
        }
        assert_eq!(car.center(), DVec2::new(5.0, 5.0));
        assert_eq!(car.velocity(), DVec2::ZERO);
        assert!(car.brain().connection_groups().is_empty());
        assert_eq!(car.range_finder_count(), 3, "sensors still work");
    }

    #[test]
    fn test_unknown_group_id_attaches_to_first_group() {
        let mut car = Car::new(EntityId::from_raw(1), DVec2::ZERO, 0.0);
        let mut config = network(None);
        if let Some(connections) = config.connection_groups.as_mut() {
            connections[0].input_group = 99;
        }

        assert_eq!(car.apply_config(None, Some(&config)), NetworkStatus::Complete);
        let connection = &car.brain().connection_groups()[0];
        assert_eq!(connection.input().index, 0);
        assert_eq!(connection.input().kind, NeuronGroupType::Input);
        assert_eq!(connection.output().index, 1);
        assert_eq!(connection.weights().dim(), (1, 3));
    }

    #[test]
    fn test_drive_without_scheme_stays_put() {
        let mut index = world();
        let mut car = Car::new(EntityId::from_raw(1), DVec2::new(5.0, 5.0), 30.0);
        index.insert(car.entity());

        for _ in 0..5 {
            assert_eq!(car.update(&mut index), MoveOutcome::Moved);
        }
        assert_eq!(car.center(), DVec2::new(5.0, 5.0));
        assert_eq!(car.heading(), 30.0);
    }

    #[test]
    fn test_drive_moves_and_wall_blocks() {
        let mut index = world();
        index.insert(Entity::wall(
            EntityId::from_raw(2),
            LineSegment::new(DVec2::new(40.0, -500.0), DVec2::new(40.0, 500.0)),
        ));
        let mut car = Car::new(EntityId::from_raw(1), DVec2::ZERO, 0.0);
        car.apply_config(Some(&sensors()), Some(&network(None)));
        index.insert(car.entity());

        let mut blocked = false;
        for _ in 0..20 {
            if car.update(&mut index).is_blocked() {
                blocked = true;
                break;
            }
        }

        assert!(blocked, "car heading east must reach the wall");
        assert!(car.center().x < 40.0);
        let indexed = index.get(car.id()).unwrap().aabb().center();
        assert!(indexed.distance(car.center()) < 1e-9, "index follows the car");
    }

    #[test]
    fn test_hovering_tracks_roads() {
        let mut index = world();
        index.insert(Entity::road(
            EntityId::from_raw(2),
            Aabb::from_position_size(DVec2::new(-50.0, -50.0), DVec2::splat(100.0)),
        ));
        let mut car = Car::new(EntityId::from_raw(1), DVec2::ZERO, 0.0);
        index.insert(car.entity());

        car.update_minimal(&index);
        assert!(car.is_hovering(EntityType::Road));
        assert!(!car.is_hovering(EntityType::Car), "the car never hovers itself");

        car.set_pose(DVec2::new(500.0, 500.0), 0.0);
        index.insert(car.entity());
        car.update_minimal(&index);
        assert!(car.entities_hovering().is_empty());
    }

    #[test]
    fn test_failed_load_keeps_previous_config() {
        let mut car = Car::new(EntityId::from_raw(1), DVec2::ZERO, 0.0);
        car.apply_config(Some(&sensors()), Some(&network(Some("Wall"))));

        let missing = Path::new("/no/such/network.ron");
        assert!(car.load_config(None, Some(missing)).is_err());

        assert_eq!(car.range_finder_count(), 3);
        assert_eq!(car.network_status(), NetworkStatus::Complete);
        assert_eq!(car.modulation_bindings().len(), 1);
    }

    #[test]
    fn test_clean_releases_sensors() {
        let mut car = Car::new(EntityId::from_raw(1), DVec2::ZERO, 0.0);
        car.apply_config(Some(&sensors()), None);
        car.clean();

        assert_eq!(car.range_finder_count(), 0);
        assert!(car.sensor_vector().is_empty());
    }
}
