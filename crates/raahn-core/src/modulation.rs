//! Modulation schemes: scalar reward signals computed from the car's
//! surroundings and written into the brain's signal registry each tick.

use std::collections::VecDeque;

use glam::DVec2;
use raahn_brain::{ModulationSignals, SignalId};
use serde::{Deserialize, Serialize};

use crate::control::parse_parameter;
use crate::entity::{Entity, EntityType, Spatial};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModulationScheme {
    /// Penalize being close to walls
    Wall,
    /// Reward staying on roads
    Road,
    /// Reward unfamiliar sensor readings
    Novelty,
}

const SCHEME_NAMES: &[(&str, ModulationScheme)] = &[
    ("wall", ModulationScheme::Wall),
    ("road", ModulationScheme::Road),
    ("novelty", ModulationScheme::Novelty),
];

impl ModulationScheme {
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase();
        SCHEME_NAMES
            .iter()
            .find(|(known, _)| *known == name)
            .map(|&(_, scheme)| scheme)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ModulationScheme::Wall => "Wall",
            ModulationScheme::Road => "Road",
            ModulationScheme::Novelty => "Novelty",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModulationParameters {
    pub wall_distance: f64,
    pub wall_penalty: f64,
    pub wall_reward: f64,
    pub road_reward: f64,
    pub road_penalty: f64,
    pub novelty_archive_size: usize,
    pub novelty_scale: f64,
}

impl Default for ModulationParameters {
    fn default() -> Self {
        Self {
            wall_distance: 40.0,
            wall_penalty: -1.0,
            wall_reward: 0.25,
            road_reward: 1.0,
            road_penalty: -1.0,
            novelty_archive_size: 50,
            novelty_scale: 1.0,
        }
    }
}

impl ModulationParameters {
    /// Apply the `Name=Value` entries that belong to `scheme`
    pub fn interpret(&mut self, scheme: ModulationScheme, parameters: &[String]) {
        for (key, value) in parameters.iter().filter_map(|p| parse_parameter(p)) {
            match (scheme, key.as_str()) {
                (ModulationScheme::Wall, "walldistance") => self.wall_distance = value,
                (ModulationScheme::Wall, "wallpenalty") => self.wall_penalty = value,
                (ModulationScheme::Wall, "wallreward") => self.wall_reward = value,
                (ModulationScheme::Road, "roadreward") => self.road_reward = value,
                (ModulationScheme::Road, "roadpenalty") => self.road_penalty = value,
                (ModulationScheme::Novelty, "noveltyarchivesize") => {
                    self.novelty_archive_size = value.max(1.0) as usize
                }
                (ModulationScheme::Novelty, "noveltyscale") => self.novelty_scale = value,
                _ => {}
            }
        }
    }
}

/// What a scheme may look at when computing its signal
#[derive(Debug, Clone, Copy)]
pub struct ModulationContext<'a> {
    pub center: DVec2,
    /// Entities in the car's query window
    pub nearby: &'a [&'a Entity],
    pub hovering: &'a [Entity],
    /// Normalized sensor vector of this tick
    pub sensors: &'a [f64],
}

/// One scheme, computed once per tick and written to every subscribed signal
#[derive(Debug, Clone)]
pub struct ModulationBinding {
    scheme: ModulationScheme,
    signals: Vec<SignalId>,
    params: ModulationParameters,
    archive: VecDeque<Vec<f64>>,
    last_value: f64,
}

impl ModulationBinding {
    pub fn new(scheme: ModulationScheme, params: ModulationParameters) -> Self {
        Self {
            scheme,
            signals: Vec::new(),
            params,
            archive: VecDeque::new(),
            last_value: 0.0,
        }
    }

    pub fn scheme(&self) -> ModulationScheme {
        self.scheme
    }

    pub fn signals(&self) -> &[SignalId] {
        &self.signals
    }

    pub fn params(&self) -> &ModulationParameters {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut ModulationParameters {
        &mut self.params
    }

    pub fn subscribe(&mut self, signal: SignalId) {
        if !self.signals.contains(&signal) {
            self.signals.push(signal);
        }
    }

    /// Value written on the most recent tick
    pub fn last_value(&self) -> f64 {
        self.last_value
    }

    pub fn compute(&mut self, context: &ModulationContext<'_>) -> f64 {
        let value = match self.scheme {
            ModulationScheme::Wall => self.wall(context),
            ModulationScheme::Road => self.road(context),
            ModulationScheme::Novelty => self.novelty(context),
        };
        self.last_value = value;
        value
    }

    /// Compute and write the value to every subscribed signal
    pub fn apply(&mut self, context: &ModulationContext<'_>, registry: &mut ModulationSignals) {
        let value = self.compute(context);
        for &signal in &self.signals {
            if !registry.set(signal, value) {
                log::warn!("{} modulation targets unknown signal {}", self.scheme.name(), signal);
            }
        }
    }

    /// Forget per-episode state
    pub fn reset(&mut self) {
        self.archive.clear();
        self.last_value = 0.0;
    }

    fn wall(&self, context: &ModulationContext<'_>) -> f64 {
        let near_wall = context
            .nearby
            .iter()
            .filter(|entity| entity.entity_type() == EntityType::Wall)
            .flat_map(|entity| entity.boundary())
            .any(|edge| edge.distance_to_point(context.center) <= self.params.wall_distance);

        if near_wall {
            self.params.wall_penalty
        } else {
            self.params.wall_reward
        }
    }

    fn road(&self, context: &ModulationContext<'_>) -> f64 {
        let on_road = context
            .hovering
            .iter()
            .any(|entity| entity.entity_type() == EntityType::Road);

        if on_road {
            self.params.road_reward
        } else {
            self.params.road_penalty
        }
    }

    fn novelty(&mut self, context: &ModulationContext<'_>) -> f64 {
        let current = context.sensors;
        let novelty = if self.archive.is_empty() {
            1.0
        } else {
            let total: f64 = self
                .archive
                .iter()
                .map(|past| distance(past, current))
                .sum();
            (total / self.archive.len() as f64 * self.params.novelty_scale).clamp(0.0, 1.0)
        };

        self.archive.push_back(current.to_vec());
        while self.archive.len() > self.params.novelty_archive_size.max(1) {
            self.archive.pop_front();
        }
        novelty
    }
}

/// Euclidean distance, treating missing trailing components as zero
fn distance(a: &[f64], b: &[f64]) -> f64 {
    let len = a.len().max(b.len());
    (0..len)
        .map(|i| {
            let d = a.get(i).copied().unwrap_or(0.0) - b.get(i).copied().unwrap_or(0.0);
            d * d
        })
        .sum::<f64>()
        .sqrt()
}
