//! RAAHN drive simulation core
//!
//! This crate implements:
//! - Geometry primitives and a quadtree over world entities
//! - Range-finder and pie-slice sensor groups
//! - Wall collision for the car's motion
//! - Control and modulation schemes linking the world to the brain
//! - Config and map loading, and the per-tick `Simulation`

pub mod car;
pub mod collision;
pub mod config;
pub mod control;
pub mod entity;
pub mod geometry;
pub mod map;
pub mod modulation;
pub mod quadtree;
pub mod sensors;
pub mod simulation;

pub use car::Car;
pub use collision::{CollisionResolver, MoveOutcome};
pub use config::{ConfigError, NetworkConfig, NetworkStatus, SensorConfig};
pub use control::{ControlParameters, ControlScheme, MotorCommand};
pub use entity::{Entity, EntityFilter, EntityId, EntityType, Pose, Spatial};
pub use geometry::{Aabb, LineSegment};
pub use map::MapConfig;
pub use modulation::{ModulationBinding, ModulationContext, ModulationParameters, ModulationScheme};
pub use quadtree::QuadTree;
pub use sensors::{PieSliceSensorGroup, RangeFinderGroup};
pub use simulation::Simulation;

pub use raahn_brain;
