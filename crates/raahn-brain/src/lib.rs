//! Neuromodulated neural controller for the RAAHN car
//!
//! This crate implements:
//! - Neuron groups with input/hidden/output roles
//! - Connection groups trained by Hebbian or autoencoder rules
//! - A per-network registry of modulation signals that scale plasticity
//!
//! It knows nothing about the world; `raahn-core` feeds it sensor readings
//! and reads motor outputs back.

pub mod connection;
pub mod modulation;
pub mod network;
pub mod neuron_group;

pub use connection::{ConnectionGroup, TrainingMethod};
pub use modulation::{ModulationSignals, SignalId};
pub use network::{NetworkParameters, NeuralNetwork};
pub use neuron_group::{NeuronGroup, NeuronGroupId, NeuronGroupType};
