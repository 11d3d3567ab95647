//! Neuron groups: ordered activation vectors tagged by their role in the network.

use serde::{Deserialize, Serialize};

/// Role of a neuron group inside the network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NeuronGroupType {
    /// Written from outside (sensor readings); never recomputed by propagation
    Input,
    Hidden,
    /// Read by control schemes; receives output noise
    Output,
}

impl NeuronGroupType {
    /// Parse a group type name as written in network configs (case-insensitive)
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "input" => Some(Self::Input),
            "hidden" => Some(Self::Hidden),
            "output" => Some(Self::Output),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Input => "Input",
            Self::Hidden => "Hidden",
            Self::Output => "Output",
        }
    }
}

/// Opaque handle to a neuron group, stable for the lifetime of its network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NeuronGroupId {
    pub index: usize,
    pub kind: NeuronGroupType,
}

impl std::fmt::Display for NeuronGroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}Group({})", self.kind.name(), self.index)
    }
}

/// A group of neurons sharing one role
#[derive(Debug, Clone)]
pub struct NeuronGroup {
    kind: NeuronGroupType,
    activations: Vec<f64>,
}

impl NeuronGroup {
    pub fn new(count: usize, kind: NeuronGroupType) -> Self {
        Self {
            kind,
            activations: vec![0.0; count],
        }
    }

    pub fn kind(&self) -> NeuronGroupType {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.activations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.activations.is_empty()
    }

    pub fn activations(&self) -> &[f64] {
        &self.activations
    }

    /// Copy `values` into the group, truncating extras and zero-filling the rest
    pub fn set_activations(&mut self, values: &[f64]) {
        for (i, activation) in self.activations.iter_mut().enumerate() {
            *activation = values.get(i).copied().unwrap_or(0.0);
        }
    }

    pub(crate) fn activations_mut(&mut self) -> &mut [f64] {
        &mut self.activations
    }

    pub fn clear(&mut self) {
        self.activations.fill(0.0);
    }
}
