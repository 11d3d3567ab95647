//! Modulation signal registry
//!
//! Modulation schemes write one scalar per subscribed signal each tick;
//! connection groups bound to a signal scale their learning by its value.
//! The registry belongs to a single network, so separate agents never share
//! signals.

use serde::{Deserialize, Serialize};

/// Identifier of a modulation signal, allocated monotonically by [`ModulationSignals`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SignalId(usize);

impl SignalId {
    pub fn raw(&self) -> usize {
        self.0
    }
}

impl std::fmt::Display for SignalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Signal({})", self.0)
    }
}

/// Value every signal holds right after allocation or reset
pub const DEFAULT_SIGNAL_VALUE: f64 = 0.0;

#[derive(Debug, Clone, Default)]
pub struct ModulationSignals {
    values: Vec<f64>,
}

impl ModulationSignals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a new signal initialized to [`DEFAULT_SIGNAL_VALUE`]
    pub fn add_signal(&mut self) -> SignalId {
        self.values.push(DEFAULT_SIGNAL_VALUE);
        SignalId(self.values.len() - 1)
    }

    pub fn get(&self, id: SignalId) -> Option<f64> {
        self.values.get(id.0).copied()
    }

    /// Set a signal value. Returns false if the id was never allocated here.
    pub fn set(&mut self, id: SignalId, value: f64) -> bool {
        match self.values.get_mut(id.0) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Zero every signal; allocated ids stay valid
    pub fn reset(&mut self) {
        self.values.fill(DEFAULT_SIGNAL_VALUE);
    }

    /// Drop every signal. Previously handed out ids become invalid.
    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SignalId, f64)> + '_ {
        self.values
            .iter()
            .enumerate()
            .map(|(i, &value)| (SignalId(i), value))
    }
}
