//! The car's brain: neuron groups, the connections between them and the
//! modulation signals that gate their plasticity.

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

use crate::connection::{ConnectionGroup, TrainingMethod, sigmoid};
use crate::modulation::{ModulationSignals, SignalId};
use crate::neuron_group::{NeuronGroup, NeuronGroupId, NeuronGroupType};

/// Hyperparameters read from the network config
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NetworkParameters {
    /// Samples kept per autoencoder connection (values below 1 behave as 1)
    pub history_buffer_size: usize,
    /// Absolute weight limit; `<= 0` disables capping
    pub weight_cap: f64,
    /// Uniform noise added to output activations after propagation
    pub output_noise_magnitude: f64,
    /// Uniform noise added to weights after every training step
    pub weight_noise_magnitude: f64,
    /// Seed for weight initialization and noise
    pub seed: u64,
}

impl Default for NetworkParameters {
    fn default() -> Self {
        Self {
            history_buffer_size: 1,
            weight_cap: 0.0,
            output_noise_magnitude: 0.0,
            weight_noise_magnitude: 0.0,
            seed: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NeuralNetwork {
    groups: Vec<NeuronGroup>,
    connections: Vec<ConnectionGroup>,
    signals: ModulationSignals,
    params: NetworkParameters,
    rng: Xoshiro256PlusPlus,
}

impl Default for NeuralNetwork {
    fn default() -> Self {
        Self::new(NetworkParameters::default())
    }
}

impl NeuralNetwork {
    pub fn new(params: NetworkParameters) -> Self {
        Self {
            groups: Vec::new(),
            connections: Vec::new(),
            signals: ModulationSignals::new(),
            params,
            rng: Xoshiro256PlusPlus::seed_from_u64(params.seed),
        }
    }

    pub fn params(&self) -> &NetworkParameters {
        &self.params
    }

    pub fn add_neuron_group(&mut self, count: usize, kind: NeuronGroupType) -> NeuronGroupId {
        self.groups.push(NeuronGroup::new(count, kind));
        NeuronGroupId {
            index: self.groups.len() - 1,
            kind,
        }
    }

    fn is_valid(&self, id: NeuronGroupId) -> bool {
        self.groups
            .get(id.index)
            .is_some_and(|group| group.kind() == id.kind)
    }

    /// Connect two existing groups. Returns the connection index, or `None`
    /// if either id does not name a group of this network.
    pub fn connect_groups(
        &mut self,
        input: NeuronGroupId,
        output: NeuronGroupId,
        method: TrainingMethod,
        modulation: Option<SignalId>,
        learning_rate: f64,
        use_bias: bool,
    ) -> Option<usize> {
        if !self.is_valid(input) || !self.is_valid(output) {
            log::warn!("Cannot connect {} -> {}: unknown neuron group", input, output);
            return None;
        }

        let connection = ConnectionGroup::new(
            input,
            output,
            self.groups[input.index].len(),
            self.groups[output.index].len(),
            method,
            modulation,
            learning_rate,
            use_bias,
            &mut self.rng,
        );
        self.connections.push(connection);
        Some(self.connections.len() - 1)
    }

    pub fn neuron_groups(&self) -> &[NeuronGroup] {
        &self.groups
    }

    pub fn connection_groups(&self) -> &[ConnectionGroup] {
        &self.connections
    }

    pub fn group(&self, id: NeuronGroupId) -> Option<&NeuronGroup> {
        self.groups.get(id.index).filter(|group| group.kind() == id.kind)
    }

    /// First group of the given type, in insertion order
    pub fn first_group(&self, kind: NeuronGroupType) -> Option<NeuronGroupId> {
        self.groups
            .iter()
            .position(|group| group.kind() == kind)
            .map(|index| NeuronGroupId { index, kind })
    }

    pub fn activations(&self, id: NeuronGroupId) -> Option<&[f64]> {
        self.group(id).map(NeuronGroup::activations)
    }

    /// Write values into a group (normally an input group). Returns false for unknown ids.
    pub fn set_activations(&mut self, id: NeuronGroupId, values: &[f64]) -> bool {
        if !self.is_valid(id) {
            return false;
        }
        self.groups[id.index].set_activations(values);
        true
    }

    pub fn signals(&self) -> &ModulationSignals {
        &self.signals
    }

    pub fn signals_mut(&mut self) -> &mut ModulationSignals {
        &mut self.signals
    }

    /// Recompute every non-input group that has at least one incoming
    /// connection, in insertion order. Groups later in the order see this
    /// tick's values of earlier groups; recurrent links see last tick's.
    pub fn propagate(&mut self) {
        for index in 0..self.groups.len() {
            let kind = self.groups[index].kind();
            if kind == NeuronGroupType::Input {
                continue;
            }

            let mut total: Option<ndarray::Array1<f64>> = None;
            for connection in self.connections.iter().filter(|c| c.output().index == index) {
                let pre = self.groups[connection.input().index].activations();
                let contribution = connection.forward(pre);
                total = Some(match total {
                    Some(sum) => sum + contribution,
                    None => contribution,
                });
            }

            let Some(total) = total else {
                continue;
            };

            let noise = self.params.output_noise_magnitude;
            let activations = self.groups[index].activations_mut();
            for (activation, &net) in activations.iter_mut().zip(total.iter()) {
                *activation = sigmoid(net);
                if kind == NeuronGroupType::Output && noise > 0.0 {
                    *activation =
                        (*activation + self.rng.gen_range(-noise..noise)).clamp(0.0, 1.0);
                }
            }
        }
    }

    /// One learning step over every connection group using the current
    /// activations and modulation signals. A network without connections
    /// trains as a no-op.
    pub fn train(&mut self) {
        let NetworkParameters {
            history_buffer_size,
            weight_cap,
            weight_noise_magnitude,
            ..
        } = self.params;

        for connection in &mut self.connections {
            let modulation = match connection.modulation() {
                Some(id) => self.signals.get(id).unwrap_or(0.0),
                None => 1.0,
            };
            let pre = self.groups[connection.input().index].activations();
            let post = self.groups[connection.output().index].activations();

            connection.train(pre, post, modulation, history_buffer_size);
            connection.perturb_and_cap(&mut self.rng, weight_noise_magnitude, weight_cap);
        }
    }

    /// Forget everything learned while keeping the topology and signal bindings.
    ///
    /// The RNG is reseeded and weights are redrawn in connection order, so a
    /// reset network behaves exactly like a freshly built one.
    pub fn reset(&mut self) {
        self.rng = Xoshiro256PlusPlus::seed_from_u64(self.params.seed);
        for connection in &mut self.connections {
            connection.randomize_weights(&mut self.rng);
        }
        for group in &mut self.groups {
            group.clear();
        }
        self.signals.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> NetworkParameters {
        NetworkParameters {
            history_buffer_size: 4,
            weight_cap: 5.0,
            output_noise_magnitude: 0.01,
            weight_noise_magnitude: 0.001,
            seed: 42,
        }
    }

    /// input(3) -> hidden(2) -> output(1), hidden trained as autoencoder
    fn build(params: NetworkParameters) -> (NeuralNetwork, NeuronGroupId, NeuronGroupId) {
        let mut brain = NeuralNetwork::new(params);
        let input = brain.add_neuron_group(3, NeuronGroupType::Input);
        let hidden = brain.add_neuron_group(2, NeuronGroupType::Hidden);
        let output = brain.add_neuron_group(1, NeuronGroupType::Output);
        let signal = brain.signals_mut().add_signal();

        brain
            .connect_groups(input, hidden, TrainingMethod::Autoencoder, None, 0.1, true)
            .unwrap();
        brain
            .connect_groups(hidden, output, TrainingMethod::Hebbian, Some(signal), 0.05, false)
            .unwrap();
        (brain, input, output)
    }

    fn run(brain: &mut NeuralNetwork, input: NeuronGroupId, ticks: usize) {
        for tick in 0..ticks {
            let x = tick as f64 * 0.1;
            brain.set_activations(input, &[x.sin().abs(), 0.5, x.cos().abs()]);
            brain.propagate();
            let first_signal = brain.signals().iter().next().map(|(id, _)| id);
            if let Some(id) = first_signal {
                brain.signals_mut().set(id, 0.5);
            }
            brain.train();
        }
    }

    #[test]
    fn test_empty_network_trains_without_effect() {
        let mut brain = NeuralNetwork::default();
        brain.propagate();
        brain.train();
        brain.reset();

        assert!(brain.neuron_groups().is_empty());
        assert!(brain.connection_groups().is_empty());
    }

    #[test]
    fn test_connect_rejects_unknown_groups() {
        let mut brain = NeuralNetwork::default();
        let input = brain.add_neuron_group(2, NeuronGroupType::Input);
        let bogus = NeuronGroupId {
            index: 9,
            kind: NeuronGroupType::Output,
        };
        let mistyped = NeuronGroupId {
            index: input.index,
            kind: NeuronGroupType::Hidden,
        };

        assert!(
            brain
                .connect_groups(input, bogus, TrainingMethod::Hebbian, None, 0.1, false)
                .is_none()
        );
        assert!(
            brain
                .connect_groups(mistyped, input, TrainingMethod::Hebbian, None, 0.1, false)
                .is_none()
        );
        assert!(brain.connection_groups().is_empty());
    }

    #[test]
    fn test_propagate_produces_sigmoid_range() {
        let (mut brain, input, output) = build(params());
        brain.set_activations(input, &[1.0, 0.0, 1.0]);
        brain.propagate();

        let out = brain.activations(output).unwrap();
        assert_eq!(out.len(), 1);
        assert!((0.0..=1.0).contains(&out[0]));
    }

    #[test]
    fn test_input_groups_are_not_overwritten() {
        let (mut brain, input, _) = build(params());
        brain.set_activations(input, &[0.25, 0.5, 0.75]);
        brain.propagate();

        assert_eq!(brain.activations(input).unwrap(), &[0.25, 0.5, 0.75]);
    }

    #[test]
    fn test_unbound_modulated_connection_learns_nothing_until_signalled() {
        let mut brain = NeuralNetwork::new(NetworkParameters::default());
        let input = brain.add_neuron_group(1, NeuronGroupType::Input);
        let output = brain.add_neuron_group(1, NeuronGroupType::Output);
        let signal = brain.signals_mut().add_signal();
        brain
            .connect_groups(input, output, TrainingMethod::Hebbian, Some(signal), 1.0, false)
            .unwrap();

        brain.set_activations(input, &[1.0]);
        brain.propagate();
        let before = brain.connection_groups()[0].weights()[(0, 0)];
        brain.train();
        assert_eq!(brain.connection_groups()[0].weights()[(0, 0)], before);

        brain.signals_mut().set(signal, 1.0);
        brain.train();
        assert!(brain.connection_groups()[0].weights()[(0, 0)] > before);
    }

    #[test]
    fn test_weight_cap_holds_during_training() {
        let (mut brain, input, _) = build(NetworkParameters {
            weight_cap: 0.6,
            ..params()
        });
        run(&mut brain, input, 200);

        for connection in brain.connection_groups() {
            assert!(connection.weights().iter().all(|w| w.abs() <= 0.6));
        }
    }

    #[test]
    fn test_reset_matches_fresh_network() {
        let (mut trained, input, output) = build(params());
        run(&mut trained, input, 50);
        trained.reset();

        let (mut fresh, fresh_input, fresh_output) = build(params());

        for (a, b) in trained
            .connection_groups()
            .iter()
            .zip(fresh.connection_groups())
        {
            assert_eq!(a.weights(), b.weights());
            assert_eq!(a.history_len(), 0);
        }

        run(&mut trained, input, 1);
        run(&mut fresh, fresh_input, 1);
        assert_eq!(trained.activations(output), fresh.activations(fresh_output));
        assert!(trained.signals().iter().all(|(_, v)| v == 0.5));
    }

    #[test]
    fn test_reset_keeps_topology_and_signals() {
        let (mut brain, input, _) = build(params());
        run(&mut brain, input, 10);
        brain.reset();

        assert_eq!(brain.neuron_groups().len(), 3);
        assert_eq!(brain.connection_groups().len(), 2);
        assert_eq!(brain.signals().len(), 1);
        assert!(brain.signals().iter().all(|(_, v)| v == 0.0));
        assert!(
            brain
                .neuron_groups()
                .iter()
                .all(|group| group.activations().iter().all(|&a| a == 0.0))
        );
    }

    #[test]
    fn test_same_seed_is_deterministic() {
        let (mut a, input_a, output_a) = build(params());
        let (mut b, input_b, output_b) = build(params());
        run(&mut a, input_a, 30);
        run(&mut b, input_b, 30);

        assert_eq!(a.activations(output_a), b.activations(output_b));
    }
}
