//! Connection groups: weighted, directed links between two neuron groups
//!
//! Weights are stored as an `outputs × inputs` matrix so a forward pass is a
//! single `W · pre` product. Each group carries its own training rule and an
//! optional modulation signal that scales the rule every tick.

use std::collections::VecDeque;

use ndarray::{Array1, Array2, ArrayView1};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::modulation::SignalId;
use crate::neuron_group::NeuronGroupId;

/// Initial weights are drawn uniformly from `±INITIAL_WEIGHT_RANGE`
pub const INITIAL_WEIGHT_RANGE: f64 = 0.5;

/// Update rule applied to a connection group on every training step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrainingMethod {
    /// `Δw_ij = rate · post_i · pre_j`
    Hebbian,
    /// Tied-weight autoencoder over a history of recent input vectors
    Autoencoder,
}

impl TrainingMethod {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "hebbian" => Some(Self::Hebbian),
            "autoencoder" => Some(Self::Autoencoder),
            _ => None,
        }
    }
}

pub(crate) fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

#[derive(Debug, Clone)]
pub struct ConnectionGroup {
    input: NeuronGroupId,
    output: NeuronGroupId,
    weights: Array2<f64>,
    bias: Option<Array1<f64>>,
    // Decoder bias, only touched by the autoencoder rule
    reconstruction_bias: Array1<f64>,
    learning_rate: f64,
    method: TrainingMethod,
    modulation: Option<SignalId>,
    history: VecDeque<Array1<f64>>,
}

impl ConnectionGroup {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new<R: Rng>(
        input: NeuronGroupId,
        output: NeuronGroupId,
        input_len: usize,
        output_len: usize,
        method: TrainingMethod,
        modulation: Option<SignalId>,
        learning_rate: f64,
        use_bias: bool,
        rng: &mut R,
    ) -> Self {
        let mut group = Self {
            input,
            output,
            weights: Array2::zeros((output_len, input_len)),
            bias: use_bias.then(|| Array1::zeros(output_len)),
            reconstruction_bias: Array1::zeros(input_len),
            learning_rate,
            method,
            modulation,
            history: VecDeque::new(),
        };
        group.randomize_weights(rng);
        group
    }

    /// Draw fresh initial weights and forget everything learned
    pub(crate) fn randomize_weights<R: Rng>(&mut self, rng: &mut R) {
        let shape = self.weights.dim();
        self.weights = Array2::from_shape_fn(shape, |_| {
            rng.gen_range(-INITIAL_WEIGHT_RANGE..INITIAL_WEIGHT_RANGE)
        });
        if let Some(bias) = &mut self.bias {
            bias.fill(0.0);
        }
        self.reconstruction_bias.fill(0.0);
        self.history.clear();
    }

    pub fn input(&self) -> NeuronGroupId {
        self.input
    }

    pub fn output(&self) -> NeuronGroupId {
        self.output
    }

    pub fn weights(&self) -> &Array2<f64> {
        &self.weights
    }

    pub fn bias(&self) -> Option<&Array1<f64>> {
        self.bias.as_ref()
    }

    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    pub fn method(&self) -> TrainingMethod {
        self.method
    }

    pub fn modulation(&self) -> Option<SignalId> {
        self.modulation
    }

    /// Number of samples currently held for autoencoder training
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Weighted input this group feeds into its output group: `W · pre + b`
    pub(crate) fn forward(&self, pre: &[f64]) -> Array1<f64> {
        let mut out = self.weights.dot(&ArrayView1::from(pre));
        if let Some(bias) = &self.bias {
            out += bias;
        }
        out
    }

    /// One training step. `modulation` is the bound signal value, or 1.0 when unbound.
    pub(crate) fn train(
        &mut self,
        pre: &[f64],
        post: &[f64],
        modulation: f64,
        history_capacity: usize,
    ) {
        let rate = self.learning_rate * modulation;
        match self.method {
            TrainingMethod::Hebbian => self.train_hebbian(pre, post, rate),
            TrainingMethod::Autoencoder => self.train_autoencoder(pre, rate, history_capacity),
        }
    }

    fn train_hebbian(&mut self, pre: &[f64], post: &[f64], rate: f64) {
        if rate == 0.0 {
            return;
        }
        for ((i, j), w) in self.weights.indexed_iter_mut() {
            *w += rate * post[i] * pre[j];
        }
        if let Some(bias) = &mut self.bias {
            for (b, &p) in bias.iter_mut().zip(post) {
                *b += rate * p;
            }
        }
    }

    fn train_autoencoder(&mut self, pre: &[f64], rate: f64, history_capacity: usize) {
        self.history.push_back(Array1::from(pre.to_vec()));
        while self.history.len() > history_capacity.max(1) {
            self.history.pop_front();
        }

        let history = std::mem::take(&mut self.history);
        for sample in &history {
            self.autoencoder_step(sample, rate);
        }
        self.history = history;
    }

    fn encode(&self, sample: ArrayView1<f64>) -> Array1<f64> {
        let mut hidden = self.weights.dot(&sample);
        if let Some(bias) = &self.bias {
            hidden += bias;
        }
        hidden.mapv_into(sigmoid)
    }

    fn decode(&self, hidden: &Array1<f64>) -> Array1<f64> {
        (self.weights.t().dot(hidden) + &self.reconstruction_bias).mapv_into(sigmoid)
    }

    fn autoencoder_step(&mut self, sample: &Array1<f64>, rate: f64) {
        let hidden = self.encode(sample.view());
        let reconstructed = self.decode(&hidden);

        let delta_out = (&reconstructed - sample) * &reconstructed.mapv(|v| v * (1.0 - v));
        let delta_hidden = self.weights.dot(&delta_out) * &hidden.mapv(|v| v * (1.0 - v));

        // Tied weights: W appears in both the encoder and the decoder
        for ((i, j), w) in self.weights.indexed_iter_mut() {
            *w -= rate * (hidden[i] * delta_out[j] + delta_hidden[i] * sample[j]);
        }
        if let Some(bias) = &mut self.bias {
            bias.scaled_add(-rate, &delta_hidden);
        }
        self.reconstruction_bias.scaled_add(-rate, &delta_out);
    }

    /// Squared reconstruction error of `sample` through the tied autoencoder
    pub fn reconstruction_error(&self, sample: &[f64]) -> f64 {
        let hidden = self.encode(ArrayView1::from(sample));
        let reconstructed = self.decode(&hidden);
        reconstructed
            .iter()
            .zip(sample)
            .map(|(r, s)| (r - s) * (r - s))
            .sum::<f64>()
            * 0.5
    }

    /// Perturb weights by `±noise` and clamp them to `±cap`. Non-positive values disable either step.
    pub(crate) fn perturb_and_cap<R: Rng>(&mut self, rng: &mut R, noise: f64, cap: f64) {
        if noise > 0.0 {
            self.weights
                .mapv_inplace(|w| w + rng.gen_range(-noise..noise));
        }
        if cap > 0.0 {
            self.weights.mapv_inplace(|w| w.clamp(-cap, cap));
            if let Some(bias) = &mut self.bias {
                bias.mapv_inplace(|b| b.clamp(-cap, cap));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::neuron_group::NeuronGroupType;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn ids() -> (NeuronGroupId, NeuronGroupId) {
        (
            NeuronGroupId {
                index: 0,
                kind: NeuronGroupType::Input,
            },
            NeuronGroupId {
                index: 1,
                kind: NeuronGroupType::Output,
            },
        )
    }

    fn group(method: TrainingMethod, inputs: usize, outputs: usize) -> ConnectionGroup {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(7);
        let (input, output) = ids();
        ConnectionGroup::new(
            input, output, inputs, outputs, method, None, 0.1, true, &mut rng,
        )
    }

    #[test]
    fn test_training_method_from_name() {
        assert_eq!(
            TrainingMethod::from_name("Hebbian"),
            Some(TrainingMethod::Hebbian)
        );
        assert_eq!(
            TrainingMethod::from_name("autoencoder"),
            Some(TrainingMethod::Autoencoder)
        );
        assert_eq!(TrainingMethod::from_name("backprop"), None);
    }

    #[test]
    fn test_initial_weights_in_range() {
        let group = group(TrainingMethod::Hebbian, 6, 4);

        assert_eq!(group.weights().dim(), (4, 6));
        for &w in group.weights() {
            assert!(w.abs() <= INITIAL_WEIGHT_RANGE);
        }
        assert!(group.bias().unwrap().iter().all(|&b| b == 0.0));
    }

    #[test]
    fn test_hebbian_strengthens_coactive_pairs() {
        let mut group = group(TrainingMethod::Hebbian, 2, 1);
        let before = group.weights().clone();

        group.train(&[1.0, 0.0], &[1.0], 1.0, 1);

        let after = group.weights();
        assert!((after[(0, 0)] - before[(0, 0)] - 0.1).abs() < 1e-12);
        assert_eq!(after[(0, 1)], before[(0, 1)], "inactive input unchanged");
    }

    #[test]
    fn test_negative_modulation_reverses_hebbian_update() {
        let mut group = group(TrainingMethod::Hebbian, 1, 1);
        let before = group.weights()[(0, 0)];

        group.train(&[1.0], &[1.0], -1.0, 1);

        assert!(group.weights()[(0, 0)] < before);
    }

    #[test]
    fn test_zero_modulation_freezes_weights() {
        let mut group = group(TrainingMethod::Hebbian, 3, 2);
        let before = group.weights().clone();

        group.train(&[1.0, 1.0, 1.0], &[1.0, 1.0], 0.0, 1);

        assert_eq!(group.weights(), &before);
    }

    #[test]
    fn test_autoencoder_reduces_reconstruction_error() {
        let mut group = group(TrainingMethod::Autoencoder, 4, 2);
        let sample = [0.9, 0.1, 0.8, 0.2];
        let initial = group.reconstruction_error(&sample);

        for _ in 0..500 {
            group.train(&sample, &[0.0, 0.0], 1.0, 4);
        }

        assert!(group.reconstruction_error(&sample) < initial);
    }

    #[test]
    fn test_autoencoder_history_is_bounded() {
        let mut group = group(TrainingMethod::Autoencoder, 2, 2);

        for i in 0..10 {
            group.train(&[i as f64 * 0.1, 0.5], &[0.0, 0.0], 1.0, 3);
        }
        assert_eq!(group.history_len(), 3);

        group.train(&[0.1, 0.1], &[0.0, 0.0], 1.0, 0);
        assert_eq!(group.history_len(), 1, "capacity zero keeps the current sample");
    }

    #[test]
    fn test_weight_cap_clamps() {
        let mut group = group(TrainingMethod::Hebbian, 2, 2);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);

        for _ in 0..100 {
            group.train(&[1.0, 1.0], &[1.0, 1.0], 1.0, 1);
        }
        group.perturb_and_cap(&mut rng, 0.0, 2.0);

        assert!(group.weights().iter().all(|w| w.abs() <= 2.0));
        assert!(group.bias().unwrap().iter().all(|b| b.abs() <= 2.0));
    }
}
