//! Control schemes: how the brain's output turns into steering
//!
//! A scheme writes the sensor vector into the first input group, propagates
//! the network and maps the first output neuron to a heading change.

use glam::DVec2;
use raahn_brain::{NeuralNetwork, NeuronGroupType};
use serde::{Deserialize, Serialize};

/// Output above this turns left under the threshold scheme
pub const CONTROL_THRESHOLD: f64 = 0.5;
/// Degrees per tick
pub const ROTATE_SPEED: f64 = 2.0;
pub const SPEED_X: f64 = 15.0;
pub const SPEED_Y: f64 = 12.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ControlScheme {
    /// Continuous steering proportional to the output
    Steering,
    /// Bang-bang steering around `CONTROL_THRESHOLD`
    Threshold,
}

const SCHEME_NAMES: &[(&str, ControlScheme)] = &[
    ("steering", ControlScheme::Steering),
    ("threshold", ControlScheme::Threshold),
];

impl ControlScheme {
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase();
        SCHEME_NAMES
            .iter()
            .find(|(known, _)| *known == name)
            .map(|&(_, scheme)| scheme)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ControlScheme::Steering => "Steering",
            ControlScheme::Threshold => "Threshold",
        }
    }

    /// Feed `input` to the brain and turn its first output into a motor command.
    ///
    /// A brain without an input or output group yields the neutral command.
    pub fn apply(
        &self,
        params: &ControlParameters,
        input: &[f64],
        brain: &mut NeuralNetwork,
    ) -> MotorCommand {
        let (Some(input_group), Some(output_group)) = (
            brain.first_group(NeuronGroupType::Input),
            brain.first_group(NeuronGroupType::Output),
        ) else {
            return MotorCommand::neutral();
        };

        brain.set_activations(input_group, input);
        brain.propagate();

        let Some(&output) = brain
            .activations(output_group)
            .and_then(|values| values.first())
        else {
            return MotorCommand::neutral();
        };

        let heading_delta = match self {
            ControlScheme::Steering => output * params.rotate_range() - params.rotate_speed,
            ControlScheme::Threshold => {
                if output > CONTROL_THRESHOLD {
                    params.rotate_speed
                } else {
                    -params.rotate_speed
                }
            }
        };

        MotorCommand {
            heading_delta,
            speed: params.speed,
        }
    }
}

/// Heading change in degrees plus per-axis forward speed
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MotorCommand {
    pub heading_delta: f64,
    pub speed: DVec2,
}

impl MotorCommand {
    /// Keeps the car exactly where it is
    pub fn neutral() -> Self {
        Self::default()
    }

    pub fn is_neutral(&self) -> bool {
        self.heading_delta == 0.0 && self.speed == DVec2::ZERO
    }

    /// Displacement after turning from `heading` (degrees)
    pub fn displacement(&self, heading: f64) -> DVec2 {
        let direction = DVec2::from_angle((heading + self.heading_delta).to_radians());
        direction * self.speed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControlParameters {
    pub speed: DVec2,
    pub rotate_speed: f64,
}

impl Default for ControlParameters {
    fn default() -> Self {
        Self {
            speed: DVec2::new(SPEED_X, SPEED_Y),
            rotate_speed: ROTATE_SPEED,
        }
    }
}

impl ControlParameters {
    /// Steering output 0..1 maps to `-rotate_speed..rotate_speed`
    pub fn rotate_range(&self) -> f64 {
        2.0 * self.rotate_speed
    }

    /// Apply `Speed` and `RotateSpeed` entries; other keys belong to other consumers.
    pub fn interpret(&mut self, parameters: &[String]) {
        for (key, value) in parameters.iter().filter_map(|p| parse_parameter(p)) {
            match key.as_str() {
                "speed" => self.speed = DVec2::splat(value),
                "rotatespeed" => self.rotate_speed = value,
                _ => log::debug!("Control scheme ignores parameter {}", key),
            }
        }
    }
}

/// Split a `Name=Value` parameter. Names are lowercased; malformed entries yield `None`.
pub fn parse_parameter(parameter: &str) -> Option<(String, f64)> {
    let (name, value) = parameter.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        log::warn!("Parameter '{}' has no name", parameter);
        return None;
    }
    match value.trim().parse::<f64>() {
        Ok(value) => Some((name.to_ascii_lowercase(), value)),
        Err(_) => {
            log::warn!("Parameter '{}' has a non-numeric value", parameter);
            None
        }
    }
}
