//! Sensor and network configuration files
//!
//! Both documents are RON with implicit `Some`, so optional sections can be
//! written without wrapping them in `Some(...)`. Missing sections are not
//! errors; they put the car in a reduced mode reported by [`NetworkStatus`].

use std::path::{Path, PathBuf};

use raahn_brain::NetworkParameters;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("failed to read config file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ron::error::SpannedError,
    },
}

/// How much of the network config could be used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetworkStatus {
    /// Groups, connections and a control scheme are all in place
    Complete,
    /// No network file was given
    NoNetwork,
    NoNeuronGroups,
    NoConnectionGroups,
    /// Missing or unknown control scheme; the car will not move
    NoControlScheme,
}

impl NetworkStatus {
    pub fn is_complete(&self) -> bool {
        matches!(self, NetworkStatus::Complete)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeFinderGroupConfig {
    pub count: usize,
    pub length: f64,
    #[serde(default)]
    pub angle_offset: f64,
    #[serde(default)]
    pub angle_between: f64,
    #[serde(default)]
    pub entities_to_detect: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PieSliceSensorGroupConfig {
    pub count: usize,
    pub max_detection: usize,
    #[serde(default)]
    pub angle_offset: f64,
    pub angle_between: f64,
    pub outer_radius: f64,
    #[serde(default)]
    pub inner_radius: f64,
    #[serde(default)]
    pub entities_to_detect: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    pub range_finder_groups: Option<Vec<RangeFinderGroupConfig>>,
    pub pie_slice_sensor_groups: Option<Vec<PieSliceSensorGroupConfig>>,
}

impl SensorConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        load_ron(path.as_ref())
    }

    pub fn from_ron(text: &str) -> Result<Self, ConfigError> {
        parse_ron(text, Path::new("<inline>"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeuronGroupConfig {
    pub id: u32,
    pub count: usize,
    /// `Input`, `Hidden` or `Output`
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub input_group: u32,
    pub output_group: u32,
    #[serde(default)]
    pub use_bias: bool,
    pub learning_rate: f64,
    /// `Hebbian` or `Autoencoder`
    pub training_method: String,
    #[serde(default)]
    pub modulation_scheme: Option<String>,
}

fn default_history_buffer_size() -> usize {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Connections without an explicit scheme are modulated by novelty
    #[serde(default)]
    pub use_novelty: bool,
    #[serde(default = "default_history_buffer_size")]
    pub history_buffer_size: usize,
    #[serde(default)]
    pub weight_cap: f64,
    #[serde(default)]
    pub output_noise_magnitude: f64,
    #[serde(default)]
    pub weight_noise_magnitude: f64,
    #[serde(default)]
    pub seed: u64,
    #[serde(default)]
    pub control_scheme: Option<String>,
    /// Free-form `Name=Value` entries read by the control and modulation schemes
    #[serde(default)]
    pub parameters: Option<Vec<String>>,
    #[serde(default)]
    pub neuron_groups: Option<Vec<NeuronGroupConfig>>,
    #[serde(default)]
    pub connection_groups: Option<Vec<ConnectionConfig>>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            use_novelty: false,
            history_buffer_size: default_history_buffer_size(),
            weight_cap: 0.0,
            output_noise_magnitude: 0.0,
            weight_noise_magnitude: 0.0,
            seed: 0,
            control_scheme: None,
            parameters: None,
            neuron_groups: None,
            connection_groups: None,
        }
    }
}

impl NetworkConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        load_ron(path.as_ref())
    }

    pub fn from_ron(text: &str) -> Result<Self, ConfigError> {
        parse_ron(text, Path::new("<inline>"))
    }

    pub fn network_parameters(&self) -> NetworkParameters {
        NetworkParameters {
            history_buffer_size: self.history_buffer_size,
            weight_cap: self.weight_cap,
            output_noise_magnitude: self.output_noise_magnitude,
            weight_noise_magnitude: self.weight_noise_magnitude,
            seed: self.seed,
        }
    }

    pub fn parameters(&self) -> &[String] {
        self.parameters.as_deref().unwrap_or_default()
    }

    /// Position of the group with config id `id`, falling back to the first group
    pub fn group_index(&self, id: u32) -> usize {
        let groups = self.neuron_groups.as_deref().unwrap_or_default();
        match groups.iter().position(|group| group.id == id) {
            Some(index) => index,
            None => {
                log::warn!("Neuron group id {} not found, using the first group", id);
                0
            }
        }
    }
}

fn load_ron<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    if !path.exists() {
        log::error!("Config file not found: {}", path.display());
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }

    let text = std::fs::read_to_string(path).map_err(|source| {
        log::error!("Failed to read {}: {}", path.display(), source);
        ConfigError::Read {
            path: path.to_path_buf(),
            source,
        }
    })?;

    parse_ron(&text, path)
}

fn parse_ron<T: DeserializeOwned>(text: &str, path: &Path) -> Result<T, ConfigError> {
    ron::Options::default()
        .with_default_extension(ron::extensions::Extensions::IMPLICIT_SOME)
        .from_str(text)
        .map_err(|source| {
            log::error!("Failed to parse {}: {}", path.display(), source);
            ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            }
        })
}
