//! Run file for `qsnn run`
//!
//! A TOML document describing the network, its weight tables and the data
//! to classify. Relative paths resolve against the run file's directory.
//!
//! ```toml
//! input_size = 784
//! time_window = 100
//! threshold = 1.0
//! decay = 0.95
//! dynamics = "leaky"
//! output = "model_output.txt"
//!
//! [data]
//! samples = "mnist_samples.txt"
//! labels = "mnist_labels.txt"
//! seed = 42
//!
//! [[layers]]
//! kind = "conv"
//! in_side = 28
//! kernel = 3
//! filters = 4
//! weights = "conv1_weights.txt"
//! bias = "conv1_bias.txt"
//!
//! [[layers]]
//! kind = "fully_connected"
//! outputs = 10
//! weights = "fc1_weights.txt"
//! bias = "fc1_bias.txt"
//! ```

use std::path::{Path, PathBuf};

use qsnn_core::{Dynamics, NeuronParams, MAX_CHUNKS, MAX_LAYERS, TAU};
use serde::{Deserialize, Serialize};

use crate::error::{CliError, CliResult};

fn default_threshold() -> f32 {
    1.0
}

fn default_decay() -> f32 {
    0.95
}

fn default_output() -> PathBuf {
    PathBuf::from("model_output.txt")
}

/// Top-level run description
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Input neurons (pixels per sample)
    pub input_size: usize,

    /// Timesteps per sample, a multiple of the chunk length
    pub time_window: usize,

    /// Firing threshold as a float, encoded to Q0.7
    #[serde(default = "default_threshold")]
    pub threshold: f32,

    /// Membrane decay per step as a float, encoded to Q0.7
    #[serde(default = "default_decay")]
    pub decay: f32,

    /// Membrane dynamics
    #[serde(default)]
    pub dynamics: DynamicsConfig,

    /// Classification output file
    #[serde(default = "default_output")]
    pub output: PathBuf,

    /// Samples and labels
    pub data: DataConfig,

    /// Weighted layers after the input layer, in order
    pub layers: Vec<LayerConfig>,
}

/// Membrane dynamics as spelled in the run file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DynamicsConfig {
    /// Leaky integrate-and-fire
    #[default]
    Leaky,
    /// Integrate-and-fire without decay
    NonLeaky,
}

impl From<DynamicsConfig> for Dynamics {
    fn from(value: DynamicsConfig) -> Self {
        match value {
            DynamicsConfig::Leaky => Dynamics::Leaky,
            DynamicsConfig::NonLeaky => Dynamics::NonLeaky,
        }
    }
}

/// Where the input spikes come from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Pixel intensities (0-255), one sample per line, rate-encoded on load
    pub samples: Option<PathBuf>,

    /// Pre-encoded spikes: one byte (0 or 1) per `[sample][t][neuron]`
    pub spikes: Option<PathBuf>,

    /// One integer label per line
    pub labels: PathBuf,

    /// Seed for rate encoding
    #[serde(default)]
    pub seed: u64,
}

/// One weighted layer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LayerConfig {
    /// Convolution over a square plane
    Conv {
        /// Side of the input plane
        in_side: usize,
        /// Side of the kernel
        kernel: usize,
        /// Number of filters
        filters: usize,
        /// Kernel table, `[ky][kx][filter]`
        weights: PathBuf,
        /// One bias per filter
        bias: PathBuf,
        /// Tables already hold Q0.7 integers
        #[serde(default)]
        quantized: bool,
    },
    /// Dense layer
    FullyConnected {
        /// Neurons in this layer
        outputs: usize,
        /// Weight table, `[input][neuron]`
        weights: PathBuf,
        /// One bias per neuron
        bias: PathBuf,
        /// Tables already hold Q0.7 integers
        #[serde(default)]
        quantized: bool,
    },
}

impl LayerConfig {
    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::Conv { .. } => "conv",
            Self::FullyConnected { .. } => "fc",
        }
    }

    /// Neuron count given the size of the previous layer
    pub fn neurons(&self) -> usize {
        match self {
            Self::Conv { in_side, kernel, filters, .. } => {
                let out = in_side.saturating_sub(*kernel) + 1;
                out * out * filters
            }
            Self::FullyConnected { outputs, .. } => *outputs,
        }
    }

    /// Expected `(weights, bias)` table lengths given the previous layer size
    pub fn table_lens(&self, inputs: usize) -> (usize, usize) {
        match self {
            Self::Conv { kernel, filters, .. } => (kernel * kernel * filters, *filters),
            Self::FullyConnected { outputs, .. } => (inputs * outputs, *outputs),
        }
    }

    /// Paths of the weight and bias tables
    pub fn tables(&self) -> (&Path, &Path) {
        match self {
            Self::Conv { weights, bias, .. } | Self::FullyConnected { weights, bias, .. } => {
                (weights.as_path(), bias.as_path())
            }
        }
    }

    /// Whether the tables are stored pre-quantized
    pub fn quantized(&self) -> bool {
        match self {
            Self::Conv { quantized, .. } | Self::FullyConnected { quantized, .. } => *quantized,
        }
    }

    fn tables_mut(&mut self) -> (&mut PathBuf, &mut PathBuf) {
        match self {
            Self::Conv { weights, bias, .. } | Self::FullyConnected { weights, bias, .. } => (weights, bias),
        }
    }
}

impl RunConfig {
    /// Load, resolve and validate a run file
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CliError::config(format!("cannot read run file {}: {}", path.display(), e)))?;
        let mut config: Self = toml::from_str(&content)?;
        config.resolve_paths(path.parent().unwrap_or_else(|| Path::new(".")));
        config.validate()?;
        Ok(config)
    }

    /// Make every relative path relative to `base`
    pub fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        resolve(&mut self.output);
        resolve(&mut self.data.labels);
        if let Some(p) = self.data.samples.as_mut() {
            resolve(p);
        }
        if let Some(p) = self.data.spikes.as_mut() {
            resolve(p);
        }
        for layer in self.layers.iter_mut() {
            let (weights, bias) = layer.tables_mut();
            resolve(weights);
            resolve(bias);
        }
    }

    /// Check everything that can be checked before touching the data
    pub fn validate(&self) -> CliResult<()> {
        if self.input_size == 0 {
            return Err(CliError::config("input_size must be positive"));
        }
        if self.time_window == 0 || self.time_window % TAU != 0 {
            return Err(CliError::config(format!(
                "time_window must be a positive multiple of {} (got {})",
                TAU, self.time_window
            )));
        }
        if self.time_window / TAU > MAX_CHUNKS {
            return Err(CliError::config(format!(
                "time_window {} exceeds {} chunks of {}",
                self.time_window, MAX_CHUNKS, TAU
            )));
        }
        if !(self.threshold > 0.0) {
            return Err(CliError::config("threshold must be positive"));
        }
        if !(self.decay >= 0.0) {
            return Err(CliError::config("decay must not be negative"));
        }
        match (&self.data.samples, &self.data.spikes) {
            (Some(_), None) | (None, Some(_)) => {}
            _ => return Err(CliError::config("data needs exactly one of `samples` or `spikes`")),
        }
        if self.layers.is_empty() {
            return Err(CliError::config("at least one weighted layer is required"));
        }
        if self.layers.len() + 1 > MAX_LAYERS {
            return Err(CliError::config(format!(
                "{} layers requested, this build supports {}",
                self.layers.len() + 1,
                MAX_LAYERS
            )));
        }

        let mut prev = self.input_size;
        for (index, layer) in self.layers.iter().enumerate() {
            if let LayerConfig::Conv { in_side, kernel, .. } = layer {
                if in_side * in_side != prev {
                    return Err(CliError::config(format!(
                        "layer {}: conv plane {}x{} does not match {} inputs",
                        index + 1,
                        in_side,
                        in_side,
                        prev
                    )));
                }
                if kernel > in_side {
                    return Err(CliError::config(format!("layer {}: kernel larger than input", index + 1)));
                }
            }
            prev = layer.neurons();
        }
        Ok(())
    }

    /// Neuron parameters in Q0.7
    pub fn neuron_params(&self) -> NeuronParams {
        NeuronParams::from_float(self.threshold, self.decay)
    }

    /// Output classes
    pub fn outputs(&self) -> usize {
        self.layers.last().map_or(self.input_size, LayerConfig::neurons)
    }
}
