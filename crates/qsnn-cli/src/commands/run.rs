//! Batch inference driven by a run file

use std::fmt::Write as _;
use std::path::PathBuf;
use std::time::Instant;

use clap::Args;
use qsnn_core::{
    ConvGeometry, ConvWeights, DenseWeights, LayerSpec, Network, NetworkBuilder, PackedSpikes, SpikeSource,
};
use serde::Serialize;
use tracing::{debug, info};

use crate::config::{LayerConfig, RunConfig};
use crate::encode::{encode_samples, pack_raw};
use crate::error::{CliError, CliResult};
use crate::loader::{load_labels, load_samples, load_table, Table};

/// Classify every sample described by a run file
#[derive(Args, Debug)]
pub struct RunCommand {
    /// Run file (TOML)
    pub config: PathBuf,

    /// Override the classification output file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Override the rate-encoding seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// Print a JSON summary to stdout
    #[arg(long)]
    pub json: bool,
}

/// Outcome of a batch run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Samples classified
    pub samples: usize,
    /// Classifications matching the label
    pub correct: usize,
    /// Samples where no output neuron fired
    pub unclassified: usize,
    /// `correct / samples`
    pub accuracy: f64,
    /// Weight and bias entries clamped while quantizing
    pub clamped_weights: usize,
    /// Wall time of all inferences, milliseconds
    pub total_ms: f64,
    /// Mean wall time per sample, milliseconds
    pub mean_ms: f64,
    /// Classification file
    pub output: PathBuf,
}

impl RunCommand {
    pub fn execute(self) -> CliResult<()> {
        let mut config = RunConfig::load(&self.config)?;
        if let Some(seed) = self.seed {
            config.data.seed = seed;
        }
        if let Some(output) = self.output {
            config.output = output;
        }

        let tables = load_tables(&config)?;
        let mut network = build_network(&config, &tables)?;
        let spikes = load_spikes(&config)?;
        let labels = load_labels(&config.data.labels)?;
        if labels.len() != spikes.samples() {
            return Err(CliError::data(format!(
                "{} labels for {} samples",
                labels.len(),
                spikes.samples()
            )));
        }

        let clamped: usize = tables.iter().map(|(w, b)| w.clamped + b.clamped).sum();
        let summary = classify_all(&mut network, &spikes, &labels, &config, clamped)?;

        info!(
            "Accuracy {:.2}% ({}/{}), {} unclassified",
            summary.accuracy * 100.0,
            summary.correct,
            summary.samples,
            summary.unclassified
        );
        info!("Time taken: {:.3} ms ({:.3} ms per sample)", summary.total_ms, summary.mean_ms);

        if self.json {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Ok(())
    }
}

/// Load every layer's weight and bias tables, checking shapes
fn load_tables(config: &RunConfig) -> CliResult<Vec<(Table, Table)>> {
    let mut prev = config.input_size;
    let mut tables = Vec::with_capacity(config.layers.len());
    for layer in &config.layers {
        let (weights_len, bias_len) = layer.table_lens(prev);
        let (weights, bias) = layer.tables();
        tables.push((
            load_table(weights, weights_len, layer.quantized())?,
            load_table(bias, bias_len, layer.quantized())?,
        ));
        prev = layer.neurons();
    }
    Ok(tables)
}

fn build_network<'w>(config: &RunConfig, tables: &'w [(Table, Table)]) -> CliResult<Box<Network<'w>>> {
    let mut builder = NetworkBuilder::new()
        .input(config.input_size)
        .params(config.neuron_params())
        .dynamics(config.dynamics.into());

    let mut prev = config.input_size;
    for (layer, (weights, bias)) in config.layers.iter().zip(tables) {
        let spec = match layer {
            LayerConfig::Conv { in_side, kernel, filters, .. } => {
                let geometry = ConvGeometry::new(*in_side, *kernel, *filters)?;
                LayerSpec::Conv(ConvWeights::new(geometry, &weights.values, &bias.values)?)
            }
            LayerConfig::FullyConnected { outputs, .. } => {
                LayerSpec::FullyConnected(DenseWeights::new(prev, *outputs, &weights.values, &bias.values)?)
            }
        };
        debug!("{} layer: {} -> {} neurons", layer.name(), prev, layer.neurons());
        builder = builder.layer(spec);
        prev = layer.neurons();
    }

    let mut network = Box::new(Network::new());
    builder.build_into(&mut network)?;
    info!(
        "Network ready: {} layers, {} inputs, {} classes",
        network.layers().len(),
        network.input_neurons(),
        network.output_neurons()
    );
    Ok(network)
}

fn load_spikes(config: &RunConfig) -> CliResult<PackedSpikes<Vec<u8>>> {
    match (&config.data.samples, &config.data.spikes) {
        (Some(path), _) => {
            let samples = load_samples(path, config.input_size)?;
            info!("Rate-encoding {} samples (seed {})", samples.len(), config.data.seed);
            encode_samples(&samples, config.input_size, config.time_window, config.data.seed)
        }
        (None, Some(path)) => {
            let bytes = std::fs::read(path)
                .map_err(|e| CliError::data(format!("cannot read {}: {}", path.display(), e)))?;
            pack_raw(&bytes, config.input_size, config.time_window)
        }
        (None, None) => Err(CliError::config("data needs `samples` or `spikes`")),
    }
}

fn classify_all<S: SpikeSource>(
    network: &mut Network<'_>,
    spikes: &S,
    labels: &[i64],
    config: &RunConfig,
    clamped_weights: usize,
) -> CliResult<RunSummary> {
    let mut report = String::new();
    let mut correct = 0;
    let mut unclassified = 0;

    let start = Instant::now();
    for (sample, &label) in labels.iter().enumerate() {
        let sample_start = Instant::now();
        let class = network.run_inference(spikes, sample)?;
        debug!(
            "sample {}: {:?} in {:.3} ms, counts {:?}",
            sample,
            class,
            sample_start.elapsed().as_secs_f64() * 1e3,
            network.firing_counts()
        );

        let class = match class {
            Some(c) => c as i64,
            None => {
                unclassified += 1;
                -1
            }
        };
        if class == label {
            correct += 1;
        }
        // String writes are infallible
        let _ = writeln!(report, "Sample {}: Classification = {}, Label = {}", sample, class, label);
    }
    let total = start.elapsed().as_secs_f64() * 1e3;

    if let Some(parent) = config.output.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&config.output, report)?;

    let samples = labels.len();
    Ok(RunSummary {
        samples,
        correct,
        unclassified,
        accuracy: if samples == 0 { 0.0 } else { correct as f64 / samples as f64 },
        clamped_weights,
        total_ms: total,
        mean_ms: if samples == 0 { 0.0 } else { total / samples as f64 },
        output: config.output.clone(),
    })
}
