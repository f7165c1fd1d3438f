//! CLI command implementations for qsnn

use clap::{Parser, Subcommand};

use crate::error::CliResult;

pub mod quantize;
pub mod run;

/// qsnn - quantized spiking neural network inference
#[derive(Parser, Debug)]
#[command(
    name = "qsnn",
    version,
    about = "Quantized spiking neural network inference",
    long_about = "Runs event-driven, fixed-point SNN inference the way it executes on a \
                  microcontroller: Q0.7 weights, bit-packed spikes, chunked LIF updates. \
                  Also converts float weight tables to Q0.7."
)]
pub struct QsnnCli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Classify every sample described by a run file
    Run(run::RunCommand),

    /// Convert a float weight table to Q0.7 integers
    Quantize(quantize::QuantizeCommand),
}

impl QsnnCli {
    /// Execute the CLI command
    pub fn execute(self) -> CliResult<()> {
        match self.command {
            Commands::Run(cmd) => cmd.execute(),
            Commands::Quantize(cmd) => cmd.execute(),
        }
    }
}
