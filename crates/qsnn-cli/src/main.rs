//! # qsnn - quantized spiking neural network inference
//!
//! Host driver for the fixed-point SNN engine: classifies rate-encoded
//! samples with Q0.7 weight tables and converts float tables to Q0.7.

use clap::Parser;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use qsnn_cli::error::CliResult;
use qsnn_cli::QsnnCli;

fn main() -> CliResult<()> {
    // Parse CLI arguments
    let cli = QsnnCli::parse();

    // Initialize logging with environment variable support; stdout is kept
    // for command output
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();

    // Execute the command
    if let Err(err) = cli.execute() {
        error!("Command failed: {}", err);
        std::process::exit(1);
    }

    Ok(())
}
