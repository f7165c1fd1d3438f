//! Float table to Q0.7 conversion

use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use qsnn_core::fixed_point::quantize_slice;
use tracing::{info, warn};

use crate::error::CliResult;
use crate::loader::parse_floats;

/// Convert a float weight table to Q0.7 integers, one per line
#[derive(Args, Debug)]
pub struct QuantizeCommand {
    /// Float table (whitespace or comma separated)
    pub input: PathBuf,

    /// Output file of Q0.7 integers
    pub output: PathBuf,
}

impl QuantizeCommand {
    pub fn execute(self) -> CliResult<()> {
        let text = std::fs::read_to_string(&self.input)?;
        let floats = parse_floats(&text).with_context(|| format!("in {}", self.input.display()))?;

        let mut values = vec![0i8; floats.len()];
        let clamped = quantize_slice(&floats, &mut values);

        let mut out = String::with_capacity(values.len() * 5);
        for v in &values {
            // String writes are infallible
            let _ = writeln!(out, "{}", v);
        }
        std::fs::write(&self.output, out)?;

        if clamped > 0 {
            warn!("{} of {} values clamped to [-1.0, 0.9921875]", clamped, values.len());
        }
        info!(
            "Quantized {} values from {} into {} ({} clamped)",
            values.len(),
            self.input.display(),
            self.output.display(),
            clamped
        );
        Ok(())
    }
}
