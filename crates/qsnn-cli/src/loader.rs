//! Text loaders for weight tables, samples and labels
//!
//! Tables are plain numbers separated by whitespace or commas, in the order
//! the engine stores them. Float tables are quantized to Q0.7 on load.

use std::path::Path;

use anyhow::{anyhow, Context};
use qsnn_core::fixed_point::quantize_slice;
use tracing::{debug, warn};

use crate::error::{CliError, CliResult};

/// A Q0.7 table and the number of float entries that had to be clamped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    /// Quantized values
    pub values: Vec<i8>,
    /// Entries outside [-1.0, 127/128] clamped during quantization
    pub clamped: usize,
}

fn tokens(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| c.is_whitespace() || c == ',').filter(|s| !s.is_empty())
}

fn read(path: &Path) -> CliResult<String> {
    std::fs::read_to_string(path).map_err(|e| CliError::data(format!("cannot read {}: {}", path.display(), e)))
}

/// Parse every number in `text` as a float
pub fn parse_floats(text: &str) -> anyhow::Result<Vec<f32>> {
    tokens(text)
        .enumerate()
        .map(|(i, tok)| {
            let v: f32 = tok.parse().with_context(|| format!("value {} ({:?}) is not a number", i, tok))?;
            if v.is_finite() {
                Ok(v)
            } else {
                Err(anyhow!("value {} is not finite", i))
            }
        })
        .collect()
}

/// Parse every number in `text` as a Q0.7 integer in [-128, 127]
pub fn parse_quantized(text: &str) -> anyhow::Result<Vec<i8>> {
    tokens(text)
        .enumerate()
        .map(|(i, tok)| {
            let v: i64 = tok.parse().with_context(|| format!("value {} ({:?}) is not an integer", i, tok))?;
            i8::try_from(v).map_err(|_| anyhow!("value {} ({}) is outside [-128, 127]", i, v))
        })
        .collect()
}

/// Load a table of exactly `expected` entries
pub fn load_table(path: &Path, expected: usize, quantized: bool) -> CliResult<Table> {
    let text = read(path)?;
    let table = if quantized {
        let values = parse_quantized(&text).with_context(|| format!("in {}", path.display()))?;
        Table { values, clamped: 0 }
    } else {
        let floats = parse_floats(&text).with_context(|| format!("in {}", path.display()))?;
        let mut values = vec![0i8; floats.len()];
        let clamped = quantize_slice(&floats, &mut values);
        Table { values, clamped }
    };

    if table.values.len() != expected {
        return Err(CliError::data(format!(
            "{}: expected {} values, found {}",
            path.display(),
            expected,
            table.values.len()
        )));
    }
    if table.clamped > 0 {
        warn!("{}: {} of {} weights clamped to the Q0.7 range", path.display(), table.clamped, expected);
    }
    debug!("loaded {} ({} values)", path.display(), expected);
    Ok(table)
}

/// Load pixel samples, one per non-empty line, `input_size` intensities each
pub fn load_samples(path: &Path, input_size: usize) -> CliResult<Vec<Vec<f32>>> {
    let text = read(path)?;
    let mut samples = Vec::new();
    for (line_no, line) in text.lines().enumerate().filter(|(_, l)| !l.trim().is_empty()) {
        let pixels = parse_floats(line).with_context(|| format!("{}:{}", path.display(), line_no + 1))?;
        if pixels.len() != input_size {
            return Err(CliError::data(format!(
                "{}:{}: expected {} pixels, found {}",
                path.display(),
                line_no + 1,
                input_size,
                pixels.len()
            )));
        }
        samples.push(pixels);
    }
    Ok(samples)
}

/// Load labels, one integer per non-empty line
pub fn load_labels(path: &Path) -> CliResult<Vec<i64>> {
    let text = read(path)?;
    text.lines()
        .enumerate()
        .filter(|(_, l)| !l.trim().is_empty())
        .map(|(line_no, line)| {
            line.trim()
                .parse::<i64>()
                .map_err(|e| CliError::data(format!("{}:{}: bad label: {}", path.display(), line_no + 1, e)))
        })
        .collect()
}
