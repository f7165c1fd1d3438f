//! Rate encoding of pixel intensities into packed spike trains

use qsnn_core::PackedSpikes;
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::error::{CliError, CliResult};

/// Firing probability per timestep for a pixel intensity in [0, 255]
#[inline]
pub fn spike_probability(pixel: f32) -> f32 {
    (pixel / 255.0).clamp(0.0, 1.0)
}

/// Encode one sample: every timestep, every pixel spikes with probability
/// `pixel / 255` (Bernoulli trial).
pub fn rate_encode<R: Rng>(
    pixels: &[f32],
    spikes: &mut PackedSpikes<Vec<u8>>,
    sample: usize,
    time_window: usize,
    rng: &mut R,
) {
    for t in 0..time_window {
        for (neuron, &pixel) in pixels.iter().enumerate() {
            let fire = rng.gen::<f32>() < spike_probability(pixel);
            spikes.set(sample, t, neuron, fire);
        }
    }
}

/// Encode a batch of samples with a seeded generator
pub fn encode_samples(
    samples: &[Vec<f32>],
    input_size: usize,
    time_window: usize,
    seed: u64,
) -> CliResult<PackedSpikes<Vec<u8>>> {
    let len = PackedSpikes::<Vec<u8>>::bytes_for(samples.len(), time_window, input_size);
    let mut spikes = PackedSpikes::new(vec![0u8; len], samples.len(), time_window, input_size)?;
    let mut rng = StdRng::seed_from_u64(seed);
    for (sample, pixels) in samples.iter().enumerate() {
        if pixels.len() != input_size {
            return Err(CliError::data(format!(
                "sample {} has {} pixels, expected {}",
                sample,
                pixels.len(),
                input_size
            )));
        }
        rate_encode(pixels, &mut spikes, sample, time_window, &mut rng);
    }
    Ok(spikes)
}

/// Pack pre-encoded spikes stored one byte (0 or 1) per
/// `[sample][t][neuron]`
pub fn pack_raw(bytes: &[u8], input_size: usize, time_window: usize) -> CliResult<PackedSpikes<Vec<u8>>> {
    let per_sample = input_size * time_window;
    if per_sample == 0 || bytes.len() % per_sample != 0 {
        return Err(CliError::data(format!(
            "spike file holds {} bytes, not a multiple of {} x {}",
            bytes.len(),
            time_window,
            input_size
        )));
    }
    let samples = bytes.len() / per_sample;
    let len = PackedSpikes::<Vec<u8>>::bytes_for(samples, time_window, input_size);
    let mut spikes = PackedSpikes::new(vec![0u8; len], samples, time_window, input_size)?;

    for (idx, &b) in bytes.iter().enumerate() {
        let (sample, rest) = (idx / per_sample, idx % per_sample);
        let (t, neuron) = (rest / input_size, rest % input_size);
        match b {
            0 => {}
            1 => spikes.set(sample, t, neuron, true),
            other => {
                return Err(CliError::data(format!(
                    "invalid spike value {} at [{}][{}][{}]",
                    other, sample, t, neuron
                )))
            }
        }
    }
    Ok(spikes)
}
