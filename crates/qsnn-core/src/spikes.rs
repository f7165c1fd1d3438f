//! Bit-packed spike storage
//!
//! A spike at neuron `n` lives in bit `n % 8` of byte `n / 8` of its row.
//! [`SpikeBuffer`] holds one chunk (`TAU` rows) and is what the layers read
//! and write. [`PackedSpikes`] is the 3-D (sample, timestep, neuron) source a
//! rate encoder fills and the pipeline drains.

use crate::{
    capacity::{ROW_BYTES, TAU},
    error::{Result, SnnError},
};

/// One chunk of spikes: `TAU` rows of `ROW_BYTES` packed bytes
#[derive(Clone, PartialEq, Eq)]
pub struct SpikeBuffer {
    rows: [[u8; ROW_BYTES]; TAU],
}

impl SpikeBuffer {
    /// Number of neurons a row can address
    pub const NEURONS: usize = ROW_BYTES * 8;

    /// Create an empty buffer
    pub const fn new() -> Self {
        Self { rows: [[0; ROW_BYTES]; TAU] }
    }

    /// Read the spike of `neuron` at local timestep `t`.
    ///
    /// Indices are checked with debug assertions only; use [`Self::try_get`]
    /// where they come from outside the engine.
    #[inline(always)]
    pub fn get(&self, neuron: usize, t: usize) -> bool {
        debug_assert!(neuron < Self::NEURONS, "neuron {} out of range", neuron);
        debug_assert!(t < TAU, "timestep {} out of range", t);
        (self.rows[t][neuron >> 3] >> (neuron & 7)) & 1 != 0
    }

    /// Set or clear the spike of `neuron` at local timestep `t`
    #[inline(always)]
    pub fn set(&mut self, neuron: usize, t: usize, value: bool) {
        debug_assert!(neuron < Self::NEURONS, "neuron {} out of range", neuron);
        debug_assert!(t < TAU, "timestep {} out of range", t);
        let mask = 1u8 << (neuron & 7);
        let byte = &mut self.rows[t][neuron >> 3];
        if value {
            *byte |= mask;
        } else {
            *byte &= !mask;
        }
    }

    /// Checked read
    pub fn try_get(&self, neuron: usize, t: usize) -> Result<bool> {
        Self::check(neuron, t)?;
        Ok(self.get(neuron, t))
    }

    /// Checked write
    pub fn try_set(&mut self, neuron: usize, t: usize, value: bool) -> Result<()> {
        Self::check(neuron, t)?;
        self.set(neuron, t, value);
        Ok(())
    }

    /// Clear every spike
    pub fn clear(&mut self) {
        for row in self.rows.iter_mut() {
            row.fill(0);
        }
    }

    /// Packed row for timestep `t`
    #[inline(always)]
    pub fn row(&self, t: usize) -> &[u8; ROW_BYTES] {
        &self.rows[t]
    }

    /// Mutable packed row for timestep `t`
    #[inline(always)]
    pub fn row_mut(&mut self, t: usize) -> &mut [u8; ROW_BYTES] {
        &mut self.rows[t]
    }

    /// Number of spikes among the first `neurons` neurons at timestep `t`
    pub fn active_count(&self, t: usize, neurons: usize) -> usize {
        SetBits::new(&self.rows[t], neurons).count()
    }

    /// Indices of spiking neurons below `neurons` at timestep `t`
    pub fn spikes_at(&self, t: usize, neurons: usize) -> SetBits<'_> {
        SetBits::new(&self.rows[t], neurons)
    }

    fn check(neuron: usize, t: usize) -> Result<()> {
        if neuron >= Self::NEURONS {
            return Err(SnnError::IndexOutOfRange { index: neuron, len: Self::NEURONS });
        }
        if t >= TAU {
            return Err(SnnError::IndexOutOfRange { index: t, len: TAU });
        }
        Ok(())
    }
}

impl Default for SpikeBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for SpikeBuffer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SpikeBuffer")
            .field("tau", &TAU)
            .field("row_bytes", &ROW_BYTES)
            .finish()
    }
}

/// Iterator over the set bits of a packed row, lowest index first.
///
/// Each byte is consumed by trailing-zero count, clearing the lowest set bit
/// as it goes, so an all-zero byte costs one comparison.
#[derive(Debug, Clone)]
pub struct SetBits<'a> {
    bytes: &'a [u8],
    limit: usize,
    byte_idx: usize,
    current: u8,
}

impl<'a> SetBits<'a> {
    /// Iterate the set bits among the first `limit` bits of `bytes`
    pub fn new(bytes: &'a [u8], limit: usize) -> Self {
        let used = ((limit + 7) / 8).min(bytes.len());
        let bytes = &bytes[..used];
        let current = bytes.first().copied().unwrap_or(0);
        Self { bytes, limit, byte_idx: 0, current }
    }
}

impl Iterator for SetBits<'_> {
    type Item = usize;

    #[inline]
    fn next(&mut self) -> Option<usize> {
        loop {
            if self.current != 0 {
                let bit = self.current.trailing_zeros() as usize;
                self.current &= self.current - 1;
                let idx = self.byte_idx * 8 + bit;
                if idx < self.limit {
                    return Some(idx);
                }
                // padding bits past the limit: the row is exhausted
                self.current = 0;
                self.byte_idx = self.bytes.len();
                return None;
            }
            self.byte_idx += 1;
            if self.byte_idx >= self.bytes.len() {
                return None;
            }
            self.current = self.bytes[self.byte_idx];
        }
    }
}

/// A source of input spikes addressed by (sample, absolute timestep, neuron)
pub trait SpikeSource {
    /// Number of samples
    fn samples(&self) -> usize;

    /// Timesteps per sample
    fn time_window(&self) -> usize;

    /// Input neurons per timestep
    fn neurons(&self) -> usize;

    /// Whether `neuron` spikes at timestep `t` of `sample`
    fn spike(&self, sample: usize, t: usize, neuron: usize) -> bool;

    /// Copy one timestep of `sample` into a packed row.
    ///
    /// The default goes bit by bit; packed sources override it with a byte
    /// copy.
    fn load_row(&self, sample: usize, t: usize, row: &mut [u8]) {
        row.fill(0);
        for neuron in 0..self.neurons().min(row.len() * 8) {
            if self.spike(sample, t, neuron) {
                row[neuron >> 3] |= 1 << (neuron & 7);
            }
        }
    }
}

/// Packed spike dataset `[samples][time_window][ceil(neurons / 8)]`.
///
/// Generic over its storage so it can wrap a `static` array on target or a
/// `Vec<u8>` on a host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedSpikes<S> {
    storage: S,
    samples: usize,
    time_window: usize,
    neurons: usize,
}

impl<S: AsRef<[u8]>> PackedSpikes<S> {
    /// Bytes needed to hold the given shape
    pub const fn bytes_for(samples: usize, time_window: usize, neurons: usize) -> usize {
        samples * time_window * ((neurons + 7) / 8)
    }

    /// Wrap `storage`, which must be exactly [`Self::bytes_for`] long
    pub fn new(storage: S, samples: usize, time_window: usize, neurons: usize) -> Result<Self> {
        let needed = Self::bytes_for(samples, time_window, neurons);
        if storage.as_ref().len() != needed {
            return Err(SnnError::InvalidSource("storage length does not match shape"));
        }
        Ok(Self { storage, samples, time_window, neurons })
    }

    /// Bytes per packed timestep row
    #[inline(always)]
    pub fn row_bytes(&self) -> usize {
        (self.neurons + 7) / 8
    }

    /// Read one spike; indices checked by debug assertions
    #[inline]
    pub fn get(&self, sample: usize, t: usize, neuron: usize) -> bool {
        debug_assert!(sample < self.samples && t < self.time_window && neuron < self.neurons);
        let byte = self.storage.as_ref()[self.offset(sample, t) + (neuron >> 3)];
        (byte >> (neuron & 7)) & 1 != 0
    }

    /// Checked read
    pub fn try_get(&self, sample: usize, t: usize, neuron: usize) -> Result<bool> {
        self.check(sample, t, neuron)?;
        Ok(self.get(sample, t, neuron))
    }

    /// Packed row of one timestep of one sample
    pub fn row(&self, sample: usize, t: usize) -> &[u8] {
        let start = self.offset(sample, t);
        &self.storage.as_ref()[start..start + self.row_bytes()]
    }

    /// Underlying storage
    pub fn into_inner(self) -> S {
        self.storage
    }

    #[inline(always)]
    fn offset(&self, sample: usize, t: usize) -> usize {
        (sample * self.time_window + t) * self.row_bytes()
    }

    fn check(&self, sample: usize, t: usize, neuron: usize) -> Result<()> {
        if sample >= self.samples {
            return Err(SnnError::SampleOutOfRange { sample, samples: self.samples });
        }
        if t >= self.time_window {
            return Err(SnnError::IndexOutOfRange { index: t, len: self.time_window });
        }
        if neuron >= self.neurons {
            return Err(SnnError::IndexOutOfRange { index: neuron, len: self.neurons });
        }
        Ok(())
    }
}

impl<S: AsRef<[u8]> + AsMut<[u8]>> PackedSpikes<S> {
    /// Write one spike; indices checked by debug assertions
    #[inline]
    pub fn set(&mut self, sample: usize, t: usize, neuron: usize, value: bool) {
        debug_assert!(sample < self.samples && t < self.time_window && neuron < self.neurons);
        let idx = self.offset(sample, t) + (neuron >> 3);
        let mask = 1u8 << (neuron & 7);
        let byte = &mut self.storage.as_mut()[idx];
        if value {
            *byte |= mask;
        } else {
            *byte &= !mask;
        }
    }

    /// Checked write
    pub fn try_set(&mut self, sample: usize, t: usize, neuron: usize, value: bool) -> Result<()> {
        self.check(sample, t, neuron)?;
        self.set(sample, t, neuron, value);
        Ok(())
    }
}

impl<S: AsRef<[u8]>> SpikeSource for PackedSpikes<S> {
    fn samples(&self) -> usize {
        self.samples
    }

    fn time_window(&self) -> usize {
        self.time_window
    }

    fn neurons(&self) -> usize {
        self.neurons
    }

    fn spike(&self, sample: usize, t: usize, neuron: usize) -> bool {
        self.get(sample, t, neuron)
    }

    fn load_row(&self, sample: usize, t: usize, row: &mut [u8]) {
        let src = self.row(sample, t);
        let n = src.len().min(row.len());
        row[..n].copy_from_slice(&src[..n]);
        row[n..].fill(0);
        // padding bits of the last source byte are not spikes
        let tail = self.neurons & 7;
        if tail != 0 && n == src.len() && n > 0 {
            row[n - 1] &= (1u8 << tail) - 1;
        }
    }
}
