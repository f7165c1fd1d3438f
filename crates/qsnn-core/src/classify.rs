//! Firing-count accumulator and argmax classifier

use crate::{
    capacity::{MAX_CHUNKS, MAX_OUTPUTS},
    error::{Result, SnnError},
};

/// Output spikes per neuron per chunk for one inference call
#[derive(Clone, PartialEq, Eq)]
pub struct FiringCounts {
    counts: [[u32; MAX_CHUNKS]; MAX_OUTPUTS],
    neurons: usize,
    chunks: usize,
}

impl FiringCounts {
    /// Empty table of `neurons × chunks`
    pub fn new(neurons: usize, chunks: usize) -> Result<Self> {
        let mut counts = Self::empty();
        counts.reshape(neurons, chunks)?;
        Ok(counts)
    }

    pub(crate) const fn empty() -> Self {
        Self { counts: [[0; MAX_CHUNKS]; MAX_OUTPUTS], neurons: 0, chunks: 0 }
    }

    /// Clear and resize in place
    pub(crate) fn reshape(&mut self, neurons: usize, chunks: usize) -> Result<()> {
        if neurons > MAX_OUTPUTS {
            return Err(SnnError::Capacity { resource: "outputs", requested: neurons, limit: MAX_OUTPUTS });
        }
        if chunks > MAX_CHUNKS {
            return Err(SnnError::Capacity { resource: "chunks", requested: chunks, limit: MAX_CHUNKS });
        }
        for row in self.counts.iter_mut() {
            row.fill(0);
        }
        self.neurons = neurons;
        self.chunks = chunks;
        Ok(())
    }

    /// Build from a table of rows, one per neuron
    pub fn from_rows<R: AsRef<[u32]>>(rows: &[R]) -> Result<Self> {
        let chunks = rows.first().map_or(0, |r| r.as_ref().len());
        let mut counts = Self::new(rows.len(), chunks)?;
        for (n, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            if row.len() != chunks {
                return Err(SnnError::InvalidTopology("firing-count rows differ in length"));
            }
            counts.counts[n][..chunks].copy_from_slice(row);
        }
        Ok(counts)
    }

    /// Output neurons
    pub fn neurons(&self) -> usize {
        self.neurons
    }

    /// Chunks
    pub fn chunks(&self) -> usize {
        self.chunks
    }

    /// Count of `neuron` in `chunk`
    pub fn get(&self, neuron: usize, chunk: usize) -> u32 {
        debug_assert!(neuron < self.neurons && chunk < self.chunks);
        self.counts[neuron][chunk]
    }

    /// Counts of one neuron, one entry per chunk
    pub fn row(&self, neuron: usize) -> &[u32] {
        debug_assert!(neuron < self.neurons);
        &self.counts[neuron][..self.chunks]
    }

    /// Record one spike
    #[inline]
    pub fn increment(&mut self, neuron: usize, chunk: usize) {
        debug_assert!(neuron < self.neurons && chunk < self.chunks);
        self.counts[neuron][chunk] = self.counts[neuron][chunk].saturating_add(1);
    }

    /// Spikes of `neuron` summed over all chunks
    pub fn total(&self, neuron: usize) -> u64 {
        self.row(neuron).iter().map(|&c| c as u64).sum()
    }
}

impl core::fmt::Debug for FiringCounts {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut list = f.debug_list();
        for n in 0..self.neurons {
            list.entry(&self.row(n));
        }
        list.finish()
    }
}

/// Index of the neuron with the most spikes over all chunks.
///
/// Ties go to the lowest index; `None` when no output neuron fired at all.
pub fn classify(counts: &FiringCounts) -> Option<usize> {
    let mut best: Option<(usize, u64)> = None;
    for n in 0..counts.neurons() {
        let total = counts.total(n);
        if total > best.map_or(0, |(_, t)| t) {
            best = Some((n, total));
        }
    }
    best.map(|(n, _)| n)
}
