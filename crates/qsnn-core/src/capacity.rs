//! Compile-time capacity of the engine
//!
//! Every buffer in the engine is a fixed-size array sized from these
//! constants. Pick a smaller profile with the `micro-32kb` or `micro-128kb`
//! cargo features.

/// Compile-time configuration based on feature flags
pub struct Capacity;

impl Capacity {
    /// Maximum number of neurons in any single layer
    pub const MAX_NEURONS: usize = {
        #[cfg(feature = "micro-32kb")]
        { 256 }
        #[cfg(all(feature = "micro-128kb", not(feature = "micro-32kb")))]
        { 1024 }
        #[cfg(not(any(feature = "micro-32kb", feature = "micro-128kb")))]
        { 4096 }
    };

    /// Maximum number of layers, input layer included
    pub const MAX_LAYERS: usize = {
        #[cfg(feature = "micro-32kb")]
        { 4 }
        #[cfg(all(feature = "micro-128kb", not(feature = "micro-32kb")))]
        { 6 }
        #[cfg(not(any(feature = "micro-32kb", feature = "micro-128kb")))]
        { 4 }
    };

    /// Maximum number of output neurons (classes)
    pub const MAX_OUTPUTS: usize = 64;

    /// Maximum number of chunks in one time window
    pub const MAX_CHUNKS: usize = 16;

    /// Timesteps per chunk
    pub const TAU: usize = 10;

    /// Bytes in one packed spike row
    pub const ROW_BYTES: usize = (Self::MAX_NEURONS + 7) / 8;
}

/// Timesteps per chunk
pub const TAU: usize = Capacity::TAU;

/// Maximum number of neurons in any single layer
pub const MAX_NEURONS: usize = Capacity::MAX_NEURONS;

/// Maximum number of layers
pub const MAX_LAYERS: usize = Capacity::MAX_LAYERS;

/// Maximum number of output neurons
pub const MAX_OUTPUTS: usize = Capacity::MAX_OUTPUTS;

/// Maximum number of chunks per inference
pub const MAX_CHUNKS: usize = Capacity::MAX_CHUNKS;

/// Bytes in one packed spike row
pub const ROW_BYTES: usize = Capacity::ROW_BYTES;

const _: () = {
    assert!(Capacity::MAX_NEURONS > 0, "Must have at least one neuron");
    assert!(Capacity::MAX_LAYERS >= 2, "Need an input layer and one weighted layer");
    assert!(Capacity::MAX_OUTPUTS <= Capacity::MAX_NEURONS, "Outputs are neurons too");
    assert!(Capacity::TAU > 0, "Chunks must be non-empty");
    assert!(Capacity::MAX_NEURONS <= i32::MAX as usize, "Neuron indices must fit an i32");
};

/// Build configuration summary
pub const BUILD_INFO: BuildInfo = BuildInfo {
    version: env!("CARGO_PKG_VERSION"),
    max_neurons: Capacity::MAX_NEURONS,
    max_layers: Capacity::MAX_LAYERS,
    max_outputs: Capacity::MAX_OUTPUTS,
    tau: Capacity::TAU,
};

/// Build information structure
#[derive(Debug, Clone, Copy)]
pub struct BuildInfo {
    /// Version string
    pub version: &'static str,
    /// Maximum neurons per layer
    pub max_neurons: usize,
    /// Maximum layers
    pub max_layers: usize,
    /// Maximum output neurons
    pub max_outputs: usize,
    /// Timesteps per chunk
    pub tau: usize,
}

impl BuildInfo {
    /// Static memory used by one `Network` in bytes (state, buffers, scratch)
    pub const fn estimated_memory_usage(&self) -> usize {
        // potential (4) + threshold (2) + decay (2) + reset flag (1)
        let neuron_memory = self.max_layers * self.max_neurons * 9;
        let buffer_memory = 2 * self.tau * ((self.max_neurons + 7) / 8);
        let scratch_memory = self.max_neurons * 4;
        let counts_memory = self.max_outputs * Capacity::MAX_CHUNKS * 4;

        neuron_memory + buffer_memory + scratch_memory + counts_memory
    }

    /// Check if configuration fits in target memory
    pub const fn fits_in_memory(&self, available_bytes: usize) -> bool {
        self.estimated_memory_usage() <= available_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_bytes_cover_max_neurons() {
        assert!(ROW_BYTES * 8 >= MAX_NEURONS);
        assert!((ROW_BYTES - 1) * 8 < MAX_NEURONS);
    }

    #[test]
    fn test_memory_estimation() {
        let info = BUILD_INFO;
        assert!(info.estimated_memory_usage() > info.max_neurons);
        assert!(info.fits_in_memory(usize::MAX));
        assert!(!info.fits_in_memory(0));
        assert!(!info.version.is_empty());
    }
}
