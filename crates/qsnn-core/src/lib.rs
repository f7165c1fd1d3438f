//! # qsnn-core: Quantized Spiking Neural Network Inference
//!
//! An event-driven, integer-only inference engine for spiking neural
//! networks on microcontrollers. Weights are signed 8-bit Q0.7 values,
//! membrane potentials are 32-bit accumulators on the same scale, and
//! spikes travel between layers as bit-packed rows.
//!
//! ## Design Principles
//!
//! - **No Heap Allocation**: every buffer is a fixed-size array sized by [`Capacity`]
//! - **Event-Driven**: layers touch only the weights of inputs that spiked
//! - **Integer Only**: floats appear only in the [`fixed_point`] codec
//! - **Compile-Time Configuration**: `micro-32kb` / `micro-128kb` features shrink the engine
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use qsnn_core::prelude::*;
//!
//! // 4 inputs, 2 output classes, input-major weights
//! static WEIGHTS: [i8; 8] = [64, 0, 64, 0, 0, 64, 0, 64];
//! static BIAS: [i8; 2] = [0, 0];
//!
//! let fc = DenseWeights::new(4, 2, &WEIGHTS, &BIAS)?;
//! let mut network = NetworkBuilder::new()
//!     .input(4)
//!     .fully_connected(fc)
//!     .dynamics(Dynamics::Leaky)
//!     .build()?;
//!
//! // one sample, 20 timesteps, one byte per row
//! let spikes = PackedSpikes::new([0b0011u8; 20], 1, 20, 4)?;
//! let class = network.run_inference(&spikes, 0)?;
//! # Ok::<(), SnnError>(())
//! ```
//!
//! [`Network::new`] is a `const fn`, so on a target without a heap the
//! engine can sit in a `static` and be configured in place:
//!
//! ```rust,no_run
//! use qsnn_core::prelude::*;
//! use std::sync::Mutex;
//!
//! static WEIGHTS: [i8; 8] = [64, 0, 64, 0, 0, 64, 0, 64];
//! static BIAS: [i8; 2] = [0, 0];
//! static NETWORK: Mutex<Network<'static>> = Mutex::new(Network::new());
//!
//! let mut network = NETWORK.lock().unwrap();
//! let fc = DenseWeights::new(4, 2, &WEIGHTS, &BIAS)?;
//! NetworkBuilder::new().input(4).fully_connected(fc).build_into(&mut network)?;
//! # Ok::<(), SnnError>(())
//! ```

#![cfg_attr(not(any(feature = "std", test)), no_std)]
#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod capacity;
pub mod classify;
pub mod conv;
pub mod dsp;
pub mod error;
pub mod fixed_point;
pub mod layer;
pub mod network;
pub mod spikes;

pub use crate::{
    capacity::{Capacity, BuildInfo, BUILD_INFO, MAX_CHUNKS, MAX_LAYERS, MAX_NEURONS, MAX_OUTPUTS, ROW_BYTES, TAU},
    classify::{classify, FiringCounts},
    conv::{conv_dense_add, conv_sparse_add, ConvGeometry, ConvWeights},
    error::{Result, SnnError},
    fixed_point::{dequantize, quantize, quantize_slice},
    layer::{DenseWeights, Dynamics, Layer, LayerKind, NeuronParams, ONE_SPIKE_CONTRIBUTION},
    network::{LayerSpec, Network, NetworkBuilder},
    spikes::{PackedSpikes, SetBits, SpikeBuffer, SpikeSource},
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Compile-time memory layout validation
#[macro_export]
macro_rules! validate_memory_layout {
    ($target_kb:expr) => {
        const _: () = {
            const TARGET_BYTES: usize = $target_kb * 1024;
            assert!(
                $crate::BUILD_INFO.fits_in_memory(TARGET_BYTES),
                "Configuration exceeds target memory limit"
            );
        };
    };
}

#[cfg(feature = "micro-32kb")]
validate_memory_layout!(32);

#[cfg(all(feature = "micro-128kb", not(feature = "micro-32kb")))]
validate_memory_layout!(128);

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for qsnn-core users

    pub use crate::{
        classify, ConvGeometry, ConvWeights, DenseWeights, Dynamics, FiringCounts, LayerSpec, Network,
        NetworkBuilder, NeuronParams, PackedSpikes, Result, SnnError, SpikeSource, BUILD_INFO, TAU,
    };
}
