//! Error handling for the inference engine
//!
//! Lightweight, `Copy` error values usable without an allocator.

use core::fmt;

/// Result type for engine operations
pub type Result<T> = core::result::Result<T, SnnError>;

/// Engine error types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnnError {
    /// Topology exceeds a compile-time capacity
    Capacity {
        /// What ran out (neurons, layers, outputs, chunks)
        resource: &'static str,
        /// Requested amount
        requested: usize,
        /// Compile-time limit
        limit: usize,
    },
    /// Topology or weight tables are inconsistent
    InvalidTopology(&'static str),
    /// Neuron or timestep index outside a buffer
    IndexOutOfRange {
        /// Offending index
        index: usize,
        /// Valid length
        len: usize,
    },
    /// Spike source does not fit the network
    InvalidSource(&'static str),
    /// Sample index past the end of the spike source
    SampleOutOfRange {
        /// Requested sample
        sample: usize,
        /// Samples available
        samples: usize,
    },
}

impl SnnError {
    /// Whether this error is raised while building a network
    pub const fn is_configuration(&self) -> bool {
        matches!(self, Self::Capacity { .. } | Self::InvalidTopology(_))
    }
}

impl fmt::Display for SnnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Capacity { resource, requested, limit } => {
                write!(f, "capacity exceeded: {} {} (limit {})", requested, resource, limit)
            }
            Self::InvalidTopology(reason) => write!(f, "invalid topology: {}", reason),
            Self::IndexOutOfRange { index, len } => {
                write!(f, "index {} out of range (len {})", index, len)
            }
            Self::InvalidSource(reason) => write!(f, "invalid spike source: {}", reason),
            Self::SampleOutOfRange { sample, samples } => {
                write!(f, "sample {} out of range ({} samples)", sample, samples)
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for SnnError {}
