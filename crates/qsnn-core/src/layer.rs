//! Layer update engine
//!
//! One [`Layer`] owns the state of its neurons and borrows its weight tables.
//! [`Layer::update`] advances the layer through one chunk: for every local
//! timestep it forms the input sum of each neuron from the spikes of the
//! previous layer, then applies the LIF transition and packs the resulting
//! spikes into the output buffer.
//!
//! The LIF step, per neuron:
//!
//! ```text
//! v    = ((v * decay) >> 7) + sum      (Dynamics::Leaky)
//! v    = v + sum                        (Dynamics::NonLeaky)
//! fire = v >= threshold
//! v    = v - threshold  if fire
//! ```
//!
//! The fire decision uses the potential after decay and accumulation of the
//! same step.

use crate::{
    capacity::{MAX_NEURONS, TAU},
    conv::{self, ConvWeights},
    dsp,
    error::{Result, SnnError},
    fixed_point::{self, FRAC_BITS},
    spikes::{SetBits, SpikeBuffer},
};

/// Input injected by one spike on an input-layer neuron (1.0 in Q0.7)
pub const ONE_SPIKE_CONTRIBUTION: i32 = fixed_point::ONE;

/// Default firing threshold (1.0 in Q0.7)
pub const DEFAULT_THRESHOLD: i16 = 128;

/// Default membrane decay (0.95 in Q0.7)
pub const DEFAULT_DECAY: i16 = 122;

/// Membrane dynamics, chosen when the network is built
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dynamics {
    /// Leaky integrate-and-fire: the potential decays every step
    #[default]
    Leaky,
    /// Integrate-and-fire: no decay multiply
    NonLeaky,
}

/// Per-layer neuron parameters on the Q0.7 scale
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NeuronParams {
    /// Firing threshold
    pub threshold: i16,
    /// Decay multiplier with 7 fractional bits (128 = no decay)
    pub decay: i16,
}

impl NeuronParams {
    /// Encode float parameters (threshold 1.0, decay 0.95 are the defaults)
    pub fn from_float(threshold: f32, decay: f32) -> Self {
        Self {
            threshold: fixed_point::to_q7_i16(threshold),
            decay: fixed_point::to_q7_i16(decay),
        }
    }

    /// Validate parameter ranges
    pub fn validate(&self) -> Result<()> {
        if self.threshold <= 0 {
            return Err(SnnError::InvalidTopology("threshold must be positive"));
        }
        if self.decay < 0 {
            return Err(SnnError::InvalidTopology("decay must not be negative"));
        }
        Ok(())
    }
}

impl Default for NeuronParams {
    fn default() -> Self {
        Self { threshold: DEFAULT_THRESHOLD, decay: DEFAULT_DECAY }
    }
}

/// Borrowed fully-connected weights
///
/// Stored input-major: `weights[j * outputs + i]` is the weight from input
/// `j` to neuron `i`, so each input's column is one contiguous slice.
#[derive(Debug, Clone, Copy)]
pub struct DenseWeights<'w> {
    inputs: usize,
    outputs: usize,
    weights: &'w [i8],
    bias: &'w [i8],
}

impl<'w> DenseWeights<'w> {
    /// Check table sizes
    pub fn new(inputs: usize, outputs: usize, weights: &'w [i8], bias: &'w [i8]) -> Result<Self> {
        if inputs == 0 || outputs == 0 {
            return Err(SnnError::InvalidTopology("dense layer needs inputs and outputs"));
        }
        if weights.len() != inputs * outputs {
            return Err(SnnError::InvalidTopology("dense weight table does not match shape"));
        }
        if bias.len() != outputs {
            return Err(SnnError::InvalidTopology("dense bias length must equal neuron count"));
        }
        Ok(Self { inputs, outputs, weights, bias })
    }

    /// Input count
    pub fn inputs(&self) -> usize {
        self.inputs
    }

    /// Neuron count
    pub fn outputs(&self) -> usize {
        self.outputs
    }

    #[inline(always)]
    fn column(&self, input: usize) -> &'w [i8] {
        &self.weights[input * self.outputs..(input + 1) * self.outputs]
    }
}

/// What a layer computes
#[derive(Debug, Clone, Copy)]
pub enum LayerKind<'w> {
    /// Pass-through: every input spike injects [`ONE_SPIKE_CONTRIBUTION`]
    Input,
    /// Event-driven 2-D convolution
    Conv(ConvWeights<'w>),
    /// Dense layer summed over active inputs
    FullyConnected(DenseWeights<'w>),
}

impl LayerKind<'_> {
    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Conv(_) => "conv",
            Self::FullyConnected(_) => "fc",
        }
    }
}

/// One layer of neurons with statically sized state
pub struct Layer<'w> {
    kind: LayerKind<'w>,
    neurons: usize,
    inputs: usize,
    potentials: [i32; MAX_NEURONS],
    reset_flags: [u8; MAX_NEURONS],
    thresholds: [i16; MAX_NEURONS],
    decay_rates: [i16; MAX_NEURONS],
}

impl<'w> Layer<'w> {
    /// Create a layer; `inputs` is the neuron count of the previous layer
    /// (the layer's own size for an input layer).
    pub fn new(kind: LayerKind<'w>, neurons: usize, inputs: usize, params: NeuronParams) -> Result<Self> {
        let mut layer = Self::empty();
        layer.configure(kind, neurons, inputs, params)?;
        Ok(layer)
    }

    /// Layer with no neurons, usable in a `static` initializer
    pub const fn empty() -> Self {
        Self {
            kind: LayerKind::Input,
            neurons: 0,
            inputs: 0,
            potentials: [0; MAX_NEURONS],
            reset_flags: [0; MAX_NEURONS],
            thresholds: [0; MAX_NEURONS],
            decay_rates: [0; MAX_NEURONS],
        }
    }

    /// Reconfigure in place. On error the layer is left untouched.
    pub fn configure(&mut self, kind: LayerKind<'w>, neurons: usize, inputs: usize, params: NeuronParams) -> Result<()> {
        params.validate()?;
        if neurons == 0 {
            return Err(SnnError::InvalidTopology("layer has no neurons"));
        }
        for count in [neurons, inputs] {
            if count > MAX_NEURONS {
                return Err(SnnError::Capacity {
                    resource: "neurons",
                    requested: count,
                    limit: MAX_NEURONS,
                });
            }
        }
        match &kind {
            LayerKind::Input => {
                if inputs != neurons {
                    return Err(SnnError::InvalidTopology("input layer must mirror its inputs"));
                }
            }
            LayerKind::Conv(w) => {
                let g = w.geometry();
                if g.inputs() != inputs {
                    return Err(SnnError::InvalidTopology("conv input plane does not match previous layer"));
                }
                if g.outputs() != neurons {
                    return Err(SnnError::InvalidTopology("conv neuron count must be filters x out_side^2"));
                }
            }
            LayerKind::FullyConnected(w) => {
                if w.inputs() != inputs || w.outputs() != neurons {
                    return Err(SnnError::InvalidTopology("dense weight shape does not match layer"));
                }
            }
        }

        self.kind = kind;
        self.neurons = neurons;
        self.inputs = inputs;
        self.potentials.fill(0);
        self.reset_flags.fill(0);
        self.thresholds.fill(0);
        self.decay_rates.fill(0);
        self.thresholds[..neurons].fill(params.threshold);
        self.decay_rates[..neurons].fill(params.decay);
        Ok(())
    }

    /// Layer kind
    pub fn kind(&self) -> &LayerKind<'w> {
        &self.kind
    }

    /// Neuron count
    pub fn neurons(&self) -> usize {
        self.neurons
    }

    /// Input count
    pub fn inputs(&self) -> usize {
        self.inputs
    }

    /// Membrane potentials of the layer's neurons
    pub fn potentials(&self) -> &[i32] {
        &self.potentials[..self.neurons]
    }

    /// Fire/reset flags of the most recent step
    pub fn reset_flags(&self) -> &[u8] {
        &self.reset_flags[..self.neurons]
    }

    /// Thresholds of the layer's neurons
    pub fn thresholds(&self) -> &[i16] {
        &self.thresholds[..self.neurons]
    }

    /// Override one neuron's threshold
    pub fn set_threshold(&mut self, neuron: usize, threshold: i16) -> Result<()> {
        if neuron >= self.neurons {
            return Err(SnnError::IndexOutOfRange { index: neuron, len: self.neurons });
        }
        if threshold <= 0 {
            return Err(SnnError::InvalidTopology("threshold must be positive"));
        }
        self.thresholds[neuron] = threshold;
        Ok(())
    }

    /// Override one neuron's decay rate
    pub fn set_decay(&mut self, neuron: usize, decay: i16) -> Result<()> {
        if neuron >= self.neurons {
            return Err(SnnError::IndexOutOfRange { index: neuron, len: self.neurons });
        }
        if decay < 0 {
            return Err(SnnError::InvalidTopology("decay must not be negative"));
        }
        self.decay_rates[neuron] = decay;
        Ok(())
    }

    /// Clear membrane potentials and reset flags
    pub fn zero(&mut self) {
        self.potentials[..self.neurons].fill(0);
        self.reset_flags[..self.neurons].fill(0);
    }

    /// Advance the layer through one chunk, reading `input` and writing
    /// `output`. `sums` is scratch space of at least `neurons` entries.
    pub fn update(
        &mut self,
        input: &SpikeBuffer,
        output: &mut SpikeBuffer,
        sums: &mut [i32],
        dynamics: Dynamics,
    ) {
        let sums = &mut sums[..self.neurons];
        for t in 0..TAU {
            self.accumulate(input.row(t), sums);
            self.step(sums, dynamics);
            dsp::pack_bits(self.reset_flags(), output.row_mut(t));
        }
    }

    /// Input sum of every neuron for one packed input row
    pub fn accumulate(&self, row: &[u8], sums: &mut [i32]) {
        let sums = &mut sums[..self.neurons];
        match &self.kind {
            LayerKind::Input => {
                sums.fill(0);
                for i in SetBits::new(row, self.inputs) {
                    sums[i] = ONE_SPIKE_CONTRIBUTION;
                }
            }
            LayerKind::FullyConnected(w) => {
                dsp::copy_q7_to_q31(w.bias, sums);
                for j in SetBits::new(row, self.inputs) {
                    dsp::add_q7_to_q31(w.column(j), sums);
                }
            }
            LayerKind::Conv(w) => conv::conv_sparse_add(row, w, sums),
        }
    }

    /// One LIF step with precomputed input sums
    pub fn step(&mut self, sums: &[i32], dynamics: Dynamics) {
        let n = self.neurons;
        let potentials = &mut self.potentials[..n];

        if dynamics == Dynamics::Leaky {
            dsp::scale_q31(potentials, &self.decay_rates[..n], FRAC_BITS);
        }
        dsp::add_q31(&sums[..n], potentials);
        dsp::compare_ge_q31(potentials, &self.thresholds[..n], &mut self.reset_flags[..n]);
        dsp::sub_where_q31(&self.reset_flags[..n], &self.thresholds[..n], potentials);
    }
}

impl core::fmt::Debug for Layer<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Layer")
            .field("kind", &self.kind.name())
            .field("neurons", &self.neurons)
            .field("inputs", &self.inputs)
            .finish()
    }
}
