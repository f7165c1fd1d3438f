//! Ping-pong inference pipeline
//!
//! A [`Network`] owns its layers, two spike buffers and a scratch sum array,
//! all statically sized, and borrows its weight tables for `'w`. Inference
//! runs the time window chunk by chunk: the input chunk is loaded into the
//! front buffer, every layer reads the front buffer and writes the back one,
//! and the two swap roles by flipping an index. Output spikes of the last
//! layer are tallied per chunk and classified by argmax.

use heapless::Vec;
use log::{debug, log_enabled, trace, Level};

use crate::{
    capacity::{MAX_CHUNKS, MAX_LAYERS, MAX_NEURONS, MAX_OUTPUTS, TAU},
    classify::{classify, FiringCounts},
    conv::ConvWeights,
    error::{Result, SnnError},
    layer::{DenseWeights, Dynamics, Layer, LayerKind, NeuronParams},
    spikes::{SetBits, SpikeBuffer, SpikeSource},
};

/// One entry of a network topology
#[derive(Debug, Clone, Copy)]
pub enum LayerSpec<'w> {
    /// Input layer of `neurons` pass-through neurons
    Input {
        /// Input width
        neurons: usize,
    },
    /// Convolution layer; its size follows from the geometry
    Conv(ConvWeights<'w>),
    /// Fully-connected layer; its size follows from the weight shape
    FullyConnected(DenseWeights<'w>),
}

/// Statically sized SNN with borrowed, read-only weights.
///
/// [`Network::new`] is a `const fn`, so the whole engine state can live in
/// a `static` and be configured in place with [`Network::init`] or
/// [`NetworkBuilder::build_into`].
pub struct Network<'w> {
    layers: [Layer<'w>; MAX_LAYERS],
    depth: usize,
    buffers: [SpikeBuffer; 2],
    front: usize,
    sums: [i32; MAX_NEURONS],
    counts: FiringCounts,
    dynamics: Dynamics,
}

impl<'w> Network<'w> {
    /// Network with no layers. Inference fails until it is initialized.
    pub const fn new() -> Self {
        Self {
            layers: [const { Layer::empty() }; MAX_LAYERS],
            depth: 0,
            buffers: [SpikeBuffer::new(), SpikeBuffer::new()],
            front: 0,
            sums: [0; MAX_NEURONS],
            counts: FiringCounts::empty(),
            dynamics: Dynamics::Leaky,
        }
    }

    /// One-time setup from an ordered topology, returning the network by
    /// value. On small stacks use [`Self::init`] on a placed network.
    pub fn initialize(topology: &[LayerSpec<'w>], params: NeuronParams, dynamics: Dynamics) -> Result<Self> {
        let mut network = Self::new();
        network.init(topology, params, dynamics)?;
        Ok(network)
    }

    /// Configure this network in place from an ordered topology.
    ///
    /// The first entry must be the input layer and the only one. Fails when
    /// the topology exceeds static capacity or a weight table does not fit
    /// the layer before it; a failed call leaves the network without layers.
    pub fn init(&mut self, topology: &[LayerSpec<'w>], params: NeuronParams, dynamics: Dynamics) -> Result<()> {
        self.depth = 0;
        if topology.is_empty() {
            return Err(SnnError::InvalidTopology("network has no layers"));
        }
        if topology.len() > MAX_LAYERS {
            return Err(SnnError::Capacity {
                resource: "layers",
                requested: topology.len(),
                limit: MAX_LAYERS,
            });
        }

        let mut prev = 0;
        for (index, (spec, layer)) in topology.iter().zip(self.layers.iter_mut()).enumerate() {
            match (index, *spec) {
                (0, LayerSpec::Input { neurons }) => layer.configure(LayerKind::Input, neurons, neurons, params)?,
                (0, _) => return Err(SnnError::InvalidTopology("first layer must be the input layer")),
                (_, LayerSpec::Input { .. }) => {
                    return Err(SnnError::InvalidTopology("input layer must come first"))
                }
                (_, LayerSpec::Conv(w)) => {
                    layer.configure(LayerKind::Conv(w), w.geometry().outputs(), prev, params)?
                }
                (_, LayerSpec::FullyConnected(w)) => {
                    layer.configure(LayerKind::FullyConnected(w), w.outputs(), prev, params)?
                }
            }
            prev = layer.neurons();
            debug!(
                "layer {}: {} with {} neurons from {} inputs",
                index,
                layer.kind().name(),
                layer.neurons(),
                layer.inputs()
            );
        }

        if prev > MAX_OUTPUTS {
            return Err(SnnError::Capacity { resource: "outputs", requested: prev, limit: MAX_OUTPUTS });
        }

        for buffer in self.buffers.iter_mut() {
            buffer.clear();
        }
        self.front = 0;
        self.sums.fill(0);
        self.counts.reshape(0, 0)?;
        self.dynamics = dynamics;
        self.depth = topology.len();
        debug!("network ready: {} layers, {:?} dynamics", self.depth, dynamics);
        Ok(())
    }

    /// Layers in pipeline order
    pub fn layers(&self) -> &[Layer<'w>] {
        &self.layers[..self.depth]
    }

    /// Mutable access to one layer, e.g. to override per-neuron parameters
    pub fn layer_mut(&mut self, index: usize) -> Option<&mut Layer<'w>> {
        self.layers[..self.depth].get_mut(index)
    }

    /// Width of the input layer, 0 before initialization
    pub fn input_neurons(&self) -> usize {
        self.layers().first().map_or(0, Layer::neurons)
    }

    /// Number of output neurons (classes), 0 before initialization
    pub fn output_neurons(&self) -> usize {
        self.layers().last().map_or(0, Layer::neurons)
    }

    /// Membrane dynamics in use
    pub fn dynamics(&self) -> Dynamics {
        self.dynamics
    }

    /// Firing counts of the most recent inference
    pub fn firing_counts(&self) -> &FiringCounts {
        &self.counts
    }

    /// Clear membrane potentials and reset flags of every layer
    pub fn zero(&mut self) {
        for layer in self.layers[..self.depth].iter_mut() {
            layer.zero();
        }
    }

    /// Alias of [`Self::zero`]
    pub fn reset(&mut self) {
        self.zero();
    }

    /// Run one sample and classify it. `Ok(None)` means no output neuron
    /// fired.
    pub fn run_inference<S: SpikeSource + ?Sized>(&mut self, source: &S, sample: usize) -> Result<Option<usize>> {
        self.infer(source, sample)?;
        Ok(classify(&self.counts))
    }

    /// Run one sample and return the firing-count table
    pub fn infer<S: SpikeSource + ?Sized>(&mut self, source: &S, sample: usize) -> Result<&FiringCounts> {
        let chunks = self.check_source(source, sample)?;
        self.zero();
        let outputs = self.output_neurons();
        self.counts.reshape(outputs, chunks)?;

        for chunk in 0..chunks {
            let loaded = &mut self.buffers[self.front];
            for t in 0..TAU {
                source.load_row(sample, chunk * TAU + t, loaded.row_mut(t));
            }

            for (index, layer) in self.layers[..self.depth].iter_mut().enumerate() {
                let (input, output) = ping_pong(&mut self.buffers, self.front);
                if log_enabled!(Level::Trace) {
                    let active: usize = (0..TAU).map(|t| input.active_count(t, layer.inputs())).sum();
                    trace!("chunk {} layer {} ({}): {} input spikes", chunk, index, layer.kind().name(), active);
                }
                layer.update(input, output, &mut self.sums, self.dynamics);
                self.front ^= 1;
            }

            let last = &self.buffers[self.front];
            for t in 0..TAU {
                for neuron in SetBits::new(last.row(t), outputs) {
                    self.counts.increment(neuron, chunk);
                }
            }
        }

        Ok(&self.counts)
    }

    fn check_source<S: SpikeSource + ?Sized>(&self, source: &S, sample: usize) -> Result<usize> {
        if self.depth == 0 {
            return Err(SnnError::InvalidTopology("network is not initialized"));
        }
        if sample >= source.samples() {
            return Err(SnnError::SampleOutOfRange { sample, samples: source.samples() });
        }
        if source.neurons() != self.input_neurons() {
            return Err(SnnError::InvalidSource("input width does not match the input layer"));
        }
        let window = source.time_window();
        if window == 0 || window % TAU != 0 {
            return Err(SnnError::InvalidSource("time window must be a positive multiple of TAU"));
        }
        let chunks = window / TAU;
        if chunks > MAX_CHUNKS {
            return Err(SnnError::Capacity { resource: "chunks", requested: chunks, limit: MAX_CHUNKS });
        }
        Ok(chunks)
    }
}

impl core::fmt::Debug for Network<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Network")
            .field("layers", &self.layers())
            .field("dynamics", &self.dynamics)
            .finish()
    }
}

impl Default for Network<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// Read buffer and write buffer for the current front index
#[inline(always)]
fn ping_pong(buffers: &mut [SpikeBuffer; 2], front: usize) -> (&SpikeBuffer, &mut SpikeBuffer) {
    let [a, b] = buffers;
    if front == 0 {
        (&*a, b)
    } else {
        (&*b, a)
    }
}

/// Builder for [`Network`]
#[derive(Debug, Clone)]
pub struct NetworkBuilder<'w> {
    specs: Vec<LayerSpec<'w>, MAX_LAYERS>,
    requested: usize,
    params: NeuronParams,
    dynamics: Dynamics,
}

impl<'w> NetworkBuilder<'w> {
    /// Create an empty builder with default neuron parameters
    pub fn new() -> Self {
        Self {
            specs: Vec::new(),
            requested: 0,
            params: NeuronParams::default(),
            dynamics: Dynamics::default(),
        }
    }

    /// Append an input layer
    pub fn input(self, neurons: usize) -> Self {
        self.layer(LayerSpec::Input { neurons })
    }

    /// Append a convolution layer
    pub fn conv(self, weights: ConvWeights<'w>) -> Self {
        self.layer(LayerSpec::Conv(weights))
    }

    /// Append a fully-connected layer
    pub fn fully_connected(self, weights: DenseWeights<'w>) -> Self {
        self.layer(LayerSpec::FullyConnected(weights))
    }

    /// Append any layer
    pub fn layer(mut self, spec: LayerSpec<'w>) -> Self {
        self.requested += 1;
        // overflow is reported by build()
        let _ = self.specs.push(spec);
        self
    }

    /// Neuron parameters shared by every layer
    pub fn params(mut self, params: NeuronParams) -> Self {
        self.params = params;
        self
    }

    /// Membrane dynamics
    pub fn dynamics(mut self, dynamics: Dynamics) -> Self {
        self.dynamics = dynamics;
        self
    }

    /// Build the network by value
    pub fn build(self) -> Result<Network<'w>> {
        self.check_requested()?;
        Network::initialize(&self.specs, self.params, self.dynamics)
    }

    /// Configure an existing network in place, e.g. one held in a `static`
    pub fn build_into(self, network: &mut Network<'w>) -> Result<()> {
        if let Err(err) = self.check_requested() {
            network.depth = 0;
            return Err(err);
        }
        network.init(&self.specs, self.params, self.dynamics)
    }

    fn check_requested(&self) -> Result<()> {
        if self.requested > MAX_LAYERS {
            return Err(SnnError::Capacity {
                resource: "layers",
                requested: self.requested,
                limit: MAX_LAYERS,
            });
        }
        Ok(())
    }
}

impl Default for NetworkBuilder<'_> {
    fn default() -> Self {
        Self::new()
    }
}
