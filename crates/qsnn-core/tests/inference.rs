//! End-to-end inference through the public API

use std::sync::Mutex;
use std::thread;

use qsnn_core::prelude::*;
use qsnn_core::{layer::ONE_SPIKE_CONTRIBUTION, MAX_NEURONS};

// input-major: row j holds the weights from input j to both outputs
static FC_WEIGHTS: [i8; 8] = [
    100, 0, //
    28, 0, //
    0, 64, //
    0, 64, //
];
static FC_BIAS: [i8; 2] = [0, 0];

fn two_class_network(dynamics: Dynamics) -> Box<Network<'static>> {
    let fc = DenseWeights::new(4, 2, &FC_WEIGHTS, &FC_BIAS).unwrap();
    let mut net = Box::new(Network::new());
    NetworkBuilder::new()
        .input(4)
        .fully_connected(fc)
        .dynamics(dynamics)
        .build_into(&mut net)
        .unwrap();
    net
}

/// Chunk 0: inputs 0 and 1 on even steps, input 2 on odd steps.
/// Chunk 1: inputs 2 and 3 on every step.
fn scripted_spike(t: usize, neuron: usize) -> bool {
    if t < TAU {
        if t % 2 == 0 {
            neuron == 0 || neuron == 1
        } else {
            neuron == 2
        }
    } else {
        neuron == 2 || neuron == 3
    }
}

fn scripted_sample() -> PackedSpikes<Vec<u8>> {
    let window = 2 * TAU;
    let mut spikes = PackedSpikes::new(vec![0u8; window], 1, window, 4).unwrap();
    for t in 0..window {
        for n in 0..4 {
            spikes.set(0, t, n, scripted_spike(t, n));
        }
    }
    spikes
}

struct Scripted;

impl SpikeSource for Scripted {
    fn samples(&self) -> usize {
        1
    }

    fn time_window(&self) -> usize {
        2 * TAU
    }

    fn neurons(&self) -> usize {
        4
    }

    fn spike(&self, _sample: usize, t: usize, neuron: usize) -> bool {
        scripted_spike(t, neuron)
    }
}

#[test]
fn scripted_sample_counts_per_chunk() {
    let mut net = two_class_network(Dynamics::Leaky);
    let spikes = scripted_sample();

    let class = net.run_inference(&spikes, 0).unwrap();
    let counts = net.firing_counts();

    // neuron 0 fires on each drive of 128; neuron 1 integrates 64s through
    // the leak and fires twice in chunk 0, then on every step of chunk 1
    assert_eq!(counts.row(0), &[5, 0]);
    assert_eq!(counts.row(1), &[2, 10]);
    assert_eq!(class, Some(1));
}

#[test]
fn non_leaky_dynamics() {
    let mut net = two_class_network(Dynamics::NonLeaky);
    assert_eq!(net.dynamics(), Dynamics::NonLeaky);
    let class = net.run_inference(&scripted_sample(), 0).unwrap();
    assert_eq!(net.firing_counts().row(0), &[5, 0]);
    assert_eq!(net.firing_counts().row(1), &[2, 10]);
    assert_eq!(class, Some(1));
}

#[test]
fn bitwise_source_matches_packed_source() {
    let mut net = two_class_network(Dynamics::Leaky);
    net.run_inference(&scripted_sample(), 0).unwrap();
    let packed = net.firing_counts().clone();

    net.run_inference(&Scripted, 0).unwrap();
    assert_eq!(net.firing_counts(), &packed);
}

#[test]
fn repeated_inference_is_identical() {
    let mut net = two_class_network(Dynamics::Leaky);
    let spikes = scripted_sample();

    let first = net.run_inference(&spikes, 0).unwrap();
    let first_counts = net.firing_counts().clone();
    for _ in 0..3 {
        assert_eq!(net.run_inference(&spikes, 0).unwrap(), first);
        assert_eq!(net.firing_counts(), &first_counts);
    }
}

#[test]
fn state_does_not_leak_between_samples() {
    let window = 2 * TAU;
    // sample 0 charges neuron 1 to just under threshold, sample 1 is silent
    let mut spikes = PackedSpikes::new(vec![0u8; 2 * window], 2, window, 4).unwrap();
    spikes.set(0, window - 1, 2, true);

    let mut net = two_class_network(Dynamics::Leaky);
    net.run_inference(&spikes, 0).unwrap();
    assert_eq!(net.layers()[1].potentials(), &[0, 64]);

    assert_eq!(net.run_inference(&spikes, 1).unwrap(), None);
    assert_eq!(net.layers()[1].potentials(), &[0, 0]);
}

#[test]
fn silent_sample_is_unclassified() {
    let mut net = two_class_network(Dynamics::Leaky);
    let silent = PackedSpikes::new(vec![0u8; 3 * TAU], 1, 3 * TAU, 4).unwrap();
    assert_eq!(net.run_inference(&silent, 0).unwrap(), None);
    let counts = net.firing_counts();
    assert_eq!(counts.neurons(), 2);
    assert_eq!(counts.chunks(), 3);
}

#[test]
fn per_neuron_threshold_override() {
    let mut net = two_class_network(Dynamics::Leaky);
    net.layer_mut(1).unwrap().set_threshold(1, i16::MAX).unwrap();
    assert_eq!(net.run_inference(&scripted_sample(), 0).unwrap(), Some(0));
    assert_eq!(net.firing_counts().total(1), 0);
    assert!(net.layer_mut(2).is_none());
}

#[test]
fn reset_clears_every_layer() {
    let mut net = two_class_network(Dynamics::Leaky);
    net.run_inference(&scripted_sample(), 0).unwrap();
    assert!(net.layers()[1].potentials().iter().any(|&v| v != 0));
    net.reset();
    for layer in net.layers() {
        assert!(layer.potentials().iter().all(|&v| v == 0));
        assert!(layer.reset_flags().iter().all(|&f| f == 0));
    }
}

#[test]
fn source_errors() {
    let mut net = two_class_network(Dynamics::Leaky);

    let wrong_width = PackedSpikes::new(vec![0u8; TAU], 1, TAU, 8).unwrap();
    assert!(matches!(net.run_inference(&wrong_width, 0), Err(SnnError::InvalidSource(_))));

    let empty_window = PackedSpikes::new(Vec::new(), 1, 0, 4).unwrap();
    assert!(matches!(net.run_inference(&empty_window, 0), Err(SnnError::InvalidSource(_))));

    let spikes = scripted_sample();
    let err = net.run_inference(&spikes, 5).unwrap_err();
    assert_eq!(err, SnnError::SampleOutOfRange { sample: 5, samples: 1 });
    assert!(!err.is_configuration());
}

#[test]
fn topology_errors() {
    let fc = DenseWeights::new(4, 2, &FC_WEIGHTS, &FC_BIAS).unwrap();
    let mut net = Box::new(Network::new());

    let oversized = NetworkBuilder::new()
        .input(MAX_NEURONS + 1)
        .fully_connected(fc)
        .build_into(&mut net);
    assert!(matches!(oversized, Err(SnnError::Capacity { resource: "neurons", .. })));

    let mismatched = NetworkBuilder::new().input(3).fully_connected(fc).build_into(&mut net);
    let err = mismatched.unwrap_err();
    assert!(err.is_configuration());

    let bad_params = NetworkBuilder::new()
        .input(4)
        .fully_connected(fc)
        .params(NeuronParams { threshold: -1, decay: 122 })
        .build_into(&mut net);
    assert!(bad_params.is_err());
    assert!(net.layers().is_empty());
}

// 4x4 plane, one 3x3 filter of 0.5, then 4 -> 2 dense
static KERNEL: [i8; 9] = [64; 9];
static CONV_BIAS: [i8; 1] = [0];
static HEAD: [i8; 8] = [32, 0, 32, 0, 32, 0, 32, 0];
static HEAD_BIAS: [i8; 2] = [0, 0];

fn conv_network() -> Box<Network<'static>> {
    let geometry = ConvGeometry::new(4, 3, 1).unwrap();
    let conv = ConvWeights::new(geometry, &KERNEL, &CONV_BIAS).unwrap();
    let head = DenseWeights::new(4, 2, &HEAD, &HEAD_BIAS).unwrap();
    let mut net = Box::new(Network::new());
    NetworkBuilder::new()
        .input(16)
        .conv(conv)
        .fully_connected(head)
        .build_into(&mut net)
        .unwrap();
    net
}

#[test]
fn conv_pipeline_drives_head() {
    let mut net = conv_network();
    assert_eq!(net.layers().len(), 3);
    assert_eq!(net.layers()[1].neurons(), 4);

    // every pixel on: each window sums 9 x 64, every conv neuron fires, and
    // the head receives 4 x 32 = one threshold per step
    let mut spikes = PackedSpikes::new(vec![0u8; TAU * 2], 1, TAU, 16).unwrap();
    for t in 0..TAU {
        for n in 0..16 {
            spikes.set(0, t, n, true);
        }
    }
    assert_eq!(net.run_inference(&spikes, 0).unwrap(), Some(0));
    assert_eq!(net.firing_counts().row(0), &[TAU as u32]);
    assert_eq!(net.firing_counts().row(1), &[0]);
}

#[test]
fn input_layer_is_transparent() {
    // a single-layer network reports its input spikes as output spikes
    let mut net = Box::new(Network::new());
    NetworkBuilder::new().input(4).build_into(&mut net).unwrap();
    assert_eq!(ONE_SPIKE_CONTRIBUTION, 128);
    let mut spikes = PackedSpikes::new(vec![0u8; TAU], 1, TAU, 4).unwrap();
    for t in 0..TAU {
        spikes.set(0, t, 3, true);
        if t < 4 {
            spikes.set(0, t, 1, true);
        }
    }
    assert_eq!(net.run_inference(&spikes, 0).unwrap(), Some(3));
    assert_eq!(net.firing_counts().row(1), &[4]);
    assert_eq!(net.firing_counts().row(3), &[TAU as u32]);
}

// the engine state lives in a static; a worker whose stack is smaller than
// a default-capacity Network builds, rebuilds and runs it in place
static PLACED: Mutex<Network<'static>> = Mutex::new(Network::new());

#[test]
fn static_network_runs_on_a_small_stack() {
    let worker = thread::Builder::new()
        .stack_size(128 * 1024)
        .spawn(|| -> Result<(Option<usize>, Option<usize>)> {
            let mut net = PLACED.lock().unwrap();
            let fc = DenseWeights::new(4, 2, &FC_WEIGHTS, &FC_BIAS)?;
            NetworkBuilder::new().input(4).fully_connected(fc).build_into(&mut net)?;
            let first = net.run_inference(&scripted_sample(), 0)?;

            NetworkBuilder::new().input(4).build_into(&mut net)?;
            let second = net.run_inference(&scripted_sample(), 0)?;
            Ok((first, second))
        })
        .unwrap();

    // the bare input layer echoes input 2, the busiest one
    assert_eq!(worker.join().unwrap(), Ok((Some(1), Some(2))));
}
