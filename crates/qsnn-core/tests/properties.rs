//! Property tests for the codec, the spike buffer and the convolution kernels

use proptest::prelude::*;
use qsnn_core::{
    conv_dense_add, conv_sparse_add, dequantize, quantize, ConvGeometry, ConvWeights, SpikeBuffer, MAX_NEURONS,
    TAU,
};

fn pack(bits: &[bool]) -> Vec<u8> {
    let mut out = vec![0u8; (bits.len() + 7) / 8];
    for (i, _) in bits.iter().enumerate().filter(|&(_, &b)| b) {
        out[i >> 3] |= 1 << (i & 7);
    }
    out
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_codec_error_within_half_step(x in -1.0f32..0.9921875) {
        let back = dequantize(quantize(x) as i32);
        prop_assert!((back - x).abs() <= 1.0 / 256.0 + f32::EPSILON);
    }

    #[test]
    fn prop_codec_clamps_out_of_range(x in prop::num::f32::NORMAL) {
        let q = quantize(x);
        if x >= 1.0 {
            prop_assert_eq!(q, 127);
        } else if x <= -1.0 {
            prop_assert_eq!(q, -128);
        }
    }

    #[test]
    fn prop_codec_is_monotonic(a in -2.0f32..2.0, b in -2.0f32..2.0) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(quantize(lo) <= quantize(hi));
    }

    #[test]
    fn prop_set_touches_one_bit(
        neuron in 0..MAX_NEURONS,
        t in 0..TAU,
        probes in prop::collection::vec((0..MAX_NEURONS, 0..TAU), 1..32),
    ) {
        let mut buffer = SpikeBuffer::new();
        buffer.set(neuron, t, true);
        prop_assert!(buffer.get(neuron, t));
        for (n, s) in probes {
            prop_assert_eq!(buffer.get(n, s), n == neuron && s == t);
        }
        prop_assert_eq!(buffer.active_count(t, MAX_NEURONS), 1);

        buffer.set(neuron, t, false);
        prop_assert!(!buffer.get(neuron, t));
        prop_assert_eq!(buffer.active_count(t, MAX_NEURONS), 0);
    }

    #[test]
    fn prop_spikes_at_lists_set_bits(bits in prop::collection::vec(any::<bool>(), 1..200)) {
        let mut buffer = SpikeBuffer::new();
        for (n, &b) in bits.iter().enumerate() {
            buffer.set(n, 0, b);
        }
        let listed: Vec<usize> = buffer.spikes_at(0, bits.len()).collect();
        let expected: Vec<usize> = bits.iter().enumerate().filter(|&(_, &b)| b).map(|(n, _)| n).collect();
        prop_assert_eq!(listed, expected);
    }

    #[test]
    fn prop_sparse_conv_matches_dense(
        (in_side, kernel) in (3usize..12).prop_flat_map(|s| (Just(s), 1..=s.min(5))),
        filters in 1usize..4,
        seed in any::<u64>(),
        density in 0.0f64..1.0,
    ) {
        let geometry = ConvGeometry::new(in_side, kernel, filters).unwrap();

        // cheap deterministic fill from the seed
        let mut state = seed | 1;
        let mut next = move || {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            state
        };
        let table: Vec<i8> = (0..geometry.kernel_len()).map(|_| next() as i8).collect();
        let bias: Vec<i8> = (0..filters).map(|_| next() as i8).collect();
        let plane: Vec<bool> = (0..geometry.inputs())
            .map(|_| (next() % 1000) as f64 / 1000.0 < density)
            .collect();

        let weights = ConvWeights::new(geometry, &table, &bias).unwrap();
        let bits = pack(&plane);
        let mut sparse = vec![0i32; geometry.outputs()];
        let mut dense = vec![0i32; geometry.outputs()];
        conv_sparse_add(&bits, &weights, &mut sparse);
        conv_dense_add(&bits, &weights, &mut dense);
        prop_assert_eq!(sparse, dense);
    }
}
