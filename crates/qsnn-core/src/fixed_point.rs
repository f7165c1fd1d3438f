//! Q0.7 fixed-point codec
//!
//! Weights and biases are stored as signed 8-bit values with 7 fractional
//! bits (scale factor 128). Conversion to and from `f32` happens only here;
//! every inference-time computation after loading is integer arithmetic.
//!
//! Accumulators (membrane potentials, weighted sums) are `i32` values on the
//! same scale, so a Q0.7 weight can be added to them without any shift.
//! Thresholds and decay rates use `i16` on the same scale.

/// Number of fractional bits
pub const FRAC_BITS: u32 = 7;

/// Scale factor (2^7 = 128)
pub const SCALE: i32 = 1 << FRAC_BITS;

/// Smallest representable value (-1.0)
pub const MIN_FLOAT: f32 = -1.0;

/// Largest representable value (127/128)
pub const MAX_FLOAT: f32 = 0.992_187_5;

/// Q0.7 encoding of 1.0 on the accumulator scale
pub const ONE: i32 = SCALE;

/// Quantize a float to Q0.7.
///
/// Clamps to `[-1.0, 0.9921875]`, scales by 128 and rounds half away from
/// zero. NaN maps to 0.
#[inline]
pub fn quantize(x: f32) -> i8 {
    if x.is_nan() {
        return 0;
    }
    let clamped = x.clamp(MIN_FLOAT, MAX_FLOAT);
    let scaled = libm::roundf(clamped * SCALE as f32) as i32;
    scaled.clamp(i8::MIN as i32, i8::MAX as i32) as i8
}

/// Convert a Q0.7 value (or a Q0.7-scaled accumulator) back to float
#[inline]
pub fn dequantize(q: i32) -> f32 {
    q as f32 / SCALE as f32
}

/// Quantize a table of floats into `dst`.
///
/// Returns the number of inputs that fell outside the representable range
/// and were clamped. Only `min(src.len(), dst.len())` values are written.
pub fn quantize_slice(src: &[f32], dst: &mut [i8]) -> usize {
    let mut clamped = 0;
    for (d, &x) in dst.iter_mut().zip(src) {
        if !(MIN_FLOAT..=MAX_FLOAT).contains(&x) {
            clamped += 1;
        }
        *d = quantize(x);
    }
    clamped
}

/// Encode a neuron parameter (threshold, decay rate) on the Q0.7 scale.
///
/// Unlike [`quantize`] the value is not limited to `[-1, 1)`; it saturates at
/// the `i16` range instead, so a threshold of 2.5 becomes 320.
#[inline]
pub fn to_q7_i16(x: f32) -> i16 {
    if x.is_nan() {
        return 0;
    }
    // float -> int `as` casts saturate
    libm::roundf(x * SCALE as f32) as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamping() {
        assert_eq!(quantize(1.5), 127);
        assert_eq!(quantize(-2.0), -128);
        assert_eq!(quantize(f32::INFINITY), 127);
        assert_eq!(quantize(f32::NEG_INFINITY), -128);
        assert_eq!(quantize(f32::NAN), 0);
    }

    #[test]
    fn test_exact_codes() {
        for q in i8::MIN..=i8::MAX {
            let x = dequantize(q as i32);
            assert_eq!(quantize(x), q);
        }
    }

    #[test]
    fn test_rounding_half_away_from_zero() {
        // 0.5/128 and -0.5/128 sit exactly on the midpoint
        assert_eq!(quantize(0.5 / 128.0), 1);
        assert_eq!(quantize(-0.5 / 128.0), -1);
        assert_eq!(quantize(0.4 / 128.0), 0);
        assert_eq!(quantize(-0.4 / 128.0), 0);
        assert_eq!(quantize(0.5), 64);
        assert_eq!(quantize(-0.25), -32);
    }

    #[test]
    fn test_just_below_midpoint_rounds_toward_zero() {
        // largest f32 under 0.5/128; adding 0.5 in f32 would round it up to 1.0
        let below = f32::from_bits((0.5f32 / 128.0).to_bits() - 1);
        assert!(below * 128.0 < 0.5);
        assert_eq!(quantize(below), 0);
        assert_eq!(quantize(-below), 0);

        let below_half = f32::from_bits(0.5f32.to_bits() - 1);
        assert_eq!(to_q7_i16(below_half / 128.0), 0);
        assert_eq!(to_q7_i16(-below_half / 128.0), 0);
        assert_eq!(to_q7_i16(0.5 / 128.0), 1);
        assert_eq!(to_q7_i16(-0.5 / 128.0), -1);
    }

    #[test]
    fn test_quantize_slice_counts_clamped() {
        let src = [0.0, 0.5, 1.0, -1.5, 0.25];
        let mut dst = [0i8; 5];
        let clamped = quantize_slice(&src, &mut dst);
        assert_eq!(clamped, 2);
        assert_eq!(dst, [0, 64, 127, -128, 32]);
    }

    #[test]
    fn test_parameter_encoding() {
        assert_eq!(to_q7_i16(1.0), 128);
        assert_eq!(to_q7_i16(0.95), 122);
        assert_eq!(to_q7_i16(2.5), 320);
        assert_eq!(to_q7_i16(-0.5), -64);
        assert_eq!(to_q7_i16(1.0e9), i16::MAX);
    }
}
