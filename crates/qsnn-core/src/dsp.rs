//! Bulk elementwise primitives over fixed-point arrays
//!
//! Plain zipped loops: no bounds checks inside the body and no aliasing, so
//! the compiler is free to vectorize them. All functions operate on
//! `min(len)` of their arguments.

/// `dst[i] += src[i]` widening Q0.7 into the accumulator scale
#[inline]
pub fn add_q7_to_q31(src: &[i8], dst: &mut [i32]) {
    for (d, &s) in dst.iter_mut().zip(src) {
        *d = d.saturating_add(s as i32);
    }
}

/// `dst[i] += src[i]`
#[inline]
pub fn add_q31(src: &[i32], dst: &mut [i32]) {
    for (d, &s) in dst.iter_mut().zip(src) {
        *d = d.saturating_add(s);
    }
}

/// `dst[i] = src[i]` widening Q0.7 into the accumulator scale
#[inline]
pub fn copy_q7_to_q31(src: &[i8], dst: &mut [i32]) {
    for (d, &s) in dst.iter_mut().zip(src) {
        *d = s as i32;
    }
}

/// `values[i] = (values[i] * factors[i]) >> shift`
///
/// The product is formed in 64 bits; the shift is arithmetic, so negative
/// potentials round toward negative infinity.
#[inline]
pub fn scale_q31(values: &mut [i32], factors: &[i16], shift: u32) {
    for (v, &f) in values.iter_mut().zip(factors) {
        let scaled = (*v as i64 * f as i64) >> shift;
        *v = scaled.clamp(i32::MIN as i64, i32::MAX as i64) as i32;
    }
}

/// `mask[i] = values[i] >= thresholds[i]`
#[inline]
pub fn compare_ge_q31(values: &[i32], thresholds: &[i16], mask: &mut [u8]) {
    for ((m, &v), &t) in mask.iter_mut().zip(values).zip(thresholds) {
        *m = (v >= t as i32) as u8;
    }
}

/// `values[i] -= thresholds[i]` where `mask[i]` is set
#[inline]
pub fn sub_where_q31(mask: &[u8], thresholds: &[i16], values: &mut [i32]) {
    for ((v, &m), &t) in values.iter_mut().zip(mask).zip(thresholds) {
        if m != 0 {
            *v = v.saturating_sub(t as i32);
        }
    }
}

/// Pack a 0/1 mask into a bit row, eight neurons per byte.
///
/// Every byte covering the mask is rewritten, so stale bits from a previous
/// use of the row never leak through.
#[inline]
pub fn pack_bits(mask: &[u8], row: &mut [u8]) {
    for (byte, chunk) in row.iter_mut().zip(mask.chunks(8)) {
        let mut packed = 0u8;
        for (bit, &m) in chunk.iter().enumerate() {
            packed |= ((m != 0) as u8) << bit;
        }
        *byte = packed;
    }
}
