//! Event-driven 2-D convolution over a bit-packed plane
//!
//! Valid convolution (no padding, stride 1) of a square `in_side × in_side`
//! spike plane with `filters` square kernels of side `kernel`. Outputs are
//! laid out position-major: `sums[(out_y * out_side + out_x) * filters + f]`.
//!
//! [`conv_sparse_add`] walks only the set input bits, so its cost scales with
//! active pixels × kernel², not with the plane size. [`conv_dense_add`]
//! computes the same sums the textbook way and serves as the reference.

use crate::{
    dsp,
    error::{Result, SnnError},
    spikes::SetBits,
};

/// Shape of a convolution layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvGeometry {
    in_side: usize,
    kernel: usize,
    filters: usize,
}

impl ConvGeometry {
    /// Validate and create a geometry
    pub const fn new(in_side: usize, kernel: usize, filters: usize) -> Result<Self> {
        if kernel == 0 || filters == 0 {
            return Err(SnnError::InvalidTopology("convolution needs a kernel and a filter"));
        }
        if in_side < kernel {
            return Err(SnnError::InvalidTopology("convolution kernel larger than input"));
        }
        Ok(Self { in_side, kernel, filters })
    }

    /// Side of the input plane
    pub const fn in_side(&self) -> usize {
        self.in_side
    }

    /// Side of the kernel
    pub const fn kernel(&self) -> usize {
        self.kernel
    }

    /// Number of filters
    pub const fn filters(&self) -> usize {
        self.filters
    }

    /// Side of the output plane
    pub const fn out_side(&self) -> usize {
        self.in_side - self.kernel + 1
    }

    /// Input neurons (pixels)
    pub const fn inputs(&self) -> usize {
        self.in_side * self.in_side
    }

    /// Output neurons (positions × filters)
    pub const fn outputs(&self) -> usize {
        self.out_side() * self.out_side() * self.filters
    }

    /// Entries of the kernel-column table
    pub const fn kernel_len(&self) -> usize {
        self.kernel * self.kernel * self.filters
    }
}

/// Borrowed convolution weights
///
/// `kernel_cols[(ky * kernel + kx) * filters + f]` holds the Q0.7 weight of
/// filter `f` at kernel offset `(ky, kx)`; `bias[f]` is the per-filter bias.
#[derive(Debug, Clone, Copy)]
pub struct ConvWeights<'w> {
    geometry: ConvGeometry,
    kernel_cols: &'w [i8],
    bias: &'w [i8],
}

impl<'w> ConvWeights<'w> {
    /// Check table sizes against the geometry
    pub fn new(geometry: ConvGeometry, kernel_cols: &'w [i8], bias: &'w [i8]) -> Result<Self> {
        if kernel_cols.len() != geometry.kernel_len() {
            return Err(SnnError::InvalidTopology("kernel table does not match geometry"));
        }
        if bias.len() != geometry.filters() {
            return Err(SnnError::InvalidTopology("conv bias length must equal filter count"));
        }
        Ok(Self { geometry, kernel_cols, bias })
    }

    /// Layer shape
    pub fn geometry(&self) -> ConvGeometry {
        self.geometry
    }

    /// Per-filter weights at one kernel offset
    #[inline(always)]
    fn column(&self, k_idx: usize) -> &'w [i8] {
        let f = self.geometry.filters;
        &self.kernel_cols[k_idx * f..(k_idx + 1) * f]
    }

    fn broadcast_bias(&self, sums: &mut [i32]) {
        for position in sums.chunks_exact_mut(self.geometry.filters) {
            dsp::copy_q7_to_q31(self.bias, position);
        }
    }
}

/// Event-driven convolution of the packed plane `input_bits` into `sums`.
///
/// `sums` receives `geometry.outputs()` values; anything past that is left
/// untouched.
pub fn conv_sparse_add(input_bits: &[u8], weights: &ConvWeights<'_>, sums: &mut [i32]) {
    let g = weights.geometry;
    let (k, f, in_side, out_side) = (g.kernel, g.filters, g.in_side, g.out_side());
    debug_assert!(sums.len() >= g.outputs());
    let sums = &mut sums[..g.outputs()];

    weights.broadcast_bias(sums);

    for idx in SetBits::new(input_bits, g.inputs()) {
        let (y0, x0) = (idx / in_side, idx % in_side);

        // kernel offsets that land inside the output plane:
        // 0 <= y0 - ky < out_side
        let ky_lo = (y0 + 1).saturating_sub(out_side);
        let ky_hi = k.min(y0 + 1);
        let kx_lo = (x0 + 1).saturating_sub(out_side);
        let kx_hi = k.min(x0 + 1);

        for ky in ky_lo..ky_hi {
            let out_y = y0 - ky;
            for kx in kx_lo..kx_hi {
                let out_x = x0 - kx;
                let base = (out_y * out_side + out_x) * f;
                dsp::add_q7_to_q31(weights.column(ky * k + kx), &mut sums[base..base + f]);
            }
        }
    }
}

/// Dense reference convolution: every output position, every kernel offset.
pub fn conv_dense_add(input_bits: &[u8], weights: &ConvWeights<'_>, sums: &mut [i32]) {
    let g = weights.geometry;
    let (k, f, in_side, out_side) = (g.kernel, g.filters, g.in_side, g.out_side());
    debug_assert!(sums.len() >= g.outputs());
    let sums = &mut sums[..g.outputs()];

    weights.broadcast_bias(sums);

    let pixel = |y: usize, x: usize| {
        let idx = y * in_side + x;
        (input_bits[idx >> 3] >> (idx & 7)) & 1 != 0
    };

    for out_y in 0..out_side {
        for out_x in 0..out_side {
            let base = (out_y * out_side + out_x) * f;
            for ky in 0..k {
                for kx in 0..k {
                    if pixel(out_y + ky, out_x + kx) {
                        dsp::add_q7_to_q31(weights.column(ky * k + kx), &mut sums[base..base + f]);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plane(bits: &[usize], side: usize) -> Vec<u8> {
        let mut out = vec![0u8; (side * side + 7) / 8];
        for &b in bits {
            out[b >> 3] |= 1 << (b & 7);
        }
        out
    }

    // 3x3 kernel, 1 filter, weights 1..=9 by offset
    const KERNEL: [i8; 9] = [1, 2, 3, 4, 5, 6, 7, 8, 9];
    const BIAS: [i8; 1] = [-3];

    fn weights() -> ConvWeights<'static> {
        let g = ConvGeometry::new(4, 3, 1).unwrap();
        ConvWeights::new(g, &KERNEL, &BIAS).unwrap()
    }

    #[test]
    fn test_geometry() {
        let g = ConvGeometry::new(28, 3, 4).unwrap();
        assert_eq!(g.out_side(), 26);
        assert_eq!(g.outputs(), 2704);
        assert_eq!(g.inputs(), 784);
        assert_eq!(g.kernel_len(), 36);
        assert!(ConvGeometry::new(2, 3, 1).is_err());
        assert!(ConvGeometry::new(4, 0, 1).is_err());
        assert!(ConvGeometry::new(4, 3, 0).is_err());
    }

    #[test]
    fn test_weight_table_shapes() {
        let g = ConvGeometry::new(4, 3, 2).unwrap();
        assert!(ConvWeights::new(g, &KERNEL, &[0, 0]).is_err());
        let table = [0i8; 18];
        assert!(ConvWeights::new(g, &table, &[0]).is_err());
        assert!(ConvWeights::new(g, &table, &[0, 0]).is_ok());
    }

    #[test]
    fn test_all_zero_input_is_bias() {
        let w = weights();
        let mut sums = [99i32; 4];
        conv_sparse_add(&plane(&[], 4), &w, &mut sums);
        assert_eq!(sums, [-3; 4]);
    }

    #[test]
    fn test_all_ones_input() {
        let w = weights();
        let all: Vec<usize> = (0..16).collect();
        let mut sparse = [0i32; 4];
        let mut dense = [0i32; 4];
        conv_sparse_add(&plane(&all, 4), &w, &mut sparse);
        conv_dense_add(&plane(&all, 4), &w, &mut dense);
        // every window is full: 45 - 3
        assert_eq!(sparse, [42; 4]);
        assert_eq!(sparse, dense);
    }

    #[test]
    fn test_single_corner_pixel() {
        let w = weights();
        // pixel (0,0) only touches output (0,0) through offset (0,0)
        let mut sums = [0i32; 4];
        conv_sparse_add(&plane(&[0], 4), &w, &mut sums);
        assert_eq!(sums, [-2, -3, -3, -3]);

        // pixel (1,1) is under offset (1,1) of out (0,0), (1,0) of out (0,1),
        // (0,1) of out (1,0) and (0,0) of out (1,1)
        let mut sums = [0i32; 4];
        conv_sparse_add(&plane(&[5], 4), &w, &mut sums);
        assert_eq!(sums, [5 - 3, 4 - 3, 2 - 3, 1 - 3]);
    }

    #[test]
    fn test_sparse_matches_dense_multi_filter() {
        let g = ConvGeometry::new(6, 3, 3).unwrap();
        let table: Vec<i8> = (0..g.kernel_len() as i32).map(|v| (v * 7 % 255 - 127) as i8).collect();
        let bias = [5i8, -7, 0];
        let w = ConvWeights::new(g, &table, &bias).unwrap();
        let bits = plane(&[0, 3, 7, 14, 20, 35, 29], 6);

        let mut sparse = vec![0i32; g.outputs()];
        let mut dense = vec![0i32; g.outputs()];
        conv_sparse_add(&bits, &w, &mut sparse);
        conv_dense_add(&bits, &w, &mut dense);
        assert_eq!(sparse, dense);
    }

    #[test]
    fn test_sums_past_outputs_untouched() {
        let w = weights();
        let mut sums = [7i32; 6];
        conv_sparse_add(&plane(&[], 4), &w, &mut sums);
        assert_eq!(&sums[4..], &[7, 7]);
    }
}
