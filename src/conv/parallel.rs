use rayon::prelude::*;

use super::line_buffer::sweep;
use super::output_size;
use crate::tensor::{BitTensor, BitVec, ConvWeights, Thresholds};

/// Binarized convolution with output channels spread across the rayon pool.
///
/// Every channel runs its own line-buffer sweep, so no buffer state is shared
/// between workers.
pub fn conv2d_parallel(
    input: &BitTensor,
    weights: &ConvWeights,
    thresholds: &Thresholds,
) -> BitTensor {
    let (out_h, out_w) = output_size(input, weights.kernel_size);
    let planes: Vec<BitVec> = (0..weights.out_channels)
        .into_par_iter()
        .map(|n| {
            let mut plane = BitVec::new(out_h * out_w);
            sweep(input, weights, thresholds, n..n + 1, |_, y, x, bit| {
                plane.set(y * out_w + x, bit)
            });
            plane
        })
        .collect();

    BitTensor::from_fn(weights.out_channels, out_h, out_w, |n, y, x| {
        planes[n].get(y * out_w + x)
    })
}
