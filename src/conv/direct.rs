use super::{output_size, xnor_score};
use crate::tensor::{BitTensor, ConvWeights, Thresholds};

/// Nested-loop binarized convolution (reference implementation).
///
/// Compares every input bit of every receptive field with its weight bit
/// directly, without packing or buffering.
pub fn conv2d_direct(
    input: &BitTensor,
    weights: &ConvWeights,
    thresholds: &Thresholds,
) -> BitTensor {
    let f = weights.kernel_size;
    let terms = weights.window_len();
    let (out_h, out_w) = output_size(input, f);
    let mut output = BitTensor::new(weights.out_channels, out_h, out_w);

    for n in 0..weights.out_channels {
        for y in 0..out_h {
            for x in 0..out_w {
                let mut matches = 0usize;
                for r in 0..f {
                    for c in 0..f {
                        for m in 0..weights.in_channels {
                            if input.get(m, y + r, x + c) == weights.get(m, n, r, c) {
                                matches += 1;
                            }
                        }
                    }
                }
                let score = xnor_score(matches, terms);
                output.set(n, y, x, score > thresholds.get(n));
            }
        }
    }
    output
}
