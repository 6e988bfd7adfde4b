use crate::conv::xnor_score;
use crate::tensor::{BitTensor, BitVec, DenseWeights};

/// Embeds `input` in a tensor with a `margin`-wide border of `fill` on every
/// spatial side.
pub fn pad(input: &BitTensor, margin: usize, fill: bool) -> BitTensor {
    if margin == 0 {
        return input.clone();
    }
    let mut padded = BitTensor::filled(input.c, input.h + 2 * margin, input.w + 2 * margin, fill);
    for c in 0..input.c {
        for y in 0..input.h {
            for x in 0..input.w {
                padded.set(c, y + margin, x + margin, input.get(c, y, x));
            }
        }
    }
    padded
}

/// 2x2 binary max pooling with stride 2.
///
/// A pooled bit is the logical OR of its four inputs. The spatial size must be
/// even; `MaxPool2dLayer` rejects odd inputs when the network is built.
pub fn max_pool(input: &BitTensor) -> BitTensor {
    debug_assert!(input.h % 2 == 0 && input.w % 2 == 0);
    BitTensor::from_fn(input.c, input.h / 2, input.w / 2, |c, y, x| {
        input.get(c, 2 * y, 2 * x)
            || input.get(c, 2 * y, 2 * x + 1)
            || input.get(c, 2 * y + 1, 2 * x)
            || input.get(c, 2 * y + 1, 2 * x + 1)
    })
}

/// Flattens a CHW tensor channel-fastest: element `(c, y, x)` lands at
/// `c + (x + y * W) * C`.
pub fn flatten(input: &BitTensor) -> BitVec {
    let mut out = BitVec::new(input.len());
    for y in 0..input.h {
        for x in 0..input.w {
            for c in 0..input.c {
                out.set(c + (x + y * input.w) * input.c, input.get(c, y, x));
            }
        }
    }
    out
}

/// Binarized fully-connected product: `out[n] = 2 * matches(n) - M`.
pub fn dense(input: &BitVec, weights: &DenseWeights) -> Vec<i16> {
    debug_assert_eq!(input.len(), weights.inputs);
    (0..weights.outputs)
        .map(|n| xnor_score(input.xnor_count(weights.column(n)), weights.inputs))
        .collect()
}

/// Binarizes scores: strictly positive maps to 1.
pub fn sign(scores: &[i16]) -> BitVec {
    scores.iter().map(|&s| s > 0).collect()
}

/// Index of the largest score. Ties resolve to the lowest index; an empty
/// slice yields 0.
pub fn argmax(scores: &[i16]) -> usize {
    let mut max_idx = 0;
    for (i, &s) in scores.iter().enumerate().skip(1) {
        if s > scores[max_idx] {
            max_idx = i;
        }
    }
    max_idx
}
