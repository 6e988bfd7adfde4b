//! Binarized convolution implementations.
//!
//! Provides three interchangeable strategies for the thresholded XNOR
//! convolution: direct (reference), a sliding line buffer, and a rayon
//! parallel sweep over output channels. All produce bit-identical output.

mod direct;
mod line_buffer;
mod parallel;

pub use direct::conv2d_direct;
pub use line_buffer::{conv2d_line_buffer, LineBuffer};
pub use parallel::conv2d_parallel;

use serde::{Deserialize, Serialize};

use crate::tensor::{BitTensor, ConvWeights, Thresholds};

/// Largest term count whose doubled agreement still fits in `i16`.
pub const MAX_SCORE_TERMS: usize = i16::MAX as usize / 2;

/// Selects which convolution strategy to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConvStrategy {
    /// Re-reads every receptive field from the input tensor (reference implementation).
    Direct,
    /// Single raster sweep with an incrementally maintained line buffer.
    #[default]
    LineBuffer,
    /// One line-buffer sweep per output channel, channels spread over the rayon pool.
    Parallel,
}

/// Converts an XNOR agreement count over `terms` positions into the signed
/// {-1, +1} dot product `2 * matches - terms`.
///
/// # Panics
///
/// Panics if `matches > terms` or `2 * terms > i16::MAX`. Network construction
/// rejects layers that could reach the second case.
#[inline]
pub fn xnor_score(matches: usize, terms: usize) -> i16 {
    assert!(
        matches <= terms && terms <= MAX_SCORE_TERMS,
        "xnor score of {} / {} terms does not fit the i16 accumulator",
        matches,
        terms
    );
    ((matches as i16) << 1) - terms as i16
}

/// Output spatial size `(h - F + 1, w - F + 1)` of a convolution over a padded input.
pub fn output_size(input: &BitTensor, kernel_size: usize) -> (usize, usize) {
    (input.h + 1 - kernel_size, input.w + 1 - kernel_size)
}

/// Dispatch convolution to the selected strategy.
///
/// Input should already be padded. Output channel `n` at `(y, x)` is set when
/// the window score exceeds `thresholds[n]`.
pub fn conv2d(
    strategy: ConvStrategy,
    input: &BitTensor,
    weights: &ConvWeights,
    thresholds: &Thresholds,
) -> BitTensor {
    debug_assert_eq!(input.c, weights.in_channels);
    debug_assert_eq!(thresholds.len(), weights.out_channels);
    debug_assert!(input.h >= weights.kernel_size && input.w >= weights.kernel_size);
    match strategy {
        ConvStrategy::Direct => conv2d_direct(input, weights, thresholds),
        ConvStrategy::LineBuffer => conv2d_line_buffer(input, weights, thresholds),
        ConvStrategy::Parallel => conv2d_parallel(input, weights, thresholds),
    }
}
