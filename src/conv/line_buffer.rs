use std::ops::Range;

use super::{output_size, xnor_score};
use crate::tensor::{BitTensor, BitVec, ConvWeights, Thresholds};

const WORD_BITS: usize = 64;

/// Sliding window over a feature map, fed in raster order.
///
/// Holds the most recent `(F - 1) * W + F` pixels of all channels in a ring.
/// When the oldest pixel is the top-left corner of the current window, the
/// pixel at kernel offset `(r, c)` lives `r * W + c` slots after it. Moving the
/// window one column right pushes one pixel; moving from the end of one output
/// row to the start of the next pushes `F` pixels.
pub struct LineBuffer<'a> {
    input: &'a BitTensor,
    kernel_size: usize,
    capacity: usize,
    words_per_pixel: usize,
    slots: Vec<u64>,
    head: usize,
    len: usize,
    next: usize,
}

impl<'a> LineBuffer<'a> {
    /// Creates a buffer positioned at output `(0, 0)`.
    pub fn new(input: &'a BitTensor, kernel_size: usize) -> Self {
        debug_assert!(input.h >= kernel_size && input.w >= kernel_size);
        let capacity = (kernel_size - 1) * input.w + kernel_size;
        let words_per_pixel = input.c.div_ceil(WORD_BITS);
        let mut buffer = LineBuffer {
            input,
            kernel_size,
            capacity,
            words_per_pixel,
            slots: vec![0u64; capacity * words_per_pixel],
            head: 0,
            len: 0,
            next: 0,
        };
        for _ in 0..capacity {
            buffer.shift_in();
        }
        buffer
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Loads the next raster pixel, evicting the oldest once the ring is full.
    fn shift_in(&mut self) {
        let (y, x) = (self.next / self.input.w, self.next % self.input.w);
        let slot = if self.len == self.capacity {
            let slot = self.head;
            self.head = (self.head + 1) % self.capacity;
            slot
        } else {
            self.len += 1;
            (self.head + self.len - 1) % self.capacity
        };
        let base = slot * self.words_per_pixel;
        let words = &mut self.slots[base..base + self.words_per_pixel];
        words.fill(0);
        for m in 0..self.input.c {
            if self.input.get(m, y, x) {
                words[m / WORD_BITS] |= 1 << (m % WORD_BITS);
            }
        }
        self.next += 1;
    }

    /// Moves the window one column to the right.
    pub fn advance_column(&mut self) {
        self.shift_in();
    }

    /// Moves the window from the last column of one output row to the first
    /// column of the next.
    pub fn advance_row(&mut self) {
        for _ in 0..self.kernel_size {
            self.shift_in();
        }
    }

    /// Bit of channel `m` at kernel offset `(r, c)` of the current window.
    #[inline]
    pub fn pixel(&self, r: usize, c: usize, m: usize) -> bool {
        let slot = (self.head + r * self.input.w + c) % self.capacity;
        let word = self.slots[slot * self.words_per_pixel + m / WORD_BITS];
        (word >> (m % WORD_BITS)) & 1 == 1
    }

    /// Copies the current window into `window` in `(row, col, channel)` order.
    pub fn gather(&self, window: &mut BitVec) {
        let f = self.kernel_size;
        let channels = self.input.c;
        for r in 0..f {
            for c in 0..f {
                for m in 0..channels {
                    window.set((r * f + c) * channels + m, self.pixel(r, c, m));
                }
            }
        }
    }
}

/// Sweeps one line buffer across the input and emits the thresholded bit of
/// every output channel in `channels` at every output position.
pub(crate) fn sweep(
    input: &BitTensor,
    weights: &ConvWeights,
    thresholds: &Thresholds,
    channels: Range<usize>,
    mut emit: impl FnMut(usize, usize, usize, bool),
) {
    let terms = weights.window_len();
    let (out_h, out_w) = output_size(input, weights.kernel_size);
    let mut buffer = LineBuffer::new(input, weights.kernel_size);
    let mut window = BitVec::new(terms);

    tracing::trace!(
        capacity = buffer.capacity(),
        out_h,
        out_w,
        channels = ?channels,
        "line buffer sweep"
    );

    for y in 0..out_h {
        for x in 0..out_w {
            buffer.gather(&mut window);
            for n in channels.clone() {
                let score = xnor_score(window.xnor_count(weights.kernel(n)), terms);
                emit(n, y, x, score > thresholds.get(n));
            }
            if x + 1 < out_w {
                buffer.advance_column();
            }
        }
        if y + 1 < out_h {
            buffer.advance_row();
        }
    }
}

/// Binarized convolution using a single line-buffer sweep for all output channels.
pub fn conv2d_line_buffer(
    input: &BitTensor,
    weights: &ConvWeights,
    thresholds: &Thresholds,
) -> BitTensor {
    let (out_h, out_w) = output_size(input, weights.kernel_size);
    let mut output = BitTensor::new(weights.out_channels, out_h, out_w);
    sweep(input, weights, thresholds, 0..weights.out_channels, |n, y, x, bit| {
        output.set(n, y, x, bit)
    });
    output
}
