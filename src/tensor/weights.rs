use std::fmt;

use super::BitVec;
use crate::error::{shape_mismatch, Error, Result};

fn check_binary(what: &str, bits: &[u8]) -> Result<()> {
    match bits.iter().position(|&b| b > 1) {
        Some(idx) => Err(Error::InvalidConfig(format!(
            "{} contains non-binary value {} at index {}",
            what, bits[idx], idx
        ))),
        None => Ok(()),
    }
}

/// Binary convolution weights with logical shape (in, out, kernel, kernel).
///
/// Each output channel keeps its kernel packed in `(row, col, in_channel)` order,
/// the same order in which a receptive field is gathered, so one XNOR popcount
/// yields the agreement count for a whole window.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConvWeights {
    pub in_channels: usize,
    pub out_channels: usize,
    pub kernel_size: usize,
    kernels: Vec<BitVec>,
}

impl ConvWeights {
    pub fn from_fn(
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        mut f: impl FnMut(usize, usize, usize, usize) -> bool,
    ) -> Self {
        let kernels = (0..out_channels)
            .map(|n| {
                let mut kernel = BitVec::new(kernel_size * kernel_size * in_channels);
                for r in 0..kernel_size {
                    for c in 0..kernel_size {
                        for m in 0..in_channels {
                            if f(m, n, r, c) {
                                kernel.set((r * kernel_size + c) * in_channels + m, true);
                            }
                        }
                    }
                }
                kernel
            })
            .collect();
        ConvWeights {
            in_channels,
            out_channels,
            kernel_size,
            kernels,
        }
    }

    /// Builds weights from one byte per bit in `(in, out, row, col)` order.
    pub fn from_flat(
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        bits: &[u8],
    ) -> Result<Self> {
        let expected = in_channels * out_channels * kernel_size * kernel_size;
        if bits.len() != expected {
            return Err(shape_mismatch("conv weights", expected, bits.len()));
        }
        check_binary("conv weights", bits)?;
        let k2 = kernel_size * kernel_size;
        Ok(ConvWeights::from_fn(in_channels, out_channels, kernel_size, |m, n, r, c| {
            bits[(m * out_channels + n) * k2 + r * kernel_size + c] == 1
        }))
    }

    pub fn get(&self, m: usize, n: usize, r: usize, c: usize) -> bool {
        self.kernels[n].get((r * self.kernel_size + c) * self.in_channels + m)
    }

    /// Packed kernel of output channel `n`.
    pub fn kernel(&self, n: usize) -> &BitVec {
        &self.kernels[n]
    }

    /// Number of terms in one receptive field, `F * F * M`.
    pub fn window_len(&self) -> usize {
        self.kernel_size * self.kernel_size * self.in_channels
    }

    pub fn memory_bytes(&self) -> usize {
        self.kernels.iter().map(|k| k.words().len() * 8).sum()
    }
}

impl fmt::Display for ConvWeights {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{}x{}x{} (bits)",
            self.in_channels, self.out_channels, self.kernel_size, self.kernel_size
        )
    }
}

/// Binary fully-connected weights with logical shape (inputs, outputs).
///
/// Stored column-wise: one packed vector of `inputs` bits per output unit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DenseWeights {
    pub inputs: usize,
    pub outputs: usize,
    columns: Vec<BitVec>,
}

impl DenseWeights {
    pub fn from_fn(inputs: usize, outputs: usize, mut f: impl FnMut(usize, usize) -> bool) -> Self {
        let columns = (0..outputs)
            .map(|n| (0..inputs).map(|m| f(m, n)).collect::<BitVec>())
            .collect();
        DenseWeights {
            inputs,
            outputs,
            columns,
        }
    }

    /// Builds weights from one byte per bit in `(in, out)` order.
    pub fn from_flat(inputs: usize, outputs: usize, bits: &[u8]) -> Result<Self> {
        if bits.len() != inputs * outputs {
            return Err(shape_mismatch("dense weights", inputs * outputs, bits.len()));
        }
        check_binary("dense weights", bits)?;
        Ok(DenseWeights::from_fn(inputs, outputs, |m, n| bits[m * outputs + n] == 1))
    }

    pub fn get(&self, m: usize, n: usize) -> bool {
        self.columns[n].get(m)
    }

    pub fn column(&self, n: usize) -> &BitVec {
        &self.columns[n]
    }

    pub fn memory_bytes(&self) -> usize {
        self.columns.iter().map(|k| k.words().len() * 8).sum()
    }
}

impl fmt::Display for DenseWeights {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{} (bits)", self.inputs, self.outputs)
    }
}

/// Per-channel fused batch-norm thresholds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Thresholds(Vec<i16>);

impl Thresholds {
    pub fn new(values: Vec<i16>) -> Self {
        Thresholds(values)
    }

    pub fn uniform(len: usize, val: i16) -> Self {
        Thresholds(vec![val; len])
    }

    #[inline]
    pub fn get(&self, n: usize) -> i16 {
        self.0[n]
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[i16] {
        &self.0
    }
}

impl From<Vec<i16>> for Thresholds {
    fn from(values: Vec<i16>) -> Self {
        Thresholds(values)
    }
}
