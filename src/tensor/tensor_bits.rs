use std::fmt;

use super::BitVec;
use crate::error::{shape_mismatch, Result};

/// A 3D binary feature map.
///
/// Layout is CHW (channels, height, width), packed one bit per element.
#[derive(Clone, PartialEq, Eq)]
pub struct BitTensor {
    pub c: usize,
    pub h: usize,
    pub w: usize,
    bits: BitVec,
}

impl BitTensor {
    pub fn new(c: usize, h: usize, w: usize) -> Self {
        BitTensor {
            c,
            h,
            w,
            bits: BitVec::new(c * h * w),
        }
    }

    /// A flat vector of `n` bits, stored as `n x 1 x 1`.
    pub fn new1(n: usize) -> Self {
        BitTensor::new(n, 1, 1)
    }

    pub fn filled(c: usize, h: usize, w: usize, val: bool) -> Self {
        let mut t = BitTensor::new(c, h, w);
        t.fill(val);
        t
    }

    pub fn from_fn(
        c: usize,
        h: usize,
        w: usize,
        mut f: impl FnMut(usize, usize, usize) -> bool,
    ) -> Self {
        let mut t = BitTensor::new(c, h, w);
        for ch in 0..c {
            for y in 0..h {
                for x in 0..w {
                    if f(ch, y, x) {
                        t.set(ch, y, x, true);
                    }
                }
            }
        }
        t
    }

    pub fn from_bits(c: usize, h: usize, w: usize, bits: BitVec) -> Result<Self> {
        if bits.len() != c * h * w {
            return Err(shape_mismatch("bit tensor", c * h * w, bits.len()));
        }
        Ok(BitTensor { c, h, w, bits })
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    #[inline]
    fn index(&self, c: usize, h: usize, w: usize) -> usize {
        assert!(
            c < self.c && h < self.h && w < self.w,
            "index ({}, {}, {}) out of bounds for {}",
            c,
            h,
            w,
            self
        );
        c * self.h * self.w + h * self.w + w
    }

    #[inline]
    pub fn get(&self, c: usize, h: usize, w: usize) -> bool {
        self.bits.get(self.index(c, h, w))
    }

    #[inline]
    pub fn set(&mut self, c: usize, h: usize, w: usize, val: bool) {
        let idx = self.index(c, h, w);
        self.bits.set(idx, val);
    }

    pub fn fill(&mut self, val: bool) {
        self.bits.fill(val);
    }

    pub fn count_ones(&self) -> usize {
        self.bits.count_ones()
    }

    pub fn bits(&self) -> &BitVec {
        &self.bits
    }

    pub fn into_bits(self) -> BitVec {
        self.bits
    }

    /// Copies the `h x w` region starting at (`top`, `left`) of every channel.
    ///
    /// # Panics
    ///
    /// Panics if the region does not lie inside the tensor.
    pub fn crop(&self, top: usize, left: usize, h: usize, w: usize) -> BitTensor {
        assert!(
            top + h <= self.h && left + w <= self.w,
            "crop {}x{} at ({}, {}) exceeds {}",
            h,
            w,
            top,
            left,
            self
        );
        BitTensor::from_fn(self.c, h, w, |c, y, x| self.get(c, top + y, left + x))
    }

    /// Nearest-neighbour resample of every channel to `h x w`.
    pub fn resize_nearest(&self, h: usize, w: usize) -> BitTensor {
        if h == self.h && w == self.w {
            return self.clone();
        }
        BitTensor::from_fn(self.c, h, w, |c, y, x| {
            self.get(c, y * self.h / h, x * self.w / w)
        })
    }
}

impl fmt::Display for BitTensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{} (bits)", self.c, self.h, self.w)
    }
}

impl fmt::Debug for BitTensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "BitTensor {}", self)?;
        for c in 0..self.c {
            for y in 0..self.h {
                for x in 0..self.w {
                    write!(f, "{}", if self.get(c, y, x) { '#' } else { '.' })?;
                }
                writeln!(f)?;
            }
            if c + 1 < self.c {
                writeln!(f)?;
            }
        }
        Ok(())
    }
}
