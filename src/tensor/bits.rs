use std::fmt;

const WORD_BITS: usize = 64;

/// A fixed-length packed bit vector.
///
/// Bits past `len` in the last word are always zero, so population counts and
/// XNOR agreement counts can run over whole words without masking.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct BitVec {
    len: usize,
    words: Vec<u64>,
}

impl BitVec {
    pub fn new(len: usize) -> Self {
        BitVec {
            len,
            words: vec![0u64; len.div_ceil(WORD_BITS)],
        }
    }

    pub fn from_bits<I: IntoIterator<Item = bool>>(bits: I) -> Self {
        let mut out = BitVec::default();
        for bit in bits {
            if out.len % WORD_BITS == 0 {
                out.words.push(0);
            }
            if bit {
                out.words[out.len / WORD_BITS] |= 1 << (out.len % WORD_BITS);
            }
            out.len += 1;
        }
        out
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn get(&self, idx: usize) -> bool {
        debug_assert!(idx < self.len, "bit index {} out of range {}", idx, self.len);
        (self.words[idx / WORD_BITS] >> (idx % WORD_BITS)) & 1 == 1
    }

    #[inline]
    pub fn set(&mut self, idx: usize, val: bool) {
        debug_assert!(idx < self.len, "bit index {} out of range {}", idx, self.len);
        let mask = 1u64 << (idx % WORD_BITS);
        if val {
            self.words[idx / WORD_BITS] |= mask;
        } else {
            self.words[idx / WORD_BITS] &= !mask;
        }
    }

    pub fn fill(&mut self, val: bool) {
        self.words.fill(if val { u64::MAX } else { 0 });
        self.clear_tail();
    }

    /// Number of set bits.
    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Number of positions where `self` and `other` differ.
    pub fn hamming_distance(&self, other: &BitVec) -> usize {
        debug_assert_eq!(self.len, other.len);
        self.words
            .iter()
            .zip(other.words.iter())
            .map(|(a, b)| (a ^ b).count_ones() as usize)
            .sum()
    }

    /// Number of positions where `self` and `other` agree (XNOR popcount).
    #[inline]
    pub fn xnor_count(&self, other: &BitVec) -> usize {
        self.len - self.hamming_distance(other)
    }

    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        (0..self.len).map(move |i| self.get(i))
    }

    pub fn words(&self) -> &[u64] {
        &self.words
    }

    fn clear_tail(&mut self) {
        let rem = self.len % WORD_BITS;
        if rem != 0 {
            if let Some(last) = self.words.last_mut() {
                *last &= (1u64 << rem) - 1;
            }
        }
    }
}

impl fmt::Debug for BitVec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BitVec[")?;
        for bit in self.iter() {
            write!(f, "{}", bit as u8)?;
        }
        write!(f, "]")
    }
}

impl FromIterator<bool> for BitVec {
    fn from_iter<I: IntoIterator<Item = bool>>(iter: I) -> Self {
        BitVec::from_bits(iter)
    }
}
