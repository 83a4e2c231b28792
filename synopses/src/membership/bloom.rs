use snafu::{ensure, Snafu};

use crate::utils::fnv1a64;

const UNIT_BITS: u64 = u64::BITS as u64;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("bloom filter needs a positive word count, got {words}"))]
    InvalidSize { words: usize },
}

/// Fixed-size membership filter with a single FNV-1a hash function.
///
/// Guarantees no false negatives; the false-positive rate grows with the
/// load factor and is not tuned here. Not thread-safe: concurrent writers
/// need external synchronization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BloomFilter {
    bitset: Vec<u64>,
    length_bits: u64,
}

impl BloomFilter {
    /// Creates a filter backed by `words` zeroed 64-bit words.
    pub fn new(words: usize) -> Result<Self, Error> {
        ensure!(words > 0, InvalidSizeSnafu { words });
        Ok(BloomFilter {
            bitset: vec![0; words],
            length_bits: UNIT_BITS * words as u64,
        })
    }

    /// Creates a filter that adopts an existing word array.
    pub fn from_slice(words: Vec<u64>) -> Result<Self, Error> {
        ensure!(!words.is_empty(), InvalidSizeSnafu { words: words.len() });
        let length_bits = UNIT_BITS * words.len() as u64;
        Ok(BloomFilter {
            bitset: words,
            length_bits,
        })
    }

    fn locate(&self, key: &[u8]) -> (usize, u32) {
        // Clearing the sign bit keeps the index math valid for callers that
        // mirror this layout with signed words.
        let h = (fnv1a64(key) & 0x7fff_ffff_ffff_ffff) % self.length_bits;
        ((h / UNIT_BITS) as usize, (h % UNIT_BITS) as u32)
    }

    /// Sets the bit for `key`.
    pub fn insert(&mut self, key: &[u8]) {
        let (idx, shift) = self.locate(key);
        self.bitset[idx] |= 1u64 << shift;
    }

    /// Tests the bit for `key`. A `true` result may be a false positive;
    /// `false` is definitive.
    pub fn probe(&self, key: &[u8]) -> bool {
        let (idx, shift) = self.locate(key);
        self.bitset[idx] & (1u64 << shift) != 0
    }

    /// Number of addressable bits.
    pub fn len_bits(&self) -> u64 {
        self.length_bits
    }
}
