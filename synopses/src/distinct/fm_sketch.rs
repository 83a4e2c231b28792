//! Flajolet–Martin style distinct-count sketch.
//!
//! The sketch keeps the set of hash values whose low bits are all zero
//! under the current mask. Every time the set outgrows `max_size` the mask
//! doubles, halving the expected fraction of retained hashes, so the NDV
//! estimate is `(mask + 1) * |set|`.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::utils::murmur64a;

const SKETCH_SEED: u64 = 0x9747_b28c;

#[derive(Debug, Clone, Default)]
pub struct FmSketch {
    hashset: HashSet<u64>,
    mask: u64,
    max_size: usize,
}

/// Serialized form shipped between shards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FmSketchWire {
    pub mask: u64,
    pub hashes: Vec<u64>,
}

impl FmSketch {
    pub fn new(max_size: usize) -> Self {
        FmSketch {
            hashset: HashSet::with_capacity(max_size + 1),
            mask: 0,
            max_size,
        }
    }

    /// Hashes an encoded value into the sketch.
    pub fn insert_bytes(&mut self, data: &[u8]) {
        self.insert_hash(murmur64a(data, SKETCH_SEED));
    }

    fn insert_hash(&mut self, hash: u64) {
        if hash & self.mask != 0 {
            return;
        }
        self.hashset.insert(hash);
        while self.hashset.len() > self.max_size {
            let mask = self.mask * 2 + 1;
            self.mask = mask;
            self.hashset.retain(|h| h & mask == 0);
        }
    }

    /// Estimated number of distinct values inserted so far.
    ///
    /// Exact while the mask is still zero, i.e. until more than `max_size`
    /// distinct values have been seen.
    pub fn ndv(&self) -> i64 {
        if self.hashset.is_empty() {
            return 0;
        }
        ((self.mask + 1) * self.hashset.len() as u64) as i64
    }

    /// Folds `other` into `self`. The coarser mask wins and both hash sets
    /// are re-filtered under it.
    pub fn merge(&mut self, other: &FmSketch) {
        if other.mask > self.mask {
            self.mask = other.mask;
            let mask = self.mask;
            self.hashset.retain(|h| h & mask == 0);
        }
        for &hash in &other.hashset {
            self.insert_hash(hash);
        }
    }

    pub fn to_wire(&self) -> FmSketchWire {
        FmSketchWire {
            mask: self.mask,
            hashes: self.hashset.iter().copied().collect(),
        }
    }

    /// Rebuilds a sketch from its wire form. Decoded sketches act as merge
    /// sources, so the capacity is pinned to the shipped set size.
    pub fn from_wire(wire: FmSketchWire) -> Self {
        FmSketch {
            max_size: wire.hashes.len().max(1),
            hashset: wire.hashes.into_iter().collect(),
            mask: wire.mask,
        }
    }
}
