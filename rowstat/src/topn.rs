use serde::{Deserialize, Serialize};

/// One materialized frequent value: its canonical encoded bytes and its
/// (possibly extrapolated) row count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopNMeta {
    pub encoded: Vec<u8>,
    pub count: u64,
}

/// The N most frequent values of a column, kept apart from the histogram
/// so skewed heads do not distort bucket statistics. Sorted by count
/// descending.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopN {
    pub items: Vec<TopNMeta>,
}

impl TopN {
    pub fn num_items(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn total_count(&self) -> u64 {
        self.items.iter().map(|m| m.count).sum()
    }

    /// Extrapolates sample counts to table counts.
    pub(crate) fn scale(&mut self, factor: f64) {
        for meta in &mut self.items {
            meta.count = (meta.count as f64 * factor) as u64;
        }
    }
}
