use synopses::FmSketch;

use crate::datum::{Datum, EvalContext};
use crate::error::Result;

/// One sampled value of a single column. `ordinal` is the row's position
/// in the pre-sort sample order and drives the order-correlation
/// computation.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleItem {
    pub value: Datum,
    pub ordinal: i64,
}

/// Per-column view of a sample, as handed to histogram construction.
///
/// Assembled from a [`crate::RowSampleCollector`] (see
/// `RowSampleCollector::column_collector`) or directly by callers that
/// already hold a sample.
#[derive(Debug, Clone)]
pub struct SampleCollector {
    pub samples: Vec<SampleItem>,
    pub null_count: i64,
    /// Non-null row count the sample stands for.
    pub count: i64,
    pub total_size: i64,
    pub fm_sketch: FmSketch,
    pub max_sample_size: usize,
}

/// Sorts sample items ascending by value, keeping their pre-sort ordinals.
///
/// Ordering goes through the order-preserving key encoding so a failed
/// comparison surfaces as an error instead of a panic mid-sort.
pub fn sort_sample_items(
    ctx: &EvalContext,
    items: Vec<SampleItem>,
) -> Result<Vec<SampleItem>> {
    let mut keyed = items
        .into_iter()
        .map(|item| Ok((ctx.encode_key(&item.value)?, item)))
        .collect::<Result<Vec<_>>>()?;
    keyed.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(keyed.into_iter().map(|(_, item)| item).collect())
}
