//! Equi-depth histogram representation shared by the sorted and
//! sample-based builders.

use std::fmt;

use crate::datum::{Datum, DatumKind};

/// One histogram bucket covering `[lower, upper]`.
///
/// `count` is cumulative through this bucket, `repeat` counts rows equal
/// to `upper`, and `ndv` estimates the distinct values inside the bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct Bucket {
    pub lower: Datum,
    pub upper: Datum,
    pub count: i64,
    pub repeat: i64,
    pub ndv: i64,
}

#[derive(Clone, PartialEq)]
pub struct Histogram {
    pub id: i64,
    pub tp: DatumKind,
    pub ndv: i64,
    pub null_count: i64,
    pub last_update_version: u64,
    pub total_col_size: i64,
    /// Pearson correlation between the column's value order and the row
    /// order, in `[-1, 1]`; `0` when unknown.
    pub correlation: f64,
    pub buckets: Vec<Bucket>,
}

impl Histogram {
    pub fn new(
        id: i64,
        ndv: i64,
        null_count: i64,
        version: u64,
        tp: DatumKind,
        bucket_cap: usize,
        total_col_size: i64,
    ) -> Self {
        Histogram {
            id,
            tp,
            ndv,
            null_count,
            last_update_version: version,
            total_col_size,
            correlation: 0.0,
            buckets: Vec::with_capacity(bucket_cap),
        }
    }

    pub fn num_buckets(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn get_upper(&self, idx: usize) -> &Datum {
        &self.buckets[idx].upper
    }

    /// Rows in bucket `idx` alone (the cumulative count minus the prior
    /// bucket's).
    pub fn bucket_count(&self, idx: usize) -> i64 {
        if idx == 0 {
            self.buckets[0].count
        } else {
            self.buckets[idx].count - self.buckets[idx - 1].count
        }
    }

    /// Non-null rows covered by the histogram.
    pub fn not_null_count(&self) -> i64 {
        self.buckets.last().map_or(0, |b| b.count)
    }

    pub fn total_row_count(&self) -> i64 {
        self.not_null_count() + self.null_count
    }

    pub(crate) fn append_bucket(
        &mut self,
        lower: &Datum,
        upper: &Datum,
        count: i64,
        repeat: i64,
        ndv: i64,
    ) {
        self.buckets.push(Bucket {
            lower: lower.clone(),
            upper: upper.clone(),
            count,
            repeat,
            ndv,
        });
    }

    pub(crate) fn update_last_bucket(
        &mut self,
        upper: &Datum,
        count: i64,
        repeat: i64,
        grow_ndv: bool,
    ) {
        if let Some(bucket) = self.buckets.last_mut() {
            bucket.upper = upper.clone();
            bucket.count = count;
            bucket.repeat = repeat;
            if grow_ndv {
                bucket.ndv += 1;
            }
        }
    }

    pub(crate) fn set_last_bucket_ndv(&mut self, ndv: i64) {
        if let Some(bucket) = self.buckets.last_mut() {
            bucket.ndv = ndv;
        }
    }

    /// Folds bucket pairs `(2k, 2k+1)` for `2k + 1 <= until_idx` into single
    /// buckets; an unpaired trailing bucket is carried over unchanged.
    pub(crate) fn merge_buckets(&mut self, until_idx: usize) {
        let mut merged = Vec::with_capacity(until_idx / 2 + 1);
        let mut i = 0;
        while i + 1 <= until_idx {
            let hi = &self.buckets[i + 1];
            merged.push(Bucket {
                lower: self.buckets[i].lower.clone(),
                upper: hi.upper.clone(),
                count: hi.count,
                repeat: hi.repeat,
                ndv: self.buckets[i].ndv + hi.ndv,
            });
            i += 2;
        }
        if until_idx % 2 == 0 {
            merged.push(self.buckets[until_idx].clone());
        }
        tracing::debug!(
            before = until_idx + 1,
            after = merged.len(),
            "merged histogram bucket pairs"
        );
        self.buckets = merged;
    }
}

impl fmt::Debug for Histogram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Histogram(id={}, ndv={}, nulls={}, corr={:.3}) {{",
            self.id, self.ndv, self.null_count, self.correlation
        )?;
        for bucket in &self.buckets {
            writeln!(
                f,
                "  {:?} .. {:?}: {{ count:{}, repeat:{}, ndv:{} }},",
                bucket.lower, bucket.upper, bucket.count, bucket.repeat, bucket.ndv
            )?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hist_with(counts: &[(i64, i64)]) -> Histogram {
        // (value, cumulative count) pairs into single-value buckets.
        let mut h = Histogram::new(1, 0, 0, 0, DatumKind::Int, counts.len(), 0);
        for &(v, c) in counts {
            h.append_bucket(&Datum::Int(v), &Datum::Int(v), c, 1, 1);
        }
        h
    }

    #[test]
    fn bucket_count_is_a_delta() {
        let h = hist_with(&[(1, 3), (2, 5), (3, 10)]);
        assert_eq!(h.bucket_count(0), 3);
        assert_eq!(h.bucket_count(1), 2);
        assert_eq!(h.bucket_count(2), 5);
        assert_eq!(h.not_null_count(), 10);
    }

    #[test]
    fn total_row_count_includes_nulls() {
        let mut h = hist_with(&[(1, 4)]);
        h.null_count = 6;
        assert_eq!(h.total_row_count(), 10);
    }

    #[test]
    fn merge_buckets_pairs_and_carries_odd_tail() {
        let mut h = hist_with(&[(1, 2), (2, 4), (3, 6), (4, 8), (5, 10)]);
        h.merge_buckets(4);

        assert_eq!(h.num_buckets(), 3);
        assert_eq!(h.buckets[0].lower, Datum::Int(1));
        assert_eq!(h.buckets[0].upper, Datum::Int(2));
        assert_eq!(h.buckets[0].count, 4);
        assert_eq!(h.buckets[0].ndv, 2);
        assert_eq!(h.buckets[1].lower, Datum::Int(3));
        assert_eq!(h.buckets[1].upper, Datum::Int(4));
        assert_eq!(h.buckets[1].count, 8);
        // Unpaired tail survives as-is.
        assert_eq!(h.buckets[2].lower, Datum::Int(5));
        assert_eq!(h.buckets[2].count, 10);
        assert_eq!(h.buckets[2].ndv, 1);
    }

    #[test]
    fn merge_buckets_even_pair_count() {
        let mut h = hist_with(&[(1, 1), (2, 2), (3, 3), (4, 4)]);
        h.merge_buckets(3);
        assert_eq!(h.num_buckets(), 2);
        assert_eq!(h.buckets[0].upper, Datum::Int(2));
        assert_eq!(h.buckets[1].upper, Datum::Int(4));
    }

    #[test]
    fn update_last_bucket_grows_ndv_on_request() {
        let mut h = hist_with(&[(1, 1)]);
        h.update_last_bucket(&Datum::Int(2), 2, 1, true);
        assert_eq!(h.buckets[0].upper, Datum::Int(2));
        assert_eq!(h.buckets[0].ndv, 2);
        h.update_last_bucket(&Datum::Int(3), 3, 1, false);
        assert_eq!(h.buckets[0].ndv, 2);
    }

    #[test]
    fn debug_output_lists_buckets() {
        let h = hist_with(&[(1, 2), (5, 4)]);
        let out = format!("{h:?}");
        assert!(out.contains("Int(1)"));
        assert!(out.contains("count:4"));
    }
}
