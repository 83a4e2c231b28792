//! Histogram construction.
//!
//! Two builders share the bucket protocol: [`SortedBuilder`] consumes an
//! already-sorted stream (primary keys, index scans) in one pass with
//! on-the-fly bucket doubling, and the sample-based entry points
//! ([`build_column_hist`], [`build_hist_and_top_n_on_row_sample`]) construct
//! an equi-depth histogram from a finite sample, extrapolating per-bucket
//! NDV from singleton frequencies and scaling counts back to the table.

use std::cmp::Ordering;
use std::collections::HashSet;

use itertools::zip_eq;

use crate::datum::{Datum, DatumKind, EvalContext};
use crate::error::Result;
use crate::histogram::Histogram;
use crate::sample::{sort_sample_items, SampleCollector, SampleItem};
use crate::topn::{TopN, TopNMeta};

/// Incremental histogram builder for inputs already sorted ascending.
///
/// Starts with one value per bucket; whenever all bucket slots fill up,
/// adjacent buckets merge pairwise and the per-bucket capacity doubles.
/// Equal values never straddle a bucket boundary, even when that overflows
/// the capacity.
pub struct SortedBuilder {
    ctx: EvalContext,
    num_buckets: i64,
    values_per_bucket: i64,
    last_number: i64,
    bucket_idx: i64,
    count: i64,
    hist: Histogram,
}

impl SortedBuilder {
    pub fn new(ctx: &EvalContext, num_buckets: i64, id: i64, tp: DatumKind) -> Self {
        SortedBuilder {
            ctx: ctx.clone(),
            num_buckets,
            values_per_bucket: 1,
            last_number: 0,
            bucket_idx: 0,
            count: 0,
            hist: Histogram::new(id, 0, 0, 0, tp, num_buckets as usize, 0),
        }
    }

    pub fn count(&self) -> i64 {
        self.count
    }

    /// Feeds the next value of the sorted stream.
    pub fn iterate(&mut self, data: &Datum) -> Result<()> {
        self.count += 1;
        if self.count == 1 {
            self.hist.append_bucket(data, data, 1, 1, 1);
            self.hist.ndv = 1;
            return Ok(());
        }
        let idx = self.bucket_idx as usize;
        let cmp = self.ctx.compare(self.hist.get_upper(idx), data)?;
        if cmp == Ordering::Equal {
            // Keep equal values in one bucket even past the capacity, so a
            // value never spans a boundary.
            let bucket = &mut self.hist.buckets[idx];
            bucket.count += 1;
            bucket.repeat += 1;
        } else if self.hist.buckets[idx].count + 1 - self.last_number <= self.values_per_bucket {
            self.hist
                .update_last_bucket(data, self.hist.buckets[idx].count + 1, 1, true);
            self.hist.ndv += 1;
        } else {
            if self.bucket_idx + 1 == self.num_buckets {
                self.hist.merge_buckets(self.bucket_idx as usize);
                self.values_per_bucket *= 2;
                self.bucket_idx /= 2;
                self.last_number = if self.bucket_idx == 0 {
                    0
                } else {
                    self.hist.buckets[self.bucket_idx as usize - 1].count
                };
            }
            // The merge may have opened room in the current bucket.
            let idx = self.bucket_idx as usize;
            if self.hist.buckets[idx].count + 1 - self.last_number <= self.values_per_bucket {
                self.hist
                    .update_last_bucket(data, self.hist.buckets[idx].count + 1, 1, true);
            } else {
                self.last_number = self.hist.buckets[idx].count;
                self.bucket_idx += 1;
                self.hist.append_bucket(data, data, self.last_number + 1, 1, 1);
            }
            self.hist.ndv += 1;
        }
        Ok(())
    }

    /// Finishes the build and hands the histogram to the caller.
    pub fn hist(self) -> Histogram {
        self.hist
    }
}

/// Which byte form drives run detection and Top-N matching.
enum ComparedBytes {
    /// Column histograms order by the key encoding.
    Column,
    /// Index samples already carry order-preserving bytes.
    Index,
}

impl ComparedBytes {
    fn of(&self, ctx: &EvalContext, datum: &Datum) -> Result<Vec<u8>> {
        match self {
            ComparedBytes::Column => ctx.encode_key(datum),
            ComparedBytes::Index => match datum {
                Datum::Bytes(b) => Ok(b.clone()),
                other => ctx.encode_key(other),
            },
        }
    }
}

/// Builds a histogram for a column from a sample collector.
///
/// `count`, `ndv` and `null_count` describe the unsampled column; bucket
/// counts are scaled accordingly.
pub fn build_column_hist(
    ctx: &EvalContext,
    num_buckets: usize,
    id: i64,
    collector: &SampleCollector,
    tp: DatumKind,
    count: i64,
    ndv: i64,
    null_count: i64,
) -> Result<Histogram> {
    let mut ndv = ndv;
    if ndv > count {
        tracing::warn!(ndv, count, "distinct estimate exceeds row count, clamping");
        ndv = count;
    }
    if count == 0 || collector.samples.is_empty() {
        return Ok(Histogram::new(
            id,
            ndv,
            null_count,
            0,
            tp,
            0,
            collector.total_size,
        ));
    }
    let samples = sort_sample_items(ctx, collector.samples.clone())?;
    let mut hist = Histogram::new(
        id,
        ndv,
        null_count,
        0,
        tp,
        num_buckets,
        collector.total_size,
    );
    let corr_xy_sum = build_hist(ctx, &mut hist, &samples, count, ndv, num_buckets as i64)?;
    hist.correlation = calc_correlation(samples.len() as i64, corr_xy_sum);
    Ok(hist)
}

/// [`build_column_hist`] with count, NDV and null count pulled from the
/// collector itself.
pub fn build_column(
    ctx: &EvalContext,
    num_buckets: usize,
    id: i64,
    collector: &SampleCollector,
    tp: DatumKind,
) -> Result<Histogram> {
    build_column_hist(
        ctx,
        num_buckets,
        id,
        collector,
        tp,
        collector.count,
        collector.fm_sketch.ndv(),
        collector.null_count,
    )
}

/// Builds a histogram and a Top-N list for one column (or index) of a row
/// sample.
///
/// The most frequent values are pulled out of the sample first so that a
/// skewed head does not distort bucket statistics; the histogram covers the
/// residual. For columns, the value-order/row-order correlation is computed
/// in the same pass.
pub fn build_hist_and_top_n_on_row_sample(
    ctx: &EvalContext,
    num_buckets: usize,
    num_top_n: usize,
    id: i64,
    collector: &SampleCollector,
    tp: DatumKind,
    is_column: bool,
) -> Result<(Histogram, TopN)> {
    let count = collector.count;
    let mut ndv = collector.fm_sketch.ndv();
    if ndv > count {
        ndv = count;
    }
    if count == 0 || collector.samples.is_empty() {
        let hist = Histogram::new(id, ndv, collector.null_count, 0, tp, 0, collector.total_size);
        return Ok((hist, TopN::default()));
    }

    let samples = sort_sample_items(ctx, collector.samples.clone())?;
    let sample_num = samples.len() as i64;
    let sample_factor = count as f64 / sample_num as f64;
    let mut hist = Histogram::new(
        id,
        ndv,
        collector.null_count,
        0,
        tp,
        num_buckets,
        collector.total_size,
    );

    let cmp_bytes = if is_column {
        ComparedBytes::Column
    } else {
        ComparedBytes::Index
    };
    let encoded = samples
        .iter()
        .map(|s| cmp_bytes.of(ctx, &s.value))
        .collect::<Result<Vec<_>>>()?;

    // Step 1: walk the runs of the sorted sample, keeping the heaviest in
    // the Top-N list; accumulate the correlation terms in the same pass.
    let mut top_items: Vec<TopNMeta> = Vec::with_capacity(num_top_n);
    let mut cur = encoded[0].clone();
    let mut cur_cnt = 0u64;
    let mut corr_xy_sum = 0.0;
    for (i, item) in samples.iter().enumerate() {
        if is_column {
            corr_xy_sum += i as f64 * item.ordinal as f64;
        }
        if encoded[i] == cur {
            cur_cnt += 1;
            continue;
        }
        try_insert_top_n(&mut top_items, num_top_n, &cur, cur_cnt);
        cur = encoded[i].clone();
        cur_cnt = 1;
    }
    if is_column {
        hist.correlation = calc_correlation(sample_num, corr_xy_sum);
    }
    // The final run never hits a value boundary inside the loop.
    try_insert_top_n(&mut top_items, num_top_n, &cur, cur_cnt);

    // Step 2: excise the Top-N runs from the sample stream and extrapolate
    // their counts to the table.
    let top_set: HashSet<&[u8]> = top_items.iter().map(|m| m.encoded.as_slice()).collect();
    let residual: Vec<SampleItem> = zip_eq(samples, encoded)
        .filter(|(_, bytes)| !top_set.contains(bytes.as_slice()))
        .map(|(item, _)| item)
        .collect();

    let mut topn = TopN { items: top_items };
    topn.scale(sample_factor);

    // The Top-N may already cover the whole column.
    if count as u64 <= topn.total_count() || ndv <= topn.num_items() as i64 {
        return Ok((hist, topn));
    }

    // Step 3: equi-depth histogram over the residual.
    if !residual.is_empty() {
        build_hist(
            ctx,
            &mut hist,
            &residual,
            count - topn.total_count() as i64,
            ndv - topn.num_items() as i64,
            num_buckets as i64,
        )?;
    }
    Ok((hist, topn))
}

/// Considers one completed run `(encoded, count)` for the Top-N list, which
/// stays sorted by count descending and truncated to `cap`.
fn try_insert_top_n(list: &mut Vec<TopNMeta>, cap: usize, encoded: &[u8], count: u64) {
    if cap == 0 {
        return;
    }
    if list.is_empty() {
        list.push(TopNMeta {
            encoded: encoded.to_vec(),
            count,
        });
        return;
    }
    if list.len() >= cap && count <= list[list.len() - 1].count {
        return;
    }
    let mut j = list.len();
    while j > 0 {
        if count < list[j - 1].count {
            break;
        }
        j -= 1;
    }
    list.insert(
        j,
        TopNMeta {
            encoded: encoded.to_vec(),
            count,
        },
    );
    list.truncate(cap);
}

/// Equi-depth histogram core over sorted, Top-N-free samples.
///
/// `total_count` and `ndv` describe the unsampled residual; bucket counts,
/// repeats and the per-bucket NDV estimate are all scaled back to it.
/// Returns the `Σ i·ordinal_i` accumulator for correlation.
pub(crate) fn build_hist(
    ctx: &EvalContext,
    hist: &mut Histogram,
    samples: &[SampleItem],
    total_count: i64,
    ndv: i64,
    num_buckets: i64,
) -> Result<f64> {
    let sample_num = samples.len() as i64;
    let sample_factor = total_count as f64 / sample_num as f64;
    let mut ndv_factor = total_count as f64 / ndv as f64;
    if ndv_factor > sample_factor {
        ndv_factor = sample_factor;
    }
    // The bucket count target is scaled by sample_factor steps, so an extra
    // sample_factor of headroom keeps quantization from spilling into too
    // many buckets.
    let values_per_bucket = total_count as f64 / num_buckets as f64 + sample_factor;

    // Good-Turing flavored singleton adjustment: singletons in the sample
    // stand for the unseen mass, so the per-bucket estimate extrapolates
    // them by f1_factor and carries non-singletons unchanged.
    let (sample_ndv, sample_f1) = distinct_and_singletons(ctx, samples)?;
    let f1_factor = if sample_f1 > 0 {
        (ndv - (sample_ndv - sample_f1)) as f64 / sample_f1 as f64
    } else {
        0.0
    };

    let mut bucket_idx = 0usize;
    let mut last_count = 0i64;
    let mut corr_xy_sum = 0.0;

    hist.append_bucket(
        &samples[0].value,
        &samples[0].value,
        sample_factor as i64,
        ndv_factor as i64,
        1,
    );

    // f1 and sample_bkt_ndv track singletons and distincts within the
    // current bucket's sample.
    let mut sample_bkt_ndv = 1i64;
    let mut f1 = 0i64;
    let mut more_than_once = false;

    for (i, item) in samples.iter().enumerate().skip(1) {
        corr_xy_sum += i as f64 * item.ordinal as f64;
        let cmp = ctx.compare(hist.get_upper(bucket_idx), &item.value)?;
        let total = (i + 1) as f64 * sample_factor;
        if cmp == Ordering::Equal {
            more_than_once = true;
            // Same value as the bucket upper: stay in this bucket no matter
            // the capacity.
            let bucket = &mut hist.buckets[bucket_idx];
            bucket.count = total as i64;
            if bucket.repeat == ndv_factor as i64 {
                bucket.repeat = (2.0 * sample_factor) as i64;
            } else {
                bucket.repeat += sample_factor as i64;
            }
        } else if total - last_count as f64 <= values_per_bucket {
            if !more_than_once {
                f1 += 1;
            }
            sample_bkt_ndv += 1;
            more_than_once = false;
            hist.update_last_bucket(&item.value, total as i64, ndv_factor as i64, false);
        } else {
            if !more_than_once {
                f1 += 1;
            }
            hist.set_last_bucket_ndv(estimate_bucket_ndv(f1_factor, sample_f1, f1, sample_bkt_ndv));
            last_count = hist.buckets[bucket_idx].count;
            bucket_idx += 1;
            hist.append_bucket(
                &item.value,
                &item.value,
                total as i64,
                ndv_factor as i64,
                1,
            );
            sample_bkt_ndv = 1;
            f1 = 0;
            more_than_once = false;
        }
    }
    if !more_than_once {
        f1 += 1;
    }
    hist.set_last_bucket_ndv(estimate_bucket_ndv(f1_factor, sample_f1, f1, sample_bkt_ndv));
    Ok(corr_xy_sum)
}

fn estimate_bucket_ndv(f1_factor: f64, sample_f1: i64, f1: i64, sample_bkt_ndv: i64) -> i64 {
    if sample_f1 == 0 {
        // No singletons anywhere: the factor is undefined and the bucket's
        // sample NDV is the best estimate available.
        return sample_bkt_ndv;
    }
    (((f1_factor * f1 as f64) as i64) + sample_bkt_ndv - f1).max(1)
}

/// Distinct values and singleton count over a sorted sample.
fn distinct_and_singletons(ctx: &EvalContext, samples: &[SampleItem]) -> Result<(i64, i64)> {
    let mut ndv = 0i64;
    let mut f1 = 0i64;
    let mut last: Option<Vec<u8>> = None;
    let mut run = 0i64;
    for item in samples {
        let bytes = ctx.encode_value(&item.value)?;
        if last.as_deref() == Some(bytes.as_slice()) {
            run += 1;
            continue;
        }
        if run == 1 {
            f1 += 1;
        }
        ndv += 1;
        run = 1;
        last = Some(bytes);
    }
    if run == 1 {
        f1 += 1;
    }
    Ok((ndv, f1))
}

/// Pearson correlation of the value-sorted index against the pre-sort
/// ordinal. Both are permutations of `0..sample_num`, so the marginal sums
/// have closed forms.
fn calc_correlation(sample_num: i64, corr_xy_sum: f64) -> f64 {
    if sample_num == 1 {
        return 1.0;
    }
    let n = sample_num as f64;
    let corr_x_sum = (n - 1.0) * n / 2.0;
    let corr_x2_sum = (n - 1.0) * n * (2.0 * n - 1.0) / 6.0;
    (n * corr_xy_sum - corr_x_sum * corr_x_sum) / (n * corr_x2_sum - corr_x_sum * corr_x_sum)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> EvalContext {
        EvalContext::default()
    }

    fn feed(builder: &mut SortedBuilder, values: &[i64]) {
        for &v in values {
            builder.iterate(&Datum::Int(v)).unwrap();
        }
    }

    #[test]
    fn sorted_builder_single_value() {
        let mut b = SortedBuilder::new(&ctx(), 4, 1, DatumKind::Int);
        feed(&mut b, &[42]);
        let hist = b.hist();
        assert_eq!(hist.ndv, 1);
        assert_eq!(hist.num_buckets(), 1);
        assert_eq!(hist.buckets[0].count, 1);
        assert_eq!(hist.buckets[0].repeat, 1);
    }

    #[test]
    fn sorted_builder_repeated_pk_values() {
        // 4 buckets over [1,1,2,3,4,5,5,5,6,7]: runs of 5 stay together.
        let mut b = SortedBuilder::new(&ctx(), 4, 1, DatumKind::Int);
        feed(&mut b, &[1, 1, 2, 3, 4, 5, 5, 5, 6, 7]);
        let hist = b.hist();

        assert_eq!(hist.ndv, 7);
        assert_eq!(hist.num_buckets(), 4);
        assert_eq!(hist.not_null_count(), 10);

        // The value 5 lives in exactly one bucket with repeat 3.
        let five_buckets: Vec<_> = hist
            .buckets
            .iter()
            .filter(|b| b.lower == Datum::Int(5) || b.upper == Datum::Int(5))
            .collect();
        assert_eq!(five_buckets.len(), 1);
        assert_eq!(five_buckets[0].repeat, 3);
    }

    #[test]
    fn sorted_builder_overflow_doubles_and_merges() {
        // 2 buckets over [1..=5] forces a double-merge.
        let mut b = SortedBuilder::new(&ctx(), 2, 1, DatumKind::Int);
        feed(&mut b, &[1, 2, 3, 4, 5]);
        let hist = b.hist();

        assert_eq!(hist.ndv, 5);
        assert_eq!(hist.num_buckets(), 2);
        assert_eq!(hist.buckets[0].lower, Datum::Int(1));
        assert_eq!(hist.buckets[0].upper, Datum::Int(4));
        assert_eq!(hist.buckets[0].count, 4);
        assert_eq!(hist.buckets[1].lower, Datum::Int(5));
        assert_eq!(hist.buckets[1].upper, Datum::Int(5));
        assert_eq!(hist.buckets[1].count, 5);
    }

    #[test]
    fn sorted_builder_strictly_ascending_counts() {
        let mut b = SortedBuilder::new(&ctx(), 8, 1, DatumKind::Int);
        let values: Vec<i64> = (0..100).collect();
        feed(&mut b, &values);
        let hist = b.hist();

        assert_eq!(hist.ndv, 100);
        assert!(hist.num_buckets() <= 8);
        assert_eq!(hist.not_null_count(), 100);
        let delta_sum: i64 = (0..hist.num_buckets()).map(|i| hist.bucket_count(i)).sum();
        assert_eq!(delta_sum, 100);
    }

    #[test]
    fn correlation_closed_forms() {
        // Identity permutation.
        let n = 10i64;
        let xy: f64 = (0..n).map(|i| (i * i) as f64).sum();
        assert!((calc_correlation(n, xy) - 1.0).abs() < 1e-12);

        // Exact reverse.
        let xy: f64 = (0..n).map(|i| (i * (n - 1 - i)) as f64).sum();
        assert!((calc_correlation(n, xy) + 1.0).abs() < 1e-12);

        // Single sample is perfectly correlated by definition.
        assert_eq!(calc_correlation(1, 0.0), 1.0);
    }

    #[test]
    fn distinct_and_singletons_counts_runs() {
        let c = ctx();
        let samples: Vec<SampleItem> = [1, 1, 2, 3, 3, 3, 4]
            .iter()
            .enumerate()
            .map(|(i, &v)| SampleItem {
                value: Datum::Int(v),
                ordinal: i as i64,
            })
            .collect();
        let (ndv, f1) = distinct_and_singletons(&c, &samples).unwrap();
        assert_eq!(ndv, 4);
        assert_eq!(f1, 2); // 2 and 4
    }

    #[test]
    fn bucket_ndv_falls_back_without_singletons() {
        assert_eq!(estimate_bucket_ndv(0.0, 0, 0, 3), 3);
        // With singletons the factor extrapolates them.
        assert_eq!(estimate_bucket_ndv(4.0, 2, 2, 5), 8 + 5 - 2);
    }

    #[test]
    fn top_n_insertion_keeps_descending_order() {
        let mut list = Vec::new();
        try_insert_top_n(&mut list, 3, b"a", 5);
        try_insert_top_n(&mut list, 3, b"b", 9);
        try_insert_top_n(&mut list, 3, b"c", 7);
        try_insert_top_n(&mut list, 3, b"d", 1); // list full, too small
        try_insert_top_n(&mut list, 3, b"e", 8); // evicts the tail

        let counts: Vec<u64> = list.iter().map(|m| m.count).collect();
        assert_eq!(counts, vec![9, 8, 7]);
    }

    #[test]
    fn top_n_zero_capacity_is_inert() {
        let mut list = Vec::new();
        try_insert_top_n(&mut list, 0, b"a", 5);
        assert!(list.is_empty());
    }
}
