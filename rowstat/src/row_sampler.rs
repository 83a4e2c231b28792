//! Row-level sample collection.
//!
//! A [`RowSampleBuilder`] drains a record set and produces a
//! [`RowSampleCollector`] holding, per column and per column group: null
//! counts, data sizes, and FM sketches, plus a weighted reservoir of whole
//! rows. Shard-local collectors serialize to a wire form and merge into a
//! root collector on the coordinating node.

use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use snafu::ensure;
use synopses::{FmSketch, FmSketchWire};

use crate::config::StatsConfig;
use crate::datum::{Collation, Datum, EvalContext};
use crate::error::{Result, SketchMergeSnafu};
use crate::record::RecordSet;
use crate::reservoir::{RowSampleItem, WeightedSampleHeap};
use crate::sample::{SampleCollector, SampleItem};

/// Drives row sampling over a record set.
pub struct RowSampleBuilder<R: RecordSet> {
    pub record_set: R,
    pub ctx: EvalContext,
    /// Per-column collator; `Some` replaces sampled string bytes with the
    /// collation key so downstream ordering and equality observe collation.
    pub collators: Vec<Option<Collation>>,
    /// Column groups to sketch jointly, by column index.
    pub col_groups: Vec<Vec<usize>>,
    pub max_sample_size: usize,
    pub max_fm_sketch_size: usize,
    /// Seed distinct per shard: weight collisions across shards bias the
    /// merged reservoir.
    pub rng: StdRng,
    /// Cooperative stop signal, checked between chunks.
    pub stop: Option<Arc<AtomicBool>>,
}

impl<R: RecordSet> RowSampleBuilder<R> {
    pub fn new(record_set: R, ctx: EvalContext, max_sample_size: usize, seed: u64) -> Self {
        let num_fields = record_set.num_fields();
        RowSampleBuilder {
            record_set,
            ctx,
            collators: vec![None; num_fields],
            col_groups: Vec::new(),
            max_sample_size,
            max_fm_sketch_size: max_sample_size,
            rng: StdRng::seed_from_u64(seed),
            stop: None,
        }
    }

    /// [`RowSampleBuilder::new`] with the reservoir and sketch bounds taken
    /// from a [`StatsConfig`].
    pub fn from_config(record_set: R, ctx: EvalContext, config: &StatsConfig, seed: u64) -> Self {
        let mut builder = Self::new(record_set, ctx, config.max_sample_size, seed);
        builder.max_fm_sketch_size = config.max_fm_sketch_size;
        builder
    }

    /// Collects every row from the record set, maintaining null counts, FM
    /// sketches and data sizes per column and column group, and feeding the
    /// weighted reservoir. Returns the collector once the stream ends or
    /// the stop signal is raised.
    pub fn collect(&mut self) -> Result<RowSampleCollector> {
        let width = self.record_set.num_fields() + self.col_groups.len();
        let mut collector =
            RowSampleCollector::new(width, self.max_sample_size, self.max_fm_sketch_size);
        let mut chunk = self.record_set.new_chunk();
        loop {
            if let Some(stop) = &self.stop {
                if stop.load(AtomicOrdering::Relaxed) {
                    tracing::debug!(rows = collector.count, "row sampling stopped early");
                    return Ok(collector);
                }
            }
            self.record_set.next(&mut chunk)?;
            if chunk.num_rows() == 0 {
                return Ok(collector);
            }
            collector.count += chunk.num_rows() as i64;
            for row in chunk.rows() {
                let mut datums = row.clone();
                for (i, datum) in datums.iter_mut().enumerate() {
                    if let Some(collation) = self.collators[i] {
                        if !datum.is_null() {
                            *datum = self.ctx.collation_key_datum(collation, datum)?;
                        }
                    }
                }
                collector.collect_columns(&self.ctx, &datums)?;
                collector.collect_column_groups(&self.ctx, &datums, &self.col_groups)?;
                // Uniform 63-bit weight, as rand's Int63 counterpart.
                let weight = (self.rng.random::<u64>() >> 1) as i64;
                // Record sets expose no storage identity; callers that hold
                // handles attach them to the items themselves.
                collector.samples.push(RowSampleItem {
                    columns: datums,
                    weight,
                    handle: None,
                });
            }
        }
    }
}

/// Mergeable per-shard sampling state: a weighted reservoir of rows plus
/// `C + G` slots of null counts, FM sketches and total sizes (`C` columns
/// followed by `G` column groups).
#[derive(Debug, Clone)]
pub struct RowSampleCollector {
    pub samples: WeightedSampleHeap,
    pub null_count: Vec<i64>,
    pub fm_sketches: Vec<FmSketch>,
    pub total_sizes: Vec<i64>,
    pub count: i64,
    max_sample_size: usize,
}

impl RowSampleCollector {
    pub fn new(width: usize, max_sample_size: usize, max_fm_sketch_size: usize) -> Self {
        RowSampleCollector {
            samples: WeightedSampleHeap::new(max_sample_size),
            null_count: vec![0; width],
            fm_sketches: (0..width).map(|_| FmSketch::new(max_fm_sketch_size)).collect(),
            total_sizes: vec![0; width],
            count: 0,
            max_sample_size,
        }
    }

    pub fn max_sample_size(&self) -> usize {
        self.max_sample_size
    }

    fn collect_columns(&mut self, ctx: &EvalContext, cols: &[Datum]) -> Result<()> {
        for (i, col) in cols.iter().enumerate() {
            if col.is_null() {
                self.null_count[i] += 1;
                continue;
            }
            let bytes = ctx.encode_value(col)?;
            // Minus one excludes the kind tag byte.
            self.total_sizes[i] += bytes.len() as i64 - 1;
            self.fm_sketches[i].insert_bytes(&bytes);
        }
        Ok(())
    }

    fn collect_column_groups(
        &mut self,
        ctx: &EvalContext,
        cols: &[Datum],
        col_groups: &[Vec<usize>],
    ) -> Result<()> {
        let col_len = cols.len();
        let mut buf = Vec::new();
        for (i, group) in col_groups.iter().enumerate() {
            buf.clear();
            let mut all_null = true;
            for &c in group {
                let bytes = ctx.encode_value(&cols[c])?;
                self.total_sizes[col_len + i] += bytes.len() as i64 - 1;
                all_null = all_null && cols[c].is_null();
                buf.extend_from_slice(&bytes);
            }
            // Null counts are only well-defined for single-column groups.
            if all_null && group.len() == 1 {
                self.null_count[col_len + i] += 1;
                continue;
            }
            self.fm_sketches[col_len + i].insert_bytes(&buf);
        }
        Ok(())
    }

    /// Folds a sub-collector into this one: counts and sizes sum, sketches
    /// merge pairwise, and the sub-collector's samples re-enter the
    /// reservoir under the usual arrival policy.
    pub fn merge(&mut self, sub: RowSampleCollector) -> Result<()> {
        ensure!(
            sub.fm_sketches.len() == self.fm_sketches.len(),
            SketchMergeSnafu {
                left: self.fm_sketches.len(),
                right: sub.fm_sketches.len(),
            }
        );
        tracing::debug!(
            rows = sub.count,
            samples = sub.samples.len(),
            "merging sub-collector"
        );
        self.count += sub.count;
        for (own, other) in self.fm_sketches.iter_mut().zip(&sub.fm_sketches) {
            own.merge(other);
        }
        for (own, other) in self.null_count.iter_mut().zip(&sub.null_count) {
            *own += other;
        }
        for (own, other) in self.total_sizes.iter_mut().zip(&sub.total_sizes) {
            *own += other;
        }
        self.samples.merge(sub.samples);
        Ok(())
    }

    /// Per-column view for histogram construction: non-null sample values
    /// with fresh pre-sort ordinals, plus the column's null count, size,
    /// and sketch. `count` becomes the column's non-null row count.
    pub fn column_collector(&self, col_idx: usize) -> SampleCollector {
        let mut samples = Vec::with_capacity(self.samples.len());
        for item in self.samples.items() {
            let value = &item.columns[col_idx];
            if value.is_null() {
                continue;
            }
            samples.push(SampleItem {
                value: value.clone(),
                ordinal: samples.len() as i64,
            });
        }
        SampleCollector {
            samples,
            null_count: self.null_count[col_idx],
            count: self.count - self.null_count[col_idx],
            total_size: self.total_sizes[col_idx],
            fm_sketch: self.fm_sketches[col_idx].clone(),
            max_sample_size: self.max_sample_size,
        }
    }

    /// Wire form for fan-in from shards. Sample rows ship as canonical
    /// encoded bytes in heap order.
    pub fn to_wire(&self, ctx: &EvalContext) -> Result<RowSampleCollectorWire> {
        let mut samples = Vec::with_capacity(self.samples.len());
        for item in self.samples.items() {
            let row = item
                .columns
                .iter()
                .map(|d| ctx.encode_value(d))
                .collect::<Result<Vec<_>>>()?;
            samples.push(RowSampleWire {
                row,
                weight: item.weight,
            });
        }
        Ok(RowSampleCollectorWire {
            samples,
            null_counts: self.null_count.clone(),
            count: self.count,
            fm_sketches: self.fm_sketches.iter().map(|s| s.to_wire()).collect(),
            total_sizes: self.total_sizes.clone(),
        })
    }

    /// Rebuilds a collector from its wire form. Row values come back as
    /// raw byte datums. The samples shipped by a shard are already
    /// heap-ordered, so they are adopted without re-heapifying; merging
    /// re-establishes ordering incrementally.
    pub fn from_wire(wire: RowSampleCollectorWire, max_sample_size: usize) -> Self {
        let items = wire
            .samples
            .into_iter()
            .map(|s| RowSampleItem {
                columns: s.row.into_iter().map(Datum::Bytes).collect(),
                weight: s.weight,
                // The wire form carries no handles.
                handle: None,
            })
            .collect();
        RowSampleCollector {
            samples: WeightedSampleHeap::from_raw(items, max_sample_size),
            null_count: wire.null_counts,
            fm_sketches: wire
                .fm_sketches
                .into_iter()
                .map(FmSketch::from_wire)
                .collect(),
            total_sizes: wire.total_sizes,
            count: wire.count,
            max_sample_size,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowSampleWire {
    pub row: Vec<Vec<u8>>,
    pub weight: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowSampleCollectorWire {
    pub samples: Vec<RowSampleWire>,
    pub null_counts: Vec<i64>,
    pub count: i64,
    pub fm_sketches: Vec<FmSketchWire>,
    pub total_sizes: Vec<i64>,
}
