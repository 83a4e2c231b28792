//! Core statistics engine for a distributed SQL optimizer.
//!
//! From a stream of sampled rows this crate builds the summary structures
//! selectivity estimation consults: weighted reservoir row samples with
//! per-column distinct-count sketches, equi-depth histograms with Top-N
//! extraction, and column order correlation. Shard-local collectors are
//! mergeable, so parallelism stays outside the engine.

mod builder;
mod config;
mod datum;
mod error;
mod histogram;
mod record;
mod reservoir;
mod row_sampler;
mod sample;
mod topn;

pub use builder::{
    build_column, build_column_hist, build_hist_and_top_n_on_row_sample, SortedBuilder,
};
pub use config::StatsConfig;
pub use datum::{Collation, Datum, DatumKind, EvalContext};
pub use error::{Error, Result};
pub use histogram::{Bucket, Histogram};
pub use record::{Chunk, RecordSet, VecRecordSet};
pub use reservoir::{RowHandle, RowSampleItem, WeightedSampleHeap};
pub use row_sampler::{
    RowSampleBuilder, RowSampleCollector, RowSampleCollectorWire, RowSampleWire,
};
pub use sample::{sort_sample_items, SampleCollector, SampleItem};
pub use topn::{TopN, TopNMeta};
