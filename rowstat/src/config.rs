//! Knobs for statistics collection. Defaults can be overridden through
//! environment variables so deployments can tune sampling cost without a
//! rebuild.

fn env_usize(name: &str, default: usize) -> usize {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[derive(Debug, Clone)]
pub struct StatsConfig {
    /// Upper bound on retained row samples per collector.
    pub max_sample_size: usize,
    /// Upper bound on retained hashes per FM sketch.
    pub max_fm_sketch_size: usize,
    /// Equi-depth bucket target for built histograms.
    pub num_buckets: usize,
    /// Number of most-frequent values materialized outside the histogram.
    pub num_top_n: usize,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            max_sample_size: env_usize("ROWSTAT_MAX_SAMPLE_SIZE", 10_000),
            max_fm_sketch_size: env_usize("ROWSTAT_MAX_FM_SKETCH_SIZE", 10_000),
            num_buckets: env_usize("ROWSTAT_NUM_BUCKETS", 256),
            num_top_n: env_usize("ROWSTAT_NUM_TOP_N", 20),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let cfg = StatsConfig::default();
        assert_eq!(cfg.max_sample_size, 10_000);
        assert_eq!(cfg.max_fm_sketch_size, 10_000);
        assert_eq!(cfg.num_buckets, 256);
        assert_eq!(cfg.num_top_n, 20);
    }
}
