use super::Histogram;
use serde::{Deserialize, Serialize};

/// Number of buckets of the miss latency histogram.
pub const MISS_LATENCY_BUCKETS: usize = 16;

pub type CacheCsvRow = (String, f64);

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cache {
    /// Number of hits
    pub hits: u64,
    /// Number of misses
    pub misses: u64,
    /// Ticks for misses to the cache
    pub miss_latency: Histogram,
}

impl Default for Cache {
    fn default() -> Self {
        Self {
            hits: 0,
            misses: 0,
            miss_latency: Histogram::new(MISS_LATENCY_BUCKETS),
        }
    }
}

impl Cache {
    #[must_use]
    pub fn total_accesses(&self) -> u64 {
        self.hits + self.misses
    }

    /// The ratio of hits to the total accesses to the cache.
    ///
    /// `NaN` when there were no accesses.
    #[must_use]
    pub fn hit_ratio(&self) -> f64 {
        self.hits as f64 / self.total_accesses() as f64
    }

    #[must_use]
    pub fn flatten(&self) -> Vec<CacheCsvRow> {
        let mut rows = vec![
            ("hits".to_string(), self.hits as f64),
            ("misses".to_string(), self.misses as f64),
            ("hit_ratio".to_string(), self.hit_ratio()),
            (
                "miss_latency::samples".to_string(),
                self.miss_latency.samples() as f64,
            ),
            (
                "miss_latency::mean".to_string(),
                self.miss_latency.mean().unwrap_or(0.0),
            ),
            (
                "miss_latency::bucket_size".to_string(),
                self.miss_latency.bucket_size() as f64,
            ),
        ];
        let bucket_size = self.miss_latency.bucket_size();
        for (i, count) in self.miss_latency.buckets().iter().enumerate() {
            let lo = i as u64 * bucket_size;
            let hi = lo + bucket_size - 1;
            rows.push((format!("miss_latency::{lo}-{hi}"), *count as f64));
        }
        rows
    }
}

impl std::ops::AddAssign for Cache {
    fn add_assign(&mut self, other: Self) {
        self.hits += other.hits;
        self.misses += other.misses;
        self.miss_latency.merge(&other.miss_latency);
    }
}

impl std::fmt::Debug for Cache {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("CacheStats")
            .field("hits", &self.hits)
            .field("misses", &self.misses)
            .field("hit_ratio", &self.hit_ratio())
            .field("miss_latency_samples", &self.miss_latency.samples())
            .field("miss_latency_mean", &self.miss_latency.mean())
            .finish_non_exhaustive()
    }
}
