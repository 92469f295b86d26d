use serde::{Deserialize, Serialize};

/// A histogram with a fixed number of buckets that grows its bucket size.
///
/// Buckets start out one unit wide and cover `[0, num_buckets)`.
/// Whenever a sample falls beyond the last bucket, neighbouring buckets are
/// merged pairwise and the bucket size doubles until the sample fits.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Histogram {
    buckets: Vec<u64>,
    bucket_size: u64,
    samples: u64,
    sum: u64,
    min: Option<u64>,
    max: Option<u64>,
}

impl Histogram {
    #[must_use]
    pub fn new(num_buckets: usize) -> Self {
        assert!(
            num_buckets >= 2 && num_buckets % 2 == 0,
            "histogram needs an even number of buckets (got {num_buckets})"
        );
        Self {
            buckets: vec![0; num_buckets],
            bucket_size: 1,
            samples: 0,
            sum: 0,
            min: None,
            max: None,
        }
    }

    /// Largest value covered by the current buckets.
    #[must_use]
    pub fn max_bucket(&self) -> u64 {
        self.bucket_size * self.buckets.len() as u64 - 1
    }

    fn grow_up(&mut self) {
        let num_buckets = self.buckets.len();
        for i in 0..num_buckets {
            let lo = 2 * i;
            self.buckets[i] = if lo < num_buckets {
                self.buckets[lo] + self.buckets[lo + 1]
            } else {
                0
            };
        }
        self.bucket_size *= 2;
    }

    pub fn sample(&mut self, value: u64) {
        while value > self.max_bucket() {
            self.grow_up();
        }
        let idx = usize::try_from(value / self.bucket_size).unwrap_or(usize::MAX);
        self.buckets[idx] += 1;

        self.samples += 1;
        self.sum = self.sum.saturating_add(value);
        self.min = Some(self.min.map_or(value, |min| min.min(value)));
        self.max = Some(self.max.map_or(value, |max| max.max(value)));
    }

    #[must_use]
    pub fn buckets(&self) -> &[u64] {
        &self.buckets
    }

    #[must_use]
    pub fn bucket_size(&self) -> u64 {
        self.bucket_size
    }

    #[must_use]
    pub fn samples(&self) -> u64 {
        self.samples
    }

    #[must_use]
    pub fn sum(&self) -> u64 {
        self.sum
    }

    #[must_use]
    pub fn min(&self) -> Option<u64> {
        self.min
    }

    #[must_use]
    pub fn max(&self) -> Option<u64> {
        self.max
    }

    #[must_use]
    pub fn mean(&self) -> Option<f64> {
        if self.samples == 0 {
            None
        } else {
            Some(self.sum as f64 / self.samples as f64)
        }
    }

    /// Merges the samples of `other` into this histogram.
    ///
    /// Both histograms are brought to the same bucket size first.
    pub fn merge(&mut self, other: &Self) {
        assert_eq!(self.buckets.len(), other.buckets.len());
        let mut other = other.clone();
        while self.bucket_size < other.bucket_size {
            self.grow_up();
        }
        while other.bucket_size < self.bucket_size {
            other.grow_up();
        }
        for (have, add) in self.buckets.iter_mut().zip(other.buckets.iter()) {
            *have += add;
        }
        self.samples += other.samples;
        self.sum = self.sum.saturating_add(other.sum);
        self.min = match (self.min, other.min) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        self.max = match (self.max, other.max) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
    }
}
