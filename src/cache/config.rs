use crate::config;
use crate::Cycles;

pub use crate::config::{CacheKind as Kind, ReplacementPolicy};

/// Derived cache geometry.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Config {
    pub kind: Kind,

    /// Cache line size.
    pub line_size: u32,

    /// Total number of lines.
    pub num_lines: usize,

    /// Cache associativity.
    pub associativity: usize,

    /// Cycles taken on a hit or to resolve a miss.
    pub latency: Cycles,

    /// Cache replacement policy.
    pub replacement_policy: ReplacementPolicy,
}

impl Config {
    #[inline]
    #[must_use]
    pub fn num_sets(&self) -> usize {
        self.num_lines / self.associativity
    }

    /// Total size in bytes.
    #[inline]
    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.num_lines as u64 * u64::from(self.line_size)
    }
}

impl std::fmt::Display for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let size = human_bytes::human_bytes(self.total_bytes() as f64);
        write!(
            f,
            "{} {size} ({} sets x {} ways x {} B, {:?})",
            self.kind,
            self.num_sets(),
            self.associativity,
            self.line_size,
            self.replacement_policy,
        )
    }
}

impl From<&config::System> for Config {
    fn from(config: &config::System) -> Self {
        let num_lines = config.num_lines();
        Self {
            kind: config.cache.kind,
            line_size: config.cache_line_size,
            num_lines,
            associativity: config.cache.associativity(num_lines),
            latency: config.cache.latency,
            replacement_policy: config.cache.effective_replacement_policy(),
        }
    }
}
