//! System configuration.
//!
//! Loaded from YAML. Every field has a default, so an empty document
//! describes a 16kB direct mapped cache in front of a simple memory.

use crate::Cycles;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("failed to read config {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid memory size {0:?}")]
    InvalidSize(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Organization of the cache storage.
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum::EnumIter,
    strum::Display,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CacheKind {
    #[default]
    DirectMapped,
    FullyAssociative,
    SetAssociative,
}

/// A cache replacement policy
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    strum::EnumIter,
    Serialize,
    Deserialize,
)]
pub enum ReplacementPolicy {
    /// Uniformly random victim drawn from the shared generator.
    #[default]
    Random,
    /// Least recently used victim.
    LRU,
}

/// A size in bytes.
///
/// Deserializes from a plain number or a string such as `"16kB"`.
/// Prefixes are binary, `1kB` is 1024 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "MemorySizeRepr", into = "u64")]
pub struct MemorySize(pub u64);

#[derive(Deserialize)]
#[serde(untagged)]
enum MemorySizeRepr {
    Bytes(u64),
    Human(String),
}

impl TryFrom<MemorySizeRepr> for MemorySize {
    type Error = Error;

    fn try_from(value: MemorySizeRepr) -> Result<Self, Self::Error> {
        match value {
            MemorySizeRepr::Bytes(bytes) => Ok(Self(bytes)),
            MemorySizeRepr::Human(size) => size.parse(),
        }
    }
}

impl From<MemorySize> for u64 {
    fn from(size: MemorySize) -> Self {
        size.0
    }
}

impl std::str::FromStr for MemorySize {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let split = s
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(s.len());
        let (value, unit) = s.split_at(split);
        let value: u64 = value
            .parse()
            .map_err(|_| Error::InvalidSize(s.to_string()))?;
        let multiplier: u64 = match unit.trim() {
            "" | "B" => 1,
            "kB" | "KB" | "KiB" => 1 << 10,
            "MB" | "MiB" => 1 << 20,
            "GB" | "GiB" => 1 << 30,
            _ => return Err(Error::InvalidSize(s.to_string())),
        };
        value
            .checked_mul(multiplier)
            .map(Self)
            .ok_or_else(|| Error::InvalidSize(s.to_string()))
    }
}

impl std::fmt::Display for MemorySize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", human_bytes::human_bytes(self.0 as f64))
    }
}

fn default_cache_size() -> MemorySize {
    MemorySize(16 * 1024)
}

fn default_latency() -> Cycles {
    1
}

fn default_num_ports() -> usize {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Cache {
    #[serde(default)]
    pub kind: CacheKind,
    /// Total cache size.
    #[serde(default = "default_cache_size")]
    pub size: MemorySize,
    /// Cycles taken on a hit or to resolve a miss.
    #[serde(default = "default_latency")]
    pub latency: Cycles,
    /// Number of ways per set of a set associative cache.
    #[serde(default)]
    pub set_size: Option<usize>,
    /// Use LRU instead of random replacement in a fully associative cache.
    #[serde(default)]
    pub optimized_algorithm: bool,
    /// Replacement policy of a set associative cache.
    #[serde(default)]
    pub replacement_policy: Option<ReplacementPolicy>,
    /// Number of connected cpu side ports.
    #[serde(default = "default_num_ports")]
    pub num_cpu_side_ports: usize,
}

impl Default for Cache {
    fn default() -> Self {
        Self {
            kind: CacheKind::default(),
            size: default_cache_size(),
            latency: default_latency(),
            set_size: None,
            optimized_algorithm: false,
            replacement_policy: None,
            num_cpu_side_ports: default_num_ports(),
        }
    }
}

/// Ways per set when a set associative cache does not specify any.
pub const DEFAULT_SET_SIZE: usize = 4;

impl Cache {
    /// Number of ways per set.
    #[must_use]
    pub fn associativity(&self, num_lines: usize) -> usize {
        match self.kind {
            CacheKind::DirectMapped => 1,
            CacheKind::FullyAssociative => num_lines,
            CacheKind::SetAssociative => self.set_size.unwrap_or(DEFAULT_SET_SIZE),
        }
    }

    /// Effective replacement policy.
    #[must_use]
    pub fn effective_replacement_policy(&self) -> ReplacementPolicy {
        match self.kind {
            CacheKind::FullyAssociative if self.optimized_algorithm => ReplacementPolicy::LRU,
            CacheKind::SetAssociative => self.replacement_policy.unwrap_or_default(),
            _ => ReplacementPolicy::Random,
        }
    }
}

fn default_memory_latency() -> Cycles {
    30
}

fn default_request_buffer_size() -> usize {
    16
}

fn default_memory_range() -> MemorySize {
    MemorySize(512 * 1024 * 1024)
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Memory {
    /// Access latency in cycles.
    #[serde(default = "default_memory_latency")]
    pub latency: Cycles,
    /// Number of requests buffered before refusing new ones.
    #[serde(default = "default_request_buffer_size")]
    pub request_buffer_size: usize,
    /// Size of the address range starting at zero.
    #[serde(default = "default_memory_range")]
    pub range: MemorySize,
}

impl Default for Memory {
    fn default() -> Self {
        Self {
            latency: default_memory_latency(),
            request_buffer_size: default_request_buffer_size(),
            range: default_memory_range(),
        }
    }
}

fn default_cache_line_size() -> u32 {
    64
}

fn default_clock_period() -> u64 {
    1000
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct System {
    /// Size of a cache block in bytes.
    #[serde(default = "default_cache_line_size")]
    pub cache_line_size: u32,
    /// Clock period in ticks.
    #[serde(default = "default_clock_period")]
    pub clock_period: u64,
    /// Seed of the shared random number generator.
    #[serde(default)]
    pub seed: u64,
    #[serde(default)]
    pub cache: Cache,
    #[serde(default)]
    pub memory: Memory,
}

impl Default for System {
    fn default() -> Self {
        Self {
            cache_line_size: default_cache_line_size(),
            clock_period: default_clock_period(),
            seed: 0,
            cache: Cache::default(),
            memory: Memory::default(),
        }
    }
}

impl System {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, Error> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&yaml)
    }

    /// Number of cache lines.
    #[must_use]
    pub fn num_lines(&self) -> usize {
        (self.cache.size.0 / u64::from(self.cache_line_size)) as usize
    }

    pub fn validate(&self) -> Result<(), Error> {
        let line_size = self.cache_line_size;
        if line_size == 0 || !line_size.is_power_of_two() {
            return Err(Error::Invalid(format!(
                "cache line size {line_size} is not a power of two"
            )));
        }
        if self.clock_period == 0 {
            return Err(Error::Invalid("clock period must be non-zero".to_string()));
        }
        if self.cache.latency == 0 {
            return Err(Error::Invalid("cache latency must be non-zero".to_string()));
        }
        let size = self.cache.size;
        if size.0 == 0 || size.0 % u64::from(line_size) != 0 {
            return Err(Error::Invalid(format!(
                "cache size {size} is not a multiple of the line size {line_size}"
            )));
        }
        let num_lines = self.num_lines();
        let ways = self.cache.associativity(num_lines);
        if ways == 0 || num_lines % ways != 0 {
            return Err(Error::Invalid(format!(
                "set size {ways} does not divide the {num_lines} cache lines"
            )));
        }
        if self.cache.num_cpu_side_ports == 0 {
            return Err(Error::Invalid(
                "cache needs at least one cpu side port".to_string(),
            ));
        }
        if self.memory.request_buffer_size == 0 {
            return Err(Error::Invalid(
                "memory request buffer must hold at least one request".to_string(),
            ));
        }
        Ok(())
    }
}
