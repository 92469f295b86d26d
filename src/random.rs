//! Shared deterministic random number generator.

use crate::sync::{Arc, Mutex};
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Seeded random number generator shared by all components of a system.
///
/// Clones draw from the same stream, so a run is reproducible given its seed.
#[derive(Debug, Clone)]
pub struct SharedRng(Arc<Mutex<StdRng>>);

impl SharedRng {
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self(Arc::new(Mutex::new(StdRng::seed_from_u64(seed))))
    }

    /// Uniform random index in `0..n`.
    #[must_use]
    pub fn index(&self, n: usize) -> usize {
        assert!(n > 0, "cannot pick from an empty range");
        self.0.lock().gen_range(0..n)
    }
}

impl Default for SharedRng {
    fn default() -> Self {
        Self::seeded(0)
    }
}
