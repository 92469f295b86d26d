use crate::address;

/// Splits addresses into tag, block address and set index.
#[allow(clippy::module_name_repetitions)]
pub trait CacheController: Sync + Send + 'static {
    /// Compute cache line tag for an address.
    #[must_use]
    fn tag(&self, addr: address) -> address;

    /// Compute block address for an address.
    #[must_use]
    fn block_addr(&self, addr: address) -> address;

    /// Compute set index for an address.
    #[must_use]
    fn set_index(&self, addr: address) -> u64;
}

/// Address mapping shared by all storage organizations.
#[derive(Debug, Clone)]
pub struct AddressMapping {
    set_index_function: super::set_index::linear::SetIndex,
    line_size: u32,
}

impl AddressMapping {
    #[must_use]
    pub fn new(num_sets: usize, line_size: u32) -> Self {
        Self {
            set_index_function: super::set_index::linear::SetIndex::new(num_sets, line_size),
            line_size,
        }
    }

    #[must_use]
    pub fn num_sets(&self) -> usize {
        self.set_index_function.num_sets
    }
}

impl CacheController for AddressMapping {
    #[inline]
    fn tag(&self, addr: address) -> address {
        // the tag includes both index and tag bits and is
        // identical to the block address.
        self.block_addr(addr)
    }

    #[inline]
    fn block_addr(&self, addr: address) -> address {
        crate::block_addr(addr, self.line_size)
    }

    #[inline]
    fn set_index(&self, addr: address) -> u64 {
        use super::set_index::SetIndexer;
        self.set_index_function.compute_set_index(addr)
    }
}
