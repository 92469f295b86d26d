use super::address;

pub trait SetIndexer: std::fmt::Debug + Send + Sync + 'static {
    /// Compute set index of an address.
    #[must_use]
    fn compute_set_index(&self, addr: address) -> u64;
}

pub mod linear {
    /// Consecutive blocks map to consecutive sets.
    ///
    /// The number of sets need not be a power of two.
    #[derive(Clone, Debug, PartialEq, Eq, Hash)]
    pub struct SetIndex {
        pub num_sets: usize,
        pub line_size: u32,
    }

    impl SetIndex {
        #[must_use]
        pub fn new(num_sets: usize, line_size: u32) -> Self {
            assert!(num_sets > 0, "need at least one set");
            assert!(line_size > 0, "line size must be non-zero");
            Self {
                num_sets,
                line_size,
            }
        }
    }

    impl super::SetIndexer for SetIndex {
        #[inline]
        fn compute_set_index(&self, addr: super::address) -> u64 {
            let set_idx = (addr / u64::from(self.line_size)) % self.num_sets as u64;
            debug_assert!(set_idx < self.num_sets as u64, "set index out of bounds");
            set_idx
        }
    }

}
