//! Fully associative storage.

use super::{block::Line, replacement, Store};
use crate::{address, config::ReplacementPolicy, random::SharedRng};
use indexmap::IndexMap;

/// Any block can occupy any line.
///
/// Lines are kept in a map keyed by tag, so a hit is a single probe.
#[derive(Debug)]
pub struct FullyAssociative {
    lines: IndexMap<address, Line>,
    capacity: usize,
    block_size: u32,
    policy: ReplacementPolicy,
    rng: SharedRng,
    time: u64,
}

impl FullyAssociative {
    #[must_use]
    pub fn new(
        capacity: usize,
        block_size: u32,
        policy: ReplacementPolicy,
        rng: SharedRng,
    ) -> Self {
        assert!(capacity > 0, "fully associative cache needs at least one line");
        Self {
            lines: IndexMap::with_capacity(capacity),
            capacity,
            block_size,
            policy,
            rng,
            time: 0,
        }
    }

    fn evict(&mut self) -> Option<Line> {
        let victim = replacement::select_victim(self.policy, self.lines.values(), &self.rng)?;
        let (tag, line) = self.lines.swap_remove_index(victim)?;
        log::trace!("evicting {tag:#x} ({:?})", self.policy);
        Some(line)
    }
}

impl Store for FullyAssociative {
    fn lookup(&self, block_addr: address) -> Option<&Line> {
        self.lines.get(&block_addr)
    }

    fn lookup_mut(&mut self, block_addr: address) -> Option<&mut Line> {
        self.lines.get_mut(&block_addr)
    }

    fn touch(&mut self, block_addr: address) {
        self.time += 1;
        if let Some(line) = self.lines.get_mut(&block_addr) {
            line.last_access_time = self.time;
        }
    }

    fn insert(&mut self, block_addr: address, data: Box<[u8]>) -> Option<Line> {
        assert!(
            !self.lines.contains_key(&block_addr),
            "block {block_addr:#x} is already resident"
        );
        let victim = if self.lines.len() >= self.capacity {
            self.evict()
        } else {
            None
        };
        self.time += 1;
        self.lines
            .insert(block_addr, Line::new(block_addr, data, self.time));
        debug_assert!(self.lines.len() <= self.capacity);
        victim
    }

    fn len(&self) -> usize {
        self.lines.len()
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn block_size(&self) -> u32 {
        self.block_size
    }

    fn lines(&self) -> Box<dyn Iterator<Item = &Line> + '_> {
        Box::new(self.lines.values())
    }
}
