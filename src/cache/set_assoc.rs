//! Set associative storage.

use super::{block::Line, controller::AddressMapping, replacement, CacheController, Store};
use crate::{address, config::ReplacementPolicy, random::SharedRng};

/// Blocks map to a set, `(block_addr / block_size) mod num_sets`, and may
/// occupy any of its ways.
#[derive(Debug)]
pub struct SetAssociative {
    mapping: AddressMapping,
    /// Lines of set `s` are at `s * associativity..(s + 1) * associativity`.
    lines: Vec<Option<Line>>,
    associativity: usize,
    block_size: u32,
    policy: ReplacementPolicy,
    rng: SharedRng,
    time: u64,
}

impl SetAssociative {
    #[must_use]
    pub fn new(
        num_lines: usize,
        associativity: usize,
        block_size: u32,
        policy: ReplacementPolicy,
        rng: SharedRng,
    ) -> Self {
        assert!(associativity > 0, "need at least one way per set");
        assert_eq!(
            num_lines % associativity,
            0,
            "set size {associativity} does not divide {num_lines} lines"
        );
        let num_sets = num_lines / associativity;
        Self {
            mapping: AddressMapping::new(num_sets, block_size),
            lines: (0..num_lines).map(|_| None).collect(),
            associativity,
            block_size,
            policy,
            rng,
            time: 0,
        }
    }

    #[must_use]
    pub fn num_sets(&self) -> usize {
        self.mapping.num_sets()
    }

    #[must_use]
    pub fn associativity(&self) -> usize {
        self.associativity
    }

    fn set_range(&self, block_addr: address) -> std::ops::Range<usize> {
        let set = self.mapping.set_index(block_addr) as usize;
        let start = set * self.associativity;
        start..start + self.associativity
    }

    fn position(&self, block_addr: address) -> Option<usize> {
        let set = self.set_range(block_addr);
        let start = set.start;
        self.lines[set]
            .iter()
            .position(|line| line.as_ref().is_some_and(|line| line.tag == block_addr))
            .map(|way| start + way)
    }
}

impl Store for SetAssociative {
    fn lookup(&self, block_addr: address) -> Option<&Line> {
        let idx = self.position(block_addr)?;
        self.lines[idx].as_ref()
    }

    fn lookup_mut(&mut self, block_addr: address) -> Option<&mut Line> {
        let idx = self.position(block_addr)?;
        self.lines[idx].as_mut()
    }

    fn touch(&mut self, block_addr: address) {
        self.time += 1;
        let time = self.time;
        if let Some(line) = self.lookup_mut(block_addr) {
            line.last_access_time = time;
        }
    }

    fn insert(&mut self, block_addr: address, data: Box<[u8]>) -> Option<Line> {
        assert!(
            self.position(block_addr).is_none(),
            "block {block_addr:#x} is already resident"
        );
        self.time += 1;
        let set = self.set_range(block_addr);
        let start = set.start;
        let ways = &mut self.lines[set];
        let way = match ways.iter().position(Option::is_none) {
            Some(free) => free,
            None => {
                let resident: Vec<&Line> = ways.iter().flatten().collect();
                replacement::select_victim(self.policy, resident.into_iter(), &self.rng)
                    .unwrap_or_default()
            }
        };
        log::trace!(
            "inserting {block_addr:#x} into set {} way {way}",
            start / self.associativity
        );
        ways[way].replace(Line::new(block_addr, data, self.time))
    }

    fn len(&self) -> usize {
        self.lines.iter().filter(|line| line.is_some()).count()
    }

    fn capacity(&self) -> usize {
        self.lines.len()
    }

    fn block_size(&self) -> u32 {
        self.block_size
    }

    fn lines(&self) -> Box<dyn Iterator<Item = &Line> + '_> {
        Box::new(self.lines.iter().flatten())
    }
}
