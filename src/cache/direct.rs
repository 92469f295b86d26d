//! Direct mapped storage.

use super::{block::Line, controller::AddressMapping, CacheController, Store};
use crate::address;

/// Every block maps to exactly one slot, `(block_addr / block_size) mod num_lines`.
#[derive(Debug)]
pub struct DirectMapped {
    mapping: AddressMapping,
    lines: Vec<Option<Line>>,
    block_size: u32,
    time: u64,
}

impl DirectMapped {
    #[must_use]
    pub fn new(num_lines: usize, block_size: u32) -> Self {
        Self {
            mapping: AddressMapping::new(num_lines, block_size),
            lines: (0..num_lines).map(|_| None).collect(),
            block_size,
            time: 0,
        }
    }

    fn slot(&self, block_addr: address) -> usize {
        self.mapping.set_index(block_addr) as usize
    }
}

impl Store for DirectMapped {
    fn lookup(&self, block_addr: address) -> Option<&Line> {
        let slot = self.slot(block_addr);
        self.lines[slot]
            .as_ref()
            .filter(|line| line.tag == block_addr)
    }

    fn lookup_mut(&mut self, block_addr: address) -> Option<&mut Line> {
        let slot = self.slot(block_addr);
        self.lines[slot]
            .as_mut()
            .filter(|line| line.tag == block_addr)
    }

    fn touch(&mut self, block_addr: address) {
        self.time += 1;
        let time = self.time;
        if let Some(line) = self.lookup_mut(block_addr) {
            line.last_access_time = time;
        }
    }

    fn insert(&mut self, block_addr: address, data: Box<[u8]>) -> Option<Line> {
        assert_eq!(
            self.mapping.tag(block_addr),
            block_addr,
            "inserting unaligned block {block_addr:#x}"
        );
        assert!(
            self.lookup(block_addr).is_none(),
            "block {block_addr:#x} is already resident"
        );
        self.time += 1;
        let slot = self.slot(block_addr);
        self.lines[slot].replace(Line::new(block_addr, data, self.time))
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
