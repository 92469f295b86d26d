pub mod base;
pub mod block;
pub mod config;
pub mod controller;
pub mod direct;
pub mod event;
pub mod fully_assoc;
pub mod replacement;
pub mod set_assoc;
pub mod set_index;

pub use base::{Builder, Cache};
pub use block::Line;
pub use config::Config;
pub use controller::CacheController;
pub use direct::DirectMapped;
pub use event::Event;
pub use fully_assoc::FullyAssociative;
pub use set_assoc::SetAssociative;

use crate::{address, random::SharedRng, Packet};

/// Blocking cache backed by direct mapped storage.
pub type DirectCache = Cache<DirectMapped>;
/// Blocking cache backed by fully associative storage.
pub type FullyAssocCache = Cache<FullyAssociative>;
/// Blocking cache backed by set associative storage.
pub type SetAssocCache = Cache<SetAssociative>;

/// State of the cache controller.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Hash, strum::Display, serde::Serialize,
)]
pub enum State {
    #[default]
    Idle,
    /// An access event is scheduled.
    WaitAccess,
    /// A block fetch is in flight downstream.
    WaitMem,
}

/// Storage of cache lines.
pub trait Store: std::fmt::Debug + Send + 'static {
    /// Probes for the line holding `block_addr`.
    #[must_use]
    fn lookup(&self, block_addr: address) -> Option<&Line>;

    #[must_use]
    fn lookup_mut(&mut self, block_addr: address) -> Option<&mut Line>;

    /// Records a timing access to a resident line.
    fn touch(&mut self, block_addr: address);

    /// Installs a block, returning the evicted line, if any.
    ///
    /// The block must not be resident.
    fn insert(&mut self, block_addr: address, data: Box<[u8]>) -> Option<Line>;

    /// Number of resident lines.
    #[must_use]
    fn len(&self) -> usize;

    #[must_use]
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of resident lines.
    #[must_use]
    fn capacity(&self) -> usize;

    #[must_use]
    fn block_size(&self) -> u32;

    /// Iterates over the resident lines.
    fn lines(&self) -> Box<dyn Iterator<Item = &Line> + '_>;

    /// Performs `packet` against a resident line.
    ///
    /// Reads copy from the line, writes copy into it.
    /// Returns false if the block is not resident.
    fn access_functional(&mut self, packet: &mut Packet) -> bool {
        let block_size = self.block_size();
        let block_addr = packet.block_addr(block_size);
        let Some(line) = self.lookup_mut(block_addr) else {
            return false;
        };
        if packet.is_write() {
            packet.write_data_to_block(&mut line.data, block_size);
        } else if packet.is_read() {
            packet.set_data_from_block(&line.data, block_size);
        } else {
            panic!("unknown packet type {packet} in functional access");
        }
        log::trace!(
            "{} {}: {}",
            packet.cmd(),
            style_addr(block_addr),
            crate::hex_dump(&line.data)
        );
        true
    }
}

fn style_addr(addr: address) -> console::StyledObject<String> {
    console::style(format!("{addr:#x}")).magenta()
}

impl Store for Box<dyn Store> {
    fn lookup(&self, block_addr: address) -> Option<&Line> {
        (**self).lookup(block_addr)
    }

    fn lookup_mut(&mut self, block_addr: address) -> Option<&mut Line> {
        (**self).lookup_mut(block_addr)
    }

    fn touch(&mut self, block_addr: address) {
        (**self).touch(block_addr);
    }

    fn insert(&mut self, block_addr: address, data: Box<[u8]>) -> Option<Line> {
        (**self).insert(block_addr, data)
    }

    fn len(&self) -> usize {
        (**self).len()
    }

    fn capacity(&self) -> usize {
        (**self).capacity()
    }

    fn block_size(&self) -> u32 {
        (**self).block_size()
    }

    fn lines(&self) -> Box<dyn Iterator<Item = &Line> + '_> {
        (**self).lines()
    }

    fn access_functional(&mut self, packet: &mut Packet) -> bool {
        (**self).access_functional(packet)
    }
}

/// Builds the storage for a cache configuration.
#[must_use]
pub fn build_store(config: &Config, rng: SharedRng) -> Box<dyn Store> {
    match config.kind {
        config::Kind::DirectMapped => {
            Box::new(DirectMapped::new(config.num_lines, config.line_size))
        }
        config::Kind::FullyAssociative => Box::new(FullyAssociative::new(
            config.num_lines,
            config.line_size,
            config.replacement_policy,
            rng,
        )),
        config::Kind::SetAssociative => Box::new(SetAssociative::new(
            config.num_lines,
            config.associativity,
            config.line_size,
            config.replacement_policy,
            rng,
        )),
    }
}
