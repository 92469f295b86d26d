#![allow(
    clippy::upper_case_acronyms,
    non_camel_case_types,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc,
    clippy::module_name_repetitions,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation
)]

pub mod cache;
pub mod config;
pub mod engine;
pub mod fifo;
pub mod interconn;
pub mod memory;
pub mod packet;
pub mod port;
pub mod random;
pub mod sim;
pub mod sync;
pub mod trace;

#[cfg(test)]
pub mod testing;

pub use cache::Cache;
pub use engine::{Cycles, Tick};
pub use packet::Packet;

pub type address = u64;

/// Block aligned address of `addr`.
#[inline]
#[must_use]
pub fn block_addr(addr: address, block_size: u32) -> address {
    addr - (addr % u64::from(block_size))
}

/// Displays an optional value as `Some(value)` or `None`.
pub struct Optional<T>(pub Option<T>);

impl<'a, T> std::fmt::Display for Optional<&'a T>
where
    T: std::fmt::Display,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Some(value) => write!(f, "Some({value})"),
            None => write!(f, "None"),
        }
    }
}

impl<'a, T> std::fmt::Debug for Optional<&'a T>
where
    T: std::fmt::Display,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(self, f)
    }
}

/// Formats bytes as space separated hex for debug dumps.
#[must_use]
pub fn hex_dump(data: &[u8]) -> String {
    use itertools::Itertools;
    data.iter().map(|byte| format!("{byte:02x}")).join(" ")
}
