//! Transports connecting the cache ports to their peers.

use super::{address, Packet};

/// Address range served by a memory.
pub type AddrRange = std::ops::Range<address>;

/// Transport from a cpu side port towards the requestor.
pub trait ResponseTransport: std::fmt::Debug + Send + 'static {
    /// Sends a timing response.
    ///
    /// When the peer refuses, the packet is handed back and the peer will
    /// later signal a response retry.
    fn send_timing_resp(&mut self, packet: Packet) -> Result<(), Packet>;

    /// Tells the requestor to retry a previously refused request.
    fn send_retry_req(&mut self);

    /// Tells the requestor that the served address ranges changed.
    fn send_range_change(&mut self);
}

/// Transport from a memory side port towards the memory.
pub trait RequestTransport: std::fmt::Debug + Send + 'static {
    /// Sends a timing request.
    ///
    /// When the peer refuses, the packet is handed back and the peer will
    /// later signal a request retry.
    fn send_timing_req(&mut self, packet: Packet) -> Result<(), Packet>;

    /// Performs a functional access, completing it in place.
    fn send_functional(&mut self, packet: &mut Packet);

    /// Address ranges served by the memory.
    fn addr_ranges(&self) -> Vec<AddrRange>;
}
