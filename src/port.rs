//! Cpu side and memory side ports of the cache.
//!
//! Ports own the parked packet and retry bookkeeping. The controller owns
//! the ports and calls into them; peers reach the ports through the
//! `recv_*` methods of the cache.

use crate::interconn::{AddrRange, RequestTransport, ResponseTransport};
use crate::Packet;
use console::style;

/// Port receiving requests from a requestor and sending back responses.
#[derive(Debug)]
pub struct CpuSidePort {
    name: String,
    id: usize,
    /// Whether a request was refused and the requestor awaits a retry.
    needs_retry: bool,
    /// Response refused by the transport, resent on response retry.
    blocked_packet: Option<Packet>,
    transport: Box<dyn ResponseTransport>,
}

impl CpuSidePort {
    #[must_use]
    pub fn new(name: impl Into<String>, id: usize, transport: Box<dyn ResponseTransport>) -> Self {
        Self {
            name: name.into(),
            id,
            needs_retry: false,
            blocked_packet: None,
            transport,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn id(&self) -> usize {
        self.id
    }

    #[must_use]
    pub fn needs_retry(&self) -> bool {
        self.needs_retry
    }

    #[must_use]
    pub fn blocked_packet(&self) -> Option<&Packet> {
        self.blocked_packet.as_ref()
    }

    /// Whether a new request can be handed to the controller.
    ///
    /// Refuses while a response is parked or an earlier refusal is pending.
    #[must_use]
    pub fn can_accept(&self) -> bool {
        self.blocked_packet.is_none() && !self.needs_retry
    }

    /// Records that a request was refused.
    pub fn refuse(&mut self) {
        log::debug!("{}: refusing request, retry pending", self.name);
        self.needs_retry = true;
    }

    /// Sends a response, parking it when the transport refuses.
    pub fn send_packet(&mut self, packet: Packet) {
        assert!(
            self.blocked_packet.is_none(),
            "{}: should never try to send if blocked",
            self.name
        );
        log::debug!(
            "{}: sending response {}",
            self.name,
            style(&packet).cyan()
        );
        if let Err(packet) = self.transport.send_timing_resp(packet) {
            log::debug!("{}: response {} refused, parking", self.name, packet);
            self.blocked_packet = Some(packet);
        }
    }

    /// Issues a retry to the requestor if one is owed and nothing is parked.
    pub fn try_send_retry(&mut self) {
        if self.needs_retry && self.blocked_packet.is_none() {
            self.needs_retry = false;
            log::debug!("{}: sending retry request", self.name);
            self.transport.send_retry_req();
        }
    }

    /// The requestor can take the parked response now.
    pub fn recv_resp_retry(&mut self) {
        let Some(packet) = self.blocked_packet.take() else {
            panic!("{}: response retry without a parked response", self.name);
        };
        log::debug!("{}: response retry for {}", self.name, packet);
        self.send_packet(packet);
        self.try_send_retry();
    }

    pub fn send_range_change(&mut self) {
        self.transport.send_range_change();
    }
}

/// Port sending requests to the memory and receiving its responses.
#[derive(Debug)]
pub struct MemSidePort {
    name: String,
    /// Request refused by the transport, resent on request retry.
    blocked_packet: Option<Packet>,
    transport: Box<dyn RequestTransport>,
}

impl MemSidePort {
    #[must_use]
    pub fn new(name: impl Into<String>, transport: Box<dyn RequestTransport>) -> Self {
        Self {
            name: name.into(),
            blocked_packet: None,
            transport,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn blocked_packet(&self) -> Option<&Packet> {
        self.blocked_packet.as_ref()
    }

    /// Sends a request, parking it when the transport refuses.
    pub fn send_packet(&mut self, packet: Packet) {
        assert!(
            self.blocked_packet.is_none(),
            "{}: should never try to send if blocked",
            self.name
        );
        log::debug!(
            "{}: sending request {}",
            self.name,
            style(&packet).yellow()
        );
        if let Err(packet) = self.transport.send_timing_req(packet) {
            log::debug!("{}: request {} refused, parking", self.name, packet);
            self.blocked_packet = Some(packet);
        }
    }

    /// The memory can take the parked request now.
    pub fn recv_req_retry(&mut self) {
        let Some(packet) = self.blocked_packet.take() else {
            panic!("{}: request retry without a parked request", self.name);
        };
        log::debug!("{}: request retry for {}", self.name, packet);
        self.send_packet(packet);
    }

    pub fn send_functional(&mut self, packet: &mut Packet) {
        self.transport.send_functional(packet);
    }

    #[must_use]
    pub fn addr_ranges(&self) -> Vec<AddrRange> {
        self.transport.addr_ranges()
    }
}
