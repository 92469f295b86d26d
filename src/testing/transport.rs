//! Recording transports standing in for a requestor and a memory.

use crate::interconn::{AddrRange, RequestTransport, ResponseTransport};
use crate::packet::Command;
use crate::sync::{Arc, Mutex};
use crate::{address, Packet};
use std::collections::HashMap;

#[derive(Debug, Default)]
struct RequestorLog {
    responses: Vec<Packet>,
    refuse: usize,
    num_refused: usize,
    num_retries: usize,
    num_range_changes: usize,
}

/// Requestor that records everything the cache sends it.
#[derive(Debug, Clone, Default)]
pub struct MockRequestor(Arc<Mutex<RequestorLog>>);

impl MockRequestor {
    /// Refuses the next `n` responses.
    pub fn refuse_responses(&self, n: usize) {
        self.0.lock().refuse = n;
    }

    #[must_use]
    pub fn responses(&self) -> Vec<Packet> {
        self.0.lock().responses.clone()
    }

    #[must_use]
    pub fn num_refused(&self) -> usize {
        self.0.lock().num_refused
    }

    #[must_use]
    pub fn num_retries(&self) -> usize {
        self.0.lock().num_retries
    }

    #[must_use]
    pub fn num_range_changes(&self) -> usize {
        self.0.lock().num_range_changes
    }
}

impl ResponseTransport for MockRequestor {
    fn send_timing_resp(&mut self, packet: Packet) -> Result<(), Packet> {
        let mut log = self.0.lock();
        if log.refuse > 0 {
            log.refuse -= 1;
            log.num_refused += 1;
            return Err(packet);
        }
        log.responses.push(packet);
        Ok(())
    }

    fn send_retry_req(&mut self) {
        self.0.lock().num_retries += 1;
    }

    fn send_range_change(&mut self) {
        self.0.lock().num_range_changes += 1;
    }
}

#[derive(Debug, Default)]
struct MemoryLog {
    requests: Vec<Packet>,
    pending: Vec<Packet>,
    refuse: usize,
    bytes: HashMap<address, u8>,
    num_functional: usize,
}

impl MemoryLog {
    fn access(&mut self, packet: &mut Packet) {
        if packet.is_write() {
            for (i, byte) in packet.data().iter().enumerate() {
                self.bytes.insert(packet.addr() + i as u64, *byte);
            }
        } else {
            let data: Vec<u8> = (0..u64::from(packet.size()))
                .map(|i| self.bytes.get(&(packet.addr() + i)).copied().unwrap_or(0))
                .collect();
            packet.set_data(&data);
        }
        if packet.needs_response() {
            packet.make_response();
        }
    }
}

/// Memory that records requests and responds when told to.
#[derive(Debug, Clone, Default)]
pub struct MockMemory(Arc<Mutex<MemoryLog>>);

impl MockMemory {
    /// Refuses the next `n` timing requests.
    pub fn refuse_requests(&self, n: usize) {
        self.0.lock().refuse = n;
    }

    /// All accepted timing requests in order.
    #[must_use]
    pub fn requests(&self) -> Vec<Packet> {
        self.0.lock().requests.clone()
    }

    #[must_use]
    pub fn requests_of(&self, cmd: Command) -> Vec<Packet> {
        self.requests()
            .into_iter()
            .filter(|packet| packet.cmd() == cmd)
            .collect()
    }

    #[must_use]
    pub fn num_functional(&self) -> usize {
        self.0.lock().num_functional
    }

    /// Performs all accepted requests, returning the responses.
    pub fn respond(&self) -> Vec<Packet> {
        let mut log = self.0.lock();
        let pending = std::mem::take(&mut log.pending);
        pending
            .into_iter()
            .filter_map(|mut packet| {
                let needs_response = packet.needs_response();
                log.access(&mut packet);
                needs_response.then_some(packet)
            })
            .collect()
    }

    #[must_use]
    pub fn read_bytes(&self, addr: address, len: usize) -> Vec<u8> {
        let log = self.0.lock();
        (0..len as u64)
            .map(|i| log.bytes.get(&(addr + i)).copied().unwrap_or(0))
            .collect()
    }

    pub fn write_bytes(&self, addr: address, data: &[u8]) {
        let mut log = self.0.lock();
        for (i, byte) in data.iter().enumerate() {
            log.bytes.insert(addr + i as u64, *byte);
        }
    }
}

impl RequestTransport for MockMemory {
    fn send_timing_req(&mut self, packet: Packet) -> Result<(), Packet> {
        let mut log = self.0.lock();
        if log.refuse > 0 {
            log.refuse -= 1;
            return Err(packet);
        }
        log.requests.push(packet.clone());
        log.pending.push(packet);
        Ok(())
    }

    fn send_functional(&mut self, packet: &mut Packet) {
        let mut log = self.0.lock();
        log.num_functional += 1;
        log.access(packet);
    }

    fn addr_ranges(&self) -> Vec<AddrRange> {
        vec![0..(1 << 32)]
    }
}
