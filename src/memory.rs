//! A simple fixed latency memory.
//!
//! Accesses are performed when a request is received and the response is
//! delayed by the configured latency. Memory that was never written reads as
//! zero.

use crate::engine::{ClockDomain, Component, Tick};
use crate::fifo::Fifo;
use crate::interconn::{AddrRange, RequestTransport};
use crate::packet::{Command, Packet};
use crate::sync::{Arc, Mutex};
use crate::{address, config};
use std::collections::{HashMap, VecDeque};

/// Granularity of the sparse backing store.
const CHUNK_SIZE: u32 = 64;

#[derive(Debug)]
struct InFlight {
    ready: Tick,
    packet: Packet,
}

#[derive(Debug)]
struct Inner {
    name: String,
    clock: ClockDomain,
    latency: Tick,
    range: AddrRange,
    chunks: HashMap<address, Box<[u8]>>,
    in_flight: Fifo<InFlight>,
    ready: VecDeque<Packet>,
    now: Tick,
    /// A request was refused and the requestor awaits a retry.
    retry_pending: bool,
    send_retry: bool,
    received: Vec<(Command, address, u32)>,
}

impl Inner {
    fn chunk_mut(&mut self, addr: address) -> &mut [u8] {
        self.chunks
            .entry(crate::block_addr(addr, CHUNK_SIZE))
            .or_insert_with(|| vec![0; CHUNK_SIZE as usize].into_boxed_slice())
    }

    fn read(&self, addr: address, data: &mut [u8]) {
        for (i, byte) in data.iter_mut().enumerate() {
            let addr = addr + i as u64;
            let base = crate::block_addr(addr, CHUNK_SIZE);
            *byte = self
                .chunks
                .get(&base)
                .map_or(0, |chunk| chunk[(addr - base) as usize]);
        }
    }

    fn write(&mut self, addr: address, data: &[u8]) {
        for (i, byte) in data.iter().enumerate() {
            let addr = addr + i as u64;
            let offset = (addr % u64::from(CHUNK_SIZE)) as usize;
            self.chunk_mut(addr)[offset] = *byte;
        }
    }

    fn check_range(&self, packet: &Packet) {
        let end = packet.addr() + u64::from(packet.size());
        assert!(
            packet.addr() >= self.range.start && end <= self.range.end,
            "{}: {packet} is outside of {:#x}..{:#x}",
            self.name,
            self.range.start,
            self.range.end
        );
    }

    /// Performs the access of `packet` against the backing store.
    fn access(&mut self, packet: &mut Packet) {
        self.check_range(packet);
        if packet.is_write() {
            self.write(packet.addr(), packet.data());
        } else if packet.is_read() {
            packet.allocate();
            let addr = packet.addr();
            let mut data = vec![0; packet.size() as usize];
            self.read(addr, &mut data);
            packet.set_data(&data);
        } else {
            panic!("{}: unexpected {packet}", self.name);
        }
        log::trace!(
            "{}: {} {:#x}: {}",
            self.name,
            packet.cmd(),
            packet.addr(),
            crate::hex_dump(packet.data())
        );
    }

    fn recv_timing_req(&mut self, mut packet: Packet) -> Result<(), Packet> {
        if packet.needs_response() && self.in_flight.full() {
            log::debug!("{}: request buffer full, refusing {}", self.name, packet);
            self.retry_pending = true;
            return Err(packet);
        }
        self.received
            .push((packet.cmd(), packet.addr(), packet.size()));
        self.access(&mut packet);
        if packet.needs_response() {
            packet.make_response();
            let ready = self.now + self.latency;
            log::debug!("{}: {} ready at {}", self.name, packet, ready);
            self.in_flight.enqueue(InFlight { ready, packet });
        }
        Ok(())
    }

    fn cycle(&mut self, cycle: u64) {
        self.now = self.clock.cycles_to_ticks(cycle);
        let now = self.now;
        let due = self.in_flight.drain_while(|entry| entry.ready <= now);
        self.ready.extend(due.into_iter().map(|entry| entry.packet));
        if self.retry_pending && !self.in_flight.full() {
            self.retry_pending = false;
            self.send_retry = true;
        }
    }
}

/// Simple memory shared between the system and the cache memory side port.
#[derive(Debug, Clone)]
pub struct SimpleMemory {
    inner: Arc<Mutex<Inner>>,
}

impl SimpleMemory {
    #[must_use]
    pub fn new(name: impl Into<String>, clock: ClockDomain, config: &config::Memory) -> Self {
        let inner = Inner {
            name: name.into(),
            clock,
            latency: clock.cycles_to_ticks(config.latency),
            range: 0..config.range.0,
            chunks: HashMap::new(),
            in_flight: Fifo::new(Some(config.request_buffer_size)),
            ready: VecDeque::new(),
            now: 0,
            retry_pending: false,
            send_retry: false,
            received: Vec::new(),
        };
        Self {
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    /// Transport for a memory side port.
    #[must_use]
    pub fn port(&self) -> Box<dyn RequestTransport> {
        Box::new(self.clone())
    }

    /// Takes the next response that completed its latency.
    pub fn take_response(&self) -> Option<Packet> {
        self.inner.lock().ready.pop_front()
    }

    /// Whether a refused requestor should retry now.
    pub fn take_retry(&self) -> bool {
        std::mem::take(&mut self.inner.lock().send_retry)
    }

    /// Whether any responses are still in flight.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        let inner = self.inner.lock();
        !inner.in_flight.is_empty() || !inner.ready.is_empty()
    }

    /// Commands, addresses and sizes of all accepted timing requests.
    #[must_use]
    pub fn received(&self) -> Vec<(Command, address, u32)> {
        self.inner.lock().received.clone()
    }

    /// Reads backing store bytes directly.
    #[must_use]
    pub fn read_bytes(&self, addr: address, len: usize) -> Vec<u8> {
        let mut data = vec![0; len];
        self.inner.lock().read(addr, &mut data);
        data
    }

    /// Writes backing store bytes directly.
    pub fn write_bytes(&self, addr: address, data: &[u8]) {
        self.inner.lock().write(addr, data);
    }
}

impl Component for SimpleMemory {
    fn cycle(&mut self, cycle: u64) {
        self.inner.lock().cycle(cycle);
    }
}

impl RequestTransport for SimpleMemory {
    fn send_timing_req(&mut self, packet: Packet) -> Result<(), Packet> {
        self.inner.lock().recv_timing_req(packet)
    }

    fn send_functional(&mut self, packet: &mut Packet) {
        self.inner.lock().access(packet);
        if packet.needs_response() {
            packet.make_response();
        }
    }

    fn addr_ranges(&self) -> Vec<AddrRange> {
        vec![self.inner.lock().range.clone()]
    }
}
