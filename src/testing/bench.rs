//! Drives a single cache against mock transports.

use super::transport::{MockMemory, MockRequestor};
use crate::cache::{self, Cache, Event, Store};
use crate::config::{CacheKind, ReplacementPolicy};
use crate::engine::{ClockDomain, EventQueue, Tick};
use crate::interconn::ResponseTransport;
use crate::random::SharedRng;
use crate::sync::{Arc, Mutex};
use crate::Packet;

/// Ticks the mock memory takes to respond.
pub const MEMORY_LATENCY: Tick = 10;

pub fn cache_config(kind: CacheKind, num_lines: usize, associativity: usize) -> cache::Config {
    cache::Config {
        kind,
        line_size: 64,
        num_lines,
        associativity,
        latency: 1,
        replacement_policy: ReplacementPolicy::Random,
    }
}

#[derive(Debug)]
pub struct Bench<S> {
    pub cache: Cache<S>,
    pub queue: EventQueue<Event>,
    pub requestors: Vec<MockRequestor>,
    pub memory: MockMemory,
}

impl Bench<Box<dyn Store>> {
    /// Bench for a cache built from `config` with a seeded generator.
    #[must_use]
    pub fn from_config(config: cache::Config, num_ports: usize, seed: u64) -> Self {
        let store = cache::build_store(&config, SharedRng::seeded(seed));
        Self::new(config, store, num_ports)
    }
}

impl<S> Bench<S>
where
    S: Store,
{
    #[must_use]
    pub fn new(config: cache::Config, store: S, num_ports: usize) -> Self {
        let requestors: Vec<MockRequestor> =
            (0..num_ports).map(|_| MockRequestor::default()).collect();
        let memory = MockMemory::default();
        let cache = cache::Builder {
            name: "cache".to_string(),
            stats: Arc::new(Mutex::new(stats::Cache::default())),
            cache_config: config,
            store,
            cpu_side: requestors
                .iter()
                .map(|requestor| Box::new(requestor.clone()) as Box<dyn ResponseTransport>)
                .collect(),
            mem_side: Box::new(memory.clone()),
        }
        .build();
        Self {
            cache,
            queue: EventQueue::new(ClockDomain::new(1)),
            requestors,
            memory,
        }
    }

    pub fn send(&mut self, port_id: usize, packet: Packet) -> Result<(), Packet> {
        self.cache.recv_timing_req(port_id, packet, &mut self.queue)
    }

    /// Fires all scheduled cache events.
    pub fn run_events(&mut self) {
        while let Some((_, event)) = self.queue.pop() {
            self.cache.process(event, &mut self.queue);
        }
    }

    /// Lets the memory respond to everything it accepted.
    ///
    /// Writebacks issued while handling the responses are applied as well.
    pub fn respond_memory(&mut self) {
        loop {
            let responses = self.memory.respond();
            if responses.is_empty() {
                break;
            }
            let now = self.queue.now() + MEMORY_LATENCY;
            self.queue.advance_to(now);
            for response in responses {
                self.cache.recv_timing_resp(response, &self.queue);
            }
        }
    }

    /// Performs a complete access and returns its response.
    pub fn access(&mut self, port_id: usize, packet: Packet) -> Packet {
        let before = self.requestors[port_id].responses().len();
        if let Err(packet) = self.send(port_id, packet) {
            panic!("cache refused {packet}");
        }
        self.run_events();
        self.respond_memory();
        let responses = self.requestors[port_id].responses();
        assert_eq!(responses.len(), before + 1, "expected exactly one response");
        responses[before].clone()
    }

    pub fn read(&mut self, addr: u64, size: u32) -> Vec<u8> {
        self.access(0, Packet::read(addr, size, 0)).data().to_vec()
    }

    pub fn write(&mut self, addr: u64, data: &[u8]) {
        let response = self.access(0, Packet::write(addr, data, 0));
        assert!(response.is_response());
    }

    /// Block addresses of all writebacks seen by the memory.
    #[must_use]
    pub fn writebacks(&self) -> Vec<u64> {
        self.memory
            .requests_of(crate::packet::Command::WritebackDirty)
            .iter()
            .map(Packet::addr)
            .collect()
    }
}
