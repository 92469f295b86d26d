use super::{Event, State, Store};
use crate::engine::{Scheduler, Tick};
use crate::interconn::{AddrRange, RequestTransport, ResponseTransport};
use crate::packet::{Command, Packet};
use crate::port::{CpuSidePort, MemSidePort};
use crate::sync::{Arc, Mutex};
use crate::{cache, Optional};
use console::style;

/// Blocking writeback cache.
///
/// Serves one request at a time: while an access is scheduled or a miss is
/// outstanding, further requests are refused and the refusing port owes its
/// requestor a retry. Whole blocks are fetched on a miss and evicted blocks
/// are written back unconditionally.
#[derive(Debug)]
pub struct Cache<S> {
    pub name: String,
    pub stats: Arc<Mutex<stats::Cache>>,
    pub cache_config: cache::Config,
    store: S,
    cpu_ports: Vec<CpuSidePort>,
    mem_port: MemSidePort,
    /// Whether a request is being served.
    blocked: bool,
    /// Port of the request being served.
    waiting_port_id: Option<usize>,
    /// Sub-block request waiting for its block to be fetched.
    original_packet: Option<Packet>,
    /// Block fetch held back while a writeback is parked on the memory side.
    deferred_fetch: Option<Packet>,
    /// Tick the outstanding miss was detected.
    miss_time: Tick,
    state: State,
}

#[derive(Debug)]
pub struct Builder<S> {
    pub name: String,
    pub stats: Arc<Mutex<stats::Cache>>,
    pub cache_config: cache::Config,
    pub store: S,
    /// One transport per connected cpu side port.
    pub cpu_side: Vec<Box<dyn ResponseTransport>>,
    pub mem_side: Box<dyn RequestTransport>,
}

impl<S> Builder<S>
where
    S: Store,
{
    #[must_use]
    pub fn build(self) -> Cache<S> {
        assert!(
            !self.cpu_side.is_empty(),
            "{}: need at least one cpu side port",
            self.name
        );
        assert_eq!(
            self.store.block_size(),
            self.cache_config.line_size,
            "{}: storage block size does not match line size",
            self.name
        );
        let cpu_ports = self
            .cpu_side
            .into_iter()
            .enumerate()
            .map(|(id, transport)| {
                CpuSidePort::new(format!("{}.cpu_side[{id}]", self.name), id, transport)
            })
            .collect();
        let mem_port = MemSidePort::new(format!("{}.mem_side", self.name), self.mem_side);
        log::debug!("{}: {}", self.name, self.cache_config);
        Cache {
            name: self.name,
            stats: self.stats,
            cache_config: self.cache_config,
            store: self.store,
            cpu_ports,
            mem_port,
            blocked: false,
            waiting_port_id: None,
            original_packet: None,
            deferred_fetch: None,
            miss_time: 0,
            state: State::Idle,
        }
    }
}

impl<S> Cache<S>
where
    S: Store,
{
    #[inline]
    #[must_use]
    pub fn block_size(&self) -> u32 {
        self.cache_config.line_size
    }

    #[must_use]
    pub fn is_blocked(&self) -> bool {
        self.blocked
    }

    #[must_use]
    pub fn waiting_port(&self) -> Option<usize> {
        self.waiting_port_id
    }

    #[must_use]
    pub fn state(&self) -> State {
        self.state
    }

    #[must_use]
    pub fn num_resident_lines(&self) -> usize {
        self.store.len()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.store.capacity()
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    #[must_use]
    pub fn num_cpu_ports(&self) -> usize {
        self.cpu_ports.len()
    }

    #[must_use]
    pub fn cpu_port(&self, port_id: usize) -> &CpuSidePort {
        self.cpu_port_checked(port_id)
    }

    #[must_use]
    pub fn mem_port(&self) -> &MemSidePort {
        &self.mem_port
    }

    /// Snapshot of the statistics.
    #[must_use]
    pub fn stats(&self) -> stats::Cache {
        self.stats.lock().clone()
    }

    /// Resolves a port by interface name and vector index.
    #[must_use]
    pub fn port_name(&self, if_name: &str, idx: Option<usize>) -> &str {
        match (if_name, idx) {
            ("mem_side", None) => self.mem_port.name(),
            ("mem_side", Some(idx)) => {
                panic!("{}: mem_side is not a vector port (got index {idx})", self.name)
            }
            ("cpu_side", Some(idx)) if idx < self.cpu_ports.len() => self.cpu_ports[idx].name(),
            (if_name, idx) => panic!(
                "{}: no such port {if_name}[{}]",
                self.name,
                Optional(idx.as_ref())
            ),
        }
    }

    fn cpu_port_checked(&self, port_id: usize) -> &CpuSidePort {
        match self.cpu_ports.get(port_id) {
            Some(port) => port,
            None => panic!("{}: no cpu side port {port_id}", self.name),
        }
    }

    fn cpu_port_mut(&mut self, port_id: usize) -> &mut CpuSidePort {
        match self.cpu_ports.get_mut(port_id) {
            Some(port) => port,
            None => panic!("{}: no cpu side port {port_id}", self.name),
        }
    }

    /// A requestor sends a timing request on cpu side port `port_id`.
    ///
    /// A refused request is handed back and the requestor receives a retry
    /// once the cache can accept again.
    pub fn recv_timing_req<Q>(
        &mut self,
        port_id: usize,
        packet: Packet,
        scheduler: &mut Q,
    ) -> Result<(), Packet>
    where
        Q: Scheduler<Event>,
    {
        let port = self.cpu_port_mut(port_id);
        if !port.can_accept() {
            port.refuse();
            return Err(packet);
        }
        self.handle_request(port_id, packet, scheduler)
            .map_err(|packet| {
                self.cpu_ports[port_id].refuse();
                packet
            })
    }

    fn handle_request<Q>(
        &mut self,
        port_id: usize,
        packet: Packet,
        scheduler: &mut Q,
    ) -> Result<(), Packet>
    where
        Q: Scheduler<Event>,
    {
        if self.blocked {
            log::debug!(
                "{}: blocked, refusing {} from port {port_id}",
                self.name,
                packet
            );
            return Err(packet);
        }
        assert!(
            packet.needs_response(),
            "{}: timing request {packet} does not need a response",
            self.name
        );
        log::debug!(
            "{}: got request {} on port {port_id}",
            self.name,
            style(&packet).cyan()
        );

        self.blocked = true;
        self.waiting_port_id = Some(port_id);

        let when = scheduler.clock_edge(self.cache_config.latency);
        scheduler.schedule(Event::Access { packet }, when);
        self.state = State::WaitAccess;
        Ok(())
    }

    /// Handles a scheduled cache event.
    pub fn process<Q>(&mut self, event: Event, scheduler: &mut Q)
    where
        Q: Scheduler<Event>,
    {
        match event {
            Event::Access { packet } => self.access_timing(packet, scheduler),
        }
    }

    fn access_timing<Q>(&mut self, mut packet: Packet, scheduler: &Q)
    where
        Q: Scheduler<Event>,
    {
        assert_eq!(
            self.state,
            State::WaitAccess,
            "{}: access fired while {}",
            self.name,
            self.state
        );
        let block_size = self.block_size();
        let block_addr = packet.block_addr(block_size);

        if self.store.access_functional(&mut packet) {
            log::debug!("{}: {} for {}", self.name, style("HIT").green(), packet);
            self.stats.lock().hits += 1;
            self.store.touch(block_addr);
            packet.make_response();
            self.send_response(packet);
            return;
        }

        log::debug!("{}: {} for {}", self.name, style("MISS").red(), packet);
        {
            let mut stats = self.stats.lock();
            stats.misses += 1;
        }
        self.miss_time = scheduler.cur_tick();
        self.state = State::WaitMem;

        if packet.addr() == block_addr && packet.size() == block_size {
            self.send_fetch(packet);
            return;
        }

        assert!(
            packet.fits_in_block(block_size),
            "{}: cannot handle accesses that span multiple cache lines: {packet}",
            self.name
        );
        assert!(
            packet.is_read() || packet.is_write(),
            "{}: unknown packet type {packet} in upgrade",
            self.name
        );
        let mut upgrade = Packet::new_block(Arc::clone(&packet.req), Command::ReadReq, block_size);
        upgrade.allocate();
        log::debug!(
            "{}: upgrading {} to {}",
            self.name,
            packet,
            style(&upgrade).yellow()
        );
        self.original_packet = Some(packet);
        self.send_fetch(upgrade);
    }

    /// Sends a block fetch unless a writeback is still parked ahead of it.
    fn send_fetch(&mut self, packet: Packet) {
        if let Some(parked) = self.mem_port.blocked_packet() {
            log::debug!(
                "{}: deferring {} behind parked {}",
                self.name,
                packet,
                parked
            );
            self.deferred_fetch = Some(packet);
            return;
        }
        self.mem_port.send_packet(packet);
    }

    /// The memory sends a response on the memory side port.
    pub fn recv_timing_resp<Q>(&mut self, mut packet: Packet, scheduler: &Q)
    where
        Q: Scheduler<Event>,
    {
        assert!(
            self.blocked,
            "{}: got response {packet} while not waiting for one",
            self.name
        );
        assert!(
            packet.is_response(),
            "{}: {packet} is not a response",
            self.name
        );
        assert_eq!(self.state, State::WaitMem);
        log::debug!("{}: got response {}", self.name, packet);

        self.insert(&mut packet);

        let latency = scheduler.cur_tick() - self.miss_time;
        self.stats.lock().miss_latency.sample(latency);

        let response = match self.original_packet.take() {
            Some(mut original) => {
                log::debug!("{}: completing upgraded {}", self.name, original);
                if !self.store.access_functional(&mut original) {
                    panic!(
                        "{}: should always hit after inserting ({original})",
                        self.name
                    );
                }
                original.make_response();
                // the upgrade packet is dropped
                original
            }
            None => packet,
        };
        self.send_response(response);
    }

    /// Installs the block of a response, writing back the evicted block.
    fn insert(&mut self, packet: &mut Packet) {
        let block_size = self.block_size();
        assert_eq!(
            packet.addr(),
            packet.block_addr(block_size),
            "{}: inserting unaligned {packet}",
            self.name
        );
        assert_eq!(packet.size(), block_size);
        assert!(
            self.store.lookup(packet.addr()).is_none(),
            "{}: block {:#x} is already resident",
            self.name,
            packet.addr()
        );
        assert!(packet.is_response());

        let data: Box<[u8]> = packet.data().into();
        log::trace!(
            "{}: inserting {:#x}: {}",
            self.name,
            packet.addr(),
            crate::hex_dump(&data)
        );

        if let Some(victim) = self.store.insert(packet.addr(), data) {
            log::debug!(
                "{}: evicting {} for {:#x}",
                self.name,
                style(&victim).red(),
                packet.addr()
            );
            log::trace!("{}: writeback {}", self.name, crate::hex_dump(&victim.data));
            let writeback = Packet::writeback(victim.tag, victim.data);
            self.mem_port.send_packet(writeback);
        }
        debug_assert!(self.store.len() <= self.store.capacity());
    }

    /// Sends a response to the waiting requestor and reopens the cache.
    fn send_response(&mut self, packet: Packet) {
        assert!(self.blocked, "{}: response while not blocked", self.name);
        let Some(port_id) = self.waiting_port_id.take() else {
            panic!("{}: no port is waiting for {packet}", self.name);
        };
        log::debug!("{}: sending {} to port {port_id}", self.name, packet);

        // unblock before sending so the requestor can issue its next request
        self.blocked = false;
        self.state = State::Idle;

        self.cpu_ports[port_id].send_packet(packet);
        for port in &mut self.cpu_ports {
            port.try_send_retry();
        }
    }

    /// A requestor sends a functional access on cpu side port `port_id`.
    pub fn recv_functional(&mut self, port_id: usize, packet: &mut Packet) {
        let _ = self.cpu_port_checked(port_id);
        self.handle_functional(packet);
    }

    fn handle_functional(&mut self, packet: &mut Packet) {
        if self.store.access_functional(packet) {
            packet.make_response();
        } else {
            self.mem_port.send_functional(packet);
        }
    }

    /// Atomic accesses are not supported.
    pub fn recv_atomic(&mut self, port_id: usize, packet: Packet) -> Tick {
        panic!(
            "{}: atomic access {packet} on port {port_id} is not supported",
            self.name
        );
    }

    /// The requestor on `port_id` can take the parked response now.
    pub fn recv_resp_retry(&mut self, port_id: usize) {
        self.cpu_port_mut(port_id).recv_resp_retry();
    }

    /// The memory can take the parked request now.
    pub fn recv_req_retry(&mut self) {
        self.mem_port.recv_req_retry();
        if self.mem_port.blocked_packet().is_none() {
            if let Some(fetch) = self.deferred_fetch.take() {
                log::debug!("{}: sending deferred {}", self.name, fetch);
                self.mem_port.send_packet(fetch);
            }
        }
    }

    /// The memory changed its address ranges.
    pub fn recv_range_change(&mut self) {
        for port in &mut self.cpu_ports {
            port.send_range_change();
        }
    }

    /// Address ranges served through this cache.
    #[must_use]
    pub fn addr_ranges(&self) -> Vec<AddrRange> {
        self.mem_port.addr_ranges()
    }
}
