//! System harness wiring requestors, the cache and the memory together.

use crate::cache::{self, Cache, Store};
use crate::config;
use crate::engine::{ClockDomain, Component, EventQueue, Tick};
use crate::memory::SimpleMemory;
use crate::random::SharedRng;
use crate::sync::{Arc, Mutex};
use crate::trace::{InitiatorTrace, Trace, TraceInitiator};
use color_eyre::eyre;
use serde::Serialize;

/// Cycles after which a run is considered deadlocked.
pub const DEFAULT_MAX_CYCLES: u64 = 1_000_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Cache(cache::Event),
}

impl From<cache::Event> for Event {
    fn from(event: cache::Event) -> Self {
        Self::Cache(event)
    }
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub cycles: u64,
    pub ticks: Tick,
    pub cache: stats::Cache,
    pub completions: Vec<Vec<crate::trace::Completion>>,
}

#[derive(Debug)]
pub struct System {
    pub config: config::System,
    clock: ClockDomain,
    queue: EventQueue<Event>,
    cache: Cache<Box<dyn Store>>,
    memory: SimpleMemory,
    initiators: Vec<TraceInitiator>,
    cur_cycle: u64,
}

impl System {
    pub fn new(config: config::System, trace: Trace) -> eyre::Result<Self> {
        config.validate()?;
        let num_ports = config.cache.num_cpu_side_ports;
        if trace.initiators.len() > num_ports {
            eyre::bail!(
                "trace has {} initiators but the cache has only {num_ports} cpu side ports",
                trace.initiators.len()
            );
        }

        let clock = ClockDomain::new(config.clock_period);
        let rng = SharedRng::seeded(config.seed);
        let memory = SimpleMemory::new("system.mem", clock, &config.memory);

        let mut traces = trace.initiators.into_iter();
        let initiators: Vec<_> = (0..num_ports)
            .map(|id| {
                let trace = traces.next().unwrap_or_else(InitiatorTrace::default);
                TraceInitiator::new(format!("system.cpu[{id}]"), id, clock, trace)
            })
            .collect();

        let cache_config = cache::Config::from(&config);
        let store = cache::build_store(&cache_config, rng);
        let cache = cache::Builder {
            name: "system.cache".to_string(),
            stats: Arc::new(Mutex::new(stats::Cache::default())),
            cache_config,
            store,
            cpu_side: initiators.iter().map(TraceInitiator::port).collect(),
            mem_side: memory.port(),
        }
        .build();

        log::info!(
            "{}: {} ({} lines), seed {}",
            cache.name,
            config.cache.size,
            cache.capacity(),
            config.seed
        );

        Ok(Self {
            config,
            clock,
            queue: EventQueue::new(clock),
            cache,
            memory,
            initiators,
            cur_cycle: 0,
        })
    }

    #[must_use]
    pub fn cache(&self) -> &Cache<Box<dyn Store>> {
        &self.cache
    }

    #[must_use]
    pub fn memory(&self) -> &SimpleMemory {
        &self.memory
    }

    #[must_use]
    pub fn initiators(&self) -> &[TraceInitiator] {
        &self.initiators
    }

    #[must_use]
    pub fn now(&self) -> Tick {
        self.queue.now()
    }

    #[must_use]
    pub fn stats(&self) -> stats::Cache {
        self.cache.stats()
    }

    /// Whether all accesses completed and nothing is in flight.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.initiators.iter().all(TraceInitiator::is_done)
            && self.queue.is_empty()
            && !self.memory.is_busy()
            && !self.cache.is_blocked()
    }

    /// Advances the system by one cycle.
    pub fn step(&mut self) {
        let cycle = self.cur_cycle;
        self.cycle(cycle);
        self.cur_cycle += 1;
    }

    /// Runs until all accesses completed.
    pub fn run_to_completion(&mut self, max_cycles: Option<u64>) -> eyre::Result<Summary> {
        let max_cycles = max_cycles.unwrap_or(DEFAULT_MAX_CYCLES);
        while !self.is_done() {
            if self.cur_cycle >= max_cycles {
                eyre::bail!(
                    "not done after {max_cycles} cycles (cache {}, waiting port {:?})",
                    self.cache.state(),
                    self.cache.waiting_port()
                );
            }
            self.step();
        }
        log::info!("done after {} cycles", self.cur_cycle);
        Ok(Summary {
            cycles: self.cur_cycle,
            ticks: self.queue.now(),
            cache: self.stats(),
            completions: self
                .initiators
                .iter()
                .map(|initiator| initiator.completions().to_vec())
                .collect(),
        })
    }
}

impl Component for System {
    fn cycle(&mut self, cycle: u64) {
        let now = self.clock.cycles_to_ticks(cycle);
        self.queue.advance_to(now);
        log::trace!("=============== cycle {cycle} ({now}) ===============");

        self.memory.cycle(cycle);

        // responses refused in an earlier cycle
        for initiator in &mut self.initiators {
            if initiator.take_resp_retry() {
                self.cache.recv_resp_retry(initiator.id());
            }
        }

        while let Some(response) = self.memory.take_response() {
            self.cache.recv_timing_resp(response, &self.queue);
        }
        if self.memory.take_retry() {
            self.cache.recv_req_retry();
        }

        while let Some((_, event)) = self.queue.pop_due(now) {
            match event {
                Event::Cache(event) => self.cache.process(event, &mut self.queue),
            }
        }

        let cache = &mut self.cache;
        let queue = &mut self.queue;
        for initiator in &mut self.initiators {
            initiator.cycle(cycle);
            let port_id = initiator.id();
            initiator.try_issue(|packet| cache.recv_timing_req(port_id, packet, &mut *queue));
        }
    }
}

pub fn write_csv_rows<R, T>(writer: impl std::io::Write, rows: R) -> eyre::Result<()>
where
    R: IntoIterator<Item = T>,
    T: Serialize,
{
    let mut csv_writer = csv::WriterBuilder::new()
        .flexible(false)
        .from_writer(writer);
    for row in rows {
        csv_writer.serialize(row)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Writes the cache statistics as `stat,value` rows.
pub fn write_stats_as_csv(writer: impl std::io::Write, stats: &stats::Cache) -> eyre::Result<()> {
    #[derive(Serialize)]
    struct Row<'a> {
        stat: &'a str,
        value: f64,
    }
    let rows = stats.flatten();
    write_csv_rows(
        writer,
        rows.iter().map(|(stat, value)| Row {
            stat,
            value: *value,
        }),
    )
}
