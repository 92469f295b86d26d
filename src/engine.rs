//! Simulation time keeping and event scheduling.

use serde::{Deserialize, Serialize};
use std::collections::BinaryHeap;

/// Simulation time in ticks.
pub type Tick = u64;

/// Number of clock cycles.
pub type Cycles = u64;

/// A component that is advanced once per clock cycle.
pub trait Component {
    fn cycle(&mut self, cycle: u64);
}

/// A clock domain with a fixed period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClockDomain {
    pub period: Tick,
}

impl ClockDomain {
    #[must_use]
    pub fn new(period: Tick) -> Self {
        assert!(period > 0, "clock period must be non-zero");
        Self { period }
    }

    /// The tick of the clock edge `cycles` cycles after the next edge at or after `now`.
    #[must_use]
    pub fn clock_edge(&self, now: Tick, cycles: Cycles) -> Tick {
        let next_edge = now.div_ceil(self.period) * self.period;
        next_edge + cycles * self.period
    }

    #[must_use]
    pub fn cycles_to_ticks(&self, cycles: Cycles) -> Tick {
        cycles * self.period
    }

    #[must_use]
    pub fn ticks_to_cycles(&self, ticks: Tick) -> Cycles {
        ticks / self.period
    }
}

/// Host event scheduler.
pub trait Scheduler<E> {
    /// Current simulation tick.
    #[must_use]
    fn cur_tick(&self) -> Tick;

    /// Tick of the clock edge `cycles` cycles from now.
    #[must_use]
    fn clock_edge(&self, cycles: Cycles) -> Tick;

    /// Schedule `event` to fire at tick `when`.
    fn schedule(&mut self, event: E, when: Tick);
}

#[derive(Debug)]
struct Scheduled<E> {
    when: Tick,
    seq: u64,
    event: E,
}

impl<E> PartialEq for Scheduled<E> {
    fn eq(&self, other: &Self) -> bool {
        (self.when, self.seq) == (other.when, other.seq)
    }
}

impl<E> Eq for Scheduled<E> {}

impl<E> PartialOrd for Scheduled<E> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<E> Ord for Scheduled<E> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // reversed: the binary heap is a max heap
        (other.when, other.seq).cmp(&(self.when, self.seq))
    }
}

/// Discrete event queue.
///
/// Events scheduled for the same tick fire in the order they were scheduled.
#[derive(Debug)]
pub struct EventQueue<E> {
    now: Tick,
    seq: u64,
    clock: ClockDomain,
    queue: BinaryHeap<Scheduled<E>>,
}

impl<E> EventQueue<E> {
    #[must_use]
    pub fn new(clock: ClockDomain) -> Self {
        Self {
            now: 0,
            seq: 0,
            clock,
            queue: BinaryHeap::new(),
        }
    }

    #[must_use]
    pub fn now(&self) -> Tick {
        self.now
    }

    #[must_use]
    pub fn clock(&self) -> &ClockDomain {
        &self.clock
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Tick of the next pending event.
    #[must_use]
    pub fn next_tick(&self) -> Option<Tick> {
        self.queue.peek().map(|scheduled| scheduled.when)
    }

    /// Advances time without firing any events.
    pub fn advance_to(&mut self, tick: Tick) {
        assert!(
            tick >= self.now,
            "cannot move time backwards from {} to {}",
            self.now,
            tick
        );
        if let Some(next) = self.next_tick() {
            assert!(
                tick <= next,
                "cannot advance to {tick} past pending event at {next}"
            );
        }
        self.now = tick;
    }

    /// Pops the next event, advancing time to when it fires.
    pub fn pop(&mut self) -> Option<(Tick, E)> {
        let Scheduled { when, event, .. } = self.queue.pop()?;
        self.now = when;
        Some((when, event))
    }

    /// Pops the next event if it fires at or before `until`.
    pub fn pop_due(&mut self, until: Tick) -> Option<(Tick, E)> {
        match self.next_tick() {
            Some(when) if when <= until => self.pop(),
            _ => None,
        }
    }
}

impl<E, T> Scheduler<T> for EventQueue<E>
where
    T: Into<E>,
{
    fn cur_tick(&self) -> Tick {
        self.now
    }

    fn clock_edge(&self, cycles: Cycles) -> Tick {
        self.clock.clock_edge(self.now, cycles)
    }

    fn schedule(&mut self, event: T, when: Tick) {
        assert!(
            when >= self.now,
            "cannot schedule event in the past (when={}, now={})",
            when,
            self.now
        );
        let seq = self.seq;
        self.seq += 1;
        self.queue.push(Scheduled {
            when,
            seq,
            event: event.into(),
        });
    }
}
