//! Scripted requestors driving the cache from a trace.

use crate::engine::{ClockDomain, Component, Tick};
use crate::fifo::Fifo;
use crate::interconn::ResponseTransport;
use crate::sync::{Arc, Mutex};
use crate::{address, Packet};
use color_eyre::eyre::{self, WrapErr};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessKind {
    Read,
    Write,
}

/// A single access of a trace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Access {
    pub kind: AccessKind,
    pub addr: address,
    /// Number of bytes, defaults to the length of `data`.
    #[serde(default)]
    pub size: Option<u32>,
    /// Bytes to write, zero when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<u8>>,
}

impl Access {
    #[must_use]
    pub fn read(addr: address, size: u32) -> Self {
        Self {
            kind: AccessKind::Read,
            addr,
            size: Some(size),
            data: None,
        }
    }

    #[must_use]
    pub fn write(addr: address, data: impl Into<Vec<u8>>) -> Self {
        let data = data.into();
        Self {
            kind: AccessKind::Write,
            addr,
            size: Some(data.len() as u32),
            data: Some(data),
        }
    }

    #[must_use]
    pub fn size(&self) -> u32 {
        self.size
            .or_else(|| self.data.as_ref().map(|data| data.len() as u32))
            .unwrap_or(0)
    }

    /// Builds the request packet for this access.
    #[must_use]
    pub fn to_packet(&self, context: usize) -> Packet {
        let size = self.size();
        match self.kind {
            AccessKind::Read => Packet::read(self.addr, size, context),
            AccessKind::Write => {
                let mut data = self.data.clone().unwrap_or_default();
                data.resize(size as usize, 0);
                Packet::write(self.addr, &data, context)
            }
        }
    }

    fn validate(&self) -> eyre::Result<()> {
        if self.size() == 0 {
            eyre::bail!("access {self:?} has no size");
        }
        if let (AccessKind::Read, Some(_)) = (self.kind, &self.data) {
            eyre::bail!("read access {self:?} cannot carry data");
        }
        if let Some(ref data) = self.data {
            if data.len() > self.size() as usize {
                eyre::bail!("access {self:?} carries more data than its size");
            }
        }
        Ok(())
    }
}

impl std::fmt::Display for Access {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({:#x}, {})", self.kind, self.addr, self.size())
    }
}

/// Accesses issued by one requestor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitiatorTrace {
    /// Number of responses to refuse before accepting any.
    #[serde(default)]
    pub refuse_responses: usize,
    pub accesses: Vec<Access>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trace {
    pub initiators: Vec<InitiatorTrace>,
}

impl Trace {
    pub fn from_yaml_str(yaml: &str) -> eyre::Result<Self> {
        let trace: Self = serde_yaml::from_str(yaml)?;
        trace.validate()?;
        Ok(trace)
    }

    pub fn from_json_str(json: &str) -> eyre::Result<Self> {
        let trace: Self = serde_json::from_str(json)?;
        trace.validate()?;
        Ok(trace)
    }

    /// Parses a trace file, as JSON if it has a `.json` extension and as YAML otherwise.
    pub fn from_file(path: impl AsRef<Path>) -> eyre::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read trace {}", path.display()))?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let trace = if is_json {
            Self::from_json_str(&content)
        } else {
            Self::from_yaml_str(&content)
        };
        trace.wrap_err_with(|| format!("invalid trace {}", path.display()))
    }

    fn validate(&self) -> eyre::Result<()> {
        for access in self.initiators.iter().flat_map(|init| &init.accesses) {
            access.validate()?;
        }
        Ok(())
    }
}

/// A completed access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Completion {
    pub access: Access,
    /// Tick the request was first offered.
    pub issued: Tick,
    /// Tick the request was accepted.
    pub accepted: Tick,
    /// Tick the response arrived.
    pub responded: Tick,
    /// Response payload.
    pub data: Vec<u8>,
}

/// State shared between an initiator and the transport the cache sends on.
#[derive(Debug, Default)]
struct Link {
    responses: Fifo<Packet>,
    refuse_responses: usize,
    num_refused_responses: usize,
    retry_req: bool,
    resp_retry_pending: bool,
    num_retries: usize,
    num_range_changes: usize,
}

/// Response transport of a [`TraceInitiator`].
#[derive(Debug, Clone)]
pub struct InitiatorPort {
    name: String,
    link: Arc<Mutex<Link>>,
}

impl ResponseTransport for InitiatorPort {
    fn send_timing_resp(&mut self, packet: Packet) -> Result<(), Packet> {
        let mut link = self.link.lock();
        if link.refuse_responses > 0 {
            link.refuse_responses -= 1;
            link.num_refused_responses += 1;
            link.resp_retry_pending = true;
            log::debug!("{}: refusing response {}", self.name, packet);
            return Err(packet);
        }
        link.responses.enqueue(packet);
        Ok(())
    }

    fn send_retry_req(&mut self) {
        let mut link = self.link.lock();
        link.retry_req = true;
        link.num_retries += 1;
    }

    fn send_range_change(&mut self) {
        self.link.lock().num_range_changes += 1;
    }
}

#[derive(Debug)]
struct Outstanding {
    access: Access,
    issued: Tick,
    accepted: Option<Tick>,
}

/// Issues the accesses of a trace one at a time.
///
/// The next access is offered only after the response of the previous one
/// arrived. A refused request is offered again once the cache sends a retry.
#[derive(Debug)]
pub struct TraceInitiator {
    name: String,
    id: usize,
    clock: ClockDomain,
    now: Tick,
    accesses: VecDeque<Access>,
    outstanding: Option<Outstanding>,
    refused: Option<Packet>,
    num_refused_requests: usize,
    link: Arc<Mutex<Link>>,
    completions: Vec<Completion>,
}

impl TraceInitiator {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        id: usize,
        clock: ClockDomain,
        trace: InitiatorTrace,
    ) -> Self {
        let link = Link {
            refuse_responses: trace.refuse_responses,
            ..Link::default()
        };
        Self {
            name: name.into(),
            id,
            clock,
            now: 0,
            accesses: trace.accesses.into(),
            outstanding: None,
            refused: None,
            num_refused_requests: 0,
            link: Arc::new(Mutex::new(link)),
            completions: Vec::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> usize {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Transport for the cpu side port this initiator is connected to.
    #[must_use]
    pub fn port(&self) -> Box<dyn ResponseTransport> {
        Box::new(InitiatorPort {
            name: self.name.clone(),
            link: Arc::clone(&self.link),
        })
    }

    /// Whether every access completed.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.accesses.is_empty() && self.outstanding.is_none() && self.refused.is_none()
    }

    #[must_use]
    pub fn completions(&self) -> &[Completion] {
        &self.completions
    }

    #[must_use]
    pub fn num_refused_requests(&self) -> usize {
        self.num_refused_requests
    }

    #[must_use]
    pub fn num_retries(&self) -> usize {
        self.link.lock().num_retries
    }

    #[must_use]
    pub fn num_refused_responses(&self) -> usize {
        self.link.lock().num_refused_responses
    }

    #[must_use]
    pub fn num_range_changes(&self) -> usize {
        self.link.lock().num_range_changes
    }

    /// Whether a refused response should be retried now.
    pub fn take_resp_retry(&mut self) -> bool {
        std::mem::take(&mut self.link.lock().resp_retry_pending)
    }

    /// Offers the next request through `send`, if one is due.
    pub fn try_issue<F>(&mut self, send: F)
    where
        F: FnOnce(Packet) -> Result<(), Packet>,
    {
        if self
            .outstanding
            .as_ref()
            .is_some_and(|outstanding| outstanding.accepted.is_some())
        {
            return;
        }
        let packet = match self.refused.take() {
            Some(packet) => {
                let mut link = self.link.lock();
                if !link.retry_req {
                    drop(link);
                    self.refused = Some(packet);
                    return;
                }
                link.retry_req = false;
                packet
            }
            None => {
                let Some(access) = self.accesses.pop_front() else {
                    return;
                };
                let packet = access.to_packet(self.id);
                self.outstanding = Some(Outstanding {
                    access,
                    issued: self.now,
                    accepted: None,
                });
                packet
            }
        };

        log::debug!("{}: issuing {} at {}", self.name, packet, self.now);
        match send(packet) {
            Ok(()) => {
                if let Some(outstanding) = self.outstanding.as_mut() {
                    outstanding.accepted = Some(self.now);
                }
            }
            Err(packet) => {
                log::debug!("{}: {} refused", self.name, packet);
                self.num_refused_requests += 1;
                self.refused = Some(packet);
            }
        }
    }

    fn recv_response(&mut self, packet: Packet) {
        assert!(
            packet.is_response(),
            "{}: {packet} is not a response",
            self.name
        );
        let Some(Outstanding {
            access,
            issued,
            accepted: Some(accepted),
        }) = self.outstanding.take()
        else {
            panic!("{}: unexpected response {packet}", self.name);
        };
        assert_eq!(
            packet.req.context, self.id,
            "{}: response {packet} belongs to another requestor",
            self.name
        );
        log::debug!(
            "{}: completed {} at {}: {}",
            self.name,
            access,
            self.now,
            crate::hex_dump(packet.data())
        );
        self.completions.push(Completion {
            access,
            issued,
            accepted,
            responded: self.now,
            data: packet.data().to_vec(),
        });
    }
}

impl Component for TraceInitiator {
    fn cycle(&mut self, cycle: u64) {
        self.now = self.clock.cycles_to_ticks(cycle);
        loop {
            let response = self.link.lock().responses.dequeue();
            match response {
                Some(packet) => self.recv_response(packet),
                None => break,
            }
        }
    }
}
