use super::address;
use crate::sync::{atomic, Arc};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Memory command of a packet.
///
/// Requests and their responses are distinct commands.
#[derive(
    Debug,
    strum::EnumIter,
    strum::Display,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
)]
pub enum Command {
    ReadReq,
    ReadResp,
    WriteReq,
    WriteResp,
    WritebackDirty,
}

impl Command {
    #[must_use]
    pub fn is_read(self) -> bool {
        matches!(self, Command::ReadReq | Command::ReadResp)
    }

    #[must_use]
    pub fn is_write(self) -> bool {
        matches!(
            self,
            Command::WriteReq | Command::WriteResp | Command::WritebackDirty
        )
    }

    #[must_use]
    pub fn is_request(self) -> bool {
        matches!(
            self,
            Command::ReadReq | Command::WriteReq | Command::WritebackDirty
        )
    }

    #[must_use]
    pub fn is_response(self) -> bool {
        matches!(self, Command::ReadResp | Command::WriteResp)
    }

    #[must_use]
    pub fn needs_response(self) -> bool {
        matches!(self, Command::ReadReq | Command::WriteReq)
    }

    /// The response command of a request command.
    #[must_use]
    pub fn response_command(self) -> Option<Command> {
        match self {
            Command::ReadReq => Some(Command::ReadResp),
            Command::WriteReq => Some(Command::WriteResp),
            Command::ReadResp | Command::WriteResp | Command::WritebackDirty => None,
        }
    }
}

/// A memory request.
///
/// Shared by all packets derived from the same access.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Request {
    /// Requested address.
    pub addr: address,
    /// Requested number of bytes.
    pub size: u32,
    pub flags: u32,
    /// Id of the requestor that issued this access.
    pub context: usize,
}

impl Request {
    #[must_use]
    pub fn new(addr: address, size: u32, flags: u32, context: usize) -> Arc<Self> {
        Arc::new(Self {
            addr,
            size,
            flags,
            context,
        })
    }
}

static PACKET_UID: Lazy<atomic::AtomicU64> = Lazy::new(|| atomic::AtomicU64::new(0));

/// Generate a unique ID that can be used to identify packets
pub fn generate_uid() -> u64 {
    PACKET_UID.fetch_add(1, atomic::Ordering::SeqCst)
}

/// The in-flight unit of work between a requestor and a memory.
#[derive(Clone)]
pub struct Packet {
    pub uid: u64,
    pub req: Arc<Request>,
    addr: address,
    size: u32,
    cmd: Command,
    data: Option<Box<[u8]>>,
}

impl std::fmt::Display for Packet {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "{} [{:#x}:{:#x}]",
            self.cmd,
            self.addr,
            self.addr + u64::from(self.size).saturating_sub(1)
        )
    }
}

impl std::fmt::Debug for Packet {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Packet")
            .field("uid", &self.uid)
            .field("cmd", &self.cmd)
            .field("addr", &format!("{:#x}", self.addr))
            .field("size", &self.size)
            .field("has_data", &self.data.is_some())
            .field("context", &self.req.context)
            .finish()
    }
}

impl Eq for Packet {}

impl PartialEq for Packet {
    fn eq(&self, other: &Self) -> bool {
        self.uid == other.uid
    }
}

impl std::hash::Hash for Packet {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.uid.hash(state);
    }
}

#[derive(Debug, Clone)]
pub struct Builder {
    pub addr: address,
    pub size: u32,
    pub cmd: Command,
    pub context: usize,
    pub data: Option<Vec<u8>>,
}

impl Builder {
    #[must_use]
    pub fn build(self) -> Packet {
        let req = Request::new(self.addr, self.size, 0, self.context);
        let mut packet = Packet::new(req, self.cmd);
        match self.data {
            Some(data) => packet.set_data(&data),
            None => packet.allocate(),
        }
        packet
    }
}

impl From<Builder> for Packet {
    fn from(builder: Builder) -> Self {
        builder.build()
    }
}

impl Packet {
    /// Creates a packet covering the full request.
    #[must_use]
    pub fn new(req: Arc<Request>, cmd: Command) -> Self {
        Self {
            uid: generate_uid(),
            addr: req.addr,
            size: req.size,
            req,
            cmd,
            data: None,
        }
    }

    /// Creates a block sized packet for the block containing the request.
    #[must_use]
    pub fn new_block(req: Arc<Request>, cmd: Command, block_size: u32) -> Self {
        Self {
            uid: generate_uid(),
            addr: crate::block_addr(req.addr, block_size),
            size: block_size,
            req,
            cmd,
            data: None,
        }
    }

    /// Creates a read request with a zeroed payload.
    #[must_use]
    pub fn read(addr: address, size: u32, context: usize) -> Self {
        Builder {
            addr,
            size,
            cmd: Command::ReadReq,
            context,
            data: None,
        }
        .build()
    }

    /// Creates a write request carrying `data`.
    #[must_use]
    pub fn write(addr: address, data: &[u8], context: usize) -> Self {
        let size = data.len() as u32;
        Builder {
            addr,
            size,
            cmd: Command::WriteReq,
            context,
            data: Some(data.to_vec()),
        }
        .build()
    }

    /// Creates a writeback of an evicted block taking ownership of its data.
    #[must_use]
    pub fn writeback(block_addr: address, data: Box<[u8]>) -> Self {
        let block_size = data.len() as u32;
        let req = Request::new(block_addr, block_size, 0, 0);
        let mut packet = Self::new(req, Command::WritebackDirty);
        packet.data_dynamic(data);
        packet
    }

    #[inline]
    #[must_use]
    pub fn addr(&self) -> address {
        self.addr
    }

    #[inline]
    #[must_use]
    pub fn size(&self) -> u32 {
        self.size
    }

    #[inline]
    #[must_use]
    pub fn cmd(&self) -> Command {
        self.cmd
    }

    #[inline]
    #[must_use]
    pub fn block_addr(&self, block_size: u32) -> address {
        crate::block_addr(self.addr, block_size)
    }

    /// Offset of the first accessed byte within its block.
    #[inline]
    #[must_use]
    pub fn offset(&self, block_size: u32) -> usize {
        (self.addr - self.block_addr(block_size)) as usize
    }

    /// Whether the accessed bytes lie within a single block.
    #[must_use]
    pub fn fits_in_block(&self, block_size: u32) -> bool {
        self.offset(block_size) + self.size as usize <= block_size as usize
    }

    #[inline]
    #[must_use]
    pub fn is_read(&self) -> bool {
        self.cmd.is_read()
    }

    #[inline]
    #[must_use]
    pub fn is_write(&self) -> bool {
        self.cmd.is_write()
    }

    #[inline]
    #[must_use]
    pub fn is_response(&self) -> bool {
        self.cmd.is_response()
    }

    #[inline]
    #[must_use]
    pub fn needs_response(&self) -> bool {
        self.cmd.needs_response()
    }

    /// Allocates a zeroed payload of the packet size, if there is none yet.
    pub fn allocate(&mut self) {
        if self.data.is_none() {
            self.data = Some(vec![0; self.size as usize].into_boxed_slice());
        }
    }

    /// Takes ownership of `data` as the payload.
    pub fn data_dynamic(&mut self, data: Box<[u8]>) {
        assert_eq!(
            data.len(),
            self.size as usize,
            "payload size does not match packet {self}"
        );
        self.data = Some(data);
    }

    /// Copies `data` into the payload.
    pub fn set_data(&mut self, data: &[u8]) {
        assert_eq!(
            data.len(),
            self.size as usize,
            "payload size does not match packet {self}"
        );
        self.data = Some(data.into());
    }

    #[must_use]
    pub fn data(&self) -> &[u8] {
        match self.data {
            Some(ref data) => data,
            None => panic!("packet {self} has no data"),
        }
    }

    #[must_use]
    pub fn data_mut(&mut self) -> &mut [u8] {
        if self.data.is_none() {
            panic!("packet {self} has no data");
        }
        self.data.as_deref_mut().unwrap_or_default()
    }

    /// Copies the payload into a full cache block at the intra-block offset.
    pub fn write_data_to_block(&self, block: &mut [u8], block_size: u32) {
        assert_eq!(block.len(), block_size as usize);
        assert!(
            self.fits_in_block(block_size),
            "cannot handle accesses that span multiple cache lines: {self}"
        );
        let offset = self.offset(block_size);
        block[offset..offset + self.size as usize].copy_from_slice(self.data());
    }

    /// Copies bytes from a full cache block into the payload.
    pub fn set_data_from_block(&mut self, block: &[u8], block_size: u32) {
        assert_eq!(block.len(), block_size as usize);
        assert!(
            self.fits_in_block(block_size),
            "cannot handle accesses that span multiple cache lines: {self}"
        );
        let offset = self.offset(block_size);
        let size = self.size as usize;
        self.allocate();
        self.data_mut()
            .copy_from_slice(&block[offset..offset + size]);
    }

    /// Turns this request into its response, keeping the payload.
    pub fn make_response(&mut self) {
        match self.cmd.response_command() {
            Some(cmd) => self.cmd = cmd,
            None => panic!("packet {self} does not need a response"),
        }
    }
}
