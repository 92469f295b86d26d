use crate::address;

/// A resident cache line.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Line {
    /// Block aligned address of the cached data.
    pub tag: address,
    pub data: Box<[u8]>,
    /// Logical time the line was installed.
    pub alloc_time: u64,
    /// Logical time of the last timing access.
    pub last_access_time: u64,
}

impl Line {
    #[must_use]
    pub fn new(tag: address, data: Box<[u8]>, time: u64) -> Self {
        Self {
            tag,
            data,
            alloc_time: time,
            last_access_time: time,
        }
    }
}

impl std::fmt::Debug for Line {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Line")
            .field("tag", &format!("{:#x}", self.tag))
            .field("size", &self.data.len())
            .field("alloc_time", &self.alloc_time)
            .field("last_access_time", &self.last_access_time)
            .finish()
    }
}

impl std::fmt::Display for Line {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Line({:#x})", self.tag)
    }
}
