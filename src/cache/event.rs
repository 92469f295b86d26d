use crate::Packet;

/// Events the cache schedules for itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Performs the timing access of an accepted request.
    Access { packet: Packet },
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Event::Access { packet } => write!(f, "Access({packet})"),
        }
    }
}
