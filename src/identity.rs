use std::fmt;

/// Identifier of one worker process in the fleet (its OS pid)
///
/// `0` is reserved: the shared slot stores it to mean "nobody is flagged".
/// Values above `i32::MAX` are not pids; `kill(2)` would read them as a
/// process group (or, for `u32::MAX`, as every process).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerId(u32);

/// Contents of the pending-exit register: the flagged worker, if any
pub type Slot = Option<WorkerId>;

impl WorkerId {
    /// Largest value accepted as a pid
    pub const MAX: u32 = i32::MAX as u32;

    /// Wraps a raw pid. Returns `None` for `0` and for anything above `MAX`.
    pub fn new(pid: u32) -> Option<Self> {
        if pid == 0 || pid > Self::MAX {
            None
        } else {
            Some(WorkerId(pid))
        }
    }

    /// The calling process
    pub fn current() -> Self {
        WorkerId(std::process::id())
    }

    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Encodes a slot the way the shared segment stores it
pub fn slot_to_raw(slot: Slot) -> u32 {
    slot.map(WorkerId::as_u32).unwrap_or(0)
}

/// Decodes a stored slot value (`0` = none)
pub fn slot_from_raw(raw: u32) -> Slot {
    WorkerId::new(raw)
}
