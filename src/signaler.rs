use crate::error::RecycleError;
use crate::identity::WorkerId;

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::sync::{Arc, Mutex};

/// Requests graceful termination of a worker
///
/// Delivery is best-effort: callers log a failure and move on.
pub trait Terminator {
    fn terminate(&self, target: WorkerId) -> Result<(), RecycleError>;

    /// The signal this terminator sends, for log lines
    fn signal(&self) -> Signal;
}

/// Sends a real signal with `kill(2)`
#[derive(Debug, Clone, Copy)]
pub struct SignalTerminator {
    signal: Signal,
}

impl SignalTerminator {
    pub fn new(signal: Signal) -> Self {
        SignalTerminator { signal }
    }
}

impl Default for SignalTerminator {
    /// SIGQUIT is the graceful shutdown request of the host's workers
    fn default() -> Self {
        SignalTerminator::new(Signal::SIGQUIT)
    }
}

impl Terminator for SignalTerminator {
    fn terminate(&self, target: WorkerId) -> Result<(), RecycleError> {
        // A non-positive pid would address a process group
        let raw = i32::try_from(target.as_u32())
            .ok()
            .filter(|pid| *pid > 0)
            .ok_or(RecycleError::Signal {
                target,
                signal: self.signal,
                source: nix::Error::EINVAL,
            })?;
        signal::kill(Pid::from_raw(raw), self.signal).map_err(|source| RecycleError::Signal {
            target,
            signal: self.signal,
            source,
        })
    }

    fn signal(&self) -> Signal {
        self.signal
    }
}

/// Records termination requests instead of sending them
///
/// Clones share the same record, so a fleet simulation can hand one clone to
/// every worker and inspect the combined order afterwards.
#[derive(Debug, Clone)]
pub struct RecordingTerminator {
    sent: Arc<Mutex<Vec<WorkerId>>>,
    failing: bool,
}

impl RecordingTerminator {
    pub fn new() -> Self {
        RecordingTerminator {
            sent: Arc::new(Mutex::new(Vec::new())),
            failing: false,
        }
    }

    /// A terminator that records the attempt but reports delivery failure
    pub fn failing() -> Self {
        RecordingTerminator {
            failing: true,
            ..Self::new()
        }
    }

    /// Targets in the order they were signalled
    pub fn sent(&self) -> Vec<WorkerId> {
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl Default for RecordingTerminator {
    fn default() -> Self {
        Self::new()
    }
}

impl Terminator for RecordingTerminator {
    fn terminate(&self, target: WorkerId) -> Result<(), RecycleError> {
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(target);
        if self.failing {
            return Err(RecycleError::Signal {
                target,
                signal: self.signal(),
                source: nix::Error::ESRCH,
            });
        }
        Ok(())
    }

    fn signal(&self) -> Signal {
        Signal::SIGQUIT
    }
}
