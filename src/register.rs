//! The fleet-wide pending-exit register
//!
//! Every read and write of the slot goes through `transact`, which holds the
//! cross-worker mutex for the whole closure. The coordination protocol relies
//! on that: reading the slot, signalling its occupant and writing the new
//! value must look like one step to every other worker.

use crate::error::RecycleError;
use crate::identity::Slot;
use std::sync::{Arc, Mutex};

/// Shared single-slot register guarded by a mutex visible to all workers
pub trait ExitRegister {
    /// Runs `op` on the slot with the mutex held, persisting any change
    /// before the mutex is released
    fn transact<F, T>(&self, op: F) -> Result<T, RecycleError>
    where
        F: FnOnce(&mut Slot) -> T;

    /// Reads the slot under the mutex
    fn peek(&self) -> Result<Slot, RecycleError> {
        self.transact(|slot| *slot)
    }
}

/// In-process register for fleets simulated with threads
///
/// Clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct MemoryRegister {
    slot: Arc<Mutex<Slot>>,
}

impl MemoryRegister {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ExitRegister for MemoryRegister {
    fn transact<F, T>(&self, op: F) -> Result<T, RecycleError>
    where
        F: FnOnce(&mut Slot) -> T,
    {
        // A panic inside another worker's closure leaves a valid scalar behind
        let mut guard = self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(op(&mut guard))
    }
}
