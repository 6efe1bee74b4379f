//! In-process fleet simulation
//!
//! Drives one `RecyclingContext` per simulated worker round-robin against a
//! shared `MemoryRegister`, recording signals instead of sending them. Useful
//! for previewing how a given `[min, max)` range staggers recycling.

use crate::config::RecycleConfig;
use crate::identity::{Slot, WorkerId};
use crate::interceptor::RecyclingContext;
use crate::register::{ExitRegister, MemoryRegister};
use crate::signaler::RecordingTerminator;
use crate::threshold::ThresholdGenerator;

use rand::rngs::StdRng;
use rand::SeedableRng;

/// Pids handed to simulated workers start here
pub const FIRST_SIMULATED_PID: u32 = 1000;

/// Largest fleet `simulate_fleet` will build; larger requests are clamped
pub const MAX_SIMULATED_WORKERS: u32 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FleetReport {
    /// Workers sent the recycle signal, in order
    pub signaled: Vec<WorkerId>,
    /// Worker left flagged at the end
    pub pending: Slot,
    /// `(worker, threshold, requests served)` per worker
    pub workers: Vec<(WorkerId, Option<u64>, u64)>,
}

/// Runs `workers` workers for `requests` requests each
///
/// `seed` makes the thresholds reproducible; each worker mixes in its own pid.
/// `workers` is clamped to `MAX_SIMULATED_WORKERS`.
pub fn simulate_fleet(config: &RecycleConfig, workers: u32, requests: u64, seed: u64) -> FleetReport {
    let register = MemoryRegister::new();
    let terminator = RecordingTerminator::new();

    let mut fleet: Vec<_> = (0..workers.min(MAX_SIMULATED_WORKERS))
        .filter_map(|i| FIRST_SIMULATED_PID.checked_add(i).and_then(WorkerId::new))
        .map(|worker| {
            let rng = StdRng::seed_from_u64(seed ^ u64::from(worker.as_u32()));
            RecyclingContext::new(config, worker, register.clone(), terminator.clone())
                .with_threshold_generator(ThresholdGenerator::with_rng(rng))
        })
        .collect();

    for _ in 0..requests {
        for ctx in fleet.iter_mut() {
            ctx.on_request();
        }
    }

    FleetReport {
        signaled: terminator.sent(),
        pending: register.peek().unwrap_or(None),
        workers: fleet
            .iter()
            .map(|ctx| (ctx.worker(), ctx.threshold(), ctx.request_count()))
            .collect(),
    }
}
