//! Per-request hook and the fleet-wide coordination protocol
//!
//! Each worker owns one `RecyclingContext`. Once the worker's request count
//! passes its threshold, it takes the shared mutex once and, in that single
//! critical section:
//!
//! 1. signals the worker currently in the slot (if any, and not itself),
//! 2. clears the slot,
//! 3. registers itself as the new flagged worker and sets its exiting flag.
//!
//! A flagged worker is therefore terminated by the *next* worker to reach its
//! threshold, which keeps at most one worker mid-restart at a time.

use crate::config::RecycleConfig;
use crate::counter::RequestCounter;
use crate::error::RecycleError;
use crate::identity::WorkerId;
use crate::logging::{log_event, Severity};
use crate::register::ExitRegister;
use crate::signaler::Terminator;
use crate::threshold::{ThresholdBounds, ThresholdGenerator};

/// What the host should do with the request after the hook ran
///
/// The hook never rejects or delays a request, so this is always `Continue`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Continue,
}

/// Outcome of one pass through the coordination protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Transition {
    /// Previously flagged worker that was sent the recycle signal
    pub signaled: Option<WorkerId>,
    /// Delivery to `signaled` failed; the slot was cleared regardless
    pub signal_failed: bool,
    /// Whether this worker took the slot
    pub registered: bool,
}

/// Recycling state of one worker process
pub struct RecyclingContext<R, T> {
    worker: WorkerId,
    enabled: bool,
    bounds: Option<ThresholdBounds>,
    counter: RequestCounter,
    threshold: ThresholdGenerator,
    exiting: bool,
    register: R,
    terminator: T,
}

impl<R: ExitRegister, T: Terminator> RecyclingContext<R, T> {
    /// Builds the context for `worker`; construct it once per process
    pub fn new(config: &RecycleConfig, worker: WorkerId, register: R, terminator: T) -> Self {
        RecyclingContext {
            worker,
            enabled: config.enable,
            bounds: config.bounds(),
            counter: RequestCounter::new(),
            threshold: ThresholdGenerator::for_worker(worker),
            exiting: false,
            register,
            terminator,
        }
    }

    /// Replaces the random source used for the threshold draw
    pub fn with_threshold_generator(mut self, threshold: ThresholdGenerator) -> Self {
        self.threshold = threshold;
        self
    }

    /// Request hook. Runs synchronously and always lets the request through.
    pub fn on_request(&mut self) -> Disposition {
        if !self.enabled {
            return Disposition::Continue;
        }
        let Some(bounds) = self.bounds else {
            return Disposition::Continue;
        };

        let count = self.counter.increment();
        if self.exiting {
            return Disposition::Continue;
        }
        let limit = self.threshold.threshold(&bounds);
        if count <= limit {
            return Disposition::Continue;
        }

        if let Err(e) = self.coordinate(count, limit) {
            let _ = log_event(
                Severity::Alert,
                &format!("worker {} could not update the pending exit slot: {}", self.worker, e),
            );
        }

        Disposition::Continue
    }

    fn coordinate(&mut self, count: u64, limit: u64) -> Result<Transition, RecycleError> {
        let me = self.worker;
        let exiting = self.exiting;
        let terminator = &self.terminator;

        let (transition, signal_error) = self.register.transact(|slot| {
            let mut signaled = None;
            let mut signal_error = None;
            if let Some(flagged) = *slot {
                // The slot can only name us after pid reuse across a reload
                if flagged != me {
                    signal_error = terminator.terminate(flagged).err();
                    signaled = Some(flagged);
                }
                *slot = None;
            }

            let mut registered = false;
            if slot.is_none() && !exiting {
                *slot = Some(me);
                registered = true;
            }
            let transition = Transition {
                signaled,
                signal_failed: signal_error.is_some(),
                registered,
            };
            (transition, signal_error)
        })?;

        // Logged only after the fleet-wide lock is released
        if let (Some(flagged), Some(e)) = (transition.signaled, signal_error) {
            let _ = log_event(
                Severity::Alert,
                &format!(
                    "worker {} failed to send {} to worker {}: {}",
                    me,
                    self.terminator.signal(),
                    flagged,
                    e
                ),
            );
        }

        if transition.registered {
            self.exiting = true;
            let _ = log_event(
                Severity::Notice,
                &format!(
                    "the count of requests to be processed exceeded the limit: pid -> {}, count -> {}, limit -> {}",
                    me, count, limit
                ),
            );
        }

        Ok(transition)
    }

    pub fn worker(&self) -> WorkerId {
        self.worker
    }

    pub fn request_count(&self) -> u64 {
        self.counter.get()
    }

    /// The drawn threshold; `None` until the first counted request
    pub fn threshold(&self) -> Option<u64> {
        self.threshold.cached()
    }

    /// Once true, this worker takes no further part in the protocol
    pub fn is_exiting(&self) -> bool {
        self.exiting
    }

    pub fn register(&self) -> &R {
        &self.register
    }

    pub fn terminator(&self) -> &T {
        &self.terminator
    }
}
