use crate::identity::WorkerId;
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use std::time::{SystemTime, UNIX_EPOCH};

/// Validated `[min, max)` range for thresholds
///
/// Valid only when both ends are positive and `min <= max`. `min == max`
/// is accepted and means a fixed threshold of exactly `min`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThresholdBounds {
    min: u64,
    max: u64,
}

impl ThresholdBounds {
    pub fn new(min: u64, max: u64) -> Option<Self> {
        if min == 0 || max == 0 || min > max {
            return None;
        }
        Some(ThresholdBounds { min, max })
    }

    pub fn min(&self) -> u64 {
        self.min
    }

    pub fn max(&self) -> u64 {
        self.max
    }

    pub fn is_fixed(&self) -> bool {
        self.min == self.max
    }
}

/// Lazily draws this worker's request ceiling and keeps it for the process lifetime
pub struct ThresholdGenerator {
    rng: Box<dyn RngCore + Send>,
    cached: Option<u64>,
}

impl ThresholdGenerator {
    /// Seeds from wall-clock time mixed with the worker id, so workers
    /// started in the same second still draw different thresholds
    pub fn for_worker(worker: WorkerId) -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        Self::with_rng(StdRng::seed_from_u64(now ^ u64::from(worker.as_u32())))
    }

    /// Uses the given random source (seeded sources make draws reproducible)
    pub fn with_rng<R: RngCore + Send + 'static>(rng: R) -> Self {
        ThresholdGenerator {
            rng: Box::new(rng),
            cached: None,
        }
    }

    /// Returns the threshold, drawing it on the first call only
    ///
    /// Later calls ignore `bounds` and return the cached value.
    pub fn threshold(&mut self, bounds: &ThresholdBounds) -> u64 {
        if let Some(limit) = self.cached {
            return limit;
        }
        let limit = if bounds.is_fixed() {
            bounds.min
        } else {
            self.rng.gen_range(bounds.min..bounds.max)
        };
        self.cached = Some(limit);
        limit
    }

    pub fn cached(&self) -> Option<u64> {
        self.cached
    }
}

impl std::fmt::Debug for ThresholdGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThresholdGenerator")
            .field("cached", &self.cached)
            .finish_non_exhaustive()
    }
}
