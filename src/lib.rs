//! Worker Recycling Library
//!
//! Bounds how many requests a worker process serves before it is recycled,
//! and staggers recycling across the fleet so that at most one worker is
//! mid-restart at any time. Coordination goes through a single shared
//! pending-exit slot guarded by a cross-process lock.

pub mod cli;
pub mod config;
pub mod counter;
pub mod error;
pub mod identity;
pub mod interceptor;
pub mod logging;
pub mod register;
pub mod segment;
pub mod shutdown;
pub mod signaler;
pub mod simulate;
pub mod threshold;

pub use config::{parse_config, RecycleConfig};
pub use error::RecycleError;
pub use identity::{Slot, WorkerId};
pub use interceptor::{Disposition, RecyclingContext};
pub use logging::{log, log_event, set_log_file, Severity};
pub use register::{ExitRegister, MemoryRegister};
pub use segment::{default_segment_path, host_instance_id, SegmentOrigin, SharedSegment};
pub use shutdown::{is_recycle_requested, register_recycle_signal};
pub use signaler::{RecordingTerminator, SignalTerminator, Terminator};
pub use threshold::{ThresholdBounds, ThresholdGenerator};

/// Name of the program used for:
/// - Process identification
/// - The shared segment file ($XDG_RUNTIME_DIR/{PROGRAM_NAME}.shm)
pub const PROGRAM_NAME: &str = "bumpylife";

/// Current version of the program (from Cargo.toml)
pub const PROGRAM_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Opens the shared segment and builds this worker's recycling context
///
/// Call once per worker process at startup. The segment path comes from the
/// config, falling back to `default_segment_path()`.
///
/// # Errors
/// Segment allocation failure or an unknown signal name. Both are fatal:
/// recycling cannot run without its shared slot.
pub fn init_worker(
    config: &RecycleConfig,
    host_id: u32,
) -> Result<RecyclingContext<SharedSegment, SignalTerminator>, RecycleError> {
    let terminator = SignalTerminator::new(config.recycle_signal()?);
    let path = config
        .segment_path
        .clone()
        .unwrap_or_else(default_segment_path);
    let segment = SharedSegment::open(&path, host_id)?;
    Ok(RecyclingContext::new(
        config,
        WorkerId::current(),
        segment,
        terminator,
    ))
}
