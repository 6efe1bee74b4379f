use std::io;

use nix::sys::signal::Signal;
use thiserror::Error;

use crate::identity::WorkerId;

/// Errors produced by the recycling subsystem
///
/// Only the startup path (`SharedSegment::open`, config loading) treats these
/// as fatal. The request path logs them and carries on.
#[derive(Debug, Error)]
pub enum RecycleError {
    /// The shared segment could not be created, attached or sized
    #[error("shared segment {path}: {source}")]
    Segment {
        path: String,
        #[source]
        source: io::Error,
    },

    /// `attach_existing` found no initialized region at the path
    #[error("shared segment {path} is not initialized")]
    SegmentUninitialized { path: String },

    /// Acquiring or releasing the cross-worker lock failed
    #[error("failed to lock shared segment: {0}")]
    Lock(#[source] io::Error),

    /// Signal delivery to a flagged worker failed
    #[error("kill({target}, {signal}) failed: {source}")]
    Signal {
        target: WorkerId,
        signal: Signal,
        #[source]
        source: nix::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}
