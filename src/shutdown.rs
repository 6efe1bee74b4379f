use nix::sys::signal::Signal;
use once_cell::sync::Lazy;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Global recycle flag (atomic bool)
///
/// Set when this worker receives the recycle signal. The host's request loop
/// should poll it and start its own drain.
static RECYCLE_REQUESTED: Lazy<Arc<AtomicBool>> = Lazy::new(|| Arc::new(AtomicBool::new(false)));

/// Installs the handler for the recycle signal sent by `SignalTerminator`
///
/// This handler is async-signal-safe: it only sets the atomic flag.
///
/// # Errors
/// If the signal cannot be handled (e.g. SIGKILL) or registration fails
pub fn register_recycle_signal(signal: Signal) -> io::Result<()> {
    signal_hook::flag::register(signal as i32, Arc::clone(&RECYCLE_REQUESTED))?;
    Ok(())
}

/// Checks if this worker has been asked to recycle
pub fn is_recycle_requested() -> bool {
    RECYCLE_REQUESTED.load(Ordering::SeqCst)
}

/// Reset the recycle flag (for testing purposes only)
#[cfg(test)]
pub fn reset_recycle_for_tests() {
    RECYCLE_REQUESTED.store(false, Ordering::SeqCst);
}
