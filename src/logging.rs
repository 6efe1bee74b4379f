use chrono::Local;
use once_cell::sync::Lazy;
use std::fmt;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Mutex;

/// Global log file path protected by Mutex
///
/// Thread-safe storage for optional log file path.
/// When None, logs go to stdout.
pub static LOG_FILE: Lazy<Mutex<Option<String>>> = Lazy::new(|| Mutex::new(None));

/// Severity of a log event, in increasing order of urgency
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Debug,
    Info,
    /// Normal but significant, e.g. a worker being flagged for exit
    Notice,
    Warn,
    /// Needs attention, e.g. a recycle signal that could not be delivered
    Alert,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Notice => "NOTICE",
            Severity::Warn => "WARN",
            Severity::Alert => "ALERT",
        };
        f.write_str(tag)
    }
}

/// Logs an informational message with timestamp to configured output
///
/// # Example
/// ```text
/// // log("Attached to shared segment").unwrap();
/// ```
pub fn log(message: &str) -> io::Result<()> {
    log_event(Severity::Info, message)
}

/// Logs a message with timestamp, severity and the current process id
///
/// Every worker in a fleet appends to the same file, so the pid prefix is
/// what tells their lines apart.
///
/// # Returns
/// * `io::Result<()>` - Ok on success, Err if writing fails
///
/// # Example
/// ```text
/// // log_event(Severity::Notice, "worker flagged for exit").unwrap();
/// ```
pub fn log_event(severity: Severity, message: &str) -> io::Result<()> {
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let log_message = format!(
        "{} [{}] [P{}] {}\n",
        timestamp,
        severity,
        std::process::id(),
        message
    );

    let target = LOG_FILE
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    match &*target {
        Some(log_file) => {
            // O_APPEND keeps concurrent writers from interleaving within a line
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(log_file)?;
            file.write_all(log_message.as_bytes())?;
        }
        None => {
            print!("{}", log_message);
        }
    }

    Ok(())
}

/// Sets the path for the log file
///
/// Subsequent calls to the log functions will append to this file.
pub fn set_log_file<P: AsRef<Path>>(path: P) {
    let path_str = path.as_ref().to_string_lossy().into_owned();
    *LOG_FILE
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(path_str);
}
