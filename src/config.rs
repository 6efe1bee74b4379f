use crate::error::RecycleError;
use crate::threshold::ThresholdBounds;

use nix::sys::signal::Signal;
use serde::Deserialize;
use std::fs;
use std::str::FromStr;

fn default_signal() -> String {
    "SIGQUIT".to_string()
}

/// Worker recycling parameters
///
/// Directive parsing belongs to the host; this is the already-parsed surface.
/// Out-of-range `min`/`max` are not rejected here: the interceptor simply
/// stays inactive (see `is_active`).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RecycleConfig {
    /// Master switch (JSON field: enable, default false)
    #[serde(default)]
    pub enable: bool,
    /// Lower bound of the per-worker request threshold (JSON field: min)
    #[serde(default)]
    pub min: u64,
    /// Upper bound, exclusive unless equal to `min` (JSON field: max)
    #[serde(default)]
    pub max: u64,
    /// Signal sent to recycle a worker (JSON field: signal, default "SIGQUIT")
    #[serde(default = "default_signal")]
    pub signal: String,
    /// Shared segment location (JSON field: segment_path)
    #[serde(default)]
    pub segment_path: Option<String>,
}

impl Default for RecycleConfig {
    fn default() -> Self {
        RecycleConfig {
            enable: false,
            min: 0,
            max: 0,
            signal: default_signal(),
            segment_path: None,
        }
    }
}

impl RecycleConfig {
    /// Threshold range, or `None` if `min`/`max` are zero or inverted
    pub fn bounds(&self) -> Option<ThresholdBounds> {
        ThresholdBounds::new(self.min, self.max)
    }

    /// True when the interceptor will do anything at all
    pub fn is_active(&self) -> bool {
        self.enable && self.bounds().is_some()
    }

    pub fn recycle_signal(&self) -> Result<Signal, RecycleError> {
        Signal::from_str(self.signal.trim())
            .map_err(|_| RecycleError::Config(format!("unknown signal name {:?}", self.signal)))
    }

    /// Strict startup check for hosts that prefer failing loudly
    ///
    /// The interceptor never calls this; an invalid range there silently
    /// disables recycling.
    pub fn validate_strict(&self) -> Result<(), RecycleError> {
        if self.min == 0 || self.max == 0 {
            return Err(RecycleError::Config(format!(
                "min and max must be positive (min = {}, max = {})",
                self.min, self.max
            )));
        }
        if self.min > self.max {
            return Err(RecycleError::Config(format!(
                "min ({}) must not exceed max ({})",
                self.min, self.max
            )));
        }
        self.recycle_signal().map(|_| ())
    }
}

/// Parses a JSON configuration file
///
/// Lines starting with `#` are treated as comments and dropped before parsing.
///
/// # Errors
/// - File not found or unreadable
/// - Invalid JSON
/// - Unknown signal name
///
/// # Example
/// ```text
/// // let config = parse_config("/etc/bumpylife.json")?;
/// ```
pub fn parse_config(filename: &str) -> Result<RecycleConfig, RecycleError> {
    let raw = fs::read_to_string(filename)?;
    let body: String = raw
        .lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .collect::<Vec<_>>()
        .join("\n");

    let config: RecycleConfig = serde_json::from_str(&body)
        .map_err(|e| RecycleError::Config(format!("invalid JSON in {}: {}", filename, e)))?;

    config.recycle_signal()?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn write_config(contents: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempdir().unwrap();
        let mut config_path = PathBuf::from(dir.path());
        config_path.push("bumpylife.json");
        let mut file = File::create(&config_path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        (dir, config_path)
    }

    #[test]
    fn test_parse_config() {
        let (_dir, path) = write_config(
            r#"# recycle workers every 1000-2000 requests
{"enable": true, "min": 1000, "max": 2000, "signal": "SIGTERM", "segment_path": "/run/bumpylife.shm"}"#,
        );

        let config = parse_config(path.to_str().unwrap()).unwrap();
        assert_eq!(
            config,
            RecycleConfig {
                enable: true,
                min: 1000,
                max: 2000,
                signal: "SIGTERM".to_string(),
                segment_path: Some("/run/bumpylife.shm".to_string()),
            }
        );
        assert!(config.is_active());
        assert_eq!(config.recycle_signal().unwrap(), Signal::SIGTERM);
    }

    #[test]
    fn test_parse_config_defaults() {
        let (_dir, path) = write_config("{}");
        let config = parse_config(path.to_str().unwrap()).unwrap();
        assert_eq!(config, RecycleConfig::default());
        assert!(!config.is_active());
        assert_eq!(config.recycle_signal().unwrap(), Signal::SIGQUIT);
    }

    #[test]
    fn test_parse_config_invalid_json() {
        let (_dir, path) = write_config(r#"{"enable": tru"#);
        let result = parse_config(path.to_str().unwrap());
        assert!(matches!(result, Err(RecycleError::Config(_))));
    }

    #[test]
    fn test_parse_config_unknown_signal() {
        let (_dir, path) = write_config(r#"{"enable": true, "min": 1, "max": 2, "signal": "SIGNOPE"}"#);
        let result = parse_config(path.to_str().unwrap());
        assert!(matches!(result, Err(RecycleError::Config(_))));
    }

    #[test]
    fn test_invalid_bounds_fail_open() {
        for (min, max) in [(0, 10), (10, 0), (0, 0), (20, 10)] {
            let config = RecycleConfig {
                enable: true,
                min,
                max,
                ..RecycleConfig::default()
            };
            assert!(config.bounds().is_none());
            assert!(!config.is_active());
            assert!(config.validate_strict().is_err());
        }
    }

    #[test]
    fn test_equal_bounds_are_valid() {
        let config = RecycleConfig {
            enable: true,
            min: 100,
            max: 100,
            ..RecycleConfig::default()
        };
        assert!(config.is_active());
        assert!(config.validate_strict().is_ok());
    }

    #[test]
    fn test_disabled_config_is_inactive() {
        let config = RecycleConfig {
            enable: false,
            min: 100,
            max: 200,
            ..RecycleConfig::default()
        };
        assert!(config.bounds().is_some());
        assert!(!config.is_active());
    }
}
