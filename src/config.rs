//! Service configuration.
//!
//! Loaded from an optional TOML file; every field has a default so an empty
//! file (or no file at all) yields a working setup.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of workers when nothing else is configured.
pub const DEFAULT_WORKERS: usize = 20;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation failed: {}", .0.join(", "))]
    Validation(Vec<String>),
}

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// FastCGI listen address (e.g., "127.0.0.1:9000").
    pub bind_address: String,

    /// Number of long-lived workers.
    pub workers: usize,

    /// Upper bound on one wait cycle for archive data, in seconds.
    pub read_wait_secs: u64,

    /// Connect timeout towards archive hosts, in seconds.
    pub connect_timeout_secs: u64,

    /// Time allowed for a web server to deliver one complete request.
    pub request_read_timeout_secs: u64,

    /// Default log filter when `RUST_LOG` is not set.
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:9000".to_string(),
            workers: DEFAULT_WORKERS,
            read_wait_secs: 10,
            connect_timeout_secs: 30,
            request_read_timeout_secs: 30,
            log_filter: "zip_streamer=info".to_string(),
        }
    }
}

impl Config {
    /// Load and validate configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges, reporting every problem at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.bind_address.trim().is_empty() {
            errors.push("bind_address must not be empty".to_string());
        }
        if self.workers == 0 {
            errors.push("workers must be at least 1".to_string());
        }
        if self.read_wait_secs == 0 {
            errors.push("read_wait_secs must be greater than 0".to_string());
        }
        if self.connect_timeout_secs == 0 {
            errors.push("connect_timeout_secs must be greater than 0".to_string());
        }
        if self.request_read_timeout_secs == 0 {
            errors.push("request_read_timeout_secs must be greater than 0".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    pub fn read_wait(&self) -> Duration {
        Duration::from_secs(self.read_wait_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_read_timeout(&self) -> Duration {
        Duration::from_secs(self.request_read_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert_eq!(config.workers, 20);
        assert_eq!(config.read_wait(), Duration::from_secs(10));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "workers = 4\nbind_address = \"0.0.0.0:9100\"").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.workers, 4);
        assert_eq!(config.bind_address, "0.0.0.0:9100");
        assert_eq!(config.read_wait_secs, 10);
        assert_eq!(config.log_filter, "zip_streamer=info");
    }

    #[test]
    fn test_validation_reports_every_problem() {
        let config = Config {
            workers: 0,
            read_wait_secs: 0,
            ..Config::default()
        };
        match config.validate() {
            Err(ConfigError::Validation(errors)) => {
                assert_eq!(errors.len(), 2);
                assert!(errors[0].contains("workers"));
                assert!(errors[1].contains("read_wait_secs"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_load_rejects_bad_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "workers = \"many\"").unwrap();
        assert!(matches!(
            Config::load(file.path()),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load(Path::new("/nonexistent/zip-streamer.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/zip-streamer.toml"));
    }
}
