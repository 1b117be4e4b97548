//! Engine configuration.
//!
//! Configuration is loaded once at startup; a malformed file is a
//! non-recoverable error and the process refuses to start rather than run
//! with guessed settings.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::persist::fs::{DEFAULT_MAX_FILE_SIZE, FsError, bounded_read_json};

/// Errors from loading configuration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// The file could not be read or parsed.
    #[error("malformed configuration at {path}: {source}")]
    Malformed {
        /// The configuration path.
        path: String,
        /// The underlying failure.
        #[source]
        source: FsError,
    },

    /// A value failed validation.
    #[error("invalid configuration: {detail}")]
    Invalid {
        /// What was wrong.
        detail: String,
    },
}

/// Tunable engine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Target below-market tier the value score is computed against.
    pub target_bmv_percent: f64,

    /// Root directory of the document store.
    pub document_root: PathBuf,

    /// Path of the logbook snapshot file.
    pub snapshot_path: PathBuf,

    /// Timeout applied to each source fetch, in seconds.
    pub fetch_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            target_bmv_percent: 15.0,
            document_root: PathBuf::from("data/documents"),
            snapshot_path: PathBuf::from("data/submissions.json"),
            fetch_timeout_secs: 30,
        }
    }
}

impl EngineConfig {
    /// Loads configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::Malformed`] if the file cannot be read or parsed.
    /// - [`ConfigError::Invalid`] if a value fails validation.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config: Self =
            bounded_read_json(path, DEFAULT_MAX_FILE_SIZE).map_err(|source| {
                ConfigError::Malformed {
                    path: path.display().to_string(),
                    source,
                }
            })?;
        config.validate()?;
        Ok(config)
    }

    /// The fetch timeout as a [`Duration`].
    #[must_use]
    pub const fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=100.0).contains(&self.target_bmv_percent) {
            return Err(ConfigError::Invalid {
                detail: format!(
                    "target_bmv_percent must be within 0..=100, got {}",
                    self.target_bmv_percent
                ),
            });
        }
        if self.fetch_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                detail: "fetch_timeout_secs must be positive".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::fs::atomic_write;

    #[test]
    fn defaults_are_valid() {
        assert!(EngineConfig::default().validate().is_ok());
        assert_eq!(EngineConfig::default().target_bmv_percent, 15.0);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        atomic_write(&path, b"{\"target_bmv_percent\": 20.0}").unwrap();
        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.target_bmv_percent, 20.0);
        assert_eq!(config.fetch_timeout_secs, 30);
    }

    #[test]
    fn malformed_file_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        atomic_write(&path, b"not json").unwrap();
        assert!(matches!(
            EngineConfig::load(&path),
            Err(ConfigError::Malformed { .. })
        ));
    }

    #[test]
    fn out_of_range_target_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        atomic_write(&path, b"{\"target_bmv_percent\": 140.0}").unwrap();
        assert!(matches!(
            EngineConfig::load(&path),
            Err(ConfigError::Invalid { .. })
        ));
    }
}
