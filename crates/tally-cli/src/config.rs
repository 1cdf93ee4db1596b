//! Configuration file loading
//!
//! A config file is TOML with an optional `[simulator]` table and an
//! optional `[counter]` table:
//!
//! ```toml
//! [simulator]
//! seed = 7
//! threads = 16
//! ops_per_thread = 5000
//! mode = "guarded"
//!
//! [counter]
//! label = "cats_alive"
//! overflow = "saturate"
//! ```
//!
//! Command-line flags win over file values.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tally_core::CounterConfig;
use tally_harness::{CounterMode, SimulatorConfig};

/// Errors while loading a configuration file
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File is not valid TOML for this schema
    #[error("invalid config in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Contents of a config file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Simulator settings
    pub simulator: SimulatorConfig,
    /// Counter settings; replaces `simulator.counter` when present
    pub counter: Option<CounterConfig>,
}

impl FileConfig {
    /// Parse TOML text
    ///
    /// # Errors
    /// `ConfigError::Parse` with `origin` as the reported path.
    pub fn from_toml(text: &str, origin: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.into(),
            source,
        })
    }

    /// Merge with command-line overrides into the final simulator config
    #[must_use]
    pub fn into_simulator(self, overrides: &SimulateOverrides) -> SimulatorConfig {
        let mut config = self.simulator;
        if let Some(counter) = self.counter {
            config.counter = counter;
        }
        if let Some(seed) = overrides.seed {
            config.seed = seed;
        }
        if let Some(threads) = overrides.threads {
            config.threads = threads;
        }
        if let Some(ops) = overrides.ops_per_thread {
            config.ops_per_thread = ops;
        }
        if let Some(dwell_us) = overrides.dwell_us {
            config.dwell_us = dwell_us;
        }
        if overrides.unguarded {
            config.mode = CounterMode::Unguarded;
        }
        if overrides.stop_on_violation {
            config.stop_on_first_violation = true;
        }
        config
    }
}

/// Simulator flags given on the command line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimulateOverrides {
    /// `--seed`
    pub seed: Option<u64>,
    /// `--threads`
    pub threads: Option<usize>,
    /// `--ops`
    pub ops_per_thread: Option<u64>,
    /// `--dwell-us`
    pub dwell_us: Option<u64>,
    /// `--unguarded`
    pub unguarded: bool,
    /// `--stop-on-violation`
    pub stop_on_violation: bool,
}

/// Read and parse a config file
///
/// # Errors
/// `ConfigError::Io` if the file cannot be read, `ConfigError::Parse` if
/// it is not valid.
pub fn load_config(path: &Path) -> Result<FileConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config = FileConfig::from_toml(&text, path)?;
    tracing::debug!(path = %path.display(), "loaded config file");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::OverflowPolicy;

    #[test]
    fn empty_file_is_default() {
        let config = FileConfig::from_toml("", "empty.toml").unwrap();
        assert_eq!(config, FileConfig::default());
    }

    #[test]
    fn counter_table_replaces_simulator_counter() {
        let text = r#"
            [simulator]
            threads = 3

            [counter]
            label = "cats"
            overflow = "wrap"
        "#;
        let merged = FileConfig::from_toml(text, "t.toml")
            .unwrap()
            .into_simulator(&SimulateOverrides::default());
        assert_eq!(merged.threads, 3);
        assert_eq!(merged.counter.label, "cats");
        assert_eq!(merged.counter.overflow, OverflowPolicy::Wrap);
    }

    #[test]
    fn flags_override_file() {
        let text = "[simulator]\nseed = 1\nthreads = 2\n";
        let overrides = SimulateOverrides {
            seed: Some(99),
            unguarded: true,
            ..SimulateOverrides::default()
        };
        let merged = FileConfig::from_toml(text, "t.toml")
            .unwrap()
            .into_simulator(&overrides);
        assert_eq!(merged.seed, 99);
        assert_eq!(merged.threads, 2);
        assert_eq!(merged.mode, CounterMode::Unguarded);
    }

    #[test]
    fn unknown_mode_is_parse_error() {
        let err = FileConfig::from_toml("[simulator]\nmode = \"sideways\"\n", "bad.toml")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("bad.toml"));
    }
}
