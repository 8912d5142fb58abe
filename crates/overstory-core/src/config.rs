//! Ambient watchdog configuration.
//!
//! `config.yaml` itself (the project-level configuration file named in the
//! filesystem layout) is parsed by an external collaborator — this module
//! only owns the thresholds the watchdog needs that aren't literal spec
//! constants, loaded from a separate `.overstory/watchdog.toml`.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Thresholds driving the health evaluator and escalation cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchdogThresholds {
    pub stale_ms: u64,
    pub zombie_ms: u64,
    pub nudge_interval_ms: u64,
    pub tick_interval_ms: u64,
}

impl Default for WatchdogThresholds {
    fn default() -> Self {
        Self {
            stale_ms: 30_000,
            zombie_ms: 120_000,
            nudge_interval_ms: 60_000,
            tick_interval_ms: 15_000,
        }
    }
}

/// Feature flag for the level-2 triage escalation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriageConfig {
    pub enabled: bool,
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self { enabled: false }
    }
}

/// Top-level ambient config document for `.overstory/watchdog.toml`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchdogConfig {
    pub thresholds: WatchdogThresholds,
    pub triage: TriageConfig,
}

impl WatchdogConfig {
    /// Loads the config from `path`, falling back to defaults when the file
    /// is absent. A present-but-malformed file is an error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(contents) => {
                let config = toml::from_str(&contents)?;
                Ok(config)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Toml(#[from] toml::de::Error),
}
