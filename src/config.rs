//! Harness configuration.
//!
//! This governs the *test harness* (logging, default timeouts) — it has no
//! bearing on the structure of a compiled [`crate::storage::executable::Executable`],
//! which arrives in-memory from an external front end (see crate docs, §6).

use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};

/// Top-level harness configuration, loadable from file, environment, or
/// built from defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    pub logging: LoggingConfig,
    pub scheduler: SchedulerConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive, e.g. "info" or "cyclesim=debug".
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Default `setTimeout` cycles applied to a fresh access checker; 0 disables it.
    pub default_timeout_cycles: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            default_timeout_cycles: 0,
        }
    }
}

impl SimConfig {
    /// Load configuration from a TOML file, falling back to defaults for any
    /// field the file omits.
    pub fn load_from_file(path: &std::path::Path) -> SimResult<Self> {
        let built = config::Config::builder()
            .add_source(config::File::from(path))
            .build()
            .map_err(|e| SimError::Config(e.to_string()))?;
        built
            .try_deserialize()
            .map_err(|e| SimError::Config(e.to_string()))
    }

    /// Load configuration from `SIMH_*` environment variables, falling back
    /// to defaults for anything unset (e.g. `SIMH_LOGGING__LEVEL=debug`).
    pub fn load_from_env() -> SimResult<Self> {
        let defaults = Self::default();
        let built = config::Config::builder()
            .add_source(config::Config::try_from(&defaults).map_err(|e| SimError::Config(e.to_string()))?)
            .add_source(config::Environment::with_prefix("SIMH").separator("__"))
            .build()
            .map_err(|e| SimError::Config(e.to_string()))?;
        built
            .try_deserialize()
            .map_err(|e| SimError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_sane() {
        let cfg = SimConfig::default();
        assert_eq!(cfg.scheduler.default_timeout_cycles, 0);
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn loads_overrides_from_file() {
        let mut file = tempfile::NamedTempFile::with_suffix(".toml").unwrap();
        writeln!(file, "[logging]\nlevel = \"debug\"\njson = true\n[scheduler]\ndefault_timeout_cycles = 500").unwrap();
        let cfg = SimConfig::load_from_file(file.path()).unwrap();
        assert_eq!(cfg.logging.level, "debug");
        assert!(cfg.logging.json);
        assert_eq!(cfg.scheduler.default_timeout_cycles, 500);
    }

    #[test]
    fn env_overrides_take_precedence() {
        std::env::set_var("SIMH_SCHEDULER__DEFAULT_TIMEOUT_CYCLES", "42");
        let cfg = SimConfig::load_from_env().unwrap();
        assert_eq!(cfg.scheduler.default_timeout_cycles, 42);
        std::env::remove_var("SIMH_SCHEDULER__DEFAULT_TIMEOUT_CYCLES");
    }
}
