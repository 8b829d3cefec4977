use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::service::{FaultConfig, DEFAULT_DELAY, DEFAULT_FAILURE_RATE};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {message} (got '{value}')")]
    InvalidEnv { name: String, message: String, value: String },

    #[error("Invalid failure rate: must be 0.0-1.0, got {0}")]
    InvalidFailureRate(f64),
}

/// Runtime settings, read from the environment and optionally overridden by
/// command-line flags.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Directory holding one JSON file per storage key.
    pub dir: PathBuf,
    pub faults: FaultConfig,
    /// `tracing` filter directive.
    pub log_filter: String,
}

impl Config {
    /// Builds the configuration from environment variables.
    ///
    /// - `TASKMASTER_DIR`: storage directory (default `~/.local/share/taskmaster` on Linux).
    /// - `TASKMASTER_DELAY_MS`: simulated latency (default 500).
    /// - `TASKMASTER_FAILURE_RATE`: injected failure probability (default 0.1).
    /// - `TASKMASTER_SEED`: seed for the failure roll.
    /// - `TASKMASTER_LOG`: log filter (default `warn`).
    pub fn from_env() -> Result<Config, ConfigError> {
        let dir = std::env::var("TASKMASTER_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_dir());
        let delay = match env_parse::<u64>("TASKMASTER_DELAY_MS")? {
            Some(ms) => Duration::from_millis(ms),
            None => DEFAULT_DELAY,
        };
        let faults = FaultConfig {
            delay,
            failure_rate: env_parse("TASKMASTER_FAILURE_RATE")?.unwrap_or(DEFAULT_FAILURE_RATE),
            seed: env_parse("TASKMASTER_SEED")?,
        };
        faults.validate()?;
        Ok(Config {
            dir,
            faults,
            log_filter: std::env::var("TASKMASTER_LOG").unwrap_or_else(|_| "warn".to_string()),
        })
    }

    /// Applies command-line overrides on top of the environment values.
    pub fn with_overrides(
        mut self,
        dir: Option<PathBuf>,
        delay_ms: Option<u64>,
        failure_rate: Option<f64>,
        seed: Option<u64>,
    ) -> Result<Config, ConfigError> {
        if let Some(d) = dir {
            self.dir = d;
        }
        if let Some(ms) = delay_ms {
            self.faults.delay = Duration::from_millis(ms);
        }
        if let Some(rate) = failure_rate {
            self.faults.failure_rate = rate;
        }
        if seed.is_some() {
            self.faults.seed = seed;
        }
        self.faults.validate()?;
        Ok(self)
    }

    pub fn log_path(&self) -> PathBuf {
        self.dir.join("taskmaster.log")
    }
}

fn default_dir() -> PathBuf {
    let mut p = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    p.push("taskmaster");
    p
}

fn env_parse<T>(name: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(value) => value.trim().parse().map(Some).map_err(|e: T::Err| ConfigError::InvalidEnv {
            name: name.to_string(),
            message: e.to_string(),
            value,
        }),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(ConfigError::InvalidEnv {
            name: name.to_string(),
            message: e.to_string(),
            value: String::new(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Config {
        Config {
            dir: PathBuf::from("/tmp/taskmaster"),
            faults: FaultConfig::default(),
            log_filter: "warn".into(),
        }
    }

    #[test]
    fn test_overrides_replace_env_values() {
        let config = base()
            .with_overrides(Some("/srv/tasks".into()), Some(0), Some(0.0), Some(7))
            .unwrap();
        assert_eq!(config.dir, PathBuf::from("/srv/tasks"));
        assert_eq!(config.faults.delay, Duration::ZERO);
        assert_eq!(config.faults.failure_rate, 0.0);
        assert_eq!(config.faults.seed, Some(7));
        assert_eq!(config.log_path(), PathBuf::from("/srv/tasks/taskmaster.log"));
    }

    #[test]
    fn test_failure_rate_out_of_range_is_rejected() {
        let err = base().with_overrides(None, None, Some(1.5), None).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidFailureRate(r) if r == 1.5));
    }

    #[test]
    fn test_no_overrides_keeps_defaults() {
        let config = base().with_overrides(None, None, None, None).unwrap();
        assert_eq!(config, base());
    }
}
