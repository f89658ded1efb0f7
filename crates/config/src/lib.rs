use miette::{miette, Diagnostic, Result, WrapErr};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use std::{fs, io};
use thiserror::Error;

const DEFAULT_COUNT_PAUSE_MS: u64 = 100;
const DEFAULT_HEARTBEAT_PAUSE_MS: u64 = 1000;
const MAX_PAUSE_MS: u64 = 60_000;

/// How the orchestrator stops the heartbeat once both counters are done.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StopStrategy {
    /// Clear the heartbeat's cooperative flag and let it notice on its own.
    Flag,
    /// Cancel the heartbeat's context, cutting its current pause short.
    #[default]
    Cancel,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub count_pause_ms: u64,
    pub heartbeat_pause_ms: u64,
    pub stop: StopStrategy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            count_pause_ms: DEFAULT_COUNT_PAUSE_MS,
            heartbeat_pause_ms: DEFAULT_HEARTBEAT_PAUSE_MS,
            stop: StopStrategy::default(),
        }
    }
}

impl Config {
    #[tracing::instrument]
    pub fn validate(&self) -> Result<()> {
        validate_pause(self.count_pause_ms).wrap_err("Count pause validation error")?;
        validate_pause(self.heartbeat_pause_ms).wrap_err("Heartbeat pause validation error")?;
        Ok(())
    }

    #[tracing::instrument]
    pub fn read(path: &Path) -> Result<Config> {
        let mut file = fs::OpenOptions::new()
            .read(true)
            .open(path)
            .map_err(Error::from)
            .wrap_err_with(|| format!("Failed to open config file '{}'", path.display()))?;

        let content = &mut String::new();
        file.read_to_string(content).map_err(Error::from)?;

        let config: Config = serde_json::from_str(content).map_err(Error::from)?;

        config.validate()?;
        tracing::debug!("Loaded config: {config:?}");

        Ok(config)
    }

    pub fn count_pause(&self) -> Duration {
        Duration::from_millis(self.count_pause_ms)
    }

    pub fn heartbeat_pause(&self) -> Duration {
        Duration::from_millis(self.heartbeat_pause_ms)
    }
}

#[tracing::instrument]
pub fn validate_pause(pause_ms: u64) -> Result<()> {
    if !(1..=MAX_PAUSE_MS).contains(&pause_ms) {
        return Err(miette!("Pause must be between 1 and {MAX_PAUSE_MS} milliseconds")
            .wrap_err(Error::ValidationError));
    }
    Ok(())
}

#[derive(Diagnostic, Debug, Error)]
#[diagnostic(code(config::config_error))]
pub enum Error {
    #[error("validation error")]
    ValidationError,

    #[error(transparent)]
    IoError(#[from] io::Error),

    #[error(transparent)]
    SerdeError(#[from] serde_json::Error),
}
