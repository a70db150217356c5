//! Poller configuration
//!
//! Layered with the `config` crate: built-in defaults, then an optional
//! TOML file, then `EV_POLLER__*` environment variables
//! (`EV_POLLER__ADAPTER__DEVICE=/dev/rfcomm1`).

use crate::error::PollerError;
use config::{Config, Environment, File, Source};
use obd_scheduler::{ReconnectPolicy, SchedulerConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;
use vehicle_decoder::VehicleModel;

/// File looked up in the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "ev-poller";
const ENV_PREFIX: &str = "EV_POLLER";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdapterKind {
    /// ELM327 on a serial port or RFCOMM device
    Serial,
    /// In-process adapter answering with sample responses
    Simulated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterConfig {
    pub kind: AdapterKind,
    /// Serial device path
    pub device: String,
    pub baud_rate: u32,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            kind: AdapterKind::Serial,
            device: "/dev/rfcomm0".to_string(),
            baud_rate: 38400,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    pub response_timeout_ms: u64,
    pub max_consecutive_timeouts: u32,
    pub reconnect_policy: ReconnectPolicy,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        let defaults = SchedulerConfig::default();
        Self {
            response_timeout_ms: defaults.response_timeout.as_millis() as u64,
            max_consecutive_timeouts: defaults.max_consecutive_timeouts,
            reconnect_policy: defaults.reconnect_policy,
        }
    }
}

impl SchedulerSettings {
    pub fn to_scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            response_timeout: Duration::from_millis(self.response_timeout_ms),
            max_consecutive_timeouts: self.max_consecutive_timeouts,
            reconnect_policy: self.reconnect_policy,
        }
    }
}

/// Top-level poller configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Vehicle id, e.g. `kia-eniro-64`
    pub vehicle: VehicleModel,
    pub adapter: AdapterConfig,
    pub scheduler: SchedulerSettings,
    /// Period of the scheduler tick
    pub tick_interval_ms: u64,
    /// Wait before reopening a lost adapter link
    pub reconnect_delay_ms: u64,
    /// Log the telemetry snapshot as JSON every N cycles (0 = never)
    pub log_every_cycles: u64,
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            vehicle: VehicleModel::KiaEniro64,
            adapter: AdapterConfig::default(),
            scheduler: SchedulerSettings::default(),
            tick_interval_ms: 10,
            reconnect_delay_ms: 5000,
            log_every_cycles: 10,
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Load defaults, the config file and the environment.
    ///
    /// An explicit `path` must exist; otherwise `ev-poller.toml` in the
    /// working directory is used when present.
    pub fn load(path: Option<&Path>) -> Result<Self, PollerError> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };
        let env = Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true);
        Self::from_sources(file, env)
    }

    fn from_sources<F, E>(file: F, env: E) -> Result<Self, PollerError>
    where
        F: Source + Send + Sync + 'static,
        E: Source + Send + Sync + 'static,
    {
        let config: AppConfig = Config::builder()
            .add_source(Config::try_from(&AppConfig::default())?)
            .add_source(file)
            .add_source(env)
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the poller cannot run with
    pub fn validate(&self) -> Result<(), PollerError> {
        if self.tick_interval_ms == 0 {
            return Err(PollerError::InvalidConfig(
                "tick_interval_ms must be positive".into(),
            ));
        }
        if self.scheduler.response_timeout_ms == 0 {
            return Err(PollerError::InvalidConfig(
                "scheduler.response_timeout_ms must be positive".into(),
            ));
        }
        if self.adapter.kind == AdapterKind::Serial && self.adapter.device.trim().is_empty() {
            return Err(PollerError::InvalidConfig("adapter.device is empty".into()));
        }
        self.level()?;
        Ok(())
    }

    /// Parsed `log_level`
    pub fn level(&self) -> Result<Level, PollerError> {
        Level::from_str(&self.log_level).map_err(|_| {
            PollerError::InvalidConfig(format!("unknown log level {:?}", self.log_level))
        })
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}
