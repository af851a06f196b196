//! Configuration file support for the kiosk.
//!
//! Configuration is loaded once at startup from
//! `$XDG_CONFIG_HOME/presence-kiosk/config.toml` and is immutable afterwards.
//! The `[device]` section has no defaults: a missing or invalid device
//! section aborts the process before it serves any scan.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    pub device: DeviceConfig,

    #[serde(default)]
    pub serial: SerialConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub gate: GateConfig,

    #[serde(default)]
    pub source: SourceConfig,
}

/// Per-device identity and timing rules
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceConfig {
    pub location: String,

    /// Minimum seconds between accepted re-scans of the same token
    pub scan_cooldown: u64,

    /// Seconds a check-in stays valid before the next scan checks out
    pub stay_duration: u64,

    /// Device-local zone as minutes east of UTC; host zone when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utc_offset_minutes: Option<i32>,
}

/// Serial channel parameters
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SerialConfig {
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_reconnect_interval_secs")]
    pub reconnect_interval_secs: u64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: default_baud_rate(),
            timeout_ms: default_timeout_ms(),
            reconnect_interval_secs: default_reconnect_interval_secs(),
        }
    }
}

impl SerialConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_secs(self.reconnect_interval_secs)
    }
}

/// Durable store configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,

    /// Number of most recent records replayed at startup
    #[serde(default = "default_replay_window")]
    pub replay_window: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            replay_window: default_replay_window(),
        }
    }
}

/// Device-wide admission gate
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GateConfig {
    #[serde(default = "default_admission_interval_secs")]
    pub admission_interval_secs: u64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            admission_interval_secs: default_admission_interval_secs(),
        }
    }
}

impl GateConfig {
    pub fn admission_interval(&self) -> Duration {
        Duration::from_secs(self.admission_interval_secs)
    }
}

/// Token source hand-off parameters
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    #[serde(default = "default_idle_sleep_ms")]
    pub idle_sleep_ms: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            idle_sleep_ms: default_idle_sleep_ms(),
        }
    }
}

impl SourceConfig {
    pub fn idle_sleep(&self) -> Duration {
        Duration::from_millis(self.idle_sleep_ms)
    }
}

// Default value functions
fn default_baud_rate() -> u32 {
    115_200
}

fn default_timeout_ms() -> u64 {
    1_000
}

fn default_reconnect_interval_secs() -> u64 {
    2
}

fn default_store_path() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    base.join("presence-kiosk").join("qr_log.json")
}

fn default_replay_window() -> usize {
    800
}

fn default_admission_interval_secs() -> u64 {
    2
}

fn default_queue_capacity() -> usize {
    64
}

fn default_idle_sleep_ms() -> u64 {
    10
}

impl Config {
    /// Build a config around a device section, everything else defaulted
    pub fn for_device(device: DeviceConfig) -> Self {
        Self {
            device,
            serial: SerialConfig::default(),
            store: StoreConfig::default(),
            gate: GateConfig::default(),
            source: SourceConfig::default(),
        }
    }

    /// Load and validate configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Cannot read config file {:?}: {}", path, e))
        })?;
        let config = Self::parse(&contents)?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Parse and validate configuration text
    pub fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        for warning in config.warnings() {
            tracing::warn!("{}", warning);
        }
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        base.join("presence-kiosk").join("config.toml")
    }

    /// Reject configurations the kiosk cannot serve with
    pub fn validate(&self) -> Result<()> {
        if self.device.location.trim().is_empty() {
            return Err(Error::Config("device.location must not be empty".into()));
        }
        if self.device.stay_duration == 0 {
            return Err(Error::Config("device.stay_duration must be positive".into()));
        }
        if let Some(offset) = self.device.utc_offset_minutes {
            if offset.abs() >= 24 * 60 {
                return Err(Error::Config(format!(
                    "device.utc_offset_minutes out of range: {}",
                    offset
                )));
            }
        }
        if self.store.replay_window == 0 {
            return Err(Error::Config("store.replay_window must be positive".into()));
        }
        if self.source.queue_capacity == 0 {
            return Err(Error::Config("source.queue_capacity must be positive".into()));
        }
        Ok(())
    }

    /// Accepted but suspicious settings
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        let device = &self.device;
        // The wait window and the too-soon window overlap here; first match wins.
        if device.scan_cooldown.saturating_mul(2) >= device.stay_duration {
            warnings.push(format!(
                "scan_cooldown ({}s) is at least half of stay_duration ({}s); \
                 re-check-in can never happen and too-soon shadows the wait window",
                device.scan_cooldown, device.stay_duration
            ));
        }
        warnings
    }
}
