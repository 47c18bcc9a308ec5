//! Configuration module
//!
//! TOML-based configuration with defaults for every field, so an absent or
//! partial file still yields a working setup.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::charging::ChargingRateUnit;

/// Root smart charging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SmartChargingConfig {
    /// Limits reported when no profile imposes one
    #[serde(default)]
    pub limits: DefaultLimitsConfig,

    /// Durable profile storage
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Composite schedule calculation
    #[serde(default)]
    pub composer: ComposerConfig,

    /// Logging
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Fallback charging limits per rate unit.
///
/// A composite schedule segment with no applicable profile is reported with
/// these values; they should match what the hardware enforces unmanaged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultLimitsConfig {
    /// Fallback limit for schedules requested in Amps
    #[serde(default = "default_limit_amps")]
    pub default_limit_amps: f64,

    /// Fallback limit for schedules requested in Watts
    #[serde(default = "default_limit_watts")]
    pub default_limit_watts: f64,
}

impl DefaultLimitsConfig {
    pub fn fallback_for(&self, unit: ChargingRateUnit) -> f64 {
        match unit {
            ChargingRateUnit::Amps => self.default_limit_amps,
            ChargingRateUnit::Watts => self.default_limit_watts,
        }
    }
}

/// Profile persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Directory holding the profile records
    #[serde(default = "default_profile_dir")]
    pub profile_dir: PathBuf,
}

/// Composite schedule calculation settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ComposerConfig {
    /// Calculation budget in milliseconds; absent means unbounded
    #[serde(default)]
    pub deadline_ms: Option<u64>,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Tracing filter directive (e.g. "info", "gridwell_charging=debug")
    #[serde(default = "default_log_level")]
    pub level: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

impl SmartChargingConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }

    /// Loads `path`, falling back to defaults when the file is absent.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(ConfigError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(Self::default())
            }
            Err(e) => Err(e),
        }
    }
}

fn default_limit_amps() -> f64 {
    48.0
}

fn default_limit_watts() -> f64 {
    33120.0
}

fn default_profile_dir() -> PathBuf {
    PathBuf::from("data/charging_profiles")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for DefaultLimitsConfig {
    fn default() -> Self {
        Self {
            default_limit_amps: default_limit_amps(),
            default_limit_watts: default_limit_watts(),
        }
    }
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            profile_dir: default_profile_dir(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}
