//! Service configuration loading.
//!
//! The service configuration (`trak.toml`) describes how the process is wired:
//! logging, where the machine settings are persisted, pin assignments, homing
//! safety bounds and simulation parameters. It is distinct from the GRBL
//! machine settings in [`crate::settings`], which are runtime-editable.
//!
//! # Usage
//!
//! ```rust,no_run
//! use trak_common::config::{ConfigLoader, ConfigError, ServiceConfig};
//! use std::path::Path;
//!
//! fn main() -> Result<(), ConfigError> {
//!     let config = ServiceConfig::load(Path::new("trak.toml"))?;
//!     config.validate()?;
//!     println!("Service: {}", config.shared.service_name);
//!     Ok(())
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Service configuration could not be loaded or is inconsistent.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("Service configuration file not found")]
    FileNotFound,

    /// Unreadable file or invalid TOML.
    #[error("Cannot read service configuration: {0}")]
    ParseError(String),

    #[error("Invalid service configuration: {0}")]
    ValidationError(String),
}

/// Default tracing level when `RUST_LOG` is unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Filter directive string understood by `tracing_subscriber::EnvFilter`.
    pub const fn as_directive(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// `[shared]` section: log level and the instance name used in log lines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedConfig {
    #[serde(default)]
    pub log_level: LogLevel,

    #[serde(default = "default_service_name")]
    pub service_name: String,
}

fn default_service_name() -> String {
    "trak-motion".to_string()
}

impl Default for SharedConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            service_name: default_service_name(),
        }
    }
}

impl SharedConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "shared.service_name is blank".to_string(),
            ));
        }
        Ok(())
    }
}

/// Location of the persisted machine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsFileConfig {
    /// Path of the TOML document holding the `$n` table.
    pub path: PathBuf,
}

impl Default for SettingsFileConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("trak_settings.toml"),
        }
    }
}

/// Step, direction and enable pins of one stepper driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisPins {
    pub step: u8,
    pub dir: u8,
    pub enable: u8,
}

/// Hardware pin assignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PinConfig {
    pub left: AxisPins,
    pub right: AxisPins,
    pub z: AxisPins,
    /// Interrupt-capable input for the Z limit switch.
    pub z_limit: u8,
}

impl Default for PinConfig {
    fn default() -> Self {
        Self {
            left: AxisPins { step: 26, dir: 25, enable: 33 },
            right: AxisPins { step: 14, dir: 12, enable: 13 },
            z: AxisPins { step: 17, dir: 16, enable: 4 },
            z_limit: 34,
        }
    }
}

impl PinConfig {
    /// Every assigned pin with a label, in declaration order.
    pub fn assignments(&self) -> [(&'static str, u8); 10] {
        [
            ("left.step", self.left.step),
            ("left.dir", self.left.dir),
            ("left.enable", self.left.enable),
            ("right.step", self.right.step),
            ("right.dir", self.right.dir),
            ("right.enable", self.right.enable),
            ("z.step", self.z.step),
            ("z.dir", self.z.dir),
            ("z.enable", self.z.enable),
            ("z_limit", self.z_limit),
        ]
    }

    /// Reject a pin used by more than one signal.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for (label, pin) in self.assignments() {
            if !seen.insert(pin) {
                return Err(ConfigError::ValidationError(format!(
                    "pin {pin} assigned twice (second use: {label})"
                )));
            }
        }
        Ok(())
    }
}

/// Safety bounds for the homing sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HomingLimitsConfig {
    /// Poll interval while waiting for the limit-switch interrupt [ms].
    pub poll_interval_ms: u64,
    /// Maximum single steps taken to walk off the switch before faulting.
    pub release_step_limit: u32,
    /// Maximum time spent seeking the switch before faulting [ms].
    pub seek_timeout_ms: u64,
}

impl Default for HomingLimitsConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1,
            release_step_limit: 2_000,
            seek_timeout_ms: 120_000,
        }
    }
}

impl HomingLimitsConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "homing.poll_interval_ms must be > 0".to_string(),
            ));
        }
        if self.release_step_limit == 0 {
            return Err(ConfigError::ValidationError(
                "homing.release_step_limit must be > 0".to_string(),
            ));
        }
        if self.seek_timeout_ms < self.poll_interval_ms {
            return Err(ConfigError::ValidationError(
                "homing.seek_timeout_ms must be >= poll_interval_ms".to_string(),
            ));
        }
        Ok(())
    }
}

/// Outbound console channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Maximum queued messages before new ones are dropped.
    pub capacity: usize,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self { capacity: 64 }
    }
}

/// Parameters of the virtual-time simulation driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Z position [steps] at or below which the limit switch reads active.
    pub z_switch_position: i64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            z_switch_position: -2_000,
        }
    }
}

/// Top-level service configuration (`trak.toml`).
///
/// Every section has defaults, so an empty file is a valid configuration.
///
/// ```toml
/// [shared]
/// service_name = "trak-bench-01"
///
/// [settings]
/// path = "/var/lib/trak/settings.toml"
///
/// [homing]
/// poll_interval_ms = 2
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub shared: SharedConfig,
    pub settings: SettingsFileConfig,
    pub pins: PinConfig,
    pub homing: HomingLimitsConfig,
    pub console: ConsoleConfig,
    pub simulation: SimulationConfig,
}

impl ServiceConfig {
    /// Validate every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;
        self.pins.validate()?;
        self.homing.validate()?;
        if self.console.capacity == 0 {
            return Err(ConfigError::ValidationError(
                "console.capacity must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// TOML loading for any deserializable configuration type.
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// A missing file is `FileNotFound`; anything else unreadable is
    /// `ParseError`.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigError::FileNotFound);
            }
            Err(e) => return Err(ConfigError::ParseError(format!("{}: {e}", path.display()))),
        };
        toml::from_str(&text).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}
