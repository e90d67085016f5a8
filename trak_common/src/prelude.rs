//! Prelude module for convenient imports.
//!
//! ```rust
//! use trak_common::prelude::*;
//! ```

pub use crate::axis::Axis;
pub use crate::command::{DepthRequest, DirectionCode, DriveRequest, SpindleRequest};
pub use crate::config::{ConfigError, ConfigLoader, LogLevel, ServiceConfig, SharedConfig};
pub use crate::console::{ConsoleMessage, Severity};
pub use crate::settings::{
    MachineSettings, SettingKey, SettingType, SettingValue, SettingsError, SettingsStore,
    SharedSettings,
};
