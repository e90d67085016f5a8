//! GRBL-style machine settings.
//!
//! This module provides:
//! - [`table`] - the fixed `$n` key table (type, description, unit, default)
//! - [`backend`] - persistence backends (`FileBackend`, `MemoryBackend`)
//! - [`store`] - the typed `SettingsStore` with first-boot seeding
//! - [`machine`] - a typed `MachineSettings` snapshot used by motion math
//!
//! Every key has a fixed type (int, short, bool or float). Reads and writes
//! with the wrong type are rejected rather than coerced.

pub mod backend;
pub mod machine;
pub mod store;
pub mod table;

use parking_lot::RwLock;
use std::sync::Arc;
use thiserror::Error;

pub use backend::{FileBackend, MemoryBackend, SettingsBackend, StoredValue};
pub use machine::{AxisSettings, HomingSettings, MachineSettings, SpindleSettings};
pub use store::{SettingEntry, SettingsStore};
pub use table::{SETTINGS, SettingDef, SettingKey, SettingType, SettingValue};

/// Settings store shared between the motion coordinator, homing and the
/// command surface. Writers take the lock exclusively; commands run to
/// completion one at a time.
pub type SharedSettings = Arc<RwLock<SettingsStore>>;

/// Wrap a store for sharing.
pub fn shared(store: SettingsStore) -> SharedSettings {
    Arc::new(RwLock::new(store))
}

/// Error types for Settings Store operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SettingsError {
    /// Key absent from the persistence layer.
    #[error("Setting {0} is missing")]
    ConfigMissing(SettingKey),

    /// Motion-relevant key holds zero (or a non-finite value).
    #[error("Setting {0} must be non-zero")]
    ZeroValue(SettingKey),

    /// Key is not part of the settings table.
    #[error("Unknown setting key: {0}")]
    UnknownKey(String),

    /// Requested type differs from the key's fixed type.
    #[error("Setting {key} is of type {expected}, not {requested}")]
    TypeMismatch {
        key: SettingKey,
        expected: SettingType,
        requested: SettingType,
    },

    /// Value could not be parsed or is out of range for its type.
    #[error("Invalid value for {key}: {detail}")]
    InvalidValue { key: SettingKey, detail: String },

    /// Persistence commit failed.
    #[error("Failed to persist settings: {0}")]
    ConfigWriteError(String),

    /// Persistence layer could not be read.
    #[error("Settings storage error: {0}")]
    Storage(String),
}
