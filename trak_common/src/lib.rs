//! Trak Common Library
//!
//! Shared types and leaf dependencies for all trak workspace crates.
//!
//! # Module Structure
//!
//! - [`config`] - Service configuration loading (`trak.toml`)
//! - [`settings`] - GRBL-style `$n` machine settings and the persistent Settings Store
//! - [`axis`] - Physical axis identifiers
//! - [`command`] - Typed inbound motion commands
//! - [`console`] - Console notification message types
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use trak_common::settings::{MemoryBackend, SettingKey, SettingsStore};
//!
//! let store = SettingsStore::open(MemoryBackend::new()).unwrap();
//! assert_eq!(store.float(SettingKey::STEPS_PER_MM_Z).unwrap(), 250.0);
//! ```

pub mod axis;
pub mod command;
pub mod config;
pub mod console;
pub mod prelude;
pub mod settings;
