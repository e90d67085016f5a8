//! Typed Settings Store.

use serde::Serialize;
use tracing::{debug, info};

use super::SettingsError;
use super::backend::SettingsBackend;
use super::table::{SETTINGS, SettingDef, SettingKey, SettingType, SettingValue};

/// One row of a settings listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettingEntry {
    pub key: SettingKey,
    pub value: SettingValue,
    #[serde(rename = "type")]
    pub ty: SettingType,
    pub description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<&'static str>,
}

/// Persistent `$n` key/value table.
///
/// Opening the store guarantees a complete table: when the first-boot
/// sentinel is absent every default is written before the sentinel, so a
/// partial seed is never observed as seeded.
pub struct SettingsStore {
    backend: Box<dyn SettingsBackend>,
}

impl std::fmt::Debug for SettingsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsStore")
            .field("seeded", &self.backend.is_seeded())
            .finish()
    }
}

impl SettingsStore {
    /// Open the store, seeding the default table on first boot.
    pub fn open<B: SettingsBackend + 'static>(backend: B) -> Result<Self, SettingsError> {
        let mut store = Self {
            backend: Box::new(backend),
        };
        if !store.backend.is_seeded() {
            info!("Settings sentinel absent, seeding {} defaults", SETTINGS.len());
            store.write_defaults()?;
            store.backend.mark_seeded()?;
            info!("Settings seeded");
        }
        Ok(store)
    }

    fn write_defaults(&mut self) -> Result<(), SettingsError> {
        for def in SETTINGS.iter() {
            self.backend.store(def.key, def.default.into())?;
        }
        Ok(())
    }

    fn lookup(key: SettingKey) -> Result<&'static SettingDef, SettingsError> {
        key.def()
            .ok_or_else(|| SettingsError::UnknownKey(key.to_string()))
    }

    fn check_type(def: &SettingDef, requested: SettingType) -> Result<(), SettingsError> {
        if def.ty != requested {
            return Err(SettingsError::TypeMismatch {
                key: def.key,
                expected: def.ty,
                requested,
            });
        }
        Ok(())
    }

    /// Read `key` as `ty`.
    ///
    /// # Errors
    /// `ConfigMissing` if the key was never persisted, `TypeMismatch` if
    /// `ty` is not the key's fixed type.
    pub fn get(&self, key: SettingKey, ty: SettingType) -> Result<SettingValue, SettingsError> {
        let def = Self::lookup(key)?;
        Self::check_type(def, ty)?;
        let stored = self
            .backend
            .load(key)?
            .ok_or(SettingsError::ConfigMissing(key))?;
        SettingValue::from_stored(key, ty, stored)
    }

    /// Read `key` with its fixed type.
    pub fn value(&self, key: SettingKey) -> Result<SettingValue, SettingsError> {
        let def = Self::lookup(key)?;
        self.get(key, def.ty)
    }

    /// Persist `value` under `key`.
    ///
    /// # Errors
    /// `TypeMismatch` if `ty` or the value's type differ from the key's
    /// fixed type, `ConfigWriteError` if the commit fails.
    pub fn set(
        &mut self,
        key: SettingKey,
        ty: SettingType,
        value: SettingValue,
    ) -> Result<(), SettingsError> {
        let def = Self::lookup(key)?;
        Self::check_type(def, ty)?;
        Self::check_type(def, value.ty())?;
        if let SettingValue::Float(v) = value {
            if !v.is_finite() {
                return Err(SettingsError::InvalidValue {
                    key,
                    detail: format!("{v} is not finite"),
                });
            }
        }
        self.backend.store(key, value.into())?;
        debug!(%key, %value, "Setting committed");
        Ok(())
    }

    /// Parse operator text according to the key's type and persist it.
    pub fn parse_and_set(&mut self, key: SettingKey, text: &str) -> Result<SettingValue, SettingsError> {
        let def = Self::lookup(key)?;
        let value = SettingValue::parse(key, def.ty, text)?;
        self.set(key, def.ty, value)?;
        info!(%key, %value, "Setting updated");
        Ok(value)
    }

    pub fn float(&self, key: SettingKey) -> Result<f64, SettingsError> {
        match self.get(key, SettingType::Float)? {
            SettingValue::Float(v) => Ok(f64::from(v)),
            other => Err(SettingsError::TypeMismatch {
                key,
                expected: other.ty(),
                requested: SettingType::Float,
            }),
        }
    }

    pub fn int(&self, key: SettingKey) -> Result<i32, SettingsError> {
        match self.get(key, SettingType::Int)? {
            SettingValue::Int(v) => Ok(v),
            other => Err(SettingsError::TypeMismatch {
                key,
                expected: other.ty(),
                requested: SettingType::Int,
            }),
        }
    }

    pub fn flag(&self, key: SettingKey) -> Result<bool, SettingsError> {
        match self.get(key, SettingType::Bool)? {
            SettingValue::Bool(v) => Ok(v),
            other => Err(SettingsError::TypeMismatch {
                key,
                expected: other.ty(),
                requested: SettingType::Bool,
            }),
        }
    }

    /// Numeric view of any key regardless of type.
    pub fn number(&self, key: SettingKey) -> Result<f64, SettingsError> {
        self.value(key).map(|v| v.as_f64())
    }

    /// Every table entry with its current value, in table order.
    pub fn list(&self) -> Result<Vec<SettingEntry>, SettingsError> {
        SETTINGS
            .iter()
            .map(|def| {
                Ok(SettingEntry {
                    key: def.key,
                    value: self.get(def.key, def.ty)?,
                    ty: def.ty,
                    description: def.description,
                    unit: def.unit,
                })
            })
            .collect()
    }

    /// Overwrite every key with its default.
    pub fn reset_defaults(&mut self) -> Result<(), SettingsError> {
        info!("Resetting all settings to defaults");
        self.write_defaults()
    }

    pub fn is_seeded(&self) -> bool {
        self.backend.is_seeded()
    }
}
