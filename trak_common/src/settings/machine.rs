//! Typed snapshot of the motion-relevant settings.

use serde::Serialize;

use super::SettingsError;
use super::store::SettingsStore;
use super::table::SettingKey;
use crate::axis::Axis;

/// Per-axis kinematic settings (`$10x`, `$11x`, `$12x`, `$13x`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AxisSettings {
    /// [steps/mm]
    pub steps_per_mm: f64,
    /// [mm/min]
    pub max_rate: f64,
    /// [mm/s²]
    pub acceleration: f64,
    /// [mm]
    pub max_travel: f64,
}

impl AxisSettings {
    fn load(store: &SettingsStore, axis: Axis) -> Result<Self, SettingsError> {
        Ok(Self {
            steps_per_mm: store.float(SettingKey::steps_per_mm(axis))?,
            max_rate: store.float(SettingKey::max_rate(axis))?,
            acceleration: store.float(SettingKey::acceleration(axis))?,
            max_travel: store.float(SettingKey::max_travel(axis))?,
        })
    }

    /// Reject zero, negative or non-finite kinematic values.
    pub fn require_motion(&self, axis: Axis) -> Result<(), SettingsError> {
        require_positive(SettingKey::steps_per_mm(axis), self.steps_per_mm)?;
        require_positive(SettingKey::max_rate(axis), self.max_rate)?;
        require_positive(SettingKey::acceleration(axis), self.acceleration)?;
        require_positive(SettingKey::max_travel(axis), self.max_travel)
    }

    /// Soft travel limit in steps.
    pub fn max_travel_steps(&self) -> f64 {
        self.max_travel * self.steps_per_mm
    }
}

/// Homing cycle settings (`$22`, `$24`..`$27`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HomingSettings {
    pub enabled: bool,
    /// Locate feed [mm/min].
    pub feed: f64,
    /// Seek rate [mm/min].
    pub seek: f64,
    pub debounce_ms: u64,
    /// [mm]
    pub pull_off: f64,
}

/// Spindle/laser settings (`$30`..`$32`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SpindleSettings {
    pub max_rpm: i32,
    pub min_rpm: i32,
    pub laser_mode: bool,
}

/// Settings consumed by motion math, read in one pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MachineSettings {
    pub axes: [AxisSettings; 3],
    pub homing: HomingSettings,
    pub spindle: SpindleSettings,
    pub soft_limits: bool,
    pub hard_limits: bool,
}

impl MachineSettings {
    /// Read the snapshot. Missing keys surface as `ConfigMissing`.
    pub fn load(store: &SettingsStore) -> Result<Self, SettingsError> {
        let debounce = store.int(SettingKey::HOMING_DEBOUNCE_MS)?;
        Ok(Self {
            axes: [
                AxisSettings::load(store, Axis::Left)?,
                AxisSettings::load(store, Axis::Right)?,
                AxisSettings::load(store, Axis::Z)?,
            ],
            homing: HomingSettings {
                enabled: store.flag(SettingKey::HOMING_ENABLE)?,
                feed: store.float(SettingKey::HOMING_FEED)?,
                seek: store.float(SettingKey::HOMING_SEEK)?,
                debounce_ms: u64::try_from(debounce).map_err(|_| SettingsError::InvalidValue {
                    key: SettingKey::HOMING_DEBOUNCE_MS,
                    detail: format!("{debounce} is negative"),
                })?,
                pull_off: store.float(SettingKey::HOMING_PULL_OFF)?,
            },
            spindle: SpindleSettings {
                max_rpm: store.int(SettingKey::SPINDLE_MAX_RPM)?,
                min_rpm: store.int(SettingKey::SPINDLE_MIN_RPM)?,
                laser_mode: store.flag(SettingKey::LASER_MODE)?,
            },
            soft_limits: store.flag(SettingKey::SOFT_LIMITS)?,
            hard_limits: store.flag(SettingKey::HARD_LIMITS)?,
        })
    }

    #[inline]
    pub fn axis(&self, axis: Axis) -> &AxisSettings {
        &self.axes[axis.index()]
    }

    /// Every motion key (`$24`..`$27`, `$100`..`$132`) must be non-zero.
    pub fn validate_motion(&self) -> Result<(), SettingsError> {
        for axis in Axis::ALL {
            self.axis(axis).require_motion(axis)?;
        }
        require_positive(SettingKey::HOMING_FEED, self.homing.feed)?;
        require_positive(SettingKey::HOMING_SEEK, self.homing.seek)?;
        if self.homing.debounce_ms == 0 {
            return Err(SettingsError::ZeroValue(SettingKey::HOMING_DEBOUNCE_MS));
        }
        require_positive(SettingKey::HOMING_PULL_OFF, self.homing.pull_off)
    }
}

fn require_positive(key: SettingKey, value: f64) -> Result<(), SettingsError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(SettingsError::ZeroValue(key))
    }
}
