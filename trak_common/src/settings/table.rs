//! The `$n` settings table.

use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use super::SettingsError;
use super::backend::StoredValue;
use crate::axis::Axis;

/// GRBL-style setting key (`$n`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SettingKey(u16);

impl SettingKey {
    pub const STEP_PULSE_US: Self = Self(0);
    pub const STEP_IDLE_DELAY_MS: Self = Self(1);
    pub const STEP_PULSE_INVERT: Self = Self(2);
    pub const STEP_DIR_INVERT: Self = Self(3);
    pub const INVERT_STEP_ENABLE: Self = Self(4);
    pub const INVERT_LIMIT_PINS: Self = Self(5);
    pub const INVERT_PROBE_PIN: Self = Self(6);
    pub const STATUS_REPORT_MASK: Self = Self(10);
    pub const JUNCTION_DEVIATION: Self = Self(11);
    pub const ARC_TOLERANCE: Self = Self(12);
    pub const REPORT_INCHES: Self = Self(13);
    pub const SOFT_LIMITS: Self = Self(20);
    pub const HARD_LIMITS: Self = Self(21);
    pub const HOMING_ENABLE: Self = Self(22);
    pub const HOMING_DIR_INVERT: Self = Self(23);
    pub const HOMING_FEED: Self = Self(24);
    pub const HOMING_SEEK: Self = Self(25);
    pub const HOMING_DEBOUNCE_MS: Self = Self(26);
    pub const HOMING_PULL_OFF: Self = Self(27);
    pub const SPINDLE_MAX_RPM: Self = Self(30);
    pub const SPINDLE_MIN_RPM: Self = Self(31);
    pub const LASER_MODE: Self = Self(32);
    pub const STEPS_PER_MM_X: Self = Self(100);
    pub const STEPS_PER_MM_Y: Self = Self(101);
    pub const STEPS_PER_MM_Z: Self = Self(102);
    pub const MAX_RATE_X: Self = Self(110);
    pub const MAX_RATE_Y: Self = Self(111);
    pub const MAX_RATE_Z: Self = Self(112);
    pub const ACCELERATION_X: Self = Self(120);
    pub const ACCELERATION_Y: Self = Self(121);
    pub const ACCELERATION_Z: Self = Self(122);
    pub const MAX_TRAVEL_X: Self = Self(130);
    pub const MAX_TRAVEL_Y: Self = Self(131);
    pub const MAX_TRAVEL_Z: Self = Self(132);

    #[inline]
    pub const fn number(self) -> u16 {
        self.0
    }

    #[inline]
    pub const fn steps_per_mm(axis: Axis) -> Self {
        Self(100 + axis as u16)
    }

    #[inline]
    pub const fn max_rate(axis: Axis) -> Self {
        Self(110 + axis as u16)
    }

    #[inline]
    pub const fn acceleration(axis: Axis) -> Self {
        Self(120 + axis as u16)
    }

    #[inline]
    pub const fn max_travel(axis: Axis) -> Self {
        Self(130 + axis as u16)
    }

    /// Table entry for this key.
    pub fn def(self) -> Option<&'static SettingDef> {
        SETTINGS.iter().find(|d| d.key == self)
    }
}

impl fmt::Display for SettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}", self.0)
    }
}

impl FromStr for SettingKey {
    type Err = SettingsError;

    /// Accepts `"$100"` or `"100"`; the key must exist in the table.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed.strip_prefix('$').unwrap_or(trimmed);
        let key = digits
            .parse::<u16>()
            .map(SettingKey)
            .map_err(|_| SettingsError::UnknownKey(trimmed.to_string()))?;
        match key.def() {
            Some(_) => Ok(key),
            None => Err(SettingsError::UnknownKey(trimmed.to_string())),
        }
    }
}

impl Serialize for SettingKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Fixed storage type of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SettingType {
    Int,
    Short,
    Bool,
    Float,
}

impl fmt::Display for SettingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Int => "int",
            Self::Short => "short",
            Self::Bool => "bool",
            Self::Float => "float",
        })
    }
}

/// Typed setting value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SettingValue {
    Int(i32),
    Short(i16),
    Bool(bool),
    Float(f32),
}

impl SettingValue {
    pub const fn ty(&self) -> SettingType {
        match self {
            Self::Int(_) => SettingType::Int,
            Self::Short(_) => SettingType::Short,
            Self::Bool(_) => SettingType::Bool,
            Self::Float(_) => SettingType::Float,
        }
    }

    /// Numeric view (bools map to 0/1).
    pub fn as_f64(&self) -> f64 {
        match *self {
            Self::Int(v) => f64::from(v),
            Self::Short(v) => f64::from(v),
            Self::Bool(v) => f64::from(u8::from(v)),
            Self::Float(v) => f64::from(v),
        }
    }

    /// Parse operator input according to the key's fixed type.
    pub fn parse(key: SettingKey, ty: SettingType, text: &str) -> Result<Self, SettingsError> {
        let text = text.trim();
        let invalid = |detail: String| SettingsError::InvalidValue { key, detail };
        match ty {
            SettingType::Int => text
                .parse::<i32>()
                .map(Self::Int)
                .map_err(|e| invalid(format!("'{text}' is not an int: {e}"))),
            SettingType::Short => {
                let wide = text
                    .parse::<i64>()
                    .map_err(|e| invalid(format!("'{text}' is not an integer: {e}")))?;
                i16::try_from(wide)
                    .map(Self::Short)
                    .map_err(|_| invalid(format!("{wide} is out of range for short")))
            }
            SettingType::Bool => match text.to_ascii_lowercase().as_str() {
                "1" | "true" | "on" => Ok(Self::Bool(true)),
                "0" | "false" | "off" => Ok(Self::Bool(false)),
                _ => Err(invalid(format!("'{text}' is not a bool"))),
            },
            SettingType::Float => {
                let v = text
                    .parse::<f32>()
                    .map_err(|e| invalid(format!("'{text}' is not a float: {e}")))?;
                if v.is_finite() {
                    Ok(Self::Float(v))
                } else {
                    Err(invalid(format!("'{text}' is not finite")))
                }
            }
        }
    }

    /// Decode a persisted value for a key of type `ty`.
    pub fn from_stored(
        key: SettingKey,
        ty: SettingType,
        stored: StoredValue,
    ) -> Result<Self, SettingsError> {
        let corrupt = || SettingsError::InvalidValue {
            key,
            detail: format!("stored value {stored:?} does not fit type {ty}"),
        };
        match (ty, stored) {
            (SettingType::Int, StoredValue::Integer(v)) => {
                i32::try_from(v).map(Self::Int).map_err(|_| corrupt())
            }
            (SettingType::Short, StoredValue::Integer(v)) => {
                i16::try_from(v).map(Self::Short).map_err(|_| corrupt())
            }
            (SettingType::Bool, StoredValue::Bool(v)) => Ok(Self::Bool(v)),
            (SettingType::Bool, StoredValue::Integer(0)) => Ok(Self::Bool(false)),
            (SettingType::Bool, StoredValue::Integer(1)) => Ok(Self::Bool(true)),
            (SettingType::Float, StoredValue::Float(v)) => Ok(Self::Float(v as f32)),
            (SettingType::Float, StoredValue::Integer(v)) => Ok(Self::Float(v as f32)),
            _ => Err(corrupt()),
        }
    }
}

impl From<SettingValue> for StoredValue {
    fn from(value: SettingValue) -> Self {
        match value {
            SettingValue::Int(v) => StoredValue::Integer(i64::from(v)),
            SettingValue::Short(v) => StoredValue::Integer(i64::from(v)),
            SettingValue::Bool(v) => StoredValue::Bool(v),
            SettingValue::Float(v) => StoredValue::Float(f64::from(v)),
        }
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Short(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{}", u8::from(*v)),
            Self::Float(v) => write!(f, "{v:.3}"),
        }
    }
}

/// One row of the settings table.
#[derive(Debug, Clone, Copy)]
pub struct SettingDef {
    pub key: SettingKey,
    pub ty: SettingType,
    pub description: &'static str,
    pub unit: Option<&'static str>,
    pub default: SettingValue,
}

const fn def(
    key: SettingKey,
    description: &'static str,
    unit: Option<&'static str>,
    default: SettingValue,
) -> SettingDef {
    SettingDef {
        key,
        ty: default.ty(),
        description,
        unit,
        default,
    }
}

use SettingValue::{Bool, Float, Int, Short};

/// Complete settings table, seeded on first boot.
pub static SETTINGS: [SettingDef; 34] = [
    def(SettingKey::STEP_PULSE_US, "Step pulse time in microseconds", Some("µs"), Int(10)),
    def(SettingKey::STEP_IDLE_DELAY_MS, "Step idle delay in milliseconds", Some("ms"), Int(25)),
    def(SettingKey::STEP_PULSE_INVERT, "Step pulse invert mask", None, Short(0)),
    def(SettingKey::STEP_DIR_INVERT, "Step direction invert mask", None, Short(0)),
    def(SettingKey::INVERT_STEP_ENABLE, "Invert step enable pin", None, Bool(false)),
    def(SettingKey::INVERT_LIMIT_PINS, "Invert limit pins", None, Bool(false)),
    def(SettingKey::INVERT_PROBE_PIN, "Invert probe pin", None, Bool(false)),
    def(SettingKey::STATUS_REPORT_MASK, "Status report options mask", None, Short(1)),
    def(SettingKey::JUNCTION_DEVIATION, "Junction deviation in millimeters", Some("mm"), Float(0.010)),
    def(SettingKey::ARC_TOLERANCE, "Arc tolerance in millimeters", Some("mm"), Float(0.002)),
    def(SettingKey::REPORT_INCHES, "Report in inches", None, Bool(false)),
    def(SettingKey::SOFT_LIMITS, "Soft limits enabled", None, Bool(false)),
    def(SettingKey::HARD_LIMITS, "Hard limits enabled", None, Bool(false)),
    def(SettingKey::HOMING_ENABLE, "Homing cycle enabled", None, Bool(true)),
    def(SettingKey::HOMING_DIR_INVERT, "Homing direction invert mask", None, Short(0)),
    def(SettingKey::HOMING_FEED, "Homing feed rate in mm/min", Some("mm/min"), Float(25.0)),
    def(SettingKey::HOMING_SEEK, "Homing seek rate in mm/min", Some("mm/min"), Float(500.0)),
    def(SettingKey::HOMING_DEBOUNCE_MS, "Homing debounce delay in milliseconds", Some("ms"), Int(250)),
    def(SettingKey::HOMING_PULL_OFF, "Homing pull-off in millimeters", Some("mm"), Float(1.0)),
    def(SettingKey::SPINDLE_MAX_RPM, "Maximum spindle speed in RPM", Some("RPM"), Int(1000)),
    def(SettingKey::SPINDLE_MIN_RPM, "Minimum spindle speed in RPM", Some("RPM"), Int(0)),
    def(SettingKey::LASER_MODE, "Laser mode enabled", None, Bool(false)),
    def(SettingKey::STEPS_PER_MM_X, "X-axis steps per millimeter", Some("steps/mm"), Float(250.0)),
    def(SettingKey::STEPS_PER_MM_Y, "Y-axis steps per millimeter", Some("steps/mm"), Float(250.0)),
    def(SettingKey::STEPS_PER_MM_Z, "Z-axis steps per millimeter", Some("steps/mm"), Float(250.0)),
    def(SettingKey::MAX_RATE_X, "X-axis maximum rate in mm/min", Some("mm/min"), Float(500.0)),
    def(SettingKey::MAX_RATE_Y, "Y-axis maximum rate in mm/min", Some("mm/min"), Float(500.0)),
    def(SettingKey::MAX_RATE_Z, "Z-axis maximum rate in mm/min", Some("mm/min"), Float(500.0)),
    def(SettingKey::ACCELERATION_X, "X-axis acceleration in mm/sec²", Some("mm/sec²"), Float(10.0)),
    def(SettingKey::ACCELERATION_Y, "Y-axis acceleration in mm/sec²", Some("mm/sec²"), Float(10.0)),
    def(SettingKey::ACCELERATION_Z, "Z-axis acceleration in mm/sec²", Some("mm/sec²"), Float(10.0)),
    def(SettingKey::MAX_TRAVEL_X, "X-axis maximum travel in millimeters", Some("mm"), Float(200.0)),
    def(SettingKey::MAX_TRAVEL_Y, "Y-axis maximum travel in millimeters", Some("mm"), Float(200.0)),
    def(SettingKey::MAX_TRAVEL_Z, "Z-axis maximum travel in millimeters", Some("mm"), Float(200.0)),
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn table_keys_unique() {
        let keys: HashSet<_> = SETTINGS.iter().map(|d| d.key).collect();
        assert_eq!(keys.len(), SETTINGS.len());
    }

    #[test]
    fn types_follow_key_groups() {
        let ty = |k: SettingKey| k.def().unwrap().ty;
        for k in [0u16, 1, 26, 30, 31] {
            assert_eq!(ty(SettingKey(k)), SettingType::Int, "${k}");
        }
        for k in [2u16, 3, 10, 23] {
            assert_eq!(ty(SettingKey(k)), SettingType::Short, "${k}");
        }
        for k in [4u16, 5, 6, 13, 20, 21, 22, 32] {
            assert_eq!(ty(SettingKey(k)), SettingType::Bool, "${k}");
        }
        for k in [11u16, 12, 24, 25, 27, 100, 111, 122, 132] {
            assert_eq!(ty(SettingKey(k)), SettingType::Float, "${k}");
        }
    }

    #[test]
    fn axis_key_helpers() {
        assert_eq!(SettingKey::steps_per_mm(Axis::Z), SettingKey::STEPS_PER_MM_Z);
        assert_eq!(SettingKey::max_rate(Axis::Left), SettingKey::MAX_RATE_X);
        assert_eq!(SettingKey::acceleration(Axis::Right), SettingKey::ACCELERATION_Y);
        assert_eq!(SettingKey::max_travel(Axis::Z), SettingKey::MAX_TRAVEL_Z);
    }

    #[test]
    fn key_parse_and_display() {
        assert_eq!("$102".parse::<SettingKey>().unwrap(), SettingKey::STEPS_PER_MM_Z);
        assert_eq!("24".parse::<SettingKey>().unwrap(), SettingKey::HOMING_FEED);
        assert!(matches!("$7".parse::<SettingKey>(), Err(SettingsError::UnknownKey(_))));
        assert!("$abc".parse::<SettingKey>().is_err());
        assert_eq!(SettingKey::MAX_TRAVEL_Z.to_string(), "$132");
    }

    #[test]
    fn short_range_checked() {
        let key = SettingKey::STATUS_REPORT_MASK;
        assert_eq!(
            SettingValue::parse(key, SettingType::Short, "-32768").unwrap(),
            SettingValue::Short(-32768)
        );
        assert!(SettingValue::parse(key, SettingType::Short, "40000").is_err());
    }

    #[test]
    fn float_must_be_finite() {
        let key = SettingKey::STEPS_PER_MM_X;
        assert!(SettingValue::parse(key, SettingType::Float, "inf").is_err());
        assert_eq!(
            SettingValue::parse(key, SettingType::Float, "80.5").unwrap(),
            SettingValue::Float(80.5)
        );
    }

    #[test]
    fn stored_float_roundtrips_exactly() {
        let original = SettingValue::Float(0.01);
        let stored: StoredValue = original.into();
        let back =
            SettingValue::from_stored(SettingKey::JUNCTION_DEVIATION, SettingType::Float, stored)
                .unwrap();
        assert_eq!(back, original);
    }

    #[test]
    fn stored_type_mismatch_is_rejected() {
        let err = SettingValue::from_stored(
            SettingKey::SOFT_LIMITS,
            SettingType::Bool,
            StoredValue::Float(2.5),
        );
        assert!(matches!(err, Err(SettingsError::InvalidValue { .. })));
    }
}
