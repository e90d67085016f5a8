//! Typed inbound commands.
//!
//! The request router decodes JSON into these values. Direction codes are a
//! closed enumeration accepted either as an integer `0..=7` or by name, so
//! the motion core never sees free-form strings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Tank-drive direction code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "DirectionRepr")]
#[repr(u8)]
pub enum DirectionCode {
    Forward = 0,
    Backward = 1,
    /// Arc left: inside (left) track runs at half distance.
    ForwardLeft = 2,
    /// Arc right: inside (right) track runs at half distance.
    ForwardRight = 3,
    /// Rotate in place counter-clockwise.
    TurnLeft = 4,
    /// Rotate in place clockwise.
    TurnRight = 5,
    BackwardLeft = 6,
    BackwardRight = 7,
}

impl DirectionCode {
    pub const ALL: [DirectionCode; 8] = [
        Self::Forward,
        Self::Backward,
        Self::ForwardLeft,
        Self::ForwardRight,
        Self::TurnLeft,
        Self::TurnRight,
        Self::BackwardLeft,
        Self::BackwardRight,
    ];

    #[inline]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Forward),
            1 => Some(Self::Backward),
            2 => Some(Self::ForwardLeft),
            3 => Some(Self::ForwardRight),
            4 => Some(Self::TurnLeft),
            5 => Some(Self::TurnRight),
            6 => Some(Self::BackwardLeft),
            7 => Some(Self::BackwardRight),
            _ => None,
        }
    }

    #[inline]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Signed fraction of the full step count given to (left, right) track.
    pub const fn track_factors(self) -> (f64, f64) {
        match self {
            Self::Forward => (1.0, 1.0),
            Self::Backward => (-1.0, -1.0),
            Self::ForwardLeft => (0.5, 1.0),
            Self::ForwardRight => (1.0, 0.5),
            Self::TurnLeft => (-1.0, 1.0),
            Self::TurnRight => (1.0, -1.0),
            Self::BackwardLeft => (-0.5, -1.0),
            Self::BackwardRight => (-1.0, -0.5),
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Forward => "forward",
            Self::Backward => "backward",
            Self::ForwardLeft => "forwardLeft",
            Self::ForwardRight => "forwardRight",
            Self::TurnLeft => "turnLeft",
            Self::TurnRight => "turnRight",
            Self::BackwardLeft => "backwardLeft",
            Self::BackwardRight => "backwardRight",
        }
    }
}

impl fmt::Display for DirectionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DirectionCode {
    type Err = String;

    /// Accepts `"3"`, `"forwardRight"`, `"forward_right"` or `"forward-right"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(code) = trimmed.parse::<u8>() {
            return Self::from_code(code)
                .ok_or_else(|| format!("direction code {code} out of range 0..=7"));
        }
        let normalized: String = trimmed
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .flat_map(char::to_lowercase)
            .collect();
        Self::ALL
            .into_iter()
            .find(|d| d.name().to_lowercase() == normalized)
            .ok_or_else(|| format!("unrecognized direction '{trimmed}'"))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DirectionRepr {
    Code(u8),
    Name(String),
}

impl TryFrom<DirectionRepr> for DirectionCode {
    type Error = String;

    fn try_from(repr: DirectionRepr) -> Result<Self, Self::Error> {
        match repr {
            DirectionRepr::Code(code) => Self::from_code(code)
                .ok_or_else(|| format!("direction code {code} out of range 0..=7")),
            DirectionRepr::Name(name) => name.parse(),
        }
    }
}

/// Tank-drive request: `{direction, speed, step}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DriveRequest {
    /// Early clients sent the direction under `axis`.
    #[serde(alias = "axis")]
    pub direction: DirectionCode,
    /// Requested feed [mm/min].
    pub speed: f64,
    /// Requested travel [mm].
    pub step: f64,
}

/// Z depth request: `{speed, step}`. Positive `step` moves the tool down.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DepthRequest {
    /// Requested feed [mm/min].
    pub speed: f64,
    /// Requested travel [mm].
    pub step: f64,
}

/// Spindle request: switch on/off and/or set speed in percent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SpindleRequest {
    #[serde(default)]
    pub enable: Option<bool>,
    /// Speed in percent of the configured RPM range.
    #[serde(default)]
    pub speed: Option<f64>,
}
