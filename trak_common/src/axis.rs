//! Physical axis identifiers.
//!
//! The platform has two drive tracks and a tool-head Z axis. In the GRBL
//! settings table the left track occupies the X slot and the right track the
//! Y slot.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One stepper-driven axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Axis {
    /// Left drive track (GRBL X).
    Left = 0,
    /// Right drive track (GRBL Y).
    Right = 1,
    /// Tool-head depth axis (GRBL Z).
    Z = 2,
}

impl Axis {
    /// All axes in settings-table order.
    pub const ALL: [Axis; 3] = [Axis::Left, Axis::Right, Axis::Z];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[inline]
    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::Left),
            1 => Some(Self::Right),
            2 => Some(Self::Z),
            _ => None,
        }
    }

    /// GRBL axis letter of the settings slot this axis uses.
    #[inline]
    pub const fn grbl_letter(self) -> char {
        match self {
            Self::Left => 'X',
            Self::Right => 'Y',
            Self::Z => 'Z',
        }
    }

    #[inline]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
            Self::Z => "z",
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_roundtrip() {
        for axis in Axis::ALL {
            assert_eq!(Axis::from_index(axis.index()), Some(axis));
        }
        assert!(Axis::from_index(3).is_none());
    }

    #[test]
    fn grbl_slots() {
        assert_eq!(Axis::Left.grbl_letter(), 'X');
        assert_eq!(Axis::Right.grbl_letter(), 'Y');
        assert_eq!(Axis::Z.grbl_letter(), 'Z');
    }
}
