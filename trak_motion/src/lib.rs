//! # Trak Motion
//!
//! Motion core of the tracked platform: two drive tracks and a Z tool head.
//!
//! # Module Structure
//!
//! - [`units`] - Unit Converter (mm, mm/min ↔ steps, Hz)
//! - [`axis`] - Axis Driver Handle and `AxisState`
//! - [`coordinator`] - Motion Coordinator (drive, depth, coordinated moves)
//! - [`homing`] - Z Homing State Machine
//! - [`spindle`] - Spindle and laser control
//! - [`console`] - Best-effort Console Reporter
//! - [`machine`] - `Machine` facade dispatching typed commands
//! - [`error`] - `MotionError` / `HomingError`
//!
//! # Data Flow
//!
//! ```text
//! Command ──► Machine ──► MotionCoordinator ──► AxisHandle ×3 ──► StepperEngine
//!                │               ▲
//!                │          SettingsStore ($n)
//!                └──► HomingStateMachine ──► AxisHandle(Z) + LimitSwitch
//! ```

pub mod axis;
pub mod console;
pub mod coordinator;
pub mod error;
pub mod homing;
pub mod machine;
pub mod spindle;
pub mod units;

pub use crate::coordinator::{MotionAck, MotionCoordinator};
pub use crate::error::{HomingError, MotionError};
pub use crate::homing::{HomingPhase, HomingStateMachine};
pub use crate::machine::{Command, Hardware, Machine, MachineError, MachineStatus, Response};
