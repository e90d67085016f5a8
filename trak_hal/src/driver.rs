//! Hardware boundary traits and error types.
//!
//! This module defines:
//! - `StepperEngine` trait - asynchronous step-pulse engine of one axis
//! - `LimitSwitch` trait - interrupt-capable limit input
//! - `SpindleOutput` trait - spindle/laser PWM output
//! - `Delay` trait - blocking delay on the main context
//! - `HalError` enum - error types for hardware operations

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Error types for hardware operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HalError {
    /// Engine refused to start a move.
    #[error("Move rejected by {engine}: {reason}")]
    MoveRejected { engine: String, reason: String },

    /// Motion requested while the driver output stage is disabled.
    #[error("Driver {0} is disabled")]
    DriverDisabled(String),

    /// Parameter outside what the engine accepts.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Hardware communication error
    #[error("Hardware communication error: {0}")]
    CommunicationError(String),
}

/// Physical rotation sense of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepDirection {
    /// Increasing position.
    Forward,
    /// Decreasing position.
    Reverse,
}

impl StepDirection {
    /// Direction of a signed step delta; zero counts as forward.
    #[inline]
    pub const fn of(steps: i64) -> Self {
        if steps < 0 { Self::Reverse } else { Self::Forward }
    }

    #[inline]
    pub const fn sign(self) -> i64 {
        match self {
            Self::Forward => 1,
            Self::Reverse => -1,
        }
    }
}

impl fmt::Display for StepDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Forward => "forward",
            Self::Reverse => "reverse",
        })
    }
}

/// Asynchronous step-pulse engine of one axis.
///
/// Moves run in the background once started. A relative move issued while
/// a previous move is still in flight is dropped by the engine without an
/// error, so callers must wait for completion before issuing the next one.
///
/// # Timing Contracts
///
/// | Operation | Blocks |
/// |-----------|--------|
/// | `move_relative()` | No |
/// | `run_continuous()` | No |
/// | `block_until_idle()` | Until the current move completes |
/// | `step()` | One pulse |
/// | `force_stop()` | No (immediate) |
pub trait StepperEngine: Send {
    /// Engine identifier used in logs and errors.
    fn name(&self) -> &str;

    /// Cruise speed for subsequent moves [steps/s].
    fn set_max_speed(&mut self, hz: f64) -> Result<(), HalError>;

    /// Ramp acceleration [steps/s²]. Zero disables ramping.
    fn set_acceleration(&mut self, steps_per_s2: f64) -> Result<(), HalError>;

    /// Start a relative move of `steps` and return immediately.
    fn move_relative(&mut self, steps: i64) -> Result<(), HalError>;

    /// Run at cruise speed in `direction` until stopped.
    fn run_continuous(&mut self, direction: StepDirection) -> Result<(), HalError>;

    /// Wait for the current move to complete.
    ///
    /// # Errors
    /// `InvalidParameter` if the engine is in an unbounded continuous run.
    fn block_until_idle(&mut self) -> Result<(), HalError>;

    /// Whether a move or continuous run is in flight.
    fn is_running(&self) -> bool;

    /// Halt immediately without a deceleration ramp.
    fn force_stop(&mut self);

    /// Emit exactly one step pulse.
    fn step(&mut self, direction: StepDirection) -> Result<(), HalError>;

    /// Logical position [steps].
    fn current_position(&self) -> i64;

    /// Redefine the logical position. Stops any motion in flight.
    fn set_current_position(&mut self, position: i64);

    /// Energize the driver output stage.
    fn enable(&mut self);

    /// De-energize the driver output stage.
    fn disable(&mut self);

    fn is_enabled(&self) -> bool;
}

/// Handler invoked from interrupt context.
pub type InterruptHandler = Box<dyn FnMut() + Send>;

/// Interrupt-capable limit-switch input.
pub trait LimitSwitch: Send {
    /// Arm `handler` to fire once on the active level. The handler is
    /// detached before it runs, so a second edge cannot re-enter it.
    fn attach_oneshot(&mut self, handler: InterruptHandler) -> Result<(), HalError>;

    /// Disarm the interrupt if still armed.
    fn detach(&mut self);

    fn is_armed(&self) -> bool;

    /// Raw switch level, read directly rather than through the interrupt.
    fn is_active(&self) -> bool;
}

/// Spindle or laser PWM output.
pub trait SpindleOutput: Send {
    fn set_enabled(&mut self, enabled: bool) -> Result<(), HalError>;

    /// PWM duty in `0.0..=1.0`.
    fn set_duty(&mut self, duty: f64) -> Result<(), HalError>;
}

/// Blocking delay on the main execution context.
pub trait Delay: Send {
    fn delay_ms(&mut self, ms: u64);
}

/// Wall-clock delay.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdDelay;

impl Delay for StdDelay {
    fn delay_ms(&mut self, ms: u64) {
        std::thread::sleep(Duration::from_millis(ms));
    }
}
