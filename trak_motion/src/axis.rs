//! Axis Driver Handle.
//!
//! One handle per physical axis. The handle owns the axis's step engine and
//! its `AxisState`, and is the only path by which the coordinator and the
//! homing sequence reach the hardware.
//!
//! A handle never issues a move while a previous one is in flight: the
//! engine would silently drop the new move, so `move_relative` first waits
//! for any outstanding move to complete.

use serde::Serialize;
use tracing::{debug, trace};
use trak_common::axis::Axis;
use trak_hal::{HalError, StepDirection, StepperEngine};

/// Whether `move_relative` waits for completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveMode {
    /// Return once the move has completed.
    Blocking,
    /// Return as soon as the engine has accepted the move.
    NonBlocking,
}

/// Snapshot of one axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AxisState {
    /// Logical position relative to the last homing/reset [steps].
    pub position: i64,
    /// [steps/s]
    pub speed_hz: f64,
    /// [steps/s²]
    pub acceleration: f64,
    pub enabled: bool,
    /// A move or continuous run is still in flight.
    pub running: bool,
}

pub struct AxisHandle {
    axis: Axis,
    engine: Box<dyn StepperEngine>,
    speed_hz: f64,
    acceleration: f64,
}

impl std::fmt::Debug for AxisHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AxisHandle")
            .field("axis", &self.axis)
            .field("engine", &self.engine.name())
            .field("speed_hz", &self.speed_hz)
            .field("acceleration", &self.acceleration)
            .finish()
    }
}

impl AxisHandle {
    pub fn new(axis: Axis, engine: Box<dyn StepperEngine>) -> Self {
        Self {
            axis,
            engine,
            speed_hz: 0.0,
            acceleration: 0.0,
        }
    }

    #[inline]
    pub fn axis(&self) -> Axis {
        self.axis
    }

    /// Cruise speed for the next move [steps/s].
    pub fn set_speed(&mut self, hz: f64) -> Result<(), HalError> {
        self.engine.set_max_speed(hz)?;
        self.speed_hz = hz;
        Ok(())
    }

    /// Ramp acceleration for the next move [steps/s²].
    pub fn set_acceleration(&mut self, steps_per_s2: f64) -> Result<(), HalError> {
        self.engine.set_acceleration(steps_per_s2)?;
        self.acceleration = steps_per_s2;
        Ok(())
    }

    /// Issue a relative move. A zero-step move is not issued.
    pub fn move_relative(&mut self, steps: i64, mode: MoveMode) -> Result<(), HalError> {
        if steps == 0 {
            return Ok(());
        }
        self.wait_idle()?;
        debug!(axis = %self.axis, steps, hz = self.speed_hz, ?mode, "Issuing move");
        self.engine.move_relative(steps)?;
        if mode == MoveMode::Blocking {
            self.engine.block_until_idle()?;
        }
        Ok(())
    }

    /// Wait for an outstanding move, if any.
    pub fn wait_idle(&mut self) -> Result<(), HalError> {
        if self.engine.is_running() {
            trace!(axis = %self.axis, "Waiting for outstanding move");
            self.engine.block_until_idle()?;
        }
        Ok(())
    }

    /// Run at the set speed until stopped.
    pub fn run_continuous(&mut self, direction: StepDirection) -> Result<(), HalError> {
        self.engine.run_continuous(direction)
    }

    /// Halt immediately.
    pub fn force_stop(&mut self) {
        self.engine.force_stop();
    }

    /// Exactly one step.
    pub fn step(&mut self, direction: StepDirection) -> Result<(), HalError> {
        self.engine.step(direction)
    }

    /// Redefine the current position as zero.
    pub fn reset_position(&mut self) {
        self.engine.set_current_position(0);
    }

    pub fn enable(&mut self) {
        self.engine.enable();
    }

    pub fn disable(&mut self) {
        self.engine.disable();
    }

    pub fn is_enabled(&self) -> bool {
        self.engine.is_enabled()
    }

    pub fn is_running(&self) -> bool {
        self.engine.is_running()
    }

    pub fn position(&self) -> i64 {
        self.engine.current_position()
    }

    pub fn state(&self) -> AxisState {
        AxisState {
            position: self.engine.current_position(),
            speed_hz: self.speed_hz,
            acceleration: self.acceleration,
            enabled: self.engine.is_enabled(),
            running: self.engine.is_running(),
        }
    }
}
