//! Simulation driver module.
//!
//! Virtual-time models of the platform hardware for development and
//! testing without physical steppers:
//!
//! - [`SimClock`] / [`SimDelay`] - shared virtual clock
//! - [`SimulatedStepper`] - lazily evaluated trapezoidal step engine
//! - [`SimulatedLimitSwitch`] - level-triggered Z limit switch
//! - [`SimulatedSpindle`] - PWM spindle output
//! - [`SimulatedHardware`] - the full platform wired together

mod clock;
mod spindle;
mod stepper;
mod switch;

pub use clock::{SimClock, SimDelay};
pub use spindle::SimulatedSpindle;
pub use stepper::{EngineEvent, EngineEventKind, SimulatedStepper, StepperProbe};
pub use switch::SimulatedLimitSwitch;

use tracing::info;
use trak_common::axis::Axis;
use trak_common::config::{PinConfig, SimulationConfig};

/// Complete simulated platform: two tracks, Z with limit switch, spindle.
#[derive(Debug)]
pub struct SimulatedHardware {
    pub clock: SimClock,
    pub left: SimulatedStepper,
    pub right: SimulatedStepper,
    pub z: SimulatedStepper,
    pub z_limit: SimulatedLimitSwitch,
    pub spindle: SimulatedSpindle,
    pub delay: SimDelay,
}

impl SimulatedHardware {
    /// Wire up the platform. Pin numbers only label the engines.
    pub fn new(pins: &PinConfig, sim: &SimulationConfig) -> Self {
        let clock = SimClock::new();
        let engine = |axis: Axis, step: u8| {
            SimulatedStepper::new(format!("{axis}@gpio{step}"), clock.clone())
        };
        let left = engine(Axis::Left, pins.left.step);
        let right = engine(Axis::Right, pins.right.step);
        let z = engine(Axis::Z, pins.z.step);
        let z_limit = SimulatedLimitSwitch::new(&clock, z.probe(), sim.z_switch_position);

        info!(
            z_switch_position = sim.z_switch_position,
            z_limit_pin = pins.z_limit,
            "Simulated hardware ready"
        );

        Self {
            delay: SimDelay::new(clock.clone()),
            clock,
            left,
            right,
            z,
            z_limit,
            spindle: SimulatedSpindle::new(),
        }
    }

    /// Observers for the three engines, in `Axis::ALL` order.
    pub fn probes(&self) -> [StepperProbe; 3] {
        [self.left.probe(), self.right.probe(), self.z.probe()]
    }
}

impl Default for SimulatedHardware {
    fn default() -> Self {
        Self::new(&PinConfig::default(), &SimulationConfig::default())
    }
}
