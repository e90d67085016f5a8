//! # Trak HAL Library
//!
//! Hardware boundary of the trak platform: the asynchronous step-pulse
//! engine of each axis, the interrupt-capable Z limit switch, the spindle
//! output and a blocking delay. The motion core only ever talks to these
//! traits; it never touches a pin directly.
//!
//! # Module Structure
//!
//! - [`driver`] - Hardware traits and `HalError`
//! - [`drivers`] - Driver implementations (virtual-time simulation)
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         trak_motion                          │
//! │   AxisHandle ×3          HomingStateMachine      Spindle     │
//! └───────┬──────────────────────┬───────────────────────┬───────┘
//!         ▼                      ▼                       ▼
//!  ┌──────────────┐      ┌──────────────┐        ┌──────────────┐
//!  │StepperEngine │      │ LimitSwitch  │        │SpindleOutput │
//!  └──────┬───────┘      └──────┬───────┘        └──────┬───────┘
//!         └─────────────┬───────┴───────────────────────┘
//!                       ▼
//!              drivers::simulation (SimClock)
//! ```

pub mod driver;
pub mod drivers;

pub use crate::driver::{
    Delay, HalError, InterruptHandler, LimitSwitch, SpindleOutput, StdDelay, StepDirection,
    StepperEngine,
};
pub use crate::drivers::simulation::SimulatedHardware;
