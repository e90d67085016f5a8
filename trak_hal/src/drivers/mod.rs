//! HAL driver implementations.
//!
//! - [`simulation`] - Virtual-time simulation driver for development and testing
//!
//! # Adding New Drivers
//!
//! 1. Create a new submodule under `drivers/`
//! 2. Implement `StepperEngine`, `LimitSwitch`, `SpindleOutput` and `Delay`
//!    from [`crate::driver`]
//! 3. Export the driver's hardware bundle here

pub mod simulation;
