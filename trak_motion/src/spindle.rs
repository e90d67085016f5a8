//! Spindle and laser control.
//!
//! Speed is commanded in percent of the configured range and maps linearly
//! onto `[$31, $30]` RPM. With laser mode (`$32`) on, the output is only
//! energized while the machine is moving.

use serde::Serialize;
use tracing::{debug, info};
use trak_common::settings::SpindleSettings;
use trak_hal::SpindleOutput;

use crate::error::MotionError;

/// Spindle snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SpindleState {
    /// Operator has switched the spindle on.
    pub enabled: bool,
    pub percent: f64,
    pub rpm: f64,
    /// Physical output level.
    pub output_on: bool,
    pub laser_mode: bool,
}

pub struct SpindleController {
    output: Box<dyn SpindleOutput>,
    enabled: bool,
    percent: f64,
    output_on: bool,
}

impl std::fmt::Debug for SpindleController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpindleController")
            .field("enabled", &self.enabled)
            .field("percent", &self.percent)
            .field("output_on", &self.output_on)
            .finish()
    }
}

impl SpindleController {
    pub fn new(output: Box<dyn SpindleOutput>) -> Self {
        Self {
            output,
            enabled: false,
            percent: 0.0,
            output_on: false,
        }
    }

    fn drive_output(&mut self, on: bool) -> Result<(), MotionError> {
        if self.output_on != on {
            self.output
                .set_enabled(on)
                .map_err(MotionError::SpindleFailure)?;
            self.output_on = on;
        }
        Ok(())
    }

    /// Switch the spindle on or off.
    pub fn set_enabled(&mut self, on: bool, settings: &SpindleSettings) -> Result<(), MotionError> {
        self.enabled = on;
        // Laser output follows motion, not the switch.
        let level = on && !settings.laser_mode;
        self.drive_output(level)?;
        info!(on, laser_mode = settings.laser_mode, "Spindle switched");
        Ok(())
    }

    /// Set speed in percent `0..=100`. Returns the commanded RPM.
    pub fn set_speed_percent(
        &mut self,
        percent: f64,
        settings: &SpindleSettings,
    ) -> Result<f64, MotionError> {
        if !percent.is_finite() || !(0.0..=100.0).contains(&percent) {
            return Err(MotionError::InvalidParameters(format!(
                "spindle speed {percent}% outside 0..=100"
            )));
        }
        self.output
            .set_duty(percent / 100.0)
            .map_err(MotionError::SpindleFailure)?;
        self.percent = percent;
        let rpm = Self::rpm(percent, settings);
        debug!(percent, rpm, "Spindle speed set");
        Ok(rpm)
    }

    fn rpm(percent: f64, settings: &SpindleSettings) -> f64 {
        let min = f64::from(settings.min_rpm);
        let max = f64::from(settings.max_rpm);
        min + (max - min) * percent / 100.0
    }

    /// Called before a move is dispatched.
    pub fn begin_motion(&mut self, settings: &SpindleSettings) -> Result<(), MotionError> {
        if settings.laser_mode && self.enabled {
            self.drive_output(true)?;
        }
        Ok(())
    }

    /// Called once every axis has stopped.
    pub fn end_motion(&mut self, settings: &SpindleSettings) -> Result<(), MotionError> {
        if settings.laser_mode {
            self.drive_output(false)?;
        }
        Ok(())
    }

    /// Turn the output off and forget the on-switch.
    pub fn stop(&mut self) -> Result<(), MotionError> {
        self.enabled = false;
        self.drive_output(false)
    }

    pub fn state(&self, settings: &SpindleSettings) -> SpindleState {
        SpindleState {
            enabled: self.enabled,
            percent: self.percent,
            rpm: if self.enabled {
                Self::rpm(self.percent, settings)
            } else {
                0.0
            },
            output_on: self.output_on,
            laser_mode: settings.laser_mode,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trak_hal::drivers::simulation::SimulatedSpindle;

    fn settings(laser_mode: bool) -> SpindleSettings {
        SpindleSettings {
            max_rpm: 1000,
            min_rpm: 200,
            laser_mode,
        }
    }

    #[test]
    fn test_percent_maps_onto_rpm_range() {
        let output = SimulatedSpindle::new();
        let mut spindle = SpindleController::new(Box::new(output.clone()));
        let s = settings(false);
        assert_eq!(spindle.set_speed_percent(50.0, &s).unwrap(), 600.0);
        assert_eq!(output.duty(), 0.5);
        assert!(spindle.set_speed_percent(101.0, &s).is_err());
        assert!(spindle.set_speed_percent(f64::NAN, &s).is_err());
    }

    #[test]
    fn test_spindle_mode_follows_switch() {
        let output = SimulatedSpindle::new();
        let mut spindle = SpindleController::new(Box::new(output.clone()));
        let s = settings(false);
        spindle.set_enabled(true, &s).unwrap();
        assert!(output.is_enabled());
        spindle.end_motion(&s).unwrap();
        assert!(output.is_enabled());
        spindle.stop().unwrap();
        assert!(!output.is_enabled());
    }

    #[test]
    fn test_laser_mode_only_on_during_motion() {
        let output = SimulatedSpindle::new();
        let mut spindle = SpindleController::new(Box::new(output.clone()));
        let s = settings(true);
        spindle.set_enabled(true, &s).unwrap();
        assert!(!output.is_enabled());

        spindle.begin_motion(&s).unwrap();
        assert!(output.is_enabled());
        spindle.end_motion(&s).unwrap();
        assert!(!output.is_enabled());
        assert_eq!(output.switching(), vec![true, false]);
    }
}
