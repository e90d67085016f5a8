//! Simulated spindle/laser PWM output.

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

use crate::driver::{HalError, SpindleOutput};

#[derive(Debug, Default)]
struct SpindleState {
    enabled: bool,
    duty: f64,
    /// Every `set_enabled` call in order.
    switching: Vec<bool>,
}

/// PWM output recording its level. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct SimulatedSpindle {
    state: Arc<Mutex<SpindleState>>,
}

impl SimulatedSpindle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.state.lock().enabled
    }

    pub fn duty(&self) -> f64 {
        self.state.lock().duty
    }

    /// History of on/off switching.
    pub fn switching(&self) -> Vec<bool> {
        self.state.lock().switching.clone()
    }
}

impl SpindleOutput for SimulatedSpindle {
    fn set_enabled(&mut self, enabled: bool) -> Result<(), HalError> {
        let mut state = self.state.lock();
        state.enabled = enabled;
        state.switching.push(enabled);
        debug!(enabled, "Spindle output switched");
        Ok(())
    }

    fn set_duty(&mut self, duty: f64) -> Result<(), HalError> {
        if !(0.0..=1.0).contains(&duty) {
            return Err(HalError::InvalidParameter(format!(
                "spindle duty {duty} outside 0..=1"
            )));
        }
        self.state.lock().duty = duty;
        Ok(())
    }
}
