//! Simulated Z limit switch.
//!
//! The switch is active while the Z carriage sits at or beyond a fixed
//! physical trigger position. It watches the clock and fires its armed
//! one-shot handler on the first advance that finds it active, the way a
//! level-triggered GPIO interrupt would.

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, trace};

use super::clock::SimClock;
use super::stepper::StepperProbe;
use crate::driver::{HalError, InterruptHandler, LimitSwitch};

#[derive(Default)]
struct SwitchState {
    handler: Option<InterruptHandler>,
    /// Level override for tests; `None` follows the carriage.
    forced: Option<bool>,
    fired: u32,
}

#[derive(Clone)]
struct Sensor {
    z: StepperProbe,
    trigger_position: i64,
}

impl Sensor {
    fn is_active(&self, state: &SwitchState) -> bool {
        state
            .forced
            .unwrap_or_else(|| self.z.physical_position() <= self.trigger_position)
    }
}

/// Limit switch driven by a simulated Z engine. Clones share state.
#[derive(Clone)]
pub struct SimulatedLimitSwitch {
    sensor: Sensor,
    state: Arc<Mutex<SwitchState>>,
}

impl std::fmt::Debug for SimulatedLimitSwitch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedLimitSwitch")
            .field("trigger_position", &self.sensor.trigger_position)
            .field("armed", &self.is_armed())
            .finish()
    }
}

impl SimulatedLimitSwitch {
    /// Switch that reads active once `z` is at or below `trigger_position`
    /// in the machine frame.
    pub fn new(clock: &SimClock, z: StepperProbe, trigger_position: i64) -> Self {
        let switch = Self {
            sensor: Sensor {
                z,
                trigger_position,
            },
            state: Arc::new(Mutex::new(SwitchState::default())),
        };

        let sensor = switch.sensor.clone();
        let state = switch.state.clone();
        clock.on_advance(move |now_us| {
            Self::service(&sensor, &state, false);
            trace!(now_us, "Limit switch sampled");
        });
        switch
    }

    /// Fire the armed handler if the level is active (or unconditionally
    /// when `edge` is set). The handler is taken out before it runs.
    fn service(sensor: &Sensor, state: &Mutex<SwitchState>, edge: bool) {
        let handler = {
            let mut s = state.lock();
            if s.handler.is_none() || !(edge || sensor.is_active(&s)) {
                return;
            }
            s.fired += 1;
            s.handler.take()
        };
        if let Some(mut handler) = handler {
            debug!("Limit switch interrupt");
            handler();
        }
    }

    /// Simulate an electrical edge regardless of carriage position.
    pub fn trigger(&self) {
        Self::service(&self.sensor, &self.state, true);
    }

    /// Override the raw level; `None` returns to following the carriage.
    pub fn force_level(&self, active: Option<bool>) {
        self.state.lock().forced = active;
    }

    /// Number of times the interrupt handler has run.
    pub fn interrupt_count(&self) -> u32 {
        self.state.lock().fired
    }

    pub fn trigger_position(&self) -> i64 {
        self.sensor.trigger_position
    }
}

impl LimitSwitch for SimulatedLimitSwitch {
    fn attach_oneshot(&mut self, handler: InterruptHandler) -> Result<(), HalError> {
        {
            let mut state = self.state.lock();
            if state.handler.is_some() {
                return Err(HalError::InvalidParameter(
                    "limit switch interrupt already attached".to_string(),
                ));
            }
            state.handler = Some(handler);
        }
        // Level-triggered: an already active switch fires at once.
        Self::service(&self.sensor, &self.state, false);
        Ok(())
    }

    fn detach(&mut self) {
        self.state.lock().handler = None;
    }

    fn is_armed(&self) -> bool {
        self.state.lock().handler.is_some()
    }

    fn is_active(&self) -> bool {
        let state = self.state.lock();
        self.sensor.is_active(&state)
    }
}
