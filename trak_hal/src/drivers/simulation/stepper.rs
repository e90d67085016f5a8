//! Simulated step-pulse engine.
//!
//! Motion is evaluated lazily against the shared [`SimClock`]: a move records
//! its start time and trapezoidal profile, and the position at any instant is
//! computed from that profile. Waiting for a move advances the clock to the
//! move's end time.
//!
//! The engine keeps a physical position (fixed to the machine frame, used by
//! the limit switch) and a logical position (what `current_position` reports,
//! redefined by `set_current_position`).

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, trace, warn};

use super::clock::SimClock;
use crate::driver::{HalError, StepDirection, StepperEngine};

/// Kind of an engine event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EngineEventKind {
    SpeedSet(f64),
    AccelerationSet(f64),
    MoveStarted { steps: i64, hz: f64 },
    /// New move arrived while one was still in flight.
    MoveDropped { steps: i64 },
    MoveRejected { steps: i64 },
    RunStarted(StepDirection),
    /// A caller waited for an in-flight move to complete.
    WaitedIdle,
    Stopped,
    Step(StepDirection),
    PositionReset(i64),
    Enabled,
    Disabled,
}

/// One entry of the engine's event log.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineEvent {
    /// Clock-wide sequence number, comparable across engines.
    pub seq: u64,
    pub at_us: u64,
    pub kind: EngineEventKind,
}

#[derive(Debug, Clone, Copy)]
enum Motion {
    Idle,
    Move {
        start_us: u64,
        start_physical: i64,
        steps: i64,
        hz: f64,
        accel: f64,
        duration_us: u64,
    },
    Run {
        start_us: u64,
        start_physical: i64,
        direction: StepDirection,
        hz: f64,
        accel: f64,
    },
}

#[derive(Debug)]
struct StepperState {
    physical: i64,
    /// logical = physical - offset
    offset: i64,
    motion: Motion,
    max_speed: f64,
    acceleration: f64,
    enabled: bool,
    pending_fault: Option<String>,
    events: Vec<EngineEvent>,
}

impl StepperState {
    fn new(enabled: bool) -> Self {
        Self {
            physical: 0,
            offset: 0,
            motion: Motion::Idle,
            max_speed: 0.0,
            acceleration: 0.0,
            enabled,
            pending_fault: None,
            events: Vec::new(),
        }
    }

    fn physical_at(&self, now_us: u64) -> i64 {
        match self.motion {
            Motion::Idle => self.physical,
            Motion::Move {
                start_us,
                start_physical,
                steps,
                hz,
                accel,
                duration_us,
            } => {
                let elapsed = now_us.saturating_sub(start_us);
                if elapsed >= duration_us {
                    return start_physical + steps;
                }
                let n = steps.unsigned_abs() as f64;
                let done = profile_distance(n, hz, accel, elapsed as f64 / 1_000_000.0);
                let done = (done.floor() as i64).min(steps.abs());
                start_physical + done * steps.signum()
            }
            Motion::Run {
                start_us,
                start_physical,
                direction,
                hz,
                accel,
            } => {
                let elapsed = now_us.saturating_sub(start_us) as f64 / 1_000_000.0;
                let done = run_distance(hz, accel, elapsed).floor() as i64;
                start_physical + done * direction.sign()
            }
        }
    }

    /// Retire a move whose end time has passed.
    fn settle(&mut self, now_us: u64) {
        if let Motion::Move {
            start_us,
            duration_us,
            ..
        } = self.motion
        {
            if now_us >= start_us + duration_us {
                self.physical = self.physical_at(now_us);
                self.motion = Motion::Idle;
            }
        }
    }

    /// Freeze motion at the current instant.
    fn halt(&mut self, now_us: u64) {
        self.physical = self.physical_at(now_us);
        self.motion = Motion::Idle;
    }

    fn is_running(&self) -> bool {
        !matches!(self.motion, Motion::Idle)
    }

    fn log(&mut self, clock: &SimClock, kind: EngineEventKind) {
        self.events.push(EngineEvent {
            seq: clock.next_seq(),
            at_us: clock.now_us(),
            kind,
        });
    }
}

/// Distance [steps] covered `t` seconds into an `n`-step trapezoidal move.
fn profile_distance(n: f64, v: f64, a: f64, t: f64) -> f64 {
    if a <= 0.0 {
        return (v * t).min(n);
    }
    let ramp = v * v / a;
    let (t_acc, t_cruise, v_top) = if n >= ramp {
        (v / a, (n - ramp) / v, v)
    } else {
        let v_peak = (n * a).sqrt();
        (v_peak / a, 0.0, v_peak)
    };
    let total = 2.0 * t_acc + t_cruise;
    if t < t_acc {
        0.5 * a * t * t
    } else if t < t_acc + t_cruise {
        0.5 * v_top * t_acc + v_top * (t - t_acc)
    } else if t < total {
        let r = total - t;
        n - 0.5 * a * r * r
    } else {
        n
    }
}

/// Duration [s] of an `n`-step trapezoidal move.
fn profile_duration(n: f64, v: f64, a: f64) -> f64 {
    if a <= 0.0 {
        n / v
    } else if n >= v * v / a {
        2.0 * v / a + (n - v * v / a) / v
    } else {
        2.0 * (n * a).sqrt() / a
    }
}

/// Distance [steps] covered `t` seconds into a continuous run.
fn run_distance(v: f64, a: f64, t: f64) -> f64 {
    if a <= 0.0 {
        return v * t;
    }
    let t_acc = v / a;
    if t < t_acc {
        0.5 * a * t * t
    } else {
        0.5 * v * t_acc + v * (t - t_acc)
    }
}

/// Simulated stepper engine bound to a [`SimClock`].
#[derive(Debug)]
pub struct SimulatedStepper {
    name: String,
    clock: SimClock,
    state: Arc<Mutex<StepperState>>,
}

impl SimulatedStepper {
    /// New engine at physical position zero with its driver enabled.
    pub fn new(name: impl Into<String>, clock: SimClock) -> Self {
        Self {
            name: name.into(),
            clock,
            state: Arc::new(Mutex::new(StepperState::new(true))),
        }
    }

    /// Read-only observer sharing this engine's state.
    pub fn probe(&self) -> StepperProbe {
        StepperProbe {
            clock: self.clock.clone(),
            state: self.state.clone(),
        }
    }

    fn check_enabled(&self, state: &StepperState) -> Result<(), HalError> {
        if state.enabled {
            Ok(())
        } else {
            Err(HalError::DriverDisabled(self.name.clone()))
        }
    }
}

impl StepperEngine for SimulatedStepper {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_max_speed(&mut self, hz: f64) -> Result<(), HalError> {
        if !hz.is_finite() || hz < 0.0 {
            return Err(HalError::InvalidParameter(format!(
                "{}: max speed {hz} out of range",
                self.name
            )));
        }
        let mut state = self.state.lock();
        state.max_speed = hz;
        state.log(&self.clock, EngineEventKind::SpeedSet(hz));
        Ok(())
    }

    fn set_acceleration(&mut self, steps_per_s2: f64) -> Result<(), HalError> {
        if !steps_per_s2.is_finite() || steps_per_s2 < 0.0 {
            return Err(HalError::InvalidParameter(format!(
                "{}: acceleration {steps_per_s2} out of range",
                self.name
            )));
        }
        let mut state = self.state.lock();
        state.acceleration = steps_per_s2;
        state.log(&self.clock, EngineEventKind::AccelerationSet(steps_per_s2));
        Ok(())
    }

    fn move_relative(&mut self, steps: i64) -> Result<(), HalError> {
        let now = self.clock.now_us();
        let mut state = self.state.lock();
        state.settle(now);
        self.check_enabled(&state)?;

        if let Some(reason) = state.pending_fault.take() {
            state.log(&self.clock, EngineEventKind::MoveRejected { steps });
            return Err(HalError::MoveRejected {
                engine: self.name.clone(),
                reason,
            });
        }
        if steps == 0 {
            return Ok(());
        }
        if state.is_running() {
            warn!(engine = %self.name, steps, "Move dropped, previous move still in flight");
            state.log(&self.clock, EngineEventKind::MoveDropped { steps });
            return Ok(());
        }
        if state.max_speed <= 0.0 {
            return Err(HalError::InvalidParameter(format!(
                "{}: max speed not set",
                self.name
            )));
        }

        let hz = state.max_speed;
        let accel = state.acceleration;
        let duration_s = profile_duration(steps.unsigned_abs() as f64, hz, accel);
        let duration_us = ((duration_s * 1_000_000.0).ceil() as u64).max(1);
        state.motion = Motion::Move {
            start_us: now,
            start_physical: state.physical,
            steps,
            hz,
            accel,
            duration_us,
        };
        state.log(&self.clock, EngineEventKind::MoveStarted { steps, hz });
        debug!(engine = %self.name, steps, hz, duration_us, "Move started");
        Ok(())
    }

    fn run_continuous(&mut self, direction: StepDirection) -> Result<(), HalError> {
        let now = self.clock.now_us();
        let mut state = self.state.lock();
        state.halt(now);
        self.check_enabled(&state)?;
        if state.max_speed <= 0.0 {
            return Err(HalError::InvalidParameter(format!(
                "{}: max speed not set",
                self.name
            )));
        }
        state.motion = Motion::Run {
            start_us: now,
            start_physical: state.physical,
            direction,
            hz: state.max_speed,
            accel: state.acceleration,
        };
        state.log(&self.clock, EngineEventKind::RunStarted(direction));
        debug!(engine = %self.name, %direction, hz = state.max_speed, "Continuous run started");
        Ok(())
    }

    fn block_until_idle(&mut self) -> Result<(), HalError> {
        let end_us = {
            let mut state = self.state.lock();
            state.settle(self.clock.now_us());
            match state.motion {
                Motion::Idle => return Ok(()),
                Motion::Run { .. } => {
                    return Err(HalError::InvalidParameter(format!(
                        "{}: cannot wait on a continuous run",
                        self.name
                    )));
                }
                Motion::Move {
                    start_us,
                    duration_us,
                    ..
                } => {
                    state.log(&self.clock, EngineEventKind::WaitedIdle);
                    start_us + duration_us
                }
            }
        };

        // The state lock must be free here: advancing runs clock listeners
        // that read this engine.
        self.clock.advance_to(end_us);
        self.state.lock().settle(self.clock.now_us());
        trace!(engine = %self.name, "Move complete");
        Ok(())
    }

    fn is_running(&self) -> bool {
        let mut state = self.state.lock();
        state.settle(self.clock.now_us());
        state.is_running()
    }

    fn force_stop(&mut self) {
        let mut state = self.state.lock();
        state.halt(self.clock.now_us());
        state.log(&self.clock, EngineEventKind::Stopped);
        debug!(engine = %self.name, position = state.physical - state.offset, "Force stop");
    }

    fn step(&mut self, direction: StepDirection) -> Result<(), HalError> {
        let mut state = self.state.lock();
        state.settle(self.clock.now_us());
        self.check_enabled(&state)?;
        if state.is_running() {
            return Err(HalError::InvalidParameter(format!(
                "{}: single step while a move is in flight",
                self.name
            )));
        }
        state.physical += direction.sign();
        state.log(&self.clock, EngineEventKind::Step(direction));
        Ok(())
    }

    fn current_position(&self) -> i64 {
        let state = self.state.lock();
        state.physical_at(self.clock.now_us()) - state.offset
    }

    fn set_current_position(&mut self, position: i64) {
        let mut state = self.state.lock();
        state.halt(self.clock.now_us());
        state.offset = state.physical - position;
        state.log(&self.clock, EngineEventKind::PositionReset(position));
    }

    fn enable(&mut self) {
        let mut state = self.state.lock();
        if !state.enabled {
            state.enabled = true;
            state.log(&self.clock, EngineEventKind::Enabled);
        }
    }

    fn disable(&mut self) {
        let mut state = self.state.lock();
        state.halt(self.clock.now_us());
        if state.enabled {
            state.enabled = false;
            state.log(&self.clock, EngineEventKind::Disabled);
        }
    }

    fn is_enabled(&self) -> bool {
        self.state.lock().enabled
    }
}

/// Observer and fault-injection handle for a [`SimulatedStepper`].
#[derive(Debug, Clone)]
pub struct StepperProbe {
    clock: SimClock,
    state: Arc<Mutex<StepperState>>,
}

impl StepperProbe {
    /// Position in the machine frame [steps].
    pub fn physical_position(&self) -> i64 {
        self.state.lock().physical_at(self.clock.now_us())
    }

    /// Logical position [steps].
    pub fn position(&self) -> i64 {
        let state = self.state.lock();
        state.physical_at(self.clock.now_us()) - state.offset
    }

    pub fn is_running(&self) -> bool {
        let mut state = self.state.lock();
        state.settle(self.clock.now_us());
        state.is_running()
    }

    pub fn is_enabled(&self) -> bool {
        self.state.lock().enabled
    }

    pub fn max_speed(&self) -> f64 {
        self.state.lock().max_speed
    }

    pub fn acceleration(&self) -> f64 {
        self.state.lock().acceleration
    }

    pub fn events(&self) -> Vec<EngineEvent> {
        self.state.lock().events.clone()
    }

    pub fn clear_events(&self) {
        self.state.lock().events.clear();
    }

    /// Moves accepted by the engine as `(steps, hz)`.
    pub fn started_moves(&self) -> Vec<(i64, f64)> {
        self.state
            .lock()
            .events
            .iter()
            .filter_map(|e| match e.kind {
                EngineEventKind::MoveStarted { steps, hz } => Some((steps, hz)),
                _ => None,
            })
            .collect()
    }

    /// Whether any event of the given kind was recorded.
    pub fn saw(&self, predicate: impl Fn(&EngineEventKind) -> bool) -> bool {
        self.state.lock().events.iter().any(|e| predicate(&e.kind))
    }

    /// Reject the next relative move with `reason`.
    pub fn inject_fault(&self, reason: impl Into<String>) {
        self.state.lock().pending_fault = Some(reason.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> (SimClock, SimulatedStepper) {
        let clock = SimClock::new();
        let mut stepper = SimulatedStepper::new("test", clock.clone());
        stepper.set_max_speed(1_000.0).unwrap();
        stepper.set_acceleration(0.0).unwrap();
        (clock, stepper)
    }

    #[test]
    fn test_constant_speed_move_duration() {
        let (clock, mut stepper) = engine();
        stepper.move_relative(500).unwrap();
        assert!(stepper.is_running());

        clock.advance_us(250_000);
        assert_eq!(stepper.current_position(), 250);

        stepper.block_until_idle().unwrap();
        assert_eq!(clock.now_us(), 500_000);
        assert_eq!(stepper.current_position(), 500);
        assert!(!stepper.is_running());
    }

    #[test]
    fn test_trapezoid_and_triangle_durations() {
        // v²/a = 400 steps of ramp; 1000 steps cruise the remaining 600 at 200/s.
        assert!((profile_duration(1000.0, 200.0, 100.0) - 7.0).abs() < 1e-9);
        // Triangle: v_peak = sqrt(100 * 100) = 100, duration 2 s.
        assert!((profile_duration(100.0, 200.0, 100.0) - 2.0).abs() < 1e-9);
        assert!((profile_distance(100.0, 200.0, 100.0, 1.0) - 50.0).abs() < 1e-9);
        assert_eq!(profile_distance(1000.0, 200.0, 100.0, 10.0), 1000.0);
    }

    #[test]
    fn test_move_in_flight_drops_new_move() {
        let (_clock, mut stepper) = engine();
        let probe = stepper.probe();
        stepper.move_relative(100).unwrap();
        stepper.move_relative(-40).unwrap();
        stepper.block_until_idle().unwrap();

        assert_eq!(stepper.current_position(), 100);
        assert!(probe.saw(|k| matches!(k, EngineEventKind::MoveDropped { steps: -40 })));
    }

    #[test]
    fn test_force_stop_freezes_position() {
        let (clock, mut stepper) = engine();
        stepper.run_continuous(StepDirection::Reverse).unwrap();
        clock.advance_us(10_000);
        stepper.force_stop();
        clock.advance_us(10_000);
        assert_eq!(stepper.current_position(), -10);
        assert!(!stepper.is_running());
        assert!(stepper.block_until_idle().is_ok());
    }

    #[test]
    fn test_wait_on_continuous_run_is_rejected() {
        let (_clock, mut stepper) = engine();
        stepper.run_continuous(StepDirection::Forward).unwrap();
        assert!(matches!(
            stepper.block_until_idle(),
            Err(HalError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_position_reset_keeps_physical_frame() {
        let (_clock, mut stepper) = engine();
        let probe = stepper.probe();
        stepper.move_relative(-300).unwrap();
        stepper.block_until_idle().unwrap();
        stepper.set_current_position(0);

        assert_eq!(stepper.current_position(), 0);
        assert_eq!(probe.physical_position(), -300);
        stepper.step(StepDirection::Forward).unwrap();
        assert_eq!(stepper.current_position(), 1);
        assert_eq!(probe.physical_position(), -299);
    }

    #[test]
    fn test_disabled_driver_rejects_motion() {
        let (_clock, mut stepper) = engine();
        stepper.disable();
        assert!(matches!(
            stepper.move_relative(10),
            Err(HalError::DriverDisabled(_))
        ));
        assert!(stepper.step(StepDirection::Forward).is_err());
        stepper.enable();
        assert!(stepper.move_relative(10).is_ok());
    }

    #[test]
    fn test_injected_fault_rejects_once() {
        let (_clock, mut stepper) = engine();
        stepper.probe().inject_fault("stall");
        assert!(matches!(
            stepper.move_relative(10),
            Err(HalError::MoveRejected { .. })
        ));
        assert!(stepper.move_relative(10).is_ok());
    }
}
