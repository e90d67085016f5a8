//! Homing State Machine (Z axis).
//!
//! ```text
//! Idle ──► Seeking ──► Debouncing ──► PullingOff ──► Homed
//!   │         │             │              │
//!   └─────────┴─────────────┴──────────────┴────────► Faulted
//! ```
//!
//! ## Phases
//!
//! | Phase      | Action                                                       |
//! |------------|--------------------------------------------------------------|
//! | Idle       | Read `$24`, `$102`, `$27`, `$122`; any zero faults at once    |
//! | Seeking    | Arm the one-shot switch interrupt, run Z in reverse, poll     |
//! | Debouncing | Force-stop, disable the driver, wait `$26` ms, re-enable      |
//! | PullingOff | Single-step off the switch, then a blocking `$27` mm move     |
//! | Homed      | Logical Z position is zero, homing flag consumed              |
//!
//! The interrupt handler only stores into the homing flag. The flag is owned
//! by the state machine and never handed to any other component.

use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, info, warn};
use trak_common::config::HomingLimitsConfig;
use trak_common::settings::{SettingKey, SettingsStore};
use trak_hal::{Delay, InterruptHandler, LimitSwitch, StepDirection};

use crate::axis::{AxisHandle, MoveMode};
use crate::error::HomingError;
use crate::units;

// ─── Homing Phases ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum HomingPhase {
    Idle,
    Seeking,
    Debouncing,
    PullingOff,
    /// Terminal success.
    Homed,
    /// Terminal failure.
    Faulted,
}

// ─── Homing Flag ────────────────────────────────────────────────────

/// Single-writer (interrupt) / single-reader (main context) cell.
#[derive(Debug, Default)]
struct HomingFlag(Arc<AtomicBool>);

impl HomingFlag {
    fn clear(&self) {
        self.0.store(false, Ordering::Release);
    }

    fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Read and clear in one step.
    fn take(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }

    fn interrupt_handler(&self) -> InterruptHandler {
        let cell = Arc::clone(&self.0);
        Box::new(move || cell.store(true, Ordering::Release))
    }
}

// ─── Parameters ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct HomingParams {
    hz: u32,
    accel: f64,
    debounce_ms: u64,
    pull_off_steps: i64,
}

impl HomingParams {
    /// Every one of `$24`, `$102`, `$27` and `$122` is checked.
    fn load(settings: &SettingsStore) -> Result<Self, HomingError> {
        let read = |key: SettingKey| -> Result<f64, HomingError> {
            let value = settings.float(key)?;
            if value.is_finite() && value > 0.0 {
                Ok(value)
            } else {
                Err(HomingError::HomingConfigInvalid { key })
            }
        };
        let feed = read(SettingKey::HOMING_FEED)?;
        let steps_per_mm = read(SettingKey::STEPS_PER_MM_Z)?;
        let pull_off = read(SettingKey::HOMING_PULL_OFF)?;
        let accel = read(SettingKey::ACCELERATION_Z)?;

        let debounce = settings.int(SettingKey::HOMING_DEBOUNCE_MS)?;
        let debounce_ms = u64::try_from(debounce).map_err(|_| HomingError::HomingConfigInvalid {
            key: SettingKey::HOMING_DEBOUNCE_MS,
        })?;

        let hz = units::hz_from_feed(feed, steps_per_mm);
        if hz == 0 {
            return Err(HomingError::HomingConfigInvalid {
                key: SettingKey::HOMING_FEED,
            });
        }
        Ok(Self {
            hz,
            accel: units::accel_steps_per_s2(accel, steps_per_mm),
            debounce_ms,
            pull_off_steps: units::steps_from_distance(pull_off, steps_per_mm).max(1),
        })
    }
}

/// Outcome of a successful homing sequence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HomingReport {
    /// Homing step frequency [steps/s].
    pub hz: u32,
    /// Time spent seeking the switch [ms].
    pub seek_ms: u64,
    /// Single steps taken to clear the switch.
    pub release_steps: u32,
    pub pull_off_steps: i64,
}

// ─── State Machine ──────────────────────────────────────────────────

#[derive(Debug)]
pub struct HomingStateMachine {
    phase: HomingPhase,
    flag: HomingFlag,
    limits: HomingLimitsConfig,
}

impl HomingStateMachine {
    pub fn new(limits: HomingLimitsConfig) -> Self {
        Self {
            phase: HomingPhase::Idle,
            flag: HomingFlag::default(),
            limits,
        }
    }

    #[inline]
    pub fn phase(&self) -> HomingPhase {
        self.phase
    }

    #[inline]
    pub fn is_homed(&self) -> bool {
        self.phase == HomingPhase::Homed
    }

    /// Whether the homing flag is currently set.
    pub fn flag_is_set(&self) -> bool {
        self.flag.is_set()
    }

    /// Forget a previous homing result (e.g. after an emergency stop).
    pub fn invalidate(&mut self) {
        if self.phase == HomingPhase::Homed {
            info!("Z home position invalidated");
        }
        self.phase = HomingPhase::Idle;
    }

    fn enter(&mut self, phase: HomingPhase) {
        debug!(from = ?self.phase, to = ?phase, "Homing phase");
        self.phase = phase;
    }

    /// Run the full homing sequence on `z`.
    ///
    /// No other Z command may be issued until this returns.
    pub fn z_homing(
        &mut self,
        z: &mut AxisHandle,
        switch: &mut dyn LimitSwitch,
        delay: &mut dyn Delay,
        settings: &SettingsStore,
    ) -> Result<HomingReport, HomingError> {
        self.phase = HomingPhase::Idle;
        self.flag.clear();

        let params = match HomingParams::load(settings) {
            Ok(params) => params,
            Err(e) => {
                error!(%e, "Homing rejected before motion");
                self.enter(HomingPhase::Faulted);
                return Err(e);
            }
        };

        match self.run_sequence(z, switch, delay, params) {
            Ok(report) => {
                self.enter(HomingPhase::Homed);
                info!(
                    seek_ms = report.seek_ms,
                    release_steps = report.release_steps,
                    "Z homed"
                );
                Ok(report)
            }
            Err(e) => {
                error!(%e, phase = ?self.phase, "Homing faulted");
                z.force_stop();
                switch.detach();
                self.flag.clear();
                self.enter(HomingPhase::Faulted);
                Err(e)
            }
        }
    }

    fn run_sequence(
        &mut self,
        z: &mut AxisHandle,
        switch: &mut dyn LimitSwitch,
        delay: &mut dyn Delay,
        params: HomingParams,
    ) -> Result<HomingReport, HomingError> {
        // Seeking
        self.enter(HomingPhase::Seeking);
        z.wait_idle()?;
        if !z.is_enabled() {
            z.enable();
        }
        z.set_acceleration(params.accel)?;
        z.set_speed(f64::from(params.hz))?;
        switch.attach_oneshot(self.flag.interrupt_handler())?;
        z.run_continuous(StepDirection::Reverse)?;
        info!(hz = params.hz, "Seeking Z limit switch");

        let poll = self.limits.poll_interval_ms;
        let mut seek_ms = 0u64;
        while !self.flag.is_set() {
            if seek_ms >= self.limits.seek_timeout_ms {
                return Err(HomingError::HomingFault(format!(
                    "limit switch not reached within {} ms",
                    self.limits.seek_timeout_ms
                )));
            }
            delay.delay_ms(poll);
            seek_ms += poll;
        }

        // Debouncing
        self.enter(HomingPhase::Debouncing);
        z.force_stop();
        z.disable();
        delay.delay_ms(params.debounce_ms);
        z.enable();

        // PullingOff
        self.enter(HomingPhase::PullingOff);
        let mut release_steps = 0u32;
        while switch.is_active() {
            if release_steps >= self.limits.release_step_limit {
                return Err(HomingError::HomingFault(format!(
                    "switch still active after {release_steps} release steps"
                )));
            }
            z.step(StepDirection::Forward)?;
            release_steps += 1;
        }
        debug!(release_steps, "Switch released");

        z.move_relative(params.pull_off_steps, MoveMode::Blocking)?;
        z.reset_position();

        if !self.flag.take() {
            warn!("Homing flag already clear at completion");
        }
        switch.detach();

        Ok(HomingReport {
            hz: params.hz,
            seek_ms,
            release_steps,
            pull_off_steps: params.pull_off_steps,
        })
    }
}
