//! Machine facade.
//!
//! Owns the coordinator, the homing state machine, the spindle and the
//! console, and dispatches typed commands to them. Commands run to
//! completion one at a time (`&mut self`), so homing can never interleave
//! with another Z command.

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};
use trak_common::axis::Axis;
use trak_common::command::{DepthRequest, DriveRequest, SpindleRequest};
use trak_common::config::HomingLimitsConfig;
use trak_common::settings::{
    SettingEntry, SettingKey, SettingsError, SettingsStore, SharedSettings, SpindleSettings,
};
use trak_hal::drivers::simulation::SimulatedHardware;
use trak_hal::{Delay, LimitSwitch, SpindleOutput, StepperEngine};

use crate::axis::AxisHandle;
use crate::console::BestEffort;
use crate::coordinator::{MotionAck, MotionCoordinator};
use crate::error::{HomingError, MotionError};
use crate::homing::{HomingPhase, HomingReport, HomingStateMachine};
use crate::spindle::{SpindleController, SpindleState};
use crate::units;

// ─── Hardware Bundle ────────────────────────────────────────────────

/// Hardware the machine is built on.
pub struct Hardware {
    pub left: Box<dyn StepperEngine>,
    pub right: Box<dyn StepperEngine>,
    pub z: Box<dyn StepperEngine>,
    pub z_limit: Box<dyn LimitSwitch>,
    pub spindle: Box<dyn SpindleOutput>,
    pub delay: Box<dyn Delay>,
}

impl From<SimulatedHardware> for Hardware {
    fn from(hw: SimulatedHardware) -> Self {
        Self {
            left: Box::new(hw.left),
            right: Box::new(hw.right),
            z: Box::new(hw.z),
            z_limit: Box::new(hw.z_limit),
            spindle: Box::new(hw.spindle),
            delay: Box::new(hw.delay),
        }
    }
}

// ─── Commands and Results ───────────────────────────────────────────

/// One inbound command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Drive(DriveRequest),
    Depth(DepthRequest),
    Home,
    Status,
    EmergencyStop,
    Spindle(SpindleRequest),
    ListSettings,
    GetSetting(SettingKey),
    SetSetting { key: SettingKey, value: String },
    ResetSettings,
}

/// Result of a successfully executed command.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "result", content = "data")]
pub enum Response {
    Motion(MotionAck),
    Homed(HomingReport),
    Status(MachineStatus),
    Spindle(SpindleState),
    Settings(Vec<SettingEntry>),
    Setting(SettingEntry),
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MachineError {
    #[error(transparent)]
    Motion(#[from] MotionError),

    #[error(transparent)]
    Homing(#[from] HomingError),

    #[error(transparent)]
    Settings(#[from] SettingsError),
}

impl MachineError {
    /// Caused by the request rather than by the machine.
    pub fn is_client_error(&self) -> bool {
        match self {
            Self::Motion(e) => e.is_client_error(),
            Self::Homing(e) => e.is_client_error(),
            Self::Settings(e) => matches!(
                e,
                SettingsError::UnknownKey(_)
                    | SettingsError::TypeMismatch { .. }
                    | SettingsError::InvalidValue { .. }
            ),
        }
    }
}

/// Per-axis status entry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AxisStatus {
    pub axis: Axis,
    pub position_steps: i64,
    pub position_mm: f64,
    pub speed_hz: f64,
    pub acceleration: f64,
    pub enabled: bool,
    pub running: bool,
}

/// Machine status snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MachineStatus {
    pub axes: Vec<AxisStatus>,
    pub z_homed: bool,
    pub homing_phase: HomingPhase,
    pub spindle: SpindleState,
    /// Some axis is still running an outstanding move.
    pub busy: bool,
}

// ─── Machine ────────────────────────────────────────────────────────

pub struct Machine {
    settings: SharedSettings,
    coordinator: MotionCoordinator,
    homing: HomingStateMachine,
    z_limit: Box<dyn LimitSwitch>,
    delay: Box<dyn Delay>,
    spindle: SpindleController,
    console: BestEffort,
}

impl std::fmt::Debug for Machine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Machine")
            .field("coordinator", &self.coordinator)
            .field("homing", &self.homing)
            .field("spindle", &self.spindle)
            .finish_non_exhaustive()
    }
}

impl Machine {
    pub fn new(
        settings: SharedSettings,
        hardware: Hardware,
        homing_limits: HomingLimitsConfig,
        console: BestEffort,
    ) -> Self {
        let coordinator = MotionCoordinator::new(
            settings.clone(),
            AxisHandle::new(Axis::Left, hardware.left),
            AxisHandle::new(Axis::Right, hardware.right),
            AxisHandle::new(Axis::Z, hardware.z),
        );
        Self {
            settings,
            coordinator,
            homing: HomingStateMachine::new(homing_limits),
            z_limit: hardware.z_limit,
            delay: hardware.delay,
            spindle: SpindleController::new(hardware.spindle),
            console,
        }
    }

    pub fn coordinator(&self) -> &MotionCoordinator {
        &self.coordinator
    }

    pub fn homing_phase(&self) -> HomingPhase {
        self.homing.phase()
    }

    fn spindle_settings(&self) -> Result<SpindleSettings, SettingsError> {
        let store = self.settings.read();
        Ok(SpindleSettings {
            max_rpm: store.int(SettingKey::SPINDLE_MAX_RPM)?,
            min_rpm: store.int(SettingKey::SPINDLE_MIN_RPM)?,
            laser_mode: store.flag(SettingKey::LASER_MODE)?,
        })
    }

    /// Run `motion` with the laser output gated on for its duration.
    fn with_motion<F>(&mut self, motion: F) -> Result<MotionAck, MachineError>
    where
        F: FnOnce(&mut MotionCoordinator) -> Result<MotionAck, MotionError>,
    {
        let spindle = self.spindle_settings()?;
        self.spindle.begin_motion(&spindle)?;
        let result = motion(&mut self.coordinator);
        if spindle.laser_mode {
            if let Err(e) = self.coordinator.wait_all() {
                warn!(%e, "Waiting for axes before laser off failed");
            }
        }
        self.spindle.end_motion(&spindle)?;
        Ok(result?)
    }

    pub fn drive(&mut self, request: DriveRequest) -> Result<MotionAck, MachineError> {
        let result = self.with_motion(|c| {
            c.drive_command(request.direction, request.step, request.speed)
        });
        match &result {
            Ok(ack) => self.console.success(format!(
                "Driving {} {} mm at {} mm/min",
                request.direction, request.step, ack.feed_mm_per_min
            )),
            Err(e) => self.console.error(format!("Drive failed: {e}")),
        }
        result
    }

    pub fn depth(&mut self, request: DepthRequest) -> Result<MotionAck, MachineError> {
        let result = self.with_motion(|c| c.depth_command(request.step, request.speed));
        match &result {
            Ok(ack) => self.console.success(format!(
                "Z moved {} mm at {} mm/min",
                request.step, ack.feed_mm_per_min
            )),
            Err(e) => self.console.error(format!("Depth move failed: {e}")),
        }
        result
    }

    /// Run the Z homing sequence.
    pub fn home(&mut self) -> Result<HomingReport, MachineError> {
        let settings = self.settings.read();
        if !settings.flag(SettingKey::HOMING_ENABLE)? {
            drop(settings);
            self.console.warning("Homing is disabled ($22=0)");
            return Err(HomingError::HomingConfigInvalid {
                key: SettingKey::HOMING_ENABLE,
            }
            .into());
        }
        self.console.info("Homing Z axis");

        let result = self.homing.z_homing(
            self.coordinator.handle_mut(Axis::Z),
            self.z_limit.as_mut(),
            self.delay.as_mut(),
            &settings,
        );
        drop(settings);

        match &result {
            Ok(_) => self.console.success("Z axis homed"),
            Err(e) => self.console.error(format!("Homing failed: {e}")),
        }
        Ok(result?)
    }

    /// Stop everything immediately. Z must be homed again afterwards.
    pub fn emergency_stop(&mut self) {
        self.coordinator.emergency_stop();
        if let Err(e) = self.spindle.stop() {
            warn!(%e, "Spindle stop failed during emergency stop");
        }
        self.z_limit.detach();
        self.homing.invalidate();
        self.console.error("Emergency stop");
    }

    pub fn spindle(&mut self, request: SpindleRequest) -> Result<SpindleState, MachineError> {
        let settings = self.spindle_settings()?;
        if let Some(percent) = request.speed {
            self.spindle.set_speed_percent(percent, &settings)?;
        }
        if let Some(on) = request.enable {
            self.spindle.set_enabled(on, &settings)?;
            self.console
                .info(if on { "Spindle on" } else { "Spindle off" });
        }
        Ok(self.spindle.state(&settings))
    }

    pub fn status(&self) -> Result<MachineStatus, MachineError> {
        let spindle = self.spindle_settings()?;
        let store = self.settings.read();
        let axes = self
            .coordinator
            .axis_states()
            .iter()
            .zip(Axis::ALL)
            .map(|(state, axis)| {
                let steps_per_mm = store.float(SettingKey::steps_per_mm(axis))?;
                let position_mm = if steps_per_mm > 0.0 {
                    units::distance_from_steps(state.position, steps_per_mm)
                } else {
                    0.0
                };
                Ok(AxisStatus {
                    axis,
                    position_steps: state.position,
                    position_mm,
                    speed_hz: state.speed_hz,
                    acceleration: state.acceleration,
                    enabled: state.enabled,
                    running: state.running,
                })
            })
            .collect::<Result<Vec<_>, SettingsError>>()?;

        Ok(MachineStatus {
            busy: axes.iter().any(|a| a.running),
            axes,
            z_homed: self.homing.is_homed(),
            homing_phase: self.homing.phase(),
            spindle: self.spindle.state(&spindle),
        })
    }

    pub fn settings(&self) -> Result<Vec<SettingEntry>, MachineError> {
        Ok(self.settings.read().list()?)
    }

    pub fn setting(&self, key: SettingKey) -> Result<SettingEntry, MachineError> {
        let store = self.settings.read();
        Ok(Self::entry(&store, key)?)
    }

    fn entry(store: &SettingsStore, key: SettingKey) -> Result<SettingEntry, SettingsError> {
        let def = key
            .def()
            .ok_or_else(|| SettingsError::UnknownKey(key.to_string()))?;
        Ok(SettingEntry {
            key,
            value: store.get(key, def.ty)?,
            ty: def.ty,
            description: def.description,
            unit: def.unit,
        })
    }

    /// Parse `value` according to the key's type and persist it.
    pub fn update_setting(
        &mut self,
        key: SettingKey,
        value: &str,
    ) -> Result<SettingEntry, MachineError> {
        let mut store = self.settings.write();
        match store.parse_and_set(key, value) {
            Ok(v) => {
                self.console.success(format!("{key}={v}"));
                Ok(Self::entry(&store, key)?)
            }
            Err(e) => {
                self.console.error(format!("Failed to set {key}: {e}"));
                Err(e.into())
            }
        }
    }

    pub fn reset_settings(&mut self) -> Result<Vec<SettingEntry>, MachineError> {
        let mut store = self.settings.write();
        store.reset_defaults()?;
        self.console.info("Settings reset to defaults");
        Ok(store.list()?)
    }

    /// Wait for every outstanding axis move.
    pub fn wait_idle(&mut self) -> Result<(), MachineError> {
        Ok(self.coordinator.wait_all()?)
    }

    pub fn execute(&mut self, command: Command) -> Result<Response, MachineError> {
        info!(?command, "Executing command");
        match command {
            Command::Drive(request) => self.drive(request).map(Response::Motion),
            Command::Depth(request) => self.depth(request).map(Response::Motion),
            Command::Home => self.home().map(Response::Homed),
            Command::Status => self.status().map(Response::Status),
            Command::EmergencyStop => {
                self.emergency_stop();
                Ok(Response::Stopped)
            }
            Command::Spindle(request) => self.spindle(request).map(Response::Spindle),
            Command::ListSettings => self.settings().map(Response::Settings),
            Command::GetSetting(key) => self.setting(key).map(Response::Setting),
            Command::SetSetting { key, value } => {
                self.update_setting(key, &value).map(Response::Setting)
            }
            Command::ResetSettings => self.reset_settings().map(Response::Settings),
        }
    }
}
