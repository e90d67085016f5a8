//! Homing State Machine integration tests.
//!
//! Full Z homing against the simulated engine and limit switch: success
//! path, configuration faults before any motion, seek timeout, release
//! ceiling and one-shot interrupt behavior.

use trak_common::axis::Axis;
use trak_common::config::{HomingLimitsConfig, PinConfig, SimulationConfig};
use trak_common::settings::{MemoryBackend, SettingKey, SettingsStore};
use trak_hal::drivers::simulation::{
    EngineEvent, EngineEventKind, SimDelay, SimulatedLimitSwitch, SimulatedStepper, StepperProbe,
};
use trak_hal::{LimitSwitch, SimulatedHardware};
use trak_motion::axis::{AxisHandle, MoveMode};
use trak_motion::{HomingError, HomingPhase, HomingStateMachine};

struct Rig {
    homing: HomingStateMachine,
    z: AxisHandle,
    probe: StepperProbe,
    switch: SimulatedLimitSwitch,
    delay: SimDelay,
    store: SettingsStore,
}

impl Rig {
    fn home(&mut self) -> Result<trak_motion::homing::HomingReport, HomingError> {
        self.homing.z_homing(
            &mut self.z,
            &mut self.switch,
            &mut self.delay,
            &self.store,
        )
    }
}

fn rig_with(z_switch_position: i64, limits: HomingLimitsConfig) -> Rig {
    let hw = SimulatedHardware::new(
        &PinConfig::default(),
        &SimulationConfig { z_switch_position },
    );
    let z: SimulatedStepper = hw.z;
    Rig {
        homing: HomingStateMachine::new(limits),
        probe: z.probe(),
        z: AxisHandle::new(Axis::Z, Box::new(z)),
        switch: hw.z_limit,
        delay: hw.delay,
        store: SettingsStore::open(MemoryBackend::new()).unwrap(),
    }
}

fn index_of(events: &[EngineEvent], pred: impl Fn(&EngineEventKind) -> bool) -> usize {
    events.iter().position(|e| pred(&e.kind)).unwrap()
}

fn rig() -> Rig {
    rig_with(-2_000, HomingLimitsConfig::default())
}

#[test]
fn test_successful_homing_zeroes_position_and_clears_flag() {
    let mut rig = rig();
    let report = rig.home().unwrap();

    assert_eq!(rig.homing.phase(), HomingPhase::Homed);
    assert!(rig.homing.is_homed());
    assert!(!rig.homing.flag_is_set());
    assert_eq!(rig.z.position(), 0);
    assert!(!rig.switch.is_armed());
    assert!(!rig.switch.is_active());
    assert_eq!(rig.switch.interrupt_count(), 1);

    // $24 = 25 mm/min at 250 steps/mm.
    assert_eq!(report.hz, 104);
    assert_eq!(report.pull_off_steps, 250);
    assert!(report.release_steps >= 1);
    assert!(report.seek_ms > 0 && report.seek_ms < 120_000);
    assert_eq!(rig.probe.physical_position(), -1_999 + 250);
}

#[test]
fn test_debounce_stops_and_cycles_driver() {
    let mut rig = rig();
    rig.home().unwrap();

    let events = rig.probe.events();
    let run = index_of(&events, |k| matches!(k, EngineEventKind::RunStarted(_)));
    let stop = index_of(&events, |k| matches!(k, EngineEventKind::Stopped));
    let disabled = index_of(&events, |k| matches!(k, EngineEventKind::Disabled));
    let enabled = index_of(&events, |k| matches!(k, EngineEventKind::Enabled));
    let step = index_of(&events, |k| matches!(k, EngineEventKind::Step(_)));
    let pull_off = index_of(&events, |k| {
        matches!(k, EngineEventKind::MoveStarted { steps: 250, .. })
    });
    let reset = index_of(&events, |k| matches!(k, EngineEventKind::PositionReset(0)));

    assert!(run < stop && stop < disabled && disabled < enabled);
    assert!(enabled < step && step < pull_off && pull_off < reset);
    assert!(events[enabled].at_us - events[disabled].at_us >= 250_000);
}

#[test]
fn test_each_zero_homing_key_faults_without_touching_hardware() {
    for key in [
        SettingKey::HOMING_FEED,
        SettingKey::STEPS_PER_MM_Z,
        SettingKey::HOMING_PULL_OFF,
        SettingKey::ACCELERATION_Z,
    ] {
        let mut rig = rig();
        rig.store.parse_and_set(key, "0").unwrap();

        let err = rig.home().unwrap_err();
        assert_eq!(err, HomingError::HomingConfigInvalid { key }, "{key}");
        assert_eq!(rig.homing.phase(), HomingPhase::Faulted);
        assert!(rig.probe.events().is_empty(), "{key} wrote engine state");
        assert!(!rig.switch.is_armed());
    }
}

#[test]
fn test_seek_timeout_is_homing_fault() {
    let limits = HomingLimitsConfig {
        seek_timeout_ms: 500,
        ..HomingLimitsConfig::default()
    };
    let mut rig = rig_with(-10_000_000, limits);

    let err = rig.home().unwrap_err();
    assert!(matches!(err, HomingError::HomingFault(_)));
    assert_eq!(rig.homing.phase(), HomingPhase::Faulted);
    assert!(!rig.z.is_running());
    assert!(!rig.switch.is_armed());
    assert!(!rig.homing.flag_is_set());
}

#[test]
fn test_stuck_switch_hits_release_ceiling() {
    let limits = HomingLimitsConfig {
        release_step_limit: 5,
        ..HomingLimitsConfig::default()
    };
    let mut rig = rig_with(-2_000, limits);
    rig.switch.force_level(Some(true));

    let err = rig.home().unwrap_err();
    assert!(matches!(err, HomingError::HomingFault(_)));
    assert_eq!(rig.homing.phase(), HomingPhase::Faulted);
    let steps = rig
        .probe
        .events()
        .iter()
        .filter(|e| matches!(e.kind, EngineEventKind::Step(_)))
        .count();
    assert_eq!(steps, 5);
}

#[test]
fn test_second_edge_does_not_refire() {
    let mut rig = rig();
    rig.home().unwrap();
    rig.switch.trigger();
    rig.switch.trigger();
    assert_eq!(rig.switch.interrupt_count(), 1);
    assert!(!rig.homing.flag_is_set());
}

#[test]
fn test_rehoming_returns_to_same_physical_origin() {
    let mut rig = rig();
    rig.home().unwrap();
    let origin = rig.probe.physical_position();

    rig.z.set_speed(2_000.0).unwrap();
    rig.z.move_relative(5_000, MoveMode::Blocking).unwrap();
    assert_eq!(rig.z.position(), 5_000);

    rig.home().unwrap();
    assert_eq!(rig.z.position(), 0);
    assert_eq!(rig.probe.physical_position(), origin);
    assert_eq!(rig.switch.interrupt_count(), 2);
}

#[test]
fn test_homing_after_fault_can_succeed() {
    let mut rig = rig();
    rig.store.parse_and_set(SettingKey::HOMING_FEED, "0").unwrap();
    assert!(rig.home().is_err());

    rig.store.parse_and_set(SettingKey::HOMING_FEED, "25").unwrap();
    rig.home().unwrap();
    assert_eq!(rig.homing.phase(), HomingPhase::Homed);
}
