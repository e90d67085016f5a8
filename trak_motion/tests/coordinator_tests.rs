//! Motion Coordinator integration tests.
//!
//! Drive and depth commands against the simulated platform: step/Hz
//! targets, feed clamping, soft limits, the blocking-axis discipline and
//! failure handling.

use trak_common::axis::Axis;
use trak_common::command::DirectionCode;
use trak_common::settings::{self, MemoryBackend, SettingKey, SettingsError, SettingsStore};
use trak_hal::SimulatedHardware;
use trak_hal::drivers::simulation::{EngineEventKind, SimClock, StepperProbe};
use trak_motion::axis::AxisHandle;
use trak_motion::{MotionCoordinator, MotionError};

struct Rig {
    coordinator: MotionCoordinator,
    probes: [StepperProbe; 3],
    clock: SimClock,
}

fn rig_with(store: SettingsStore) -> Rig {
    let hw = SimulatedHardware::default();
    let probes = hw.probes();
    let clock = hw.clock.clone();
    let coordinator = MotionCoordinator::new(
        settings::shared(store),
        AxisHandle::new(Axis::Left, Box::new(hw.left)),
        AxisHandle::new(Axis::Right, Box::new(hw.right)),
        AxisHandle::new(Axis::Z, Box::new(hw.z)),
    );
    Rig {
        coordinator,
        probes,
        clock,
    }
}

fn rig() -> Rig {
    rig_with(SettingsStore::open(MemoryBackend::new()).unwrap())
}

fn rig_with_settings(pairs: &[(SettingKey, &str)]) -> Rig {
    let mut store = SettingsStore::open(MemoryBackend::new()).unwrap();
    for (key, value) in pairs {
        store.parse_and_set(*key, value).unwrap();
    }
    rig_with(store)
}

fn first_start_seq(probe: &StepperProbe) -> u64 {
    probe
        .events()
        .into_iter()
        .find(|e| matches!(e.kind, EngineEventKind::MoveStarted { .. }))
        .map(|e| e.seq)
        .unwrap()
}

#[test]
fn test_forward_scenario_clamps_feed() {
    let mut rig = rig();
    let ack = rig
        .coordinator
        .drive_command(DirectionCode::Forward, 10.0, 600.0)
        .unwrap();

    assert_eq!(ack.feed_mm_per_min, 500.0);
    assert_eq!((ack.left_steps, ack.right_steps, ack.z_steps), (2500, 2500, 0));
    assert_eq!((ack.left_hz, ack.right_hz), (2083, 2083));
    assert_eq!(rig.probes[0].started_moves(), vec![(2500, 2083.0)]);
    assert_eq!(rig.probes[1].started_moves(), vec![(2500, 2083.0)]);
    assert!(rig.probes[2].started_moves().is_empty());
}

#[test]
fn test_forward_left_scenario() {
    let mut rig = rig();
    let ack = rig
        .coordinator
        .drive_command(DirectionCode::ForwardLeft, 10.0, 600.0)
        .unwrap();

    assert_eq!(ack.left_steps, 1250);
    assert_eq!(ack.right_steps, 2500);
    assert_eq!(ack.blocking_axis, Axis::Right);
}

#[test]
fn test_every_direction_matches_track_factors() {
    for direction in DirectionCode::ALL {
        let mut rig = rig();
        let ack = rig.coordinator.drive_command(direction, 4.0, 300.0).unwrap();
        let (l, r) = direction.track_factors();
        assert_eq!(ack.left_steps, (1000.0 * l) as i64, "{direction}");
        assert_eq!(ack.right_steps, (1000.0 * r) as i64, "{direction}");
        assert_eq!(ack.left_hz, ack.right_hz, "{direction}");
    }
}

#[test]
fn test_longest_axis_blocks_and_is_issued_last() {
    let mut rig = rig();
    rig.coordinator
        .drive_command(DirectionCode::ForwardLeft, 10.0, 500.0)
        .unwrap();

    let [left, right, _] = &rig.probes;
    assert!(first_start_seq(left) < first_start_seq(right));
    assert!(right.saw(|k| matches!(k, EngineEventKind::WaitedIdle)));
    assert!(!left.saw(|k| matches!(k, EngineEventKind::WaitedIdle)));
    assert!(!right.is_running());
    assert_eq!(right.position(), 2500);
}

#[test]
fn test_track_tie_blocks_on_z_and_leaves_tracks_running() {
    let mut rig = rig();
    let ack = rig
        .coordinator
        .drive_command(DirectionCode::TurnLeft, 10.0, 500.0)
        .unwrap();

    assert_eq!(ack.blocking_axis, Axis::Z);
    assert_eq!((ack.left_steps, ack.right_steps), (-2500, 2500));
    assert!(rig.coordinator.is_busy());
    assert_eq!(rig.clock.now_us(), 0);

    rig.coordinator.wait_all().unwrap();
    assert!(!rig.coordinator.is_busy());
    assert_eq!(rig.probes[0].position(), -2500);
    assert_eq!(rig.probes[1].position(), 2500);
}

#[test]
fn test_second_move_waits_for_outstanding_move() {
    let mut rig = rig();
    rig.coordinator
        .drive_command(DirectionCode::Forward, 10.0, 500.0)
        .unwrap();
    rig.coordinator
        .drive_command(DirectionCode::Backward, 4.0, 500.0)
        .unwrap();
    rig.coordinator.wait_all().unwrap();

    for probe in &rig.probes[..2] {
        assert!(!probe.saw(|k| matches!(k, EngineEventKind::MoveDropped { .. })));
        assert_eq!(probe.position(), 1500);
    }
}

#[test]
fn test_zero_or_invalid_requests_rejected() {
    let mut rig = rig();
    for (distance, feed) in [
        (0.0, 100.0),
        (-5.0, 100.0),
        (f64::NAN, 100.0),
        (5.0, 0.0),
        (5.0, -1.0),
        (5.0, f64::INFINITY),
        (0.0001, 100.0),
        // 0.1 mm/min at 250 steps/mm is 0.42 steps/s.
        (10.0, 0.1),
        (1e300, 100.0),
    ] {
        let err = rig
            .coordinator
            .drive_command(DirectionCode::Forward, distance, feed)
            .unwrap_err();
        assert!(
            matches!(err, MotionError::InvalidParameters(_)),
            "({distance}, {feed}) gave {err:?}"
        );
        assert!(err.is_client_error());
    }
    assert!(rig.probes.iter().all(|p| p.events().is_empty()));
}

#[test]
fn test_invalid_depth_requests_rejected_before_dispatch() {
    let mut rig = rig();
    for (distance, feed) in [
        (0.0, 100.0),
        (f64::NAN, 100.0),
        (1.0, 0.0),
        (1.0, 0.1),
        (0.001, 100.0),
        (1e300, 100.0),
        (-1e300, 100.0),
    ] {
        let err = rig.coordinator.depth_command(distance, feed).unwrap_err();
        assert!(
            matches!(err, MotionError::InvalidParameters(_)),
            "({distance}, {feed}) gave {err:?}"
        );
        assert!(err.is_client_error());
    }
    assert!(rig.probes.iter().all(|p| p.events().is_empty()));
}

#[test]
fn test_zero_motion_setting_is_config_fault() {
    let mut rig = rig_with_settings(&[(SettingKey::MAX_RATE_X, "0")]);
    let err = rig
        .coordinator
        .drive_command(DirectionCode::Forward, 10.0, 500.0)
        .unwrap_err();
    assert_eq!(
        err,
        MotionError::ConfigMissing(SettingsError::ZeroValue(SettingKey::MAX_RATE_X))
    );
    assert!(!err.is_client_error());
}

#[test]
fn test_depth_soft_limit_scenario() {
    let mut rig = rig_with_settings(&[(SettingKey::SOFT_LIMITS, "1")]);
    let err = rig.coordinator.depth_command(250.0, 100.0).unwrap_err();
    assert!(matches!(
        err,
        MotionError::LimitExceeded {
            axis: Axis::Z,
            target_steps: 62_500,
            limit_steps: 50_000,
        }
    ));
    assert!(rig.probes[2].started_moves().is_empty());
}

#[test]
fn test_depth_soft_limit_counts_current_position() {
    let mut rig = rig_with_settings(&[(SettingKey::SOFT_LIMITS, "1")]);
    rig.coordinator.depth_command(150.0, 500.0).unwrap();
    assert_eq!(rig.probes[2].position(), 37_500);

    let err = rig.coordinator.depth_command(60.0, 500.0).unwrap_err();
    assert!(matches!(err, MotionError::LimitExceeded { .. }));
    assert!(rig.coordinator.depth_command(-150.0, 500.0).is_ok());
    assert_eq!(rig.probes[2].position(), 0);
}

#[test]
fn test_depth_soft_limit_at_extreme_distances() {
    let mut rig = rig_with_settings(&[(SettingKey::SOFT_LIMITS, "1")]);
    rig.coordinator.depth_command(1.0, 100.0).unwrap();
    assert_eq!(rig.probes[2].position(), 250);

    for (distance, target) in [
        (1e300, i64::MAX),
        (-1e300, i64::MIN),
        (f64::MAX, i64::MAX),
        (1e6, 250 + 250_000_000),
    ] {
        let err = rig.coordinator.depth_command(distance, 100.0).unwrap_err();
        assert_eq!(
            err,
            MotionError::LimitExceeded {
                axis: Axis::Z,
                target_steps: target,
                limit_steps: 50_000,
            },
            "{distance}"
        );
        assert!(err.is_client_error());
    }
    assert_eq!(rig.probes[2].started_moves().len(), 1);
    assert_eq!(rig.probes[2].position(), 250);
}

#[test]
fn test_depth_without_soft_limits_allows_long_travel() {
    let mut rig = rig();
    let ack = rig.coordinator.depth_command(250.0, 1_000.0).unwrap();
    assert_eq!(ack.z_steps, 62_500);
    assert_eq!(ack.z_hz, 2083);
    assert_eq!(ack.blocking_axis, Axis::Z);
    assert_eq!(rig.probes[2].position(), 62_500);
}

#[test]
fn test_actuation_failure_stops_started_axes() {
    let mut rig = rig();
    rig.probes[1].inject_fault("driver fault");

    let err = rig
        .coordinator
        .drive_command(DirectionCode::ForwardLeft, 10.0, 500.0)
        .unwrap_err();
    assert!(matches!(
        err,
        MotionError::ActuationFailure {
            axis: Axis::Right,
            ..
        }
    ));
    assert!(!err.is_client_error());
    assert!(rig.probes[0].saw(|k| matches!(k, EngineEventKind::Stopped)));
    assert!(!rig.probes[0].is_running());

    // Fatal to the command only.
    assert!(rig
        .coordinator
        .drive_command(DirectionCode::Forward, 1.0, 500.0)
        .is_ok());
}

#[test]
fn test_emergency_stop_then_motion_reenables() {
    let mut rig = rig();
    rig.coordinator
        .drive_command(DirectionCode::Forward, 10.0, 500.0)
        .unwrap();
    assert!(rig.coordinator.is_busy());

    rig.coordinator.emergency_stop();
    assert!(!rig.coordinator.is_busy());
    assert!(rig.probes.iter().all(|p| !p.is_enabled()));

    rig.coordinator
        .drive_command(DirectionCode::Forward, 1.0, 500.0)
        .unwrap();
    assert!(rig.probes[0].is_enabled());
    assert!(rig.probes[1].is_enabled());
}
