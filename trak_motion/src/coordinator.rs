//! Motion Coordinator.
//!
//! Turns typed drive/depth requests into per-axis step targets and step
//! frequencies, enforces the feed-rate and soft-limit ceilings, and issues
//! the moves with the "longest axis blocks" discipline:
//!
//! | Step magnitudes            | Blocking axis |
//! |----------------------------|---------------|
//! | left strictly largest      | left          |
//! | right strictly largest     | right         |
//! | anything else (incl. ties) | Z             |
//!
//! Non-blocking axes are issued first and return immediately; the blocking
//! axis's move is issued last and is the one the caller waits on.

use serde::Serialize;
use tracing::{debug, info, warn};
use trak_common::axis::Axis;
use trak_common::command::DirectionCode;
use trak_common::settings::{MachineSettings, SharedSettings};

use crate::axis::{AxisHandle, AxisState, MoveMode};
use crate::error::MotionError;
use crate::units;

/// Per-axis targets of one coordinated move, in `Axis::ALL` order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CoordinatedMove {
    /// Signed relative steps.
    pub steps: [i64; 3],
    /// Cruise frequency [steps/s].
    pub hz: [u32; 3],
    /// Ramp acceleration [steps/s²].
    pub accel: [f64; 3],
}

impl CoordinatedMove {
    #[inline]
    pub fn steps(&self, axis: Axis) -> i64 {
        self.steps[axis.index()]
    }

    #[inline]
    pub fn hz(&self, axis: Axis) -> u32 {
        self.hz[axis.index()]
    }
}

/// Acknowledgement of a dispatched command.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MotionAck {
    pub left_steps: i64,
    pub right_steps: i64,
    pub z_steps: i64,
    pub left_hz: u32,
    pub right_hz: u32,
    pub z_hz: u32,
    /// Axis whose completion the call waited on.
    pub blocking_axis: Axis,
    /// Feed after clamping [mm/min].
    pub feed_mm_per_min: f64,
}

impl MotionAck {
    fn new(mv: &CoordinatedMove, blocking_axis: Axis, feed_mm_per_min: f64) -> Self {
        Self {
            left_steps: mv.steps(Axis::Left),
            right_steps: mv.steps(Axis::Right),
            z_steps: mv.steps(Axis::Z),
            left_hz: mv.hz(Axis::Left),
            right_hz: mv.hz(Axis::Right),
            z_hz: mv.hz(Axis::Z),
            blocking_axis,
            feed_mm_per_min,
        }
    }
}

/// Axis with the strictly largest step magnitude, Z otherwise.
pub fn select_blocking_axis(steps: [i64; 3]) -> Axis {
    let [l, r, z] = steps.map(i64::unsigned_abs);
    if l > r && l > z {
        Axis::Left
    } else if r > l && r > z {
        Axis::Right
    } else {
        Axis::Z
    }
}

fn require_positive(name: &str, value: f64) -> Result<(), MotionError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(MotionError::InvalidParameters(format!(
            "{name} must be a positive number, got {value}"
        )))
    }
}

fn move_steps(distance_mm: f64, steps_per_mm: f64) -> Result<i64, MotionError> {
    units::checked_steps_from_distance(distance_mm, steps_per_mm).ok_or_else(|| {
        MotionError::InvalidParameters(format!(
            "distance {distance_mm} mm exceeds {} steps",
            units::MAX_MOVE_STEPS
        ))
    })
}

fn zero_hz(feed: f64) -> MotionError {
    MotionError::InvalidParameters(format!("feed {feed} mm/min resolves to zero steps/s"))
}

pub struct MotionCoordinator {
    settings: SharedSettings,
    axes: [AxisHandle; 3],
}

impl std::fmt::Debug for MotionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MotionCoordinator")
            .field("axes", &self.axes)
            .finish()
    }
}

impl MotionCoordinator {
    pub fn new(
        settings: SharedSettings,
        left: AxisHandle,
        right: AxisHandle,
        z: AxisHandle,
    ) -> Self {
        Self {
            settings,
            axes: [left, right, z],
        }
    }

    #[inline]
    pub fn handle(&self, axis: Axis) -> &AxisHandle {
        &self.axes[axis.index()]
    }

    #[inline]
    pub fn handle_mut(&mut self, axis: Axis) -> &mut AxisHandle {
        &mut self.axes[axis.index()]
    }

    pub fn settings(&self) -> &SharedSettings {
        &self.settings
    }

    /// Current motion settings; any missing or zero motion key fails.
    pub fn machine_settings(&self) -> Result<MachineSettings, MotionError> {
        let machine = MachineSettings::load(&self.settings.read())?;
        machine.validate_motion()?;
        Ok(machine)
    }

    /// Plan a tank-drive move without dispatching it.
    pub fn plan_drive(
        &self,
        direction: DirectionCode,
        distance_mm: f64,
        feed_mm_per_min: f64,
    ) -> Result<(CoordinatedMove, f64), MotionError> {
        require_positive("distance", distance_mm)?;
        require_positive("feed", feed_mm_per_min)?;
        let machine = self.machine_settings()?;
        let left = machine.axis(Axis::Left);
        let right = machine.axis(Axis::Right);

        // Tracks always share speed, so the slower track's ceiling applies.
        let feed = units::clamp_feed(feed_mm_per_min, left.max_rate.min(right.max_rate));
        let (left_factor, right_factor) = direction.track_factors();
        let track_steps = |steps_per_mm: f64, factor: f64| -> Result<i64, MotionError> {
            let full = move_steps(distance_mm, steps_per_mm)?;
            Ok((full as f64 * factor).round() as i64)
        };
        let left_steps = track_steps(left.steps_per_mm, left_factor)?;
        let right_steps = track_steps(right.steps_per_mm, right_factor)?;
        if left_steps == 0 && right_steps == 0 {
            return Err(MotionError::InvalidParameters(format!(
                "distance {distance_mm} mm resolves to zero steps"
            )));
        }

        let left_hz = units::hz_from_feed(feed, left.steps_per_mm);
        let right_hz = units::hz_from_feed(feed, right.steps_per_mm);
        if (left_steps != 0 && left_hz == 0) || (right_steps != 0 && right_hz == 0) {
            return Err(zero_hz(feed));
        }

        let mv = CoordinatedMove {
            steps: [left_steps, right_steps, 0],
            hz: [left_hz, right_hz, 0],
            accel: [
                units::accel_steps_per_s2(left.acceleration, left.steps_per_mm),
                units::accel_steps_per_s2(right.acceleration, right.steps_per_mm),
                0.0,
            ],
        };
        Ok((mv, feed))
    }

    /// Tank-drive both tracks by `distance_mm` in `direction`.
    pub fn drive_command(
        &mut self,
        direction: DirectionCode,
        distance_mm: f64,
        feed_mm_per_min: f64,
    ) -> Result<MotionAck, MotionError> {
        let (mv, feed) = self.plan_drive(direction, distance_mm, feed_mm_per_min)?;
        if feed < feed_mm_per_min {
            debug!(requested = feed_mm_per_min, clamped = feed, "Track feed clamped");
        }
        info!(
            %direction,
            distance_mm,
            feed,
            left_steps = mv.steps(Axis::Left),
            right_steps = mv.steps(Axis::Right),
            "Drive command"
        );
        let blocking = self.coordinated_move(&mv)?;
        Ok(MotionAck::new(&mv, blocking, feed))
    }

    /// Plan a Z move without dispatching it.
    pub fn plan_depth(
        &self,
        distance_mm: f64,
        feed_mm_per_min: f64,
    ) -> Result<(CoordinatedMove, f64), MotionError> {
        if !distance_mm.is_finite() || distance_mm == 0.0 {
            return Err(MotionError::InvalidParameters(format!(
                "distance must be a non-zero number, got {distance_mm}"
            )));
        }
        require_positive("feed", feed_mm_per_min)?;
        let machine = self.machine_settings()?;
        let z = machine.axis(Axis::Z);

        let checked = units::checked_steps_from_distance(distance_mm, z.steps_per_mm);
        if machine.soft_limits {
            let limit = z.max_travel_steps().round() as i64;
            let target =
                checked.and_then(|steps| self.handle(Axis::Z).position().checked_add(steps));
            let beyond = match target {
                Some(target) => target.unsigned_abs() > limit.unsigned_abs(),
                None => true,
            };
            if beyond {
                let saturated = if distance_mm > 0.0 { i64::MAX } else { i64::MIN };
                return Err(MotionError::LimitExceeded {
                    axis: Axis::Z,
                    target_steps: target.unwrap_or(saturated),
                    limit_steps: limit,
                });
            }
        }
        let steps = move_steps(distance_mm, z.steps_per_mm)?;
        if steps == 0 {
            return Err(MotionError::InvalidParameters(format!(
                "distance {distance_mm} mm resolves to zero steps"
            )));
        }

        let feed = units::clamp_feed(feed_mm_per_min, z.max_rate);
        let hz = units::hz_from_feed(feed, z.steps_per_mm);
        if hz == 0 {
            return Err(zero_hz(feed));
        }
        let mv = CoordinatedMove {
            steps: [0, 0, steps],
            hz: [0, 0, hz],
            accel: [
                0.0,
                0.0,
                units::accel_steps_per_s2(z.acceleration, z.steps_per_mm),
            ],
        };
        Ok((mv, feed))
    }

    /// Move the tool head by `distance_mm` (positive is down).
    pub fn depth_command(
        &mut self,
        distance_mm: f64,
        feed_mm_per_min: f64,
    ) -> Result<MotionAck, MotionError> {
        let (mv, feed) = match self.plan_depth(distance_mm, feed_mm_per_min) {
            Ok(plan) => plan,
            Err(e @ MotionError::LimitExceeded { .. }) => {
                warn!(%e, "Depth command rejected");
                return Err(e);
            }
            Err(e) => return Err(e),
        };
        info!(distance_mm, feed, z_steps = mv.steps(Axis::Z), "Depth command");
        let blocking = self.coordinated_move(&mv)?;
        Ok(MotionAck::new(&mv, blocking, feed))
    }

    /// Issue `mv` to all three axes and wait on the blocking axis.
    ///
    /// Axes with zero steps are not issued a move. If an axis rejects its
    /// move, axes already started are stopped and the error is returned.
    pub fn coordinated_move(&mut self, mv: &CoordinatedMove) -> Result<Axis, MotionError> {
        let blocking = select_blocking_axis(mv.steps);
        debug!(steps = ?mv.steps, hz = ?mv.hz, %blocking, "Coordinated move");

        let order = Axis::ALL
            .into_iter()
            .filter(|a| *a != blocking)
            .chain(std::iter::once(blocking));

        let mut started: Vec<Axis> = Vec::with_capacity(3);
        for axis in order {
            let steps = mv.steps(axis);
            if steps == 0 {
                continue;
            }
            let mode = if axis == blocking {
                MoveMode::Blocking
            } else {
                MoveMode::NonBlocking
            };
            if let Err(source) = self.issue(axis, mv, mode) {
                warn!(%axis, %source, "Move rejected, stopping started axes");
                for a in &started {
                    self.handle_mut(*a).force_stop();
                }
                return Err(MotionError::actuation(axis, source));
            }
            started.push(axis);
        }
        Ok(blocking)
    }

    fn issue(
        &mut self,
        axis: Axis,
        mv: &CoordinatedMove,
        mode: MoveMode,
    ) -> Result<(), trak_hal::HalError> {
        let handle = self.handle_mut(axis);
        handle.wait_idle()?;
        if !handle.is_enabled() {
            handle.enable();
        }
        handle.set_acceleration(mv.accel[axis.index()])?;
        handle.set_speed(f64::from(mv.hz(axis)))?;
        handle.move_relative(mv.steps(axis), mode)
    }

    /// Force-stop and disable every axis.
    pub fn emergency_stop(&mut self) {
        for handle in self.axes.iter_mut() {
            handle.force_stop();
            handle.disable();
        }
        warn!("Emergency stop: all axes stopped and disabled");
    }

    /// Wait for every outstanding move.
    pub fn wait_all(&mut self) -> Result<(), MotionError> {
        for handle in self.axes.iter_mut() {
            let axis = handle.axis();
            handle
                .wait_idle()
                .map_err(|e| MotionError::actuation(axis, e))?;
        }
        Ok(())
    }

    pub fn is_busy(&self) -> bool {
        self.axes.iter().any(AxisHandle::is_running)
    }

    pub fn axis_states(&self) -> [AxisState; 3] {
        [
            self.axes[0].state(),
            self.axes[1].state(),
            self.axes[2].state(),
        ]
    }
}
