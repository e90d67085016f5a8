//! Unit Converter.
//!
//! Pure functions between machine units (mm, mm/min, mm/s²) and engine
//! units (steps, steps/s). Rounding is half away from zero. Feed ceilings
//! are applied in mm/min with [`clamp_feed`] before converting to Hz.

/// `round(mm × steps_per_mm)`.
#[inline]
pub fn steps_from_distance(mm: f64, steps_per_mm: f64) -> i64 {
    (mm * steps_per_mm).round() as i64
}

/// Largest step count a single move may carry.
pub const MAX_MOVE_STEPS: i64 = i32::MAX as i64;

/// [`steps_from_distance`], or `None` when the result is not finite or
/// exceeds [`MAX_MOVE_STEPS`] in magnitude.
#[inline]
pub fn checked_steps_from_distance(mm: f64, steps_per_mm: f64) -> Option<i64> {
    let raw = (mm * steps_per_mm).round();
    if raw.is_finite() && raw.abs() <= MAX_MOVE_STEPS as f64 {
        Some(raw as i64)
    } else {
        None
    }
}

/// `round(mm_per_min × steps_per_mm / 60)`.
#[inline]
pub fn hz_from_feed(mm_per_min: f64, steps_per_mm: f64) -> u32 {
    (mm_per_min * steps_per_mm / 60.0).round() as u32
}

/// Inverse of [`steps_from_distance`] [mm].
#[inline]
pub fn distance_from_steps(steps: i64, steps_per_mm: f64) -> f64 {
    steps as f64 / steps_per_mm
}

/// Inverse of [`hz_from_feed`] [mm/min].
#[inline]
pub fn feed_from_hz(hz: u32, steps_per_mm: f64) -> f64 {
    f64::from(hz) * 60.0 / steps_per_mm
}

/// Engine acceleration [steps/s²] for an axis acceleration [mm/s²].
#[inline]
pub fn accel_steps_per_s2(mm_per_s2: f64, steps_per_mm: f64) -> f64 {
    mm_per_s2 * steps_per_mm
}

/// Feed ceiling in mm/min space.
#[inline]
pub fn clamp_feed(requested_mm_per_min: f64, max_mm_per_min: f64) -> f64 {
    requested_mm_per_min.min(max_mm_per_min)
}
