//! Motion and homing error taxonomy.
//!
//! Every variant is returned to the caller as a typed result; none aborts
//! the process. `is_client_error()` separates faults caused by the request
//! (mapped to 4xx by the external HTTP layer) from system faults (5xx).

use thiserror::Error;
use trak_common::axis::Axis;
use trak_common::settings::{SettingKey, SettingsError};
use trak_hal::HalError;

/// Errors of the Motion Coordinator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MotionError {
    /// Zero, negative, non-finite or unrecognized request field.
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    /// Requested travel would leave the soft travel envelope.
    #[error(
        "Soft limit exceeded on {axis}: target {target_steps} steps, limit ±{limit_steps} steps"
    )]
    LimitExceeded {
        axis: Axis,
        target_steps: i64,
        limit_steps: i64,
    },

    /// Missing or zero-valued setting.
    #[error(transparent)]
    ConfigMissing(#[from] SettingsError),

    /// The engine rejected a move. Fatal to this command only.
    #[error("Actuation failure on {axis}: {source}")]
    ActuationFailure {
        axis: Axis,
        #[source]
        source: HalError,
    },

    /// Spindle/laser output rejected a command.
    #[error("Spindle output failure: {0}")]
    SpindleFailure(#[source] HalError),
}

impl MotionError {
    pub fn actuation(axis: Axis, source: HalError) -> Self {
        Self::ActuationFailure { axis, source }
    }

    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidParameters(_) | Self::LimitExceeded { .. }
        )
    }
}

/// Errors of the Homing State Machine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HomingError {
    /// A homing-relevant setting is zero; nothing was moved.
    #[error("Homing configuration invalid: {key} is zero")]
    HomingConfigInvalid { key: SettingKey },

    /// The sequence could not complete within its safety bounds.
    #[error("Homing fault: {0}")]
    HomingFault(String),

    #[error(transparent)]
    ConfigMissing(#[from] SettingsError),

    #[error("Actuation failure during homing: {0}")]
    ActuationFailure(#[from] HalError),
}

impl HomingError {
    /// Homing has no client-caused failures.
    pub fn is_client_error(&self) -> bool {
        false
    }
}
