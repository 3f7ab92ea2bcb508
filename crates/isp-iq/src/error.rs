//! IQ Module Error Types

use isp_tuning::TuningError;
use thiserror::Error;

/// Errors returned by IQ module execution
#[derive(Debug, Error)]
pub enum IqError {
    /// Missing or malformed input; nothing was applied
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Allocation of module resources failed; module stays disabled
    #[error("Out of memory: {0}")]
    OutOfMemory(String),

    /// Setting calculation rejected the calibration state
    #[error("{module} calculation failed: {reason}")]
    CalculationFailed { module: &'static str, reason: String },

    /// Requested feature is not available on this hardware
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// External resource (tuning binary) missing or unreadable
    #[error("Unable to load: {0}")]
    UnableToLoad(String),

    /// Command buffer cannot hold the packet
    #[error("Command buffer full: need {needed} dwords, {available} available")]
    CommandBuffer { needed: usize, available: usize },
}

impl From<TuningError> for IqError {
    fn from(err: TuningError) -> Self {
        match err {
            TuningError::UnableToLoad { .. } | TuningError::Malformed(_) => {
                IqError::UnableToLoad(err.to_string())
            }
            TuningError::NotFound(_) | TuningError::InvalidChromatix { .. } => {
                IqError::Unsupported(err.to_string())
            }
        }
    }
}
