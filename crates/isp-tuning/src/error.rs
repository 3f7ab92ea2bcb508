//! Tuning Error Types

use thiserror::Error;

/// Errors while loading or resolving tuning data
#[derive(Debug, Error)]
pub enum TuningError {
    /// Tuning binary could not be read
    #[error("Unable to load tuning data from {path}: {reason}")]
    UnableToLoad { path: String, reason: String },

    /// Tuning document could not be parsed
    #[error("Malformed tuning data: {0}")]
    Malformed(#[from] serde_json::Error),

    /// No entry exists for the module under the requested mode
    #[error("No chromatix entry for module '{0}'")]
    NotFound(String),

    /// Entry exists but its content is unusable
    #[error("Invalid chromatix for module '{module}': {reason}")]
    InvalidChromatix { module: String, reason: String },
}
