//! Simulator Error Types

use isp_iq::IqError;
use isp_tuning::TuningError;
use multi_stats::StatsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("Configuration error: {0}")]
    Config(#[from] ::config::ConfigError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Tuning error: {0}")]
    Tuning(#[from] TuningError),

    #[error("IQ error: {0}")]
    Iq(#[from] IqError),

    #[error("Stats error: {0}")]
    Stats(#[from] StatsError),

    #[error("Logging setup failed: {0}")]
    Logging(String),

    #[error("Pipeline task failed: {0}")]
    Task(String),
}
