//! ISP Pipeline Simulator
//!
//! Drives one IQ module pipeline per configured camera on its own tokio
//! task, coordinating paired pipelines through a multi-stats operator and
//! a shared property board.

pub mod board;
pub mod config;
pub mod error;
pub mod sim;
pub mod tuning;

pub use board::{PropertyBoard, Publication};
pub use crate::config::{SimConfig, SimPipelineConfig};
pub use error::SimError;
pub use sim::{run_simulation, PipelineReport, SimReport};
pub use tuning::load_tuning;

use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Initialize logging at `level` (trace, debug, info, warn, error)
pub fn init_logging(level: &str) -> Result<(), SimError> {
    let level: Level = level
        .parse()
        .map_err(|_| SimError::InvalidConfig(format!("unknown log level '{}'", level)))?;
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber).map_err(|e| SimError::Logging(e.to_string()))
}
