//! Tuning data loading

use crate::error::SimError;
use isp_tuning::{ChromatixTree, StaticTuningManager};
use tracing::info;

/// Tuning tree used when no file is configured
pub const DEFAULT_TUNING_JSON: &str = include_str!("../tuning/default_tuning.json");

/// Load the configured tuning tree, or the built-in one
pub fn load_tuning(path: Option<&str>) -> Result<StaticTuningManager, SimError> {
    let tree = match path {
        Some(path) => ChromatixTree::from_json_file(path)?,
        None => {
            let tree = ChromatixTree::from_json_str(DEFAULT_TUNING_JSON)?;
            info!("Using built-in tuning tree ({} modules)", tree.module_count());
            tree
        }
    };
    Ok(StaticTuningManager::new(tree))
}
