//! ISP pipeline simulator - main entry point

use isp_sim::{init_logging, load_tuning, run_simulation, SimConfig};
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args().nth(1);
    let config = SimConfig::load(config_path.as_deref())?;
    init_logging(&config.log_level)?;

    info!("=== ISP Pipeline Simulator v{} ===", env!("CARGO_PKG_VERSION"));
    info!(
        "{} pipelines, {} frames, {:?} multi-stats",
        config.pipelines.len(),
        config.frames,
        config.strategy
    );

    let tuning = Arc::new(load_tuning(config.tuning_path.as_deref())?);
    let report = run_simulation(&config, tuning).await?;

    for pipeline in &report.pipelines {
        info!(
            "Pipeline {} ({}): {} frames, {} algo runs, {} peer reuses, {} module recomputes, {} failures",
            pipeline.pipeline_id,
            pipeline.name,
            pipeline.frames,
            pipeline.algo_runs,
            pipeline.peer_reused,
            pipeline.module_recomputes,
            pipeline.module_failures
        );
    }
    if report.total_failures() > 0 {
        warn!("Simulation finished with {} failures", report.total_failures());
    }
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
