//! Simulator configuration

use crate::error::SimError;
use ::config::{Config, Environment, File};
use isp_iq::{
    CropWindow, HdrBeStatsConfig, ModuleKind, OemOverrides, PipelineConfig, SensorInfo,
    StreamConfig,
};
use multi_stats::{MultiStatsStrategy, StatsAlgoRole};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Environment prefix for overrides, e.g. `ISP_SIM__FRAMES=120`
pub const ENV_PREFIX: &str = "ISP_SIM";

/// One simulated camera pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimPipelineConfig {
    pub pipeline: PipelineConfig,
    /// Stats algorithm role of this pipeline
    pub role: StatsAlgoRole,
    pub peer_pipeline_id: Option<u32>,
    pub algo_sync_enabled: bool,
    /// Peer request paired with local request `r` is `r + peer_request_offset`
    pub peer_request_offset: i64,
    pub sensor: SensorInfo,
    pub stream: StreamConfig,
    pub crop_window: CropWindow,
    pub hdr_be: HdrBeStatsConfig,
    pub oem: OemOverrides,
    /// Time spent per frame (milliseconds)
    pub frame_interval_ms: u64,
}

impl Default for SimPipelineConfig {
    fn default() -> Self {
        Self {
            pipeline: PipelineConfig::default(),
            role: StatsAlgoRole::Default,
            peer_pipeline_id: None,
            algo_sync_enabled: false,
            peer_request_offset: 0,
            sensor: SensorInfo::default(),
            stream: StreamConfig::default(),
            crop_window: CropWindow::new(80, 420, 3840, 2160),
            hdr_be: HdrBeStatsConfig {
                roi: CropWindow::new(0, 0, 4000, 3000),
                horizontal_num: 64,
                vertical_num: 48,
                channel_thresholds: [4000; 4],
            },
            oem: OemOverrides::default(),
            frame_interval_ms: 33,
        }
    }
}

impl SimPipelineConfig {
    fn paired(pipeline_id: u32, name: &str, role: StatsAlgoRole, peer: u32) -> Self {
        Self {
            pipeline: PipelineConfig {
                pipeline_id,
                name: name.to_string(),
                ..Default::default()
            },
            role,
            peer_pipeline_id: Some(peer),
            algo_sync_enabled: true,
            ..Default::default()
        }
    }
}

/// Simulator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Requests to run per pipeline
    pub frames: u64,
    /// Max tracing level (trace, debug, info, warn, error)
    pub log_level: String,
    /// JSON tuning tree; the built-in tree is used when unset
    pub tuning_path: Option<String>,
    /// How long a request waits for its dependencies (milliseconds)
    pub request_timeout_ms: u64,
    pub strategy: MultiStatsStrategy,
    pub pipelines: Vec<SimPipelineConfig>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            frames: 60,
            log_level: "info".to_string(),
            tuning_path: None,
            request_timeout_ms: 100,
            strategy: MultiStatsStrategy::Qti,
            pipelines: vec![
                SimPipelineConfig::paired(0, "wide", StatsAlgoRole::Master, 1),
                SimPipelineConfig::paired(1, "tele", StatsAlgoRole::Slave, 0),
            ],
        }
    }
}

impl SimConfig {
    /// Load from an optional file plus `ISP_SIM__*` environment overrides
    pub fn load(path: Option<&str>) -> Result<Self, SimError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::with_name(path).required(false));
        }
        let settings = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;
        let config: SimConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the simulator cannot run
    pub fn validate(&self) -> Result<(), SimError> {
        if self.pipelines.is_empty() {
            return Err(SimError::InvalidConfig("no pipelines configured".to_string()));
        }
        let mut ids = HashSet::new();
        for sim in &self.pipelines {
            let id = sim.pipeline.pipeline_id;
            if !ids.insert(id) {
                return Err(SimError::InvalidConfig(format!("duplicate pipeline id {}", id)));
            }
            if sim.peer_pipeline_id == Some(id) {
                return Err(SimError::InvalidConfig(format!("pipeline {} is its own peer", id)));
            }
            if sim.pipeline.modules.contains(&ModuleKind::Crop)
                && sim.crop_window.width > sim.sensor.width
            {
                return Err(SimError::InvalidConfig(format!(
                    "pipeline {} crop wider than sensor",
                    id
                )));
            }
        }
        for sim in &self.pipelines {
            if let Some(peer) = sim.peer_pipeline_id {
                if !ids.contains(&peer) {
                    return Err(SimError::InvalidConfig(format!(
                        "pipeline {} names unknown peer {}",
                        sim.pipeline.pipeline_id, peer
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid_pair() {
        let config = SimConfig::default();
        config.validate().unwrap();
        assert_eq!(config.pipelines.len(), 2);
        assert_eq!(config.pipelines[1].role, StatsAlgoRole::Slave);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = SimConfig::load(Some("does/not/exist")).unwrap();
        assert_eq!(config.pipelines.len(), 2);
    }

    #[test]
    fn test_unknown_peer_rejected() {
        let mut config = SimConfig::default();
        config.pipelines[0].peer_pipeline_id = Some(7);
        assert!(matches!(config.validate(), Err(SimError::InvalidConfig(_))));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: SimConfig = serde_json::from_str(r#"{"frames": 5, "strategy": "NoSync"}"#).unwrap();
        assert_eq!(config.frames, 5);
        assert_eq!(config.strategy, MultiStatsStrategy::NoSync);
        assert_eq!(config.request_timeout_ms, 100);
    }
}
