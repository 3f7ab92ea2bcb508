//! Module pipeline driver.
//!
//! Runs the installed modules in hardware order once per frame. A module
//! failure is logged and counted; the remaining modules still run.

use crate::cmd_buffer::DEFAULT_CMD_BUFFER_DWORDS;
use crate::error::IqError;
use crate::input::IspInputData;
use crate::modules::{ExecuteOutcome, IqModule, ModuleKind};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Static description of one pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Pipeline identifier used by multi-camera coordination
    pub pipeline_id: u32,
    pub name: String,
    /// Installed modules, in any order
    pub modules: Vec<ModuleKind>,
    /// Command buffer size per frame (dwords)
    #[serde(default = "default_cmd_buffer_dwords")]
    pub cmd_buffer_dwords: usize,
}

fn default_cmd_buffer_dwords() -> usize {
    DEFAULT_CMD_BUFFER_DWORDS
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            pipeline_id: 0,
            name: "ife0".to_string(),
            modules: vec![
                ModuleKind::Pedestal,
                ModuleKind::Linearization,
                ModuleKind::Demosaic,
                ModuleKind::ColorCorrection,
                ModuleKind::Crop,
                ModuleKind::HdrBeStats,
            ],
            cmd_buffer_dwords: DEFAULT_CMD_BUFFER_DWORDS,
        }
    }
}

/// Per-frame result of [`ModulePipeline::execute_frame`]
#[derive(Debug, Default)]
pub struct FrameResult {
    pub frame_id: u64,
    /// Modules whose registers were emitted this frame
    pub recomputed: Vec<ModuleKind>,
    /// Modules that kept their previous configuration
    pub skipped: Vec<ModuleKind>,
    pub failures: Vec<(ModuleKind, IqError)>,
}

impl FrameResult {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Ordered set of IQ modules for one hardware pipeline
#[derive(Debug)]
pub struct ModulePipeline {
    config: PipelineConfig,
    modules: Vec<IqModule>,
}

impl ModulePipeline {
    /// Create the modules listed in `config`, sorted into hardware order
    pub fn new(config: PipelineConfig) -> Result<Self, IqError> {
        let mut kinds = config.modules.clone();
        kinds.sort_by_key(|kind| kind.hw_order());
        if let Some(pair) = kinds.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(IqError::InvalidArgument(format!(
                "module {} installed twice",
                pair[0].name()
            )));
        }

        let modules: Vec<IqModule> = kinds.into_iter().map(IqModule::create).collect();
        info!(
            "Pipeline {} ({}) created with {} modules",
            config.pipeline_id,
            config.name,
            modules.len()
        );
        Ok(Self { config, modules })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn module(&self, kind: ModuleKind) -> Option<&IqModule> {
        self.modules.iter().find(|m| m.kind() == kind)
    }

    /// Installed modules in execution order
    pub fn kinds(&self) -> Vec<ModuleKind> {
        self.modules.iter().map(IqModule::kind).collect()
    }

    /// Run every module for one frame
    pub fn execute_frame(&mut self, input: &mut IspInputData<'_>) -> FrameResult {
        let mut result = FrameResult {
            frame_id: input.frame_id,
            ..Default::default()
        };
        metrics::counter!("isp_frames_total").increment(1);

        for module in &mut self.modules {
            let kind = module.kind();
            match module.execute(input) {
                Ok(ExecuteOutcome::Recomputed) => {
                    metrics::counter!("isp_module_recompute_total", "module" => kind.name())
                        .increment(1);
                    result.recomputed.push(kind);
                }
                Ok(ExecuteOutcome::Skipped) => result.skipped.push(kind),
                Err(err) => {
                    warn!(
                        "Pipeline {} frame {}: {} failed: {}",
                        self.config.pipeline_id,
                        input.frame_id,
                        kind.name(),
                        err
                    );
                    metrics::counter!("isp_module_failure_total", "module" => kind.name())
                        .increment(1);
                    result.failures.push((kind, err));
                }
            }
        }

        debug!(
            "Pipeline {} frame {}: {} recomputed, {} skipped, {} failed",
            self.config.pipeline_id,
            input.frame_id,
            result.recomputed.len(),
            result.skipped.len(),
            result.failures.len()
        );
        result
    }
}
