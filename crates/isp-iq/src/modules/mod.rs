//! IQ module protocol.
//!
//! Every module follows the same per-frame sequence, driven by
//! [`IqModule::execute`]:
//!
//! 1. validate the module-specific input subset (no state touched on failure)
//! 2. `check_dependence_change` decides whether registers must be recomputed
//! 3. on change, `run_calculation` fills the register buffer and
//!    `create_cmd_list` emits it into the frame's command stream
//! 4. `update_internal_data` publishes the module's slot, every frame

pub mod color_correction;
pub mod common;
pub mod crop;
pub mod demosaic;
pub mod hdr_be_stats;
pub mod linearization;
pub mod pedestal;

use crate::cmd_buffer::CommandSink;
use crate::error::IqError;
use crate::input::{CalculatedData, IspInputData};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub use self::color_correction::ColorCorrection;
pub use self::common::{DependencyState, ModuleCore};
pub use self::crop::Crop;
pub use self::demosaic::Demosaic;
pub use self::hdr_be_stats::HdrBeStats;
pub use self::linearization::Linearization;
pub use self::pedestal::Pedestal;

/// Closed set of IQ modules this pipeline can host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ModuleKind {
    Pedestal,
    Linearization,
    Demosaic,
    ColorCorrection,
    Crop,
    HdrBeStats,
}

impl ModuleKind {
    /// Name of the module in the tuning tree and logs
    pub fn name(&self) -> &'static str {
        match self {
            ModuleKind::Pedestal => "pedestal",
            ModuleKind::Linearization => "linearization",
            ModuleKind::Demosaic => "demosaic",
            ModuleKind::ColorCorrection => "color_correction",
            ModuleKind::Crop => "crop",
            ModuleKind::HdrBeStats => "hdr_be_stats",
        }
    }

    /// Position in the hardware pixel path
    pub fn hw_order(&self) -> u8 {
        match self {
            ModuleKind::Pedestal => 0,
            ModuleKind::Linearization => 1,
            ModuleKind::Demosaic => 2,
            ModuleKind::ColorCorrection => 3,
            ModuleKind::Crop => 4,
            ModuleKind::HdrBeStats => 5,
        }
    }
}

/// What a module did for one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecuteOutcome {
    /// Registers recomputed and emitted
    Recomputed,
    /// Dependencies unchanged; previous configuration stays in effect
    Skipped,
}

/// Capability interface every module variant implements
pub(crate) trait IqStage {
    /// Internal data slot this module publishes into
    type Output;
    /// State restored when a recompute attempt fails
    type Snapshot;

    /// Check the input subset this module requires
    fn validate_input(&self, input: &IspInputData<'_>) -> Result<(), IqError>;

    /// Decide whether registers must be recomputed this frame
    fn check_dependence_change(&mut self, input: &IspInputData<'_>) -> Result<bool, IqError>;

    /// Resolve settings and fill the register buffer
    fn run_calculation(&mut self, input: &IspInputData<'_>) -> Result<(), IqError>;

    /// Emit the register buffer (and LUTs) into the command stream
    fn create_cmd_list(&mut self, cmd: &mut dyn CommandSink) -> Result<(), IqError>;

    /// Publish this module's values
    fn update_internal_data(&self, slot: &mut Self::Output);

    fn snapshot(&self) -> Self::Snapshot;

    fn restore(&mut self, snapshot: Self::Snapshot);
}

fn run_protocol<S, F>(
    kind: ModuleKind,
    stage: &mut S,
    input: &mut IspInputData<'_>,
    slot: F,
) -> Result<ExecuteOutcome, IqError>
where
    S: IqStage,
    F: Fn(&mut CalculatedData) -> &mut S::Output,
{
    stage.validate_input(input)?;

    let snapshot = stage.snapshot();
    let changed = stage.check_dependence_change(input)?;
    if !changed {
        stage.update_internal_data(slot(&mut input.calculated));
        return Ok(ExecuteOutcome::Skipped);
    }

    debug!("{} recompute for frame {}", kind.name(), input.frame_id);
    if let Err(err) = stage.run_calculation(input) {
        warn!("{} calculation failed: {}", kind.name(), err);
        stage.restore(snapshot);
        stage.update_internal_data(slot(&mut input.calculated));
        return Err(err);
    }
    let mark = input.cmd.mark();
    if let Err(err) = stage.create_cmd_list(&mut *input.cmd) {
        warn!("{} command list failed: {}", kind.name(), err);
        input.cmd.rewind(mark);
        stage.restore(snapshot);
        return Err(err);
    }

    stage.update_internal_data(slot(&mut input.calculated));
    Ok(ExecuteOutcome::Recomputed)
}

/// One configured IQ module instance
#[derive(Debug)]
pub enum IqModule {
    Pedestal(Pedestal),
    Linearization(Linearization),
    Demosaic(Demosaic),
    ColorCorrection(ColorCorrection),
    Crop(Crop),
    HdrBeStats(HdrBeStats),
}

impl IqModule {
    /// Construct a module of the given kind with its resources allocated
    pub fn create(kind: ModuleKind) -> Self {
        match kind {
            ModuleKind::Pedestal => IqModule::Pedestal(Pedestal::new()),
            ModuleKind::Linearization => IqModule::Linearization(Linearization::new()),
            ModuleKind::Demosaic => IqModule::Demosaic(Demosaic::new()),
            ModuleKind::ColorCorrection => IqModule::ColorCorrection(ColorCorrection::new()),
            ModuleKind::Crop => IqModule::Crop(Crop::new()),
            ModuleKind::HdrBeStats => IqModule::HdrBeStats(HdrBeStats::new()),
        }
    }

    pub fn kind(&self) -> ModuleKind {
        match self {
            IqModule::Pedestal(_) => ModuleKind::Pedestal,
            IqModule::Linearization(_) => ModuleKind::Linearization,
            IqModule::Demosaic(_) => ModuleKind::Demosaic,
            IqModule::ColorCorrection(_) => ModuleKind::ColorCorrection,
            IqModule::Crop(_) => ModuleKind::Crop,
            IqModule::HdrBeStats(_) => ModuleKind::HdrBeStats,
        }
    }

    /// Run the per-frame protocol for this module
    pub fn execute(&mut self, input: &mut IspInputData<'_>) -> Result<ExecuteOutcome, IqError> {
        let kind = self.kind();
        match self {
            IqModule::Pedestal(m) => run_protocol(kind, m, input, |c| &mut c.pedestal),
            IqModule::Linearization(m) => run_protocol(kind, m, input, |c| &mut c.linearization),
            IqModule::Demosaic(m) => run_protocol(kind, m, input, |c| &mut c.demosaic),
            IqModule::ColorCorrection(m) => {
                run_protocol(kind, m, input, |c| &mut c.color_correction)
            }
            IqModule::Crop(m) => run_protocol(kind, m, input, |c| &mut c.crop),
            IqModule::HdrBeStats(m) => run_protocol(kind, m, input, |c| &mut c.hdr_be),
        }
    }

    /// Whether the module is currently enabled
    pub fn is_enabled(&self) -> bool {
        match self {
            IqModule::Pedestal(m) => m.core().state.enabled,
            IqModule::Linearization(m) => m.core().state.enabled,
            IqModule::Demosaic(m) => m.core().state.enabled,
            IqModule::ColorCorrection(m) => m.core().state.enabled,
            IqModule::Crop(m) => m.is_enabled(),
            IqModule::HdrBeStats(m) => m.is_enabled(),
        }
    }
}
