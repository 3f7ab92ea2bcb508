//! ISP IQ Module Pipeline
//!
//! Per-frame configuration of the image front end: each IQ module decides
//! whether its hardware block needs reprogramming, recomputes registers
//! and lookup tables from tuning data when it does, and emits them into
//! the frame's command buffer.

pub mod cmd_buffer;
pub mod error;
pub mod input;
pub mod iq_interface;
pub mod lut;
pub mod modules;
pub mod pipeline;
pub mod registers;

pub use cmd_buffer::{CmdBuffer, CmdPacket, CommandSink};
pub use error::IqError;
pub use input::{
    AecUpdate, AwbUpdate, CalculatedData, ColorCorrectionMode, CropWindow, HalTags, HwContext,
    IspInputData, ModuleOverride, OemOverrides, SensorInfo, StatsRequests, StreamConfig,
};
pub use lut::{DmiBuffer, DoubleBufferedLut, LutBank};
pub use modules::hdr_be_stats::{
    adjust_roi_params, validate_dependence_params, AdjustedRoi, HdrBeLimits, HdrBeStatsConfig,
};
pub use modules::{ExecuteOutcome, IqModule, ModuleKind};
pub use pipeline::{FrameResult, ModulePipeline, PipelineConfig};
