//! Per-frame input and internal data shared by all modules of a pipeline

use crate::cmd_buffer::CommandSink;
use crate::modules::hdr_be_stats::HdrBeStatsConfig;
use crate::modules::ModuleKind;
use isp_tuning::{TriggerData, TuningManager, TuningMode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Latest auto-exposure output
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AecUpdate {
    /// Total real gain
    pub gain: f32,
    /// Exposure time (nanoseconds)
    pub exposure_time_ns: u64,
    /// Scene brightness index
    pub lux_index: f32,
}

impl Default for AecUpdate {
    fn default() -> Self {
        Self {
            gain: 1.0,
            exposure_time_ns: 33_000_000,
            lux_index: 350.0,
        }
    }
}

/// Latest auto-white-balance output
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AwbUpdate {
    /// Correlated color temperature (Kelvin)
    pub cct: u32,
    /// R, G, B gains
    pub gains: [f32; 3],
}

impl Default for AwbUpdate {
    fn default() -> Self {
        Self {
            cct: 5000,
            gains: [1.8, 1.0, 1.6],
        }
    }
}

/// HAL color correction mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ColorCorrectionMode {
    #[default]
    Fast,
    HighQuality,
    /// Application supplies the matrix; calibration is bypassed
    TransformMatrix,
}

/// Crop window in sensor input coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CropWindow {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

impl CropWindow {
    pub fn new(left: u32, top: u32, width: u32, height: u32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }
}

/// Per-request HAL metadata the modules react to
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HalTags {
    /// Freeze pedestal and linearization
    pub black_level_lock: bool,
    /// Freeze color correction
    pub awb_lock: bool,
    pub color_correction_mode: ColorCorrectionMode,
    /// Row-major matrix used in `TransformMatrix` mode
    pub transform_matrix: [f32; 9],
    /// Requested crop region
    pub crop_window: Option<CropWindow>,
}

/// Manual per-module setting supplied by the vendor layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleOverride {
    pub enable: bool,
    /// Parameters in the same layout as the module's calibration regions
    #[serde(default)]
    pub params: Vec<f32>,
}

/// OEM/vendor override settings keyed by module
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OemOverrides {
    #[serde(default)]
    pub modules: BTreeMap<ModuleKind, ModuleOverride>,
}

impl OemOverrides {
    pub fn get(&self, kind: ModuleKind) -> Option<&ModuleOverride> {
        self.modules.get(&kind)
    }

    pub fn set(&mut self, kind: ModuleKind, setting: ModuleOverride) {
        self.modules.insert(kind, setting);
    }
}

/// Sensor output as seen by the IFE
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorInfo {
    /// Width after sensor-side crop
    pub width: u32,
    /// Height after sensor-side crop
    pub height: u32,
    /// Monochrome sensor (no color filter array)
    pub is_mono: bool,
}

impl Default for SensorInfo {
    fn default() -> Self {
        Self {
            width: 4000,
            height: 3000,
            is_mono: false,
        }
    }
}

/// Output stream dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamConfig {
    pub output_width: u32,
    pub output_height: u32,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            output_width: 1920,
            output_height: 1080,
        }
    }
}

/// Hardware context the pipeline is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HwContext {
    pub camera_id: u32,
    pub ife_index: u8,
}

/// Statistics configuration requested by the stats algorithms
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsRequests {
    pub hdr_be: Option<HdrBeStatsConfig>,
}

/// Pedestal write slot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PedestalOutput {
    pub enable: bool,
    /// R, Gr, Gb, B black levels (12 bit)
    pub black_level: [u16; 4],
}

/// Linearization write slot
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LinearizationOutput {
    pub enable: bool,
    /// R, Gr, Gb, B gains restoring full range after black subtraction
    pub stretch_gains: [f32; 4],
}

/// Demosaic write slot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DemosaicOutput {
    pub enable: bool,
    pub lut2d_enable: bool,
}

/// Color correction write slot
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ColorCorrectionOutput {
    pub enable: bool,
    /// Matrix in effect, row major
    pub matrix: [f32; 9],
}

/// Crop write slot
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CropOutput {
    pub enable: bool,
    pub window: CropWindow,
    /// Input width over output width
    pub scale_ratio: f32,
}

/// HDR BE stats write slot
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HdrBeOutput {
    pub enable: bool,
    pub applied: Option<HdrBeStatsConfig>,
    /// ROI was reshaped to satisfy hardware limits
    pub is_adjusted: bool,
}

/// Values modules publish for downstream modules and metadata.
///
/// Each module owns exactly one slot; the pipeline hands a module only its
/// own slot when publishing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalculatedData {
    pub pedestal: PedestalOutput,
    pub linearization: LinearizationOutput,
    pub demosaic: DemosaicOutput,
    pub color_correction: ColorCorrectionOutput,
    pub crop: CropOutput,
    pub hdr_be: HdrBeOutput,
}

/// Frame-scoped input passed by reference through every module
pub struct IspInputData<'a> {
    pub frame_id: u64,
    pub hw_context: HwContext,
    pub tuning: Option<&'a dyn TuningManager>,
    pub tuning_mode: TuningMode,
    pub aec: AecUpdate,
    pub awb: AwbUpdate,
    pub hal: HalTags,
    pub oem: Option<&'a OemOverrides>,
    pub sensor: SensorInfo,
    pub stream: StreamConfig,
    pub stats_request: StatsRequests,
    /// Recompute every enabled module regardless of trigger movement
    pub force_trigger_update: bool,
    pub cmd: &'a mut dyn CommandSink,
    pub calculated: CalculatedData,
}

impl<'a> IspInputData<'a> {
    /// Input with defaults for everything except the command sink
    pub fn new(frame_id: u64, cmd: &'a mut dyn CommandSink) -> Self {
        Self {
            frame_id,
            hw_context: HwContext::default(),
            tuning: None,
            tuning_mode: TuningMode::default_mode(),
            aec: AecUpdate::default(),
            awb: AwbUpdate::default(),
            hal: HalTags::default(),
            oem: None,
            sensor: SensorInfo::default(),
            stream: StreamConfig::default(),
            stats_request: StatsRequests::default(),
            force_trigger_update: false,
            cmd,
            calculated: CalculatedData::default(),
        }
    }

    /// Trigger values derived from the 3A updates
    pub fn trigger(&self) -> TriggerData {
        TriggerData {
            aec_gain: self.aec.gain,
            lux_index: self.aec.lux_index,
            exposure_time: self.aec.exposure_time_ns as f32,
            color_temperature: self.awb.cct as f32,
        }
    }

    /// Override for one module, if the vendor layer supplied one
    pub fn oem_override(&self, kind: ModuleKind) -> Option<&ModuleOverride> {
        self.oem.and_then(|oem| oem.get(kind))
    }
}
