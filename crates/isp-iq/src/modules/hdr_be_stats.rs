//! HDR Bayer exposure statistics tap.
//!
//! The stats client asks for a region of interest split into a grid of
//! regions. Hardware constrains the region geometry, so the requested ROI
//! is validated first and then reshaped into legal bounds; any reshaping
//! is surfaced through `is_adjusted`.

use crate::cmd_buffer::CommandSink;
use crate::error::IqError;
use crate::input::{CropWindow, HdrBeOutput, IspInputData};
use crate::modules::{IqStage, ModuleKind};
use crate::registers::{pack_fields, HdrBeStatsRegs, RegisterBlock};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Requested HDR BE configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HdrBeStatsConfig {
    /// Region of interest in sensor input coordinates
    pub roi: CropWindow,
    /// Regions across the ROI
    pub horizontal_num: u32,
    /// Regions down the ROI
    pub vertical_num: u32,
    /// R, Gr, Gb, B saturation thresholds
    pub channel_thresholds: [u32; 4],
}

/// Hardware limits of the stats block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HdrBeLimits {
    pub max_horizontal_num: u32,
    pub max_vertical_num: u32,
    pub min_region_width: u32,
    pub max_region_width: u32,
    pub min_region_height: u32,
    pub max_region_height: u32,
    /// 2 pixel Bayer period times the 3 column exposure interleave
    pub width_alignment: u32,
    pub height_alignment: u32,
    pub threshold_max: u32,
}

impl Default for HdrBeLimits {
    fn default() -> Self {
        Self {
            max_horizontal_num: 64,
            max_vertical_num: 48,
            min_region_width: 6,
            max_region_width: 390,
            min_region_height: 2,
            max_region_height: 512,
            width_alignment: 6,
            height_alignment: 2,
            threshold_max: (1 << 14) - 1,
        }
    }
}

impl HdrBeLimits {
    /// Reject limits no region geometry can satisfy
    pub fn validate(&self) -> Result<(), IqError> {
        if self.max_horizontal_num == 0 || self.max_vertical_num == 0 {
            return Err(IqError::InvalidArgument("HDR BE region count limit is zero".to_string()));
        }
        if self.min_region_width == 0 || self.min_region_width > self.max_region_width {
            return Err(IqError::InvalidArgument(format!(
                "HDR BE region width limits {}..={} empty",
                self.min_region_width, self.max_region_width
            )));
        }
        if self.min_region_height == 0 || self.min_region_height > self.max_region_height {
            return Err(IqError::InvalidArgument(format!(
                "HDR BE region height limits {}..={} empty",
                self.min_region_height, self.max_region_height
            )));
        }
        Ok(())
    }
}

/// Configuration after reshaping into hardware bounds
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdjustedRoi {
    pub config: HdrBeStatsConfig,
    pub region_width: u32,
    pub region_height: u32,
    /// ROI differs from what was requested
    pub is_adjusted: bool,
}

/// Reject requests the hardware cannot express at all
pub fn validate_dependence_params(
    config: &HdrBeStatsConfig,
    input_width: u32,
    input_height: u32,
    limits: &HdrBeLimits,
) -> Result<(), IqError> {
    if config.horizontal_num == 0 || config.horizontal_num > limits.max_horizontal_num {
        return Err(IqError::InvalidArgument(format!(
            "horizontal region count {} outside 1..={}",
            config.horizontal_num, limits.max_horizontal_num
        )));
    }
    if config.vertical_num == 0 || config.vertical_num > limits.max_vertical_num {
        return Err(IqError::InvalidArgument(format!(
            "vertical region count {} outside 1..={}",
            config.vertical_num, limits.max_vertical_num
        )));
    }

    let roi = &config.roi;
    if roi.width < config.horizontal_num || roi.height < config.vertical_num {
        return Err(IqError::InvalidArgument(format!(
            "ROI {}x{} too small for {}x{} regions",
            roi.width, roi.height, config.horizontal_num, config.vertical_num
        )));
    }
    let right = roi.left.checked_add(roi.width);
    let bottom = roi.top.checked_add(roi.height);
    if right.map_or(true, |r| r > input_width) || bottom.map_or(true, |b| b > input_height) {
        return Err(IqError::InvalidArgument(format!(
            "ROI {:?} outside input {}x{}",
            roi, input_width, input_height
        )));
    }
    Ok(())
}

/// Snap one region dimension onto the alignment grid and into `[min, max]`
fn adjust_region(span: u32, count: u32, alignment: u32, min: u32, max: u32) -> u32 {
    let region = span / count;
    let aligned = region - region % alignment.max(1);
    aligned.clamp(min, max)
}

/// Move `start` back so `start + len` fits in `limit`
fn fit_inside(start: u32, len: u32, limit: u32) -> Option<u32> {
    if len > limit {
        return None;
    }
    Some(start.min(limit - len))
}

/// Reshape a validated request into hardware-legal region geometry.
///
/// Region counts are kept; regions are floored to the alignment factor and
/// clamped to the size limits, growing the ROI when needed. A grown ROI
/// that would cross the input edge is shifted back inside.
pub fn adjust_roi_params(
    config: &HdrBeStatsConfig,
    input_width: u32,
    input_height: u32,
    limits: &HdrBeLimits,
) -> Result<AdjustedRoi, IqError> {
    limits.validate()?;
    let region_width = adjust_region(
        config.roi.width,
        config.horizontal_num,
        limits.width_alignment,
        limits.min_region_width,
        limits.max_region_width,
    );
    let region_height = adjust_region(
        config.roi.height,
        config.vertical_num,
        limits.height_alignment,
        limits.min_region_height,
        limits.max_region_height,
    );

    let width = region_width * config.horizontal_num;
    let height = region_height * config.vertical_num;
    let (Some(left), Some(top)) = (
        fit_inside(config.roi.left, width, input_width),
        fit_inside(config.roi.top, height, input_height),
    ) else {
        return Err(IqError::InvalidArgument(format!(
            "{}x{} regions of {}x{} do not fit input {}x{}",
            config.horizontal_num,
            config.vertical_num,
            region_width,
            region_height,
            input_width,
            input_height
        )));
    };

    let roi = CropWindow::new(left, top, width, height);
    let is_adjusted = roi != config.roi;
    let mut channel_thresholds = config.channel_thresholds;
    for threshold in channel_thresholds.iter_mut() {
        *threshold = (*threshold).min(limits.threshold_max);
    }

    Ok(AdjustedRoi {
        config: HdrBeStatsConfig {
            roi,
            channel_thresholds,
            ..config.clone()
        },
        region_width,
        region_height,
        is_adjusted,
    })
}

#[derive(Debug, Default)]
pub struct HdrBeStats {
    limits: HdrBeLimits,
    applied: Option<AdjustedRoi>,
    /// Turned off by an OEM override
    disabled: bool,
    regs: HdrBeStatsRegs,
}

impl HdrBeStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(limits: HdrBeLimits) -> Result<Self, IqError> {
        limits.validate()?;
        Ok(Self {
            limits,
            ..Self::default()
        })
    }

    pub fn is_enabled(&self) -> bool {
        !self.disabled && self.applied.is_some()
    }

    /// Configuration currently programmed
    pub fn applied(&self) -> Option<&AdjustedRoi> {
        self.applied.as_ref()
    }

    pub fn registers(&self) -> &HdrBeStatsRegs {
        &self.regs
    }

    fn request<'i>(input: &'i IspInputData<'_>) -> Result<&'i HdrBeStatsConfig, IqError> {
        input
            .stats_request
            .hdr_be
            .as_ref()
            .ok_or_else(|| IqError::InvalidArgument("no HDR BE stats request".to_string()))
    }
}

impl IqStage for HdrBeStats {
    type Output = HdrBeOutput;
    type Snapshot = (Option<AdjustedRoi>, bool);

    fn validate_input(&self, input: &IspInputData<'_>) -> Result<(), IqError> {
        let config = Self::request(input)?;
        validate_dependence_params(config, input.sensor.width, input.sensor.height, &self.limits)
            .inspect_err(|err| warn!("hdr_be_stats rejected request: {}", err))
    }

    fn check_dependence_change(&mut self, input: &IspInputData<'_>) -> Result<bool, IqError> {
        let config = Self::request(input)?;
        let adjusted =
            adjust_roi_params(config, input.sensor.width, input.sensor.height, &self.limits)?;
        let disabled = input
            .oem_override(ModuleKind::HdrBeStats)
            .is_some_and(|setting| !setting.enable);
        let toggled = disabled != self.disabled;
        if toggled {
            debug!("hdr_be_stats manual override, enable={}", !disabled);
            self.disabled = disabled;
        }
        if self.applied.as_ref() == Some(&adjusted) {
            return Ok(toggled);
        }
        if adjusted.is_adjusted {
            debug!(
                "hdr_be_stats ROI {:?} adjusted to {:?}",
                config.roi, adjusted.config.roi
            );
        }
        self.applied = Some(adjusted);
        Ok(true)
    }

    fn run_calculation(&mut self, _input: &IspInputData<'_>) -> Result<(), IqError> {
        let applied = self.applied.as_ref().ok_or_else(|| IqError::CalculationFailed {
            module: "hdr_be_stats",
            reason: "no configuration staged".to_string(),
        })?;
        let config = &applied.config;
        let th = config.channel_thresholds;
        self.regs = HdrBeStatsRegs {
            module_cfg: u32::from(!self.disabled),
            region_num: pack_fields(config.vertical_num - 1, config.horizontal_num - 1),
            region_offset: pack_fields(config.roi.top, config.roi.left),
            region_size: pack_fields(applied.region_height - 1, applied.region_width - 1),
            threshold_r_gr: pack_fields(th[1], th[0]),
            threshold_gb_b: pack_fields(th[3], th[2]),
        };
        Ok(())
    }

    fn create_cmd_list(&mut self, cmd: &mut dyn CommandSink) -> Result<(), IqError> {
        cmd.write_reg_range(HdrBeStatsRegs::BASE, &self.regs.pack())
    }

    fn update_internal_data(&self, slot: &mut HdrBeOutput) {
        slot.enable = self.is_enabled();
        slot.applied = self.applied.as_ref().map(|a| a.config.clone());
        slot.is_adjusted = self.applied.as_ref().is_some_and(|a| a.is_adjusted);
    }

    fn snapshot(&self) -> Self::Snapshot {
        (self.applied.clone(), self.disabled)
    }

    fn restore(&mut self, (applied, disabled): Self::Snapshot) {
        self.applied = applied;
        self.disabled = disabled;
    }
}
