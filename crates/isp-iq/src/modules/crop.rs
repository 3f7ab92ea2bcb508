//! Full-output crop

use crate::cmd_buffer::CommandSink;
use crate::error::IqError;
use crate::input::{CropOutput, CropWindow, IspInputData, StreamConfig};
use crate::modules::{IqStage, ModuleKind};
use crate::registers::{CropRegs, RegisterBlock};
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CropState {
    /// Bayer-aligned window programmed into the hardware
    pub window: Option<CropWindow>,
    pub output: Option<StreamConfig>,
    pub scale_ratio: f32,
    /// An OEM override turned the crop off; the full sensor passes through
    pub disabled: bool,
}

#[derive(Debug, Default)]
pub struct Crop {
    state: CropState,
    regs: CropRegs,
}

impl Crop {
    pub fn new() -> Self {
        Self::default()
    }

    /// Crop is configured as soon as a window was accepted, unless
    /// overridden off
    pub fn is_enabled(&self) -> bool {
        !self.state.disabled && self.state.window.is_some()
    }

    pub fn registers(&self) -> &CropRegs {
        &self.regs
    }

    pub fn state(&self) -> &CropState {
        &self.state
    }
}

/// Snap the window onto the 2x2 Bayer grid
fn align_to_bayer(window: CropWindow) -> CropWindow {
    CropWindow {
        left: window.left & !1,
        top: window.top & !1,
        width: (window.width & !1).max(2),
        height: (window.height & !1).max(2),
    }
}

impl IqStage for Crop {
    type Output = CropOutput;
    type Snapshot = CropState;

    fn validate_input(&self, input: &IspInputData<'_>) -> Result<(), IqError> {
        let window = input
            .hal
            .crop_window
            .ok_or_else(|| IqError::InvalidArgument("crop window missing".to_string()))?;
        if window.width == 0 || window.height == 0 {
            return Err(IqError::InvalidArgument(format!(
                "degenerate crop window {}x{}",
                window.width, window.height
            )));
        }
        let right = window.left.checked_add(window.width);
        let bottom = window.top.checked_add(window.height);
        if right.map_or(true, |r| r > input.sensor.width)
            || bottom.map_or(true, |b| b > input.sensor.height)
        {
            return Err(IqError::InvalidArgument(format!(
                "crop window {:?} outside sensor {}x{}",
                window, input.sensor.width, input.sensor.height
            )));
        }
        if input.stream.output_width == 0 || input.stream.output_height == 0 {
            return Err(IqError::InvalidArgument("output size is zero".to_string()));
        }
        Ok(())
    }

    fn check_dependence_change(&mut self, input: &IspInputData<'_>) -> Result<bool, IqError> {
        let window = input
            .hal
            .crop_window
            .map(align_to_bayer)
            .ok_or_else(|| IqError::InvalidArgument("crop window missing".to_string()))?;

        let disabled = input
            .oem_override(ModuleKind::Crop)
            .is_some_and(|setting| !setting.enable);
        let mut changed = false;
        if disabled != self.state.disabled {
            debug!("crop manual override, enable={}", !disabled);
            self.state.disabled = disabled;
            changed = true;
        }

        if self.state.window != Some(window) || self.state.output != Some(input.stream) {
            changed = true;
            debug!("crop window {:?} -> {:?}", self.state.window, window);
            self.state.window = Some(window);
            self.state.output = Some(input.stream);
        }
        Ok(changed)
    }

    fn run_calculation(&mut self, input: &IspInputData<'_>) -> Result<(), IqError> {
        let window = self
            .state
            .window
            .ok_or_else(|| IqError::CalculationFailed {
                module: "crop",
                reason: "no window staged".to_string(),
            })?;
        let window = if self.state.disabled {
            CropWindow::new(0, 0, input.sensor.width, input.sensor.height)
        } else {
            window
        };
        self.regs = CropRegs::new(
            window.left,
            window.left + window.width - 1,
            window.top,
            window.top + window.height - 1,
        );
        self.state.scale_ratio = window.width as f32 / input.stream.output_width as f32;
        Ok(())
    }

    fn create_cmd_list(&mut self, cmd: &mut dyn CommandSink) -> Result<(), IqError> {
        cmd.write_reg_range(CropRegs::BASE, &self.regs.pack())
    }

    fn update_internal_data(&self, slot: &mut CropOutput) {
        slot.enable = self.is_enabled();
        slot.window = self.state.window.unwrap_or_default();
        slot.scale_ratio = self.state.scale_ratio;
    }

    fn snapshot(&self) -> Self::Snapshot {
        self.state
    }

    fn restore(&mut self, state: Self::Snapshot) {
        self.state = state;
    }
}
