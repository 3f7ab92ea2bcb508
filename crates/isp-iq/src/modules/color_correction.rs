//! Color correction matrix

use crate::cmd_buffer::CommandSink;
use crate::error::IqError;
use crate::input::{ColorCorrectionMode, ColorCorrectionOutput, IspInputData};
use crate::iq_interface::{color_correction_calculate_setting, ColorCorrectionSetting};
use crate::modules::common::{DependencyState, ModuleCore};
use crate::modules::{IqStage, ModuleKind};
use crate::registers::{ColorCorrectionRegs, RegisterBlock};
use tracing::debug;

const PARAM_COUNT: usize = 12;

#[derive(Debug)]
pub struct ColorCorrection {
    core: ModuleCore,
    setting: ColorCorrectionSetting,
    /// HAL mode seen on the previous frame
    mode: Option<ColorCorrectionMode>,
    /// Application matrix currently programmed
    manual_matrix: Option<[f32; 9]>,
}

impl ColorCorrection {
    pub fn new() -> Self {
        Self {
            core: ModuleCore::new(ModuleKind::ColorCorrection, PARAM_COUNT),
            setting: ColorCorrectionSetting::default(),
            mode: None,
            manual_matrix: None,
        }
    }

    pub fn core(&self) -> &ModuleCore {
        &self.core
    }

    pub fn registers(&self) -> &ColorCorrectionRegs {
        &self.setting.regs
    }

    fn transform_matrix_active(&self) -> bool {
        !self.core.state.manual && self.mode == Some(ColorCorrectionMode::TransformMatrix)
    }
}

impl Default for ColorCorrection {
    fn default() -> Self {
        Self::new()
    }
}

impl IqStage for ColorCorrection {
    type Output = ColorCorrectionOutput;
    type Snapshot = (
        DependencyState,
        ColorCorrectionSetting,
        Option<ColorCorrectionMode>,
        Option<[f32; 9]>,
    );

    fn validate_input(&self, input: &IspInputData<'_>) -> Result<(), IqError> {
        self.core.require_tuning(input)
    }

    fn check_dependence_change(&mut self, input: &IspInputData<'_>) -> Result<bool, IqError> {
        let mode = input.hal.color_correction_mode;
        let previous = self.mode.replace(mode);

        if let Some(changed) = self.core.check_override(input) {
            return Ok(changed);
        }

        if mode == ColorCorrectionMode::TransformMatrix {
            let was_manual = self.core.state.manual;
            if was_manual {
                self.core.state.manual = false;
                self.core.invalidate();
            }
            self.core.state.enabled = true;
            let matrix = input.hal.transform_matrix;
            let changed =
                was_manual || previous != Some(mode) || self.manual_matrix != Some(matrix);
            if changed {
                debug!("color_correction: application matrix {:?}", matrix);
                self.manual_matrix = Some(matrix);
            }
            return Ok(changed);
        }

        if previous == Some(ColorCorrectionMode::TransformMatrix) {
            // Back to calibration: the enable bit and matrix come from tuning again.
            self.manual_matrix = None;
            self.core.invalidate();
        }
        Ok(self.core.check_calibration(input, input.hal.awb_lock))
    }

    fn run_calculation(&mut self, input: &IspInputData<'_>) -> Result<(), IqError> {
        let mut setting = ColorCorrectionSetting::default();
        if self.transform_matrix_active() {
            let mut params = [0.0f32; PARAM_COUNT];
            params[..9].copy_from_slice(&input.hal.transform_matrix);
            color_correction_calculate_setting(&params, &mut setting)?;
        } else {
            color_correction_calculate_setting(self.core.resolve_params(input), &mut setting)?;
        }
        self.setting = setting;
        Ok(())
    }

    fn create_cmd_list(&mut self, cmd: &mut dyn CommandSink) -> Result<(), IqError> {
        cmd.write_reg_range(ColorCorrectionRegs::BASE, &self.setting.regs.pack())
    }

    fn update_internal_data(&self, slot: &mut ColorCorrectionOutput) {
        slot.enable = self.core.state.enabled;
        slot.matrix = self.setting.matrix;
    }

    fn snapshot(&self) -> Self::Snapshot {
        (
            self.core.snapshot(),
            self.setting.clone(),
            self.mode,
            self.manual_matrix,
        )
    }

    fn restore(&mut self, (state, setting, mode, manual_matrix): Self::Snapshot) {
        self.core.restore(state);
        self.setting = setting;
        self.mode = mode;
        self.manual_matrix = manual_matrix;
    }
}
