//! Demosaic (Bayer to RGB interpolation)

use crate::cmd_buffer::CommandSink;
use crate::error::IqError;
use crate::input::{ColorCorrectionMode, DemosaicOutput, IspInputData};
use crate::iq_interface::{demosaic_calculate_setting, DemosaicDependency};
use crate::lut::DoubleBufferedLut;
use crate::modules::common::{DependencyState, ModuleCore};
use crate::modules::{IqStage, ModuleKind};
use crate::registers::{dmi, lut_len, DemosaicRegs, RegisterBlock};
use tracing::debug;

const PARAM_COUNT: usize = 3;

#[derive(Debug)]
pub struct Demosaic {
    core: ModuleCore,
    regs: DemosaicRegs,
    lut: DoubleBufferedLut,
    /// Sensor mono flag seen on the previous frame
    mono: Option<bool>,
    /// 2D LUT enable in effect
    lut2d_enable: Option<bool>,
}

impl Demosaic {
    pub fn new() -> Self {
        Self {
            core: ModuleCore::new(ModuleKind::Demosaic, PARAM_COUNT),
            regs: DemosaicRegs::default(),
            lut: DoubleBufferedLut::new(lut_len::DEMOSAIC),
            mono: None,
            lut2d_enable: None,
        }
    }

    pub fn core(&self) -> &ModuleCore {
        &self.core
    }

    pub fn registers(&self) -> &DemosaicRegs {
        &self.regs
    }

    pub fn lut(&self) -> &DoubleBufferedLut {
        &self.lut
    }
}

impl Default for Demosaic {
    fn default() -> Self {
        Self::new()
    }
}

impl IqStage for Demosaic {
    type Output = DemosaicOutput;
    type Snapshot = (DependencyState, DemosaicRegs, Option<bool>, Option<bool>);

    fn validate_input(&self, input: &IspInputData<'_>) -> Result<(), IqError> {
        self.core.require_tuning(input)
    }

    fn check_dependence_change(&mut self, input: &IspInputData<'_>) -> Result<bool, IqError> {
        let mut changed = self.core.check_tuning_dependence(input, false);

        // The 2D LUT would fight an application supplied color transform.
        let lut2d = input.hal.color_correction_mode != ColorCorrectionMode::TransformMatrix;
        if self.lut2d_enable != Some(lut2d) {
            if self.core.state.enabled {
                changed = true;
            }
            self.lut2d_enable = Some(lut2d);
        }

        // Entering or leaving mono must reprogram the block even when the
        // calibration disables it.
        let mono = input.sensor.is_mono;
        if self.mono.is_some_and(|prev| prev != mono) || (self.mono.is_none() && mono) {
            debug!("demosaic: mono mode {}", mono);
            changed = true;
        }
        self.mono = Some(mono);
        Ok(changed)
    }

    fn run_calculation(&mut self, input: &IspInputData<'_>) -> Result<(), IqError> {
        let mono = input.sensor.is_mono;
        let bank = self.lut.staged_bank();
        if !self.core.state.enabled && !mono {
            self.regs = DemosaicRegs::default();
            self.lut.staged_mut().words_mut().fill(0);
            return Ok(());
        }

        let dependency = DemosaicDependency {
            params: self.core.resolve_params(input),
            bank,
            mono,
            lut2d_enable: self.lut2d_enable.unwrap_or(true),
        };
        let mut regs = DemosaicRegs::default();
        demosaic_calculate_setting(&dependency, &mut regs, self.lut.staged_mut().words_mut())?;
        self.regs = regs;
        Ok(())
    }

    fn create_cmd_list(&mut self, cmd: &mut dyn CommandSink) -> Result<(), IqError> {
        let table = self.lut.staged();
        cmd.write_dmi(
            dmi::DEMOSAIC_CFG,
            self.lut.staged_bank(),
            table,
            0,
            table.len_bytes(),
        )?;
        cmd.write_reg_range(DemosaicRegs::BASE, &self.regs.pack())?;
        self.lut.commit();
        Ok(())
    }

    fn update_internal_data(&self, slot: &mut DemosaicOutput) {
        slot.enable = self.core.state.enabled;
        slot.lut2d_enable = self.core.state.enabled && self.lut2d_enable.unwrap_or(false);
    }

    fn snapshot(&self) -> Self::Snapshot {
        (self.core.snapshot(), self.regs, self.mono, self.lut2d_enable)
    }

    fn restore(&mut self, (state, regs, mono, lut2d_enable): Self::Snapshot) {
        self.core.restore(state);
        self.regs = regs;
        self.mono = mono;
        self.lut2d_enable = lut2d_enable;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd_buffer::CmdBuffer;
    use crate::modules::common::test_support::tuning_with;
    use crate::modules::{ExecuteOutcome, IqModule};
    use isp_tuning::TriggerAxis;

    fn demosaic_params() -> Vec<f32> {
        vec![0.5, 0.75, 128.0]
    }

    fn registers(module: &IqModule) -> DemosaicRegs {
        let IqModule::Demosaic(demosaic) = module else { unreachable!() };
        *demosaic.registers()
    }

    #[test]
    fn test_transform_matrix_disables_lut2d() {
        let tuning = tuning_with("demosaic", true, TriggerAxis::AecGain, demosaic_params());
        let mut cmd = CmdBuffer::default();
        let mut input = IspInputData::new(1, &mut cmd);
        input.tuning = Some(&tuning);

        let mut module = IqModule::create(ModuleKind::Demosaic);
        module.execute(&mut input).unwrap();
        assert!(input.calculated.demosaic.lut2d_enable);
        assert_ne!(registers(&module).module_cfg & DemosaicRegs::LUT2D_ENABLE, 0);

        input.hal.color_correction_mode = ColorCorrectionMode::TransformMatrix;
        assert_eq!(module.execute(&mut input).unwrap(), ExecuteOutcome::Recomputed);
        assert!(!input.calculated.demosaic.lut2d_enable);
        assert_eq!(registers(&module).module_cfg & DemosaicRegs::LUT2D_ENABLE, 0);
    }

    #[test]
    fn test_mono_transition_recomputes_while_disabled() {
        let tuning = tuning_with("demosaic", false, TriggerAxis::AecGain, demosaic_params());
        let mut cmd = CmdBuffer::default();
        let mut input = IspInputData::new(1, &mut cmd);
        input.tuning = Some(&tuning);

        let mut module = IqModule::create(ModuleKind::Demosaic);
        assert_eq!(module.execute(&mut input).unwrap(), ExecuteOutcome::Skipped);

        input.sensor.is_mono = true;
        assert_eq!(module.execute(&mut input).unwrap(), ExecuteOutcome::Recomputed);
        assert_ne!(registers(&module).module_cfg & DemosaicRegs::COSITED_RGB, 0);
        assert!(!input.calculated.demosaic.enable);

        assert_eq!(module.execute(&mut input).unwrap(), ExecuteOutcome::Skipped);

        input.sensor.is_mono = false;
        assert_eq!(module.execute(&mut input).unwrap(), ExecuteOutcome::Recomputed);
        assert_eq!(registers(&module), DemosaicRegs::default());
    }

    #[test]
    fn test_disabled_to_disabled_skips() {
        let tuning = tuning_with("demosaic", false, TriggerAxis::AecGain, demosaic_params());
        let mut cmd = CmdBuffer::default();
        let mut module = IqModule::create(ModuleKind::Demosaic);
        {
            let mut input = IspInputData::new(1, &mut cmd);
            input.tuning = Some(&tuning);
            for gain in [1.0, 4.0, 16.0] {
                input.aec.gain = gain;
                assert_eq!(module.execute(&mut input).unwrap(), ExecuteOutcome::Skipped);
            }
        }
        assert!(cmd.is_empty());
    }
}
