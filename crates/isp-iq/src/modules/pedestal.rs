//! Pedestal (black level) correction

use crate::cmd_buffer::CommandSink;
use crate::error::IqError;
use crate::input::{IspInputData, PedestalOutput};
use crate::iq_interface::{pedestal_calculate_setting, PedestalDependency, PedestalSetting};
use crate::lut::DoubleBufferedLut;
use crate::modules::common::{DependencyState, ModuleCore};
use crate::modules::{IqStage, ModuleKind};
use crate::registers::{dmi, lut_len, PedestalRegs, RegisterBlock};

const PARAM_COUNT: usize = 5;

#[derive(Debug)]
pub struct Pedestal {
    core: ModuleCore,
    setting: PedestalSetting,
    mesh: DoubleBufferedLut,
}

impl Pedestal {
    pub fn new() -> Self {
        Self {
            core: ModuleCore::new(ModuleKind::Pedestal, PARAM_COUNT),
            setting: PedestalSetting::default(),
            mesh: DoubleBufferedLut::new(lut_len::PEDESTAL),
        }
    }

    pub fn core(&self) -> &ModuleCore {
        &self.core
    }

    pub fn registers(&self) -> &PedestalRegs {
        &self.setting.regs
    }

    pub fn mesh(&self) -> &DoubleBufferedLut {
        &self.mesh
    }
}

impl Default for Pedestal {
    fn default() -> Self {
        Self::new()
    }
}

impl IqStage for Pedestal {
    type Output = PedestalOutput;
    type Snapshot = (DependencyState, PedestalSetting);

    fn validate_input(&self, input: &IspInputData<'_>) -> Result<(), IqError> {
        self.core.require_tuning(input)
    }

    fn check_dependence_change(&mut self, input: &IspInputData<'_>) -> Result<bool, IqError> {
        Ok(self
            .core
            .check_tuning_dependence(input, input.hal.black_level_lock))
    }

    fn run_calculation(&mut self, input: &IspInputData<'_>) -> Result<(), IqError> {
        let bank = self.mesh.staged_bank();
        let dependency = PedestalDependency {
            params: self.core.resolve_params(input),
            bank,
            sensor_width: input.sensor.width,
            sensor_height: input.sensor.height,
        };
        let mut setting = PedestalSetting::default();
        pedestal_calculate_setting(&dependency, &mut setting, self.mesh.staged_mut().words_mut())?;
        self.setting = setting;
        Ok(())
    }

    fn create_cmd_list(&mut self, cmd: &mut dyn CommandSink) -> Result<(), IqError> {
        let table = self.mesh.staged();
        cmd.write_dmi(
            dmi::PEDESTAL_CFG,
            self.mesh.staged_bank(),
            table,
            0,
            table.len_bytes(),
        )?;
        cmd.write_reg_range(PedestalRegs::BASE, &self.setting.regs.pack())?;
        self.mesh.commit();
        Ok(())
    }

    fn update_internal_data(&self, slot: &mut PedestalOutput) {
        slot.enable = self.core.state.enabled;
        slot.black_level = self.setting.black_level;
    }

    fn snapshot(&self) -> Self::Snapshot {
        (self.core.snapshot(), self.setting.clone())
    }

    fn restore(&mut self, (state, setting): Self::Snapshot) {
        self.core.restore(state);
        self.setting = setting;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd_buffer::{CmdBuffer, CmdPacket};
    use crate::lut::LutBank;
    use crate::modules::common::test_support::tuning_with;
    use crate::modules::{ExecuteOutcome, IqModule};
    use isp_tuning::TriggerAxis;

    fn black_params() -> Vec<f32> {
        vec![64.0, 64.0, 64.0, 64.0, 0.1]
    }

    #[test]
    fn test_recompute_emits_dmi_then_registers() {
        let tuning = tuning_with("pedestal", true, TriggerAxis::AecGain, black_params());
        let mut cmd = CmdBuffer::default();
        let mut module = IqModule::create(ModuleKind::Pedestal);
        {
            let mut input = IspInputData::new(1, &mut cmd);
            input.tuning = Some(&tuning);
            assert_eq!(module.execute(&mut input).unwrap(), ExecuteOutcome::Recomputed);
            assert!(input.calculated.pedestal.enable);
            assert_eq!(input.calculated.pedestal.black_level, [64; 4]);
        }

        let packets = cmd.packets();
        assert_eq!(packets.len(), 2);
        assert!(matches!(packets[0], CmdPacket::Dmi { bank: LutBank::Bank0, .. }));
        assert!(matches!(packets[1], CmdPacket::RegRange { start: PedestalRegs::BASE, .. }));
    }

    #[test]
    fn test_black_level_lock_keeps_registers_and_bank() {
        let tuning = tuning_with("pedestal", true, TriggerAxis::AecGain, black_params());
        let mut cmd = CmdBuffer::default();
        let mut module_input = IspInputData::new(1, &mut cmd);
        module_input.tuning = Some(&tuning);

        let mut module = IqModule::create(ModuleKind::Pedestal);
        module.execute(&mut module_input).unwrap();
        let IqModule::Pedestal(ref first) = module else { unreachable!() };
        let regs_before = *first.registers();
        let staged_before = first.mesh().staged_bank();

        module_input.aec.gain = 12.0;
        module_input.hal.black_level_lock = true;
        module_input.calculated = Default::default();
        assert_eq!(module.execute(&mut module_input).unwrap(), ExecuteOutcome::Skipped);

        let IqModule::Pedestal(ref second) = module else { unreachable!() };
        assert_eq!(*second.registers(), regs_before);
        assert_eq!(second.mesh().staged_bank(), staged_before);
        assert!(module_input.calculated.pedestal.enable);
    }

    #[test]
    fn test_missing_tuning_is_invalid_argument() {
        let mut cmd = CmdBuffer::default();
        let mut input = IspInputData::new(1, &mut cmd);
        let mut module = IqModule::create(ModuleKind::Pedestal);
        assert!(matches!(module.execute(&mut input), Err(IqError::InvalidArgument(_))));
        assert!(!input.calculated.pedestal.enable);
    }

    #[test]
    fn test_short_calibration_keeps_previous_state() {
        let tuning = tuning_with("pedestal", true, TriggerAxis::AecGain, vec![64.0]);
        let mut cmd = CmdBuffer::default();
        let mut module = IqModule::create(ModuleKind::Pedestal);
        {
            let mut input = IspInputData::new(1, &mut cmd);
            input.tuning = Some(&tuning);
            let err = module.execute(&mut input).unwrap_err();
            assert!(matches!(err, IqError::CalculationFailed { .. }));
            assert!(!input.calculated.pedestal.enable);
        }
        assert!(cmd.is_empty());
        let IqModule::Pedestal(ref pedestal) = module else { unreachable!() };
        assert_eq!(pedestal.mesh().committed_bank(), None);
    }

    #[test]
    fn test_register_overflow_drops_lut_upload() {
        let tuning = tuning_with("pedestal", true, TriggerAxis::AecGain, black_params());
        let mut module = IqModule::create(ModuleKind::Pedestal);

        // Room for the DMI packet plus three dwords, too few for the registers.
        let mut cmd = CmdBuffer::new(3 + lut_len::PEDESTAL + 3);
        {
            let mut input = IspInputData::new(1, &mut cmd);
            input.tuning = Some(&tuning);
            assert!(matches!(module.execute(&mut input), Err(IqError::CommandBuffer { .. })));
        }
        assert!(cmd.is_empty());
        let IqModule::Pedestal(ref failed) = module else { unreachable!() };
        assert_eq!(failed.mesh().staged_bank(), LutBank::Bank0);

        let mut cmd = CmdBuffer::default();
        let mut input = IspInputData::new(2, &mut cmd);
        input.tuning = Some(&tuning);
        assert_eq!(module.execute(&mut input).unwrap(), ExecuteOutcome::Recomputed);
    }
}
