//! Linearization (sensor response knee curve)

use crate::cmd_buffer::CommandSink;
use crate::error::IqError;
use crate::input::{IspInputData, LinearizationOutput};
use crate::iq_interface::{
    linearization_calculate_setting, LinearizationDependency, LinearizationSetting,
};
use crate::lut::DoubleBufferedLut;
use crate::modules::common::{DependencyState, ModuleCore};
use crate::modules::{IqStage, ModuleKind};
use crate::registers::{dmi, lut_len, LinearizationRegs, RegisterBlock};
use tracing::debug;

const PARAM_COUNT: usize = 12;

#[derive(Debug)]
pub struct Linearization {
    core: ModuleCore,
    setting: LinearizationSetting,
    lut: DoubleBufferedLut,
    /// Pedestal enable seen on the previous frame
    pedestal_enabled: Option<bool>,
}

impl Linearization {
    pub fn new() -> Self {
        Self {
            core: ModuleCore::new(ModuleKind::Linearization, PARAM_COUNT),
            setting: LinearizationSetting::default(),
            lut: DoubleBufferedLut::new(lut_len::LINEARIZATION),
            pedestal_enabled: None,
        }
    }

    pub fn core(&self) -> &ModuleCore {
        &self.core
    }

    pub fn registers(&self) -> &LinearizationRegs {
        &self.setting.regs
    }

    pub fn lut(&self) -> &DoubleBufferedLut {
        &self.lut
    }
}

impl Default for Linearization {
    fn default() -> Self {
        Self::new()
    }
}

impl IqStage for Linearization {
    type Output = LinearizationOutput;
    type Snapshot = (DependencyState, LinearizationSetting, Option<bool>);

    fn validate_input(&self, input: &IspInputData<'_>) -> Result<(), IqError> {
        self.core.require_tuning(input)
    }

    fn check_dependence_change(&mut self, input: &IspInputData<'_>) -> Result<bool, IqError> {
        let locked = input.hal.black_level_lock;
        let mut changed = self.core.check_tuning_dependence(input, locked);

        // Black level is subtracted here only while pedestal is off.
        let pedestal = input.calculated.pedestal.enable;
        let toggled = self.pedestal_enabled.is_some_and(|prev| prev != pedestal);
        if toggled && self.core.state.enabled && !locked {
            debug!("linearization: pedestal enable changed to {}", pedestal);
            changed = true;
        }
        self.pedestal_enabled = Some(pedestal);
        Ok(changed)
    }

    fn run_calculation(&mut self, input: &IspInputData<'_>) -> Result<(), IqError> {
        let dependency = LinearizationDependency {
            params: self.core.resolve_params(input),
            bank: self.lut.staged_bank(),
            pedestal_enabled: input.calculated.pedestal.enable,
        };
        let mut setting = LinearizationSetting::default();
        linearization_calculate_setting(&dependency, &mut setting, self.lut.staged_mut().words_mut())?;
        self.setting = setting;
        Ok(())
    }

    fn create_cmd_list(&mut self, cmd: &mut dyn CommandSink) -> Result<(), IqError> {
        let table = self.lut.staged();
        cmd.write_dmi(
            dmi::LINEARIZATION_CFG,
            self.lut.staged_bank(),
            table,
            0,
            table.len_bytes(),
        )?;
        cmd.write_reg_range(LinearizationRegs::BASE, &self.setting.regs.pack())?;
        self.lut.commit();
        Ok(())
    }

    fn update_internal_data(&self, slot: &mut LinearizationOutput) {
        slot.enable = self.core.state.enabled;
        slot.stretch_gains = self.setting.stretch_gains;
    }

    fn snapshot(&self) -> Self::Snapshot {
        (self.core.snapshot(), self.setting.clone(), self.pedestal_enabled)
    }

    fn restore(&mut self, (state, setting, pedestal_enabled): Self::Snapshot) {
        self.core.restore(state);
        self.setting = setting;
        self.pedestal_enabled = pedestal_enabled;
    }
}
