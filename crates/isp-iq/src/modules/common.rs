//! Dependency state and the shared recompute-or-skip decision

use crate::error::IqError;
use crate::input::IspInputData;
use crate::modules::ModuleKind;
use isp_tuning::{DependencyInterpolator, ResolvedChromatix, TuningMode};
use tracing::{debug, warn};

/// Inputs that produced the module's current register values
#[derive(Debug, Clone, Default)]
pub struct DependencyState {
    /// Tuning mode the chromatix was resolved under
    pub tuning_mode: Option<TuningMode>,
    /// Calibration currently in use
    pub chromatix: Option<ResolvedChromatix>,
    /// Module enable bit
    pub enabled: bool,
    /// An OEM override drove the last decision
    pub manual: bool,
}

impl DependencyState {
    /// Identity of the calibration in use
    pub fn chromatix_symbol(&self) -> Option<u32> {
        self.chromatix.as_ref().map(|c| c.handle.symbol())
    }
}

/// Dependency bookkeeping shared by all calibrated modules
#[derive(Debug)]
pub struct ModuleCore {
    kind: ModuleKind,
    pub state: DependencyState,
    interpolator: DependencyInterpolator,
}

impl ModuleCore {
    pub fn new(kind: ModuleKind, param_capacity: usize) -> Self {
        Self {
            kind,
            state: DependencyState::default(),
            interpolator: DependencyInterpolator::with_capacity(param_capacity),
        }
    }

    pub fn kind(&self) -> ModuleKind {
        self.kind
    }

    /// Fail unless the input carries a tuning manager
    pub fn require_tuning(&self, input: &IspInputData<'_>) -> Result<(), IqError> {
        if input.tuning.is_none() {
            return Err(IqError::InvalidArgument(format!(
                "{} requires a tuning manager",
                self.kind.name()
            )));
        }
        Ok(())
    }

    /// Manual override step.
    ///
    /// Returns `Some(changed)` when an override decided the frame: the
    /// module enable follows the override exactly and a recompute is
    /// requested whenever it enables the module.
    pub fn check_override(&mut self, input: &IspInputData<'_>) -> Option<bool> {
        let setting = input.oem_override(self.kind)?;
        self.state.enabled = setting.enable;
        self.state.manual = true;
        debug!("{} manual override, enable={}", self.kind.name(), setting.enable);
        Some(setting.enable)
    }

    /// Lock, calibration identity and trigger steps.
    pub fn check_calibration(&mut self, input: &IspInputData<'_>, locked: bool) -> bool {
        if self.state.manual {
            // Leaving manual control: resolve calibration again from scratch.
            self.state.manual = false;
            self.invalidate();
        }

        if locked && self.state.chromatix.is_some() {
            debug!("{} locked, keeping previous configuration", self.kind.name());
            return false;
        }

        let mut changed = false;
        if self.state.tuning_mode.as_ref() != Some(&input.tuning_mode) {
            changed = self.resolve_chromatix(input);
        }

        if self.state.enabled {
            if let Some(chromatix) = &self.state.chromatix {
                let trigger = input.trigger();
                if self
                    .interpolator
                    .trigger_update(&trigger, chromatix.data.trigger)
                    || input.force_trigger_update
                {
                    changed = true;
                }
            }
        }
        changed
    }

    /// Drop the resolved calibration so the next check resolves it again
    pub fn invalidate(&mut self) {
        self.state.tuning_mode = None;
        self.state.chromatix = None;
        self.interpolator.reset();
    }

    fn resolve_chromatix(&mut self, input: &IspInputData<'_>) -> bool {
        let Some(tuning) = input.tuning else {
            return false;
        };
        if !tuning.is_valid_chromatix() {
            warn!("{}: no valid chromatix loaded", self.kind.name());
            return false;
        }
        let Some(tree) = tuning.chromatix() else {
            return false;
        };
        self.state.tuning_mode = Some(input.tuning_mode.clone());

        let Some(resolved) = tree.lookup(self.kind.name(), &input.tuning_mode) else {
            if let Some(symbol) = self.state.chromatix_symbol() {
                warn!(
                    "{}: no chromatix for {:?}, keeping symbol {}",
                    self.kind.name(),
                    input.tuning_mode.selectors,
                    symbol
                );
            }
            return false;
        };
        if self.state.chromatix_symbol() == Some(resolved.handle.symbol()) {
            return false;
        }

        debug!(
            "{} chromatix symbol {} enable={}",
            self.kind.name(),
            resolved.handle.symbol(),
            resolved.data.enable
        );
        self.state.enabled = resolved.data.enable;
        self.state.chromatix = Some(resolved);
        self.interpolator.reset();
        self.state.enabled
    }

    /// Full decision: override, then lock, calibration identity and trigger
    pub fn check_tuning_dependence(&mut self, input: &IspInputData<'_>, locked: bool) -> bool {
        match self.check_override(input) {
            Some(changed) => changed,
            None => self.check_calibration(input, locked),
        }
    }

    /// Parameters the calculation should run with this frame.
    ///
    /// Override parameters win when present; otherwise the calibration is
    /// interpolated at the current trigger.
    pub fn resolve_params<'s>(&'s mut self, input: &'s IspInputData<'_>) -> &'s [f32] {
        if self.state.manual {
            if let Some(setting) = input.oem_override(self.kind) {
                if !setting.params.is_empty() {
                    return &setting.params;
                }
            }
        }
        match &self.state.chromatix {
            Some(chromatix) => {
                let trigger = input.trigger();
                &self.interpolator.interpolate(&trigger, &chromatix.data).params
            }
            None => &[],
        }
    }

    pub fn snapshot(&self) -> DependencyState {
        self.state.clone()
    }

    /// Roll back to `state` and force the next frame to recompute
    pub fn restore(&mut self, state: DependencyState) {
        self.state = state;
        self.interpolator.reset();
    }
}
