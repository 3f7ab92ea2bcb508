//! Tuning mode selectors

use serde::{Deserialize, Serialize};

/// Dimension a tuning entry can be specialized on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ModeType {
    Default,
    Sensor,
    Usecase,
    Scene,
    Effect,
}

/// One (dimension, value) pair of a tuning mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModeSelector {
    pub mode: ModeType,
    pub value: u16,
}

impl ModeSelector {
    pub fn new(mode: ModeType, value: u16) -> Self {
        Self { mode, value }
    }
}

/// Full operating mode used to select chromatix entries.
///
/// Modules remember the last mode they resolved with and only search the
/// tree again when it changes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TuningMode {
    pub selectors: Vec<ModeSelector>,
}

impl TuningMode {
    pub fn new(selectors: Vec<ModeSelector>) -> Self {
        Self { selectors }
    }

    /// Mode with only the default selector
    pub fn default_mode() -> Self {
        Self {
            selectors: vec![ModeSelector::new(ModeType::Default, 0)],
        }
    }

    /// Whether every selector in `required` is part of this mode
    pub fn contains_all(&self, required: &[ModeSelector]) -> bool {
        required.iter().all(|sel| self.selectors.contains(sel))
    }

    /// Builder-style helper to add a selector
    pub fn with(mut self, mode: ModeType, value: u16) -> Self {
        self.selectors.push(ModeSelector::new(mode, value));
        self
    }
}
