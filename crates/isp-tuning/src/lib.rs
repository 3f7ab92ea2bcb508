//! ISP Tuning Data
//!
//! Resolves per-module calibration ("chromatix") nodes from a mode-keyed
//! tuning tree and decides when 3A trigger movement requires a module to
//! re-interpolate its calibration.

mod error;
mod interpolator;
mod mode;
mod tree;
mod trigger;

pub use error::TuningError;
pub use interpolator::{DependencyInterpolator, InterpolationOutput};
pub use mode::{ModeSelector, ModeType, TuningMode};
pub use tree::{
    ChromatixModule, ChromatixTree, ResolvedChromatix, StaticTuningManager, TuningHandle,
    TuningManager, TuningRegion,
};
pub use trigger::{TriggerAxis, TriggerData};

/// Tolerance used when comparing trigger values between frames
pub const TRIGGER_EPSILON: f32 = 1e-5;

/// Float comparison used for all trigger change detection
pub fn trigger_equal(a: f32, b: f32) -> bool {
    (a - b).abs() < TRIGGER_EPSILON
}
