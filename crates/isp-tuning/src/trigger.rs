//! 3A trigger data

use serde::{Deserialize, Serialize};

/// Scalar input that a calibration interpolates over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TriggerAxis {
    AecGain,
    LuxIndex,
    ExposureTime,
    ColorTemperature,
}

/// Trigger values derived from the latest AEC/AWB output
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TriggerData {
    /// Total real gain applied by AEC
    pub aec_gain: f32,
    /// Scene brightness index
    pub lux_index: f32,
    /// Exposure time in nanoseconds
    pub exposure_time: f32,
    /// Correlated color temperature in Kelvin
    pub color_temperature: f32,
}

impl Default for TriggerData {
    fn default() -> Self {
        Self {
            aec_gain: 1.0,
            lux_index: 350.0,
            exposure_time: 33_000_000.0,
            color_temperature: 5000.0,
        }
    }
}

impl TriggerData {
    /// Value of one axis
    pub fn value(&self, axis: TriggerAxis) -> f32 {
        match axis {
            TriggerAxis::AecGain => self.aec_gain,
            TriggerAxis::LuxIndex => self.lux_index,
            TriggerAxis::ExposureTime => self.exposure_time,
            TriggerAxis::ColorTemperature => self.color_temperature,
        }
    }
}
