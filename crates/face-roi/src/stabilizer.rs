//! Temporal face ROI stabilization

use crate::roi::{StabilizationData, StabilizationEntry};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum StabilizerError {
    #[error("Smoothing factor {0} outside (0, 1]")]
    InvalidSmoothing(f32),
}

/// Stabilizer tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StabilizationConfig {
    /// Center movement (pixels) ignored as jitter
    pub center_threshold: u32,
    /// Size change (pixels) ignored as jitter
    pub size_threshold: u32,
    /// Weight of the new measurement once movement exceeds the threshold
    pub smoothing: f32,
}

impl Default for StabilizationConfig {
    fn default() -> Self {
        Self {
            center_threshold: 8,
            size_threshold: 12,
            smoothing: 0.5,
        }
    }
}

fn blend(previous: i64, current: i64, weight: f32) -> i64 {
    previous + ((current - previous) as f32 * weight).round() as i64
}

fn stabilize_axis(previous: i64, current: i64, threshold: u32, weight: f32) -> i64 {
    if (current - previous).unsigned_abs() <= threshold as u64 {
        previous
    } else {
        blend(previous, current, weight)
    }
}

/// Hysteresis plus exponential smoothing per tracked face id
#[derive(Debug)]
pub struct Stabilizer {
    config: StabilizationConfig,
    tracks: HashMap<u32, StabilizationEntry>,
}

impl Stabilizer {
    pub fn new(config: StabilizationConfig) -> Result<Self, StabilizerError> {
        if !(config.smoothing > 0.0 && config.smoothing <= 1.0) {
            return Err(StabilizerError::InvalidSmoothing(config.smoothing));
        }
        Ok(Self {
            config,
            tracks: HashMap::new(),
        })
    }

    /// Stabilize `data` in place against the previous frame.
    ///
    /// Faces not seen this frame are forgotten.
    pub fn apply(&mut self, data: &mut StabilizationData) {
        let cfg = &self.config;
        for entry in data.entries.iter_mut() {
            let Some(previous) = self.tracks.get(&entry.id) else {
                debug!("Face {} tracking started", entry.id);
                continue;
            };
            let cx = stabilize_axis(previous.center.0 as i64, entry.center.0 as i64, cfg.center_threshold, cfg.smoothing);
            let cy = stabilize_axis(previous.center.1 as i64, entry.center.1 as i64, cfg.center_threshold, cfg.smoothing);
            let w = stabilize_axis(previous.size.0 as i64, entry.size.0 as i64, cfg.size_threshold, cfg.smoothing);
            let h = stabilize_axis(previous.size.1 as i64, entry.size.1 as i64, cfg.size_threshold, cfg.smoothing);
            entry.center = (cx as i32, cy as i32);
            entry.size = (w as u32, h as u32);
        }

        self.tracks = data.entries.iter().map(|entry| (entry.id, *entry)).collect();
    }

    pub fn tracked(&self) -> usize {
        self.tracks.len()
    }

    pub fn reset(&mut self) {
        self.tracks.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(id: u32, center: (i32, i32), size: (u32, u32)) -> StabilizationData {
        StabilizationData {
            entries: vec![StabilizationEntry {
                id,
                center,
                size,
                confidence: 0.8,
            }],
        }
    }

    #[test]
    fn test_small_jitter_held() {
        let mut stabilizer = Stabilizer::new(StabilizationConfig::default()).unwrap();
        let mut first = data(1, (500, 400), (120, 120));
        stabilizer.apply(&mut first);

        let mut second = data(1, (505, 397), (126, 118));
        stabilizer.apply(&mut second);
        assert_eq!(second.entries[0].center, (500, 400));
        assert_eq!(second.entries[0].size, (120, 120));
    }

    #[test]
    fn test_large_motion_smoothed() {
        let mut stabilizer = Stabilizer::new(StabilizationConfig::default()).unwrap();
        stabilizer.apply(&mut data(1, (500, 400), (120, 120)));

        let mut moved = data(1, (600, 400), (200, 120));
        stabilizer.apply(&mut moved);
        assert_eq!(moved.entries[0].center, (550, 400));
        assert_eq!(moved.entries[0].size, (160, 120));
    }

    #[test]
    fn test_unseen_faces_forgotten() {
        let mut stabilizer = Stabilizer::new(StabilizationConfig::default()).unwrap();
        stabilizer.apply(&mut data(1, (500, 400), (120, 120)));
        stabilizer.apply(&mut data(2, (100, 100), (60, 60)));
        assert_eq!(stabilizer.tracked(), 1);

        let mut back = data(1, (900, 900), (120, 120));
        stabilizer.apply(&mut back);
        assert_eq!(back.entries[0].center, (900, 900));
    }

    #[test]
    fn test_invalid_smoothing_rejected() {
        let config = StabilizationConfig {
            smoothing: 0.0,
            ..Default::default()
        };
        assert!(matches!(Stabilizer::new(config), Err(StabilizerError::InvalidSmoothing(_))));
    }
}
