//! Trigger-driven interpolation between calibration regions

use crate::tree::ChromatixModule;
use crate::trigger::{TriggerAxis, TriggerData};
use crate::trigger_equal;
use tracing::debug;

/// Result of interpolating a chromatix at the current trigger
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InterpolationOutput {
    /// Index of the lower bracketing region
    pub lower: usize,
    /// Index of the upper bracketing region
    pub upper: usize,
    /// Blend weight of the upper region (0 = all lower)
    pub ratio: f32,
    /// Blended parameters
    pub params: Vec<f32>,
}

/// Per-module interpolation cache.
///
/// Remembers the trigger values the current register set was derived from
/// so a frame whose relevant trigger did not move can skip recompute.
#[derive(Debug, Default)]
pub struct DependencyInterpolator {
    last: Option<TriggerData>,
    output: InterpolationOutput,
}

impl DependencyInterpolator {
    /// Create an interpolator with room for `param_capacity` parameters
    pub fn with_capacity(param_capacity: usize) -> Self {
        Self {
            last: None,
            output: InterpolationOutput {
                params: Vec::with_capacity(param_capacity),
                ..Default::default()
            },
        }
    }

    /// Record the new trigger and report whether `axis` moved.
    ///
    /// The first call after construction or [`reset`](Self::reset) always
    /// reports a change.
    pub fn trigger_update(&mut self, trigger: &TriggerData, axis: TriggerAxis) -> bool {
        let changed = match &self.last {
            Some(previous) => !trigger_equal(previous.value(axis), trigger.value(axis)),
            None => true,
        };
        if changed {
            debug!(
                "Trigger {:?} moved to {}",
                axis,
                trigger.value(axis)
            );
            self.last = Some(*trigger);
        }
        changed
    }

    /// Forget the cached trigger so the next update reports a change
    pub fn reset(&mut self) {
        self.last = None;
    }

    /// Last trigger that produced a recompute
    pub fn last_trigger(&self) -> Option<&TriggerData> {
        self.last.as_ref()
    }

    /// Blend the two regions bracketing the trigger value.
    ///
    /// Inside a region the region's parameters are used as-is; between two
    /// regions the parameters are linearly blended; outside the covered
    /// range the nearest region is used.
    pub fn interpolate(
        &mut self,
        trigger: &TriggerData,
        chromatix: &ChromatixModule,
    ) -> &InterpolationOutput {
        let value = trigger.value(chromatix.trigger);
        let regions = &chromatix.regions;
        let out = &mut self.output;
        out.params.clear();

        if regions.is_empty() {
            out.lower = 0;
            out.upper = 0;
            out.ratio = 0.0;
            return out;
        }

        let last = regions.len() - 1;
        let (lower, upper, ratio) = if value <= regions[0].end {
            (0, 0, 0.0)
        } else if value >= regions[last].start {
            (last, last, 0.0)
        } else {
            let mut bracket = (last, last, 0.0);
            for (i, pair) in regions.windows(2).enumerate() {
                let (region, next) = (&pair[0], &pair[1]);
                if value >= region.start && value <= region.end {
                    bracket = (i, i, 0.0);
                    break;
                }
                if value > region.end && value < next.start {
                    let span = next.start - region.end;
                    bracket = (i, i + 1, (value - region.end) / span);
                    break;
                }
            }
            bracket
        };

        out.lower = lower;
        out.upper = upper;
        out.ratio = ratio;
        let low = &regions[lower].params;
        let high = &regions[upper].params;
        out.params
            .extend(low.iter().zip(high).map(|(a, b)| a + (b - a) * ratio));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::TuningRegion;

    fn gain_chromatix() -> ChromatixModule {
        ChromatixModule {
            enable: true,
            trigger: TriggerAxis::AecGain,
            regions: vec![
                TuningRegion { start: 1.0, end: 2.0, params: vec![0.0, 10.0] },
                TuningRegion { start: 4.0, end: 8.0, params: vec![1.0, 20.0] },
            ],
        }
    }

    fn with_gain(gain: f32) -> TriggerData {
        TriggerData {
            aec_gain: gain,
            ..Default::default()
        }
    }

    #[test]
    fn test_first_update_reports_change() {
        let mut interp = DependencyInterpolator::default();
        assert!(interp.trigger_update(&with_gain(1.0), TriggerAxis::AecGain));
        assert!(!interp.trigger_update(&with_gain(1.0), TriggerAxis::AecGain));
    }

    #[test]
    fn test_unrelated_axis_does_not_trigger() {
        let mut interp = DependencyInterpolator::default();
        interp.trigger_update(&with_gain(1.0), TriggerAxis::AecGain);

        let mut moved = with_gain(1.0);
        moved.color_temperature = 2800.0;
        assert!(!interp.trigger_update(&moved, TriggerAxis::AecGain));
        assert!(interp.trigger_update(&with_gain(1.5), TriggerAxis::AecGain));
    }

    #[test]
    fn test_reset_forces_change() {
        let mut interp = DependencyInterpolator::default();
        interp.trigger_update(&with_gain(2.0), TriggerAxis::AecGain);
        interp.reset();
        assert!(interp.trigger_update(&with_gain(2.0), TriggerAxis::AecGain));
    }

    #[test]
    fn test_blend_between_regions() {
        let mut interp = DependencyInterpolator::with_capacity(2);
        let out = interp.interpolate(&with_gain(3.0), &gain_chromatix());
        assert_eq!((out.lower, out.upper), (0, 1));
        assert!((out.ratio - 0.5).abs() < 1e-6);
        assert!((out.params[1] - 15.0).abs() < 1e-4);
    }

    #[test]
    fn test_clamps_outside_range() {
        let mut interp = DependencyInterpolator::default();
        let chromatix = gain_chromatix();
        assert_eq!(interp.interpolate(&with_gain(0.5), &chromatix).params, vec![0.0, 10.0]);
        assert_eq!(interp.interpolate(&with_gain(64.0), &chromatix).params, vec![1.0, 20.0]);
        let inside = interp.interpolate(&with_gain(5.0), &chromatix);
        assert_eq!((inside.lower, inside.upper), (1, 1));
    }

    proptest::proptest! {
        #[test]
        fn prop_blend_stays_within_calibration(gain in 0.0f32..100.0) {
            let mut interp = DependencyInterpolator::default();
            let out = interp.interpolate(&with_gain(gain), &gain_chromatix());
            proptest::prop_assert!(out.params[0] >= 0.0 && out.params[0] <= 1.0);
            proptest::prop_assert!(out.params[1] >= 10.0 && out.params[1] <= 20.0);
            proptest::prop_assert!(out.ratio >= 0.0 && out.ratio <= 1.0);
        }
    }
}
