//! Setting calculation for each module.
//!
//! These are pure conversions from calibration parameters (interpolated or
//! manual) to register fields and LUT contents. They validate their input
//! before writing anything to `output`.

use crate::error::IqError;
use crate::lut::LutBank;
use crate::registers::{
    lut_len, pack_fields, ColorCorrectionRegs, DemosaicRegs, LinearizationRegs, PedestalRegs,
};

/// Maximum 12 bit pixel value
const PIXEL_MAX: f32 = 4095.0;
/// Linearization output range (14 bit)
const LINEARIZATION_MAX: f32 = 16383.0;
/// Color correction coefficient Q factor
const CC_QFACTOR: u32 = 7;
/// Pedestal mesh grid dimensions
const MESH_COLS: usize = 13;
const MESH_ROWS: usize = 10;

fn require_params(module: &'static str, params: &[f32], needed: usize) -> Result<(), IqError> {
    if params.len() < needed {
        return Err(IqError::CalculationFailed {
            module,
            reason: format!("expected {} parameters, got {}", needed, params.len()),
        });
    }
    Ok(())
}

/// Two's complement encoding of `value` into `bits` bits, saturating
fn signed_field(value: f32, bits: u32) -> u32 {
    let max = (1i32 << (bits - 1)) - 1;
    let min = -(1i32 << (bits - 1));
    let clamped = (value.round() as i32).clamp(min, max);
    (clamped as u32) & ((1u32 << bits) - 1)
}

fn unsigned_field(value: f32, max: u32) -> u32 {
    (value.round().max(0.0) as u32).min(max)
}

fn bank_bits(bank: LutBank) -> u32 {
    bank.select_bits() << 4
}

/// Pedestal calculation input
#[derive(Debug)]
pub struct PedestalDependency<'p> {
    /// R, Gr, Gb, B black levels then radial falloff
    pub params: &'p [f32],
    pub bank: LutBank,
    pub sensor_width: u32,
    pub sensor_height: u32,
}

/// Pedestal calculation output
#[derive(Debug, Clone, Default)]
pub struct PedestalSetting {
    pub regs: PedestalRegs,
    pub black_level: [u16; 4],
}

pub fn pedestal_calculate_setting(
    dependency: &PedestalDependency<'_>,
    output: &mut PedestalSetting,
    mesh: &mut [u32],
) -> Result<(), IqError> {
    require_params("pedestal", dependency.params, 5)?;
    if mesh.len() < lut_len::PEDESTAL {
        return Err(IqError::CalculationFailed {
            module: "pedestal",
            reason: "mesh table too small".to_string(),
        });
    }

    let mut black = [0u16; 4];
    for (level, value) in black.iter_mut().zip(dependency.params) {
        *level = unsigned_field(*value, PIXEL_MAX as u32) as u16;
    }
    let falloff = dependency.params[4];

    let half_cols = (MESH_COLS - 1) as f32 / 2.0;
    let half_rows = (MESH_ROWS - 1) as f32 / 2.0;
    let table = MESH_COLS * MESH_ROWS;
    for row in 0..MESH_ROWS {
        for col in 0..MESH_COLS {
            let dx = (col as f32 - half_cols) / half_cols;
            let dy = (row as f32 - half_rows) / half_rows;
            let scale = 1.0 + falloff * (dx * dx + dy * dy) / 2.0;
            let at = |c: usize| unsigned_field(black[c] as f32 * scale, PIXEL_MAX as u32);
            let idx = row * MESH_COLS + col;
            mesh[idx] = (at(1) << 12) | at(0);
            mesh[table + idx] = (at(3) << 12) | at(2);
        }
    }

    let block_w = dependency.sensor_width / (MESH_COLS as u32 - 1);
    let block_h = dependency.sensor_height / (MESH_ROWS as u32 - 1);
    output.regs = PedestalRegs {
        module_cfg: bank_bits(dependency.bank),
        black_r_gr: pack_fields(black[1] as u32, black[0] as u32),
        black_gb_b: pack_fields(black[3] as u32, black[2] as u32),
        block_size: pack_fields(block_h, block_w),
        interp_factor: pack_fields(3, 3),
    };
    output.black_level = black;
    Ok(())
}

/// Linearization calculation input
#[derive(Debug)]
pub struct LinearizationDependency<'p> {
    /// R, Gr, Gb, B black levels then eight knee points
    pub params: &'p [f32],
    pub bank: LutBank,
    /// Black level already removed upstream by pedestal
    pub pedestal_enabled: bool,
}

/// Linearization calculation output
#[derive(Debug, Clone, Default)]
pub struct LinearizationSetting {
    pub regs: LinearizationRegs,
    pub stretch_gains: [f32; 4],
}

pub fn linearization_calculate_setting(
    dependency: &LinearizationDependency<'_>,
    output: &mut LinearizationSetting,
    lut: &mut [u32],
) -> Result<(), IqError> {
    require_params("linearization", dependency.params, 12)?;
    if lut.len() < lut_len::LINEARIZATION {
        return Err(IqError::CalculationFailed {
            module: "linearization",
            reason: "LUT too small".to_string(),
        });
    }

    let knees = &dependency.params[4..12];
    if knees.windows(2).any(|w| w[0] > w[1]) {
        return Err(IqError::CalculationFailed {
            module: "linearization",
            reason: "knee points not monotonic".to_string(),
        });
    }

    let mut gains = [1.0f32; 4];
    for channel in 0..4 {
        let black = if dependency.pedestal_enabled {
            0.0
        } else {
            dependency.params[channel].clamp(0.0, PIXEL_MAX - 1.0)
        };
        let gain = PIXEL_MAX / (PIXEL_MAX - black);
        gains[channel] = gain;

        for segment in 0..9 {
            let start = if segment == 0 { 0.0 } else { knees[segment - 1] };
            let base = unsigned_field((start - black).max(0.0) * gain, LINEARIZATION_MAX as u32);
            let slope = unsigned_field(gain * 256.0, 0xFFFF);
            lut[channel * 9 + segment] = pack_fields(base, slope);
        }
    }

    let mut knee_points = [0u32; 8];
    for (point, value) in knee_points.iter_mut().zip(knees) {
        *point = unsigned_field(*value, LINEARIZATION_MAX as u32);
    }
    output.regs.module_cfg = bank_bits(dependency.bank);
    output.regs.set_knee_points(&knee_points);
    output.stretch_gains = gains;
    Ok(())
}

/// Demosaic calculation input
#[derive(Debug)]
pub struct DemosaicDependency<'p> {
    /// ak, wk, classifier threshold
    pub params: &'p [f32],
    pub bank: LutBank,
    pub mono: bool,
    pub lut2d_enable: bool,
}

pub fn demosaic_calculate_setting(
    dependency: &DemosaicDependency<'_>,
    output: &mut DemosaicRegs,
    lut: &mut [u32],
) -> Result<(), IqError> {
    if dependency.mono {
        *output = DemosaicRegs {
            module_cfg: DemosaicRegs::COSITED_RGB | bank_bits(dependency.bank),
            interp_coeff: 0,
            interp_classifier: 0,
        };
        lut.fill(0);
        return Ok(());
    }

    require_params("demosaic", dependency.params, 3)?;
    let ak = unsigned_field(dependency.params[0] * 256.0, 0xFFF);
    let wk = dependency.params[1];
    let classifier = unsigned_field(dependency.params[2], 0x3FF);

    let entries = lut.len().min(lut_len::DEMOSAIC);
    for (i, entry) in lut.iter_mut().take(entries).enumerate() {
        *entry = unsigned_field(wk * i as f32 * 128.0 / (entries - 1) as f32, 0xFFF);
    }

    let mut cfg = bank_bits(dependency.bank);
    if dependency.lut2d_enable {
        cfg |= DemosaicRegs::LUT2D_ENABLE;
    }
    *output = DemosaicRegs {
        module_cfg: cfg,
        interp_coeff: pack_fields(unsigned_field(wk * 256.0, 0xFFF), ak),
        interp_classifier: classifier,
    };
    Ok(())
}

/// Color correction calculation output
#[derive(Debug, Clone, Default)]
pub struct ColorCorrectionSetting {
    pub regs: ColorCorrectionRegs,
    pub matrix: [f32; 9],
}

/// `params` holds a row-major 3x3 matrix then R, G, B offsets
pub fn color_correction_calculate_setting(
    params: &[f32],
    output: &mut ColorCorrectionSetting,
) -> Result<(), IqError> {
    require_params("color_correction", params, 12)?;

    let scale = (1u32 << CC_QFACTOR) as f32;
    let mut regs = ColorCorrectionRegs {
        qfactor: CC_QFACTOR,
        ..Default::default()
    };
    let mut matrix = [0.0f32; 9];
    for i in 0..9 {
        matrix[i] = params[i];
        regs.coefficients[i] = signed_field(params[i] * scale, 12);
    }
    for i in 0..3 {
        regs.offsets[i] = signed_field(params[9 + i], 11);
    }

    output.regs = regs;
    output.matrix = matrix;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signed_field_saturates() {
        assert_eq!(signed_field(-1.0, 12), 0xFFF);
        assert_eq!(signed_field(5000.0, 12), 0x7FF);
        assert_eq!(signed_field(-5000.0, 12), 0x800);
    }

    #[test]
    fn test_short_params_fail() {
        let mut out = ColorCorrectionSetting::default();
        let err = color_correction_calculate_setting(&[1.0; 9], &mut out).unwrap_err();
        assert!(matches!(err, IqError::CalculationFailed { module: "color_correction", .. }));
        assert_eq!(out.regs, ColorCorrectionRegs::default());
    }

    #[test]
    fn test_identity_matrix_encoding() {
        let mut params = vec![1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0];
        params.extend_from_slice(&[0.0, 0.0, 0.0]);
        let mut out = ColorCorrectionSetting::default();
        color_correction_calculate_setting(&params, &mut out).unwrap();
        assert_eq!(out.regs.coefficients[0], 128);
        assert_eq!(out.regs.coefficients[1], 0);
        assert_eq!(out.regs.qfactor, 7);
    }

    #[test]
    fn test_pedestal_black_levels() {
        let params = [64.0, 65.0, 66.0, 67.0, 0.0];
        let dependency = PedestalDependency {
            params: &params,
            bank: LutBank::Bank1,
            sensor_width: 4000,
            sensor_height: 3000,
        };
        let mut out = PedestalSetting::default();
        let mut mesh = vec![0; lut_len::PEDESTAL];
        pedestal_calculate_setting(&dependency, &mut out, &mut mesh).unwrap();
        assert_eq!(out.black_level, [64, 65, 66, 67]);
        assert_eq!(out.regs.module_cfg, 1 << 4);
        // Zero falloff gives a flat mesh.
        assert_eq!(mesh[0], (65 << 12) | 64);
    }

    #[test]
    fn test_linearization_skips_black_when_pedestal_enabled() {
        let mut params = vec![256.0; 4];
        params.extend((1..=8).map(|k| k as f32 * 400.0));
        let mut lut = vec![0; lut_len::LINEARIZATION];
        let mut out = LinearizationSetting::default();

        let with_pedestal = LinearizationDependency {
            params: &params,
            bank: LutBank::Bank0,
            pedestal_enabled: true,
        };
        linearization_calculate_setting(&with_pedestal, &mut out, &mut lut).unwrap();
        assert_eq!(out.stretch_gains, [1.0; 4]);

        let without = LinearizationDependency {
            pedestal_enabled: false,
            ..with_pedestal
        };
        linearization_calculate_setting(&without, &mut out, &mut lut).unwrap();
        assert!(out.stretch_gains[0] > 1.0);
    }

    #[test]
    fn test_linearization_rejects_unsorted_knees() {
        let mut params = vec![0.0; 4];
        params.extend([100.0, 50.0, 200.0, 300.0, 400.0, 500.0, 600.0, 700.0]);
        let dependency = LinearizationDependency {
            params: &params,
            bank: LutBank::Bank0,
            pedestal_enabled: false,
        };
        let mut out = LinearizationSetting::default();
        let mut lut = vec![0; lut_len::LINEARIZATION];
        assert!(linearization_calculate_setting(&dependency, &mut out, &mut lut).is_err());
    }

    #[test]
    fn test_demosaic_mono_bypass() {
        let dependency = DemosaicDependency {
            params: &[],
            bank: LutBank::Bank0,
            mono: true,
            lut2d_enable: false,
        };
        let mut regs = DemosaicRegs::default();
        let mut lut = vec![1; lut_len::DEMOSAIC];
        demosaic_calculate_setting(&dependency, &mut regs, &mut lut).unwrap();
        assert_eq!(regs.module_cfg & DemosaicRegs::COSITED_RGB, DemosaicRegs::COSITED_RGB);
        assert!(lut.iter().all(|&v| v == 0));
    }
}
