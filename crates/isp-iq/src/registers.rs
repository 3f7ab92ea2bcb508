//! Register blocks written by each IQ module.
//!
//! Offsets and dword counts follow the IFE register map; a block is always
//! written in full.

/// Fixed-layout register block
pub trait RegisterBlock {
    /// First register offset
    const BASE: u32;
    /// Number of dwords in the block
    const LEN: usize;

    /// Serialize into exactly `LEN` dwords
    fn pack(&self) -> Vec<u32>;
}

/// DMI LUT configuration registers
pub mod dmi {
    pub const PEDESTAL_CFG: u32 = 0x0000_0C24;
    pub const LINEARIZATION_CFG: u32 = 0x0000_0C44;
    pub const DEMOSAIC_CFG: u32 = 0x0000_0C64;
}

/// Table sizes in dwords
pub mod lut_len {
    /// Two 13x10 mesh tables (R/Gr and Gb/B)
    pub const PEDESTAL: usize = 2 * 13 * 10;
    /// Four channels of nine (base, slope) segments
    pub const LINEARIZATION: usize = 4 * 9;
    /// Directional interpolation classifier
    pub const DEMOSAIC: usize = 32;
}

/// Pack two 16 bit fields as `high << 16 | low`
pub fn pack_fields(high: u32, low: u32) -> u32 {
    ((high & 0xFFFF) << 16) | (low & 0xFFFF)
}

/// Pedestal (black level) correction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PedestalRegs {
    /// Bit 0 HDR enable, bit 1 scale bypass, bit 4 LUT bank select
    pub module_cfg: u32,
    /// Black level for R (low) and Gr (high), 12 bit
    pub black_r_gr: u32,
    /// Black level for Gb (low) and B (high), 12 bit
    pub black_gb_b: u32,
    /// Mesh block width (low) and height (high)
    pub block_size: u32,
    /// Mesh interpolation subgrid factors
    pub interp_factor: u32,
}

impl RegisterBlock for PedestalRegs {
    const BASE: u32 = 0x0000_0D40;
    const LEN: usize = 5;

    fn pack(&self) -> Vec<u32> {
        vec![
            self.module_cfg,
            self.black_r_gr,
            self.black_gb_b,
            self.block_size,
            self.interp_factor,
        ]
    }
}

/// Linearization knee points
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinearizationRegs {
    /// Bit 4 LUT bank select
    pub module_cfg: u32,
    /// Eight 14 bit knee points, two per dword
    pub knee_points: [u32; 4],
}

impl RegisterBlock for LinearizationRegs {
    const BASE: u32 = 0x0000_0E00;
    const LEN: usize = 5;

    fn pack(&self) -> Vec<u32> {
        let mut out = Vec::with_capacity(Self::LEN);
        out.push(self.module_cfg);
        out.extend_from_slice(&self.knee_points);
        out
    }
}

impl LinearizationRegs {
    pub fn set_knee_points(&mut self, knees: &[u32; 8]) {
        for (i, pair) in knees.chunks(2).enumerate() {
            self.knee_points[i] = pack_fields(pair[1], pair[0]);
        }
    }
}

/// Demosaic interpolation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DemosaicRegs {
    /// Bit 0 cosited RGB (mono bypass), bit 1 directional G disable,
    /// bit 2 2D LUT enable, bit 4 LUT bank select
    pub module_cfg: u32,
    /// ak (low) and wk (high) interpolation coefficients
    pub interp_coeff: u32,
    /// Classifier threshold
    pub interp_classifier: u32,
}

impl DemosaicRegs {
    pub const COSITED_RGB: u32 = 1 << 0;
    pub const DIR_G_DISABLE: u32 = 1 << 1;
    pub const LUT2D_ENABLE: u32 = 1 << 2;
}

impl RegisterBlock for DemosaicRegs {
    const BASE: u32 = 0x0000_0F60;
    const LEN: usize = 3;

    fn pack(&self) -> Vec<u32> {
        vec![self.module_cfg, self.interp_coeff, self.interp_classifier]
    }
}

/// 3x3 color correction matrix with offsets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColorCorrectionRegs {
    /// Signed 12 bit coefficients, row major
    pub coefficients: [u32; 9],
    /// Signed 11 bit offsets for R, G, B
    pub offsets: [u32; 3],
    /// Q factor of the coefficients
    pub qfactor: u32,
}

impl RegisterBlock for ColorCorrectionRegs {
    const BASE: u32 = 0x0000_1060;
    const LEN: usize = 13;

    fn pack(&self) -> Vec<u32> {
        let mut out = Vec::with_capacity(Self::LEN);
        out.extend_from_slice(&self.coefficients);
        out.extend_from_slice(&self.offsets);
        out.push(self.qfactor);
        out
    }
}

/// Full-output crop window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CropRegs {
    /// First pixel (high) and last pixel (low)
    pub pixel_cfg: u32,
    /// First line (high) and last line (low)
    pub line_cfg: u32,
}

impl RegisterBlock for CropRegs {
    const BASE: u32 = 0x0000_1A40;
    const LEN: usize = 2;

    fn pack(&self) -> Vec<u32> {
        vec![self.pixel_cfg, self.line_cfg]
    }
}

impl CropRegs {
    pub fn new(first_pixel: u32, last_pixel: u32, first_line: u32, last_line: u32) -> Self {
        Self {
            pixel_cfg: pack_fields(first_pixel, last_pixel),
            line_cfg: pack_fields(first_line, last_line),
        }
    }
}

/// HDR Bayer exposure statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HdrBeStatsRegs {
    /// Bit 0 enable
    pub module_cfg: u32,
    /// Vertical (high) and horizontal (low) region count minus one
    pub region_num: u32,
    /// ROI top (high) and left (low)
    pub region_offset: u32,
    /// Region height (high) and width (low) minus one
    pub region_size: u32,
    /// Gr (high) and R (low) saturation thresholds
    pub threshold_r_gr: u32,
    /// B (high) and Gb (low) saturation thresholds
    pub threshold_gb_b: u32,
}

impl RegisterBlock for HdrBeStatsRegs {
    const BASE: u32 = 0x0000_1C00;
    const LEN: usize = 6;

    fn pack(&self) -> Vec<u32> {
        vec![
            self.module_cfg,
            self.region_num,
            self.region_offset,
            self.region_size,
            self.threshold_r_gr,
            self.threshold_gb_b,
        ]
    }
}
