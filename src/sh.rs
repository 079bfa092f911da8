use glam::*;

/// The zeroth order SH basis constant.
pub const SH_C0: f32 = 0.282_094_8;

const SH_C1: f32 = 0.488_602_52;

const SH_C2: [f32; 5] = [
    1.092_548_4,
    -1.092_548_4,
    0.315_391_57,
    -1.092_548_4,
    0.546_274_2,
];

const SH_C3: [f32; 7] = [
    -0.590_043_6,
    2.890_611_4,
    -0.457_045_8,
    0.373_176_33,
    -0.457_045_8,
    1.445_305_7,
    -0.590_043_6,
];

/// The Gaussian spherical harmonics degrees.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct GaussianShDegree(u8);

impl GaussianShDegree {
    /// Create a new Gaussian SH degree.
    ///
    /// Returns [`None`] if the degree is not in the range of \[0, 3\].
    pub const fn new(sh_deg: u8) -> Option<Self> {
        match sh_deg {
            0..=3 => Some(Self(sh_deg)),
            _ => None,
        }
    }

    /// Create from the total number of `f_rest_*` PLY properties.
    ///
    /// Returns [`None`] if the count does not belong to any degree.
    pub const fn from_rest_count(count: usize) -> Option<Self> {
        match count {
            0 => Some(Self(0)),
            9 => Some(Self(1)),
            24 => Some(Self(2)),
            45 => Some(Self(3)),
            _ => None,
        }
    }

    /// Get the degree.
    pub const fn get(&self) -> u8 {
        self.0
    }

    /// Get the number of non-DC coefficients per color channel.
    pub const fn rest_per_channel(&self) -> usize {
        let n = self.0 as usize + 1;
        n * n - 1
    }
}

impl Default for GaussianShDegree {
    fn default() -> Self {
        Self(3)
    }
}

/// Evaluate the SH color of a Gaussian in `dir`.
///
/// `dir` must be normalized. `sh` holds the non-DC coefficients in the order of the basis
/// functions, only the first [`GaussianShDegree::rest_per_channel`] are read.
///
/// The result is offset by 0.5 and clamped to \[0, 1\], the same as the rasterizer's color.
pub fn eval_sh(degree: GaussianShDegree, sh0: Vec3, sh: &[Vec3; 15], dir: Vec3) -> Vec3 {
    let mut color = SH_C0 * sh0;

    if degree.get() >= 1 {
        let Vec3 { x, y, z } = dir;
        color += -SH_C1 * y * sh[0] + SH_C1 * z * sh[1] - SH_C1 * x * sh[2];

        if degree.get() >= 2 {
            let (xx, yy, zz) = (x * x, y * y, z * z);
            let (xy, yz, xz) = (x * y, y * z, x * z);
            color += SH_C2[0] * xy * sh[3]
                + SH_C2[1] * yz * sh[4]
                + SH_C2[2] * (2.0 * zz - xx - yy) * sh[5]
                + SH_C2[3] * xz * sh[6]
                + SH_C2[4] * (xx - yy) * sh[7];

            if degree.get() >= 3 {
                color += SH_C3[0] * y * (3.0 * xx - yy) * sh[8]
                    + SH_C3[1] * xy * z * sh[9]
                    + SH_C3[2] * y * (4.0 * zz - xx - yy) * sh[10]
                    + SH_C3[3] * z * (2.0 * zz - 3.0 * xx - 3.0 * yy) * sh[11]
                    + SH_C3[4] * x * (4.0 * zz - xx - yy) * sh[12]
                    + SH_C3[5] * z * (xx - yy) * sh[13]
                    + SH_C3[6] * x * (xx - 3.0 * yy) * sh[14];
            }
        }
    }

    (color + Vec3::splat(0.5)).clamp(Vec3::ZERO, Vec3::ONE)
}

/// Evaluate the view independent color of a Gaussian.
///
/// This only uses the DC term, equivalent to [`eval_sh`] with degree 0.
pub fn eval_sh_dc(sh0: Vec3) -> Vec3 {
    (SH_C0 * sh0 + Vec3::splat(0.5)).clamp(Vec3::ZERO, Vec3::ONE)
}
