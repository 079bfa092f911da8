use std::io::BufRead;

use glam::*;

use crate::{FormatError, GaussianShDegree, PlyGaussianPod, PlyGaussians, eval_sh, eval_sh_dc};

/// The smallest scale a Gaussian axis is clamped to.
pub const MIN_SCALE: f32 = 1e-7;

/// The distance of opacity from 0 and 1 it is clamped to.
pub const OPACITY_EPSILON: f32 = 1e-6;

/// The Gaussian.
///
/// All parameters are activated, i.e. `scale` is linear and `opacity` is in (0, 1).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gaussian {
    pub rot: Quat,
    pub pos: Vec3,
    pub scale: Vec3,
    pub opacity: f32,
    pub sh0: Vec3,
    pub sh: [Vec3; 15],
}

impl Gaussian {
    /// Convert from [`PlyGaussianPod`].
    ///
    /// `sh_degree` decides how [`PlyGaussianPod::sh`] is laid out. Degenerate values are clamped,
    /// see [`PlyGaussianPod::is_degenerate`].
    pub fn from_ply(ply: &PlyGaussianPod, sh_degree: GaussianShDegree) -> Self {
        // Position
        let pos = Vec3::from_array(ply.pos);

        // Rotation
        let rot = Quat::from_xyzw(ply.rot[1], ply.rot[2], ply.rot[3], ply.rot[0]);
        let rot = match rot.length() {
            len if len.is_finite() && len > 0.0 => rot / len,
            _ => Quat::IDENTITY,
        };

        // Scale
        let scale = Vec3::from_array(ply.scale)
            .exp()
            .map(|s| match s.is_nan() {
                true => MIN_SCALE,
                false => s.clamp(MIN_SCALE, f32::MAX),
            });

        // Opacity
        let opacity = (1.0 / (1.0 + (-ply.alpha).exp()))
            .clamp(OPACITY_EPSILON, 1.0 - OPACITY_EPSILON);
        let opacity = match opacity.is_nan() {
            true => OPACITY_EPSILON,
            false => opacity,
        };

        // Spherical harmonics
        let sh0 = Vec3::from_array(ply.color);
        let n = sh_degree.rest_per_channel();
        let sh = std::array::from_fn(|i| match i < n {
            true => Vec3::new(ply.sh[i], ply.sh[i + n], ply.sh[i + 2 * n]),
            false => Vec3::ZERO,
        });

        Self {
            rot,
            pos,
            scale,
            opacity,
            sh0,
            sh,
        }
    }

    /// Convert to [`PlyGaussianPod`] with the `f_rest_*` layout of `sh_degree`.
    pub fn to_ply(&self, sh_degree: GaussianShDegree) -> PlyGaussianPod {
        let n = sh_degree.rest_per_channel();
        let mut sh = [0.0; 3 * 15];
        for i in 0..n {
            sh[i] = self.sh[i].x;
            sh[i + n] = self.sh[i].y;
            sh[i + 2 * n] = self.sh[i].z;
        }

        PlyGaussianPod {
            pos: self.pos.to_array(),
            normal: [0.0, 0.0, 0.0],
            color: self.sh0.to_array(),
            sh,
            alpha: -(1.0 / self.opacity - 1.0).ln(),
            scale: self.scale.map(f32::ln).to_array(),
            rot: [self.rot.w, self.rot.x, self.rot.y, self.rot.z],
        }
    }

    /// Get the rotation and scale matrix `R * S`, so that `Σ = M * Mᵀ`.
    pub fn rot_scale(&self) -> Mat3 {
        Mat3::from_quat(self.rot) * Mat3::from_diagonal(self.scale)
    }

    /// Get the 3D covariance matrix.
    pub fn covariance(&self) -> Mat3 {
        let m = self.rot_scale();
        m * m.transpose()
    }

    /// Get the volume of the ellipsoid spanned by one standard deviation.
    pub fn volume(&self) -> f64 {
        4.0 / 3.0
            * std::f64::consts::PI
            * self.scale.x as f64
            * self.scale.y as f64
            * self.scale.z as f64
    }

    /// Get the principal axis with the largest scale in world space.
    pub fn dominant_axis(&self) -> Vec3 {
        let axis = match self.scale.max_position() {
            0 => Vec3::X,
            1 => Vec3::Y,
            _ => Vec3::Z,
        };
        self.rot * axis
    }

    /// Get the view independent color.
    pub fn color_dc(&self) -> Vec3 {
        eval_sh_dc(self.sh0)
    }

    /// Get the color as seen from `dir`, which must be normalized.
    pub fn color_in(&self, sh_degree: GaussianShDegree, dir: Vec3) -> Vec3 {
        eval_sh(sh_degree, self.sh0, &self.sh, dir)
    }
}

impl PlyGaussianPod {
    /// Check if [`Gaussian::from_ply`] has to clamp any value of this record.
    pub fn is_degenerate(&self) -> bool {
        let rot_len = Vec4::from_array(self.rot).length();
        let scale = Vec3::from_array(self.scale).exp();

        !rot_len.is_finite()
            || rot_len == 0.0
            || !scale.is_finite()
            || scale.min_element() < MIN_SCALE
            || !self.alpha.is_finite()
    }
}

/// A vector of Gaussians.
#[derive(Debug, Clone, Default)]
pub struct Gaussians {
    /// The Gaussians.
    pub gaussians: Vec<Gaussian>,

    /// The SH degree of the model.
    pub sh_degree: GaussianShDegree,
}

impl Gaussians {
    /// Create a new Gaussians.
    pub fn new(gaussians: Vec<Gaussian>, sh_degree: GaussianShDegree) -> Self {
        Self {
            gaussians,
            sh_degree,
        }
    }

    /// Iterate over [`Gaussian`].
    pub fn iter(&self) -> impl Iterator<Item = &Gaussian> + '_ {
        self.gaussians.iter()
    }

    /// Get the number of Gaussians.
    pub fn len(&self) -> usize {
        self.gaussians.len()
    }

    /// Check if there are no Gaussians.
    pub fn is_empty(&self) -> bool {
        self.gaussians.is_empty()
    }

    /// Keep only the Gaussians where `mask` is `true`.
    ///
    /// `mask` must have the same length as the Gaussians.
    pub fn retain_mask(&mut self, mask: &[bool]) {
        debug_assert_eq!(mask.len(), self.gaussians.len());
        let mut keep = mask.iter();
        self.gaussians
            .retain(|_| keep.next().copied().unwrap_or(false));
    }

    /// Read a Gaussian PLY from file.
    pub fn read_ply_file(path: impl AsRef<std::path::Path>) -> Result<Self, FormatError> {
        let file = std::fs::File::open(path)?;
        let mut reader = std::io::BufReader::new(file);
        Self::read_ply(&mut reader)
    }

    /// Read a Gaussian PLY from buffer.
    ///
    /// Records are activated while being read, so the raw records are never held in memory
    /// all at once.
    pub fn read_ply(reader: &mut impl BufRead) -> Result<Self, FormatError> {
        let header = PlyGaussians::read_ply_header(reader)?;
        let sh_degree = header.sh_degree();
        let count = header.count().ok_or(FormatError::VertexElementNotFound)?;

        let mut gaussians =
            Vec::with_capacity(count.min(PlyGaussians::MAX_PREALLOCATED_COUNT));
        let mut degenerate = 0usize;

        for (index, ply) in PlyGaussians::read_ply_gaussians(reader, header)?.enumerate() {
            let ply = ply?;

            if !Vec3::from_array(ply.pos).is_finite() {
                return Err(FormatError::NonFinitePosition { index });
            }

            if ply.is_degenerate() {
                degenerate += 1;
            }

            gaussians.push(Gaussian::from_ply(&ply, sh_degree));
        }

        if degenerate > 0 {
            log::warn!("Clamped {degenerate} degenerate Gaussians");
        }

        log::info!(
            "Loaded {} Gaussians with SH degree {}",
            gaussians.len(),
            sh_degree.get()
        );

        Ok(Self {
            gaussians,
            sh_degree,
        })
    }

    /// Convert from raw [`PlyGaussians`].
    pub fn from_ply(ply: &PlyGaussians) -> Self {
        Self {
            gaussians: ply
                .iter()
                .map(|g| Gaussian::from_ply(g, ply.sh_degree))
                .collect(),
            sh_degree: ply.sh_degree,
        }
    }

    /// Convert to raw [`PlyGaussians`].
    pub fn to_ply(&self) -> PlyGaussians {
        PlyGaussians {
            gaussians: self
                .gaussians
                .iter()
                .map(|g| g.to_ply(self.sh_degree))
                .collect(),
            sh_degree: self.sh_degree,
        }
    }
}

impl FromIterator<Gaussian> for Gaussians {
    fn from_iter<T: IntoIterator<Item = Gaussian>>(iter: T) -> Self {
        Self {
            gaussians: iter.into_iter().collect(),
            sh_degree: GaussianShDegree::default(),
        }
    }
}
