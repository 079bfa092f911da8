use bytemuck::Zeroable;
use glam::*;
use rand::{Rng, SeedableRng, rngs::StdRng};
use rand_distr::StandardNormal;
use rayon::prelude::*;

use crate::{Gaussian, GaussianShDegree, Gaussians, PlyPointPod, SampleAllocation};

/// How the color of sampled points is computed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColourQuality {
    /// Evaluate all SH degrees of the model in the [`ViewReference`] direction.
    #[default]
    Full,

    /// Use only the view independent DC term.
    Diffuse,
}

/// The direction a Gaussian is viewed from for [`ColourQuality::Full`].
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub enum ViewReference {
    /// The Gaussian's principal axis with the largest scale.
    #[default]
    DominantAxis,

    /// From a point towards the Gaussian's center, usually the centroid of the cameras.
    ///
    /// Falls back to [`ViewReference::DominantAxis`] for a Gaussian at the point itself.
    From(Vec3),
}

impl ViewReference {
    /// Get the normalized view direction for a Gaussian.
    pub fn direction(&self, gaussian: &Gaussian) -> Vec3 {
        match self {
            Self::DominantAxis => gaussian.dominant_axis(),
            Self::From(origin) => (gaussian.pos - *origin)
                .try_normalize()
                .unwrap_or_else(|| gaussian.dominant_axis()),
        }
    }
}

/// Draws colored points from Gaussians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointSampler {
    seed: u64,
    colour_quality: ColourQuality,
    view_reference: ViewReference,
    batch_points: usize,
}

impl PointSampler {
    /// The default number of points generated per batch.
    pub const DEFAULT_BATCH_POINTS: usize = 1 << 20;

    /// Create a new sampler.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            colour_quality: ColourQuality::default(),
            view_reference: ViewReference::default(),
            batch_points: Self::DEFAULT_BATCH_POINTS,
        }
    }

    /// Set the [`ColourQuality`].
    pub fn with_colour_quality(mut self, colour_quality: ColourQuality) -> Self {
        self.colour_quality = colour_quality;
        self
    }

    /// Set the [`ViewReference`].
    pub fn with_view_reference(mut self, view_reference: ViewReference) -> Self {
        self.view_reference = view_reference;
        self
    }

    /// Set the number of points generated per batch, at least 1.
    pub fn with_batch_points(mut self, batch_points: usize) -> Self {
        self.batch_points = batch_points.max(1);
        self
    }

    /// Get the seed.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Get the [`ColourQuality`].
    pub fn colour_quality(&self) -> ColourQuality {
        self.colour_quality
    }

    /// Get the [`ViewReference`].
    pub fn view_reference(&self) -> ViewReference {
        self.view_reference
    }

    /// Get the color of the points of a Gaussian.
    pub fn color(&self, gaussian: &Gaussian, sh_degree: GaussianShDegree) -> U8Vec3 {
        let color = match self.colour_quality {
            ColourQuality::Full => {
                gaussian.color_in(sh_degree, self.view_reference.direction(gaussian))
            }
            ColourQuality::Diffuse => gaussian.color_dc(),
        };

        (color * 255.0).round().as_u8vec3()
    }

    /// Get the random number generator of the Gaussian at `index`.
    ///
    /// Each Gaussian has its own stream, so the output does not depend on how the work is split.
    pub fn rng(&self, index: usize) -> StdRng {
        StdRng::seed_from_u64(splitmix64(self.seed ^ splitmix64(index as u64)))
    }

    /// Draw all points of the Gaussian at `index` into `out`.
    pub fn sample_gaussian(
        &self,
        index: usize,
        gaussian: &Gaussian,
        sh_degree: GaussianShDegree,
        out: &mut [PlyPointPod],
    ) {
        let color = self.color(gaussian, sh_degree);
        draw(&mut self.rng(index), gaussian, color, out);
    }

    /// Draw the points of all Gaussians by `allocation`, passing them to `sink` in batches.
    ///
    /// Points are passed in order of the allocation offsets. Batches hold at most the configured
    /// number of points, except that they are never empty.
    pub fn sample<E>(
        &self,
        gaussians: &Gaussians,
        allocation: &SampleAllocation,
        mut sink: impl FnMut(&[PlyPointPod]) -> Result<(), E>,
    ) -> Result<(), E> {
        debug_assert_eq!(gaussians.len(), allocation.len());

        let counts = allocation.counts();
        let mut buffer = Vec::new();
        let mut start = 0;

        while start < counts.len() {
            if counts[start] as usize > self.batch_points {
                let count = counts[start] as usize;
                self.sample_large(start, count, gaussians, &mut buffer, &mut sink)?;
                start += 1;
                continue;
            }

            let mut end = start;
            let mut len = 0;
            while end < counts.len() && len + counts[end] as usize <= self.batch_points {
                len += counts[end] as usize;
                end += 1;
            }

            if len > 0 {
                buffer.clear();
                buffer.resize(len, PlyPointPod::zeroed());

                let mut slices = Vec::with_capacity(end - start);
                let mut rest = buffer.as_mut_slice();
                for &count in &counts[start..end] {
                    let (head, tail) = std::mem::take(&mut rest).split_at_mut(count as usize);
                    slices.push(head);
                    rest = tail;
                }

                slices
                    .into_par_iter()
                    .zip(start..end)
                    .filter(|(out, _)| !out.is_empty())
                    .for_each(|(out, i)| {
                        self.sample_gaussian(i, &gaussians.gaussians[i], gaussians.sh_degree, out)
                    });

                log::debug!("Sampled {len} points from Gaussians {start}..{end}");
                sink(buffer.as_slice())?;
            }

            start = end;
        }

        Ok(())
    }

    /// Draw the points of a Gaussian too large for one batch, in batch sized chunks.
    fn sample_large<E>(
        &self,
        index: usize,
        count: usize,
        gaussians: &Gaussians,
        buffer: &mut Vec<PlyPointPod>,
        sink: &mut impl FnMut(&[PlyPointPod]) -> Result<(), E>,
    ) -> Result<(), E> {
        let gaussian = &gaussians.gaussians[index];
        let color = self.color(gaussian, gaussians.sh_degree);
        let mut rng = self.rng(index);

        let mut remaining = count;
        while remaining > 0 {
            let len = remaining.min(self.batch_points);
            buffer.clear();
            buffer.resize(len, PlyPointPod::zeroed());
            draw(&mut rng, gaussian, color, buffer.as_mut_slice());
            sink(buffer.as_slice())?;
            remaining -= len;
        }

        Ok(())
    }
}

/// Draw points from the distribution of a Gaussian.
fn draw(rng: &mut StdRng, gaussian: &Gaussian, color: U8Vec3, out: &mut [PlyPointPod]) {
    let m = gaussian.rot_scale();
    for point in out {
        let z = Vec3::new(
            rng.sample(StandardNormal),
            rng.sample(StandardNormal),
            rng.sample(StandardNormal),
        );
        *point = PlyPointPod::new(gaussian.pos + m * z, color);
    }
}

fn splitmix64(x: u64) -> u64 {
    let mut z = x.wrapping_add(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}
