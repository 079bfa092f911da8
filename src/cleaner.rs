use rayon::prelude::*;
use rstar::{RTree, primitives::GeomWithData};

use crate::{ConfigError, Gaussians};

/// A Gaussian center tagged with its index.
type IndexedCenter = GeomWithData<[f32; 3], usize>;

/// What to do with Gaussians when the population is too small for neighbour statistics.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SparsePolicy {
    /// Treat them as outliers, isolation is what the test looks for.
    #[default]
    Reject,

    /// Keep them.
    Keep,
}

/// The neighbour distance test of [`SurfaceOutlierCleaner`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceDistanceTest {
    std_ratio: f32,
    neighbours: usize,
    sparse_policy: SparsePolicy,
}

impl SurfaceDistanceTest {
    /// Create a new surface distance test.
    ///
    /// A Gaussian is an outlier if its mean distance to its `neighbours` nearest Gaussians exceeds
    /// the population mean by more than `std_ratio` standard deviations.
    pub fn new(std_ratio: f32, neighbours: usize) -> Result<Self, ConfigError> {
        if !std_ratio.is_finite() || std_ratio < 0.0 {
            return Err(ConfigError::InvalidSurfaceDistanceStd { value: std_ratio });
        }

        if neighbours == 0 {
            return Err(ConfigError::InvalidNeighbours);
        }

        Ok(Self {
            std_ratio,
            neighbours,
            sparse_policy: SparsePolicy::default(),
        })
    }

    /// Set the [`SparsePolicy`].
    pub fn with_sparse_policy(mut self, sparse_policy: SparsePolicy) -> Self {
        self.sparse_policy = sparse_policy;
        self
    }

    /// Get the standard deviation ratio.
    pub fn std_ratio(&self) -> f32 {
        self.std_ratio
    }

    /// Get the number of neighbours.
    pub fn neighbours(&self) -> usize {
        self.neighbours
    }

    /// Get the [`SparsePolicy`].
    pub fn sparse_policy(&self) -> SparsePolicy {
        self.sparse_policy
    }

    /// Compute the mean distance of every Gaussian to its nearest neighbours.
    ///
    /// Returns [`None`] if there are not more Gaussians than neighbours.
    pub fn neighbour_distances(&self, gaussians: &Gaussians) -> Option<Vec<f32>> {
        if gaussians.len() <= self.neighbours {
            return None;
        }

        let tree = RTree::bulk_load(
            gaussians
                .iter()
                .enumerate()
                .map(|(i, g)| IndexedCenter::new(g.pos.to_array(), i))
                .collect(),
        );

        let distances = gaussians
            .gaussians
            .par_iter()
            .enumerate()
            .map(|(i, g)| {
                let sum = tree
                    .nearest_neighbor_iter_with_distance_2(&g.pos.to_array())
                    .filter(|(center, _)| center.data != i)
                    .take(self.neighbours)
                    .map(|(_, dist_sq)| (dist_sq as f64).sqrt())
                    .sum::<f64>();
                (sum / self.neighbours as f64) as f32
            })
            .collect();

        Some(distances)
    }

    /// Compute the inlier mask, `true` for Gaussians that pass the test.
    pub fn inlier_mask(&self, gaussians: &Gaussians) -> Vec<bool> {
        let Some(distances) = self.neighbour_distances(gaussians) else {
            log::warn!(
                "Too few Gaussians ({}) for {} neighbours, sparse policy: {:?}",
                gaussians.len(),
                self.neighbours,
                self.sparse_policy,
            );
            return vec![self.sparse_policy == SparsePolicy::Keep; gaussians.len()];
        };

        let n = distances.len() as f64;
        let mean = distances.iter().map(|&d| d as f64).sum::<f64>() / n;
        let variance = distances
            .iter()
            .map(|&d| (d as f64 - mean).powi(2))
            .sum::<f64>()
            / n;
        let threshold = mean + self.std_ratio as f64 * variance.sqrt();

        log::debug!(
            "Neighbour distance mean {mean}, std {}, threshold {threshold}",
            variance.sqrt()
        );

        distances.iter().map(|&d| d as f64 <= threshold).collect()
    }
}

/// Removes floaters, i.e. faint or isolated Gaussians.
///
/// Both tests are evaluated on the same population, so raising the opacity floor or enabling the
/// distance test can only remove more Gaussians.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct SurfaceOutlierCleaner {
    min_opacity: f32,
    surface: Option<SurfaceDistanceTest>,
}

impl SurfaceOutlierCleaner {
    /// Create a new cleaner with only an opacity floor.
    pub fn new(min_opacity: f32) -> Result<Self, ConfigError> {
        if !(0.0..=1.0).contains(&min_opacity) {
            return Err(ConfigError::InvalidMinOpacity { value: min_opacity });
        }

        Ok(Self {
            min_opacity,
            surface: None,
        })
    }

    /// Set the [`SurfaceDistanceTest`].
    pub fn with_surface_distance(mut self, surface: SurfaceDistanceTest) -> Self {
        self.surface = Some(surface);
        self
    }

    /// Get the opacity floor.
    pub fn min_opacity(&self) -> f32 {
        self.min_opacity
    }

    /// Get the [`SurfaceDistanceTest`].
    pub fn surface(&self) -> Option<&SurfaceDistanceTest> {
        self.surface.as_ref()
    }

    /// Compute the keep mask.
    pub fn keep_mask(&self, gaussians: &Gaussians) -> Vec<bool> {
        let opacity = gaussians.iter().map(|g| g.opacity >= self.min_opacity);

        match &self.surface {
            Some(surface) => opacity
                .zip(surface.inlier_mask(gaussians))
                .map(|(a, b)| a && b)
                .collect(),
            None => opacity.collect(),
        }
    }

    /// Remove the Gaussians rejected by [`SurfaceOutlierCleaner::keep_mask`].
    pub fn clean(&self, gaussians: &mut Gaussians) {
        let before = gaussians.len();
        let mask = self.keep_mask(gaussians);
        gaussians.retain_mask(&mask);

        log::info!(
            "Cleaning kept {} of {before} Gaussians (min opacity {}, surface test {})",
            gaussians.len(),
            self.min_opacity,
            self.surface.is_some(),
        );
    }
}
