use std::path::Path;

use glam::*;
use serde::Deserialize;

use crate::{
    BoundingBox, ColourQuality, ConfigError, PointSampler, SparsePolicy, SurfaceDistanceTest,
    SurfaceOutlierCleaner, TransformOptions,
};

/// The raw configuration of a conversion, as read from JSON.
///
/// Validate it into [`ConversionOptions`] with [`TryFrom`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ConversionConfig {
    pub bounding_box_min: Option<[f32; 3]>,
    pub bounding_box_max: Option<[f32; 3]>,
    pub clean_pointcloud: bool,
    pub surface_distance_std: Option<f32>,
    pub min_opacity: f32,
    pub num_points: i64,
    pub colour_quality: ColourQuality,
    pub neighbours: usize,
    pub sparse_policy: SparsePolicy,
    pub seed: u64,
    pub axis_flip: Option<bool>,
    pub require_images: bool,
    pub batch_points: usize,
}

impl ConversionConfig {
    /// The default number of points.
    pub const DEFAULT_NUM_POINTS: i64 = 10_000_000;

    /// The default number of neighbours of the surface distance test.
    pub const DEFAULT_NEIGHBOURS: usize = 10;

    /// Parse from JSON content, missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            bounding_box_min: None,
            bounding_box_max: None,
            clean_pointcloud: false,
            surface_distance_std: None,
            min_opacity: 0.0,
            num_points: Self::DEFAULT_NUM_POINTS,
            colour_quality: ColourQuality::default(),
            neighbours: Self::DEFAULT_NEIGHBOURS,
            sparse_policy: SparsePolicy::default(),
            seed: 0,
            axis_flip: None,
            require_images: false,
            batch_points: PointSampler::DEFAULT_BATCH_POINTS,
        }
    }
}

/// The validated options of a conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionOptions {
    /// The region to keep, everything if [`None`].
    pub bounding_box: Option<BoundingBox>,

    /// The opacity floor and the optional surface distance test.
    pub cleaner: SurfaceOutlierCleaner,

    /// The exact number of output points.
    pub num_points: u64,

    /// The sampler, its view reference is set per scene by the converter.
    pub sampler: PointSampler,

    /// How scene transforms are loaded.
    pub transform: TransformOptions,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            bounding_box: None,
            cleaner: SurfaceOutlierCleaner::default(),
            num_points: ConversionConfig::DEFAULT_NUM_POINTS as u64,
            sampler: PointSampler::new(0),
            transform: TransformOptions::default(),
        }
    }
}

impl TryFrom<ConversionConfig> for ConversionOptions {
    type Error = ConfigError;

    fn try_from(config: ConversionConfig) -> Result<Self, Self::Error> {
        let bounding_box = match (config.bounding_box_min, config.bounding_box_max) {
            (Some(min), Some(max)) => Some(BoundingBox::new(
                Vec3::from_array(min),
                Vec3::from_array(max),
            )?),
            (None, None) => None,
            _ => return Err(ConfigError::PartialBoundingBox),
        };

        let num_points = u64::try_from(config.num_points).map_err(|_| {
            ConfigError::NegativeNumPoints {
                num_points: config.num_points,
            }
        })?;

        let mut cleaner = SurfaceOutlierCleaner::new(config.min_opacity)?;

        if config.clean_pointcloud {
            let std_ratio = config
                .surface_distance_std
                .ok_or(ConfigError::MissingSurfaceDistanceStd)?;
            let surface = SurfaceDistanceTest::new(std_ratio, config.neighbours)?
                .with_sparse_policy(config.sparse_policy);
            cleaner = cleaner.with_surface_distance(surface);
        }

        let sampler = PointSampler::new(config.seed)
            .with_colour_quality(config.colour_quality)
            .with_batch_points(config.batch_points);

        let transform = TransformOptions {
            axis_flip: config.axis_flip,
            require_images: config.require_images,
        };

        Ok(Self {
            bounding_box,
            cleaner,
            num_points,
            sampler,
            transform,
        })
    }
}
