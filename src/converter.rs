use std::{io::Write, path::Path};

use crate::{
    ColourQuality, ConfigError, ConversionConfig, ConversionOptions, ConvertError, Gaussians,
    PlyPointPod, PointCloudFileWriter, PointCloudWriter, SampleAllocation, SceneTransforms,
    ViewReference, WritePointCloudError,
};

/// The counts of a conversion after each stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversionReport {
    /// Gaussians read from the model.
    pub loaded: usize,

    /// Gaussians inside the bounding box.
    pub after_bounding_box: usize,

    /// Gaussians that passed the opacity floor and cleaning.
    pub after_cleaning: usize,

    /// Points in the output.
    pub points_written: u64,

    /// The colour mode used.
    pub colour_quality: ColourQuality,
}

/// Converts Gaussian splatting models into point clouds.
#[derive(Debug, Clone, Default)]
pub struct Converter {
    options: ConversionOptions,
}

impl Converter {
    /// Create a new converter.
    pub fn new(options: ConversionOptions) -> Self {
        Self { options }
    }

    /// Create a new converter by validating `config`.
    pub fn from_config(config: ConversionConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(config.try_into()?))
    }

    /// Get the options.
    pub fn options(&self) -> &ConversionOptions {
        &self.options
    }

    /// Load the scene transforms at `path` with the configured options.
    pub fn load_transforms(&self, path: impl AsRef<Path>) -> Result<SceneTransforms, ConfigError> {
        SceneTransforms::read_json_file(path, &self.options.transform)
    }

    /// Convert the model at `input` into a point cloud at `output`.
    ///
    /// Nothing is left at `output` if the conversion fails.
    pub fn convert(
        &self,
        input: impl AsRef<Path>,
        transforms: Option<&Path>,
        output: impl AsRef<Path>,
    ) -> Result<ConversionReport, ConvertError> {
        let transforms = transforms
            .map(|path| self.load_transforms(path))
            .transpose()?;
        let mut gaussians = Gaussians::read_ply_file(input)?;

        let (loaded, after_bounding_box, after_cleaning) = self.filter(&mut gaussians);
        let allocation = SampleAllocation::new(&gaussians, self.options.num_points);

        let mut writer = PointCloudFileWriter::create(output, allocation.total())?;
        self.sample(&gaussians, &allocation, transforms.as_ref(), |points| {
            writer.write_points(points)
        })?;
        writer.finish()?;

        Ok(self.report(loaded, after_bounding_box, after_cleaning, &allocation))
    }

    /// Convert the model read from `input` into a point cloud written to `output`.
    pub fn convert_to_writer<W: Write>(
        &self,
        input: &mut impl std::io::BufRead,
        transforms: Option<&SceneTransforms>,
        output: W,
    ) -> Result<(W, ConversionReport), ConvertError> {
        let gaussians = Gaussians::read_ply(input)?;
        self.convert_gaussians(gaussians, transforms, output)
    }

    /// Convert loaded Gaussians into a point cloud written to `output`.
    pub fn convert_gaussians<W: Write>(
        &self,
        mut gaussians: Gaussians,
        transforms: Option<&SceneTransforms>,
        output: W,
    ) -> Result<(W, ConversionReport), ConvertError> {
        let (loaded, after_bounding_box, after_cleaning) = self.filter(&mut gaussians);
        let allocation = SampleAllocation::new(&gaussians, self.options.num_points);

        let mut writer = PointCloudWriter::new(output, allocation.total())?;
        self.sample(&gaussians, &allocation, transforms, |points| {
            writer.write_points(points)
        })?;
        let output = writer.finish()?;

        Ok((
            output,
            self.report(loaded, after_bounding_box, after_cleaning, &allocation),
        ))
    }

    /// Apply the bounding box and the cleaner, returns the counts before and after each.
    fn filter(&self, gaussians: &mut Gaussians) -> (usize, usize, usize) {
        let loaded = gaussians.len();

        if let Some(bounding_box) = &self.options.bounding_box {
            bounding_box.filter(gaussians);
        }
        let after_bounding_box = gaussians.len();

        self.options.cleaner.clean(gaussians);
        let after_cleaning = gaussians.len();

        (loaded, after_bounding_box, after_cleaning)
    }

    fn sample(
        &self,
        gaussians: &Gaussians,
        allocation: &SampleAllocation,
        transforms: Option<&SceneTransforms>,
        sink: impl FnMut(&[PlyPointPod]) -> Result<(), WritePointCloudError>,
    ) -> Result<(), WritePointCloudError> {
        let view_reference = match transforms {
            Some(transforms) => ViewReference::From(transforms.camera_centroid()),
            None => ViewReference::DominantAxis,
        };
        let sampler = self.options.sampler.with_view_reference(view_reference);

        log::info!(
            "Sampling {} points with {:?} colour from {view_reference:?}",
            allocation.total(),
            sampler.colour_quality(),
        );

        sampler.sample(gaussians, allocation, sink)
    }

    fn report(
        &self,
        loaded: usize,
        after_bounding_box: usize,
        after_cleaning: usize,
        allocation: &SampleAllocation,
    ) -> ConversionReport {
        ConversionReport {
            loaded,
            after_bounding_box,
            after_cleaning,
            points_written: allocation.total(),
            colour_quality: self.options.sampler.colour_quality(),
        }
    }
}
