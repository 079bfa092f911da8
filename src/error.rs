use thiserror::Error;

/// The error type for reading Gaussians from a PLY source.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("Gaussian vertex element not found in PLY header")]
    VertexElementNotFound,
    #[error("required Gaussian property missing in PLY header: {name}")]
    MissingProperty { name: &'static str },
    #[error("Gaussian element property invalid or missing in PLY")]
    InvalidPropertyValue,
    #[error("unsupported number of f_rest SH properties: {count}, expected one of 0, 9, 24 or 45")]
    UnsupportedShCoefficientCount { count: usize },
    #[error("Gaussian {index} has a non-finite position")]
    NonFinitePosition { index: usize },
}

/// The error type for configuration and scene transform validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    #[error("scene transforms contain no frames")]
    EmptyFrames,
    #[error("referenced image does not exist: {}", path.display())]
    MissingImage { path: std::path::PathBuf },
    #[error("frame {frame} has no intrinsics and the scene has no global intrinsics")]
    MissingIntrinsics { frame: usize },
    #[error("frame {frame} has an invalid transform matrix")]
    InvalidTransformMatrix { frame: usize },
    #[error("bounding box min must be less than max on axis {axis}: {min} >= {max}")]
    InvalidBoundingBox { axis: usize, min: f32, max: f32 },
    #[error("bounding box requires both min and max corners")]
    PartialBoundingBox,
    #[error("number of points must not be negative: {num_points}")]
    NegativeNumPoints { num_points: i64 },
    #[error("surface distance std is required when cleaning is enabled")]
    MissingSurfaceDistanceStd,
    #[error("surface distance std must be finite and non-negative: {value}")]
    InvalidSurfaceDistanceStd { value: f32 },
    #[error("min opacity must be in [0, 1]: {value}")]
    InvalidMinOpacity { value: f32 },
    #[error("neighbour count for cleaning must be at least 1")]
    InvalidNeighbours,
}

/// The error type for [`PointCloudWriter`](crate::PointCloudWriter).
#[derive(Debug, Error)]
pub enum WritePointCloudError {
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("points count mismatch: {written} != {declared}")]
    CountMismatch { written: u64, declared: u64 },
    #[error("more points written than declared in header: {declared}")]
    Overflow { declared: u64 },
}

/// The error type for [`Converter::convert`](crate::Converter::convert).
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("{0}")]
    Format(#[from] FormatError),
    #[error("{0}")]
    Config(#[from] ConfigError),
    #[error("{0}")]
    Write(#[from] WritePointCloudError),
}
