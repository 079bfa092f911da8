use std::path::{Path, PathBuf};

use glam::*;
use serde::Deserialize;

use crate::ConfigError;

/// The pinhole intrinsics of a camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Intrinsics {
    pub fl_x: f32,
    pub fl_y: f32,
    pub cx: f32,
    pub cy: f32,
    pub w: u32,
    pub h: u32,
}

/// A camera frame of a scene.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraFrame {
    /// The image path, relative to the transforms file.
    pub file_path: PathBuf,

    /// The camera-to-world matrix in the canonical convention.
    pub camera_to_world: Mat4,

    /// The intrinsics, either the frame's own or the scene's.
    pub intrinsics: Intrinsics,
}

impl CameraFrame {
    /// Get the camera center in world space.
    pub fn center(&self) -> Vec3 {
        self.camera_to_world.w_axis.truncate()
    }

    /// Get the viewing direction in world space, the camera's -Z axis.
    pub fn forward(&self) -> Vec3 {
        -self.camera_to_world.z_axis.truncate().normalize_or_zero()
    }
}

/// Options for [`SceneTransforms`] loading.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformOptions {
    /// Overrides the scene's `axis_flip` flag.
    pub axis_flip: Option<bool>,

    /// Whether every frame's image must exist.
    pub require_images: bool,
}

/// The camera frames of a scene, parsed from a `transforms.json`.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneTransforms {
    /// The frames, in file order.
    pub frames: Vec<CameraFrame>,

    /// Whether [`SceneTransforms::AXIS_FLIP`] was applied to the frames.
    pub axis_flip: bool,
}

impl SceneTransforms {
    /// The legacy axis flip, negating the camera Y and Z axes.
    ///
    /// This is right-multiplied onto camera-to-world matrices, so only the rotation is affected.
    pub const AXIS_FLIP: Mat4 = Mat4::from_diagonal(Vec4::new(1.0, -1.0, -1.0, 1.0));

    /// Read from a `transforms.json` file.
    ///
    /// Image paths are resolved relative to the file's directory.
    pub fn read_json_file(
        path: impl AsRef<Path>,
        options: &TransformOptions,
    ) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let base_dir = path.parent().unwrap_or(Path::new("."));
        Self::from_json_str(&json, base_dir, options)
    }

    /// Parse from `transforms.json` content.
    ///
    /// `base_dir` is where image paths are resolved from if [`TransformOptions::require_images`]
    /// is set.
    pub fn from_json_str(
        json: &str,
        base_dir: impl AsRef<Path>,
        options: &TransformOptions,
    ) -> Result<Self, ConfigError> {
        let file = serde_json::from_str::<TransformsJson>(json)?;
        Self::from_json(file, base_dir.as_ref(), options)
    }

    fn from_json(
        file: TransformsJson,
        base_dir: &Path,
        options: &TransformOptions,
    ) -> Result<Self, ConfigError> {
        if file.frames.is_empty() {
            return Err(ConfigError::EmptyFrames);
        }

        let axis_flip = options.axis_flip.unwrap_or(file.axis_flip);

        let frames = file
            .frames
            .iter()
            .enumerate()
            .map(|(i, frame)| -> Result<_, ConfigError> {
                let intrinsics = frame
                    .intrinsics
                    .resolve(&file.intrinsics)
                    .ok_or(ConfigError::MissingIntrinsics { frame: i })?;

                let camera_to_world = normalize_camera_to_world(&frame.transform_matrix)
                    .ok_or(ConfigError::InvalidTransformMatrix { frame: i })?;
                let camera_to_world = match axis_flip {
                    true => camera_to_world * Self::AXIS_FLIP,
                    false => camera_to_world,
                };

                let file_path = PathBuf::from(&frame.file_path);
                if options.require_images {
                    let path = base_dir.join(&file_path);
                    if !path.exists() {
                        return Err(ConfigError::MissingImage { path });
                    }
                }

                Ok(CameraFrame {
                    file_path,
                    camera_to_world,
                    intrinsics,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        log::info!(
            "Loaded {} camera frames (axis flip: {axis_flip})",
            frames.len()
        );

        Ok(Self { frames, axis_flip })
    }

    /// Get the number of frames.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Check if there are no frames.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Iterate over the camera centers.
    pub fn camera_centers(&self) -> impl Iterator<Item = Vec3> + '_ {
        self.frames.iter().map(CameraFrame::center)
    }

    /// Iterate over the camera viewing directions.
    pub fn camera_forwards(&self) -> impl Iterator<Item = Vec3> + '_ {
        self.frames.iter().map(CameraFrame::forward)
    }

    /// Get the mean of the camera centers.
    pub fn camera_centroid(&self) -> Vec3 {
        self.camera_centers().sum::<Vec3>() / self.frames.len().max(1) as f32
    }
}

/// Parse a row-major matrix and normalize its rotation columns.
///
/// Returns [`None`] if the matrix is not finite, not affine, or has a degenerate axis.
fn normalize_camera_to_world(rows: &[[f32; 4]; 4]) -> Option<Mat4> {
    let m = Mat4::from_cols_array_2d(rows).transpose();

    if !m.is_finite() || !m.row(3).abs_diff_eq(Vec4::W, 1e-4) {
        return None;
    }

    let x = m.x_axis.truncate().try_normalize()?;
    let y = m.y_axis.truncate().try_normalize()?;
    let z = m.z_axis.truncate().try_normalize()?;

    Some(Mat4::from_cols(
        x.extend(0.0),
        y.extend(0.0),
        z.extend(0.0),
        m.w_axis.truncate().extend(1.0),
    ))
}

#[derive(Debug, Default, Deserialize)]
struct IntrinsicsJson {
    fl_x: Option<f32>,
    fl_y: Option<f32>,
    cx: Option<f32>,
    cy: Option<f32>,
    w: Option<u32>,
    h: Option<u32>,
}

impl IntrinsicsJson {
    /// Resolve with fallback to `scene`, returns [`None`] if focal length or size is missing.
    fn resolve(&self, scene: &IntrinsicsJson) -> Option<Intrinsics> {
        let fl_x = self.fl_x.or(scene.fl_x)?;
        let fl_y = self.fl_y.or(scene.fl_y).unwrap_or(fl_x);
        let w = self.w.or(scene.w)?;
        let h = self.h.or(scene.h)?;
        let cx = self.cx.or(scene.cx).unwrap_or(w as f32 / 2.0);
        let cy = self.cy.or(scene.cy).unwrap_or(h as f32 / 2.0);

        Some(Intrinsics {
            fl_x,
            fl_y,
            cx,
            cy,
            w,
            h,
        })
    }
}

#[derive(Debug, Deserialize)]
struct FrameJson {
    file_path: String,
    transform_matrix: [[f32; 4]; 4],
    #[serde(flatten)]
    intrinsics: IntrinsicsJson,
}

#[derive(Debug, Deserialize)]
struct TransformsJson {
    #[serde(flatten)]
    intrinsics: IntrinsicsJson,
    #[serde(default)]
    axis_flip: bool,
    #[serde(default)]
    frames: Vec<FrameJson>,
}
