use glam::*;

use crate::{ConfigError, Gaussians};

/// An axis-aligned box in world space.
///
/// Always has `min < max` on every axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    min: Vec3,
    max: Vec3,
}

impl BoundingBox {
    /// Create a new bounding box.
    ///
    /// Returns [`ConfigError::InvalidBoundingBox`] if `min` is not less than `max` on any axis.
    pub fn new(min: Vec3, max: Vec3) -> Result<Self, ConfigError> {
        if let Some(axis) = (0..3).find(|&axis| !(min[axis] < max[axis])) {
            return Err(ConfigError::InvalidBoundingBox {
                axis,
                min: min[axis],
                max: max[axis],
            });
        }

        Ok(Self { min, max })
    }

    /// Get the min corner.
    pub fn min(&self) -> Vec3 {
        self.min
    }

    /// Get the max corner.
    pub fn max(&self) -> Vec3 {
        self.max
    }

    /// Check if `point` is inside the closed box.
    pub fn contains(&self, point: Vec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }

    /// Remove the Gaussians whose center is outside the box.
    ///
    /// Only the center is tested, a Gaussian straddling a face is kept or removed as a whole.
    pub fn filter(&self, gaussians: &mut Gaussians) {
        let before = gaussians.len();
        gaussians.gaussians.retain(|g| self.contains(g.pos));

        log::info!(
            "Bounding box {:?} to {:?} kept {} of {before} Gaussians",
            self.min,
            self.max,
            gaussians.len(),
        );
    }
}
