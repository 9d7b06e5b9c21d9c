//! Eye aperture ratio (EAR) from contour landmarks

use crate::detector::{EyeLandmarks, EyePoint, EYE_LANDMARKS};
use crate::DrowsinessError;

/// Corner separations below this (in input units) cannot be divided by
pub const MIN_EYE_WIDTH: f64 = 1e-6;

/// Computes the averaged eye aperture ratio of both eyes
#[derive(Debug, Clone, Copy)]
pub struct EyeApertureEstimator {
    min_width: f64,
}

impl Default for EyeApertureEstimator {
    fn default() -> Self {
        Self {
            min_width: MIN_EYE_WIDTH,
        }
    }
}

impl EyeApertureEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a coarser degeneracy guard, e.g. for pixel-quantized landmarks
    pub fn with_min_width(min_width: f64) -> Self {
        Self {
            min_width: min_width.max(0.0),
        }
    }

    /// Ratio of one eye: (|p1-p5| + |p2-p4|) / (2 |p0-p3|)
    pub fn eye_ratio(&self, eye: &[EyePoint; EYE_LANDMARKS]) -> Result<f64, DrowsinessError> {
        let width = eye[0].distance(&eye[3]);
        if !width.is_finite() || width <= self.min_width {
            return Err(DrowsinessError::DegenerateGeometry { width });
        }

        let upper = eye[1].distance(&eye[5]);
        let lower = eye[2].distance(&eye[4]);
        Ok((upper + lower) / (2.0 * width))
    }

    /// Mean ratio over both eyes
    pub fn estimate(&self, landmarks: &EyeLandmarks) -> Result<f64, DrowsinessError> {
        let left = self.eye_ratio(&landmarks.left)?;
        let right = self.eye_ratio(&landmarks.right)?;
        Ok((left + right) / 2.0)
    }
}
