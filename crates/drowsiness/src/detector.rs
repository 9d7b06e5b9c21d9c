//! Detector observation contract
//!
//! Face, landmark, and eye-region detection happen outside this crate. The
//! detector hands over one [`DetectorOutput`] per frame; the types here turn it
//! into a single [`Observation`] for the state machine.

use crate::DrowsinessError;
use serde::{Deserialize, Serialize};

/// Landmarks per eye contour
pub const EYE_LANDMARKS: usize = 6;

/// Eye regions needed before both eyes count as visible
pub const MIN_VISIBLE_EYE_REGIONS: u32 = 2;

/// 2-D image coordinate
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EyePoint {
    pub x: f64,
    pub y: f64,
}

impl EyePoint {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point
    pub fn distance(&self, other: &EyePoint) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

impl From<(f64, f64)> for EyePoint {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

/// Contour landmarks for both eyes of one face.
///
/// Indices 0 and 3 are the horizontal corners; 1/5 and 2/4 are the
/// upper/lower lid pairs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EyeLandmarks {
    pub left: [EyePoint; EYE_LANDMARKS],
    pub right: [EyePoint; EYE_LANDMARKS],
}

impl EyeLandmarks {
    pub fn new(left: [EyePoint; EYE_LANDMARKS], right: [EyePoint; EYE_LANDMARKS]) -> Self {
        Self { left, right }
    }

    /// Build from detector slices, rejecting the wrong point count
    pub fn from_slices(left: &[EyePoint], right: &[EyePoint]) -> Result<Self, DrowsinessError> {
        Ok(Self {
            left: to_contour("left", left)?,
            right: to_contour("right", right)?,
        })
    }
}

fn to_contour(
    eye: &'static str,
    points: &[EyePoint],
) -> Result<[EyePoint; EYE_LANDMARKS], DrowsinessError> {
    points
        .try_into()
        .map_err(|_| DrowsinessError::LandmarkCount {
            eye,
            expected: EYE_LANDMARKS,
            actual: points.len(),
        })
}

/// Face bounding box with the eye sub-regions found inside it
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FaceRegion {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// Eye sub-regions detected within the face
    pub eye_regions: u32,
}

/// Everything the external detector reports for one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "modality", content = "faces", rename_all = "snake_case")]
pub enum DetectorOutput {
    /// One entry per detected face, in detector order
    Landmark(Vec<EyeLandmarks>),
    /// One entry per detected face, in detector order
    Region(Vec<FaceRegion>),
}

impl DetectorOutput {
    /// Whether any face was found
    pub fn face_detected(&self) -> bool {
        match self {
            DetectorOutput::Landmark(faces) => !faces.is_empty(),
            DetectorOutput::Region(faces) => !faces.is_empty(),
        }
    }

    /// Number of faces reported
    pub fn face_count(&self) -> usize {
        match self {
            DetectorOutput::Landmark(faces) => faces.len(),
            DetectorOutput::Region(faces) => faces.len(),
        }
    }

    /// Landmarks of the primary (first) face
    pub fn primary_landmarks(&self) -> Result<&EyeLandmarks, DrowsinessError> {
        match self {
            DetectorOutput::Landmark(faces) => faces.first().ok_or(DrowsinessError::NoFaceDetected),
            DetectorOutput::Region(_) => Err(DrowsinessError::InvalidConfiguration(
                "region output has no landmarks".into(),
            )),
        }
    }

    /// Region of the primary (first) face
    pub fn primary_region(&self) -> Result<&FaceRegion, DrowsinessError> {
        match self {
            DetectorOutput::Region(faces) => faces.first().ok_or(DrowsinessError::NoFaceDetected),
            DetectorOutput::Landmark(_) => Err(DrowsinessError::InvalidConfiguration(
                "landmark output has no eye regions".into(),
            )),
        }
    }
}

/// Unified per-frame input to the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Observation {
    EyesOpen,
    EyesClosed,
    FaceNotFound,
    /// Face present but eye state could not be measured
    Unknown,
}

impl Observation {
    /// Threshold an aperture ratio; a non-finite ratio measures nothing
    pub fn from_ratio(ratio: f64, ear_threshold: f64) -> Self {
        if !ratio.is_finite() {
            Observation::Unknown
        } else if ratio < ear_threshold {
            Observation::EyesClosed
        } else {
            Observation::EyesOpen
        }
    }

    /// Eye state is known this frame
    pub fn is_measured(&self) -> bool {
        matches!(self, Observation::EyesOpen | Observation::EyesClosed)
    }
}

/// Maps a region detector's eye count to an observation.
///
/// Stateless: smoothing belongs to the state machine.
#[derive(Debug, Clone, Copy, Default)]
pub struct EyeObservationNormalizer;

impl EyeObservationNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Eye count within one face
    pub fn normalize(&self, region_count: u32) -> Observation {
        if region_count >= MIN_VISIBLE_EYE_REGIONS {
            Observation::EyesOpen
        } else {
            Observation::EyesClosed
        }
    }

    /// Eye count of the primary face, or face loss
    pub fn normalize_faces(&self, faces: &[FaceRegion]) -> Observation {
        match faces.first() {
            Some(face) => self.normalize(face.eye_regions),
            None => Observation::FaceNotFound,
        }
    }
}
