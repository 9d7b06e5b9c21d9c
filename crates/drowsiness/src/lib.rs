//! Drowsiness Detection Core
//!
//! Converts noisy per-frame eye observations into a stable drowsiness signal:
//! - Eye aperture ratio (EAR) from six contour landmarks per eye
//! - Eye visibility from a region detector's eye count
//! - Debounced AWAKE / WARNING / ALERT classification with a fatigue score
//! - PERCLOS over a sliding window of recent frames

pub mod analysis;
pub mod aperture;
pub mod config;
pub mod detector;
pub mod machine;
pub mod state;

pub use analysis::{FrameAnalysis, FrameAnalyzer};
pub use aperture::EyeApertureEstimator;
pub use config::{DrowsinessConfig, Modality, RecoveryPolicy, TimingDiscipline};
pub use detector::{
    DetectorOutput, EyeLandmarks, EyeObservationNormalizer, EyePoint, FaceRegion, Observation,
};
pub use machine::DrowsinessStateMachine;
pub use state::{
    transition, Classification, DrowsinessState, PerclosWindow, Transition, WALL_CLOCK_TOLERANCE,
};

use thiserror::Error;

/// Drowsiness core error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DrowsinessError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Degenerate eye geometry: horizontal width {width} is too small")]
    DegenerateGeometry { width: f64 },

    #[error("{eye} eye needs {expected} landmarks, got {actual}")]
    LandmarkCount {
        eye: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("No face detected")]
    NoFaceDetected,
}
