//! Drowsiness detection configuration

use crate::DrowsinessError;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::time::Duration;
use tracing::warn;

/// EAR thresholds outside this band are legal but rarely sensible
pub const RECOMMENDED_EAR_RANGE: RangeInclusive<f64> = 0.15..=0.35;

/// Observation modality supplied by the external detector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    /// Six contour points per eye, thresholded on aperture ratio
    #[default]
    Landmark,
    /// Count of eye sub-regions inside the face region
    Region,
}

/// How closure persistence is measured
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TimingDiscipline {
    /// Seconds of closure measured from caller-supplied frame deltas
    WallClock { threshold_secs: f64 },
    /// Consecutive closed frames, assuming a nominal camera frame rate
    FrameCount { threshold_frames: u32, assumed_fps: f64 },
}

impl TimingDiscipline {
    /// Wall-clock threshold as a duration, if this is the wall-clock discipline
    pub fn threshold_duration(&self) -> Option<Duration> {
        match *self {
            TimingDiscipline::WallClock { threshold_secs } => {
                Some(Duration::from_secs_f64(threshold_secs))
            }
            TimingDiscipline::FrameCount { .. } => None,
        }
    }

    /// Approximate alert latency in seconds
    pub fn nominal_secs(&self) -> f64 {
        match *self {
            TimingDiscipline::WallClock { threshold_secs } => threshold_secs,
            TimingDiscipline::FrameCount {
                threshold_frames,
                assumed_fps,
            } => threshold_frames as f64 / assumed_fps,
        }
    }

    /// Whether two disciplines measure closure the same way
    pub fn same_kind(&self, other: &TimingDiscipline) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

impl Default for TimingDiscipline {
    fn default() -> Self {
        TimingDiscipline::WallClock {
            threshold_secs: 1.5,
        }
    }
}

/// Fatigue recovery once the eyes are seen open again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryPolicy {
    /// Accumulated closure drains at the rate it built up
    Decay,
    /// Open eyes clear accumulated closure at once.
    /// Face loss still drains gradually.
    Reset,
}

/// Drowsiness detection configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrowsinessConfig {
    /// Aperture ratio below which an eye counts as closed
    pub ear_threshold: f64,

    /// Closure persistence required for an alert
    pub timing: TimingDiscipline,

    /// Score recovery on open eyes; `None` picks the discipline's default
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recovery: Option<RecoveryPolicy>,

    /// Detector modality the session is fed with
    pub modality: Modality,

    /// Frames kept for PERCLOS (~1 minute at 15fps)
    pub perclos_window_frames: usize,
}

impl Default for DrowsinessConfig {
    fn default() -> Self {
        Self {
            ear_threshold: 0.21,
            timing: TimingDiscipline::default(),
            recovery: None,
            modality: Modality::default(),
            perclos_window_frames: 900,
        }
    }
}

impl DrowsinessConfig {
    /// Create strict config (early alert, eager closure)
    pub fn strict() -> Self {
        Self {
            ear_threshold: 0.25,
            timing: TimingDiscipline::WallClock {
                threshold_secs: 0.5,
            },
            ..Default::default()
        }
    }

    /// Create lenient config (late alert, closure must be pronounced)
    pub fn lenient() -> Self {
        Self {
            ear_threshold: 0.18,
            timing: TimingDiscipline::WallClock {
                threshold_secs: 3.0,
            },
            ..Default::default()
        }
    }

    /// Region-detector config counting closed frames
    pub fn region(threshold_frames: u32, assumed_fps: f64) -> Self {
        Self {
            timing: TimingDiscipline::FrameCount {
                threshold_frames,
                assumed_fps,
            },
            modality: Modality::Region,
            ..Default::default()
        }
    }

    /// Recovery in effect: explicit, else hard reset for wall-clock timing
    /// and per-frame decrement for frame counting
    pub fn recovery(&self) -> RecoveryPolicy {
        self.recovery.unwrap_or(match self.timing {
            TimingDiscipline::WallClock { .. } => RecoveryPolicy::Reset,
            TimingDiscipline::FrameCount { .. } => RecoveryPolicy::Decay,
        })
    }

    /// Reject configurations the state machine cannot run with
    pub fn validate(&self) -> Result<(), DrowsinessError> {
        if !self.ear_threshold.is_finite() || self.ear_threshold <= 0.0 || self.ear_threshold >= 1.0
        {
            return Err(DrowsinessError::InvalidConfiguration(format!(
                "ear_threshold must lie in (0, 1), got {}",
                self.ear_threshold
            )));
        }
        if !RECOMMENDED_EAR_RANGE.contains(&self.ear_threshold) {
            warn!(
                "ear_threshold {} is outside the recommended range {:?}",
                self.ear_threshold, RECOMMENDED_EAR_RANGE
            );
        }

        match self.timing {
            TimingDiscipline::WallClock { threshold_secs } => {
                if !threshold_secs.is_finite() || threshold_secs <= 0.0 {
                    return Err(DrowsinessError::InvalidConfiguration(format!(
                        "closure threshold must be a positive number of seconds, got {}",
                        threshold_secs
                    )));
                }
            }
            TimingDiscipline::FrameCount {
                threshold_frames,
                assumed_fps,
            } => {
                if threshold_frames == 0 {
                    return Err(DrowsinessError::InvalidConfiguration(
                        "closure threshold must be at least one frame".into(),
                    ));
                }
                if !assumed_fps.is_finite() || assumed_fps <= 0.0 {
                    return Err(DrowsinessError::InvalidConfiguration(format!(
                        "assumed_fps must be positive, got {}",
                        assumed_fps
                    )));
                }
            }
        }

        if self.perclos_window_frames == 0 {
            return Err(DrowsinessError::InvalidConfiguration(
                "perclos_window_frames must be at least 1".into(),
            ));
        }

        Ok(())
    }
}
