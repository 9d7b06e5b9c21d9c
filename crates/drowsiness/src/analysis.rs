//! Per-frame analysis results

use crate::aperture::EyeApertureEstimator;
use crate::config::{DrowsinessConfig, Modality, TimingDiscipline};
use crate::detector::{DetectorOutput, EyeObservationNormalizer, Observation};
use crate::machine::DrowsinessStateMachine;
use crate::state::{Classification, PerclosWindow};
use crate::DrowsinessError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Complete analysis of one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameAnalysis {
    /// Unified eye observation for this frame
    pub observation: Observation,

    /// Averaged eye aperture ratio (landmark modality, when measurable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aperture_ratio: Option<f64>,

    /// Current classification
    pub classification: Classification,

    /// Closure progress towards the alert threshold, in [0, 1]
    pub fatigue_score: f64,

    /// Elapsed time of the current closed run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closure_elapsed: Option<Duration>,

    /// Accumulated closed frames (frame-count discipline)
    pub closed_streak_frames: u32,

    /// Fraction of closed frames over the PERCLOS window
    pub perclos: f64,

    /// Consecutive frames without a detected face
    pub face_absent_frames: u32,
}

impl Default for FrameAnalysis {
    fn default() -> Self {
        Self {
            observation: Observation::FaceNotFound,
            aperture_ratio: None,
            classification: Classification::Awake,
            fatigue_score: 0.0,
            closure_elapsed: None,
            closed_streak_frames: 0,
            perclos: 0.0,
            face_absent_frames: 0,
        }
    }
}

impl FrameAnalysis {
    pub fn is_alert(&self) -> bool {
        self.classification.is_alert()
    }

    /// Overlay text for renderers
    pub fn status_label(&self, timing: &TimingDiscipline) -> String {
        match (self.classification, self.observation) {
            (Classification::Alert, _) => "DANGER".to_string(),
            (_, Observation::EyesClosed) => match timing {
                TimingDiscipline::WallClock { .. } => format!(
                    "CLOSED: {:.1}s",
                    self.closure_elapsed.unwrap_or_default().as_secs_f64()
                ),
                TimingDiscipline::FrameCount { .. } => {
                    format!("CLOSED: {} frames", self.closed_streak_frames)
                }
            },
            (_, Observation::FaceNotFound) => "NO FACE".to_string(),
            (_, Observation::Unknown) => "EYES UNKNOWN".to_string(),
            (_, Observation::EyesOpen) => "EYES OPEN".to_string(),
        }
    }
}

/// Turns detector output into observations and runs them through the
/// state machine
pub struct FrameAnalyzer {
    estimator: EyeApertureEstimator,
    normalizer: EyeObservationNormalizer,
    machine: DrowsinessStateMachine,
    perclos: PerclosWindow,
    face_absent_frames: u32,
}

impl FrameAnalyzer {
    /// Create a new analyzer with configuration
    pub fn new(config: DrowsinessConfig) -> Result<Self, DrowsinessError> {
        let perclos = PerclosWindow::new(config.perclos_window_frames);
        Ok(Self {
            estimator: EyeApertureEstimator::new(),
            normalizer: EyeObservationNormalizer::new(),
            machine: DrowsinessStateMachine::new(config)?,
            perclos,
            face_absent_frames: 0,
        })
    }

    /// Replace the aperture estimator (e.g. a coarser degeneracy guard)
    pub fn with_estimator(mut self, estimator: EyeApertureEstimator) -> Self {
        self.estimator = estimator;
        self
    }

    /// Stage a configuration for the next frame
    pub fn reconfigure(&mut self, config: DrowsinessConfig) -> Result<(), DrowsinessError> {
        self.machine.reconfigure(config)
    }

    /// Analyze one frame; `dt` is the time since the previous frame
    pub fn analyze(&mut self, output: &DetectorOutput, dt: Duration) -> FrameAnalysis {
        if self.machine.apply_pending() {
            self.perclos.resize(self.machine.config().perclos_window_frames);
        }

        if output.face_detected() {
            self.face_absent_frames = 0;
        } else {
            self.face_absent_frames = self.face_absent_frames.saturating_add(1);
        }
        if output.face_count() > 1 {
            debug!(
                "{} faces detected, evaluating the primary face only",
                output.face_count()
            );
        }

        let (observation, aperture_ratio) = self.observe(output);
        self.perclos.push(observation);
        let (classification, fatigue_score) = self.machine.update(observation, dt);
        let state = self.machine.state();

        FrameAnalysis {
            observation,
            aperture_ratio,
            classification,
            fatigue_score,
            closure_elapsed: state.closure_elapsed(),
            closed_streak_frames: state.closed_streak_frames,
            perclos: self.perclos.perclos(),
            face_absent_frames: self.face_absent_frames,
        }
    }

    /// Observation for the primary face of this frame
    pub fn observe(&self, output: &DetectorOutput) -> (Observation, Option<f64>) {
        let config = self.machine.config();

        match (config.modality, output) {
            (Modality::Landmark, DetectorOutput::Landmark(_)) => {
                let landmarks = match output.primary_landmarks() {
                    Ok(landmarks) => landmarks,
                    Err(_) => return (Observation::FaceNotFound, None),
                };
                match self.estimator.estimate(landmarks) {
                    Ok(ratio) => (
                        Observation::from_ratio(ratio, config.ear_threshold),
                        Some(ratio).filter(|ratio| ratio.is_finite()),
                    ),
                    Err(e) => {
                        warn!("Eye state unknown: {}", e);
                        (Observation::Unknown, None)
                    }
                }
            }
            (Modality::Region, DetectorOutput::Region(faces)) => {
                (self.normalizer.normalize_faces(faces), None)
            }
            (modality, _) => {
                warn!(
                    "Detector output does not match configured {:?} modality",
                    modality
                );
                (Observation::Unknown, None)
            }
        }
    }

    pub fn machine(&self) -> &DrowsinessStateMachine {
        &self.machine
    }

    pub fn config(&self) -> &DrowsinessConfig {
        self.machine.config()
    }

    /// Reset per-subject state (on subject change)
    pub fn reset(&mut self) {
        self.machine.reset();
        self.perclos.clear();
        self.face_absent_frames = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::{EyeLandmarks, EyePoint, FaceRegion};

    const FRAME: Duration = Duration::from_millis(100);

    fn eye(cx: f64, gap: f64) -> [EyePoint; 6] {
        let h = gap / 2.0;
        [
            EyePoint::new(cx - 15.0, 100.0),
            EyePoint::new(cx - 5.0, 100.0 - h),
            EyePoint::new(cx + 5.0, 100.0 - h),
            EyePoint::new(cx + 15.0, 100.0),
            EyePoint::new(cx + 5.0, 100.0 + h),
            EyePoint::new(cx - 5.0, 100.0 + h),
        ]
    }

    fn landmarks(gap: f64) -> DetectorOutput {
        DetectorOutput::Landmark(vec![EyeLandmarks::new(eye(100.0, gap), eye(200.0, gap))])
    }

    fn regions(counts: &[u32]) -> DetectorOutput {
        DetectorOutput::Region(
            counts
                .iter()
                .map(|&eye_regions| FaceRegion {
                    eye_regions,
                    ..Default::default()
                })
                .collect(),
        )
    }

    #[test]
    fn test_landmark_thresholding() {
        let mut analyzer = FrameAnalyzer::new(DrowsinessConfig::default()).unwrap();

        let open = analyzer.analyze(&landmarks(9.0), FRAME);
        assert_eq!(open.observation, Observation::EyesOpen);
        assert!((open.aperture_ratio.unwrap() - 0.3).abs() < 1e-9);

        let closed = analyzer.analyze(&landmarks(1.0), FRAME);
        assert_eq!(closed.observation, Observation::EyesClosed);
        assert_eq!(closed.classification, Classification::Warning);
        assert_eq!(closed.perclos, 0.5);
    }

    #[test]
    fn test_degenerate_geometry_is_unknown() {
        let mut analyzer = FrameAnalyzer::new(DrowsinessConfig::default()).unwrap();
        let mut left = eye(100.0, 9.0);
        left[0] = left[3];
        let output = DetectorOutput::Landmark(vec![EyeLandmarks::new(left, eye(200.0, 9.0))]);

        let analysis = analyzer.analyze(&output, FRAME);
        assert_eq!(analysis.observation, Observation::Unknown);
        assert_eq!(analysis.aperture_ratio, None);
        assert_eq!(analysis.classification, Classification::Awake);
        assert_eq!(analysis.face_absent_frames, 0);
    }

    #[test]
    fn test_non_finite_landmarks_are_unknown() {
        let mut analyzer = FrameAnalyzer::new(DrowsinessConfig::default()).unwrap();
        for _ in 0..20 {
            analyzer.analyze(&landmarks(1.0), FRAME);
        }
        assert_eq!(analyzer.machine().classification(), Classification::Alert);

        let mut left = eye(100.0, 9.0);
        left[1].y = f64::NAN;
        let output = DetectorOutput::Landmark(vec![EyeLandmarks::new(left, eye(200.0, 9.0))]);

        let analysis = analyzer.analyze(&output, FRAME);
        assert_eq!(analysis.observation, Observation::Unknown);
        assert_eq!(analysis.aperture_ratio, None);
        // Not treated as open eyes: the score drains instead of resetting
        assert_eq!(analysis.classification, Classification::Warning);
        assert!(analysis.fatigue_score > 0.0);
    }

    #[test]
    fn test_face_absence_counter() {
        let mut analyzer = FrameAnalyzer::new(DrowsinessConfig::default()).unwrap();
        for _ in 0..3 {
            analyzer.analyze(&DetectorOutput::Landmark(vec![]), FRAME);
        }
        let analysis = analyzer.analyze(&DetectorOutput::Landmark(vec![]), FRAME);
        assert_eq!(analysis.face_absent_frames, 4);
        assert_eq!(analysis.observation, Observation::FaceNotFound);

        let analysis = analyzer.analyze(&landmarks(9.0), FRAME);
        assert_eq!(analysis.face_absent_frames, 0);
    }

    #[test]
    fn test_region_primary_face() {
        let mut analyzer = FrameAnalyzer::new(DrowsinessConfig::region(20, 30.0)).unwrap();
        let analysis = analyzer.analyze(&regions(&[1, 2, 2]), FRAME);
        assert_eq!(analysis.observation, Observation::EyesClosed);
        assert_eq!(analysis.closed_streak_frames, 1);
    }

    #[test]
    fn test_modality_mismatch_is_unknown() {
        let mut analyzer = FrameAnalyzer::new(DrowsinessConfig::default()).unwrap();
        let analysis = analyzer.analyze(&regions(&[2]), FRAME);
        assert_eq!(analysis.observation, Observation::Unknown);
    }

    #[test]
    fn test_reconfigure_switches_modality_at_frame_boundary() {
        let mut analyzer = FrameAnalyzer::new(DrowsinessConfig::default()).unwrap();
        analyzer.reconfigure(DrowsinessConfig::region(20, 30.0)).unwrap();
        assert_eq!(analyzer.config().modality, Modality::Landmark);

        let analysis = analyzer.analyze(&regions(&[0]), FRAME);
        assert_eq!(analysis.observation, Observation::EyesClosed);
        assert_eq!(analyzer.config().modality, Modality::Region);
    }

    #[test]
    fn test_status_labels() {
        let timing = TimingDiscipline::default();
        let mut analysis = FrameAnalysis {
            observation: Observation::EyesClosed,
            classification: Classification::Warning,
            closure_elapsed: Some(Duration::from_millis(1200)),
            ..Default::default()
        };
        assert_eq!(analysis.status_label(&timing), "CLOSED: 1.2s");

        analysis.classification = Classification::Alert;
        assert_eq!(analysis.status_label(&timing), "DANGER");

        let frames = TimingDiscipline::FrameCount {
            threshold_frames: 20,
            assumed_fps: 30.0,
        };
        let analysis = FrameAnalysis {
            observation: Observation::EyesClosed,
            classification: Classification::Warning,
            closed_streak_frames: 7,
            ..Default::default()
        };
        assert_eq!(analysis.status_label(&frames), "CLOSED: 7 frames");
        assert_eq!(FrameAnalysis::default().status_label(&frames), "NO FACE");
    }

    #[test]
    fn test_reset_clears_subject_state() {
        let mut analyzer = FrameAnalyzer::new(DrowsinessConfig::region(3, 30.0)).unwrap();
        for _ in 0..3 {
            analyzer.analyze(&regions(&[0]), FRAME);
        }
        assert!(analyzer.machine().classification().is_alert());

        analyzer.reset();
        let analysis = analyzer.analyze(&regions(&[2]), FRAME);
        assert_eq!(analysis.fatigue_score, 0.0);
        assert_eq!(analysis.perclos, 0.0);
    }
}
