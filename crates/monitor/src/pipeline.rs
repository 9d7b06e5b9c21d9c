//! Frame pipeline: detector output -> analysis -> alert edges

use crate::MonitorError;
use alerting::{AlertEvent, AlertPolicy};
use drowsiness::{
    Classification, DetectorOutput, DrowsinessConfig, FrameAnalysis, FrameAnalyzer, Observation,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Everything renderers and notifiers need about one frame
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameReport {
    /// Frame sequence number within the session (1-based)
    pub frame: u64,

    /// Drowsiness analysis of the frame
    pub analysis: FrameAnalysis,

    /// Alert edge produced by this frame
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert_event: Option<AlertEvent>,

    /// Whether an alert episode is in progress
    pub alert_active: bool,

    /// Alert episodes so far; lets slow readers notice edges they skipped
    pub episodes: u64,

    /// Overlay text
    pub status: String,
}

/// Session totals
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub frames: u64,
    pub episodes: u64,
    pub longest_episode_frames: u64,
    /// Frames whose eye state could not be measured
    pub unknown_frames: u64,
    pub final_classification: Classification,
}

/// Single-subject processing pipeline
pub struct Pipeline {
    analyzer: FrameAnalyzer,
    policy: AlertPolicy,
    frames: u64,
    unknown_frames: u64,
}

impl Pipeline {
    /// Create a pipeline; the configuration is validated here
    pub fn new(config: DrowsinessConfig) -> Result<Self, MonitorError> {
        Ok(Self {
            analyzer: FrameAnalyzer::new(config)?,
            policy: AlertPolicy::new(),
            frames: 0,
            unknown_frames: 0,
        })
    }

    /// Stage a configuration for the next frame
    pub fn reconfigure(&mut self, config: DrowsinessConfig) -> Result<(), MonitorError> {
        self.analyzer.reconfigure(config)?;
        Ok(())
    }

    /// Process one frame; `dt` is the time since the previous frame
    pub fn process(&mut self, output: &DetectorOutput, dt: Duration) -> FrameReport {
        self.frames += 1;
        let analysis = self.analyzer.analyze(output, dt);
        let alert_event = self.policy.update(analysis.classification);

        metrics::counter!("drowsiness_frames_total").increment(1);
        metrics::gauge!("drowsiness_fatigue_score").set(analysis.fatigue_score);
        if analysis.observation == Observation::Unknown {
            self.unknown_frames += 1;
            metrics::counter!("drowsiness_unknown_observations_total").increment(1);
        }
        if alert_event == Some(AlertEvent::AlertOn) {
            metrics::counter!("drowsiness_alert_episodes_total").increment(1);
        }

        debug!(
            "Frame {}: {:?} {:?} score={:.2} perclos={:.2}",
            self.frames,
            analysis.observation,
            analysis.classification,
            analysis.fatigue_score,
            analysis.perclos
        );

        let status = analysis.status_label(&self.analyzer.config().timing);
        FrameReport {
            frame: self.frames,
            analysis,
            alert_event,
            alert_active: self.policy.is_active(),
            episodes: self.policy.stats().episodes,
            status,
        }
    }

    /// Close any open alert episode at session end
    pub fn finish(&mut self) -> Option<AlertEvent> {
        self.policy.finish()
    }

    pub fn summary(&self) -> SessionSummary {
        let stats = self.policy.stats();
        SessionSummary {
            frames: self.frames,
            episodes: stats.episodes,
            longest_episode_frames: stats.longest_frames,
            unknown_frames: self.unknown_frames,
            final_classification: self.analyzer.machine().classification(),
        }
    }
}
