//! Drowsiness state and frame transitions

use crate::config::{DrowsinessConfig, RecoveryPolicy, TimingDiscipline};
use crate::detector::Observation;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

/// Closure this close to a wall-clock threshold counts as reaching it.
/// Absorbs nanosecond truncation of summed frame deltas (30 x 33_333_333ns < 1s).
pub const WALL_CLOCK_TOLERANCE: Duration = Duration::from_micros(1);

/// Per-frame drowsiness classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Classification {
    #[default]
    Awake,
    /// Closure in progress, below the alert threshold
    Warning,
    /// Closure persisted past the threshold
    Alert,
}

impl Classification {
    /// Classification implied by a fatigue score alone
    pub fn from_score(score: f64) -> Self {
        if score >= 1.0 {
            Classification::Alert
        } else if score > 0.0 {
            Classification::Warning
        } else {
            Classification::Awake
        }
    }

    pub fn is_alert(&self) -> bool {
        matches!(self, Classification::Alert)
    }
}

/// Drowsiness state of one monitored subject (tracked over time)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DrowsinessState {
    /// Session time: sum of all frame deltas seen so far
    pub clock: Duration,

    /// Session time at which the current closed run began
    pub closure_onset: Option<Duration>,

    /// Accumulated closure (wall-clock discipline), capped at the threshold
    pub closed_duration: Duration,

    /// Accumulated closed frames (frame-count discipline), capped at the threshold
    pub closed_streak_frames: u32,

    /// Closure progress towards the alert threshold, in [0, 1]
    pub fatigue_score: f64,

    /// Current classification
    pub classification: Classification,
}

/// Result of feeding one observation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    pub state: DrowsinessState,
    pub classification: Classification,
    pub fatigue_score: f64,
}

/// Advance `state` by one frame.
///
/// `dt` is the time since the previous frame. The function is pure: the caller
/// keeps the returned state for the next frame.
pub fn transition(
    state: DrowsinessState,
    observation: Observation,
    dt: Duration,
    config: &DrowsinessConfig,
) -> Transition {
    let mut next = state;
    next.clock += dt;

    let classification = match observation {
        Observation::EyesClosed => {
            if next.closure_onset.is_none() {
                next.closure_onset = Some(next.clock);
            }
            match config.timing {
                TimingDiscipline::WallClock { .. } => {
                    // Time since onset only; the onset frame itself counts as zero
                    next.closed_duration = next.closure_elapsed().unwrap_or_default();
                }
                TimingDiscipline::FrameCount { .. } => {
                    next.closed_streak_frames = next.closed_streak_frames.saturating_add(1);
                }
            }
            next.cap(config);
            next.fatigue_score = next.score(config);

            if next.fatigue_score >= 1.0 {
                Classification::Alert
            } else {
                Classification::Warning
            }
        }
        Observation::EyesOpen => {
            next.closure_onset = None;
            match config.recovery() {
                RecoveryPolicy::Decay => next.drain(dt),
                RecoveryPolicy::Reset => next.clear(),
            }
            next.fatigue_score = next.score(config);
            Classification::Awake
        }
        Observation::FaceNotFound | Observation::Unknown => {
            // Losing the face is no proof of open eyes: drain, never clear
            next.closure_onset = None;
            next.drain(dt);
            next.fatigue_score = next.score(config);
            Classification::from_score(next.fatigue_score)
        }
    };

    next.classification = classification;
    Transition {
        state: next,
        classification,
        fatigue_score: next.fatigue_score,
    }
}

impl DrowsinessState {
    /// Elapsed time of the current closed run, if eyes are closed
    pub fn closure_elapsed(&self) -> Option<Duration> {
        self.closure_onset.map(|onset| self.clock.saturating_sub(onset))
    }

    /// Closure progress in [0, 1] under `config`
    pub fn score(&self, config: &DrowsinessConfig) -> f64 {
        let raw = match config.timing {
            TimingDiscipline::WallClock { threshold_secs } => {
                let closed = self.closed_duration + WALL_CLOCK_TOLERANCE;
                if closed.as_secs_f64() >= threshold_secs {
                    return 1.0;
                }
                self.closed_duration.as_secs_f64() / threshold_secs
            }
            TimingDiscipline::FrameCount {
                threshold_frames, ..
            } => self.closed_streak_frames as f64 / threshold_frames as f64,
        };
        raw.clamp(0.0, 1.0)
    }

    /// Carry the current fatigue level over to a new configuration
    pub fn rebase(&self, config: &DrowsinessConfig) -> Self {
        let mut next = *self;
        next.closed_duration = Duration::ZERO;
        next.closed_streak_frames = 0;

        match config.timing {
            TimingDiscipline::WallClock { threshold_secs } => {
                next.closed_duration = Duration::from_secs_f64(threshold_secs * self.fatigue_score);
            }
            TimingDiscipline::FrameCount {
                threshold_frames, ..
            } => {
                next.closed_streak_frames =
                    (threshold_frames as f64 * self.fatigue_score).round() as u32;
            }
        }
        next.fatigue_score = next.score(config);
        next
    }

    /// Reset state (on session restart)
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    // Integrators never exceed the threshold so recovery starts immediately
    fn cap(&mut self, config: &DrowsinessConfig) {
        match config.timing {
            TimingDiscipline::WallClock { .. } => {
                if let Some(limit) = config.timing.threshold_duration() {
                    if self.closed_duration + WALL_CLOCK_TOLERANCE >= limit {
                        self.closed_duration = limit;
                    }
                }
            }
            TimingDiscipline::FrameCount {
                threshold_frames, ..
            } => {
                self.closed_streak_frames = self.closed_streak_frames.min(threshold_frames);
            }
        }
    }

    fn drain(&mut self, dt: Duration) {
        self.closed_duration = self.closed_duration.saturating_sub(dt);
        self.closed_streak_frames = self.closed_streak_frames.saturating_sub(1);
    }

    fn clear(&mut self) {
        self.closed_duration = Duration::ZERO;
        self.closed_streak_frames = 0;
    }
}

/// Sliding window of measured eye states for PERCLOS
/// (percentage of eye closure)
#[derive(Debug, Clone)]
pub struct PerclosWindow {
    samples: VecDeque<bool>,
    capacity: usize,
    closed: usize,
}

impl PerclosWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            closed: 0,
        }
    }

    /// Record an observation; frames without a measured eye state are skipped
    pub fn push(&mut self, observation: Observation) {
        let closed = match observation {
            Observation::EyesClosed => true,
            Observation::EyesOpen => false,
            Observation::FaceNotFound | Observation::Unknown => return,
        };

        if self.samples.len() >= self.capacity {
            if let Some(true) = self.samples.pop_front() {
                self.closed -= 1;
            }
        }
        self.samples.push_back(closed);
        if closed {
            self.closed += 1;
        }
    }

    /// Fraction of closed samples in the window
    pub fn perclos(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.closed as f64 / self.samples.len() as f64
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Change window length, keeping the most recent samples
    pub fn resize(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        while self.samples.len() > self.capacity {
            if let Some(true) = self.samples.pop_front() {
                self.closed -= 1;
            }
        }
    }

    pub fn clear(&mut self) {
        self.samples.clear();
        self.closed = 0;
    }
}
