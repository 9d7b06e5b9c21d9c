//! Edge-triggered alert policy

use drowsiness::Classification;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Alert edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertEvent {
    /// Classification entered ALERT
    AlertOn,
    /// Classification left ALERT
    AlertOff,
}

/// Alert episode counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EpisodeStats {
    /// Episodes started (ALERT_ON events emitted)
    pub episodes: u64,
    /// Frames spent in the current episode (0 when not alerting)
    pub current_frames: u64,
    /// Longest finished or ongoing episode, in frames
    pub longest_frames: u64,
}

/// Emits `AlertOn` once per contiguous ALERT run and `AlertOff` once when it ends
#[derive(Debug, Default)]
pub struct AlertPolicy {
    active: bool,
    stats: EpisodeStats,
}

impl AlertPolicy {
    /// Create a new alert policy (not alerting)
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the current classification; returns an event on ALERT edges only
    pub fn update(&mut self, classification: Classification) -> Option<AlertEvent> {
        let alerting = classification.is_alert();

        match (self.active, alerting) {
            (false, true) => {
                self.active = true;
                self.stats.episodes += 1;
                self.stats.current_frames = 1;
                self.stats.longest_frames = self.stats.longest_frames.max(1);
                info!("Drowsiness alert ON (episode {})", self.stats.episodes);
                Some(AlertEvent::AlertOn)
            }
            (true, true) => {
                self.stats.current_frames += 1;
                self.stats.longest_frames =
                    self.stats.longest_frames.max(self.stats.current_frames);
                None
            }
            (true, false) => {
                self.active = false;
                info!(
                    "Drowsiness alert OFF after {} frames ({:?})",
                    self.stats.current_frames, classification
                );
                self.stats.current_frames = 0;
                Some(AlertEvent::AlertOff)
            }
            (false, false) => None,
        }
    }

    /// Whether an episode is in progress
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn stats(&self) -> EpisodeStats {
        self.stats
    }

    /// End the session; closes an open episode
    pub fn finish(&mut self) -> Option<AlertEvent> {
        if self.active {
            debug!("Closing alert episode at session end");
        }
        self.update(Classification::Awake)
    }

    /// Clear all episode state
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
