//! Drowsiness state machine
//!
//! Owns one subject's [`DrowsinessState`] and feeds it through
//! [`transition`](crate::state::transition) one frame at a time. Not reentrant:
//! a session drives exactly one machine from one place.

use crate::config::DrowsinessConfig;
use crate::detector::Observation;
use crate::state::{transition, Classification, DrowsinessState};
use crate::DrowsinessError;
use std::time::Duration;
use tracing::{debug, info};

pub struct DrowsinessStateMachine {
    config: DrowsinessConfig,
    /// Applied at the next frame boundary
    pending: Option<DrowsinessConfig>,
    state: DrowsinessState,
}

impl DrowsinessStateMachine {
    /// Create a machine in the AWAKE state
    pub fn new(config: DrowsinessConfig) -> Result<Self, DrowsinessError> {
        config.validate()?;
        info!(
            "Drowsiness state machine created: ear_threshold={}, timing={:?} (~{:.1}s), recovery={:?}",
            config.ear_threshold,
            config.timing,
            config.timing.nominal_secs(),
            config.recovery()
        );
        Ok(Self {
            config,
            pending: None,
            state: DrowsinessState::default(),
        })
    }

    /// Stage a new configuration for the next frame.
    ///
    /// Invalid configurations are rejected now and the running one is kept.
    pub fn reconfigure(&mut self, config: DrowsinessConfig) -> Result<(), DrowsinessError> {
        config.validate()?;
        debug!("Reconfiguration staged: {:?}", config);
        self.pending = Some(config);
        Ok(())
    }

    /// Swap in a staged configuration. Returns true if one was applied.
    pub fn apply_pending(&mut self) -> bool {
        let Some(config) = self.pending.take() else {
            return false;
        };

        if config.timing != self.config.timing {
            self.state = self.state.rebase(&config);
        }
        info!(
            "Reconfigured: ear_threshold={}, timing={:?}, recovery={:?}",
            config.ear_threshold,
            config.timing,
            config.recovery()
        );
        self.config = config;
        true
    }

    /// Feed one frame's observation; `dt` is the time since the previous frame
    pub fn update(&mut self, observation: Observation, dt: Duration) -> (Classification, f64) {
        self.apply_pending();

        let previous = self.state.classification;
        let step = transition(self.state, observation, dt, &self.config);
        self.state = step.state;

        if step.classification != previous {
            debug!(
                "Classification {:?} -> {:?} (observation {:?}, score {:.2})",
                previous, step.classification, observation, step.fatigue_score
            );
        }

        (step.classification, step.fatigue_score)
    }

    pub fn config(&self) -> &DrowsinessConfig {
        &self.config
    }

    pub fn state(&self) -> &DrowsinessState {
        &self.state
    }

    pub fn classification(&self) -> Classification {
        self.state.classification
    }

    pub fn fatigue_score(&self) -> f64 {
        self.state.fatigue_score
    }

    /// Reset state (on subject change); configuration is kept
    pub fn reset(&mut self) {
        self.state.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RecoveryPolicy, TimingDiscipline};

    const FPS_30: Duration = Duration::from_nanos(33_333_333);

    #[test]
    fn test_rejects_invalid_config() {
        let config = DrowsinessConfig {
            timing: TimingDiscipline::WallClock {
                threshold_secs: -1.0,
            },
            ..Default::default()
        };
        assert!(matches!(
            DrowsinessStateMachine::new(config),
            Err(DrowsinessError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_closed_eyes_for_two_seconds_at_30fps() {
        let config = DrowsinessConfig {
            ear_threshold: 0.21,
            timing: TimingDiscipline::WallClock {
                threshold_secs: 1.5,
            },
            ..Default::default()
        };
        let mut machine = DrowsinessStateMachine::new(config).unwrap();
        let dt = Duration::from_secs_f64(1.0 / 30.0);

        // Frame k after onset is k/30 s into the closure
        let mut result = (Classification::Awake, 0.0);
        for k in 0..60 {
            result = machine.update(Observation::EyesClosed, dt);
            if k >= 45 {
                assert_eq!(result, (Classification::Alert, 1.0), "frame {}", k);
            } else {
                assert_eq!(result.0, Classification::Warning, "frame {}", k);
                assert!(result.1 < 1.0);
            }
        }

        assert_eq!(result, (Classification::Alert, 1.0));
    }

    #[test]
    fn test_blink_after_alert_does_not_realert() {
        let mut machine = DrowsinessStateMachine::new(DrowsinessConfig::default()).unwrap();
        for _ in 0..60 {
            machine.update(Observation::EyesClosed, FPS_30);
        }
        assert!(machine.classification().is_alert());

        assert_eq!(
            machine.update(Observation::EyesOpen, FPS_30),
            (Classification::Awake, 0.0)
        );
        for _ in 0..2 {
            let (classification, score) = machine.update(Observation::EyesClosed, FPS_30);
            assert_eq!(classification, Classification::Warning);
            assert!(score < 0.1);
        }
    }

    #[test]
    fn test_region_scenario_hard_reset() {
        let mut config = DrowsinessConfig::region(20, 30.0);
        config.recovery = Some(RecoveryPolicy::Reset);
        let mut machine = DrowsinessStateMachine::new(config).unwrap();

        for frame in 1..=25 {
            let (classification, _) = machine.update(Observation::EyesClosed, FPS_30);
            assert_eq!(classification.is_alert(), frame >= 20);
        }

        assert_eq!(
            machine.update(Observation::EyesOpen, FPS_30),
            (Classification::Awake, 0.0)
        );
    }

    #[test]
    fn test_region_scenario_decay() {
        let mut machine = DrowsinessStateMachine::new(DrowsinessConfig::region(20, 30.0)).unwrap();
        for _ in 0..25 {
            machine.update(Observation::EyesClosed, FPS_30);
        }

        let (classification, score) = machine.update(Observation::EyesOpen, FPS_30);
        assert_eq!(classification, Classification::Awake);
        assert!((score - 19.0 / 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_face_lost_after_alert_decays_like_open_eyes() {
        let config = DrowsinessConfig::region(20, 30.0);
        let mut lost = DrowsinessStateMachine::new(config.clone()).unwrap();
        let mut open = DrowsinessStateMachine::new(config).unwrap();
        for _ in 0..25 {
            lost.update(Observation::EyesClosed, FPS_30);
            open.update(Observation::EyesClosed, FPS_30);
        }

        let (first, _) = lost.update(Observation::FaceNotFound, FPS_30);
        open.update(Observation::EyesOpen, FPS_30);
        assert_ne!(first, Classification::Awake);
        assert_eq!(lost.fatigue_score(), open.fatigue_score());

        for frame in 2..=100 {
            let (classification, score) = lost.update(Observation::FaceNotFound, FPS_30);
            let (_, open_score) = open.update(Observation::EyesOpen, FPS_30);
            assert_eq!(score, open_score, "frame {}", frame);
            assert_eq!(classification == Classification::Awake, score == 0.0);
        }
        assert_eq!(lost.classification(), Classification::Awake);
    }

    #[test]
    fn test_reconfigure_applies_at_next_frame() {
        let mut machine = DrowsinessStateMachine::new(DrowsinessConfig::default()).unwrap();
        let strict = DrowsinessConfig::strict();

        machine.reconfigure(strict.clone()).unwrap();
        assert_eq!(machine.config().ear_threshold, 0.21);

        machine.update(Observation::EyesOpen, FPS_30);
        assert_eq!(machine.config(), &strict);

        let invalid = DrowsinessConfig {
            ear_threshold: 2.0,
            ..Default::default()
        };
        assert!(machine.reconfigure(invalid).is_err());
        assert!(!machine.apply_pending());
        assert_eq!(machine.config(), &strict);
    }

    #[test]
    fn test_reconfigure_shorter_threshold_escalates() {
        let mut machine = DrowsinessStateMachine::new(DrowsinessConfig::lenient()).unwrap();
        for _ in 0..31 {
            machine.update(Observation::EyesClosed, Duration::from_millis(50));
        }
        // 1.5s of 3.0s
        assert!((machine.fatigue_score() - 0.5).abs() < 1e-9);

        machine
            .reconfigure(DrowsinessConfig {
                timing: TimingDiscipline::WallClock {
                    threshold_secs: 1.0,
                },
                ..DrowsinessConfig::lenient()
            })
            .unwrap();
        let (classification, score) =
            machine.update(Observation::EyesClosed, Duration::from_millis(500));
        assert_eq!(classification, Classification::Alert);
        assert_eq!(score, 1.0);
    }

    #[test]
    fn test_reset_returns_to_awake() {
        let mut machine = DrowsinessStateMachine::new(DrowsinessConfig::region(5, 30.0)).unwrap();
        for _ in 0..5 {
            machine.update(Observation::EyesClosed, FPS_30);
        }
        assert!(machine.classification().is_alert());

        machine.reset();
        assert_eq!(machine.classification(), Classification::Awake);
        assert_eq!(machine.fatigue_score(), 0.0);
    }
}
