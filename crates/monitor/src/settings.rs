//! Monitor settings (file + environment)

use crate::MonitorError;
use config::{Config, Environment, File};
use drowsiness::DrowsinessConfig;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Settings file looked up when none is given (any supported extension)
pub const DEFAULT_SETTINGS_FILE: &str = "drowsiness";

/// Environment prefix, e.g. `DROWSY__DROWSINESS__EAR_THRESHOLD=0.25`
pub const ENV_PREFIX: &str = "DROWSY";

/// Monitor settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    /// Drowsiness core configuration
    pub drowsiness: DrowsinessConfig,

    /// Emit logs as JSON lines
    pub log_json: bool,

    /// Frames buffered between the detector and the session task
    pub frame_queue: usize,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            drowsiness: DrowsinessConfig::default(),
            log_json: false,
            frame_queue: 8,
        }
    }
}

impl MonitorSettings {
    /// Load settings from an optional file, then `DROWSY__*` environment variables
    pub fn load(path: Option<&str>) -> Result<Self, MonitorError> {
        let file = match path {
            Some(path) => File::with_name(path).required(true),
            None => File::with_name(DEFAULT_SETTINGS_FILE).required(false),
        };

        let settings: MonitorSettings = Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        info!("Settings loaded: {:?}", settings);
        Ok(settings)
    }

    /// Reject settings a session cannot start with
    pub fn validate(&self) -> Result<(), MonitorError> {
        self.drowsiness.validate()?;
        if self.frame_queue == 0 {
            return Err(MonitorError::Drowsiness(
                drowsiness::DrowsinessError::InvalidConfiguration(
                    "frame_queue must be at least 1".into(),
                ),
            ));
        }
        Ok(())
    }
}
