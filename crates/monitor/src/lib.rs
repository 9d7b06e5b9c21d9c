//! Drowsiness Monitor
//!
//! Runs one monitored subject's frames through the drowsiness core on a
//! dedicated task and publishes the freshest result for UI and notifiers.

use thiserror::Error;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

mod pipeline;
mod session;
mod settings;
mod trace;

pub use pipeline::{FrameReport, Pipeline, SessionSummary};
pub use session::{Frame, MonitorSession};
pub use settings::MonitorSettings;
pub use trace::{parse_trace, with_deltas, TraceFrame};

/// Monitor error types
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error(transparent)]
    Drowsiness(#[from] drowsiness::DrowsinessError),

    #[error("Settings error: {0}")]
    Settings(#[from] config::ConfigError),

    #[error("Trace line {line}: {source}")]
    Trace {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Logging setup failed: {0}")]
    Logging(String),
}

/// Initialize logging
pub fn init_logging(json: bool) -> Result<(), MonitorError> {
    let builder = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(true);

    let result = if json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };

    result.map_err(|e| MonitorError::Logging(e.to_string()))
}
