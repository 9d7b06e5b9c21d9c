//! Alerting
//!
//! Turns per-frame drowsiness classifications into one-shot alert events so
//! notification sinks fire once per episode instead of once per frame.

mod policy;

pub use policy::{AlertEvent, AlertPolicy, EpisodeStats};
