//! Recorded detector traces (JSON lines)

use crate::MonitorError;
use drowsiness::DetectorOutput;
use serde::{Deserialize, Serialize};
use std::io::BufRead;
use std::time::Duration;
use tracing::warn;

/// One recorded frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceFrame {
    /// Capture timestamp (milliseconds)
    pub t_ms: u64,
    pub output: DetectorOutput,
}

/// Parse a trace, one JSON object per line. Blank lines and `#` comments are skipped.
pub fn parse_trace<R: BufRead>(reader: R) -> Result<Vec<TraceFrame>, MonitorError> {
    let mut frames = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let frame = serde_json::from_str(trimmed).map_err(|source| MonitorError::Trace {
            line: index + 1,
            source,
        })?;
        frames.push(frame);
    }
    Ok(frames)
}

/// Pair each frame with the time since its predecessor (zero for the first)
pub fn with_deltas(frames: &[TraceFrame]) -> Vec<(Duration, &DetectorOutput)> {
    let mut previous: Option<u64> = None;
    frames
        .iter()
        .map(|frame| {
            let dt_ms = match previous {
                Some(prev) if frame.t_ms < prev => {
                    warn!("Trace timestamp went backwards ({} -> {})", prev, frame.t_ms);
                    0
                }
                Some(prev) => frame.t_ms - prev,
                None => 0,
            };
            previous = Some(frame.t_ms);
            (Duration::from_millis(dt_ms), &frame.output)
        })
        .collect()
}
