//! Drowsiness Monitor - trace replay entry point
//!
//! Usage: `drowsiness-monitor <trace.jsonl> [settings-file]`

use anyhow::Context;
use monitor::{init_logging, parse_trace, with_deltas, Frame, MonitorSession, MonitorSettings};
use std::fs::File;
use std::io::BufReader;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let trace_path = args
        .next()
        .context("usage: drowsiness-monitor <trace.jsonl> [settings-file]")?;
    let settings = MonitorSettings::load(args.next().as_deref())?;
    init_logging(settings.log_json)?;

    info!("=== Drowsiness Monitor v{} ===", env!("CARGO_PKG_VERSION"));

    let file = File::open(&trace_path).with_context(|| format!("opening {}", trace_path))?;
    let frames = parse_trace(BufReader::new(file))?;
    info!("Replaying {} frames from {}", frames.len(), trace_path);

    let session = MonitorSession::spawn(settings.drowsiness.clone(), settings.frame_queue)?;

    let mut reports = session.subscribe();
    let renderer = tokio::spawn(async move {
        let mut last_status = String::new();
        while reports.changed().await.is_ok() {
            let report = reports.borrow_and_update().clone();
            if report.status != last_status {
                info!(
                    "[frame {}] {} (score {:.2}, perclos {:.2})",
                    report.frame, report.status, report.analysis.fatigue_score, report.analysis.perclos
                );
                last_status = report.status;
            }
        }
    });

    for (dt, output) in with_deltas(&frames) {
        session
            .send(Frame {
                output: output.clone(),
                dt,
            })
            .await?;
    }

    let summary = session.finish().await?;
    renderer.await.context("renderer task failed")?;

    info!(
        "Replay finished: {} frames, {} alert episodes, longest {} frames, {} unknown, final {:?}",
        summary.frames,
        summary.episodes,
        summary.longest_episode_frames,
        summary.unknown_frames,
        summary.final_classification
    );

    Ok(())
}
