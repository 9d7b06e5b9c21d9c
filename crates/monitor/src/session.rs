//! Monitoring session worker
//!
//! One task owns the pipeline. Frames come in over a bounded queue, and the
//! newest [`FrameReport`] is published on a single-slot watch channel, so a slow
//! reader only ever sees fresh state and never builds up a backlog.

use crate::pipeline::{FrameReport, Pipeline, SessionSummary};
use crate::MonitorError;
use drowsiness::{DetectorOutput, DrowsinessConfig};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// One frame's detector output
#[derive(Debug, Clone)]
pub struct Frame {
    pub output: DetectorOutput,
    /// Time since the previous frame
    pub dt: Duration,
}

/// Handle to a running monitoring session
pub struct MonitorSession {
    frames: mpsc::Sender<Frame>,
    reports: watch::Receiver<FrameReport>,
    config: watch::Sender<DrowsinessConfig>,
    stop: watch::Sender<bool>,
    handle: JoinHandle<SessionSummary>,
}

impl MonitorSession {
    /// Start a session task. Must be called within a tokio runtime.
    pub fn spawn(config: DrowsinessConfig, queue: usize) -> Result<Self, MonitorError> {
        let pipeline = Pipeline::new(config.clone())?;

        let (frame_tx, frame_rx) = mpsc::channel(queue.max(1));
        let (report_tx, report_rx) = watch::channel(FrameReport::default());
        let (config_tx, config_rx) = watch::channel(config);
        let (stop_tx, stop_rx) = watch::channel(false);

        let handle = tokio::spawn(run(pipeline, frame_rx, report_tx, config_rx, stop_rx));
        info!("Monitoring session started (queue {})", queue.max(1));

        Ok(Self {
            frames: frame_tx,
            reports: report_rx,
            config: config_tx,
            stop: stop_tx,
            handle,
        })
    }

    /// Queue a frame, waiting while the queue is full
    pub async fn send(&self, frame: Frame) -> Result<(), MonitorError> {
        self.frames
            .send(frame)
            .await
            .map_err(|_| MonitorError::Session("session task has stopped".into()))
    }

    /// Sender for a detector running elsewhere.
    ///
    /// Sends fail once the session is finished or dropped.
    pub fn frame_sender(&self) -> mpsc::Sender<Frame> {
        self.frames.clone()
    }

    /// Receiver of the newest frame report
    pub fn subscribe(&self) -> watch::Receiver<FrameReport> {
        self.reports.clone()
    }

    /// Most recent report
    pub fn latest(&self) -> FrameReport {
        self.reports.borrow().clone()
    }

    /// Replace the configuration at the next frame boundary.
    ///
    /// Invalid configurations are rejected here and never reach the task.
    pub fn reconfigure(&self, config: DrowsinessConfig) -> Result<(), MonitorError> {
        config.validate()?;
        self.config.send_replace(config);
        Ok(())
    }

    /// Stop accepting frames and wait for the task to drain its queue.
    ///
    /// Outstanding [`frame_sender`](Self::frame_sender) clones do not hold the
    /// session open.
    pub async fn finish(self) -> Result<SessionSummary, MonitorError> {
        let Self {
            frames,
            stop,
            handle,
            ..
        } = self;
        stop.send_replace(true);
        drop(frames);
        handle.await.map_err(|e| MonitorError::Session(e.to_string()))
    }
}

async fn run(
    mut pipeline: Pipeline,
    mut frames: mpsc::Receiver<Frame>,
    reports: watch::Sender<FrameReport>,
    mut config: watch::Receiver<DrowsinessConfig>,
    mut stop: watch::Receiver<bool>,
) -> SessionSummary {
    let mut stopping = false;
    loop {
        tokio::select! {
            // Fires on finish() and on the handle being dropped
            _ = stop.changed(), if !stopping => {
                debug!("Session stopping, draining queued frames");
                stopping = true;
                frames.close();
            }
            frame = frames.recv() => {
                let Some(frame) = frame else {
                    break;
                };
                if config.has_changed().unwrap_or(false) {
                    let next = config.borrow_and_update().clone();
                    if let Err(e) = pipeline.reconfigure(next) {
                        warn!("Ignoring configuration update: {}", e);
                    }
                }

                let report = pipeline.process(&frame.output, frame.dt);
                reports.send_replace(report);
            }
        }
    }

    if let Some(event) = pipeline.finish() {
        let mut last = reports.borrow().clone();
        last.alert_event = Some(event);
        last.alert_active = false;
        reports.send_replace(last);
    }

    let summary = pipeline.summary();
    info!(
        "Monitoring session ended: {} frames, {} alert episodes",
        summary.frames, summary.episodes
    );
    summary
}
