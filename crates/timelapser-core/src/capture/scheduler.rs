use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDateTime;
use tokio::task::JoinSet;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{info, warn};

use super::frame::{CaptureSettings, frame_file_name, persist_frame};
use crate::agent::FrameRenderer;
use crate::world::Pose;

pub type StopCallback = Box<dyn FnOnce(StopSummary) + Send + Sync>;
pub type Clock = Arc<dyn Fn() -> NaiveDateTime + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Requested,
    FrameLimit,
    SessionEnded,
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopSummary {
    pub reason: StopReason,
    pub frames: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Recording,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Not recording.
    Idle,
    /// The frame budget was used up; recording stopped without a new frame.
    LimitReached,
    /// No camera override and the agent pose is not known yet.
    NoPose,
    /// Frame `frame` was handed to the renderer and will be written to `path`.
    Captured { frame: u64, path: PathBuf },
}

/// Interval-driven frame capture.
///
/// Recording is exactly "a timer is armed": `start` on a recording scheduler and `stop`
/// on an idle one do nothing. Renders and file writes run as background tasks so a
/// slow frame never holds up the caller's event loop.
pub struct CaptureScheduler {
    settings: CaptureSettings,
    renderer: Arc<dyn FrameRenderer>,
    clock: Clock,
    frame_index: u64,
    timer: Option<Interval>,
    on_stop: Option<StopCallback>,
    writes: JoinSet<()>,
}

impl CaptureScheduler {
    pub fn new(settings: CaptureSettings, renderer: Arc<dyn FrameRenderer>) -> Self {
        Self {
            settings,
            renderer,
            clock: Arc::new(|| chrono::Local::now().naive_local()),
            frame_index: 0,
            timer: None,
            on_stop: None,
            writes: JoinSet::new(),
        }
    }

    /// Replaces the wall clock used for frame file names.
    pub fn with_clock(mut self, clock: impl Fn() -> NaiveDateTime + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn settings(&self) -> &CaptureSettings {
        &self.settings
    }

    /// Swaps the renderer after the agent reconnected.
    pub fn set_renderer(&mut self, renderer: Arc<dyn FrameRenderer>) {
        self.renderer = renderer;
    }

    pub fn state(&self) -> CaptureState {
        if self.is_recording() {
            CaptureState::Recording
        } else {
            CaptureState::Idle
        }
    }

    pub fn is_recording(&self) -> bool {
        self.timer.is_some()
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn pending_writes(&self) -> usize {
        self.writes.len()
    }

    /// Arms the timer and resets the frame counter. Returns `false` (and keeps the
    /// running session, callback included) when already recording.
    pub fn start(&mut self, on_stop: Option<StopCallback>) -> bool {
        if self.is_recording() {
            return false;
        }

        let period = self.settings.interval.max(Duration::from_millis(1));
        let mut timer = tokio::time::interval_at(Instant::now() + period, period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        self.timer = Some(timer);
        self.frame_index = 0;
        self.on_stop = on_stop;
        info!(
            interval_ms = period.as_millis() as u64,
            frame_limit = ?self.settings.frame_limit,
            output_dir = %self.settings.output_dir.display(),
            "capture.started"
        );
        true
    }

    /// Disarms the timer and fires the completion callback. Safe to call from inside
    /// [`CaptureScheduler::tick`]; once it returns no further tick produces a frame.
    pub fn stop(&mut self, reason: StopReason) -> bool {
        if self.timer.take().is_none() {
            return false;
        }

        let summary = StopSummary {
            reason,
            frames: self.frame_index,
        };
        info!(?reason, frames = self.frame_index, "capture.stopped");
        if let Some(on_stop) = self.on_stop.take() {
            on_stop(summary);
        }
        true
    }

    /// Completes at the next timer tick. Never completes while idle.
    pub async fn next_tick(&mut self) {
        match self.timer.as_mut() {
            Some(timer) => {
                timer.tick().await;
            }
            None => std::future::pending::<()>().await,
        }
    }

    /// One capture step, rendering from `pose` (the camera override or the agent's pose).
    pub fn tick(&mut self, pose: Option<Pose>) -> TickOutcome {
        self.reap_writes();

        if !self.is_recording() {
            return TickOutcome::Idle;
        }
        if let Some(limit) = self.settings.frame_limit
            && self.frame_index > limit
        {
            self.stop(StopReason::FrameLimit);
            return TickOutcome::LimitReached;
        }
        let Some(pose) = pose else {
            warn!(frame = self.frame_index, "capture.tick.no_pose");
            return TickOutcome::NoPose;
        };

        self.frame_index += 1;
        let frame = self.frame_index;
        let path = self.settings.output_dir.join(frame_file_name(&(self.clock)()));

        let renderer = self.renderer.clone();
        let viewport = self.settings.viewport;
        let target = path.clone();
        self.writes.spawn(async move {
            match persist_frame(renderer, pose, viewport, &target).await {
                Ok(bytes) => {
                    info!(frame, bytes, file = %target.display(), "capture.frame.saved")
                }
                Err(err) => {
                    warn!(frame, error = %format!("{err:#}"), "capture.frame.failed")
                }
            }
        });

        TickOutcome::Captured { frame, path }
    }

    /// Waits for every outstanding render/write.
    pub async fn flush(&mut self) {
        while let Some(res) = self.writes.join_next().await {
            if let Err(err) = res {
                warn!(error = %err, "capture.frame.join_failed");
            }
        }
    }

    fn reap_writes(&mut self) {
        while let Some(res) = self.writes.try_join_next() {
            if let Err(err) = res {
                warn!(error = %err, "capture.frame.join_failed");
            }
        }
    }
}
