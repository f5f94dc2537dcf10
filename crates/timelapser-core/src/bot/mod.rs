//! The chat-driven timelapse bot: one event loop owning the command router, the
//! camera override and the capture scheduler.

mod commands;

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub use commands::COMMAND_PREFIXES;

use crate::agent::{AgentApi, AgentEvent, FrameRenderer};
use crate::camera::CameraState;
use crate::capture::{CaptureScheduler, StopReason, TickOutcome};
use crate::chat::{RichText, TextComponent, tellraw, with_bot_prefix};
use crate::command::{CommandCall, Dispatch, MessageRouter};
use crate::error::CommandError;
use crate::pose::{PoseResolver, TargetSpec};
use crate::world::{Pose, Vec3, WorldSnapshot};

/// A chat line queued for delivery after the current handler or tick finishes.
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub target: String,
    pub message: RichText,
}

/// Why [`Bot::run`] returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEnd {
    pub reason: String,
}

/// Everything a command handler may touch.
pub struct BotContext {
    agent: Arc<dyn AgentApi>,
    camera: CameraState,
    capture: CaptureScheduler,
    live_pose: Option<Pose>,
    router: Arc<MessageRouter<BotContext>>,
    outbox: mpsc::UnboundedSender<Notice>,
}

impl BotContext {
    /// Sends `message` to `target` behind the bot prefix.
    async fn tell(&self, target: &str, message: impl Into<RichText>) -> anyhow::Result<()> {
        let line = tellraw(target, &with_bot_prefix(message));
        self.agent.chat(line).await
    }

    /// Progress line sent before a command acts. Losing it never blocks the command.
    async fn notify(&self, target: &str, message: impl Into<RichText>) {
        if let Err(err) = self.tell(target, message).await {
            warn!(recipient = target, error = %format!("{err:#}"), "bot.progress.failed");
        }
    }

    fn target_spec(&self, call: &CommandCall) -> Result<TargetSpec, CommandError> {
        TargetSpec::from_args(call.args.get("type"), call.args.get("target"), &call.invoker)
    }

    async fn snapshot_for(&self, spec: &TargetSpec) -> anyhow::Result<WorldSnapshot> {
        if spec.needs_world() {
            self.agent.world_snapshot().await
        } else {
            Ok(WorldSnapshot::default())
        }
    }

    async fn resolve_pose(&self, spec: &TargetSpec) -> anyhow::Result<Pose> {
        let world = self.snapshot_for(spec).await?;
        Ok(PoseResolver::resolve(spec, &world)?)
    }

    async fn resolve_position(&self, spec: &TargetSpec) -> anyhow::Result<Vec3> {
        let world = self.snapshot_for(spec).await?;
        Ok(PoseResolver::resolve_position(spec, &world)?)
    }
}

pub struct Bot {
    ctx: BotContext,
    outbox_rx: mpsc::UnboundedReceiver<Notice>,
}

impl Bot {
    pub fn new(agent: Arc<dyn AgentApi>, capture: CaptureScheduler) -> anyhow::Result<Self> {
        let router = Arc::new(commands::build_router()?);
        let (outbox, outbox_rx) = mpsc::unbounded_channel();
        Ok(Self {
            ctx: BotContext {
                agent,
                camera: CameraState::default(),
                capture,
                live_pose: None,
                router,
                outbox,
            },
            outbox_rx,
        })
    }

    /// Points the bot at a fresh session. Camera override and the (idle) scheduler
    /// carry over; the live pose does not.
    pub fn reattach(&mut self, agent: Arc<dyn AgentApi>, renderer: Arc<dyn FrameRenderer>) {
        self.ctx.agent = agent;
        self.ctx.capture.set_renderer(renderer);
        self.ctx.live_pose = None;
    }

    pub fn camera(&self) -> &CameraState {
        &self.ctx.camera
    }

    pub fn camera_mut(&mut self) -> &mut CameraState {
        &mut self.ctx.camera
    }

    pub fn capture(&self) -> &CaptureScheduler {
        &self.ctx.capture
    }

    pub fn live_pose(&self) -> Option<Pose> {
        self.ctx.live_pose
    }

    pub fn router(&self) -> &MessageRouter<BotContext> {
        &self.ctx.router
    }

    /// Drives the bot until the session ends. Chat is handled in arrival order and
    /// capture ticks interleave between handlers, never inside one.
    pub async fn run(&mut self, events: &mut mpsc::Receiver<AgentEvent>) -> SessionEnd {
        loop {
            tokio::select! {
                event = events.recv() => {
                    let event = event.unwrap_or_else(|| AgentEvent::Ended {
                        reason: "event stream closed".to_string(),
                    });
                    if let Some(end) = self.handle_event(event).await {
                        return end;
                    }
                }
                _ = self.ctx.capture.next_tick() => {
                    self.tick().await;
                }
            }
        }
    }

    /// Applies one agent event. Returns `Some` when the session is over.
    pub async fn handle_event(&mut self, event: AgentEvent) -> Option<SessionEnd> {
        match event {
            AgentEvent::Spawned { pose } => {
                self.ctx.live_pose = Some(pose);
                if let Err(err) = self.greet().await {
                    warn!(error = %format!("{err:#}"), "bot.greeting.failed");
                }
            }
            AgentEvent::Moved { pose } => self.ctx.live_pose = Some(pose),
            AgentEvent::Chat { username, message } => self.handle_chat(&username, &message).await,
            AgentEvent::Ended { reason } => return Some(self.end_session(reason)),
        }
        None
    }

    /// One capture step from the camera override, or the agent pose when unset.
    pub async fn tick(&mut self) -> TickOutcome {
        let pose = self.ctx.camera.current_or(self.ctx.live_pose);
        let outcome = self.ctx.capture.tick(pose);
        debug!(?outcome, "bot.tick");
        self.flush_outbox().await;
        outcome
    }

    pub async fn handle_chat(&mut self, username: &str, message: &str) {
        if username == self.ctx.agent.username() {
            return;
        }

        let router = Arc::clone(&self.ctx.router);
        let dispatch = router.dispatch(&mut self.ctx, username, message).await;
        match dispatch {
            Dispatch::Ignored => {}
            Dispatch::Handled { name } => {
                debug!(command = %name, invoker = %username, "bot.command.handled");
            }
            Dispatch::NotFound { name } => {
                info!(command = %name, invoker = %username, "bot.command.not_found");
                let reply = CommandError::CommandNotFound(name).to_string();
                self.reply(username, reply).await;
            }
            Dispatch::Failed { name, error } => {
                let reply = if error.downcast_ref::<CommandError>().is_some() {
                    info!(command = %name, error = %format!("{error:#}"), "bot.command.rejected");
                    format!("{error:#}")
                } else {
                    warn!(command = %name, error = %format!("{error:#}"), "bot.command.failed");
                    format!("Something went wrong while running {name}.")
                };
                self.reply(username, reply).await;
            }
        }
        self.flush_outbox().await;
    }

    /// Stops any recording and waits for pending frame writes.
    pub async fn shutdown(&mut self) {
        self.ctx.capture.stop(StopReason::Shutdown);
        self.ctx.capture.flush().await;
        self.flush_outbox().await;
    }

    async fn reply(&self, target: &str, message: impl Into<RichText>) {
        if let Err(err) = self.ctx.tell(target, message).await {
            warn!(recipient = target, error = %format!("{err:#}"), "bot.reply.failed");
        }
    }

    async fn flush_outbox(&mut self) {
        while let Ok(notice) = self.outbox_rx.try_recv() {
            if let Err(err) = self.ctx.tell(&notice.target, notice.message).await {
                warn!(recipient = %notice.target, error = %format!("{err:#}"), "bot.notice.failed");
            }
        }
    }

    /// There is no chat channel once the session is gone, so queued notices are
    /// logged and discarded. Recording has to be restarted by hand.
    fn end_session(&mut self, reason: String) -> SessionEnd {
        let was_recording = self.ctx.capture.stop(StopReason::SessionEnded);
        while let Ok(notice) = self.outbox_rx.try_recv() {
            info!(recipient = %notice.target, notice = ?notice.message, "bot.notice.dropped");
        }
        self.ctx.live_pose = None;
        warn!(%reason, was_recording, "bot.session.ended");
        SessionEnd { reason }
    }

    async fn greet(&self) -> anyhow::Result<()> {
        let version = format!("Version: {}", env!("CARGO_PKG_VERSION"));
        info!(version = env!("CARGO_PKG_VERSION"), "bot.greeting");

        let mut hint = vec![RichText::from("Type ")];
        for (i, prefix) in COMMAND_PREFIXES.iter().enumerate() {
            if i > 0 {
                hint.push(" or ".into());
            }
            let command = format!("{prefix} help");
            hint.push(
                TextComponent::new(command.clone())
                    .color("aqua")
                    .hover_text(format!("run {command}"))
                    .suggest_command(command)
                    .into(),
            );
        }
        hint.push(" to list commands.".into());

        self.ctx.tell("@a", version).await?;
        self.ctx.tell("@a", "Hello, world!").await?;
        self.ctx.tell("@a", RichText::List(hint)).await
    }
}
