use anyhow::Context;
use tracing::info;

use super::{BotContext, Notice};
use crate::capture::{StopReason, StopSummary};
use crate::chat::{short_number, short_position};
use crate::command::{
    CommandCall, CommandDescriptor, CommandRegistry, HandlerFuture, MessageRouter,
};

/// Chat prefixes the bot answers to. The first one is used in help suggestions.
pub const COMMAND_PREFIXES: [&str; 2] = ["!timelapser", "!tl"];

const TARGET_PARAMS: &[&str] = &["type", "target"];

pub(super) fn build_router() -> anyhow::Result<MessageRouter<BotContext>> {
    let mut registry = CommandRegistry::new();
    registry.register(CommandDescriptor {
        name: "start",
        aliases: &["startRecording"],
        description: "Starts taking a frame every capture interval.",
        params: &[],
        handler: start,
    })?;
    registry.register(CommandDescriptor {
        name: "stop",
        aliases: &["stopRecording"],
        description: "Stops the running recording.",
        params: &[],
        handler: stop,
    })?;
    registry.register(CommandDescriptor {
        name: "setPlayer",
        aliases: &["player"],
        description: "Teleports the bot to a player, a mob or abs coordinates (default: you).",
        params: TARGET_PARAMS,
        handler: set_player,
    })?;
    registry.register(CommandDescriptor {
        name: "setCamera",
        aliases: &["camera"],
        description: "Renders from a fixed pose instead of the bot's view.",
        params: TARGET_PARAMS,
        handler: set_camera,
    })?;
    registry.register(CommandDescriptor {
        name: "unsetCamera",
        aliases: &["-camera"],
        description: "Renders from the bot's view again.",
        params: &[],
        handler: unset_camera,
    })?;
    registry.register(CommandDescriptor {
        name: "lookAt",
        aliases: &["see"],
        description: "Turns the bot towards a target.",
        params: TARGET_PARAMS,
        handler: look_at,
    })?;

    let suggest_prefix = COMMAND_PREFIXES[0];
    registry.register_help(
        CommandDescriptor {
            name: "help",
            aliases: &[],
            description: "Lists the commands, or describes one.",
            params: &["target"],
            handler: show_help,
        },
        suggest_prefix,
    )?;

    Ok(MessageRouter::new(COMMAND_PREFIXES, registry))
}

fn start<'a>(ctx: &'a mut BotContext, call: CommandCall) -> HandlerFuture<'a> {
    Box::pin(async move {
        if ctx.capture.is_recording() {
            return ctx.tell(&call.invoker, "Already recording.").await;
        }

        let outbox = ctx.outbox.clone();
        let invoker = call.invoker.clone();
        ctx.capture.start(Some(Box::new(move |summary: StopSummary| {
            info!(reason = ?summary.reason, frames = summary.frames, invoker = %invoker, "capture.finished");
            if summary.reason != StopReason::Shutdown {
                let _ = outbox.send(Notice {
                    target: invoker,
                    message: "Finished Recording!".into(),
                });
            }
        })));
        ctx.tell(&call.invoker, "Start recording...").await
    })
}

fn stop<'a>(ctx: &'a mut BotContext, call: CommandCall) -> HandlerFuture<'a> {
    Box::pin(async move {
        if !ctx.capture.is_recording() {
            return ctx.tell(&call.invoker, "Not recording.").await;
        }
        ctx.capture.stop(StopReason::Requested);
        ctx.notify(&call.invoker, "Stop recording...").await;
        Ok(())
    })
}

fn set_player<'a>(ctx: &'a mut BotContext, call: CommandCall) -> HandlerFuture<'a> {
    Box::pin(async move {
        let spec = ctx.target_spec(&call)?;
        ctx.notify(
            &call.invoker,
            format!("Setting bot position to {}...", spec.label()),
        )
        .await;

        let pose = ctx.resolve_pose(&spec).await.with_context(|| {
            format!("Failed to set player position! ({}, {})", spec.kind, spec.label())
        })?;
        let p = pose.position;
        let teleport = format!("/tp {} {} {} {}", ctx.agent.username(), p.x, p.y, p.z);
        ctx.agent.chat(teleport).await.context("teleport agent")?;
        ctx.agent
            .look(pose.yaw, pose.pitch)
            .await
            .context("orient agent")?;

        ctx.tell(
            &call.invoker,
            format!(
                "Set player position at ({}) facing ({} / {}).",
                short_position(p.to_array()),
                short_number(pose.yaw),
                short_number(pose.pitch)
            ),
        )
        .await
    })
}

fn set_camera<'a>(ctx: &'a mut BotContext, call: CommandCall) -> HandlerFuture<'a> {
    Box::pin(async move {
        let spec = ctx.target_spec(&call)?;
        ctx.notify(
            &call.invoker,
            format!("Setting camera position to {}...", spec.label()),
        )
        .await;

        let pose = ctx.resolve_pose(&spec).await.with_context(|| {
            format!("Failed to set camera position! ({}, {})", spec.kind, spec.label())
        })?;
        ctx.camera.set(pose);
        info!(?pose, invoker = %call.invoker, "camera.override.set");

        ctx.tell(
            &call.invoker,
            format!(
                "Set camera position at ({}) facing ({} / {}).",
                short_position(pose.position.to_array()),
                short_number(pose.yaw),
                short_number(pose.pitch)
            ),
        )
        .await
    })
}

fn unset_camera<'a>(ctx: &'a mut BotContext, call: CommandCall) -> HandlerFuture<'a> {
    Box::pin(async move {
        if let Some(previous) = ctx.camera.clear() {
            info!(?previous, invoker = %call.invoker, "camera.override.cleared");
        }
        ctx.notify(&call.invoker, "Unsetting camera position...").await;
        Ok(())
    })
}

fn look_at<'a>(ctx: &'a mut BotContext, call: CommandCall) -> HandlerFuture<'a> {
    Box::pin(async move {
        let spec = ctx.target_spec(&call)?;
        let position = ctx
            .resolve_position(&spec)
            .await
            .with_context(|| format!("Failed to look at target! ({})", spec.label()))?;
        ctx.agent.look_at(position).await.context("turn agent")?;

        ctx.tell(
            &call.invoker,
            format!("Now looking at ({})", short_position(position.to_array())),
        )
        .await
    })
}

fn show_help<'a>(ctx: &'a mut BotContext, call: CommandCall) -> HandlerFuture<'a> {
    Box::pin(async move {
        let entries = ctx
            .router
            .registry()
            .describe(call.args.get("target"))?
            .to_vec();
        for entry in &entries {
            for line in entry.to_rich_lines() {
                ctx.tell(&call.invoker, line).await?;
            }
        }
        Ok(())
    })
}
