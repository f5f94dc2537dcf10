mod bridge;
mod config;

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use timelapser_core::Bot;
use timelapser_core::capture::CaptureScheduler;

use crate::bridge::RemoteAgent;
use crate::config::{AppConfig, CameraConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cfg = AppConfig::load().context("load config")?;
    tokio::fs::create_dir_all(&cfg.capture.output_dir)
        .await
        .with_context(|| format!("create output dir {}", cfg.capture.output_dir.display()))?;
    info!(
        bridge = %cfg.bridge.addr,
        server = %format!("{}:{}", cfg.session.host, cfg.session.port),
        output_dir = %cfg.capture.output_dir.display(),
        interval_ms = cfg.capture.interval_ms,
        frames = cfg.capture.frames,
        "timelapser.started"
    );

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut bot: Option<Bot> = None;
    loop {
        let connected = tokio::select! {
            res = RemoteAgent::connect(&cfg.bridge.addr, &cfg.session) => res,
            _ = &mut shutdown => break,
        };

        match connected {
            Ok((agent, mut events)) => {
                match bot.as_mut() {
                    Some(existing) => existing.reattach(agent.clone(), agent.clone()),
                    None => bot = Some(build_bot(&cfg, agent.clone())?),
                }
                let Some(active) = bot.as_mut() else {
                    continue;
                };

                let ended = tokio::select! {
                    end = active.run(&mut events) => end,
                    _ = &mut shutdown => break,
                };
                info!(reason = %ended.reason, "timelapser.session.ended");
            }
            Err(err) => warn!(error = %format!("{err:#}"), "timelapser.connect.failed"),
        }

        info!(delay_ms = cfg.bridge.reconnect_delay_ms, "timelapser.reconnecting");
        tokio::select! {
            _ = tokio::time::sleep(cfg.reconnect_delay()) => {}
            _ = &mut shutdown => break,
        }
    }

    info!("timelapser.shutdown");
    if let Some(bot) = bot.as_mut() {
        bot.shutdown().await;
    }
    Ok(())
}

fn build_bot(cfg: &AppConfig, agent: Arc<RemoteAgent>) -> anyhow::Result<Bot> {
    let capture = CaptureScheduler::new(cfg.capture_settings(), agent.clone());
    let mut bot = Bot::new(agent, capture).context("build command registry")?;
    if let Some(camera) = &cfg.capture.camera {
        apply_camera(&mut bot, camera);
    }
    Ok(bot)
}

fn apply_camera(bot: &mut Bot, camera: &CameraConfig) {
    match bot
        .camera_mut()
        .try_set(camera.position(), camera.yaw, camera.pitch)
    {
        Ok(pose) => info!(?pose, "camera.override.configured"),
        Err(err) => warn!(error = %err, "Failed to set camera position from config"),
    }
}
