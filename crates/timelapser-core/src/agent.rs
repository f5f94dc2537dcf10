use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::world::{Pose, Vec3, WorldSnapshot};

pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = anyhow::Result<T>> + Send + 'a>>;

/// Boundary the bot uses to act inside the game session.
///
/// The session itself (protocol, login, physics) lives on the other side of this trait.
pub trait AgentApi: Send + Sync {
    /// In-game name of the agent.
    fn username(&self) -> &str;

    /// Sends a raw chat line, which may be a server command such as `/tellraw` or `/tp`.
    fn chat<'a>(&'a self, text: String) -> ApiFuture<'a, ()>;

    fn look<'a>(&'a self, yaw: f64, pitch: f64) -> ApiFuture<'a, ()>;

    fn look_at<'a>(&'a self, target: Vec3) -> ApiFuture<'a, ()>;

    fn world_snapshot<'a>(&'a self) -> ApiFuture<'a, WorldSnapshot>;
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    /// Render distance in chunks.
    pub view_distance: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 512,
            height: 512,
            view_distance: 4,
        }
    }
}

/// Draws the world from a pose and returns the encoded PNG.
pub trait FrameRenderer: Send + Sync {
    fn render<'a>(&'a self, pose: Pose, viewport: Viewport) -> ApiFuture<'a, Vec<u8>>;
}

/// Events pushed by the game session, in arrival order.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AgentEvent {
    Spawned { pose: Pose },
    Moved { pose: Pose },
    Chat { username: String, message: String },
    /// The session is gone. Nothing can be sent until the agent reconnects.
    Ended { reason: String },
}
