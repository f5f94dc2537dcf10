use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::NaiveDateTime;

use crate::agent::{FrameRenderer, Viewport};
use crate::world::Pose;

#[derive(Debug, Clone, PartialEq)]
pub struct CaptureSettings {
    pub output_dir: PathBuf,
    pub interval: Duration,
    /// `None` records until stopped. `Some(n)` stops once the frame index exceeds
    /// `n`, so `n + 1` frames are written.
    pub frame_limit: Option<u64>,
    pub viewport: Viewport,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            interval: Duration::from_secs(60),
            frame_limit: None,
            viewport: Viewport::default(),
        }
    }
}

impl CaptureSettings {
    /// Maps the `-1 = unbounded` convention of the config file.
    pub fn frame_limit_from_count(frames: i64) -> Option<u64> {
        u64::try_from(frames).ok()
    }
}

/// `YYYY-MM-DD_HH-MM-SS.png`. Two frames in the same second share a name and the
/// later write wins.
pub fn frame_file_name(at: &NaiveDateTime) -> String {
    at.format("%Y-%m-%d_%H-%M-%S.png").to_string()
}

/// Renders `pose` and writes the PNG to `path`. Returns the number of bytes written.
pub(crate) async fn persist_frame(
    renderer: Arc<dyn FrameRenderer>,
    pose: Pose,
    viewport: Viewport,
    path: &Path,
) -> anyhow::Result<usize> {
    let png = renderer.render(pose, viewport).await.context("render frame")?;
    tokio::fs::write(path, &png)
        .await
        .with_context(|| format!("write frame {}", path.display()))?;
    Ok(png.len())
}
