//! Detachable virtual camera.

use crate::error::CommandError;
use crate::world::{Pose, Vec3};

/// Optional pose override used for rendering instead of the agent's own pose.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CameraState {
    override_pose: Option<Pose>,
}

impl CameraState {
    pub fn set(&mut self, pose: Pose) {
        self.override_pose = Some(pose);
    }

    /// Sets the override from separately resolved components; all three must be present.
    pub fn try_set(
        &mut self,
        position: Option<Vec3>,
        yaw: Option<f64>,
        pitch: Option<f64>,
    ) -> Result<Pose, CommandError> {
        let pose = Pose::from_parts(position, yaw, pitch)
            .ok_or_else(|| CommandError::IncompletePose("camera".to_string()))?;
        self.set(pose);
        Ok(pose)
    }

    /// Returns the removed override, if any.
    pub fn clear(&mut self) -> Option<Pose> {
        self.override_pose.take()
    }

    pub fn override_pose(&self) -> Option<Pose> {
        self.override_pose
    }

    pub fn current(&self, fallback: Pose) -> Pose {
        self.override_pose.unwrap_or(fallback)
    }

    /// Like [`CameraState::current`] when the live pose may still be unknown.
    pub fn current_or(&self, fallback: Option<Pose>) -> Option<Pose> {
        self.override_pose.or(fallback)
    }
}
