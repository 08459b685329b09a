use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

use super::FrameContext;
use crate::{easing, CameraConfig, DepthKey, SequenceInterval};

/// Size of the output surface in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Width over height; a zero height is treated as one pixel.
    pub fn aspect(&self) -> f32 {
        self.width.max(1) as f32 / self.height.max(1) as f32
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(1920, 1080)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CameraPose {
    pub position: Vec3,
    pub target: Vec3,
    /// Depth the camera is easing toward.
    pub depth_target: f32,
    pub view: Mat4,
    pub projection: Mat4,
}

/// Orbiting camera whose depth follows the sequence table.
#[derive(Debug, Clone)]
pub struct CameraRig {
    config: CameraConfig,
    depth: f32,
    viewport: Viewport,
    projection: Mat4,
}

impl CameraRig {
    pub fn new(config: &CameraConfig, viewport: Viewport) -> Self {
        let depth = config
            .depth_keys
            .first()
            .map_or(config.neutral_depth, |key| key.from);
        let mut rig = Self {
            config: config.clone(),
            depth,
            viewport,
            projection: Mat4::IDENTITY,
        };
        rig.resize(viewport);
        rig
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    pub fn depth(&self) -> f32 {
        self.depth
    }

    /// Recomputes the projection for a new surface size. Only derived state is
    /// touched, so repeated calls with the same size are no-ops.
    pub fn resize(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        self.projection = Mat4::perspective_rh(
            self.config.fov_degrees.to_radians(),
            viewport.aspect(),
            self.config.near,
            self.config.far,
        );
    }

    fn key(&self, interval: &SequenceInterval) -> Option<&DepthKey> {
        self.config
            .depth_keys
            .iter()
            .find(|key| key.sequence == interval.id)
    }

    /// Target depth for `loop_time`, piecewise linear inside `interval`.
    pub fn target_depth(&self, interval: &SequenceInterval, loop_time: f32) -> f32 {
        match self.key(interval) {
            Some(key) => easing::lerp(key.from, key.to, interval.progress(loop_time)),
            None => self.config.neutral_depth,
        }
    }

    pub fn update(&mut self, ctx: &FrameContext, interval: &SequenceInterval) -> CameraPose {
        let depth_target = self.target_depth(interval, ctx.loop_time);
        self.depth = easing::approach(self.depth, depth_target, self.config.follow_rate, ctx.dt);

        let amplitude = self.config.orbit_amplitude;
        let speed = self.config.orbit_speed;
        let position = Vec3::new(
            (ctx.elapsed * speed.x).sin() * amplitude.x,
            (ctx.elapsed * speed.y).cos() * amplitude.y,
            self.depth,
        );
        let target = Vec3::ZERO;

        CameraPose {
            position,
            target,
            depth_target,
            view: Mat4::look_at_rh(position, target, Vec3::Y),
            projection: self.projection,
        }
    }
}
