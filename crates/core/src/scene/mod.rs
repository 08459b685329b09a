//! Per-frame layer animators.
//!
//! Each layer owns its typed entity records and turns a [`FrameContext`] into
//! the parameters the render capability needs. Layers read the current
//! sequence and pulse but never write them.

pub mod camera;
pub mod connections;
pub mod network;
pub mod particles;
pub mod shapes;

use serde::Serialize;

use crate::SequenceId;

pub use camera::{CameraPose, CameraRig, Viewport};
pub use connections::{Connection, ConnectionEngine, LayerSignal, LifecycleState};
pub use network::{
    EnvelopeSample, LinkFrame, NetworkEnvelope, NetworkFrame, NetworkLayer, Node, NodeFrame,
};
pub use particles::{ParticleField, ParticleFrame};
pub use shapes::{Shape, ShapeFrame, ShapeId, ShapeLayer, ShapeSource};

/// Read-only view of the shared animation state for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FrameContext {
    pub elapsed: f32,
    pub loop_time: f32,
    /// Clamped delta since the previous frame.
    pub dt: f32,
    pub sequence: SequenceId,
    pub pulse: f32,
}
