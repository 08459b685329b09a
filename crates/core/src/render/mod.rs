use serde::Serialize;

use crate::scene::{CameraPose, NetworkFrame, ParticleFrame, ShapeFrame, Viewport};
use crate::{Result, SequenceId};

/// Everything the render capability needs to draw one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameSnapshot {
    /// Index of the tick that produced this frame, starting at zero.
    pub frame: u64,
    pub elapsed: f32,
    pub loop_time: f32,
    /// `loop_time / loop_duration`, in `[0, 1)`.
    pub progress: f32,
    pub sequence: SequenceId,
    /// Pulse intensity the layers were animated with.
    pub pulse: f32,
    pub background: glam::Vec3,
    pub camera: CameraPose,
    pub particles: ParticleFrame,
    pub network: NetworkFrame,
    pub shapes: Vec<ShapeFrame>,
}

impl FrameSnapshot {
    /// Number of primitives a backend would issue for this frame: the
    /// particle cloud, one batch for the nodes, one per visible link and one
    /// per outline of a visible shape.
    pub fn draw_calls(&self) -> usize {
        let nodes = usize::from(self.network.nodes.iter().any(|n| n.opacity > 0.0));
        let links = self.network.links.iter().filter(|l| l.opacity > 0.0).count();
        let outlines: usize = self
            .shapes
            .iter()
            .filter(|s| s.opacity > 0.0)
            .map(|s| s.outlines.len())
            .sum();
        1 + nodes + links + outlines
    }
}

/// The external drawing capability.
pub trait RenderBackend {
    /// Recomputes any resolution-dependent resources. Must be idempotent.
    fn resize(&mut self, viewport: Viewport);

    fn submit(&mut self, frame: &FrameSnapshot) -> Result<()>;
}

/// Headless backend that keeps the most recent frame. Used by the command
/// line host and by tests.
#[derive(Debug, Default)]
pub struct RenderGraph {
    viewport: Option<Viewport>,
    last_frame: Option<FrameSnapshot>,
    frames_submitted: u64,
}

impl RenderGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn viewport(&self) -> Option<Viewport> {
        self.viewport
    }

    pub fn last_frame(&self) -> Option<&FrameSnapshot> {
        self.last_frame.as_ref()
    }

    pub fn frames_submitted(&self) -> u64 {
        self.frames_submitted
    }
}

impl RenderBackend for RenderGraph {
    fn resize(&mut self, viewport: Viewport) {
        self.viewport = Some(viewport);
    }

    fn submit(&mut self, frame: &FrameSnapshot) -> Result<()> {
        tracing::trace!(
            frame = frame.frame,
            sequence = frame.sequence,
            links = frame.network.links.len(),
            "submit"
        );
        self.frames_submitted += 1;
        self.last_frame = Some(frame.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;
    use crate::scene::LinkFrame;
    use crate::{AnimationEngine, AppConfig};

    fn quiet_frame() -> FrameSnapshot {
        let mut engine = AnimationEngine::new(&AppConfig::default()).unwrap();
        let mut frame = engine.tick(0.0, &mut (), &mut RenderGraph::new());
        frame.network.nodes.clear();
        frame.network.links.clear();
        frame.shapes.clear();
        frame
    }

    fn link(opacity: f32) -> LinkFrame {
        LinkFrame {
            a: 0,
            b: 1,
            from: Vec3::ZERO,
            to: Vec3::X,
            opacity,
        }
    }

    #[test]
    fn draw_calls_skip_invisible_primitives() {
        let mut frame = quiet_frame();
        assert_eq!(frame.draw_calls(), 1);

        frame.network.links = vec![link(0.4), link(0.0)];
        assert_eq!(frame.draw_calls(), 2);
    }

    #[test]
    fn draw_calls_count_every_outline_of_visible_shapes() {
        let mut engine = AnimationEngine::new(&AppConfig::default()).unwrap();
        let full = engine.tick(0.0, &mut (), &mut RenderGraph::new());

        let mut frame = quiet_frame();
        frame.shapes = full.shapes.clone();
        let outlines: usize = frame.shapes.iter().map(|s| s.outlines.len()).sum();
        assert_eq!(frame.draw_calls(), 1 + outlines);

        for shape in &mut frame.shapes {
            shape.opacity = 0.0;
        }
        assert_eq!(frame.draw_calls(), 1);
    }

    #[test]
    fn render_graph_keeps_the_latest_frame() {
        let mut graph = RenderGraph::new();
        assert!(graph.last_frame().is_none());
        let frame = quiet_frame();
        graph.submit(&frame).unwrap();
        graph.resize(Viewport::new(800, 600));
        assert_eq!(graph.frames_submitted(), 1);
        assert_eq!(graph.last_frame(), Some(&frame));
        assert_eq!(graph.viewport(), Some(Viewport::new(800, 600)));
    }
}
