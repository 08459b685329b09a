use rand::{rngs::StdRng, SeedableRng};

use crate::render::{FrameSnapshot, RenderBackend};
use crate::scene::{CameraRig, FrameContext, NetworkLayer, ParticleField, ShapeLayer, Viewport};
use crate::{
    AppConfig, AssetLoader, AssetStore, GroupId, LoopClock, Result, Rgb, SequenceId,
    SequenceListener, SequenceScheduler, ShapeAsset, TransitionPulse,
};

/// Owns the whole animation state and advances it one frame per [`tick`].
///
/// Every field has a single writer inside `tick`: the clock, then the
/// scheduler (sequence and pulse), then the layers, then the camera.
///
/// [`tick`]: AnimationEngine::tick
#[derive(Debug)]
pub struct AnimationEngine {
    clock: LoopClock,
    scheduler: SequenceScheduler,
    pulse: TransitionPulse,
    particles: ParticleField,
    network: NetworkLayer,
    shapes: ShapeLayer,
    camera: CameraRig,
    assets: AssetStore,
    rng: StdRng,
    background: Rgb,
    frame: u64,
}

impl AnimationEngine {
    pub fn new(config: &AppConfig) -> Result<Self> {
        Self::with_viewport(config, Viewport::default())
    }

    pub fn with_viewport(config: &AppConfig, viewport: Viewport) -> Result<Self> {
        config.validate()?;
        let table = config.sequence_table()?;
        let mut rng = StdRng::seed_from_u64(config.seed);

        let particles = ParticleField::new(&config.particles, config.palette.particles, &mut rng);
        let network = NetworkLayer::new(
            &config.network,
            &config.connections,
            &table,
            (config.palette.nodes, config.palette.links),
            &mut rng,
        );
        tracing::info!(
            loop_duration = config.loop_duration,
            sequences = table.intervals().len(),
            nodes = network.nodes().len(),
            connections = network.connections().len(),
            "animation engine ready"
        );

        Ok(Self {
            clock: LoopClock::new(config.loop_duration)?,
            scheduler: SequenceScheduler::new(table),
            pulse: TransitionPulse::new(&config.pulse),
            particles,
            network,
            shapes: ShapeLayer::new(&config.shapes, config.palette.shapes),
            camera: CameraRig::new(&config.camera, viewport),
            assets: AssetStore::new(),
            rng,
            background: config.palette.background,
            frame: 0,
        })
    }

    pub fn clock(&self) -> &LoopClock {
        &self.clock
    }

    pub fn scheduler(&self) -> &SequenceScheduler {
        &self.scheduler
    }

    /// `None` until the first tick.
    pub fn current_sequence(&self) -> Option<SequenceId> {
        self.scheduler.current()
    }

    pub fn pulse(&self) -> f32 {
        self.pulse.intensity()
    }

    pub fn particles(&self) -> &ParticleField {
        &self.particles
    }

    pub fn network(&self) -> &NetworkLayer {
        &self.network
    }

    pub fn shapes(&self) -> &ShapeLayer {
        &self.shapes
    }

    pub fn camera(&self) -> &CameraRig {
        &self.camera
    }

    pub fn assets(&self) -> &AssetStore {
        &self.assets
    }

    /// Starts loading a shape outline file. The group joins the shape layer
    /// on the first tick after the load completes.
    pub fn request_asset(&mut self, loader: &dyn AssetLoader, asset: ShapeAsset) -> GroupId {
        self.assets.request(loader, asset)
    }

    pub fn remove_asset(&mut self, id: GroupId) -> bool {
        let removed = self.assets.remove(id);
        self.shapes.remove_group(id) || removed
    }

    pub fn set_asset_opacity(&mut self, id: GroupId, opacity: f32) -> bool {
        self.assets.set_opacity(id, opacity);
        self.shapes.set_group_opacity(id, opacity)
    }

    /// Applies a new surface size to the camera and the backend.
    pub fn resize(&mut self, viewport: Viewport, backend: &mut dyn RenderBackend) {
        self.camera.resize(viewport);
        backend.resize(viewport);
    }

    /// Advances the animation to `elapsed` seconds and submits the frame.
    ///
    /// Submission errors are logged; the frame loop keeps running.
    pub fn tick(
        &mut self,
        elapsed: f32,
        listener: &mut dyn SequenceListener,
        backend: &mut dyn RenderBackend,
    ) -> FrameSnapshot {
        let dt = self.clock.advance_to(elapsed);
        let elapsed = self.clock.elapsed();
        let loop_time = self.clock.loop_time();

        for id in self.assets.drain() {
            if let Some(group) = self.assets.group(id) {
                self.shapes.add_group(group);
            }
        }

        if let Some(change) = self.scheduler.update(loop_time, elapsed, &mut self.pulse) {
            listener.sequence_changed(&change);
        }
        let interval = *self.scheduler.table().interval_at(loop_time);

        let ctx = FrameContext {
            elapsed,
            loop_time,
            dt,
            sequence: interval.id,
            pulse: self.pulse.intensity(),
        };

        let particles = self.particles.update(&ctx);
        self.pulse.decay(dt);
        let network = self.network.update(&ctx, &mut self.rng);
        let shapes = self.shapes.update(&ctx);
        let camera = self.camera.update(&ctx, &interval);

        let snapshot = FrameSnapshot {
            frame: self.frame,
            elapsed,
            loop_time,
            progress: self.clock.progress(),
            sequence: interval.id,
            pulse: ctx.pulse,
            background: self.background.to_vec3(),
            camera,
            particles,
            network,
            shapes,
        };
        self.frame += 1;

        if let Err(err) = backend.submit(&snapshot) {
            tracing::warn!(frame = snapshot.frame, error = %err, "frame submission failed");
        }
        snapshot
    }
}
