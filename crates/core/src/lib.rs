//! Core library for the Loopscape presentation loop.
//!
//! A looping background animation is a pure function of elapsed time plus a
//! small amount of state: the current sequence, a transition pulse, and the
//! lifecycle of the links between network nodes. [`AnimationEngine`] owns
//! that state and advances it once per host frame; drawing, overlay text,
//! outline files and video encoding are reached through the collaborator
//! traits in [`render`], [`overlay`], [`assets`] and [`record`].

pub mod assets;
pub mod config;
pub mod easing;
pub mod engine;
pub mod error;
pub mod overlay;
pub mod record;
pub mod render;
pub mod scene;
pub mod timeline;

pub use assets::{
    read_outlines, AssetLoader, AssetStore, GroupId, LoadCompletion, OutlineFileLoader,
    ShapeAsset, ShapeGroup,
};
pub use config::{
    AppConfig, CameraConfig, Caption, ConnectionConfig, DepthKey, NetworkConfig, OverlayConfig,
    Palette, ParticleConfig, PulseConfig, Rgb, ShapeConfig, ShapeDef,
};
pub use engine::AnimationEngine;
pub use error::{LoopscapeError, Result};
pub use overlay::{CaptionPhase, CaptionState, CaptionTrack, LogListener, SequenceListener};
pub use record::{FrameSink, JsonLinesSink, Recorder, RecorderStatus, RecordingSettings};
pub use render::{FrameSnapshot, RenderBackend, RenderGraph};
pub use scene::{CameraPose, FrameContext, Viewport};
pub use timeline::{
    FrameCadence, LoopClock, SequenceChange, SequenceEvent, SequenceId, SequenceInterval,
    SequenceScheduler, SequenceTable, TransitionPulse,
};
