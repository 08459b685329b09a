use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::render::FrameSnapshot;
use crate::{LoopscapeError, Result};

/// Slack when comparing frame times against the sampling grid.
const SAMPLE_TOLERANCE: f32 = 1e-4;

/// Configuration options for the recording subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingSettings {
    pub output_path: String,
    pub fps: u32,
    /// Seconds to record; one loop when unset.
    pub duration: Option<f32>,
}

impl Default for RecordingSettings {
    fn default() -> Self {
        Self {
            output_path: String::from("loop.jsonl"),
            fps: 60,
            duration: None,
        }
    }
}

/// Destination for sampled frames. Encoding into a video container happens
/// behind this trait.
pub trait FrameSink {
    fn write_frame(&mut self, frame: &FrameSnapshot) -> Result<()>;

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Writes one JSON document per frame.
#[derive(Debug)]
pub struct JsonLinesSink<W: Write> {
    writer: W,
    frames: u64,
}

impl JsonLinesSink<BufWriter<File>> {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(BufWriter::new(File::create(path)?)))
    }
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, frames: 0 }
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> FrameSink for JsonLinesSink<W> {
    fn write_frame(&mut self, frame: &FrameSnapshot) -> Result<()> {
        serde_json::to_writer(&mut self.writer, frame)?;
        self.writer.write_all(b"\n")?;
        self.frames += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderStatus {
    Idle,
    Recording,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum RecordingState {
    Idle,
    Recording { started_at: f32, stop_at: f32 },
    Finished,
}

/// Samples already-rendered frames at a fixed cadence and stops itself once
/// the configured duration has passed. Read-only with respect to the
/// animation.
#[derive(Debug)]
pub struct Recorder<S: FrameSink> {
    settings: RecordingSettings,
    sink: S,
    state: RecordingState,
    captured: u64,
}

impl<S: FrameSink> Recorder<S> {
    pub fn new(settings: RecordingSettings, sink: S) -> Result<Self> {
        if settings.fps == 0 {
            return Err(LoopscapeError::config("recording fps must be at least 1"));
        }
        Ok(Self {
            settings,
            sink,
            state: RecordingState::Idle,
            captured: 0,
        })
    }

    /// Begins recording at `elapsed`. `loop_duration` is used when the
    /// settings do not name a duration.
    pub fn start(&mut self, elapsed: f32, loop_duration: f32) -> Result<()> {
        if self.is_recording() {
            return Err(LoopscapeError::msg("recording already in progress"));
        }
        let duration = self.settings.duration.unwrap_or(loop_duration);
        if !(duration > 0.0) {
            return Err(LoopscapeError::config("recording duration must be positive"));
        }
        tracing::info!(
            output = %self.settings.output_path,
            fps = self.settings.fps,
            duration,
            "recording started"
        );
        self.captured = 0;
        self.state = RecordingState::Recording {
            started_at: elapsed,
            stop_at: elapsed + duration,
        };
        Ok(())
    }

    /// Offers a rendered frame. Frames between sampling points are skipped.
    pub fn capture(&mut self, frame: &FrameSnapshot) -> Result<RecorderStatus> {
        let RecordingState::Recording {
            started_at,
            stop_at,
        } = self.state
        else {
            return Ok(self.status());
        };

        if frame.elapsed >= stop_at - SAMPLE_TOLERANCE {
            self.stop()?;
            return Ok(RecorderStatus::Finished);
        }

        let due = started_at + self.captured as f32 / self.settings.fps as f32;
        if frame.elapsed >= due - SAMPLE_TOLERANCE {
            self.sink.write_frame(frame)?;
            self.captured += 1;
        }
        Ok(RecorderStatus::Recording)
    }

    pub fn stop(&mut self) -> Result<()> {
        if self.is_recording() {
            self.sink.finish()?;
            self.state = RecordingState::Finished;
            tracing::info!(frames = self.captured, "recording finished");
        }
        Ok(())
    }

    pub fn status(&self) -> RecorderStatus {
        match self.state {
            RecordingState::Idle => RecorderStatus::Idle,
            RecordingState::Recording { .. } => RecorderStatus::Recording,
            RecordingState::Finished => RecorderStatus::Finished,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.status() == RecorderStatus::Recording
    }

    pub fn captured(&self) -> u64 {
        self.captured
    }

    pub fn into_sink(self) -> S {
        self.sink
    }
}
