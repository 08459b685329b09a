use serde::{Deserialize, Serialize};

use crate::{easing, LoopscapeError, PulseConfig, Result};

/// Largest frame delta fed into the smoothing filters. A host that stalls
/// (hidden tab, debugger) resumes with one bounded step instead of a jump.
pub const MAX_FRAME_DELTA: f32 = 0.25;

/// Monotonic elapsed time and the repeating loop time derived from it.
#[derive(Debug, Clone)]
pub struct LoopClock {
    elapsed: f32,
    loop_duration: f32,
}

impl LoopClock {
    pub fn new(loop_duration: f32) -> Result<Self> {
        if !(loop_duration > 0.0 && loop_duration.is_finite()) {
            return Err(LoopscapeError::config(format!(
                "loop duration must be positive, got {loop_duration}"
            )));
        }
        Ok(Self {
            elapsed: 0.0,
            loop_duration,
        })
    }

    /// Moves the clock to the host supplied `elapsed` time and returns the
    /// clamped frame delta. Values behind the current time are ignored.
    pub fn advance_to(&mut self, elapsed: f32) -> f32 {
        if !elapsed.is_finite() || elapsed < self.elapsed {
            return 0.0;
        }
        let delta = (elapsed - self.elapsed).min(MAX_FRAME_DELTA);
        self.elapsed = elapsed;
        delta
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    /// `elapsed mod loop_duration`, always in `[0, loop_duration)`.
    pub fn loop_time(&self) -> f32 {
        let t = self.elapsed % self.loop_duration;
        if (0.0..self.loop_duration).contains(&t) {
            t
        } else {
            0.0
        }
    }

    /// Fraction of the current loop that has played, in `[0, 1)`.
    pub fn progress(&self) -> f32 {
        (self.loop_time() / self.loop_duration).min(1.0 - f32::EPSILON)
    }

    /// Number of completed loops.
    pub fn loop_index(&self) -> u64 {
        (self.elapsed / self.loop_duration).floor() as u64
    }
}

/// Strictly periodic frame times for headless runs and recordings.
#[derive(Debug, Clone, Copy)]
pub struct FrameCadence {
    fps: u32,
}

impl FrameCadence {
    pub fn new(fps: u32) -> Result<Self> {
        if fps == 0 {
            return Err(LoopscapeError::config("frame rate must be at least 1"));
        }
        Ok(Self { fps })
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    /// Elapsed time of frame `index`. Computed from the index rather than by
    /// accumulation so long runs do not drift.
    pub fn elapsed_at(&self, index: u64) -> f32 {
        (index as f64 / f64::from(self.fps)) as f32
    }

    /// Number of frames needed to cover `seconds`.
    pub fn frames_for(&self, seconds: f32) -> u64 {
        (f64::from(seconds.max(0.0)) * f64::from(self.fps)).ceil() as u64
    }
}

pub type SequenceId = u32;

/// Half-open time span `[start, end)` of one presentation sequence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SequenceInterval {
    pub id: SequenceId,
    pub start: f32,
    pub end: f32,
}

impl SequenceInterval {
    pub fn new(id: SequenceId, start: f32, end: f32) -> Self {
        Self { id, start, end }
    }

    pub fn duration(&self) -> f32 {
        self.end - self.start
    }

    /// Position of `loop_time` inside this interval, clamped to `[0, 1]`.
    pub fn progress(&self, loop_time: f32) -> f32 {
        ((loop_time - self.start) / self.duration()).clamp(0.0, 1.0)
    }
}

/// Ordered, gap-free intervals covering `[0, loop_duration]`.
///
/// Intervals are half-open except the last, which also owns
/// `loop_duration` itself.
#[derive(Debug, Clone)]
pub struct SequenceTable {
    loop_duration: f32,
    intervals: Vec<SequenceInterval>,
}

impl SequenceTable {
    pub fn new(loop_duration: f32, intervals: Vec<SequenceInterval>) -> Result<Self> {
        if !(loop_duration > 0.0 && loop_duration.is_finite()) {
            return Err(LoopscapeError::config(format!(
                "loop duration must be positive, got {loop_duration}"
            )));
        }
        let (first, last) = match (intervals.first(), intervals.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Err(LoopscapeError::config("at least one sequence is required")),
        };
        if first.start != 0.0 {
            return Err(LoopscapeError::config(format!(
                "sequence {} must start at 0, starts at {}",
                first.id, first.start
            )));
        }
        if last.end != loop_duration {
            return Err(LoopscapeError::config(format!(
                "sequence {} must end at the loop duration {loop_duration}, ends at {}",
                last.id, last.end
            )));
        }
        for interval in &intervals {
            if !(interval.start < interval.end) {
                return Err(LoopscapeError::config(format!(
                    "sequence {} is empty or inverted: [{}, {})",
                    interval.id, interval.start, interval.end
                )));
            }
        }
        for pair in intervals.windows(2) {
            if pair[0].end != pair[1].start {
                let kind = if pair[0].end < pair[1].start { "gap" } else { "overlap" };
                return Err(LoopscapeError::config(format!(
                    "{kind} between sequence {} (ends {}) and sequence {} (starts {})",
                    pair[0].id, pair[0].end, pair[1].id, pair[1].start
                )));
            }
        }
        for (index, interval) in intervals.iter().enumerate() {
            if intervals[..index].iter().any(|other| other.id == interval.id) {
                return Err(LoopscapeError::config(format!(
                    "sequence id {} appears more than once",
                    interval.id
                )));
            }
        }

        Ok(Self {
            loop_duration,
            intervals,
        })
    }

    pub fn loop_duration(&self) -> f32 {
        self.loop_duration
    }

    pub fn intervals(&self) -> &[SequenceInterval] {
        &self.intervals
    }

    pub fn contains_id(&self, id: SequenceId) -> bool {
        self.interval(id).is_some()
    }

    pub fn interval(&self, id: SequenceId) -> Option<&SequenceInterval> {
        self.intervals.iter().find(|interval| interval.id == id)
    }

    /// Interval containing `loop_time`. Values outside the loop clamp to the
    /// first or last interval.
    pub fn interval_at(&self, loop_time: f32) -> &SequenceInterval {
        let index = self
            .intervals
            .partition_point(|interval| interval.end <= loop_time)
            .min(self.intervals.len() - 1);
        &self.intervals[index]
    }

    pub fn lookup(&self, loop_time: f32) -> SequenceId {
        self.interval_at(loop_time).id
    }
}

/// One side of a sequence transition, in the order they are delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceEvent {
    Exit(SequenceId),
    Enter(SequenceId),
}

/// A change of the current sequence, raised on the frame the boundary is
/// crossed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SequenceChange {
    /// `None` only for the very first frame.
    pub from: Option<SequenceId>,
    pub to: SequenceId,
    /// Elapsed time of the frame that observed the change.
    pub at: f32,
}

impl SequenceChange {
    pub fn events(&self) -> impl Iterator<Item = SequenceEvent> {
        self.from
            .map(SequenceEvent::Exit)
            .into_iter()
            .chain(std::iter::once(SequenceEvent::Enter(self.to)))
    }
}

/// Maps loop time to the current sequence and reports boundary crossings.
#[derive(Debug, Clone)]
pub struct SequenceScheduler {
    table: SequenceTable,
    current: Option<SequenceId>,
}

impl SequenceScheduler {
    pub fn new(table: SequenceTable) -> Self {
        Self {
            table,
            current: None,
        }
    }

    pub fn table(&self) -> &SequenceTable {
        &self.table
    }

    pub fn current(&self) -> Option<SequenceId> {
        self.current
    }

    /// Resolves the sequence for `loop_time`. When it differs from the stored
    /// one the pulse is re-triggered and the change is returned.
    pub fn update(
        &mut self,
        loop_time: f32,
        at: f32,
        pulse: &mut TransitionPulse,
    ) -> Option<SequenceChange> {
        let next = self.table.lookup(loop_time);
        if self.current == Some(next) {
            return None;
        }

        let change = SequenceChange {
            from: self.current,
            to: next,
            at,
        };
        tracing::debug!(from = ?change.from, to = next, at, "sequence change");
        pulse.trigger();
        self.current = Some(next);
        Some(change)
    }
}

/// Short emphasis after every sequence change. Set to one by the scheduler,
/// decayed by the layer stage.
#[derive(Debug, Clone)]
pub struct TransitionPulse {
    intensity: f32,
    decay: f32,
    threshold: f32,
}

impl TransitionPulse {
    pub fn new(config: &PulseConfig) -> Self {
        Self {
            intensity: 0.0,
            decay: config.decay,
            threshold: config.threshold,
        }
    }

    pub fn intensity(&self) -> f32 {
        self.intensity
    }

    pub(crate) fn trigger(&mut self) {
        self.intensity = 1.0;
    }

    pub fn decay(&mut self, dt: f32) {
        let next = easing::decay(self.intensity, self.decay, dt);
        self.intensity = if next < self.threshold { 0.0 } else { next };
    }
}
