//! Collaborators that react to sequence changes.
//!
//! The core only announces transitions; listeners own their own timing and
//! are never waited on.

use std::collections::HashMap;

use crate::{OverlayConfig, SequenceChange, SequenceEvent, SequenceId};

/// Receives sequence transitions from the engine.
pub trait SequenceListener {
    /// Called once per change. The default splits the change into its exit
    /// and enter halves.
    fn sequence_changed(&mut self, change: &SequenceChange) {
        for event in change.events() {
            match event {
                SequenceEvent::Exit(id) => self.on_exit(id, change.at),
                SequenceEvent::Enter(id) => self.on_enter(id, change.at),
            }
        }
    }

    fn on_exit(&mut self, _sequence: SequenceId, _at: f32) {}

    fn on_enter(&mut self, _sequence: SequenceId, _at: f32) {}
}

impl SequenceListener for () {}

impl<L: SequenceListener + ?Sized> SequenceListener for &mut L {
    fn sequence_changed(&mut self, change: &SequenceChange) {
        (**self).sequence_changed(change);
    }
}

/// Fans a change out to two listeners, first `.0` then `.1`.
impl<A: SequenceListener, B: SequenceListener> SequenceListener for (A, B) {
    fn sequence_changed(&mut self, change: &SequenceChange) {
        self.0.sequence_changed(change);
        self.1.sequence_changed(change);
    }
}

/// Logs every transition.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogListener;

impl SequenceListener for LogListener {
    fn sequence_changed(&mut self, change: &SequenceChange) {
        tracing::info!(from = ?change.from, to = change.to, at = change.at, "sequence");
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CaptionPhase {
    /// Entered, waiting for the enter delay to pass.
    Pending { show_at: f32 },
    Visible,
    /// Marked for exit; removed once `clear_at` passes.
    Exiting { clear_at: f32 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaptionState {
    pub sequence: SequenceId,
    pub text: String,
    pub phase: CaptionPhase,
}

/// Reference overlay: one caption per sequence with a short cross-fade
/// between the outgoing and incoming text.
#[derive(Debug, Clone)]
pub struct CaptionTrack {
    captions: HashMap<SequenceId, String>,
    enter_delay: f32,
    exit_delay: f32,
    active: Vec<CaptionState>,
}

impl CaptionTrack {
    pub fn new(config: &OverlayConfig) -> Self {
        Self {
            captions: config
                .captions
                .iter()
                .map(|c| (c.sequence, c.text.clone()))
                .collect(),
            enter_delay: config.enter_delay,
            exit_delay: config.exit_delay,
            active: Vec::new(),
        }
    }

    /// Resolves delays that have elapsed by `elapsed`.
    pub fn advance(&mut self, elapsed: f32) {
        self.active.retain(|caption| match caption.phase {
            CaptionPhase::Exiting { clear_at } => clear_at > elapsed,
            _ => true,
        });
        for caption in &mut self.active {
            if let CaptionPhase::Pending { show_at } = caption.phase {
                if show_at <= elapsed {
                    caption.phase = CaptionPhase::Visible;
                }
            }
        }
    }

    pub fn captions(&self) -> &[CaptionState] {
        &self.active
    }

    /// Captions currently on screen, including ones fading out.
    pub fn on_screen(&self) -> impl Iterator<Item = &CaptionState> {
        self.active
            .iter()
            .filter(|c| !matches!(c.phase, CaptionPhase::Pending { .. }))
    }
}

impl SequenceListener for CaptionTrack {
    fn on_exit(&mut self, sequence: SequenceId, at: f32) {
        let clear_at = at + self.exit_delay;
        for caption in &mut self.active {
            if caption.sequence == sequence {
                caption.phase = CaptionPhase::Exiting { clear_at };
            }
        }
    }

    fn on_enter(&mut self, sequence: SequenceId, at: f32) {
        if let Some(text) = self.captions.get(&sequence) {
            self.active.push(CaptionState {
                sequence,
                text: text.clone(),
                phase: CaptionPhase::Pending {
                    show_at: at + self.enter_delay,
                },
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn change(from: Option<SequenceId>, to: SequenceId, at: f32) -> SequenceChange {
        SequenceChange { from, to, at }
    }

    fn texts(track: &CaptionTrack) -> Vec<&str> {
        track.on_screen().map(|c| c.text.as_str()).collect()
    }

    #[test]
    fn captions_cross_fade_between_sequences() {
        let config = OverlayConfig::default();
        let mut track = CaptionTrack::new(&config);

        track.sequence_changed(&change(None, 1, 0.0));
        track.advance(0.1);
        assert!(texts(&track).is_empty());
        track.advance(config.enter_delay);
        assert_eq!(texts(&track), vec!["Signal"]);

        track.sequence_changed(&change(Some(1), 2, 4.0));
        track.advance(4.0 + config.enter_delay);
        assert_eq!(texts(&track), vec!["Signal", "Connect"]);

        track.advance(4.0 + config.exit_delay);
        assert_eq!(texts(&track), vec!["Connect"]);
    }

    #[test]
    fn sequences_without_captions_are_ignored() {
        let mut track = CaptionTrack::new(&OverlayConfig {
            captions: Vec::new(),
            ..OverlayConfig::default()
        });
        track.sequence_changed(&change(None, 3, 0.0));
        track.advance(10.0);
        assert!(track.captions().is_empty());
    }

    #[derive(Default)]
    struct Recorder(Vec<SequenceEvent>);

    impl SequenceListener for Recorder {
        fn on_exit(&mut self, sequence: SequenceId, _at: f32) {
            self.0.push(SequenceEvent::Exit(sequence));
        }

        fn on_enter(&mut self, sequence: SequenceId, _at: f32) {
            self.0.push(SequenceEvent::Enter(sequence));
        }
    }

    #[test]
    fn default_dispatch_delivers_exit_before_enter() {
        let mut recorder = Recorder::default();
        recorder.sequence_changed(&change(Some(4), 1, 25.0));
        assert_eq!(
            recorder.0,
            vec![SequenceEvent::Exit(4), SequenceEvent::Enter(1)]
        );
    }
}
