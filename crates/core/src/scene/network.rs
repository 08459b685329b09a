use std::f32::consts::TAU;

use glam::Vec3;
use rand::Rng;
use serde::Serialize;

use super::{ConnectionEngine, FrameContext, LayerSignal};
use crate::{easing, ConnectionConfig, NetworkConfig, Rgb, SequenceTable};

/// A network node. Everything here is fixed at creation; the drawn position
/// is derived every frame by [`Node::position_at`].
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub index: usize,
    pub base_position: Vec3,
    pub phase: f32,
    pub osc_speed: f32,
}

impl Node {
    pub fn position_at(&self, elapsed: f32, amplitude: f32) -> Vec3 {
        let t = elapsed * self.osc_speed + self.phase;
        self.base_position
            + Vec3::new(t.sin(), (t * 0.8).cos(), (t * 0.6).sin() * 0.5) * amplitude
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ActiveSpan {
    start: f32,
    /// Runs past the loop duration when the span wraps into the next loop.
    end: f32,
    /// Delay before the ramp-in begins; non-zero when a previous span is
    /// still fading out at `start`.
    ramp_delay: f32,
}

/// Global opacity of the network layer as a function of loop time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EnvelopeSample {
    pub opacity: f32,
    pub fading_out: bool,
    /// Seconds since the ramp-in of the current span began.
    pub since_start: Option<f32>,
}

impl EnvelopeSample {
    const OFF: EnvelopeSample = EnvelopeSample {
        opacity: 0.0,
        fading_out: false,
        since_start: None,
    };
}

#[derive(Debug, Clone)]
pub struct NetworkEnvelope {
    spans: Vec<ActiveSpan>,
    fade_in: f32,
    fade_out: f32,
    loop_duration: f32,
}

impl NetworkEnvelope {
    /// Builds the active spans from the configured sequence ids. Unknown ids
    /// are skipped; configuration validation reports them earlier.
    pub fn new(config: &NetworkConfig, table: &SequenceTable) -> Self {
        let mut intervals: Vec<_> = config
            .active_sequences
            .iter()
            .filter_map(|&id| table.interval(id))
            .copied()
            .collect();
        intervals.sort_by(|a, b| a.start.total_cmp(&b.start));

        let mut spans: Vec<ActiveSpan> = Vec::new();
        for interval in intervals {
            match spans.last_mut() {
                Some(last) if config.continuous && last.end == interval.start => {
                    last.end = interval.end;
                }
                _ => spans.push(ActiveSpan {
                    start: interval.start,
                    end: interval.end,
                    ramp_delay: 0.0,
                }),
            }
        }

        let loop_duration = table.loop_duration();
        if config.continuous && spans.len() > 1 {
            let first = spans[0];
            let touches_end = spans.last().is_some_and(|last| last.end == loop_duration);
            if first.start == 0.0 && touches_end {
                spans.remove(0);
                if let Some(last) = spans.last_mut() {
                    last.end = loop_duration + first.end;
                }
            }
        }

        let ends: Vec<f32> = spans.iter().map(|s| s.end).collect();
        for (index, span) in spans.iter_mut().enumerate() {
            for (other, &end) in ends.iter().enumerate() {
                if other == index {
                    continue;
                }
                let gap = (span.start - end).rem_euclid(loop_duration);
                if gap < config.fade_out {
                    span.ramp_delay = span.ramp_delay.max(config.fade_out - gap);
                }
            }
        }

        Self {
            spans,
            fade_in: config.fade_in,
            fade_out: config.fade_out,
            loop_duration,
        }
    }

    fn covers_loop(&self, span: &ActiveSpan) -> bool {
        span.end - span.start >= self.loop_duration
    }

    fn offset(&self, span: &ActiveSpan, loop_time: f32) -> f32 {
        (loop_time - span.start).rem_euclid(self.loop_duration)
    }

    fn contains(&self, span: &ActiveSpan, loop_time: f32) -> bool {
        self.covers_loop(span) || self.offset(span, loop_time) < span.end - span.start
    }

    fn ramp_level(&self, ramped: f32) -> f32 {
        easing::smoothstep(ramped.max(0.0) / self.fade_in)
    }

    /// Samples the envelope at `loop_time`. `elapsed` keeps the first loop
    /// from showing fade-outs that never started and ramps a span that is
    /// already active at startup in from zero.
    pub fn sample(&self, loop_time: f32, elapsed: f32) -> EnvelopeSample {
        for span in &self.spans {
            if self.contains(span, loop_time) {
                continue;
            }
            let since_end = (loop_time - span.end).rem_euclid(self.loop_duration);
            if since_end < self.fade_out && since_end < elapsed {
                let ramped = (span.end - span.start - span.ramp_delay).min(elapsed - since_end);
                return EnvelopeSample {
                    opacity: self.ramp_level(ramped)
                        * easing::smoothstep(1.0 - since_end / self.fade_out),
                    fading_out: true,
                    since_start: None,
                };
            }
        }

        for span in &self.spans {
            if !self.contains(span, loop_time) {
                continue;
            }
            let since_start = if self.covers_loop(span) {
                elapsed
            } else {
                (self.offset(span, loop_time) - span.ramp_delay)
                    .max(0.0)
                    .min(elapsed)
            };
            return EnvelopeSample {
                opacity: self.ramp_level(since_start),
                fading_out: false,
                since_start: Some(since_start),
            };
        }

        EnvelopeSample::OFF
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NodeFrame {
    pub index: usize,
    pub position: Vec3,
    pub opacity: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LinkFrame {
    pub a: usize,
    pub b: usize,
    pub from: Vec3,
    pub to: Vec3,
    pub opacity: f32,
}

/// Everything the render capability needs to draw the network this frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkFrame {
    pub envelope: EnvelopeSample,
    pub node_color: Vec3,
    pub link_color: Vec3,
    pub node_size: f32,
    pub nodes: Vec<NodeFrame>,
    /// Only links with a non-zero opacity.
    pub links: Vec<LinkFrame>,
}

/// Floating nodes plus the connection lifecycle engine they feed.
#[derive(Debug, Clone)]
pub struct NetworkLayer {
    config: NetworkConfig,
    node_color: Rgb,
    link_color: Rgb,
    nodes: Vec<Node>,
    positions: Vec<Vec3>,
    envelope: NetworkEnvelope,
    connections: ConnectionEngine,
}

impl NetworkLayer {
    pub fn new<R: Rng + ?Sized>(
        config: &NetworkConfig,
        connections: &ConnectionConfig,
        table: &SequenceTable,
        colors: (Rgb, Rgb),
        rng: &mut R,
    ) -> Self {
        let [slow, fast] = config.drift_speed_range;
        let nodes: Vec<Node> = (0..config.node_count)
            .map(|index| Node {
                index,
                base_position: Vec3::new(
                    spread(config.spread, rng),
                    spread(config.spread, rng),
                    spread(config.spread * 0.5, rng),
                ),
                phase: rng.random::<f32>() * TAU,
                osc_speed: slow + (fast - slow) * rng.random::<f32>(),
            })
            .collect();
        let positions = nodes.iter().map(|n| n.base_position).collect();
        let connections = ConnectionEngine::new(nodes.len(), connections, rng);

        Self {
            config: config.clone(),
            node_color: colors.0,
            link_color: colors.1,
            nodes,
            positions,
            envelope: NetworkEnvelope::new(config, table),
            connections,
        }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn connections(&self) -> &ConnectionEngine {
        &self.connections
    }

    pub fn envelope(&self) -> &NetworkEnvelope {
        &self.envelope
    }

    /// Stagger factor for node `index`: later nodes ramp in later.
    fn stagger(&self, index: usize, sample: &EnvelopeSample) -> f32 {
        match sample.since_start {
            Some(since) => {
                let delay = index as f32 * self.config.node_stagger;
                easing::ease_in_out_cubic((since - delay) / self.config.node_fade)
            }
            None => 1.0,
        }
    }

    pub fn update<R: Rng + ?Sized>(&mut self, ctx: &FrameContext, rng: &mut R) -> NetworkFrame {
        let amplitude = self.config.drift_amplitude;
        for (slot, node) in self.positions.iter_mut().zip(&self.nodes) {
            *slot = node.position_at(ctx.elapsed, amplitude);
        }

        let envelope = self.envelope.sample(ctx.loop_time, ctx.elapsed);
        let signal = LayerSignal {
            opacity: envelope.opacity,
            fading_out: envelope.fading_out,
        };
        self.connections
            .update(&self.positions, signal, ctx.elapsed, ctx.dt, rng);

        let nodes = self
            .nodes
            .iter()
            .map(|node| NodeFrame {
                index: node.index,
                position: self.positions[node.index],
                opacity: self.config.node_opacity
                    * envelope.opacity
                    * self.stagger(node.index, &envelope),
            })
            .collect();

        let links = self
            .connections
            .visible()
            .map(|connection| {
                let (a, b) = connection.nodes();
                LinkFrame {
                    a,
                    b,
                    from: self.positions[a],
                    to: self.positions[b],
                    opacity: connection.current_opacity(),
                }
            })
            .collect();

        NetworkFrame {
            envelope,
            node_color: self.node_color.to_vec3(),
            link_color: self.link_color.to_vec3(),
            node_size: self.config.node_size,
            nodes,
            links,
        }
    }
}

fn spread<R: Rng + ?Sized>(extent: f32, rng: &mut R) -> f32 {
    (rng.random::<f32>() * 2.0 - 1.0) * extent
}
