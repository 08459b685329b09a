use std::f32::consts::TAU;

use glam::{Vec2, Vec3};
use serde::Serialize;

use super::FrameContext;
use crate::{GroupId, Rgb, SequenceId, ShapeConfig, ShapeGroup, ShapeDef};

pub type ShapeId = usize;

/// Where a shape's geometry came from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ShapeSource {
    Polygon { sides: u32, radius: f32 },
    Outline { group: GroupId },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    pub id: ShapeId,
    pub source: ShapeSource,
    pub position: Vec3,
    pub color: Vec3,
    pub base_opacity: f32,
    pub rotation_speed: Vec3,
    pub pulse_frequency: f32,
    pub pulse_amplitude: f32,
    pub phase: f32,
    /// Closed outlines in shape-local space.
    pub outlines: Vec<Vec<Vec2>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShapeFrame {
    pub id: ShapeId,
    pub source: ShapeSource,
    /// Unrotated, unscaled outline vertices; `rotation` and `scale` apply
    /// around `position`.
    pub outlines: Vec<Vec<Vec2>>,
    pub position: Vec3,
    pub rotation: Vec3,
    pub scale: f32,
    pub color: Vec3,
    pub opacity: f32,
}

/// Slowly turning outlines whose visibility steps between two levels
/// depending on the sequence.
#[derive(Debug, Clone)]
pub struct ShapeLayer {
    shapes: Vec<Shape>,
    emphasised: Vec<SequenceId>,
    high: f32,
    low: f32,
    asset_motion: ShapeDef,
    default_color: Rgb,
    next_id: ShapeId,
}

impl ShapeLayer {
    pub fn new(config: &ShapeConfig, default_color: Rgb) -> Self {
        let mut layer = Self {
            shapes: Vec::with_capacity(config.shapes.len()),
            emphasised: config.emphasised_sequences.clone(),
            high: config.high_visibility,
            low: config.low_visibility,
            asset_motion: config.asset_motion.clone(),
            default_color,
            next_id: 0,
        };
        for def in &config.shapes {
            let source = ShapeSource::Polygon {
                sides: def.sides,
                radius: def.radius,
            };
            let outlines = vec![polygon_outline(def.sides, def.radius)];
            layer.push(source, outlines, def, def.position, def.color, def.opacity);
        }
        layer
    }

    fn push(
        &mut self,
        source: ShapeSource,
        outlines: Vec<Vec<Vec2>>,
        motion: &ShapeDef,
        position: Vec3,
        color: Option<Rgb>,
        opacity: f32,
    ) -> ShapeId {
        let id = self.next_id;
        self.next_id += 1;
        self.shapes.push(Shape {
            id,
            source,
            position,
            color: color.unwrap_or(self.default_color).to_vec3(),
            base_opacity: opacity,
            rotation_speed: motion.rotation_speed,
            pulse_frequency: motion.pulse_frequency,
            pulse_amplitude: motion.pulse_amplitude,
            phase: motion.phase,
            outlines,
        });
        id
    }

    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    /// Adds a loaded outline group using the shared asset motion settings.
    pub fn add_group(&mut self, group: &ShapeGroup) -> ShapeId {
        let motion = self.asset_motion.clone();
        self.push(
            ShapeSource::Outline { group: group.id },
            group.outlines.clone(),
            &motion,
            group.position,
            group.color,
            group.opacity,
        )
    }

    pub fn remove_group(&mut self, group: GroupId) -> bool {
        let before = self.shapes.len();
        self.shapes
            .retain(|shape| shape.source != ShapeSource::Outline { group });
        self.shapes.len() != before
    }

    pub fn set_group_opacity(&mut self, group: GroupId, opacity: f32) -> bool {
        let mut found = false;
        for shape in &mut self.shapes {
            if shape.source == (ShapeSource::Outline { group }) {
                shape.base_opacity = opacity.clamp(0.0, 1.0);
                found = true;
            }
        }
        found
    }

    /// Coarse two-level visibility for the given sequence.
    pub fn visibility(&self, sequence: SequenceId) -> f32 {
        if self.emphasised.contains(&sequence) {
            self.high
        } else {
            self.low
        }
    }

    pub fn update(&self, ctx: &FrameContext) -> Vec<ShapeFrame> {
        let visibility = self.visibility(ctx.sequence);
        self.shapes
            .iter()
            .map(|shape| ShapeFrame {
                id: shape.id,
                source: shape.source,
                outlines: shape.outlines.clone(),
                position: shape.position,
                rotation: shape.rotation_speed * ctx.elapsed,
                scale: 1.0
                    + shape.pulse_amplitude
                        * (ctx.elapsed * shape.pulse_frequency * TAU + shape.phase).sin(),
                color: shape.color,
                opacity: shape.base_opacity * visibility,
            })
            .collect()
    }
}

/// Vertices of a regular polygon in the xy plane, first vertex pointing up.
pub fn polygon_outline(sides: u32, radius: f32) -> Vec<Vec2> {
    (0..sides)
        .map(|i| {
            let angle = TAU * i as f32 / sides as f32 + std::f32::consts::FRAC_PI_2;
            Vec2::new(angle.cos(), angle.sin()) * radius
        })
        .collect()
}
