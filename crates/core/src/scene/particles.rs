use std::f32::consts::TAU;

use glam::{Quat, Vec3};
use rand::Rng;
use serde::Serialize;

use super::FrameContext;
use crate::{ParticleConfig, Rgb};

/// Global parameters of the particle cloud for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ParticleFrame {
    pub count: usize,
    /// Euler angles (radians) applied to the whole cloud.
    pub rotation: Vec3,
    /// Time uniform driving the per-vertex wave.
    pub wave_time: f32,
    pub size: f32,
    pub opacity: f32,
    pub color: Vec3,
}

/// Background particle cloud. Positions are scattered once; everything that
/// moves is derived from elapsed time.
#[derive(Debug, Clone)]
pub struct ParticleField {
    config: ParticleConfig,
    color: Rgb,
    positions: Vec<Vec3>,
}

impl ParticleField {
    pub fn new<R: Rng + ?Sized>(config: &ParticleConfig, color: Rgb, rng: &mut R) -> Self {
        let positions = (0..config.count)
            .map(|_| point_in_sphere(config.radius, rng))
            .collect();
        Self {
            config: config.clone(),
            color,
            positions,
        }
    }

    pub fn base_positions(&self) -> &[Vec3] {
        &self.positions
    }

    pub fn update(&self, ctx: &FrameContext) -> ParticleFrame {
        let spin = ctx.elapsed * self.config.rotation_speed;
        ParticleFrame {
            count: self.positions.len(),
            rotation: Vec3::new(spin * 0.5, spin, 0.0),
            wave_time: ctx.elapsed,
            size: self.config.size,
            opacity: (self.config.base_opacity + ctx.pulse * self.config.pulse_boost).min(1.0),
            color: self.color.to_vec3(),
        }
    }

    /// Per-vertex wave offset for a particle at `base`.
    pub fn wave_offset(&self, base: Vec3, wave_time: f32) -> Vec3 {
        let c = &self.config;
        let y = (wave_time * c.wave_speed + base.x * c.wave_frequency).sin() * c.wave_amplitude;
        let x = (wave_time * c.wave_speed * 0.7 + base.z * c.wave_frequency).cos()
            * c.wave_amplitude
            * 0.5;
        Vec3::new(x, y, 0.0)
    }

    /// World positions for `frame`: wave displacement, then the cloud rotation.
    pub fn positions(&self, frame: &ParticleFrame) -> impl Iterator<Item = Vec3> + '_ {
        let rotation = Quat::from_euler(
            glam::EulerRot::XYZ,
            frame.rotation.x,
            frame.rotation.y,
            frame.rotation.z,
        );
        let wave_time = frame.wave_time;
        self.positions
            .iter()
            .map(move |&base| rotation * (base + self.wave_offset(base, wave_time)))
    }
}

fn point_in_sphere<R: Rng + ?Sized>(radius: f32, rng: &mut R) -> Vec3 {
    let z: f32 = rng.random::<f32>() * 2.0 - 1.0;
    let theta = rng.random::<f32>() * TAU;
    let r = radius * rng.random::<f32>().cbrt();
    let ring = (1.0 - z * z).max(0.0).sqrt();
    Vec3::new(ring * theta.cos(), ring * theta.sin(), z) * r
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    fn ctx(elapsed: f32, pulse: f32) -> FrameContext {
        FrameContext {
            elapsed,
            loop_time: elapsed,
            dt: 1.0 / 60.0,
            sequence: 1,
            pulse,
        }
    }

    fn field() -> ParticleField {
        let mut rng = StdRng::seed_from_u64(3);
        ParticleField::new(&ParticleConfig::default(), Rgb::WHITE, &mut rng)
    }

    #[test]
    fn scatters_inside_the_configured_sphere() {
        let field = field();
        let radius = ParticleConfig::default().radius;
        assert_eq!(field.base_positions().len(), ParticleConfig::default().count);
        assert!(field
            .base_positions()
            .iter()
            .all(|p| p.length() <= radius + 1e-3));
    }

    #[test]
    fn rotation_grows_with_elapsed_time() {
        let field = field();
        let early = field.update(&ctx(1.0, 0.0));
        let late = field.update(&ctx(2.0, 0.0));
        assert!((late.rotation.y - 2.0 * early.rotation.y).abs() < 1e-6);
    }

    #[test]
    fn pulse_boosts_opacity_additively() {
        let field = field();
        let config = ParticleConfig::default();
        let calm = field.update(&ctx(1.0, 0.0));
        let boosted = field.update(&ctx(1.0, 0.5));
        assert_eq!(calm.opacity, config.base_opacity);
        assert!((boosted.opacity - (config.base_opacity + 0.5 * config.pulse_boost)).abs() < 1e-6);
        assert!(field.update(&ctx(1.0, 1.0)).opacity <= 1.0);
    }

    #[test]
    fn wave_is_bounded_by_amplitude() {
        let field = field();
        let amplitude = ParticleConfig::default().wave_amplitude;
        for t in [0.0, 0.7, 3.3, 12.0] {
            let offset = field.wave_offset(Vec3::new(4.0, 0.0, -2.0), t);
            assert!(offset.y.abs() <= amplitude + 1e-6);
        }
        let frame = field.update(&ctx(5.0, 0.0));
        assert_eq!(field.positions(&frame).count(), frame.count);
    }
}
