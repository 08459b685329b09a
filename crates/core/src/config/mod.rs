use std::path::Path;

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::{LoopscapeError, Result, SequenceId, SequenceInterval, SequenceTable, ShapeAsset};

/// Top-level configuration structure for the application.
///
/// Every section carries `#[serde(default)]` so a JSON file only needs to
/// mention the values it overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Length of one loop in seconds.
    pub loop_duration: f32,
    /// Seed for every random draw (node layout, lifetimes, birth rolls).
    pub seed: u64,
    pub sequences: Vec<SequenceInterval>,
    pub palette: Palette,
    pub particles: ParticleConfig,
    pub network: NetworkConfig,
    pub connections: ConnectionConfig,
    pub shapes: ShapeConfig,
    pub camera: CameraConfig,
    pub pulse: PulseConfig,
    pub overlay: OverlayConfig,
    /// Shape outline files requested at startup.
    pub assets: Vec<ShapeAsset>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            loop_duration: 25.0,
            seed: 0x5eed_100b,
            sequences: vec![
                SequenceInterval::new(1, 0.0, 4.0),
                SequenceInterval::new(2, 4.0, 10.0),
                SequenceInterval::new(3, 10.0, 20.0),
                SequenceInterval::new(4, 20.0, 25.0),
            ],
            palette: Palette::default(),
            particles: ParticleConfig::default(),
            network: NetworkConfig::default(),
            connections: ConnectionConfig::default(),
            shapes: ShapeConfig::default(),
            camera: CameraConfig::default(),
            pulse: PulseConfig::default(),
            overlay: OverlayConfig::default(),
            assets: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Reads a JSON configuration file and validates it.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        tracing::info!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Builds the validated sequence table for this configuration.
    pub fn sequence_table(&self) -> Result<SequenceTable> {
        SequenceTable::new(self.loop_duration, self.sequences.clone())
    }

    /// Checks every section. Called once at startup so that a malformed file
    /// fails fast instead of misbehaving frame by frame.
    pub fn validate(&self) -> Result<()> {
        let table = self.sequence_table()?;
        let known = |id: SequenceId, what: &str| -> Result<()> {
            if table.contains_id(id) {
                Ok(())
            } else {
                Err(LoopscapeError::config(format!(
                    "{what} references unknown sequence {id}"
                )))
            }
        };

        for &id in &self.network.active_sequences {
            known(id, "network.active_sequences")?;
        }
        for &id in &self.shapes.emphasised_sequences {
            known(id, "shapes.emphasised_sequences")?;
        }
        for key in &self.camera.depth_keys {
            known(key.sequence, "camera.depth_keys")?;
        }
        for caption in &self.overlay.captions {
            known(caption.sequence, "overlay.captions")?;
        }

        let c = &self.connections;
        check_range("connections.lifetime_range", c.lifetime_range)?;
        check_range("connections.cooldown_range", c.cooldown_range)?;
        check_unit("connections.birth_probability", c.birth_probability)?;
        check_unit("connections.max_opacity", c.max_opacity)?;
        check_rate("connections.rise_rate", c.rise_rate)?;
        check_rate("connections.fall_rate", c.fall_rate)?;
        check_rate("connections.fade_out_rate", c.fade_out_rate)?;
        check_positive("connections.distance_threshold", c.distance_threshold)?;
        check_positive("connections.fade_in", c.fade_in)?;
        check_positive("connections.fade_out", c.fade_out)?;

        let n = &self.network;
        check_range("network.drift_speed_range", n.drift_speed_range)?;
        check_positive("network.fade_in", n.fade_in)?;
        check_positive("network.fade_out", n.fade_out)?;
        check_positive("network.node_fade", n.node_fade)?;
        check_unit("network.node_opacity", n.node_opacity)?;

        check_unit("particles.base_opacity", self.particles.base_opacity)?;
        check_unit("shapes.high_visibility", self.shapes.high_visibility)?;
        check_unit("shapes.low_visibility", self.shapes.low_visibility)?;
        for (index, shape) in self.shapes.shapes.iter().enumerate() {
            if shape.sides < 3 {
                return Err(LoopscapeError::config(format!(
                    "shapes.shapes[{index}] needs at least 3 sides"
                )));
            }
            check_unit("shapes.shapes[].opacity", shape.opacity)?;
        }

        check_rate("camera.follow_rate", self.camera.follow_rate)?;
        if !(self.camera.near > 0.0 && self.camera.far > self.camera.near) {
            return Err(LoopscapeError::config(
                "camera clip planes must satisfy 0 < near < far",
            ));
        }

        if !(self.pulse.decay > 0.0 && self.pulse.decay < 1.0) {
            return Err(LoopscapeError::config("pulse.decay must lie in (0, 1)"));
        }

        Ok(())
    }
}

fn check_positive(name: &str, value: f32) -> Result<()> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(LoopscapeError::config(format!("{name} must be positive, got {value}")))
    }
}

fn check_unit(name: &str, value: f32) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(LoopscapeError::config(format!("{name} must lie in [0, 1], got {value}")))
    }
}

fn check_rate(name: &str, value: f32) -> Result<()> {
    if value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(LoopscapeError::config(format!("{name} must lie in (0, 1], got {value}")))
    }
}

fn check_range(name: &str, [lo, hi]: [f32; 2]) -> Result<()> {
    if lo > 0.0 && lo <= hi && hi.is_finite() {
        Ok(())
    } else {
        Err(LoopscapeError::config(format!(
            "{name} must satisfy 0 < min <= max, got [{lo}, {hi}]"
        )))
    }
}

/// Linear RGB colour, written as a `#rrggbb` string in configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb::new(1.0, 1.0, 1.0);

    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    pub fn from_hex(hex: &str) -> Result<Self> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        if digits.len() != 6 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(LoopscapeError::config(format!("invalid colour `{hex}`")));
        }
        let channel = |range: std::ops::Range<usize>| -> Result<f32> {
            u8::from_str_radix(&digits[range], 16)
                .map(|v| f32::from(v) / 255.0)
                .map_err(|_| LoopscapeError::config(format!("invalid colour `{hex}`")))
        };
        Ok(Self::new(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }

    pub fn to_hex(self) -> String {
        let byte = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        format!("#{:02x}{:02x}{:02x}", byte(self.r), byte(self.g), byte(self.b))
    }

    pub fn to_vec3(self) -> Vec3 {
        Vec3::new(self.r, self.g, self.b)
    }
}

impl TryFrom<String> for Rgb {
    type Error = LoopscapeError;

    fn try_from(value: String) -> Result<Self> {
        Self::from_hex(&value)
    }
}

impl From<Rgb> for String {
    fn from(value: Rgb) -> Self {
        value.to_hex()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Palette {
    pub particles: Rgb,
    pub nodes: Rgb,
    pub links: Rgb,
    pub shapes: Rgb,
    pub background: Rgb,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            particles: Rgb::new(0.31, 0.76, 0.97),
            nodes: Rgb::new(0.0, 0.9, 1.0),
            links: Rgb::new(0.49, 0.3, 1.0),
            shapes: Rgb::new(1.0, 0.25, 0.51),
            background: Rgb::new(0.02, 0.02, 0.06),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticleConfig {
    pub count: usize,
    /// Radius of the sphere the particles are scattered in.
    pub radius: f32,
    pub size: f32,
    /// Radians per second around the y axis.
    pub rotation_speed: f32,
    pub wave_amplitude: f32,
    pub wave_frequency: f32,
    pub wave_speed: f32,
    pub base_opacity: f32,
    /// Added to the opacity at full transition pulse.
    pub pulse_boost: f32,
}

impl Default for ParticleConfig {
    fn default() -> Self {
        Self {
            count: 1500,
            radius: 40.0,
            size: 0.15,
            rotation_speed: 0.02,
            wave_amplitude: 0.3,
            wave_frequency: 0.15,
            wave_speed: 0.5,
            base_opacity: 0.5,
            pulse_boost: 0.4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub node_count: usize,
    /// Half-extent of the cube node base positions are drawn from.
    pub spread: f32,
    pub drift_amplitude: f32,
    pub drift_speed_range: [f32; 2],
    /// Sequences during which the network layer is shown.
    pub active_sequences: Vec<SequenceId>,
    /// Adjacent active sequences share one envelope instead of dipping to zero.
    pub continuous: bool,
    pub fade_in: f32,
    pub fade_out: f32,
    /// Delay between consecutive nodes appearing.
    pub node_stagger: f32,
    pub node_fade: f32,
    pub node_opacity: f32,
    pub node_size: f32,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            node_count: 40,
            spread: 14.0,
            drift_amplitude: 0.4,
            drift_speed_range: [0.3, 0.8],
            active_sequences: vec![2, 3],
            continuous: true,
            fade_in: 1.5,
            fade_out: 1.0,
            node_stagger: 0.04,
            node_fade: 0.8,
            node_opacity: 0.9,
            node_size: 0.25,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub distance_threshold: f32,
    /// Chance per frame that an eligible unborn connection is born.
    pub birth_probability: f32,
    pub lifetime_range: [f32; 2],
    pub cooldown_range: [f32; 2],
    pub fade_in: f32,
    pub fade_out: f32,
    pub pulsation_speed: f32,
    pub pulsation_depth: f32,
    pub max_opacity: f32,
    /// Smoothing rate while opacity rises.
    pub rise_rate: f32,
    /// Smoothing rate while opacity falls during normal operation.
    pub fall_rate: f32,
    /// Smoothing rate while the whole network fades out.
    pub fade_out_rate: f32,
    /// Opacities below this snap to zero.
    pub epsilon: f32,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            distance_threshold: 5.0,
            birth_probability: 0.02,
            lifetime_range: [2.0, 5.0],
            cooldown_range: [0.5, 2.0],
            fade_in: 1.2,
            fade_out: 0.8,
            pulsation_speed: 2.0,
            pulsation_depth: 0.2,
            max_opacity: 0.6,
            rise_rate: 0.05,
            fall_rate: 0.08,
            fade_out_rate: 0.2,
            epsilon: 0.005,
        }
    }
}

/// One procedural polygon in the geometric shape layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShapeDef {
    pub sides: u32,
    pub radius: f32,
    pub position: Vec3,
    pub color: Option<Rgb>,
    pub opacity: f32,
    /// Radians per second around each axis.
    pub rotation_speed: Vec3,
    pub pulse_frequency: f32,
    pub pulse_amplitude: f32,
    pub phase: f32,
}

impl Default for ShapeDef {
    fn default() -> Self {
        Self {
            sides: 6,
            radius: 3.0,
            position: Vec3::ZERO,
            color: None,
            opacity: 0.3,
            rotation_speed: Vec3::new(0.0, 0.0, 0.1),
            pulse_frequency: 0.5,
            pulse_amplitude: 0.05,
            phase: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShapeConfig {
    pub shapes: Vec<ShapeDef>,
    /// Sequences during which shapes use `high_visibility`.
    pub emphasised_sequences: Vec<SequenceId>,
    pub high_visibility: f32,
    pub low_visibility: f32,
    /// Animation parameters applied to shape groups loaded from files.
    pub asset_motion: ShapeDef,
}

impl Default for ShapeConfig {
    fn default() -> Self {
        Self {
            shapes: vec![
                ShapeDef {
                    sides: 6,
                    radius: 4.0,
                    position: Vec3::new(-12.0, 6.0, -10.0),
                    ..ShapeDef::default()
                },
                ShapeDef {
                    sides: 3,
                    radius: 3.0,
                    position: Vec3::new(13.0, -5.0, -8.0),
                    rotation_speed: Vec3::new(0.05, 0.1, -0.15),
                    phase: 1.3,
                    ..ShapeDef::default()
                },
                ShapeDef {
                    sides: 4,
                    radius: 2.5,
                    position: Vec3::new(9.0, 9.0, -14.0),
                    rotation_speed: Vec3::new(0.1, 0.0, 0.2),
                    opacity: 0.2,
                    phase: 2.1,
                    ..ShapeDef::default()
                },
            ],
            emphasised_sequences: vec![1, 4],
            high_visibility: 1.0,
            low_visibility: 0.25,
            asset_motion: ShapeDef {
                rotation_speed: Vec3::new(0.0, 0.15, 0.0),
                pulse_amplitude: 0.03,
                ..ShapeDef::default()
            },
        }
    }
}

/// Camera depth target while a sequence plays: linear from `from` to `to`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DepthKey {
    pub sequence: SequenceId,
    pub from: f32,
    pub to: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
    pub orbit_amplitude: Vec2,
    pub orbit_speed: Vec2,
    /// Depth used while no key covers the current sequence.
    pub neutral_depth: f32,
    pub depth_keys: Vec<DepthKey>,
    pub follow_rate: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_degrees: 60.0,
            near: 0.1,
            far: 1000.0,
            orbit_amplitude: Vec2::new(3.0, 2.0),
            orbit_speed: Vec2::new(0.1, 0.15),
            neutral_depth: 30.0,
            depth_keys: vec![
                DepthKey { sequence: 1, from: 34.0, to: 28.0 },
                DepthKey { sequence: 2, from: 28.0, to: 36.0 },
                DepthKey { sequence: 3, from: 30.0, to: 30.0 },
                DepthKey { sequence: 4, from: 30.0, to: 22.0 },
            ],
            follow_rate: 0.03,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PulseConfig {
    /// Multiplicative decay applied per 60 fps frame.
    pub decay: f32,
    /// Intensities below this snap to zero.
    pub threshold: f32,
}

impl Default for PulseConfig {
    fn default() -> Self {
        Self {
            decay: 0.95,
            threshold: 0.001,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Caption {
    pub sequence: SequenceId,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    pub captions: Vec<Caption>,
    /// Seconds before an entering caption is marked visible.
    pub enter_delay: f32,
    /// Seconds before an exiting caption is cleared.
    pub exit_delay: f32,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        let caption = |sequence, text: &str| Caption {
            sequence,
            text: text.to_string(),
        };
        Self {
            captions: vec![
                caption(1, "Signal"),
                caption(2, "Connect"),
                caption(3, "Grow"),
                caption(4, "Resolve"),
            ],
            enter_delay: 0.3,
            exit_delay: 0.8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        AppConfig::default().validate().unwrap();
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{ "loop_duration": 25.0, "network": { "node_count": 7 } }"#)
                .unwrap();
        assert_eq!(config.network.node_count, 7);
        assert_eq!(config.network.active_sequences, vec![2, 3]);
        assert_eq!(config.sequences.len(), 4);
        config.validate().unwrap();
    }

    #[test]
    fn rejects_unknown_sequence_references() {
        let mut config = AppConfig::default();
        config.network.active_sequences = vec![9];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("unknown sequence 9"));
    }

    #[test]
    fn rejects_gapped_sequence_tables() {
        let mut config = AppConfig::default();
        config.sequences[1].start = 5.0;
        assert!(matches!(
            config.validate(),
            Err(LoopscapeError::Config(_))
        ));
    }

    #[test]
    fn rejects_inverted_ranges() {
        let mut config = AppConfig::default();
        config.connections.lifetime_range = [5.0, 2.0];
        assert!(config.validate().is_err());
    }

    #[test]
    fn parses_hex_colours() {
        let colour = Rgb::from_hex("#ff8000").unwrap();
        assert_eq!(colour.r, 1.0);
        assert!((colour.g - 128.0 / 255.0).abs() < 1e-6);
        assert_eq!(colour.b, 0.0);
        assert_eq!(colour.to_hex(), "#ff8000");
        assert!(Rgb::from_hex("#ff80").is_err());
        assert!(Rgb::from_hex("zzzzzz").is_err());
        assert!(Rgb::from_hex("#+f+f+f").is_err());
        assert!(Rgb::from_hex("-1-1-1").is_err());
    }

    #[test]
    fn palette_round_trips_through_json() {
        let json = serde_json::to_string(&Palette::default()).unwrap();
        assert!(json.contains('#'));
        let back: Palette = serde_json::from_str(&json).unwrap();
        assert_eq!(back.background.to_hex(), Palette::default().background.to_hex());
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("loop.json");
        std::fs::write(&path, r##"{ "seed": 7, "palette": { "nodes": "#102030" } }"##).unwrap();

        let config = AppConfig::from_path(&path).unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.palette.nodes.to_hex(), "#102030");
    }

    #[test]
    fn reports_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("loop.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            AppConfig::from_path(&path),
            Err(LoopscapeError::Json(_))
        ));
    }
}
