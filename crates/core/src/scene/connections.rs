//! Lifecycle of the links drawn between network nodes.
//!
//! Every unordered node pair owns one [`Connection`] record for the lifetime
//! of the process. Records cycle `Unborn -> Alive -> CoolingDown -> Unborn`;
//! only their dynamic fields change.

use std::f32::consts::TAU;

use glam::Vec3;
use rand::Rng;

use crate::{easing, ConnectionConfig};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LifecycleState {
    /// Eligible for birth once the layer is visible and the nodes are close.
    Unborn,
    Alive { birth_time: f32, lifetime: f32 },
    CoolingDown { remaining: f32 },
}

/// What the owning network layer tells the engine every frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerSignal {
    /// Global opacity of the network layer.
    pub opacity: f32,
    /// The layer envelope is descending because its active span ended.
    pub fading_out: bool,
}

impl LayerSignal {
    pub const HIDDEN: LayerSignal = LayerSignal {
        opacity: 0.0,
        fading_out: false,
    };
}

#[derive(Debug, Clone)]
pub struct Connection {
    a: usize,
    b: usize,
    phase: f32,
    state: LifecycleState,
    current_opacity: f32,
    target_opacity: f32,
}

impl Connection {
    pub fn nodes(&self) -> (usize, usize) {
        (self.a, self.b)
    }

    pub fn phase(&self) -> f32 {
        self.phase
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn current_opacity(&self) -> f32 {
        self.current_opacity
    }

    pub fn target_opacity(&self) -> f32 {
        self.target_opacity
    }

    pub fn birth_time(&self) -> Option<f32> {
        match self.state {
            LifecycleState::Alive { birth_time, .. } => Some(birth_time),
            _ => None,
        }
    }

    pub fn cooldown_remaining(&self) -> f32 {
        match self.state {
            LifecycleState::CoolingDown { remaining } => remaining,
            _ => 0.0,
        }
    }

    pub fn is_visible(&self) -> bool {
        self.current_opacity > 0.0
    }
}

/// Envelope of a living connection at `age` seconds.
///
/// Smoothstep in over `fade_in`, plateau at one, then a quadratic fall over
/// the last `fade_out` seconds of `lifetime`. Zero outside `[0, lifetime)`.
pub fn life_factor(age: f32, lifetime: f32, fade_in: f32, fade_out: f32) -> f32 {
    if !(0.0..lifetime).contains(&age) {
        return 0.0;
    }
    let rising = easing::smoothstep(age / fade_in);
    let fade_out_start = lifetime - fade_out;
    let falling = if age > fade_out_start {
        easing::ease_out_quad((age - fade_out_start) / fade_out)
    } else {
        1.0
    };
    rising.min(falling)
}

/// Owns every connection record and advances them once per frame.
#[derive(Debug, Clone)]
pub struct ConnectionEngine {
    config: ConnectionConfig,
    connections: Vec<Connection>,
}

impl ConnectionEngine {
    /// Creates one record per unordered pair of `node_count` nodes.
    pub fn new<R: Rng + ?Sized>(node_count: usize, config: &ConnectionConfig, rng: &mut R) -> Self {
        let pairs = node_count * node_count.saturating_sub(1) / 2;
        let mut connections = Vec::with_capacity(pairs);
        for a in 0..node_count {
            for b in (a + 1)..node_count {
                connections.push(Connection {
                    a,
                    b,
                    phase: rng.random::<f32>() * TAU,
                    state: LifecycleState::Unborn,
                    current_opacity: 0.0,
                    target_opacity: 0.0,
                });
            }
        }
        Self {
            config: config.clone(),
            connections,
        }
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn visible(&self) -> impl Iterator<Item = &Connection> {
        self.connections.iter().filter(|c| c.is_visible())
    }

    /// Advances every record by one frame.
    ///
    /// `positions` are the current node positions indexed by node index.
    pub fn update<R: Rng + ?Sized>(
        &mut self,
        positions: &[Vec3],
        layer: LayerSignal,
        now: f32,
        dt: f32,
        rng: &mut R,
    ) {
        let config = &self.config;
        for connection in &mut self.connections {
            let distance = match (positions.get(connection.a), positions.get(connection.b)) {
                (Some(a), Some(b)) => a.distance(*b),
                _ => f32::INFINITY,
            };

            if layer.fading_out {
                connection.state = LifecycleState::Unborn;
                connection.target_opacity = 0.0;
            } else {
                step_lifecycle(connection, config, layer, distance, now, dt, rng);
            }

            let rate = if layer.fading_out {
                config.fade_out_rate
            } else if connection.target_opacity > connection.current_opacity {
                config.rise_rate
            } else {
                config.fall_rate
            };
            let next = easing::approach(
                connection.current_opacity,
                connection.target_opacity,
                rate,
                dt,
            );
            connection.current_opacity =
                if next < config.epsilon && connection.target_opacity <= next {
                    0.0
                } else {
                    next
                };
        }
    }
}

fn step_lifecycle<R: Rng + ?Sized>(
    connection: &mut Connection,
    config: &ConnectionConfig,
    layer: LayerSignal,
    distance: f32,
    now: f32,
    dt: f32,
    rng: &mut R,
) {
    match connection.state {
        LifecycleState::Unborn => {
            connection.target_opacity = 0.0;
            let eligible = layer.opacity > 0.0 && distance < config.distance_threshold;
            if eligible && rng.random::<f32>() < config.birth_probability {
                connection.state = LifecycleState::Alive {
                    birth_time: now,
                    lifetime: draw(config.lifetime_range, rng),
                };
            }
        }
        LifecycleState::Alive {
            birth_time,
            lifetime,
        } => {
            let age = now - birth_time;
            if age >= lifetime {
                connection.state = LifecycleState::CoolingDown {
                    remaining: draw(config.cooldown_range, rng),
                };
                connection.target_opacity = 0.0;
                return;
            }
            // Links that drift out of range stay alive but dim to nothing.
            let closeness = (1.0 - distance / config.distance_threshold).max(0.0);
            let wave = 0.5 + 0.5 * (now * config.pulsation_speed + connection.phase).sin();
            let pulsation = 1.0 - config.pulsation_depth * (1.0 - wave);
            connection.target_opacity = life_factor(age, lifetime, config.fade_in, config.fade_out)
                * closeness
                * pulsation
                * layer.opacity
                * config.max_opacity;
        }
        LifecycleState::CoolingDown { remaining } => {
            connection.target_opacity = 0.0;
            let remaining = remaining - dt;
            connection.state = if remaining <= 0.0 {
                LifecycleState::Unborn
            } else {
                LifecycleState::CoolingDown { remaining }
            };
        }
    }
}

fn draw<R: Rng + ?Sized>([lo, hi]: [f32; 2], rng: &mut R) -> f32 {
    lo + (hi - lo) * rng.random::<f32>()
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use rand::{rngs::StdRng, RngCore, SeedableRng};

    use super::*;

    const DT: f32 = 1.0 / 60.0;

    /// Returns the same word forever: `0` makes every roll succeed and every
    /// range draw its minimum, `u32::MAX` makes every roll fail.
    struct FixedRng(u32);

    impl RngCore for FixedRng {
        fn next_u32(&mut self) -> u32 {
            self.0
        }

        fn next_u64(&mut self) -> u64 {
            u64::from(self.0) << 32 | u64::from(self.0)
        }

        fn fill_bytes(&mut self, dst: &mut [u8]) {
            dst.fill(self.0 as u8);
        }
    }

    const ALWAYS: u32 = 0;
    const NEVER: u32 = u32::MAX;

    fn config() -> ConnectionConfig {
        ConnectionConfig {
            lifetime_range: [2.0, 2.0],
            cooldown_range: [1.0, 1.0],
            ..ConnectionConfig::default()
        }
    }

    fn visible() -> LayerSignal {
        LayerSignal {
            opacity: 1.0,
            fading_out: false,
        }
    }

    fn close_pair() -> Vec<Vec3> {
        vec![Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0)]
    }

    fn far_pair() -> Vec<Vec3> {
        vec![Vec3::ZERO, Vec3::new(50.0, 0.0, 0.0)]
    }

    #[test]
    fn creates_one_record_per_unordered_pair() {
        let mut rng = FixedRng(ALWAYS);
        assert_eq!(ConnectionEngine::new(0, &config(), &mut rng).len(), 0);
        assert_eq!(ConnectionEngine::new(1, &config(), &mut rng).len(), 0);
        let engine = ConnectionEngine::new(5, &config(), &mut rng);
        assert_eq!(engine.len(), 10);
        assert!(engine.connections().iter().all(|c| c.nodes().0 < c.nodes().1));
    }

    #[test]
    fn life_factor_follows_envelope() {
        assert_relative_eq!(life_factor(0.6, 2.0, 1.2, 0.8), 0.5, epsilon = 1e-6);
        assert_relative_eq!(life_factor(1.2, 2.0, 1.2, 0.8), 1.0, epsilon = 1e-6);
        let progress: f32 = (1.9 - 1.2) / 0.8;
        assert_relative_eq!(
            life_factor(1.9, 2.0, 1.2, 0.8),
            1.0 - progress * progress,
            epsilon = 1e-6
        );
        assert_eq!(life_factor(2.0, 2.0, 1.2, 0.8), 0.0);
        assert_eq!(life_factor(-0.1, 2.0, 1.2, 0.8), 0.0);
    }

    #[test]
    fn birth_requires_roll_distance_and_visible_layer() {
        let mut engine = ConnectionEngine::new(2, &config(), &mut FixedRng(ALWAYS));

        engine.update(&close_pair(), visible(), 0.0, DT, &mut FixedRng(NEVER));
        assert_eq!(engine.connections()[0].state(), LifecycleState::Unborn);

        engine.update(&far_pair(), visible(), 0.0, DT, &mut FixedRng(ALWAYS));
        assert_eq!(engine.connections()[0].state(), LifecycleState::Unborn);

        engine.update(&close_pair(), LayerSignal::HIDDEN, 0.0, DT, &mut FixedRng(ALWAYS));
        assert_eq!(engine.connections()[0].state(), LifecycleState::Unborn);

        engine.update(&close_pair(), visible(), 3.0, DT, &mut FixedRng(ALWAYS));
        assert_eq!(
            engine.connections()[0].state(),
            LifecycleState::Alive {
                birth_time: 3.0,
                lifetime: 2.0
            }
        );
        assert_eq!(engine.connections()[0].birth_time(), Some(3.0));
    }

    #[test]
    fn alive_link_is_not_killed_by_distance() {
        let mut engine = ConnectionEngine::new(2, &config(), &mut FixedRng(ALWAYS));
        engine.update(&close_pair(), visible(), 0.0, DT, &mut FixedRng(ALWAYS));

        engine.update(&far_pair(), visible(), 1.0, DT, &mut FixedRng(ALWAYS));
        let link = &engine.connections()[0];
        assert!(matches!(link.state(), LifecycleState::Alive { .. }));
        assert_eq!(link.target_opacity(), 0.0);

        engine.update(&close_pair(), visible(), 1.1, DT, &mut FixedRng(NEVER));
        assert!(engine.connections()[0].target_opacity() > 0.0);
    }

    #[test]
    fn expiry_cools_down_then_becomes_eligible_again() {
        let mut engine = ConnectionEngine::new(2, &config(), &mut FixedRng(ALWAYS));
        engine.update(&close_pair(), visible(), 0.0, DT, &mut FixedRng(ALWAYS));

        engine.update(&close_pair(), visible(), 2.0, DT, &mut FixedRng(ALWAYS));
        let link = &engine.connections()[0];
        assert_eq!(link.state(), LifecycleState::CoolingDown { remaining: 1.0 });
        assert_eq!(link.target_opacity(), 0.0);

        let mut now = 2.0;
        while matches!(engine.connections()[0].state(), LifecycleState::CoolingDown { .. }) {
            now += 0.1;
            engine.update(&close_pair(), visible(), now, 0.1, &mut FixedRng(NEVER));
            assert_eq!(engine.connections()[0].target_opacity(), 0.0);
            assert!(now < 3.5, "cooldown never finished");
        }
        assert_eq!(engine.connections()[0].state(), LifecycleState::Unborn);
        assert_eq!(engine.connections()[0].cooldown_remaining(), 0.0);
    }

    #[test]
    fn global_fade_out_resets_every_link_in_one_update() {
        let mut rng = StdRng::seed_from_u64(11);
        let positions: Vec<Vec3> = (0..8).map(|i| Vec3::new(i as f32 * 0.5, 0.0, 0.0)).collect();
        let mut engine = ConnectionEngine::new(positions.len(), &config(), &mut rng);
        for frame in 0..120 {
            engine.update(&positions, visible(), frame as f32 * DT, DT, &mut FixedRng(ALWAYS));
        }
        assert!(engine.visible().count() > 0);

        let fading = LayerSignal {
            opacity: 0.8,
            fading_out: true,
        };
        engine.update(&positions, fading, 2.1, DT, &mut rng);
        for link in engine.connections() {
            assert_eq!(link.state(), LifecycleState::Unborn);
            assert_eq!(link.target_opacity(), 0.0);
            assert_eq!(link.cooldown_remaining(), 0.0);
        }
    }

    #[test]
    fn dormant_links_never_carry_a_target() {
        let mut rng = StdRng::seed_from_u64(42);
        let positions: Vec<Vec3> = (0..12)
            .map(|i| Vec3::new((i % 4) as f32 * 1.5, (i / 4) as f32 * 1.5, 0.0))
            .collect();
        let mut engine = ConnectionEngine::new(positions.len(), &ConnectionConfig::default(), &mut rng);

        for frame in 0..1_200 {
            let now = frame as f32 * DT;
            engine.update(&positions, visible(), now, DT, &mut rng);
            for link in engine.connections() {
                if !matches!(link.state(), LifecycleState::Alive { .. }) {
                    assert_eq!(link.target_opacity(), 0.0);
                }
                assert!((0.0..=1.0).contains(&link.current_opacity()));
            }
        }
    }

    #[test]
    fn current_opacity_approaches_a_held_target_without_overshoot() {
        let mut engine = ConnectionEngine::new(2, &config(), &mut FixedRng(ALWAYS));
        engine.update(&close_pair(), visible(), 0.0, DT, &mut FixedRng(ALWAYS));

        // A constant `now` freezes both the envelope and the pulsation.
        let now = 1.5;
        let mut last = engine.connections()[0].current_opacity();
        for _ in 0..600 {
            engine.update(&close_pair(), visible(), now, DT, &mut FixedRng(NEVER));
            let link = &engine.connections()[0];
            assert!(link.current_opacity() >= last);
            assert!(link.current_opacity() <= link.target_opacity() + 1e-6);
            last = link.current_opacity();
        }
        let target = engine.connections()[0].target_opacity();
        assert_relative_eq!(last, target, epsilon = 1e-3);
    }

    #[test]
    fn faint_fading_links_snap_to_zero() {
        let mut engine = ConnectionEngine::new(2, &config(), &mut FixedRng(ALWAYS));
        engine.connections[0].current_opacity = 0.004;
        engine.update(&far_pair(), visible(), 0.0, DT, &mut FixedRng(NEVER));
        assert_eq!(engine.connections()[0].current_opacity(), 0.0);
        assert!(!engine.connections()[0].is_visible());
    }
}
