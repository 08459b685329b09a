//! Easing curves and frame-rate independent smoothing steps.
//!
//! Smoothing rates throughout the crate are expressed as "fraction of the
//! remaining distance covered per frame at 60 fps". [`approach`] and
//! [`decay`] rescale them to the actual frame delta so that recordings at
//! other frame rates look the same.

/// Frame rate the per-frame rates in the configuration are tuned for.
pub const REFERENCE_FPS: f32 = 60.0;

/// Hermite smoothstep on `t` clamped to `[0, 1]`.
#[inline]
pub fn smoothstep(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Quadratic fall-off: `1 - t²`. Starts flat and drops fastest at the end.
#[inline]
pub fn ease_out_quad(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    1.0 - t * t
}

#[inline]
pub fn ease_in_out_cubic(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
    }
}

#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Converts a per-frame rate into the blend factor for a frame of `dt` seconds.
#[inline]
pub fn frame_blend(rate: f32, dt: f32) -> f32 {
    let rate = rate.clamp(0.0, 1.0);
    if dt <= 0.0 {
        return 0.0;
    }
    1.0 - (1.0 - rate).powf(dt * REFERENCE_FPS)
}

/// Single-pole exponential step of `current` toward `target`.
///
/// The blend factor lies in `[0, 1]`, so the result always sits between
/// `current` and `target` and never overshoots.
#[inline]
pub fn approach(current: f32, target: f32, rate: f32, dt: f32) -> f32 {
    current + (target - current) * frame_blend(rate, dt)
}

/// Multiplicative decay by `factor` per reference frame.
#[inline]
pub fn decay(value: f32, factor: f32, dt: f32) -> f32 {
    if dt <= 0.0 {
        return value;
    }
    value * factor.clamp(0.0, 1.0).powf(dt * REFERENCE_FPS)
}
