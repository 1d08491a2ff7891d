//! Pulsing marker rings.
//!
//! A marker has a breathing base circle plus a fixed set of expanding waves,
//! each delayed by a constant stagger and repeating forever.

use bevy::color::Color;

use crate::animation::{AnimationError, require_positive};
use crate::core::coordinates::GeoPoint;

/// Default exponent of the wave fade curve.
pub const DEFAULT_FADE_EXPONENT: f32 = 1.5;

const INITIAL_SCALE: f32 = 0.1;
const MAX_SCALE: f32 = 1.5;

/// Scale and opacity of the base circle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PulseState {
    pub scale: f32,
    pub opacity: f32,
}

impl Default for PulseState {
    fn default() -> Self {
        Self {
            scale: 1.0,
            opacity: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaveState {
    pub index: usize,
    pub animation_offset_ms: f64,
    pub initial_opacity: f32,
    pub initial_scale: f32,
    pub max_scale: f32,
    pub scale: f32,
    pub opacity: f32,
    pub visible: bool,
}

#[derive(Debug, Clone)]
pub struct RingInstance {
    pub anchor: GeoPoint,
    pub wave_duration_ms: f64,
    pub fade_exponent: f32,
    start_time_s: Option<f64>,
    pub base: PulseState,
    pub waves: Vec<WaveState>,
    pub color: Color,
}

impl RingInstance {
    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    /// Time of the first update, once latched.
    pub fn start_time(&self) -> Option<f64> {
        self.start_time_s
    }
}

pub fn create_ring_instance(
    anchor: GeoPoint,
    wave_count: usize,
    wave_delay_ms: f64,
    wave_duration_ms: f64,
) -> Result<RingInstance, AnimationError> {
    anchor.validate()?;
    require_positive("wave_count", wave_count as f64)?;
    require_positive("wave_delay_ms", wave_delay_ms)?;
    require_positive("wave_duration_ms", wave_duration_ms)?;

    let waves = (0..wave_count)
        .map(|index| {
            let initial_opacity = (1.0 - 0.1 * index as f32).max(0.1);
            WaveState {
                index,
                animation_offset_ms: index as f64 * wave_delay_ms,
                initial_opacity,
                initial_scale: INITIAL_SCALE,
                max_scale: MAX_SCALE,
                scale: INITIAL_SCALE,
                opacity: initial_opacity,
                visible: false,
            }
        })
        .collect();

    Ok(RingInstance {
        anchor,
        wave_duration_ms,
        fade_exponent: DEFAULT_FADE_EXPONENT,
        start_time_s: None,
        base: PulseState::default(),
        waves,
        color: Color::WHITE,
    })
}

/// Cycle fraction of a wave `elapsed_s` after the ring started, or `None`
/// while the wave is still waiting for its turn.
pub fn wave_progress(elapsed_s: f64, offset_ms: f64, duration_ms: f64) -> Option<f64> {
    let wave_elapsed = elapsed_s - offset_ms / 1000.0;
    if wave_elapsed < 0.0 {
        return None;
    }
    let duration_s = duration_ms / 1000.0;
    let progress = wave_elapsed.rem_euclid(duration_s) / duration_s;
    (progress <= 1.0).then_some(progress)
}

/// Advance `ring` to `time_s` (seconds).
pub fn update_ring(ring: &mut RingInstance, time_s: f64) {
    let start = *ring.start_time_s.get_or_insert(time_s);
    let elapsed = (time_s - start).max(0.0);

    ring.base.scale = 1.0 + 0.15 * (elapsed * 4.0).sin() as f32;
    ring.base.opacity = 0.5 + 0.3 * (elapsed * 2.0).sin() as f32;

    for wave in &mut ring.waves {
        match wave_progress(elapsed, wave.animation_offset_ms, ring.wave_duration_ms) {
            Some(p) => {
                let p = p as f32;
                wave.scale = wave.initial_scale + p * wave.max_scale;
                wave.opacity = wave.initial_opacity * (1.0 - p.powf(ring.fade_exponent));
                wave.visible = true;
            }
            None => wave.visible = false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-4;

    fn ring() -> RingInstance {
        create_ring_instance(GeoPoint::from_degrees(31.23, 121.47).unwrap(), 3, 800.0, 2500.0)
            .unwrap()
    }

    #[test]
    fn test_offsets_strictly_increasing() {
        let ring = ring();
        assert_eq!(ring.waves.len(), 3);
        for pair in ring.waves.windows(2) {
            assert!(pair[1].animation_offset_ms > pair[0].animation_offset_ms);
            assert_eq!(pair[1].animation_offset_ms - pair[0].animation_offset_ms, 800.0);
        }
        assert_eq!(ring.waves[0].initial_opacity, 1.0);
        assert!((ring.waves[2].initial_opacity - 0.8).abs() < EPSILON);
    }

    #[test]
    fn test_start_time_latched_on_first_update() {
        let mut ring = ring();
        assert_eq!(ring.start_time(), None);
        update_ring(&mut ring, 12.5);
        assert_eq!(ring.start_time(), Some(12.5));
        update_ring(&mut ring, 13.0);
        assert_eq!(ring.start_time(), Some(12.5));
        assert!((ring.base.scale - (1.0 + 0.15 * 2.0f32.sin())).abs() < EPSILON);
    }

    #[test]
    fn test_delayed_waves_hidden() {
        let mut ring = ring();
        update_ring(&mut ring, 100.0);
        update_ring(&mut ring, 100.5);
        assert!(ring.waves[0].visible);
        assert!(!ring.waves[1].visible);
        assert!(!ring.waves[2].visible);
        update_ring(&mut ring, 101.7);
        assert!(ring.waves.iter().all(|w| w.visible));
    }

    #[test]
    fn test_opacity_at_cycle_start() {
        let mut ring = ring();
        update_ring(&mut ring, 0.0);
        let wave = ring.waves[0];
        assert!(wave.visible);
        assert_eq!(wave.opacity, wave.initial_opacity);
        assert_eq!(wave.scale, wave.initial_scale);
    }

    #[test]
    fn test_opacity_fades_toward_cycle_end() {
        let mut ring = ring();
        update_ring(&mut ring, 0.0);
        update_ring(&mut ring, 2.499);
        let wave = ring.waves[0];
        assert!(wave.opacity < 0.01);
        assert!((wave.scale - (INITIAL_SCALE + MAX_SCALE)).abs() < 0.01);
    }

    #[test]
    fn test_wave_periodic() {
        let mut a = ring();
        let mut b = ring();
        update_ring(&mut a, 0.0);
        update_ring(&mut b, 0.0);
        update_ring(&mut a, 3.3);
        update_ring(&mut b, 3.3 + 2.5);
        for (wa, wb) in a.waves.iter().zip(&b.waves) {
            assert!((wa.opacity - wb.opacity).abs() < EPSILON);
            assert!((wa.scale - wb.scale).abs() < EPSILON);
        }
    }

    #[test]
    fn test_creation_validation() {
        let anchor = GeoPoint::from_degrees(0.0, 0.0).unwrap();
        assert!(create_ring_instance(anchor, 0, 800.0, 2500.0).is_err());
        assert!(create_ring_instance(anchor, 3, 0.0, 2500.0).is_err());
        assert!(create_ring_instance(anchor, 3, 800.0, -1.0).is_err());
    }

    #[test]
    fn test_creation_rejects_out_of_range_anchor() {
        for anchor in [GeoPoint::unchecked(f32::NAN, 0.0), GeoPoint::unchecked(0.0, 500.0)] {
            assert!(matches!(
                create_ring_instance(anchor, 3, 800.0, 2500.0),
                Err(AnimationError::InvalidCoordinate(_))
            ));
        }
    }
}
