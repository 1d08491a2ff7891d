//! Flying-line animation along a sampled arc.
//!
//! Each arc owns two fixed-size vertex buffers sized for the longest possible
//! trail. Every update rewrites the visible window into them; the renderer is
//! told whether the vertex count changed (`Rebuild`) or only the contents did
//! (`Refresh`).

use bevy::color::Color;
use bevy::math::Vec3;
use std::f32::consts::PI;

use crate::animation::{AnimationError, GlobeGeometry, require_finite, require_non_negative, require_positive};
use crate::core::coordinates::GeoPoint;
use crate::core::curve::{CurveSpec, build_curve};
use crate::core::path::{PathSample, sample};

/// What the renderer has to do with an arc's line mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferUpdate {
    /// Vertex count changed; re-declare the mesh attributes.
    Rebuild { count: usize },
    /// Same vertex count; overwrite in place.
    Refresh { count: usize },
}

impl BufferUpdate {
    pub fn count(&self) -> usize {
        match *self {
            BufferUpdate::Rebuild { count } | BufferUpdate::Refresh { count } => count,
        }
    }

    pub fn is_rebuild(&self) -> bool {
        matches!(self, BufferUpdate::Rebuild { .. })
    }
}

/// Sample range `[start, end]` shown as the flying line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArcWindow {
    pub start: usize,
    pub end: usize,
}

impl ArcWindow {
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Vertices written for this window.
    pub fn vertex_count(&self) -> usize {
        if self.is_empty() { 0 } else { self.end - self.start + 1 }
    }

    pub fn segment_count(&self) -> usize {
        self.end.saturating_sub(self.start)
    }
}

/// Small glowing dot riding the arc.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TravelParticle {
    pub position: Vec3,
    pub scale: f32,
    pub opacity: f32,
    pub visible: bool,
}

impl Default for TravelParticle {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            scale: 1.0,
            opacity: 0.0,
            visible: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ArcInstance {
    samples: PathSample,
    curve: CurveSpec,
    pub phase_offset_ms: f64,
    pub cycle_duration_ms: f64,
    trail_length: usize,
    position_buffer: Box<[[f32; 3]]>,
    color_buffer: Box<[[f32; 3]]>,
    written_count: usize,
    last_written_count: usize,
    pending: Option<BufferUpdate>,
    progress: f64,
    pub color: Color,
    pub particle: Option<TravelParticle>,
}

/// Build an arc between two surface points.
///
/// `trail_length` is the number of segments of the flying line.
pub fn create_arc_instance(
    geometry: &GlobeGeometry,
    start: GeoPoint,
    end: GeoPoint,
    altitude_factor: f32,
    cycle_duration_ms: f64,
    phase_offset_ms: f64,
    trail_length: usize,
) -> Result<ArcInstance, AnimationError> {
    geometry.validate()?;
    start.validate()?;
    end.validate()?;
    require_non_negative("altitude_factor", altitude_factor as f64)?;
    require_positive("cycle_duration_ms", cycle_duration_ms)?;
    require_finite("phase_offset_ms", phase_offset_ms)?;
    require_positive("trail_length", trail_length as f64)?;

    let curve = build_curve(
        start.project(geometry.radius),
        end.project(geometry.radius),
        altitude_factor,
        geometry.angle_threshold,
    );
    let samples = sample(&curve, geometry.arc_resolution);

    Ok(ArcInstance {
        samples,
        curve,
        phase_offset_ms,
        cycle_duration_ms,
        trail_length,
        position_buffer: vec![[0.0; 3]; trail_length + 1].into_boxed_slice(),
        color_buffer: vec![[0.0; 3]; trail_length + 1].into_boxed_slice(),
        written_count: 0,
        last_written_count: 0,
        pending: None,
        progress: 0.0,
        color: Color::WHITE,
        particle: None,
    })
}

impl ArcInstance {
    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    /// Enable the travel particle.
    pub fn with_particle(mut self) -> Self {
        self.particle = Some(TravelParticle::default());
        self
    }

    pub fn samples(&self) -> &PathSample {
        &self.samples
    }

    pub fn curve(&self) -> &CurveSpec {
        &self.curve
    }

    pub fn trail_length(&self) -> usize {
        self.trail_length
    }

    /// Fixed vertex capacity of both buffers.
    pub fn capacity(&self) -> usize {
        self.position_buffer.len()
    }

    /// Positions written by the last update.
    pub fn positions(&self) -> &[[f32; 3]] {
        &self.position_buffer[..self.written_count]
    }

    /// Grayscale brightness ramp matching [`positions`](Self::positions).
    pub fn colors(&self) -> &[[f32; 3]] {
        &self.color_buffer[..self.written_count]
    }

    pub fn written_count(&self) -> usize {
        self.written_count
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    /// Buffer change not yet consumed by the renderer.
    ///
    /// A rebuild is never downgraded by a later refresh.
    pub fn take_pending_update(&mut self) -> Option<BufferUpdate> {
        self.pending.take()
    }
}

/// Fraction of the cycle reached at `time_s`.
pub fn cycle_progress(time_s: f64, phase_offset_ms: f64, cycle_duration_ms: f64) -> f64 {
    (time_s * 1000.0 + phase_offset_ms).rem_euclid(cycle_duration_ms) / cycle_duration_ms
}

/// Visible window for `progress` over `total` samples.
pub fn arc_window(progress: f64, total: usize, trail_length: usize) -> ArcWindow {
    if total == 0 {
        return ArcWindow { start: 0, end: 0 };
    }
    let end = ((progress * total as f64).floor().max(0.0) as usize).min(total - 1);
    ArcWindow {
        start: end.saturating_sub(trail_length),
        end,
    }
}

/// Advance `arc` to `time_s` (seconds) and rewrite its buffers.
pub fn update_arc(arc: &mut ArcInstance, time_s: f64) -> BufferUpdate {
    let progress = cycle_progress(time_s, arc.phase_offset_ms, arc.cycle_duration_ms);
    arc.progress = progress;

    let window = arc_window(progress, arc.samples.len(), arc.trail_length);
    let count = window.vertex_count();

    if count > 0 {
        let points = &arc.samples.points()[window.start..=window.end];
        let denom = (count - 1).max(1) as f32;
        for (i, point) in points.iter().enumerate() {
            arc.position_buffer[i] = point.to_array();
            arc.color_buffer[i] = [i as f32 / denom; 3];
        }
    }
    arc.written_count = count;

    let update = if count != arc.last_written_count {
        BufferUpdate::Rebuild { count }
    } else {
        BufferUpdate::Refresh { count }
    };
    arc.last_written_count = count;

    arc.pending = Some(match (arc.pending, update) {
        (Some(BufferUpdate::Rebuild { .. }), BufferUpdate::Refresh { count }) => {
            BufferUpdate::Rebuild { count }
        }
        _ => update,
    });

    if let Some(particle) = arc.particle.as_mut() {
        update_particle(particle, arc.samples.points(), progress, time_s);
    }

    update
}

fn update_particle(particle: &mut TravelParticle, points: &[Vec3], progress: f64, time_s: f64) {
    let n = points.len();
    if n < 2 {
        particle.visible = false;
        return;
    }

    let scaled = progress * (n - 1) as f64;
    let index = scaled.floor() as usize;
    if index >= n - 1 {
        particle.visible = false;
        return;
    }

    let local = (scaled - index as f64) as f32;
    particle.position = points[index].lerp(points[index + 1], local);
    particle.scale = 1.0 + 0.5 * ((time_s * 30.0).sin() as f32);
    particle.opacity = (progress as f32 * PI).sin();
    particle.visible = true;
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-4;

    fn geo(lat: f32, lng: f32) -> GeoPoint {
        GeoPoint::from_degrees(lat, lng).unwrap()
    }

    fn shanghai_tokyo() -> ArcInstance {
        create_arc_instance(
            &GlobeGeometry::default(),
            geo(31.23, 121.47),
            geo(35.68, 139.65),
            0.1,
            2000.0,
            0.0,
            20,
        )
        .unwrap()
    }

    #[test]
    fn test_shanghai_tokyo_midpoint() {
        let arc = shanghai_tokyo();
        let CurveSpec::Quadratic {
            start,
            control,
            end,
        } = *arc.curve()
        else {
            panic!("expected quadratic curve");
        };
        let mid = arc.samples().points()[50];
        assert_eq!(mid, arc.curve().point_at(0.5));
        assert!((mid - (start * 0.25 + control * 0.5 + end * 0.25)).length() < EPSILON);

        let again = shanghai_tokyo();
        assert_eq!(
            again.samples().points()[50].to_array().map(f32::to_bits),
            mid.to_array().map(f32::to_bits)
        );
    }

    #[test]
    fn test_window_monotonic_and_bounded() {
        let total = 101;
        let trail = 20;
        let mut previous_end = 0;
        for k in 0..1000 {
            let progress = k as f64 / 1000.0;
            let window = arc_window(progress, total, trail);
            assert!(window.end >= previous_end, "end went backwards at {}", progress);
            assert!(window.segment_count() <= trail);
            assert!(window.vertex_count() <= trail + 1);
            assert!(window.end < total);
            previous_end = window.end;
        }
    }

    #[test]
    fn test_empty_window_at_cycle_start() {
        let mut arc = shanghai_tokyo();
        let update = update_arc(&mut arc, 0.0);
        assert_eq!(update, BufferUpdate::Refresh { count: 0 });
        assert!(arc.positions().is_empty());
    }

    #[test]
    fn test_rebuild_only_on_count_change() {
        let mut arc = shanghai_tokyo();

        // progress 0.05 -> end 5, growing trail
        assert_eq!(update_arc(&mut arc, 0.1), BufferUpdate::Rebuild { count: 6 });
        // progress 0.5 -> end 50, start 30
        assert_eq!(update_arc(&mut arc, 1.0), BufferUpdate::Rebuild { count: 21 });
        // progress 0.51 -> end 51, start 31
        assert_eq!(update_arc(&mut arc, 1.02), BufferUpdate::Refresh { count: 21 });

        let expected = arc.samples().points()[31].to_array();
        assert_eq!(arc.positions()[0], expected);
    }

    #[test]
    fn test_buffers_never_reallocate() {
        let mut arc = shanghai_tokyo();
        let capacity = arc.capacity();
        let ptr = arc.positions().as_ptr();
        for k in 0..200 {
            update_arc(&mut arc, k as f64 * 0.013);
            assert_eq!(arc.capacity(), capacity);
            assert_eq!(arc.positions().as_ptr(), ptr);
        }
        assert_eq!(capacity, 21);
    }

    #[test]
    fn test_brightness_ramp() {
        let mut arc = shanghai_tokyo();
        update_arc(&mut arc, 1.0);
        let colors = arc.colors();
        assert_eq!(colors.first(), Some(&[0.0; 3]));
        assert_eq!(colors.last(), Some(&[1.0; 3]));
        for pair in colors.windows(2) {
            assert!(pair[1][0] > pair[0][0]);
        }
    }

    #[test]
    fn test_phase_offset_shifts_progress() {
        let mut arc = shanghai_tokyo();
        arc.phase_offset_ms = 500.0;
        update_arc(&mut arc, 0.0);
        assert!((arc.progress() - 0.25).abs() < 1e-9);
        update_arc(&mut arc, 1.5);
        assert!(arc.progress().abs() < 1e-9);
    }

    #[test]
    fn test_pending_rebuild_survives_refresh() {
        let mut arc = shanghai_tokyo();
        update_arc(&mut arc, 1.0);
        update_arc(&mut arc, 1.02);
        assert_eq!(arc.take_pending_update(), Some(BufferUpdate::Rebuild { count: 21 }));
        assert_eq!(arc.take_pending_update(), None);
        update_arc(&mut arc, 1.03);
        assert_eq!(arc.take_pending_update(), Some(BufferUpdate::Refresh { count: 21 }));
    }

    #[test]
    fn test_particle() {
        let mut arc = shanghai_tokyo().with_particle();
        update_arc(&mut arc, 1.0);
        let particle = arc.particle.unwrap();
        assert!(particle.visible);
        assert!((particle.opacity - 1.0).abs() < EPSILON);
        assert!((particle.position - arc.samples().points()[50]).length() < EPSILON);
        assert!((0.5..=1.5).contains(&particle.scale));
    }

    #[test]
    fn test_particle_fades_at_cycle_ends() {
        let mut arc = shanghai_tokyo().with_particle();
        update_arc(&mut arc, 0.0);
        assert!(arc.particle.unwrap().opacity.abs() < EPSILON);
        update_arc(&mut arc, 1.999);
        assert!(arc.particle.unwrap().opacity < 0.01);
    }

    #[test]
    fn test_creation_validation() {
        let geometry = GlobeGeometry::default();
        let (a, b) = (geo(0.0, 0.0), geo(10.0, 10.0));
        assert!(create_arc_instance(&geometry, a, b, 0.1, 2000.0, 0.0, 0).is_err());
        assert!(create_arc_instance(&geometry, a, b, 0.1, 0.0, 0.0, 20).is_err());
        assert!(create_arc_instance(&geometry, a, b, -0.1, 2000.0, 0.0, 20).is_err());
        assert!(create_arc_instance(&geometry, a, b, 0.1, 2000.0, f64::NAN, 20).is_err());
    }

    #[test]
    fn test_creation_rejects_out_of_range_points() {
        let geometry = GlobeGeometry::default();
        let good = geo(35.68, 139.65);
        let bad = GeoPoint::unchecked(f32::NAN, 500.0);
        assert!(matches!(
            create_arc_instance(&geometry, bad, good, 0.1, 2000.0, 0.0, 20),
            Err(AnimationError::InvalidCoordinate(_))
        ));
        assert!(matches!(
            create_arc_instance(&geometry, good, GeoPoint::unchecked(95.0, 0.0), 0.1, 2000.0, 0.0, 20),
            Err(AnimationError::InvalidCoordinate(_))
        ));
    }
}
