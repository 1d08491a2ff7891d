//! Bézier arcs between two points on the globe surface.
//!
//! Short hops get a single elevated control point; wide separations get two so
//! the arc stays smooth instead of spiking at the apex.

use bevy::math::Vec3;
use std::f32::consts::FRAC_PI_3;

/// Separation above which a cubic curve is used (60 degrees).
pub const DEFAULT_ANGLE_THRESHOLD: f32 = FRAC_PI_3;

/// Curve from one surface point to another, bulging away from the globe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CurveSpec {
    Quadratic {
        start: Vec3,
        control: Vec3,
        end: Vec3,
    },
    Cubic {
        start: Vec3,
        control1: Vec3,
        control2: Vec3,
        end: Vec3,
    },
}

impl CurveSpec {
    pub fn start(&self) -> Vec3 {
        match *self {
            CurveSpec::Quadratic { start, .. } | CurveSpec::Cubic { start, .. } => start,
        }
    }

    pub fn end(&self) -> Vec3 {
        match *self {
            CurveSpec::Quadratic { end, .. } | CurveSpec::Cubic { end, .. } => end,
        }
    }

    /// Number of interior control points (1 for quadratic, 2 for cubic).
    pub fn interior_control_points(&self) -> usize {
        match self {
            CurveSpec::Quadratic { .. } => 1,
            CurveSpec::Cubic { .. } => 2,
        }
    }

    /// Evaluate the curve at parameter `t` in `[0, 1]`.
    pub fn point_at(&self, t: f32) -> Vec3 {
        let t = t.clamp(0.0, 1.0);
        let u = 1.0 - t;
        match *self {
            CurveSpec::Quadratic {
                start,
                control,
                end,
            } => start * (u * u) + control * (2.0 * u * t) + end * (t * t),
            CurveSpec::Cubic {
                start,
                control1,
                control2,
                end,
            } => {
                start * (u * u * u)
                    + control1 * (3.0 * u * u * t)
                    + control2 * (3.0 * u * t * t)
                    + end * (t * t * t)
            }
        }
    }
}

/// Angle between two positions as seen from the globe center, in radians.
pub fn angular_separation(a: Vec3, b: Vec3) -> f32 {
    let a = a.normalize_or_zero();
    let b = b.normalize_or_zero();
    a.dot(b).clamp(-1.0, 1.0).acos()
}

/// Build the arc between two surface points.
///
/// Control points sit on a sphere of radius `|start| * (1 + altitude_factor)`.
pub fn build_curve(
    start: Vec3,
    end: Vec3,
    altitude_factor: f32,
    angle_threshold: f32,
) -> CurveSpec {
    let radius = start.length();
    let elevated = radius * (1.0 + altitude_factor);
    let angle = angular_separation(start, end);

    let mid = elevate((start + end) * 0.5, bulge_fallback(start, end), elevated);

    if angle > angle_threshold {
        let control1 = elevate(start.lerp(mid, 0.5), mid, elevated);
        let control2 = elevate(mid.lerp(end, 0.5), mid, elevated);
        CurveSpec::Cubic {
            start,
            control1,
            control2,
            end,
        }
    } else {
        CurveSpec::Quadratic {
            start,
            control: mid,
            end,
        }
    }
}

/// Push `point` onto the elevated sphere, using `fallback`'s direction when
/// `point` sits at the center.
fn elevate(point: Vec3, fallback: Vec3, elevated_radius: f32) -> Vec3 {
    let dir = point.try_normalize().unwrap_or_else(|| fallback.normalize_or_zero());
    dir * elevated_radius
}

// Exactly antipodal endpoints have no chord midpoint; bulge perpendicular to them.
fn bulge_fallback(start: Vec3, end: Vec3) -> Vec3 {
    match start.try_normalize() {
        Some(dir) => dir.any_orthonormal_vector(),
        None => end.normalize_or(Vec3::Y),
    }
}
