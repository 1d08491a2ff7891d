//! Discretized curves and smooth re-interpolation over them.

use bevy::log::warn_once;
use bevy::math::Vec3;
use std::fmt;
use std::sync::Arc;

use crate::core::curve::CurveSpec;

/// Ordered, immutable samples along a curve.
///
/// Cloning shares the underlying storage.
#[derive(Debug, Clone, PartialEq)]
pub struct PathSample {
    points: Arc<[Vec3]>,
}

impl PathSample {
    pub fn from_points(points: Vec<Vec3>) -> Self {
        Self {
            points: points.into(),
        }
    }

    pub fn points(&self) -> &[Vec3] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first(&self) -> Option<Vec3> {
        self.points.first().copied()
    }

    pub fn last(&self) -> Option<Vec3> {
        self.points.last().copied()
    }

    /// Unit vector from the first to the last sample, if they differ.
    pub fn chord_direction(&self) -> Option<Vec3> {
        let (first, last) = (self.first()?, self.last()?);
        (last - first).try_normalize()
    }

    /// See [`interpolate`].
    pub fn interpolate(&self, progress: f32) -> Vec3 {
        interpolate(&self.points, progress)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathError {
    Empty,
    NonFiniteProgress(f32),
    NonFiniteSample { index: usize },
}

impl fmt::Display for PathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathError::Empty => write!(f, "path has no samples"),
            PathError::NonFiniteProgress(p) => write!(f, "progress is not finite: {}", p),
            PathError::NonFiniteSample { index } => {
                write!(f, "path sample {} is not finite", index)
            }
        }
    }
}

impl std::error::Error for PathError {}

/// Sample `curve` uniformly into `resolution + 1` points.
///
/// The first and last samples are the curve endpoints. Interior samples that
/// fall inside the sphere through the start point are lifted onto it.
pub fn sample(curve: &CurveSpec, resolution: usize) -> PathSample {
    let resolution = resolution.max(1);
    let base_radius = curve.start().length();
    let mut points = Vec::with_capacity(resolution + 1);

    points.push(curve.start());
    for i in 1..resolution {
        let p = curve.point_at(i as f32 / resolution as f32);
        points.push(lift_to_surface(p, base_radius));
    }
    points.push(curve.end());

    PathSample::from_points(points)
}

fn lift_to_surface(point: Vec3, radius: f32) -> Vec3 {
    let len = point.length();
    if len >= radius || len <= f32::EPSILON {
        point
    } else {
        point * (radius / len)
    }
}

/// Position at `progress` along `samples`, or the origin on invalid input.
///
/// Failures are logged once per process; use [`try_interpolate`] to handle
/// them per caller.
pub fn interpolate(samples: &[Vec3], progress: f32) -> Vec3 {
    try_interpolate(samples, progress).unwrap_or_else(|err| {
        warn_once!("Path interpolation fell back to origin: {}", err);
        Vec3::ZERO
    })
}

/// Position at `progress` in `[0, 1]` along `samples`.
///
/// Fewer than 4 samples interpolate linearly; otherwise a Catmull-Rom segment
/// through the 4 neighbouring samples is used, repeating the boundary sample
/// at either end.
pub fn try_interpolate(samples: &[Vec3], progress: f32) -> Result<Vec3, PathError> {
    if samples.is_empty() {
        return Err(PathError::Empty);
    }
    if !progress.is_finite() {
        return Err(PathError::NonFiniteProgress(progress));
    }

    let n = samples.len();
    let last = n - 1;
    let result = if n == 1 || progress <= 0.0 {
        samples[0]
    } else if progress >= 1.0 {
        samples[last]
    } else {
        let scaled = progress * last as f32;
        let index = (scaled.floor() as usize).min(last - 1);
        let local = (scaled - index as f32).clamp(0.0, 1.0);

        if n < 4 {
            samples[index].lerp(samples[index + 1], local)
        } else {
            let p0 = samples[index.saturating_sub(1)];
            let p1 = samples[index];
            let p2 = samples[index + 1];
            let p3 = samples[(index + 2).min(last)];
            catmull_rom(p0, p1, p2, p3, local)
        }
    };

    if !result.is_finite() {
        let index = samples.iter().position(|p| !p.is_finite()).unwrap_or(0);
        return Err(PathError::NonFiniteSample { index });
    }
    Ok(result)
}

/// Uniform Catmull-Rom segment between `p1` and `p2`.
pub fn catmull_rom(p0: Vec3, p1: Vec3, p2: Vec3, p3: Vec3, t: f32) -> Vec3 {
    let t2 = t * t;
    let t3 = t2 * t;
    0.5 * ((2.0 * p1)
        + (p2 - p0) * t
        + (2.0 * p0 - 5.0 * p1 + 4.0 * p2 - p3) * t2
        + (3.0 * p1 - p0 - 3.0 * p2 + p3) * t3)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::coordinates::project;
    use crate::core::curve::{DEFAULT_ANGLE_THRESHOLD, build_curve};

    const EPSILON: f32 = 1e-4;

    fn line(n: usize) -> Vec<Vec3> {
        (0..n).map(|i| Vec3::new(i as f32, 0.0, 0.0)).collect()
    }

    #[test]
    fn test_sample_count_and_endpoints() {
        let start = project(31.23, 121.47, 100.0);
        let end = project(35.68, 139.65, 100.0);
        let curve = build_curve(start, end, 0.1, DEFAULT_ANGLE_THRESHOLD);
        let path = sample(&curve, 100);
        assert_eq!(path.len(), 101);
        assert_eq!(path.first(), Some(start));
        assert_eq!(path.last(), Some(end));
    }

    #[test]
    fn test_samples_never_below_surface() {
        let routes = [
            ((0.0, 0.0), (0.0, 170.0), 0.1),
            ((-34.6, -58.4), (40.7, -74.0), 0.32),
            ((37.57, 126.98), (-33.87, 151.21), 0.3),
            ((52.52, 13.40), (40.71, -74.0), 0.05),
            ((22.32, 114.17), (1.35, 103.82), 0.25),
        ];
        for ((lat1, lng1), (lat2, lng2), alt) in routes {
            let start = project(lat1, lng1, 100.0);
            let end = project(lat2, lng2, 100.0);
            let path = sample(&build_curve(start, end, alt, DEFAULT_ANGLE_THRESHOLD), 100);
            for p in path.points() {
                assert!(p.length() >= 100.0 - 1e-3, "sample dipped to {}", p.length());
            }
        }
    }

    #[test]
    fn test_boundary_law() {
        for n in 1..8 {
            let samples = line(n);
            assert_eq!(interpolate(&samples, 0.0), samples[0]);
            assert_eq!(interpolate(&samples, 1.0), samples[n - 1]);
        }
    }

    #[test]
    fn test_out_of_range_progress_clamps() {
        let samples = line(10);
        assert_eq!(interpolate(&samples, -3.0), samples[0]);
        assert_eq!(interpolate(&samples, 7.5), samples[9]);
    }

    #[test]
    fn test_linear_for_short_paths() {
        let samples = line(3);
        let p = interpolate(&samples, 0.25);
        assert!((p.x - 0.5).abs() < EPSILON);
    }

    #[test]
    fn test_catmull_rom_passes_through_samples() {
        let samples: Vec<Vec3> = (0..6)
            .map(|i| Vec3::new(i as f32, (i as f32 * 0.7).sin(), 0.0))
            .collect();
        for (i, s) in samples.iter().enumerate() {
            let p = interpolate(&samples, i as f32 / 5.0);
            assert!((p - *s).length() < EPSILON, "sample {}: {:?} vs {:?}", i, p, s);
        }
    }

    #[test]
    fn test_catmull_rom_on_straight_line() {
        let samples = line(10);
        let mut previous = f32::NEG_INFINITY;
        for k in 0..=90 {
            let t = k as f32 / 90.0;
            let p = interpolate(&samples, t);
            assert!(p.y.abs() < EPSILON && p.z.abs() < EPSILON);
            assert!(p.x >= previous - EPSILON, "x went backwards at t={}", t);
            previous = p.x;
            // Interior segments have real neighbours on both sides.
            if (1.0 / 9.0..=8.0 / 9.0).contains(&t) {
                assert!((p.x - t * 9.0).abs() < 1e-3);
            }
        }
    }

    #[test]
    fn test_velocity_continuous_across_sample_boundary() {
        let samples: Vec<Vec3> = (0..8)
            .map(|i| Vec3::new(i as f32, (i as f32).powi(2) * 0.1, 0.0))
            .collect();
        let h = 1e-3;
        let knot = 3.0 / 7.0;
        let before = (interpolate(&samples, knot) - interpolate(&samples, knot - h)) / h;
        let after = (interpolate(&samples, knot + h) - interpolate(&samples, knot)) / h;
        assert!((before - after).length() < 0.05 * before.length());
    }

    #[test]
    fn test_empty_falls_back_to_origin() {
        assert_eq!(interpolate(&[], 0.5), Vec3::ZERO);
        assert_eq!(try_interpolate(&[], 0.5), Err(PathError::Empty));
    }

    #[test]
    fn test_non_finite_inputs() {
        let samples = line(5);
        assert!(matches!(
            try_interpolate(&samples, f32::NAN),
            Err(PathError::NonFiniteProgress(_))
        ));
        let mut bad = line(5);
        bad[2] = Vec3::new(f32::NAN, 0.0, 0.0);
        assert_eq!(
            try_interpolate(&bad, 0.5),
            Err(PathError::NonFiniteSample { index: 2 })
        );
        assert_eq!(interpolate(&bad, 0.5), Vec3::ZERO);
    }

    #[test]
    fn test_chord_direction() {
        let path = PathSample::from_points(line(4));
        assert_eq!(path.chord_direction(), Some(Vec3::X));
        let single = PathSample::from_points(vec![Vec3::ONE]);
        assert_eq!(single.chord_direction(), None);
    }
}
