//! Geographic coordinates and the sphere projection shared by every globe layer.
//!
//! Convention (Y up, matching the rest of the scene):
//! - polar angle `phi = (90 - lat)` in radians, azimuth `theta = (lng + 180)` in radians
//! - `x = -r sin(phi) cos(theta)`, `y = r cos(phi)`, `z = r sin(phi) sin(theta)`
//!
//! Markers, arcs and flight paths are all deduplicated and matched on the exact
//! output of [`project`], so the math runs in f64 and is rounded to f32 once.

use bevy::math::Vec3;
use std::f64::consts::PI;
use std::fmt;

/// Globe radius in scene units.
pub const GLOBE_RADIUS: f32 = 100.0;

#[derive(Debug, Clone, PartialEq)]
pub struct CoordError {
    pub msg: String,
}

impl fmt::Display for CoordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.msg)
    }
}

impl std::error::Error for CoordError {}

/// Latitude/longitude pair in degrees.
///
/// Only built through [`GeoPoint::from_degrees`] or [`unproject`], so both
/// components are finite and in range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    latitude: f32,
    longitude: f32,
}

fn check_degrees(latitude: f32, longitude: f32) -> Result<(), CoordError> {
    if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
        return Err(CoordError {
            msg: format!("Invalid latitude: {:?}", latitude),
        });
    }
    if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
        return Err(CoordError {
            msg: format!("Invalid longitude: {:?}", longitude),
        });
    }
    Ok(())
}

impl GeoPoint {
    pub fn from_degrees(latitude: f32, longitude: f32) -> Result<Self, CoordError> {
        check_degrees(latitude, longitude)?;
        Ok(GeoPoint {
            latitude,
            longitude,
        })
    }

    /// Builds a point without range checks.
    #[cfg(test)]
    pub(crate) fn unchecked(latitude: f32, longitude: f32) -> Self {
        GeoPoint {
            latitude,
            longitude,
        }
    }

    pub fn latitude(&self) -> f32 {
        self.latitude
    }

    pub fn longitude(&self) -> f32 {
        self.longitude
    }

    /// Re-runs the range checks of [`GeoPoint::from_degrees`].
    pub fn validate(&self) -> Result<(), CoordError> {
        check_degrees(self.latitude, self.longitude)
    }

    /// Position of this point on a sphere of `radius`.
    pub fn project(&self, radius: f32) -> Vec3 {
        project(self.latitude, self.longitude, radius)
    }

    pub fn location_key(&self) -> (u32, u32) {
        location_key(self.latitude, self.longitude)
    }
}

/// Exact-match key used for marker de-duplication.
///
/// `-0.0` and `0.0` collapse to the same key.
pub fn location_key(latitude: f32, longitude: f32) -> (u32, u32) {
    ((latitude + 0.0).to_bits(), (longitude + 0.0).to_bits())
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.4}, {:.4})", self.latitude, self.longitude)
    }
}

/// Spherical to Cartesian conversion.
pub fn project(latitude: f32, longitude: f32, radius: f32) -> Vec3 {
    let phi = (90.0 - latitude as f64) * (PI / 180.0);
    let theta = (longitude as f64 + 180.0) * (PI / 180.0);
    let r = radius as f64;

    let x = -(r * phi.sin() * theta.cos());
    let y = r * phi.cos();
    let z = r * phi.sin() * theta.sin();

    Vec3::new(x as f32, y as f32, z as f32)
}

/// Inverse of [`project`]. The radius is discarded.
///
/// Returns `None` for the origin or non-finite input.
pub fn unproject(position: Vec3) -> Option<GeoPoint> {
    let p = position.as_dvec3();
    let r = p.length();
    if !r.is_finite() || r <= f64::EPSILON {
        return None;
    }

    let phi = (p.y / r).clamp(-1.0, 1.0).acos();
    let theta = p.z.atan2(-p.x);

    let latitude = 90.0 - phi.to_degrees();
    let mut longitude = theta.to_degrees() - 180.0;
    if longitude < -180.0 {
        longitude += 360.0;
    }

    Some(GeoPoint {
        latitude: latitude as f32,
        longitude: longitude as f32,
    })
}
