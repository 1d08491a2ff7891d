//! Core geometry
//!
//! Projection from geographic coordinates, arc curves between surface points and
//! path sampling / interpolation. Everything here is pure and allocation-free
//! after construction.

pub mod coordinates;
pub mod curve;
pub mod path;

pub use coordinates::{CoordError, GLOBE_RADIUS, GeoPoint, project, unproject};
pub use curve::{CurveSpec, DEFAULT_ANGLE_THRESHOLD, build_curve};
pub use path::{PathError, PathSample, interpolate, sample, try_interpolate};
