//! Per-frame animation of arcs, marker rings and flight actors
//!
//! Every animated element is a plain record owned by [`GlobeAnimations`]. The
//! animators are free functions taking the record and an explicit time in
//! seconds; nothing here reads a clock or touches render assets.

use std::fmt;

use crate::core::coordinates::{CoordError, GLOBE_RADIUS};
use crate::core::curve::DEFAULT_ANGLE_THRESHOLD;

pub mod arc;
pub mod flight;
pub mod ring;
pub mod scheduler;

pub use arc::{ArcInstance, ArcWindow, BufferUpdate, TravelParticle, create_arc_instance, update_arc};
pub use flight::{
    ChasePose, ChaseSettings, Direction, FlightActorInstance, FlightEvent, FlightState,
    chase_camera_pose, create_flight_actor, update_flight,
};
pub use ring::{PulseState, RingInstance, WaveState, create_ring_instance, update_ring};
pub use scheduler::{FrameReport, FrameScheduler};

/// Rejected instance parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum AnimationError {
    InvalidCoordinate(CoordError),
    InvalidParameter {
        name: &'static str,
        value: f64,
        expected: &'static str,
    },
}

impl fmt::Display for AnimationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnimationError::InvalidCoordinate(err) => write!(f, "invalid coordinate: {}", err),
            AnimationError::InvalidParameter {
                name,
                value,
                expected,
            } => write!(f, "invalid {}: {} (expected {})", name, value, expected),
        }
    }
}

impl std::error::Error for AnimationError {}

impl From<CoordError> for AnimationError {
    fn from(err: CoordError) -> Self {
        AnimationError::InvalidCoordinate(err)
    }
}

pub(crate) fn require_positive(name: &'static str, value: f64) -> Result<(), AnimationError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(AnimationError::InvalidParameter {
            name,
            value,
            expected: "a finite value > 0",
        })
    }
}

pub(crate) fn require_non_negative(name: &'static str, value: f64) -> Result<(), AnimationError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(AnimationError::InvalidParameter {
            name,
            value,
            expected: "a finite value >= 0",
        })
    }
}

pub(crate) fn require_finite(name: &'static str, value: f64) -> Result<(), AnimationError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(AnimationError::InvalidParameter {
            name,
            value,
            expected: "a finite value",
        })
    }
}

/// Creation-time geometry knobs shared by every instance of a globe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlobeGeometry {
    pub radius: f32,
    /// Segments per arc path (samples = segments + 1)
    pub arc_resolution: usize,
    /// Segments per flight path
    pub flight_resolution: usize,
    /// Separation in radians above which arcs use a cubic curve
    pub angle_threshold: f32,
}

impl Default for GlobeGeometry {
    fn default() -> Self {
        Self {
            radius: GLOBE_RADIUS,
            arc_resolution: 100,
            flight_resolution: 200,
            angle_threshold: DEFAULT_ANGLE_THRESHOLD,
        }
    }
}

impl GlobeGeometry {
    pub fn validate(&self) -> Result<(), AnimationError> {
        require_positive("radius", self.radius as f64)?;
        require_positive("arc_resolution", self.arc_resolution as f64)?;
        require_positive("flight_resolution", self.flight_resolution as f64)?;
        require_non_negative("angle_threshold", self.angle_threshold as f64)
    }
}

/// Parameters that may change while instances are alive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LiveTuning {
    pub cycle_duration_ms: f64,
    pub wave_duration_ms: f64,
    pub flight_speed: f32,
    pub pause_duration_ms: f64,
    pub yaw_offset: f32,
}

impl LiveTuning {
    pub fn validate(&self) -> Result<(), AnimationError> {
        require_positive("cycle_duration_ms", self.cycle_duration_ms)?;
        require_positive("wave_duration_ms", self.wave_duration_ms)?;
        require_positive("flight_speed", self.flight_speed as f64)?;
        require_non_negative("pause_duration_ms", self.pause_duration_ms)?;
        require_finite("yaw_offset", self.yaw_offset as f64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstanceKind {
    Arc,
    Ring,
    Flight,
}

/// One animated element.
#[derive(Debug, Clone)]
pub enum AnimatedInstance {
    Arc(ArcInstance),
    Ring(RingInstance),
    Flight(FlightActorInstance),
}

impl AnimatedInstance {
    pub fn kind(&self) -> InstanceKind {
        match self {
            AnimatedInstance::Arc(_) => InstanceKind::Arc,
            AnimatedInstance::Ring(_) => InstanceKind::Ring,
            AnimatedInstance::Flight(_) => InstanceKind::Flight,
        }
    }
}

impl From<ArcInstance> for AnimatedInstance {
    fn from(value: ArcInstance) -> Self {
        AnimatedInstance::Arc(value)
    }
}

impl From<RingInstance> for AnimatedInstance {
    fn from(value: RingInstance) -> Self {
        AnimatedInstance::Ring(value)
    }
}

impl From<FlightActorInstance> for AnimatedInstance {
    fn from(value: FlightActorInstance) -> Self {
        AnimatedInstance::Flight(value)
    }
}

/// Owner of every animated instance of a globe. Instances are addressed by slot.
#[derive(Debug, Clone, Default)]
pub struct GlobeAnimations {
    instances: Vec<AnimatedInstance>,
    arc_count: usize,
}

impl GlobeAnimations {
    /// Add an instance, returning its slot.
    pub fn push(&mut self, instance: impl Into<AnimatedInstance>) -> usize {
        let instance = instance.into();
        if instance.kind() == InstanceKind::Arc {
            self.arc_count += 1;
        }
        self.instances.push(instance);
        self.instances.len() - 1
    }

    /// Drop every instance and its buffers.
    pub fn clear(&mut self) {
        self.instances.clear();
        self.arc_count = 0;
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn arc_count(&self) -> usize {
        self.arc_count
    }

    pub fn count(&self, kind: InstanceKind) -> usize {
        self.instances.iter().filter(|i| i.kind() == kind).count()
    }

    pub fn instances(&self) -> &[AnimatedInstance] {
        &self.instances
    }

    pub fn instances_mut(&mut self) -> &mut [AnimatedInstance] {
        &mut self.instances
    }

    pub fn arc(&self, slot: usize) -> Option<&ArcInstance> {
        match self.instances.get(slot) {
            Some(AnimatedInstance::Arc(arc)) => Some(arc),
            _ => None,
        }
    }

    pub fn arc_mut(&mut self, slot: usize) -> Option<&mut ArcInstance> {
        match self.instances.get_mut(slot) {
            Some(AnimatedInstance::Arc(arc)) => Some(arc),
            _ => None,
        }
    }

    pub fn ring(&self, slot: usize) -> Option<&RingInstance> {
        match self.instances.get(slot) {
            Some(AnimatedInstance::Ring(ring)) => Some(ring),
            _ => None,
        }
    }

    pub fn flight(&self, slot: usize) -> Option<&FlightActorInstance> {
        match self.instances.get(slot) {
            Some(AnimatedInstance::Flight(flight)) => Some(flight),
            _ => None,
        }
    }

    /// Slots of every instance of `kind`, in insertion order.
    pub fn slots(&self, kind: InstanceKind) -> impl Iterator<Item = usize> + '_ {
        self.instances
            .iter()
            .enumerate()
            .filter(move |(_, i)| i.kind() == kind)
            .map(|(slot, _)| slot)
    }

    /// Push the live-tunable parameters into every existing instance.
    pub fn apply_live_tuning(&mut self, tuning: &LiveTuning) -> Result<(), AnimationError> {
        tuning.validate()?;
        for instance in &mut self.instances {
            match instance {
                AnimatedInstance::Arc(arc) => arc.cycle_duration_ms = tuning.cycle_duration_ms,
                AnimatedInstance::Ring(ring) => ring.wave_duration_ms = tuning.wave_duration_ms,
                AnimatedInstance::Flight(flight) => {
                    flight.speed = tuning.flight_speed;
                    flight.pause_duration_ms = tuning.pause_duration_ms;
                    flight.yaw_offset = tuning.yaw_offset;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::coordinates::GeoPoint;

    fn geo(lat: f32, lng: f32) -> GeoPoint {
        GeoPoint::from_degrees(lat, lng).unwrap()
    }

    fn sample_set() -> GlobeAnimations {
        let geometry = GlobeGeometry::default();
        let mut set = GlobeAnimations::default();
        set.push(
            create_arc_instance(&geometry, geo(31.23, 121.47), geo(35.68, 139.65), 0.2, 2000.0, 0.0, 20)
                .unwrap(),
        );
        set.push(create_ring_instance(geo(31.23, 121.47), 3, 800.0, 2500.0).unwrap());
        set.push(
            create_flight_actor(&geometry, geo(33.94, -118.41), geo(31.23, 121.47), 0.3, 1.5, 2000.0)
                .unwrap(),
        );
        set
    }

    #[test]
    fn test_slots_and_kinds() {
        let set = sample_set();
        assert_eq!(set.len(), 3);
        assert_eq!(set.arc_count(), 1);
        assert!(set.arc(0).is_some());
        assert!(set.arc(1).is_none());
        assert!(set.ring(1).is_some());
        assert!(set.flight(2).is_some());
        assert_eq!(set.slots(InstanceKind::Flight).collect::<Vec<_>>(), vec![2]);
        assert_eq!(set.count(InstanceKind::Ring), 1);
    }

    #[test]
    fn test_clear_releases_everything() {
        let mut set = sample_set();
        set.clear();
        assert!(set.is_empty());
        assert_eq!(set.arc_count(), 0);
    }

    #[test]
    fn test_apply_live_tuning() {
        let mut set = sample_set();
        let tuning = LiveTuning {
            cycle_duration_ms: 4000.0,
            wave_duration_ms: 1200.0,
            flight_speed: 3.0,
            pause_duration_ms: 500.0,
            yaw_offset: 0.5,
        };
        set.apply_live_tuning(&tuning).unwrap();
        assert_eq!(set.arc(0).unwrap().cycle_duration_ms, 4000.0);
        assert_eq!(set.ring(1).unwrap().wave_duration_ms, 1200.0);
        let flight = set.flight(2).unwrap();
        assert_eq!(flight.speed, 3.0);
        assert_eq!(flight.pause_duration_ms, 500.0);
        assert_eq!(flight.yaw_offset, 0.5);
    }

    #[test]
    fn test_apply_live_tuning_rejects_bad_values() {
        let mut set = sample_set();
        let tuning = LiveTuning {
            cycle_duration_ms: 0.0,
            wave_duration_ms: 1200.0,
            flight_speed: 3.0,
            pause_duration_ms: 500.0,
            yaw_offset: 0.0,
        };
        assert!(set.apply_live_tuning(&tuning).is_err());
        assert_eq!(set.arc(0).unwrap().cycle_duration_ms, 2000.0);
    }

    #[test]
    fn test_error_display() {
        let err = require_positive("trail_length", 0.0).unwrap_err();
        assert_eq!(err.to_string(), "invalid trail_length: 0 (expected a finite value > 0)");
    }

    #[test]
    fn test_geometry_validation() {
        assert!(GlobeGeometry::default().validate().is_ok());
        let bad = GlobeGeometry {
            arc_resolution: 0,
            ..default_geometry()
        };
        assert!(bad.validate().is_err());
    }

    fn default_geometry() -> GlobeGeometry {
        GlobeGeometry::default()
    }
}
