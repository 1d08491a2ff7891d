//! Flight actors shuttling back and forth along a route.
//!
//! An actor flies to the end of its path, pauses, turns around and flies
//! back. Position and orientation are exponentially smoothed toward the sampled
//! pose so direction changes near the endpoints stay smooth.

use bevy::color::Color;
use bevy::log::warn;
use bevy::math::{Mat3, Quat, Vec3};

use crate::animation::{
    AnimationError, GlobeGeometry, require_finite, require_non_negative, require_positive,
};
use crate::core::coordinates::GeoPoint;
use crate::core::curve::build_curve;
use crate::core::path::{PathSample, sample, try_interpolate};

/// Progress offset used to find the travel direction.
pub const LOOK_AHEAD: f32 = 0.005;
/// Near the endpoints the look-ahead sample is unreliable; hold the tangent.
pub const ENDPOINT_BAND: f32 = 0.02;
/// Band where rotation smoothing is halved.
pub const WIDE_ENDPOINT_BAND: f32 = 0.1;
/// Progress over which the actor fades in and out.
pub const FADE_BAND: f32 = 0.15;
pub const VISIBILITY_THRESHOLD: f32 = 0.01;

/// Per-frame smoothing factors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmoothingTuning {
    pub position: f32,
    pub rotation: f32,
    pub rotation_wide_band: f32,
    pub rotation_tight_band: f32,
    pub rotation_reversal: f32,
}

impl Default for SmoothingTuning {
    fn default() -> Self {
        Self {
            position: 0.3,
            rotation: 0.2,
            rotation_wide_band: 0.1,
            rotation_tight_band: 0.05,
            rotation_reversal: 0.02,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    pub fn sign(self) -> f32 {
        match self {
            Direction::Forward => 1.0,
            Direction::Backward => -1.0,
        }
    }

    pub fn reversed(self) -> Self {
        match self {
            Direction::Forward => Direction::Backward,
            Direction::Backward => Direction::Forward,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FlightState {
    Flying,
    Paused { since_s: f64 },
}

/// What happened during one update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlightEvent {
    /// Pose held (paused or no usable path).
    Held,
    Moved,
    /// Reached the end this tick and started pausing.
    Arrived,
    /// Pause elapsed; direction flipped and the actor moved.
    Departed,
}

#[derive(Debug, Clone)]
pub struct FlightActorInstance {
    samples: PathSample,
    progress: f32,
    direction: Direction,
    state: FlightState,
    smoothed_position: Vec3,
    smoothed_orientation: Quat,
    last_valid_tangent: Option<Vec3>,
    opacity: f32,
    warned: bool,
    pub speed: f32,
    pub pause_duration_ms: f64,
    pub yaw_offset: f32,
    pub smoothing: SmoothingTuning,
    pub color: Color,
}

pub fn create_flight_actor(
    geometry: &GlobeGeometry,
    start: GeoPoint,
    end: GeoPoint,
    altitude_factor: f32,
    speed: f32,
    pause_duration_ms: f64,
) -> Result<FlightActorInstance, AnimationError> {
    geometry.validate()?;
    start.validate()?;
    end.validate()?;
    require_non_negative("altitude_factor", altitude_factor as f64)?;
    let curve = build_curve(
        start.project(geometry.radius),
        end.project(geometry.radius),
        altitude_factor,
        geometry.angle_threshold,
    );
    FlightActorInstance::from_samples(
        sample(&curve, geometry.flight_resolution),
        speed,
        pause_duration_ms,
    )
}

impl FlightActorInstance {
    /// Actor at the start of `samples`, facing along the route.
    pub fn from_samples(
        samples: PathSample,
        speed: f32,
        pause_duration_ms: f64,
    ) -> Result<Self, AnimationError> {
        require_positive("speed", speed as f64)?;
        require_non_negative("pause_duration_ms", pause_duration_ms)?;

        let position = samples.first().unwrap_or(Vec3::ZERO);
        let orientation = samples
            .chord_direction()
            .and_then(|tangent| orientation_from_tangent(position, tangent, 0.0))
            .unwrap_or(Quat::IDENTITY);

        Ok(Self {
            samples,
            progress: 0.0,
            direction: Direction::Forward,
            state: FlightState::Flying,
            smoothed_position: position,
            smoothed_orientation: orientation,
            last_valid_tangent: None,
            opacity: 0.0,
            warned: false,
            speed,
            pause_duration_ms,
            yaw_offset: 0.0,
            smoothing: SmoothingTuning::default(),
            color: Color::WHITE,
        })
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    pub fn with_yaw_offset(mut self, yaw_offset: f32) -> Result<Self, AnimationError> {
        require_finite("yaw_offset", yaw_offset as f64)?;
        self.yaw_offset = yaw_offset;
        self.smoothed_orientation *= Quat::from_rotation_y(yaw_offset);
        Ok(self)
    }

    pub fn samples(&self) -> &PathSample {
        &self.samples
    }

    pub fn progress(&self) -> f32 {
        self.progress
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn state(&self) -> FlightState {
        self.state
    }

    pub fn position(&self) -> Vec3 {
        self.smoothed_position
    }

    pub fn orientation(&self) -> Quat {
        self.smoothed_orientation
    }

    pub fn last_valid_tangent(&self) -> Option<Vec3> {
        self.last_valid_tangent
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    pub fn is_visible(&self) -> bool {
        self.opacity > VISIBILITY_THRESHOLD
    }

    fn in_endpoint_band(&self) -> bool {
        self.progress <= ENDPOINT_BAND || self.progress >= 1.0 - ENDPOINT_BAND
    }

    /// Unit direction of travel from `position`, looking ahead along the path.
    fn look_ahead_tangent(&self, position: Vec3) -> Option<Vec3> {
        let ahead = (self.progress + LOOK_AHEAD * self.direction.sign()).clamp(0.0, 1.0);
        let ahead = try_interpolate(self.samples.points(), ahead).ok()?;
        (ahead - position).try_normalize()
    }

    fn chord_tangent(&self) -> Option<Vec3> {
        self.samples
            .chord_direction()
            .map(|chord| chord * self.direction.sign())
    }

    fn tangent_at(&mut self, position: Vec3) -> Vec3 {
        if !self.in_endpoint_band()
            && let Some(tangent) = self.look_ahead_tangent(position)
        {
            self.last_valid_tangent = Some(tangent);
            return tangent;
        }
        self.last_valid_tangent
            .or_else(|| self.chord_tangent())
            .unwrap_or_else(|| position.normalize_or(Vec3::Y).any_orthonormal_vector())
    }

    fn warn_once(&mut self, reason: &dyn std::fmt::Display) {
        if !self.warned {
            warn!("Flight actor holding its pose: {}", reason);
            self.warned = true;
        }
    }
}

/// Rotation whose forward (-Z) follows `tangent` and whose up points away
/// from the globe center, turned by `yaw_offset` about local up.
pub fn orientation_from_tangent(position: Vec3, tangent: Vec3, yaw_offset: f32) -> Option<Quat> {
    let up = position.try_normalize()?;
    let tangent = tangent.try_normalize()?;
    let side = up.cross(tangent).try_normalize()?;
    let up = tangent.cross(side);
    let basis = Mat3::from_cols(-side, up, -tangent);
    Some(Quat::from_mat3(&basis).normalize() * Quat::from_rotation_y(yaw_offset))
}

/// Rotation smoothing factor for the current progress.
pub fn rotation_damping(tuning: &SmoothingTuning, progress: f32, reversing: bool) -> f32 {
    if reversing {
        tuning.rotation_reversal
    } else if progress <= ENDPOINT_BAND || progress >= 1.0 - ENDPOINT_BAND {
        tuning.rotation_tight_band
    } else if progress <= WIDE_ENDPOINT_BAND || progress >= 1.0 - WIDE_ENDPOINT_BAND {
        tuning.rotation_wide_band
    } else {
        tuning.rotation
    }
}

/// Fade in over the first [`FADE_BAND`] of the route and out over the last.
pub fn opacity_envelope(progress: f32) -> f32 {
    let opacity = if progress < FADE_BAND {
        progress / FADE_BAND
    } else if progress > 1.0 - FADE_BAND {
        (1.0 - progress) / FADE_BAND
    } else {
        1.0
    };
    opacity.clamp(0.0, 1.0)
}

/// Advance `actor` by one tick at `time_s` (seconds).
pub fn update_flight(actor: &mut FlightActorInstance, time_s: f64) -> FlightEvent {
    if actor.samples.is_empty() {
        actor.warn_once(&"route has no samples");
        return FlightEvent::Held;
    }

    let mut event = FlightEvent::Moved;
    let mut reversing = false;

    if let FlightState::Paused { since_s } = actor.state {
        if (time_s - since_s) * 1000.0 < actor.pause_duration_ms {
            return FlightEvent::Held;
        }
        actor.direction = actor.direction.reversed();
        actor.state = FlightState::Flying;
        let here = try_interpolate(actor.samples.points(), actor.progress)
            .unwrap_or(actor.smoothed_position);
        if let Some(tangent) = actor.look_ahead_tangent(here) {
            actor.last_valid_tangent = Some(tangent);
        }
        event = FlightEvent::Departed;
        reversing = true;
    }

    let step = actor.speed / 1000.0 * actor.direction.sign();
    actor.progress = (actor.progress + step).clamp(0.0, 1.0);

    let arrived = match actor.direction {
        Direction::Forward => actor.progress >= 1.0,
        Direction::Backward => actor.progress <= 0.0,
    };
    if arrived {
        actor.state = FlightState::Paused { since_s: time_s };
        event = FlightEvent::Arrived;
        reversing = true;
    }

    let target = match try_interpolate(actor.samples.points(), actor.progress) {
        Ok(position) => position,
        Err(err) => {
            actor.warn_once(&err);
            return FlightEvent::Held;
        }
    };

    let tangent = actor.tangent_at(target);
    let target_orientation = orientation_from_tangent(target, tangent, actor.yaw_offset)
        .unwrap_or(actor.smoothed_orientation);
    let k_rot = rotation_damping(&actor.smoothing, actor.progress, reversing);

    actor.smoothed_position = actor
        .smoothed_position
        .lerp(target, actor.smoothing.position);
    actor.smoothed_orientation = actor
        .smoothed_orientation
        .slerp(target_orientation, k_rot)
        .normalize();
    actor.opacity = opacity_envelope(actor.progress);

    event
}

/// Chase-camera offsets relative to the actor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChaseSettings {
    pub distance: f32,
    pub height: f32,
}

impl Default for ChaseSettings {
    fn default() -> Self {
        Self {
            distance: 12.0,
            height: 4.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChasePose {
    pub eye: Vec3,
    pub target: Vec3,
    pub up: Vec3,
}

/// Camera pose behind and above `actor`, looking at it.
pub fn chase_camera_pose(actor: &FlightActorInstance, settings: &ChaseSettings) -> ChasePose {
    let position = actor.position();
    let forward = actor.orientation() * Vec3::NEG_Z;
    let up = position.normalize_or(Vec3::Y);
    ChasePose {
        eye: position - forward * settings.distance + up * settings.height,
        target: position,
        up,
    }
}
