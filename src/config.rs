//! Globe configuration
//!
//! Every knob of the globe lives in [`GlobeConfig`]. It is read once at
//! startup from `globe.json` in the platform config directory:
//! - macOS: ~/Library/Application Support/tradeglobe/
//! - Linux: ~/.config/tradeglobe/
//! - Windows: %APPDATA%\tradeglobe\config\
//!
//! Missing fields take their defaults, so a file only needs the values it
//! changes.

use anyhow::Context;
use bevy::prelude::*;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::animation::flight::ChaseSettings;
use crate::animation::{
    AnimationError, GlobeGeometry, LiveTuning, require_non_negative, require_positive,
};
use crate::core::coordinates::GLOBE_RADIUS;

pub const CONFIG_FILE_NAME: &str = "globe.json";

#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobeConfig {
    // Globe
    pub radius: f32,
    pub segments: u32,
    pub globe_color: String,
    pub emissive: String,
    pub emissive_intensity: f32,
    pub show_atmosphere: bool,
    pub atmosphere_color: String,
    pub atmosphere_altitude: f32,
    pub polygon_color: String,
    pub auto_rotate: bool,
    /// Radians per second about the polar axis
    pub auto_rotate_speed: f32,

    // Arcs
    pub arc_time_ms: f64,
    pub arc_resolution: usize,
    pub flying_line_length: usize,
    pub angle_threshold_deg: f32,
    pub show_flying_particle: bool,
    pub particle_size: f32,

    // Markers
    pub point_size: f32,
    pub wave_count: usize,
    pub wave_delay_ms: f64,
    pub wave_duration_ms: f64,
    pub max_rings: f32,
    pub base_circle_scale: f32,
    pub ring_thickness: f32,

    // Flights
    pub flight_speed: f32,
    pub flight_pause_ms: f64,
    pub flight_yaw_offset_deg: f32,
    pub flight_resolution: usize,
    pub flight_scale: f32,
    pub chase_distance: f32,
    pub chase_height: f32,

    pub time_slice_threshold: usize,
    /// JSON dataset replacing the built-in routes
    pub dataset_path: Option<PathBuf>,
}

impl Default for GlobeConfig {
    fn default() -> Self {
        Self {
            radius: GLOBE_RADIUS,
            segments: 64,
            globe_color: "#1d072e".to_string(),
            emissive: "#000000".to_string(),
            emissive_intensity: 0.1,
            show_atmosphere: true,
            atmosphere_color: "#ffffff".to_string(),
            atmosphere_altitude: 0.1,
            polygon_color: "#ffffff".to_string(),
            auto_rotate: true,
            auto_rotate_speed: 0.01,

            arc_time_ms: 2000.0,
            arc_resolution: 100,
            flying_line_length: 20,
            angle_threshold_deg: 60.0,
            show_flying_particle: true,
            particle_size: 0.5,

            point_size: 1.0,
            wave_count: 3,
            wave_delay_ms: 800.0,
            wave_duration_ms: 2500.0,
            max_rings: 3.0,
            base_circle_scale: 0.3,
            ring_thickness: 0.15,

            flight_speed: 1.5,
            flight_pause_ms: 2000.0,
            flight_yaw_offset_deg: 0.0,
            flight_resolution: 200,
            flight_scale: 1.0,
            chase_distance: 12.0,
            chase_height: 4.0,

            time_slice_threshold: 64,
            dataset_path: None,
        }
    }
}

impl GlobeConfig {
    /// Platform path of the config file.
    pub fn config_path() -> Result<PathBuf, anyhow::Error> {
        let proj_dirs = ProjectDirs::from("", "", "tradeglobe")
            .ok_or_else(|| anyhow::anyhow!("Failed to resolve config directory"))?;
        Ok(proj_dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    pub fn from_json_str(json: &str) -> Result<Self, anyhow::Error> {
        let config: GlobeConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate the config at `path`. `Ok(None)` if the file does not exist.
    pub fn load_from(path: &Path) -> Result<Option<Self>, anyhow::Error> {
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_json_str(&contents)
            .with_context(|| format!("Invalid config {}", path.display()))
            .map(Some)
    }

    /// Config from the platform config directory, or defaults.
    pub fn load_or_default() -> Self {
        let path = match Self::config_path() {
            Ok(path) => path,
            Err(e) => {
                warn!("{}; using default globe config", e);
                return Self::default();
            }
        };
        match Self::load_from(&path) {
            Ok(Some(config)) => {
                info!("Loaded globe config from {}", path.display());
                config
            }
            Ok(None) => {
                info!("No config at {}; using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                warn!("{:#}; using default globe config", e);
                Self::default()
            }
        }
    }

    #[cfg(test)]
    pub fn save_to(&self, path: &Path) -> Result<(), anyhow::Error> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), AnimationError> {
        self.geometry().validate()?;
        self.live_tuning().validate()?;
        require_positive("segments", self.segments as f64)?;
        require_positive("flying_line_length", self.flying_line_length as f64)?;
        require_positive("wave_count", self.wave_count as f64)?;
        require_positive("wave_delay_ms", self.wave_delay_ms)?;
        require_non_negative("atmosphere_altitude", self.atmosphere_altitude as f64)?;
        require_non_negative("auto_rotate_speed", self.auto_rotate_speed as f64)?;
        require_positive("particle_size", self.particle_size as f64)?;
        require_positive("point_size", self.point_size as f64)?;
        require_positive("max_rings", self.max_rings as f64)?;
        require_positive("base_circle_scale", self.base_circle_scale as f64)?;
        require_positive("ring_thickness", self.ring_thickness as f64)?;
        require_positive("flight_scale", self.flight_scale as f64)?;
        require_non_negative("chase_distance", self.chase_distance as f64)?;
        require_positive("time_slice_threshold", self.time_slice_threshold as f64)
    }

    pub fn geometry(&self) -> GlobeGeometry {
        GlobeGeometry {
            radius: self.radius,
            arc_resolution: self.arc_resolution,
            flight_resolution: self.flight_resolution,
            angle_threshold: self.angle_threshold_deg.to_radians(),
        }
    }

    /// Subset that can change without rebuilding instances.
    pub fn live_tuning(&self) -> LiveTuning {
        LiveTuning {
            cycle_duration_ms: self.arc_time_ms,
            wave_duration_ms: self.wave_duration_ms,
            flight_speed: self.flight_speed,
            pause_duration_ms: self.flight_pause_ms,
            yaw_offset: self.flight_yaw_offset_deg.to_radians(),
        }
    }

    pub fn chase_settings(&self) -> ChaseSettings {
        ChaseSettings {
            distance: self.chase_distance,
            height: self.chase_height,
        }
    }

    /// Whether going from `self` to `other` needs instances rebuilt rather
    /// than live-tuned.
    pub fn needs_rebuild(&self, other: &GlobeConfig) -> bool {
        self.geometry() != other.geometry()
            || self.flying_line_length != other.flying_line_length
            || self.show_flying_particle != other.show_flying_particle
            || self.wave_count != other.wave_count
            || self.wave_delay_ms != other.wave_delay_ms
            || self.dataset_path != other.dataset_path
    }
}
