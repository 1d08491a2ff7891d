//! Trade routes, flight routes and marker points.
//!
//! Records keep the field names of the JSON datasets they are read from
//! (`startLat`, `arcAlt`, ...). Coordinates are validated when instances are
//! built, not at parse time, so one bad entry does not reject a whole file.

use anyhow::Context;
use bevy::color::{Color, Srgba};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::core::coordinates::{CoordError, GeoPoint, location_key};

fn default_arc_alt() -> f32 {
    0.2
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArcRoute {
    #[serde(default)]
    pub order: u32,
    pub start_lat: f32,
    pub start_lng: f32,
    pub end_lat: f32,
    pub end_lng: f32,
    #[serde(default = "default_arc_alt")]
    pub arc_alt: f32,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub trade_name: Option<String>,
}

impl ArcRoute {
    pub fn endpoints(&self) -> Result<(GeoPoint, GeoPoint), CoordError> {
        Ok((
            GeoPoint::from_degrees(self.start_lat, self.start_lng)?,
            GeoPoint::from_degrees(self.end_lat, self.end_lng)?,
        ))
    }

    pub fn label(&self) -> String {
        self.trade_name
            .clone()
            .unwrap_or_else(|| format!("route #{}", self.order))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightRoute {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub start_lat: f32,
    pub start_lng: f32,
    pub end_lat: f32,
    pub end_lng: f32,
    #[serde(default = "default_arc_alt")]
    pub arc_alt: f32,
    #[serde(default)]
    pub color: Option<String>,
}

impl FlightRoute {
    pub fn endpoints(&self) -> Result<(GeoPoint, GeoPoint), CoordError> {
        Ok((
            GeoPoint::from_degrees(self.start_lat, self.start_lng)?,
            GeoPoint::from_degrees(self.end_lat, self.end_lng)?,
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerPoint {
    pub lat: f32,
    pub lng: f32,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl MarkerPoint {
    pub fn location(&self) -> Result<GeoPoint, CoordError> {
        GeoPoint::from_degrees(self.lat, self.lng)
    }
}

/// Everything the globe animates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteDataset {
    #[serde(default)]
    pub arcs: Vec<ArcRoute>,
    #[serde(default)]
    pub flights: Vec<FlightRoute>,
    #[serde(default)]
    pub points: Vec<MarkerPoint>,
}

impl RouteDataset {
    /// Built-in trade and flight routes.
    pub fn builtin() -> Self {
        Self {
            arcs: builtin_arcs(),
            flights: builtin_flights(),
            points: Vec::new(),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, anyhow::Error> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, anyhow::Error> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read dataset {}", path.display()))?;
        Self::from_json_str(&contents)
            .with_context(|| format!("Failed to parse dataset {}", path.display()))
    }

    /// Unique marker points. Falls back to the arc endpoints when the dataset
    /// lists no points.
    pub fn markers(&self) -> Vec<MarkerPoint> {
        if !self.points.is_empty() {
            return dedup_markers(&self.points);
        }
        let endpoints: Vec<MarkerPoint> = self
            .arcs
            .iter()
            .flat_map(|arc| {
                [
                    MarkerPoint {
                        lat: arc.start_lat,
                        lng: arc.start_lng,
                        color: arc.color.clone(),
                        name: None,
                    },
                    MarkerPoint {
                        lat: arc.end_lat,
                        lng: arc.end_lng,
                        color: arc.color.clone(),
                        name: None,
                    },
                ]
            })
            .collect();
        dedup_markers(&endpoints)
    }
}

/// Drop markers at an already seen `(lat, lng)`, keeping the first.
pub fn dedup_markers(points: &[MarkerPoint]) -> Vec<MarkerPoint> {
    let mut seen = HashSet::new();
    points
        .iter()
        .filter(|p| seen.insert(location_key(p.lat, p.lng)))
        .cloned()
        .collect()
}

/// Parse a `#rrggbb` color, falling back to `fallback`.
pub fn parse_color(hex: Option<&str>, fallback: Color) -> Color {
    hex.and_then(|hex| Srgba::hex(hex).ok())
        .map(Color::from)
        .unwrap_or(fallback)
}

#[allow(clippy::too_many_arguments)]
fn arc(
    order: u32,
    start_lat: f32,
    start_lng: f32,
    end_lat: f32,
    end_lng: f32,
    arc_alt: f32,
    color: &str,
    trade_name: &str,
) -> ArcRoute {
    ArcRoute {
        order,
        start_lat,
        start_lng,
        end_lat,
        end_lng,
        arc_alt,
        color: Some(color.to_string()),
        trade_name: Some(trade_name.to_string()),
    }
}

fn builtin_arcs() -> Vec<ArcRoute> {
    vec![
        // Asia-Pacific
        arc(1, 31.2304, 121.4737, 35.6762, 139.6503, 0.2, "#58fff3", "Shanghai-Tokyo"),
        arc(2, 22.3193, 114.1694, 1.3521, 103.8198, 0.25, "#3fffb5", "Hong Kong-Singapore"),
        arc(3, 37.5665, 126.9780, -33.8688, 151.2093, 0.3, "#eaff4e", "Seoul-Sydney"),
        // Trans-Pacific
        arc(4, 37.7749, -122.4194, 31.2304, 121.4737, 0.32, "#6b81ff", "San Francisco-Shanghai"),
        arc(5, 34.0522, -118.2437, 35.6762, 139.6503, 0.28, "#58fff3", "Los Angeles-Tokyo"),
        arc(6, 47.6062, -122.3321, 37.5665, 126.9780, 0.3, "#3fffb5", "Seattle-Seoul"),
        // Trans-Atlantic
        arc(7, 40.7128, -74.0060, 51.5074, -0.1278, 0.25, "#eaff4e", "New York-London"),
        arc(8, 52.5200, 13.4050, 40.7128, -74.0060, 0.28, "#6b81ff", "Berlin-New York"),
        arc(9, 48.8566, 2.3522, 25.7617, -80.1918, 0.32, "#58fff3", "Paris-Miami"),
        // Europe-Asia
        arc(10, 55.7558, 37.6176, 39.9042, 116.4074, 0.22, "#3fffb5", "Moscow-Beijing"),
        arc(11, 52.5200, 13.4050, 28.6139, 77.2090, 0.3, "#eaff4e", "Berlin-Delhi"),
        arc(12, 41.9028, 12.4964, 25.2048, 55.2708, 0.25, "#6b81ff", "Rome-Dubai"),
        // Middle East-Asia
        arc(13, 25.2048, 55.2708, 19.0760, 72.8777, 0.18, "#58fff3", "Dubai-Mumbai"),
        arc(14, 25.2048, 55.2708, 1.3521, 103.8198, 0.32, "#3fffb5", "Dubai-Singapore"),
        // Americas
        arc(15, -23.5505, -46.6333, 25.7617, -80.1918, 0.28, "#eaff4e", "Sao Paulo-Miami"),
        arc(16, -34.6037, -58.3816, 40.7128, -74.0060, 0.32, "#6b81ff", "Buenos Aires-New York"),
        // Africa-Europe
        arc(17, -33.9249, 18.4241, 51.5074, -0.1278, 0.34, "#58fff3", "Cape Town-London"),
        arc(18, 30.0444, 31.2357, 41.9028, 12.4964, 0.2, "#3fffb5", "Cairo-Rome"),
        // Oceania-Asia
        arc(19, -37.8136, 144.9631, 22.3193, 114.1694, 0.32, "#eaff4e", "Melbourne-Hong Kong"),
        arc(20, -33.8688, 151.2093, 1.3521, 103.8198, 0.28, "#6b81ff", "Sydney-Singapore"),
        // North America-Europe / Asia
        arc(21, 43.6532, -79.3832, 52.5200, 13.4050, 0.3, "#58fff3", "Toronto-Berlin"),
        arc(22, 49.2827, -123.1207, 35.6762, 139.6503, 0.32, "#3fffb5", "Vancouver-Tokyo"),
        // India-Southeast Asia
        arc(23, 19.0760, 72.8777, 13.7563, 100.5018, 0.15, "#eaff4e", "Mumbai-Bangkok"),
        arc(24, 28.6139, 77.2090, -6.2088, 106.8456, 0.28, "#6b81ff", "Delhi-Jakarta"),
    ]
}

fn builtin_flights() -> Vec<FlightRoute> {
    let flight = |id: &str, name: &str, start: (f32, f32), end: (f32, f32), color: &str, arc_alt| {
        FlightRoute {
            id: id.to_string(),
            name: Some(name.to_string()),
            start_lat: start.0,
            start_lng: start.1,
            end_lat: end.0,
            end_lng: end.1,
            arc_alt,
            color: Some(color.to_string()),
        }
    };
    vec![
        flight("LAX-SHA", "Los Angeles - Shanghai", (33.9425, -118.4081), (31.2304, 121.4737), "#00ff88", 0.3),
        flight("SIN-LHR", "Singapore - London", (1.3521, 103.8198), (51.4700, -0.4543), "#cfff6d", 0.25),
        flight("NRT-JFK", "Tokyo - New York", (35.7647, 140.3864), (40.6413, -73.7781), "#70c1ff", 0.35),
    ]
}
