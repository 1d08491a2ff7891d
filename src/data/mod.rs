//! Route and marker datasets

pub mod routes;

pub use routes::{ArcRoute, FlightRoute, MarkerPoint, RouteDataset, dedup_markers, parse_color};
