//! Visualization module
//!
//! Copies the animation state into Bevy meshes, materials and transforms.
//! Every entity lives under the rotating [`GlobeRoot`] and refers to its
//! instance by slot.

use bevy::prelude::*;

pub mod arcs;
pub mod earth;
pub mod flights;
pub mod registry;
pub mod rings;

pub use arcs::{ArcParticle, ArcSlot, ArcsPlugin};
pub use earth::{EarthPlugin, GlobeRoot};
pub use flights::{FlightSlot, FlightsPlugin};
pub use registry::{MaterialKind, MaterialRegistry, MeshKey};
pub use rings::{RingBase, RingWave, RingsPlugin};

/// Plugin for every rendered layer of the globe
pub struct VisualizationPlugin;

impl Plugin for VisualizationPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<MaterialRegistry>()
            .add_plugins((EarthPlugin, ArcsPlugin, RingsPlugin, FlightsPlugin));
    }
}
