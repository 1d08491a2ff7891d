//! Arc rendering: faint backdrop line, flying line and travel particle.
//!
//! The flying line mesh mirrors the arc's fixed-size buffers. A rebuild
//! re-inserts the vertex attributes, a refresh overwrites positions in place.

use bevy::asset::RenderAssetUsages;
use bevy::camera::visibility::NoFrustumCulling;
use bevy::mesh::{PrimitiveTopology, VertexAttributeValues};
use bevy::picking::Pickable;
use bevy::prelude::*;

use crate::animation::arc::BufferUpdate;
use crate::animation::InstanceKind;
use crate::config::GlobeConfig;
use crate::globe::{Animations, AnimationsRebuilt, GlobeSystems};
use crate::visualization::earth::GlobeRoot;
use crate::visualization::registry::{MaterialKind, MaterialRegistry, MeshKey};

/// Particle opacity at the middle of the cycle.
const PARTICLE_PEAK_OPACITY: f32 = 0.8;

pub struct ArcsPlugin;

impl Plugin for ArcsPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            Update,
            (spawn_arc_entities, sync_flying_lines, sync_particles)
                .chain()
                .after(GlobeSystems::Animate),
        );
    }
}

/// Anything spawned for an arc.
#[derive(Component)]
struct ArcEntity;

/// Flying line of the arc at this slot.
#[derive(Component, Debug, Clone, Copy)]
pub struct ArcSlot(pub usize);

#[derive(Component, Debug, Clone, Copy)]
pub struct ArcParticle(pub usize);

/// Line strip through `points`.
pub fn line_strip_mesh(points: Vec<[f32; 3]>) -> Mesh {
    let mut mesh = Mesh::new(PrimitiveTopology::LineStrip, RenderAssetUsages::default());
    mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, points);
    mesh
}

/// Grayscale ramp to vertex colors; alpha follows brightness so the tail fades.
pub fn ramp_to_vertex_colors(ramp: &[[f32; 3]]) -> Vec<[f32; 4]> {
    ramp.iter().map(|[r, g, b]| [*r, *g, *b, *r]).collect()
}

/// Copy the arc buffers into `mesh` according to `update`.
pub fn apply_buffer_update(
    mesh: &mut Mesh,
    update: BufferUpdate,
    positions: &[[f32; 3]],
    ramp: &[[f32; 3]],
) {
    if let BufferUpdate::Refresh { count } = update
        && let Some(VertexAttributeValues::Float32x3(values)) =
            mesh.attribute_mut(Mesh::ATTRIBUTE_POSITION)
        && values.len() == count
        && positions.len() == count
    {
        values.copy_from_slice(positions);
        return;
    }

    mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, positions.to_vec());
    mesh.insert_attribute(Mesh::ATTRIBUTE_COLOR, ramp_to_vertex_colors(ramp));
}

fn spawn_arc_entities(
    mut rebuilt: MessageReader<AnimationsRebuilt>,
    mut commands: Commands,
    config: Res<GlobeConfig>,
    animations: Res<Animations>,
    roots: Query<Entity, With<GlobeRoot>>,
    existing: Query<Entity, With<ArcEntity>>,
    mut registry: ResMut<MaterialRegistry>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    if rebuilt.read().count() == 0 {
        return;
    }
    for entity in existing.iter() {
        commands.entity(entity).despawn();
    }
    let Ok(root) = roots.single() else {
        warn!("No globe root; arcs not spawned");
        return;
    };

    let particle_mesh = registry.mesh(MeshKey::sphere(config.particle_size), &mut meshes);

    for slot in animations.slots(InstanceKind::Arc) {
        let Some(arc) = animations.arc(slot) else {
            continue;
        };
        let backdrop: Vec<[f32; 3]> = arc.samples().points().iter().map(|p| p.to_array()).collect();

        commands.spawn((
            Mesh3d(meshes.add(line_strip_mesh(backdrop))),
            MeshMaterial3d(registry.material(MaterialKind::ArcBackdrop, arc.color, &mut materials)),
            Transform::default(),
            ArcEntity,
            Pickable::IGNORE,
            ChildOf(root),
        ));

        commands.spawn((
            Mesh3d(meshes.add(line_strip_mesh(Vec::new()))),
            MeshMaterial3d(registry.material(MaterialKind::FlyingLine, arc.color, &mut materials)),
            Transform::default(),
            ArcSlot(slot),
            ArcEntity,
            NoFrustumCulling,
            Pickable::IGNORE,
            ChildOf(root),
        ));

        if arc.particle.is_some() {
            let material = materials.add(StandardMaterial {
                base_color: arc.color.with_alpha(0.0),
                alpha_mode: AlphaMode::Blend,
                unlit: true,
                ..default()
            });
            commands.spawn((
                Mesh3d(particle_mesh.clone()),
                MeshMaterial3d(material),
                Transform::default(),
                Visibility::Hidden,
                ArcParticle(slot),
                ArcEntity,
                Pickable::IGNORE,
                ChildOf(root),
            ));
        }
    }
}

fn sync_flying_lines(
    mut animations: ResMut<Animations>,
    lines: Query<(&ArcSlot, &Mesh3d)>,
    mut meshes: ResMut<Assets<Mesh>>,
) {
    for (slot, mesh3d) in lines.iter() {
        let Some(arc) = animations.arc_mut(slot.0) else {
            continue;
        };
        let Some(update) = arc.take_pending_update() else {
            continue;
        };
        if let Some(mesh) = meshes.get_mut(&mesh3d.0) {
            apply_buffer_update(mesh, update, arc.positions(), arc.colors());
        }
    }
}

fn sync_particles(
    animations: Res<Animations>,
    mut particles: Query<(
        &ArcParticle,
        &mut Transform,
        &mut Visibility,
        &MeshMaterial3d<StandardMaterial>,
    )>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    for (slot, mut transform, mut visibility, material) in particles.iter_mut() {
        let Some(particle) = animations.arc(slot.0).and_then(|arc| arc.particle) else {
            continue;
        };
        transform.translation = particle.position;
        transform.scale = Vec3::splat(particle.scale);
        *visibility = if particle.visible {
            Visibility::Inherited
        } else {
            Visibility::Hidden
        };
        if let Some(material) = materials.get_mut(&material.0) {
            material
                .base_color
                .set_alpha(PARTICLE_PEAK_OPACITY * particle.opacity);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::{GlobeGeometry, create_arc_instance, update_arc};
    use crate::core::coordinates::GeoPoint;

    fn position_count(mesh: &Mesh) -> usize {
        mesh.attribute(Mesh::ATTRIBUTE_POSITION)
            .map(|values| values.len())
            .unwrap_or(0)
    }

    #[test]
    fn test_ramp_alpha_follows_brightness() {
        let colors = ramp_to_vertex_colors(&[[0.0; 3], [0.5; 3], [1.0; 3]]);
        assert_eq!(colors, vec![[0.0; 4], [0.5; 4], [1.0; 4]]);
    }

    #[test]
    fn test_mesh_follows_arc_buffers() {
        let mut arc = create_arc_instance(
            &GlobeGeometry::default(),
            GeoPoint::from_degrees(31.23, 121.47).unwrap(),
            GeoPoint::from_degrees(35.68, 139.69).unwrap(),
            0.1,
            2000.0,
            0.0,
            20,
        )
        .unwrap();
        let mut mesh = line_strip_mesh(Vec::new());

        let update = update_arc(&mut arc, 1.0);
        assert!(update.is_rebuild());
        let pending = arc.take_pending_update().unwrap();
        apply_buffer_update(&mut mesh, pending, arc.positions(), arc.colors());
        assert_eq!(position_count(&mesh), 21);
        assert!(mesh.attribute(Mesh::ATTRIBUTE_COLOR).is_some());

        let update = update_arc(&mut arc, 1.02);
        assert!(!update.is_rebuild());
        let pending = arc.take_pending_update().unwrap();
        apply_buffer_update(&mut mesh, pending, arc.positions(), arc.colors());
        assert_eq!(position_count(&mesh), 21);
        let Some(VertexAttributeValues::Float32x3(values)) =
            mesh.attribute(Mesh::ATTRIBUTE_POSITION)
        else {
            panic!("positions missing");
        };
        assert_eq!(values.as_slice(), arc.positions());
    }

    #[test]
    fn test_refresh_with_mismatched_mesh_reinserts() {
        let mut mesh = line_strip_mesh(vec![[0.0; 3]; 3]);
        let positions = [[1.0, 2.0, 3.0]; 5];
        let ramp = [[0.5; 3]; 5];
        apply_buffer_update(&mut mesh, BufferUpdate::Refresh { count: 5 }, &positions, &ramp);
        assert_eq!(position_count(&mesh), 5);
    }
}
