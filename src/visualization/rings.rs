//! Marker rendering: surface dot, pulsing base disc and expanding waves.

use bevy::picking::Pickable;
use bevy::prelude::*;

use crate::animation::InstanceKind;
use crate::config::GlobeConfig;
use crate::core::coordinates::GeoPoint;
use crate::globe::{Animations, AnimationsRebuilt, GlobeSystems};
use crate::visualization::earth::GlobeRoot;
use crate::visualization::registry::{MaterialKind, MaterialRegistry, MeshKey};

/// Height of the ring group above the surface.
const RING_ALTITUDE: f32 = 0.1;
/// Height of the marker dot above the surface.
const DOT_ALTITUDE: f32 = 0.5;
/// Spacing between stacked discs along the surface normal.
const LAYER_OFFSET: f32 = 0.01;

pub struct RingsPlugin;

impl Plugin for RingsPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            Update,
            (spawn_ring_entities, sync_rings)
                .chain()
                .after(GlobeSystems::Animate),
        );
    }
}

#[derive(Component)]
struct RingEntity;

/// Base disc of the ring at this slot.
#[derive(Component, Debug, Clone, Copy)]
pub struct RingBase {
    pub slot: usize,
}

#[derive(Component, Debug, Clone, Copy)]
pub struct RingWave {
    pub slot: usize,
    pub index: usize,
}

/// Disc and annulus sizes derived from the marker knobs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RingDimensions {
    pub base_radius: f32,
    pub wave_inner: f32,
    pub wave_outer: f32,
}

impl RingDimensions {
    pub fn from_config(config: &GlobeConfig) -> Self {
        let base_radius = config.max_rings * config.base_circle_scale;
        let wave_inner = base_radius + config.max_rings * 0.1;
        Self {
            base_radius,
            wave_inner,
            wave_outer: wave_inner + config.max_rings * config.ring_thickness,
        }
    }
}

/// Transform lying flat on the globe at `anchor`, `altitude` above a sphere of `radius`.
/// Local +Z points away from the center.
pub fn surface_transform(anchor: &GeoPoint, radius: f32, altitude: f32) -> Transform {
    let position = anchor.project(radius + altitude);
    let normal = position.normalize_or(Vec3::Y);
    Transform {
        translation: position,
        rotation: Quat::from_rotation_arc(Vec3::Z, normal),
        scale: Vec3::ONE,
    }
}

fn fading_material(color: Color, materials: &mut Assets<StandardMaterial>) -> Handle<StandardMaterial> {
    materials.add(StandardMaterial {
        base_color: color,
        alpha_mode: AlphaMode::Blend,
        unlit: true,
        cull_mode: None,
        ..default()
    })
}

fn spawn_ring_entities(
    mut rebuilt: MessageReader<AnimationsRebuilt>,
    mut commands: Commands,
    config: Res<GlobeConfig>,
    animations: Res<Animations>,
    roots: Query<Entity, With<GlobeRoot>>,
    existing: Query<Entity, With<RingEntity>>,
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
        warn!("No globe root; marker rings not spawned");
        return;
    };

    let dims = RingDimensions::from_config(&config);
    let dot_mesh = registry.mesh(MeshKey::sphere(config.point_size), &mut meshes);
    let disc_mesh = registry.mesh(MeshKey::disc(dims.base_radius), &mut meshes);
    let wave_mesh = registry.mesh(MeshKey::annulus(dims.wave_inner, dims.wave_outer), &mut meshes);

    for slot in animations.slots(InstanceKind::Ring) {
        let Some(ring) = animations.ring(slot) else {
            continue;
        };

        commands.spawn((
            Mesh3d(dot_mesh.clone()),
            MeshMaterial3d(registry.material(MaterialKind::MarkerDot, ring.color, &mut materials)),
            surface_transform(&ring.anchor, config.radius, DOT_ALTITUDE),
            RingEntity,
            ChildOf(root),
        ));

        let group = commands
            .spawn((
                surface_transform(&ring.anchor, config.radius, RING_ALTITUDE),
                Visibility::Inherited,
                RingEntity,
                ChildOf(root),
            ))
            .id();

        commands.spawn((
            Mesh3d(disc_mesh.clone()),
            MeshMaterial3d(fading_material(ring.color, &mut materials)),
            Transform::default(),
            RingBase { slot },
            Pickable::IGNORE,
            ChildOf(group),
        ));

        for wave in &ring.waves {
            commands.spawn((
                Mesh3d(wave_mesh.clone()),
                MeshMaterial3d(fading_material(Color::WHITE.with_alpha(0.0), &mut materials)),
                Transform::from_xyz(0.0, 0.0, LAYER_OFFSET * (wave.index + 1) as f32),
                Visibility::Hidden,
                RingWave {
                    slot,
                    index: wave.index,
                },
                Pickable::IGNORE,
                ChildOf(group),
            ));
        }
    }
}

fn sync_rings(
    animations: Res<Animations>,
    mut bases: Query<
        (&RingBase, &mut Transform, &MeshMaterial3d<StandardMaterial>),
        Without<RingWave>,
    >,
    mut waves: Query<(
        &RingWave,
        &mut Transform,
        &mut Visibility,
        &MeshMaterial3d<StandardMaterial>,
    )>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    for (base, mut transform, material) in bases.iter_mut() {
        let Some(ring) = animations.ring(base.slot) else {
            continue;
        };
        transform.scale = Vec3::splat(ring.base.scale);
        if let Some(material) = materials.get_mut(&material.0) {
            material.base_color.set_alpha(ring.base.opacity);
        }
    }

    for (handle, mut transform, mut visibility, material) in waves.iter_mut() {
        let Some(wave) = animations
            .ring(handle.slot)
            .and_then(|ring| ring.waves.get(handle.index))
        else {
            continue;
        };
        *visibility = if wave.visible {
            Visibility::Inherited
        } else {
            Visibility::Hidden
        };
        transform.scale = Vec3::splat(wave.scale);
        if let Some(material) = materials.get_mut(&material.0) {
            material.base_color.set_alpha(wave.opacity);
        }
    }
}
