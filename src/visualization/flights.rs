//! Flight actor rendering and the chase camera.

use bevy::math::Affine3A;
use bevy::picking::Pickable;
use bevy::prelude::*;
use bevy_panorbit_camera::PanOrbitCamera;

use crate::animation::flight::{ChasePose, FlightActorInstance, chase_camera_pose};
use crate::animation::InstanceKind;
use crate::config::GlobeConfig;
use crate::globe::{Animations, AnimationsRebuilt, ChaseTarget, GlobeSystems};
use crate::visualization::earth::GlobeRoot;

// Airframe in model units, nose toward -Z.
const FUSELAGE_RADIUS: f32 = 0.25;
const FUSELAGE_LENGTH: f32 = 2.4;
const WING_SPAN: f32 = 3.0;
const WING_CHORD: f32 = 0.6;
const TAIL_SPAN: f32 = 1.1;
const TAIL_OFFSET: f32 = 1.1;
const FIN_HEIGHT: f32 = 0.6;

/// Camera approach rate while chasing, per second.
const CHASE_RATE: f32 = 5.0;

pub struct FlightsPlugin;

impl Plugin for FlightsPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            Update,
            (spawn_flight_entities, sync_flights, follow_chase_target)
                .chain()
                .after(GlobeSystems::Animate),
        );
    }
}

/// Airplane of the flight actor at this slot.
#[derive(Component, Debug, Clone, Copy)]
pub struct FlightSlot(pub usize);

/// Part meshes of the procedural airplane with their local transforms.
fn airframe_parts() -> [(Mesh, Transform); 4] {
    [
        (
            Capsule3d::new(FUSELAGE_RADIUS, FUSELAGE_LENGTH).mesh().build(),
            Transform::from_rotation(Quat::from_rotation_x(std::f32::consts::FRAC_PI_2)),
        ),
        (
            Cuboid::new(WING_SPAN, 0.08, WING_CHORD).mesh().build(),
            Transform::from_xyz(0.0, 0.0, -0.1),
        ),
        (
            Cuboid::new(TAIL_SPAN, 0.06, 0.4).mesh().build(),
            Transform::from_xyz(0.0, 0.05, TAIL_OFFSET),
        ),
        (
            Cuboid::new(0.06, FIN_HEIGHT, 0.4).mesh().build(),
            Transform::from_xyz(0.0, FIN_HEIGHT / 2.0, TAIL_OFFSET),
        ),
    ]
}

/// World-space pose of the airplane model for `actor`.
pub fn plane_transform(actor: &FlightActorInstance, scale: f32) -> Transform {
    Transform {
        translation: actor.position(),
        rotation: actor.orientation(),
        scale: Vec3::splat(scale),
    }
}

/// Chase pose in globe space carried into world space by the globe root.
pub fn world_chase_pose(root: &Affine3A, pose: ChasePose) -> ChasePose {
    ChasePose {
        eye: root.transform_point3(pose.eye),
        target: root.transform_point3(pose.target),
        up: root.transform_vector3(pose.up).normalize_or(Vec3::Y),
    }
}

/// Fraction of the remaining distance the camera covers in `dt` seconds.
pub fn chase_blend(dt: f32) -> f32 {
    (1.0 - (-CHASE_RATE * dt.max(0.0)).exp()).clamp(0.0, 1.0)
}

fn spawn_flight_entities(
    mut rebuilt: MessageReader<AnimationsRebuilt>,
    mut commands: Commands,
    config: Res<GlobeConfig>,
    animations: Res<Animations>,
    roots: Query<Entity, With<GlobeRoot>>,
    existing: Query<Entity, With<FlightSlot>>,
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
        warn!("No globe root; flights not spawned");
        return;
    };

    let parts: Vec<(Handle<Mesh>, Transform)> = airframe_parts()
        .into_iter()
        .map(|(mesh, transform)| (meshes.add(mesh), transform))
        .collect();

    for slot in animations.slots(InstanceKind::Flight) {
        let Some(actor) = animations.flight(slot) else {
            continue;
        };
        // own material, its alpha fades near the endpoints
        let material = materials.add(StandardMaterial {
            base_color: actor.color.with_alpha(actor.opacity()),
            emissive: actor.color.to_linear() * 0.3,
            alpha_mode: AlphaMode::Blend,
            ..default()
        });

        let plane = commands
            .spawn((
                plane_transform(actor, config.flight_scale),
                Visibility::Inherited,
                FlightSlot(slot),
                ChildOf(root),
                Name::new(format!("Flight {}", slot)),
            ))
            .id();

        for (mesh, transform) in &parts {
            commands.spawn((
                Mesh3d(mesh.clone()),
                MeshMaterial3d(material.clone()),
                *transform,
                Pickable::IGNORE,
                ChildOf(plane),
            ));
        }
    }
}

fn sync_flights(
    config: Res<GlobeConfig>,
    animations: Res<Animations>,
    mut planes: Query<(&FlightSlot, &mut Transform, &mut Visibility, &Children)>,
    parts: Query<&MeshMaterial3d<StandardMaterial>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    for (slot, mut transform, mut visibility, children) in planes.iter_mut() {
        let Some(actor) = animations.flight(slot.0) else {
            continue;
        };
        *transform = plane_transform(actor, config.flight_scale);
        *visibility = if actor.is_visible() {
            Visibility::Inherited
        } else {
            Visibility::Hidden
        };
        // every part shares one material
        if let Some(handle) = children.iter().find_map(|child| parts.get(child).ok())
            && let Some(material) = materials.get_mut(&handle.0)
        {
            material.base_color.set_alpha(actor.opacity());
        }
    }
}

fn follow_chase_target(
    chase: Res<ChaseTarget>,
    config: Res<GlobeConfig>,
    animations: Res<Animations>,
    time: Res<Time>,
    roots: Query<&Transform, (With<GlobeRoot>, Without<PanOrbitCamera>)>,
    mut cameras: Query<(&mut Transform, &mut PanOrbitCamera)>,
) {
    let Ok((mut camera, mut pan_orbit)) = cameras.single_mut() else {
        return;
    };

    let actor = chase.0.and_then(|slot| animations.flight(slot));
    let (Some(actor), Ok(root)) = (actor, roots.single()) else {
        if !pan_orbit.enabled {
            pan_orbit.enabled = true;
            pan_orbit.force_update = true;
        }
        return;
    };

    pan_orbit.enabled = false;
    let pose = world_chase_pose(
        &root.compute_affine(),
        chase_camera_pose(actor, &config.chase_settings()),
    );
    let blend = chase_blend(time.delta_secs());
    camera.translation = camera.translation.lerp(pose.eye, blend);
    camera.look_at(pose.target, pose.up);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::{GlobeGeometry, create_flight_actor, update_flight};
    use crate::core::coordinates::GeoPoint;

    const EPSILON: f32 = 1e-4;

    fn actor() -> FlightActorInstance {
        create_flight_actor(
            &GlobeGeometry::default(),
            GeoPoint::from_degrees(33.94, -118.41).unwrap(),
            GeoPoint::from_degrees(31.14, 121.81).unwrap(),
            0.3,
            1.5,
            2000.0,
        )
        .unwrap()
    }

    #[test]
    fn test_plane_transform_tracks_actor() {
        let mut actor = actor();
        for frame in 0..30 {
            update_flight(&mut actor, frame as f64 / 60.0);
        }
        let transform = plane_transform(&actor, 2.0);
        assert_eq!(transform.translation, actor.position());
        assert_eq!(transform.rotation, actor.orientation());
        assert_eq!(transform.scale, Vec3::splat(2.0));
    }

    #[test]
    fn test_world_chase_pose_follows_globe_rotation() {
        let pose = ChasePose {
            eye: Vec3::new(0.0, 0.0, 110.0),
            target: Vec3::new(0.0, 0.0, 100.0),
            up: Vec3::Z,
        };
        let rotation = Quat::from_rotation_y(std::f32::consts::FRAC_PI_2);
        let world = world_chase_pose(&Affine3A::from_quat(rotation), pose);

        assert!((world.eye - Vec3::new(110.0, 0.0, 0.0)).length() < 1e-3);
        assert!((world.target - Vec3::new(100.0, 0.0, 0.0)).length() < 1e-3);
        assert!((world.up - Vec3::X).length() < EPSILON);
    }

    #[test]
    fn test_chase_blend_bounds() {
        assert_eq!(chase_blend(0.0), 0.0);
        assert_eq!(chase_blend(-1.0), 0.0);
        let frame = chase_blend(1.0 / 60.0);
        assert!(frame > 0.0 && frame < 0.2);
        assert!(chase_blend(10.0) > 0.99);
    }

    #[test]
    fn test_airframe_nose_forward() {
        let parts = airframe_parts();
        // tail surfaces sit behind the origin, along +Z
        assert!(parts[2].1.translation.z > 0.0);
        assert!(parts[3].1.translation.y > 0.0);
    }
}
