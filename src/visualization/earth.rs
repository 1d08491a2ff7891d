//! Globe sphere, atmosphere shell and the rotating root every layer hangs off.

use bevy::math::Affine3A;
use bevy::picking::Pickable;
use bevy::prelude::*;
use bevy::render::render_resource::Face;

use crate::config::GlobeConfig;
use crate::core::coordinates::{GeoPoint, unproject};
use crate::data::parse_color;
use crate::globe::Scheduler;

/// Plugin for the globe body
pub struct EarthPlugin;

/// Rotating parent of the sphere and of every animated entity.
#[derive(Component)]
pub struct GlobeRoot;

#[derive(Component)]
struct GlobeSurface;

#[derive(Component)]
struct Atmosphere;

impl Plugin for EarthPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, spawn_globe)
            .add_systems(Update, (rotate_globe, sync_globe_appearance));
    }
}

fn globe_material(config: &GlobeConfig) -> StandardMaterial {
    StandardMaterial {
        base_color: parse_color(Some(&config.globe_color), Color::BLACK),
        emissive: emissive_color(&config.emissive, config.emissive_intensity),
        perceptual_roughness: 0.9,
        ..default()
    }
}

fn atmosphere_material(config: &GlobeConfig) -> StandardMaterial {
    StandardMaterial {
        base_color: parse_color(Some(&config.atmosphere_color), Color::WHITE).with_alpha(0.15),
        alpha_mode: AlphaMode::Add,
        unlit: true,
        // back faces only, so the glow rims the sphere instead of covering it
        cull_mode: Some(Face::Front),
        ..default()
    }
}

/// Emissive term of the globe material.
pub fn emissive_color(hex: &str, intensity: f32) -> LinearRgba {
    let color = parse_color(Some(hex), Color::BLACK).to_linear();
    LinearRgba::new(
        color.red * intensity,
        color.green * intensity,
        color.blue * intensity,
        1.0,
    )
}

fn spawn_globe(
    mut commands: Commands,
    config: Res<GlobeConfig>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    let root = commands
        .spawn((
            Transform::default(),
            Visibility::Visible,
            GlobeRoot,
            Name::new("Globe"),
        ))
        .id();

    let sphere = Sphere::new(config.radius)
        .mesh()
        .uv(config.segments, config.segments);
    commands
        .spawn((
            Mesh3d(meshes.add(sphere)),
            MeshMaterial3d(materials.add(globe_material(&config))),
            Transform::default(),
            GlobeSurface,
            ChildOf(root),
            Name::new("Globe Surface"),
        ))
        .observe(log_clicked_location);

    let shell = Sphere::new(config.radius * (1.0 + config.atmosphere_altitude))
        .mesh()
        .uv(config.segments, config.segments);
    commands.spawn((
        Mesh3d(meshes.add(shell)),
        MeshMaterial3d(materials.add(atmosphere_material(&config))),
        Transform::default(),
        atmosphere_visibility(&config),
        Atmosphere,
        Pickable::IGNORE,
        ChildOf(root),
        Name::new("Atmosphere"),
    ));
}

fn atmosphere_visibility(config: &GlobeConfig) -> Visibility {
    if config.show_atmosphere {
        Visibility::Inherited
    } else {
        Visibility::Hidden
    }
}

/// Geographic location under a world-space hit on the globe.
pub fn hit_location(root: &Affine3A, world_position: Vec3) -> Option<GeoPoint> {
    unproject(root.inverse().transform_point3(world_position))
}

fn log_clicked_location(
    mut event: On<Pointer<Click>>,
    roots: Query<&GlobalTransform, With<GlobeRoot>>,
) {
    let Some(position) = event.hit.position else {
        return;
    };
    let Ok(root) = roots.single() else {
        return;
    };
    if let Some(location) = hit_location(&root.affine(), position) {
        info!(
            "Clicked lat {:.3}, lng {:.3}",
            location.latitude(),
            location.longitude()
        );
    }
    event.propagate(false);
}

/// Spin about the polar axis while the frame loop runs.
fn rotate_globe(
    config: Res<GlobeConfig>,
    scheduler: Res<Scheduler>,
    time: Res<Time>,
    mut roots: Query<&mut Transform, With<GlobeRoot>>,
) {
    if !config.auto_rotate || !scheduler.is_running() {
        return;
    }
    for mut transform in roots.iter_mut() {
        transform.rotate_y(config.auto_rotate_speed * time.delta_secs());
    }
}

fn sync_globe_appearance(
    config: Res<GlobeConfig>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    surfaces: Query<&MeshMaterial3d<StandardMaterial>, With<GlobeSurface>>,
    mut shells: Query<(&MeshMaterial3d<StandardMaterial>, &mut Visibility), With<Atmosphere>>,
) {
    if !config.is_changed() || config.is_added() {
        return;
    }

    for handle in surfaces.iter() {
        if let Some(material) = materials.get_mut(&handle.0) {
            *material = globe_material(&config);
        }
    }
    for (handle, mut visibility) in shells.iter_mut() {
        *visibility = atmosphere_visibility(&config);
        if let Some(material) = materials.get_mut(&handle.0) {
            *material = atmosphere_material(&config);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::coordinates::project;

    const EPSILON: f32 = 1e-3;

    #[test]
    fn test_emissive_scaled_by_intensity() {
        let emissive = emissive_color("#ffffff", 0.1);
        assert!((emissive.red - 0.1).abs() < 1e-6);
        assert!((emissive.blue - 0.1).abs() < 1e-6);

        let dark = emissive_color("#000000", 5.0);
        assert_eq!(dark.red, 0.0);
    }

    #[test]
    fn test_hit_location_undoes_globe_rotation() {
        let rotation = Quat::from_rotation_y(1.1);
        let root = Affine3A::from_quat(rotation);
        let local = project(31.23, 121.47, 100.0);
        let world = rotation * local;

        let location = hit_location(&root, world).unwrap();
        assert!((location.latitude() - 31.23).abs() < EPSILON);
        assert!((location.longitude() - 121.47).abs() < EPSILON);
    }

    #[test]
    fn test_atmosphere_toggle() {
        let config = GlobeConfig {
            show_atmosphere: false,
            ..Default::default()
        };
        assert_eq!(atmosphere_visibility(&config), Visibility::Hidden);
        assert_eq!(atmosphere_visibility(&GlobeConfig::default()), Visibility::Inherited);
    }
}
