use bevy::core_pipeline::tonemapping::Tonemapping;
use bevy::light::GlobalAmbientLight;
use bevy::picking::mesh_picking::MeshPickingPlugin;
use bevy::prelude::*;
use bevy::window::{PresentMode, Window, WindowPlugin};

use bevy_panorbit_camera::{PanOrbitCamera, PanOrbitCameraPlugin};

#[cfg(feature = "dev")]
use bevy::dev_tools::fps_overlay::FpsOverlayPlugin;

use tradeglobe::config::GlobeConfig;
use tradeglobe::globe::GlobePlugin;
use tradeglobe::visualization::VisualizationPlugin;

fn setup(mut commands: Commands, config: Res<GlobeConfig>) {
    commands.insert_resource(GlobalAmbientLight {
        brightness: 300.0,
        ..default()
    });

    // Three globe radii out
    let initial_distance = config.radius * 3.0;

    let pan_orbit = PanOrbitCamera {
        focus: Vec3::ZERO,
        radius: Some(initial_distance),
        yaw: Some(0.0),
        pitch: Some(0.3),
        force_update: true,
        ..default()
    };

    commands.spawn((
        Camera3d::default(),
        Projection::Perspective(PerspectiveProjection {
            near: 0.1,
            far: config.radius * 50.0,
            ..default()
        }),
        Camera {
            clear_color: ClearColorConfig::Custom(Color::BLACK),
            ..default()
        },
        pan_orbit,
        Tonemapping::TonyMcMapface,
        Transform::from_xyz(0.0, 0.0, initial_distance).looking_at(Vec3::ZERO, Vec3::Y),
        Name::new("Camera"),
    ));

    commands.spawn((
        DirectionalLight {
            illuminance: 4_000.0,
            ..default()
        },
        Transform::from_xyz(1.0, 0.5, 1.0).looking_at(Vec3::ZERO, Vec3::Y),
        Name::new("Key Light"),
    ));
}

fn main() {
    let mut app = App::new();

    app.add_plugins(DefaultPlugins.set(WindowPlugin {
        primary_window: Some(Window {
            title: "Trade Globe".to_string(),
            present_mode: PresentMode::AutoVsync,
            ..default()
        }),
        ..default()
    }));

    #[cfg(feature = "dev")]
    app.add_plugins(FpsOverlayPlugin::default());

    // after DefaultPlugins so the log subscriber is installed
    app.insert_resource(GlobeConfig::load_or_default())
        .add_plugins(PanOrbitCameraPlugin)
        .add_plugins(MeshPickingPlugin)
        .add_plugins(GlobePlugin)
        .add_plugins(VisualizationPlugin)
        .add_systems(Startup, setup);

    app.run();
}
