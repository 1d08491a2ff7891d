//! Globe animation plugin
//!
//! Builds the animated instances from the active dataset, drives the frame
//! scheduler from Bevy's clock and handles the keyboard shortcuts.

use bevy::prelude::*;

use crate::animation::scheduler::FrameScheduler;
use crate::animation::{
    AnimationError, GlobeAnimations, InstanceKind, create_arc_instance, create_flight_actor, create_ring_instance,
};
use crate::config::GlobeConfig;
use crate::data::{RouteDataset, parse_color};

pub struct GlobePlugin;

impl Plugin for GlobePlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<GlobeConfig>()
            .init_resource::<Animations>()
            .init_resource::<ActiveDataset>()
            .init_resource::<ChaseTarget>()
            .insert_resource(Scheduler(FrameScheduler::default()))
            .add_message::<AnimationsRebuilt>()
            .add_systems(Startup, setup_animations)
            .add_systems(
                Update,
                (handle_globe_input, apply_config_changes, advance_animations)
                    .chain()
                    .in_set(GlobeSystems::Animate),
            );
    }
}

#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum GlobeSystems {
    /// Instances advanced for this frame; renderer syncs run after it.
    Animate,
}

/// Every animated instance of the globe.
#[derive(Resource, Default, Deref, DerefMut)]
pub struct Animations(pub GlobeAnimations);

#[derive(Resource, Deref, DerefMut)]
pub struct Scheduler(pub FrameScheduler);

/// Dataset the current instances were built from.
#[derive(Resource, Default)]
pub struct ActiveDataset(pub RouteDataset);

/// Flight slot the camera is chasing, if any.
#[derive(Resource, Default)]
pub struct ChaseTarget(pub Option<usize>);

/// Sent when the instance set was replaced and slots changed meaning.
#[derive(Message, Debug, Clone, Copy)]
pub struct AnimationsRebuilt;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BuildSummary {
    pub arcs: usize,
    pub rings: usize,
    pub flights: usize,
    pub skipped: usize,
}

/// Dataset named by the config, or the built-in routes.
pub fn resolve_dataset(config: &GlobeConfig) -> RouteDataset {
    let Some(path) = &config.dataset_path else {
        return RouteDataset::builtin();
    };
    match RouteDataset::load(path) {
        Ok(dataset) => {
            info!(
                "Loaded dataset {} ({} arcs, {} flights, {} points)",
                path.display(),
                dataset.arcs.len(),
                dataset.flights.len(),
                dataset.points.len()
            );
            dataset
        }
        Err(e) => {
            warn!("{:#}; using built-in routes", e);
            RouteDataset::builtin()
        }
    }
}

/// Create arcs, marker rings and flight actors for `dataset`.
///
/// Entries that fail validation are logged and skipped.
pub fn build_animations(
    config: &GlobeConfig,
    dataset: &RouteDataset,
) -> (GlobeAnimations, BuildSummary) {
    let geometry = config.geometry();
    let tuning = config.live_tuning();
    let mut animations = GlobeAnimations::default();
    let mut summary = BuildSummary::default();

    let arc_count = dataset.arcs.len().max(1) as f64;
    for (index, route) in dataset.arcs.iter().enumerate() {
        let phase_offset_ms = index as f64 * config.arc_time_ms / arc_count;
        let created = route.endpoints().map_err(AnimationError::from).and_then(|(start, end)| {
            create_arc_instance(
                &geometry,
                start,
                end,
                route.arc_alt,
                config.arc_time_ms,
                phase_offset_ms,
                config.flying_line_length,
            )
        });
        match created {
            Ok(arc) => {
                let arc = arc.with_color(parse_color(route.color.as_deref(), Color::WHITE));
                let arc = if config.show_flying_particle {
                    arc.with_particle()
                } else {
                    arc
                };
                animations.push(arc);
                summary.arcs += 1;
            }
            Err(e) => {
                warn!("Skipping arc {}: {}", route.label(), e);
                summary.skipped += 1;
            }
        }
    }

    let polygon_color = parse_color(Some(&config.polygon_color), Color::WHITE);
    for marker in dataset.markers() {
        let created = marker.location().map_err(AnimationError::from).and_then(|anchor| {
            create_ring_instance(
                anchor,
                config.wave_count,
                config.wave_delay_ms,
                config.wave_duration_ms,
            )
        });
        match created {
            Ok(ring) => {
                animations.push(ring.with_color(parse_color(marker.color.as_deref(), polygon_color)));
                summary.rings += 1;
            }
            Err(e) => {
                warn!("Skipping marker ({}, {}): {}", marker.lat, marker.lng, e);
                summary.skipped += 1;
            }
        }
    }

    for route in &dataset.flights {
        let created = route
            .endpoints()
            .map_err(AnimationError::from)
            .and_then(|(start, end)| {
                create_flight_actor(
                    &geometry,
                    start,
                    end,
                    route.arc_alt,
                    tuning.flight_speed,
                    tuning.pause_duration_ms,
                )
            })
            .and_then(|actor| actor.with_yaw_offset(tuning.yaw_offset));
        match created {
            Ok(actor) => {
                animations.push(actor.with_color(parse_color(route.color.as_deref(), Color::WHITE)));
                summary.flights += 1;
            }
            Err(e) => {
                warn!("Skipping flight {}: {}", route.id, e);
                summary.skipped += 1;
            }
        }
    }

    (animations, summary)
}

fn rebuild(
    config: &GlobeConfig,
    dataset: RouteDataset,
    animations: &mut Animations,
    active: &mut ActiveDataset,
    scheduler: &mut Scheduler,
    chase: &mut ChaseTarget,
    rebuilt: &mut MessageWriter<AnimationsRebuilt>,
) {
    let (built, summary) = build_animations(config, &dataset);
    info!(
        "Built {} arcs, {} marker rings, {} flights ({} skipped)",
        summary.arcs, summary.rings, summary.flights, summary.skipped
    );
    animations.0 = built;
    active.0 = dataset;
    scheduler.reset();
    scheduler.time_slice_threshold = config.time_slice_threshold;
    chase.0 = None;
    rebuilt.write(AnimationsRebuilt);
}

fn setup_animations(
    config: Res<GlobeConfig>,
    mut animations: ResMut<Animations>,
    mut active: ResMut<ActiveDataset>,
    mut scheduler: ResMut<Scheduler>,
    mut chase: ResMut<ChaseTarget>,
    mut rebuilt: MessageWriter<AnimationsRebuilt>,
) {
    let dataset = resolve_dataset(&config);
    rebuild(
        &config,
        dataset,
        &mut animations,
        &mut active,
        &mut scheduler,
        &mut chase,
        &mut rebuilt,
    );
}

/// Flight slot after `current`, wrapping to `None` after the last one.
pub fn next_chase_target(animations: &GlobeAnimations, current: Option<usize>) -> Option<usize> {
    let mut flights = animations.slots(InstanceKind::Flight);
    match current {
        None => flights.next(),
        Some(slot) => flights.find(|s| *s > slot),
    }
}

fn handle_globe_input(
    input: Res<ButtonInput<KeyCode>>,
    config: Res<GlobeConfig>,
    mut animations: ResMut<Animations>,
    mut active: ResMut<ActiveDataset>,
    mut scheduler: ResMut<Scheduler>,
    mut chase: ResMut<ChaseTarget>,
    mut rebuilt: MessageWriter<AnimationsRebuilt>,
) {
    if input.just_pressed(KeyCode::Space) {
        if scheduler.is_running() {
            scheduler.stop();
            info!("Animation stopped (Space to resume)");
        } else {
            scheduler.resume();
            info!("Animation resumed");
        }
    }

    if input.just_pressed(KeyCode::KeyC) {
        chase.0 = next_chase_target(&animations, chase.0);
        match chase.0 {
            Some(slot) => info!("Chase camera following flight slot {}", slot),
            None => info!("Chase camera off"),
        }
    }

    if input.just_pressed(KeyCode::KeyR) {
        let dataset = resolve_dataset(&config);
        rebuild(
            &config,
            dataset,
            &mut animations,
            &mut active,
            &mut scheduler,
            &mut chase,
            &mut rebuilt,
        );
    }
}

fn apply_config_changes(
    config: Res<GlobeConfig>,
    mut previous: Local<Option<GlobeConfig>>,
    mut animations: ResMut<Animations>,
    mut active: ResMut<ActiveDataset>,
    mut scheduler: ResMut<Scheduler>,
    mut chase: ResMut<ChaseTarget>,
    mut rebuilt: MessageWriter<AnimationsRebuilt>,
) {
    if !config.is_changed() {
        return;
    }
    let Some(prev) = previous.replace(config.clone()) else {
        return;
    };
    if *config == prev {
        return;
    }

    if let Err(e) = config.validate() {
        warn!("Ignoring invalid globe config: {}", e);
        return;
    }

    scheduler.time_slice_threshold = config.time_slice_threshold;
    if prev.needs_rebuild(&config) {
        let dataset = if prev.dataset_path != config.dataset_path {
            resolve_dataset(&config)
        } else {
            active.0.clone()
        };
        rebuild(
            &config,
            dataset,
            &mut animations,
            &mut active,
            &mut scheduler,
            &mut chase,
            &mut rebuilt,
        );
    } else if let Err(e) = animations.apply_live_tuning(&config.live_tuning()) {
        warn!("Live tuning rejected: {}", e);
    }
}

fn advance_animations(
    time: Res<Time>,
    mut scheduler: ResMut<Scheduler>,
    mut animations: ResMut<Animations>,
) {
    let report = scheduler.advance_frame(time.elapsed_secs_f64(), &mut animations);
    if !report.skipped {
        debug!(
            "frame {}: {} arcs ({} rebuilds, {} refreshes), {} rings, {} flights",
            report.frame,
            report.arcs_updated,
            report.rebuilds,
            report.refreshes,
            report.rings_updated,
            report.flights_updated
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{ArcRoute, FlightRoute};

    #[test]
    fn test_builtin_build() {
        let config = GlobeConfig::default();
        let (animations, summary) = build_animations(&config, &RouteDataset::builtin());
        assert_eq!(summary.arcs, 24);
        assert_eq!(summary.rings, 29);
        assert_eq!(summary.flights, 3);
        assert_eq!(summary.skipped, 0);
        assert_eq!(animations.arc_count(), 24);
        assert!(animations.arc(0).unwrap().particle.is_some());
    }

    #[test]
    fn test_arc_phase_offsets_spread_over_cycle() {
        let config = GlobeConfig::default();
        let (animations, _) = build_animations(&config, &RouteDataset::builtin());
        let first = animations.arc(0).unwrap();
        let second = animations.arc(1).unwrap();
        assert_eq!(first.phase_offset_ms, 0.0);
        assert!((second.phase_offset_ms - 2000.0 / 24.0).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_entries_skipped() {
        let dataset = RouteDataset {
            arcs: vec![ArcRoute {
                order: 1,
                start_lat: 95.0,
                start_lng: 0.0,
                end_lat: 10.0,
                end_lng: 10.0,
                arc_alt: 0.2,
                color: None,
                trade_name: None,
            }],
            flights: vec![FlightRoute {
                id: "BAD".to_string(),
                name: None,
                start_lat: 0.0,
                start_lng: 0.0,
                end_lat: 10.0,
                end_lng: 10.0,
                arc_alt: -1.0,
                color: None,
            }],
            points: Vec::new(),
        };
        let (animations, summary) = build_animations(&GlobeConfig::default(), &dataset);
        assert_eq!(summary.arcs, 0);
        assert_eq!(summary.flights, 0);
        // the arc's valid endpoint still gets a marker
        assert_eq!(summary.rings, 1);
        assert_eq!(summary.skipped, 3);
        assert_eq!(animations.len(), 1);
    }

    #[test]
    fn test_next_chase_target_cycles_flights() {
        let (animations, _) = build_animations(&GlobeConfig::default(), &RouteDataset::builtin());
        let flights: Vec<usize> = animations.slots(InstanceKind::Flight).collect();
        assert_eq!(flights.len(), 3);

        let mut target = None;
        for expected in &flights {
            target = next_chase_target(&animations, target);
            assert_eq!(target, Some(*expected));
        }
        assert_eq!(next_chase_target(&animations, target), None);
    }

    #[test]
    fn test_missing_dataset_falls_back_to_builtin() {
        let config = GlobeConfig {
            dataset_path: Some(std::env::temp_dir().join("tradeglobe-no-such-dataset.json")),
            ..Default::default()
        };
        assert_eq!(resolve_dataset(&config), RouteDataset::builtin());
    }
}
