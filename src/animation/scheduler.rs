//! Frame driver for a [`GlobeAnimations`] set.
//!
//! Rings and flights advance every frame. Arcs advance every frame until their
//! population exceeds the time-slice threshold; beyond that a rotating window
//! of arcs is advanced per frame, so every arc is still visited within a
//! couple of frames.

use bevy::log::warn;

use crate::animation::arc::update_arc;
use crate::animation::flight::update_flight;
use crate::animation::ring::update_ring;
use crate::animation::{AnimatedInstance, GlobeAnimations};

/// Arc population above which arcs are time sliced.
pub const DEFAULT_TIME_SLICE_THRESHOLD: usize = 64;
/// Smallest arc window when slicing.
pub const MIN_ARC_SLICE: usize = 5;

/// Counters for one `advance_frame` call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FrameReport {
    pub frame: u64,
    pub arcs_updated: usize,
    pub rings_updated: usize,
    pub flights_updated: usize,
    pub rebuilds: usize,
    pub refreshes: usize,
    /// The frame was not applied (stopped, or time went backwards).
    pub skipped: bool,
}

#[derive(Debug, Clone)]
pub struct FrameScheduler {
    pub time_slice_threshold: usize,
    arc_cursor: usize,
    last_time_s: Option<f64>,
    frame: u64,
    running: bool,
}

impl Default for FrameScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_TIME_SLICE_THRESHOLD)
    }
}

impl FrameScheduler {
    pub fn new(time_slice_threshold: usize) -> Self {
        Self {
            time_slice_threshold,
            arc_cursor: 0,
            last_time_s: None,
            frame: 0,
            running: true,
        }
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn resume(&mut self) {
        self.running = true;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Frames applied so far.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Forget the arc cursor and last frame time, e.g. after the instance set
    /// was rebuilt.
    pub fn reset(&mut self) {
        self.arc_cursor = 0;
        self.last_time_s = None;
    }

    /// Number of arcs advanced per frame for a population of `arcs`.
    pub fn arc_window_size(&self, arcs: usize) -> usize {
        if arcs <= self.time_slice_threshold {
            arcs
        } else {
            MIN_ARC_SLICE.max(arcs.div_ceil(2)).min(arcs)
        }
    }

    /// Advance every instance in `animations` to `time_s` (seconds).
    pub fn advance_frame(&mut self, time_s: f64, animations: &mut GlobeAnimations) -> FrameReport {
        let mut report = FrameReport {
            frame: self.frame,
            ..Default::default()
        };

        if !self.running {
            report.skipped = true;
            return report;
        }
        if !time_s.is_finite() {
            warn!("Ignoring frame with non-finite time {}", time_s);
            report.skipped = true;
            return report;
        }
        if let Some(last) = self.last_time_s
            && time_s < last
        {
            warn!("Ignoring out-of-order frame: {:.4}s after {:.4}s", time_s, last);
            report.skipped = true;
            return report;
        }
        self.last_time_s = Some(time_s);

        let population = animations.arc_count();
        let window = self.arc_window_size(population);
        let start = if population == 0 {
            0
        } else {
            self.arc_cursor % population
        };

        let mut arc_ordinal = 0;
        for instance in animations.instances_mut() {
            match instance {
                AnimatedInstance::Arc(arc) => {
                    let ordinal = arc_ordinal;
                    arc_ordinal += 1;
                    if (ordinal + population - start) % population >= window {
                        continue;
                    }
                    if update_arc(arc, time_s).is_rebuild() {
                        report.rebuilds += 1;
                    } else {
                        report.refreshes += 1;
                    }
                    report.arcs_updated += 1;
                }
                AnimatedInstance::Ring(ring) => {
                    update_ring(ring, time_s);
                    report.rings_updated += 1;
                }
                AnimatedInstance::Flight(flight) => {
                    update_flight(flight, time_s);
                    report.flights_updated += 1;
                }
            }
        }

        if population > 0 {
            self.arc_cursor = (start + window) % population;
        }
        self.frame += 1;
        report
    }
}
