//! Animated trade-route globe.
//!
//! [`core`] and [`animation`] are plain Rust with an explicit time parameter;
//! [`globe`] and [`visualization`] wire them into Bevy.

pub mod animation;
pub mod config;
pub mod core;
pub mod data;
pub mod globe;
pub mod visualization;
