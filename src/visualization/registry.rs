//! Shared render resources.
//!
//! Static meshes and materials are created once per structural key and
//! reused by every entity that asks for the same key. Anything whose opacity
//! animates gets its own material instead.

use bevy::color::ColorToPacked;
use bevy::prelude::*;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaterialKind {
    /// Faint full-length arc behind the flying line
    ArcBackdrop,
    /// Vertex-colored flying line
    FlyingLine,
    MarkerDot,
}

impl MaterialKind {
    fn build(self, color: Color) -> StandardMaterial {
        match self {
            MaterialKind::ArcBackdrop => StandardMaterial {
                base_color: color.with_alpha(0.2),
                alpha_mode: AlphaMode::Blend,
                unlit: true,
                ..default()
            },
            MaterialKind::FlyingLine => StandardMaterial {
                base_color: color,
                alpha_mode: AlphaMode::Blend,
                unlit: true,
                ..default()
            },
            MaterialKind::MarkerDot => StandardMaterial {
                base_color: color,
                unlit: true,
                ..default()
            },
        }
    }
}

/// Mesh key; sizes are stored as raw bits so the key stays hashable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeshKey {
    Sphere { radius_bits: u32 },
    Disc { radius_bits: u32 },
    Annulus { inner_bits: u32, outer_bits: u32 },
}

impl MeshKey {
    pub fn sphere(radius: f32) -> Self {
        MeshKey::Sphere {
            radius_bits: radius.to_bits(),
        }
    }

    pub fn disc(radius: f32) -> Self {
        MeshKey::Disc {
            radius_bits: radius.to_bits(),
        }
    }

    pub fn annulus(inner: f32, outer: f32) -> Self {
        MeshKey::Annulus {
            inner_bits: inner.to_bits(),
            outer_bits: outer.to_bits(),
        }
    }

    fn build(self) -> Mesh {
        match self {
            MeshKey::Sphere { radius_bits } => Sphere::new(f32::from_bits(radius_bits))
                .mesh()
                .uv(8, 8),
            MeshKey::Disc { radius_bits } => Circle::new(f32::from_bits(radius_bits))
                .mesh()
                .resolution(32)
                .build(),
            MeshKey::Annulus {
                inner_bits,
                outer_bits,
            } => Annulus::new(f32::from_bits(inner_bits), f32::from_bits(outer_bits))
                .mesh()
                .resolution(32)
                .build(),
        }
    }
}

#[derive(Resource, Default)]
pub struct MaterialRegistry {
    materials: HashMap<(MaterialKind, [u8; 4]), Handle<StandardMaterial>>,
    meshes: HashMap<MeshKey, Handle<Mesh>>,
}

impl MaterialRegistry {
    pub fn material(
        &mut self,
        kind: MaterialKind,
        color: Color,
        materials: &mut Assets<StandardMaterial>,
    ) -> Handle<StandardMaterial> {
        let key = (kind, color.to_srgba().to_u8_array());
        self.materials
            .entry(key)
            .or_insert_with(|| materials.add(kind.build(color)))
            .clone()
    }

    pub fn mesh(&mut self, key: MeshKey, meshes: &mut Assets<Mesh>) -> Handle<Mesh> {
        self.meshes
            .entry(key)
            .or_insert_with(|| meshes.add(key.build()))
            .clone()
    }

    #[cfg(test)]
    pub fn material_count(&self) -> usize {
        self.materials.len()
    }

    #[cfg(test)]
    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }
}
