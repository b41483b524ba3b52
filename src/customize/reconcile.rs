//! Resolves every mesh's drawn material from its base material, its override
//! record and the transient hover state.

use super::overrides::{MaterialOverride, OverrideMap};
use crate::color::LinearRgb;
use crate::scene::{Material, MeshId, SceneGraph, StandardMaterial, TextureBinding, TextureHandle, WrapMode};

/// Hands out a handle for a texture source. Loading completes in the background;
/// the same source must always map to the same handle.
pub trait TextureLoader {
    fn load(&mut self, source: &str) -> TextureHandle;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HoverStyle {
    pub emissive: LinearRgb,
    pub intensity: f32,
}

impl Default for HoverStyle {
    fn default() -> Self {
        Self {
            emissive: LinearRgb::from_srgb8([0xaa, 0xaa, 0xaa]),
            intensity: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    pub meshes: usize,
    pub overridden: usize,
    pub changed: usize,
}

/// Missing, zero or non-finite scales repeat once.
pub fn effective_repeat(scale: Option<f32>) -> f32 {
    match scale {
        Some(value) if value.is_finite() && value != 0.0 => value,
        _ => 1.0,
    }
}

pub fn resolve_material(
    base: &Material,
    record: Option<&MaterialOverride>,
    hovered: bool,
    loader: &mut dyn TextureLoader,
    style: &HoverStyle,
) -> StandardMaterial {
    let mut material = base.to_standard();

    if let Some(record) = record {
        if let Some(color) = &record.color {
            material.color = color.to_linear();
        }
        if let Some(source) = &record.texture {
            material.map = Some(TextureBinding {
                source: source.clone(),
                handle: loader.load(source),
                wrap: WrapMode::Repeat,
                repeat: [
                    effective_repeat(record.tile_scale_x),
                    effective_repeat(record.tile_scale_y),
                ],
            });
        }
    }

    if hovered {
        material.emissive = style.emissive;
        material.emissive_intensity = style.intensity;
    } else {
        material.emissive = LinearRgb::BLACK;
        material.emissive_intensity = 0.0;
    }
    material
}

/// Full recomputation over every mesh. Safe to call any number of times.
pub fn reconcile(
    scene: &mut SceneGraph,
    overrides: &OverrideMap,
    hovered: Option<MeshId>,
    loader: &mut dyn TextureLoader,
    style: &HoverStyle,
) -> ReconcileStats {
    let mut stats = ReconcileStats::default();
    scene.visit_meshes_mut(|mesh| {
        stats.meshes += 1;
        let record = overrides.get(mesh.id);
        if record.is_some() {
            stats.overridden += 1;
        }
        let resolved = resolve_material(
            &mesh.base_material,
            record,
            hovered == Some(mesh.id),
            loader,
            style,
        );
        if mesh.set_material(resolved) {
            stats.changed += 1;
        }
    });
    log::debug!(
        "Reconciled {} meshes ({} overridden, {} changed)",
        stats.meshes,
        stats.overridden,
        stats.changed
    );
    stats
}
