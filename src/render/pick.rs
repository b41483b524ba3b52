//! CPU ray picking
//!
//! Unprojects a cursor position into a world-space ray and intersects it with
//! the scene's triangles. Geometry is already in world space, so each mesh is
//! tested directly: a slab test against its bounds first, then Möller–Trumbore
//! per triangle. The nearest hit wins.

use crate::scene::{Bounds, MeshId, SceneGraph};
use glam::{Mat4, Vec2, Vec3, Vec4Swizzles};

// ========================================================================
// Ray
// ========================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    /// Ray through `cursor` (physical pixels, origin top-left) for a camera
    /// with the given view-projection.
    pub fn from_screen(cursor: Vec2, viewport: Vec2, view_proj: Mat4) -> Option<Self> {
        if viewport.x <= 0.0 || viewport.y <= 0.0 {
            return None;
        }
        let ndc = Vec2::new(
            cursor.x / viewport.x * 2.0 - 1.0,
            1.0 - cursor.y / viewport.y * 2.0,
        );
        let inverse = view_proj.inverse();
        let near = inverse * ndc.extend(0.0).extend(1.0);
        let far = inverse * ndc.extend(1.0).extend(1.0);
        if near.w.abs() < f32::EPSILON || far.w.abs() < f32::EPSILON {
            return None;
        }
        let near = near.xyz() / near.w;
        let far = far.xyz() / far.w;
        let direction = (far - near).try_normalize()?;
        Some(Self {
            origin: near,
            direction,
        })
    }

    pub fn at(&self, distance: f32) -> Vec3 {
        self.origin + self.direction * distance
    }

    /// Entry distance into the box, or None if the ray misses it.
    pub fn intersect_bounds(&self, bounds: &Bounds) -> Option<f32> {
        let min = Vec3::from(bounds.min);
        let max = Vec3::from(bounds.max);
        let inv = self.direction.recip();
        let t0 = (min - self.origin) * inv;
        let t1 = (max - self.origin) * inv;
        let t_near = t0.min(t1).max_element();
        let t_far = t0.max(t1).min_element();
        if t_far < t_near.max(0.0) {
            return None;
        }
        Some(t_near.max(0.0))
    }

    /// Möller–Trumbore. Both faces count as hits.
    pub fn intersect_triangle(&self, [a, b, c]: [Vec3; 3]) -> Option<f32> {
        const EPSILON: f32 = 1e-7;
        let edge1 = b - a;
        let edge2 = c - a;
        let p = self.direction.cross(edge2);
        let det = edge1.dot(p);
        if det.abs() < EPSILON {
            return None;
        }
        let inv_det = 1.0 / det;
        let s = self.origin - a;
        let u = s.dot(p) * inv_det;
        if !(0.0..=1.0).contains(&u) {
            return None;
        }
        let q = s.cross(edge1);
        let v = self.direction.dot(q) * inv_det;
        if v < 0.0 || u + v > 1.0 {
            return None;
        }
        let t = edge2.dot(q) * inv_det;
        (t > EPSILON).then_some(t)
    }
}

// ========================================================================
// PickHit
// ========================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PickHit {
    pub mesh: MeshId,
    pub distance: f32,
    pub point: Vec3,
}

pub fn pick(scene: &SceneGraph, ray: &Ray) -> Option<PickHit> {
    let mut best: Option<PickHit> = None;
    scene.visit_meshes(|mesh| {
        let Some(bounds) = mesh.bounds else {
            return;
        };
        let Some(entry) = ray.intersect_bounds(&bounds) else {
            return;
        };
        if best.is_some_and(|hit| hit.distance < entry) {
            return;
        }
        for triangle in mesh.geometry.triangles() {
            if let Some(distance) = ray.intersect_triangle(triangle) {
                if best.map_or(true, |hit| distance < hit.distance) {
                    best = Some(PickHit {
                        mesh: mesh.id,
                        distance,
                        point: ray.at(distance),
                    });
                }
            }
        }
    });
    best
}
