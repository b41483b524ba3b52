use crate::scene::Bounds;
use glam::{Mat4, Vec3};
use std::f32::consts::{FRAC_PI_4, PI};

/// Keeps the polar angle strictly inside [0, π] so the view never flips.
const POLAR_EPSILON: f32 = 1e-3;
const MIN_DISTANCE: f32 = 0.05;
/// Fraction of the pending zoom applied per wheel notch.
const ZOOM_STEP: f32 = 0.95;

/// Orbit camera around a target point. Angles follow the usual spherical
/// convention: `polar` is measured from +Y, `azimuth` around Y from +Z.
#[derive(Debug, Clone, Copy)]
pub struct CameraController {
    pub target: Vec3,
    pub azimuth: f32,
    pub polar: f32,
    pub distance: f32,
    pub fov_y: f32,
    damping: f32,
    pending_azimuth: f32,
    pending_polar: f32,
    pending_zoom: f32,
    pending_pan: Vec3,
}

impl CameraController {
    pub fn new(target: Vec3, azimuth: f32, polar: f32, distance: f32) -> Self {
        Self {
            target,
            azimuth,
            polar: clamp_polar(polar),
            distance: distance.max(MIN_DISTANCE),
            fov_y: 50f32.to_radians(),
            damping: 1.0,
            pending_azimuth: 0.0,
            pending_polar: 0.0,
            pending_zoom: 1.0,
            pending_pan: Vec3::ZERO,
        }
    }

    /// Share of each pending motion applied per frame; the rest carries over.
    /// 1.0 disables inertia.
    pub fn with_damping(mut self, damping: f32) -> Self {
        self.damping = if damping.is_finite() {
            damping.clamp(0.01, 1.0)
        } else {
            1.0
        };
        self
    }

    /// Looks at the centre of `bounds` from a raised diagonal, far enough back
    /// that the model fits with `margin` times its radius.
    pub fn from_bounds(bounds: Option<Bounds>, margin: f32) -> Self {
        let Some(bounds) = bounds else {
            return Self::new(Vec3::ZERO, FRAC_PI_4, 1.2, 3.0);
        };
        let extent = Vec3::from(bounds.extent());
        let radius = extent.max_element();
        let distance = if radius > 0.0 { radius * margin.max(1.0) } else { 3.0 };
        // Same diagonal as (d, 0.4d, d) from the centre.
        let offset = Vec3::new(1.0, 0.4, 1.0);
        let (azimuth, polar) = offset_to_angles(offset);
        Self::new(Vec3::from(bounds.center()), azimuth, polar, distance)
    }

    pub fn stop(&mut self) {
        self.pending_azimuth = 0.0;
        self.pending_polar = 0.0;
        self.pending_zoom = 1.0;
        self.pending_pan = Vec3::ZERO;
    }

    /// Drag in pixels; a drag across the full viewport height is one full turn.
    pub fn orbit(&mut self, dx: f32, dy: f32, viewport_height: f32) {
        let height = viewport_height.max(1.0);
        self.pending_azimuth -= 2.0 * PI * dx / height;
        self.pending_polar -= 2.0 * PI * dy / height;
    }

    /// Drag in pixels; moves the target in the view plane so the point under
    /// the cursor stays under the cursor.
    pub fn pan(&mut self, dx: f32, dy: f32, viewport_height: f32) {
        let height = viewport_height.max(1.0);
        let world_per_pixel = 2.0 * self.distance * (self.fov_y * 0.5).tan() / height;
        let (_, right, up) = self.basis();
        self.pending_pan += (-right * dx + up * dy) * world_per_pixel;
    }

    /// Positive notches zoom in.
    pub fn zoom(&mut self, notches: f32) {
        if notches.is_finite() {
            self.pending_zoom *= ZOOM_STEP.powf(notches);
        }
    }

    /// Integrates pending motion. Returns true while the camera is still moving.
    pub fn update(&mut self) -> bool {
        let k = self.damping;
        let moving = self.pending_azimuth.abs() > 1e-5
            || self.pending_polar.abs() > 1e-5
            || (self.pending_zoom - 1.0).abs() > 1e-5
            || self.pending_pan.length_squared() > 1e-10;
        if !moving {
            self.stop();
            return false;
        }

        self.azimuth = wrap_angle(self.azimuth + self.pending_azimuth * k);
        self.polar = clamp_polar(self.polar + self.pending_polar * k);
        self.distance = (self.distance * self.pending_zoom.powf(k)).max(MIN_DISTANCE);
        self.target += self.pending_pan * k;

        self.pending_azimuth *= 1.0 - k;
        self.pending_polar *= 1.0 - k;
        self.pending_zoom = self.pending_zoom.powf(1.0 - k);
        self.pending_pan *= 1.0 - k;
        true
    }

    pub fn eye(&self) -> Vec3 {
        self.target + angles_to_direction(self.azimuth, self.polar) * self.distance
    }

    /// (forward, right, up) for the current orientation.
    pub fn basis(&self) -> (Vec3, Vec3, Vec3) {
        let forward = -angles_to_direction(self.azimuth, self.polar);
        let right = forward.cross(Vec3::Y).try_normalize().unwrap_or(Vec3::X);
        let up = right.cross(forward).normalize();
        (forward, right, up)
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye(), self.target, Vec3::Y)
    }

    pub fn projection(&self, aspect: f32) -> Mat4 {
        let near = (self.distance * 0.01).max(0.01);
        let far = (self.distance * 100.0).max(near + 1.0);
        Mat4::perspective_rh(self.fov_y, aspect.max(1e-3), near, far)
    }

    pub fn view_proj(&self, aspect: f32) -> Mat4 {
        self.projection(aspect) * self.view()
    }
}

fn angles_to_direction(azimuth: f32, polar: f32) -> Vec3 {
    let sin_polar = polar.sin();
    Vec3::new(
        sin_polar * azimuth.sin(),
        polar.cos(),
        sin_polar * azimuth.cos(),
    )
}

fn offset_to_angles(offset: Vec3) -> (f32, f32) {
    let dir = offset.try_normalize().unwrap_or(Vec3::Z);
    let azimuth = dir.x.atan2(dir.z);
    let polar = dir.y.clamp(-1.0, 1.0).acos();
    (azimuth, polar)
}

fn clamp_polar(polar: f32) -> f32 {
    if polar.is_finite() {
        polar.clamp(POLAR_EPSILON, PI - POLAR_EPSILON)
    } else {
        PI * 0.5
    }
}

fn wrap_angle(angle: f32) -> f32 {
    if angle.is_finite() {
        (angle + PI).rem_euclid(PI * 2.0) - PI
    } else {
        0.0
    }
}
