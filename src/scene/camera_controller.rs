//! Camera controls
//!
//! The viewer uses an orbit controller: the camera circles a target point
//! (the origin, where normalized models are centered) and zooms along the
//! line of sight.

use glam::{Quat, Vec2, Vec3};

use super::Camera;

/// Pointer input accumulated between two frames
#[derive(Debug, Clone, Default)]
pub struct CameraInput {
    /// Pointer movement in pixels
    pub mouse_delta: Vec2,
    /// Wheel movement, positive zooms in
    pub scroll_delta: f32,
    /// Whether the orbit button is held
    pub mouse_look_active: bool,
}

impl CameraInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear per-frame deltas. The button state is kept.
    pub fn reset_deltas(&mut self) {
        self.mouse_delta = Vec2::ZERO;
        self.scroll_delta = 0.0;
    }

    pub fn is_idle(&self) -> bool {
        self.scroll_delta == 0.0 && (!self.mouse_look_active || self.mouse_delta == Vec2::ZERO)
    }
}

/// Drives a camera from user input once per frame
pub trait CameraController {
    fn update(&mut self, camera: &mut Camera, input: &CameraInput, dt: f32);

    fn name(&self) -> &'static str;
}

/// Orbit controls around a fixed target.
///
/// The camera sits at `target + offset`, where the offset is a point on a
/// sphere of radius `distance` described by `yaw` (around +Y) and `pitch`
/// (above the horizon). Idle frames leave the camera untouched, so a
/// configured pose survives until the user actually interacts.
#[derive(Debug, Clone)]
pub struct OrbitController {
    pub target: Vec3,
    pub distance: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    /// Radians, around +Y, zero looking down -Z
    pub yaw: f32,
    /// Radians above the horizon
    pub pitch: f32,
    /// Keeps the camera off the poles
    pub max_pitch: f32,
    /// Radians per pixel of drag
    pub rotate_speed: f32,
    /// Distance ratio per wheel step
    pub zoom_step: f32,
}

impl Default for OrbitController {
    fn default() -> Self {
        Self {
            target: Vec3::ZERO,
            distance: 10.0,
            min_distance: 0.5,
            max_distance: 100.0,
            yaw: 0.0,
            pitch: 0.0,
            max_pitch: std::f32::consts::FRAC_PI_2 - 0.05,
            rotate_speed: 0.005,
            zoom_step: 1.1,
        }
    }
}

impl OrbitController {
    /// Controller orbiting `target`, starting from the camera's current position.
    pub fn attached(camera: &Camera, target: Vec3) -> Self {
        let mut controller = Self {
            target,
            ..Default::default()
        };
        controller.sync_with_camera(camera);
        controller
    }

    /// Re-derive distance and angles from where the camera is now.
    pub fn sync_with_camera(&mut self, camera: &Camera) {
        let offset = camera.position - self.target;
        self.distance = offset.length();
        if self.distance <= f32::EPSILON {
            self.yaw = 0.0;
            self.pitch = 0.0;
            return;
        }
        self.pitch = (offset.y / self.distance).clamp(-1.0, 1.0).asin();
        self.yaw = offset.x.atan2(offset.z);
    }

    fn orientation(&self) -> Quat {
        Quat::from_rotation_y(self.yaw) * Quat::from_rotation_x(-self.pitch)
    }

    fn position(&self) -> Vec3 {
        self.target + self.orientation() * Vec3::Z * self.distance
    }
}

impl CameraController for OrbitController {
    fn update(&mut self, camera: &mut Camera, input: &CameraInput, _dt: f32) {
        if input.is_idle() {
            return;
        }

        if input.scroll_delta != 0.0 {
            self.distance = (self.distance * self.zoom_step.powf(-input.scroll_delta))
                .clamp(self.min_distance, self.max_distance);
        }

        if input.mouse_look_active {
            self.yaw = (self.yaw - input.mouse_delta.x * self.rotate_speed)
                .rem_euclid(std::f32::consts::TAU);
            self.pitch = (self.pitch + input.mouse_delta.y * self.rotate_speed)
                .clamp(-self.max_pitch, self.max_pitch);
        }

        camera.position = self.position();
        camera.look_at(self.target);
    }

    fn name(&self) -> &'static str {
        "Orbit"
    }
}
