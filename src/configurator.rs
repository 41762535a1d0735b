//! Camera, lighting, environment and background resolution
//!
//! The camera comes from the first source that exists, in this order:
//! the config override, the model's first embedded camera, and finally an
//! engineered default looking at the normalized model. Lighting is decided
//! independently afterwards.

use std::sync::Arc;

use glam::Vec3;

use crate::asset::LoadedModel;
use crate::config::{DefaultToggles, ViewerConfig, DEFAULT_BACKGROUND};
use crate::environment::RoomEnvironment;
use crate::scene::{Camera, Light, Projection, Scene};

/// Defaults that were actually applied while configuring a scene.
pub type AppliedDefaults = DefaultToggles;

/// Vertical field of view of the default camera, in degrees
pub const DEFAULT_CAMERA_FOV: f32 = 67.0;
pub const DEFAULT_CAMERA_NEAR: f32 = 0.1;
pub const DEFAULT_CAMERA_FAR: f32 = 800.0;
/// Slightly above the origin, pulled back along -Z
pub const DEFAULT_CAMERA_POSITION: Vec3 = Vec3::new(0.0, 1.0, -10.0);

/// Which branch produced the active camera
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraSource {
    Override,
    Embedded,
    Default,
}

/// Result of [`SceneConfigurator::configure`]
#[derive(Debug, Clone)]
pub struct Configured {
    pub camera: Camera,
    pub camera_source: CameraSource,
    pub applied: AppliedDefaults,
}

#[derive(Debug, Clone, Default)]
pub struct SceneConfigurator {
    room: RoomEnvironment,
}

impl SceneConfigurator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a custom room generator for environment lighting.
    pub fn with_room(mut self, room: RoomEnvironment) -> Self {
        self.room = room;
        self
    }

    /// Resolve camera, lights, environment and background for `scene`.
    ///
    /// `model` must already be attached to `scene`; the light scan covers
    /// the whole scene graph.
    pub fn configure(
        &self,
        scene: &mut Scene,
        model: &LoadedModel,
        config: &ViewerConfig,
        viewport_aspect: f32,
    ) -> Configured {
        let mut applied = AppliedDefaults::empty();

        let (camera, camera_source) = if let Some(spec) = &config.camera_override {
            applied |= AppliedDefaults::CAMERA_SETTINGS;
            (Camera::from_spec(spec, viewport_aspect), CameraSource::Override)
        } else if let Some(embedded) = model.cameras.first() {
            let mut camera = embedded.clone();
            camera.projection.set_aspect(viewport_aspect);
            (camera, CameraSource::Embedded)
        } else {
            (default_camera(viewport_aspect), CameraSource::Default)
        };
        log::debug!("Camera resolved from {camera_source:?}");

        if let Some(kind) = config.light_override {
            log::debug!("Installing {} from config", kind.name());
            scene.add_light(Light::from_kind(kind));
        } else if !scene.has_light() {
            if config.default_lights {
                log::debug!("Scene has no lights, installing ambient light");
                scene.add_light(Light::Ambient(Default::default()));
                applied |= AppliedDefaults::DEFAULT_LIGHTS;
            } else {
                log::warn!("Scene has no lights and default lights are disabled");
            }
        }

        if config.use_environment_lighting {
            scene.environment = Some(Arc::new(self.room.generate()));
            applied |= AppliedDefaults::ROOM_ENVIRONMENT;
        }

        match config.background_color {
            Some(color) => {
                scene.background = color;
                applied |= AppliedDefaults::BACKGROUND_COLOR;
            }
            None => scene.background = DEFAULT_BACKGROUND,
        }

        Configured {
            camera,
            camera_source,
            applied,
        }
    }
}

/// Camera used when neither the config nor the model provides one
pub fn default_camera(viewport_aspect: f32) -> Camera {
    let mut camera = Camera::new(Projection::perspective(
        DEFAULT_CAMERA_FOV,
        viewport_aspect,
        DEFAULT_CAMERA_NEAR,
        DEFAULT_CAMERA_FAR,
    ))
    .with_position(DEFAULT_CAMERA_POSITION);
    camera.look_at(Vec3::ZERO);
    camera
}
