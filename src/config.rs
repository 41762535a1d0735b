//! Viewer configuration
//!
//! The host page delivers its settings once, as a JSON object. [`ViewerSettings`]
//! mirrors that object verbatim; [`ViewerConfig`] is the validated, immutable
//! value handed to the session. Nothing in the core reads settings from
//! anywhere else.

use std::time::Duration;

use bitflags::bitflags;
use glam::Vec3;
use serde::Deserialize;
use thiserror::Error;

use crate::scene::Color;

/// Edge length of the cube a normalized model is scaled to fit.
pub const REFERENCE_SIZE: f32 = 3.0;

/// Background used when the config does not set one.
pub const DEFAULT_BACKGROUND: Color = Color::from_hex(0x111111);

/// Upper bound on a whole load (archive + model) unless the host overrides it.
pub const DEFAULT_LOAD_TIMEOUT: Duration = Duration::from_secs(60);

/// Class that marks a container as hosting a viewer.
pub const DEFAULT_LOADED_CLASS: &str = "model-viewer-canvas-loaded";
pub const DEFAULT_CONTAINER_CLASS: &str = "model-viewer-canvas";
pub const DEFAULT_PROGRESS_CLASS: &str = "model-viewer-progress";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse viewer settings: {0}")]
    Json(#[from] serde_json::Error),
    #[error("File path to model is not defined")]
    MissingModelUrl,
    #[error("Invalid camera settings: {0}")]
    InvalidCamera(String),
    #[error("Unknown light type: {0}")]
    UnknownLight(String),
    #[error("Invalid color: {0}")]
    InvalidColor(String),
}

/// Model file format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelFormat {
    Gltf,
    Glb,
    Obj,
}

impl ModelFormat {
    /// Map a file extension (without the dot, any case) to a format.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "gltf" => Some(ModelFormat::Gltf),
            "glb" => Some(ModelFormat::Glb),
            "obj" => Some(ModelFormat::Obj),
            _ => None,
        }
    }

    /// Like [`from_extension`](Self::from_extension), but unknown extensions
    /// degrade to the GLTF loader instead of failing.
    pub fn from_extension_or_default(ext: &str) -> Self {
        Self::from_extension(ext).unwrap_or_else(|| {
            log::warn!("No loader registered for extension '{ext}', falling back to glTF");
            ModelFormat::Gltf
        })
    }

    /// Extension of the last path segment of a URL, ignoring query and fragment.
    pub fn extension_of(url: &str) -> Option<&str> {
        let path = url.split(['?', '#']).next().unwrap_or(url);
        let file = path.rsplit('/').next().unwrap_or(path);
        file.rsplit_once('.').map(|(_, ext)| ext).filter(|ext| !ext.is_empty())
    }

    pub fn is_obj(&self) -> bool {
        matches!(self, ModelFormat::Obj)
    }
}

/// Light kinds that can be requested by name from the settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LightKind {
    Point,
    Directional,
    Spot,
    Hemisphere,
    Ambient,
}

impl LightKind {
    pub const ALL: [LightKind; 5] = [
        LightKind::Point,
        LightKind::Directional,
        LightKind::Spot,
        LightKind::Hemisphere,
        LightKind::Ambient,
    ];

    /// Accepts both `PointLight` and `Point` spellings, case-insensitively.
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.trim().to_ascii_lowercase();
        let base = lower.strip_suffix("light").unwrap_or(&lower);
        match base {
            "point" => Some(LightKind::Point),
            "directional" => Some(LightKind::Directional),
            "spot" => Some(LightKind::Spot),
            "hemisphere" => Some(LightKind::Hemisphere),
            "ambient" => Some(LightKind::Ambient),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            LightKind::Point => "PointLight",
            LightKind::Directional => "DirectionalLight",
            LightKind::Spot => "SpotLight",
            LightKind::Hemisphere => "HemisphereLight",
            LightKind::Ambient => "AmbientLight",
        }
    }
}

/// Projection part of a camera override
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CameraKind {
    Perspective {
        /// Vertical field of view in degrees.
        fov: f32,
        /// `None` uses the viewport ratio.
        aspect: Option<f32>,
        near: f32,
        far: f32,
    },
    Orthographic {
        left: f32,
        right: f32,
        top: f32,
        bottom: f32,
        near: f32,
        far: f32,
    },
}

/// Camera override. Replaces the session camera entirely when applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraSpec {
    pub kind: CameraKind,
    pub position: Vec3,
    /// Euler angles in radians, XYZ order.
    pub rotation: Vec3,
}

impl CameraSpec {
    pub fn perspective(fov: f32, near: f32, far: f32) -> Self {
        Self {
            kind: CameraKind::Perspective {
                fov,
                aspect: None,
                near,
                far,
            },
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
        }
    }

    pub fn orthographic(left: f32, right: f32, top: f32, bottom: f32, near: f32, far: f32) -> Self {
        Self {
            kind: CameraKind::Orthographic {
                left,
                right,
                top,
                bottom,
                near,
                far,
            },
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
        }
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn with_rotation(mut self, rotation: Vec3) -> Self {
        self.rotation = rotation;
        self
    }
}

bitflags! {
    /// The recognized default toggles. A set flag means present-and-applied.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DefaultToggles: u8 {
        const ROOM_ENVIRONMENT = 1 << 0;
        const DEFAULT_LIGHTS = 1 << 1;
        const CAMERA_SETTINGS = 1 << 2;
        const BACKGROUND_COLOR = 1 << 3;
    }
}

/// DOM hooks used by the web host
#[derive(Debug, Clone, PartialEq)]
pub struct DomSettings {
    pub loaded_class: String,
    pub container_classes: Vec<String>,
    pub progress_classes: Vec<String>,
}

impl Default for DomSettings {
    fn default() -> Self {
        Self {
            loaded_class: DEFAULT_LOADED_CLASS.to_string(),
            container_classes: vec![DEFAULT_CONTAINER_CLASS.to_string()],
            progress_classes: vec![DEFAULT_PROGRESS_CLASS.to_string()],
        }
    }
}

/// Immutable configuration for one viewer session
#[derive(Debug, Clone, PartialEq)]
pub struct ViewerConfig {
    pub model_url: String,
    pub model_format: ModelFormat,
    pub materials_archive_url: Option<String>,
    pub camera_override: Option<CameraSpec>,
    pub light_override: Option<LightKind>,
    pub background_color: Option<Color>,
    pub use_environment_lighting: bool,
    /// Install an ambient light when the model brings none.
    pub default_lights: bool,
    /// `None` disables the timeout.
    pub load_timeout: Option<Duration>,
    pub dom: DomSettings,
}

impl ViewerConfig {
    pub fn new(model_url: impl Into<String>, model_format: ModelFormat) -> Self {
        Self {
            model_url: model_url.into(),
            model_format,
            materials_archive_url: None,
            camera_override: None,
            light_override: None,
            background_color: None,
            use_environment_lighting: false,
            default_lights: true,
            load_timeout: Some(DEFAULT_LOAD_TIMEOUT),
            dom: DomSettings::default(),
        }
    }

    /// Format is taken from the URL extension, degrading to GLTF.
    pub fn from_url(model_url: impl Into<String>) -> Self {
        let model_url = model_url.into();
        let format = ModelFormat::extension_of(&model_url)
            .map(ModelFormat::from_extension_or_default)
            .unwrap_or(ModelFormat::Gltf);
        Self::new(model_url, format)
    }

    pub fn with_materials_archive(mut self, url: impl Into<String>) -> Self {
        self.materials_archive_url = Some(url.into());
        self
    }

    pub fn with_camera(mut self, camera: CameraSpec) -> Self {
        self.camera_override = Some(camera);
        self
    }

    pub fn with_light(mut self, light: LightKind) -> Self {
        self.light_override = Some(light);
        self
    }

    pub fn with_background(mut self, color: Color) -> Self {
        self.background_color = Some(color);
        self
    }

    pub fn with_environment_lighting(mut self, enabled: bool) -> Self {
        self.use_environment_lighting = enabled;
        self
    }

    pub fn with_default_lights(mut self, enabled: bool) -> Self {
        self.default_lights = enabled;
        self
    }

    pub fn with_load_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.load_timeout = timeout;
        self
    }

    /// Toggles present in this config.
    pub fn toggles(&self) -> DefaultToggles {
        let mut toggles = DefaultToggles::empty();
        toggles.set(DefaultToggles::ROOM_ENVIRONMENT, self.use_environment_lighting);
        toggles.set(DefaultToggles::DEFAULT_LIGHTS, self.default_lights);
        toggles.set(DefaultToggles::CAMERA_SETTINGS, self.camera_override.is_some());
        toggles.set(DefaultToggles::BACKGROUND_COLOR, self.background_color.is_some());
        toggles
    }

    /// Parse the host's settings JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let settings: ViewerSettings = serde_json::from_str(json)?;
        Self::from_settings(settings)
    }

    pub fn from_settings(settings: ViewerSettings) -> Result<Self, ConfigError> {
        let model_url = settings
            .file_url
            .filter(|url| !url.is_empty())
            .ok_or(ConfigError::MissingModelUrl)?;

        let model_format = match settings
            .model_ext
            .as_deref()
            .or(ModelFormat::extension_of(&model_url))
        {
            Some(ext) => ModelFormat::from_extension_or_default(ext),
            None => ModelFormat::Gltf,
        };

        let camera_override = settings.camera_settings.map(CameraSettings::into_spec).transpose()?;

        let light_override = settings
            .light
            .map(|name| LightKind::from_name(&name).ok_or(ConfigError::UnknownLight(name)))
            .transpose()?;

        let background_color = settings.background_color.map(ColorValue::into_color).transpose()?;

        let use_environment_lighting = match settings.room_environment {
            None | Some(serde_json::Value::Null) | Some(serde_json::Value::Bool(false)) => false,
            Some(_) => true,
        };

        let mut dom = DomSettings::default();
        if let Some(class) = settings.canvas_loaded_class {
            dom.loaded_class = class;
        }
        if !settings.container_classes.is_empty() {
            dom.container_classes = settings.container_classes;
        }
        if !settings.progress_element_classes.is_empty() {
            dom.progress_classes = settings.progress_element_classes;
        }

        let load_timeout = match settings.load_timeout_ms {
            Some(0) => None,
            Some(ms) => Some(Duration::from_millis(ms)),
            None => Some(DEFAULT_LOAD_TIMEOUT),
        };

        Ok(Self {
            model_url,
            model_format,
            materials_archive_url: settings.file_materials.filter(|url| !url.is_empty()),
            camera_override,
            light_override,
            background_color,
            use_environment_lighting,
            default_lights: settings.default_lights.unwrap_or(true),
            load_timeout,
            dom,
        })
    }
}

/// Settings object as delivered by the host page.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ViewerSettings {
    pub file_url: Option<String>,
    pub model_ext: Option<String>,
    pub file_materials: Option<String>,
    pub camera_settings: Option<CameraSettings>,
    pub light: Option<String>,
    /// Presence enables environment lighting; `false` or `null` does not.
    pub room_environment: Option<serde_json::Value>,
    pub default_lights: Option<bool>,
    pub background_color: Option<ColorValue>,
    pub canvas_loaded_class: Option<String>,
    pub container_classes: Vec<String>,
    pub progress_element_classes: Vec<String>,
    pub load_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CameraSettings {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub settings: CameraSettingsValues,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CameraSettingsValues {
    pub fov: Option<f32>,
    pub aspect: Option<f32>,
    pub near: Option<f32>,
    pub far: Option<f32>,
    pub left: Option<f32>,
    pub right: Option<f32>,
    pub top: Option<f32>,
    pub bottom: Option<f32>,
    pub position: Option<VectorValue>,
    pub rotation: Option<VectorValue>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct VectorValue {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl From<VectorValue> for Vec3 {
    fn from(v: VectorValue) -> Self {
        Vec3::new(v.x, v.y, v.z)
    }
}

// Fallbacks for a partially specified camera override.
const OVERRIDE_FOV: f32 = 50.0;
const OVERRIDE_NEAR: f32 = 0.1;
const OVERRIDE_FAR: f32 = 2000.0;

impl CameraSettings {
    pub fn into_spec(self) -> Result<CameraSpec, ConfigError> {
        let s = self.settings;
        let near = s.near.unwrap_or(OVERRIDE_NEAR);
        let far = s.far.unwrap_or(OVERRIDE_FAR);
        if near >= far {
            return Err(ConfigError::InvalidCamera(format!(
                "near plane {near} must be closer than far plane {far}"
            )));
        }

        let kind = match self.kind.to_ascii_lowercase().as_str() {
            "perspectivecamera" | "perspective" => CameraKind::Perspective {
                fov: s.fov.unwrap_or(OVERRIDE_FOV),
                aspect: s.aspect.filter(|a| a.is_finite() && *a > 0.0),
                near,
                far,
            },
            "orthographiccamera" | "orthographic" => {
                let (Some(left), Some(right), Some(top), Some(bottom)) =
                    (s.left, s.right, s.top, s.bottom)
                else {
                    return Err(ConfigError::InvalidCamera(
                        "orthographic camera needs left, right, top and bottom".to_string(),
                    ));
                };
                CameraKind::Orthographic {
                    left,
                    right,
                    top,
                    bottom,
                    near,
                    far,
                }
            }
            other => {
                return Err(ConfigError::InvalidCamera(format!(
                    "unknown camera type '{other}'"
                )))
            }
        };

        Ok(CameraSpec {
            kind,
            position: s.position.map(Vec3::from).unwrap_or(Vec3::ZERO),
            rotation: s.rotation.map(Vec3::from).unwrap_or(Vec3::ZERO),
        })
    }
}

/// `"#rrggbb"`, `"0xrrggbb"`, `"rrggbb"` or a plain integer.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ColorValue {
    Number(u32),
    Text(String),
}

impl ColorValue {
    pub fn into_color(self) -> Result<Color, ConfigError> {
        match self {
            ColorValue::Number(hex) if hex <= 0xFF_FFFF => Ok(Color::from_hex(hex)),
            ColorValue::Number(hex) => Err(ConfigError::InvalidColor(hex.to_string())),
            ColorValue::Text(text) => {
                let trimmed = text.trim();
                let digits = trimmed
                    .strip_prefix('#')
                    .or_else(|| trimmed.strip_prefix("0x"))
                    .unwrap_or(trimmed);
                if digits.len() != 6 {
                    return Err(ConfigError::InvalidColor(text));
                }
                u32::from_str_radix(digits, 16)
                    .map(Color::from_hex)
                    .map_err(|_| ConfigError::InvalidColor(text))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_settings_parse() {
        let json = r##"{
            "file_url": "/files/chair.obj",
            "file_materials": "/files/chair.zip",
            "camera_settings": {
                "type": "PerspectiveCamera",
                "settings": {
                    "fov": 45, "near": 0.5, "far": 500,
                    "position": {"x": 0, "y": 2, "z": 8},
                    "rotation": {"x": 0.1, "y": 0, "z": 0}
                }
            },
            "light": "DirectionalLight",
            "room_environment": true,
            "background_color": "#202020",
            "canvas_loaded_class": "loaded"
        }"##;

        let config = ViewerConfig::from_json(json).unwrap();
        assert_eq!(config.model_format, ModelFormat::Obj);
        assert_eq!(config.materials_archive_url.as_deref(), Some("/files/chair.zip"));
        assert_eq!(config.light_override, Some(LightKind::Directional));
        assert!(config.use_environment_lighting);
        assert_eq!(config.background_color, Some(Color::from_hex(0x202020)));
        assert_eq!(config.dom.loaded_class, "loaded");

        let camera = config.camera_override.unwrap();
        assert_eq!(camera.position, Vec3::new(0.0, 2.0, 8.0));
        assert_eq!(
            camera.kind,
            CameraKind::Perspective {
                fov: 45.0,
                aspect: None,
                near: 0.5,
                far: 500.0
            }
        );
        assert_eq!(
            config.toggles(),
            DefaultToggles::all(),
            "every toggle is present in this config"
        );
    }

    #[test]
    fn explicit_extension_wins_over_url() {
        let json = r#"{"file_url": "/download?id=7", "model_ext": "glb"}"#;
        let config = ViewerConfig::from_json(json).unwrap();
        assert_eq!(config.model_format, ModelFormat::Glb);
    }

    #[test]
    fn unknown_extension_degrades_to_gltf() {
        let config = ViewerConfig::from_json(r#"{"file_url": "/files/model.fbx"}"#).unwrap();
        assert_eq!(config.model_format, ModelFormat::Gltf);
    }

    #[test]
    fn missing_url_is_rejected() {
        let err = ViewerConfig::from_json("{}").unwrap_err();
        assert!(matches!(err, ConfigError::MissingModelUrl));
    }

    #[test]
    fn unknown_light_is_rejected() {
        let err =
            ViewerConfig::from_json(r#"{"file_url": "a.glb", "light": "Laser"}"#).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownLight(name) if name == "Laser"));
    }

    #[test]
    fn orthographic_requires_extents() {
        let json = r#"{
            "file_url": "a.glb",
            "camera_settings": {"type": "OrthographicCamera", "settings": {"left": -1}}
        }"#;
        assert!(matches!(
            ViewerConfig::from_json(json),
            Err(ConfigError::InvalidCamera(_))
        ));
    }

    #[test]
    fn room_environment_false_disables() {
        let config =
            ViewerConfig::from_json(r#"{"file_url": "a.glb", "room_environment": false}"#).unwrap();
        assert!(!config.use_environment_lighting);
        assert!(!config.toggles().contains(DefaultToggles::ROOM_ENVIRONMENT));
    }

    #[test]
    fn light_names() {
        assert_eq!(LightKind::from_name("AmbientLight"), Some(LightKind::Ambient));
        assert_eq!(LightKind::from_name("hemisphere"), Some(LightKind::Hemisphere));
        assert_eq!(LightKind::from_name("SpotLight"), Some(LightKind::Spot));
        assert_eq!(LightKind::from_name("light"), None);
    }

    #[test]
    fn colors() {
        assert_eq!(
            ColorValue::Text("0xff0000".into()).into_color().unwrap(),
            Color::from_hex(0xff0000)
        );
        assert_eq!(
            ColorValue::Number(0x00ff00).into_color().unwrap(),
            Color::from_hex(0x00ff00)
        );
        assert!(ColorValue::Text("#fff".into()).into_color().is_err());
    }

    #[test]
    fn extension_ignores_query() {
        assert_eq!(ModelFormat::extension_of("/a/b/model.GLB?itok=1"), Some("GLB"));
        assert_eq!(ModelFormat::extension_of("/a/b.c/model"), None);
    }
}
