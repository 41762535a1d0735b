//! Light types for the scene
//!
//! Every variant can be built with engine defaults from a [`LightKind`], which
//! is how named light overrides are instantiated.

use glam::Vec3;

use super::Color;
use crate::config::LightKind;

/// Uniform light hitting every surface equally
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmbientLight {
    pub color: Color,
    pub intensity: f32,
}

impl Default for AmbientLight {
    fn default() -> Self {
        Self {
            color: Color::WHITE,
            intensity: 1.0,
        }
    }
}

/// Sky/ground gradient light
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HemisphereLight {
    pub sky_color: Color,
    pub ground_color: Color,
    pub intensity: f32,
}

impl Default for HemisphereLight {
    fn default() -> Self {
        Self {
            sky_color: Color::WHITE,
            ground_color: Color::WHITE,
            intensity: 1.0,
        }
    }
}

/// Directional light (like the sun)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    pub direction: Vec3,
    pub color: Color,
    pub intensity: f32,
}

impl Default for DirectionalLight {
    fn default() -> Self {
        // Shines from straight above towards the origin
        Self {
            direction: -Vec3::Y,
            color: Color::WHITE,
            intensity: 1.0,
        }
    }
}

impl DirectionalLight {
    pub fn new(direction: Vec3, color: Color, intensity: f32) -> Self {
        Self {
            direction: direction.normalize_or_zero(),
            color,
            intensity,
        }
    }
}

/// Point light. Position comes from the node carrying it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    pub color: Color,
    pub intensity: f32,
    /// Zero means unlimited range
    pub range: f32,
    pub decay: f32,
}

impl Default for PointLight {
    fn default() -> Self {
        Self {
            color: Color::WHITE,
            intensity: 1.0,
            range: 0.0,
            decay: 2.0,
        }
    }
}

/// Spot light. Position comes from the node carrying it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpotLight {
    pub direction: Vec3,
    pub color: Color,
    pub intensity: f32,
    /// Zero means unlimited range
    pub range: f32,
    pub inner_angle: f32, // radians
    pub outer_angle: f32, // radians
    pub decay: f32,
}

impl Default for SpotLight {
    fn default() -> Self {
        Self {
            direction: -Vec3::Y,
            color: Color::WHITE,
            intensity: 1.0,
            range: 0.0,
            inner_angle: 0.0,
            outer_angle: std::f32::consts::FRAC_PI_3,
            decay: 2.0,
        }
    }
}

/// Light enum for the scene graph
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Light {
    Ambient(AmbientLight),
    Hemisphere(HemisphereLight),
    Directional(DirectionalLight),
    Point(PointLight),
    Spot(SpotLight),
}

impl Light {
    /// Light of the given kind with engine defaults.
    pub fn from_kind(kind: LightKind) -> Self {
        match kind {
            LightKind::Ambient => Light::Ambient(AmbientLight::default()),
            LightKind::Hemisphere => Light::Hemisphere(HemisphereLight::default()),
            LightKind::Directional => Light::Directional(DirectionalLight::default()),
            LightKind::Point => Light::Point(PointLight::default()),
            LightKind::Spot => Light::Spot(SpotLight::default()),
        }
    }

    pub fn kind(&self) -> LightKind {
        match self {
            Light::Ambient(_) => LightKind::Ambient,
            Light::Hemisphere(_) => LightKind::Hemisphere,
            Light::Directional(_) => LightKind::Directional,
            Light::Point(_) => LightKind::Point,
            Light::Spot(_) => LightKind::Spot,
        }
    }

    pub fn intensity(&self) -> f32 {
        match self {
            Light::Ambient(l) => l.intensity,
            Light::Hemisphere(l) => l.intensity,
            Light::Directional(l) => l.intensity,
            Light::Point(l) => l.intensity,
            Light::Spot(l) => l.intensity,
        }
    }
}
