//! Procedural room environment for image-based lighting.
//!
//! [`RoomEnvironment`] describes a neutral studio room (bright ceiling strip,
//! grey walls with one window, dark floor) and bakes it into an
//! equirectangular [`EnvironmentMap`] in linear radiance. The map is blurred
//! slightly so that reflections read as soft light rather than geometry.

use std::f32::consts::{PI, TAU};

use glam::Vec3;

use crate::resources::Texture;

/// Blur radius of the baked room, in radians.
pub const ROOM_BLUR_SIGMA: f32 = 0.04;

const CEILING: Vec3 = Vec3::splat(0.9);
const CEILING_STRIP: Vec3 = Vec3::splat(6.0);
const WALL: Vec3 = Vec3::splat(0.55);
const WINDOW: Vec3 = Vec3::new(3.6, 3.8, 4.0);
const FLOOR: Vec3 = Vec3::splat(0.3);

/// Equirectangular radiance map.
///
/// Row 0 is straight up (+Y). Column 0 faces -Z and longitude grows towards +X.
#[derive(Debug, Clone)]
pub struct EnvironmentMap {
    width: u32,
    height: u32,
    texels: Vec<Vec3>,
}

impl EnvironmentMap {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn texels(&self) -> &[Vec3] {
        &self.texels
    }

    /// Radiance seen along `direction` (nearest texel).
    pub fn sample(&self, direction: Vec3) -> Vec3 {
        let d = direction.normalize_or_zero();
        if d == Vec3::ZERO {
            return Vec3::ZERO;
        }
        let u = 0.5 + d.x.atan2(-d.z) / TAU;
        let v = d.y.clamp(-1.0, 1.0).acos() / PI;
        let x = ((u * self.width as f32) as u32).min(self.width - 1);
        let y = ((v * self.height as f32) as u32).min(self.height - 1);
        self.texels[(y * self.width + x) as usize]
    }

    /// Unweighted mean over all texels.
    pub fn average(&self) -> Vec3 {
        if self.texels.is_empty() {
            return Vec3::ZERO;
        }
        self.texels.iter().copied().sum::<Vec3>() / self.texels.len() as f32
    }

    /// Reinhard-tonemapped RGBA8 copy, for backends without float textures.
    pub fn to_texture(&self, name: &str) -> Texture {
        let mut data = Vec::with_capacity(self.texels.len() * 4);
        for texel in &self.texels {
            let mapped = *texel / (Vec3::ONE + *texel);
            for c in mapped.to_array() {
                data.push((c.clamp(0.0, 1.0) * 255.0).round() as u8);
            }
            data.push(255);
        }
        Texture::from_rgba(name, self.width, self.height, data)
    }
}

/// Generator for the studio room environment
#[derive(Debug, Clone, Copy)]
pub struct RoomEnvironment {
    pub width: u32,
    pub height: u32,
    /// Gaussian blur sigma in radians. Zero disables the blur.
    pub blur_sigma: f32,
}

impl Default for RoomEnvironment {
    fn default() -> Self {
        Self {
            width: 256,
            height: 128,
            blur_sigma: ROOM_BLUR_SIGMA,
        }
    }
}

impl RoomEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.width = width.max(2);
        self.height = height.max(1);
        self
    }

    /// Bake the room into an equirectangular map.
    pub fn generate(&self) -> EnvironmentMap {
        let (width, height) = (self.width.max(2), self.height.max(1));
        let mut texels = Vec::with_capacity((width * height) as usize);

        for row in 0..height {
            let theta = (row as f32 + 0.5) * PI / height as f32;
            let (sin_theta, cos_theta) = theta.sin_cos();

            for column in 0..width {
                let phi = ((column as f32 + 0.5) / width as f32 - 0.5) * TAU;
                let (sin_phi, cos_phi) = phi.sin_cos();
                let direction = Vec3::new(sin_theta * sin_phi, cos_theta, -sin_theta * cos_phi);
                texels.push(room_radiance(direction));
            }
        }

        let mut map = EnvironmentMap {
            width,
            height,
            texels,
        };
        if self.blur_sigma > 0.0 {
            blur(&mut map, self.blur_sigma);
        }
        log::debug!("Generated {width}x{height} room environment");
        map
    }
}

fn room_radiance(d: Vec3) -> Vec3 {
    let a = d.abs();
    if a.y >= a.x && a.y >= a.z {
        if d.y < 0.0 {
            return FLOOR;
        }
        // Light strip running along Z across the middle of the ceiling
        if (d.x / d.y).abs() < 0.25 {
            return CEILING_STRIP;
        }
        return CEILING;
    }
    // Window centered on the +X wall
    if a.x >= a.z && d.x > 0.0 && (d.z / d.x).abs() < 0.4 && (d.y / d.x).abs() < 0.3 {
        return WINDOW;
    }
    WALL
}

/// Separable gaussian. Longitude wraps, latitude clamps.
/// The horizontal kernel is not widened towards the poles.
fn blur(map: &mut EnvironmentMap, sigma: f32) {
    let (w, h) = (map.width as usize, map.height as usize);
    let sigma_px = (sigma * map.width as f32 / TAU).max(0.5);
    let kernel = gaussian_kernel(sigma_px);
    let radius = (kernel.len() / 2) as isize;

    let mut scratch = vec![Vec3::ZERO; map.texels.len()];
    for y in 0..h {
        for x in 0..w {
            let mut acc = Vec3::ZERO;
            for (i, weight) in kernel.iter().enumerate() {
                let sx = (x as isize + i as isize - radius).rem_euclid(w as isize) as usize;
                acc += map.texels[y * w + sx] * *weight;
            }
            scratch[y * w + x] = acc;
        }
    }

    for y in 0..h {
        for x in 0..w {
            let mut acc = Vec3::ZERO;
            for (i, weight) in kernel.iter().enumerate() {
                let sy = (y as isize + i as isize - radius).clamp(0, h as isize - 1) as usize;
                acc += scratch[sy * w + x] * *weight;
            }
            map.texels[y * w + x] = acc;
        }
    }
}

fn gaussian_kernel(sigma: f32) -> Vec<f32> {
    let radius = (sigma * 3.0).ceil() as isize;
    let mut kernel: Vec<f32> = (-radius..=radius)
        .map(|i| (-((i * i) as f32) / (2.0 * sigma * sigma)).exp())
        .collect();
    let total: f32 = kernel.iter().sum();
    for k in &mut kernel {
        *k /= total;
    }
    kernel
}

#[cfg(test)]
mod tests {
    use super::*;

    fn luminance(c: Vec3) -> f32 {
        c.dot(Vec3::new(0.2126, 0.7152, 0.0722))
    }

    #[test]
    fn ceiling_is_brighter_than_floor() {
        let map = RoomEnvironment::new().with_resolution(64, 32).generate();
        assert!(luminance(map.sample(Vec3::Y)) > luminance(map.sample(Vec3::NEG_Y)));
        assert!(luminance(map.sample(Vec3::X)) > luminance(map.sample(Vec3::NEG_X)));
    }

    #[test]
    fn blur_keeps_energy_finite_and_bounded() {
        let sharp = RoomEnvironment {
            blur_sigma: 0.0,
            ..RoomEnvironment::new().with_resolution(64, 32)
        }
        .generate();
        let soft = RoomEnvironment::new().with_resolution(64, 32).generate();

        assert!(soft.texels().iter().all(|t| t.is_finite()));
        let max_sharp = sharp.texels().iter().map(|t| t.max_element()).fold(0.0, f32::max);
        let max_soft = soft.texels().iter().map(|t| t.max_element()).fold(0.0, f32::max);
        assert!(max_soft <= max_sharp + 1e-4);
    }

    #[test]
    fn kernel_is_normalized() {
        let k = gaussian_kernel(1.5);
        assert_eq!(k.len() % 2, 1);
        assert!((k.iter().sum::<f32>() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn texture_export_is_opaque_rgba() {
        let map = RoomEnvironment::new().with_resolution(8, 4).generate();
        let tex = map.to_texture("room");
        assert_eq!((tex.width, tex.height), (8, 4));
        assert_eq!(tex.texel(0, 0).map(|t| t[3]), Some(255));
    }
}
