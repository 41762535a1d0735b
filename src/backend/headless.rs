//! Headless backend for testing and tooling.
//!
//! This backend doesn't rasterize anything. It walks the scene the way a GPU
//! backend would, uploads textures (releasing their CPU copies) and records
//! a [`FrameRecord`] per frame.

use std::sync::Arc;

use glam::{Mat4, Vec3};

use super::traits::{GpuTextureId, RenderBackend, RenderError, RenderResult};
use crate::resources::TextureHandle;
use crate::scene::{Camera, Color, Scene};

/// What one headless frame contained
#[derive(Debug, Clone, PartialEq)]
pub struct FrameRecord {
    pub width: u32,
    pub height: u32,
    pub background: Color,
    pub view_projection: Mat4,
    pub camera_position: Vec3,
    pub draw_calls: usize,
    pub lights: usize,
    pub textures_bound: usize,
    pub environment: bool,
}

/// Headless render backend.
#[derive(Debug)]
pub struct HeadlessBackend {
    width: u32,
    height: u32,
    frames: Vec<FrameRecord>,
    resizes: Vec<(u32, u32)>,
    uploaded: Vec<(TextureHandle, GpuTextureId)>,
    next_texture_id: u64,
    surface_lost: bool,
}

impl HeadlessBackend {
    /// Create a new headless backend with an initial surface size.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            frames: Vec::new(),
            resizes: Vec::new(),
            uploaded: Vec::new(),
            next_texture_id: 1,
            surface_lost: false,
        }
    }

    /// Frames rendered so far, oldest first
    pub fn frames(&self) -> &[FrameRecord] {
        &self.frames
    }

    pub fn last_frame(&self) -> Option<&FrameRecord> {
        self.frames.last()
    }

    /// Every resize applied to the surface, in order
    pub fn resizes(&self) -> &[(u32, u32)] {
        &self.resizes
    }

    pub fn uploaded_textures(&self) -> usize {
        self.uploaded.len()
    }

    /// Id of `texture` if it has been uploaded
    pub fn texture_id(&self, texture: &TextureHandle) -> Option<GpuTextureId> {
        self.uploaded
            .iter()
            .find(|(t, _)| Arc::ptr_eq(t, texture))
            .map(|(_, id)| *id)
    }

    /// Make the next frame fail with [`RenderError::SurfaceLost`].
    pub fn lose_surface(&mut self) {
        self.surface_lost = true;
    }

    fn upload(&mut self, texture: &TextureHandle) -> GpuTextureId {
        if let Some(id) = self.texture_id(texture) {
            return id;
        }
        let id = GpuTextureId(self.next_texture_id);
        self.next_texture_id += 1;

        match texture.take_pixels() {
            Some(pixels) => log::trace!(
                "HeadlessBackend: uploading texture '{}' ({}x{}) len={}",
                texture.name,
                texture.width,
                texture.height,
                pixels.len()
            ),
            None => log::warn!(
                "HeadlessBackend: texture '{}' has no pixel data to upload",
                texture.name
            ),
        }
        self.uploaded.push((texture.clone(), id));
        id
    }
}

impl Default for HeadlessBackend {
    fn default() -> Self {
        Self::new(1, 1)
    }
}

impl RenderBackend for HeadlessBackend {
    fn name(&self) -> &'static str {
        "Headless Backend"
    }

    fn resize(&mut self, width: u32, height: u32) {
        log::trace!("HeadlessBackend: resize {width}x{height}");
        self.width = width;
        self.height = height;
        self.resizes.push((width, height));
    }

    fn surface_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn render(&mut self, scene: &Scene, camera: &Camera) -> RenderResult<()> {
        if std::mem::take(&mut self.surface_lost) {
            return Err(RenderError::SurfaceLost);
        }

        let textures = scene.textures();
        for texture in &textures {
            self.upload(texture);
        }

        let mut draw_calls = 0;
        for root in &scene.nodes {
            root.visit(Mat4::IDENTITY, &mut |node, _world| {
                draw_calls += node.meshes.iter().filter(|m| !m.positions.is_empty()).count();
            });
        }

        let frame = FrameRecord {
            width: self.width,
            height: self.height,
            background: scene.background,
            view_projection: camera.view_projection_matrix(),
            camera_position: camera.position,
            draw_calls,
            lights: scene.lights().len(),
            textures_bound: textures.len(),
            environment: scene.environment.is_some(),
        };
        log::trace!(
            "HeadlessBackend: frame {} with {} draw call(s)",
            self.frames.len(),
            frame.draw_calls
        );
        self.frames.push(frame);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::{MaterialDescriptor, Texture, TextureChannel, TextureSlot};

    #[test]
    fn upload_releases_cpu_pixels_once() {
        let texture = Texture::solid_color([255, 0, 0, 255], "red").into_handle();
        let mut material = MaterialDescriptor::new("m");
        material.set_texture(TextureChannel::Diffuse, TextureSlot::Bound(texture.clone()));

        let mut scene = Scene::new();
        scene.materials.push(material);

        let mut backend = HeadlessBackend::new(4, 4);
        assert!(!texture.is_resident());
        backend.render(&scene, &Camera::default()).unwrap();
        backend.render(&scene, &Camera::default()).unwrap();

        assert!(texture.is_resident());
        assert_eq!(texture.cpu_bytes(), 0);
        assert_eq!(backend.uploaded_textures(), 1);
        assert_eq!(backend.frames().len(), 2);
        assert_eq!(backend.texture_id(&texture), Some(GpuTextureId(1)));
    }

    #[test]
    fn lost_surface_fails_one_frame() {
        let mut backend = HeadlessBackend::new(4, 4);
        backend.lose_surface();
        let scene = Scene::new();
        assert_eq!(
            backend.render(&scene, &Camera::default()),
            Err(RenderError::SurfaceLost)
        );
        assert!(backend.render(&scene, &Camera::default()).is_ok());
    }
}
