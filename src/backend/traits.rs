//! Core backend abstraction traits

use thiserror::Error;

use crate::scene::{Camera, Scene};

/// Backend error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("Surface lost")]
    SurfaceLost,
    #[error("Backend failure: {0}")]
    Backend(String),
}

pub type RenderResult<T> = Result<T, RenderError>;

/// Handle to a texture uploaded to the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GpuTextureId(pub(crate) u64);

impl GpuTextureId {
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Something that can present a [`Scene`] on a surface.
pub trait RenderBackend {
    /// Backend name for logs
    fn name(&self) -> &'static str;

    /// Resize the render surface
    fn resize(&mut self, width: u32, height: u32);

    /// Current surface size
    fn surface_size(&self) -> (u32, u32);

    /// Draw one frame of `scene` as seen from `camera`.
    ///
    /// Textures are uploaded on first use. Uploading releases the texture's
    /// CPU copy.
    fn render(&mut self, scene: &Scene, camera: &Camera) -> RenderResult<()>;
}

impl<B: RenderBackend + ?Sized> RenderBackend for Box<B> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn resize(&mut self, width: u32, height: u32) {
        (**self).resize(width, height)
    }

    fn surface_size(&self) -> (u32, u32) {
        (**self).surface_size()
    }

    fn render(&mut self, scene: &Scene, camera: &Camera) -> RenderResult<()> {
        (**self).render(scene, camera)
    }
}
