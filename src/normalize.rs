//! Recentering and uniform scaling of loaded models
//!
//! After normalization the model's bounding box is centered on the origin
//! and its longest axis spans [`REFERENCE_SIZE`]. The scale is the minimum of
//! the per-axis factors, so aspect ratio is preserved.

use glam::{Mat4, Vec3};

use crate::config::REFERENCE_SIZE;
use crate::scene::SceneNode;

/// What normalization did to a model
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NormalizeOutcome {
    /// Centered and scaled by `scale`; `center` was the box center before.
    Normalized { center: Vec3, scale: f32 },
    /// Zero extent on every axis. Centered, but left at its original scale.
    Degenerate { center: Vec3 },
    /// No geometry at all. Left untouched.
    Empty,
}

#[derive(Debug, Clone, Copy)]
pub struct TransformNormalizer {
    reference_size: f32,
}

impl Default for TransformNormalizer {
    fn default() -> Self {
        Self::new(REFERENCE_SIZE)
    }
}

impl TransformNormalizer {
    pub fn new(reference_size: f32) -> Self {
        Self { reference_size }
    }

    pub fn reference_size(&self) -> f32 {
        self.reference_size
    }

    /// Uniform factor fitting `size` into the reference cube.
    ///
    /// Zero-extent axes are ignored. `None` when every axis is zero.
    pub fn scale_for(&self, size: Vec3) -> Option<f32> {
        size.to_array()
            .into_iter()
            .filter(|extent| *extent > 0.0 && extent.is_finite())
            .map(|extent| self.reference_size / extent)
            .reduce(f32::min)
    }

    /// Center and scale `root` in place, in the space it is attached to.
    pub fn normalize(&self, root: &mut SceneNode) -> NormalizeOutcome {
        let bounds = root.bounds(Mat4::IDENTITY);
        if bounds.is_empty() {
            log::warn!("Model has no geometry, skipping normalization");
            return NormalizeOutcome::Empty;
        }

        let center = bounds.center();
        root.transform.translate(-center);

        let Some(scale) = self.scale_for(bounds.size()) else {
            log::warn!("Model bounding box has zero extent, skipping scaling");
            return NormalizeOutcome::Degenerate { center };
        };
        root.transform.scale_about_origin(scale);

        log::debug!(
            "Normalized model: center {center}, size {}, scale {scale}",
            bounds.size()
        );
        NormalizeOutcome::Normalized { center, scale }
    }
}
