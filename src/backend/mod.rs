//! Render backend abstraction
//!
//! The session draws through [`RenderBackend`]. [`WgpuBackend`] rasterizes
//! into a real surface (the page canvas on the web). [`HeadlessBackend`]
//! records frames instead of drawing them; it backs the `model_probe` CLI
//! and the tests.

pub mod headless;
pub mod traits;
pub mod wgpu_backend;

pub use headless::*;
pub use traits::*;
pub use wgpu_backend::WgpuBackend;
