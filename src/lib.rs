//! Model Viewer - an embeddable single-canvas viewer for uploaded 3D assets
//!
//! Supports two asset families:
//! - **GLTF/GLB**: JSON or binary scenes, including embedded cameras and
//!   `KHR_lights_punctual` lights
//! - **OBJ + MTL**: meshes with an optional zip archive carrying the material
//!   file and its texture images
//!
//! # Features
//! - Format dispatch with graceful fallback to the GLTF path
//! - Archive extraction with texture-to-material binding by filename
//! - Recentering and uniform scaling into a fixed reference cube
//! - Camera and lighting resolution: explicit override, then file data, then defaults
//! - Render/resize loop with a single session per container
//! - Web support via WebAssembly (`web` module)

pub mod asset;
pub mod backend;
pub mod cancel;
pub mod config;
pub mod configurator;
pub mod environment;
pub mod error;
pub mod normalize;
pub mod resources;
pub mod scene;
pub mod session;

// Web-specific modules
#[cfg(target_arch = "wasm32")]
pub mod web;

pub use asset::{AssetLoader, AssetSource, LoadOptions, LoadedModel, MemorySource, ProgressSink};
pub use backend::{HeadlessBackend, RenderBackend, WgpuBackend};
pub use cancel::CancellationToken;
pub use config::{CameraSpec, LightKind, ModelFormat, ViewerConfig, ViewerSettings};
pub use configurator::{AppliedDefaults, CameraSource, Configured, SceneConfigurator};
pub use error::{LoadError, ViewerError};
pub use environment::{EnvironmentMap, RoomEnvironment};
pub use normalize::{NormalizeOutcome, TransformNormalizer};
pub use session::{Container, FrameStatus, HeadlessContainer, SessionState, ViewerSession};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize logging for native builds.
#[cfg(not(target_arch = "wasm32"))]
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
    log::info!("Model viewer v{} initialized", VERSION);
}

// Web initialization helper
#[cfg(target_arch = "wasm32")]
pub fn init_logging() {
    // Set up panic hook for better error messages in console
    console_error_panic_hook::set_once();
    // A second init (another viewer on the same page) keeps the first logger
    let _ = console_log::init_with_level(log::Level::Info);
    log::info!("Model viewer v{} initialized", VERSION);
}
