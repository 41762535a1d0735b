//! Viewer session lifecycle
//!
//! One [`ViewerSession`] is bound to one [`Container`]. Construction claims
//! the container (failing if another session already holds it), a single
//! load brings the model in, and [`ViewerSession::frame`] is then called once
//! per display frame by the host.
//!
//! ```text
//! Constructing -> Loading -> Ready -> Rendering
//!                    |                    |
//!                  Failed              Stopped (shutdown / drop)
//! ```

use std::cell::RefCell;
use std::rc::Rc;

use glam::Vec3;

use crate::asset::{AssetLoader, AssetSource, LoadOptions, ProgressSink};
use crate::backend::RenderBackend;
use crate::cancel::CancellationToken;
use crate::config::ViewerConfig;
use crate::configurator::{AppliedDefaults, CameraSource, SceneConfigurator};
use crate::error::{ViewerError, ViewerResult};
use crate::normalize::{NormalizeOutcome, TransformNormalizer};
use crate::scene::{Camera, CameraController, CameraInput, OrbitController, Scene};

/// Host element the viewer draws into.
///
/// Methods take `&self`; hosts keep their own interior mutability (DOM
/// elements already behave that way).
pub trait Container {
    /// Carries the "already hosts a viewer" marker
    fn is_loaded(&self) -> bool;
    fn set_loaded(&self, loaded: bool);
    /// Insert the render surface
    fn attach_surface(&self);
    /// Remove the render surface
    fn detach_surface(&self);
    /// Currently displayed size in pixels. Must not change anything.
    fn display_size(&self) -> (u32, u32);
    /// Set the render surface's backing size in pixels
    fn resize_surface(&self, width: u32, height: u32);
}

/// Lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Container claimed, no load started yet
    Constructing,
    Loading,
    /// Model loaded and configured, no frame drawn yet
    Ready,
    Rendering,
    /// The last load failed. Another load may be attempted unless the
    /// session's token was cancelled.
    Failed,
    Stopped,
}

/// Outcome of one [`ViewerSession::frame`] call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    Rendered { resized: bool },
    /// Nothing to draw yet (constructing, loading or failed)
    NotReady,
    Stopped,
}

/// In-memory container for headless hosts and tests.
///
/// Clones share state, so a test can keep a handle to inspect the container
/// while the session owns another.
#[derive(Debug, Clone, Default)]
pub struct HeadlessContainer {
    inner: Rc<RefCell<HeadlessContainerState>>,
}

#[derive(Debug, Default)]
struct HeadlessContainerState {
    loaded: bool,
    surface: bool,
    width: u32,
    height: u32,
    surface_size: (u32, u32),
    surface_resizes: usize,
    mutations: usize,
}

impl HeadlessContainer {
    pub fn new(width: u32, height: u32) -> Self {
        let container = Self::default();
        container.set_display_size(width, height);
        container
    }

    pub fn set_display_size(&self, width: u32, height: u32) {
        let mut inner = self.inner.borrow_mut();
        inner.width = width;
        inner.height = height;
    }

    pub fn has_surface(&self) -> bool {
        self.inner.borrow().surface
    }

    /// Number of marker and surface changes made by sessions
    pub fn mutations(&self) -> usize {
        self.inner.borrow().mutations
    }

    /// Backing size last given to the surface
    pub fn surface_size(&self) -> (u32, u32) {
        self.inner.borrow().surface_size
    }

    pub fn surface_resizes(&self) -> usize {
        self.inner.borrow().surface_resizes
    }
}

impl Container for HeadlessContainer {
    fn is_loaded(&self) -> bool {
        self.inner.borrow().loaded
    }

    fn set_loaded(&self, loaded: bool) {
        let mut inner = self.inner.borrow_mut();
        inner.loaded = loaded;
        inner.mutations += 1;
    }

    fn attach_surface(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.surface = true;
        inner.mutations += 1;
    }

    fn detach_surface(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.surface = false;
        inner.mutations += 1;
    }

    fn display_size(&self) -> (u32, u32) {
        let inner = self.inner.borrow();
        (inner.width, inner.height)
    }

    fn resize_surface(&self, width: u32, height: u32) {
        let mut inner = self.inner.borrow_mut();
        inner.surface_size = (width, height);
        inner.surface_resizes += 1;
    }
}

/// One viewer instance bound to one container
pub struct ViewerSession<C: Container, R: RenderBackend> {
    container: C,
    backend: R,
    config: ViewerConfig,
    state: SessionState,
    scene: Scene,
    camera: Option<Camera>,
    controller: Option<OrbitController>,
    input: CameraInput,
    surface_size: (u32, u32),
    token: CancellationToken,
    normalizer: TransformNormalizer,
    configurator: SceneConfigurator,
    camera_source: Option<CameraSource>,
    applied: AppliedDefaults,
    normalized: Option<NormalizeOutcome>,
}

impl<C: Container, R: RenderBackend> ViewerSession<C, R> {
    /// Claim `container` and attach the render surface.
    ///
    /// Fails with [`ViewerError::DuplicateSession`] if the container already
    /// hosts a viewer; the container is left untouched in that case.
    pub fn new(container: C, mut backend: R, config: ViewerConfig) -> ViewerResult<Self> {
        if container.is_loaded() {
            log::error!("Attempted to load viewer, but it has already been loaded");
            return Err(ViewerError::DuplicateSession);
        }

        container.attach_surface();
        container.set_loaded(true);

        let (width, height) = container.display_size();
        if width > 0 && height > 0 {
            container.resize_surface(width, height);
        }
        backend.resize(width, height);
        log::debug!(
            "Viewer session created for '{}' on {} ({width}x{height})",
            config.model_url,
            backend.name()
        );

        Ok(Self {
            container,
            backend,
            config,
            state: SessionState::Constructing,
            scene: Scene::new(),
            camera: None,
            controller: None,
            input: CameraInput::new(),
            surface_size: (width, height),
            token: CancellationToken::new(),
            normalizer: TransformNormalizer::default(),
            configurator: SceneConfigurator::new(),
            camera_source: None,
            applied: AppliedDefaults::empty(),
            normalized: None,
        })
    }

    /// Use a custom normalizer, e.g. with a different reference size.
    pub fn with_normalizer(mut self, normalizer: TransformNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn with_configurator(mut self, configurator: SceneConfigurator) -> Self {
        self.configurator = configurator;
        self
    }

    /// Load the configured model and set up the scene.
    ///
    /// Load → normalize (OBJ only) → configure → controls, strictly in that
    /// order. A failed load leaves the session in [`SessionState::Failed`]
    /// with the previous scene untouched.
    pub async fn load<S: AssetSource>(
        &mut self,
        loader: &AssetLoader<S>,
        progress: Rc<dyn ProgressSink>,
    ) -> ViewerResult<()> {
        match self.state {
            SessionState::Constructing | SessionState::Failed => {}
            actual => {
                return Err(ViewerError::InvalidState {
                    expected: "Constructing or Failed",
                    actual,
                })
            }
        }
        self.state = SessionState::Loading;

        let options = LoadOptions::new(self.token.clone()).with_timeout(self.config.load_timeout);
        let mut model = match loader.load(&self.config, progress, &options).await {
            Ok(model) => model,
            Err(err) => {
                self.state = SessionState::Failed;
                return Err(err.into());
            }
        };

        self.normalized = if model.format.is_obj() {
            Some(self.normalizer.normalize(&mut model.root))
        } else {
            None
        };

        let mut scene = Scene::new();
        scene.add_model(
            std::mem::take(&mut model.root),
            std::mem::take(&mut model.materials),
        );
        let configured =
            self.configurator
                .configure(&mut scene, &model, &self.config, self.viewport_aspect());

        // Controls follow the final camera, never an earlier one
        self.controller = Some(OrbitController::attached(&configured.camera, Vec3::ZERO));
        self.camera = Some(configured.camera);
        self.camera_source = Some(configured.camera_source);
        self.applied = configured.applied;
        self.scene = scene;
        self.state = SessionState::Ready;

        log::info!(
            "Viewer ready: camera from {:?}, defaults applied {:?}",
            configured.camera_source,
            configured.applied
        );
        Ok(())
    }

    /// Draw one frame.
    ///
    /// The surface follows the container's displayed size, resized only when
    /// that size changed since the last resize.
    pub fn frame(&mut self, dt: f32) -> ViewerResult<FrameStatus> {
        match self.state {
            SessionState::Ready | SessionState::Rendering => {}
            SessionState::Stopped => return Ok(FrameStatus::Stopped),
            _ => return Ok(FrameStatus::NotReady),
        }

        let resized = self.sync_surface_size();

        let (Some(camera), Some(controller)) = (self.camera.as_mut(), self.controller.as_mut())
        else {
            return Ok(FrameStatus::NotReady);
        };
        controller.update(camera, &self.input, dt);
        self.input.reset_deltas();

        self.state = SessionState::Rendering;
        self.backend.render(&self.scene, camera)?;
        Ok(FrameStatus::Rendered { resized })
    }

    /// Apply a window resize immediately, outside the frame loop.
    pub fn on_window_resize(&mut self) {
        if self.state != SessionState::Stopped {
            self.sync_surface_size();
        }
    }

    /// Cancel any load in flight, detach the surface and release the container.
    pub fn shutdown(&mut self) {
        if self.state == SessionState::Stopped {
            return;
        }
        self.token.cancel();
        self.container.detach_surface();
        self.container.set_loaded(false);
        self.state = SessionState::Stopped;
        log::debug!("Viewer session for '{}' stopped", self.config.model_url);
    }

    fn viewport_aspect(&self) -> f32 {
        let (width, height) = self.container.display_size();
        if width == 0 || height == 0 {
            1.0
        } else {
            width as f32 / height as f32
        }
    }

    fn sync_surface_size(&mut self) -> bool {
        let size = self.container.display_size();
        if size == self.surface_size || size.0 == 0 || size.1 == 0 {
            return false;
        }
        let (width, height) = size;
        log::debug!("Resizing surface to {width}x{height}");
        self.container.resize_surface(width, height);
        self.backend.resize(width, height);
        if let Some(camera) = self.camera.as_mut() {
            camera.set_aspect(width as f32, height as f32);
        }
        self.surface_size = size;
        true
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// Active camera, once loaded
    pub fn camera(&self) -> Option<&Camera> {
        self.camera.as_ref()
    }

    pub fn controller(&self) -> Option<&OrbitController> {
        self.controller.as_ref()
    }

    /// Input consumed by the orbit controls on the next frame
    pub fn input_mut(&mut self) -> &mut CameraInput {
        &mut self.input
    }

    pub fn camera_source(&self) -> Option<CameraSource> {
        self.camera_source
    }

    pub fn applied_defaults(&self) -> AppliedDefaults {
        self.applied
    }

    /// `None` unless the model went through normalization
    pub fn normalize_outcome(&self) -> Option<NormalizeOutcome> {
        self.normalized
    }

    pub fn container(&self) -> &C {
        &self.container
    }

    pub fn backend(&self) -> &R {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut R {
        &mut self.backend
    }

    /// The session's cancellation token.
    ///
    /// Cancelling it aborts the load in flight and every later load, which
    /// fail with [`crate::error::LoadError::Cancelled`]. Frames keep drawing
    /// whatever scene is already loaded; [`ViewerSession::shutdown`] stops
    /// the session.
    pub fn cancel_handle(&self) -> CancellationToken {
        self.token.clone()
    }
}

impl<C: Container, R: RenderBackend> Drop for ViewerSession<C, R> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
