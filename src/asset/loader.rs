//! Format dispatch and the load pipeline
//!
//! OBJ goes through the OBJ path; GLB, GLTF and anything unrecognized go
//! through the glTF path. On the OBJ path the material archive is fetched,
//! resolved and bound before the geometry is parsed, so the parsed meshes
//! reference valid materials from the start.

use std::rc::Rc;
use std::time::Duration;

use super::archive::ArchiveResolver;
use super::binder::MaterialBinder;
use super::gltf::load_gltf;
use super::obj::ObjLoader;
use super::progress::{ProgressSink, ProgressTracker};
use super::source::AssetSource;
use crate::cancel::{checkpoint, CancellableExt, CancellationToken, TimeoutGuard};
use crate::config::{ModelFormat, ViewerConfig};
use crate::error::LoadError;
use crate::resources::MaterialDescriptor;
use crate::scene::{Camera, SceneNode};

/// Per-load controls
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Cancelling this token aborts the load at its next suspension point.
    pub token: CancellationToken,
    /// `None` waits forever.
    pub timeout: Option<Duration>,
}

impl LoadOptions {
    pub fn new(token: CancellationToken) -> Self {
        Self {
            token,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

/// A parsed model, ready to be normalized and attached to a scene
#[derive(Debug, Clone)]
pub struct LoadedModel {
    pub url: String,
    pub format: ModelFormat,
    pub root: SceneNode,
    /// Mesh material indices refer to this list.
    pub materials: Vec<MaterialDescriptor>,
    /// Embedded cameras with their world placement, in node order
    pub cameras: Vec<Camera>,
}

/// Loads models through an [`AssetSource`]
pub struct AssetLoader<S> {
    source: S,
}

impl<S: AssetSource> AssetLoader<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Load the model named by `config`.
    ///
    /// Progress of the model download goes to `progress`. Failures are
    /// returned with their cause; nothing is retried.
    pub async fn load(
        &self,
        config: &ViewerConfig,
        progress: Rc<dyn ProgressSink>,
        options: &LoadOptions,
    ) -> Result<LoadedModel, LoadError> {
        let token = options.token.child_token();
        let _timeout = options.timeout.map(|after| TimeoutGuard::arm(&token, after));

        log::info!(
            "Loading '{}' as {:?}",
            config.model_url,
            config.model_format
        );
        let tracker = ProgressTracker::new(progress);
        let result = match config.model_format {
            ModelFormat::Obj => self.load_obj(config, &tracker, &token).await,
            ModelFormat::Gltf | ModelFormat::Glb => self.load_gltf(config, &tracker, &token).await,
        };

        match &result {
            Ok(model) => log::info!(
                "Loaded '{}': {} node(s), {} mesh(es)",
                model.url,
                model.root.node_count(),
                model.root.mesh_count()
            ),
            Err(err) => log::error!("Failed to load '{}': {err}", config.model_url),
        }
        result
    }

    async fn fetch(
        &self,
        url: &str,
        tracker: &ProgressTracker,
        token: &CancellationToken,
    ) -> Result<Vec<u8>, LoadError> {
        Ok(self.source.fetch(url, tracker).cancellable(token).await??)
    }

    async fn load_obj(
        &self,
        config: &ViewerConfig,
        tracker: &ProgressTracker,
        token: &CancellationToken,
    ) -> Result<LoadedModel, LoadError> {
        let mut obj = ObjLoader::new();

        if let Some(archive_url) = &config.materials_archive_url {
            log::debug!("Fetching material archive '{archive_url}'");
            let bytes = self
                .fetch(archive_url, &ProgressTracker::silent(), token)
                .await?;
            let contents = ArchiveResolver::resolve(&bytes, token).await?;
            match &contents.material {
                Some(entry) => {
                    let library = MaterialBinder::bind(&entry.text(), &contents.textures);
                    log::info!(
                        "Bound {} material(s) from '{}'",
                        library.len(),
                        entry.path
                    );
                    obj.set_materials(library);
                }
                None => log::warn!(
                    "Material archive '{archive_url}' has no .mtl file, using default materials"
                ),
            }
        }

        let bytes = self.fetch(&config.model_url, tracker, token).await?;
        tracker.finish();
        checkpoint(token).await?;

        let (root, materials) = obj.parse(&bytes, file_name(&config.model_url))?;
        Ok(LoadedModel {
            url: config.model_url.clone(),
            format: ModelFormat::Obj,
            root,
            materials,
            cameras: Vec::new(),
        })
    }

    async fn load_gltf(
        &self,
        config: &ViewerConfig,
        tracker: &ProgressTracker,
        token: &CancellationToken,
    ) -> Result<LoadedModel, LoadError> {
        let bytes = self.fetch(&config.model_url, tracker, token).await?;
        tracker.finish();

        let model = load_gltf(&bytes, &config.model_url, &self.source, token).await?;
        Ok(LoadedModel {
            url: config.model_url.clone(),
            format: config.model_format,
            root: model.root,
            materials: model.materials,
            cameras: model.cameras,
        })
    }
}

fn file_name(url: &str) -> &str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/').next().unwrap_or(path)
}
