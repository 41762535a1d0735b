//! Error types surfaced by the viewer session and asset loader.

use std::time::Duration;

use thiserror::Error;

use crate::asset::archive::ArchiveError;
use crate::asset::source::SourceError;
use crate::backend::RenderError;
use crate::session::SessionState;

/// Failure while fetching or parsing a model and its companion files.
///
/// The loader never retries; the caller decides whether a fresh load is worth it.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Failed to fetch asset: {0}")]
    Source(#[from] SourceError),
    #[error("Failed to read material archive: {0}")]
    Archive(#[from] ArchiveError),
    #[error("Failed to parse glTF: {0}")]
    Gltf(#[from] gltf_dep::Error),
    #[error("glTF buffer error: {0}")]
    GltfBuffer(String),
    #[error("Failed to parse OBJ: {0}")]
    Obj(#[from] tobj::LoadError),
    #[error("Load cancelled")]
    Cancelled,
    #[error("Load timed out after {0:?}")]
    TimedOut(Duration),
}

/// Top-level viewer error.
#[derive(Error, Debug)]
pub enum ViewerError {
    /// The container already hosts a viewer. Fatal: retry only with a fresh container.
    #[error("Attempted to load viewer, but it has already been loaded")]
    DuplicateSession,
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("Invalid session state: expected {expected}, found {actual:?}")]
    InvalidState {
        expected: &'static str,
        actual: SessionState,
    },
}

pub type ViewerResult<T> = Result<T, ViewerError>;
