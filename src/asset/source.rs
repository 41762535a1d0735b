//! Byte sources for models and archives
//!
//! An [`AssetSource`] turns a URL into bytes. Futures are local (not `Send`)
//! because the browser fetch path runs on the page's single thread.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;

use super::progress::ProgressTracker;

/// Errors while fetching bytes
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("HTTP {status} while fetching {url}")]
    Http { url: String, status: u16 },
    #[error("{0}")]
    Js(String),
}

/// A boxed local future returning a `Result`.
pub type SourceFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, SourceError>> + 'a>>;

/// Fetches the bytes behind a URL
pub trait AssetSource {
    /// Read the entire resource, reporting byte progress to `progress`.
    fn fetch<'a>(
        &'a self,
        url: &'a str,
        progress: &'a ProgressTracker,
    ) -> SourceFuture<'a, Vec<u8>>;
}

impl<S: AssetSource + ?Sized> AssetSource for Arc<S> {
    fn fetch<'a>(
        &'a self,
        url: &'a str,
        progress: &'a ProgressTracker,
    ) -> SourceFuture<'a, Vec<u8>> {
        (**self).fetch(url, progress)
    }
}

impl<S: AssetSource + ?Sized> AssetSource for std::rc::Rc<S> {
    fn fetch<'a>(
        &'a self,
        url: &'a str,
        progress: &'a ProgressTracker,
    ) -> SourceFuture<'a, Vec<u8>> {
        (**self).fetch(url, progress)
    }
}

/// Resolve `reference` against the directory of `base`.
///
/// Absolute URLs, root-relative paths and data URIs are returned unchanged.
pub fn resolve_relative(base: &str, reference: &str) -> String {
    if reference.contains("://") || reference.starts_with("data:") || reference.starts_with('/') {
        return reference.to_string();
    }
    let base_path = base.split(['?', '#']).next().unwrap_or(base);
    match base_path.rfind('/') {
        Some(pos) => format!("{}{}", &base_path[..=pos], reference),
        None => reference.to_string(),
    }
}

/// In-memory source for tests and embedded assets.
///
/// Cloning shares the underlying files.
#[derive(Clone, Default)]
pub struct MemorySource {
    files: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrites any existing file at the same URL.
    pub fn insert(&self, url: impl Into<String>, data: Vec<u8>) {
        self.files.write().insert(url.into(), data);
    }

    pub fn with(self, url: impl Into<String>, data: Vec<u8>) -> Self {
        self.insert(url, data);
        self
    }

    pub fn remove(&self, url: &str) -> Option<Vec<u8>> {
        self.files.write().remove(url)
    }
}

impl AssetSource for MemorySource {
    fn fetch<'a>(
        &'a self,
        url: &'a str,
        progress: &'a ProgressTracker,
    ) -> SourceFuture<'a, Vec<u8>> {
        Box::pin(async move {
            let data = self
                .files
                .read()
                .get(url)
                .cloned()
                .ok_or_else(|| SourceError::NotFound(url.to_string()))?;
            let len = data.len() as u64;
            progress.update(len, Some(len));
            Ok::<_, SourceError>(data)
        })
    }
}

/// Reads URLs as paths below a root directory.
///
/// `file://` prefixes and leading slashes are stripped before joining.
#[cfg(not(target_arch = "wasm32"))]
pub struct FileSystemSource {
    root: std::path::PathBuf,
}

#[cfg(not(target_arch = "wasm32"))]
impl FileSystemSource {
    pub fn new(root: impl Into<std::path::PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, url: &str) -> std::path::PathBuf {
        let path = url.strip_prefix("file://").unwrap_or(url);
        let path = path.split(['?', '#']).next().unwrap_or(path);
        self.root.join(path.trim_start_matches('/'))
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl AssetSource for FileSystemSource {
    fn fetch<'a>(
        &'a self,
        url: &'a str,
        progress: &'a ProgressTracker,
    ) -> SourceFuture<'a, Vec<u8>> {
        let full_path = self.resolve(url);
        Box::pin(async move {
            let data = std::fs::read(&full_path).map_err(|err| {
                if err.kind() == std::io::ErrorKind::NotFound {
                    SourceError::NotFound(full_path.display().to_string())
                } else {
                    SourceError::Io(err)
                }
            })?;
            let len = data.len() as u64;
            progress.update(len, Some(len));
            Ok::<_, SourceError>(data)
        })
    }
}
