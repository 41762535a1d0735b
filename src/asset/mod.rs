//! Asset loading
//!
//! Fetching ([`source`]), archive extraction ([`archive`]), texture binding
//! ([`binder`]) and the per-format parsers, tied together by [`AssetLoader`].

pub mod archive;
pub mod binder;
pub mod gltf;
pub mod loader;
pub mod obj;
pub mod progress;
pub mod source;

pub use archive::{ArchiveContents, ArchiveEntry, ArchiveResolver, EntryKind};
pub use binder::MaterialBinder;
pub use loader::{AssetLoader, LoadOptions, LoadedModel};
pub use obj::ObjLoader;
pub use progress::{NoProgress, ProgressLog, ProgressSink, ProgressTracker};
#[cfg(not(target_arch = "wasm32"))]
pub use source::FileSystemSource;
pub use source::{AssetSource, MemorySource, SourceError};
