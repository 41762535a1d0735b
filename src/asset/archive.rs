//! Material archive extraction
//!
//! An OBJ model may come with a zip archive carrying its `.mtl` file and the
//! texture images it references. Entries are classified by lowercase
//! extension; macOS resource-fork junk is skipped. Images are decoded into
//! [`TextureTable`] entries keyed by their full archive path.

use std::borrow::Cow;
use std::io::{Cursor, Read};

use thiserror::Error;

use crate::cancel::{checkpoint, CancellationToken};
use crate::error::LoadError;
use crate::resources::{Texture, TextureTable};

/// Entries under this prefix are never classified.
pub const JUNK_PREFIX: &str = "__MACOSX";

/// Image extensions decoded as textures
pub const TEXTURE_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "jfif", "pjp", "pjpeg", "bmp", "dib", "gif", "svg", "webp",
];

/// Largest decompressed entry accepted from an archive
pub const MAX_ENTRY_BYTES: u64 = 256 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("archive entry '{path}' is too large ({size} bytes, limit {MAX_ENTRY_BYTES})")]
    EntryTooLarge { path: String, size: u64 },
}

/// Classification of one archive entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    Model,
    Material,
    Texture,
    Ignored,
}

impl EntryKind {
    /// Classify an archive path. Pure: the same path always yields the same kind.
    pub fn classify(path: &str) -> Self {
        if path.starts_with(JUNK_PREFIX) || path.ends_with('/') {
            return EntryKind::Ignored;
        }
        let file = path.rsplit('/').next().unwrap_or(path);
        let Some((_, ext)) = file.rsplit_once('.') else {
            return EntryKind::Ignored;
        };
        let ext = ext.to_ascii_lowercase();
        match ext.as_str() {
            "obj" => EntryKind::Model,
            "mtl" => EntryKind::Material,
            ext if TEXTURE_EXTENSIONS.contains(&ext) => EntryKind::Texture,
            _ => EntryKind::Ignored,
        }
    }
}

/// A classified, decompressed archive entry
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    pub path: String,
    pub kind: EntryKind,
    pub bytes: Vec<u8>,
}

impl ArchiveEntry {
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }
}

/// Partitioned archive
#[derive(Debug, Default)]
pub struct ArchiveContents {
    pub model: Option<ArchiveEntry>,
    pub material: Option<ArchiveEntry>,
    pub textures: TextureTable,
    /// Texture entries that failed to decode
    pub skipped: Vec<String>,
}

/// Extract entries from a zip archive.
///
/// Ignored entries are listed without their bytes being decompressed.
/// Entries over [`MAX_ENTRY_BYTES`], declared or actual, fail the whole
/// archive.
pub fn read_entries(bytes: &[u8]) -> Result<Vec<ArchiveEntry>, ArchiveError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
    let mut entries = Vec::with_capacity(archive.len());

    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        if file.is_dir() {
            continue;
        }
        let path = file.name().to_string();
        let kind = EntryKind::classify(&path);
        let mut data = Vec::new();
        if kind != EntryKind::Ignored {
            let declared = file.size();
            if declared > MAX_ENTRY_BYTES {
                return Err(ArchiveError::EntryTooLarge {
                    path,
                    size: declared,
                });
            }
            (&mut file).take(MAX_ENTRY_BYTES + 1).read_to_end(&mut data)?;
            if data.len() as u64 > MAX_ENTRY_BYTES {
                return Err(ArchiveError::EntryTooLarge {
                    path,
                    size: data.len() as u64,
                });
            }
        }
        entries.push(ArchiveEntry {
            path,
            kind,
            bytes: data,
        });
    }

    Ok(entries)
}

/// Resolves material archives into model, material and textures
pub struct ArchiveResolver;

impl ArchiveResolver {
    /// Decompress, classify and decode an archive.
    ///
    /// Yields to the executor between entries so that a cancel or timeout is
    /// observed during long decodes.
    pub async fn resolve(
        bytes: &[u8],
        token: &CancellationToken,
    ) -> Result<ArchiveContents, LoadError> {
        let entries = read_entries(bytes)?;
        checkpoint(token).await?;

        let mut contents = ArchiveContents::default();
        for entry in entries {
            match entry.kind {
                EntryKind::Model => {
                    if let Some(previous) = &contents.model {
                        log::warn!(
                            "Archive holds several models; '{}' replaces '{}'",
                            entry.path,
                            previous.path
                        );
                    }
                    contents.model = Some(entry);
                }
                EntryKind::Material => {
                    if let Some(previous) = &contents.material {
                        log::warn!(
                            "Archive holds several material files; '{}' replaces '{}'",
                            entry.path,
                            previous.path
                        );
                    }
                    contents.material = Some(entry);
                }
                EntryKind::Texture => {
                    match Texture::from_bytes(&entry.bytes, &entry.path) {
                        Ok(texture) => {
                            log::debug!(
                                "Decoded texture '{}' ({}x{})",
                                entry.path,
                                texture.width,
                                texture.height
                            );
                            contents.textures.insert(entry.path, texture.into_handle());
                        }
                        Err(err) => {
                            log::warn!("Skipping texture '{}': {err}", entry.path);
                            contents.skipped.push(entry.path);
                        }
                    }
                    checkpoint(token).await?;
                }
                EntryKind::Ignored => {}
            }
        }

        log::info!(
            "Archive resolved: model={:?}, material={:?}, {} texture(s)",
            contents.model.as_ref().map(|e| e.path.as_str()),
            contents.material.as_ref().map(|e| e.path.as_str()),
            contents.textures.len()
        );
        Ok(contents)
    }
}
