//! Texture loading and residency
//!
//! A [`Texture`] owns its decoded RGBA8 pixels until a backend uploads it.
//! The upload takes the pixel buffer out ([`Texture::take_pixels`]), which is
//! the moment the CPU-side copy is released.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use image::{DynamicImage, GenericImageView};
use parking_lot::Mutex;

/// Shared handle usable directly as a material map source
pub type TextureHandle = Arc<Texture>;

/// Decoded texture
pub struct Texture {
    /// Archive path or file name the texture was decoded from
    pub name: String,
    pub width: u32,
    pub height: u32,
    pixels: Mutex<Option<Vec<u8>>>,
    resident: AtomicBool,
}

impl Texture {
    /// RGBA8 pixel data, row-major
    pub fn from_rgba(name: impl Into<String>, width: u32, height: u32, data: Vec<u8>) -> Self {
        debug_assert_eq!(data.len(), (width * height * 4) as usize);
        Self {
            name: name.into(),
            width,
            height,
            pixels: Mutex::new(Some(data)),
            resident: AtomicBool::new(false),
        }
    }

    /// Decode an encoded image (PNG, JPEG, ...) into RGBA8
    pub fn from_bytes(bytes: &[u8], name: &str) -> Result<Self, image::ImageError> {
        let img = image::load_from_memory(bytes)?;
        Ok(Self::from_image(img, name))
    }

    fn from_image(img: DynamicImage, name: &str) -> Self {
        let (width, height) = img.dimensions();
        let data = img.to_rgba8().into_raw();
        Self::from_rgba(name, width, height, data)
    }

    /// Create a solid color texture
    pub fn solid_color(color: [u8; 4], name: &str) -> Self {
        Self::from_rgba(name, 1, 1, color.to_vec())
    }

    pub fn into_handle(self) -> TextureHandle {
        Arc::new(self)
    }

    /// Hand the pixels to an uploader. Returns `None` once the texture is resident.
    pub fn take_pixels(&self) -> Option<Vec<u8>> {
        let pixels = self.pixels.lock().take();
        if pixels.is_some() {
            self.resident.store(true, Ordering::Release);
        }
        pixels
    }

    /// Uploaded to a backend; the CPU copy is gone.
    pub fn is_resident(&self) -> bool {
        self.resident.load(Ordering::Acquire)
    }

    /// Bytes still held on the CPU side
    pub fn cpu_bytes(&self) -> usize {
        self.pixels.lock().as_ref().map_or(0, Vec::len)
    }

    /// Copy of a single texel, while the CPU copy is still around
    pub fn texel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let pixels = self.pixels.lock();
        let offset = ((y * self.width + x) * 4) as usize;
        pixels
            .as_ref()
            .and_then(|p| p.get(offset..offset + 4))
            .and_then(|s| s.try_into().ok())
    }
}

impl fmt::Debug for Texture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Texture")
            .field("name", &self.name)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("resident", &self.is_resident())
            .finish()
    }
}

/// Decoded archive textures keyed by full archive path, in archive order
#[derive(Debug, Clone, Default)]
pub struct TextureTable {
    entries: Vec<(String, TextureHandle)>,
}

impl TextureTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the texture stored under `path`.
    /// A replaced key keeps its original position.
    pub fn insert(&mut self, path: impl Into<String>, texture: TextureHandle) {
        let path = path.into();
        match self.entries.iter_mut().find(|(key, _)| *key == path) {
            Some(entry) => entry.1 = texture,
            None => self.entries.push((path, texture)),
        }
    }

    pub fn get(&self, path: &str) -> Option<&TextureHandle> {
        self.entries
            .iter()
            .find(|(key, _)| key == path)
            .map(|(_, texture)| texture)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TextureHandle)> {
        self.entries.iter().map(|(key, texture)| (key.as_str(), texture))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
