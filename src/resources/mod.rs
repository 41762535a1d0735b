//! Resource management
//!
//! Decoded textures and the material descriptors that reference them.

mod material;
mod texture;

pub use material::*;
pub use texture::*;
