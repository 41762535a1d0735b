//! Binds MTL texture references to decoded archive textures
//!
//! A reference matches a table key when the key ends with the reference's
//! basename. Both `/` and `\` count as path separators, so Windows-style
//! references exported by modelling tools resolve against zip paths.

use crate::resources::{MaterialDescriptor, MaterialLibrary, TextureSlot, TextureTable};

/// Final path segment, splitting on both separator styles
pub fn basename(reference: &str) -> &str {
    reference.rsplit(['/', '\\']).next().unwrap_or(reference)
}

pub struct MaterialBinder;

impl MaterialBinder {
    /// Parse MTL text and bind every texture reference found in `textures`.
    pub fn bind(material_text: &str, textures: &TextureTable) -> MaterialLibrary {
        let mut library = MaterialLibrary::parse(material_text);
        for material in library.iter_mut() {
            Self::bind_material(material, textures);
        }
        library
    }

    /// Bind one material in place. Returns the number of channels bound.
    ///
    /// Ambiguous basenames resolve to the first match in table order.
    /// Unmatched channels keep their raw reference.
    pub fn bind_material(material: &mut MaterialDescriptor, textures: &TextureTable) -> usize {
        let mut bound = 0;
        let name = material.name.clone();
        for (channel, slot) in material.textures_mut() {
            let Some(reference) = slot.reference() else {
                continue;
            };
            let base = basename(reference);
            if base.is_empty() {
                continue;
            }
            match textures.iter().find(|(key, _)| key.ends_with(base)) {
                Some((key, texture)) => {
                    log::debug!("Material '{name}': {} -> '{key}'", channel.keyword());
                    *slot = TextureSlot::Bound(texture.clone());
                    bound += 1;
                }
                None => {
                    log::warn!(
                        "Material '{name}': no archive texture matches {} '{reference}'",
                        channel.keyword()
                    );
                }
            }
        }
        bound
    }
}
