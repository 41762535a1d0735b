//! Material descriptors and MTL parsing
//!
//! An MTL library is a sequence of `newmtl` blocks. Each block becomes one
//! [`MaterialDescriptor`]; its texture statements are kept as raw file
//! references until the binder resolves them against an archive's textures.

use glam::Vec3;

use super::TextureHandle;

/// The texture-reference fields a material can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TextureChannel {
    Diffuse,
    Ambient,
    Specular,
    Emissive,
    Normal,
    Bump,
    Dissolve,
    Displacement,
    SpecularExponent,
}

impl TextureChannel {
    pub const ALL: [TextureChannel; 9] = [
        TextureChannel::Diffuse,
        TextureChannel::Ambient,
        TextureChannel::Specular,
        TextureChannel::Emissive,
        TextureChannel::Normal,
        TextureChannel::Bump,
        TextureChannel::Dissolve,
        TextureChannel::Displacement,
        TextureChannel::SpecularExponent,
    ];

    /// Channel for an MTL statement keyword, case-insensitive.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword.to_ascii_lowercase().as_str() {
            "map_kd" => Some(TextureChannel::Diffuse),
            "map_ka" => Some(TextureChannel::Ambient),
            "map_ks" => Some(TextureChannel::Specular),
            "map_ke" => Some(TextureChannel::Emissive),
            "norm" | "map_kn" => Some(TextureChannel::Normal),
            "map_bump" | "bump" => Some(TextureChannel::Bump),
            "map_d" => Some(TextureChannel::Dissolve),
            "disp" | "map_disp" => Some(TextureChannel::Displacement),
            "map_ns" => Some(TextureChannel::SpecularExponent),
            _ => None,
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            TextureChannel::Diffuse => "map_Kd",
            TextureChannel::Ambient => "map_Ka",
            TextureChannel::Specular => "map_Ks",
            TextureChannel::Emissive => "map_Ke",
            TextureChannel::Normal => "norm",
            TextureChannel::Bump => "map_bump",
            TextureChannel::Dissolve => "map_d",
            TextureChannel::Displacement => "disp",
            TextureChannel::SpecularExponent => "map_Ns",
        }
    }
}

/// A texture field: a raw file reference until bound to a decoded texture
#[derive(Debug, Clone)]
pub enum TextureSlot {
    Reference(String),
    Bound(TextureHandle),
}

impl TextureSlot {
    pub fn reference(&self) -> Option<&str> {
        match self {
            TextureSlot::Reference(path) => Some(path),
            TextureSlot::Bound(_) => None,
        }
    }

    pub fn texture(&self) -> Option<&TextureHandle> {
        match self {
            TextureSlot::Bound(texture) => Some(texture),
            TextureSlot::Reference(_) => None,
        }
    }

    pub fn is_bound(&self) -> bool {
        matches!(self, TextureSlot::Bound(_))
    }
}

/// Parsed surface appearance of one named material
#[derive(Debug, Clone)]
pub struct MaterialDescriptor {
    pub name: String,
    pub ambient: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
    pub emissive: Vec3,
    pub shininess: f32,
    /// 1.0 is fully opaque
    pub opacity: f32,
    pub ior: f32,
    pub illumination: Option<u32>,
    textures: Vec<(TextureChannel, TextureSlot)>,
}

impl Default for MaterialDescriptor {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            ambient: Vec3::ZERO,
            diffuse: Vec3::ONE,
            specular: Vec3::ZERO,
            emissive: Vec3::ZERO,
            shininess: 30.0,
            opacity: 1.0,
            ior: 1.0,
            illumination: None,
            textures: Vec::new(),
        }
    }
}

impl MaterialDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_diffuse(mut self, color: Vec3) -> Self {
        self.diffuse = color;
        self
    }

    pub fn texture(&self, channel: TextureChannel) -> Option<&TextureSlot> {
        self.textures
            .iter()
            .find(|(c, _)| *c == channel)
            .map(|(_, slot)| slot)
    }

    /// Set or replace a channel
    pub fn set_texture(&mut self, channel: TextureChannel, slot: TextureSlot) {
        match self.textures.iter_mut().find(|(c, _)| *c == channel) {
            Some(entry) => entry.1 = slot,
            None => self.textures.push((channel, slot)),
        }
    }

    /// Channels present on this material, in declaration order
    pub fn textures(&self) -> impl Iterator<Item = (TextureChannel, &TextureSlot)> {
        self.textures.iter().map(|(c, slot)| (*c, slot))
    }

    pub fn textures_mut(&mut self) -> impl Iterator<Item = (TextureChannel, &mut TextureSlot)> {
        self.textures.iter_mut().map(|(c, slot)| (*c, slot))
    }

    pub fn bound_textures(&self) -> Vec<TextureHandle> {
        self.textures
            .iter()
            .filter_map(|(_, slot)| slot.texture().cloned())
            .collect()
    }

    /// True when no channel is bound to a decoded texture
    pub fn is_untextured(&self) -> bool {
        !self.textures.iter().any(|(_, slot)| slot.is_bound())
    }
}

/// Options that take arguments, with their argument count
fn option_arity(option: &str) -> usize {
    match option {
        "-o" | "-s" | "-t" => 3,
        "-mm" => 2,
        "-bm" | "-blendu" | "-blendv" | "-boost" | "-cc" | "-clamp" | "-imfchan" | "-texres"
        | "-type" => 1,
        _ => 0,
    }
}

/// File name of a texture statement, after its options.
///
/// Names containing spaces are kept whole.
fn texture_file_name(args: &str) -> Option<String> {
    let mut tokens = args.split_whitespace().peekable();
    while let Some(token) = tokens.peek() {
        if !token.starts_with('-') {
            break;
        }
        let arity = option_arity(&token.to_ascii_lowercase());
        tokens.next();
        for _ in 0..arity {
            tokens.next();
        }
    }
    let rest: Vec<&str> = tokens.collect();
    if rest.is_empty() {
        None
    } else {
        Some(rest.join(" "))
    }
}

fn parse_vec3(args: &str) -> Option<Vec3> {
    let mut values = args.split_whitespace().map(str::parse::<f32>);
    match (values.next(), values.next(), values.next()) {
        (Some(Ok(x)), Some(Ok(y)), Some(Ok(z))) => Some(Vec3::new(x, y, z)),
        // A single value sets all three channels
        (Some(Ok(v)), None, None) => Some(Vec3::splat(v)),
        _ => None,
    }
}

/// A parsed `.mtl` file
#[derive(Debug, Clone, Default)]
pub struct MaterialLibrary {
    materials: Vec<MaterialDescriptor>,
}

impl MaterialLibrary {
    /// Parse MTL text. Malformed statements are logged and skipped.
    pub fn parse(text: &str) -> Self {
        let mut materials: Vec<MaterialDescriptor> = Vec::new();

        for (line_no, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (keyword, args) = match line.split_once(char::is_whitespace) {
                Some((keyword, args)) => (keyword, args.trim()),
                None => (line, ""),
            };

            if keyword.eq_ignore_ascii_case("newmtl") {
                materials.push(MaterialDescriptor::new(args));
                continue;
            }

            let Some(material) = materials.last_mut() else {
                log::warn!("MTL line {}: '{keyword}' before any newmtl, ignored", line_no + 1);
                continue;
            };

            if let Some(channel) = TextureChannel::from_keyword(keyword) {
                match texture_file_name(args) {
                    Some(file) => material.set_texture(channel, TextureSlot::Reference(file)),
                    None => log::warn!("MTL line {}: '{keyword}' without a file name", line_no + 1),
                }
                continue;
            }

            let ok = match keyword.to_ascii_lowercase().as_str() {
                "ka" => parse_vec3(args).map(|v| material.ambient = v).is_some(),
                "kd" => parse_vec3(args).map(|v| material.diffuse = v).is_some(),
                "ks" => parse_vec3(args).map(|v| material.specular = v).is_some(),
                "ke" => parse_vec3(args).map(|v| material.emissive = v).is_some(),
                "ns" => args.parse().map(|v| material.shininess = v).is_ok(),
                "ni" => args.parse().map(|v| material.ior = v).is_ok(),
                "d" => args.parse().map(|v| material.opacity = v).is_ok(),
                "tr" => args.parse::<f32>().map(|v| material.opacity = 1.0 - v).is_ok(),
                "illum" => args.parse().map(|v| material.illumination = Some(v)).is_ok(),
                _ => {
                    log::debug!("MTL line {}: unsupported statement '{keyword}'", line_no + 1);
                    true
                }
            };
            if !ok {
                log::warn!("MTL line {}: could not parse '{line}'", line_no + 1);
            }
        }

        Self { materials }
    }

    pub fn get(&self, name: &str) -> Option<&MaterialDescriptor> {
        self.materials.iter().find(|m| m.name == name)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.materials.iter().position(|m| m.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MaterialDescriptor> {
        self.materials.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut MaterialDescriptor> {
        self.materials.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    pub fn into_materials(self) -> Vec<MaterialDescriptor> {
        self.materials
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WOOD: &str = "\
# exported
newmtl wood
Ka 0.2 0.2 0.2
Kd 0.8 0.6 0.4
Ks 0.1
Ns 96.0
d 0.5
illum 2
map_Kd -s 1 1 1 -bm 0.5 textures/wood diffuse.png
map_Bump -bm 2 C:\\assets\\wood_n.png

newmtl metal
Tr 0.25
map_Ks metal_spec.jpg
";

    #[test]
    fn parses_colors_and_scalars() {
        let lib = MaterialLibrary::parse(WOOD);
        assert_eq!(lib.len(), 2);

        let wood = lib.get("wood").unwrap();
        assert_eq!(wood.ambient, Vec3::splat(0.2));
        assert_eq!(wood.diffuse, Vec3::new(0.8, 0.6, 0.4));
        assert_eq!(wood.specular, Vec3::splat(0.1));
        assert_eq!(wood.shininess, 96.0);
        assert_eq!(wood.opacity, 0.5);
        assert_eq!(wood.illumination, Some(2));

        let metal = lib.get("metal").unwrap();
        assert_eq!(metal.opacity, 0.75);
    }

    #[test]
    fn texture_options_are_skipped() {
        let lib = MaterialLibrary::parse(WOOD);
        let wood = lib.get("wood").unwrap();
        assert_eq!(
            wood.texture(TextureChannel::Diffuse).and_then(TextureSlot::reference),
            Some("textures/wood diffuse.png")
        );
        assert_eq!(
            wood.texture(TextureChannel::Bump).and_then(TextureSlot::reference),
            Some("C:\\assets\\wood_n.png")
        );
        assert!(wood.texture(TextureChannel::Specular).is_none());
        assert!(wood.is_untextured());
    }

    #[test]
    fn statements_before_newmtl_are_ignored() {
        let lib = MaterialLibrary::parse("Kd 1 0 0\nnewmtl a\nKd 0 1 0\n");
        assert_eq!(lib.len(), 1);
        assert_eq!(lib.get("a").unwrap().diffuse, Vec3::Y);
    }

    #[test]
    fn keywords() {
        for channel in TextureChannel::ALL {
            assert_eq!(TextureChannel::from_keyword(channel.keyword()), Some(channel));
        }
        assert_eq!(TextureChannel::from_keyword("bump"), Some(TextureChannel::Bump));
        assert_eq!(TextureChannel::from_keyword("Kd"), None);
    }
}
