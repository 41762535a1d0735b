//! Scene management
//!
//! The scene is a forest of [`SceneNode`] trees. A loaded model arrives as a
//! single root node and is attached as one unit; lights installed by the
//! configurator are attached as their own root nodes.

mod bounds;
mod camera;
mod camera_controller;
mod light;
mod transform;

pub use bounds::*;
pub use camera::*;
pub use camera_controller::*;
pub use light::*;
pub use transform::*;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use glam::{Mat4, Vec2, Vec3};

use crate::environment::EnvironmentMap;
use crate::resources::{MaterialDescriptor, TextureHandle};

/// sRGB color with 8 bits per channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const WHITE: Self = Self::from_hex(0xffffff);
    pub const BLACK: Self = Self::from_hex(0x000000);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// `0xRRGGBB`
    pub const fn from_hex(hex: u32) -> Self {
        Self {
            r: ((hex >> 16) & 0xff) as u8,
            g: ((hex >> 8) & 0xff) as u8,
            b: (hex & 0xff) as u8,
        }
    }

    pub const fn to_hex(self) -> u32 {
        ((self.r as u32) << 16) | ((self.g as u32) << 8) | self.b as u32
    }

    /// Components as floats in `[0, 1]`
    pub fn to_vec3(self) -> Vec3 {
        Vec3::new(self.r as f32, self.g as f32, self.b as f32) / 255.0
    }

    /// Quantize float components, clamping to `[0, 1]`.
    pub fn from_vec3(v: Vec3) -> Self {
        let q = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        Self::new(q(v.x), q(v.y), q(v.z))
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

/// Triangle geometry of one mesh primitive
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub name: Option<String>,
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
    pub indices: Vec<u32>,
    /// Index into [`Scene::materials`] (or the loaded model's material list)
    pub material: Option<usize>,
}

impl Mesh {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        if self.indices.is_empty() {
            self.positions.len() / 3
        } else {
            self.indices.len() / 3
        }
    }
}

/// A node in a scene graph tree.
#[derive(Debug, Clone, Default)]
pub struct SceneNode {
    pub name: Option<String>,
    /// Local transform relative to parent.
    pub transform: Transform,
    pub meshes: Vec<Mesh>,
    pub light: Option<Light>,
    pub children: Vec<SceneNode>,
}

impl SceneNode {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    #[must_use]
    pub fn with_meshes(mut self, meshes: Vec<Mesh>) -> Self {
        self.meshes = meshes;
        self
    }

    #[must_use]
    pub fn with_light(mut self, light: Light) -> Self {
        self.light = Some(light);
        self
    }

    #[must_use]
    pub fn with_children(mut self, children: Vec<SceneNode>) -> Self {
        self.children = children;
        self
    }

    /// Depth-first walk with each node's accumulated world matrix.
    pub fn visit(&self, parent: Mat4, f: &mut impl FnMut(&SceneNode, Mat4)) {
        let world = parent * self.transform.matrix();
        f(self, world);
        for child in &self.children {
            child.visit(world, f);
        }
    }

    /// True if this node or any descendant satisfies `pred`.
    /// Stops at the first match.
    pub fn any(&self, pred: &impl Fn(&SceneNode) -> bool) -> bool {
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            if pred(node) {
                return true;
            }
            stack.extend(node.children.iter());
        }
        false
    }

    pub fn has_light(&self) -> bool {
        self.any(&|node| node.light.is_some())
    }

    /// Bounds of all mesh vertices, expressed in the space of `parent`.
    pub fn bounds(&self, parent: Mat4) -> Aabb {
        let mut aabb = Aabb::EMPTY;
        self.visit(parent, &mut |node, world| {
            for mesh in &node.meshes {
                for p in &mesh.positions {
                    aabb.extend(world.transform_point3(*p));
                }
            }
        });
        aabb
    }

    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(SceneNode::node_count).sum::<usize>()
    }

    pub fn mesh_count(&self) -> usize {
        self.meshes.len() + self.children.iter().map(SceneNode::mesh_count).sum::<usize>()
    }

    fn offset_materials(&mut self, offset: usize) {
        for mesh in &mut self.meshes {
            if let Some(index) = mesh.material.as_mut() {
                *index += offset;
            }
        }
        for child in &mut self.children {
            child.offset_materials(offset);
        }
    }
}

/// The scene containing all renderable content
#[derive(Debug, Clone)]
pub struct Scene {
    pub background: Color,
    /// Image-based lighting, when environment lighting is enabled
    pub environment: Option<Arc<EnvironmentMap>>,
    pub nodes: Vec<SceneNode>,
    pub materials: Vec<MaterialDescriptor>,
    id: u64,
}

static NEXT_SCENE_ID: AtomicU64 = AtomicU64::new(1);

impl Scene {
    pub fn new() -> Self {
        Self {
            id: NEXT_SCENE_ID.fetch_add(1, Ordering::Relaxed),
            background: crate::config::DEFAULT_BACKGROUND,
            environment: None,
            nodes: Vec::new(),
            materials: Vec::new(),
        }
    }

    /// Attach a model root and its materials.
    ///
    /// Mesh material indices in `root` are local to `materials`; they are
    /// rebased onto the scene's material list.
    pub fn add_model(&mut self, mut root: SceneNode, materials: Vec<MaterialDescriptor>) -> usize {
        root.offset_materials(self.materials.len());
        self.materials.extend(materials);
        self.add_node(root)
    }

    pub fn add_node(&mut self, node: SceneNode) -> usize {
        let id = self.nodes.len();
        self.nodes.push(node);
        id
    }

    /// Attach a light as its own root node
    pub fn add_light(&mut self, light: Light) -> usize {
        let name = light.kind().name();
        self.add_node(SceneNode::new().with_name(name).with_light(light))
    }

    /// Whether any node anywhere in the scene carries a light
    pub fn has_light(&self) -> bool {
        self.nodes.iter().any(SceneNode::has_light)
    }

    /// Every light with its world-space position
    pub fn lights(&self) -> Vec<(Light, Vec3)> {
        let mut lights = Vec::new();
        for root in &self.nodes {
            root.visit(Mat4::IDENTITY, &mut |node, world| {
                if let Some(light) = node.light {
                    lights.push((light, world.transform_point3(Vec3::ZERO)));
                }
            });
        }
        lights
    }

    /// Unique per constructed scene. GPU backends key their uploaded
    /// geometry on it; a session builds a fresh scene for every load.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn bounds(&self) -> Aabb {
        self.nodes
            .iter()
            .fold(Aabb::EMPTY, |acc, node| acc.union(&node.bounds(Mat4::IDENTITY)))
    }

    pub fn mesh_count(&self) -> usize {
        self.nodes.iter().map(SceneNode::mesh_count).sum()
    }

    /// Textures bound to any material, deduplicated by identity
    pub fn textures(&self) -> Vec<TextureHandle> {
        let mut textures: Vec<TextureHandle> = Vec::new();
        for material in &self.materials {
            for texture in material.bound_textures() {
                if !textures.iter().any(|t| Arc::ptr_eq(t, &texture)) {
                    textures.push(texture);
                }
            }
        }
        textures
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LightKind;

    fn triangle(offset: Vec3) -> Mesh {
        Mesh {
            positions: vec![offset, offset + Vec3::X, offset + Vec3::Y],
            indices: vec![0, 1, 2],
            ..Default::default()
        }
    }

    #[test]
    fn color_hex_roundtrip() {
        let c = Color::from_hex(0x112233);
        assert_eq!(c, Color::new(0x11, 0x22, 0x33));
        assert_eq!(c.to_hex(), 0x112233);
    }

    #[test]
    fn nested_light_is_found() {
        let deep = SceneNode::new().with_light(Light::from_kind(LightKind::Point));
        let root = SceneNode::new().with_children(vec![
            SceneNode::new(),
            SceneNode::new().with_children(vec![deep]),
        ]);
        let mut scene = Scene::new();
        scene.add_node(root);
        assert!(scene.has_light());
        assert_eq!(scene.lights().len(), 1);
    }

    #[test]
    fn bounds_follow_transforms() {
        let child = SceneNode::new()
            .with_transform(Transform::from_position(Vec3::new(10.0, 0.0, 0.0)))
            .with_meshes(vec![triangle(Vec3::ZERO)]);
        let root = SceneNode::new()
            .with_transform(Transform::IDENTITY.with_scale(Vec3::splat(2.0)))
            .with_children(vec![child]);

        let aabb = root.bounds(Mat4::IDENTITY);
        assert_eq!(aabb.min, Vec3::new(20.0, 0.0, 0.0));
        assert_eq!(aabb.max, Vec3::new(22.0, 2.0, 0.0));
    }

    #[test]
    fn add_model_rebases_material_indices() {
        let mut scene = Scene::new();
        scene.materials.push(MaterialDescriptor::new("existing"));

        let mut mesh = triangle(Vec3::ZERO);
        mesh.material = Some(0);
        let root = SceneNode::new().with_children(vec![SceneNode::new().with_meshes(vec![mesh])]);
        scene.add_model(root, vec![MaterialDescriptor::new("model")]);

        let mesh = &scene.nodes[0].children[0].meshes[0];
        assert_eq!(mesh.material, Some(1));
        assert_eq!(scene.materials[1].name, "model");
    }
}
