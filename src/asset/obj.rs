//! OBJ geometry loading
//!
//! Materials must be set before parsing: the parser resolves `usemtl`
//! statements against whatever library is installed at that moment.

use glam::{Vec2, Vec3};

use crate::error::LoadError;
use crate::resources::{MaterialDescriptor, MaterialLibrary};
use crate::scene::{Mesh, SceneNode};

/// Library name announced to the parser when the OBJ text has no `mtllib`
const INJECTED_MTLLIB: &str = "mtllib archive.mtl\n";

#[derive(Default)]
pub struct ObjLoader {
    materials: Option<MaterialLibrary>,
}

impl ObjLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the material set used to resolve `usemtl` during parsing.
    pub fn set_materials(&mut self, materials: MaterialLibrary) {
        self.materials = Some(materials);
    }

    /// Parse OBJ text into a model root with one child per object/group.
    ///
    /// Returned mesh material indices refer to the returned material list.
    pub fn parse(
        &self,
        bytes: &[u8],
        name: &str,
    ) -> Result<(SceneNode, Vec<MaterialDescriptor>), LoadError> {
        let library = self.materials.clone().unwrap_or_default();

        // `usemtl` only resolves once the parser has seen a library statement.
        let mut source = Vec::with_capacity(bytes.len() + INJECTED_MTLLIB.len());
        if self.materials.is_some() && !declares_mtllib(bytes) {
            source.extend_from_slice(INJECTED_MTLLIB.as_bytes());
        }
        source.extend_from_slice(bytes);

        let load_opts = tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        };
        let (models, parsed_materials) =
            tobj::load_obj_buf(&mut source.as_slice(), &load_opts, |_| {
                let materials: Vec<tobj::Material> = library
                    .iter()
                    .map(|m| tobj::Material {
                        name: m.name.clone(),
                        ..Default::default()
                    })
                    .collect();
                let names = materials
                    .iter()
                    .enumerate()
                    .map(|(i, m)| (m.name.clone(), i))
                    .collect();
                Ok((materials, names))
            })?;
        // Names of the parser's own material list, which repeats per `mtllib`.
        let parsed_names: Vec<String> = parsed_materials
            .map(|mats| mats.into_iter().map(|m| m.name).collect())
            .unwrap_or_default();

        let mut root = SceneNode::new().with_name(name);
        for model in models {
            let mesh = convert_mesh(&model, &parsed_names, &library);
            root.children
                .push(SceneNode::new().with_name(model.name).with_meshes(vec![mesh]));
        }

        log::info!(
            "Parsed OBJ '{name}': {} object(s), {} material(s)",
            root.children.len(),
            library.len()
        );
        Ok((root, library.into_materials()))
    }
}

fn declares_mtllib(bytes: &[u8]) -> bool {
    String::from_utf8_lossy(bytes)
        .lines()
        .any(|line| line.trim_start().starts_with("mtllib"))
}

fn convert_mesh(model: &tobj::Model, parsed_names: &[String], library: &MaterialLibrary) -> Mesh {
    let mesh = &model.mesh;
    let positions = mesh
        .positions
        .chunks_exact(3)
        .map(|p| Vec3::new(p[0], p[1], p[2]))
        .collect();
    let normals = mesh
        .normals
        .chunks_exact(3)
        .map(|n| Vec3::new(n[0], n[1], n[2]))
        .collect();
    // OBJ texture space starts at the bottom left, sampling at the top left
    let uvs = mesh
        .texcoords
        .chunks_exact(2)
        .map(|t| Vec2::new(t[0], 1.0 - t[1]))
        .collect();

    let material = mesh
        .material_id
        .and_then(|id| parsed_names.get(id))
        .and_then(|name| library.index_of(name));

    Mesh {
        name: Some(model.name.clone()),
        positions,
        normals,
        uvs,
        indices: mesh.indices.clone(),
        material,
    }
}
