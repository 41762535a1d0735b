//! glTF / GLB loading
//!
//! Converts the default scene of a document into a [`SceneNode`] tree.
//! Embedded cameras are collected with their world placement, in depth-first
//! node order, and `KHR_lights_punctual` lights are attached to their nodes.
//! Buffers come from the GLB blob, base64 data URIs, or external files
//! fetched relative to the model URL.

use base64::Engine as _;
use glam::{Mat4, Quat, Vec2, Vec3, Vec4Swizzles};

use super::progress::ProgressTracker;
use super::source::{resolve_relative, AssetSource};
use crate::cancel::{checkpoint, CancellableExt, CancellationToken};
use crate::error::LoadError;
use crate::resources::{MaterialDescriptor, Texture, TextureChannel, TextureHandle, TextureSlot};
use crate::scene::{
    Camera, Color, DirectionalLight, Light, Mesh, PointLight, Projection, SceneNode, SpotLight,
    Transform,
};

/// Result of converting one glTF document
pub struct GltfModel {
    pub root: SceneNode,
    pub materials: Vec<MaterialDescriptor>,
    pub cameras: Vec<Camera>,
}

/// Parse and convert a glTF (JSON) or GLB (binary) file.
pub async fn load_gltf(
    bytes: &[u8],
    url: &str,
    source: &dyn AssetSource,
    token: &CancellationToken,
) -> Result<GltfModel, LoadError> {
    let gltf_dep::Gltf { document, blob } = gltf_dep::Gltf::from_slice(bytes)?;
    checkpoint(token).await?;

    let buffers = resolve_buffers(&document, blob, url, source, token).await?;
    let images = load_images(&document, &buffers, url, source, token).await?;
    let materials = load_materials(&document, &images);

    let meshes: Vec<Vec<Mesh>> = document.meshes().map(|m| convert_mesh(&m, &buffers)).collect();

    let scene = document
        .default_scene()
        .or_else(|| document.scenes().next());

    let name = url.rsplit('/').next().unwrap_or(url);
    let mut root = SceneNode::new().with_name(name);
    let mut cameras = Vec::new();
    if let Some(scene) = scene {
        for node in scene.nodes() {
            root.children
                .push(load_node(&node, Mat4::IDENTITY, &meshes, &mut cameras));
        }
    } else {
        log::warn!("glTF '{url}' has no scenes");
    }

    log::info!(
        "Parsed glTF '{url}': {} mesh(es), {} material(s), {} camera(s)",
        root.mesh_count(),
        materials.len(),
        cameras.len()
    );
    Ok(GltfModel {
        root,
        materials,
        cameras,
    })
}

/// Decode `data:...;base64,...` URIs. `None` for anything else.
pub(crate) fn parse_data_uri(uri: &str) -> Option<Result<Vec<u8>, base64::DecodeError>> {
    let rest = uri.strip_prefix("data:")?;
    let (_, encoded) = rest.split_once(";base64,")?;
    Some(base64::engine::general_purpose::STANDARD.decode(encoded))
}

async fn fetch_uri(
    uri: &str,
    base_url: &str,
    source: &dyn AssetSource,
    token: &CancellationToken,
) -> Result<Vec<u8>, LoadError> {
    if let Some(decoded) = parse_data_uri(uri) {
        return decoded.map_err(|err| LoadError::GltfBuffer(format!("bad data URI: {err}")));
    }
    let resolved = resolve_relative(base_url, uri);
    log::debug!("Fetching glTF resource '{resolved}'");
    let tracker = ProgressTracker::silent();
    Ok(source.fetch(&resolved, &tracker).cancellable(token).await??)
}

/// Resolve all buffer data, one `Vec<u8>` per glTF buffer.
async fn resolve_buffers(
    document: &gltf_dep::Document,
    mut blob: Option<Vec<u8>>,
    base_url: &str,
    source: &dyn AssetSource,
    token: &CancellationToken,
) -> Result<Vec<Vec<u8>>, LoadError> {
    let mut buffers = Vec::new();

    for buffer in document.buffers() {
        let data = match buffer.source() {
            gltf_dep::buffer::Source::Bin => blob.take().ok_or_else(|| {
                LoadError::GltfBuffer("binary buffer referenced but no blob present".into())
            })?,
            gltf_dep::buffer::Source::Uri(uri) => fetch_uri(uri, base_url, source, token).await?,
        };
        if data.len() < buffer.length() {
            return Err(LoadError::GltfBuffer(format!(
                "buffer {} holds {} bytes, expected {}",
                buffer.index(),
                data.len(),
                buffer.length()
            )));
        }
        buffers.push(data);
    }

    Ok(buffers)
}

/// Decode every image. Images that fail to load are logged and left empty.
async fn load_images(
    document: &gltf_dep::Document,
    buffers: &[Vec<u8>],
    base_url: &str,
    source: &dyn AssetSource,
    token: &CancellationToken,
) -> Result<Vec<Option<TextureHandle>>, LoadError> {
    let mut images = Vec::new();

    for image in document.images() {
        let name = image
            .name()
            .map(String::from)
            .unwrap_or_else(|| format!("image{}", image.index()));

        let bytes = match image.source() {
            gltf_dep::image::Source::View { view, .. } => {
                let start = view.offset();
                let end = start + view.length();
                buffers
                    .get(view.buffer().index())
                    .and_then(|b| b.get(start..end))
                    .map(<[u8]>::to_vec)
                    .ok_or_else(|| LoadError::GltfBuffer(format!("image '{name}' out of range")))
            }
            gltf_dep::image::Source::Uri { uri, .. } => {
                fetch_uri(uri, base_url, source, token).await
            }
        };

        let texture = match bytes {
            Ok(bytes) => match Texture::from_bytes(&bytes, &name) {
                Ok(texture) => Some(texture.into_handle()),
                Err(err) => {
                    log::warn!("Skipping glTF image '{name}': {err}");
                    None
                }
            },
            Err(err @ (LoadError::Cancelled | LoadError::TimedOut(_))) => return Err(err),
            Err(err) => {
                log::warn!("Skipping glTF image '{name}': {err}");
                None
            }
        };
        images.push(texture);
        checkpoint(token).await?;
    }

    Ok(images)
}

fn load_materials(
    document: &gltf_dep::Document,
    images: &[Option<TextureHandle>],
) -> Vec<MaterialDescriptor> {
    let image_of = |texture: gltf_dep::Texture<'_>| -> Option<TextureSlot> {
        images
            .get(texture.source().index())
            .cloned()
            .flatten()
            .map(TextureSlot::Bound)
    };

    document
        .materials()
        .map(|mat| {
            let name = mat
                .name()
                .map(String::from)
                .unwrap_or_else(|| format!("material{}", mat.index().unwrap_or(0)));
            let pbr = mat.pbr_metallic_roughness();
            let base = glam::Vec4::from_array(pbr.base_color_factor());

            let mut descriptor = MaterialDescriptor::new(name).with_diffuse(base.xyz());
            descriptor.opacity = base.w;
            descriptor.emissive = Vec3::from_array(mat.emissive_factor());

            let channels = [
                (
                    TextureChannel::Diffuse,
                    pbr.base_color_texture().map(|info| info.texture()),
                ),
                (
                    TextureChannel::Normal,
                    mat.normal_texture().map(|info| info.texture()),
                ),
                (
                    TextureChannel::Emissive,
                    mat.emissive_texture().map(|info| info.texture()),
                ),
            ];
            for (channel, texture) in channels {
                if let Some(slot) = texture.and_then(image_of) {
                    descriptor.set_texture(channel, slot);
                }
            }
            descriptor
        })
        .collect()
}

fn convert_mesh(mesh: &gltf_dep::Mesh<'_>, buffers: &[Vec<u8>]) -> Vec<Mesh> {
    let mut result = Vec::new();
    for primitive in mesh.primitives() {
        let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));
        let Some(positions) = reader.read_positions() else {
            log::warn!(
                "Skipping primitive {} of mesh {:?}: no positions",
                primitive.index(),
                mesh.name()
            );
            continue;
        };
        let positions: Vec<Vec3> = positions.map(Vec3::from_array).collect();
        let normals = reader
            .read_normals()
            .map(|n| n.map(Vec3::from_array).collect())
            .unwrap_or_default();
        let uvs = reader
            .read_tex_coords(0)
            .map(|t| t.into_f32().map(Vec2::from_array).collect())
            .unwrap_or_default();
        let indices = reader
            .read_indices()
            .map(|i| i.into_u32().collect())
            .unwrap_or_default();

        result.push(Mesh {
            name: mesh.name().map(String::from),
            positions,
            normals,
            uvs,
            indices,
            material: primitive.material().index(),
        });
    }
    result
}

fn convert_camera(camera: &gltf_dep::Camera<'_>) -> Camera {
    let projection = match camera.projection() {
        gltf_dep::camera::Projection::Perspective(p) => Projection::Perspective {
            fov_y: p.yfov(),
            aspect: p.aspect_ratio().unwrap_or(1.0),
            near: p.znear(),
            far: p.zfar().unwrap_or(1000.0),
        },
        gltf_dep::camera::Projection::Orthographic(o) => Projection::Orthographic {
            left: -o.xmag(),
            right: o.xmag(),
            bottom: -o.ymag(),
            top: o.ymag(),
            near: o.znear(),
            far: o.zfar(),
        },
    };
    let mut result = Camera::new(projection);
    result.name = camera.name().map(String::from);
    result
}

fn convert_light(light: &gltf_dep::khr_lights_punctual::Light<'_>) -> Light {
    use gltf_dep::khr_lights_punctual::Kind;

    let color = Color::from_vec3(Vec3::from_array(light.color()));
    let intensity = light.intensity();
    let range = light.range().unwrap_or(0.0);
    // Punctual lights shine down their node's local -Z axis.
    match light.kind() {
        Kind::Directional => Light::Directional(DirectionalLight::new(-Vec3::Z, color, intensity)),
        Kind::Point => Light::Point(PointLight {
            color,
            intensity,
            range,
            ..Default::default()
        }),
        Kind::Spot {
            inner_cone_angle,
            outer_cone_angle,
        } => Light::Spot(SpotLight {
            direction: -Vec3::Z,
            color,
            intensity,
            range,
            inner_angle: inner_cone_angle,
            outer_angle: outer_cone_angle,
            ..Default::default()
        }),
    }
}

/// Recursively convert a node and its children.
fn load_node(
    node: &gltf_dep::Node<'_>,
    parent: Mat4,
    meshes: &[Vec<Mesh>],
    cameras: &mut Vec<Camera>,
) -> SceneNode {
    let (translation, rotation, scale) = node.transform().decomposed();
    let transform = Transform {
        position: Vec3::from_array(translation),
        rotation: Quat::from_array(rotation),
        scale: Vec3::from_array(scale),
    };
    let world = parent * transform.matrix();

    if let Some(camera) = node.camera() {
        let placed = Transform::from_matrix(world);
        let mut camera = convert_camera(&camera);
        camera.position = placed.position;
        camera.rotation = placed.rotation;
        if camera.name.is_none() {
            camera.name = node.name().map(String::from);
        }
        cameras.push(camera);
    }

    SceneNode {
        name: node.name().map(String::from),
        transform,
        meshes: node
            .mesh()
            .and_then(|m| meshes.get(m.index()).cloned())
            .unwrap_or_default(),
        light: node.light().map(|l| convert_light(&l)),
        children: node
            .children()
            .map(|c| load_node(&c, world, meshes, cameras))
            .collect(),
    }
}
