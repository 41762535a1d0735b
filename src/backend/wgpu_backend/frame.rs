//! CPU-side frame data for the wgpu backend
//!
//! Everything here is plain data: vertex packing, uniform blocks and the
//! reduction of scene lights to what the forward shader consumes.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

use crate::resources::{MaterialDescriptor, TextureChannel, TextureHandle, TextureSlot};
use crate::scene::{Camera, Color, Light, Mesh, Scene};

/// Directional-style lights the shader evaluates per fragment
pub const MAX_KEY_LIGHTS: usize = 4;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 3] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x2];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// Interleave a mesh into vertices and a triangle list.
///
/// Missing indices mean the positions are already a triangle list. Missing
/// normals are generated by averaging face normals; missing UVs become zero.
/// Triangles referencing vertices that do not exist are dropped.
pub fn mesh_geometry(mesh: &Mesh) -> (Vec<Vertex>, Vec<u32>) {
    let vertex_count = mesh.positions.len();
    let mut indices: Vec<u32> = if mesh.indices.is_empty() {
        (0..vertex_count as u32).collect()
    } else {
        mesh.indices.clone()
    };
    indices.truncate(indices.len() / 3 * 3);
    if indices.iter().any(|&i| i as usize >= vertex_count) {
        indices = indices
            .chunks_exact(3)
            .filter(|tri| tri.iter().all(|&i| (i as usize) < vertex_count))
            .flatten()
            .copied()
            .collect();
    }

    let generated;
    let normals = if mesh.normals.len() == vertex_count {
        &mesh.normals
    } else {
        generated = smooth_normals(&mesh.positions, &indices);
        &generated
    };
    let has_uvs = mesh.uvs.len() == vertex_count;

    let vertices = mesh
        .positions
        .iter()
        .enumerate()
        .map(|(i, position)| Vertex {
            position: position.to_array(),
            normal: normals[i].to_array(),
            uv: if has_uvs { mesh.uvs[i].to_array() } else { [0.0; 2] },
        })
        .collect();
    (vertices, indices)
}

/// Area-weighted vertex normals. Vertices on no triangle face +Y.
pub fn smooth_normals(positions: &[Vec3], indices: &[u32]) -> Vec<Vec3> {
    let mut normals = vec![Vec3::ZERO; positions.len()];
    for tri in indices.chunks_exact(3) {
        let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
        let face = (positions[b] - positions[a]).cross(positions[c] - positions[a]);
        normals[a] += face;
        normals[b] += face;
        normals[c] += face;
    }
    for n in &mut normals {
        let unit = n.normalize_or_zero();
        *n = if unit == Vec3::ZERO { Vec3::Y } else { unit };
    }
    normals
}

/// Approximate sRGB decode
pub fn srgb_to_linear(color: Color) -> Vec3 {
    let c = color.to_vec3();
    Vec3::new(c.x.powf(2.2), c.y.powf(2.2), c.z.powf(2.2))
}

/// Clamp a surface size to `max` on both axes, keeping the aspect ratio.
pub fn clamp_to_limit(width: u32, height: u32, max: u32) -> (u32, u32) {
    if width > max || height > max {
        let scale = (max as f32 / width as f32).min(max as f32 / height as f32);
        let width = ((width as f32 * scale) as u32).clamp(1, max);
        let height = ((height as f32 * scale) as u32).clamp(1, max);
        (width, height)
    } else {
        (width.max(1), height.max(1))
    }
}

/// Scene lighting reduced to an ambient term, a sky/ground gradient and up
/// to [`MAX_KEY_LIGHTS`] directional key lights, all in linear radiance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LightRig {
    pub ambient: Vec3,
    pub sky: Vec3,
    pub ground: Vec3,
    /// Unit direction towards the light, and its radiance
    pub keys: Vec<(Vec3, Vec3)>,
}

impl LightRig {
    /// Point and spot lights are treated as directional: a point light
    /// shines from its position towards the center of the scene, a spot
    /// light along its axis. Key lights past the limit are dropped.
    pub fn from_scene(scene: &Scene) -> Self {
        let center = scene.bounds().center();
        let center = if center.is_finite() { center } else { Vec3::ZERO };
        let mut rig = LightRig::default();

        if let Some(environment) = &scene.environment {
            rig.ambient += environment.average();
        }

        for (light, position) in scene.lights() {
            let key = match light {
                Light::Ambient(l) => {
                    rig.ambient += srgb_to_linear(l.color) * l.intensity;
                    None
                }
                Light::Hemisphere(l) => {
                    rig.sky += srgb_to_linear(l.sky_color) * l.intensity;
                    rig.ground += srgb_to_linear(l.ground_color) * l.intensity;
                    None
                }
                Light::Directional(l) => Some((-l.direction, l.color, l.intensity)),
                Light::Spot(l) => Some((-l.direction, l.color, l.intensity)),
                Light::Point(l) => Some((position - center, l.color, l.intensity)),
            };
            let Some((towards, color, intensity)) = key else {
                continue;
            };
            if rig.keys.len() == MAX_KEY_LIGHTS {
                log::warn!(
                    "Ignoring {} light past the {MAX_KEY_LIGHTS} key light limit",
                    light.kind().name()
                );
                continue;
            }
            let towards = towards.normalize_or_zero();
            let towards = if towards == Vec3::ZERO { Vec3::Y } else { towards };
            rig.keys.push((towards, srgb_to_linear(color) * intensity));
        }
        rig
    }
}

/// Per-frame uniform block, bind group 0
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct FrameUniforms {
    pub view_proj: [[f32; 4]; 4],
    pub ambient: [f32; 4],
    pub sky: [f32; 4],
    pub ground: [f32; 4],
    pub light_count: [u32; 4],
    pub light_directions: [[f32; 4]; MAX_KEY_LIGHTS],
    pub light_colors: [[f32; 4]; MAX_KEY_LIGHTS],
}

impl FrameUniforms {
    pub fn new(rig: &LightRig, camera: &Camera) -> Self {
        let mut uniforms = Self {
            view_proj: camera.view_projection_matrix().to_cols_array_2d(),
            ambient: rig.ambient.extend(1.0).to_array(),
            sky: rig.sky.extend(1.0).to_array(),
            ground: rig.ground.extend(1.0).to_array(),
            light_count: [rig.keys.len() as u32, 0, 0, 0],
            ..Zeroable::zeroed()
        };
        for (i, (direction, radiance)) in rig.keys.iter().take(MAX_KEY_LIGHTS).enumerate() {
            uniforms.light_directions[i] = direction.extend(0.0).to_array();
            uniforms.light_colors[i] = radiance.extend(1.0).to_array();
        }
        uniforms
    }
}

/// Per-draw uniform block, bind group 1
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct DrawUniforms {
    pub model: [[f32; 4]; 4],
    pub normal_matrix: [[f32; 4]; 4],
    pub base_color: [f32; 4],
    pub emissive: [f32; 4],
}

impl DrawUniforms {
    pub fn new(world: Mat4, material: Option<&MaterialDescriptor>) -> Self {
        let normal_matrix = if world.determinant().abs() > f32::EPSILON {
            world.inverse().transpose()
        } else {
            Mat4::IDENTITY
        };
        let (base_color, emissive) = match material {
            Some(m) => (m.diffuse.extend(m.opacity.clamp(0.0, 1.0)), m.emissive),
            None => (Vec3::ONE.extend(1.0), Vec3::ZERO),
        };
        Self {
            model: world.to_cols_array_2d(),
            normal_matrix: normal_matrix.to_cols_array_2d(),
            base_color: base_color.to_array(),
            emissive: emissive.extend(0.0).to_array(),
        }
    }

    pub fn is_transparent(&self) -> bool {
        self.base_color[3] < 1.0
    }
}

/// Texture sampled as the base color: the diffuse map, else the ambient map.
pub fn base_texture(material: &MaterialDescriptor) -> Option<&TextureHandle> {
    [TextureChannel::Diffuse, TextureChannel::Ambient]
        .into_iter()
        .find_map(|channel| material.texture(channel).and_then(TextureSlot::texture))
}
