//! wgpu backend implementation
//!
//! A single forward pass: every mesh is drawn once with its material's base
//! color and base texture, lit by the scene's [`LightRig`]. Geometry is
//! uploaded when a new scene arrives (keyed on [`Scene::id`]); textures are
//! uploaded once per handle, which releases their CPU copies.

pub mod frame;

use std::sync::Arc;

use glam::Mat4;
use wgpu::util::DeviceExt;

use self::frame::{DrawUniforms, FrameUniforms, LightRig, Vertex};
use super::traits::{GpuTextureId, RenderBackend, RenderError, RenderResult};
use crate::resources::TextureHandle;
use crate::scene::{Camera, Color, Scene};

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24Plus;

/// Forward shader: base color times texture, hemisphere ambient and up to
/// four directional key lights with Lambert falloff.
pub const VIEWER_SHADER: &str = r#"
struct FrameUniforms {
    view_proj: mat4x4<f32>,
    ambient: vec4<f32>,
    sky: vec4<f32>,
    ground: vec4<f32>,
    light_count: vec4<u32>,
    light_directions: array<vec4<f32>, 4>,
    light_colors: array<vec4<f32>, 4>,
}

struct DrawUniforms {
    model: mat4x4<f32>,
    normal_matrix: mat4x4<f32>,
    base_color: vec4<f32>,
    emissive: vec4<f32>,
}

@group(0) @binding(0) var<uniform> frame: FrameUniforms;
@group(1) @binding(0) var<uniform> draw: DrawUniforms;
@group(1) @binding(1) var base_texture: texture_2d<f32>;
@group(1) @binding(2) var base_sampler: sampler;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
}

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_normal: vec3<f32>,
    @location(1) uv: vec2<f32>,
}

@vertex
fn vs_main(in: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    let world_position = draw.model * vec4<f32>(in.position, 1.0);
    out.clip_position = frame.view_proj * world_position;
    out.world_normal = (draw.normal_matrix * vec4<f32>(in.normal, 0.0)).xyz;
    out.uv = in.uv;
    return out;
}

@fragment
fn fs_main(in: VertexOutput, @builtin(front_facing) front_facing: bool) -> @location(0) vec4<f32> {
    let base = textureSample(base_texture, base_sampler, in.uv) * draw.base_color;

    var n = normalize(in.world_normal);
    if (!front_facing) {
        n = -n;
    }

    var light = frame.ambient.rgb + mix(frame.ground.rgb, frame.sky.rgb, n.y * 0.5 + 0.5);
    let count = min(frame.light_count.x, 4u);
    for (var i = 0u; i < count; i = i + 1u) {
        let l = frame.light_directions[i].xyz;
        light = light + frame.light_colors[i].rgb * max(dot(n, l), 0.0);
    }

    return vec4<f32>(base.rgb * light + draw.emissive.rgb, base.a);
}
"#;

/// A texture resident on the GPU
struct GpuTexture {
    source: TextureHandle,
    view: wgpu::TextureView,
    id: GpuTextureId,
}

/// One mesh ready to draw
struct GpuDraw {
    vertices: wgpu::Buffer,
    indices: wgpu::Buffer,
    index_count: u32,
    transparent: bool,
    bind_group: wgpu::BindGroup,
    _uniforms: wgpu::Buffer,
}

/// wgpu backend implementation
pub struct WgpuBackend {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface_config: wgpu::SurfaceConfiguration,
    depth_view: wgpu::TextureView,
    pipeline: wgpu::RenderPipeline,
    frame_buffer: wgpu::Buffer,
    frame_bind_group: wgpu::BindGroup,
    draw_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    white: wgpu::TextureView,
    textures: Vec<GpuTexture>,
    next_texture_id: u64,
    draws: Vec<GpuDraw>,
    prepared_scene: Option<u64>,
}

impl WgpuBackend {
    /// Create a backend drawing into `target`, on any available adapter.
    pub async fn new(
        target: impl Into<wgpu::SurfaceTarget<'static>>,
        width: u32,
        height: u32,
    ) -> RenderResult<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance
            .create_surface(target)
            .map_err(|e| RenderError::Backend(e.to_string()))?;
        Self::with_surface(&instance, surface, wgpu::Limits::downlevel_defaults(), width, height)
            .await
    }

    /// Create a backend drawing into a page canvas, trying WebGL2 first and
    /// WebGPU second.
    #[cfg(target_arch = "wasm32")]
    pub async fn from_canvas(
        canvas: &web_sys::HtmlCanvasElement,
        width: u32,
        height: u32,
    ) -> RenderResult<Self> {
        let attempts = [
            (wgpu::Backends::GL, wgpu::Limits::downlevel_webgl2_defaults(), "WebGL2"),
            (wgpu::Backends::BROWSER_WEBGPU, wgpu::Limits::downlevel_defaults(), "WebGPU"),
        ];
        for (backends, limits, backend_name) in attempts {
            log::info!("Trying {backend_name} backend...");
            let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
                backends,
                ..Default::default()
            });
            let target = wgpu::SurfaceTarget::Canvas(canvas.clone());
            let surface = match instance.create_surface(target) {
                Ok(surface) => surface,
                Err(e) => {
                    log::warn!("{backend_name} surface unavailable: {e}");
                    continue;
                }
            };
            match Self::with_surface(&instance, surface, limits, width, height).await {
                Ok(backend) => {
                    log::info!("{backend_name} backend initialized successfully");
                    return Ok(backend);
                }
                Err(e) => log::warn!("{backend_name} failed: {e}"),
            }
        }
        Err(RenderError::Backend(
            "Neither WebGL2 nor WebGPU backends could be initialized".into(),
        ))
    }

    async fn with_surface(
        instance: &wgpu::Instance,
        surface: wgpu::Surface<'static>,
        limits: wgpu::Limits,
        width: u32,
        height: u32,
    ) -> RenderResult<Self> {
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| RenderError::Backend("No suitable adapter found".into()))?;

        let adapter_info = adapter.get_info();
        log::info!(
            "Selected GPU: {} ({:?} backend)",
            adapter_info.name,
            adapter_info.backend
        );

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Viewer Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: limits.using_resolution(adapter.limits()),
                },
                None,
            )
            .await
            .map_err(|e| RenderError::Backend(e.to_string()))?;

        let surface_caps = surface.get_capabilities(&adapter);
        let format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| {
                RenderError::Backend("Surface is incompatible with the adapter".into())
            })?;

        let max_size = device.limits().max_texture_dimension_2d;
        let (width, height) = frame::clamp_to_limit(width, height, max_size);
        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width,
            height,
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);

        let frame_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Frame Layout"),
            entries: &[uniform_entry(0)],
        });
        let draw_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Draw Layout"),
            entries: &[
                uniform_entry(0),
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline = create_pipeline(&device, format, &frame_layout, &draw_layout);

        let frame_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Frame Uniforms"),
            contents: bytemuck::bytes_of(&FrameUniforms::new(
                &LightRig::default(),
                &Camera::default(),
            )),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let frame_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Frame Bind Group"),
            layout: &frame_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: frame_buffer.as_entire_binding(),
            }],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Material Sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        let white = upload_rgba(&device, &queue, "White", 1, 1, &[255; 4]);
        let depth_view = create_depth_view(&device, width, height);

        Ok(Self {
            surface,
            device,
            queue,
            surface_config,
            depth_view,
            pipeline,
            frame_buffer,
            frame_bind_group,
            draw_layout,
            sampler,
            white,
            textures: Vec::new(),
            next_texture_id: 1,
            draws: Vec::new(),
            prepared_scene: None,
        })
    }

    /// Id of `texture` if it is resident on the GPU
    pub fn texture_id(&self, texture: &TextureHandle) -> Option<GpuTextureId> {
        self.textures
            .iter()
            .find(|t| Arc::ptr_eq(&t.source, texture))
            .map(|t| t.id)
    }

    /// Upload a texture unless already resident. Returns its slot.
    fn ensure_texture(&mut self, texture: &TextureHandle) -> Option<usize> {
        if let Some(index) = self.textures.iter().position(|t| Arc::ptr_eq(&t.source, texture)) {
            return Some(index);
        }

        let max_size = self.device.limits().max_texture_dimension_2d;
        if texture.width == 0
            || texture.height == 0
            || texture.width > max_size
            || texture.height > max_size
        {
            log::warn!(
                "Skipping texture '{}': {}x{} is outside the device limit of {max_size}",
                texture.name,
                texture.width,
                texture.height
            );
            return None;
        }
        let Some(pixels) = texture.take_pixels() else {
            log::warn!("Texture '{}' has no pixel data left to upload", texture.name);
            return None;
        };

        let view = upload_rgba(
            &self.device,
            &self.queue,
            &texture.name,
            texture.width,
            texture.height,
            &pixels,
        );
        let id = GpuTextureId(self.next_texture_id);
        self.next_texture_id += 1;
        log::debug!(
            "Uploaded texture '{}' ({}x{}) as {}",
            texture.name,
            texture.width,
            texture.height,
            id.raw()
        );
        self.textures.push(GpuTexture {
            source: texture.clone(),
            view,
            id,
        });
        Some(self.textures.len() - 1)
    }

    /// Rebuild GPU geometry for a newly presented scene.
    fn prepare(&mut self, scene: &Scene) {
        let textures = scene.textures();
        self.textures
            .retain(|gpu| textures.iter().any(|t| Arc::ptr_eq(t, &gpu.source)));
        for texture in &textures {
            self.ensure_texture(texture);
        }

        let mut draws = Vec::new();
        for root in &scene.nodes {
            root.visit(Mat4::IDENTITY, &mut |node, world| {
                for mesh in &node.meshes {
                    let (vertices, indices) = frame::mesh_geometry(mesh);
                    if indices.is_empty() {
                        continue;
                    }
                    let material = mesh.material.and_then(|i| scene.materials.get(i));
                    let uniforms = DrawUniforms::new(world, material);
                    let view = material
                        .and_then(frame::base_texture)
                        .and_then(|t| self.textures.iter().find(|g| Arc::ptr_eq(&g.source, t)))
                        .map_or(&self.white, |g| &g.view);
                    draws.push(self.create_draw(&vertices, &indices, &uniforms, view));
                }
            });
        }
        // Blended surfaces after the opaque ones
        draws.sort_by_key(|draw| draw.transparent);

        log::debug!(
            "Prepared {} draws and {} textures for scene {}",
            draws.len(),
            self.textures.len(),
            scene.id()
        );
        self.draws = draws;
        self.prepared_scene = Some(scene.id());
    }

    fn create_draw(
        &self,
        vertices: &[Vertex],
        indices: &[u32],
        uniforms: &DrawUniforms,
        view: &wgpu::TextureView,
    ) -> GpuDraw {
        let vertex_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Mesh Vertices"),
            contents: bytemuck::cast_slice(vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Mesh Indices"),
            contents: bytemuck::cast_slice(indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        let uniform_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Draw Uniforms"),
            contents: bytemuck::bytes_of(uniforms),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Draw Bind Group"),
            layout: &self.draw_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });

        GpuDraw {
            vertices: vertex_buffer,
            indices: index_buffer,
            index_count: indices.len() as u32,
            transparent: uniforms.is_transparent(),
            bind_group,
            _uniforms: uniform_buffer,
        }
    }

    fn clear_color(&self, background: Color) -> wgpu::Color {
        let c = if self.surface_config.format.is_srgb() {
            frame::srgb_to_linear(background)
        } else {
            background.to_vec3()
        };
        wgpu::Color {
            r: c.x as f64,
            g: c.y as f64,
            b: c.z as f64,
            a: 1.0,
        }
    }
}

impl RenderBackend for WgpuBackend {
    fn name(&self) -> &'static str {
        "wgpu"
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        let max_size = self.device.limits().max_texture_dimension_2d;
        let (width, height) = frame::clamp_to_limit(width, height, max_size);
        self.surface_config.width = width;
        self.surface_config.height = height;
        self.surface.configure(&self.device, &self.surface_config);
        self.depth_view = create_depth_view(&self.device, width, height);
    }

    fn surface_size(&self) -> (u32, u32) {
        (self.surface_config.width, self.surface_config.height)
    }

    fn render(&mut self, scene: &Scene, camera: &Camera) -> RenderResult<()> {
        if self.prepared_scene != Some(scene.id()) {
            self.prepare(scene);
        }

        let uniforms = FrameUniforms::new(&LightRig::from_scene(scene), camera);
        self.queue
            .write_buffer(&self.frame_buffer, 0, bytemuck::bytes_of(&uniforms));

        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.surface.configure(&self.device, &self.surface_config);
                return Err(RenderError::SurfaceLost);
            }
            Err(e) => return Err(RenderError::Backend(e.to_string())),
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Viewer Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_color(scene.background)),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Discard,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &self.frame_bind_group, &[]);
            for draw in &self.draws {
                pass.set_bind_group(1, &draw.bind_group, &[]);
                pass.set_vertex_buffer(0, draw.vertices.slice(..));
                pass.set_index_buffer(draw.indices.slice(..), wgpu::IndexFormat::Uint32);
                pass.draw_indexed(0..draw.index_count, 0, 0..1);
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn create_pipeline(
    device: &wgpu::Device,
    format: wgpu::TextureFormat,
    frame_layout: &wgpu::BindGroupLayout,
    draw_layout: &wgpu::BindGroupLayout,
) -> wgpu::RenderPipeline {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("Viewer Shader"),
        source: wgpu::ShaderSource::Wgsl(VIEWER_SHADER.into()),
    });
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Viewer Pipeline Layout"),
        bind_group_layouts: &[frame_layout, draw_layout],
        push_constant_ranges: &[],
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("Viewer Pipeline"),
        layout: Some(&layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: "vs_main",
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            buffers: &[Vertex::layout()],
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: "fs_main",
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            cull_mode: None,
            ..Default::default()
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
    })
}

fn create_depth_view(device: &wgpu::Device, width: u32, height: u32) -> wgpu::TextureView {
    device
        .create_texture(&wgpu::TextureDescriptor {
            label: Some("Depth Buffer"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        })
        .create_view(&wgpu::TextureViewDescriptor::default())
}

fn upload_rgba(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    label: &str,
    width: u32,
    height: u32,
    data: &[u8],
) -> wgpu::TextureView {
    let size = wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        wgpu::ImageCopyTexture {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        data,
        wgpu::ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(4 * width),
            rows_per_image: Some(height),
        },
        size,
    );
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}
