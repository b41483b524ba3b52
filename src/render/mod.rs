mod camera;
pub mod pick;

pub use camera::CameraController;
pub use pick::{pick, Ray};

use crate::app::egui_host::EguiFrameOutput;
use crate::assets::{TextureLibrary, TextureState};
use crate::color::LinearRgb;
use crate::config::ViewerConfig;
use crate::scene::{MeshGeometry, MeshId, SceneGraph, StandardMaterial, TextureHandle, WrapMode};
use image::RgbaImage;
use std::collections::HashMap;
use std::sync::Arc;
use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;
use winit::window::Window;

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
const CAPTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("failed to create window surface: {0}")]
    CreateSurface(#[from] wgpu::CreateSurfaceError),
    #[error("no compatible GPU adapter found")]
    NoAdapter,
    #[error("failed to create GPU device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),
    #[error("surface has no supported formats")]
    NoSurfaceFormat,
    #[error("failed to acquire surface texture: {0}")]
    Surface(#[from] wgpu::SurfaceError),
    #[error("failed to map capture buffer: {0}")]
    MapCapture(#[from] wgpu::BufferAsyncError),
    #[error("capture readback was interrupted")]
    CaptureInterrupted,
    #[error("capture produced a malformed image ({width}x{height})")]
    CaptureSize { width: u32, height: u32 },
}

// ========================================================================
// GPU-side data layouts
// ========================================================================

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 3] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x2];

    fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
struct FrameUniform {
    view_proj: [[f32; 4]; 4],
    camera_pos: [f32; 4],
    light_dir: [f32; 4],
    ambient: [f32; 4],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MaterialUniform {
    pub base_color: [f32; 4],
    pub emissive: [f32; 4],
    pub params: [f32; 4],
    pub uv_repeat: [f32; 4],
}

/// Packs a resolved material. The map only counts once its pixels are on the GPU;
/// until then (or when the load failed) the mesh draws untextured.
pub fn material_uniform(material: &StandardMaterial, map_ready: bool) -> MaterialUniform {
    let [r, g, b] = material.color.0;
    let emissive = material.emissive.scaled(material.emissive_intensity).0;
    let repeat = material
        .map
        .as_ref()
        .filter(|_| map_ready)
        .map_or([1.0, 1.0], |map| map.repeat);
    MaterialUniform {
        base_color: [r, g, b, 1.0],
        emissive: [emissive[0], emissive[1], emissive[2], 0.0],
        params: [
            material.roughness,
            material.metalness,
            if map_ready && material.map.is_some() { 1.0 } else { 0.0 },
            0.0,
        ],
        uv_repeat: [repeat[0], repeat[1], 0.0, 0.0],
    }
}

pub fn vertices(geometry: &MeshGeometry) -> Vec<Vertex> {
    geometry
        .positions
        .iter()
        .enumerate()
        .map(|(i, position)| Vertex {
            position: *position,
            normal: geometry.normals.get(i).copied().unwrap_or([0.0, 1.0, 0.0]),
            uv: geometry.uvs.get(i).copied().unwrap_or([0.0, 0.0]),
        })
        .collect()
}

pub fn address_mode(wrap: WrapMode) -> wgpu::AddressMode {
    match wrap {
        WrapMode::Repeat => wgpu::AddressMode::Repeat,
        WrapMode::MirroredRepeat => wgpu::AddressMode::MirrorRepeat,
        WrapMode::ClampToEdge => wgpu::AddressMode::ClampToEdge,
    }
}

/// Size an image must be shrunk to so neither side exceeds `max_dimension`,
/// keeping its aspect ratio. `None` when it already fits.
pub fn fit_texture_size(width: u32, height: u32, max_dimension: u32) -> Option<(u32, u32)> {
    let longest = width.max(height);
    if longest <= max_dimension {
        return None;
    }
    let scale = max_dimension as f64 / longest as f64;
    let fit = |side: u32| ((side as f64 * scale).round() as u32).clamp(1, max_dimension);
    Some((fit(width), fit(height)))
}

/// Row pitch for texture-to-buffer copies.
pub fn padded_bytes_per_row(width: u32) -> u32 {
    let unpadded = width * 4;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded.div_ceil(align) * align
}

pub fn unpad_rows(data: &[u8], width: u32, height: u32, padded_row: u32) -> Vec<u8> {
    let row = (width * 4) as usize;
    let mut pixels = Vec::with_capacity(row * height as usize);
    for chunk in data.chunks(padded_row as usize).take(height as usize) {
        pixels.extend_from_slice(&chunk[..row.min(chunk.len())]);
    }
    pixels
}

// ========================================================================
// GPU resources
// ========================================================================

struct GpuTexture {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
    revision: u64,
}

/// One sampler per wrap mode; the material's map picks which one is bound.
struct Samplers {
    repeat: wgpu::Sampler,
    mirrored: wgpu::Sampler,
    clamp: wgpu::Sampler,
}

impl Samplers {
    fn new(device: &wgpu::Device) -> Self {
        let create = |label: &str, wrap: WrapMode| {
            let mode = address_mode(wrap);
            device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some(label),
                address_mode_u: mode,
                address_mode_v: mode,
                address_mode_w: mode,
                mag_filter: wgpu::FilterMode::Linear,
                min_filter: wgpu::FilterMode::Linear,
                ..Default::default()
            })
        };
        Self {
            repeat: create("Repeat Sampler", WrapMode::Repeat),
            mirrored: create("Mirrored Repeat Sampler", WrapMode::MirroredRepeat),
            clamp: create("Clamp Sampler", WrapMode::ClampToEdge),
        }
    }

    fn get(&self, wrap: WrapMode) -> &wgpu::Sampler {
        match wrap {
            WrapMode::Repeat => &self.repeat,
            WrapMode::MirroredRepeat => &self.mirrored,
            WrapMode::ClampToEdge => &self.clamp,
        }
    }
}

struct GpuMesh {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    material_revision: Option<u64>,
    /// Texture the bind group currently samples, with the library revision it was built from.
    bound_texture: Option<(TextureHandle, u64)>,
}

struct Lighting {
    clear_color: wgpu::Color,
    ambient: [f32; 3],
    light_dir: [f32; 3],
}

pub struct RenderContext {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    depth_view: wgpu::TextureView,
    pipeline: wgpu::RenderPipeline,
    capture_pipeline: wgpu::RenderPipeline,
    frame_buffer: wgpu::Buffer,
    frame_bind_group: wgpu::BindGroup,
    material_layout: wgpu::BindGroupLayout,
    samplers: Samplers,
    white: GpuTexture,
    textures: HashMap<TextureHandle, GpuTexture>,
    meshes: HashMap<MeshId, GpuMesh>,
    egui_renderer: egui_wgpu::Renderer,
    lighting: Lighting,
}

impl RenderContext {
    pub async fn new(window: Arc<Window>, viewer: &ViewerConfig) -> Result<Self, RenderError> {
        let size = window.inner_size();
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance.create_surface(window)?;
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or(RenderError::NoAdapter)?;
        let info = adapter.get_info();
        log::info!("Using GPU: {} ({:?})", info.name, info.backend);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("House Customizer Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default().using_resolution(adapter.limits()),
                    memory_hints: wgpu::MemoryHints::Performance,
                },
                None,
            )
            .await?;

        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .copied()
            .or_else(|| caps.formats.first().copied())
            .ok_or(RenderError::NoSurfaceFormat)?;
        log::info!("Surface format: {:?}", format);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);
        let depth_view = create_depth_view(&device, config.width, config.height);

        let frame_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Frame Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let material_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Material Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
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

        let frame_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Frame Uniform"),
            size: std::mem::size_of::<FrameUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let frame_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Frame Bind Group"),
            layout: &frame_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: frame_buffer.as_entire_binding(),
            }],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Mesh Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("mesh.wgsl").into()),
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Mesh Pipeline Layout"),
            bind_group_layouts: &[&frame_layout, &material_layout],
            push_constant_ranges: &[],
        });
        let pipeline = create_mesh_pipeline(&device, &pipeline_layout, &shader, format);
        let capture_pipeline =
            create_mesh_pipeline(&device, &pipeline_layout, &shader, CAPTURE_FORMAT);

        let samplers = Samplers::new(&device);
        let white = upload_texture(&device, &queue, "White Texture", 1, 1, &[255; 4], 0);
        let egui_renderer = egui_wgpu::Renderer::new(&device, format, Some(DEPTH_FORMAT), 1, false);

        let [cr, cg, cb] = viewer.clear_color;
        let ambient = LinearRgb::WHITE.scaled(viewer.ambient_intensity).0;
        let light_dir = glam::Vec3::from(viewer.light_position)
            .try_normalize()
            .unwrap_or(glam::Vec3::Y)
            .to_array();

        Ok(Self {
            surface,
            device,
            queue,
            config,
            depth_view,
            pipeline,
            capture_pipeline,
            frame_buffer,
            frame_bind_group,
            material_layout,
            samplers,
            white,
            textures: HashMap::new(),
            meshes: HashMap::new(),
            egui_renderer,
            lighting: Lighting {
                clear_color: wgpu::Color {
                    r: cr as f64,
                    g: cg as f64,
                    b: cb as f64,
                    a: 1.0,
                },
                ambient,
                light_dir,
            },
        })
    }

    pub fn size(&self) -> PhysicalSize<u32> {
        PhysicalSize::new(self.config.width, self.config.height)
    }

    pub fn aspect(&self) -> f32 {
        self.config.width as f32 / self.config.height.max(1) as f32
    }

    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.config.width = new_size.width;
        self.config.height = new_size.height;
        self.surface.configure(&self.device, &self.config);
        self.depth_view = create_depth_view(&self.device, new_size.width, new_size.height);
    }

    /// Replaces all GPU meshes with the scene's geometry.
    pub fn upload_scene(&mut self, scene: &SceneGraph) {
        self.meshes.clear();
        let mut uploaded = 0usize;
        scene.visit_meshes(|mesh| {
            if mesh.geometry.indices.is_empty() {
                return;
            }
            let vertex_buffer = self
                .device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(&format!("{} vertices", mesh.id)),
                    contents: bytemuck::cast_slice(&vertices(&mesh.geometry)),
                    usage: wgpu::BufferUsages::VERTEX,
                });
            let index_buffer = self
                .device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(&format!("{} indices", mesh.id)),
                    contents: bytemuck::cast_slice(&mesh.geometry.indices),
                    usage: wgpu::BufferUsages::INDEX,
                });
            let uniform_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(&format!("{} material", mesh.id)),
                size: std::mem::size_of::<MaterialUniform>() as u64,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            let bind_group =
                self.material_bind_group(&uniform_buffer, &self.white.view, WrapMode::Repeat);
            self.meshes.insert(
                mesh.id,
                GpuMesh {
                    vertex_buffer,
                    index_buffer,
                    index_count: mesh.geometry.indices.len() as u32,
                    uniform_buffer,
                    bind_group,
                    material_revision: None,
                    bound_texture: None,
                },
            );
            uploaded += 1;
        });
        log::info!("Uploaded {} meshes to the GPU", uploaded);
    }

    fn material_bind_group(
        &self,
        uniform_buffer: &wgpu::Buffer,
        view: &wgpu::TextureView,
        wrap: WrapMode,
    ) -> wgpu::BindGroup {
        self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Material Bind Group"),
            layout: &self.material_layout,
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
                    resource: wgpu::BindingResource::Sampler(self.samplers.get(wrap)),
                },
            ],
        })
    }

    /// Uploads newly ready textures and refreshes per-mesh material state whose
    /// resolved material or bound texture changed.
    pub fn sync_materials(&mut self, scene: &SceneGraph, library: &TextureLibrary) {
        scene.visit_meshes(|mesh| {
            let material = mesh.material();
            let wanted = material.map.as_ref().map(|map| map.handle);
            let texture_revision = wanted.map_or(0, |handle| library.revision(handle));

            if let Some(handle) = wanted {
                self.ensure_texture(handle, library);
            }
            let Some(gpu) = self.meshes.get(&mesh.id) else {
                return;
            };
            let bound = wanted.map(|handle| (handle, texture_revision));
            if gpu.material_revision == Some(mesh.material_revision()) && gpu.bound_texture == bound {
                return;
            }

            let ready = wanted.and_then(|handle| self.textures.get(&handle));
            let view = ready.map_or(&self.white.view, |texture| &texture.view);
            let wrap = material.map.as_ref().map_or(WrapMode::Repeat, |map| map.wrap);
            let uniform = material_uniform(material, ready.is_some());
            self.queue
                .write_buffer(&gpu.uniform_buffer, 0, bytemuck::bytes_of(&uniform));
            let bind_group = self.material_bind_group(&gpu.uniform_buffer, view, wrap);

            if let Some(gpu) = self.meshes.get_mut(&mesh.id) {
                gpu.bind_group = bind_group;
                gpu.material_revision = Some(mesh.material_revision());
                gpu.bound_texture = bound;
            }
        });
    }

    fn ensure_texture(&mut self, handle: TextureHandle, library: &TextureLibrary) {
        let revision = library.revision(handle);
        if self
            .textures
            .get(&handle)
            .is_some_and(|texture| texture.revision == revision)
        {
            return;
        }
        match library.state(handle) {
            Some(TextureState::Ready(image)) if image.width() > 0 && image.height() > 0 => {
                let label = library.source(handle).unwrap_or("texture");
                let max = self.device.limits().max_texture_dimension_2d;
                let resized = fit_texture_size(image.width(), image.height(), max).map(|(width, height)| {
                    log::warn!(
                        "Texture {} is {}x{}, above the GPU limit of {}; downscaling to {}x{}",
                        label,
                        image.width(),
                        image.height(),
                        max,
                        width,
                        height
                    );
                    image::imageops::resize(&**image, width, height, image::imageops::FilterType::Triangle)
                });
                let pixels = resized.as_ref().unwrap_or(&**image);
                let texture = upload_texture(
                    &self.device,
                    &self.queue,
                    label,
                    pixels.width(),
                    pixels.height(),
                    pixels.as_raw(),
                    revision,
                );
                self.textures.insert(handle, texture);
            }
            _ => {
                self.textures.remove(&handle);
            }
        }
    }

    fn write_frame_uniform(&self, camera: &CameraController, aspect: f32) {
        let eye = camera.eye();
        let [ar, ag, ab] = self.lighting.ambient;
        let [lx, ly, lz] = self.lighting.light_dir;
        let uniform = FrameUniform {
            view_proj: camera.view_proj(aspect).to_cols_array_2d(),
            camera_pos: [eye.x, eye.y, eye.z, 1.0],
            light_dir: [lx, ly, lz, 0.0],
            ambient: [ar, ag, ab, 0.0],
        };
        self.queue
            .write_buffer(&self.frame_buffer, 0, bytemuck::bytes_of(&uniform));
    }

    fn draw_meshes(&self, pass: &mut wgpu::RenderPass<'_>, pipeline: &wgpu::RenderPipeline) {
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, &self.frame_bind_group, &[]);
        for mesh in self.meshes.values() {
            pass.set_bind_group(1, &mesh.bind_group, &[]);
            pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
            pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..mesh.index_count, 0, 0..1);
        }
    }

    pub fn render(&mut self, camera: &CameraController, ui: &EguiFrameOutput) -> Result<(), RenderError> {
        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.surface.configure(&self.device, &self.config);
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        self.write_frame_uniform(camera, self.aspect());
        for (id, delta) in &ui.textures_delta.set {
            self.egui_renderer
                .update_texture(&self.device, &self.queue, *id, delta);
        }

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });
        let screen = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [self.config.width, self.config.height],
            pixels_per_point: ui.pixels_per_point,
        };
        let ui_commands = self.egui_renderer.update_buffers(
            &self.device,
            &self.queue,
            &mut encoder,
            &ui.clipped_primitives,
            &screen,
        );

        {
            let mut pass = encoder
                .begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("Scene Pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Clear(self.lighting.clear_color),
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                        view: &self.depth_view,
                        depth_ops: Some(wgpu::Operations {
                            load: wgpu::LoadOp::Clear(1.0),
                            store: wgpu::StoreOp::Store,
                        }),
                        stencil_ops: None,
                    }),
                    timestamp_writes: None,
                    occlusion_query_set: None,
                })
                .forget_lifetime();
            self.draw_meshes(&mut pass, &self.pipeline);
            self.egui_renderer
                .render(&mut pass, &ui.clipped_primitives, &screen);
        }

        self.queue
            .submit(ui_commands.into_iter().chain(std::iter::once(encoder.finish())));
        output.present();

        for id in &ui.textures_delta.free {
            self.egui_renderer.free_texture(id);
        }
        Ok(())
    }

    /// Renders the 3D view without UI into an offscreen image at window size.
    pub fn capture(&mut self, camera: &CameraController) -> Result<RgbaImage, RenderError> {
        let (width, height) = (self.config.width, self.config.height);
        let target = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Capture Target"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: CAPTURE_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let target_view = target.create_view(&wgpu::TextureViewDescriptor::default());
        let depth_view = create_depth_view(&self.device, width, height);
        let padded_row = padded_bytes_per_row(width);
        let readback = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Capture Readback"),
            size: padded_row as u64 * height as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        self.write_frame_uniform(camera, width as f32 / height.max(1) as f32);
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Capture Encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Capture Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.lighting.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            self.draw_meshes(&mut pass, &self.capture_pipeline);
        }
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &target,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &readback,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = readback.slice(..);
        let (tx, rx) = crossbeam_channel::bounded(1);
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);
        rx.recv().map_err(|_| RenderError::CaptureInterrupted)??;

        let pixels = {
            let data = slice.get_mapped_range();
            unpad_rows(&data, width, height, padded_row)
        };
        readback.unmap();
        log::info!("Captured {}x{} view", width, height);
        RgbaImage::from_raw(width, height, pixels).ok_or(RenderError::CaptureSize { width, height })
    }
}

fn create_depth_view(device: &wgpu::Device, width: u32, height: u32) -> wgpu::TextureView {
    device
        .create_texture(&wgpu::TextureDescriptor {
            label: Some("Depth Texture"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
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

fn create_mesh_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    format: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("Mesh Pipeline"),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs_main"),
            buffers: &[Vertex::layout()],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            // Interior walls are seen from both sides.
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
        cache: None,
    })
}

fn upload_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    label: &str,
    width: u32,
    height: u32,
    rgba: &[u8],
    revision: u64,
) -> GpuTexture {
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
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        rgba,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(width * 4),
            rows_per_image: Some(height),
        },
        size,
    );
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    GpuTexture {
        _texture: texture,
        view,
        revision,
    }
}
