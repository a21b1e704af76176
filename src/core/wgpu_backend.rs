use std::collections::HashMap;
use std::mem::size_of;
use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;
use winit::window::Window;

use super::gpu_context::{GpuContext, GpuError};
use crate::mesh::{Vertex, VERTEX_LAYOUT};
use crate::shader::{ShaderError, ShaderSource, ShaderStage};
use crate::texture::TextureImage;
use crate::traits::RenderBackend;

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

const CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 0.05,
    g: 0.05,
    b: 0.05,
    a: 1.0,
};

/// Sampler uniforms the built-in fragment stage exposes, by bind group slot
const MATERIAL_SLOTS: [&str; 2] = ["material.texture_diffuse1", "material.texture_specular1"];

/// Per-draw transform block (group 0, binding 0)
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct Transforms {
    model: [[f32; 4]; 4],
    view: [[f32; 4]; 4],
    projection: [[f32; 4]; 4],
}

impl Default for Transforms {
    fn default() -> Self {
        let identity = Mat4::IDENTITY.to_cols_array_2d();
        Self {
            model: identity,
            view: identity,
            projection: identity,
        }
    }
}

struct MeshInner {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
}

/// Vertex and index buffers of one mesh
pub struct GpuMesh(Arc<MeshInner>);

struct TextureInner {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

/// Uploaded RGBA8 texture
#[derive(Clone)]
pub struct GpuTexture(Arc<TextureInner>);

/// Render pipeline built from one vertex and one fragment stage
pub struct GpuProgram {
    pipeline: Arc<wgpu::RenderPipeline>,
}

/// Sampler-to-unit and unit-to-texture bindings set up for the next draw
#[derive(Debug)]
struct MaterialState<T> {
    /// Texture unit each material slot samples from
    slot_units: [Option<u32>; 2],
    /// Texture bound to each unit
    units: HashMap<u32, T>,
}

impl<T> MaterialState<T> {
    fn new() -> Self {
        Self {
            slot_units: [None; 2],
            units: HashMap::new(),
        }
    }

    /// Returns false for sampler names with no material slot
    fn set_sampler(&mut self, name: &str, unit: u32) -> bool {
        match MATERIAL_SLOTS.iter().position(|slot| *slot == name) {
            Some(slot) => {
                self.slot_units[slot] = Some(unit);
                true
            }
            None => false,
        }
    }

    fn bind(&mut self, unit: u32, texture: T) {
        self.units.insert(unit, texture);
    }

    /// Texture sampled by each slot, `None` where the slot is unbound
    fn slots(&self) -> [Option<&T>; 2] {
        self.slot_units.map(|unit| unit.and_then(|unit| self.units.get(&unit)))
    }

    /// Each draw starts from unbound slots
    fn clear(&mut self) {
        self.slot_units = [None; 2];
        self.units.clear();
    }
}

struct DrawCommand {
    pipeline: Arc<wgpu::RenderPipeline>,
    mesh: Arc<MeshInner>,
    material: wgpu::BindGroup,
    transforms: Transforms,
    index_count: u32,
}

/// [`RenderBackend`] drawing into a window surface through wgpu
///
/// Mirrors the bound-state model: `set_mat4`, `set_sampler` and
/// `bind_texture` change state that the next `draw_indexed` captures. Draws
/// are recorded during the frame and submitted together by [`present`].
///
/// [`present`]: WgpuBackend::present
pub struct WgpuBackend {
    gpu: GpuContext,
    depth_view: wgpu::TextureView,
    transform_layout: wgpu::BindGroupLayout,
    material_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    sampler: wgpu::Sampler,
    white: GpuTexture,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    uniform_capacity: usize,
    uniform_stride: usize,
    transforms: Transforms,
    material: MaterialState<GpuTexture>,
    draws: Vec<DrawCommand>,
}

impl WgpuBackend {
    pub async fn new(window: Arc<Window>) -> Result<Self, GpuError> {
        let gpu = GpuContext::new(window).await?;
        let device = gpu.device();

        let transform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("transform_bind_group_layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: wgpu::BufferSize::new(size_of::<Transforms>() as u64),
                },
                count: None,
            }],
        });

        let texture_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };
        let material_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("material_bind_group_layout"),
            entries: &[
                texture_entry(0),
                texture_entry(1),
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("model_pipeline_layout"),
            bind_group_layouts: &[&transform_layout, &material_layout],
            push_constant_ranges: &[],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("material_sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let alignment = device.limits().min_uniform_buffer_offset_alignment as usize;
        let uniform_stride = size_of::<Transforms>().next_multiple_of(alignment);
        let uniform_capacity = 64;
        let (uniform_buffer, uniform_bind_group) =
            Self::create_uniforms(device, &transform_layout, uniform_stride, uniform_capacity);

        let depth_view = Self::create_depth_view(device, gpu.size());

        let backend = Self {
            depth_view,
            transform_layout,
            material_layout,
            pipeline_layout,
            sampler,
            white: GpuTexture(Arc::new(Self::create_texture(&gpu, &TextureImage::solid([255; 4])))),
            uniform_buffer,
            uniform_bind_group,
            uniform_capacity,
            uniform_stride,
            transforms: Transforms::default(),
            material: MaterialState::new(),
            draws: Vec::new(),
            gpu,
        };

        log::info!(
            "wgpu backend ready: {}x{} {:?}",
            backend.gpu.size().width,
            backend.gpu.size().height,
            backend.gpu.format()
        );
        Ok(backend)
    }

    pub fn size(&self) -> PhysicalSize<u32> {
        self.gpu.size()
    }

    pub fn aspect_ratio(&self) -> f32 {
        let size = self.gpu.size();
        size.width as f32 / size.height.max(1) as f32
    }

    pub fn resize(&mut self, size: PhysicalSize<u32>) {
        if self.gpu.resize(size) {
            self.depth_view = Self::create_depth_view(self.gpu.device(), size);
        }
    }

    /// Submit every draw recorded since the last call and present the frame
    pub fn present(&mut self) -> Result<(), wgpu::SurfaceError> {
        let draws = std::mem::take(&mut self.draws);

        let output = match self.gpu.surface().get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                log::warn!("Surface lost, reconfiguring");
                self.gpu.reconfigure();
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());

        self.upload_transforms(&draws);

        let mut encoder = self
            .gpu
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Model Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(CLEAR_COLOR),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            for (i, draw) in draws.iter().enumerate() {
                let offset = (i * self.uniform_stride) as u32;
                render_pass.set_pipeline(&draw.pipeline);
                render_pass.set_bind_group(0, &self.uniform_bind_group, &[offset]);
                render_pass.set_bind_group(1, &draw.material, &[]);
                render_pass.set_vertex_buffer(0, draw.mesh.vertex_buffer.slice(..));
                render_pass.set_index_buffer(draw.mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                render_pass.draw_indexed(0..draw.index_count, 0, 0..1);
            }
        }

        self.gpu.queue().submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }

    /// Write each draw's transforms at its dynamic offset, growing the buffer as needed
    fn upload_transforms(&mut self, draws: &[DrawCommand]) {
        if draws.is_empty() {
            return;
        }
        if draws.len() > self.uniform_capacity {
            let capacity = draws.len().next_power_of_two();
            let (buffer, bind_group) =
                Self::create_uniforms(self.gpu.device(), &self.transform_layout, self.uniform_stride, capacity);
            self.uniform_buffer = buffer;
            self.uniform_bind_group = bind_group;
            self.uniform_capacity = capacity;
            log::debug!("Transform buffer grown to {} draws", capacity);
        }

        let mut bytes = vec![0u8; draws.len() * self.uniform_stride];
        for (chunk, draw) in bytes.chunks_exact_mut(self.uniform_stride).zip(draws) {
            chunk[..size_of::<Transforms>()].copy_from_slice(bytemuck::bytes_of(&draw.transforms));
        }
        self.gpu.queue().write_buffer(&self.uniform_buffer, 0, &bytes);
    }

    fn material_bind_group(&self) -> wgpu::BindGroup {
        let [diffuse, specular] = self
            .material
            .slots()
            .map(|texture| &texture.unwrap_or(&self.white).0.view);

        self.gpu.device().create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("material_bind_group"),
            layout: &self.material_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(diffuse),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(specular),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        })
    }

    fn create_uniforms(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        stride: usize,
        capacity: usize,
    ) -> (wgpu::Buffer, wgpu::BindGroup) {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("transform_buffer"),
            size: (stride * capacity) as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("transform_bind_group"),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &buffer,
                    offset: 0,
                    size: wgpu::BufferSize::new(size_of::<Transforms>() as u64),
                }),
            }],
        });
        (buffer, bind_group)
    }

    fn create_depth_view(device: &wgpu::Device, size: PhysicalSize<u32>) -> wgpu::TextureView {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Depth Texture"),
            size: wgpu::Extent3d {
                width: size.width.max(1),
                height: size.height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        texture.create_view(&wgpu::TextureViewDescriptor::default())
    }

    fn create_texture(gpu: &GpuContext, image: &TextureImage) -> TextureInner {
        let texture = gpu.device().create_texture_with_data(
            gpu.queue(),
            &wgpu::TextureDescriptor {
                label: Some("Material Texture"),
                size: wgpu::Extent3d {
                    width: image.width,
                    height: image.height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8UnormSrgb,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            &image.pixels,
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        TextureInner {
            _texture: texture,
            view,
        }
    }

    fn shader_module(&self, stage: ShaderStage, source: &str) -> Result<wgpu::ShaderModule, ShaderError> {
        let device = self.gpu.device();
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&format!("{} shader", stage)),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });
        match pollster::block_on(device.pop_error_scope()) {
            Some(error) => Err(ShaderError::Compile {
                stage,
                log: error.to_string(),
            }),
            None => Ok(module),
        }
    }
}

fn vertex_format(components: u32) -> wgpu::VertexFormat {
    match components {
        1 => wgpu::VertexFormat::Float32,
        2 => wgpu::VertexFormat::Float32x2,
        3 => wgpu::VertexFormat::Float32x3,
        _ => wgpu::VertexFormat::Float32x4,
    }
}

impl RenderBackend for WgpuBackend {
    type MeshBuffers = GpuMesh;
    type Texture = GpuTexture;
    type Program = GpuProgram;

    fn create_mesh_buffers(&mut self, vertices: &[Vertex], indices: &[u32]) -> GpuMesh {
        let device = self.gpu.device();
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Vertex Buffer"),
            contents: bytemuck::cast_slice(vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Index Buffer"),
            contents: bytemuck::cast_slice(indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        GpuMesh(Arc::new(MeshInner {
            vertex_buffer,
            index_buffer,
        }))
    }

    fn upload_texture(&mut self, image: &TextureImage) -> GpuTexture {
        GpuTexture(Arc::new(Self::create_texture(&self.gpu, image)))
    }

    fn compile_program(&mut self, source: &ShaderSource) -> Result<GpuProgram, ShaderError> {
        let vertex = self.shader_module(ShaderStage::Vertex, source.source(ShaderStage::Vertex))?;
        let fragment = self.shader_module(ShaderStage::Fragment, source.source(ShaderStage::Fragment))?;

        let attributes: Vec<wgpu::VertexAttribute> = VERTEX_LAYOUT
            .iter()
            .map(|attribute| wgpu::VertexAttribute {
                format: vertex_format(attribute.components),
                offset: attribute.offset as wgpu::BufferAddress,
                shader_location: attribute.location,
            })
            .collect();

        let device = self.gpu.device();
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Model Pipeline"),
            layout: Some(&self.pipeline_layout),
            vertex: wgpu::VertexState {
                module: &vertex,
                entry_point: Some("vs_main"),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: Vertex::STRIDE as wgpu::BufferAddress,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &attributes,
                }],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &fragment,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: self.gpu.format(),
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
            cache: None,
        });

        match pollster::block_on(device.pop_error_scope()) {
            Some(error) => Err(ShaderError::Link {
                log: error.to_string(),
            }),
            None => Ok(GpuProgram {
                pipeline: Arc::new(pipeline),
            }),
        }
    }

    fn set_mat4(&mut self, _program: &GpuProgram, name: &str, value: Mat4) {
        let columns = value.to_cols_array_2d();
        match name {
            "model" => self.transforms.model = columns,
            "view" => self.transforms.view = columns,
            "projection" => self.transforms.projection = columns,
            _ => log::trace!("Ignoring unknown mat4 uniform {}", name),
        }
    }

    fn set_sampler(&mut self, _program: &GpuProgram, name: &str, unit: u32) {
        if !self.material.set_sampler(name, unit) {
            log::trace!("Ignoring unknown sampler {}", name);
        }
    }

    fn bind_texture(&mut self, unit: u32, texture: &GpuTexture) {
        self.material.bind(unit, texture.clone());
    }

    fn draw_indexed(&mut self, program: &GpuProgram, buffers: &GpuMesh, index_count: u32) {
        if index_count > 0 {
            let material = self.material_bind_group();
            self.draws.push(DrawCommand {
                pipeline: Arc::clone(&program.pipeline),
                mesh: Arc::clone(&buffers.0),
                material,
                transforms: self.transforms,
                index_count,
            });
        }
        self.material.clear();
    }
}
