use glam::Mat4;
use std::sync::Arc;
use wgpu::util::DeviceExt;

use super::helpers::LineVertex;
use super::{FrameView, COLOR_FORMAT, DEPTH_FORMAT};
use crate::lighting::LightEnvironment;
use crate::mesh::{Mesh, MeshVertex};

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub(super) struct SurfaceFrameData {
    pub view_proj: [[f32; 4]; 4],
    pub light_view_proj: [[f32; 4]; 4],
    pub camera_pos: [f32; 4],
    pub light_pos: [f32; 4],
    /// rgb colour, w intensity.
    pub light_color: [f32; 4],
    pub ambient: [f32; 4],
    /// x shadow bias, y receives shadow, z point light count, w shadow texel size.
    pub params: [f32; 4],
}

impl SurfaceFrameData {
    pub fn new(frame: &FrameView, environment: &LightEnvironment, shadow_bias: f32, shadow_resolution: u32) -> Self {
        let (light_pos, light_color) = match environment.point_lights.first() {
            Some(light) => (light.position.extend(1.0).to_array(), light.color.extend(light.intensity).to_array()),
            None => ([0.0; 4], [0.0; 4]),
        };
        Self {
            view_proj: frame.view_proj.to_cols_array_2d(),
            light_view_proj: frame.light_view_proj.to_cols_array_2d(),
            camera_pos: frame.camera_position.extend(1.0).to_array(),
            light_pos,
            light_color,
            ambient: environment.ambient.extend(1.0).to_array(),
            params: [
                shadow_bias,
                if environment.receives_shadow { 1.0 } else { 0.0 },
                environment.point_lights.len() as f32,
                1.0 / shadow_resolution.max(1) as f32,
            ],
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub(super) struct DrawData {
    pub model: [[f32; 4]; 4],
    pub base_color: [f32; 4],
    /// x joint count; zero disables skinning.
    pub skin: [u32; 4],
}

impl DrawData {
    pub fn new(model: Mat4, base_color: [f32; 4], joint_count: usize) -> Self {
        Self { model: model.to_cols_array_2d(), base_color, skin: [joint_count as u32, 0, 0, 0] }
    }
}

pub(super) struct GpuMesh {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub index_count: u32,
}

impl GpuMesh {
    pub fn upload(device: &wgpu::Device, mesh: &Mesh) -> Self {
        let label = mesh.name.as_deref().unwrap_or("mesh");
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("Actor Vertex Buffer ({label})")),
            contents: bytemuck::cast_slice(&mesh.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("Actor Index Buffer ({label})")),
            contents: bytemuck::cast_slice(&mesh.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self { vertex_buffer, index_buffer, index_count: mesh.indices.len() as u32 }
    }
}

/// Uniform buffer with the bind group that exposes it.
pub(super) struct UniformSlot {
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
}

impl UniformSlot {
    pub fn new(device: &wgpu::Device, layout: &wgpu::BindGroupLayout, size: u64, label: &str) -> Self {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout,
            entries: &[wgpu::BindGroupEntry { binding: 0, resource: buffer.as_entire_binding() }],
        });
        Self { buffer, bind_group }
    }
}

/// Bind group layouts shared by the shadow and surface pipelines.
pub(super) struct SharedLayouts {
    pub frame: Arc<wgpu::BindGroupLayout>,
    pub draw: Arc<wgpu::BindGroupLayout>,
    pub skinning: Arc<wgpu::BindGroupLayout>,
}

impl SharedLayouts {
    pub fn new(device: &wgpu::Device) -> Self {
        let frame = Arc::new(device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Actor Frame BGL"),
            entries: &[
                uniform_entry(0, wgpu::ShaderStages::VERTEX_FRAGMENT),
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Depth,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison),
                    count: None,
                },
            ],
        }));
        let draw = Arc::new(device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Actor Draw BGL"),
            entries: &[uniform_entry(0, wgpu::ShaderStages::VERTEX_FRAGMENT)],
        }));
        let skinning = Arc::new(device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Actor Skinning BGL"),
            entries: &[uniform_entry(0, wgpu::ShaderStages::VERTEX)],
        }));
        Self { frame, draw, skinning }
    }
}

pub(super) fn uniform_entry(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

/// Prefixes a skinning shader with the palette size it was built for.
pub(super) fn with_bone_limit(source: &str, max_bones: usize) -> String {
    format!("const MAX_BONES: u32 = {}u;\n{source}", max_bones.max(1))
}

pub(super) struct ModelPipelines {
    pub cel: wgpu::RenderPipeline,
    pub floor: wgpu::RenderPipeline,
    pub axes: wgpu::RenderPipeline,
}

pub(super) struct PipelineSources<'a> {
    pub cel: &'a str,
    pub floor: &'a str,
    pub axes: &'a str,
}

impl ModelPipelines {
    pub fn new(device: &wgpu::Device, layouts: &SharedLayouts, sources: PipelineSources<'_>) -> Self {
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Actor Surface Pipeline Layout"),
            bind_group_layouts: &[layouts.frame.as_ref(), layouts.draw.as_ref(), layouts.skinning.as_ref()],
            push_constant_ranges: &[],
        });
        let cel = surface_pipeline(
            device,
            &layout,
            SurfacePipelineDesc {
                label: "Actor Cel Pipeline",
                source: sources.cel,
                vertex: MeshVertex::layout(),
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: Some(wgpu::Face::Back),
                depth_write: true,
            },
        );
        let floor = surface_pipeline(
            device,
            &layout,
            SurfacePipelineDesc {
                label: "Actor Floor Pipeline",
                source: sources.floor,
                vertex: MeshVertex::layout(),
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: None,
                depth_write: false,
            },
        );
        let axes = surface_pipeline(
            device,
            &layout,
            SurfacePipelineDesc {
                label: "Actor Axes Pipeline",
                source: sources.axes,
                vertex: LineVertex::layout(),
                topology: wgpu::PrimitiveTopology::LineList,
                cull_mode: None,
                depth_write: true,
            },
        );
        Self { cel, floor, axes }
    }
}

struct SurfacePipelineDesc<'a> {
    label: &'a str,
    source: &'a str,
    vertex: wgpu::VertexBufferLayout<'a>,
    topology: wgpu::PrimitiveTopology,
    cull_mode: Option<wgpu::Face>,
    depth_write: bool,
}

fn surface_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    desc: SurfacePipelineDesc<'_>,
) -> wgpu::RenderPipeline {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(desc.label),
        source: wgpu::ShaderSource::Wgsl(desc.source.into()),
    });
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(desc.label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            buffers: &[desc.vertex],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: COLOR_FORMAT,
                blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: desc.topology,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: desc.cull_mode,
            ..Default::default()
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: desc.depth_write,
            depth_compare: wgpu::CompareFunction::LessEqual,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}
