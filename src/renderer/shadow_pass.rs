use glam::Mat4;

use super::model_pass::{uniform_entry, GpuMesh, SharedLayouts, UniformSlot};
use super::DEPTH_FORMAT;
use crate::mesh::MeshVertex;

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct ShadowUniform {
    light_view_proj: [[f32; 4]; 4],
}

pub(super) struct ShadowCaster<'a> {
    pub mesh: &'a GpuMesh,
    pub draw_bind_group: &'a wgpu::BindGroup,
}

/// Depth-only render of the model from the shadow light, plus the sampler the
/// floor uses to read it back.
pub(super) struct ShadowPass {
    pipeline: wgpu::RenderPipeline,
    frame: UniformSlot,
    map_texture: wgpu::Texture,
    map_view: wgpu::TextureView,
    sampler: wgpu::Sampler,
    resolution: u32,
}

impl ShadowPass {
    pub fn new(device: &wgpu::Device, source: &str, layouts: &SharedLayouts, resolution: u32) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Actor Shadow Shader"),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });

        let frame_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Actor Shadow Frame BGL"),
            entries: &[uniform_entry(0, wgpu::ShaderStages::VERTEX)],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Actor Shadow Pipeline Layout"),
            bind_group_layouts: &[&frame_bgl, layouts.draw.as_ref(), layouts.skinning.as_ref()],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Actor Shadow Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[MeshVertex::layout()],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: None,
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: Some(wgpu::Face::Back),
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::LessEqual,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let frame = UniformSlot::new(
            device,
            &frame_bgl,
            std::mem::size_of::<ShadowUniform>() as u64,
            "Actor Shadow Frame",
        );

        let resolution = resolution.clamp(1, 8192);
        let map_texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Actor Shadow Map"),
            size: wgpu::Extent3d { width: resolution, height: resolution, depth_or_array_layers: 1 },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let map_view = map_texture.create_view(&wgpu::TextureViewDescriptor::default());

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Actor Shadow Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            lod_min_clamp: 0.0,
            lod_max_clamp: 0.0,
            compare: Some(wgpu::CompareFunction::LessEqual),
            anisotropy_clamp: 1,
            border_color: None,
        });

        Self { pipeline, frame, map_texture, map_view, sampler, resolution }
    }

    pub fn map_view(&self) -> &wgpu::TextureView {
        &self.map_view
    }

    pub fn sampler(&self) -> &wgpu::Sampler {
        &self.sampler
    }

    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    pub fn encode(
        &self,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        light_view_proj: Mat4,
        casters: &[ShadowCaster<'_>],
        palette: &wgpu::BindGroup,
    ) {
        let uniform = ShadowUniform { light_view_proj: light_view_proj.to_cols_array_2d() };
        queue.write_buffer(&self.frame.buffer, 0, bytemuck::bytes_of(&uniform));

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Actor Shadow Pass"),
            color_attachments: &[],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.map_view,
                depth_ops: Some(wgpu::Operations { load: wgpu::LoadOp::Clear(1.0), store: wgpu::StoreOp::Store }),
                stencil_ops: None,
            }),
            occlusion_query_set: None,
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.pipeline);
        let res_f = self.resolution as f32;
        pass.set_viewport(0.0, 0.0, res_f, res_f, 0.0, 1.0);
        pass.set_scissor_rect(0, 0, self.resolution, self.resolution);
        pass.set_bind_group(0, &self.frame.bind_group, &[]);
        pass.set_bind_group(2, palette, &[]);
        for caster in casters {
            pass.set_bind_group(1, caster.draw_bind_group, &[]);
            pass.set_vertex_buffer(0, caster.mesh.vertex_buffer.slice(..));
            pass.set_index_buffer(caster.mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..caster.mesh.index_count, 0, 0..1);
        }
    }

    pub fn destroy(&self) {
        self.map_texture.destroy();
    }
}
