use anyhow::{Context, Result};
use glam::Mat4;
use wgpu::util::DeviceExt;

use super::gpu::GpuContext;
use super::helpers::{axes_lines, floor_mesh};
use super::model_pass::{
    with_bone_limit, DrawData, GpuMesh, ModelPipelines, PipelineSources, SharedLayouts, SurfaceFrameData,
    UniformSlot,
};
use super::shadow_pass::{ShadowCaster, ShadowPass};
use super::{
    FrameView, RenderViewport, SurfaceBackend, SurfaceFactory, SurfaceRequest, TextureRegion, COLOR_FORMAT,
    DEPTH_FORMAT,
};
use crate::assets::ShaderLibrary;
use crate::instance::LiveModelInstance;
use crate::lighting::LightEnvironment;

const SHADOW_ONLY_SLOT: usize = 0;
const FULL_SLOT: usize = 1;
const AXES_LENGTH: f32 = 1.0;

/// Builds wgpu surfaces on a shared device.
///
/// Shaders are read from each request's `surface.shader_dir`.
pub struct WgpuSurfaceFactory {
    context: GpuContext,
}

impl WgpuSurfaceFactory {
    pub fn new(context: GpuContext) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &GpuContext {
        &self.context
    }
}

impl SurfaceFactory for WgpuSurfaceFactory {
    fn create_backend(&mut self, request: SurfaceRequest<'_>) -> Result<Box<dyn SurfaceBackend>> {
        let shaders = ShaderLibrary::new(request.config.surface.shader_dir.clone());
        let asset_id = request.asset.id.clone();
        let backend = WgpuSurfaceBackend::new(self.context.clone(), &shaders, request)
            .with_context(|| format!("Failed to build render surface for '{asset_id}'"))?;
        Ok(Box::new(backend))
    }
}

struct MeshDraw {
    mesh: GpuMesh,
    draw: UniformSlot,
    base_color: [f32; 4],
}

/// Offscreen colour + depth target with the pipelines one actor needs.
pub struct WgpuSurfaceBackend {
    context: GpuContext,
    width: u32,
    height: u32,
    color_texture: wgpu::Texture,
    color_view: wgpu::TextureView,
    depth_texture: wgpu::Texture,
    depth_view: wgpu::TextureView,
    shadow: ShadowPass,
    shadow_bias: f32,
    pipelines: ModelPipelines,
    frame_slots: [(wgpu::Buffer, wgpu::BindGroup); 2],
    meshes: Vec<MeshDraw>,
    floor: MeshDraw,
    axes_buffer: wgpu::Buffer,
    axes_vertex_count: u32,
    axes_draw: UniformSlot,
    palette: UniformSlot,
    palette_staging: Vec<[f32; 16]>,
    skinning_limit_warned: bool,
    encoder: Option<wgpu::CommandEncoder>,
    released: bool,
}

impl WgpuSurfaceBackend {
    pub fn new(context: GpuContext, shaders: &ShaderLibrary, request: SurfaceRequest<'_>) -> Result<Self> {
        let sources = shaders.load()?;
        let surface_cfg = &request.config.surface;
        let shadow_cfg = &request.config.lighting.shadow;
        let max_bones = surface_cfg.max_bones.max(1);
        let device = &context.device;
        let width = request.width.max(1);
        let height = request.height.max(1);

        let layouts = SharedLayouts::new(device);
        let cel_source = with_bone_limit(&sources.cel, max_bones);
        let depth_source = with_bone_limit(&sources.depth, max_bones);
        let pipelines = ModelPipelines::new(
            device,
            &layouts,
            PipelineSources { cel: &cel_source, floor: &sources.floor, axes: &sources.axes },
        );
        let shadow = ShadowPass::new(device, &depth_source, &layouts, shadow_cfg.resolution);

        let (color_texture, color_view) = create_target(device, width, height, COLOR_FORMAT, "Actor Color Target");
        let (depth_texture, depth_view) = create_target(device, width, height, DEPTH_FORMAT, "Actor Depth Target");

        let frame_size = std::mem::size_of::<SurfaceFrameData>() as u64;
        let frame_slots = [
            frame_slot(device, &layouts, &shadow, frame_size, "Actor Shadow-Only Frame"),
            frame_slot(device, &layouts, &shadow, frame_size, "Actor Full Frame"),
        ];

        let draw_size = std::mem::size_of::<DrawData>() as u64;
        let meshes = request
            .asset
            .meshes
            .iter()
            .map(|model_mesh| MeshDraw {
                mesh: GpuMesh::upload(device, &model_mesh.mesh),
                draw: UniformSlot::new(device, layouts.draw.as_ref(), draw_size, "Actor Mesh Draw"),
                base_color: model_mesh.mesh.base_color,
            })
            .collect();
        let floor = MeshDraw {
            mesh: GpuMesh::upload(device, &floor_mesh(surface_cfg.floor_size)),
            draw: UniformSlot::new(device, layouts.draw.as_ref(), draw_size, "Actor Floor Draw"),
            base_color: [0.0, 0.0, 0.0, 0.5],
        };
        let lines = axes_lines(AXES_LENGTH);
        let axes_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Actor Axes Buffer"),
            contents: bytemuck::cast_slice(&lines),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let axes_draw = UniformSlot::new(device, layouts.draw.as_ref(), draw_size, "Actor Axes Draw");

        let palette_staging = vec![Mat4::IDENTITY.to_cols_array(); max_bones];
        let palette = UniformSlot::new(
            device,
            layouts.skinning.as_ref(),
            (max_bones * std::mem::size_of::<[f32; 16]>()) as u64,
            "Actor Skinning Palette",
        );
        context.queue.write_buffer(&palette.buffer, 0, bytemuck::cast_slice(&palette_staging));

        log::debug!(
            "created {width}x{height} surface for '{}' ({} meshes, {max_bones} bones)",
            request.asset.id,
            request.asset.meshes.len()
        );

        Ok(Self {
            context,
            width,
            height,
            color_texture,
            color_view,
            depth_texture,
            depth_view,
            shadow,
            shadow_bias: shadow_cfg.bias,
            pipelines,
            frame_slots,
            meshes,
            floor,
            axes_buffer,
            axes_vertex_count: lines.len() as u32,
            axes_draw,
            palette,
            palette_staging,
            skinning_limit_warned: false,
            encoder: None,
            released: false,
        })
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn write_frame(&self, slot: usize, frame: &FrameView, environment: &LightEnvironment) {
        let data = SurfaceFrameData::new(frame, environment, self.shadow_bias, self.shadow.resolution());
        self.context.queue.write_buffer(&self.frame_slots[slot].0, 0, bytemuck::bytes_of(&data));
    }

    /// Uploads the palette and per-mesh uniforms for the instance's pose.
    fn upload_instance(&mut self, instance: &LiveModelInstance) {
        let palette = instance.palette();
        if palette.len() > self.palette_staging.len() && !self.skinning_limit_warned {
            self.skinning_limit_warned = true;
            log::warn!(
                "skin palette has {} joints; only the first {} will be uploaded",
                palette.len(),
                self.palette_staging.len()
            );
        }
        let joint_count = palette.len().min(self.palette_staging.len());
        for (dst, matrix) in self.palette_staging.iter_mut().zip(palette.iter()) {
            *dst = matrix.to_cols_array();
        }
        self.context.queue.write_buffer(&self.palette.buffer, 0, bytemuck::cast_slice(&self.palette_staging));

        let asset = instance.asset();
        for (index, draw) in self.meshes.iter().enumerate() {
            let skinned = asset.meshes.get(index).map(|m| m.skinned).unwrap_or(false);
            let data = DrawData::new(
                instance.mesh_transform(index),
                draw.base_color,
                if skinned { joint_count } else { 0 },
            );
            self.context.queue.write_buffer(&draw.draw.buffer, 0, bytemuck::bytes_of(&data));
        }
    }

    fn surface_pass<'e>(
        encoder: &'e mut wgpu::CommandEncoder,
        color_view: &wgpu::TextureView,
        depth_view: &wgpu::TextureView,
        label: &str,
    ) -> wgpu::RenderPass<'e> {
        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(label),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: color_view,
                resolve_target: None,
                depth_slice: None,
                ops: wgpu::Operations { load: wgpu::LoadOp::Load, store: wgpu::StoreOp::Store },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: depth_view,
                depth_ops: Some(wgpu::Operations { load: wgpu::LoadOp::Load, store: wgpu::StoreOp::Store }),
                stencil_ops: None,
            }),
            occlusion_query_set: None,
            timestamp_writes: None,
        })
    }
}

impl SurfaceBackend for WgpuSurfaceBackend {
    fn viewport(&self) -> RenderViewport {
        self.context.viewport()
    }

    fn render_shadow_map(&mut self, light_view_proj: Mat4, instance: &LiveModelInstance) -> Result<()> {
        self.upload_instance(instance);
        let mut encoder = self
            .context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("Actor Shadow Encoder") });
        let casters: Vec<ShadowCaster<'_>> = self
            .meshes
            .iter()
            .map(|draw| ShadowCaster { mesh: &draw.mesh, draw_bind_group: &draw.draw.bind_group })
            .collect();
        self.shadow.encode(&self.context.queue, &mut encoder, light_view_proj, &casters, &self.palette.bind_group);
        self.context.queue.submit(Some(encoder.finish()));
        Ok(())
    }

    fn begin_surface(&mut self, clear_color: [f32; 4]) -> Result<()> {
        self.context.set_viewport(RenderViewport::from_size(self.width, self.height));
        let mut encoder = self
            .context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("Actor Surface Encoder") });
        {
            let [r, g, b, a] = clear_color.map(f64::from);
            let _clear = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Actor Surface Clear"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.color_view,
                    resolve_target: None,
                    depth_slice: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations { load: wgpu::LoadOp::Clear(1.0), store: wgpu::StoreOp::Store }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });
        }
        self.encoder = Some(encoder);
        Ok(())
    }

    fn draw_floor(&mut self, frame: &FrameView, environment: &LightEnvironment) -> Result<()> {
        self.write_frame(SHADOW_ONLY_SLOT, frame, environment);
        let data = DrawData::new(Mat4::IDENTITY, self.floor.base_color, 0);
        self.context.queue.write_buffer(&self.floor.draw.buffer, 0, bytemuck::bytes_of(&data));
        let encoder = self.encoder.as_mut().context("Surface encoder missing (begin_surface not called)")?;
        let mut pass = Self::surface_pass(encoder, &self.color_view, &self.depth_view, "Actor Floor Pass");
        pass.set_pipeline(&self.pipelines.floor);
        pass.set_bind_group(0, &self.frame_slots[SHADOW_ONLY_SLOT].1, &[]);
        pass.set_bind_group(1, &self.floor.draw.bind_group, &[]);
        pass.set_bind_group(2, &self.palette.bind_group, &[]);
        pass.set_vertex_buffer(0, self.floor.mesh.vertex_buffer.slice(..));
        pass.set_index_buffer(self.floor.mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        pass.draw_indexed(0..self.floor.mesh.index_count, 0, 0..1);
        Ok(())
    }

    fn draw_axes(&mut self, frame: &FrameView, environment: &LightEnvironment) -> Result<()> {
        self.write_frame(FULL_SLOT, frame, environment);
        let data = DrawData::new(Mat4::IDENTITY, [1.0; 4], 0);
        self.context.queue.write_buffer(&self.axes_draw.buffer, 0, bytemuck::bytes_of(&data));
        let encoder = self.encoder.as_mut().context("Surface encoder missing (begin_surface not called)")?;
        let mut pass = Self::surface_pass(encoder, &self.color_view, &self.depth_view, "Actor Axes Pass");
        pass.set_pipeline(&self.pipelines.axes);
        pass.set_bind_group(0, &self.frame_slots[FULL_SLOT].1, &[]);
        pass.set_bind_group(1, &self.axes_draw.bind_group, &[]);
        pass.set_bind_group(2, &self.palette.bind_group, &[]);
        pass.set_vertex_buffer(0, self.axes_buffer.slice(..));
        pass.draw(0..self.axes_vertex_count, 0..1);
        Ok(())
    }

    fn draw_model(
        &mut self,
        frame: &FrameView,
        environment: &LightEnvironment,
        instance: &LiveModelInstance,
    ) -> Result<()> {
        self.write_frame(FULL_SLOT, frame, environment);
        self.upload_instance(instance);
        let encoder = self.encoder.as_mut().context("Surface encoder missing (begin_surface not called)")?;
        let mut pass = Self::surface_pass(encoder, &self.color_view, &self.depth_view, "Actor Model Pass");
        pass.set_pipeline(&self.pipelines.cel);
        pass.set_bind_group(0, &self.frame_slots[FULL_SLOT].1, &[]);
        pass.set_bind_group(2, &self.palette.bind_group, &[]);
        for draw in &self.meshes {
            pass.set_bind_group(1, &draw.draw.bind_group, &[]);
            pass.set_vertex_buffer(0, draw.mesh.vertex_buffer.slice(..));
            pass.set_index_buffer(draw.mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..draw.mesh.index_count, 0, 0..1);
        }
        Ok(())
    }

    fn end_surface(&mut self, restore: RenderViewport) -> Result<()> {
        let encoder = self.encoder.take();
        self.context.set_viewport(restore);
        let encoder = encoder.context("Surface encoder missing (begin_surface not called)")?;
        self.context.queue.submit(Some(encoder.finish()));
        Ok(())
    }

    fn texture_region(&self) -> TextureRegion {
        TextureRegion::full(self.width, self.height).flipped_y()
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.encoder = None;
        self.color_texture.destroy();
        self.depth_texture.destroy();
        self.shadow.destroy();
    }

    fn color_view(&self) -> Option<&wgpu::TextureView> {
        Some(&self.color_view)
    }
}

fn create_target(
    device: &wgpu::Device,
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
    label: &str,
) -> (wgpu::Texture, wgpu::TextureView) {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT
            | wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    (texture, view)
}

fn frame_slot(
    device: &wgpu::Device,
    layouts: &SharedLayouts,
    shadow: &ShadowPass,
    size: u64,
    label: &str,
) -> (wgpu::Buffer, wgpu::BindGroup) {
    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });
    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout: layouts.frame.as_ref(),
        entries: &[
            wgpu::BindGroupEntry { binding: 0, resource: buffer.as_entire_binding() },
            wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::TextureView(shadow.map_view()) },
            wgpu::BindGroupEntry { binding: 2, resource: wgpu::BindingResource::Sampler(shadow.sampler()) },
        ],
    });
    (buffer, bind_group)
}
