use anyhow::Result;
use bitflags::bitflags;
use glam::{Mat4, Vec3};

use crate::assets::SceneAsset;
use crate::camera3d::Camera3D;
use crate::config::ActorConfig;
use crate::instance::LiveModelInstance;
use crate::lighting::{LightEnvironment, LightingRig};

pub mod gpu;
pub mod helpers;
pub mod model_pass;
pub mod shadow_pass;
pub mod wgpu_backend;

pub use gpu::GpuContext;
pub use wgpu_backend::{WgpuSurfaceBackend, WgpuSurfaceFactory};

pub const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct RenderFlags: u32 {
        const DRAW_AXES = 0b0001;
    }
}

/// Rectangle the host is currently rendering into, in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderViewport {
    pub origin: (f32, f32),
    pub size: (f32, f32),
}

impl RenderViewport {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { origin: (x, y), size: (width, height) }
    }

    pub fn from_size(width: u32, height: u32) -> Self {
        Self::new(0.0, 0.0, width as f32, height as f32)
    }
}

/// Region of the offscreen colour target the host samples as a sprite.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextureRegion {
    pub width: u32,
    pub height: u32,
    pub u0: f32,
    pub v0: f32,
    pub u1: f32,
    pub v1: f32,
}

impl TextureRegion {
    pub fn full(width: u32, height: u32) -> Self {
        Self { width, height, u0: 0.0, v0: 0.0, u1: 1.0, v1: 1.0 }
    }

    pub fn flipped_y(mut self) -> Self {
        std::mem::swap(&mut self.v0, &mut self.v1);
        self
    }

    pub fn is_flipped_y(&self) -> bool {
        self.v0 > self.v1
    }
}

/// Per-frame matrices shared by every draw into the surface.
#[derive(Debug, Clone, Copy)]
pub struct FrameView {
    pub view_proj: Mat4,
    pub camera_position: Vec3,
    pub light_view_proj: Mat4,
}

/// GPU side of one actor's offscreen surface.
pub trait SurfaceBackend {
    fn viewport(&self) -> RenderViewport;
    fn render_shadow_map(&mut self, light_view_proj: Mat4, instance: &LiveModelInstance) -> Result<()>;
    fn begin_surface(&mut self, clear_color: [f32; 4]) -> Result<()>;
    fn draw_floor(&mut self, frame: &FrameView, environment: &LightEnvironment) -> Result<()>;
    fn draw_axes(&mut self, frame: &FrameView, environment: &LightEnvironment) -> Result<()>;
    fn draw_model(
        &mut self,
        frame: &FrameView,
        environment: &LightEnvironment,
        instance: &LiveModelInstance,
    ) -> Result<()>;
    fn end_surface(&mut self, restore: RenderViewport) -> Result<()>;
    fn texture_region(&self) -> TextureRegion;
    fn release(&mut self);

    fn color_view(&self) -> Option<&wgpu::TextureView> {
        None
    }
}

pub struct SurfaceRequest<'a> {
    pub asset: &'a SceneAsset,
    pub width: u32,
    pub height: u32,
    pub config: &'a ActorConfig,
}

/// Builds backends for actors as they resolve their assets.
pub trait SurfaceFactory {
    fn create_backend(&mut self, request: SurfaceRequest<'_>) -> Result<Box<dyn SurfaceBackend>>;
}

/// Drives the two-pass draw sequence for one actor.
pub struct OffscreenRenderer {
    backend: Option<Box<dyn SurfaceBackend>>,
    flags: RenderFlags,
    clear_color: [f32; 4],
    width: u32,
    height: u32,
    frames_rendered: u64,
}

impl OffscreenRenderer {
    pub fn new(backend: Box<dyn SurfaceBackend>, width: u32, height: u32, config: &ActorConfig) -> Self {
        Self {
            backend: Some(backend),
            flags: config.debug.render_flags(),
            clear_color: config.surface.clear_color,
            width,
            height,
            frames_rendered: 0,
        }
    }

    pub fn flags(&self) -> RenderFlags {
        self.flags
    }

    pub fn set_flags(&mut self, flags: RenderFlags) {
        self.flags = flags;
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn texture_region(&self) -> Option<TextureRegion> {
        self.backend.as_ref().map(|backend| backend.texture_region())
    }

    pub fn color_view(&self) -> Option<&wgpu::TextureView> {
        self.backend.as_ref().and_then(|backend| backend.color_view())
    }

    pub fn render(&mut self, camera: &Camera3D, instance: &LiveModelInstance, rig: &LightingRig) -> Result<()> {
        let Some(backend) = self.backend.as_mut() else {
            return Ok(());
        };
        let saved = backend.viewport();

        let light_view_proj = rig.shadow_light.view_projection(Vec3::ZERO, camera.forward());
        backend.render_shadow_map(light_view_proj, instance)?;

        let frame = FrameView {
            view_proj: camera.view_projection((self.width, self.height)),
            camera_position: camera.position,
            light_view_proj,
        };
        backend.begin_surface(self.clear_color)?;
        let drawn = draw_surface_contents(&mut **backend, &frame, instance, rig, self.flags);
        let ended = backend.end_surface(saved);
        drawn?;
        ended?;
        self.frames_rendered += 1;
        Ok(())
    }

    /// Releases GPU resources. Safe to call more than once.
    pub fn release(&mut self) {
        if let Some(mut backend) = self.backend.take() {
            backend.release();
        }
    }
}

fn draw_surface_contents(
    backend: &mut dyn SurfaceBackend,
    frame: &FrameView,
    instance: &LiveModelInstance,
    rig: &LightingRig,
    flags: RenderFlags,
) -> Result<()> {
    backend.draw_floor(frame, &rig.shadow_only())?;
    let full = rig.full();
    if flags.contains(RenderFlags::DRAW_AXES) {
        backend.draw_axes(frame, &full)?;
    }
    backend.draw_model(frame, &full, instance)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_flip_swaps_v() {
        let region = TextureRegion::full(320, 240).flipped_y();
        assert!(region.is_flipped_y());
        assert_eq!((region.v0, region.v1), (1.0, 0.0));
        assert_eq!((region.u0, region.u1), (0.0, 1.0));
    }
}
