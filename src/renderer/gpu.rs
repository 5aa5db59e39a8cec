use anyhow::{Context, Result};
use std::cell::Cell;
use std::rc::Rc;

use super::RenderViewport;

/// Device, queue and the viewport the host is currently drawing into.
///
/// The viewport cell is shared with every surface created from this context:
/// surfaces override it while they draw and put the host's value back when
/// they finish.
#[derive(Clone)]
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    viewport: Rc<Cell<RenderViewport>>,
}

impl GpuContext {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue, viewport: RenderViewport) -> Self {
        Self { device, queue, viewport: Rc::new(Cell::new(viewport)) }
    }

    /// Creates a context without a window, for tools and tests.
    pub fn headless() -> Result<Self> {
        pollster::block_on(Self::headless_async())
    }

    async fn headless_async() -> Result<Self> {
        let instance = wgpu::Instance::default();
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::LowPower,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .context("Failed to request headless adapter")?;
        let device_desc = wgpu::DeviceDescriptor {
            label: Some("Actor Headless Device"),
            required_features: wgpu::Features::empty(),
            required_limits: adapter.limits(),
            experimental_features: wgpu::ExperimentalFeatures::default(),
            memory_hints: wgpu::MemoryHints::default(),
            trace: wgpu::Trace::default(),
        };
        let (device, queue) =
            adapter.request_device(&device_desc).await.context("Failed to request headless device")?;
        log::debug!("headless GPU context on '{}'", adapter.get_info().name);
        Ok(Self::new(device, queue, RenderViewport::from_size(1, 1)))
    }

    pub fn viewport(&self) -> RenderViewport {
        self.viewport.get()
    }

    pub fn set_viewport(&self, viewport: RenderViewport) {
        self.viewport.set(viewport);
    }
}
