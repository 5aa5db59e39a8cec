use anyhow::{Context, Result};
use glam::Vec3;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::renderer::RenderFlags;

#[derive(Debug, Clone, Deserialize)]
pub struct CameraConfig {
    #[serde(default = "CameraConfig::default_position")]
    pub default_position: [f32; 3],
    #[serde(default = "CameraConfig::default_fov")]
    pub fov_degrees: f32,
    #[serde(default = "CameraConfig::default_near")]
    pub near: f32,
    #[serde(default = "CameraConfig::default_far")]
    pub far: f32,
    #[serde(default = "CameraConfig::default_node_name")]
    pub node_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PointLightConfig {
    #[serde(default = "PointLightConfig::default_position")]
    pub default_position: [f32; 3],
    #[serde(default = "PointLightConfig::default_color")]
    pub color: [f32; 3],
    #[serde(default = "PointLightConfig::default_intensity")]
    pub intensity: f32,
    #[serde(default = "PointLightConfig::default_node_name")]
    pub node_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShadowLightConfig {
    #[serde(default = "ShadowLightConfig::default_resolution")]
    pub resolution: u32,
    #[serde(default = "ShadowLightConfig::default_viewport")]
    pub viewport: [f32; 2],
    #[serde(default = "ShadowLightConfig::default_near")]
    pub near: f32,
    #[serde(default = "ShadowLightConfig::default_far")]
    pub far: f32,
    #[serde(default = "ShadowLightConfig::default_color")]
    pub color: [f32; 3],
    #[serde(default = "ShadowLightConfig::default_direction")]
    pub direction: [f32; 3],
    #[serde(default = "ShadowLightConfig::default_bias")]
    pub bias: f32,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LightingConfig {
    #[serde(default)]
    pub point: PointLightConfig,
    #[serde(default)]
    pub shadow: ShadowLightConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SurfaceConfig {
    #[serde(default = "SurfaceConfig::default_clear_color")]
    pub clear_color: [f32; 4],
    #[serde(default = "SurfaceConfig::default_shader_dir")]
    pub shader_dir: PathBuf,
    #[serde(default = "SurfaceConfig::default_max_bones")]
    pub max_bones: usize,
    #[serde(default = "SurfaceConfig::default_floor_size")]
    pub floor_size: f32,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct DebugConfig {
    #[serde(default)]
    pub draw_axes: bool,
}

/// Construction-time defaults shared by every actor the host spawns.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ActorConfig {
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub lighting: LightingConfig,
    #[serde(default)]
    pub surface: SurfaceConfig,
    #[serde(default)]
    pub debug: DebugConfig,
}

impl CameraConfig {
    fn default_position() -> [f32; 3] {
        [0.0, 0.0, 5.0]
    }

    const fn default_fov() -> f32 {
        49.3
    }

    const fn default_near() -> f32 {
        0.1
    }

    const fn default_far() -> f32 {
        30.0
    }

    fn default_node_name() -> String {
        "Camera".to_string()
    }

    pub fn default_position_vec(&self) -> Vec3 {
        Vec3::from_array(self.default_position)
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            default_position: Self::default_position(),
            fov_degrees: Self::default_fov(),
            near: Self::default_near(),
            far: Self::default_far(),
            node_name: Self::default_node_name(),
        }
    }
}

impl PointLightConfig {
    fn default_position() -> [f32; 3] {
        [0.5, 1.0, 1.0]
    }

    fn default_color() -> [f32; 3] {
        [1.0, 1.0, 1.0]
    }

    const fn default_intensity() -> f32 {
        1.0
    }

    fn default_node_name() -> String {
        "Light".to_string()
    }
}

impl Default for PointLightConfig {
    fn default() -> Self {
        Self {
            default_position: Self::default_position(),
            color: Self::default_color(),
            intensity: Self::default_intensity(),
            node_name: Self::default_node_name(),
        }
    }
}

impl ShadowLightConfig {
    const fn default_resolution() -> u32 {
        1024
    }

    fn default_viewport() -> [f32; 2] {
        [30.0, 30.0]
    }

    const fn default_near() -> f32 {
        1.0
    }

    const fn default_far() -> f32 {
        100.0
    }

    fn default_color() -> [f32; 3] {
        [1.0, 1.0, 1.0]
    }

    fn default_direction() -> [f32; 3] {
        [0.01, -1.0, 0.01]
    }

    const fn default_bias() -> f32 {
        0.005
    }
}

impl Default for ShadowLightConfig {
    fn default() -> Self {
        Self {
            resolution: Self::default_resolution(),
            viewport: Self::default_viewport(),
            near: Self::default_near(),
            far: Self::default_far(),
            color: Self::default_color(),
            direction: Self::default_direction(),
            bias: Self::default_bias(),
        }
    }
}

impl SurfaceConfig {
    fn default_clear_color() -> [f32; 4] {
        [0.0, 0.0, 0.0, 0.0]
    }

    fn default_shader_dir() -> PathBuf {
        PathBuf::from("assets/shaders")
    }

    const fn default_max_bones() -> usize {
        40
    }

    const fn default_floor_size() -> f32 {
        20.0
    }
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            clear_color: Self::default_clear_color(),
            shader_dir: Self::default_shader_dir(),
            max_bones: Self::default_max_bones(),
            floor_size: Self::default_floor_size(),
        }
    }
}

impl DebugConfig {
    pub fn render_flags(&self) -> RenderFlags {
        let mut flags = RenderFlags::empty();
        if self.draw_axes {
            flags |= RenderFlags::DRAW_AXES;
        }
        flags
    }
}

impl ActorConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes =
            fs::read(path).with_context(|| format!("Failed to read actor config {}", path.display()))?;
        let cfg = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse actor config {}", path.display()))?;
        Ok(cfg)
    }

    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                log::warn!("Actor config load error: {err:?}. Falling back to defaults.");
                Self::default()
            }
        }
    }
}
