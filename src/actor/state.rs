use anyhow::{Context, Result};
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::ActorResult;
use crate::math::EulerDegrees;

pub const DEFAULT_CAMERA_NAME: &str = "Camera";
pub const DEFAULT_CAMERA_FOV: f32 = 49.3;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
pub struct Vec3Data {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl From<Vec3> for Vec3Data {
    fn from(value: Vec3) -> Self {
        Self { x: value.x, y: value.y, z: value.z }
    }
}

impl From<Vec3Data> for Vec3 {
    fn from(value: Vec3Data) -> Self {
        Vec3::new(value.x, value.y, value.z)
    }
}

impl From<EulerDegrees> for Vec3Data {
    fn from(value: EulerDegrees) -> Self {
        value.to_vec3().into()
    }
}

impl From<Vec3Data> for EulerDegrees {
    fn from(value: Vec3Data) -> Self {
        EulerDegrees::from_vec3(value.into())
    }
}

/// Saved form of a [`super::Sprite3DActor`].
///
/// Field names are the save-file keys and must not change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActorState {
    #[serde(rename = "model3d", default)]
    pub model3d: Option<String>,
    pub width: u32,
    pub height: u32,
    #[serde(rename = "cameraPos", default, skip_serializing_if = "Option::is_none")]
    pub camera_pos: Option<Vec3Data>,
    #[serde(rename = "cameraRot", default, skip_serializing_if = "Option::is_none")]
    pub camera_rot: Option<Vec3Data>,
    #[serde(rename = "cameraName", default = "ActorState::default_camera_name")]
    pub camera_name: String,
    #[serde(rename = "cameraFOV", default = "ActorState::default_camera_fov")]
    pub camera_fov: f32,
    #[serde(rename = "modelRotation", default)]
    pub model_rotation: f32,
    #[serde(rename = "callCb", default)]
    pub call_cb: bool,
    #[serde(rename = "animationCb", default, skip_serializing_if = "Option::is_none")]
    pub animation_cb: Option<String>,
}

impl ActorState {
    fn default_camera_name() -> String {
        DEFAULT_CAMERA_NAME.to_string()
    }

    const fn default_camera_fov() -> f32 {
        DEFAULT_CAMERA_FOV
    }

    pub fn to_json(&self) -> ActorResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> ActorResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).with_context(|| format!("Reading actor state {}", path.display()))?;
        serde_json::from_slice(&bytes).with_context(|| format!("Parsing actor state {}", path.display()))
    }

    pub fn save_to_path(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Creating actor state directory {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json.as_bytes()).with_context(|| format!("Writing actor state {}", path.display()))?;
        Ok(())
    }
}
