use crate::error::ActorError;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub const CEL_SHADER: &str = "cel.wgsl";
pub const FLOOR_SHADER: &str = "floor.wgsl";
pub const DEPTH_SHADER: &str = "depth.wgsl";
pub const AXES_SHADER: &str = "axes.wgsl";

/// WGSL sources for the actor pipelines.
#[derive(Clone, Debug)]
pub struct ShaderSet {
    pub cel: String,
    pub floor: String,
    pub depth: String,
    pub axes: String,
}

/// Reads shader sources from a directory on disk.
#[derive(Clone, Debug)]
pub struct ShaderLibrary {
    dir: PathBuf,
}

impl ShaderLibrary {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn load(&self) -> Result<ShaderSet> {
        Ok(ShaderSet {
            cel: self.read(CEL_SHADER)?,
            floor: self.read(FLOOR_SHADER)?,
            depth: self.read(DEPTH_SHADER)?,
            axes: self.read(AXES_SHADER)?,
        })
    }

    fn read(&self, name: &str) -> Result<String> {
        let path = self.dir.join(name);
        if !path.is_file() {
            return Err(ActorError::missing_shader(path.display().to_string()).into());
        }
        fs::read_to_string(&path).with_context(|| format!("Failed to read shader {}", path.display()))
    }
}
