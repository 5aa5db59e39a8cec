use anyhow::{Context, Result};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub mod model;
pub mod shaders;
pub mod skeletal;

pub use model::{ModelMesh, NodeLookup, NodeTransform, SceneAsset};
pub use shaders::{ShaderLibrary, ShaderSet};

#[derive(Clone, Debug)]
pub struct ClipKeyframe<T> {
    pub time: f32,
    pub value: T,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClipInterpolation {
    Step,
    Linear,
}

/// Source of shared model assets.
///
/// Loading is two-phase: `load_model` only requests an asset, and the asset
/// becomes visible through `get_model` once the provider has finished its
/// queue. Every `load_model` must be balanced by one `dispose_model`.
pub trait ModelProvider {
    fn load_model(&mut self, id: &str);
    fn get_model(&self, id: &str) -> Option<Arc<SceneAsset>>;
    fn dispose_model(&mut self, id: &str);
}

/// Reference-counted model cache rooted at an asset directory.
pub struct ModelCache {
    root: PathBuf,
    models: HashMap<String, Arc<SceneAsset>>,
    model_refs: HashMap<String, usize>,
    queue: VecDeque<String>,
}

impl ModelCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), models: HashMap::new(), model_refs: HashMap::new(), queue: VecDeque::new() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Registers an already built asset under its own id.
    pub fn insert_model(&mut self, asset: SceneAsset) {
        let id = asset.id.to_string();
        self.queue.retain(|queued| queued != &id);
        self.models.insert(id, Arc::new(asset));
    }

    pub fn is_queued(&self, id: &str) -> bool {
        self.queue.iter().any(|queued| queued == id)
    }

    pub fn ref_count(&self, id: &str) -> usize {
        self.model_refs.get(id).copied().unwrap_or(0)
    }

    /// Imports every queued model. Failures are logged and leave the id
    /// unresolved; the number of models imported is returned.
    pub fn finish_loading(&mut self) -> usize {
        let mut loaded = 0;
        while let Some(id) = self.queue.pop_front() {
            if self.models.contains_key(&id) {
                continue;
            }
            match self.import(&id) {
                Ok(asset) => {
                    self.models.insert(id, Arc::new(asset));
                    loaded += 1;
                }
                Err(err) => log::error!("failed to load model '{id}': {err:?}"),
            }
        }
        loaded
    }

    fn import(&self, id: &str) -> Result<SceneAsset> {
        let path = self.resolve_path(id);
        SceneAsset::load_gltf(id, &path).with_context(|| format!("Model '{id}' at {}", path.display()))
    }

    fn resolve_path(&self, id: &str) -> PathBuf {
        let direct = self.root.join(id);
        if direct.extension().is_some() {
            return direct;
        }
        for ext in ["gltf", "glb"] {
            let candidate = direct.with_extension(ext);
            if candidate.exists() {
                return candidate;
            }
        }
        direct.with_extension("gltf")
    }
}

impl ModelProvider for ModelCache {
    fn load_model(&mut self, id: &str) {
        *self.model_refs.entry(id.to_string()).or_insert(0) += 1;
        if !self.models.contains_key(id) && !self.is_queued(id) {
            self.queue.push_back(id.to_string());
        }
    }

    fn get_model(&self, id: &str) -> Option<Arc<SceneAsset>> {
        self.models.get(id).cloned()
    }

    fn dispose_model(&mut self, id: &str) {
        if let Some(count) = self.model_refs.get_mut(id) {
            if *count > 0 {
                *count -= 1;
                if *count == 0 {
                    self.model_refs.remove(id);
                    self.models.remove(id);
                    self.queue.retain(|queued| queued != id);
                }
                return;
            }
        }
        log::warn!("dispose_model('{id}') without a matching load_model");
    }
}
