use super::skeletal::{self, SkeletalClip, SkeletonAsset, SkinBinding};
use crate::error::{ActorError, ActorResult};
use crate::mesh::Mesh;
use anyhow::{Context, Result};
use glam::{Mat4, Quat, Vec3};
use std::path::Path;
use std::sync::Arc;

/// Local transform of a named scene node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeTransform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl NodeTransform {
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

/// Capability to resolve a named node inside an externally authored scene graph.
pub trait NodeLookup {
    fn find_node(&self, name: &str) -> Option<NodeTransform>;

    fn node_transform(&self, name: &str) -> ActorResult<NodeTransform> {
        self.find_node(name).ok_or_else(|| ActorError::NodeNotFound(name.to_string()))
    }
}

/// A mesh attached to one joint of the model hierarchy.
#[derive(Clone, Debug)]
pub struct ModelMesh {
    pub mesh: Mesh,
    pub joint: u32,
    pub skinned: bool,
}

/// Immutable model shared between actors: hierarchy, meshes, skin and clips.
#[derive(Clone, Debug)]
pub struct SceneAsset {
    pub id: Arc<str>,
    pub skeleton: SkeletonAsset,
    pub skin: Option<SkinBinding>,
    pub meshes: Vec<ModelMesh>,
    pub clips: Vec<Arc<SkeletalClip>>,
}

impl SceneAsset {
    pub fn new(id: &str, skeleton: SkeletonAsset) -> Self {
        Self { id: Arc::from(id), skeleton, skin: None, meshes: Vec::new(), clips: Vec::new() }
    }

    pub fn with_skin(mut self, skin: SkinBinding) -> Self {
        self.skin = Some(skin);
        self
    }

    pub fn with_mesh(mut self, mesh: Mesh, joint: u32) -> Self {
        let skinned = self.skin.is_some() && mesh.is_skinned();
        self.meshes.push(ModelMesh { mesh, joint, skinned });
        self
    }

    pub fn with_clip(mut self, clip: SkeletalClip) -> Self {
        self.clips.push(Arc::new(clip));
        self
    }

    pub fn load_gltf(id: &str, path: impl AsRef<Path>) -> Result<Self> {
        let path_ref = path.as_ref();
        let (document, buffers, _) = gltf::import(path_ref)
            .with_context(|| format!("Failed to import glTF model from {}", path_ref.display()))?;
        let skeletal::SkeletonImport { skeleton, node_to_joint, skin, clips } =
            skeletal::import_skeleton(&document, &buffers, id)?;

        let mut asset = SceneAsset::new(id, skeleton);
        asset.skin = skin;
        for node in document.nodes() {
            let Some(mesh) = node.mesh() else {
                continue;
            };
            let Some(&joint) = node_to_joint.get(&node.index()) else {
                continue;
            };
            let mesh = Mesh::from_gltf(&mesh, &buffers)
                .with_context(|| format!("Failed to read mesh on node {} of '{id}'", node.index()))?;
            asset = asset.with_mesh(mesh, joint);
        }
        for clip in clips {
            asset = asset.with_clip(clip);
        }
        log::debug!(
            "loaded model '{id}' ({} nodes, {} meshes, {} clips)",
            asset.skeleton.len(),
            asset.meshes.len(),
            asset.clips.len()
        );
        Ok(asset)
    }

    pub fn clip(&self, id: &str) -> Option<&Arc<SkeletalClip>> {
        self.clips.iter().find(|clip| clip.name.as_ref() == id)
    }

    pub fn clip_ids(&self) -> Vec<String> {
        self.clips.iter().map(|clip| clip.name.to_string()).collect()
    }

    pub fn node_names(&self) -> Vec<String> {
        self.skeleton.joints.iter().map(|joint| joint.name.to_string()).collect()
    }
}

impl NodeLookup for SceneAsset {
    fn find_node(&self, name: &str) -> Option<NodeTransform> {
        let index = self.skeleton.joint_index(name)?;
        let joint = &self.skeleton.joints[index as usize];
        Some(NodeTransform {
            translation: joint.rest_translation,
            rotation: joint.rest_rotation,
            scale: joint.rest_scale,
        })
    }
}
