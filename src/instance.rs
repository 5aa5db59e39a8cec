use glam::{Mat4, Quat, Vec3};
use std::sync::Arc;

use crate::assets::skeletal::SkeletalClip;
use crate::assets::{NodeLookup, NodeTransform, SceneAsset};

/// Mutable per-actor copy of a model's pose.
pub struct LiveModelInstance {
    asset: Arc<SceneAsset>,
    translations: Vec<Vec3>,
    rotations: Vec<Quat>,
    scales: Vec<Vec3>,
    world: Vec<Mat4>,
    palette: Vec<Mat4>,
    root_yaw_degrees: f32,
}

impl LiveModelInstance {
    pub fn new(asset: Arc<SceneAsset>) -> Self {
        let joints = asset.skeleton.joints.as_ref();
        let translations = joints.iter().map(|j| j.rest_translation).collect();
        let rotations = joints.iter().map(|j| j.rest_rotation).collect();
        let scales = joints.iter().map(|j| j.rest_scale).collect();
        let palette_len = asset.skin.as_ref().map(|skin| skin.joints.len()).unwrap_or(0);
        let mut instance = Self {
            asset,
            translations,
            rotations,
            scales,
            world: Vec::new(),
            palette: vec![Mat4::IDENTITY; palette_len],
            root_yaw_degrees: 0.0,
        };
        instance.calculate_transforms();
        instance
    }

    pub fn asset(&self) -> &Arc<SceneAsset> {
        &self.asset
    }

    pub fn set_root_yaw(&mut self, degrees: f32) {
        self.root_yaw_degrees = degrees;
    }

    pub fn root_yaw(&self) -> f32 {
        self.root_yaw_degrees
    }

    /// Root transform: a pure rotation about +Y.
    pub fn root_transform(&self) -> Mat4 {
        Mat4::from_quat(Quat::from_rotation_y(self.root_yaw_degrees.to_radians()))
    }

    pub fn reset_to_rest(&mut self) {
        for (index, joint) in self.asset.skeleton.joints.iter().enumerate() {
            self.translations[index] = joint.rest_translation;
            self.rotations[index] = joint.rest_rotation;
            self.scales[index] = joint.rest_scale;
        }
        self.calculate_transforms();
    }

    /// Poses the hierarchy at `time` seconds into `clip`.
    pub fn apply_clip(&mut self, clip: &SkeletalClip, time: f32) {
        clip.sample_into(time, &mut self.translations, &mut self.rotations, &mut self.scales);
        self.calculate_transforms();
    }

    /// Re-evaluates model-space joint matrices and the skinning palette.
    pub fn calculate_transforms(&mut self) {
        let joints = self.asset.skeleton.joints.as_ref();
        self.world.clear();
        for (index, joint) in joints.iter().enumerate() {
            let local = Mat4::from_scale_rotation_translation(
                self.scales[index],
                self.rotations[index],
                self.translations[index],
            );
            let matrix = match joint.parent {
                Some(parent) => self.world[parent as usize] * local,
                None => local,
            };
            self.world.push(matrix);
        }
        if let Some(skin) = self.asset.skin.as_ref() {
            for (slot, (joint, inverse_bind)) in
                self.palette.iter_mut().zip(skin.joints.iter().zip(skin.inverse_bind.iter()))
            {
                *slot = self.world.get(*joint as usize).copied().unwrap_or(Mat4::IDENTITY) * *inverse_bind;
            }
        }
    }

    pub fn joint_world(&self, joint: u32) -> Mat4 {
        self.world.get(joint as usize).copied().unwrap_or(Mat4::IDENTITY)
    }

    pub fn palette(&self) -> &[Mat4] {
        &self.palette
    }

    /// Model matrix for one mesh of the asset, root rotation included.
    pub fn mesh_transform(&self, mesh_index: usize) -> Mat4 {
        let Some(mesh) = self.asset.meshes.get(mesh_index) else {
            return self.root_transform();
        };
        if mesh.skinned {
            self.root_transform()
        } else {
            self.root_transform() * self.joint_world(mesh.joint)
        }
    }
}

impl NodeLookup for LiveModelInstance {
    fn find_node(&self, name: &str) -> Option<NodeTransform> {
        let index = self.asset.skeleton.joint_index(name)? as usize;
        Some(NodeTransform {
            translation: self.translations[index],
            rotation: self.rotations[index],
            scale: self.scales[index],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::skeletal::{SkeletonAsset, SkeletonJoint, SkinBinding};

    fn two_bone_asset() -> Arc<SceneAsset> {
        let skeleton = SkeletonAsset::new(vec![
            SkeletonJoint::new("hips", None),
            SkeletonJoint::new("spine", Some(0)).with_rest(Vec3::new(0.0, 1.0, 0.0), Quat::IDENTITY, Vec3::ONE),
        ])
        .expect("valid hierarchy");
        let skin = SkinBinding {
            joints: Arc::from(vec![0u32, 1]),
            inverse_bind: Arc::from(vec![Mat4::IDENTITY, Mat4::from_translation(Vec3::new(0.0, -1.0, 0.0))]),
        };
        Arc::new(
            SceneAsset::new("rig", skeleton)
                .with_skin(skin)
                .with_clip(SkeletalClip::translation_sweep("walk", 0, Vec3::ZERO, Vec3::new(0.0, 0.0, 2.0), 1.0)),
        )
    }

    #[test]
    fn rest_pose_palette_is_identity() {
        let instance = LiveModelInstance::new(two_bone_asset());
        for matrix in instance.palette() {
            assert!(matrix.abs_diff_eq(Mat4::IDENTITY, 1e-5));
        }
    }

    #[test]
    fn clip_moves_children_with_parent() {
        let asset = two_bone_asset();
        let mut instance = LiveModelInstance::new(Arc::clone(&asset));
        let clip = asset.clip("walk").expect("walk clip");
        instance.apply_clip(clip, 0.5);
        let spine = instance.joint_world(1).w_axis.truncate();
        assert!((spine - Vec3::new(0.0, 1.0, 1.0)).length() < 1e-5);
        assert_eq!(instance.node_transform("hips").map(|n| n.translation).ok(), Some(Vec3::new(0.0, 0.0, 1.0)));
        instance.reset_to_rest();
        assert!(instance.joint_world(0).abs_diff_eq(Mat4::IDENTITY, 1e-5));
    }

    #[test]
    fn root_yaw_only_rotates_about_y() {
        let mut instance = LiveModelInstance::new(two_bone_asset());
        instance.set_root_yaw(90.0);
        let forward = instance.root_transform().transform_vector3(Vec3::Z);
        assert!((forward - Vec3::X).length() < 1e-5);
        assert_eq!(instance.root_transform().transform_vector3(Vec3::Y), Vec3::Y);
    }
}
