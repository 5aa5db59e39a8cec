use super::{ClipInterpolation, ClipKeyframe};
use anyhow::{anyhow, bail, Result};
use glam::{Mat4, Quat, Vec3};
use gltf::animation::util::{ReadOutputs, Rotations};
use gltf::animation::{Interpolation, Property};
use std::collections::HashMap;
use std::sync::Arc;

/// One transform node of the model hierarchy. Every glTF node becomes a joint
/// so clips can drive cameras and lights as well as skin bones.
#[derive(Clone, Debug)]
pub struct SkeletonJoint {
    pub name: Arc<str>,
    pub parent: Option<u32>,
    pub rest_translation: Vec3,
    pub rest_rotation: Quat,
    pub rest_scale: Vec3,
}

impl SkeletonJoint {
    pub fn new(name: &str, parent: Option<u32>) -> Self {
        Self {
            name: Arc::from(name),
            parent,
            rest_translation: Vec3::ZERO,
            rest_rotation: Quat::IDENTITY,
            rest_scale: Vec3::ONE,
        }
    }

    pub fn with_rest(mut self, translation: Vec3, rotation: Quat, scale: Vec3) -> Self {
        self.rest_translation = translation;
        self.rest_rotation = rotation.normalize();
        self.rest_scale = scale;
        self
    }

    pub fn rest_local(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.rest_scale, self.rest_rotation, self.rest_translation)
    }
}

/// Joints are stored parents-first so a single forward sweep resolves world
/// matrices.
#[derive(Clone, Debug)]
pub struct SkeletonAsset {
    pub joints: Arc<[SkeletonJoint]>,
    pub roots: Arc<[u32]>,
}

impl SkeletonAsset {
    pub fn new(joints: Vec<SkeletonJoint>) -> Result<Self> {
        for (index, joint) in joints.iter().enumerate() {
            if let Some(parent) = joint.parent {
                if parent as usize >= index {
                    bail!("joint '{}' is listed before its parent {parent}", joint.name);
                }
            }
        }
        let roots: Vec<u32> =
            joints.iter().enumerate().filter(|(_, j)| j.parent.is_none()).map(|(i, _)| i as u32).collect();
        Ok(Self { joints: Arc::from(joints.into_boxed_slice()), roots: Arc::from(roots.into_boxed_slice()) })
    }

    pub fn len(&self) -> usize {
        self.joints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    pub fn joint_index(&self, name: &str) -> Option<u32> {
        self.joints.iter().position(|joint| joint.name.as_ref() == name).map(|i| i as u32)
    }

    pub fn rest_world(&self) -> Vec<Mat4> {
        let mut world: Vec<Mat4> = Vec::with_capacity(self.joints.len());
        for joint in self.joints.iter() {
            let local = joint.rest_local();
            let matrix = match joint.parent {
                Some(parent) => world[parent as usize] * local,
                None => local,
            };
            world.push(matrix);
        }
        world
    }
}

/// Joints referenced by the skinned meshes, with their inverse bind matrices.
#[derive(Clone, Debug)]
pub struct SkinBinding {
    pub joints: Arc<[u32]>,
    pub inverse_bind: Arc<[Mat4]>,
}

#[derive(Clone, Debug)]
pub struct JointVec3Track {
    pub interpolation: ClipInterpolation,
    pub keyframes: Arc<[ClipKeyframe<Vec3>]>,
}

#[derive(Clone, Debug)]
pub struct JointQuatTrack {
    pub interpolation: ClipInterpolation,
    pub keyframes: Arc<[ClipKeyframe<Quat>]>,
}

#[derive(Clone, Debug)]
pub struct JointCurve {
    pub joint_index: u32,
    pub translation: Option<JointVec3Track>,
    pub rotation: Option<JointQuatTrack>,
    pub scale: Option<JointVec3Track>,
}

#[derive(Clone, Debug)]
pub struct SkeletalClip {
    pub name: Arc<str>,
    pub duration: f32,
    pub channels: Arc<[JointCurve]>,
}

impl SkeletalClip {
    /// Builds a clip, taking its duration from the last keyframe of any track.
    pub fn new(name: &str, channels: Vec<JointCurve>) -> Self {
        let mut duration = 0.0_f32;
        for curve in &channels {
            if let Some(track) = &curve.translation {
                duration = duration.max(track.keyframes.last().map(|kf| kf.time).unwrap_or(0.0));
            }
            if let Some(track) = &curve.rotation {
                duration = duration.max(track.keyframes.last().map(|kf| kf.time).unwrap_or(0.0));
            }
            if let Some(track) = &curve.scale {
                duration = duration.max(track.keyframes.last().map(|kf| kf.time).unwrap_or(0.0));
            }
        }
        Self { name: Arc::from(name), duration, channels: Arc::from(channels.into_boxed_slice()) }
    }

    /// A clip that only moves `joint_index` between two translations.
    pub fn translation_sweep(name: &str, joint_index: u32, from: Vec3, to: Vec3, duration: f32) -> Self {
        let frames = vec![ClipKeyframe { time: 0.0, value: from }, ClipKeyframe { time: duration, value: to }];
        let curve = JointCurve {
            joint_index,
            translation: Some(JointVec3Track {
                interpolation: ClipInterpolation::Linear,
                keyframes: Arc::from(frames.into_boxed_slice()),
            }),
            rotation: None,
            scale: None,
        };
        Self::new(name, vec![curve])
    }

    /// Writes the pose at `time` into the local TRS buffers. Joints without a
    /// channel keep whatever value the buffers already hold.
    pub fn sample_into(&self, time: f32, translations: &mut [Vec3], rotations: &mut [Quat], scales: &mut [Vec3]) {
        for curve in self.channels.iter() {
            let index = curve.joint_index as usize;
            if index >= translations.len() {
                continue;
            }
            if let Some(track) = &curve.translation {
                if let Some(value) = sample_vec3(track, time) {
                    translations[index] = value;
                }
            }
            if let Some(track) = &curve.rotation {
                if let Some(value) = sample_quat(track, time) {
                    rotations[index] = value;
                }
            }
            if let Some(track) = &curve.scale {
                if let Some(value) = sample_vec3(track, time) {
                    scales[index] = value;
                }
            }
        }
    }
}

fn bracket<T>(frames: &[ClipKeyframe<T>], time: f32) -> Option<(usize, usize, f32)> {
    let last = frames.len().checked_sub(1)?;
    if time.is_nan() || time <= frames[0].time {
        return Some((0, 0, 0.0));
    }
    if time >= frames[last].time {
        return Some((last, last, 0.0));
    }
    let next = frames.partition_point(|kf| kf.time <= time).clamp(1, last);
    let prev = next - 1;
    let span = frames[next].time - frames[prev].time;
    let t = if span > f32::EPSILON { (time - frames[prev].time) / span } else { 0.0 };
    Some((prev, next, t))
}

fn sample_vec3(track: &JointVec3Track, time: f32) -> Option<Vec3> {
    let frames = track.keyframes.as_ref();
    let (a, b, t) = bracket(frames, time)?;
    Some(match track.interpolation {
        ClipInterpolation::Step => frames[a].value,
        ClipInterpolation::Linear => frames[a].value.lerp(frames[b].value, t),
    })
}

fn sample_quat(track: &JointQuatTrack, time: f32) -> Option<Quat> {
    let frames = track.keyframes.as_ref();
    let (a, b, t) = bracket(frames, time)?;
    Some(match track.interpolation {
        ClipInterpolation::Step => frames[a].value,
        ClipInterpolation::Linear => frames[a].value.slerp(frames[b].value, t).normalize(),
    })
}

pub struct SkeletonImport {
    pub skeleton: SkeletonAsset,
    /// Maps glTF node indices to joint indices.
    pub node_to_joint: HashMap<usize, u32>,
    pub skin: Option<SkinBinding>,
    pub clips: Vec<SkeletalClip>,
}

pub(crate) fn import_skeleton(
    document: &gltf::Document,
    buffers: &[gltf::buffer::Data],
    label: &str,
) -> Result<SkeletonImport> {
    let mut parent_of_node: HashMap<usize, usize> = HashMap::new();
    for node in document.nodes() {
        for child in node.children() {
            parent_of_node.insert(child.index(), node.index());
        }
    }

    // Depth-first from every root so parents always precede children.
    let nodes: Vec<gltf::Node<'_>> = document.nodes().collect();
    let mut order: Vec<usize> = Vec::with_capacity(nodes.len());
    let mut visited = vec![false; nodes.len()];
    let mut stack: Vec<usize> =
        nodes.iter().map(|n| n.index()).filter(|idx| !parent_of_node.contains_key(idx)).rev().collect();
    while let Some(node_index) = stack.pop() {
        if std::mem::replace(&mut visited[node_index], true) {
            bail!("model '{label}' has a cyclic node hierarchy at node {node_index}");
        }
        order.push(node_index);
        let children: Vec<usize> = nodes[node_index].children().map(|c| c.index()).collect();
        stack.extend(children.into_iter().rev());
    }
    if order.len() != nodes.len() {
        bail!("model '{label}' has a cyclic node hierarchy");
    }

    let node_to_joint: HashMap<usize, u32> =
        order.iter().enumerate().map(|(joint, node)| (*node, joint as u32)).collect();
    let mut joints: Vec<SkeletonJoint> = Vec::with_capacity(order.len());
    for &node_index in &order {
        let node = &nodes[node_index];
        let (t, r, s) = node.transform().decomposed();
        let name = node.name().map(|n| n.to_string()).unwrap_or_else(|| format!("node_{node_index}"));
        let parent = parent_of_node.get(&node_index).and_then(|p| node_to_joint.get(p)).copied();
        joints.push(SkeletonJoint::new(&name, parent).with_rest(
            Vec3::from_array(t),
            Quat::from_xyzw(r[0], r[1], r[2], r[3]),
            Vec3::from_array(s),
        ));
    }
    let skeleton = SkeletonAsset::new(joints)?;

    let mut skins = document.skins();
    let skin = match skins.next() {
        Some(skin) => {
            if skins.next().is_some() {
                log::warn!("model '{label}' contains multiple skins; only the first will be used");
            }
            let joint_ids: Vec<u32> = skin
                .joints()
                .map(|node| {
                    node_to_joint
                        .get(&node.index())
                        .copied()
                        .ok_or_else(|| anyhow!("skin joint node {} missing from hierarchy", node.index()))
                })
                .collect::<Result<_>>()?;
            let mut inverse_bind = vec![Mat4::IDENTITY; joint_ids.len()];
            let reader = skin.reader(|buffer| Some(&buffers[buffer.index()]));
            if let Some(matrices) = reader.read_inverse_bind_matrices() {
                for (dst, matrix) in inverse_bind.iter_mut().zip(matrices) {
                    *dst = Mat4::from_cols_array_2d(&matrix);
                }
            }
            Some(SkinBinding {
                joints: Arc::from(joint_ids.into_boxed_slice()),
                inverse_bind: Arc::from(inverse_bind.into_boxed_slice()),
            })
        }
        None => None,
    };

    let mut clips: Vec<SkeletalClip> = Vec::new();
    for (anim_index, animation) in document.animations().enumerate() {
        let clip_name =
            animation.name().map(|n| n.to_string()).unwrap_or_else(|| format!("animation_{anim_index}"));
        let mut curve_builders: HashMap<u32, JointCurveBuilder> = HashMap::new();

        for channel in animation.channels() {
            let target_node = channel.target().node();
            let Some(joint_index) = node_to_joint.get(&target_node.index()).copied() else {
                continue;
            };
            let interpolation = match channel.sampler().interpolation() {
                Interpolation::Linear => ClipInterpolation::Linear,
                Interpolation::Step => ClipInterpolation::Step,
                Interpolation::CubicSpline => {
                    log::warn!(
                        "animation '{clip_name}' uses CubicSpline interpolation; skipping channel (node {})",
                        target_node.index()
                    );
                    continue;
                }
            };

            let reader = channel.reader(|buffer| Some(&buffers[buffer.index()]));
            let Some(inputs) = reader.read_inputs() else {
                continue;
            };
            let times: Vec<f32> = inputs.collect();
            if times.is_empty() {
                continue;
            }
            let Some(outputs) = reader.read_outputs() else {
                continue;
            };

            let builder = curve_builders.entry(joint_index).or_default();
            match (channel.target().property(), outputs) {
                (Property::Translation, ReadOutputs::Translations(values)) => {
                    let values: Vec<Vec3> = values.map(Vec3::from_array).collect();
                    let keyframes = build_keyframes(&times, values, &clip_name)?;
                    builder.translation = Some(JointVec3Track { interpolation, keyframes });
                }
                (Property::Scale, ReadOutputs::Scales(values)) => {
                    let values: Vec<Vec3> = values.map(Vec3::from_array).collect();
                    let keyframes = build_keyframes(&times, values, &clip_name)?;
                    builder.scale = Some(JointVec3Track { interpolation, keyframes });
                }
                (Property::Rotation, ReadOutputs::Rotations(rotations)) => {
                    let keyframes = build_keyframes(&times, convert_rotations(rotations), &clip_name)?;
                    builder.rotation = Some(JointQuatTrack { interpolation, keyframes });
                }
                _ => {}
            }
        }

        let mut curves: Vec<JointCurve> =
            curve_builders.into_iter().filter_map(|(joint, builder)| builder.into_curve(joint)).collect();
        if curves.is_empty() {
            continue;
        }
        curves.sort_by_key(|curve| curve.joint_index);
        clips.push(SkeletalClip::new(&clip_name, curves));
    }

    Ok(SkeletonImport { skeleton, node_to_joint, skin, clips })
}

#[derive(Default)]
struct JointCurveBuilder {
    translation: Option<JointVec3Track>,
    rotation: Option<JointQuatTrack>,
    scale: Option<JointVec3Track>,
}

impl JointCurveBuilder {
    fn into_curve(self, joint_index: u32) -> Option<JointCurve> {
        if self.translation.is_none() && self.rotation.is_none() && self.scale.is_none() {
            None
        } else {
            Some(JointCurve {
                joint_index,
                translation: self.translation,
                rotation: self.rotation,
                scale: self.scale,
            })
        }
    }
}

fn build_keyframes<T: Clone>(times: &[f32], values: Vec<T>, clip: &str) -> Result<Arc<[ClipKeyframe<T>]>> {
    if times.len() != values.len() {
        bail!("animation '{clip}' channel time/value count mismatch ({} vs {})", times.len(), values.len());
    }
    let mut frames: Vec<ClipKeyframe<T>> = Vec::with_capacity(times.len());
    for (time, value) in times.iter().copied().zip(values) {
        if !time.is_finite() || time < 0.0 {
            bail!("animation '{clip}' channel contains an invalid time value {time}");
        }
        if let Some(last) = frames.last_mut() {
            if (time - last.time).abs() <= f32::EPSILON {
                last.value = value;
                continue;
            }
        }
        frames.push(ClipKeyframe { time, value });
    }
    Ok(Arc::from(frames.into_boxed_slice()))
}

fn convert_rotations(rotations: Rotations) -> Vec<Quat> {
    rotations
        .into_f32()
        .map(|c| {
            let quat = Quat::from_xyzw(c[0], c[1], c[2], c[3]);
            if quat.length_squared() > 0.0 {
                quat.normalize()
            } else {
                Quat::IDENTITY
            }
        })
        .collect()
}
