use glam::Vec3;

use crate::assets::NodeLookup;
use crate::camera3d::Camera3D;
use crate::config::CameraConfig;
use crate::math::{quat_to_euler_degrees, EulerDegrees};

/// Camera placement resolved for one actor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPose {
    pub position: Vec3,
    pub rotation: EulerDegrees,
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
}

impl CameraPose {
    pub fn camera(&self) -> Camera3D {
        Camera3D::from_pose(self.position, self.rotation, self.fov_degrees, self.near, self.far)
    }
}

/// Resolves transforms for the camera and lights from named scene nodes.
///
/// Explicit values always win. A missing node falls back to the supplied
/// default and is only ever logged.
pub struct PoseDeriver<'a> {
    lookup: &'a dyn NodeLookup,
}

impl<'a> PoseDeriver<'a> {
    pub fn new(lookup: &'a dyn NodeLookup) -> Self {
        Self { lookup }
    }

    pub fn position(&self, node_name: &str, explicit: Option<Vec3>, default: Vec3) -> Vec3 {
        if let Some(position) = explicit {
            return position;
        }
        match self.lookup.node_transform(node_name) {
            Ok(node) => node.translation,
            Err(err) => {
                log::warn!("{err}; using default position {default}");
                default
            }
        }
    }

    pub fn rotation(&self, node_name: &str, explicit: Option<EulerDegrees>) -> EulerDegrees {
        if let Some(rotation) = explicit {
            return rotation;
        }
        self.lookup
            .find_node(node_name)
            .map(|node| quat_to_euler_degrees(node.rotation))
            .unwrap_or(EulerDegrees::ZERO)
    }

    pub fn camera(
        &self,
        config: &CameraConfig,
        node_name: &str,
        explicit_position: Option<Vec3>,
        explicit_rotation: Option<EulerDegrees>,
        fov_degrees: f32,
    ) -> CameraPose {
        CameraPose {
            position: self.position(node_name, explicit_position, config.default_position_vec()),
            rotation: self.rotation(node_name, explicit_rotation),
            fov_degrees,
            near: config.near,
            far: config.far,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::NodeTransform;
    use glam::Quat;

    struct OneNode(NodeTransform);

    impl NodeLookup for OneNode {
        fn find_node(&self, name: &str) -> Option<NodeTransform> {
            (name == "Camera").then_some(self.0)
        }
    }

    fn camera_node() -> OneNode {
        OneNode(NodeTransform {
            translation: Vec3::new(1.0, 2.0, 3.0),
            rotation: Quat::from_rotation_x(-20f32.to_radians()),
            scale: Vec3::ONE,
        })
    }

    #[test]
    fn node_values_fill_missing_overrides() {
        let lookup = camera_node();
        let pose = PoseDeriver::new(&lookup).camera(&CameraConfig::default(), "Camera", None, None, 49.3);
        assert_eq!(pose.position, Vec3::new(1.0, 2.0, 3.0));
        assert!((pose.rotation.yaw + 20.0).abs() < 1e-3);
        assert!(pose.rotation.pitch.abs() < 1e-3 && pose.rotation.roll.abs() < 1e-3);
    }

    #[test]
    fn explicit_values_win_over_nodes() {
        let lookup = camera_node();
        let explicit = EulerDegrees::new(5.0, 6.0, 7.0);
        let pose = PoseDeriver::new(&lookup).camera(
            &CameraConfig::default(),
            "Camera",
            Some(Vec3::ONE),
            Some(explicit),
            30.0,
        );
        assert_eq!(pose.position, Vec3::ONE);
        assert_eq!(pose.rotation, explicit);
        assert_eq!(pose.fov_degrees, 30.0);
    }

    #[test]
    fn missing_node_falls_back_to_defaults() {
        let lookup = camera_node();
        let deriver = PoseDeriver::new(&lookup);
        let pose = deriver.camera(&CameraConfig::default(), "Cam2", None, None, 49.3);
        assert_eq!(pose.position, Vec3::new(0.0, 0.0, 5.0));
        assert_eq!(pose.rotation, EulerDegrees::ZERO);
        assert_eq!(deriver.position("Light", None, Vec3::new(0.5, 1.0, 1.0)), Vec3::new(0.5, 1.0, 1.0));
    }
}
