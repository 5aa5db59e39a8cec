use glam::{Mat4, Vec3};
use smallvec::SmallVec;

use crate::assets::NodeLookup;
use crate::config::LightingConfig;
use crate::pose::PoseDeriver;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    pub position: Vec3,
    pub color: Vec3,
    pub intensity: f32,
}

/// Orthographic shadow caster that frames a fixed box around a center point.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectionalShadowLight {
    pub resolution: u32,
    pub viewport: (f32, f32),
    pub near: f32,
    pub far: f32,
    pub color: Vec3,
    pub direction: Vec3,
    pub bias: f32,
}

impl DirectionalShadowLight {
    pub fn half_depth(&self) -> f32 {
        self.near + 0.5 * (self.far - self.near)
    }

    pub fn eye(&self, center: Vec3) -> Vec3 {
        center - self.direction.normalize_or_zero() * self.half_depth()
    }

    /// View-projection of the light when framing `center`. `forward` is the
    /// viewing camera's direction and orients the shadow map.
    pub fn view_projection(&self, center: Vec3, forward: Vec3) -> Mat4 {
        let dir = self.direction.normalize_or_zero();
        let mut up = forward.normalize_or_zero();
        if up.length_squared() < 1e-6 || up.dot(dir).abs() > 0.99 {
            up = if dir.dot(Vec3::Y).abs() > 0.99 { Vec3::X } else { Vec3::Y };
        }
        let eye = self.eye(center);
        let view = Mat4::look_at_rh(eye, eye + dir, up);
        let (w, h) = self.viewport;
        Mat4::orthographic_rh(-w * 0.5, w * 0.5, -h * 0.5, h * 0.5, self.near, self.far) * view
    }
}

/// Light set a single draw is shaded with.
#[derive(Debug, Clone, PartialEq)]
pub struct LightEnvironment {
    pub ambient: Vec3,
    pub point_lights: SmallVec<[PointLight; 1]>,
    pub receives_shadow: bool,
}

impl LightEnvironment {
    pub fn directional_count(&self) -> usize {
        0
    }
}

/// One shadow caster plus one cel light, built once per asset resolve.
#[derive(Debug, Clone, PartialEq)]
pub struct LightingRig {
    pub shadow_light: DirectionalShadowLight,
    pub point_light: PointLight,
}

impl LightingRig {
    pub fn build(config: &LightingConfig, lookup: &dyn NodeLookup, light_node: &str) -> Self {
        let shadow = &config.shadow;
        let point = &config.point;
        let position =
            PoseDeriver::new(lookup).position(light_node, None, Vec3::from_array(point.default_position));
        Self {
            shadow_light: DirectionalShadowLight {
                resolution: shadow.resolution.max(1),
                viewport: (shadow.viewport[0], shadow.viewport[1]),
                near: shadow.near,
                far: shadow.far,
                color: Vec3::from_array(shadow.color),
                direction: Vec3::from_array(shadow.direction),
                bias: shadow.bias,
            },
            point_light: PointLight { position, color: Vec3::from_array(point.color), intensity: point.intensity },
        }
    }

    /// Environment for the ground plane: only the shadow term.
    pub fn shadow_only(&self) -> LightEnvironment {
        LightEnvironment { ambient: Vec3::ZERO, point_lights: SmallVec::new(), receives_shadow: true }
    }

    /// Cel-shaded environment: no ambient and exactly one point light.
    pub fn full(&self) -> LightEnvironment {
        let mut point_lights = SmallVec::new();
        point_lights.push(self.point_light);
        LightEnvironment { ambient: Vec3::ZERO, point_lights, receives_shadow: false }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::NodeTransform;
    use glam::Quat;

    struct Lights(Option<Vec3>);

    impl NodeLookup for Lights {
        fn find_node(&self, name: &str) -> Option<NodeTransform> {
            let translation = self.0.filter(|_| name == "Light")?;
            Some(NodeTransform { translation, rotation: Quat::IDENTITY, scale: Vec3::ONE })
        }
    }

    #[test]
    fn point_light_follows_anchor_node() {
        let rig = LightingRig::build(&LightingConfig::default(), &Lights(Some(Vec3::new(2.0, 3.0, 4.0))), "Light");
        assert_eq!(rig.point_light.position, Vec3::new(2.0, 3.0, 4.0));
        let fallback = LightingRig::build(&LightingConfig::default(), &Lights(None), "Light");
        assert_eq!(fallback.point_light.position, Vec3::new(0.5, 1.0, 1.0));
        assert_eq!(fallback.point_light.intensity, 1.0);
    }

    #[test]
    fn environments_match_cel_rules() {
        let rig = LightingRig::build(&LightingConfig::default(), &Lights(None), "Light");
        let full = rig.full();
        assert_eq!(full.ambient, Vec3::ZERO);
        assert_eq!(full.point_lights.len(), 1);
        assert_eq!(full.directional_count(), 0);
        assert!(!full.point_lights.spilled());
        let shadow = rig.shadow_only();
        assert!(shadow.point_lights.is_empty());
        assert!(shadow.receives_shadow);
    }

    #[test]
    fn shadow_light_frames_origin() {
        let rig = LightingRig::build(&LightingConfig::default(), &Lights(None), "Light");
        let light = &rig.shadow_light;
        assert!((light.half_depth() - 50.5).abs() < 1e-4);
        let eye = light.eye(Vec3::ZERO);
        assert!(eye.y > 50.0);
        let clip = light.view_projection(Vec3::ZERO, Vec3::NEG_Z) * Vec3::ZERO.extend(1.0);
        let ndc = clip.truncate() / clip.w;
        assert!(ndc.x.abs() < 1e-3 && ndc.y.abs() < 1e-3);
        assert!(ndc.z > 0.0 && ndc.z < 1.0);
    }
}
