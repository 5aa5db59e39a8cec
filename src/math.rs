use glam::{Quat, Vec2, Vec3};

/// Euler angles in degrees, in the order the camera rig consumes them.
///
/// `pitch` turns about Z, `yaw` about X and `roll` about Y when decomposed from
/// a node orientation; the camera applies them as X, then Y, then Z
/// rotations (see [`crate::camera3d::Camera3D::from_pose`]).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EulerDegrees {
    pub pitch: f32,
    pub yaw: f32,
    pub roll: f32,
}

impl EulerDegrees {
    pub const ZERO: Self = Self { pitch: 0.0, yaw: 0.0, roll: 0.0 };

    pub fn new(pitch: f32, yaw: f32, roll: f32) -> Self {
        Self { pitch, yaw, roll }
    }

    pub fn to_vec3(self) -> Vec3 {
        Vec3::new(self.pitch, self.yaw, self.roll)
    }

    pub fn from_vec3(v: Vec3) -> Self {
        Self { pitch: v.x, yaw: v.y, roll: v.z }
    }
}

/// Decomposes a node orientation into Euler degrees.
pub fn quat_to_euler_degrees(q: Quat) -> EulerDegrees {
    let (x, y, z, w) = (q.x, q.y, q.z, q.w);
    let pitch = (2.0 * (x * y + z * w)).clamp(-1.0, 1.0).asin();
    let yaw = (2.0 * (x * w - y * z)).atan2(1.0 - 2.0 * (x * x + z * z));
    let roll = (2.0 * (y * w - x * z)).atan2(1.0 - 2.0 * (y * y + z * z));
    EulerDegrees { pitch: pitch.to_degrees(), yaw: yaw.to_degrees(), roll: roll.to_degrees() }
}

/// Inverse of [`quat_to_euler_degrees`] away from the ±90° pitch poles.
pub fn euler_degrees_to_quat(angles: EulerDegrees) -> Quat {
    Quat::from_rotation_y(angles.roll.to_radians())
        * Quat::from_rotation_z(angles.pitch.to_radians())
        * Quat::from_rotation_x(angles.yaw.to_radians())
}

/// Angle of `v` in degrees measured counter-clockwise from +X, in `[0, 360)`.
pub fn vec2_angle_degrees(v: Vec2) -> f32 {
    let angle = v.y.atan2(v.x).to_degrees();
    if angle < 0.0 {
        angle + 360.0
    } else {
        angle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wrap_degrees(mut degrees: f32) -> f32 {
        while degrees > 180.0 {
            degrees -= 360.0;
        }
        while degrees < -180.0 {
            degrees += 360.0;
        }
        degrees
    }

    fn assert_angles_close(actual: EulerDegrees, expected: EulerDegrees) {
        let diffs = [
            wrap_degrees(actual.pitch - expected.pitch),
            wrap_degrees(actual.yaw - expected.yaw),
            wrap_degrees(actual.roll - expected.roll),
        ];
        assert!(diffs.iter().all(|d| d.abs() < 1e-2), "expected {expected:?}, got {actual:?}");
    }

    #[test]
    fn identity_decomposes_to_zero() {
        assert_angles_close(quat_to_euler_degrees(Quat::IDENTITY), EulerDegrees::ZERO);
    }

    #[test]
    fn single_axis_rotations_land_on_their_slot() {
        let about_z = quat_to_euler_degrees(Quat::from_rotation_z(30f32.to_radians()));
        assert_angles_close(about_z, EulerDegrees::new(30.0, 0.0, 0.0));
        let about_x = quat_to_euler_degrees(Quat::from_rotation_x(-50f32.to_radians()));
        assert_angles_close(about_x, EulerDegrees::new(0.0, -50.0, 0.0));
        let about_y = quat_to_euler_degrees(Quat::from_rotation_y(120f32.to_radians()));
        assert_angles_close(about_y, EulerDegrees::new(0.0, 0.0, 120.0));
    }

    #[test]
    fn decomposition_round_trips_away_from_poles() {
        for &pitch in &[-80.0, -45.0, -10.0, 0.0, 25.0, 60.0, 85.0] {
            for &yaw in &[-170.0, -90.0, -30.0, 0.0, 45.0, 135.0] {
                for &roll in &[-150.0, -60.0, 0.0, 15.0, 100.0, 175.0] {
                    let angles = EulerDegrees::new(pitch, yaw, roll);
                    let decomposed = quat_to_euler_degrees(euler_degrees_to_quat(angles));
                    assert_angles_close(decomposed, angles);
                }
            }
        }
    }

    #[test]
    fn pole_input_stays_finite() {
        let q = Quat::from_xyzw(0.5, 0.5, 0.5, 0.5);
        let angles = quat_to_euler_degrees(q);
        assert!(angles.pitch.is_finite() && angles.yaw.is_finite() && angles.roll.is_finite());
    }

    #[test]
    fn vec2_angle_is_normalised() {
        assert!((vec2_angle_degrees(Vec2::new(1.0, 0.0)) - 0.0).abs() < 1e-4);
        assert!((vec2_angle_degrees(Vec2::new(0.0, 1.0)) - 90.0).abs() < 1e-4);
        assert!((vec2_angle_degrees(Vec2::new(-1.0, 0.0)) - 180.0).abs() < 1e-4);
        assert!((vec2_angle_degrees(Vec2::new(0.0, -1.0)) - 270.0).abs() < 1e-4);
    }
}
