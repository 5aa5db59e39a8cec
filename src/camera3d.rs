use glam::{Mat4, Quat, Vec2, Vec3};

use crate::math::EulerDegrees;

/// Perspective camera used to render an actor into its offscreen surface.
///
/// The rig starts looking down -Z with +Y up; [`Camera3D::from_pose`] then
/// turns it about the world X, Y and Z axes in that order.
#[derive(Debug, Clone)]
pub struct Camera3D {
    pub position: Vec3,
    pub orientation: Quat,
    pub fov_y_radians: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera3D {
    pub fn new(position: Vec3, orientation: Quat, fov_y_radians: f32, near: f32, far: f32) -> Self {
        Self { position, orientation, fov_y_radians, near, far }
    }

    pub fn from_pose(position: Vec3, angles: EulerDegrees, fov_y_degrees: f32, near: f32, far: f32) -> Self {
        Self::new(position, orientation_from_euler(angles), fov_y_degrees.to_radians(), near, far)
    }

    pub fn forward(&self) -> Vec3 {
        (self.orientation * Vec3::NEG_Z).normalize_or_zero()
    }

    pub fn up(&self) -> Vec3 {
        (self.orientation * Vec3::Y).normalize_or_zero()
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.forward(), self.up())
    }

    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov_y_radians, aspect.max(0.0001), self.near, self.far)
    }

    pub fn view_projection(&self, viewport: (u32, u32)) -> Mat4 {
        self.projection_matrix(aspect_ratio(viewport)) * self.view_matrix()
    }

    /// Projects a world-space point to pixel coordinates (origin top-left).
    pub fn project_point(&self, point: Vec3, viewport: (u32, u32)) -> Option<Vec2> {
        let (width, height) = viewport;
        if width == 0 || height == 0 {
            return None;
        }
        let clip = self.view_projection(viewport) * point.extend(1.0);
        if clip.w <= f32::EPSILON {
            return None;
        }
        let ndc = clip.truncate() / clip.w;
        let x = (ndc.x + 1.0) * 0.5 * width as f32;
        let y = (1.0 - ndc.y) * 0.5 * height as f32;
        Some(Vec2::new(x, y))
    }
}

pub fn aspect_ratio(viewport: (u32, u32)) -> f32 {
    if viewport.1 > 0 {
        viewport.0 as f32 / viewport.1 as f32
    } else {
        1.0
    }
}

fn orientation_from_euler(angles: EulerDegrees) -> Quat {
    let about_x = Quat::from_rotation_x(angles.pitch.to_radians());
    let about_y = Quat::from_rotation_y(angles.yaw.to_radians());
    let about_z = Quat::from_rotation_z(angles.roll.to_radians());
    (about_z * about_y * about_x).normalize()
}
