//! Fly camera driving the view and projection uniforms.

use glam::{Mat4, Vec3};

use crate::config::CameraConfig;

/// Yaw/pitch camera. Angles are in degrees; yaw -90 looks down -Z.
#[derive(Debug, Clone)]
pub struct Camera {
    pub position: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    /// Vertical field of view in degrees
    pub fov_y: f32,
    pub near: f32,
    pub far: f32,
    aspect: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self::from_config(&CameraConfig::default(), 16.0 / 9.0)
    }
}

impl Camera {
    pub fn from_config(config: &CameraConfig, aspect: f32) -> Self {
        Self {
            position: Vec3::from(config.position),
            yaw: config.yaw,
            pitch: config.pitch.clamp(-89.0, 89.0),
            fov_y: config.fov_y,
            near: config.near,
            far: config.far,
            aspect: sanitize_aspect(aspect),
        }
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    /// Updates the aspect ratio from viewport dimensions.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.aspect = sanitize_aspect(width as f32 / height.max(1) as f32);
    }

    /// Unit view direction.
    pub fn front(&self) -> Vec3 {
        let (sin_yaw, cos_yaw) = self.yaw.to_radians().sin_cos();
        let (sin_pitch, cos_pitch) = self.pitch.to_radians().sin_cos();
        Vec3::new(cos_yaw * cos_pitch, sin_pitch, sin_yaw * cos_pitch).normalize()
    }

    pub fn right(&self) -> Vec3 {
        self.front().cross(Vec3::Y).normalize()
    }

    /// Adds to yaw and pitch, keeping pitch off the poles.
    pub fn rotate(&mut self, yaw: f32, pitch: f32) {
        self.yaw += yaw;
        self.pitch = (self.pitch + pitch).clamp(-89.0, 89.0);
    }

    /// Turns the camera to face `target`.
    pub fn look_at(&mut self, target: Vec3) {
        let Some(dir) = (target - self.position).try_normalize() else {
            return;
        };
        self.pitch = dir.y.clamp(-1.0, 1.0).asin().to_degrees().clamp(-89.0, 89.0);
        self.yaw = dir.z.atan2(dir.x).to_degrees();
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.front(), Vec3::Y)
    }

    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y.to_radians(), self.aspect, self.near, self.far)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection() * self.view()
    }
}

fn sanitize_aspect(aspect: f32) -> f32 {
    if aspect.is_finite() && aspect > 0.0 {
        aspect
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn test_default_looks_down_negative_z() {
        let camera = Camera::from_config(
            &CameraConfig {
                pitch: 0.0,
                ..Default::default()
            },
            1.0,
        );
        let front = camera.front();
        assert_relative_eq!(front.x, 0.0, epsilon = 1e-6);
        assert_relative_eq!(front.z, -1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_pitch_is_clamped() {
        let mut camera = Camera::default();
        camera.rotate(0.0, 500.0);
        assert_eq!(camera.pitch, 89.0);
        camera.rotate(0.0, -500.0);
        assert_eq!(camera.pitch, -89.0);
    }

    #[test]
    fn test_look_at_faces_target() {
        let mut camera = Camera::default();
        camera.position = Vec3::new(0.0, 0.0, 5.0);
        camera.look_at(Vec3::new(5.0, 0.0, 5.0));
        let front = camera.front();
        assert_relative_eq!(front.x, 1.0, epsilon = 1e-5);

        let clip = camera.view_projection() * Vec3::new(5.0, 0.0, 5.0).extend(1.0);
        assert!(clip.w > 0.0);
        assert_relative_eq!(clip.x / clip.w, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn test_resize_guards_zero_height() {
        let mut camera = Camera::default();
        camera.resize(800, 600);
        assert_relative_eq!(camera.aspect(), 800.0 / 600.0);
        camera.resize(800, 0);
        assert_relative_eq!(camera.aspect(), 800.0);
    }
}
